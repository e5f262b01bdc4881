//! Authenticated broker sessions
//!
//! A session is opened explicitly, handed to the scan as a dependency and
//! closed when the scan finishes, whether it succeeded or not.

use std::fmt;
use std::ops::Deref;

use crate::core::ScanResult;

use super::ports::QuoteProvider;

/// Login credentials
#[derive(Clone, Default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// An open, authenticated connection that can quote contracts
pub trait BrokerSession: QuoteProvider {
    /// Release the session (logout / token revocation)
    fn close(&mut self) -> ScanResult<()>;
}

/// Opens sessions against one brokerage
pub trait Broker {
    type Session: BrokerSession;

    fn open(&self, credentials: &Credentials) -> ScanResult<Self::Session>;
}

/// Closes the wrapped session on drop unless it was released explicitly
pub struct SessionGuard<S: BrokerSession> {
    session: S,
    released: bool,
}

impl<S: BrokerSession> SessionGuard<S> {
    pub fn new(session: S) -> Self {
        Self {
            session,
            released: false,
        }
    }

    /// Close now and report the outcome
    pub fn release(mut self) -> ScanResult<()> {
        self.released = true;
        self.session.close()
    }
}

impl<S: BrokerSession> Deref for SessionGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.session
    }
}

impl<S: BrokerSession> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            if let Err(e) = self.session.close() {
                tracing::warn!("Failed to close broker session: {}", e);
            }
        }
    }
}

/// Open a session, run `f` with it, and always close it afterwards.
///
/// An error from `f` takes precedence over an error from closing. A close
/// failure after a successful run is logged and the value is still returned.
pub fn with_session<B, T, F>(broker: &B, credentials: &Credentials, f: F) -> ScanResult<T>
where
    B: Broker,
    F: FnOnce(&B::Session) -> ScanResult<T>,
{
    let guard = SessionGuard::new(broker.open(credentials)?);
    tracing::debug!(user = %credentials.username, "Broker session opened");

    let result = f(&guard);
    let closed = guard.release();

    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(value), Err(close_err)) => {
            tracing::warn!("Failed to close broker session: {}", close_err);
            Ok(value)
        }
        (Err(e), Err(close_err)) => {
            tracing::warn!("Failed to close broker session: {}", close_err);
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
    }
}
