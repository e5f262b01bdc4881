//! End-to-end scans over fixture data and port doubles

use std::cell::Cell;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use approx::assert_relative_eq;
use chrono::NaiveDate;
use tempfile::tempdir;

use option_scan::prelude::*;

const FIXTURE: &str = r#"{
    "as_of": "2026-10-16",
    "rates": {"DGS10": 4.1},
    "tickers": {
        "AAPL": {
            "spot": 100.0,
            "expirations": ["2026-10-16", "2026-11-20", "2026-12-18", "2027-06-18"],
            "chains": {
                "2026-10-16": {"calls": [95.0, 100.0, 105.0], "puts": [100.0]},
                "2026-11-20": {
                    "calls": [85.0, 90.0, 95.0, 100.0, 105.0, 110.0, 115.0],
                    "puts": [92.5, 100.0]
                },
                "2027-06-18": {"calls": [100.0], "puts": []}
            },
            "history": [
                {"date": "2026-10-08", "close": 98.0},
                {"date": "2026-10-09", "close": 99.5},
                {"date": "2026-10-12", "close": 98.7},
                {"date": "2026-10-13", "close": 100.9},
                {"date": "2026-10-14", "close": 101.3},
                {"date": "2026-10-15", "close": 100.0}
            ],
            "quotes": [
                {"expiration": "2026-11-20", "strike": 95.0, "type": "call", "price": 7.05},
                {"expiration": "2026-11-20", "strike": 100.0, "type": "call", "price": 4.10},
                {"expiration": "2026-11-20", "strike": 100.0, "type": "put", "price": 3.60}
            ]
        },
        "MSFT": {
            "spot": 200.0,
            "expirations": ["2026-11-20"],
            "chains": {
                "2026-11-20": {"calls": [170.0, 190.0, 200.0, 200.0, 210.0, 240.0], "puts": []}
            },
            "history": [
                {"date": "2026-10-12", "close": 197.0},
                {"date": "2026-10-13", "close": 199.0},
                {"date": "2026-10-14", "close": 202.5},
                {"date": "2026-10-15", "close": 200.0}
            ],
            "quotes": [
                {"expiration": "2026-11-20", "strike": 200.0, "type": "call", "price": 8.4}
            ]
        },
        "LEAP": {
            "spot": 50.0,
            "expirations": ["2027-12-17", "2028-01-21"],
            "history": []
        }
    }
}"#;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn today() -> NaiveDate {
    date(2026, 10, 16)
}

fn fixture() -> FixtureMarket {
    FixtureMarket::from_json(FIXTURE).unwrap()
}

fn request() -> ScanRequest {
    ScanRequest::new(["AAPL", "MSFT", "LEAP"])
}

/// Quote provider that counts lookups and can fail on one strike
struct ScriptedQuotes<'a> {
    inner: &'a FixtureMarket,
    lookups: Cell<u32>,
    fail_strike: Option<f64>,
    failure: fn() -> ScanError,
}

impl<'a> ScriptedQuotes<'a> {
    fn new(inner: &'a FixtureMarket) -> Self {
        Self {
            inner,
            lookups: Cell::new(0),
            fail_strike: None,
            failure: || ScanError::provider("quote service timed out"),
        }
    }
}

impl QuoteProvider for ScriptedQuotes<'_> {
    fn find_contract(&self, contract: &OptionContract) -> ScanResult<Option<ContractId>> {
        self.lookups.set(self.lookups.get() + 1);
        if self.fail_strike == Some(contract.strike) {
            return Err((self.failure)());
        }
        self.inner.find_contract(contract)
    }

    fn market_price(&self, id: &ContractId) -> ScanResult<f64> {
        self.inner.market_price(id)
    }
}

#[test]
fn test_full_scan() {
    let market = fixture();
    let report = Scanner::new(&market, &market, &market)
        .with_as_of(today())
        .run(&request())
        .unwrap();

    assert_eq!(report.as_of, today());
    assert_relative_eq!(report.rate, 0.041, epsilon = 1e-15);

    // AAPL 2026-11-20: 90, 92.5, 95, 100, 105, 110; MSFT 2026-11-20: 190, 200, 210
    let rows: Vec<(&str, NaiveDate, f64)> = report
        .records
        .iter()
        .map(|r| (r.ticker.as_str(), r.expiration, r.strike))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("AAPL", date(2026, 11, 20), 90.0),
            ("AAPL", date(2026, 11, 20), 92.5),
            ("AAPL", date(2026, 11, 20), 95.0),
            ("AAPL", date(2026, 11, 20), 100.0),
            ("AAPL", date(2026, 11, 20), 105.0),
            ("AAPL", date(2026, 11, 20), 110.0),
            ("MSFT", date(2026, 11, 20), 190.0),
            ("MSFT", date(2026, 11, 20), 200.0),
            ("MSFT", date(2026, 11, 20), 210.0),
        ]
    );

    // Expiring today (degenerate) and 2026-12-18 (no chain) are skipped
    let skipped: Vec<(&str, Option<NaiveDate>)> = report
        .skipped
        .iter()
        .map(|s| (s.ticker.as_str(), s.expiration))
        .collect();
    assert_eq!(
        skipped,
        vec![
            ("AAPL", Some(date(2026, 10, 16))),
            ("AAPL", Some(date(2026, 12, 18))),
        ]
    );
}

#[test]
fn test_model_price_matches_closed_form() {
    let market = fixture();
    let report = Scanner::new(&market, &market, &market)
        .with_as_of(today())
        .run(&ScanRequest::new(["AAPL"]))
        .unwrap();

    let closes = [98.0, 99.5, 98.7, 100.9, 101.3, 100.0];
    let vol = annualized_volatility(&closes).unwrap();
    let time = 35.0 / 365.0;

    let atm = report.records.iter().find(|r| r.strike == 100.0).unwrap();
    let expected = bs_price(100.0, 100.0, time, 0.041, vol, OptionType::Call).unwrap();
    assert_relative_eq!(atm.model_price.unwrap(), expected, epsilon = 1e-12);
    assert_eq!(atm.market_price, Some(4.10));
    assert_relative_eq!(atm.difference().unwrap(), 4.10 - expected, epsilon = 1e-12);
}

#[test]
fn test_ticker_without_expirations_contributes_nothing() {
    let market = fixture();
    let scanner = Scanner::new(&market, &market, &market).with_as_of(today());

    let leap_only = scanner.run(&ScanRequest::new(["LEAP"])).unwrap();
    assert!(leap_only.records.is_empty());
    assert!(leap_only.skipped.is_empty());

    let with_leap = scanner.run(&request()).unwrap();
    let without_leap = scanner.run(&ScanRequest::new(["AAPL", "MSFT"])).unwrap();
    assert_eq!(with_leap.records, without_leap.records);
}

#[test]
fn test_missing_contract_has_no_market_price() {
    let market = fixture();
    let report = Scanner::new(&market, &market, &market)
        .with_as_of(today())
        .run(&ScanRequest::new(["AAPL"]))
        .unwrap();

    let unlisted = report.records.iter().find(|r| r.strike == 105.0).unwrap();
    assert!(unlisted.model_price.is_some());
    assert_eq!(unlisted.market_price, None);
    assert_eq!(unlisted.difference(), None);

    let quoted = report.records.iter().filter(|r| r.market_price.is_some()).count();
    assert_eq!(quoted, 2);
}

#[test]
fn test_put_scan_uses_put_quotes() {
    let market = fixture();
    let report = Scanner::new(&market, &market, &market)
        .with_as_of(today())
        .run(&ScanRequest::new(["AAPL"]).with_option_type(OptionType::Put))
        .unwrap();

    assert!(report.records.iter().all(|r| r.option_type == OptionType::Put));
    let atm = report.records.iter().find(|r| r.strike == 100.0).unwrap();
    assert_eq!(atm.market_price, Some(3.60));
    assert!(report.records.iter().find(|r| r.strike == 95.0).unwrap().market_price.is_none());
}

#[test]
fn test_rate_failure_aborts_before_any_record() {
    let mut data = fixture().data().clone();
    data.rates.clear();
    let market = FixtureMarket::new(data);
    let quotes = ScriptedQuotes::new(&market);

    let result = Scanner::new(&market, &market, &quotes)
        .with_as_of(today())
        .run(&request());

    assert!(matches!(result, Err(ScanError::RateUnavailable(_))));
    assert_eq!(quotes.lookups.get(), 0);
}

#[test]
fn test_unknown_rate_series_is_fatal() {
    let market = fixture();
    let result = Scanner::new(&market, &market, &market)
        .with_as_of(today())
        .run(&request().with_rate_series("DGS30"));
    assert!(matches!(result, Err(ScanError::RateUnavailable(_))));
}

#[test]
fn test_invalid_request_is_rejected() {
    let market = fixture();
    let scanner = Scanner::new(&market, &market, &market).with_as_of(today());
    assert!(matches!(
        scanner.run(&request().with_band_percent(0.0)),
        Err(ScanError::InvalidInput(_))
    ));
}

#[test]
fn test_intrinsic_policy_prices_expiring_contracts() {
    let market = fixture();
    let report = Scanner::new(&market, &market, &market)
        .with_policy(DegeneratePolicy::Intrinsic)
        .with_as_of(today())
        .run(&ScanRequest::new(["AAPL"]))
        .unwrap();

    let expiring: Vec<&ComparisonRecord> = report
        .records
        .iter()
        .filter(|r| r.expiration == today())
        .collect();
    assert_eq!(expiring.len(), 3);
    for record in expiring {
        let intrinsic = (100.0 - record.strike).max(0.0);
        assert_eq!(record.model_price, Some(intrinsic));
    }

    // Only the missing chain is skipped now
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].expiration, Some(date(2026, 12, 18)));
}

#[test]
fn test_insufficient_history_skips_expiration() {
    let mut data = fixture().data().clone();
    let msft = data.tickers.get_mut("MSFT").unwrap();
    msft.history.truncate(2);
    let market = FixtureMarket::new(data);

    let report = Scanner::new(&market, &market, &market)
        .with_as_of(today())
        .run(&ScanRequest::new(["MSFT", "AAPL"]))
        .unwrap();

    assert!(report.records.iter().all(|r| r.ticker == "AAPL"));
    assert_eq!(report.records.len(), 6);
    assert_eq!(report.skipped[0].ticker, "MSFT");
    assert!(report.skipped[0].reason.contains("2 valid close(s)"));
}

#[test]
fn test_unknown_ticker_is_skipped() {
    let market = fixture();
    let report = Scanner::new(&market, &market, &market)
        .with_as_of(today())
        .run(&ScanRequest::new(["TSLA", "MSFT"]))
        .unwrap();

    assert_eq!(report.records.len(), 3);
    assert_eq!(report.skipped[0].ticker, "TSLA");
    assert_eq!(report.skipped[0].expiration, None);
}

#[test]
fn test_quote_outage_skips_one_strike() {
    let market = fixture();
    let mut quotes = ScriptedQuotes::new(&market);
    quotes.fail_strike = Some(95.0);

    let report = Scanner::new(&market, &market, &quotes)
        .with_as_of(today())
        .run(&ScanRequest::new(["AAPL"]))
        .unwrap();

    assert_eq!(report.records.len(), 5);
    assert!(report.records.iter().all(|r| r.strike != 95.0));
    let item = report.skipped.iter().find(|s| s.strike == Some(95.0)).unwrap();
    assert_eq!(item.expiration, Some(date(2026, 11, 20)));
}

/// Loopback endpoint answering 401 for `/options/BAD` and 500 for anything else
fn serve_market_rejections() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let mut buf = [0u8; 4096];
            let n = stream.read(&mut buf).unwrap_or(0);
            let head = String::from_utf8_lossy(&buf[..n]);
            let status = if head.contains("/options/BAD") {
                "401 Unauthorized"
            } else {
                "500 Internal Server Error"
            };
            let _ = write!(
                stream,
                "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                status
            );
        }
    });

    format!("http://{}", addr)
}

#[test]
fn test_market_data_rejection_skips_only_that_ticker() {
    let market = YahooClient::new(Duration::from_secs(5))
        .unwrap()
        .with_base_url(serve_market_rejections());
    let fixture = fixture();

    let report = Scanner::new(&market, &fixture, &fixture)
        .with_as_of(today())
        .run(&ScanRequest::new(["GOOD", "BAD", "GOOD2"]))
        .unwrap();

    assert!(report.records.is_empty());
    let skipped: Vec<&str> = report.skipped.iter().map(|s| s.ticker.as_str()).collect();
    assert_eq!(skipped, vec!["GOOD", "BAD", "GOOD2"]);
    assert!(report.skipped[1].reason.contains("401"));
}

#[test]
fn test_expired_session_aborts_scan() {
    let market = fixture();
    let mut quotes = ScriptedQuotes::new(&market);
    quotes.fail_strike = Some(100.0);
    quotes.failure = || ScanError::Authentication("token expired".into());

    let result = Scanner::new(&market, &market, &quotes)
        .with_as_of(today())
        .run(&request());
    assert!(matches!(result, Err(ScanError::Authentication(_))));
}

struct TrackedSession {
    market: FixtureMarket,
    closes: Rc<Cell<u32>>,
    fail_close: bool,
}

impl QuoteProvider for TrackedSession {
    fn find_contract(&self, contract: &OptionContract) -> ScanResult<Option<ContractId>> {
        self.market.find_contract(contract)
    }

    fn market_price(&self, id: &ContractId) -> ScanResult<f64> {
        self.market.market_price(id)
    }
}

impl BrokerSession for TrackedSession {
    fn close(&mut self) -> ScanResult<()> {
        self.closes.set(self.closes.get() + 1);
        if self.fail_close {
            return Err(ScanError::provider("revoke_token timed out"));
        }
        Ok(())
    }
}

struct TrackedBroker {
    market: FixtureMarket,
    closes: Rc<Cell<u32>>,
    fail_close: bool,
}

impl TrackedBroker {
    fn new(market: &FixtureMarket) -> Self {
        Self {
            market: market.clone(),
            closes: Rc::new(Cell::new(0)),
            fail_close: false,
        }
    }
}

impl Broker for TrackedBroker {
    type Session = TrackedSession;

    fn open(&self, _credentials: &Credentials) -> ScanResult<TrackedSession> {
        Ok(TrackedSession {
            market: self.market.clone(),
            closes: Rc::clone(&self.closes),
            fail_close: self.fail_close,
        })
    }
}

#[test]
fn test_session_closed_after_scan() {
    let market = fixture();
    let broker = TrackedBroker::new(&market);

    let report = with_session(&broker, &Credentials::new("trader", "secret"), |session| {
        Scanner::new(&market, &market, session)
            .with_as_of(today())
            .run(&request())
    })
    .unwrap();

    assert_eq!(report.records.len(), 9);
    assert_eq!(broker.closes.get(), 1);
}

#[test]
fn test_logout_failure_keeps_completed_report() {
    let market = fixture();
    let broker = TrackedBroker {
        fail_close: true,
        ..TrackedBroker::new(&market)
    };

    let report = with_session(&broker, &Credentials::default(), |session| {
        Scanner::new(&market, &market, session)
            .with_as_of(today())
            .run(&request())
    })
    .unwrap();

    assert_eq!(report.records.len(), 9);
    assert_eq!(broker.closes.get(), 1);
}

#[test]
fn test_session_closed_when_scan_fails() {
    let mut data = fixture().data().clone();
    data.rates.clear();
    let market = FixtureMarket::new(data);
    let broker = TrackedBroker::new(&market);

    let result = with_session(&broker, &Credentials::default(), |session| {
        Scanner::new(&market, &market, session)
            .with_as_of(today())
            .run(&request())
    });

    assert!(matches!(result, Err(ScanError::RateUnavailable(_))));
    assert_eq!(broker.closes.get(), 1);
}

#[test]
fn test_cached_market_gives_same_report() {
    let market = fixture();
    let dir = tempdir().unwrap();
    let cached = CachedMarketData::new(
        market.clone(),
        CacheConfig {
            cache_dir: dir.path().to_path_buf(),
            max_age_hours: 24,
            enabled: true,
        },
    )
    .unwrap();

    let direct = Scanner::new(&market, &market, &market)
        .with_as_of(today())
        .run(&request())
        .unwrap();

    // Second pass reads expirations, chains and history from disk
    for _ in 0..2 {
        let report = Scanner::new(&cached, &market, &market)
            .with_as_of(today())
            .run(&request())
            .unwrap();
        assert_eq!(report.records.len(), direct.records.len());
        for (cached, live) in report.records.iter().zip(&direct.records) {
            assert_eq!((cached.expiration, cached.strike), (live.expiration, live.strike));
            assert_relative_eq!(
                cached.model_price.unwrap(),
                live.model_price.unwrap(),
                epsilon = 1e-9
            );
            assert_eq!(cached.market_price, live.market_price);
        }
    }
}

#[test]
fn test_bundled_demo_fixture_scans() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/demos/fixture.json");
    let market = FixtureMarket::from_path(path).unwrap();
    let as_of = market.as_of().unwrap();

    let report = Scanner::new(&market, &market, &market)
        .with_as_of(as_of)
        .run(&ScanRequest::new(["AAPL", "MSFT", "LEAP"]))
        .unwrap();

    assert!(!report.records.is_empty());
    assert!(report.records.iter().any(|r| r.market_price.is_some()));
    for record in &report.records {
        let spot = market.spot_price(&record.ticker).unwrap();
        assert!((record.strike - spot).abs() <= spot * 0.10 + 1e-9);
        assert!(record.model_price.unwrap() >= 0.0);
    }
}
