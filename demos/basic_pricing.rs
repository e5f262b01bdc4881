//! Example: Basic options pricing with Black-Scholes
//!
//! Run with: cargo run --example basic_pricing

use option_scan::prelude::*;

fn main() -> ScanResult<()> {
    // Option parameters
    let spot = 100.0;
    let strike = 100.0;
    let time = 1.0; // 1 year
    let rate = 0.05; // 5% risk-free rate
    let vol = 0.20; // 20% volatility

    println!("=== Black-Scholes Pricing ===\n");
    println!("Spot:     ${:.2}", spot);
    println!("Strike:   ${:.2}", strike);
    println!("Time:     {:.2} years ({:.0} days)", time, time * 365.0);
    println!("Rate:     {:.1}%", rate * 100.0);
    println!("Vol:      {:.1}%\n", vol * 100.0);

    let call_price = bs_price(spot, strike, time, rate, vol, OptionType::Call)?;
    println!("Call Price: ${:.4}", call_price);

    let put_price = bs_price(spot, strike, time, rate, vol, OptionType::Put)?;
    println!("Put Price:  ${:.4}", put_price);

    // Verify put-call parity: C - P = S - K*e^(-rT)
    let parity_lhs = call_price - put_price;
    let parity_rhs = spot - strike * (-rate * time).exp();
    println!("\nPut-Call Parity Check:");
    println!("  C - P = {:.4}", parity_lhs);
    println!("  S - K*e^(-rT) = {:.4}", parity_rhs);
    println!("  Difference: {:.2e}", (parity_lhs - parity_rhs).abs());

    // Approach to expiry: the call collapses onto its intrinsic value
    println!("\n=== Approach to Expiry (K = 95) ===\n");
    for days in [90.0, 30.0, 7.0, 1.0] {
        let t = days / 365.0;
        let value = bs_price(spot, 95.0, t, rate, vol, OptionType::Call)?;
        println!("{:>4} days: {:.4}", days, value);
    }

    // Degenerate inputs
    println!("\n=== Degenerate Inputs ===\n");
    match bs_price(spot, 95.0, 0.0, rate, vol, OptionType::Call) {
        Ok(v) => println!("Fail-fast:  {:.4}", v),
        Err(e) => println!("Fail-fast:  {}", e),
    }
    let intrinsic = price_with_policy(
        spot,
        95.0,
        0.0,
        rate,
        vol,
        OptionType::Call,
        DegeneratePolicy::Intrinsic,
    )?;
    println!("Intrinsic:  {:.4}", intrinsic);

    // Historical volatility from a short price path
    println!("\n=== Historical Volatility ===\n");
    let closes = [100.0, 101.2, 100.4, 102.1, 101.7, 103.0, 102.2, 104.1];
    match annualized_volatility(&closes) {
        Some(sigma) => println!("{} closes -> {:.2}% annualized", closes.len(), sigma * 100.0),
        None => println!("Not enough closes"),
    }

    Ok(())
}
