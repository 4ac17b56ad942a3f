//! Liquidation Engine Simulation.
//!
//! Walks through the engine lifecycle: opening leveraged positions, closing
//! them for a profit, liquidations on adverse ticks, and a feed thread racing
//! client closes.

use liq_core::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("Position & Liquidation Engine Simulation");
    println!("Isolated Margin, Quote-Driven Liquidation\n");

    let results = [
        scenario_1_long_liquidation(),
        scenario_2_profitable_close(),
        scenario_3_short_liquidation(),
        scenario_4_insufficient_margin(),
        scenario_5_feed_messages(),
        scenario_6_close_racing_feed(),
    ];

    for result in results {
        if let Err(e) = result {
            eprintln!("simulation failed: {e}");
            std::process::exit(1);
        }
    }

    println!("\nAll simulations completed successfully.");
}

fn alice() -> UserId {
    UserId(1)
}

fn engine_with_alice() -> Result<Engine, EngineError> {
    let engine = Engine::new(EngineConfig::default());
    engine.register_user(alice())?;
    Ok(engine)
}

/// Long SOL at 10x, ticks down through the liquidation price.
fn scenario_1_long_liquidation() -> Result<(), EngineError> {
    println!("Scenario 1: Long Liquidation\n");

    let engine = engine_with_alice()?;
    engine.on_quote("SOLUSDT", dec!(149.9), dec!(150))?;

    let opened = engine.open_position(alice(), "SOLUSDT", Side::Long, dec!(1), dec!(10))?;
    println!(
        "  Alice opens LONG 1 SOL @ ${} (10x), margin ${}, liquidation ${}",
        opened.position.entry_price,
        opened.position.margin_reserved,
        opened.position.liquidation_price
    );
    println!("  Balance: ${}", opened.new_balance);

    let liqs = engine.on_quote("SOLUSDT", dec!(140), dec!(140.1))?;
    println!("  Tick bid $140: {} liquidations", liqs.len());

    let liqs = engine.on_quote("SOLUSDT", dec!(134), dec!(134.1))?;
    for liq in &liqs {
        println!(
            "  Tick bid $134: order {} liquidated at ${}, margin ${} forfeited",
            liq.order_id, liq.trigger_price, liq.forfeited_margin
        );
    }
    println!("  Balance after liquidation: ${}\n", engine.get_balance(alice())?);
    Ok(())
}

/// Same long, closed into a rally instead.
fn scenario_2_profitable_close() -> Result<(), EngineError> {
    println!("Scenario 2: Profitable Close\n");

    let engine = engine_with_alice()?;
    engine.on_quote("SOLUSDT", dec!(149.9), dec!(150))?;
    let opened = engine.open_position(alice(), "SOLUSDT", Side::Long, dec!(1), dec!(10))?;

    engine.on_quote("SOLUSDT", dec!(160), dec!(160.1))?;
    let pnl = engine.unrealized_pnl(alice(), opened.position.order_id)?;
    println!("  Bid rallies to $160, unrealized PnL ${}", pnl);

    let closed = engine.close_position(alice(), opened.position.order_id)?;
    println!(
        "  Closed @ ${}: PnL ${}, balance ${}\n",
        closed.exit_price, closed.pnl, closed.new_balance
    );
    Ok(())
}

/// Short ETH at 5x, ask spikes through the liquidation price.
fn scenario_3_short_liquidation() -> Result<(), EngineError> {
    println!("Scenario 3: Short Liquidation\n");

    let engine = engine_with_alice()?;
    engine.on_quote("ETHUSDT", dec!(2000), dec!(2000.5))?;

    let opened = engine.open_position(alice(), "ETHUSDT", Side::Short, dec!(2), dec!(5))?;
    println!(
        "  Alice opens SHORT 2 ETH @ ${} (5x), margin ${}, liquidation ${}",
        opened.position.entry_price,
        opened.position.margin_reserved,
        opened.position.liquidation_price
    );

    let liqs = engine.on_quote("ETHUSDT", dec!(2499), dec!(2500))?;
    println!("  Ask spikes to $2500: {} liquidations", liqs.len());

    let summary = engine.account_summary(alice())?;
    println!(
        "  Balance ${}, locked margin ${}, open positions {}\n",
        summary.balance, summary.locked_margin, summary.open_positions
    );
    Ok(())
}

/// Margin larger than the balance is rejected without side effects.
fn scenario_4_insufficient_margin() -> Result<(), EngineError> {
    println!("Scenario 4: Insufficient Margin\n");

    let engine = engine_with_alice()?;
    engine.on_quote("BTCUSDT", dec!(60000), dec!(60001))?;

    match engine.open_position(alice(), "BTCUSDT", Side::Long, dec!(1), dec!(2)) {
        Err(EngineError::InsufficientMargin { required, available }) => {
            println!("  Rejected: required ${}, available ${}", required, available);
        }
        other => println!("  Unexpected result: {:?}", other),
    }
    println!("  Balance unchanged: ${}\n", engine.get_balance(alice())?);
    Ok(())
}

/// Raw JSON messages from the feed, including a malformed one.
fn scenario_5_feed_messages() -> Result<(), EngineError> {
    println!("Scenario 5: Feed Messages\n");

    let engine = engine_with_alice()?;
    let messages = [
        r#"{"symbol":"solusdt","bid":"149.9","ask":"150"}"#,
        r#"{"symbol":"SOLUSDT","bid":"oops","ask":"150"}"#,
        r#"{"s":"ETHUSDT","b":2000,"a":2000.5}"#,
    ];

    for raw in messages {
        match engine.on_feed_message(raw) {
            Ok(_) => println!("  applied: {}", raw),
            Err(e) => println!("  dropped: {} ({})", raw, e),
        }
    }

    for symbol in engine.symbols() {
        if let Some(quote) = engine.get_quote(symbol.as_str()) {
            println!("  {} bid ${} ask ${}", symbol, quote.bid, quote.ask);
        }
    }
    println!();
    Ok(())
}

/// A feed thread ticks SOL down while Alice closes her positions.
/// Every position ends exactly once, by close or by liquidation.
fn scenario_6_close_racing_feed() -> Result<(), EngineError> {
    println!("Scenario 6: Close Racing the Feed\n");

    let engine = Arc::new(engine_with_alice()?);
    engine.on_quote("SOLUSDT", dec!(150), dec!(150))?;

    let mut order_ids = Vec::new();
    for i in 1..=20u32 {
        let leverage = Decimal::from(5 + i);
        let opened = engine.open_position(alice(), "SOLUSDT", Side::Long, dec!(1), leverage)?;
        order_ids.push(opened.position.order_id);
    }

    let feed = {
        let engine = Arc::clone(&engine);
        std::thread::spawn(move || {
            let mut liquidated = 0usize;
            for step in 0..40u32 {
                let bid = dec!(150) - Decimal::from(step);
                if let Ok(liqs) = engine.on_quote("SOLUSDT", bid, bid + dec!(0.1)) {
                    liquidated += liqs.len();
                }
            }
            liquidated
        })
    };

    let mut closed = 0usize;
    let mut not_found = 0usize;
    for order_id in order_ids {
        match engine.close_position(alice(), order_id) {
            Ok(_) => closed += 1,
            Err(EngineError::NotFound(_)) => not_found += 1,
            Err(e) => return Err(e),
        }
    }

    let liquidated = feed.join().unwrap_or(0);
    println!("  Closed {}, already gone {}, liquidated by feed {}", closed, not_found, liquidated);
    println!("  Final balance: ${}", engine.get_balance(alice())?);
    Ok(())
}
