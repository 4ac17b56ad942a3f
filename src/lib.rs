// liq-core: leveraged position and liquidation engine.
// margin-first architecture: every open reserves margin, every tick sweeps.
// all state is in memory; the price feed and transport live outside.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: UserId, OrderId, Symbol, Side, Price, Money, Leverage
//   2.x  quotes.rs: latest bid/ask per symbol
//   3.x  margin.rs: margin = entry notional / leverage
//   4.x  position.rs: position record, pnl, close settlement
//   6.x  liquidation.rs: liquidation price and breach detection
//   8.x  engine/: core engine: opens, closes, quote ticks, sweeps
//   9.x  feed.rs: price feed message decoding
//   10.x ledger.rs: per-user balances, reserve/release
//   11.x events.rs: state transition events for audit

pub mod engine;
pub mod events;
pub mod feed;
pub mod ledger;
pub mod liquidation;
pub mod margin;
pub mod position;
pub mod quotes;
pub mod types;

// re exports for convenience
pub use engine::*;
pub use events::*;
pub use feed::{FeedError, FeedMessage};
pub use ledger::{Account, Ledger, LedgerError};
pub use liquidation::*;
pub use margin::*;
pub use position::*;
pub use quotes::{Quote, QuoteCache};
pub use types::*;
