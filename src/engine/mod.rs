// 8.0: core engine. coordinates quote updates, position opens and closes,
// balance reservation, and the liquidation sweep run on every tick.
// in-memory and thread-safe with no external I/O.

mod book;
mod config;
mod core;
mod liquidations;
mod positions;
mod pricing;
mod results;

pub use self::config::{ConfigError, EngineConfig, SeedUser};
pub use self::core::Engine;
pub use self::results::{AccountSummary, CloseResult, EngineError, LiquidationResult, OpenResult};
