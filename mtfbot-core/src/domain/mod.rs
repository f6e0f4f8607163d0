//! Domain types for the MTF signal pipeline.

pub mod account;
pub mod candle;
pub mod position;
pub mod timeframe;

pub use account::AccountState;
pub use candle::{Candle, CandleError};
pub use position::{AnchorRef, Position, Side};
pub use timeframe::{Timeframe, TimeframeParseError};
