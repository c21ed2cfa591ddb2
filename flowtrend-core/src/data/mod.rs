//! Data providers: price and institutional-flow sources.

pub mod finmind;
pub mod provider;
pub mod yahoo;

pub use finmind::FinMindProvider;
pub use provider::{FetchError, FlowSource, PriceSource};
pub use yahoo::YahooProvider;
