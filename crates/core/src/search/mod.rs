//! Query model, per-provider results and the aggregation engine.

mod engine;
mod result;
mod types;

pub use engine::SearchResult;
pub(crate) use engine::panic_message;
pub use result::*;
pub use types::*;
