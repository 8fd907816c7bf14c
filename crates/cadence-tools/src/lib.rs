pub mod arithmetic;
pub mod search;

pub use arithmetic::ExpressionEvaluator;
pub use search::{create_search, PerplexitySearch, SearchPort, TavilySearch};
