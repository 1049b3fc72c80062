pub mod builder;
pub mod types;

pub use builder::RouteBuilder;
pub use types::{Route, RouteLeg, TradeLeg, UnifiedTrade};
