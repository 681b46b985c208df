pub mod aggregator;
pub mod node;
pub mod traits;

pub use aggregator::AggregatorSource;
pub use node::{HttpNodeSourceFactory, NodeSource};
pub use traits::{BalanceSource, NodeSourceFactory};
