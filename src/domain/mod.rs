pub mod cache;
pub mod feed;

pub use cache::{CacheMetadata, ConditionalRequest};
pub use feed::{Feed, Item};
