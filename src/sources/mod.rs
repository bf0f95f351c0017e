pub mod comicwalker;
pub mod fuz;
pub mod ganganonline;
pub mod kakuyomu;
pub mod meteor;
pub mod narou;
pub mod newtype;
pub mod registry;
pub mod ride;
pub mod takecomi;
pub mod takeshobo;
pub mod traits;
pub mod valkyrie;

pub use registry::SiteRegistry;
pub use traits::{SiteExtractor, SiteFeed};
