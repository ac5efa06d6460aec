pub mod boligportal;
pub mod extractor;
pub mod traits;
pub mod types;

pub use boligportal::HttpFetcher;
pub use extractor::{Extraction, ListingExtractor};
pub use traits::PageFetcher;
pub use types::{CardStrategy, SelectorSet};
