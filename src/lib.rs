pub mod config;
pub mod detector;
pub mod error;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod scrapers;
pub mod store;

pub use config::{Config, RunMode};
pub use detector::ChangeDetector;
pub use models::Listing;
pub use pipeline::{Pipeline, TickReport};
pub use store::SeenStore;
