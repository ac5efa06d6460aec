pub mod telegram;

pub use telegram::TelegramNotifier;

use crate::models::Listing;
use async_trait::async_trait;
use tracing::info;

/// Delivery channel for new-listing alerts
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Try to deliver one alert. Failures are handled inside and reported as `false`.
    async fn deliver(&self, listing: &Listing) -> bool;

    fn name(&self) -> &'static str;
}

/// Human-readable alert text (Telegram Markdown)
pub fn format_message(listing: &Listing) -> String {
    let or_dash = |field: &Option<String>| field.clone().unwrap_or_else(|| "-".to_string());

    format!(
        "🏠 *New Listing Found!*\n\n\
         📍 {} ({} m²)\n\
         📮 {}, {}\n\
         💰 {}\n\
         ⏰ {}\n\n\
         🔗 [View Listing]({})",
        or_dash(&listing.rooms),
        or_dash(&listing.size_m2),
        or_dash(&listing.city),
        or_dash(&listing.street),
        listing.price,
        or_dash(&listing.listing_age),
        listing.url,
    )
}

/// Writes alerts to the log instead of sending them anywhere
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, listing: &Listing) -> bool {
        info!("\n{}", format_message(listing));
        true
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
