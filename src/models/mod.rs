use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Printed in place of a price when the card has no readable price node
pub const PRICE_NOT_FOUND: &str = "Price not found";

/// Marker preceding the numeric listing id in boligportal detail URLs
const ID_MARKER: &str = "id-";

/// One advertised property as it appeared on the search results page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Listing {
    pub id: String,
    pub url: String,
    pub rooms: Option<String>,
    pub size_m2: Option<String>,
    pub city: Option<String>,
    pub street: Option<String>,
    pub price: String,
    pub image_url: Option<String>,
    pub listing_age: Option<String>,
    pub found_at: DateTime<Utc>,
}

impl Listing {
    /// Bare listing carrying only its identity. Everything else is unknown.
    pub fn bare(url: String, found_at: DateTime<Utc>) -> Self {
        Self {
            id: listing_id(&url),
            url,
            rooms: None,
            size_m2: None,
            city: None,
            street: None,
            price: PRICE_NOT_FOUND.to_string(),
            image_url: None,
            listing_age: None,
            found_at,
        }
    }

    /// Short one-line description used in log output
    pub fn summary(&self) -> String {
        format!(
            "{} | {} | {} | {}",
            self.id,
            self.rooms.as_deref().unwrap_or("?"),
            self.city.as_deref().unwrap_or("?"),
            self.price
        )
    }
}

/// Derive the stable identity of a listing from its URL.
///
/// `https://www.boligportal.dk/lejligheder/koebenhavn/id-5234711/` yields
/// `5234711`. URLs without the marker (or with nothing after it) use the whole
/// URL as identity.
pub fn listing_id(url: &str) -> String {
    match url.rsplit_once(ID_MARKER) {
        Some((_, rest)) => {
            let id = rest.split('/').next().unwrap_or_default();
            if id.is_empty() {
                url.to_string()
            } else {
                id.to_string()
            }
        }
        None => url.to_string(),
    }
}
