use crate::detector::ChangeDetector;
use crate::error::{FetchError, StoreError};
use crate::models::Listing;
use crate::notify::Notifier;
use crate::scrapers::{ListingExtractor, PageFetcher};
use tracing::{debug, info, warn};

/// What happened during one fetch-parse-detect-notify cycle
#[derive(Debug, Default)]
pub struct TickReport {
    /// Set when no document was obtained
    pub fetch_error: Option<FetchError>,
    /// Listings read from the page, known ones included
    pub extracted: usize,
    /// Cards skipped because they could not be read at all
    pub skipped_cards: usize,
    pub new_listings: Vec<Listing>,
    pub delivered: usize,
    pub failed_deliveries: usize,
    pub persist_error: Option<StoreError>,
}

impl TickReport {
    /// True when the seen-set guarantee held for this tick
    pub fn is_clean(&self) -> bool {
        self.persist_error.is_none()
    }
}

/// The monitoring pipeline, owned by the driver
pub struct Pipeline {
    search_url: String,
    fetcher: Box<dyn PageFetcher>,
    extractor: ListingExtractor,
    detector: ChangeDetector,
    notifier: Box<dyn Notifier>,
}

impl Pipeline {
    pub fn new(
        search_url: impl Into<String>,
        fetcher: Box<dyn PageFetcher>,
        extractor: ListingExtractor,
        detector: ChangeDetector,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        Self {
            search_url: search_url.into(),
            fetcher,
            extractor,
            detector,
            notifier,
        }
    }

    pub fn detector(&self) -> &ChangeDetector {
        &self.detector
    }

    /// Run one tick.
    ///
    /// Ids are persisted before any alert goes out; alert failures never undo that.
    pub async fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        info!("Fetching listings from {} ({})", self.search_url, self.fetcher.source_name());
        let html = match self.fetcher.fetch(&self.search_url).await {
            Ok(html) => html,
            Err(e) => {
                warn!("Error fetching listings: {e}");
                report.fetch_error = Some(e);
                return report;
            }
        };

        let extraction = self.extractor.extract(&html, self.detector.seen());
        report.extracted = extraction.listings.len();
        report.skipped_cards = extraction.card_errors.len();

        match extraction.strategy {
            Some(strategy) => info!(
                "Found {} listing cards using {} strategy",
                extraction.listings.len() + extraction.card_errors.len(),
                strategy
            ),
            None => warn!("No listing cards matched any selector; the page markup may have changed"),
        }
        for e in &extraction.card_errors {
            warn!("Error processing card: {e}");
        }
        for (id, miss) in &extraction.field_misses {
            debug!("Listing {id}: {miss}");
        }

        let detection = self.detector.detect(extraction.listings).await;
        report.persist_error = detection.persist_error;

        if detection.new.is_empty() {
            info!("No new listings found");
            return report;
        }

        info!("Found {} new listings", detection.new.len());
        for listing in &detection.new {
            info!("New listing: {}", listing.summary());
            if self.notifier.deliver(listing).await {
                report.delivered += 1;
                info!("✅ Notification sent via {} for {}", self.notifier.name(), listing.id);
            } else {
                report.failed_deliveries += 1;
                warn!("❌ Notification via {} failed for {}", self.notifier.name(), listing.id);
            }
        }

        report.new_listings = detection.new;
        report
    }
}
