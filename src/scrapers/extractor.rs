use crate::error::{CardError, FieldError, SelectorError};
use crate::models::{listing_id, Listing, PRICE_NOT_FOUND};
use crate::scrapers::types::{CompiledSelectors, SelectorSet};
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::debug;
use url::Url;

const ROOMS_MARKER: &str = "rm.";
const SIZE_PREFIX: &str = "of";
const SIZE_SUFFIX: &str = "m²";

/// Everything learned from one results document
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Listings in document order, known ones included
    pub listings: Vec<Listing>,
    /// Cards that were skipped
    pub card_errors: Vec<CardError>,
    /// Fields that fell back to null or the price sentinel, keyed by listing id
    pub field_misses: Vec<(String, FieldError)>,
    /// Name of the card strategy that matched, if any did
    pub strategy: Option<&'static str>,
}

/// Turns a search results page into listing records
#[derive(Debug)]
pub struct ListingExtractor {
    selectors: CompiledSelectors,
    origin: Url,
}

impl ListingExtractor {
    /// Create an extractor; `origin` absolutizes relative links
    pub fn new(selectors: &SelectorSet, origin: Url) -> Result<Self, SelectorError> {
        Ok(Self {
            selectors: CompiledSelectors::compile(selectors)?,
            origin,
        })
    }

    /// Extract every card, stamping listings with the current time
    pub fn extract(&self, html: &str, known: &HashSet<String>) -> Extraction {
        self.extract_at(html, known, Utc::now())
    }

    /// Extract every card in `html`.
    ///
    /// Cards whose id is in `known` only get their identity filled in. Output
    /// depends on nothing but the arguments.
    pub fn extract_at(
        &self,
        html: &str,
        known: &HashSet<String>,
        found_at: DateTime<Utc>,
    ) -> Extraction {
        let document = Html::parse_document(html);
        let mut extraction = Extraction::default();

        let Some((strategy, cards)) = self.find_cards(&document) else {
            debug!("No card strategy matched");
            return extraction;
        };
        extraction.strategy = Some(strategy);
        debug!("Strategy {} matched {} cards", strategy, cards.len());

        for (index, card) in cards.into_iter().enumerate() {
            let url = match self.card_url(index, card) {
                Ok(url) => url,
                Err(e) => {
                    extraction.card_errors.push(e);
                    continue;
                }
            };

            if known.contains(&listing_id(&url)) {
                extraction.listings.push(Listing::bare(url, found_at));
                continue;
            }

            let (listing, misses) = self.read_card(card, url, found_at);
            extraction
                .field_misses
                .extend(misses.into_iter().map(|m| (listing.id.clone(), m)));
            extraction.listings.push(listing);
        }

        extraction
    }

    /// First card strategy with at least one match
    fn find_cards<'a>(&self, document: &'a Html) -> Option<(&'static str, Vec<ElementRef<'a>>)> {
        self.selectors.cards.iter().find_map(|(name, selector)| {
            let cards: Vec<_> = document.select(selector).collect();
            (!cards.is_empty()).then_some((*name, cards))
        })
    }

    fn card_url(&self, index: usize, card: ElementRef) -> Result<String, CardError> {
        let href = card
            .value()
            .attr("href")
            .or_else(|| {
                card.select(&self.selectors.link)
                    .next()
                    .and_then(|a| a.value().attr("href"))
            })
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .ok_or(CardError::MissingLink { index })?;

        self.absolutize(href).map_err(|reason| CardError::BadLink {
            index,
            href: href.to_string(),
            reason,
        })
    }

    fn absolutize(&self, href: &str) -> Result<String, String> {
        if href.starts_with("http://") || href.starts_with("https://") {
            return Ok(href.to_string());
        }
        self.origin
            .join(href)
            .map(String::from)
            .map_err(|e| e.to_string())
    }

    fn read_card(
        &self,
        card: ElementRef,
        url: String,
        found_at: DateTime<Utc>,
    ) -> (Listing, Vec<FieldError>) {
        let mut misses = Vec::new();
        let mut listing = Listing::bare(url, found_at);

        match first_text(card, &self.selectors.title, "title").and_then(|t| rooms_and_size(&t)) {
            Ok((rooms, size)) => {
                listing.rooms = Some(rooms);
                listing.size_m2 = Some(size);
            }
            Err(e) => misses.push(e),
        }

        match first_text(card, &self.selectors.address, "address") {
            Ok(text) => {
                let (city, street) = split_address(&text);
                listing.city = city;
                listing.street = street;
            }
            Err(e) => misses.push(e),
        }

        match first_text(card, &self.selectors.price, "price") {
            Ok(price) => listing.price = price,
            Err(e) => {
                listing.price = PRICE_NOT_FOUND.to_string();
                misses.push(e);
            }
        }

        match self.image_url(card) {
            Ok(src) => listing.image_url = Some(src),
            Err(e) => misses.push(e),
        }

        match first_text(card, &self.selectors.age, "listing_age") {
            Ok(age) => listing.listing_age = Some(age),
            Err(e) => misses.push(e),
        }

        (listing, misses)
    }

    fn image_url(&self, card: ElementRef) -> Result<String, FieldError> {
        let img = first_match(card, &self.selectors.image)
            .ok_or(FieldError::Missing { field: "image" })?;
        let src = img
            .value()
            .attr("src")
            .or_else(|| img.value().attr("data-src"))
            .map(str::trim)
            .filter(|src| !src.is_empty())
            .ok_or(FieldError::Missing { field: "image" })?;

        self.absolutize(src).map_err(|_| FieldError::Unparseable {
            field: "image",
            text: src.to_string(),
        })
    }
}

fn first_match<'a>(card: ElementRef<'a>, selectors: &[Selector]) -> Option<ElementRef<'a>> {
    selectors.iter().find_map(|s| card.select(s).next())
}

/// Whitespace-collapsed text of the first matching node, if it has any
fn first_text(
    card: ElementRef,
    selectors: &[Selector],
    field: &'static str,
) -> Result<String, FieldError> {
    let node = first_match(card, selectors).ok_or(FieldError::Missing { field })?;
    let text = collapse(node);
    if text.is_empty() {
        Err(FieldError::Missing { field })
    } else {
        Ok(text)
    }
}

fn collapse(node: ElementRef) -> String {
    node.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split "3 rm. apartment of 85 m²" into ("3 rm.", "85").
///
/// Both parts or neither: a title missing either delimiter yields an error.
fn rooms_and_size(title: &str) -> Result<(String, String), FieldError> {
    let unparseable = || FieldError::Unparseable {
        field: "title",
        text: title.to_string(),
    };

    let (rooms, rest) = title.split_once(ROOMS_MARKER).ok_or_else(unparseable)?;
    let rooms = rooms.trim();
    if rooms.is_empty() {
        return Err(unparseable());
    }

    let after_of = after_size_prefix(rest).ok_or_else(unparseable)?;
    let (size, _) = after_of.split_once(SIZE_SUFFIX).ok_or_else(unparseable)?;
    let size = size.trim();
    if size.is_empty() {
        return Err(unparseable());
    }

    Ok((format!("{rooms} {ROOMS_MARKER}"), size.to_string()))
}

/// Text following the first standalone "of" (not one inside a word like "loft")
fn after_size_prefix(text: &str) -> Option<&str> {
    text.match_indices(SIZE_PREFIX).find_map(|(at, _)| {
        let before = text[..at].chars().next_back();
        let rest = &text[at + SIZE_PREFIX.len()..];
        let after = rest.chars().next();
        let starts_word = before.map_or(true, char::is_whitespace);
        let ends_word = after.is_some_and(|c| c.is_whitespace() || c.is_ascii_digit());
        (starts_word && ends_word).then_some(rest)
    })
}

/// "København Ø, Jagtvej 12" becomes city and street; no comma means no street
fn split_address(text: &str) -> (Option<String>, Option<String>) {
    let (city, street) = match text.split_once(',') {
        Some((city, street)) => (city, Some(street)),
        None => (text, None),
    };
    let non_empty = |s: &str| {
        let s = s.trim();
        (!s.is_empty()).then(|| s.to_string())
    };
    (non_empty(city), street.and_then(non_empty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn extractor() -> ListingExtractor {
        ListingExtractor::new(
            &SelectorSet::boligportal(),
            Url::parse("https://www.boligportal.dk").unwrap(),
        )
        .unwrap()
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn card(href: &str, inner: &str) -> String {
        format!(r#"<a class="AdCardSrp__Link" href="{href}">{inner}</a>"#)
    }

    const FULL_CARD: &str = r#"
        <img class="css-1yrtl0o" src="https://images.boligportal.dk/1.jpg">
        <span class="css-a76tvl">3 rm. apartment of 85 m²</span>
        <span class="css-avmlqd">København Ø, Jagtvej 12</span>
        <span class="css-dlcfcd">12.500 kr.</span>
        <span class="css-14yggbm">2 hours ago</span>
    "#;

    fn page(cards: &[String]) -> String {
        format!("<html><body><div class=\"results\">{}</div></body></html>", cards.concat())
    }

    #[test]
    fn reads_every_field_of_a_full_card() {
        let html = page(&[card("/lejligheder/koebenhavn/id-5234711/", FULL_CARD)]);
        let out = extractor().extract_at(&html, &HashSet::new(), at());

        assert_eq!(out.strategy, Some("ad-card-link"));
        assert!(out.field_misses.is_empty());
        let listing = &out.listings[0];
        assert_eq!(listing.id, "5234711");
        assert_eq!(listing.url, "https://www.boligportal.dk/lejligheder/koebenhavn/id-5234711/");
        assert_eq!(listing.rooms.as_deref(), Some("3 rm."));
        assert_eq!(listing.size_m2.as_deref(), Some("85"));
        assert_eq!(listing.city.as_deref(), Some("København Ø"));
        assert_eq!(listing.street.as_deref(), Some("Jagtvej 12"));
        assert_eq!(listing.price, "12.500 kr.");
        assert_eq!(listing.image_url.as_deref(), Some("https://images.boligportal.dk/1.jpg"));
        assert_eq!(listing.listing_age.as_deref(), Some("2 hours ago"));
        assert_eq!(listing.found_at, at());
    }

    #[test]
    fn missing_price_uses_sentinel() {
        let inner = FULL_CARD.replace(r#"<span class="css-dlcfcd">12.500 kr.</span>"#, "");
        let html = page(&[card("/x/id-1/", &inner)]);
        let out = extractor().extract_at(&html, &HashSet::new(), at());

        assert_eq!(out.listings[0].price, PRICE_NOT_FOUND);
        assert!(out
            .field_misses
            .contains(&("1".to_string(), FieldError::Missing { field: "price" })));
    }

    #[test]
    fn missing_image_does_not_abort_batch() {
        let no_image = FULL_CARD.replace(
            r#"<img class="css-1yrtl0o" src="https://images.boligportal.dk/1.jpg">"#,
            "",
        );
        let html = page(&[card("/x/id-1/", &no_image), card("/x/id-2/", FULL_CARD)]);
        let out = extractor().extract_at(&html, &HashSet::new(), at());

        assert_eq!(out.listings.len(), 2);
        assert_eq!(out.listings[0].image_url, None);
        assert!(out.listings[1].image_url.is_some());
    }

    #[test]
    fn unparseable_title_nulls_both_rooms_and_size() {
        let inner = FULL_CARD.replace("3 rm. apartment of 85 m²", "3 rm. apartment");
        let html = page(&[card("/x/id-1/", &inner)]);
        let listing = &extractor().extract_at(&html, &HashSet::new(), at()).listings[0];

        assert_eq!(listing.rooms, None);
        assert_eq!(listing.size_m2, None);
        assert_eq!(listing.city.as_deref(), Some("København Ø"));
    }

    #[test]
    fn card_without_link_is_skipped_and_siblings_survive() {
        let html = page(&[
            r#"<a class="AdCardSrp__Link"><span class="css-dlcfcd">1 kr.</span></a>"#.to_string(),
            card("/x/id-2/", FULL_CARD),
        ]);
        let out = extractor().extract_at(&html, &HashSet::new(), at());

        assert_eq!(out.card_errors, vec![CardError::MissingLink { index: 0 }]);
        assert_eq!(out.listings.len(), 1);
        assert_eq!(out.listings[0].id, "2");
    }

    #[test]
    fn falls_back_to_later_strategy() {
        let html = r#"<div><a class="SomethingElse" href="https://www.boligportal.dk/v/id-77/">
            <span class="css-dlcfcd">9.000 kr.</span></a></div>"#;
        let out = extractor().extract_at(html, &HashSet::new(), at());

        assert_eq!(out.strategy, Some("id-href"));
        assert_eq!(out.listings[0].id, "77");
        assert_eq!(out.listings[0].price, "9.000 kr.");
    }

    #[test]
    fn no_cards_yields_empty_extraction() {
        let out = extractor().extract_at("<html><body><p>Ingen boliger</p></body></html>", &HashSet::new(), at());
        assert!(out.listings.is_empty());
        assert_eq!(out.strategy, None);
    }

    #[test]
    fn known_cards_keep_identity_only() {
        let html = page(&[card("/x/id-1/", FULL_CARD)]);
        let known: HashSet<String> = ["1".to_string()].into_iter().collect();
        let out = extractor().extract_at(&html, &known, at());

        assert_eq!(out.listings[0].id, "1");
        assert_eq!(out.listings[0].rooms, None);
        assert!(out.field_misses.is_empty());
    }

    #[test]
    fn extraction_is_repeatable() {
        let html = page(&[
            card("/x/id-1/", FULL_CARD),
            card("/x/id-2/", "<span>nothing useful</span>"),
            card("https://www.boligportal.dk/x/other/", FULL_CARD),
        ]);
        let ex = extractor();
        let first = ex.extract_at(&html, &HashSet::new(), at());
        let second = ex.extract_at(&html, &HashSet::new(), at());

        assert_eq!(first.listings, second.listings);
        assert_eq!(first.listings[2].id, "https://www.boligportal.dk/x/other/");
    }

    #[test]
    fn link_inside_wrapper_card_is_used() {
        let mut set = SelectorSet::boligportal();
        set.cards.insert(
            0,
            crate::scrapers::types::CardStrategy {
                name: "article",
                pattern: "article.card",
            },
        );
        let ex = ListingExtractor::new(&set, Url::parse("https://www.boligportal.dk").unwrap()).unwrap();
        let html = r#"<article class="card"><a href="/r/id-9/">link</a></article>"#;
        let out = ex.extract_at(html, &HashSet::new(), at());

        assert_eq!(out.strategy, Some("article"));
        assert_eq!(out.listings[0].url, "https://www.boligportal.dk/r/id-9/");
    }

    #[test]
    fn rooms_and_size_parsing() {
        assert_eq!(
            rooms_and_size("2 rm. apartment of 54 m²").unwrap(),
            ("2 rm.".to_string(), "54".to_string())
        );
        assert!(rooms_and_size("Room of 12 m²").is_err());
        assert!(rooms_and_size("2 rm. house").is_err());
        assert!(rooms_and_size("rm. of 3 m²").is_err());
        assert!(rooms_and_size("2 rm. loft 50 m²").is_err());
        assert!(rooms_and_size("2 rm. rooftop 50 m²").is_err());
        assert_eq!(
            rooms_and_size("1 rm. loft of 38 m²").unwrap(),
            ("1 rm.".to_string(), "38".to_string())
        );
        assert_eq!(
            rooms_and_size("4 rm. house of120 m²").unwrap(),
            ("4 rm.".to_string(), "120".to_string())
        );
    }

    #[test]
    fn address_splitting() {
        assert_eq!(
            split_address("Aarhus C, Nørregade 3, 2. th"),
            (Some("Aarhus C".into()), Some("Nørregade 3, 2. th".into()))
        );
        assert_eq!(split_address("Odense"), (Some("Odense".into()), None));
        assert_eq!(split_address("Odense, "), (Some("Odense".into()), None));
    }
}
