use crate::error::SelectorError;
use scraper::Selector;

/// One way of locating listing cards in a results page
#[derive(Debug, Clone)]
pub struct CardStrategy {
    /// Label used in logs when this strategy is the one that matched
    pub name: &'static str,
    /// CSS pattern matching one element per card
    pub pattern: &'static str,
}

/// Ordered selector patterns for cards and for each field inside a card.
///
/// Every list is tried front to back and the first pattern that matches wins,
/// so newer markup goes first and older or more generic patterns follow.
#[derive(Debug, Clone)]
pub struct SelectorSet {
    pub cards: Vec<CardStrategy>,
    pub title: Vec<&'static str>,
    pub address: Vec<&'static str>,
    pub price: Vec<&'static str>,
    pub image: Vec<&'static str>,
    pub age: Vec<&'static str>,
}

impl SelectorSet {
    /// Patterns for boligportal.dk search results
    pub fn boligportal() -> Self {
        Self {
            cards: vec![
                CardStrategy {
                    name: "ad-card-link",
                    pattern: "a.AdCardSrp__Link",
                },
                CardStrategy {
                    name: "ad-card-class",
                    pattern: r#"a[class*="AdCardSrp"]"#,
                },
                CardStrategy {
                    name: "id-href",
                    pattern: r#"a[href*="/id-"]"#,
                },
            ],
            title: vec!["span.css-a76tvl", r#"[class*="AdCardSrp__Title"]"#],
            address: vec!["span.css-avmlqd", r#"[class*="AdCardSrp__Address"]"#],
            price: vec!["span.css-dlcfcd", r#"[class*="AdCardSrp__Price"]"#],
            image: vec!["img.css-1yrtl0o", "img"],
            age: vec!["span.css-14yggbm", r#"[class*="AdCardSrp__Age"]"#],
        }
    }
}

impl Default for SelectorSet {
    fn default() -> Self {
        Self::boligportal()
    }
}

/// A `SelectorSet` with every pattern parsed
#[derive(Debug)]
pub(crate) struct CompiledSelectors {
    pub cards: Vec<(&'static str, Selector)>,
    pub title: Vec<Selector>,
    pub address: Vec<Selector>,
    pub price: Vec<Selector>,
    pub image: Vec<Selector>,
    pub age: Vec<Selector>,
    pub link: Selector,
}

impl CompiledSelectors {
    pub fn compile(set: &SelectorSet) -> Result<Self, SelectorError> {
        Ok(Self {
            cards: set
                .cards
                .iter()
                .map(|s| parse(s.pattern).map(|sel| (s.name, sel)))
                .collect::<Result<_, _>>()?,
            title: parse_all(&set.title)?,
            address: parse_all(&set.address)?,
            price: parse_all(&set.price)?,
            image: parse_all(&set.image)?,
            age: parse_all(&set.age)?,
            link: parse("a[href]")?,
        })
    }
}

fn parse(pattern: &str) -> Result<Selector, SelectorError> {
    Selector::parse(pattern).map_err(|e| SelectorError {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

fn parse_all(patterns: &[&'static str]) -> Result<Vec<Selector>, SelectorError> {
    patterns.iter().map(|p| parse(p)).collect()
}
