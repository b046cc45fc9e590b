//! Card swipe types

use reqwest::Url;
use serde::Serialize;

/// Error returned when the configured login URL cannot be parsed
pub type UrlParseError = <Url as std::str::FromStr>::Err;

/// Maximum number of characters kept from a decoded frame payload
pub const CARD_ID_MAX_LEN: usize = 8;

/// Card identifier decoded from a reader frame (at most 8 characters)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CardIdentifier(String);

impl CardIdentifier {
    /// Build an identifier from raw payload characters, truncating to
    /// [`CARD_ID_MAX_LEN`] characters.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        match raw.char_indices().nth(CARD_ID_MAX_LEN) {
            Some((cut, _)) => Self(raw[..cut].to_string()),
            None => Self(raw),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for CardIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A swipe that should move the kiosk UI to the login page for this card
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardSwipeEvent {
    pub card_id: CardIdentifier,
    pub kiosk_id: String,
}

impl CardSwipeEvent {
    pub fn new(card_id: CardIdentifier, kiosk_id: impl Into<String>) -> Self {
        Self { card_id, kiosk_id: kiosk_id.into() }
    }

    /// Render the login URL carrying `rfCardNo` and `kioskId` query parameters
    pub fn login_url(&self, base: &str) -> Result<Url, UrlParseError> {
        Url::parse_with_params(
            base,
            &[("rfCardNo", self.card_id.as_str()), ("kioskId", self.kiosk_id.as_str())],
        )
    }
}
