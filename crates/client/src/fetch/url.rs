//! URL resolution for requests issued by a page.

use url::Url;

/// Schemes the agent and the fetch client will handle.
pub const FETCHABLE_SCHEMES: &[&str] = &["http", "https"];

/// Error type for URL resolution failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Whether a URL uses a transfer scheme we can fetch.
pub fn is_fetchable_scheme(url: &Url) -> bool {
    FETCHABLE_SCHEMES.contains(&url.scheme())
}

/// Resolve a URL the way a page would before issuing a request.
///
/// Steps:
/// 1. Trim leading/trailing whitespace
/// 2. Parse absolute URLs as-is; join anything else onto `base`
/// 3. Remove fragment (#...), which never reaches the network
///
/// Schemes are not checked here; unsupported schemes are the caller's call.
pub fn resolve(input: &str, base: &Url) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            base.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?
        }
        Err(e) => return Err(UrlError::InvalidUrl(e.to_string())),
    };

    parsed.set_fragment(None);

    Ok(parsed)
}
