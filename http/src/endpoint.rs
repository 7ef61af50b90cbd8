//! Base URL handling for collaborator services.

use crate::ClientError;
use reqwest::Url;

/// Base URL of a collaborator service.
///
/// Path segments appended through [`ServiceEndpoint::url`] are percent-encoded,
/// so identifiers containing `/` or spaces cannot escape their segment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceEndpoint {
    base: Url,
}

impl ServiceEndpoint {
    /// Parse a base URL such as `http://drivers:8004` or `http://gateway/drivers/`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidBaseUrl`] if the URL does not parse or
    /// cannot carry a path (e.g. `mailto:`).
    pub fn parse(base: &str) -> Result<Self, ClientError> {
        let url = Url::parse(base).map_err(|e| ClientError::InvalidBaseUrl {
            url: base.to_string(),
            reason: e.to_string(),
        })?;

        if url.cannot_be_a_base() {
            return Err(ClientError::InvalidBaseUrl {
                url: base.to_string(),
                reason: "URL cannot carry a path".to_string(),
            });
        }

        Ok(Self { base: url })
    }

    /// Build the URL for `segments` below the base path.
    #[must_use]
    pub fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn appends_segments_to_bare_host() {
        let endpoint = ServiceEndpoint::parse("http://drivers:8004").unwrap();
        assert_eq!(
            endpoint.url(&["v1", "drivers", "available"]).as_str(),
            "http://drivers:8004/v1/drivers/available"
        );
    }

    #[test]
    fn keeps_base_path_and_ignores_trailing_slash() {
        let endpoint = ServiceEndpoint::parse("http://gateway/rides-api/").unwrap();
        assert_eq!(
            endpoint.url(&["v1", "rides", "r1", "assign"]).as_str(),
            "http://gateway/rides-api/v1/rides/r1/assign"
        );
    }

    #[test]
    fn encodes_identifiers() {
        let endpoint = ServiceEndpoint::parse("http://rides:8003").unwrap();
        assert_eq!(
            endpoint.url(&["v1", "rides", "a/b c", "assign"]).as_str(),
            "http://rides:8003/v1/rides/a%2Fb%20c/assign"
        );
    }

    #[test]
    fn rejects_unusable_urls() {
        assert!(ServiceEndpoint::parse("not a url").is_err());
        assert!(ServiceEndpoint::parse("mailto:ops@example.com").is_err());
    }
}
