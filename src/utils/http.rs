// src/utils/http.rs
use reqwest::Url;
use std::time::Duration;

use crate::errors::{TrackingError, TrackingResult};

/// Parses the API base URL. It must be absolute http(s).
pub fn parse_base_url(raw: &str) -> TrackingResult<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| TrackingError::InvalidUrl(format!("{}: {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(TrackingError::InvalidUrl(format!("unsupported scheme '{}' in {}", other, raw)));
        }
    }
    if url.cannot_be_a_base() {
        return Err(TrackingError::InvalidUrl(format!("{} cannot be used as a base URL", raw)));
    }
    Ok(url)
}

/// Appends path segments to `base`, percent-encoding each one.
///
/// A trailing slash on the base is dropped first, so `http://host/api/` and
/// `http://host/api` resolve identically.
pub fn endpoint_url(base: &Url, segments: &[&str]) -> TrackingResult<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| TrackingError::InvalidUrl(format!("{} cannot be used as a base URL", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

pub fn build_client(request_timeout: Duration) -> TrackingResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(request_timeout)
        .build()
        .map_err(|e| TrackingError::HttpClient(e.to_string()))
}
