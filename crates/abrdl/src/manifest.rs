use std::path::PathBuf;

use url::Url;

use crate::{
    address::is_absolute_url,
    catalog::RepresentationCatalog,
    error::{AbrError, AbrResult},
    util::http::HttpClient,
};

/// Where the presentation description lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestLocation {
    Remote(Url),
    Local(PathBuf),
}

impl ManifestLocation {
    pub fn parse(location: &str) -> AbrResult<Self> {
        if is_absolute_url(location) && !location.starts_with("file://") {
            Ok(Self::Remote(Url::parse(location)?))
        } else if let Some(path) = location.strip_prefix("file://") {
            Ok(Self::Local(PathBuf::from(path)))
        } else {
            Ok(Self::Local(PathBuf::from(location)))
        }
    }

    pub fn url(&self) -> Option<&Url> {
        match self {
            Self::Remote(url) => Some(url),
            Self::Local(_) => None,
        }
    }

    pub async fn fetch(&self, client: &HttpClient) -> AbrResult<String> {
        match self {
            Self::Remote(url) => {
                let response = client
                    .get(url.as_str())
                    .header("Accept", "application/dash+xml,video/vnd.mpeg.dash.mpd")
                    .send()
                    .await
                    .map_err(|e| AbrError::ManifestFetch(e.to_string()))?;
                if !response.status().is_success() {
                    return Err(AbrError::ManifestFetch(format!(
                        "{url} returned {}",
                        response.status()
                    )));
                }
                response
                    .text()
                    .await
                    .map_err(|e| AbrError::ManifestFetch(e.to_string()))
            }
            Self::Local(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(|e| AbrError::ManifestFetch(format!("{}: {e}", path.display()))),
        }
    }
}

/// Fetches and parses a manifest, then builds the catalog of one of its adaptation sets.
pub async fn load_catalog(
    client: &HttpClient,
    location: &ManifestLocation,
    period_index: usize,
    adaptation_index: usize,
) -> AbrResult<RepresentationCatalog> {
    let text = location.fetch(client).await?;
    let mpd = dash_mpd::parse(&text)?;
    tracing::debug!(
        "Parsed manifest with {} period(s) from {location:?}",
        mpd.periods.len()
    );

    RepresentationCatalog::from_mpd(&mpd, location.url(), period_index, adaptation_index)
}
