use crate::error::{Result, VislensError};
use crate::image::handle::ImageHandle;
use crate::image::source::ImageSource;
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};

/// Anything that can turn an [`ImageSource`] into an [`ImageHandle`]
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, source: &ImageSource) -> Result<ImageHandle>;
}

/// Loads images from the local filesystem or over HTTP
pub struct ImageLoader {
    client: Client,
}

impl ImageLoader {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: Client::builder().build()?,
        })
    }

    async fn fetch_file(&self, path: &std::path::Path) -> Result<ImageHandle> {
        let bytes = tokio::fs::read(path).await?;
        ImageHandle::from_bytes(&bytes, None, path.display().to_string())
    }

    async fn fetch_url(&self, url: &str) -> Result<ImageHandle> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(VislensError::ImageError(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        let declared = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let bytes = response.bytes().await?;

        ImageHandle::from_bytes(&bytes, declared.as_deref(), url)
    }
}

#[async_trait]
impl ImageFetcher for ImageLoader {
    async fn fetch(&self, source: &ImageSource) -> Result<ImageHandle> {
        debug!("Loading image from {}", source);
        match source {
            ImageSource::File(path) => self.fetch_file(path).await,
            ImageSource::Url(url) => self.fetch_url(url).await,
        }
    }
}

/// Try each source in order and return the first image that loads.
pub async fn load_first(
    fetcher: &dyn ImageFetcher,
    sources: &[ImageSource],
) -> Option<ImageHandle> {
    for source in sources {
        match fetcher.fetch(source).await {
            Ok(handle) => {
                info!("Loaded default image from {}", source);
                return Some(handle);
            }
            Err(e) => warn!("Default image unavailable at {}: {}", source, e),
        }
    }
    None
}
