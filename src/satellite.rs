use crate::{
    config::SatelliteConfig,
    domain::{Observer, PassPredictor, RawPass},
    errors::EventsError,
};
use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::Deserialize;

/// NORAD catalog number of the ISS.
pub const SATELLITE_ID: u32 = 25544;
/// Prediction window in days.
pub const DAYS: u32 = 5;
pub const MAX_PASSES: u32 = 20;

#[derive(Deserialize, Debug)]
struct VisualPassesResponse {
    // Absent when the API finds no passes.
    #[serde(default)]
    passes: Vec<RawPass>,
}

/// Client for the n2yo.com visual passes endpoint.
pub struct N2yoClient {
    base_url: String,
    api_key: Option<String>,
    client: ReqwestClient,
}

impl N2yoClient {
    pub fn new(config: &SatelliteConfig) -> Self {
        N2yoClient {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client: ReqwestClient::new(),
        }
    }

    fn passes_url(&self, observer: Observer) -> String {
        format!(
            "{}/satellite/visualpasses/{}/{}/{}/{}/{}/{}",
            self.base_url, SATELLITE_ID, observer.lat, observer.lon, observer.alt, DAYS, MAX_PASSES
        )
    }
}

#[async_trait]
impl PassPredictor for N2yoClient {
    async fn visual_passes(&self, observer: Observer) -> Result<Vec<RawPass>, EventsError> {
        let api_key = self.api_key.as_deref().ok_or(EventsError::NotConfigured)?;
        let url = self.passes_url(observer);
        tracing::debug!(%url, "Requesting visual passes");

        let res = self
            .client
            .get(&url)
            .query(&[("apiKey", api_key)])
            .send()
            .await?;
        let status = res.status();
        if !status.is_success() {
            return Err(EventsError::UpstreamStatus(status.as_u16()));
        }

        let body: VisualPassesResponse = res.json().await?;
        tracing::debug!(count = body.passes.len(), "Received visual passes");
        Ok(body.passes)
    }
}
