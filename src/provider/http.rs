use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::debug;
use url::Url;

use crate::{
    configuration::Config,
    error::Error,
    model::Chain,
    types::{MapData, MapMetadata},
};

use super::GraphProvider;

const MAP_DATA: &str = "map-data";
const MAP_METADATA: &str = "map-metadata";

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug)]
pub struct BubblemapsClient {
    base_url: Url,
    api_key: Option<String>,
    pub http: Client,
}

impl BubblemapsClient {
    pub fn new(config: &Config) -> Result<BubblemapsClient, Error> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()?;

        Ok(BubblemapsClient {
            base_url: base_url(&config.provider_url)?,
            api_key: config.provider_api_key.to_owned(),
            http,
        })
    }

    fn endpoint(&self, path: &str, address: &str, chain: Chain) -> Result<Url, Error> {
        endpoint(&self.base_url, path, address, chain)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        url: Url,
        unauthorized_is_missing_data: bool,
    ) -> Result<T, Error> {
        debug!("GET {}", url);
        let mut request = self.http.get(url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            Error::ProviderUnavailable {
                status: e.status().map(|status| status.as_u16()),
                message: e.to_string(),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body, unauthorized_is_missing_data));
        }

        let body = response.bytes().await.map_err(|e| Error::ProviderUnavailable {
            status: Some(status.as_u16()),
            message: e.to_string(),
        })?;

        serde_json::from_slice(&body).map_err(|e| Error::ProviderPayload(e.to_string()))
    }
}

#[async_trait]
impl GraphProvider for BubblemapsClient {
    async fn fetch_graph(&self, address: &str, chain: Chain) -> Result<MapData, Error> {
        let url = self.endpoint(MAP_DATA, address, chain)?;
        self.get(url, true).await
    }

    async fn fetch_metadata(
        &self,
        address: &str,
        chain: Chain,
    ) -> Result<MapMetadata, Error> {
        let url = self.endpoint(MAP_METADATA, address, chain)?;
        self.get(url, false).await
    }
}

fn base_url(value: &str) -> Result<Url, Error> {
    let mut url = Url::parse(value)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn endpoint(base: &Url, path: &str, address: &str, chain: Chain) -> Result<Url, Error> {
    let mut url = base.join(path)?;
    url.query_pairs_mut()
        .append_pair("token", address)
        .append_pair("chain", chain.as_str());
    Ok(url)
}

fn status_error(status: StatusCode, body: &str, unauthorized_is_missing_data: bool) -> Error {
    if status == StatusCode::UNAUTHORIZED && unauthorized_is_missing_data {
        return Error::ProviderDataUnavailable(String::from(
            "Data not available for this token",
        ));
    }

    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|body| body.message)
        .or_else(|| status.canonical_reason().map(str::to_owned))
        .unwrap_or_else(|| String::from("request failed"));

    Error::ProviderUnavailable {
        status: Some(status.as_u16()),
        message,
    }
}
