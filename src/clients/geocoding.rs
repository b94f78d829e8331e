use anyhow::{Result, bail};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use crate::config::GeocodingConfig;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Place {
    pub city: Option<String>,
    pub nation: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    formatted_address: Option<String>,
    #[serde(default)]
    address_components: Vec<AddressComponent>,
}

#[derive(Debug, Deserialize)]
struct AddressComponent {
    long_name: String,
    #[serde(default)]
    types: Vec<String>,
}

impl GeocodeResult {
    fn component(&self, kind: &str) -> Option<String> {
        self.address_components
            .iter()
            .find(|c| c.types.iter().any(|t| t == kind))
            .map(|c| c.long_name.clone())
    }

    fn into_place(self) -> Place {
        let city = self
            .component("locality")
            .or_else(|| self.component("administrative_area_level_1"));
        let nation = self.component("country");

        Place {
            city,
            nation,
            address: self.formatted_address,
        }
    }
}

/// Reverse geocoder over the Google Geocoding API.
#[derive(Clone)]
pub struct GeocodingClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GeocodingClient {
    /// Returns `None` when no API key is configured.
    pub fn from_config(config: &GeocodingConfig) -> Result<Option<Self>> {
        let Some(api_key) = config.api_key.clone().filter(|k| !k.is_empty()) else {
            return Ok(None);
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Some(Self {
            client,
            base_url: config.base_url.clone(),
            api_key,
        }))
    }

    pub async fn reverse(&self, lat: f64, lng: f64) -> Result<Option<Place>> {
        let mut url = Url::parse(&self.base_url)?;
        url.query_pairs_mut()
            .append_pair("latlng", &format!("{lat},{lng}"))
            .append_pair("key", &self.api_key);

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            bail!("Geocoding API error: {}", response.status());
        }

        let body: GeocodeResponse = response.json().await?;
        parse_response(body)
    }
}

fn parse_response(body: GeocodeResponse) -> Result<Option<Place>> {
    match body.status.as_str() {
        "OK" => Ok(body.results.into_iter().next().map(GeocodeResult::into_place)),
        "ZERO_RESULTS" => Ok(None),
        other => bail!(
            "Geocoding API returned {other}: {}",
            body.error_message.unwrap_or_default()
        ),
    }
}
