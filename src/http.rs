//! HTTP reverse-geocoder client.
//!
//! A [`ReverseGeocoder`] implementation backed by a Nominatim-style
//! `/reverse` endpoint. The engine only ever sees the [`Placemark`] this
//! client produces; provider-specific response shape stays in here.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{Result, TrackError};
use crate::sources::{Placemark, ReverseGeocoder};

const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org";
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Response body for the `/reverse` endpoint (jsonv2 format).
#[derive(Debug, Deserialize)]
struct ReverseResponse {
    name: Option<String>,
    address: Option<ReverseAddress>,
}

#[derive(Debug, Deserialize)]
struct ReverseAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
}

impl ReverseAddress {
    fn locality(self) -> Option<String> {
        self.city.or(self.town).or(self.village)
    }
}

/// Reverse geocoder backed by an HTTP endpoint.
pub struct RemoteGeocoder {
    client: Client,
    base_url: String,
}

impl RemoteGeocoder {
    /// Create a client against the default public endpoint.
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a client against a custom endpoint (self-hosted instance,
    /// test server).
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(concat!("waytrack/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ReverseGeocoder for RemoteGeocoder {
    async fn lookup(&self, latitude: f64, longitude: f64) -> Result<Placemark> {
        let url = format!("{}/reverse", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("format", "jsonv2")])
            .query(&[("lat", latitude), ("lon", longitude)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TrackError::Http(format!("reverse geocode returned {}", status)));
        }

        let body: ReverseResponse = response.json().await?;
        debug!(
            "[RemoteGeocoder] ({:.4}, {:.4}) -> name={:?}",
            latitude, longitude, body.name
        );

        Ok(Placemark {
            name: body.name,
            locality: body.address.and_then(ReverseAddress::locality),
        })
    }
}
