//! HTTP access to the CO-OPS "datagetter" service.

use crate::obs_data::error::ObsDataError;
use crate::obs_data::parse::ProductResponse;
use crate::types::date_window::DateWindow;
use crate::types::variable::Units;
use log::{info, warn};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::fmt;

const DEFAULT_BASE_URL: &str = "https://api.tidesandcurrents.noaa.gov/api/prod/datagetter";

// Fixed query parameters: mean sea level datum, local standard time.
const DATUM: &str = "MSL";
const TIME_ZONE: &str = "lst";
const APPLICATION: &str = "tidestore";

/// The upstream products this crate ingests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Product {
    /// Verified hourly water levels.
    HourlyHeight,
    /// Six-minute wind speed, gust and direction.
    Wind,
    /// Verified daily high/low water levels, served as CSV.
    HighLow,
}

impl Product {
    pub(crate) fn query_value(&self) -> &'static str {
        match self {
            Product::HourlyHeight => "hourly_height",
            Product::Wind => "wind",
            Product::HighLow => "high_low",
        }
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.query_value())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResponseFormat {
    Json,
    Csv,
}

impl ResponseFormat {
    fn query_value(&self) -> &'static str {
        match self {
            ResponseFormat::Json => "json",
            ResponseFormat::Csv => "csv",
        }
    }
}

/// Thin client over the datagetter endpoint. The base URL is overridable so
/// tests can point it at a local server.
pub struct CoopsClient {
    http: Client,
    base_url: String,
}

impl CoopsClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        CoopsClient {
            http: Client::new(),
            base_url: base_url.into(),
        }
    }

    pub(crate) fn request_url(
        &self,
        window: &DateWindow,
        station: &str,
        product: Product,
        units: Units,
        format: ResponseFormat,
    ) -> String {
        format!(
            "{}?begin_date={}&end_date={}&station={}&product={}&datum={}&units={}&time_zone={}&application={}&format={}",
            self.base_url,
            window.begin_param(),
            window.end_param(),
            station,
            product.query_value(),
            DATUM,
            units.query_value(),
            TIME_ZONE,
            APPLICATION,
            format.query_value(),
        )
    }

    pub(crate) async fn fetch_text(&self, url: &str) -> Result<String, ObsDataError> {
        info!("Fetching {}", url);
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ObsDataError::NetworkRequest(url.to_string(), e))?;
        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!("HTTP error for {}: {:?}", url, e);
                return Err(if let Some(status) = e.status() {
                    ObsDataError::HttpStatus {
                        url: url.to_string(),
                        status,
                        source: e,
                    }
                } else {
                    ObsDataError::NetworkRequest(url.to_string(), e)
                });
            }
        };
        response
            .text()
            .await
            .map_err(|e| ObsDataError::BodyRead(url.to_string(), e))
    }

    /// Fetches one window of a JSON product and decodes its envelope.
    pub(crate) async fn fetch_window<T: DeserializeOwned>(
        &self,
        window: &DateWindow,
        station: &str,
        product: Product,
        units: Units,
    ) -> Result<ProductResponse<T>, ObsDataError> {
        let url = self.request_url(window, station, product, units, ResponseFormat::Json);
        let body = self.fetch_text(&url).await?;
        serde_json::from_str(&body).map_err(|e| ObsDataError::JsonParse {
            product: product.query_value(),
            source: e,
        })
    }

    /// Fetches one window of the high/low product as raw CSV text.
    pub(crate) async fn fetch_window_csv(
        &self,
        window: &DateWindow,
        station: &str,
        units: Units,
    ) -> Result<String, ObsDataError> {
        let url = self.request_url(window, station, Product::HighLow, units, ResponseFormat::Csv);
        self.fetch_text(&url).await
    }
}

impl Default for CoopsClient {
    fn default() -> Self {
        Self::new()
    }
}
