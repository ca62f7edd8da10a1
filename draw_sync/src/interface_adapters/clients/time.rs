use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::domain::errors::SyncError;
use crate::domain::ports::{DrawSource, TimeSource};
use crate::domain::{DrawHeader, ServerTimeSample};
use crate::interface_adapters::utils::rng::rand_id;

// The PHP endpoints emit numbers as strings in some deployments.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Lenient {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Lenient {
    fn as_i64(&self) -> Option<i64> {
        match self {
            Lenient::Int(value) => Some(*value),
            Lenient::Float(value) if value.is_finite() => Some(value.trunc() as i64),
            Lenient::Float(_) => None,
            Lenient::Text(value) => value.trim().parse().ok(),
        }
    }
}

// Time endpoint payload. Only the fields the estimator needs are modeled.
#[derive(Debug, Deserialize)]
struct GeorgetownTimeResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    georgetown_time: Option<GeorgetownTime>,
    #[serde(default)]
    countdown: Option<Countdown>,
    #[serde(default)]
    next_cycle: Option<NextCycle>,
}

#[derive(Debug, Deserialize)]
struct GeorgetownTime {
    timestamp: Lenient,
    #[serde(default)]
    formatted: String,
}

#[derive(Debug, Deserialize)]
struct Countdown {
    total_seconds_remaining: Lenient,
}

#[derive(Debug, Deserialize)]
struct NextCycle {
    #[serde(default)]
    start_time: Option<String>,
}

impl TryFrom<GeorgetownTimeResponse> for ServerTimeSample {
    type Error = SyncError;

    fn try_from(response: GeorgetownTimeResponse) -> Result<Self, Self::Error> {
        if response.status != "success" {
            let reason = response
                .message
                .unwrap_or_else(|| format!("status {}", response.status));
            return Err(SyncError::Parse(reason));
        }
        let (Some(time), Some(countdown)) = (response.georgetown_time, response.countdown) else {
            return Err(SyncError::Parse(
                "missing georgetown_time or countdown".to_string(),
            ));
        };

        let timestamp_secs = time
            .timestamp
            .as_i64()
            .filter(|secs| DateTime::from_timestamp(*secs, 0).is_some())
            .ok_or_else(|| SyncError::Parse("georgetown_time.timestamp".to_string()))?;
        let seconds_remaining = countdown
            .total_seconds_remaining
            .as_i64()
            .ok_or_else(|| SyncError::Parse("countdown.total_seconds_remaining".to_string()))?;

        Ok(ServerTimeSample {
            timestamp_secs,
            seconds_remaining,
            formatted: time.formatted,
            next_cycle_start: response.next_cycle.and_then(|next| next.start_time),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DrawHeaderResponse {
    current_draw_number: Lenient,
    #[serde(default)]
    draw_numbers: Vec<Lenient>,
}

impl TryFrom<DrawHeaderResponse> for DrawHeader {
    type Error = SyncError;

    fn try_from(response: DrawHeaderResponse) -> Result<Self, Self::Error> {
        let current_draw_number = response
            .current_draw_number
            .as_i64()
            .and_then(|n| u64::try_from(n).ok())
            .ok_or_else(|| SyncError::Parse("currentDrawNumber".to_string()))?;
        // Entries that are not draw numbers are dropped rather than failing the header.
        let draw_numbers = response
            .draw_numbers
            .iter()
            .filter_map(Lenient::as_i64)
            .filter_map(|n| u64::try_from(n).ok())
            .collect();

        Ok(DrawHeader {
            current_draw_number,
            draw_numbers,
        })
    }
}

#[derive(Debug)]
pub enum ClientInitError {
    InvalidUrl(String),
    Http(reqwest::Error),
}

impl fmt::Display for ClientInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientInitError::InvalidUrl(err) => write!(f, "invalid endpoint url: {err}"),
            ClientInitError::Http(err) => write!(f, "http client init failed: {err}"),
        }
    }
}

impl std::error::Error for ClientInitError {}

fn parse_endpoint(endpoint: &str) -> Result<Url, ClientInitError> {
    Url::parse(endpoint).map_err(|e| ClientInitError::InvalidUrl(format!("{endpoint}: {e}")))
}

fn build_http(timeout: Duration) -> Result<reqwest::Client, ClientInitError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(ClientInitError::Http)
}

async fn fetch_json<T: serde::de::DeserializeOwned>(
    http: &reqwest::Client,
    url: Url,
) -> Result<T, SyncError> {
    let response = http
        .get(url)
        .header(reqwest::header::CACHE_CONTROL, "no-cache")
        .send()
        .await
        .map_err(|e| SyncError::Transport(e.to_string()))?;

    if !response.status().is_success() {
        return Err(SyncError::Status(response.status().as_u16()));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| SyncError::Parse(e.to_string()))
}

// Thin reqwest client for the Georgetown time endpoint.
#[derive(Clone)]
pub struct TimeClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl TimeClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, ClientInitError> {
        Ok(Self {
            http: build_http(timeout)?,
            endpoint: parse_endpoint(endpoint)?,
        })
    }

    fn request_url(&self) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("t", &rand_id().to_string());
        url
    }
}

#[async_trait]
impl TimeSource for TimeClient {
    async fn fetch_time(&self) -> Result<ServerTimeSample, SyncError> {
        let response: GeorgetownTimeResponse = fetch_json(&self.http, self.request_url()).await?;
        ServerTimeSample::try_from(response)
    }
}

// Thin reqwest client for the backend draw header.
#[derive(Clone)]
pub struct DrawHeaderClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl DrawHeaderClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, ClientInitError> {
        Ok(Self {
            http: build_http(timeout)?,
            endpoint: parse_endpoint(endpoint)?,
        })
    }

    fn request_url(&self) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("ajax", "1")
            .append_pair("t", &rand_id().to_string());
        url
    }
}

#[async_trait]
impl DrawSource for DrawHeaderClient {
    async fn fetch_draw_header(&self) -> Result<DrawHeader, SyncError> {
        let response: DrawHeaderResponse = fetch_json(&self.http, self.request_url()).await?;
        DrawHeader::try_from(response)
    }
}
