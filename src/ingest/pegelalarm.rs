/// pegelalarm station list API client.
///
/// Handles URL construction, the HTTP round trip and envelope validation
/// for the list endpoint:
///   https://api.pegelalarm.at/api/station/1.0/list
///
/// The endpoint answers with `{status:{code}, payload:{stations:[...]}}`.
/// See `fixtures.rs` for annotated examples of the response structure.

use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::config::SlotConfig;
use crate::model::{FetchError, StationRecord};

// ---------------------------------------------------------------------------
// Serde structures for the response envelope
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ListResponse {
    status: ApiStatus,
    payload: Payload,
}

#[derive(Deserialize)]
struct ApiStatus {
    #[serde(deserialize_with = "code_as_text")]
    code: String,
}

#[derive(Deserialize)]
struct Payload {
    stations: Vec<StationRecord>,
}

/// `status.code` has been seen both as `"200"` and as `200`.
fn code_as_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let raw = serde_json::Value::deserialize(deserializer)?;
    match raw {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("unexpected status code {}", other))),
    }
}

// ---------------------------------------------------------------------------
// URL construction
// ---------------------------------------------------------------------------

pub const LIST_URL: &str = "https://api.pegelalarm.at/api/station/1.0/list";

/// Builds the list URL for one slot.
///
/// `countryCode` is always present; `qRegion`, `qWater` and `qStationName`
/// are appended only when the trimmed filter is non-empty. Values are
/// percent-encoded.
///
/// # Example
/// ```
/// use pegel_service::config::SlotConfig;
/// use pegel_service::ingest::pegelalarm::{build_list_url, LIST_URL};
///
/// let slot = SlotConfig { water: "Donau".into(), ..Default::default() };
/// assert_eq!(
///     build_list_url(LIST_URL, "AT", &slot),
///     "https://api.pegelalarm.at/api/station/1.0/list?countryCode=AT&qWater=Donau",
/// );
/// ```
pub fn build_list_url(base_url: &str, country: &str, slot: &SlotConfig) -> String {
    let mut url = format!("{}?countryCode={}", base_url, urlencoding::encode(country.trim()));

    let filters = [
        ("qRegion", &slot.region),
        ("qWater", &slot.water),
        ("qStationName", &slot.stationname),
    ];
    for (param, value) in filters {
        let value = value.trim();
        if !value.is_empty() {
            url.push_str(&format!("&{}={}", param, urlencoding::encode(value)));
        }
    }

    url
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Validates an HTTP reply and extracts the station list.
///
/// # Errors
/// - `FetchError::HttpStatus` - HTTP status other than 200.
/// - `FetchError::MalformedEnvelope` - body is not the expected envelope.
/// - `FetchError::ApiStatus` - envelope carries a `status.code` other than "200".
pub fn parse_list_response(status: u16, body: &str) -> Result<Vec<StationRecord>, FetchError> {
    if status != 200 {
        return Err(FetchError::HttpStatus(status));
    }

    let response: ListResponse = serde_json::from_str(body)
        .map_err(|e| FetchError::MalformedEnvelope(e.to_string()))?;

    if response.status.code != "200" {
        return Err(FetchError::ApiStatus(response.status.code));
    }

    Ok(response.payload.stations)
}

/// Narrows a multi-station answer to exact (case-sensitive) name matches.
///
/// The API's `qStationName` is a fuzzy search; a single hit is kept as-is.
pub fn filter_by_station_name(stations: Vec<StationRecord>, name: &str) -> Vec<StationRecord> {
    let name = name.trim();
    if name.is_empty() || stations.len() <= 1 {
        return stations;
    }
    stations
        .into_iter()
        .filter(|s| s.station_name.as_deref() == Some(name))
        .collect()
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Raw HTTP answer: status and body text.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

/// Issues a GET and hands back the raw reply. Only network-level failures
/// are errors here; status handling belongs to `parse_list_response`.
pub trait Transport {
    fn get(&self, url: &str) -> Result<HttpReply, FetchError>;
}

/// Blocking reqwest client used in production.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pegel_service/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<HttpReply, FetchError> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Ok(HttpReply { status, body })
    }
}

// ---------------------------------------------------------------------------
// Fetch
// ---------------------------------------------------------------------------

/// Fetches the station list for one slot: build URL, GET, validate, filter.
pub fn fetch_stations(
    transport: &dyn Transport,
    base_url: &str,
    country: &str,
    slot: &SlotConfig,
) -> Result<Vec<StationRecord>, FetchError> {
    let url = build_list_url(base_url, country, slot);
    let reply = transport.get(&url)?;
    let stations = parse_list_response(reply.status, &reply.body)?;
    Ok(filter_by_station_name(stations, &slot.stationname))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
