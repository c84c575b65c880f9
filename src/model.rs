/// Core data types for the pegelalarm station service.
///
/// This module defines the shared domain model imported by all other modules:
/// the station records returned by the pegelalarm list API, the compact
/// per-station summary written back as JSON, and the fetch error taxonomy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Measurement types
// ---------------------------------------------------------------------------

/// Measurement type label carrying the water level in centimetres.
pub const MEASUREMENT_HEIGHT_CM: &str = "height in cm";

/// A single measurement attached to a station record.
///
/// Dates arrive as `DD.MM.YYYY...` strings and are reordered before
/// parsing; see `reconcile::reorder_date`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Measurement {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub value: Option<f64>,
    #[serde(rename = "sourceDate")]
    pub source_date: Option<String>,
    #[serde(rename = "requestDate")]
    pub request_date: Option<String>,
}

// ---------------------------------------------------------------------------
// Station records
// ---------------------------------------------------------------------------

/// One station entry from `payload.stations[]` of the list API.
///
/// Every field is optional on the wire. Missing strings are written as
/// `"none"` and missing numbers as `0`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StationRecord {
    #[serde(rename = "stationName")]
    pub station_name: Option<String>,
    pub country: Option<String>,
    pub water: Option<String>,
    pub region: Option<String>,
    pub situation: Option<i64>,
    pub trend: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(rename = "altitudeM")]
    pub altitude: Option<f64>,
    pub data: Vec<Measurement>,
}

impl StationRecord {
    /// The first measurement tagged `"height in cm"`, if any.
    pub fn height_measurement(&self) -> Option<&Measurement> {
        self.data
            .iter()
            .find(|m| m.kind.as_deref() == Some(MEASUREMENT_HEIGHT_CM))
    }
}

// ---------------------------------------------------------------------------
// Summary types
// ---------------------------------------------------------------------------

/// Compact per-station summary written to `<station>.json` and collected
/// into `allStationsJSON`. Field names are part of the published contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationSummary {
    pub stationsname: String,
    pub region: String,
    pub country: String,
    pub water: String,
    pub height: f64,
    pub trend: String,
    pub warning: bool,
    pub alert: bool,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise when fetching a station list for one slot.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// The request never produced an HTTP response (DNS, connect, timeout).
    #[error("Transport error: {0}")]
    Transport(String),
    /// Non-200 HTTP response from the API.
    #[error("HTTP error: {0}")]
    HttpStatus(u16),
    /// Body is not `{status:{code}, payload:{stations:[...]}}`.
    #[error("Wrong JSON returned: {0}")]
    MalformedEnvelope(String),
    /// Envelope was fine but `status.code` was not "200".
    #[error("API-Statuscode: {0}")]
    ApiStatus(String),
}

impl FetchError {
    /// Network-level failures, as opposed to answers the API actually gave.
    pub fn is_transport(&self) -> bool {
        matches!(self, FetchError::Transport(_))
    }
}
