/// pegel_service: pegelalarm water-level adapter.
///
/// # Module structure
///
/// ```text
/// pegel_service
/// ├── model       - shared data types (StationRecord, StationSummary, FetchError, …)
/// ├── config      - adapter configuration loader (pegelalarm.toml)
/// ├── decode      - trend and situation code tables
/// ├── stations    - path sanitizing and the per-station object tree
/// ├── store
/// │   ├── memory  - in-process state tree (tests, --dry-run)
/// │   └── pg      - PostgreSQL-backed state tree
/// ├── db          - DATABASE_URL validation and schema checks
/// ├── ingest
/// │   ├── pegelalarm - list API: URL construction, transport, envelope checks
/// │   └── fixtures (test only) - representative API response payloads
/// ├── reconcile   - writes one station and the cycle-wide aggregates
/// ├── sweep       - removes stations no longer reported
/// ├── logging     - `log` backend with source-tagged lines
/// └── daemon      - one poll cycle, pacing and the watchdog
/// ```

/// Public modules
pub mod config;
pub mod daemon;
pub mod db;
pub mod decode;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod reconcile;
pub mod stations;
pub mod store;
pub mod sweep;
