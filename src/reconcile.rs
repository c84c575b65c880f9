/// Writes fetched station records into the state tree.
///
/// For each record the station subtree is created if missing, every field
/// is overwritten from the record (with `"none"` / `0` defaults), and the
/// station is classified. Warning and alert paths plus the per-station JSON
/// summaries accumulate in a `CycleContext` that is threaded through the
/// whole cycle and flushed by `write_aggregates` at the end.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;

use crate::decode::{decode_situation, decode_trend, SituationGroup};
use crate::logging::{self, Source};
use crate::model::{StationRecord, StationSummary};
use crate::stations::{ensure_station_tree, sanitize, STATIONS_ROOT};
use crate::store::{ObjectSpec, Role, StateStore, StateValue, StoreError, ValueType};

/// Written for string fields the record does not carry.
pub const DEFAULT_TEXT: &str = "none";

// Aggregate paths
pub const WARNING_CHANNEL: &str = "warning";
pub const HAS_WARNING: &str = "warning.hasWarning";
pub const WARNING_PATHS: &str = "warning.statepathes";
pub const ALERT_CHANNEL: &str = "alert";
pub const HAS_ALERT: &str = "alert.hasAlert";
pub const ALERT_PATHS: &str = "alert.statepathes";
pub const ALL_STATIONS_JSON: &str = "allStationsJSON";
pub const LAST_RUN: &str = "lastRun";

// ---------------------------------------------------------------------------
// Cycle context
// ---------------------------------------------------------------------------

/// Everything one cycle accumulates across its slots.
#[derive(Debug, Default)]
pub struct CycleContext {
    warnings: Vec<String>,
    alerts: Vec<String>,
    summaries: Vec<(String, StationSummary)>,
    /// segment → station name that last claimed it
    observed: BTreeMap<String, String>,
    slots_polled: usize,
    failed_slots: Vec<usize>,
}

impl CycleContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_slot_success(&mut self) {
        self.slots_polled += 1;
    }

    pub fn record_slot_failure(&mut self, slot: usize) {
        self.slots_polled += 1;
        self.failed_slots.push(slot);
    }

    pub fn slots_polled(&self) -> usize {
        self.slots_polled
    }

    pub fn failed_slots(&self) -> &[usize] {
        &self.failed_slots
    }

    /// Every polled slot succeeded, and there was at least one.
    pub fn is_clean(&self) -> bool {
        self.slots_polled > 0 && self.failed_slots.is_empty()
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn alerts(&self) -> &[String] {
        &self.alerts
    }

    pub fn summaries(&self) -> impl Iterator<Item = &StationSummary> {
        self.summaries.iter().map(|(_, summary)| summary)
    }

    pub fn observes(&self, segment: &str) -> bool {
        self.observed.contains_key(segment)
    }

    pub fn observed_count(&self) -> usize {
        self.observed.len()
    }

    /// Records a station under `path`, replacing anything an earlier record
    /// in this cycle left for the same path. Returns the name that held the
    /// path before, if any.
    pub fn accept(
        &mut self,
        path: &str,
        segment: &str,
        name: &str,
        group: SituationGroup,
        summary: StationSummary,
    ) -> Option<String> {
        let previous = self.observed.insert(segment.to_string(), name.to_string());
        if previous.is_some() {
            self.warnings.retain(|p| p != path);
            self.alerts.retain(|p| p != path);
            self.summaries.retain(|(p, _)| p != path);
        }

        match group {
            SituationGroup::Warning => self.warnings.push(path.to_string()),
            SituationGroup::Alert => self.alerts.push(path.to_string()),
            SituationGroup::Normal | SituationGroup::Unknown => {}
        }
        self.summaries.push((path.to_string(), summary));

        previous
    }
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

static DAY_MONTH_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]{2})\.([0-9]{2})\.([0-9]{4})(.*)$").expect("valid date pattern")
});

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M%z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// `DD.MM.YYYY<rest>` → `YYYY-MM-DD<rest>`; other input is returned as is.
pub fn reorder_date(raw: &str) -> String {
    DAY_MONTH_YEAR.replace(raw, "${3}-${2}-${1}${4}").into_owned()
}

/// Parses an ISO-ordered timestamp. Without an explicit offset the time is
/// taken as UTC.
pub fn parse_timestamp(iso: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(iso) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(iso, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(iso, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(iso, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Renders a timestamp the way `lastRun` and the date fields are stored:
/// `Sat, 01 Feb 2020 10:00:00 GMT`.
pub fn format_utc(dt: DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Reorders, parses and re-renders an API date string.
pub fn normalize_date(raw: &str) -> Option<String> {
    parse_timestamp(&reorder_date(raw.trim())).map(format_utc)
}

// ---------------------------------------------------------------------------
// Per-station writes
// ---------------------------------------------------------------------------

fn put<S, V>(store: &mut S, path: &str, field: &str, value: V) -> Result<(), StoreError>
where
    S: StateStore + ?Sized,
    V: Into<StateValue>,
{
    store.write(&format!("{}.{}", path, field), value.into())
}

fn text_or_default(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| DEFAULT_TEXT.to_string())
}

fn put_date<S: StateStore + ?Sized>(
    store: &mut S,
    path: &str,
    field: &str,
    raw: Option<&str>,
) -> Result<(), StoreError> {
    let Some(raw) = raw else {
        return Ok(());
    };
    match normalize_date(raw) {
        Some(date) => put(store, path, field, date),
        None => {
            logging::warn(
                Source::Store,
                Some(path),
                &format!("unparseable {} '{}', keeping previous value", field, raw),
            );
            Ok(())
        }
    }
}

/// Writes one station record and registers it with the cycle.
///
/// Returns the station path that was written, or `None` when the name
/// sanitizes to an empty segment and the record is skipped.
pub fn reconcile_station<S: StateStore + ?Sized>(
    store: &mut S,
    ctx: &mut CycleContext,
    record: &StationRecord,
) -> Result<Option<String>, StoreError> {
    let name = text_or_default(&record.station_name);
    let segment = sanitize(&name);
    if segment.is_empty() {
        logging::warn(
            Source::Store,
            None,
            &format!("station name '{}' leaves no usable path segment, skipped", name),
        );
        return Ok(None);
    }
    let path = format!("{}.{}", STATIONS_ROOT, segment);

    ensure_station_tree(store, &path)?;

    let situation = decode_situation(record.situation);
    let trend = decode_trend(record.trend);
    let group = situation.group();

    let country = text_or_default(&record.country);
    let region = text_or_default(&record.region);
    let water = text_or_default(&record.water);

    put(store, &path, "name", name.as_str())?;
    put(store, &path, "country", country.as_str())?;
    put(store, &path, "region", region.as_str())?;
    put(store, &path, "water", water.as_str())?;

    put(store, &path, "situation.code", record.situation.unwrap_or(0))?;
    put(store, &path, "situation.text", situation.text())?;
    put(store, &path, "situation.group", group.as_str())?;

    put(store, &path, "trend.code", record.trend.unwrap_or(0))?;
    put(store, &path, "trend.text", trend.text())?;
    put(store, &path, "trend.short", trend.short_text())?;

    put(store, &path, "state.normal", group == SituationGroup::Normal)?;
    put(store, &path, "state.warning", group == SituationGroup::Warning)?;
    put(store, &path, "state.alert", group == SituationGroup::Alert)?;
    put(store, &path, "state.unknown", group == SituationGroup::Unknown)?;

    put(store, &path, "geo.latitude", record.latitude.unwrap_or(0.0))?;
    put(store, &path, "geo.longitude", record.longitude.unwrap_or(0.0))?;
    put(store, &path, "geo.altitude", record.altitude.unwrap_or(0.0))?;

    let measurement = record.height_measurement();
    let height = measurement.and_then(|m| m.value).unwrap_or(0.0);
    put(store, &path, "height", height)?;
    if let Some(m) = measurement {
        put_date(store, &path, "sourceDate", m.source_date.as_deref())?;
        put_date(store, &path, "requestDate", m.request_date.as_deref())?;
    }

    let summary = StationSummary {
        stationsname: name.clone(),
        region,
        country,
        water,
        height,
        trend: trend.short_text().to_string(),
        warning: group == SituationGroup::Warning,
        alert: group == SituationGroup::Alert,
    };
    put(store, &path, "json", serde_json::to_string(&summary)?)?;

    if let Some(previous) = ctx.accept(&path, &segment, &name, group, summary) {
        if previous != name {
            logging::warn(
                Source::Store,
                Some(&path),
                &format!("'{}' and '{}' share this path, keeping '{}'", previous, name, name),
            );
        }
    }

    Ok(Some(path))
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

fn ensure_aggregate_tree<S: StateStore + ?Sized>(store: &mut S) -> Result<(), StoreError> {
    let indicator = |name: &str| ObjectSpec::state(name, ValueType::Boolean, Role::Indicator);
    let json = |name: &str| ObjectSpec::state(name, ValueType::String, Role::Json);

    store.ensure_exists(WARNING_CHANNEL, &ObjectSpec::channel(WARNING_CHANNEL))?;
    store.ensure_exists(HAS_WARNING, &indicator("hasWarning"))?;
    store.ensure_exists(WARNING_PATHS, &json("statepathes"))?;

    store.ensure_exists(ALERT_CHANNEL, &ObjectSpec::channel(ALERT_CHANNEL))?;
    store.ensure_exists(HAS_ALERT, &indicator("hasAlert"))?;
    store.ensure_exists(ALERT_PATHS, &json("statepathes"))?;

    store.ensure_exists(ALL_STATIONS_JSON, &json(ALL_STATIONS_JSON))?;
    store.ensure_exists(LAST_RUN, &ObjectSpec::state(LAST_RUN, ValueType::String, Role::Date))?;
    Ok(())
}

/// Writes the cycle-wide warning/alert flags and lists, the combined
/// summary and `lastRun`.
///
/// Only a clean cycle has seen every configured station, so anything less
/// leaves the previous aggregates in place. Returns whether they were written.
pub fn write_aggregates<S: StateStore + ?Sized>(
    store: &mut S,
    ctx: &CycleContext,
    now: DateTime<Utc>,
) -> Result<bool, StoreError> {
    if !ctx.is_clean() {
        logging::warn(
            Source::Store,
            None,
            &format!(
                "aggregates kept from the last clean cycle: {} of {} slots failed",
                ctx.failed_slots().len(),
                ctx.slots_polled()
            ),
        );
        return Ok(false);
    }

    ensure_aggregate_tree(store)?;

    store.write(HAS_WARNING, StateValue::Bool(!ctx.warnings().is_empty()))?;
    store.write(WARNING_PATHS, serde_json::to_string(ctx.warnings())?.into())?;

    store.write(HAS_ALERT, StateValue::Bool(!ctx.alerts().is_empty()))?;
    store.write(ALERT_PATHS, serde_json::to_string(ctx.alerts())?.into())?;

    let summaries: Vec<&StationSummary> = ctx.summaries().collect();
    store.write(ALL_STATIONS_JSON, serde_json::to_string(&summaries)?.into())?;

    store.write(LAST_RUN, format_utc(now).into())?;
    Ok(true)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Measurement, MEASUREMENT_HEIGHT_CM};
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn station(name: &str, situation: i64, trend: i64) -> StationRecord {
        StationRecord {
            station_name: Some(name.to_string()),
            country: Some("Österreich".to_string()),
            water: Some("Donau".to_string()),
            region: Some("Oberösterreich".to_string()),
            situation: Some(situation),
            trend: Some(trend),
            latitude: Some(48.3),
            longitude: Some(14.29),
            altitude: Some(251.0),
            data: vec![Measurement {
                kind: Some(MEASUREMENT_HEIGHT_CM.to_string()),
                value: Some(412.0),
                source_date: Some("01.02.2020 10:00".to_string()),
                request_date: Some("01.02.2020T10:05:00+0100".to_string()),
            }],
        }
    }

    fn read(store: &mut MemoryStore, path: &str) -> StateValue {
        store.read(path).unwrap().unwrap_or_else(|| panic!("{} not written", path))
    }

    #[test]
    fn test_reorder_date() {
        assert_eq!(reorder_date("01.02.2020 10:00"), "2020-02-01 10:00");
        assert_eq!(reorder_date("19.10.2026T06:15:00+0200"), "2026-10-19T06:15:00+0200");
        assert_eq!(reorder_date("2020-02-01 10:00"), "2020-02-01 10:00");
    }

    #[test]
    fn test_normalize_date_naive_is_utc() {
        assert_eq!(
            normalize_date("01.02.2020 10:00").as_deref(),
            Some("Sat, 01 Feb 2020 10:00:00 GMT")
        );
    }

    #[test]
    fn test_normalize_date_with_offset() {
        assert_eq!(
            normalize_date("01.02.2020T10:05:00+0100").as_deref(),
            Some("Sat, 01 Feb 2020 09:05:00 GMT")
        );
        assert_eq!(
            normalize_date("2020-02-01T10:05:00+01:00").as_deref(),
            Some("Sat, 01 Feb 2020 09:05:00 GMT")
        );
    }

    #[test]
    fn test_normalize_date_rejects_garbage() {
        assert_eq!(normalize_date("gestern"), None);
        assert_eq!(normalize_date("31.02.2020 10:00"), None);
    }

    #[test]
    fn test_reconcile_writes_all_fields() {
        let mut store = MemoryStore::new();
        let mut ctx = CycleContext::new();

        let path = reconcile_station(&mut store, &mut ctx, &station("Linz", 20, 10)).unwrap();
        assert_eq!(path.as_deref(), Some("stations.linz"));

        assert_eq!(read(&mut store, "stations.linz.name"), StateValue::Text("Linz".into()));
        assert_eq!(read(&mut store, "stations.linz.situation.code"), StateValue::Number(20.0));
        assert_eq!(read(&mut store, "stations.linz.situation.group"), StateValue::Text("normal".into()));
        assert_eq!(read(&mut store, "stations.linz.trend.short"), StateValue::Text("steigend".into()));
        assert_eq!(read(&mut store, "stations.linz.geo.altitude"), StateValue::Number(251.0));
        assert_eq!(read(&mut store, "stations.linz.height"), StateValue::Number(412.0));
        assert_eq!(
            read(&mut store, "stations.linz.sourceDate"),
            StateValue::Text("Sat, 01 Feb 2020 10:00:00 GMT".into())
        );
        assert_eq!(
            read(&mut store, "stations.linz.requestDate"),
            StateValue::Text("Sat, 01 Feb 2020 09:05:00 GMT".into())
        );
    }

    #[test]
    fn test_exactly_one_flag_per_group() {
        for (code, expected) in [(10, "normal"), (30, "warning"), (50, "alert"), (77, "unknown")] {
            let mut store = MemoryStore::new();
            let mut ctx = CycleContext::new();
            reconcile_station(&mut store, &mut ctx, &station("Enns", code, 0)).unwrap();

            let flags: Vec<&str> = ["normal", "warning", "alert", "unknown"]
                .into_iter()
                .filter(|flag| {
                    read(&mut store, &format!("stations.enns.state.{}", flag)) == StateValue::Bool(true)
                })
                .collect();
            assert_eq!(flags, vec![expected], "situation {}", code);
        }
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let mut store = MemoryStore::new();
        let mut ctx = CycleContext::new();
        let record = StationRecord {
            station_name: Some("Schärding".to_string()),
            ..Default::default()
        };

        reconcile_station(&mut store, &mut ctx, &record).unwrap();

        assert_eq!(read(&mut store, "stations.schrding.region"), StateValue::Text("none".into()));
        assert_eq!(read(&mut store, "stations.schrding.height"), StateValue::Number(0.0));
        assert_eq!(read(&mut store, "stations.schrding.trend.code"), StateValue::Number(0.0));
        assert_eq!(
            read(&mut store, "stations.schrding.trend.short"),
            StateValue::Text("Unbekannt".into())
        );
        assert_eq!(read(&mut store, "stations.schrding.state.unknown"), StateValue::Bool(true));
        // No height measurement: dates stay unwritten
        assert_eq!(store.read("stations.schrding.sourceDate").unwrap(), None);
    }

    #[test]
    fn test_station_json_summary() {
        let mut store = MemoryStore::new();
        let mut ctx = CycleContext::new();
        reconcile_station(&mut store, &mut ctx, &station("Linz", 30, -10)).unwrap();

        let json = read(&mut store, "stations.linz.json");
        let summary: StationSummary = serde_json::from_str(json.as_str().unwrap()).unwrap();
        assert_eq!(summary.stationsname, "Linz");
        assert_eq!(summary.trend, "fallend");
        assert!(summary.warning);
        assert!(!summary.alert);
        assert_eq!(summary.height, 412.0);
    }

    #[test]
    fn test_same_station_twice_is_not_duplicated() {
        let mut store = MemoryStore::new();
        let mut ctx = CycleContext::new();
        reconcile_station(&mut store, &mut ctx, &station("Linz", 30, 0)).unwrap();
        reconcile_station(&mut store, &mut ctx, &station("Linz", 40, 0)).unwrap();

        assert!(ctx.warnings().is_empty());
        assert_eq!(ctx.alerts(), &["stations.linz".to_string()]);
        assert_eq!(ctx.summaries().count(), 1);
        assert_eq!(ctx.observed_count(), 1);
    }

    #[test]
    fn test_colliding_names_last_write_wins() {
        let mut store = MemoryStore::new();
        let mut ctx = CycleContext::new();
        reconcile_station(&mut store, &mut ctx, &station("Wien Nord", 30, 0)).unwrap();
        reconcile_station(&mut store, &mut ctx, &station("Wien/Nord", 10, 0)).unwrap();

        // "Wien/Nord" sanitizes to "wiennord", not a collision
        assert_eq!(ctx.observed_count(), 2);

        reconcile_station(&mut store, &mut ctx, &station("wien nord", 10, 0)).unwrap();
        assert_eq!(ctx.observed_count(), 2);
        assert!(ctx.warnings().is_empty());
        assert_eq!(read(&mut store, "stations.wien_nord.name"), StateValue::Text("wien nord".into()));
    }

    #[test]
    fn test_write_aggregates() {
        let mut store = MemoryStore::new();
        let mut ctx = CycleContext::new();
        reconcile_station(&mut store, &mut ctx, &station("Linz", 30, 0)).unwrap();
        reconcile_station(&mut store, &mut ctx, &station("Krems", 40, 0)).unwrap();
        reconcile_station(&mut store, &mut ctx, &station("Ybbs", 10, 0)).unwrap();
        ctx.record_slot_success();

        let now = Utc.with_ymd_and_hms(2026, 10, 19, 6, 0, 0).unwrap();
        assert!(write_aggregates(&mut store, &ctx, now).unwrap());

        assert_eq!(read(&mut store, HAS_WARNING), StateValue::Bool(true));
        assert_eq!(read(&mut store, WARNING_PATHS), StateValue::Text(r#"["stations.linz"]"#.into()));
        assert_eq!(read(&mut store, HAS_ALERT), StateValue::Bool(true));
        assert_eq!(read(&mut store, ALERT_PATHS), StateValue::Text(r#"["stations.krems"]"#.into()));
        assert_eq!(read(&mut store, LAST_RUN), StateValue::Text("Mon, 19 Oct 2026 06:00:00 GMT".into()));

        let all: Vec<StationSummary> =
            serde_json::from_str(read(&mut store, ALL_STATIONS_JSON).as_str().unwrap()).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_partial_cycle_keeps_previous_aggregates() {
        let mut store = MemoryStore::new();
        let mut first = CycleContext::new();
        reconcile_station(&mut store, &mut first, &station("Linz", 30, 0)).unwrap();
        first.record_slot_success();
        write_aggregates(&mut store, &first, Utc::now()).unwrap();
        let before = store.snapshot();

        // Linz's slot failed this time, only a quiet station came back
        let mut second = CycleContext::new();
        reconcile_station(&mut store, &mut second, &station("Ybbs", 10, 0)).unwrap();
        second.record_slot_success();
        second.record_slot_failure(1);

        assert!(!write_aggregates(&mut store, &second, Utc::now()).unwrap());
        assert_eq!(read(&mut store, HAS_WARNING), StateValue::Bool(true));
        assert_eq!(read(&mut store, WARNING_PATHS), StateValue::Text(r#"["stations.linz"]"#.into()));
        assert_eq!(store.snapshot().get(LAST_RUN), before.get(LAST_RUN));
        assert_eq!(store.snapshot().get(ALL_STATIONS_JSON), before.get(ALL_STATIONS_JSON));
    }

    #[test]
    fn test_no_aggregates_without_polled_slots() {
        let mut store = MemoryStore::new();
        let ctx = CycleContext::new();

        assert!(!write_aggregates(&mut store, &ctx, Utc::now()).unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn test_name_without_usable_characters_is_skipped() {
        let mut store = MemoryStore::new();
        let mut ctx = CycleContext::new();

        let written = reconcile_station(&mut store, &mut ctx, &station("(?)", 30, 0)).unwrap();
        assert_eq!(written, None);
        assert!(store.is_empty());
        assert_eq!(ctx.observed_count(), 0);
        assert!(ctx.warnings().is_empty());
    }
}
