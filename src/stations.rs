/// Station path builder and the fixed per-station state-tree schema.
///
/// Every station observed by a poll lives under `stations.<segment>`, where
/// the segment is derived from the station's display name by `sanitize`.
/// The sanitizer must stay byte-for-byte stable: dashboards and rules bind
/// to the paths written by earlier runs.
///
/// `STATION_CHANNELS` and `STATION_FIELDS` are the single source of truth for
/// the shape of a station subtree. Consumers bind to these exact paths.

use crate::store::{ObjectSpec, Role, StateStore, StoreError, ValueType};

/// Root channel holding one subtree per station.
pub const STATIONS_ROOT: &str = "stations";

// ---------------------------------------------------------------------------
// Path sanitizing
// ---------------------------------------------------------------------------

/// Characters allowed in a station path segment after lowercasing.
///
/// Space, hyphen, ASCII digits and letters, underscore, and the Latin-1
/// letters U+00C0–U+00D6 and U+00F8–U+00FF.
fn is_segment_char(c: char) -> bool {
    matches!(c,
        ' ' | '-' | '0'..='9' | 'A'..='Z' | '_' | 'a'..='z'
        | '\u{C0}'..='\u{D6}' | '\u{F8}'..='\u{FF}')
}

/// Turns a station display name into a namespace-safe path segment.
///
/// Lowercases, maps every whitespace character to `_` (one each, runs are
/// not collapsed) and drops anything outside `is_segment_char`.
pub fn sanitize(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| is_segment_char(*c))
        .collect()
}

/// Full path of a station's subtree root, e.g. `stations.wien_nord`.
pub fn station_path(name: &str) -> String {
    format!("{}.{}", STATIONS_ROOT, sanitize(name))
}

/// The station segment of a path below `stations`, if any.
///
/// `stations.linz.trend.short` → `Some("linz")`. An empty segment
/// (`stations..name`) is reported as `Some("")` so the sweep can clear it.
pub fn station_segment(path: &str) -> Option<&str> {
    let rest = path.strip_prefix(STATIONS_ROOT)?.strip_prefix('.')?;
    rest.split('.').next()
}

// ---------------------------------------------------------------------------
// State-tree schema
// ---------------------------------------------------------------------------

/// Definition of one leaf state below a station root.
pub struct FieldSpec {
    /// Path relative to the station root.
    pub id: &'static str,
    pub value_type: ValueType,
    pub role: Role,
    pub unit: Option<&'static str>,
}

impl FieldSpec {
    /// Display name is the last path component (`trend.short` → `short`).
    pub fn name(&self) -> &'static str {
        self.id.rsplit('.').next().unwrap_or(self.id)
    }

    pub fn object_spec(&self) -> ObjectSpec {
        let spec = ObjectSpec::state(self.name(), self.value_type, self.role);
        match self.unit {
            Some(unit) => spec.with_unit(unit),
            None => spec,
        }
    }
}

/// Grouping nodes below each station root.
pub static STATION_CHANNELS: &[&str] = &["geo", "situation", "state", "trend"];

pub static STATION_FIELDS: &[FieldSpec] = &[
    // Copied record attributes
    FieldSpec { id: "country", value_type: ValueType::String, role: Role::Text, unit: None },
    FieldSpec { id: "name", value_type: ValueType::String, role: Role::Text, unit: None },
    FieldSpec { id: "region", value_type: ValueType::String, role: Role::Text, unit: None },
    FieldSpec { id: "water", value_type: ValueType::String, role: Role::Text, unit: None },
    FieldSpec { id: "json", value_type: ValueType::String, role: Role::Json, unit: None },
    // Measurement
    FieldSpec { id: "height", value_type: ValueType::Number, role: Role::Level, unit: Some("cm") },
    FieldSpec { id: "requestDate", value_type: ValueType::String, role: Role::Date, unit: None },
    FieldSpec { id: "sourceDate", value_type: ValueType::String, role: Role::Date, unit: None },
    // Location
    FieldSpec { id: "geo.altitude", value_type: ValueType::Number, role: Role::GpsElevation, unit: None },
    FieldSpec { id: "geo.latitude", value_type: ValueType::Number, role: Role::GpsLatitude, unit: None },
    FieldSpec { id: "geo.longitude", value_type: ValueType::Number, role: Role::GpsLongitude, unit: None },
    // Decoded codes
    FieldSpec { id: "situation.code", value_type: ValueType::Number, role: Role::Value, unit: None },
    FieldSpec { id: "situation.group", value_type: ValueType::String, role: Role::Text, unit: None },
    FieldSpec { id: "situation.text", value_type: ValueType::String, role: Role::Text, unit: None },
    FieldSpec { id: "trend.code", value_type: ValueType::Number, role: Role::Value, unit: None },
    FieldSpec { id: "trend.short", value_type: ValueType::String, role: Role::Text, unit: None },
    FieldSpec { id: "trend.text", value_type: ValueType::String, role: Role::Text, unit: None },
    // Classification flags, exactly one is true
    FieldSpec { id: "state.alert", value_type: ValueType::Boolean, role: Role::Indicator, unit: None },
    FieldSpec { id: "state.normal", value_type: ValueType::Boolean, role: Role::Indicator, unit: None },
    FieldSpec { id: "state.unknown", value_type: ValueType::Boolean, role: Role::Indicator, unit: None },
    FieldSpec { id: "state.warning", value_type: ValueType::Boolean, role: Role::Indicator, unit: None },
];

/// Creates any missing object of the station subtree rooted at `path`.
///
/// Idempotent: existing definitions and values are left alone. Returns the
/// number of objects created.
pub fn ensure_station_tree<S: StateStore + ?Sized>(store: &mut S, path: &str) -> Result<usize, StoreError> {
    let mut created = 0;

    if store.ensure_exists(STATIONS_ROOT, &ObjectSpec::channel(STATIONS_ROOT))? {
        created += 1;
    }

    let segment = path.rsplit('.').next().unwrap_or(path);
    if store.ensure_exists(path, &ObjectSpec::channel(segment))? {
        created += 1;
    }

    for channel in STATION_CHANNELS {
        if store.ensure_exists(&format!("{}.{}", path, channel), &ObjectSpec::channel(channel))? {
            created += 1;
        }
    }

    for field in STATION_FIELDS {
        if store.ensure_exists(&format!("{}.{}", path, field.id), &field.object_spec())? {
            created += 1;
        }
    }

    Ok(created)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, ObjectKind};

    #[test]
    fn test_sanitize_replaces_whitespace() {
        assert_eq!(sanitize("Wien Nord"), "wien_nord");
        assert_eq!(sanitize("Linz\tDonau"), "linz_donau");
    }

    #[test]
    fn test_sanitize_does_not_collapse_whitespace_runs() {
        assert_eq!(sanitize("Bad  Ischl"), "bad__ischl");
    }

    #[test]
    fn test_sanitize_strips_punctuation() {
        assert_eq!(sanitize("A/B"), "ab");
        assert_eq!(sanitize("St. Valentin (Enns)"), "st_valentin_enns");
        assert_eq!(sanitize("Hainburg-Donau"), "hainburg-donau");
    }

    #[test]
    fn test_sanitize_latin1_allowance() {
        // Lowercase à..ö (U+00E0..U+00F6) and ß fall between the allowed
        // ranges; ø..ÿ (including ü) survive.
        assert_eq!(sanitize("Ölmühle"), "lmühle");
        assert_eq!(sanitize("Mürzzuschlag"), "mürzzuschlag");
        assert_eq!(sanitize("Kärnten"), "krnten");
        assert_eq!(sanitize("Großraming"), "groraming");
        assert_eq!(sanitize("Bjørnøya"), "bjørnøya");
    }

    #[test]
    fn test_sanitize_is_deterministic() {
        let name = "Steyr Ortskai";
        assert_eq!(sanitize(name), sanitize(name));
        assert_eq!(station_path(name), "stations.steyr_ortskai");
    }

    #[test]
    fn test_station_segment() {
        assert_eq!(station_segment("stations.linz.trend.short"), Some("linz"));
        assert_eq!(station_segment("stations.linz"), Some("linz"));
        assert_eq!(station_segment("stations"), None);
        assert_eq!(station_segment("stationsx.linz"), None);
        assert_eq!(station_segment("lastRun"), None);
        assert_eq!(station_segment("stations..name"), Some(""));
        assert_eq!(station_segment("stations."), Some(""));
    }

    fn field(id: &str) -> &'static FieldSpec {
        STATION_FIELDS.iter().find(|f| f.id == id).unwrap()
    }

    #[test]
    fn test_field_names() {
        assert_eq!(field("trend.short").name(), "short");
        assert_eq!(field("height").name(), "height");
        assert!(STATION_FIELDS.iter().all(|f| !f.name().contains('.')));
    }

    #[test]
    fn test_height_carries_unit() {
        let spec = field("height").object_spec();
        assert_eq!(
            spec,
            ObjectSpec::state("height", ValueType::Number, Role::Level).with_unit("cm")
        );
    }

    #[test]
    fn test_ensure_station_tree_is_idempotent() {
        let mut store = MemoryStore::new();
        let created = ensure_station_tree(&mut store, "stations.linz").unwrap();
        // root + station + channels + fields
        assert_eq!(created, 2 + STATION_CHANNELS.len() + STATION_FIELDS.len());

        assert_eq!(ensure_station_tree(&mut store, "stations.linz").unwrap(), 0);

        let states = store.list_where("stations.linz", ObjectKind::State).unwrap();
        assert_eq!(states.len(), STATION_FIELDS.len());
        assert!(states.contains(&"stations.linz.state.warning".to_string()));
    }
}
