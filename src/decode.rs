/// Trend and situation code tables.
///
/// The pegelalarm API reports two small integer enumerations per station.
/// These are lookup tables, not computed classifications: alerting
/// downstream binds to the exact code → group mapping below. Any code not
/// listed decodes to the unknown variant.
///
/// ```text
/// trend       -10 falling | 0 constant | 10 rising
/// situation   -10, 10, 20 normal | 30 warning | 40, 50 alert
/// ```

use std::fmt;

// ---------------------------------------------------------------------------
// Trend
// ---------------------------------------------------------------------------

/// Short-term water level direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Falling,
    Constant,
    Rising,
    Unknown,
}

impl Trend {
    pub fn from_code(code: i64) -> Self {
        match code {
            -10 => Trend::Falling,
            0 => Trend::Constant,
            10 => Trend::Rising,
            _ => Trend::Unknown,
        }
    }

    /// Full display text stored in `trend.text`.
    pub fn text(self) -> &'static str {
        match self {
            Trend::Falling => "Fallende Wasserhöhe",
            Trend::Constant => "Konstante Wasserhöhe",
            Trend::Rising => "Steigende Wasserhöhe",
            Trend::Unknown => "Unbekannte Wasserhöhe",
        }
    }

    /// Short label stored in `trend.short` and the station summary.
    pub fn short_text(self) -> &'static str {
        match self {
            Trend::Falling => "fallend",
            Trend::Constant => "konstant",
            Trend::Rising => "steigend",
            Trend::Unknown => "Unbekannt",
        }
    }
}

/// Decodes an optional trend code; a missing code is unknown.
pub fn decode_trend(code: Option<i64>) -> Trend {
    code.map(Trend::from_code).unwrap_or(Trend::Unknown)
}

// ---------------------------------------------------------------------------
// Situation
// ---------------------------------------------------------------------------

/// Classification group a situation code falls into. Exactly one of the
/// per-station `state.*` flags is set from this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SituationGroup {
    Normal,
    Warning,
    Alert,
    Unknown,
}

impl SituationGroup {
    pub fn as_str(self) -> &'static str {
        match self {
            SituationGroup::Normal => "normal",
            SituationGroup::Warning => "warning",
            SituationGroup::Alert => "alert",
            SituationGroup::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SituationGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current water level severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Situation {
    BelowNormal,
    Normal,
    Elevated,
    WarningLevel,
    RegionalFlood,
    NationalFlood,
    Unknown,
}

impl Situation {
    pub fn from_code(code: i64) -> Self {
        match code {
            -10 => Situation::BelowNormal,
            10 => Situation::Normal,
            20 => Situation::Elevated,
            30 => Situation::WarningLevel,
            40 => Situation::RegionalFlood,
            50 => Situation::NationalFlood,
            _ => Situation::Unknown,
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            Situation::BelowNormal => "Unter- oder Normalwasserstand",
            Situation::Normal => "Normal- oder leicht erhöhter Wasserstand",
            Situation::Elevated => "Erhöhter Wasserstand",
            Situation::WarningLevel => "Wasserstand hat Warngrenze erreicht",
            Situation::RegionalFlood => "Wasserstand verursacht ein regionales Hochwasser",
            Situation::NationalFlood => "Wasserstand verursacht ein nationales Hochwasser",
            Situation::Unknown => "Unknown situation",
        }
    }

    pub fn group(self) -> SituationGroup {
        match self {
            Situation::BelowNormal | Situation::Normal | Situation::Elevated => {
                SituationGroup::Normal
            }
            Situation::WarningLevel => SituationGroup::Warning,
            Situation::RegionalFlood | Situation::NationalFlood => SituationGroup::Alert,
            Situation::Unknown => SituationGroup::Unknown,
        }
    }
}

/// Decodes an optional situation code; a missing code is unknown.
pub fn decode_situation(code: Option<i64>) -> Situation {
    code.map(Situation::from_code).unwrap_or(Situation::Unknown)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
