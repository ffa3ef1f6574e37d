use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Forecast time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Horizon {
    /// About a week, daily granularity.
    ShortTerm,
    /// About six months.
    LongTerm,
}

impl Horizon {
    pub fn as_str(&self) -> &'static str {
        match self {
            Horizon::ShortTerm => "short-term",
            Horizon::LongTerm => "long-term",
        }
    }

    pub const fn all() -> &'static [Horizon] {
        &[Horizon::ShortTerm, Horizon::LongTerm]
    }

    /// Candidate endpoint paths, most preferred first.
    pub fn endpoints(&self) -> &'static [&'static str] {
        match self {
            Horizon::ShortTerm => &[
                "/api/csv-forecast",
                "/api/forecast/short-term",
                "/api/short-term-forecast",
            ],
            Horizon::LongTerm => &["/long-term/api/forecast"],
        }
    }

    /// Number of days covered by placeholder data for this horizon.
    pub fn days(&self) -> usize {
        match self {
            Horizon::ShortTerm => 7,
            Horizon::LongTerm => 180,
        }
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weather condition label from the backend's fixed vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Condition {
    Sunny,
    PartlyCloudy,
    Cloudy,
    LightRain,
    Rain,
    HeavyRain,
    Thunderstorm,
    Snow,
    Fog,
    Mist,
    #[default]
    Unknown,
}

impl Condition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::Sunny => "Sunny",
            Condition::PartlyCloudy => "Partly Cloudy",
            Condition::Cloudy => "Cloudy",
            Condition::LightRain => "Light Rain",
            Condition::Rain => "Rain",
            Condition::HeavyRain => "Heavy Rain",
            Condition::Thunderstorm => "Thunderstorm",
            Condition::Snow => "Snow",
            Condition::Fog => "Fog",
            Condition::Mist => "Mist",
            Condition::Unknown => "Unknown",
        }
    }

    pub const fn all() -> &'static [Condition] {
        &[
            Condition::Sunny,
            Condition::PartlyCloudy,
            Condition::Cloudy,
            Condition::LightRain,
            Condition::Rain,
            Condition::HeavyRain,
            Condition::Thunderstorm,
            Condition::Snow,
            Condition::Fog,
            Condition::Mist,
            Condition::Unknown,
        ]
    }

    /// Lenient lookup: case and surrounding whitespace are ignored, anything
    /// outside the vocabulary is `Unknown`.
    pub fn parse(label: &str) -> Self {
        let wanted = label.trim();
        Self::all()
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .unwrap_or(Condition::Unknown)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Condition {
    fn from(value: String) -> Self {
        Condition::parse(&value)
    }
}

impl From<Condition> for String {
    fn from(value: Condition) -> Self {
        value.as_str().to_string()
    }
}

/// One calendar day of forecast. Serialized with the backend's short codes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: NaiveDate,
    /// Degrees Celsius.
    #[serde(rename = "tavg")]
    pub temperature_avg: f64,
    #[serde(rename = "tmin")]
    pub temperature_min: f64,
    #[serde(rename = "tmax")]
    pub temperature_max: f64,
    /// Millimetres.
    #[serde(rename = "prcp")]
    pub precipitation: f64,
    /// Percent, 0..=100.
    pub humidity: f64,
    /// Metres per second.
    #[serde(rename = "wspd")]
    pub wind_speed: f64,
    /// Hectopascals.
    #[serde(rename = "pres")]
    pub pressure: f64,
    #[serde(default)]
    pub condition: Condition,
}

impl ForecastDay {
    fn numeric_fields(&self) -> [f64; 7] {
        [
            self.temperature_avg,
            self.temperature_min,
            self.temperature_max,
            self.precipitation,
            self.humidity,
            self.wind_speed,
            self.pressure,
        ]
    }

    pub fn is_finite(&self) -> bool {
        self.numeric_fields().iter().all(|v| v.is_finite())
    }
}

/// Days ordered by strictly increasing date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResponse {
    #[serde(rename = "forecast")]
    days: Vec<ForecastDay>,
}

impl ForecastResponse {
    /// Sorts by date and keeps the first occurrence of each date.
    pub fn new(mut days: Vec<ForecastDay>) -> Self {
        // stable sort keeps input order among equal dates
        days.sort_by_key(|d| d.date);
        days.dedup_by_key(|d| d.date);
        Self { days }
    }

    pub fn days(&self) -> &[ForecastDay] {
        &self.days
    }

    pub fn into_days(self) -> Vec<ForecastDay> {
        self.days
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// True when dates strictly increase and every numeric field is finite.
    /// Deserialized data bypasses `new`, so cached entries are checked with this.
    pub fn is_well_formed(&self) -> bool {
        self.days.windows(2).all(|w| w[0].date < w[1].date)
            && self.days.iter().all(ForecastDay::is_finite)
    }
}

/// Where a `ForecastResponse` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchStatus {
    Live,
    StaleCache,
    SyntheticFallback,
}

impl FetchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchStatus::Live => "live",
            FetchStatus::StaleCache => "stale-cache",
            FetchStatus::SyntheticFallback => "synthetic-fallback",
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, FetchStatus::Live)
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one fetch cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchOutcome {
    pub horizon: Horizon,
    pub status: FetchStatus,
    /// Fetch time for live data, the cache timestamp for stale data,
    /// generation time for synthetic data.
    pub as_of: DateTime<Utc>,
    /// User-facing explanation, set for every non-live status.
    pub notice: Option<String>,
    pub response: ForecastResponse,
}
