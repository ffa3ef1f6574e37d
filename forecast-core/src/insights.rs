//! Alerts and advice derived from a forecast.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::model::{Condition, ForecastDay};

pub const HEAT_THRESHOLD_C: f64 = 35.0;
pub const HEAVY_RAIN_THRESHOLD_MM: f64 = 10.0;
pub const STRONG_WIND_THRESHOLD_MPS: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertKind {
    ExtremeHeat,
    HeavyRain,
    StrongWind,
}

impl AlertKind {
    pub fn title(&self) -> &'static str {
        match self {
            AlertKind::ExtremeHeat => "Extreme Heat Warning",
            AlertKind::HeavyRain => "Heavy Rainfall Alert",
            AlertKind::StrongWind => "Strong Wind Advisory",
        }
    }

    pub fn advice(&self) -> &'static str {
        match self {
            AlertKind::ExtremeHeat => "Stay hydrated and avoid prolonged sun exposure.",
            AlertKind::HeavyRain => "Be prepared for potential flooding and traffic disruptions.",
            AlertKind::StrongWind => {
                "Secure loose objects outdoors and be cautious while driving."
            }
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            AlertKind::ExtremeHeat => "°C",
            AlertKind::HeavyRain => "mm",
            AlertKind::StrongWind => "m/s",
        }
    }

    /// The measured value for this alert, if `day` crosses the threshold.
    fn reading(&self, day: &ForecastDay) -> Option<f64> {
        let (value, threshold) = match self {
            AlertKind::ExtremeHeat => (day.temperature_max, HEAT_THRESHOLD_C),
            AlertKind::HeavyRain => (day.precipitation, HEAVY_RAIN_THRESHOLD_MM),
            AlertKind::StrongWind => (day.wind_speed, STRONG_WIND_THRESHOLD_MPS),
        };
        (value > threshold).then_some(value)
    }
}

/// One alert with the days that triggered it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherAlert {
    pub kind: AlertKind,
    pub days: Vec<(NaiveDate, f64)>,
}

/// Alerts in fixed order: heat, rain, wind. Kinds with no matching day are omitted.
pub fn check_alerts(days: &[ForecastDay]) -> Vec<WeatherAlert> {
    [AlertKind::ExtremeHeat, AlertKind::HeavyRain, AlertKind::StrongWind]
        .into_iter()
        .filter_map(|kind| {
            let hits: Vec<(NaiveDate, f64)> = days
                .iter()
                .filter_map(|d| kind.reading(d).map(|v| (d.date, v)))
                .collect();
            (!hits.is_empty()).then_some(WeatherAlert { kind, days: hits })
        })
        .collect()
}

/// Per-month aggregate, used to condense long-term forecasts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySummary {
    pub year: i32,
    pub month: u32,
    pub days: usize,
    pub avg_temperature: f64,
    pub avg_high: f64,
    pub avg_low: f64,
    pub total_precipitation: f64,
    pub avg_humidity: f64,
}

impl MonthlySummary {
    /// e.g. "March 2025"
    pub fn label(&self) -> String {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .map(|d| d.format("%B %Y").to_string())
            .unwrap_or_else(|| format!("{}-{:02}", self.year, self.month))
    }
}

/// Groups days by calendar month. Input must be date-ordered, as every
/// `ForecastResponse` is.
pub fn monthly_summaries(days: &[ForecastDay]) -> Vec<MonthlySummary> {
    days.chunk_by(|a, b| (a.date.year(), a.date.month()) == (b.date.year(), b.date.month()))
        .map(|month| {
            let n = month.len() as f64;
            let mean = |f: fn(&ForecastDay) -> f64| month.iter().map(f).sum::<f64>() / n;

            MonthlySummary {
                year: month[0].date.year(),
                month: month[0].date.month(),
                days: month.len(),
                avg_temperature: mean(|d| d.temperature_avg),
                avg_high: mean(|d| d.temperature_max),
                avg_low: mean(|d| d.temperature_min),
                total_precipitation: month.iter().map(|d| d.precipitation).sum(),
                avg_humidity: mean(|d| d.humidity),
            }
        })
        .collect()
}

pub fn recommendation(day: &ForecastDay) -> &'static str {
    match day.condition {
        Condition::LightRain => "Light rain expected, consider an umbrella",
        Condition::Rain => "Rain likely, be prepared",
        Condition::HeavyRain => "Carry an umbrella, heavy rain expected",
        Condition::Cloudy => "Cloudy conditions expected",
        Condition::PartlyCloudy => "Partly cloudy, good for outdoor activities",
        Condition::Sunny if day.temperature_avg > 30.0 => "Sunny and hot, stay hydrated",
        Condition::Sunny => "Sunny conditions, great day ahead",
        Condition::Thunderstorm => "Thunderstorms expected, stay indoors",
        Condition::Snow => "Snowy conditions, dress warmly",
        Condition::Fog | Condition::Mist => "Foggy conditions, drive carefully",
        Condition::Unknown if day.precipitation > 0.0 => "Precipitation expected",
        Condition::Unknown => "Comfortable weather conditions",
    }
}

/// Terminal glyph for a day. `Unknown` is guessed from precipitation.
pub fn symbol(condition: Condition, precipitation: f64) -> &'static str {
    match condition {
        Condition::Sunny => "☀",
        Condition::PartlyCloudy => "⛅",
        Condition::Cloudy => "☁",
        Condition::LightRain => "🌦",
        Condition::Rain => "🌧",
        Condition::HeavyRain => "🌧🌧",
        Condition::Thunderstorm => "⛈",
        Condition::Snow => "❄",
        Condition::Fog | Condition::Mist => "🌫",
        Condition::Unknown if precipitation > 10.0 => "🌧🌧",
        Condition::Unknown if precipitation > 5.0 => "🌧",
        Condition::Unknown if precipitation > 0.0 => "🌦",
        Condition::Unknown => "☁",
    }
}
