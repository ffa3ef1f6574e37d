//! Turns whatever the backend sent into a `ForecastResponse`.
//!
//! The backend has answered with several payload shapes and field spellings
//! over time. Accepted shapes, checked in order:
//! - a bare array of days
//! - `{ "forecast": [...] }`
//! - `{ "data": [...] }`
//! - `{ "weather": [...] }`
//!
//! Within a day the short code (`tavg`) wins over the verbose alias
//! (`temp_avg`); a field missing under both names becomes `0`
//! (`Unknown` for the condition).

use chrono::NaiveDate;
use serde_json::{Map, Value};
use tracing::debug;

use crate::{
    error::ShapeError,
    model::{Condition, ForecastDay, ForecastResponse},
};

const ARRAY_KEYS: [&str; 3] = ["forecast", "data", "weather"];

/// Parse a raw response body.
pub fn parse_payload(body: &str) -> Result<ForecastResponse, ShapeError> {
    let value: Value = serde_json::from_str(body)?;
    normalize_payload(&value)
}

pub fn normalize_payload(value: &Value) -> Result<ForecastResponse, ShapeError> {
    let entries = locate_forecast_array(value)?;
    if entries.is_empty() {
        return Err(ShapeError::EmptyForecast);
    }

    let days: Vec<ForecastDay> = entries.iter().filter_map(normalize_day).collect();
    if days.is_empty() {
        return Err(ShapeError::NoUsableDays);
    }

    Ok(ForecastResponse::new(days))
}

fn locate_forecast_array(value: &Value) -> Result<&Vec<Value>, ShapeError> {
    let map = match value {
        Value::Array(items) => return Ok(items),
        Value::Object(map) => map,
        _ => return Err(ShapeError::MissingArray),
    };

    if let Some(items) = ARRAY_KEYS
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_array))
    {
        return Ok(items);
    }

    match map.get("error") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Err(ShapeError::MissingArray),
        Some(err) => {
            let message = map
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| match err {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                });
            Err(ShapeError::Backend(message))
        }
    }
}

/// Returns `None` for entries that are not objects or lack a parseable date.
fn normalize_day(entry: &Value) -> Option<ForecastDay> {
    let Some(obj) = entry.as_object() else {
        debug!(?entry, "skipping non-object forecast entry");
        return None;
    };

    let Some(date) = obj.get("date").and_then(Value::as_str).and_then(parse_date) else {
        debug!(date = ?obj.get("date"), "skipping forecast entry without usable date");
        return None;
    };

    Some(ForecastDay {
        date,
        temperature_avg: field(obj, "tavg", Some("temp_avg")),
        temperature_min: field(obj, "tmin", Some("temp_min")),
        temperature_max: field(obj, "tmax", Some("temp_max")),
        precipitation: field(obj, "prcp", Some("precipitation")).max(0.0),
        humidity: field(obj, "humidity", None).clamp(0.0, 100.0),
        wind_speed: field(obj, "wspd", Some("wind_speed")).max(0.0),
        pressure: field(obj, "pres", Some("pressure")),
        condition: obj
            .get("condition")
            .and_then(Value::as_str)
            .map(Condition::parse)
            .unwrap_or_default(),
    })
}

/// Accepts `YYYY-MM-DD` optionally followed by a time part.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let head = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

fn field(obj: &Map<String, Value>, short: &str, alias: Option<&str>) -> f64 {
    number(obj, short)
        .or_else(|| alias.and_then(|a| number(obj, a)))
        .unwrap_or(0.0)
}

/// Finite number, or a string holding one. Anything else counts as absent.
fn number(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    let n = match obj.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}
