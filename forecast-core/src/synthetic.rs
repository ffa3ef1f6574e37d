//! Placeholder forecasts for when neither the backend nor the cache can help.

use chrono::NaiveDate;
use rand::{Rng, seq::SliceRandom, thread_rng};

use crate::model::{Condition, ForecastDay, ForecastResponse, Horizon};

const DRY_CONDITIONS: [Condition; 3] =
    [Condition::Sunny, Condition::PartlyCloudy, Condition::Cloudy];

/// Random but structurally valid data covering `horizon`, starting at `start`.
pub fn synthesize(horizon: Horizon, start: NaiveDate) -> ForecastResponse {
    synthesize_with(&mut thread_rng(), horizon, start)
}

pub fn synthesize_with<R: Rng>(
    rng: &mut R,
    horizon: Horizon,
    start: NaiveDate,
) -> ForecastResponse {
    let days = start
        .iter_days()
        .take(horizon.days())
        .map(|date| synthetic_day(rng, date))
        .collect();

    ForecastResponse::new(days)
}

fn synthetic_day<R: Rng>(rng: &mut R, date: NaiveDate) -> ForecastDay {
    let tavg = 25.0 + rng.gen_range(0.0..5.0);
    let precipitation = rng.gen_range(0.0..10.0);

    let condition = if precipitation > 7.0 {
        Condition::Rain
    } else if precipitation > 3.0 {
        Condition::LightRain
    } else {
        DRY_CONDITIONS.choose(rng).copied().unwrap_or(Condition::Cloudy)
    };

    ForecastDay {
        date,
        temperature_avg: round1(tavg),
        temperature_min: round1(tavg - rng.gen_range(3.0..6.0)),
        temperature_max: round1(tavg + rng.gen_range(3.0..6.0)),
        precipitation: round1(precipitation),
        humidity: round1(60.0 + rng.gen_range(0.0..20.0)),
        wind_speed: round1(5.0 + rng.gen_range(0.0..10.0)),
        pressure: round1(1010.0 + rng.gen_range(0.0..10.0)),
        condition,
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
