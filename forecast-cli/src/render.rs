use std::{
    fmt::Write as _,
    io::{self, Write as _},
};

use forecast_core::{
    FetchStatus, ForecastResponse, Horizon, Render,
    insights::{check_alerts, monthly_summaries, recommendation, symbol},
};

/// Prints a forecast block to stdout on every render.
#[derive(Debug, Clone, Copy)]
pub struct TerminalRenderer {
    horizon: Horizon,
}

impl TerminalRenderer {
    pub fn new(horizon: Horizon) -> Self {
        Self { horizon }
    }

    pub fn format(&self, response: &ForecastResponse, status: FetchStatus) -> String {
        let mut out = String::new();

        let _ = writeln!(
            out,
            "{} forecast, {} day(s) [{}]",
            match self.horizon {
                Horizon::ShortTerm => "Short-term",
                Horizon::LongTerm => "Long-term",
            },
            response.len(),
            status
        );
        if let Some(banner) = banner(status) {
            let _ = writeln!(out, "{banner}");
        }
        out.push('\n');

        match self.horizon {
            Horizon::ShortTerm => write_days(&mut out, response),
            Horizon::LongTerm => write_months(&mut out, response),
        }

        let alerts = check_alerts(response.days());
        if alerts.is_empty() {
            let _ = writeln!(out, "\nNo active weather alerts.");
        } else {
            let _ = writeln!(out, "\nAlerts:");
            for alert in alerts {
                let days: Vec<String> = alert
                    .days
                    .iter()
                    .map(|(date, v)| {
                        format!("{}: {:.1}{}", date.format("%a %d %b"), v, alert.kind.unit())
                    })
                    .collect();
                let _ = writeln!(
                    out,
                    "  {} on {} day(s). {}\n    {}",
                    alert.kind.title(),
                    alert.days.len(),
                    alert.kind.advice(),
                    days.join(", ")
                );
            }
        }

        out
    }
}

/// Non-live data must never look live.
fn banner(status: FetchStatus) -> Option<&'static str> {
    match status {
        FetchStatus::Live => None,
        FetchStatus::StaleCache => Some(
            "!! Backend unreachable: showing the last cached forecast, it may be out of date.",
        ),
        FetchStatus::SyntheticFallback => Some(
            "!! Live forecast unavailable: showing offline placeholder data, \
             not a real forecast.",
        ),
    }
}

fn write_days(out: &mut String, response: &ForecastResponse) {
    let _ = writeln!(
        out,
        "{:<11} {:<18} {:>6} {:>6} {:>6} {:>8} {:>5} {:>8} {:>7}",
        "Date", "Condition", "Avg", "Min", "Max", "Rain", "Hum", "Wind", "Press"
    );
    for d in response.days() {
        let _ = writeln!(
            out,
            "{:<11} {:<18} {:>6.1} {:>6.1} {:>6.1} {:>6.1}mm {:>4.0}% {:>5.1}m/s {:>7.0}",
            d.date.format("%a %d %b"),
            format!("{} {}", symbol(d.condition, d.precipitation), d.condition),
            d.temperature_avg,
            d.temperature_min,
            d.temperature_max,
            d.precipitation,
            d.humidity,
            d.wind_speed,
            d.pressure,
        );
        let _ = writeln!(out, "{:12}{}", "", recommendation(d));
    }
}

fn write_months(out: &mut String, response: &ForecastResponse) {
    let _ = writeln!(
        out,
        "{:<15} {:>5} {:>7} {:>7} {:>7} {:>9} {:>6}",
        "Month", "Days", "Avg", "High", "Low", "Rain", "Hum"
    );
    for m in monthly_summaries(response.days()) {
        let _ = writeln!(
            out,
            "{:<15} {:>5} {:>7.1} {:>7.1} {:>7.1} {:>7.0}mm {:>5.0}%",
            m.label(),
            m.days,
            m.avg_temperature,
            m.avg_high,
            m.avg_low,
            m.total_precipitation,
            m.avg_humidity,
        );
    }
}

impl Render for TerminalRenderer {
    fn render(&self, response: &ForecastResponse, status: FetchStatus) {
        let text = self.format(response, status);
        let mut stdout = io::stdout().lock();
        if let Err(e) = stdout.write_all(text.as_bytes()).and_then(|_| stdout.flush()) {
            tracing::warn!(error = %e, "could not write forecast to stdout");
        }
    }
}
