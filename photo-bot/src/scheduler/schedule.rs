//! Delivery schedule expressions.
//!
//! Accepts classic 5-field crontab lines (minute precision, day-of-week 0-7
//! with Sunday as 0 or 7), the 6/7-field form with seconds understood by the
//! `cron` crate, and `@hourly`-style descriptors.
//!
//! In a 5-field line where both day-of-month and day-of-week are restricted,
//! a day matches when either field matches, as in crontab.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, TimeZone};

use crate::{Error, Result};

/// A parsed delivery schedule.
#[derive(Clone)]
pub struct DeliverySchedule {
    expression: String,
    /// Fires when any of these fires.
    schedules: Vec<cron::Schedule>,
}

impl DeliverySchedule {
    pub fn parse(expression: &str) -> Result<Self> {
        let expression = expression.trim();
        let schedules = expand(expression)
            .iter()
            .map(|normalized| cron::Schedule::from_str(normalized))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::config(format!("invalid CRON_SPEC '{expression}': {e}")))?;

        Ok(Self {
            expression: expression.to_string(),
            schedules,
        })
    }

    /// The expression as configured.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First occurrence strictly after `after`.
    pub fn next_after<Z: TimeZone>(&self, after: &DateTime<Z>) -> Option<DateTime<Z>> {
        self.schedules
            .iter()
            .filter_map(|schedule| schedule.after(after).next())
            .min()
    }

    /// Time from `now` until the first occurrence after `after`.
    pub fn wait_from<Z: TimeZone>(
        &self,
        after: &DateTime<Z>,
        now: &DateTime<Z>,
    ) -> Option<(DateTime<Z>, Duration)> {
        let next = self.next_after(after)?;
        let wait = (next.clone() - now.clone())
            .to_std()
            .unwrap_or(Duration::ZERO);
        Some((next, wait))
    }
}

impl fmt::Debug for DeliverySchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DeliverySchedule")
            .field(&self.expression)
            .finish()
    }
}

/// Split a 5-field line restricting both day fields into its two halves.
fn expand(expression: &str) -> Vec<String> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    if let [minute, hour, day_of_month, month, day_of_week] = fields[..]
        && is_restricted(day_of_month)
        && is_restricted(day_of_week)
    {
        return vec![
            normalize(&format!("{minute} {hour} {day_of_month} {month} *")),
            normalize(&format!("{minute} {hour} * {month} {day_of_week}")),
        ];
    }
    vec![normalize(expression)]
}

fn is_restricted(field: &str) -> bool {
    !matches!(field, "*" | "?" | "*/1")
}

/// Rewrite a classic crontab line into the `cron` crate dialect.
fn normalize(expression: &str) -> String {
    if expression.starts_with('@') {
        return expression.to_ascii_lowercase();
    }

    let fields: Vec<&str> = expression.split_whitespace().collect();
    if fields.len() != 5 {
        return fields.join(" ");
    }

    format!(
        "0 {} {} {} {} {}",
        fields[0],
        fields[1],
        fields[2],
        fields[3],
        translate_day_of_week(fields[4])
    )
}

/// Crontab numbers days 0-7 from Sunday (0 and 7 both Sunday); the `cron`
/// crate numbers them 1-7 from Sunday. Names pass through unchanged.
fn translate_day_of_week(field: &str) -> String {
    field
        .split(',')
        .map(|part| {
            let (range, step) = match part.split_once('/') {
                Some((range, step)) => (range, Some(step)),
                None => (part, None),
            };

            match range.split_once('-') {
                Some((start, end)) => translate_range(start, end, step),
                None => {
                    let day = shift_day(range);
                    match step {
                        Some(step) => format!("{day}/{step}"),
                        None => day,
                    }
                }
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn translate_range(start: &str, end: &str, step: Option<&str>) -> String {
    let bounds = (start.parse::<u8>(), end.parse::<u8>());

    match (bounds, step) {
        // Numeric ranges with a step become an explicit day list, since a
        // range through Sunday (7) wraps to 1.
        ((Ok(first), Ok(last)), Some(step)) if first <= last && last <= 7 => {
            match step.parse::<usize>() {
                Ok(step) if step > 0 => (first..=last)
                    .step_by(step)
                    .map(|day| shift_day(&day.to_string()))
                    .collect::<Vec<_>>()
                    .join(","),
                _ => format!("{}-{}/{step}", shift_day(start), shift_day(end)),
            }
        }
        ((_, Ok(7)), None) => format!("{}-7,1", shift_day(start)),
        (_, Some(step)) => format!("{}-{}/{step}", shift_day(start), shift_day(end)),
        (_, None) => format!("{}-{}", shift_day(start), shift_day(end)),
    }
}

fn shift_day(value: &str) -> String {
    match value.parse::<u8>() {
        Ok(7) => "1".to_string(),
        Ok(day) if day < 7 => (day + 1).to_string(),
        _ => value.to_string(),
    }
}
