//! Structured recurrence patterns, as sent by Microsoft Graph.
//!
//! Graph describes recurrence as a pattern/range object pair instead of
//! RRULE text. This module translates that shape into the equivalent
//! RRULE line so the rest of the engine only ever evaluates RRULEs.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{MeetsyncError, MeetsyncResult};

fn default_interval() -> u32 {
    1
}

/// A pattern/range pair from a Graph event's `recurrence` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternedRecurrence {
    pub pattern: RecurrencePattern,
    pub range: RecurrenceRange,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrencePattern {
    #[serde(rename = "type")]
    pub pattern_type: String,
    #[serde(default = "default_interval")]
    pub interval: u32,
    #[serde(default)]
    pub days_of_week: Vec<String>,
    pub first_day_of_week: Option<String>,
    pub day_of_month: Option<u32>,
    pub month: Option<u32>,
    /// Week-of-period selector for relative patterns ("first".."last").
    pub index: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceRange {
    #[serde(rename = "type")]
    pub range_type: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub number_of_occurrences: Option<u32>,
}

impl PatternedRecurrence {
    /// The equivalent RRULE lines for this pattern.
    ///
    /// Unknown pattern or range types fail as validation errors, which
    /// makes the sync reconciler skip the one offending event.
    pub fn to_rrule(&self) -> MeetsyncResult<Vec<String>> {
        let mut parts = Vec::new();

        let p = &self.pattern;
        match p.pattern_type.as_str() {
            "daily" => {
                parts.push("FREQ=DAILY".to_string());
                parts.push(format!("INTERVAL={}", p.interval));
            }
            "weekly" => {
                parts.push("FREQ=WEEKLY".to_string());
                parts.push(format!("INTERVAL={}", p.interval));
                let wkst = p.first_day_of_week.as_deref().unwrap_or("sunday");
                parts.push(format!("WKST={}", weekday_token(wkst)?));
                parts.push(format!("BYDAY={}", byday_list(&p.days_of_week)?));
            }
            "absoluteMonthly" => {
                parts.push("FREQ=MONTHLY".to_string());
                parts.push(format!("INTERVAL={}", p.interval));
                parts.push(format!("BYMONTHDAY={}", p.day_of_month()?));
            }
            "absoluteYearly" => {
                parts.push("FREQ=YEARLY".to_string());
                parts.push(format!("INTERVAL={}", p.interval));
                parts.push(format!("BYMONTHDAY={}", p.day_of_month()?));
                parts.push(format!("BYMONTH={}", p.month()?));
            }
            "relativeMonthly" => {
                parts.push("FREQ=MONTHLY".to_string());
                parts.push(format!("INTERVAL={}", p.interval));
                parts.push(format!("BYSETPOS={}", p.set_position()?));
                parts.push(format!("BYDAY={}", byday_list(&p.days_of_week)?));
            }
            "relativeYearly" => {
                parts.push("FREQ=YEARLY".to_string());
                parts.push(format!("INTERVAL={}", p.interval));
                parts.push(format!("BYSETPOS={}", p.set_position()?));
                parts.push(format!("BYDAY={}", byday_list(&p.days_of_week)?));
                parts.push(format!("BYMONTH={}", p.month()?));
            }
            other => {
                return Err(MeetsyncError::Validation(format!(
                    "Invalid pattern type: {other}"
                )));
            }
        }

        match self.range.range_type.as_str() {
            "numbered" => {
                let count = self.range.number_of_occurrences.ok_or_else(|| {
                    MeetsyncError::Validation(
                        "numbered range without numberOfOccurrences".into(),
                    )
                })?;
                parts.push(format!("COUNT={count}"));
            }
            "endDate" => {
                let end = self.range.end_date.ok_or_else(|| {
                    MeetsyncError::Validation("endDate range without endDate".into())
                })?;
                parts.push(format!("UNTIL={}T000000Z", end.format("%Y%m%d")));
            }
            "noEnd" => {}
            other => {
                return Err(MeetsyncError::Validation(format!(
                    "Invalid range type: {other}"
                )));
            }
        }

        Ok(vec![format!("RRULE:{}", parts.join(";"))])
    }
}

impl RecurrencePattern {
    fn day_of_month(&self) -> MeetsyncResult<u32> {
        self.day_of_month
            .ok_or_else(|| MeetsyncError::Validation("pattern without dayOfMonth".into()))
    }

    fn month(&self) -> MeetsyncResult<u32> {
        self.month
            .ok_or_else(|| MeetsyncError::Validation("pattern without month".into()))
    }

    fn set_position(&self) -> MeetsyncResult<i32> {
        position_value(self.index.as_deref().unwrap_or("first"))
    }
}

fn weekday_token(day: &str) -> MeetsyncResult<&'static str> {
    match day.to_ascii_lowercase().as_str() {
        "monday" => Ok("MO"),
        "tuesday" => Ok("TU"),
        "wednesday" => Ok("WE"),
        "thursday" => Ok("TH"),
        "friday" => Ok("FR"),
        "saturday" => Ok("SA"),
        "sunday" => Ok("SU"),
        other => Err(MeetsyncError::Validation(format!(
            "Invalid weekday: {other}"
        ))),
    }
}

fn byday_list(days: &[String]) -> MeetsyncResult<String> {
    if days.is_empty() {
        return Err(MeetsyncError::Validation(
            "pattern without daysOfWeek".into(),
        ));
    }
    let tokens = days
        .iter()
        .map(|day| weekday_token(day))
        .collect::<MeetsyncResult<Vec<_>>>()?;
    Ok(tokens.join(","))
}

fn position_value(index: &str) -> MeetsyncResult<i32> {
    match index.to_ascii_lowercase().as_str() {
        "first" => Ok(1),
        "second" => Ok(2),
        "third" => Ok(3),
        "fourth" => Ok(4),
        "last" => Ok(-1),
        other => Err(MeetsyncError::Validation(format!(
            "Invalid pattern index: {other}"
        ))),
    }
}
