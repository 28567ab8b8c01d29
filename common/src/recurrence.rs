// Recurrence expression parsing and next fire time calculation
//
// Reminders use the classic 5-field cron layout (minute hour day-of-month month
// day-of-week). Each field is expanded into its explicit value set and handed to
// the `cron` crate in its seconds-first form, which does the calendar walking.

use crate::errors::SchedulingError;
use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// IANA name of the timezone every reminder is evaluated in
pub const DEFAULT_TIMEZONE: &str = "America/Sao_Paulo";

/// Get the default timezone for reminders
pub fn default_timezone() -> Tz {
    chrono_tz::America::Sao_Paulo
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Minute,
    Hour,
    DayOfMonth,
    Month,
    DayOfWeek,
}

impl Field {
    const ALL: [Field; 5] = [
        Field::Minute,
        Field::Hour,
        Field::DayOfMonth,
        Field::Month,
        Field::DayOfWeek,
    ];

    fn name(self) -> &'static str {
        match self {
            Field::Minute => "minute",
            Field::Hour => "hour",
            Field::DayOfMonth => "day-of-month",
            Field::Month => "month",
            Field::DayOfWeek => "day-of-week",
        }
    }

    fn bounds(self) -> (u32, u32) {
        match self {
            Field::Minute => (0, 59),
            Field::Hour => (0, 23),
            Field::DayOfMonth => (1, 31),
            Field::Month => (1, 12),
            Field::DayOfWeek => (0, 6),
        }
    }

    fn width(self) -> usize {
        let (min, max) = self.bounds();
        (max - min + 1) as usize
    }
}

/// A parsed 5-field recurrence expression
#[derive(Debug, Clone)]
pub struct RecurrenceExpression {
    source: String,
    minutes: BTreeSet<u32>,
    hours: BTreeSet<u32>,
    days_of_month: BTreeSet<u32>,
    months: BTreeSet<u32>,
    days_of_week: BTreeSet<u32>,
    /// One schedule normally; two when both day fields are restricted, since a
    /// day then matches if either field matches
    schedules: Vec<CronSchedule>,
}

impl RecurrenceExpression {
    /// The expression exactly as it was supplied
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Next matching instant strictly after `after`, evaluated in `timezone`
    pub fn next_after(&self, after: DateTime<Utc>, timezone: Tz) -> Option<DateTime<Utc>> {
        let local = after.with_timezone(&timezone);
        self.schedules
            .iter()
            .filter_map(|schedule| schedule.after(&local).next())
            .min()
            .map(|next| next.with_timezone(&Utc))
    }

    /// The next `count` occurrences after `after`
    pub fn upcoming(&self, after: DateTime<Utc>, timezone: Tz, count: usize) -> Vec<DateTime<Utc>> {
        let mut occurrences = Vec::with_capacity(count);
        let mut reference = after;
        while occurrences.len() < count {
            match self.next_after(reference, timezone) {
                Some(next) => {
                    occurrences.push(next);
                    reference = next;
                }
                None => break,
            }
        }
        occurrences
    }

    /// Whether the given instant falls on a matching minute in `timezone`
    pub fn matches(&self, instant: DateTime<Utc>, timezone: Tz) -> bool {
        let local = instant.with_timezone(&timezone);
        if !self.minutes.contains(&local.minute())
            || !self.hours.contains(&local.hour())
            || !self.months.contains(&local.month())
        {
            return false;
        }

        let dom_match = self.days_of_month.contains(&local.day());
        let dow_match = self
            .days_of_week
            .contains(&local.weekday().num_days_from_sunday());

        if self.day_fields_both_restricted() {
            dom_match || dow_match
        } else {
            dom_match && dow_match
        }
    }

    fn day_fields_both_restricted(&self) -> bool {
        self.days_of_month.len() < Field::DayOfMonth.width()
            && self.days_of_week.len() < Field::DayOfWeek.width()
    }
}

impl fmt::Display for RecurrenceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for RecurrenceExpression {
    type Err = SchedulingError;

    fn from_str(expression: &str) -> Result<Self, Self::Err> {
        parse_recurrence(expression)
    }
}

/// Parse and validate a 5-field recurrence expression
pub fn parse_recurrence(expression: &str) -> Result<RecurrenceExpression, SchedulingError> {
    let invalid = |reason: String| SchedulingError::InvalidExpression {
        expression: expression.to_string(),
        reason,
    };

    let parts: Vec<&str> = expression.split_whitespace().collect();
    if parts.len() != Field::ALL.len() {
        return Err(invalid(format!(
            "expected 5 fields (minute hour day-of-month month day-of-week), found {}",
            parts.len()
        )));
    }

    let mut sets = Vec::with_capacity(Field::ALL.len());
    for (raw, field) in parts.iter().zip(Field::ALL) {
        sets.push(parse_field(raw, field).map_err(invalid)?);
    }

    let days_of_week = sets.pop().unwrap_or_default();
    let months = sets.pop().unwrap_or_default();
    let days_of_month = sets.pop().unwrap_or_default();
    let hours = sets.pop().unwrap_or_default();
    let minutes = sets.pop().unwrap_or_default();

    let minute = render_field(&minutes, Field::Minute);
    let hour = render_field(&hours, Field::Hour);
    let dom = render_field(&days_of_month, Field::DayOfMonth);
    let month = render_field(&months, Field::Month);
    let dow = render_field(&days_of_week, Field::DayOfWeek);

    let dom_restricted = days_of_month.len() < Field::DayOfMonth.width();
    let dow_restricted = days_of_week.len() < Field::DayOfWeek.width();

    let cron_expressions = if dom_restricted && dow_restricted {
        vec![
            format!("0 {} {} {} {} *", minute, hour, dom, month),
            format!("0 {} {} * {} {}", minute, hour, month, dow),
        ]
    } else {
        vec![format!("0 {} {} {} {} {}", minute, hour, dom, month, dow)]
    };

    let schedules = cron_expressions
        .iter()
        .map(|expr| {
            CronSchedule::from_str(expr).map_err(|e| SchedulingError::InvalidExpression {
                expression: expression.to_string(),
                reason: e.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RecurrenceExpression {
        source: expression.trim().to_string(),
        minutes,
        hours,
        days_of_month,
        months,
        days_of_week,
        schedules,
    })
}

/// Expand one field (`*`, `n`, `a-b`, `*/s`, `n/s`, `a-b/s`, comma lists) into its values
fn parse_field(raw: &str, field: Field) -> Result<BTreeSet<u32>, String> {
    let (min, max) = field.bounds();
    let mut values = BTreeSet::new();

    for element in raw.split(',') {
        if element.is_empty() {
            return Err(format!("{} field has an empty list element", field.name()));
        }

        let (range, step) = match element.split_once('/') {
            Some((range, step)) => (range, Some(parse_number(step, field)?)),
            None => (element, None),
        };

        if step == Some(0) {
            return Err(format!("{} step must be at least 1", field.name()));
        }

        let (start, end) = if range == "*" {
            (min, max)
        } else if let Some((start, end)) = range.split_once('-') {
            let start = parse_number(start, field)?;
            let end = parse_number(end, field)?;
            if start > end {
                return Err(format!(
                    "{} range {}-{} is descending",
                    field.name(),
                    start,
                    end
                ));
            }
            (start, end)
        } else {
            let value = parse_number(range, field)?;
            // `n/s` runs from n to the end of the field
            if step.is_some() {
                (value, max)
            } else {
                (value, value)
            }
        };

        for bound in [start, end] {
            if bound < min || bound > max {
                return Err(format!(
                    "{} value {} out of range {}-{}",
                    field.name(),
                    bound,
                    min,
                    max
                ));
            }
        }

        values.extend((start..=end).step_by(step.unwrap_or(1) as usize));
    }

    Ok(values)
}

fn parse_number(raw: &str, field: Field) -> Result<u32, String> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("{} field has invalid value '{}'", field.name(), raw));
    }
    raw.parse::<u32>()
        .map_err(|e| format!("{} field has invalid value '{}': {}", field.name(), raw, e))
}

/// Render a value set in the `cron` crate's syntax. Day-of-week shifts by one
/// because that crate numbers Sunday as 1.
fn render_field(values: &BTreeSet<u32>, field: Field) -> String {
    if values.len() == field.width() {
        return "*".to_string();
    }
    let offset = if field == Field::DayOfWeek { 1 } else { 0 };
    values
        .iter()
        .map(|v| (v + offset).to_string())
        .collect::<Vec<_>>()
        .join(",")
}
