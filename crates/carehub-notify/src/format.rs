//! Display helpers for notification lists and the bell badge

use crate::record::Sender;
use chrono::{DateTime, Utc};

const MINUTE: f64 = 60.0;
const HOUR: f64 = 60.0 * MINUTE;
const DAY: f64 = 24.0 * HOUR;
const MONTH: f64 = 30.436875 * DAY;
const YEAR: f64 = 12.0 * MONTH;

/// Relative age such as "3 minutes ago" or "a day ago".
///
/// Timestamps after `now` read as "in ...".
pub fn time_ago(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(created_at);
    let phrase = humanize(delta.num_seconds().unsigned_abs() as f64);

    if delta.num_seconds() < 0 {
        format!("in {}", phrase)
    } else {
        format!("{} ago", phrase)
    }
}

// Each unit is rounded before it is compared against its threshold.
fn humanize(secs: f64) -> String {
    let rounded = |unit: f64| (secs / unit).round() as u64;

    if rounded(1.0) <= 44 {
        return "a few seconds".to_string();
    }
    if rounded(1.0) <= 89 {
        return "a minute".to_string();
    }
    let minutes = rounded(MINUTE);
    if minutes <= 44 {
        return amount(minutes, "a minute", "minutes");
    }
    if minutes <= 89 {
        return "an hour".to_string();
    }
    let hours = rounded(HOUR);
    if hours <= 21 {
        return amount(hours, "an hour", "hours");
    }
    if hours <= 35 {
        return "a day".to_string();
    }
    let days = rounded(DAY);
    if days <= 25 {
        return amount(days, "a day", "days");
    }
    if days <= 45 {
        return "a month".to_string();
    }
    let months = rounded(MONTH);
    if months <= 10 {
        return amount(months, "a month", "months");
    }
    if months <= 17 {
        return "a year".to_string();
    }
    amount(rounded(YEAR), "a year", "years")
}

fn amount(count: u64, single: &str, unit: &str) -> String {
    if count <= 1 {
        single.to_string()
    } else {
        format!("{} {}", count, unit)
    }
}

/// Sender name as shown in lists; providers get a "DR " prefix
pub fn sender_label(sender: Option<&Sender>) -> String {
    let Some(sender) = sender else {
        return String::new();
    };
    let name = sender.first_name.as_deref().unwrap_or_default();
    if sender.is_provider() {
        format!("DR {}", name).trim_end().to_string()
    } else {
        name.to_string()
    }
}

/// Avatar fallback: the sender's first initial, uppercased
pub fn avatar_initial(sender: Option<&Sender>) -> Option<String> {
    let first = sender?.first_name.as_deref()?.chars().next()?;
    Some(first.to_uppercase().collect())
}

/// Badge text for the bell; nothing when all is read
pub fn badge(unread_count: usize) -> Option<String> {
    (unread_count > 0).then(|| unread_count.to_string())
}
