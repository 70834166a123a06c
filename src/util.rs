//! Small time helpers shared by signals, devices and the session.

use chrono::{Local, TimeZone, Utc};

/// Current wall-clock time as seconds since the Unix epoch.
pub fn now_timestamp() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Format an epoch timestamp (seconds) as local `yyyy.MM.dd hh:mm:ss.zzz`.
pub fn format_time_date(t: f64) -> String {
    if !t.is_finite() {
        return format!("{t}");
    }
    match Local.timestamp_millis_opt((t * 1000.0).round() as i64).single() {
        Some(dt) => dt.format("%Y.%m.%d %H:%M:%S%.3f").to_string(),
        None => format!("{t}"),
    }
}
