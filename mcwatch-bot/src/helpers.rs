use std::time::{SystemTime, UNIX_EPOCH};

pub fn now() -> i64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_secs() as i64)
    .unwrap_or_default()
}

/// Format seconds as `Xh Ym`, the way playtime is shown in chat.
pub fn format_hours_minutes(seconds: i64) -> String {
  let seconds = seconds.max(0);
  format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
}

/// Format a short elapsed time, picking the largest sensible unit.
pub fn format_time_online(seconds: i64) -> String {
  let seconds = seconds.max(0);
  if seconds < 60 {
    format!("{}s", seconds)
  } else if seconds < 3600 {
    format!("{}m", seconds / 60)
  } else {
    format_hours_minutes(seconds)
  }
}
