/// Calendar aggregation
///
/// Calendars come from the hub's HTTP API, one request per calendar over a
/// fixed day window. The hub reports all-day events with a `date` field and
/// timed events with a `dateTime` field; both are normalized to a single
/// epoch-milliseconds number so the displays sort and render one merged
/// timeline.
use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use serde_json::{json, Value};

use crate::upstream::{UpstreamConnector, UpstreamError};

/// Fetch, normalize and merge upcoming events from the named calendars
pub async fn fetch_calendar_events(
    upstream: &UpstreamConnector,
    calendars: &[String],
    days: i64,
) -> Result<Vec<Value>, UpstreamError> {
    let start = Utc::now();
    let end = start + Duration::days(days);

    let mut events: Vec<Value> = Vec::new();
    for calendar in calendars {
        let endpoint = format!(
            "calendars/{}?start={}&end={}",
            calendar,
            start.to_rfc3339_opts(SecondsFormat::Millis, true),
            end.to_rfc3339_opts(SecondsFormat::Millis, true),
        );
        let result = upstream.http_get(&endpoint).await?;
        if let Value::Array(list) = result {
            events.extend(list);
        }
    }

    for event in &mut events {
        normalize_event_times(event);
    }
    merge_sort_events(&mut events);
    Ok(events)
}

/// Replace `start`/`end` objects with epoch-milliseconds numbers
pub(crate) fn normalize_event_times(event: &mut Value) {
    for key in ["start", "end"] {
        let Some(field) = event.get(key) else {
            continue;
        };

        let millis = field
            .get("date")
            .and_then(Value::as_str)
            .and_then(date_to_millis)
            .or_else(|| {
                field
                    .get("dateTime")
                    .and_then(Value::as_str)
                    .and_then(datetime_to_millis)
            });

        if let Some(ms) = millis {
            event[key] = json!(ms);
        }
    }
}

/// Sort events ascending by normalized start time
pub(crate) fn merge_sort_events(events: &mut [Value]) {
    events.sort_by_key(|e| e.get("start").and_then(Value::as_i64).unwrap_or(i64::MAX));
}

/// All-day events: midnight UTC of the given date
fn date_to_millis(date: &str) -> Option<i64> {
    let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    Some(parsed.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis())
}

fn datetime_to_millis(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.timestamp_millis())
}
