/// History gap-filling
///
/// The hub's statistics queries return one datapoint per hour, but only for
/// hours with recorded data. Displays render the series as fixed-width
/// hourly bars, so silent periods are padded with zero-mean placeholders:
/// a caller gets one datapoint per elapsed hour in the window.
use serde_json::{json, Map, Value};

const HOUR_MS: f64 = 3_600_000.0;

/// Pad each entity's ordered hourly datapoints with zero-mean placeholders
/// wherever consecutive points are more than an hour apart.
pub fn fill_history_gaps(result: &Value) -> Map<String, Value> {
    let mut processed = Map::new();
    let Some(entries) = result.as_object() else {
        return processed;
    };

    for (entity_id, history) in entries {
        let mut padded: Vec<Value> = Vec::new();
        let mut prev_end: Option<f64> = None;

        if let Some(points) = history.as_array() {
            for point in points {
                if let (Some(prev), Some(start)) =
                    (prev_end, point.get("start").and_then(Value::as_f64))
                {
                    let delta = start - prev;
                    if delta >= HOUR_MS {
                        let missing_hours = (delta / HOUR_MS).floor() as usize;
                        for _ in 0..missing_hours {
                            padded.push(json!({ "mean": 0 }));
                        }
                    }
                }
                padded.push(point.clone());
                prev_end = point.get("end").and_then(Value::as_f64);
            }
        }

        processed.insert(entity_id.clone(), Value::Array(padded));
    }

    processed
}
