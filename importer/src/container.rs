use crate::error::ImportError;
use anyhow::{Context, Result};
use serde_json::Value as JsonValue;

/// The recognized top-level keys of a trace container. Anything else spills
/// into model metadata.
const RECOGNIZED_KEYS: &[&str] = &[
    "traceEvents",
    "systemTraceEvents",
    "battorLogAsString",
    "samples",
    "stackFrames",
    "displayTimeUnit",
    "traceAnnotations",
];

/// A parsed trace container: the event array plus the auxiliary top-level
/// payloads this importer understands.
#[derive(Debug, Default)]
pub struct TraceContainer {
    pub trace_events: Vec<JsonValue>,
    /// Payloads owned by other importers; carried, never interpreted here.
    pub system_trace_events: Option<String>,
    pub battor_log_as_string: Option<String>,
    pub samples: Vec<JsonValue>,
    pub stack_frames: Option<serde_json::Map<String, JsonValue>>,
    pub display_time_unit: Option<String>,
    pub trace_annotations: Option<serde_json::Map<String, JsonValue>>,
    /// Unrecognized top-level keys, in source order.
    pub metadata: Vec<(String, JsonValue)>,
}

impl TraceContainer {
    /// Parses a serialized trace. A bare event array with a missing
    /// trailing `]` is repaired before parsing.
    pub fn from_str(text: &str) -> Result<Self> {
        let text = text.trim();
        let value: JsonValue = if text.starts_with('[') && !text.ends_with(']') {
            let mut repaired = text.trim_end().to_owned();
            if repaired.ends_with(',') {
                repaired.pop();
            }
            repaired.push(']');
            serde_json::from_str(&repaired).with_context(|| "parsing repaired trace events")?
        } else {
            serde_json::from_str(text).with_context(|| "parsing trace json")?
        };
        Self::from_json(value)
    }

    /// Interprets a parsed JSON value as a trace container.
    pub fn from_json(value: JsonValue) -> Result<Self> {
        let mut container = TraceContainer::default();
        match value {
            JsonValue::Array(events) => {
                container.trace_events = events;
            }
            JsonValue::Object(map) => {
                for (key, value) in map {
                    match key.as_str() {
                        "traceEvents" => {
                            container.trace_events =
                                value.as_array().cloned().unwrap_or_default();
                        }
                        "systemTraceEvents" => {
                            container.system_trace_events =
                                value.as_str().map(str::to_owned);
                        }
                        "battorLogAsString" => {
                            container.battor_log_as_string =
                                value.as_str().map(str::to_owned);
                        }
                        "samples" => {
                            container.samples = value.as_array().cloned().unwrap_or_default();
                        }
                        "stackFrames" => {
                            container.stack_frames = value.as_object().cloned();
                        }
                        "displayTimeUnit" => {
                            container.display_time_unit = value.as_str().map(str::to_owned);
                        }
                        "traceAnnotations" => {
                            container.trace_annotations = value.as_object().cloned();
                        }
                        _ => container.metadata.push((key, value)),
                    }
                }
            }
            _ => return Err(ImportError::UnimportableInput.into()),
        }
        Ok(container)
    }
}

/// Whether a serialized input looks like a trace this importer handles.
pub fn can_import_str(text: &str) -> bool {
    let text = text.trim_start();
    text.starts_with('{') || text.starts_with('[')
}

/// Whether a parsed JSON value looks like a trace this importer handles.
pub fn can_import_value(value: &JsonValue) -> bool {
    match value {
        JsonValue::Array(events) => events
            .first()
            .is_some_and(|event| event.get("ph").is_some()),
        JsonValue::Object(map) => {
            if let Some(events) = map.get("traceEvents") {
                return can_import_value(events);
            }
            map.contains_key("samples") && map.contains_key("stackFrames")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn repairs_a_truncated_event_array() {
        let container = TraceContainer::from_str(
            r#"[{"ph":"B","pid":1,"tid":1,"ts":0,"name":"a"},"#,
        )
        .unwrap();
        assert_eq!(container.trace_events.len(), 1);
    }

    #[test]
    fn unrecognized_keys_become_metadata() {
        let container = TraceContainer::from_json(json!({
            "traceEvents": [],
            "displayTimeUnit": "ns",
            "controllerTraceDataKey": "systraceData",
        }))
        .unwrap();
        assert_eq!(container.display_time_unit.as_deref(), Some("ns"));
        assert_eq!(container.metadata.len(), 1);
        assert_eq!(container.metadata[0].0, "controllerTraceDataKey");
    }

    #[test]
    fn acceptance_predicate() {
        assert!(can_import_str("  [{}]"));
        assert!(can_import_str("{\"traceEvents\":[]}"));
        assert!(!can_import_str("asdf"));
        assert!(can_import_value(&json!([{"ph": "B"}])));
        assert!(!can_import_value(&json!([{"nope": 1}])));
        assert!(can_import_value(&json!({"traceEvents": [{"ph": "X"}]})));
        assert!(can_import_value(&json!({"samples": [], "stackFrames": {}})));
        assert!(!can_import_value(&json!({"samples": []})));
    }
}
