use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracemodel_model::args::{ArgDict, ArgValue};
use tracemodel_model::color::{color_id_for_general_purpose_string, color_id_for_reserved_name};

/// Sentinel an upstream sanitizer leaves behind when it removes arguments.
pub const STRIPPED_ARGS: &str = "__stripped__";

/// One raw trace event record. Every field is optional at the wire level;
/// the dispatcher validates what each phase actually needs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TraceEvent {
    pub ph: Option<String>,
    pub cat: Option<String>,
    pub name: Option<String>,
    pub pid: Option<i64>,
    pub tid: Option<i64>,
    pub ts: Option<f64>,
    pub dur: Option<f64>,
    pub tts: Option<f64>,
    pub tdur: Option<f64>,
    pub args: Option<JsonValue>,
    pub id: Option<JsonValue>,
    pub bind_id: Option<JsonValue>,
    pub s: Option<String>,
    pub bp: Option<String>,
    pub sf: Option<JsonValue>,
    pub stack: Option<Vec<JsonValue>>,
    pub esf: Option<JsonValue>,
    pub estack: Option<Vec<JsonValue>>,
    pub flow_in: Option<bool>,
    pub flow_out: Option<bool>,
    pub use_async_tts: Option<JsonValue>,
    pub cname: Option<String>,
}

impl TraceEvent {
    /// The single-character phase code, when well-formed.
    pub fn phase(&self) -> Option<char> {
        let ph = self.ph.as_deref()?;
        let mut chars = ph.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Some(c),
            _ => None,
        }
    }

    pub fn category(&self) -> &str {
        self.cat.as_deref().unwrap_or("")
    }

    pub fn title(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    /// Event ids may arrive as strings or numbers; both compare as strings.
    pub fn id_string(&self) -> Option<String> {
        json_id_string(self.id.as_ref()?)
    }

    pub fn bind_id_string(&self) -> Option<String> {
        json_id_string(self.bind_id.as_ref()?)
    }

    pub fn args_stripped(&self) -> bool {
        matches!(&self.args, Some(JsonValue::String(s)) if s == STRIPPED_ARGS)
    }

    /// The args object, with the stripped sentinel reading as absent.
    pub fn args_object(&self) -> Option<&serde_json::Map<String, JsonValue>> {
        if self.args_stripped() {
            return None;
        }
        self.args.as_ref()?.as_object()
    }

    pub fn arg_dict(&self) -> ArgDict {
        self.args_object().map(arg_dict_from_object).unwrap_or_default()
    }

    pub fn use_async_tts(&self) -> bool {
        json_is_truthy(self.use_async_tts.as_ref())
    }

    /// Reserved color from `cname` when present, hashed title otherwise.
    pub fn color_id(&self) -> u32 {
        match self.cname.as_deref() {
            Some(cname) => color_id_for_reserved_name(cname),
            None => color_id_for_general_purpose_string(self.title()),
        }
    }
}

pub fn json_id_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn json_is_truthy(value: Option<&JsonValue>) -> bool {
    match value {
        None | Some(JsonValue::Null) => false,
        Some(JsonValue::Bool(b)) => *b,
        Some(JsonValue::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(JsonValue::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// Deep conversion of a JSON value into the model's argument union.
pub fn arg_value_from_json(value: &JsonValue) -> ArgValue {
    match value {
        JsonValue::Null => ArgValue::Null,
        JsonValue::Bool(b) => ArgValue::Bool(*b),
        JsonValue::Number(n) => ArgValue::Number(n.as_f64().unwrap_or(0.0)),
        JsonValue::String(s) => ArgValue::String(s.clone()),
        JsonValue::Array(items) => {
            ArgValue::Array(items.iter().map(arg_value_from_json).collect())
        }
        JsonValue::Object(map) => ArgValue::Dict(arg_dict_from_object(map)),
    }
}

pub fn arg_dict_from_object(map: &serde_json::Map<String, JsonValue>) -> ArgDict {
    map.iter()
        .map(|(key, value)| (key.clone(), arg_value_from_json(value)))
        .collect()
}
