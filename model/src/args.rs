use std::collections::BTreeMap;

/// Arena reference to an object snapshot, scoped by the owning process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapshotRef {
    pub pid: i64,
    pub snapshot: usize,
}

/// Argument dictionary with deterministic key ordering.
pub type ArgDict = BTreeMap<String, ArgValue>;

/// A dynamic trace argument value.
///
/// Snapshot references are first-class members of the union so that object
/// graphs can point back into the snapshot arena without owning pointers.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<ArgValue>),
    Dict(ArgDict),
    Snapshot(SnapshotRef),
}

impl ArgValue {
    pub fn as_str(&self) -> Option<&str> {
        if let ArgValue::String(s) = self {
            Some(s.as_str())
        } else {
            None
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ArgValue::Number(n) => Some(*n),
            ArgValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&ArgDict> {
        if let ArgValue::Dict(d) = self {
            Some(d)
        } else {
            None
        }
    }

    pub fn as_dict_mut(&mut self) -> Option<&mut ArgDict> {
        if let ArgValue::Dict(d) = self {
            Some(d)
        } else {
            None
        }
    }

    pub fn get(&self, key: &str) -> Option<&ArgValue> {
        self.as_dict().and_then(|d| d.get(key))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ArgValue::Null)
    }
}

/// Merges `incoming` into `dest`, key by key. The `params` key gets a
/// one-level-deep dictionary merge; every other conflict is won by the
/// incoming value.
pub fn merge_args(dest: &mut ArgDict, incoming: &ArgDict) {
    for (key, value) in incoming {
        if key == "params" {
            if let (Some(dest_params), Some(new_params)) = (
                dest.get_mut(key).and_then(ArgValue::as_dict_mut),
                value.as_dict(),
            ) {
                for (k, v) in new_params {
                    dest_params.insert(k.clone(), v.clone());
                }
                continue;
            }
        }
        dest.insert(key.clone(), value.clone());
    }
}
