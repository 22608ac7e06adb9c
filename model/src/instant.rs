use crate::args::ArgDict;

/// An instant event at global scope, owned by the model.
#[derive(Debug, Clone)]
pub struct GlobalInstantEvent {
    pub category: String,
    pub title: String,
    pub color_id: u32,
    pub start: f64,
    pub args: ArgDict,
}

/// An instant event scoped to one process.
#[derive(Debug, Clone)]
pub struct ProcessInstantEvent {
    pub category: String,
    pub title: String,
    pub color_id: u32,
    pub start: f64,
    pub args: ArgDict,
}
