use crate::args::ArgDict;
use crate::slice::SliceKey;

/// A directed causality link between two slices.
///
/// Endpoints are stored as slice addresses rather than owning pointers so
/// the graph survives independent mutation of the thread groups.
#[derive(Debug, Clone)]
pub struct FlowEvent {
    pub category: String,
    pub title: String,
    pub color_id: u32,
    pub id: String,
    pub start: f64,
    pub end: f64,
    pub args: ArgDict,
    pub start_slice: Option<SliceKey>,
    pub end_slice: Option<SliceKey>,
}

impl FlowEvent {
    pub fn new(category: String, title: String, color_id: u32, id: String, start: f64) -> Self {
        Self {
            category,
            title,
            color_id,
            id,
            start,
            end: start,
            args: ArgDict::new(),
            start_slice: None,
            end_slice: None,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}
