use crate::args::ArgDict;

/// Role of a slice in the v2 flow protocol, derived from the presence of
/// `flow_in`/`flow_out` on its complete event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowPhase {
    #[default]
    None,
    Producer,
    Consumer,
    Step,
}

/// Address of a slice: process, thread, and index inside the thread's group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SliceKey {
    pub pid: i64,
    pub tid: i64,
    pub index: usize,
}

/// A synchronous slice on a thread. A slice with no duration is still open.
#[derive(Debug, Clone)]
pub struct Slice {
    pub category: String,
    pub title: String,
    pub color_id: u32,
    pub start: f64,
    pub duration: Option<f64>,
    pub thread_start: Option<f64>,
    pub thread_duration: Option<f64>,
    pub args: ArgDict,
    pub args_stripped: bool,
    /// Fully-qualified stack frame ids; frames live in the model table.
    pub start_stack_frame: Option<String>,
    pub end_stack_frame: Option<String>,
    pub bind_id: Option<String>,
    pub flow_phase: FlowPhase,
    /// Indices into the model's flow event list.
    pub in_flow_events: Vec<usize>,
    pub out_flow_events: Vec<usize>,
    /// Nesting links inside the owning group, built at finalization.
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

impl Slice {
    pub fn new(category: String, title: String, color_id: u32, start: f64) -> Self {
        Self {
            category,
            title,
            color_id,
            start,
            duration: None,
            thread_start: None,
            thread_duration: None,
            args: ArgDict::new(),
            args_stripped: false,
            start_stack_frame: None,
            end_stack_frame: None,
            bind_id: None,
            flow_phase: FlowPhase::None,
            in_flow_events: Vec::new(),
            out_flow_events: Vec::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.duration.is_none()
    }

    /// End timestamp; open slices extend indefinitely until auto-closed.
    pub fn end(&self) -> f64 {
        match self.duration {
            Some(duration) => self.start + duration,
            None => f64::INFINITY,
        }
    }

    pub fn contains_ts(&self, ts: f64) -> bool {
        ts >= self.start && ts <= self.end()
    }
}
