use crate::args::ArgDict;
use crate::bounds::Bounds;
use crate::thread::ThreadKey;

/// A multi-thread, possibly multi-phase asynchronous operation.
#[derive(Debug, Clone)]
pub struct AsyncSlice {
    pub category: String,
    pub title: String,
    pub color_id: u32,
    pub start: f64,
    pub duration: f64,
    pub args: ArgDict,
    pub id: Option<String>,
    pub start_thread: Option<ThreadKey>,
    pub end_thread: Option<ThreadKey>,
    pub start_stack_frame: Option<String>,
    pub end_stack_frame: Option<String>,
    pub thread_start: Option<f64>,
    pub thread_duration: Option<f64>,
    /// Set when the begin/end pairing was incomplete.
    pub error: Option<String>,
    pub is_top_level: bool,
    pub sub_slices: Vec<AsyncSlice>,
}

impl AsyncSlice {
    pub fn new(category: String, title: String, color_id: u32, start: f64) -> Self {
        Self {
            category,
            title,
            color_id,
            start,
            duration: 0.0,
            args: ArgDict::new(),
            id: None,
            start_thread: None,
            end_thread: None,
            start_stack_frame: None,
            end_stack_frame: None,
            thread_start: None,
            thread_duration: None,
            error: None,
            is_top_level: false,
            sub_slices: Vec::new(),
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    fn add_to_bounds(&self, bounds: &mut Bounds) {
        bounds.add_range(self.start, self.end());
        for sub in &self.sub_slices {
            sub.add_to_bounds(bounds);
        }
    }

    fn shift_timestamps_forward(&mut self, amount: f64) {
        self.start += amount;
        for sub in &mut self.sub_slices {
            sub.shift_timestamps_forward(amount);
        }
    }
}

/// Per-thread container of top-level asynchronous slices.
#[derive(Debug, Default)]
pub struct AsyncSliceGroup {
    pub slices: Vec<AsyncSlice>,
}

impl AsyncSliceGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    pub fn push(&mut self, slice: AsyncSlice) {
        self.slices.push(slice);
    }

    pub fn bounds(&self) -> Bounds {
        let mut bounds = Bounds::new();
        for slice in &self.slices {
            slice.add_to_bounds(&mut bounds);
        }
        bounds
    }

    pub fn shift_timestamps_forward(&mut self, amount: f64) {
        for slice in &mut self.slices {
            slice.shift_timestamps_forward(amount);
        }
    }
}
