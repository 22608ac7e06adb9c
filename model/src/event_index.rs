use std::collections::BTreeMap;

/// Reverse indices over the finalized model, for downstream analysis.
#[derive(Debug, Default)]
pub struct EventIndices {
    /// Flow event list indices grouped by flow id.
    pub flow_events_by_id: BTreeMap<String, Vec<usize>>,
}

impl EventIndices {
    pub fn new() -> Self {
        Self::default()
    }
}
