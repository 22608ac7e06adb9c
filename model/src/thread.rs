use crate::async_slice::AsyncSliceGroup;
use crate::bounds::Bounds;
use crate::slice_group::SliceGroup;

/// Model-wide thread address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadKey {
    pub pid: i64,
    pub tid: i64,
}

/// A thread within a process, identified by tid.
#[derive(Debug)]
pub struct Thread {
    pub tid: i64,
    pub name: Option<String>,
    pub sort_index: Option<i64>,
    pub slice_group: SliceGroup,
    pub async_slice_group: AsyncSliceGroup,
}

impl Thread {
    pub fn new(tid: i64) -> Self {
        Self {
            tid,
            name: None,
            sort_index: None,
            slice_group: SliceGroup::new(),
            async_slice_group: AsyncSliceGroup::new(),
        }
    }

    /// A thread that holds no events at all can be pruned after import.
    pub fn is_empty(&self) -> bool {
        self.slice_group.is_empty() && self.async_slice_group.is_empty()
    }

    pub fn bounds(&self) -> Bounds {
        let mut bounds = self.slice_group.bounds();
        bounds.add_bounds(&self.async_slice_group.bounds());
        bounds
    }

    pub fn shift_timestamps_forward(&mut self, amount: f64) {
        self.slice_group.shift_timestamps_forward(amount);
        self.async_slice_group.shift_timestamps_forward(amount);
    }
}
