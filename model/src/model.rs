use crate::args::{ArgDict, ArgValue};
use crate::bounds::Bounds;
use crate::event_index::EventIndices;
use crate::flow::FlowEvent;
use crate::import_warning::{ImportWarning, WarningKind};
use crate::instant::GlobalInstantEvent;
use crate::interval_tree::IntervalTree;
use crate::memory_dump::GlobalMemoryDump;
use crate::process::Process;
use crate::sample::Sample;
use crate::stack_frame::StackFrameTable;
use crate::thread::{Thread, ThreadKey};
use crate::time::TimeDisplayUnit;
use anyhow::{Result, bail};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Placeholder for device-scope event containers.
#[derive(Debug, Default)]
pub struct Device {}

/// Kernel-scope container. Kernel threads are disjoint from process
/// threads; this importer never populates them, but the container keeps the
/// same lookup surface as `Process` for parity.
#[derive(Debug, Default)]
pub struct Kernel {
    pub threads: BTreeMap<i64, Thread>,
}

impl Kernel {
    pub fn find_all_threads_named(&self, name: &str) -> Vec<&Thread> {
        self.threads
            .values()
            .filter(|thread| thread.name.as_deref() == Some(name))
            .collect()
    }
}

/// A trace-level metadata entry preserved from an unrecognized top-level
/// container key.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataRecord {
    pub name: String,
    pub value: ArgValue,
}

/// A clock synchronization marker.
#[derive(Debug, Clone)]
pub struct ClockSyncRecord {
    pub name: String,
    pub ts: f64,
    pub args: ArgDict,
}

/// An alert raised over a time point. Never produced by this importer, but
/// part of the model surface and of the finalize ordering contract.
#[derive(Debug, Clone)]
pub struct Alert {
    pub title: String,
    pub start: f64,
    pub args: ArgDict,
}

/// A user-interaction record spanning a time range.
#[derive(Debug, Clone)]
pub struct InteractionRecord {
    pub title: String,
    pub start: f64,
    pub duration: f64,
}

/// Knobs for the finalization passes.
#[derive(Debug, Clone, Copy)]
pub struct FinalizeOptions {
    pub shift_world_to_zero: bool,
    pub prune_empty_containers: bool,
}

impl Default for FinalizeOptions {
    fn default() -> Self {
        Self {
            shift_world_to_zero: true,
            prune_empty_containers: true,
        }
    }
}

/// The root aggregate of an imported trace.
#[derive(Debug, Default)]
pub struct Model {
    pub device: Device,
    pub kernel: Kernel,
    pub processes: BTreeMap<i64, Process>,
    pub instant_events: Vec<GlobalInstantEvent>,
    pub flow_events: Vec<FlowEvent>,
    pub alerts: Vec<Alert>,
    pub interaction_records: Vec<InteractionRecord>,
    pub samples: Vec<Sample>,
    pub global_memory_dumps: Vec<GlobalMemoryDump>,
    pub clock_sync_records: Vec<ClockSyncRecord>,
    pub annotations_by_guid: BTreeMap<String, ArgValue>,
    pub stack_frames: StackFrameTable,
    pub metadata: Vec<MetadataRecord>,
    pub software_measured_cpu_count: Option<i64>,
    pub bounds: Bounds,
    pub categories: BTreeSet<String>,
    pub flow_interval_tree: IntervalTree<usize>,
    pub indices: EventIndices,
    pub import_warnings: Vec<ImportWarning>,
    logged_warning_kinds: HashSet<WarningKind>,
    intrinsic_time_unit: Option<TimeDisplayUnit>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create_process(&mut self, pid: i64) -> &mut Process {
        self.processes
            .entry(pid)
            .or_insert_with(|| Process::new(pid))
    }

    pub fn process(&self, pid: i64) -> Option<&Process> {
        self.processes.get(&pid)
    }

    pub fn thread(&self, key: ThreadKey) -> Option<&Thread> {
        self.processes
            .get(&key.pid)
            .and_then(|process| process.threads.get(&key.tid))
    }

    /// Kernel threads and process threads, as a disjoint union.
    pub fn get_all_threads(&self) -> Vec<&Thread> {
        let mut threads: Vec<&Thread> = self.kernel.threads.values().collect();
        for process in self.processes.values() {
            threads.extend(process.threads.values());
        }
        threads
    }

    pub fn find_all_threads_named(&self, name: &str) -> Vec<&Thread> {
        let mut threads = self.kernel.find_all_threads_named(name);
        for process in self.processes.values() {
            threads.extend(process.find_all_threads_named(name));
        }
        threads
    }

    /// Records a warning, logging only the first occurrence of each kind.
    pub fn import_warning(&mut self, kind: WarningKind, message: impl Into<String>) {
        let message = message.into();
        if self.logged_warning_kinds.insert(kind) {
            log::warn!("{kind}: {message}");
        }
        self.import_warnings.push(ImportWarning { kind, message });
    }

    pub fn distinct_warning_kinds(&self) -> BTreeSet<WarningKind> {
        self.import_warnings.iter().map(|w| w.kind).collect()
    }

    pub fn intrinsic_time_unit(&self) -> Option<TimeDisplayUnit> {
        self.intrinsic_time_unit
    }

    /// The intrinsic display unit may be set at most once per model.
    pub fn set_intrinsic_time_unit(&mut self, unit: TimeDisplayUnit) -> Result<()> {
        if self.intrinsic_time_unit.is_some() {
            bail!("the intrinsic time unit can only be set once");
        }
        self.intrinsic_time_unit = Some(unit);
        Ok(())
    }

    /// Runs every finalization pass, in the contract's order.
    pub fn finalize(&mut self, options: &FinalizeOptions) {
        self.sort_samples();
        self.auto_close_open_slices();
        self.compute_world_bounds();
        if options.shift_world_to_zero {
            self.shift_world_to_zero();
        }
        self.create_sub_slices();
        if options.prune_empty_containers {
            self.prune_empty_containers();
        }
        self.build_flow_event_interval_tree();
        self.cleanup_undeleted_objects();
        self.sort_memory_dumps();
        self.sort_interaction_records();
        self.sort_alerts();
        self.build_event_indices();
    }

    pub fn sort_samples(&mut self) {
        self.samples.sort_by(|a, b| {
            a.ts.partial_cmp(&b.ts).unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    /// Closes every still-open slice at the current world max.
    pub fn auto_close_open_slices(&mut self) {
        self.update_bounds();
        let end_ts = self.bounds.max_or_zero();
        for process in self.processes.values_mut() {
            process.auto_close_open_slices(end_ts);
        }
        for thread in self.kernel.threads.values_mut() {
            thread.slice_group.auto_close_open_slices(end_ts);
        }
    }

    pub fn update_bounds(&mut self) {
        let mut bounds = Bounds::new();
        for process in self.processes.values() {
            bounds.add_bounds(&process.bounds());
        }
        for thread in self.kernel.threads.values() {
            bounds.add_bounds(&thread.bounds());
        }
        for instant in &self.instant_events {
            bounds.add_value(instant.start);
        }
        for flow in &self.flow_events {
            bounds.add_range(flow.start, flow.end);
        }
        for sample in &self.samples {
            bounds.add_value(sample.ts);
        }
        for dump in &self.global_memory_dumps {
            bounds.add_range(dump.start, dump.end());
        }
        self.bounds = bounds;
    }

    /// Updates bounds and rebuilds the world category set.
    pub fn compute_world_bounds(&mut self) {
        self.update_bounds();
        let mut categories = BTreeSet::new();
        let mut note = |category: &str| {
            if !category.is_empty() {
                categories.insert(category.to_owned());
            }
        };
        for process in self.processes.values() {
            for thread in process.threads.values() {
                for slice in &thread.slice_group.slices {
                    note(&slice.category);
                }
                for slice in &thread.async_slice_group.slices {
                    note(&slice.category);
                    let mut stack: Vec<_> = slice.sub_slices.iter().collect();
                    while let Some(sub) = stack.pop() {
                        note(&sub.category);
                        stack.extend(sub.sub_slices.iter());
                    }
                }
            }
            for counter in process.counters.values() {
                note(&counter.category);
            }
            for instant in &process.instant_events {
                note(&instant.category);
            }
            for instance in &process.objects.instances {
                note(&instance.category);
            }
        }
        for instant in &self.instant_events {
            note(&instant.category);
        }
        for flow in &self.flow_events {
            note(&flow.category);
        }
        self.categories = categories;
    }

    /// Translates every event so the world starts at zero, then recomputes
    /// bounds. Applying this twice is equivalent to applying it once.
    pub fn shift_world_to_zero(&mut self) {
        let Some(min) = self.bounds.min() else {
            return;
        };
        let amount = -min;
        for process in self.processes.values_mut() {
            process.shift_timestamps_forward(amount);
        }
        for thread in self.kernel.threads.values_mut() {
            thread.shift_timestamps_forward(amount);
        }
        for instant in &mut self.instant_events {
            instant.start += amount;
        }
        for flow in &mut self.flow_events {
            flow.start += amount;
            flow.end += amount;
        }
        for sample in &mut self.samples {
            sample.ts += amount;
        }
        for dump in &mut self.global_memory_dumps {
            dump.shift_timestamps_forward(amount);
        }
        for record in &mut self.clock_sync_records {
            record.ts += amount;
        }
        for record in &mut self.interaction_records {
            record.start += amount;
        }
        for alert in &mut self.alerts {
            alert.start += amount;
        }
        self.update_bounds();
    }

    pub fn create_sub_slices(&mut self) {
        for process in self.processes.values_mut() {
            for thread in process.threads.values_mut() {
                thread.slice_group.create_sub_slices();
            }
        }
        for thread in self.kernel.threads.values_mut() {
            thread.slice_group.create_sub_slices();
        }
    }

    /// Drops threads that hold no events and are not referenced by samples.
    pub fn prune_empty_containers(&mut self) {
        let sampled: HashSet<ThreadKey> = self.samples.iter().map(|s| s.thread).collect();
        for process in self.processes.values_mut() {
            let pid = process.pid;
            process
                .threads
                .retain(|&tid, thread| !thread.is_empty() || sampled.contains(&ThreadKey { pid, tid }));
        }
    }

    pub fn build_flow_event_interval_tree(&mut self) {
        let mut tree = IntervalTree::new();
        for (index, flow) in self.flow_events.iter().enumerate() {
            tree.insert(flow.start, flow.end, index);
        }
        tree.update();
        self.flow_interval_tree = tree;
    }

    /// Instances still live at the end of the trace get an implicit
    /// deletion at the world max.
    pub fn cleanup_undeleted_objects(&mut self) {
        let end_ts = self.bounds.max_or_zero();
        for process in self.processes.values_mut() {
            process.objects.cleanup_undeleted_instances(end_ts);
        }
    }

    pub fn sort_memory_dumps(&mut self) {
        self.global_memory_dumps.sort_by(|a, b| {
            a.start
                .partial_cmp(&b.start)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    pub fn sort_interaction_records(&mut self) {
        self.interaction_records.sort_by(|a, b| {
            a.start
                .partial_cmp(&b.start)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    pub fn sort_alerts(&mut self) {
        self.alerts.sort_by(|a, b| {
            a.start
                .partial_cmp(&b.start)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    pub fn build_event_indices(&mut self) {
        let mut indices = EventIndices::new();
        for (index, flow) in self.flow_events.iter().enumerate() {
            indices
                .flow_events_by_id
                .entry(flow.id.clone())
                .or_default()
                .push(index);
        }
        self.indices = indices;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slice::Slice;

    fn model_with_slice(start: f64, duration: f64) -> Model {
        let mut model = Model::new();
        let thread = model.get_or_create_process(1).get_or_create_thread(1);
        let mut slice = Slice::new("cat".to_owned(), "a".to_owned(), 0, start);
        slice.duration = Some(duration);
        let index = thread.slice_group.slices.len();
        thread.slice_group.slices.push(slice);
        assert_eq!(index, 0);
        model
    }

    #[test]
    fn intrinsic_time_unit_is_write_once() {
        let mut model = Model::new();
        model
            .set_intrinsic_time_unit(TimeDisplayUnit::Nanoseconds)
            .unwrap();
        assert!(
            model
                .set_intrinsic_time_unit(TimeDisplayUnit::Nanoseconds)
                .is_err()
        );
    }

    #[test]
    fn shift_world_to_zero_is_idempotent() {
        let mut model = model_with_slice(10.0, 4.0);
        model.update_bounds();
        model.shift_world_to_zero();
        assert_eq!(model.bounds.min(), Some(0.0));
        assert_eq!(model.bounds.max(), Some(4.0));
        let first = model.processes[&1].threads[&1].slice_group.slices[0].start;
        model.shift_world_to_zero();
        let second = model.processes[&1].threads[&1].slice_group.slices[0].start;
        assert_eq!(first, second);
    }

    #[test]
    fn warnings_are_retained_in_order_and_deduplicated_by_kind() {
        let mut model = Model::new();
        model.import_warning(WarningKind::ParseError, "first");
        model.import_warning(WarningKind::ParseError, "second");
        model.import_warning(WarningKind::CounterParseError, "third");
        assert_eq!(model.import_warnings.len(), 3);
        assert_eq!(model.distinct_warning_kinds().len(), 2);
        assert_eq!(model.import_warnings[0].message, "first");
    }

    #[test]
    fn prune_keeps_threads_referenced_by_samples() {
        let mut model = Model::new();
        model.get_or_create_process(1).get_or_create_thread(7);
        model.get_or_create_process(1).get_or_create_thread(8);
        model.samples.push(crate::sample::Sample {
            thread: ThreadKey { pid: 1, tid: 8 },
            title: "Trace Event Sample".to_owned(),
            ts: 1.0,
            leaf_stack_frame: None,
            weight: 1.0,
        });
        model.prune_empty_containers();
        let process = model.process(1).unwrap();
        assert!(!process.threads.contains_key(&7));
        assert!(process.threads.contains_key(&8));
    }
}
