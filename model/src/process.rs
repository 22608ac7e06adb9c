use crate::bounds::Bounds;
use crate::counter::Counter;
use crate::instant::ProcessInstantEvent;
use crate::object::ObjectCollection;
use crate::thread::Thread;
use std::collections::BTreeMap;

/// A process, identified by pid. Threads, counters, and objects are created
/// lazily on first reference.
#[derive(Debug)]
pub struct Process {
    pub pid: i64,
    pub name: Option<String>,
    pub labels: Vec<String>,
    pub sort_index: Option<i64>,
    pub threads: BTreeMap<i64, Thread>,
    /// Counters keyed by (category, name).
    pub counters: BTreeMap<(String, String), Counter>,
    pub objects: ObjectCollection,
    pub instant_events: Vec<ProcessInstantEvent>,
    /// Indices into the model's global memory dump list this pid
    /// contributed to.
    pub memory_dumps: Vec<usize>,
}

impl Process {
    pub fn new(pid: i64) -> Self {
        Self {
            pid,
            name: None,
            labels: Vec::new(),
            sort_index: None,
            threads: BTreeMap::new(),
            counters: BTreeMap::new(),
            objects: ObjectCollection::new(),
            instant_events: Vec::new(),
            memory_dumps: Vec::new(),
        }
    }

    pub fn get_or_create_thread(&mut self, tid: i64) -> &mut Thread {
        self.threads.entry(tid).or_insert_with(|| Thread::new(tid))
    }

    pub fn get_or_create_counter(&mut self, category: &str, name: &str) -> &mut Counter {
        self.counters
            .entry((category.to_owned(), name.to_owned()))
            .or_insert_with(|| Counter::new(category.to_owned(), name.to_owned()))
    }

    pub fn remove_counter(&mut self, category: &str, name: &str) {
        self.counters
            .remove(&(category.to_owned(), name.to_owned()));
    }

    pub fn find_all_threads_named(&self, name: &str) -> Vec<&Thread> {
        self.threads
            .values()
            .filter(|thread| thread.name.as_deref() == Some(name))
            .collect()
    }

    pub fn bounds(&self) -> Bounds {
        let mut bounds = Bounds::new();
        for thread in self.threads.values() {
            bounds.add_bounds(&thread.bounds());
        }
        for counter in self.counters.values() {
            bounds.add_bounds(&counter.bounds());
        }
        for instant in &self.instant_events {
            bounds.add_value(instant.start);
        }
        bounds.add_bounds(&self.objects.bounds());
        bounds
    }

    pub fn shift_timestamps_forward(&mut self, amount: f64) {
        for thread in self.threads.values_mut() {
            thread.shift_timestamps_forward(amount);
        }
        for counter in self.counters.values_mut() {
            counter.shift_timestamps_forward(amount);
        }
        for instant in &mut self.instant_events {
            instant.start += amount;
        }
        self.objects.shift_timestamps_forward(amount);
    }

    pub fn auto_close_open_slices(&mut self, end_ts: f64) {
        for thread in self.threads.values_mut() {
            thread.slice_group.auto_close_open_slices(end_ts);
        }
    }
}
