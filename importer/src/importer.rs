use crate::async_assembler;
use crate::container::{self, TraceContainer};
use crate::error::ImportError;
use crate::event::{TraceEvent, arg_value_from_json, json_id_string};
use crate::flow_assembler::{self, FlowQueued, V2FlowRecord};
use crate::memory_dump::{self, MemoryDumpEventGroup};
use crate::object_engine;
use crate::stack_frames;
use anyhow::Result;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracemodel_model::args::ArgDict;
use tracemodel_model::color::{color_id_for_general_purpose_string, color_id_for_reserved_name};
use tracemodel_model::counter::CounterSeries;
use tracemodel_model::import_warning::WarningKind;
use tracemodel_model::instant::{GlobalInstantEvent, ProcessInstantEvent};
use tracemodel_model::model::{ClockSyncRecord, FinalizeOptions, MetadataRecord, Model};
use tracemodel_model::sample::Sample;
use tracemodel_model::slice::{FlowPhase, Slice, SliceKey};
use tracemodel_model::stack_frame::StackFrame;
use tracemodel_model::thread::ThreadKey;
use tracemodel_model::time::{TimeDisplayUnit, timestamp_from_us};

/// Import knobs, mirrored onto the model finalization.
#[derive(Debug, Clone, Copy)]
pub struct ImportOptions {
    pub shift_world_to_zero: bool,
    pub prune_empty_containers: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            shift_world_to_zero: true,
            prune_empty_containers: true,
        }
    }
}

/// Imports a serialized trace and returns the finalized model.
pub fn import_trace(text: &str, options: &ImportOptions) -> Result<Model> {
    if !container::can_import_str(text) {
        return Err(ImportError::UnimportableInput.into());
    }
    import_trace_container(TraceContainer::from_str(text)?, options)
}

/// Imports an already-parsed trace container.
pub fn import_trace_container(container: TraceContainer, options: &ImportOptions) -> Result<Model> {
    let mut importer = TraceEventImporter::new(container);
    importer.import_events()?;
    importer.import_sample_data();
    importer.finalize_import()?;
    let mut model = importer.into_model();
    model.finalize(&FinalizeOptions {
        shift_world_to_zero: options.shift_world_to_zero,
        prune_empty_containers: options.prune_empty_containers,
    });
    Ok(model)
}

/// A deferred event, stamped with its input order for stable tiebreaks.
#[derive(Debug)]
pub struct QueuedEvent {
    pub sequence: u64,
    /// Raw microsecond timestamp.
    pub ts: f64,
    pub event: TraceEvent,
}

/// The importer state machine. Dispatch mutates the model directly for
/// synchronous phases and buffers asynchronous, flow, object, and memory
/// dump records for the post-dispatch assemblers.
pub struct TraceEventImporter {
    model: Model,
    container: TraceContainer,
    had_stack_frames: bool,
    async_events: Vec<QueuedEvent>,
    flow_events: Vec<FlowQueued>,
    object_events: Vec<QueuedEvent>,
    memory_dump_events: BTreeMap<String, MemoryDumpEventGroup>,
    sample_frames_by_name: BTreeMap<String, String>,
    next_sample_frame_id: u64,
    sequence: u64,
}

impl TraceEventImporter {
    pub fn new(container: TraceContainer) -> Self {
        Self {
            model: Model::new(),
            had_stack_frames: container.stack_frames.is_some(),
            container,
            async_events: Vec::new(),
            flow_events: Vec::new(),
            object_events: Vec::new(),
            memory_dump_events: BTreeMap::new(),
            sample_frames_by_name: BTreeMap::new(),
            next_sample_frame_id: 0,
            sequence: 0,
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn into_model(self) -> Model {
        self.model
    }

    /// Dispatches every record of the container. Fails fast only on an
    /// illegal `displayTimeUnit`.
    pub fn import_events(&mut self) -> Result<()> {
        self.model.clock_sync_records.push(ClockSyncRecord {
            name: "ftrace_importer".to_owned(),
            ts: 0.0,
            args: ArgDict::new(),
        });

        if let Some(unit) = self.container.display_time_unit.take() {
            self.model
                .set_intrinsic_time_unit(TimeDisplayUnit::parse(&unit)?)?;
        }

        if let Some(frames) = self.container.stack_frames.take() {
            stack_frames::import_stack_frames(&mut self.model, &frames, "g", false);
        }

        if let Some(annotations) = self.container.trace_annotations.take() {
            for (guid, value) in &annotations {
                if value.is_object() {
                    self.model
                        .annotations_by_guid
                        .insert(guid.clone(), arg_value_from_json(value));
                } else {
                    self.model.import_warning(
                        WarningKind::AnnotationWarning,
                        format!("Annotation {guid} is not an object."),
                    );
                }
            }
        }

        for (name, value) in std::mem::take(&mut self.container.metadata) {
            let value = arg_value_from_json(&value);
            self.model.metadata.push(MetadataRecord { name, value });
        }

        for raw in std::mem::take(&mut self.container.trace_events) {
            self.sequence += 1;
            let event: TraceEvent = match serde_json::from_value(raw) {
                Ok(event) => event,
                Err(e) => {
                    self.model.import_warning(
                        WarningKind::ParseError,
                        format!("Malformed event record: {e}."),
                    );
                    continue;
                }
            };
            self.process_event(event);
        }
        log::debug!(
            "dispatched {} events ({} async, {} flow, {} object deferred)",
            self.sequence,
            self.async_events.len(),
            self.flow_events.len(),
            self.object_events.len()
        );
        Ok(())
    }

    /// Drains the deferred queues, in the pipeline's fixed order.
    pub fn finalize_import(&mut self) -> Result<()> {
        async_assembler::create_async_slices(&mut self.model, std::mem::take(&mut self.async_events));
        flow_assembler::create_flow_slices(&mut self.model, std::mem::take(&mut self.flow_events));
        object_engine::create_explicit_objects(
            &mut self.model,
            std::mem::take(&mut self.object_events),
        );
        object_engine::create_implicit_objects(&mut self.model)?;
        memory_dump::create_memory_dumps(
            &mut self.model,
            std::mem::take(&mut self.memory_dump_events),
        );
        Ok(())
    }

    fn process_event(&mut self, event: TraceEvent) {
        let Some(phase) = event.phase() else {
            self.model.import_warning(
                WarningKind::ParseError,
                format!(
                    "Unrecognized event phase: {:?} ({}).",
                    event.ph,
                    event.title()
                ),
            );
            return;
        };
        match phase {
            'B' => self.process_begin_event(event),
            'E' => self.process_end_event(event),
            'X' => self.process_complete_event(event),
            'I' | 'i' | 'R' => self.process_instant_event(event),
            'b' | 'n' | 'e' | 'S' | 'T' | 'p' | 'F' => self.queue_async_event(event),
            's' | 't' | 'f' => self.queue_flow_event(event),
            'C' => self.process_counter_event(event),
            'M' => self.process_metadata_event(event),
            'N' | 'O' | 'D' => self.queue_object_event(event),
            'P' => self.process_trace_sample_event(event),
            'v' | 'V' => self.queue_memory_dump_event(phase, event),
            other => {
                self.model.import_warning(
                    WarningKind::ParseError,
                    format!("Unrecognized event phase: {other} ({}).", event.title()),
                );
            }
        }
    }

    fn require_thread_fields(&mut self, event: &TraceEvent) -> Option<(i64, i64, f64)> {
        match (event.pid, event.tid, event.ts) {
            (Some(pid), Some(tid), Some(ts)) => Some((pid, tid, ts)),
            _ => {
                self.model.import_warning(
                    WarningKind::ParseError,
                    format!(
                        "Event with phase {:?} is missing pid, tid, or ts.",
                        event.ph
                    ),
                );
                None
            }
        }
    }

    fn stack_frame_for_event(&mut self, event: &TraceEvent, look_for_end: bool) -> Option<String> {
        stack_frames::resolve_event_stack_frame(&mut self.model, event, look_for_end)
    }

    fn new_slice(&mut self, event: &TraceEvent, ts: f64) -> Slice {
        let start_frame = self.stack_frame_for_event(event, false);
        let mut slice = Slice::new(
            event.category().to_owned(),
            event.title().to_owned(),
            event.color_id(),
            ts,
        );
        slice.args = event.arg_dict();
        slice.args_stripped = event.args_stripped();
        slice.thread_start = event.tts.map(timestamp_from_us);
        slice.start_stack_frame = start_frame;
        slice
    }

    fn process_begin_event(&mut self, event: TraceEvent) {
        let Some((pid, tid, ts_us)) = self.require_thread_fields(&event) else {
            return;
        };
        let ts = timestamp_from_us(ts_us);
        let valid = self
            .model
            .get_or_create_process(pid)
            .get_or_create_thread(tid)
            .slice_group
            .is_timestamp_valid_for_begin_or_end(ts);
        if !valid {
            self.model.import_warning(
                WarningKind::DurationParseError,
                "Timestamps are moving backward.",
            );
            return;
        }
        let slice = self.new_slice(&event, ts);
        self.model
            .get_or_create_process(pid)
            .get_or_create_thread(tid)
            .slice_group
            .begin_slice(slice);
    }

    fn process_end_event(&mut self, event: TraceEvent) {
        let Some((pid, tid, ts_us)) = self.require_thread_fields(&event) else {
            return;
        };
        let ts = timestamp_from_us(ts_us);
        let end_frame = self.stack_frame_for_event(&event, false);
        {
            let group = &self
                .model
                .get_or_create_process(pid)
                .get_or_create_thread(tid)
                .slice_group;
            if !group.is_timestamp_valid_for_begin_or_end(ts) {
                self.model.import_warning(
                    WarningKind::DurationParseError,
                    "Timestamps are moving backward.",
                );
                return;
            }
            if group.open_slice_count() == 0 {
                self.model.import_warning(
                    WarningKind::DurationParseError,
                    "E phase event without a matching B phase event.",
                );
                return;
            }
        }
        let mut pending: Vec<(WarningKind, String)> = Vec::new();
        {
            let group = &mut self
                .model
                .get_or_create_process(pid)
                .get_or_create_thread(tid)
                .slice_group;
            let Some(index) = group.end_slice(ts, event.tts.map(timestamp_from_us)) else {
                return;
            };
            let slice = &mut group.slices[index];
            if let Some(name) = event.name.as_deref() {
                if name != slice.title {
                    pending.push((
                        WarningKind::TitleMatchError,
                        format!(
                            "Titles do not match. Title is {} in openSlice, and is {} in endSlice.",
                            slice.title, name
                        ),
                    ));
                }
            }
            slice.end_stack_frame = end_frame;
            for (key, value) in event.arg_dict() {
                if slice.args.contains_key(&key) {
                    pending.push((
                        WarningKind::ArgMergeError,
                        format!(
                            "Different phases of {} provided values for argument {}. \
                             The last provided value will be used.",
                            slice.title, key
                        ),
                    ));
                }
                slice.args.insert(key, value);
            }
        }
        for (kind, message) in pending {
            self.model.import_warning(kind, message);
        }
    }

    fn process_complete_event(&mut self, event: TraceEvent) {
        let Some((pid, tid, ts_us)) = self.require_thread_fields(&event) else {
            return;
        };
        // Tracing's own bookkeeping slices are dropped outright.
        if event.category().contains("trace_event_overhead") {
            return;
        }
        let ts = timestamp_from_us(ts_us);
        let duration = timestamp_from_us(event.dur.unwrap_or(0.0));
        let flow_phase = match (event.flow_in, event.flow_out) {
            (Some(true), Some(true)) => FlowPhase::Step,
            (_, Some(true)) => FlowPhase::Producer,
            (Some(true), _) => FlowPhase::Consumer,
            _ => FlowPhase::None,
        };
        let bind_id = event.bind_id_string();
        let end_frame = self.stack_frame_for_event(&event, true);
        let mut slice = self.new_slice(&event, ts);
        slice.thread_duration = event.tdur.map(timestamp_from_us);
        slice.end_stack_frame = end_frame;
        slice.flow_phase = flow_phase;
        slice.bind_id = bind_id.clone();
        let index = self
            .model
            .get_or_create_process(pid)
            .get_or_create_thread(tid)
            .slice_group
            .push_complete_slice(slice, duration);

        let Some(bind_id) = bind_id else {
            return;
        };
        if flow_phase == FlowPhase::None {
            self.model.import_warning(
                WarningKind::FlowSliceParseError,
                format!("Complete event with bind_id {bind_id} has neither flow_in nor flow_out."),
            );
            return;
        }
        self.flow_events.push(FlowQueued::V2(V2FlowRecord {
            sequence: self.sequence,
            ts: ts_us,
            bind_id,
            slice: SliceKey { pid, tid, index },
            phase: flow_phase,
            category: event.category().to_owned(),
            title: event.title().to_owned(),
            color_id: event.color_id(),
            args: event.arg_dict(),
        }));
    }

    fn process_instant_event(&mut self, event: TraceEvent) {
        match event.s.as_deref() {
            None | Some("t") => {
                // Thread-scoped instants are degenerate open+close slices.
                let Some((pid, tid, ts_us)) = self.require_thread_fields(&event) else {
                    return;
                };
                let ts = timestamp_from_us(ts_us);
                let valid = self
                    .model
                    .get_or_create_process(pid)
                    .get_or_create_thread(tid)
                    .slice_group
                    .is_timestamp_valid_for_begin_or_end(ts);
                if !valid {
                    self.model.import_warning(
                        WarningKind::DurationParseError,
                        "Timestamps are moving backward.",
                    );
                    return;
                }
                let slice = self.new_slice(&event, ts);
                let group = &mut self
                    .model
                    .get_or_create_process(pid)
                    .get_or_create_thread(tid)
                    .slice_group;
                group.begin_slice(slice);
                group.end_slice(ts, event.tts.map(timestamp_from_us));
            }
            Some("p") => {
                let (Some(pid), Some(ts_us)) = (event.pid, event.ts) else {
                    self.model.import_warning(
                        WarningKind::ParseError,
                        "Process-scoped instant event is missing pid or ts.",
                    );
                    return;
                };
                let instant = ProcessInstantEvent {
                    category: event.category().to_owned(),
                    title: event.title().to_owned(),
                    color_id: event.color_id(),
                    start: timestamp_from_us(ts_us),
                    args: event.arg_dict(),
                };
                self.model
                    .get_or_create_process(pid)
                    .instant_events
                    .push(instant);
            }
            Some("g") => {
                let Some(ts_us) = event.ts else {
                    self.model.import_warning(
                        WarningKind::ParseError,
                        "Global instant event is missing ts.",
                    );
                    return;
                };
                let instant = GlobalInstantEvent {
                    category: event.category().to_owned(),
                    title: event.title().to_owned(),
                    color_id: event.color_id(),
                    start: timestamp_from_us(ts_us),
                    args: event.arg_dict(),
                };
                self.model.instant_events.push(instant);
            }
            Some(other) => {
                self.model.import_warning(
                    WarningKind::InstantParseError,
                    format!("I phase event with unknown \"s\" field value {other:?}."),
                );
            }
        }
    }

    fn process_counter_event(&mut self, event: TraceEvent) {
        let (Some(pid), Some(ts_us)) = (event.pid, event.ts) else {
            self.model.import_warning(
                WarningKind::ParseError,
                "Counter event is missing pid or ts.",
            );
            return;
        };
        let category = event.category().to_owned();
        let name = match event.id_string() {
            Some(id) => format!("{}[{}]", event.title(), id),
            None => event.title().to_owned(),
        };
        let has_series = self
            .model
            .get_or_create_process(pid)
            .get_or_create_counter(&category, &name)
            .num_series()
            > 0;
        if !has_series {
            let keys: Vec<String> = event
                .args_object()
                .map(|args| args.keys().cloned().collect())
                .unwrap_or_default();
            if keys.is_empty() {
                self.model.import_warning(
                    WarningKind::CounterParseError,
                    format!(
                        "Expected counter {} to have at least one argument to use as a value.",
                        event.title()
                    ),
                );
                self.model
                    .get_or_create_process(pid)
                    .remove_counter(&category, &name);
                return;
            }
            let cname = event.cname.clone();
            let counter = self
                .model
                .get_or_create_process(pid)
                .get_or_create_counter(&category, &name);
            for key in keys {
                let color_id = match cname.as_deref() {
                    Some(cname) => color_id_for_reserved_name(cname),
                    None => color_id_for_general_purpose_string(&format!("{name}.{key}")),
                };
                counter.add_series(CounterSeries::new(key, color_id));
            }
        }
        let counter = self
            .model
            .get_or_create_process(pid)
            .get_or_create_counter(&category, &name);
        let values: Vec<f64> = counter
            .series
            .iter()
            .map(|series| {
                event
                    .args_object()
                    .and_then(|args| args.get(&series.name))
                    .and_then(serde_json::Value::as_f64)
                    .unwrap_or(0.0)
            })
            .collect();
        counter.add_sample(timestamp_from_us(ts_us), &values);
    }

    fn process_metadata_event(&mut self, event: TraceEvent) {
        let Some(name) = event.name.clone() else {
            self.model.import_warning(
                WarningKind::MetadataParseError,
                "Metadata event without a name.",
            );
            return;
        };
        match name.as_str() {
            "process_name" => {
                let Some((pid, value)) = self.metadata_string_arg(&event, "name") else {
                    return;
                };
                self.model.get_or_create_process(pid).name = Some(value);
            }
            "process_labels" => {
                let Some((pid, value)) = self.metadata_string_arg(&event, "labels") else {
                    return;
                };
                let process = self.model.get_or_create_process(pid);
                process
                    .labels
                    .extend(value.split(',').map(str::to_owned));
            }
            "process_sort_index" => {
                let Some((pid, value)) = self.metadata_number_arg(&event, "sort_index") else {
                    return;
                };
                self.model.get_or_create_process(pid).sort_index = Some(value);
            }
            "thread_name" => {
                let Some((pid, value)) = self.metadata_string_arg(&event, "name") else {
                    return;
                };
                let Some(tid) = event.tid else {
                    self.model.import_warning(
                        WarningKind::MetadataParseError,
                        "thread_name metadata event without a tid.",
                    );
                    return;
                };
                self.model
                    .get_or_create_process(pid)
                    .get_or_create_thread(tid)
                    .name = Some(value);
            }
            "thread_sort_index" => {
                let Some((pid, value)) = self.metadata_number_arg(&event, "sort_index") else {
                    return;
                };
                let Some(tid) = event.tid else {
                    self.model.import_warning(
                        WarningKind::MetadataParseError,
                        "thread_sort_index metadata event without a tid.",
                    );
                    return;
                };
                self.model
                    .get_or_create_process(pid)
                    .get_or_create_thread(tid)
                    .sort_index = Some(value);
            }
            "num_cpus" => {
                let Some(value) = event
                    .args_object()
                    .and_then(|args| args.get("number"))
                    .and_then(serde_json::Value::as_i64)
                else {
                    self.model.import_warning(
                        WarningKind::MetadataParseError,
                        "No number provided in num_cpus metadata event.",
                    );
                    return;
                };
                // Processes may disagree; keep the largest reported count.
                let current = self.model.software_measured_cpu_count.unwrap_or(0);
                self.model.software_measured_cpu_count = Some(current.max(value));
            }
            "stackFrames" => {
                let Some(pid) = event.pid else {
                    self.model.import_warning(
                        WarningKind::MetadataParseError,
                        "stackFrames metadata event without a pid.",
                    );
                    return;
                };
                let Some(frames) = event
                    .args_object()
                    .and_then(|args| args.get("stackFrames"))
                    .and_then(serde_json::Value::as_object)
                    .cloned()
                else {
                    self.model.import_warning(
                        WarningKind::MetadataParseError,
                        "No stack frames found in a stackFrames metadata event.",
                    );
                    return;
                };
                let prefix = format!("p{pid}:");
                stack_frames::import_stack_frames(&mut self.model, &frames, &prefix, true);
            }
            other => {
                self.model.import_warning(
                    WarningKind::MetadataParseError,
                    format!("Unrecognized metadata name: {other}."),
                );
            }
        }
    }

    fn metadata_string_arg(&mut self, event: &TraceEvent, field: &str) -> Option<(i64, String)> {
        let value = event
            .args_object()
            .and_then(|args| args.get(field))
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned);
        self.metadata_arg(event, field, value)
    }

    fn metadata_number_arg(&mut self, event: &TraceEvent, field: &str) -> Option<(i64, i64)> {
        let value = event
            .args_object()
            .and_then(|args| args.get(field))
            .and_then(serde_json::Value::as_i64);
        self.metadata_arg(event, field, value)
    }

    fn metadata_arg<T>(&mut self, event: &TraceEvent, field: &str, value: Option<T>) -> Option<(i64, T)> {
        let name = event.name.as_deref().unwrap_or_default().to_owned();
        let Some(pid) = event.pid else {
            self.model.import_warning(
                WarningKind::MetadataParseError,
                format!("{name} metadata event without a pid."),
            );
            return None;
        };
        match value {
            Some(value) => Some((pid, value)),
            None => {
                self.model.import_warning(
                    WarningKind::MetadataParseError,
                    format!("No {field} provided in {name} metadata event."),
                );
                None
            }
        }
    }

    fn process_trace_sample_event(&mut self, event: TraceEvent) {
        let Some((pid, tid, ts_us)) = self.require_thread_fields(&event) else {
            return;
        };
        let frame = match self.stack_frame_for_event(&event, false) {
            Some(frame) => frame,
            None => self.sample_frame_for_name(event.title()),
        };
        self.model.get_or_create_process(pid).get_or_create_thread(tid);
        self.model.samples.push(Sample {
            thread: ThreadKey { pid, tid },
            title: "Trace Event Sample".to_owned(),
            ts: timestamp_from_us(ts_us),
            leaf_stack_frame: Some(frame),
            weight: 1.0,
        });
    }

    /// Samples without a frame share one synthetic frame per event name.
    fn sample_frame_for_name(&mut self, name: &str) -> String {
        if let Some(id) = self.sample_frames_by_name.get(name) {
            return id.clone();
        }
        self.next_sample_frame_id += 1;
        let mut id = format!("te-{}", self.next_sample_frame_id);
        while self.model.stack_frames.contains(&id) {
            self.next_sample_frame_id += 1;
            id = format!("te-{}", self.next_sample_frame_id);
        }
        let frame = StackFrame::new(
            id.clone(),
            name.to_owned(),
            color_id_for_general_purpose_string(name),
        );
        let _ = self.model.stack_frames.add(frame);
        self.sample_frames_by_name.insert(name.to_owned(), id.clone());
        id
    }

    fn queue_async_event(&mut self, event: TraceEvent) {
        let Some((_, _, ts)) = self.require_thread_fields(&event) else {
            return;
        };
        self.async_events.push(QueuedEvent {
            sequence: self.sequence,
            ts,
            event,
        });
    }

    fn queue_flow_event(&mut self, event: TraceEvent) {
        let Some((_, _, ts)) = self.require_thread_fields(&event) else {
            return;
        };
        self.flow_events.push(FlowQueued::V1(QueuedEvent {
            sequence: self.sequence,
            ts,
            event,
        }));
    }

    fn queue_object_event(&mut self, event: TraceEvent) {
        let (Some(_), Some(ts)) = (event.pid, event.ts) else {
            self.model.import_warning(
                WarningKind::ObjectParseError,
                format!("Object event with phase {:?} is missing pid or ts.", event.ph),
            );
            return;
        };
        self.object_events.push(QueuedEvent {
            sequence: self.sequence,
            ts,
            event,
        });
    }

    fn queue_memory_dump_event(&mut self, phase: char, event: TraceEvent) {
        let Some(id) = event.id_string() else {
            self.model.import_warning(
                WarningKind::MemoryDumpParseError,
                format!("Memory dump event (phase {phase}) with no id."),
            );
            return;
        };
        if event.ts.is_none() || (phase == 'v' && event.pid.is_none()) {
            self.model.import_warning(
                WarningKind::MemoryDumpParseError,
                format!("Memory dump event (phase {phase}) with id={id} is missing ts or pid."),
            );
            return;
        }
        let group = self.memory_dump_events.entry(id.clone()).or_default();
        if phase == 'v' {
            group.process.push(event);
        } else if group.global.is_some() {
            self.model.import_warning(
                WarningKind::MemoryDumpParseError,
                format!("Multiple global memory dump events with id={id}."),
            );
        } else {
            group.global = Some(event);
        }
    }

    /// Container-level samples, resolved against the `g`-scoped frames.
    pub fn import_sample_data(&mut self) {
        let samples = std::mem::take(&mut self.container.samples);
        if samples.is_empty() {
            return;
        }
        if !self.had_stack_frames {
            self.model.import_warning(
                WarningKind::SampleImportError,
                "Cannot import samples from a trace that doesn't have stackFrames.",
            );
            return;
        }
        let mut threads_by_tid: BTreeMap<i64, ThreadKey> = BTreeMap::new();
        for process in self.model.processes.values() {
            for thread in process.threads.values() {
                threads_by_tid.entry(thread.tid).or_insert(ThreadKey {
                    pid: process.pid,
                    tid: thread.tid,
                });
            }
        }

        #[derive(Debug, Default, Deserialize)]
        #[serde(default)]
        struct RawSample {
            tid: Option<i64>,
            ts: Option<f64>,
            name: Option<String>,
            sf: Option<serde_json::Value>,
            weight: Option<f64>,
        }

        for raw in samples {
            let sample: RawSample = match serde_json::from_value(raw) {
                Ok(sample) => sample,
                Err(e) => {
                    self.model.import_warning(
                        WarningKind::SampleImportError,
                        format!("Malformed sample record: {e}."),
                    );
                    continue;
                }
            };
            let (Some(tid), Some(ts)) = (sample.tid, sample.ts) else {
                self.model.import_warning(
                    WarningKind::SampleImportError,
                    "Sample is missing tid or ts.",
                );
                continue;
            };
            let frame_id = sample
                .sf
                .as_ref()
                .and_then(json_id_string)
                .map(|sf| format!("g{sf}"));
            let Some(frame_id) = frame_id.filter(|id| self.model.stack_frames.contains(id)) else {
                self.model.import_warning(
                    WarningKind::SampleImportError,
                    format!("Sample at ts={ts} has no matching stack frame."),
                );
                continue;
            };
            let Some(&thread) = threads_by_tid.get(&tid) else {
                self.model.import_warning(
                    WarningKind::SampleImportError,
                    format!("Sample at ts={ts} references unknown thread {tid}."),
                );
                continue;
            };
            self.model.samples.push(Sample {
                thread,
                title: sample.name.unwrap_or_default(),
                ts: timestamp_from_us(ts),
                leaf_stack_frame: Some(frame_id),
                weight: sample.weight.unwrap_or(1.0),
            });
        }
    }
}
