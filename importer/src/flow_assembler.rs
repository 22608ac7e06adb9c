use crate::importer::QueuedEvent;
use std::collections::HashMap;
use tracemodel_model::args::{ArgDict, merge_args};
use tracemodel_model::flow::FlowEvent;
use tracemodel_model::import_warning::WarningKind;
use tracemodel_model::model::Model;
use tracemodel_model::slice::{FlowPhase, Slice, SliceKey};
use tracemodel_model::thread::ThreadKey;
use tracemodel_model::time::timestamp_from_us;

/// A deferred flow record: either a raw v1 (s/t/f) event or the v2
/// classification of a complete slice carrying a bind id.
#[derive(Debug)]
pub enum FlowQueued {
    V1(QueuedEvent),
    V2(V2FlowRecord),
}

#[derive(Debug)]
pub struct V2FlowRecord {
    pub sequence: u64,
    /// Raw microsecond timestamp of the complete event.
    pub ts: f64,
    pub bind_id: String,
    pub slice: SliceKey,
    pub phase: FlowPhase,
    pub category: String,
    pub title: String,
    pub color_id: u32,
    pub args: ArgDict,
}

impl FlowQueued {
    fn ts(&self) -> f64 {
        match self {
            Self::V1(queued) => queued.ts,
            Self::V2(record) => record.ts,
        }
    }

    fn sequence(&self) -> u64 {
        match self {
            Self::V1(queued) => queued.sequence,
            Self::V2(record) => record.sequence,
        }
    }
}

/// A flow awaiting its consumer. The template is cloned per consumer so a
/// producer can feed several of them.
#[derive(Debug)]
struct OpenFlow {
    template: FlowEvent,
    consumed: bool,
}

/// Stitches the deferred flow records into finalized flow events. Only
/// flows that found both endpoints land on the model.
pub fn create_flow_slices(model: &mut Model, mut queued: Vec<FlowQueued>) {
    queued.sort_by(|a, b| {
        a.ts()
            .partial_cmp(&b.ts())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.sequence().cmp(&b.sequence()))
    });

    let mut open: HashMap<String, OpenFlow> = HashMap::new();
    for entry in queued {
        match entry {
            FlowQueued::V1(queued) => handle_v1(model, &mut open, &queued),
            FlowQueued::V2(record) => handle_v2(model, &mut open, &record),
        }
    }

    let mut unconsumed: Vec<String> = open
        .into_iter()
        .filter(|(_, flow)| !flow.consumed)
        .map(|(id, _)| id)
        .collect();
    unconsumed.sort();
    for id in unconsumed {
        model.import_warning(
            WarningKind::FlowSliceParseError,
            format!("Flow event with id {id} was never bound to a consuming slice."),
        );
    }
}

fn find_slice_at(model: &Model, pid: i64, tid: i64, ts: f64) -> Option<SliceKey> {
    let thread = model.processes.get(&pid)?.threads.get(&tid)?;
    let index = thread.slice_group.find_slice_at_ts(ts)?;
    Some(SliceKey { pid, tid, index })
}

fn find_next_slice_after(model: &Model, pid: i64, tid: i64, ts: f64) -> Option<SliceKey> {
    let thread = model.processes.get(&pid)?.threads.get(&tid)?;
    let index = thread.slice_group.find_next_slice_after(ts)?;
    Some(SliceKey { pid, tid, index })
}

fn slice_mut(model: &mut Model, key: SliceKey) -> &mut Slice {
    &mut model
        .get_or_create_process(key.pid)
        .get_or_create_thread(key.tid)
        .slice_group
        .slices[key.index]
}

/// Completes a flow with its end slice and publishes it on the model.
fn finish_flow(model: &mut Model, mut flow: FlowEvent, extra_args: &ArgDict, end_ts: f64, end_slice: SliceKey) {
    flow.end = end_ts;
    flow.end_slice = Some(end_slice);
    merge_args(&mut flow.args, extra_args);
    let index = model.flow_events.len();
    if let Some(start_slice) = flow.start_slice {
        slice_mut(model, start_slice).out_flow_events.push(index);
    }
    slice_mut(model, end_slice).in_flow_events.push(index);
    model.flow_events.push(flow);
}

fn handle_v1(model: &mut Model, open: &mut HashMap<String, OpenFlow>, queued: &QueuedEvent) {
    let event = &queued.event;
    let Some(phase) = event.phase() else {
        return;
    };
    let Some(id) = event.id_string() else {
        model.import_warning(
            WarningKind::FlowSliceParseError,
            "Flow event (ph: s, t, or f) without an id parameter.",
        );
        return;
    };
    let pid = event.pid.unwrap_or_default();
    let tid = event.tid.unwrap_or_default();
    let ts = timestamp_from_us(queued.ts);

    if phase == 's' {
        if open.contains_key(&id) {
            model.import_warning(
                WarningKind::FlowSliceOrderingError,
                format!("Event id {id} already seen when encountering start of flow event."),
            );
            return;
        }
        let Some(slice_key) = find_slice_at(model, pid, tid, ts) else {
            model.import_warning(
                WarningKind::FlowSliceStartError,
                format!("Flow event (ph: s) at ts={ts} does not coincide with a slice."),
            );
            return;
        };
        let mut flow = FlowEvent::new(
            event.category().to_owned(),
            event.title().to_owned(),
            event.color_id(),
            id.clone(),
            ts,
        );
        flow.args = event.arg_dict();
        flow.start_slice = Some(slice_key);
        open.insert(
            id,
            OpenFlow {
                template: flow,
                consumed: false,
            },
        );
        return;
    }

    // 't' and 'f' both need a previously opened flow for the id.
    if !open.contains_key(&id) {
        model.import_warning(
            WarningKind::FlowSliceOrderingError,
            format!("Found flow phase {phase} for id {id} but no flow start found."),
        );
        return;
    }
    let bind_to_parent = if phase == 't' {
        true
    } else {
        match event.bp.as_deref() {
            None => {
                event.category().contains("input") || event.category().contains("ipc.flow")
            }
            Some("e") => true,
            Some(_) => {
                model.import_warning(
                    WarningKind::FlowSliceBindPointError,
                    "Flow event with invalid binding point (bp).",
                );
                return;
            }
        }
    };
    let slice_key = if bind_to_parent {
        find_slice_at(model, pid, tid, ts)
    } else {
        find_next_slice_after(model, pid, tid, ts)
    };
    let Some(slice_key) = slice_key else {
        model.import_warning(
            WarningKind::FlowSliceEndError,
            format!("Flow event ended at ts={ts} but no slice was found to bind to."),
        );
        return;
    };
    let Some(open_flow) = open.remove(&id) else {
        return;
    };
    finish_flow(model, open_flow.template, &event.arg_dict(), ts, slice_key);
    if phase == 't' {
        let mut flow = FlowEvent::new(
            event.category().to_owned(),
            event.title().to_owned(),
            event.color_id(),
            id.clone(),
            ts,
        );
        flow.args = event.arg_dict();
        flow.start_slice = Some(slice_key);
        open.insert(
            id,
            OpenFlow {
                template: flow,
                consumed: false,
            },
        );
    }
}

fn handle_v2(model: &mut Model, open: &mut HashMap<String, OpenFlow>, record: &V2FlowRecord) {
    match record.phase {
        FlowPhase::Producer => {
            if let Some(existing) = open.get(&record.bind_id) {
                if !existing.consumed {
                    model.import_warning(
                        WarningKind::FlowSliceOrderingError,
                        format!(
                            "Flow event id {} was reopened before it was consumed.",
                            record.bind_id
                        ),
                    );
                }
            }
            let flow = producer_flow(model, record);
            open.insert(
                record.bind_id.clone(),
                OpenFlow {
                    template: flow,
                    consumed: false,
                },
            );
        }
        FlowPhase::Consumer => {
            consume(model, open, record);
        }
        FlowPhase::Step => {
            if consume(model, open, record) {
                let flow = producer_flow(model, record);
                open.insert(
                    record.bind_id.clone(),
                    OpenFlow {
                        template: flow,
                        consumed: false,
                    },
                );
            }
        }
        FlowPhase::None => {}
    }
}

/// A v2 flow begins where its producing slice ends.
fn producer_flow(model: &Model, record: &V2FlowRecord) -> FlowEvent {
    let start = model
        .thread(ThreadKey {
            pid: record.slice.pid,
            tid: record.slice.tid,
        })
        .map(|thread| thread.slice_group.slices[record.slice.index].end())
        .unwrap_or_else(|| timestamp_from_us(record.ts));
    let mut flow = FlowEvent::new(
        record.category.clone(),
        record.title.clone(),
        record.color_id,
        record.bind_id.clone(),
        start,
    );
    flow.args = record.args.clone();
    flow.start_slice = Some(record.slice);
    flow
}

/// Binds the open flow for the record's id to the consuming slice. Returns
/// whether a producer existed.
fn consume(model: &mut Model, open: &mut HashMap<String, OpenFlow>, record: &V2FlowRecord) -> bool {
    let end_ts = timestamp_from_us(record.ts);
    let Some(open_flow) = open.get_mut(&record.bind_id) else {
        model.import_warning(
            WarningKind::FlowSliceOrderingError,
            format!(
                "Flow consumer with bind_id {} does not match any flow producer.",
                record.bind_id
            ),
        );
        return false;
    };
    // Later consumers get a fresh flow synthesized from the same template.
    open_flow.consumed = true;
    let flow = open_flow.template.clone();
    finish_flow(model, flow, &record.args, end_ts, record.slice);
    true
}
