use crate::event::TraceEvent;
use crate::importer::QueuedEvent;
use crate::stack_frames::resolve_event_stack_frame;
use std::collections::HashMap;
use tracemodel_model::args::merge_args;
use tracemodel_model::async_slice::AsyncSlice;
use tracemodel_model::color::color_id_for_general_purpose_string;
use tracemodel_model::import_warning::WarningKind;
use tracemodel_model::model::Model;
use tracemodel_model::thread::ThreadKey;
use tracemodel_model::time::timestamp_from_us;

/// Assembles the deferred asynchronous events into per-thread async slice
/// groups. Nestable (b/n/e) events pair within a (category, id) key; legacy
/// (S/T/p/F) events pair within a (name, id) key.
pub fn create_async_slices(model: &mut Model, mut queued: Vec<QueuedEvent>) {
    queued.sort_by(|a, b| {
        a.ts.partial_cmp(&b.ts)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.sequence.cmp(&b.sequence))
    });

    // Legacy groups close when their F arrives; nestable groups only pair
    // once the whole stream is known.
    let mut legacy_open: HashMap<(String, String), Vec<usize>> = HashMap::new();
    let mut nestable_keys: Vec<String> = Vec::new();
    let mut nestable_groups: HashMap<String, Vec<usize>> = HashMap::new();

    for index in 0..queued.len() {
        let event = &queued[index].event;
        let Some(phase) = event.phase() else {
            continue;
        };
        if event.name.is_none() {
            model.import_warning(
                WarningKind::AsyncSliceParseError,
                "Async events (ph: b, e, n, S, T, p, or F) require a name parameter.",
            );
            continue;
        }
        let Some(id) = event.id_string() else {
            model.import_warning(
                WarningKind::AsyncSliceParseError,
                "Async events (ph: b, e, n, S, T, p, or F) require an id parameter.",
            );
            continue;
        };

        match phase {
            'b' | 'n' | 'e' => {
                let key = format!("{}:{}", event.category(), id);
                nestable_groups
                    .entry(key.clone())
                    .or_insert_with(|| {
                        nestable_keys.push(key);
                        Vec::new()
                    })
                    .push(index);
            }
            'S' => {
                let key = (event.title().to_owned(), id.clone());
                let ts = queued[index].ts;
                if legacy_open.contains_key(&key) {
                    model.import_warning(
                        WarningKind::AsyncSliceParseError,
                        format!("At {ts}, a slice of the same id {id} was already open."),
                    );
                    continue;
                }
                legacy_open.insert(key, vec![index]);
            }
            'T' | 'p' | 'F' => {
                let key = (queued[index].event.title().to_owned(), id.clone());
                let ts = queued[index].ts;
                let Some(entries) = legacy_open.get_mut(&key) else {
                    model.import_warning(
                        WarningKind::AsyncSliceParseError,
                        format!("At {ts}, the slice of the same id {id} was not open."),
                    );
                    continue;
                };
                entries.push(index);
                if phase == 'F' {
                    let entries = legacy_open.remove(&key).unwrap_or_default();
                    create_legacy_slice(model, &queued, &entries, &id);
                }
            }
            _ => {}
        }
    }

    let mut still_open: Vec<(String, String)> = legacy_open.into_keys().collect();
    still_open.sort();
    for (name, id) in still_open {
        model.import_warning(
            WarningKind::AsyncSliceParseError,
            format!("At the end of the trace, async slice {name} with id {id} was still open."),
        );
    }

    for key in nestable_keys {
        if let Some(group) = nestable_groups.remove(&key) {
            create_nestable_slices(model, &queued, &group);
        }
    }
}

fn thread_key(event: &TraceEvent) -> ThreadKey {
    ThreadKey {
        pid: event.pid.unwrap_or_default(),
        tid: event.tid.unwrap_or_default(),
    }
}

/// Builds one legacy async slice from an S..F run, with one sub-slice per
/// step event.
fn create_legacy_slice(model: &mut Model, queued: &[QueuedEvent], entries: &[usize], id: &str) {
    if entries.len() < 2 {
        return;
    }
    let first = &queued[entries[0]];
    let last = &queued[entries[entries.len() - 1]];
    let name = first.event.title().to_owned();
    let category = first.event.category().to_owned();

    let mut slice = AsyncSlice::new(
        category.clone(),
        name.clone(),
        first.event.color_id(),
        timestamp_from_us(first.ts),
    );
    slice.duration = timestamp_from_us(last.ts) - timestamp_from_us(first.ts);
    slice.id = Some(id.to_owned());
    slice.args = first.event.arg_dict();
    slice.start_thread = Some(thread_key(&first.event));
    slice.end_thread = Some(thread_key(&last.event));
    slice.start_stack_frame = resolve_event_stack_frame(model, &first.event, false);
    slice.end_stack_frame = resolve_event_stack_frame(model, &last.event, false);
    slice.is_top_level = true;
    if first.event.use_async_tts() {
        slice.thread_start = first.event.tts.map(timestamp_from_us);
        if let (Some(begin_tts), Some(end_tts)) = (first.event.tts, last.event.tts) {
            slice.thread_duration = Some(timestamp_from_us(end_tts - begin_tts));
        }
    }

    if entries.len() > 2 {
        let step_type = queued[entries[1]].event.phase().unwrap_or('T');
        for j in 1..entries.len() - 1 {
            let step = &queued[entries[j]];
            let step_phase = step.event.phase().unwrap_or_default();
            if (step_phase == 'T' || step_phase == 'p') && step_phase != step_type {
                model.import_warning(
                    WarningKind::AsyncSliceParseError,
                    format!("At {}, phase mismatch.", step.ts),
                );
                return;
            }
            let start_index = if step_type == 'T' { j } else { j - 1 };
            let end_index = start_index + 1;
            let start = &queued[entries[start_index]];
            let end = &queued[entries[end_index]];

            let mut sub_name = step.event.title().to_owned();
            if step_phase == 'T' || step_phase == 'p' {
                if let Some(step_arg) =
                    step.event.arg_dict().get("step").and_then(|v| v.as_str())
                {
                    sub_name = format!("{sub_name}:{step_arg}");
                }
            }
            let mut sub = AsyncSlice::new(
                category.clone(),
                sub_name.clone(),
                color_id_for_general_purpose_string(&sub_name),
                timestamp_from_us(start.ts),
            );
            sub.duration = timestamp_from_us(end.ts) - timestamp_from_us(start.ts);
            sub.id = Some(id.to_owned());
            sub.args = step.event.arg_dict();
            sub.start_thread = Some(thread_key(&start.event));
            sub.end_thread = Some(thread_key(&end.event));
            slice.sub_slices.push(sub);
        }
    }

    let start_thread = thread_key(&first.event);
    model
        .get_or_create_process(start_thread.pid)
        .get_or_create_thread(start_thread.tid)
        .async_slice_group
        .push(slice);
}

#[derive(Debug)]
struct PendingNestable {
    begin: Option<usize>,
    end: Option<usize>,
    parent: Option<usize>,
    is_instant: bool,
}

/// Pairs the b/n/e events of one (category, id) key. Each `e` closes the
/// nearest enclosing open `b` carrying the same name; the rest become
/// partial slices with an error note.
fn create_nestable_slices(model: &mut Model, queued: &[QueuedEvent], group: &[usize]) {
    if group.is_empty() {
        return;
    }
    let mut pendings: Vec<PendingNestable> = Vec::new();
    let mut open_stack: Vec<usize> = Vec::new();

    for &index in group {
        let event = &queued[index].event;
        match event.phase() {
            Some('b') => {
                let pending = PendingNestable {
                    begin: Some(index),
                    end: None,
                    parent: open_stack.last().copied(),
                    is_instant: false,
                };
                open_stack.push(pendings.len());
                pendings.push(pending);
            }
            Some('n') => {
                pendings.push(PendingNestable {
                    begin: Some(index),
                    end: Some(index),
                    parent: open_stack.last().copied(),
                    is_instant: true,
                });
            }
            Some('e') => {
                let matched = open_stack.iter().rposition(|&pending| {
                    pendings[pending]
                        .begin
                        .map(|b| queued[b].event.title() == event.title())
                        .unwrap_or(false)
                });
                match matched {
                    Some(position) => {
                        let pending = open_stack.remove(position);
                        pendings[pending].end = Some(index);
                    }
                    None => {
                        pendings.push(PendingNestable {
                            begin: None,
                            end: Some(index),
                            parent: open_stack.last().copied(),
                            is_instant: false,
                        });
                    }
                }
            }
            _ => {}
        }
    }

    let first_ts = timestamp_from_us(queued[group[0]].ts);
    let last_ts = timestamp_from_us(queued[group[group.len() - 1]].ts);
    let group_id = queued[group[0]].event.id_string();

    let mut slices: Vec<Option<AsyncSlice>> = Vec::with_capacity(pendings.len());
    for pending in &pendings {
        let reference = pending.begin.or(pending.end).map(|i| &queued[i].event);
        let Some(reference) = reference else {
            slices.push(None);
            continue;
        };
        let mut slice = AsyncSlice::new(
            reference.category().to_owned(),
            reference.title().to_owned(),
            reference.color_id(),
            first_ts,
        );
        slice.id = group_id.clone();
        match (pending.begin, pending.end) {
            (Some(b), Some(_)) if pending.is_instant => {
                let begin = &queued[b];
                slice.start = timestamp_from_us(begin.ts);
                slice.duration = 0.0;
                slice.args = begin.event.arg_dict();
                slice.start_thread = Some(thread_key(&begin.event));
                slice.end_thread = Some(thread_key(&begin.event));
                slice.start_stack_frame = resolve_event_stack_frame(model, &begin.event, false);
            }
            (Some(b), Some(e)) => {
                let begin = &queued[b];
                let end = &queued[e];
                slice.start = timestamp_from_us(begin.ts);
                slice.duration = timestamp_from_us(end.ts) - slice.start;
                let mut args = begin.event.arg_dict();
                merge_args(&mut args, &end.event.arg_dict());
                slice.args = args;
                slice.start_thread = Some(thread_key(&begin.event));
                slice.end_thread = Some(thread_key(&end.event));
                slice.start_stack_frame = resolve_event_stack_frame(model, &begin.event, false);
                slice.end_stack_frame = resolve_event_stack_frame(model, &end.event, false);
                if begin.event.use_async_tts() {
                    slice.thread_start = begin.event.tts.map(timestamp_from_us);
                    if let (Some(begin_tts), Some(end_tts)) = (begin.event.tts, end.event.tts) {
                        slice.thread_duration = Some(timestamp_from_us(end_tts - begin_tts));
                    }
                }
            }
            (Some(b), None) => {
                let begin = &queued[b];
                slice.start = timestamp_from_us(begin.ts);
                slice.duration = last_ts - slice.start;
                slice.args = begin.event.arg_dict();
                slice.start_thread = Some(thread_key(&begin.event));
                slice.end_thread = Some(thread_key(&begin.event));
                slice.start_stack_frame = resolve_event_stack_frame(model, &begin.event, false);
                slice.error = Some(
                    "Slice has no matching END. End time has been adjusted to the end of the trace."
                        .to_owned(),
                );
            }
            (None, Some(e)) => {
                let end = &queued[e];
                slice.start = first_ts;
                slice.duration = timestamp_from_us(end.ts) - first_ts;
                slice.args = end.event.arg_dict();
                slice.start_thread = Some(thread_key(&end.event));
                slice.end_thread = Some(thread_key(&end.event));
                slice.end_stack_frame = resolve_event_stack_frame(model, &end.event, false);
                slice.error = Some(
                    "Slice has no matching BEGIN. Start time has been adjusted to the start of the trace."
                        .to_owned(),
                );
            }
            (None, None) => {}
        }
        slices.push(Some(slice));
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); pendings.len()];
    let mut roots: Vec<usize> = Vec::new();
    for (index, pending) in pendings.iter().enumerate() {
        match pending.parent {
            Some(parent) => children[parent].push(index),
            None => roots.push(index),
        }
    }

    fn assemble(
        index: usize,
        slices: &mut Vec<Option<AsyncSlice>>,
        children: &[Vec<usize>],
    ) -> Option<AsyncSlice> {
        let mut slice = slices[index].take()?;
        for &child in &children[index] {
            if let Some(sub) = assemble(child, slices, children) {
                slice.sub_slices.push(sub);
            }
        }
        Some(slice)
    }

    for root in roots {
        if let Some(mut slice) = assemble(root, &mut slices, &children) {
            slice.is_top_level = true;
            let key = slice.start_thread.unwrap_or(ThreadKey { pid: 0, tid: 0 });
            model
                .get_or_create_process(key.pid)
                .get_or_create_thread(key.tid)
                .async_slice_group
                .push(slice);
        }
    }
}
