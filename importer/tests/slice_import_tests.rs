use serde_json::json;
use tracemodel_importer::importer::{ImportOptions, import_trace_container};
use tracemodel_importer::TraceContainer;
use tracemodel_model::import_warning::WarningKind;
use tracemodel_model::model::Model;

fn import(events: serde_json::Value) -> Model {
    let container = TraceContainer::from_json(json!({ "traceEvents": events })).unwrap();
    import_trace_container(
        container,
        &ImportOptions {
            shift_world_to_zero: false,
            prune_empty_containers: false,
        },
    )
    .unwrap()
}

#[test]
fn begin_end_pair_produces_one_closed_slice() {
    let model = import(json!([
        {"ph": "B", "pid": 1, "tid": 1, "ts": 0, "name": "a"},
        {"ph": "E", "pid": 1, "tid": 1, "ts": 10, "name": "a"},
    ]));
    let thread = &model.processes[&1].threads[&1];
    assert_eq!(thread.slice_group.len(), 1);
    let slice = &thread.slice_group.slices[0];
    assert_eq!(slice.title, "a");
    assert_eq!(slice.duration, Some(0.01));
    assert!(model.import_warnings.is_empty());
}

#[test]
fn unclosed_outer_slice_is_auto_closed_at_world_max() {
    let model = import(json!([
        {"ph": "B", "pid": 1, "tid": 1, "ts": 0, "name": "a"},
        {"ph": "B", "pid": 1, "tid": 1, "ts": 5, "name": "b"},
        {"ph": "E", "pid": 1, "tid": 1, "ts": 8, "name": "b"},
    ]));
    let group = &model.processes[&1].threads[&1].slice_group;
    assert_eq!(group.open_slice_count(), 0);
    let outer = group.slices.iter().find(|s| s.title == "a").unwrap();
    let inner = group.slices.iter().find(|s| s.title == "b").unwrap();
    assert_eq!(inner.duration, Some(0.003));
    assert_eq!(outer.duration, Some(0.008));
    assert!(model.import_warnings.is_empty());
}

#[test]
fn end_name_mismatch_still_closes_with_a_warning() {
    let model = import(json!([
        {"ph": "B", "pid": 1, "tid": 1, "ts": 0, "name": "a"},
        {"ph": "E", "pid": 1, "tid": 1, "ts": 4, "name": "zzz"},
    ]));
    let group = &model.processes[&1].threads[&1].slice_group;
    assert_eq!(group.slices[0].duration, Some(0.004));
    assert_eq!(
        model.import_warnings[0].kind,
        WarningKind::TitleMatchError
    );
}

#[test]
fn end_without_begin_is_dropped_with_a_warning() {
    let model = import(json!([
        {"ph": "E", "pid": 1, "tid": 1, "ts": 10, "name": "a"},
    ]));
    assert_eq!(model.processes[&1].threads[&1].slice_group.len(), 0);
    assert_eq!(
        model.import_warnings[0].kind,
        WarningKind::DurationParseError
    );
    assert_eq!(
        model.import_warnings[0].message,
        "E phase event without a matching B phase event."
    );
}

#[test]
fn backward_timestamps_are_dropped_with_a_warning() {
    let model = import(json!([
        {"ph": "B", "pid": 1, "tid": 1, "ts": 10, "name": "a"},
        {"ph": "E", "pid": 1, "tid": 1, "ts": 20, "name": "a"},
        {"ph": "B", "pid": 1, "tid": 1, "ts": 5, "name": "late"},
    ]));
    let group = &model.processes[&1].threads[&1].slice_group;
    assert_eq!(group.len(), 1);
    assert_eq!(model.import_warnings[0].message, "Timestamps are moving backward.");
}

#[test]
fn end_args_merge_into_the_open_slice() {
    let model = import(json!([
        {"ph": "B", "pid": 1, "tid": 1, "ts": 0, "name": "a", "args": {"x": 1, "y": 1}},
        {"ph": "E", "pid": 1, "tid": 1, "ts": 5, "name": "a", "args": {"y": 2, "z": 3}},
    ]));
    let slice = &model.processes[&1].threads[&1].slice_group.slices[0];
    assert_eq!(slice.args.get("x").and_then(|v| v.as_f64()), Some(1.0));
    assert_eq!(slice.args.get("y").and_then(|v| v.as_f64()), Some(2.0));
    assert_eq!(slice.args.get("z").and_then(|v| v.as_f64()), Some(3.0));
    assert_eq!(model.import_warnings[0].kind, WarningKind::ArgMergeError);
}

#[test]
fn complete_slices_nest_and_overhead_is_dropped() {
    let model = import(json!([
        {"ph": "X", "pid": 1, "tid": 1, "ts": 0, "dur": 100, "name": "outer"},
        {"ph": "X", "pid": 1, "tid": 1, "ts": 20, "dur": 30, "name": "inner"},
        {"ph": "X", "pid": 1, "tid": 1, "ts": 0, "dur": 1, "name": "overhead",
         "cat": "trace_event_overhead"},
    ]));
    let group = &model.processes[&1].threads[&1].slice_group;
    assert_eq!(group.len(), 2);
    assert_eq!(group.top_level_slices.len(), 1);
    let outer = &group.slices[group.top_level_slices[0]];
    assert_eq!(outer.title, "outer");
    assert_eq!(outer.children.len(), 1);
    assert_eq!(group.slices[outer.children[0]].title, "inner");
}

#[test]
fn thread_scoped_instants_become_degenerate_slices() {
    let model = import(json!([
        {"ph": "I", "pid": 1, "tid": 1, "ts": 3, "name": "mark"},
        {"ph": "i", "pid": 1, "tid": 1, "ts": 4, "name": "mark2", "s": "t"},
        {"ph": "I", "pid": 1, "ts": 5, "name": "pmark", "s": "p"},
        {"ph": "I", "ts": 6, "name": "gmark", "s": "g"},
    ]));
    let group = &model.processes[&1].threads[&1].slice_group;
    assert_eq!(group.len(), 2);
    assert_eq!(group.slices[0].duration, Some(0.0));
    assert_eq!(model.processes[&1].instant_events.len(), 1);
    assert_eq!(model.instant_events.len(), 1);
    assert_eq!(model.instant_events[0].title, "gmark");
}

#[test]
fn unknown_instant_scope_warns_and_drops() {
    let model = import(json!([
        {"ph": "I", "pid": 1, "tid": 1, "ts": 3, "name": "mark", "s": "q"},
    ]));
    assert_eq!(
        model.import_warnings[0].kind,
        WarningKind::InstantParseError
    );
}

#[test]
fn counters_build_one_series_per_arg() {
    let model = import(json!([
        {"ph": "C", "pid": 1, "ts": 0, "name": "mem", "args": {"used": 10, "free": 20}},
        {"ph": "C", "pid": 1, "ts": 5, "name": "mem", "args": {"used": 11}},
    ]));
    let counter = &model.processes[&1].counters[&("".to_owned(), "mem".to_owned())];
    assert_eq!(counter.num_series(), 2);
    assert_eq!(counter.timestamps, vec![0.0, 0.005]);
    let used = counter.series.iter().find(|s| s.name == "used").unwrap();
    let free = counter.series.iter().find(|s| s.name == "free").unwrap();
    assert_eq!(used.values, vec![10.0, 11.0]);
    assert_eq!(free.values, vec![20.0, 0.0]);
}

#[test]
fn counter_with_id_gets_a_suffixed_name() {
    let model = import(json!([
        {"ph": "C", "pid": 1, "ts": 0, "name": "ctr", "id": "0x1", "args": {"value": 1}},
    ]));
    assert!(
        model.processes[&1]
            .counters
            .contains_key(&("".to_owned(), "ctr[0x1]".to_owned()))
    );
}

#[test]
fn counter_without_args_is_dropped() {
    let model = import(json!([
        {"ph": "C", "pid": 1, "ts": 0, "name": "empty", "args": {}},
    ]));
    assert!(model.processes[&1].counters.is_empty());
    assert_eq!(
        model.import_warnings[0].kind,
        WarningKind::CounterParseError
    );
}

#[test]
fn metadata_names_processes_and_threads() {
    let model = import(json!([
        {"ph": "M", "pid": 1, "name": "process_name", "args": {"name": "Browser"}},
        {"ph": "M", "pid": 1, "name": "process_labels", "args": {"labels": "a,b"}},
        {"ph": "M", "pid": 1, "name": "process_sort_index", "args": {"sort_index": -5}},
        {"ph": "M", "pid": 1, "tid": 2, "name": "thread_name", "args": {"name": "CrRenderer"}},
        {"ph": "M", "pid": 1, "tid": 2, "name": "thread_sort_index", "args": {"sort_index": 3}},
        {"ph": "M", "pid": 1, "name": "num_cpus", "args": {"number": 8}},
        {"ph": "M", "pid": 1, "name": "num_cpus", "args": {"number": 4}},
        {"ph": "M", "pid": 1, "name": "wat", "args": {}},
    ]));
    let process = &model.processes[&1];
    assert_eq!(process.name.as_deref(), Some("Browser"));
    assert_eq!(process.labels, vec!["a".to_owned(), "b".to_owned()]);
    assert_eq!(process.sort_index, Some(-5));
    assert_eq!(process.threads[&2].name.as_deref(), Some("CrRenderer"));
    assert_eq!(process.threads[&2].sort_index, Some(3));
    assert_eq!(model.software_measured_cpu_count, Some(8));
    assert_eq!(
        model.import_warnings[0].message,
        "Unrecognized metadata name: wat."
    );
}

#[test]
fn unknown_phase_warns_and_continues() {
    let model = import(json!([
        {"ph": "?", "pid": 1, "tid": 1, "ts": 0, "name": "junk"},
        {"ph": "B", "pid": 1, "tid": 1, "ts": 1, "name": "a"},
        {"ph": "E", "pid": 1, "tid": 1, "ts": 2, "name": "a"},
    ]));
    assert_eq!(model.import_warnings[0].kind, WarningKind::ParseError);
    assert_eq!(model.processes[&1].threads[&1].slice_group.len(), 1);
}

#[test]
fn every_run_records_the_synthetic_clock_sync() {
    let model = import(json!([]));
    assert_eq!(model.clock_sync_records.len(), 1);
    assert_eq!(model.clock_sync_records[0].name, "ftrace_importer");
    assert_eq!(model.clock_sync_records[0].ts, 0.0);
}

#[test]
fn stripped_args_set_the_flag() {
    let model = import(json!([
        {"ph": "B", "pid": 1, "tid": 1, "ts": 0, "name": "a", "args": "__stripped__"},
        {"ph": "E", "pid": 1, "tid": 1, "ts": 1, "name": "a"},
    ]));
    let slice = &model.processes[&1].threads[&1].slice_group.slices[0];
    assert!(slice.args_stripped);
    assert!(slice.args.is_empty());
}

#[test]
fn shift_world_to_zero_rebases_all_timestamps() {
    let container = TraceContainer::from_json(json!({"traceEvents": [
        {"ph": "X", "pid": 1, "tid": 1, "ts": 1000, "dur": 10, "name": "a"},
        {"ph": "X", "pid": 1, "tid": 1, "ts": 1500, "dur": 10, "name": "b"},
    ]}))
    .unwrap();
    let model = import_trace_container(container, &ImportOptions::default()).unwrap();
    assert_eq!(model.bounds.min(), Some(0.0));
    let group = &model.processes[&1].threads[&1].slice_group;
    assert_eq!(group.slices[0].start, 0.0);
    assert_eq!(group.slices[1].start, 0.5);
}

#[test]
fn identical_inputs_produce_identical_models() {
    let events = json!([
        {"ph": "B", "pid": 1, "tid": 1, "ts": 0, "name": "a", "args": {"k": 1}},
        {"ph": "X", "pid": 1, "tid": 2, "ts": 2, "dur": 5, "name": "x"},
        {"ph": "E", "pid": 1, "tid": 1, "ts": 10, "name": "a"},
        {"ph": "C", "pid": 1, "ts": 3, "name": "ctr", "args": {"v": 9}},
    ]);
    let first = import(events.clone());
    let second = import(events);
    assert_eq!(
        format!("{:?}", first.processes),
        format!("{:?}", second.processes)
    );
    assert_eq!(first.import_warnings, second.import_warnings);
}
