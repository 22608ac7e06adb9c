use serde_json::json;
use tracemodel_importer::TraceContainer;
use tracemodel_importer::importer::{ImportOptions, import_trace_container};
use tracemodel_model::import_warning::WarningKind;
use tracemodel_model::memory_dump::{LevelOfDetail, MemoryDumpEdgeType};
use tracemodel_model::model::Model;

fn import(value: serde_json::Value) -> Model {
    let container = TraceContainer::from_json(value).unwrap();
    import_trace_container(
        container,
        &ImportOptions {
            shift_world_to_zero: false,
            prune_empty_containers: false,
        },
    )
    .unwrap()
}

fn import_events(events: serde_json::Value) -> Model {
    import(json!({ "traceEvents": events }))
}

#[test]
fn global_dump_merges_process_dumps_and_shared_allocators() {
    let model = import_events(json!([
        {"ph": "v", "pid": 1, "ts": 10, "id": "abc", "args": {"dumps": {
            "process_totals": {"resident_set_bytes": "0x1000"},
            "allocators": {
                "global/shared": {"guid": "g1", "attrs": {
                    "size": {"type": "scalar", "units": "bytes", "value": "100"}}},
                "malloc": {"guid": "p1", "attrs": {}},
            },
        }}},
        {"ph": "v", "pid": 2, "ts": 30, "id": "abc", "args": {"dumps": {
            "process_totals": {"resident_set_bytes": "0x2000"},
            "allocators": {
                "global/shared": {"guid": "g1", "attrs": {
                    "count": {"type": "scalar", "units": "objects", "value": "5"}}},
            },
        }}},
        {"ph": "V", "ts": 20, "id": "abc"},
    ]));

    assert_eq!(model.global_memory_dumps.len(), 1);
    let dump = &model.global_memory_dumps[0];
    assert_eq!(dump.start, 0.01);
    assert_eq!(dump.duration, 0.02);
    assert_eq!(dump.process_dumps.len(), 2);
    assert_eq!(
        dump.process_dumps[&1].totals.unwrap().resident_bytes,
        0x1000
    );
    assert_eq!(
        dump.process_dumps[&2].totals.unwrap().resident_bytes,
        0x2000
    );

    let shared = dump.allocator_dumps.get("shared").expect("merged dump");
    assert_eq!(shared.guid.as_deref(), Some("g1"));
    assert!(shared.attributes.contains_key("size"));
    assert!(shared.attributes.contains_key("count"));

    assert!(dump.process_dumps[&1].allocator_dumps.get("malloc").is_some());
    assert_eq!(model.processes[&1].memory_dumps, vec![0]);
    assert_eq!(model.processes[&2].memory_dumps, vec![0]);
    assert!(model.import_warnings.is_empty());
}

#[test]
fn allocator_names_infer_a_tree_with_implicit_parents() {
    let model = import_events(json!([
        {"ph": "v", "pid": 1, "ts": 0, "id": "d", "args": {"dumps": {
            "process_totals": {"resident_set_bytes": "0"},
            "allocators": {
                "malloc/allocated_objects/heap": {"guid": "a", "attrs": {}},
                "malloc/metadata": {"guid": "b", "attrs": {}},
            },
        }}},
        {"ph": "V", "ts": 0, "id": "d"},
    ]));
    let dumps = &model.global_memory_dumps[0].process_dumps[&1].allocator_dumps;
    let root = dumps.get("malloc").expect("implicit root");
    assert!(root.parent.is_none());
    assert_eq!(root.children.len(), 2);
    assert_eq!(dumps.roots.len(), 1);
    let leaf = dumps.get("malloc/allocated_objects/heap").unwrap();
    let parent = &dumps.dumps[leaf.parent.unwrap()];
    assert_eq!(parent.full_name, "malloc/allocated_objects");
}

#[test]
fn vm_regions_parse_hex_fields() {
    let model = import_events(json!([
        {"ph": "v", "pid": 1, "ts": 0, "id": "d", "args": {"dumps": {
            "process_totals": {"resident_set_bytes": "0"},
            "process_mmaps": {"vm_regions": [
                {"sa": "c000", "sz": "1000", "pf": 6, "mf": "[heap]",
                 "bs": {"pc": "a", "pd": "b", "pss": "c", "sw": "0"}},
            ]},
        }}},
        {"ph": "V", "ts": 0, "id": "d"},
    ]));
    let regions = &model.global_memory_dumps[0].process_dumps[&1].vm_regions;
    assert_eq!(regions.len(), 1);
    let region = &regions[0];
    assert_eq!(region.start_address, 0xc000);
    assert_eq!(region.size_in_bytes, 0x1000);
    assert_eq!(region.protection_flags, 6);
    assert_eq!(region.mapped_file, "[heap]");
    assert_eq!(region.byte_stats.private_clean_resident, Some(0xa));
    assert_eq!(region.byte_stats.proportional_resident, Some(0xc));
    assert_eq!(region.byte_stats.swapped, Some(0));
    assert_eq!(region.byte_stats.shared_clean_resident, None);
}

#[test]
fn level_of_detail_takes_the_maximum_and_warns_on_disagreement() {
    let model = import_events(json!([
        {"ph": "v", "pid": 1, "ts": 0, "id": "d", "args": {"dumps": {
            "process_totals": {"resident_set_bytes": "0"},
            "level_of_detail": "light",
        }}},
        {"ph": "v", "pid": 2, "ts": 1, "id": "d", "args": {"dumps": {
            "process_totals": {"resident_set_bytes": "0"},
            "level_of_detail": "detailed",
        }}},
        {"ph": "V", "ts": 0, "id": "d"},
    ]));
    let dump = &model.global_memory_dumps[0];
    assert_eq!(dump.level_of_detail, Some(LevelOfDetail::Detailed));
    assert!(
        model
            .import_warnings
            .iter()
            .any(|w| w.kind == WarningKind::MemoryDumpParseError)
    );
}

#[test]
fn ownership_edges_are_unique_per_source() {
    let model = import_events(json!([
        {"ph": "v", "pid": 1, "ts": 0, "id": "d", "args": {"dumps": {
            "process_totals": {"resident_set_bytes": "0"},
            "allocators": {
                "a": {"guid": "ga", "attrs": {}},
                "b": {"guid": "gb", "attrs": {}},
                "c": {"guid": "gc", "attrs": {}},
            },
            "allocators_graph": [
                {"source": "ga", "target": "gb", "type": "ownership", "importance": 2},
                {"source": "ga", "target": "gc", "type": "ownership", "importance": 1},
                {"source": "ga", "target": "gc", "type": "retention", "importance": 0},
                {"source": "ga", "target": "missing", "type": "retention", "importance": 0},
            ],
        }}},
        {"ph": "V", "ts": 0, "id": "d"},
    ]));
    let dump = &model.global_memory_dumps[0];
    assert_eq!(dump.edges.len(), 2);
    assert_eq!(dump.edges[0].edge_type, MemoryDumpEdgeType::Ownership);
    assert_eq!(dump.edges[0].importance, 2);
    assert_eq!(dump.edges[1].edge_type, MemoryDumpEdgeType::Retention);
    assert_eq!(
        model
            .import_warnings
            .iter()
            .filter(|w| w.kind == WarningKind::MemoryDumpParseError)
            .count(),
        2
    );
}

#[test]
fn heap_dumps_resolve_frames_through_the_process_prefix() {
    let model = import_events(json!([
        {"ph": "M", "pid": 1, "name": "stackFrames", "args": {"stackFrames": {
            "1": {"name": "main"},
            "2": {"name": "alloc", "parent": "1"},
        }}},
        {"ph": "v", "pid": 1, "ts": 0, "id": "d", "args": {"dumps": {
            "process_totals": {"resident_set_bytes": "0"},
            "heaps": {"malloc": {"entries": [
                {"bt": "2", "size": "20"},
                {"bt": "", "size": "40"},
                {"bt": "99", "size": "1"},
            ]}},
        }}},
        {"ph": "V", "ts": 0, "id": "d"},
    ]));
    let heap = &model.global_memory_dumps[0].process_dumps[&1].heap_dumps["malloc"];
    assert_eq!(heap.entries.len(), 2);
    assert_eq!(heap.entries[0].leaf_stack_frame, "p1:2");
    assert_eq!(heap.entries[0].size_in_bytes, 0x20);
    // An empty backtrace resolves to the synthetic root frame.
    assert_eq!(heap.entries[1].leaf_stack_frame, "p1:");
    assert!(
        model
            .import_warnings
            .iter()
            .any(|w| w.kind == WarningKind::MemoryDumpParseError)
    );
}

#[test]
fn duplicate_pid_and_duplicate_global_warn() {
    let model = import_events(json!([
        {"ph": "v", "pid": 1, "ts": 0, "id": "d", "args": {"dumps": {
            "process_totals": {"resident_set_bytes": "0"}}}},
        {"ph": "v", "pid": 1, "ts": 5, "id": "d", "args": {"dumps": {
            "process_totals": {"resident_set_bytes": "0"}}}},
        {"ph": "V", "ts": 0, "id": "d"},
        {"ph": "V", "ts": 9, "id": "d"},
    ]));
    assert_eq!(model.global_memory_dumps.len(), 1);
    assert_eq!(model.global_memory_dumps[0].process_dumps.len(), 1);
    assert_eq!(
        model
            .import_warnings
            .iter()
            .filter(|w| w.kind == WarningKind::MemoryDumpParseError)
            .count(),
        2
    );
}

#[test]
fn container_samples_resolve_against_container_stack_frames() {
    let model = import(json!({
        "traceEvents": [
            {"ph": "B", "pid": 1, "tid": 7, "ts": 0, "name": "a"},
            {"ph": "E", "pid": 1, "tid": 7, "ts": 10, "name": "a"},
        ],
        "stackFrames": {
            "1": {"name": "main"},
            "2": {"name": "work", "parent": "1"},
        },
        "samples": [
            {"tid": 7, "ts": 5, "name": "cycles", "sf": "2", "weight": 2},
            {"tid": 99, "ts": 6, "name": "cycles", "sf": "2"},
            {"tid": 7, "ts": 7, "name": "cycles", "sf": "44"},
        ],
    }));
    assert_eq!(model.samples.len(), 1);
    let sample = &model.samples[0];
    assert_eq!(sample.thread.tid, 7);
    assert_eq!(sample.leaf_stack_frame.as_deref(), Some("g2"));
    assert_eq!(sample.weight, 2.0);
    assert_eq!(
        model
            .import_warnings
            .iter()
            .filter(|w| w.kind == WarningKind::SampleImportError)
            .count(),
        2
    );
}

#[test]
fn trace_sample_events_synthesize_shared_frames() {
    let model = import_events(json!([
        {"ph": "P", "pid": 1, "tid": 1, "ts": 1, "name": "hot"},
        {"ph": "P", "pid": 1, "tid": 1, "ts": 2, "name": "hot"},
    ]));
    assert_eq!(model.samples.len(), 2);
    assert_eq!(model.samples[0].title, "Trace Event Sample");
    assert_eq!(
        model.samples[0].leaf_stack_frame,
        model.samples[1].leaf_stack_frame
    );
    let frame_id = model.samples[0].leaf_stack_frame.as_deref().unwrap();
    assert_eq!(model.stack_frames.get(frame_id).unwrap().title, "hot");
}

#[test]
fn display_time_unit_must_be_legal() {
    let container =
        TraceContainer::from_json(json!({"traceEvents": [], "displayTimeUnit": "s"})).unwrap();
    assert!(import_trace_container(container, &ImportOptions::default()).is_err());

    let model = import(json!({"traceEvents": [], "displayTimeUnit": "ns"}));
    assert!(model.intrinsic_time_unit().is_some());
}
