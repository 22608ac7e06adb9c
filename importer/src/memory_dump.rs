use crate::event::{TraceEvent, arg_value_from_json, json_id_string, json_is_truthy};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracemodel_model::args::ArgValue;
use tracemodel_model::import_warning::WarningKind;
use tracemodel_model::memory_dump::{
    AllocatorAttribute, GlobalMemoryDump, HeapDump, HeapEntry, LevelOfDetail,
    MemoryAllocatorDumps, MemoryDumpEdge, MemoryDumpEdgeType, ProcessMemoryDump, ProcessTotals,
    VmRegion, VmRegionByteStats,
};
use tracemodel_model::model::Model;
use tracemodel_model::time::timestamp_from_us;

/// The buffered dump events of one dump id: one global (V) event and the
/// per-process (v) events.
#[derive(Debug, Default)]
pub struct MemoryDumpEventGroup {
    pub global: Option<TraceEvent>,
    pub process: Vec<TraceEvent>,
}

/// Identity of an allocator dump container within one global dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContainerId {
    Global,
    Process(i64),
}

#[derive(Debug)]
struct RawEdge {
    source: Option<String>,
    target: Option<String>,
    edge_type: Option<String>,
    importance: i64,
}

/// Assembles the buffered v/V events into global memory dumps with their
/// process dumps, allocator trees, edges, and heap dumps.
pub fn create_memory_dumps(model: &mut Model, groups: BTreeMap<String, MemoryDumpEventGroup>) {
    for (id, group) in groups {
        let Some(global_event) = group.global else {
            model.import_warning(
                WarningKind::MemoryDumpParseError,
                format!("Global memory dump event with id={id} not found."),
            );
            continue;
        };

        let mut min_ts = global_event.ts.unwrap_or_default();
        let mut max_ts = min_ts;
        for event in &group.process {
            let ts = event.ts.unwrap_or_default();
            min_ts = min_ts.min(ts);
            max_ts = max_ts.max(ts);
        }
        let start = timestamp_from_us(min_ts);
        let mut global_dump =
            GlobalMemoryDump::new(id.clone(), start, timestamp_from_us(max_ts) - start);

        let mut guid_index: HashMap<String, (ContainerId, String)> = HashMap::new();
        let mut raw_edges: Vec<RawEdge> = Vec::new();
        let mut seen_pids: HashSet<i64> = HashSet::new();

        for event in &group.process {
            let pid = event.pid.unwrap_or_default();
            if !seen_pids.insert(pid) {
                model.import_warning(
                    WarningKind::MemoryDumpParseError,
                    format!("Multiple process memory dumps with pid={pid} for dump id={id}."),
                );
                continue;
            }
            let mut dump =
                ProcessMemoryDump::new(pid, timestamp_from_us(event.ts.unwrap_or_default()));
            let Some(dumps) = event
                .args_object()
                .and_then(|args| args.get("dumps"))
                .and_then(JsonValue::as_object)
            else {
                model.import_warning(
                    WarningKind::MemoryDumpParseError,
                    format!("Process memory dump for pid={pid} id={id} has no dumps field."),
                );
                continue;
            };
            parse_process_totals(model, &mut dump, dumps, pid);
            parse_vm_regions(model, &mut dump, dumps, pid);
            parse_level_of_detail(model, &mut dump, dumps, pid);
            parse_allocator_dumps(
                model,
                &mut global_dump,
                &mut dump,
                &mut guid_index,
                dumps,
                pid,
            );
            parse_heap_dumps(model, &mut dump, dumps, pid);
            collect_edges(dumps, &mut raw_edges);
            global_dump.process_dumps.insert(pid, dump);
        }

        let levels: Vec<Option<LevelOfDetail>> = global_dump
            .process_dumps
            .values()
            .map(|dump| dump.level_of_detail)
            .collect();
        if let Some(&first) = levels.first() {
            if levels.iter().any(|&level| level != first) {
                model.import_warning(
                    WarningKind::MemoryDumpParseError,
                    format!("Process memory dumps for id={id} have differing levels of detail."),
                );
            }
            global_dump.level_of_detail = levels.into_iter().max().flatten();
        }

        for dump in global_dump.process_dumps.values_mut() {
            dump.allocator_dumps.infer_tree();
        }
        global_dump.allocator_dumps.infer_tree();

        resolve_edges(model, &mut global_dump, &guid_index, raw_edges, &id);

        let dump_index = model.global_memory_dumps.len();
        let pids: Vec<i64> = global_dump.process_dumps.keys().copied().collect();
        model.global_memory_dumps.push(global_dump);
        for pid in pids {
            model.get_or_create_process(pid).memory_dumps.push(dump_index);
        }
    }
}

/// Hex fields arrive as strings with or without a 0x prefix; bare numbers
/// are taken at face value.
fn parse_hex_bytes(value: &JsonValue) -> Option<u64> {
    match value {
        JsonValue::String(s) => {
            let digits = s
                .strip_prefix("0x")
                .or_else(|| s.strip_prefix("0X"))
                .unwrap_or(s);
            u64::from_str_radix(digits, 16).ok()
        }
        JsonValue::Number(n) => n.as_u64(),
        _ => None,
    }
}

fn hex_field(raw: &serde_json::Map<String, JsonValue>, field: &str) -> Option<u64> {
    raw.get(field).and_then(parse_hex_bytes)
}

fn parse_process_totals(
    model: &mut Model,
    dump: &mut ProcessMemoryDump,
    dumps: &serde_json::Map<String, JsonValue>,
    pid: i64,
) {
    let Some(raw) = dumps.get("process_totals").and_then(JsonValue::as_object) else {
        return;
    };
    let Some(resident_bytes) = hex_field(raw, "resident_set_bytes") else {
        model.import_warning(
            WarningKind::MemoryDumpParseError,
            format!("Mandatory field resident_set_bytes missing in process memory dump for pid={pid}."),
        );
        return;
    };
    let peak = hex_field(raw, "peak_resident_set_bytes");
    let resettable = raw.get("is_peak_rss_resetable");
    let (peak_resident_bytes, are_peak_resident_bytes_resettable) = match (peak, resettable) {
        (Some(peak), Some(resettable)) => (Some(peak), json_is_truthy(Some(resettable))),
        (None, None) => (None, false),
        _ => {
            model.import_warning(
                WarningKind::MemoryDumpParseError,
                format!(
                    "peak_resident_set_bytes and is_peak_rss_resetable must be specified \
                     together in process memory dump for pid={pid}."
                ),
            );
            (None, false)
        }
    };
    dump.totals = Some(ProcessTotals {
        resident_bytes,
        peak_resident_bytes,
        are_peak_resident_bytes_resettable,
    });
}

fn parse_vm_regions(
    model: &mut Model,
    dump: &mut ProcessMemoryDump,
    dumps: &serde_json::Map<String, JsonValue>,
    pid: i64,
) {
    let Some(regions) = dumps
        .get("process_mmaps")
        .and_then(|mmaps| mmaps.get("vm_regions"))
        .and_then(JsonValue::as_array)
    else {
        return;
    };
    for raw_region in regions {
        let Some(raw) = raw_region.as_object() else {
            continue;
        };
        let (Some(start_address), Some(size_in_bytes)) =
            (hex_field(raw, "sa"), hex_field(raw, "sz"))
        else {
            model.import_warning(
                WarningKind::MemoryDumpParseError,
                format!("VM region for pid={pid} is missing its start address or size."),
            );
            continue;
        };
        let byte_stats = raw
            .get("bs")
            .and_then(JsonValue::as_object)
            .map(|bs| VmRegionByteStats {
                private_clean_resident: hex_field(bs, "pc"),
                private_dirty_resident: hex_field(bs, "pd"),
                shared_clean_resident: hex_field(bs, "sc"),
                shared_dirty_resident: hex_field(bs, "sd"),
                proportional_resident: hex_field(bs, "pss"),
                swapped: hex_field(bs, "sw"),
            })
            .unwrap_or_default();
        dump.vm_regions.push(VmRegion {
            start_address,
            size_in_bytes,
            protection_flags: raw
                .get("pf")
                .and_then(JsonValue::as_u64)
                .unwrap_or_default() as u32,
            mapped_file: raw
                .get("mf")
                .and_then(JsonValue::as_str)
                .unwrap_or_default()
                .to_owned(),
            byte_stats,
        });
    }
}

fn parse_level_of_detail(
    model: &mut Model,
    dump: &mut ProcessMemoryDump,
    dumps: &serde_json::Map<String, JsonValue>,
    pid: i64,
) {
    dump.level_of_detail = match dumps.get("level_of_detail") {
        None | Some(JsonValue::Null) => None,
        Some(JsonValue::String(level)) if level == "light" => Some(LevelOfDetail::Light),
        Some(JsonValue::String(level)) if level == "detailed" => Some(LevelOfDetail::Detailed),
        Some(other) => {
            model.import_warning(
                WarningKind::MemoryDumpParseError,
                format!("Unknown level of detail {other} in process memory dump for pid={pid}."),
            );
            None
        }
    };
}

fn parse_allocator_dumps(
    model: &mut Model,
    global_dump: &mut GlobalMemoryDump,
    dump: &mut ProcessMemoryDump,
    guid_index: &mut HashMap<String, (ContainerId, String)>,
    dumps: &serde_json::Map<String, JsonValue>,
    pid: i64,
) {
    let Some(allocators) = dumps.get("allocators").and_then(JsonValue::as_object) else {
        return;
    };
    for (full_name, raw) in allocators {
        let Some(raw) = raw.as_object() else {
            model.import_warning(
                WarningKind::MemoryDumpParseError,
                format!("Malformed allocator dump {full_name} for pid={pid}."),
            );
            continue;
        };
        let (container_id, local_name) = match full_name.strip_prefix("global/") {
            Some(stripped) => (ContainerId::Global, stripped),
            None => (ContainerId::Process(pid), full_name.as_str()),
        };
        let guid = raw.get("guid").and_then(json_id_string);
        if let Some(guid) = &guid {
            match guid_index.get(guid) {
                None => {
                    guid_index.insert(guid.clone(), (container_id, local_name.to_owned()));
                }
                Some((existing_container, existing_name)) => {
                    if *existing_container != container_id {
                        model.import_warning(
                            WarningKind::MemoryDumpParseError,
                            format!(
                                "Allocator dump {local_name} with GUID {guid} was already \
                                 registered in a different dump container."
                            ),
                        );
                        continue;
                    }
                    if existing_name != local_name {
                        model.import_warning(
                            WarningKind::MemoryDumpParseError,
                            format!(
                                "GUID {guid} maps to allocator dump {existing_name}, not \
                                 {local_name}."
                            ),
                        );
                        continue;
                    }
                }
            }
        }
        let container: &mut MemoryAllocatorDumps = match container_id {
            ContainerId::Global => &mut global_dump.allocator_dumps,
            ContainerId::Process(_) => &mut dump.allocator_dumps,
        };
        let index = container.get_or_create(local_name);
        if container.dumps[index].guid.is_none() {
            container.dumps[index].guid = guid;
        }
        let Some(attrs) = raw.get("attrs").and_then(JsonValue::as_object) else {
            continue;
        };
        for (attr_name, raw_attr) in attrs {
            if container.dumps[index].attributes.contains_key(attr_name) {
                model.import_warning(
                    WarningKind::MemoryDumpParseError,
                    format!("Duplicate attribute {attr_name} on allocator dump {full_name}."),
                );
                continue;
            }
            let attribute = AllocatorAttribute {
                attr_type: raw_attr
                    .get("type")
                    .and_then(JsonValue::as_str)
                    .map(str::to_owned),
                units: raw_attr
                    .get("units")
                    .and_then(JsonValue::as_str)
                    .map(str::to_owned),
                value: raw_attr
                    .get("value")
                    .map(arg_value_from_json)
                    .unwrap_or(ArgValue::Null),
            };
            container.dumps[index]
                .attributes
                .insert(attr_name.clone(), attribute);
        }
    }
}

fn parse_heap_dumps(
    model: &mut Model,
    dump: &mut ProcessMemoryDump,
    dumps: &serde_json::Map<String, JsonValue>,
    pid: i64,
) {
    let Some(heaps) = dumps.get("heaps").and_then(JsonValue::as_object) else {
        return;
    };
    for (allocator_name, raw_heap) in heaps {
        let Some(entries) = raw_heap.get("entries").and_then(JsonValue::as_array) else {
            model.import_warning(
                WarningKind::MemoryDumpParseError,
                format!("Heap dump for allocator {allocator_name} has no entries."),
            );
            continue;
        };
        let mut heap = HeapDump::default();
        for raw_entry in entries {
            let Some(raw) = raw_entry.as_object() else {
                continue;
            };
            let Some(size_in_bytes) = hex_field(raw, "size") else {
                model.import_warning(
                    WarningKind::MemoryDumpParseError,
                    format!("Heap entry of allocator {allocator_name} is missing its size."),
                );
                continue;
            };
            let bt = raw.get("bt").and_then(JsonValue::as_str).unwrap_or("");
            let leaf_stack_frame = format!("p{pid}:{bt}");
            if !model.stack_frames.contains(&leaf_stack_frame) {
                model.import_warning(
                    WarningKind::MemoryDumpParseError,
                    format!("Heap entry references missing stack frame {leaf_stack_frame}."),
                );
                continue;
            }
            heap.entries.push(HeapEntry {
                size_in_bytes,
                leaf_stack_frame,
            });
        }
        dump.heap_dumps.insert(allocator_name.clone(), heap);
    }
}

fn collect_edges(dumps: &serde_json::Map<String, JsonValue>, raw_edges: &mut Vec<RawEdge>) {
    let Some(graph) = dumps.get("allocators_graph").and_then(JsonValue::as_array) else {
        return;
    };
    for raw in graph {
        raw_edges.push(RawEdge {
            source: raw.get("source").and_then(json_id_string),
            target: raw.get("target").and_then(json_id_string),
            edge_type: raw
                .get("type")
                .and_then(JsonValue::as_str)
                .map(str::to_owned),
            importance: raw
                .get("importance")
                .and_then(JsonValue::as_i64)
                .unwrap_or_default(),
        });
    }
}

/// Validates the raw edge list against the GUID index. A source may own at
/// most one target; retention edges are unrestricted.
fn resolve_edges(
    model: &mut Model,
    global_dump: &mut GlobalMemoryDump,
    guid_index: &HashMap<String, (ContainerId, String)>,
    raw_edges: Vec<RawEdge>,
    id: &str,
) {
    let mut ownership_sources: HashSet<String> = HashSet::new();
    for raw in raw_edges {
        let Some(source) = raw.source else {
            model.import_warning(
                WarningKind::MemoryDumpParseError,
                format!("Memory dump edge for id={id} is missing a source GUID."),
            );
            continue;
        };
        let Some(target) = raw.target else {
            model.import_warning(
                WarningKind::MemoryDumpParseError,
                format!("Memory dump edge for id={id} is missing a target GUID."),
            );
            continue;
        };
        if !guid_index.contains_key(&source) {
            model.import_warning(
                WarningKind::MemoryDumpParseError,
                format!("Memory dump edge source GUID {source} is unknown."),
            );
            continue;
        }
        if !guid_index.contains_key(&target) {
            model.import_warning(
                WarningKind::MemoryDumpParseError,
                format!("Memory dump edge target GUID {target} is unknown."),
            );
            continue;
        }
        let edge_type = match raw.edge_type.as_deref() {
            Some("ownership") => MemoryDumpEdgeType::Ownership,
            Some("retention") => MemoryDumpEdgeType::Retention,
            other => {
                model.import_warning(
                    WarningKind::MemoryDumpParseError,
                    format!("Unknown memory dump edge type {other:?}."),
                );
                continue;
            }
        };
        if edge_type == MemoryDumpEdgeType::Ownership && !ownership_sources.insert(source.clone())
        {
            model.import_warning(
                WarningKind::MemoryDumpParseError,
                format!("Allocator dump with GUID {source} already owns a target."),
            );
            continue;
        }
        global_dump.edges.push(MemoryDumpEdge {
            source_guid: source,
            target_guid: target,
            edge_type,
            importance: raw.importance,
        });
    }
}
