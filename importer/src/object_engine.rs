use crate::error::ImportError;
use crate::event::arg_value_from_json;
use crate::importer::QueuedEvent;
use anyhow::Result;
use tracemodel_model::args::{ArgDict, ArgValue, SnapshotRef};
use tracemodel_model::import_warning::WarningKind;
use tracemodel_model::model::Model;
use tracemodel_model::object::ObjectCollection;
use tracemodel_model::time::timestamp_from_us;

/// Materializes the explicit N/O/D object lifecycle events, sorted by
/// (timestamp, input order).
pub fn create_explicit_objects(model: &mut Model, mut queued: Vec<QueuedEvent>) {
    queued.sort_by(|a, b| {
        a.ts.partial_cmp(&b.ts)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.sequence.cmp(&b.sequence))
    });

    for entry in queued {
        let event = &entry.event;
        let pid = event.pid.unwrap_or_default();
        let ts = timestamp_from_us(entry.ts);
        let Some(id) = event.id_string() else {
            model.import_warning(
                WarningKind::ObjectParseError,
                format!("Object event at ts={} without an id.", entry.ts),
            );
            continue;
        };
        let Some(name) = event.name.clone() else {
            model.import_warning(
                WarningKind::ObjectParseError,
                format!("Object event at ts={} without a name.", entry.ts),
            );
            continue;
        };
        let category = event.category().to_owned();
        match event.phase() {
            Some('N') => {
                let result = model
                    .get_or_create_process(pid)
                    .objects
                    .id_was_created(&id, &category, &name, ts);
                if let Err(e) = result {
                    model.import_warning(
                        WarningKind::ObjectParseError,
                        format!("While processing create of {id} at ts={}: {e:#}.", entry.ts),
                    );
                }
            }
            Some('O') => {
                let Some(snapshot_raw) =
                    event.args_object().and_then(|args| args.get("snapshot"))
                else {
                    model.import_warning(
                        WarningKind::ObjectSnapshotParseError,
                        format!(
                            "While processing {id} at ts={}: snapshots must have args: {{snapshot: ...}}.",
                            entry.ts
                        ),
                    );
                    continue;
                };
                let mut snapshot_value = arg_value_from_json(snapshot_raw);
                let mut category = category;
                let mut base_typename = None;
                if let Some(dict) = snapshot_value.as_dict_mut() {
                    if let Some(ArgValue::String(cat)) = dict.remove("cat") {
                        category = cat;
                    }
                    if let Some(ArgValue::String(base)) = dict.remove("base_type") {
                        base_typename = Some(base);
                    }
                }
                let result = model.get_or_create_process(pid).objects.add_snapshot(
                    &id,
                    &category,
                    &name,
                    ts,
                    snapshot_value,
                    base_typename,
                );
                if let Err(e) = result {
                    model.import_warning(
                        WarningKind::ObjectSnapshotParseError,
                        format!("While processing snapshot of {id} at ts={}: {e:#}.", entry.ts),
                    );
                }
            }
            Some('D') => {
                let result = model
                    .get_or_create_process(pid)
                    .objects
                    .id_was_deleted(&id, &category, &name, ts);
                if let Err(e) = result {
                    model.import_warning(
                        WarningKind::ObjectParseError,
                        format!("While processing delete of {id} at ts={}: {e:#}.", entry.ts),
                    );
                }
            }
            _ => {}
        }
    }
}

/// Walks every explicit snapshot's argument tree and lifts nested values
/// carrying a `"name/id"` field into implicit snapshots of their own. The
/// lifted field is replaced by a snapshot reference.
pub fn create_implicit_objects(model: &mut Model) -> Result<()> {
    let pids: Vec<i64> = model.processes.keys().copied().collect();
    for pid in pids {
        let mut pending: Vec<(WarningKind, String)> = Vec::new();
        let Some(process) = model.processes.get_mut(&pid) else {
            continue;
        };
        // Snapshots appended by the walk are already fully processed when
        // they are created, so only the preexisting ones are visited.
        let explicit_count = process.objects.snapshots.len();
        for index in 0..explicit_count {
            let args = std::mem::replace(&mut process.objects.snapshots[index].args, ArgValue::Null);
            if args.get("id").is_some() {
                return Err(ImportError::TopLevelSnapshotId.into());
            }
            let ts = process.objects.snapshots[index].ts;
            let instance = process.objects.snapshots[index].instance;
            let category = process.objects.instances[instance].category.clone();
            let walked = walk_value(&mut process.objects, &mut pending, pid, args, ts, &category)?;
            process.objects.snapshots[index].args = walked;
        }
        for (kind, message) in pending {
            model.import_warning(kind, message);
        }
    }
    Ok(())
}

fn walk_value(
    objects: &mut ObjectCollection,
    warnings: &mut Vec<(WarningKind, String)>,
    pid: i64,
    value: ArgValue,
    containing_ts: f64,
    containing_category: &str,
) -> Result<ArgValue> {
    match value {
        ArgValue::Dict(dict) => {
            walk_dict(objects, warnings, pid, dict, containing_ts, containing_category)
        }
        ArgValue::Array(items) => {
            let mut walked = Vec::with_capacity(items.len());
            for item in items {
                walked.push(walk_value(
                    objects,
                    warnings,
                    pid,
                    item,
                    containing_ts,
                    containing_category,
                )?);
            }
            Ok(ArgValue::Array(walked))
        }
        leaf => Ok(leaf),
    }
}

fn walk_dict(
    objects: &mut ObjectCollection,
    warnings: &mut Vec<(WarningKind, String)>,
    pid: i64,
    mut dict: ArgDict,
    containing_ts: f64,
    containing_category: &str,
) -> Result<ArgValue> {
    let Some(id_value) = dict.remove("id") else {
        let mut walked = ArgDict::new();
        for (key, value) in dict {
            walked.insert(
                key,
                walk_value(objects, warnings, pid, value, containing_ts, containing_category)?,
            );
        }
        return Ok(ArgValue::Dict(walked));
    };

    let raw_id = match id_value {
        ArgValue::String(raw_id) => raw_id,
        other => {
            return Err(ImportError::ImplicitSnapshotWithoutName(format!("{other:?}")).into());
        }
    };
    let Some((name, local_id)) = split_implicit_id(&raw_id) else {
        return Err(ImportError::ImplicitSnapshotWithoutName(raw_id).into());
    };

    let category = match dict.remove("cat") {
        Some(ArgValue::String(category)) => category,
        _ => containing_category.to_owned(),
    };
    let base_typename = match dict.remove("base_type") {
        Some(ArgValue::String(base)) => Some(base),
        _ => None,
    };

    let mut residual = ArgDict::new();
    for (key, value) in dict {
        residual.insert(
            key,
            walk_value(objects, warnings, pid, value, containing_ts, &category)?,
        );
    }

    match objects.add_snapshot(
        &local_id,
        &category,
        &name,
        containing_ts,
        ArgValue::Dict(residual.clone()),
        base_typename,
    ) {
        Ok(snapshot) => {
            let instance = objects.snapshots[snapshot].instance;
            objects.instances[instance].has_implicit_snapshots = true;
            Ok(ArgValue::Snapshot(SnapshotRef { pid, snapshot }))
        }
        Err(e) => {
            warnings.push((
                WarningKind::ObjectSnapshotParseError,
                format!(
                    "While processing implicit snapshot of {raw_id} at ts={containing_ts}: {e:#}."
                ),
            ));
            Ok(ArgValue::Dict(residual))
        }
    }
}

/// The id must read `name/localId`, split at the last slash.
fn split_implicit_id(raw_id: &str) -> Option<(String, String)> {
    let (name, local_id) = raw_id.rsplit_once('/')?;
    if name.is_empty() || local_id.is_empty() {
        return None;
    }
    Some((name.to_owned(), local_id.to_owned()))
}
