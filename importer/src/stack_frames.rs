use crate::event::{TraceEvent, json_id_string};
use serde_json::Value as JsonValue;
use tracemodel_model::color::color_id_for_general_purpose_string;
use tracemodel_model::import_warning::WarningKind;
use tracemodel_model::model::Model;
use tracemodel_model::stack_frame::StackFrame;

/// Imports a raw stack frame dictionary in two passes: frames first, parent
/// links second. Ids are qualified with `prefix`; with `add_root_frame` a
/// synthetic root whose id is the bare prefix is created and adopts every
/// frame without a declared parent.
pub fn import_stack_frames(
    model: &mut Model,
    raw_frames: &serde_json::Map<String, JsonValue>,
    prefix: &str,
    add_root_frame: bool,
) {
    if add_root_frame && !model.stack_frames.contains(prefix) {
        let root = StackFrame::new(
            prefix.to_owned(),
            prefix.to_owned(),
            color_id_for_general_purpose_string(prefix),
        );
        if model.stack_frames.add(root).is_err() {
            return;
        }
    }

    for (id, raw_frame) in raw_frames {
        let full_id = format!("{prefix}{id}");
        let name = raw_frame
            .get("name")
            .and_then(JsonValue::as_str)
            .unwrap_or("")
            .to_owned();
        let color_text = raw_frame
            .get("category")
            .and_then(JsonValue::as_str)
            .unwrap_or(&name);
        let color_id = color_id_for_general_purpose_string(color_text);
        let frame = StackFrame::new(full_id, name, color_id);
        if let Err(e) = model.stack_frames.add(frame) {
            model.import_warning(WarningKind::ParseError, format!("{e:#}"));
        }
    }

    for (id, raw_frame) in raw_frames {
        let full_id = format!("{prefix}{id}");
        let Some(parent_raw) = raw_frame.get("parent") else {
            if add_root_frame && full_id != prefix {
                let _ = model.stack_frames.set_parent(&full_id, prefix);
            }
            continue;
        };
        let parent_id = match json_id_string(parent_raw) {
            Some(parent) => format!("{prefix}{parent}"),
            None => continue,
        };
        if model.stack_frames.set_parent(&full_id, &parent_id).is_err() {
            model.import_warning(
                WarningKind::MetadataParseError,
                format!("Missing parent frame with ID {parent_id} for stack frame {full_id}."),
            );
            if add_root_frame {
                let _ = model.stack_frames.set_parent(&full_id, prefix);
            }
        }
    }
}

/// Resolves the frame an event points at, through either its direct frame
/// id (`sf`/`esf`, under the global scope) or its raw stack. At most one of
/// the two may be present.
pub fn resolve_event_stack_frame(
    model: &mut Model,
    event: &TraceEvent,
    look_for_end: bool,
) -> Option<String> {
    let (sf, stack) = if look_for_end {
        (event.esf.as_ref(), event.estack.as_deref())
    } else {
        (event.sf.as_ref(), event.stack.as_deref())
    };
    if sf.is_some() && stack.is_some() {
        model.import_warning(
            WarningKind::StackFrameAndStackError,
            format!(
                "Event at {:?} cannot have both a stack and a stackframe.",
                event.ts
            ),
        );
        return None;
    }
    if let Some(sf) = sf {
        let id = format!("g{}", json_id_string(sf)?);
        return model.stack_frames.contains(&id).then_some(id);
    }
    if let Some(stack) = stack {
        return resolve_stack_to_stack_frame(event.pid, stack);
    }
    None
}

/// Resolving a raw program-counter trace to a stack frame is an extension
/// point; every caller tolerates the absent frame.
pub fn resolve_stack_to_stack_frame(_pid: Option<i64>, _stack: &[JsonValue]) -> Option<String> {
    None
}
