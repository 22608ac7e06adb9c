use anyhow::{Result, bail};
use std::collections::BTreeMap;

/// A stack frame, keyed model-wide by its fully-qualified id.
///
/// Ids carry a scope prefix: `g` for frames from the trace container,
/// `p<pid>:` for process-local frames.
#[derive(Debug, Clone)]
pub struct StackFrame {
    pub id: String,
    pub parent: Option<String>,
    pub title: String,
    pub color_id: u32,
    pub source_info: Option<String>,
}

impl StackFrame {
    pub fn new(id: String, title: String, color_id: u32) -> Self {
        Self {
            id,
            parent: None,
            title,
            color_id,
            source_info: None,
        }
    }
}

/// The model-wide frame table.
#[derive(Debug, Default)]
pub struct StackFrameTable {
    frames: BTreeMap<String, StackFrame>,
}

impl StackFrameTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.frames.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&StackFrame> {
        self.frames.get(id)
    }

    /// Fully-qualified ids are unique across the model.
    pub fn add(&mut self, frame: StackFrame) -> Result<()> {
        if self.frames.contains_key(&frame.id) {
            bail!("duplicate stack frame id {:?}", frame.id);
        }
        self.frames.insert(frame.id.clone(), frame);
        Ok(())
    }

    /// Sets a parent link, refusing edges that would close a cycle.
    pub fn set_parent(&mut self, id: &str, parent_id: &str) -> Result<()> {
        if !self.frames.contains_key(parent_id) {
            bail!("unknown parent stack frame {parent_id:?}");
        }
        let mut ancestor = Some(parent_id.to_owned());
        while let Some(current) = ancestor {
            if current == id {
                bail!("stack frame parent link would create a cycle at {id:?}");
            }
            ancestor = self.frames.get(&current).and_then(|f| f.parent.clone());
        }
        match self.frames.get_mut(id) {
            Some(frame) => {
                frame.parent = Some(parent_id.to_owned());
                Ok(())
            }
            None => bail!("unknown stack frame {id:?}"),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &StackFrame> {
        self.frames.values()
    }
}
