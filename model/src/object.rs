use crate::args::ArgValue;
use crate::bounds::Bounds;
use crate::color::color_id_for_general_purpose_string;
use anyhow::{Result, bail};
use std::collections::BTreeMap;

/// One tracked domain object: a live range plus its ordered snapshots.
#[derive(Debug, Clone)]
pub struct ObjectInstance {
    pub id: String,
    pub category: String,
    pub typename: String,
    pub base_typename: Option<String>,
    pub color_id: u32,
    pub creation_ts: f64,
    pub creation_was_implicit: bool,
    pub deletion_ts: Option<f64>,
    pub deletion_was_implicit: bool,
    pub has_implicit_snapshots: bool,
    /// Snapshot arena indices, in timestamp order.
    pub snapshots: Vec<usize>,
}

impl ObjectInstance {
    fn is_live_at(&self, ts: f64) -> bool {
        ts >= self.creation_ts && self.deletion_ts.is_none_or(|deleted| ts <= deleted)
    }
}

/// A dated argument bag belonging to exactly one instance.
#[derive(Debug, Clone)]
pub struct ObjectSnapshot {
    pub instance: usize,
    pub ts: f64,
    pub args: ArgValue,
}

/// Arena of instances and snapshots for one process.
///
/// Instances are keyed by (category, id); an id may be reused once its
/// previous holder has been deleted.
#[derive(Debug, Default)]
pub struct ObjectCollection {
    pub instances: Vec<ObjectInstance>,
    pub snapshots: Vec<ObjectSnapshot>,
    by_key: BTreeMap<(String, String), Vec<usize>>,
}

impl ObjectCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    fn latest_instance(&self, category: &str, id: &str) -> Option<usize> {
        self.by_key
            .get(&(category.to_owned(), id.to_owned()))
            .and_then(|indices| indices.last().copied())
    }

    fn push_instance(&mut self, instance: ObjectInstance) -> usize {
        let key = (instance.category.clone(), instance.id.clone());
        let index = self.instances.len();
        self.instances.push(instance);
        self.by_key.entry(key).or_default().push(index);
        index
    }

    /// Explicit creation. An id may not be recreated while its previous
    /// holder is still live, and never before that holder's range.
    pub fn id_was_created(
        &mut self,
        id: &str,
        category: &str,
        typename: &str,
        ts: f64,
    ) -> Result<usize> {
        if let Some(previous) = self.latest_instance(category, id) {
            let previous = &self.instances[previous];
            match previous.deletion_ts {
                None => bail!(
                    "object {id} with type {typename} was created while a previous instance was still live"
                ),
                Some(deleted) if ts < deleted => bail!(
                    "object {id} with type {typename} was created before the previous instance was deleted"
                ),
                Some(_) => {}
            }
        }
        Ok(self.push_instance(ObjectInstance {
            id: id.to_owned(),
            category: category.to_owned(),
            typename: typename.to_owned(),
            base_typename: None,
            color_id: color_id_for_general_purpose_string(typename),
            creation_ts: ts,
            creation_was_implicit: false,
            deletion_ts: None,
            deletion_was_implicit: false,
            has_implicit_snapshots: false,
            snapshots: Vec::new(),
        }))
    }

    /// Adds a snapshot to the instance live at `ts`, implicitly creating one
    /// when the id has no live holder. Returns the snapshot arena index.
    pub fn add_snapshot(
        &mut self,
        id: &str,
        category: &str,
        typename: &str,
        ts: f64,
        args: ArgValue,
        base_typename: Option<String>,
    ) -> Result<usize> {
        let instance_index = match self.latest_instance(category, id) {
            Some(index) if self.instances[index].is_live_at(ts) => {
                let instance = &self.instances[index];
                if instance.typename != typename {
                    bail!(
                        "snapshot of object {id} has type {typename} but the instance has type {}",
                        instance.typename
                    );
                }
                index
            }
            Some(index) if ts < self.instances[index].creation_ts => {
                bail!("snapshot of object {id} predates the instance's creation")
            }
            _ => self.push_instance(ObjectInstance {
                id: id.to_owned(),
                category: category.to_owned(),
                typename: typename.to_owned(),
                base_typename: base_typename.clone(),
                color_id: color_id_for_general_purpose_string(typename),
                creation_ts: ts,
                creation_was_implicit: true,
                deletion_ts: None,
                deletion_was_implicit: false,
                has_implicit_snapshots: false,
                snapshots: Vec::new(),
            }),
        };
        let snapshot_index = self.snapshots.len();
        self.snapshots.push(ObjectSnapshot {
            instance: instance_index,
            ts,
            args,
        });
        let instance = &mut self.instances[instance_index];
        instance.snapshots.push(snapshot_index);
        if let Some(base) = base_typename {
            instance.base_typename.get_or_insert(base);
        }
        Ok(snapshot_index)
    }

    /// Explicit deletion of the latest live instance for the id.
    pub fn id_was_deleted(
        &mut self,
        id: &str,
        category: &str,
        typename: &str,
        ts: f64,
    ) -> Result<usize> {
        let Some(index) = self.latest_instance(category, id) else {
            bail!("object {id} with type {typename} was deleted but never created");
        };
        let instance = &mut self.instances[index];
        if instance.deletion_ts.is_some() {
            bail!("object {id} with type {typename} was deleted twice");
        }
        if ts < instance.creation_ts {
            bail!("object {id} with type {typename} was deleted before it was created");
        }
        instance.deletion_ts = Some(ts);
        instance.deletion_was_implicit = false;
        Ok(index)
    }

    /// Stamps still-live instances as implicitly deleted at `ts`.
    pub fn cleanup_undeleted_instances(&mut self, ts: f64) {
        for instance in &mut self.instances {
            if instance.deletion_ts.is_none() {
                instance.deletion_ts = Some(ts);
                instance.deletion_was_implicit = true;
            }
        }
    }

    pub fn bounds(&self) -> Bounds {
        let mut bounds = Bounds::new();
        for instance in &self.instances {
            bounds.add_value(instance.creation_ts);
            if let Some(deleted) = instance.deletion_ts {
                bounds.add_value(deleted);
            }
        }
        for snapshot in &self.snapshots {
            bounds.add_value(snapshot.ts);
        }
        bounds
    }

    pub fn shift_timestamps_forward(&mut self, amount: f64) {
        for instance in &mut self.instances {
            instance.creation_ts += amount;
            if let Some(deleted) = instance.deletion_ts.as_mut() {
                *deleted += amount;
            }
        }
        for snapshot in &mut self.snapshots {
            snapshot.ts += amount;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_snapshot_delete_round_trip() {
        let mut objects = ObjectCollection::new();
        let instance = objects.id_was_created("0x1", "cat", "Frame", 1.0).unwrap();
        objects
            .add_snapshot("0x1", "cat", "Frame", 2.0, ArgValue::Null, None)
            .unwrap();
        objects.id_was_deleted("0x1", "cat", "Frame", 3.0).unwrap();
        let instance = &objects.instances[instance];
        assert_eq!(instance.snapshots.len(), 1);
        assert_eq!(instance.deletion_ts, Some(3.0));
        assert!(!instance.deletion_was_implicit);
    }

    #[test]
    fn snapshot_without_create_synthesizes_an_instance() {
        let mut objects = ObjectCollection::new();
        objects
            .add_snapshot("0x1", "cat", "Frame", 5.0, ArgValue::Null, None)
            .unwrap();
        assert_eq!(objects.instances.len(), 1);
        assert!(objects.instances[0].creation_was_implicit);
        assert_eq!(objects.instances[0].creation_ts, 5.0);
    }

    #[test]
    fn recreation_requires_prior_deletion() {
        let mut objects = ObjectCollection::new();
        objects.id_was_created("0x1", "cat", "Frame", 1.0).unwrap();
        assert!(objects.id_was_created("0x1", "cat", "Frame", 2.0).is_err());
        objects.id_was_deleted("0x1", "cat", "Frame", 3.0).unwrap();
        assert!(objects.id_was_created("0x1", "cat", "Frame", 2.0).is_err());
        assert!(objects.id_was_created("0x1", "cat", "Frame", 4.0).is_ok());
    }

    #[test]
    fn snapshot_type_mismatch_is_an_error() {
        let mut objects = ObjectCollection::new();
        objects.id_was_created("0x1", "cat", "Frame", 1.0).unwrap();
        assert!(
            objects
                .add_snapshot("0x1", "cat", "Layer", 2.0, ArgValue::Null, None)
                .is_err()
        );
    }

    #[test]
    fn cleanup_marks_implicit_deletions() {
        let mut objects = ObjectCollection::new();
        objects.id_was_created("0x1", "cat", "Frame", 1.0).unwrap();
        objects.cleanup_undeleted_instances(9.0);
        assert_eq!(objects.instances[0].deletion_ts, Some(9.0));
        assert!(objects.instances[0].deletion_was_implicit);
    }
}
