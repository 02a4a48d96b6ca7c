//! Deferred merge-patches.
//!
//! Reconcilers mutate an owned copy of the object freely. `PatchHelper`
//! snapshots the object on entry and, on every exit path, computes the
//! JSON merge-patch (RFC 7386) between the snapshot and the final state.
//! The status part is sent to the status subresource, the rest to the
//! main resource.

use crate::error::ControllerError;
use serde::Serialize;
use serde_json::{Map, Value};

/// A pending change split by subresource
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergePatch {
    /// Patch for metadata/spec, without `status`
    pub body: Option<Value>,
    /// Patch for the `status` object alone
    pub status: Option<Value>,
}

impl MergePatch {
    pub fn is_empty(&self) -> bool {
        self.body.is_none() && self.status.is_none()
    }
}

/// Snapshot of an object taken before reconciliation
#[derive(Debug, Clone)]
pub struct PatchHelper {
    before: Value,
}

impl PatchHelper {
    pub fn new<K: Serialize>(obj: &K) -> Result<Self, ControllerError> {
        Ok(Self {
            before: serde_json::to_value(obj)?,
        })
    }

    /// Merge-patch turning the snapshot into `obj`, `None` when nothing changed
    pub fn diff<K: Serialize>(&self, obj: &K) -> Result<Option<MergePatch>, ControllerError> {
        let after = serde_json::to_value(obj)?;
        let Some(Value::Object(mut changes)) = merge_diff(&self.before, &after) else {
            return Ok(None);
        };

        let status = changes.remove("status");
        let patch = MergePatch {
            body: (!changes.is_empty()).then_some(Value::Object(changes)),
            status,
        };
        Ok((!patch.is_empty()).then_some(patch))
    }
}

/// RFC 7386 diff: changed keys are carried, removed keys become `null` and
/// non-object values (arrays included) are replaced whole.
pub fn merge_diff(before: &Value, after: &Value) -> Option<Value> {
    if before == after {
        return None;
    }

    match (before, after) {
        (Value::Object(old), Value::Object(new)) => {
            let mut out = Map::new();
            for (key, value) in new {
                match old.get(key) {
                    Some(previous) => {
                        if let Some(change) = merge_diff(previous, value) {
                            out.insert(key.clone(), change);
                        }
                    }
                    None => {
                        out.insert(key.clone(), value.clone());
                    }
                }
            }
            for key in old.keys().filter(|k| !new.contains_key(*k)) {
                out.insert(key.clone(), Value::Null);
            }
            Some(Value::Object(out))
        }
        _ => Some(after.clone()),
    }
}

/// Apply an RFC 7386 merge-patch in place
pub fn apply_merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(changes) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(fields) = target {
        for (key, value) in changes {
            if value.is_null() {
                fields.remove(key);
            } else {
                apply_merge_patch(fields.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

/// Combine the reconcile outcome with the outcome of flushing its patch
pub fn combine<T>(
    resource: &str,
    result: Result<T, ControllerError>,
    flushed: Result<(), ControllerError>,
) -> Result<T, ControllerError> {
    match (result, flushed) {
        (result, Ok(())) => result,
        (Ok(_), Err(e)) => Err(ControllerError::Patch {
            resource: resource.to_string(),
            source: Box::new(e),
            prior: None,
        }),
        (Err(prior), Err(e)) => Err(ControllerError::Patch {
            resource: resource.to_string(),
            source: Box::new(e),
            prior: Some(Box::new(prior)),
        }),
    }
}
