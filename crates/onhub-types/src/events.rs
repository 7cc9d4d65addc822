use serde::{Deserialize, Serialize};

use crate::models::EntityKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Created,
    Updated,
    Deleted,
}

/// Published on the store's broadcast channel after every local mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: EntityKind,
    pub id: String,
    pub op: ChangeOp,
}

impl ChangeEvent {
    pub fn new(kind: EntityKind, id: impl Into<String>, op: ChangeOp) -> Self {
        ChangeEvent {
            kind,
            id: id.into(),
            op,
        }
    }

    /// True if this event concerns the given collection.
    pub fn is_for(&self, kind: EntityKind) -> bool {
        self.kind == kind
    }
}
