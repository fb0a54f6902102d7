//! # Reference Transformation
//!
//! Keeps references (cursors, selections, highlighted properties) pointing at
//! the same content while operations shift the data underneath them.
//!
//! Only operations on the referenced node or one of its ancestors affect a
//! reference. When the referenced content is deleted outright the reference
//! is cleared (`value == None`) rather than left pointing at an invalid
//! position. The transform is total: every operation/reference pairing has a
//! defined result and nothing here can fail.

use super::array::move_index;
use super::path::rewrite_descendant;
use crate::ot::ops::{ArrayOperation, DiscreteOperation, ObjectOperation, Operation, OperationKind, StringOperation};
use crate::ot::path::{self, Path, PathRelationship};
use serde::{Deserialize, Serialize};

/// What a reference points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    /// Character or element positions
    Index,
    /// Character ranges, e.g. a text selection
    Range,
    /// Object property names
    Property,
    /// Element ids
    Element,
}

/// Current value of a reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "values", rename_all = "snake_case")]
pub enum ReferenceValue {
    Index(Vec<usize>),
    /// `(start, end)` pairs
    Range(Vec<(usize, usize)>),
    Property(Vec<String>),
    /// Element ids are stable, so operations never change them
    Element(Vec<String>),
}

impl ReferenceValue {
    pub fn reference_type(&self) -> ReferenceType {
        match self {
            ReferenceValue::Index(_) => ReferenceType::Index,
            ReferenceValue::Range(_) => ReferenceType::Range,
            ReferenceValue::Property(_) => ReferenceType::Property,
            ReferenceValue::Element(_) => ReferenceType::Element,
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            ReferenceValue::Index(values) => values.is_empty(),
            ReferenceValue::Range(values) => values.is_empty(),
            ReferenceValue::Property(values) | ReferenceValue::Element(values) => values.is_empty(),
        }
    }
}

/// A reference published by one session on one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelReferenceData {
    /// Session that owns the reference
    pub session_id: String,
    /// Element the reference is attached to; `None` for model-level references
    pub id: Option<String>,
    /// Reference name, unique per session and element
    pub key: String,
    pub reference_type: ReferenceType,
    /// Location of the referenced node
    pub path: Path,
    /// `None` once the reference has been cleared
    pub value: Option<ReferenceValue>,
}

impl ModelReferenceData {
    /// True if the reference no longer points at anything
    pub fn is_cleared(&self) -> bool {
        self.value.is_none()
    }
}

/// Transforms reference data by operations
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceTransformer;

impl ReferenceTransformer {
    pub fn new() -> Self {
        Self
    }

    /// Move `reference` past `op`
    pub fn transform(&self, op: &Operation, reference: ModelReferenceData) -> ModelReferenceData {
        op.discrete_ops()
            .fold(reference, |reference, op| self.transform_discrete(op, reference))
    }

    /// Move `reference` past a single discrete operation
    pub fn transform_discrete(&self, op: &DiscreteOperation, mut reference: ModelReferenceData) -> ModelReferenceData {
        if op.no_op || reference.is_cleared() {
            return reference;
        }

        match path::relationship(&op.path, &reference.path) {
            PathRelationship::Equal => {
                reference.value = reference
                    .value
                    .take()
                    .and_then(|value| same_node(op, value))
                    .filter(|value| !value.is_empty());
            }
            PathRelationship::Ancestor => match rewrite_descendant(op, &reference.path) {
                Some(path) => reference.path = path,
                None => reference.value = None,
            },
            PathRelationship::Descendant | PathRelationship::Unrelated => {}
        }

        reference
    }
}

fn same_node(op: &DiscreteOperation, value: ReferenceValue) -> Option<ReferenceValue> {
    match (&op.kind, value) {
        (_, value @ ReferenceValue::Element(_)) => Some(value),

        (OperationKind::String(StringOperation::Set { .. }), _) => None,
        (OperationKind::String(edit), ReferenceValue::Index(indices)) => Some(ReferenceValue::Index(
            indices.into_iter().map(|index| string_index(edit, index)).collect(),
        )),
        (OperationKind::String(edit), ReferenceValue::Range(ranges)) => Some(ReferenceValue::Range(
            ranges
                .into_iter()
                .map(|(start, end)| (string_index(edit, start), string_index(edit, end)))
                .collect(),
        )),

        (OperationKind::Array(ArrayOperation::Set { .. }), _) => None,
        (OperationKind::Array(edit), ReferenceValue::Index(indices)) => Some(ReferenceValue::Index(
            indices.into_iter().filter_map(|index| array_index(edit, index)).collect(),
        )),

        (OperationKind::Object(ObjectOperation::RemoveProperty { prop }), ReferenceValue::Property(props)) => Some(
            ReferenceValue::Property(props.into_iter().filter(|p| p != prop).collect()),
        ),
        (OperationKind::Object(ObjectOperation::Set { value }), ReferenceValue::Property(props)) => Some(
            ReferenceValue::Property(props.into_iter().filter(|p| value.contains_key(p)).collect()),
        ),

        (_, value) => Some(value),
    }
}

fn string_index(edit: &StringOperation, index: usize) -> usize {
    match edit {
        StringOperation::Insert { index: at, value } => {
            if index >= *at {
                index.saturating_add(value.chars().count())
            } else {
                index
            }
        }
        StringOperation::Remove { index: at, value } => {
            let len = value.chars().count();
            if index <= *at {
                index
            } else if index < at.saturating_add(len) {
                *at
            } else {
                index - len
            }
        }
        StringOperation::Set { .. } => index,
    }
}

fn array_index(edit: &ArrayOperation, index: usize) -> Option<usize> {
    match edit {
        ArrayOperation::Insert { index: at, .. } => Some(if index >= *at { index.saturating_add(1) } else { index }),
        ArrayOperation::Remove { index: at } => {
            if index == *at {
                None
            } else if index > *at {
                Some(index - 1)
            } else {
                Some(index)
            }
        }
        ArrayOperation::Move { from, to } => Some(move_index(index, *from, *to)),
        ArrayOperation::Replace { .. } | ArrayOperation::Set { .. } => Some(index),
    }
}
