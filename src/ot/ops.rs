//! # Operations
//!
//! Immutable descriptions of edits to the model tree. A discrete operation
//! targets one node by path; a compound operation groups discrete operations
//! that must be applied atomically, in order, as one logical edit.
//!
//! Operations marked `no_op` have no effect on the document but are kept in
//! every queue and transformed like any other operation.

use crate::ot::path::{self, Path};
use crate::ot::value::{DataValue, ValueType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Edits to a string node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StringOperation {
    /// Insert `value` at character `index`
    Insert { index: usize, value: String },
    /// Remove the characters of `value` starting at character `index`
    Remove { index: usize, value: String },
    /// Replace the whole string
    Set { value: String },
}

/// Edits to an array node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ArrayOperation {
    /// Insert `value` so that it ends up at `index`
    Insert { index: usize, value: DataValue },
    /// Remove the element at `index`
    Remove { index: usize },
    /// Replace the element at `index`
    Replace { index: usize, value: DataValue },
    /// Reorder: take the element at `from` and place it at `to`
    Move { from: usize, to: usize },
    /// Replace the whole array
    Set { value: Vec<DataValue> },
}

/// Edits to an object node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ObjectOperation {
    /// Add a property that does not exist yet
    AddProperty { prop: String, value: DataValue },
    /// Overwrite an existing property
    SetProperty { prop: String, value: DataValue },
    /// Remove an existing property
    RemoveProperty { prop: String },
    /// Replace the whole object
    Set { value: BTreeMap<String, DataValue> },
}

/// Edits to a number node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum NumberOperation {
    /// Add a delta
    Add { value: f64 },
    /// Replace the number
    Set { value: f64 },
}

/// Edits to a boolean node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BooleanOperation {
    Set { value: bool },
}

/// Edits to a date node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DateOperation {
    Set { value: DateTime<Utc> },
}

/// The kind-specific part of a discrete operation, grouped by value type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "target", content = "edit", rename_all = "snake_case")]
pub enum OperationKind {
    String(StringOperation),
    Array(ArrayOperation),
    Object(ObjectOperation),
    Number(NumberOperation),
    Boolean(BooleanOperation),
    Date(DateOperation),
}

impl OperationKind {
    /// The value type this kind of operation applies to
    pub fn value_type(&self) -> ValueType {
        match self {
            OperationKind::String(_) => ValueType::String,
            OperationKind::Array(_) => ValueType::Array,
            OperationKind::Object(_) => ValueType::Object,
            OperationKind::Number(_) => ValueType::Number,
            OperationKind::Boolean(_) => ValueType::Boolean,
            OperationKind::Date(_) => ValueType::Date,
        }
    }

    /// Short name used in logs and errors, e.g. `ArrayInsert`
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::String(op) => match op {
                StringOperation::Insert { .. } => "StringInsert",
                StringOperation::Remove { .. } => "StringRemove",
                StringOperation::Set { .. } => "StringSet",
            },
            OperationKind::Array(op) => match op {
                ArrayOperation::Insert { .. } => "ArrayInsert",
                ArrayOperation::Remove { .. } => "ArrayRemove",
                ArrayOperation::Replace { .. } => "ArrayReplace",
                ArrayOperation::Move { .. } => "ArrayMove",
                ArrayOperation::Set { .. } => "ArraySet",
            },
            OperationKind::Object(op) => match op {
                ObjectOperation::AddProperty { .. } => "ObjectAddProperty",
                ObjectOperation::SetProperty { .. } => "ObjectSetProperty",
                ObjectOperation::RemoveProperty { .. } => "ObjectRemoveProperty",
                ObjectOperation::Set { .. } => "ObjectSet",
            },
            OperationKind::Number(op) => match op {
                NumberOperation::Add { .. } => "NumberAdd",
                NumberOperation::Set { .. } => "NumberSet",
            },
            OperationKind::Boolean(_) => "BooleanSet",
            OperationKind::Date(_) => "DateSet",
        }
    }
}

/// A single edit addressed by path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscreteOperation {
    /// Location of the target node
    pub path: Path,
    /// True once transformation has made this operation ineffective
    #[serde(default)]
    pub no_op: bool,
    /// What the edit does
    pub kind: OperationKind,
}

impl DiscreteOperation {
    /// Create an effective operation
    pub fn new(path: Path, kind: OperationKind) -> Self {
        Self { path, no_op: false, kind }
    }

    /// Copy of this operation with a different kind at the same path
    pub fn with_kind(&self, kind: OperationKind) -> Self {
        Self {
            path: self.path.clone(),
            no_op: self.no_op,
            kind,
        }
    }

    /// Copy of this operation at a different path
    pub fn with_path(&self, path: Path) -> Self {
        Self {
            path,
            no_op: self.no_op,
            kind: self.kind.clone(),
        }
    }

    /// Copy of this operation marked as a no-op
    pub fn as_no_op(&self) -> Self {
        Self {
            path: self.path.clone(),
            no_op: true,
            kind: self.kind.clone(),
        }
    }

    pub fn string_insert(path: Path, index: usize, value: impl Into<String>) -> Self {
        Self::new(path, OperationKind::String(StringOperation::Insert { index, value: value.into() }))
    }

    pub fn string_remove(path: Path, index: usize, value: impl Into<String>) -> Self {
        Self::new(path, OperationKind::String(StringOperation::Remove { index, value: value.into() }))
    }

    pub fn string_set(path: Path, value: impl Into<String>) -> Self {
        Self::new(path, OperationKind::String(StringOperation::Set { value: value.into() }))
    }

    pub fn array_insert(path: Path, index: usize, value: impl Into<DataValue>) -> Self {
        Self::new(path, OperationKind::Array(ArrayOperation::Insert { index, value: value.into() }))
    }

    pub fn array_remove(path: Path, index: usize) -> Self {
        Self::new(path, OperationKind::Array(ArrayOperation::Remove { index }))
    }

    pub fn array_replace(path: Path, index: usize, value: impl Into<DataValue>) -> Self {
        Self::new(path, OperationKind::Array(ArrayOperation::Replace { index, value: value.into() }))
    }

    pub fn array_move(path: Path, from: usize, to: usize) -> Self {
        Self::new(path, OperationKind::Array(ArrayOperation::Move { from, to }))
    }

    pub fn array_set(path: Path, value: Vec<DataValue>) -> Self {
        Self::new(path, OperationKind::Array(ArrayOperation::Set { value }))
    }

    pub fn object_add_property(path: Path, prop: impl Into<String>, value: impl Into<DataValue>) -> Self {
        Self::new(
            path,
            OperationKind::Object(ObjectOperation::AddProperty { prop: prop.into(), value: value.into() }),
        )
    }

    pub fn object_set_property(path: Path, prop: impl Into<String>, value: impl Into<DataValue>) -> Self {
        Self::new(
            path,
            OperationKind::Object(ObjectOperation::SetProperty { prop: prop.into(), value: value.into() }),
        )
    }

    pub fn object_remove_property(path: Path, prop: impl Into<String>) -> Self {
        Self::new(path, OperationKind::Object(ObjectOperation::RemoveProperty { prop: prop.into() }))
    }

    pub fn object_set(path: Path, value: BTreeMap<String, DataValue>) -> Self {
        Self::new(path, OperationKind::Object(ObjectOperation::Set { value }))
    }

    pub fn number_add(path: Path, value: f64) -> Self {
        Self::new(path, OperationKind::Number(NumberOperation::Add { value }))
    }

    pub fn number_set(path: Path, value: f64) -> Self {
        Self::new(path, OperationKind::Number(NumberOperation::Set { value }))
    }

    pub fn boolean_set(path: Path, value: bool) -> Self {
        Self::new(path, OperationKind::Boolean(BooleanOperation::Set { value }))
    }

    pub fn date_set(path: Path, value: DateTime<Utc>) -> Self {
        Self::new(path, OperationKind::Date(DateOperation::Set { value }))
    }
}

impl fmt::Display for DiscreteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.kind.name(), path::display(&self.path))?;
        if self.no_op {
            write!(f, " (no-op)")?;
        }
        Ok(())
    }
}

/// An ordered group of discrete operations applied as one edit
///
/// Holding `DiscreteOperation`s rather than `Operation`s keeps compounds
/// from nesting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompoundOperation {
    pub ops: Vec<DiscreteOperation>,
}

impl CompoundOperation {
    pub fn new(ops: Vec<DiscreteOperation>) -> Self {
        Self { ops }
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Any operation that can be sent, received, queued or transformed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    Discrete(DiscreteOperation),
    Compound(CompoundOperation),
}

impl Operation {
    /// True for a discrete no-op, or a compound whose every part is a no-op
    pub fn is_no_op(&self) -> bool {
        match self {
            Operation::Discrete(op) => op.no_op,
            Operation::Compound(compound) => compound.ops.iter().all(|op| op.no_op),
        }
    }

    /// Copy of this operation with every part marked as a no-op
    pub fn as_no_op(&self) -> Self {
        match self {
            Operation::Discrete(op) => Operation::Discrete(op.as_no_op()),
            Operation::Compound(compound) => Operation::Compound(CompoundOperation::new(
                compound.ops.iter().map(DiscreteOperation::as_no_op).collect(),
            )),
        }
    }

    /// Iterate the discrete operations in application order
    pub fn discrete_ops(&self) -> std::slice::Iter<'_, DiscreteOperation> {
        match self {
            Operation::Discrete(op) => std::slice::from_ref(op).iter(),
            Operation::Compound(compound) => compound.ops.iter(),
        }
    }
}

impl From<DiscreteOperation> for Operation {
    fn from(op: DiscreteOperation) -> Self {
        Operation::Discrete(op)
    }
}

impl From<CompoundOperation> for Operation {
    fn from(op: CompoundOperation) -> Self {
        Operation::Compound(op)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Discrete(op) => write!(f, "{}", op),
            Operation::Compound(compound) => {
                write!(f, "Compound[")?;
                for (i, op) in compound.ops.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", op)?;
                }
                write!(f, "]")
            }
        }
    }
}
