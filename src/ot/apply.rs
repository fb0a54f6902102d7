//! # Applying Operations
//!
//! Applies operations to a `DataValue` tree. The real-time model uses this
//! to keep its local copy of the data in step with local and remote edits.
//! No-op operations are skipped.

use crate::ot::error::ApplyError;
use crate::ot::ops::{
    ArrayOperation, BooleanOperation, DateOperation, DiscreteOperation, NumberOperation, ObjectOperation,
    Operation, OperationKind, StringOperation,
};
use crate::ot::path::{self, PathElement};
use crate::ot::value::{DataValue, ValueType};

impl DataValue {
    /// Apply an operation in place
    ///
    /// A compound operation is applied to a scratch copy first so a failure
    /// part-way through leaves `self` untouched.
    pub fn apply(&mut self, op: &Operation) -> Result<(), ApplyError> {
        match op {
            Operation::Discrete(op) => self.apply_discrete(op),
            Operation::Compound(compound) => {
                let mut scratch = self.clone();
                for op in &compound.ops {
                    scratch.apply_discrete(op)?;
                }
                *self = scratch;
                Ok(())
            }
        }
    }

    /// Apply a single discrete operation in place
    pub fn apply_discrete(&mut self, op: &DiscreteOperation) -> Result<(), ApplyError> {
        if op.no_op {
            return Ok(());
        }

        let target = self.node_mut(&op.path)?;
        let at = || path::display(&op.path);

        match &op.kind {
            OperationKind::String(edit) => {
                let DataValue::String(current) = target else {
                    return Err(mismatch(at(), ValueType::String, target));
                };
                apply_string(current, edit, at)
            }
            OperationKind::Array(edit) => {
                let DataValue::Array(current) = target else {
                    return Err(mismatch(at(), ValueType::Array, target));
                };
                apply_array(current, edit, at)
            }
            OperationKind::Object(edit) => {
                let DataValue::Object(current) = target else {
                    return Err(mismatch(at(), ValueType::Object, target));
                };
                match edit {
                    ObjectOperation::AddProperty { prop, value } => {
                        if current.contains_key(prop) {
                            return Err(property(at(), prop, "already exists"));
                        }
                        current.insert(prop.clone(), value.clone());
                    }
                    ObjectOperation::SetProperty { prop, value } => {
                        match current.get_mut(prop) {
                            Some(slot) => *slot = value.clone(),
                            None => return Err(property(at(), prop, "does not exist")),
                        }
                    }
                    ObjectOperation::RemoveProperty { prop } => {
                        if current.remove(prop).is_none() {
                            return Err(property(at(), prop, "does not exist"));
                        }
                    }
                    ObjectOperation::Set { value } => *current = value.clone(),
                }
                Ok(())
            }
            OperationKind::Number(edit) => {
                let DataValue::Number(current) = target else {
                    return Err(mismatch(at(), ValueType::Number, target));
                };
                match edit {
                    NumberOperation::Add { value } => *current += value,
                    NumberOperation::Set { value } => *current = *value,
                }
                Ok(())
            }
            OperationKind::Boolean(BooleanOperation::Set { value }) => {
                let DataValue::Boolean(current) = target else {
                    return Err(mismatch(at(), ValueType::Boolean, target));
                };
                *current = *value;
                Ok(())
            }
            OperationKind::Date(DateOperation::Set { value }) => {
                let DataValue::Date(current) = target else {
                    return Err(mismatch(at(), ValueType::Date, target));
                };
                *current = *value;
                Ok(())
            }
        }
    }

    /// Walk `path` from this node
    pub fn node(&self, path: &[PathElement]) -> Option<&DataValue> {
        let mut node = self;
        for element in path {
            node = match (node, element) {
                (DataValue::Object(map), PathElement::Key(key)) => map.get(key)?,
                (DataValue::Array(values), PathElement::Index(index)) => values.get(*index)?,
                _ => return None,
            };
        }
        Some(node)
    }

    fn node_mut(&mut self, path: &[PathElement]) -> Result<&mut DataValue, ApplyError> {
        let mut node = self;
        for element in path {
            node = match (node, element) {
                (DataValue::Object(map), PathElement::Key(key)) => map.get_mut(key),
                (DataValue::Array(values), PathElement::Index(index)) => values.get_mut(*index),
                _ => None,
            }
            .ok_or_else(|| ApplyError::PathNotFound {
                path: path::display(path),
            })?;
        }
        Ok(node)
    }
}

fn apply_string(current: &mut String, edit: &StringOperation, at: impl Fn() -> String) -> Result<(), ApplyError> {
    let mut chars: Vec<char> = current.chars().collect();
    match edit {
        StringOperation::Insert { index, value } => {
            if *index > chars.len() {
                return Err(out_of_bounds(at(), *index, chars.len()));
            }
            chars.splice(*index..*index, value.chars());
        }
        StringOperation::Remove { index, value } => {
            let end = match index.checked_add(value.chars().count()) {
                Some(end) if end <= chars.len() => end,
                Some(end) => return Err(out_of_bounds(at(), end, chars.len())),
                None => return Err(out_of_bounds(at(), *index, chars.len())),
            };
            chars.drain(*index..end);
        }
        StringOperation::Set { value } => {
            *current = value.clone();
            return Ok(());
        }
    }
    *current = chars.into_iter().collect();
    Ok(())
}

fn apply_array(current: &mut Vec<DataValue>, edit: &ArrayOperation, at: impl Fn() -> String) -> Result<(), ApplyError> {
    match edit {
        ArrayOperation::Insert { index, value } => {
            if *index > current.len() {
                return Err(out_of_bounds(at(), *index, current.len()));
            }
            current.insert(*index, value.clone());
        }
        ArrayOperation::Remove { index } => {
            if *index >= current.len() {
                return Err(out_of_bounds(at(), *index, current.len()));
            }
            current.remove(*index);
        }
        ArrayOperation::Replace { index, value } => match current.get_mut(*index) {
            Some(slot) => *slot = value.clone(),
            None => return Err(out_of_bounds(at(), *index, current.len())),
        },
        ArrayOperation::Move { from, to } => {
            if *from >= current.len() || *to >= current.len() {
                return Err(out_of_bounds(at(), (*from).max(*to), current.len()));
            }
            let value = current.remove(*from);
            current.insert(*to, value);
        }
        ArrayOperation::Set { value } => *current = value.clone(),
    }
    Ok(())
}

fn mismatch(path: String, expected: ValueType, found: &DataValue) -> ApplyError {
    ApplyError::TypeMismatch {
        path,
        expected,
        found: found.value_type(),
    }
}

fn out_of_bounds(path: String, index: usize, len: usize) -> ApplyError {
    ApplyError::IndexOutOfBounds { path, index, len }
}

fn property(path: String, prop: &str, problem: &'static str) -> ApplyError {
    ApplyError::Property {
        path,
        prop: prop.to_string(),
        problem,
    }
}
