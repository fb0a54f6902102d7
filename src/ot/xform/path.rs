//! Rewriting paths under a structural edit
//!
//! When an operation edits a container, anything addressed below that
//! container may move (array insert/remove/move) or disappear (element
//! removed or replaced, property set or removed, whole value set).

use super::array::move_index;
use crate::ot::ops::{ArrayOperation, DiscreteOperation, ObjectOperation, OperationKind};
use crate::ot::path::{Path, PathElement};

/// Where `path` points after `ancestor` has been applied
///
/// `path` must lie strictly below `ancestor.path`. Returns `None` when the
/// addressed node no longer exists.
pub(crate) fn rewrite_descendant(ancestor: &DiscreteOperation, path: &[PathElement]) -> Option<Path> {
    let depth = ancestor.path.len();
    let step = path.get(depth)?;

    match (&ancestor.kind, step) {
        (OperationKind::Array(ArrayOperation::Set { .. }), _) | (OperationKind::Object(ObjectOperation::Set { .. }), _) => {
            None
        }
        (OperationKind::Array(op), PathElement::Index(index)) => {
            let index = *index;
            let rewritten = match op {
                ArrayOperation::Insert { index: at, .. } => {
                    if *at <= index {
                        index.saturating_add(1)
                    } else {
                        index
                    }
                }
                ArrayOperation::Remove { index: at } => {
                    if *at == index {
                        return None;
                    } else if *at < index {
                        index - 1
                    } else {
                        index
                    }
                }
                ArrayOperation::Replace { index: at, .. } => {
                    if *at == index {
                        return None;
                    }
                    index
                }
                ArrayOperation::Move { from, to } => move_index(index, *from, *to),
                ArrayOperation::Set { .. } => return None,
            };
            let mut path = path.to_vec();
            path[depth] = PathElement::Index(rewritten);
            Some(path)
        }
        (
            OperationKind::Object(ObjectOperation::SetProperty { prop, .. } | ObjectOperation::RemoveProperty { prop }),
            PathElement::Key(key),
        ) if prop == key => None,
        _ => Some(path.to_vec()),
    }
}

/// Rewrite a descendant operation, turning it into a no-op if its target is gone
pub(crate) fn transform_descendant(ancestor: &DiscreteOperation, descendant: &DiscreteOperation) -> DiscreteOperation {
    match rewrite_descendant(ancestor, &descendant.path) {
        Some(path) => descendant.with_path(path),
        None => descendant.as_no_op(),
    }
}
