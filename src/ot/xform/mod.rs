//! # Operation Transformation
//!
//! Rewrites a pair of concurrent operations so each can be applied after the
//! other and both replicas converge.
//!
//! ## Roles
//!
//! Every transform has a *server* operand (already sequenced by the server)
//! and a *client* operand (not yet sequenced). Ties are broken in favour of
//! the server operand: at the same index its insert is ordered first, and on
//! conflicting sets its value wins. The server transforms incoming client
//! operations with the same roles, so every replica orders ties identically.
//!
//! ## Dispatch
//!
//! 1. If either operand is a no-op, both pass through unchanged.
//! 2. Operands on the same node are matched by value type and kind
//!    (`string`, `array`, `object`, `scalar`). Mismatched types cannot have
//!    been concurrent and are rejected.
//! 3. If one path lies under the other, the outer operation may move or
//!    remove the inner one's target (`path`).
//! 4. Otherwise the operations are independent.
//!
//! Compound operations fold: each contained operation is transformed in turn
//! against the progressively updated other side.
//!
//! ## Usage
//!
//! ```rust
//! use xfcollab::ot::{DiscreteOperation, Operation, OperationTransformer};
//! use xfcollab::path;
//!
//! let transformer = OperationTransformer::new();
//! let server: Operation = DiscreteOperation::array_remove(path![], 1).into();
//! let client: Operation = DiscreteOperation::array_insert(path![], 2, "X").into();
//!
//! let pair = transformer.transform(&server, &client).unwrap();
//! assert_eq!(pair.client_op, Operation::from(DiscreteOperation::array_insert(path![], 1, "X")));
//! ```

mod array;
mod object;
mod path;
mod reference;
mod scalar;
mod string;

pub use reference::{ModelReferenceData, ReferenceTransformer, ReferenceType, ReferenceValue};

use crate::ot::error::TransformError;
use crate::ot::ops::{CompoundOperation, DiscreteOperation, Operation, OperationKind};
use crate::ot::path::{self as op_path, PathRelationship};

/// Same-node result: `None` marks that side as a no-op
pub(crate) type Transformed<T> = (Option<T>, Option<T>);

/// The pair cannot have been generated concurrently
#[derive(Debug)]
pub(crate) struct Incompatible;

/// A transformed pair of operations
#[derive(Debug, Clone, PartialEq)]
pub struct OperationPair {
    /// Server operation, rewritten to apply after the client operation
    pub server_op: Operation,
    /// Client operation, rewritten to apply after the server operation
    pub client_op: Operation,
}

/// Stateless operation transformer
#[derive(Debug, Clone, Copy, Default)]
pub struct OperationTransformer;

impl OperationTransformer {
    pub fn new() -> Self {
        Self
    }

    /// Transform two concurrent operations against each other
    pub fn transform(&self, server: &Operation, client: &Operation) -> Result<OperationPair, TransformError> {
        let server_ops: Vec<DiscreteOperation> = server.discrete_ops().cloned().collect();
        let client_ops: Vec<DiscreteOperation> = client.discrete_ops().cloned().collect();
        let (server_ops, client_ops) = self.transform_sequences(&server_ops, &client_ops)?;

        Ok(OperationPair {
            server_op: rebuild(server, server_ops),
            client_op: rebuild(client, client_ops),
        })
    }

    /// Transform two ordered sequences of discrete operations against each other
    ///
    /// Both outputs have the same length as their inputs; nothing is dropped.
    pub fn transform_sequences(
        &self,
        server: &[DiscreteOperation],
        client: &[DiscreteOperation],
    ) -> Result<(Vec<DiscreteOperation>, Vec<DiscreteOperation>), TransformError> {
        let mut client = client.to_vec();
        let mut server_out = Vec::with_capacity(server.len());

        for op in server {
            let mut op = op.clone();
            for other in client.iter_mut() {
                let (s, c) = self.transform_discrete(&op, other)?;
                op = s;
                *other = c;
            }
            server_out.push(op);
        }

        Ok((server_out, client))
    }

    /// Transform two concurrent discrete operations
    pub fn transform_discrete(
        &self,
        server: &DiscreteOperation,
        client: &DiscreteOperation,
    ) -> Result<(DiscreteOperation, DiscreteOperation), TransformError> {
        if server.no_op || client.no_op {
            return Ok((server.clone(), client.clone()));
        }

        match op_path::relationship(&server.path, &client.path) {
            PathRelationship::Equal => same_node(server, client),
            PathRelationship::Ancestor => Ok((server.clone(), path::transform_descendant(server, client))),
            PathRelationship::Descendant => Ok((path::transform_descendant(client, server), client.clone())),
            PathRelationship::Unrelated => Ok((server.clone(), client.clone())),
        }
    }
}

fn same_node(
    server: &DiscreteOperation,
    client: &DiscreteOperation,
) -> Result<(DiscreteOperation, DiscreteOperation), TransformError> {
    let (s, c) = match (&server.kind, &client.kind) {
        (OperationKind::String(s), OperationKind::String(c)) => lift(string::transform(s, c), OperationKind::String),
        (OperationKind::Array(s), OperationKind::Array(c)) => lift(array::transform(s, c), OperationKind::Array),
        (OperationKind::Object(s), OperationKind::Object(c)) => match object::transform(s, c) {
            Ok(result) => lift(result, OperationKind::Object),
            Err(Incompatible) => return Err(incompatible(server, client)),
        },
        (OperationKind::Number(s), OperationKind::Number(c)) => lift(scalar::number(s, c), OperationKind::Number),
        (OperationKind::Boolean(s), OperationKind::Boolean(c)) => lift(scalar::boolean(s, c), OperationKind::Boolean),
        (OperationKind::Date(s), OperationKind::Date(c)) => lift(scalar::date(s, c), OperationKind::Date),
        _ => return Err(incompatible(server, client)),
    };

    Ok((finish(server, s), finish(client, c)))
}

fn lift<T>(result: Transformed<T>, wrap: fn(T) -> OperationKind) -> Transformed<OperationKind> {
    (result.0.map(wrap), result.1.map(wrap))
}

fn finish(original: &DiscreteOperation, kind: Option<OperationKind>) -> DiscreteOperation {
    match kind {
        Some(kind) => original.with_kind(kind),
        None => original.as_no_op(),
    }
}

fn incompatible(server: &DiscreteOperation, client: &DiscreteOperation) -> TransformError {
    TransformError::incompatible(server.kind.name(), client.kind.name(), op_path::display(&server.path))
}

/// Wrap transformed discrete operations in the shape of the original
fn rebuild(shape: &Operation, mut ops: Vec<DiscreteOperation>) -> Operation {
    match shape {
        Operation::Discrete(_) if ops.len() == 1 => Operation::Discrete(ops.remove(0)),
        _ => Operation::Compound(CompoundOperation::new(ops)),
    }
}
