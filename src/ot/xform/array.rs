//! Same-node transforms for array operations
//!
//! A move that touches a different element than the other operation is
//! handled as the `Remove(from)`, `Insert(to)` pair it is equivalent to, and
//! recombined afterwards. Moves of the same element resolve to the server's
//! target.

use super::Transformed;
use crate::ot::ops::ArrayOperation;
use crate::ot::value::DataValue;
use ArrayOperation::{Insert, Move, Remove, Replace, Set};

/// Where the element at `index` ends up after moving `from` to `to`
pub(crate) fn move_index(index: usize, from: usize, to: usize) -> usize {
    if index == from {
        to
    } else if from < to && from < index && index <= to {
        index - 1
    } else if to < from && to <= index && index < from {
        index + 1
    } else {
        index
    }
}

pub(crate) fn transform(server: &ArrayOperation, client: &ArrayOperation) -> Transformed<ArrayOperation> {
    match (server, client) {
        (Set { value: s }, Set { value: c }) => {
            if s == c {
                (None, None)
            } else {
                (Some(server.clone()), None)
            }
        }
        (Set { .. }, _) => (Some(server.clone()), None),
        (_, Set { .. }) => (None, Some(client.clone())),

        // same element moved or removed on both sides
        (Move { from: sf, to: st }, Move { from: cf, to: ct }) if sf == cf => {
            (Some(Move { from: *ct, to: *st }), None)
        }
        (Remove { index }, Move { from, to }) if index == from => (Some(Remove { index: *to }), None),
        (Move { from, to }, Remove { index }) if index == from => (None, Some(Remove { index: *to })),

        (Replace { index, value }, Move { from, to }) => (
            Some(Replace {
                index: move_index(*index, *from, *to),
                value: value.clone(),
            }),
            Some(client.clone()),
        ),
        (Move { from, to }, Replace { index, value }) => (
            Some(server.clone()),
            Some(Replace {
                index: move_index(*index, *from, *to),
                value: value.clone(),
            }),
        ),

        (Move { .. }, _) | (_, Move { .. }) => transform_decomposed(server, client),

        (Insert { index: si, value }, Insert { index: ci, value: cv }) => {
            if si <= ci {
                (Some(server.clone()), Some(insert(ci.saturating_add(1), cv)))
            } else {
                (Some(insert(si.saturating_add(1), value)), Some(client.clone()))
            }
        }
        (Insert { index: si, value }, Remove { index: ci }) => {
            if si <= ci {
                (Some(server.clone()), Some(Remove { index: ci.saturating_add(1) }))
            } else {
                (Some(insert(si - 1, value)), Some(client.clone()))
            }
        }
        (Remove { index: si }, Insert { index: ci, value }) => {
            if ci <= si {
                (Some(Remove { index: si.saturating_add(1) }), Some(client.clone()))
            } else {
                (Some(server.clone()), Some(insert(ci - 1, value)))
            }
        }
        (Insert { index: si, .. }, Replace { index: ci, value }) => {
            if si <= ci {
                (Some(server.clone()), Some(replace(ci.saturating_add(1), value)))
            } else {
                (Some(server.clone()), Some(client.clone()))
            }
        }
        (Replace { index: si, value }, Insert { index: ci, .. }) => {
            if ci <= si {
                (Some(replace(si.saturating_add(1), value)), Some(client.clone()))
            } else {
                (Some(server.clone()), Some(client.clone()))
            }
        }

        (Remove { index: si }, Remove { index: ci }) => {
            if si == ci {
                (None, None)
            } else if si < ci {
                (Some(server.clone()), Some(Remove { index: ci - 1 }))
            } else {
                (Some(Remove { index: si - 1 }), Some(client.clone()))
            }
        }
        (Remove { index: si }, Replace { index: ci, value }) => {
            if si == ci {
                (Some(server.clone()), None)
            } else if si < ci {
                (Some(server.clone()), Some(replace(ci - 1, value)))
            } else {
                (Some(server.clone()), Some(client.clone()))
            }
        }
        (Replace { index: si, value }, Remove { index: ci }) => {
            if si == ci {
                (None, Some(client.clone()))
            } else if ci < si {
                (Some(replace(si - 1, value)), Some(client.clone()))
            } else {
                (Some(server.clone()), Some(client.clone()))
            }
        }

        (Replace { index: si, value: sv }, Replace { index: ci, value: cv }) => {
            if si != ci {
                (Some(server.clone()), Some(client.clone()))
            } else if sv == cv {
                (None, None)
            } else {
                (Some(server.clone()), None)
            }
        }
    }
}

/// Transform with any move expanded into its remove/insert pair
fn transform_decomposed(server: &ArrayOperation, client: &ArrayOperation) -> Transformed<ArrayOperation> {
    let mut server_parts: Vec<Option<ArrayOperation>> = decompose(server).into_iter().map(Some).collect();
    let mut client_parts: Vec<Option<ArrayOperation>> = decompose(client).into_iter().map(Some).collect();

    for s in server_parts.iter_mut() {
        for c in client_parts.iter_mut() {
            if let (Some(s_op), Some(c_op)) = (s.as_ref(), c.as_ref()) {
                let (s_next, c_next) = transform(s_op, c_op);
                *s = s_next;
                *c = c_next;
            }
        }
    }

    (recompose(server, server_parts), recompose(client, client_parts))
}

fn decompose(op: &ArrayOperation) -> Vec<ArrayOperation> {
    match op {
        Move { from, to } => vec![
            Remove { index: *from },
            Insert {
                index: *to,
                value: DataValue::Null,
            },
        ],
        other => vec![other.clone()],
    }
}

fn recompose(original: &ArrayOperation, parts: Vec<Option<ArrayOperation>>) -> Option<ArrayOperation> {
    match (original, parts.as_slice()) {
        (Move { .. }, [Some(Remove { index: from }), Some(Insert { index: to, .. })]) => Some(Move {
            from: *from,
            to: *to,
        }),
        (Move { .. }, _) => None,
        (_, [single]) => single.clone(),
        _ => None,
    }
}

fn insert(index: usize, value: &DataValue) -> ArrayOperation {
    Insert {
        index,
        value: value.clone(),
    }
}

fn replace(index: usize, value: &DataValue) -> ArrayOperation {
    Replace {
        index,
        value: value.clone(),
    }
}
