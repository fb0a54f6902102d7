//! Same-node transforms for string operations
//!
//! Indices count characters, not bytes.

use super::Transformed;
use crate::ot::ops::StringOperation;
use StringOperation::{Insert, Remove, Set};

pub(crate) fn transform(server: &StringOperation, client: &StringOperation) -> Transformed<StringOperation> {
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

        (Insert { index: si, value: sv }, Insert { index: ci, value: cv }) => {
            if si <= ci {
                (Some(server.clone()), Some(insert(ci.saturating_add(len(sv)), cv)))
            } else {
                (Some(insert(si.saturating_add(len(cv)), sv)), Some(client.clone()))
            }
        }

        (Insert { index: ii, value: iv }, Remove { index: ri, value: rv }) => insert_remove(*ii, iv, *ri, rv),
        (Remove { index: ri, value: rv }, Insert { index: ii, value: iv }) => {
            let (inserted, removed) = insert_remove(*ii, iv, *ri, rv);
            (removed, inserted)
        }

        (Remove { index: si, value: sv }, Remove { index: ci, value: cv }) => {
            let s_end = si.saturating_add(len(sv));
            let c_end = ci.saturating_add(len(cv));
            if s_end <= *ci {
                (Some(server.clone()), Some(remove(ci - len(sv), cv.clone())))
            } else if c_end <= *si {
                (Some(remove(si - len(cv), sv.clone())), Some(client.clone()))
            } else {
                let start = (*si).min(*ci);
                (
                    surviving(*si, sv, *ci, c_end).map(|rest| remove(start, rest)),
                    surviving(*ci, cv, *si, s_end).map(|rest| remove(start, rest)),
                )
            }
        }
    }
}

/// An insert concurrent with a remove; returns `(insert', remove')`
///
/// An insert strictly inside the removed range is swallowed by the remove.
fn insert_remove(ii: usize, iv: &str, ri: usize, rv: &str) -> Transformed<StringOperation> {
    let removed = len(rv);
    if ii <= ri {
        (Some(insert(ii, iv)), Some(remove(ri.saturating_add(len(iv)), rv.to_string())))
    } else if ii >= ri.saturating_add(removed) {
        (Some(insert(ii - removed, iv)), Some(remove(ri, rv.to_string())))
    } else {
        let split = ii - ri;
        let mut widened: String = rv.chars().take(split).collect();
        widened.push_str(iv);
        widened.extend(rv.chars().skip(split));
        (None, Some(remove(ri, widened)))
    }
}

/// Characters of `value` (starting at `index`) outside `[other_start, other_end)`
fn surviving(index: usize, value: &str, other_start: usize, other_end: usize) -> Option<String> {
    let rest: String = value
        .chars()
        .enumerate()
        .filter(|(offset, _)| {
            let position = index.saturating_add(*offset);
            position < other_start || position >= other_end
        })
        .map(|(_, ch)| ch)
        .collect();
    (!rest.is_empty()).then_some(rest)
}

fn insert(index: usize, value: &str) -> StringOperation {
    Insert {
        index,
        value: value.to_string(),
    }
}

fn remove(index: usize, value: String) -> StringOperation {
    Remove { index, value }
}

fn len(value: &str) -> usize {
    value.chars().count()
}
