//! Same-node transforms for numbers, booleans and dates

use super::Transformed;
use crate::ot::ops::{BooleanOperation, DateOperation, NumberOperation};

pub(crate) fn number(server: &NumberOperation, client: &NumberOperation) -> Transformed<NumberOperation> {
    use NumberOperation::{Add, Set};

    match (server, client) {
        // additions commute
        (Add { .. }, Add { .. }) => (Some(server.clone()), Some(client.clone())),
        (Set { .. }, Add { .. }) => (Some(server.clone()), None),
        (Add { .. }, Set { .. }) => (None, Some(client.clone())),
        (Set { value: s }, Set { value: c }) => last_writer(server, s == c),
    }
}

pub(crate) fn boolean(server: &BooleanOperation, client: &BooleanOperation) -> Transformed<BooleanOperation> {
    let (BooleanOperation::Set { value: s }, BooleanOperation::Set { value: c }) = (server, client);
    last_writer(server, s == c)
}

pub(crate) fn date(server: &DateOperation, client: &DateOperation) -> Transformed<DateOperation> {
    let (DateOperation::Set { value: s }, DateOperation::Set { value: c }) = (server, client);
    last_writer(server, s == c)
}

/// Two concurrent sets: the server's is kept, identical values cancel
fn last_writer<T: Clone>(server: &T, same_value: bool) -> Transformed<T> {
    if same_value {
        (None, None)
    } else {
        (Some(server.clone()), None)
    }
}
