//! Same-node transforms for object operations

use super::{Incompatible, Transformed};
use crate::ot::ops::ObjectOperation;
use ObjectOperation::{AddProperty, RemoveProperty, Set, SetProperty};

pub(crate) fn transform(
    server: &ObjectOperation,
    client: &ObjectOperation,
) -> Result<Transformed<ObjectOperation>, Incompatible> {
    let unchanged = (Some(server.clone()), Some(client.clone()));

    let result = match (server, client) {
        (Set { value: s }, Set { value: c }) => {
            if s == c {
                (None, None)
            } else {
                (Some(server.clone()), None)
            }
        }
        (Set { .. }, _) => (Some(server.clone()), None),
        (_, Set { .. }) => (None, Some(client.clone())),

        (AddProperty { prop: sp, value: sv }, AddProperty { prop: cp, value: cv }) if sp == cp => {
            if sv == cv {
                (None, None)
            } else {
                (
                    Some(SetProperty {
                        prop: sp.clone(),
                        value: sv.clone(),
                    }),
                    None,
                )
            }
        }

        // a property cannot be added while it is concurrently being set or removed
        (AddProperty { prop: sp, .. }, SetProperty { prop: cp, .. } | RemoveProperty { prop: cp })
        | (SetProperty { prop: sp, .. } | RemoveProperty { prop: sp }, AddProperty { prop: cp, .. })
            if sp == cp =>
        {
            return Err(Incompatible);
        }

        (SetProperty { prop: sp, value: sv }, SetProperty { prop: cp, value: cv }) if sp == cp => {
            if sv == cv {
                (None, None)
            } else {
                (Some(server.clone()), None)
            }
        }
        (SetProperty { prop: sp, value }, RemoveProperty { prop: cp }) if sp == cp => (
            Some(AddProperty {
                prop: sp.clone(),
                value: value.clone(),
            }),
            None,
        ),
        (RemoveProperty { prop: sp }, SetProperty { prop: cp, value }) if sp == cp => (
            None,
            Some(AddProperty {
                prop: cp.clone(),
                value: value.clone(),
            }),
        ),
        (RemoveProperty { prop: sp }, RemoveProperty { prop: cp }) if sp == cp => (None, None),

        // different properties never interfere
        _ => unchanged,
    };

    Ok(result)
}
