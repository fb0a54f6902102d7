//! # Paths
//!
//! A path addresses a node in the model tree by walking object keys and array
//! indices from the root. Two concurrent operations are reconciled according
//! to how their paths relate to each other.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of a path: an object property or an array index
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathElement {
    /// Object property name
    Key(String),
    /// Array index
    Index(usize),
}

/// Ordered sequence of steps from the root
pub type Path = Vec<PathElement>;

impl From<&str> for PathElement {
    fn from(key: &str) -> Self {
        PathElement::Key(key.to_string())
    }
}

impl From<String> for PathElement {
    fn from(key: String) -> Self {
        PathElement::Key(key)
    }
}

impl From<usize> for PathElement {
    fn from(index: usize) -> Self {
        PathElement::Index(index)
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathElement::Key(key) => write!(f, "{}", key),
            PathElement::Index(index) => write!(f, "[{}]", index),
        }
    }
}

/// How the first path relates to the second
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathRelationship {
    /// Both address the same node
    Equal,
    /// The first path is a strict prefix of the second
    Ancestor,
    /// The second path is a strict prefix of the first
    Descendant,
    /// Siblings or otherwise disjoint subtrees
    Unrelated,
}

/// Classify `a` relative to `b`
pub fn relationship(a: &[PathElement], b: &[PathElement]) -> PathRelationship {
    let common = a.len().min(b.len());
    if a[..common] != b[..common] {
        return PathRelationship::Unrelated;
    }

    match a.len().cmp(&b.len()) {
        std::cmp::Ordering::Equal => PathRelationship::Equal,
        std::cmp::Ordering::Less => PathRelationship::Ancestor,
        std::cmp::Ordering::Greater => PathRelationship::Descendant,
    }
}

/// Render a path for log output, e.g. `/items/[3]/title`
pub fn display(path: &[PathElement]) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    path.iter().map(|element| format!("/{}", element)).collect()
}

/// Build a path from mixed keys and indices
///
/// ```rust
/// use xfcollab::path;
/// use xfcollab::ot::path::PathElement;
///
/// let p = path!["items", 3usize];
/// assert_eq!(p, vec![PathElement::Key("items".into()), PathElement::Index(3)]);
/// ```
#[macro_export]
macro_rules! path {
    () => {
        $crate::ot::path::Path::new()
    };
    ($($element:expr),+ $(,)?) => {
        vec![$($crate::ot::path::PathElement::from($element)),+]
    };
}
