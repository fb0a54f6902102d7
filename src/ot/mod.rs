//! Operational Transformation
//!
//! The operation model, the transformers that reconcile concurrent edits,
//! and the per-document client concurrency control.
//!
//! # Module Structure
//!
//! - **`path`** / **`value`** - addressing and payloads
//! - **`ops`** - discrete and compound operations
//! - **`apply`** - applying operations to a `DataValue`
//! - **`xform`** - operation and reference transformers
//! - **`concurrency`** - sequencing local and remote operations
//! - **`error`** - error types

pub mod apply;
pub mod concurrency;
pub mod error;
pub mod ops;
pub mod path;
pub mod value;
pub mod xform;

pub use concurrency::{ClientConcurrencyControl, InflightOperation};
pub use error::{ApplyError, ConcurrencyError, TransformError};
pub use ops::{
    ArrayOperation, BooleanOperation, CompoundOperation, DateOperation, DiscreteOperation, NumberOperation,
    ObjectOperation, Operation, OperationKind, StringOperation,
};
pub use path::{Path, PathElement, PathRelationship};
pub use value::{DataValue, ValueType};
pub use xform::{
    ModelReferenceData, OperationPair, OperationTransformer, ReferenceTransformer, ReferenceType, ReferenceValue,
};
