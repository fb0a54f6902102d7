//! Document and event fixtures

use chrono::Utc;
use std::collections::BTreeMap;
use xfcollab::model::{ModelPermissions, OpenModelResponse};
use xfcollab::ot::{DataValue, Operation};
use xfcollab::shared::UnprocessedOperationEvent;

/// `{ "title": "hello", "tags": ["a", "b", "c"], "meta": { "count": 1, "done": false } }`
pub fn sample_data() -> BTreeMap<String, DataValue> {
    BTreeMap::from([
        ("title".to_string(), DataValue::from("hello")),
        (
            "tags".to_string(),
            DataValue::Array(vec![DataValue::from("a"), DataValue::from("b"), DataValue::from("c")]),
        ),
        (
            "meta".to_string(),
            DataValue::Object(BTreeMap::from([
                ("count".to_string(), DataValue::Number(1.0)),
                ("done".to_string(), DataValue::Boolean(false)),
            ])),
        ),
    ])
}

pub fn sample_document() -> DataValue {
    DataValue::Object(sample_data())
}

/// Array of single-letter strings
pub fn letters(values: &str) -> DataValue {
    DataValue::Array(values.chars().map(|c| DataValue::from(c.to_string())).collect())
}

/// Apply operations in order to a copy of `doc`, panicking on failure
pub fn apply_all(doc: &DataValue, ops: &[Operation]) -> DataValue {
    let mut doc = doc.clone();
    for op in ops {
        if let Err(err) = doc.apply(op) {
            panic!("Failed to apply {:?} to {:?}: {}", op, doc, err);
        }
    }
    doc
}

/// A remote operation event
pub fn remote_event(
    client_id: &str,
    seq_no: u64,
    context_version: u64,
    operation: impl Into<Operation>,
) -> UnprocessedOperationEvent {
    UnprocessedOperationEvent::new(client_id, seq_no, context_version, operation.into())
}

/// Server state for an open of `model_id`
pub fn open_response(resource_id: &str, model_id: &str, version: u64) -> OpenModelResponse {
    OpenModelResponse {
        resource_id: resource_id.to_string(),
        model_id: model_id.to_string(),
        collection: "notes".to_string(),
        version,
        data: sample_data(),
        connected_clients: vec!["remote".to_string()],
        references: Vec::new(),
        permissions: ModelPermissions::all(),
        created_time: Utc::now(),
        modified_time: Utc::now(),
    }
}
