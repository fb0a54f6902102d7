//! Property-based tests for transform convergence
//!
//! For a server operation `s` and a client operation `c`, both valid on the
//! same document, applying `c` then `s'` must give the same document as
//! applying `s` then `c'`.

use crate::common::fixtures::apply_all;
use proptest::prelude::*;
use std::collections::BTreeMap;
use xfcollab::ot::{DataValue, DiscreteOperation, Operation, OperationTransformer};
use xfcollab::path;

#[derive(Debug, Clone)]
enum StringEdit {
    Insert(usize, String),
    Remove(usize, usize),
    Set(String),
}

#[derive(Debug, Clone)]
enum ArrayEdit {
    Insert(usize, char),
    Remove(usize),
    Replace(usize, char),
    Move(usize, usize),
    Set(String),
}

#[derive(Debug, Clone)]
enum ObjectEdit {
    /// Add if absent, otherwise set or remove
    Property { prop: usize, value: i32, remove: bool },
    Set(BTreeMap<String, i32>),
}

#[derive(Debug, Clone)]
enum NumberEdit {
    Add(i32),
    Set(i32),
}

const PROPS: [&str; 3] = ["a", "b", "c"];

fn string_edit() -> impl Strategy<Value = StringEdit> {
    prop_oneof![
        3 => (any::<usize>(), "[x-z]{1,3}").prop_map(|(i, v)| StringEdit::Insert(i, v)),
        3 => (any::<usize>(), 1usize..4).prop_map(|(i, n)| StringEdit::Remove(i, n)),
        1 => "[p-r]{0,3}".prop_map(StringEdit::Set),
    ]
}

fn array_edit() -> impl Strategy<Value = ArrayEdit> {
    prop_oneof![
        3 => (any::<usize>(), proptest::char::range('v', 'z')).prop_map(|(i, c)| ArrayEdit::Insert(i, c)),
        2 => any::<usize>().prop_map(ArrayEdit::Remove),
        2 => (any::<usize>(), proptest::char::range('v', 'z')).prop_map(|(i, c)| ArrayEdit::Replace(i, c)),
        3 => (any::<usize>(), any::<usize>()).prop_map(|(f, t)| ArrayEdit::Move(f, t)),
        1 => "[p-r]{0,3}".prop_map(ArrayEdit::Set),
    ]
}

fn object_edit() -> impl Strategy<Value = ObjectEdit> {
    prop_oneof![
        5 => (0usize..PROPS.len(), -5i32..5, any::<bool>())
            .prop_map(|(prop, value, remove)| ObjectEdit::Property { prop, value, remove }),
        1 => object_props().prop_map(ObjectEdit::Set),
    ]
}

fn object_props() -> impl Strategy<Value = BTreeMap<String, i32>> {
    proptest::collection::btree_map(proptest::sample::select(PROPS.to_vec()).prop_map(String::from), -5i32..5, 0..3)
}

fn number_edit() -> impl Strategy<Value = NumberEdit> {
    prop_oneof![
        (-100i32..100).prop_map(NumberEdit::Add),
        (-100i32..100).prop_map(NumberEdit::Set),
    ]
}

fn letters(values: &str) -> Vec<DataValue> {
    values.chars().map(|c| DataValue::from(c.to_string())).collect()
}

fn string_op(edit: &StringEdit, doc: &str) -> DiscreteOperation {
    let chars: Vec<char> = doc.chars().collect();
    let n = chars.len();
    match edit {
        StringEdit::Remove(i, len) if n > 0 => {
            let i = i % n;
            let len = (*len).min(n - i);
            DiscreteOperation::string_remove(path!["text"], i, chars[i..i + len].iter().collect::<String>())
        }
        StringEdit::Remove(_, _) => DiscreteOperation::string_insert(path!["text"], 0, "w"),
        StringEdit::Insert(i, value) => DiscreteOperation::string_insert(path!["text"], i % (n + 1), value.clone()),
        StringEdit::Set(value) => DiscreteOperation::string_set(path!["text"], value.clone()),
    }
}

fn array_op(edit: &ArrayEdit, len: usize) -> DiscreteOperation {
    let value = |c: &char| DataValue::from(c.to_string());
    match edit {
        ArrayEdit::Insert(i, c) => DiscreteOperation::array_insert(path!["items"], i % (len + 1), value(c)),
        ArrayEdit::Set(values) => DiscreteOperation::array_set(path!["items"], letters(values)),
        _ if len == 0 => DiscreteOperation::array_insert(path!["items"], 0, "w"),
        ArrayEdit::Remove(i) => DiscreteOperation::array_remove(path!["items"], i % len),
        ArrayEdit::Replace(i, c) => DiscreteOperation::array_replace(path!["items"], i % len, value(c)),
        ArrayEdit::Move(from, to) => DiscreteOperation::array_move(path!["items"], from % len, to % len),
    }
}

fn object_op(edit: &ObjectEdit, doc: &BTreeMap<String, i32>) -> DiscreteOperation {
    match edit {
        ObjectEdit::Property { prop, value, remove } => {
            let prop = PROPS[*prop];
            let value = DataValue::Number(f64::from(*value));
            match (doc.contains_key(prop), remove) {
                (false, _) => DiscreteOperation::object_add_property(path!["obj"], prop, value),
                (true, true) => DiscreteOperation::object_remove_property(path!["obj"], prop),
                (true, false) => DiscreteOperation::object_set_property(path!["obj"], prop, value),
            }
        }
        ObjectEdit::Set(values) => DiscreteOperation::object_set(path!["obj"], numbers(values)),
    }
}

fn number_op(edit: &NumberEdit) -> DiscreteOperation {
    match edit {
        NumberEdit::Add(v) => DiscreteOperation::number_add(path!["n"], f64::from(*v)),
        NumberEdit::Set(v) => DiscreteOperation::number_set(path!["n"], f64::from(*v)),
    }
}

fn numbers(values: &BTreeMap<String, i32>) -> BTreeMap<String, DataValue> {
    values
        .iter()
        .map(|(k, v)| (k.clone(), DataValue::Number(f64::from(*v))))
        .collect()
}

fn document(key: &str, value: DataValue) -> DataValue {
    DataValue::Object(BTreeMap::from([(key.to_string(), value)]))
}

/// Both application orders of a transformed pair, left then right
fn both_orders(doc: &DataValue, server: DiscreteOperation, client: DiscreteOperation) -> (DataValue, DataValue) {
    let server = Operation::from(server);
    let client = Operation::from(client);
    let pair = OperationTransformer::new()
        .transform(&server, &client)
        .expect("valid concurrent operations transform");
    (
        apply_all(doc, &[client, pair.server_op]),
        apply_all(doc, &[server, pair.client_op]),
    )
}

proptest! {
    #[test]
    fn test_string_operations_converge(doc in "[a-e]{0,8}", s in string_edit(), c in string_edit()) {
        let data = document("text", DataValue::from(doc.as_str()));
        let (left, right) = both_orders(&data, string_op(&s, &doc), string_op(&c, &doc));
        prop_assert_eq!(left, right);
    }

    #[test]
    fn test_array_operations_converge(doc in "[a-e]{0,6}", s in array_edit(), c in array_edit()) {
        let data = document("items", DataValue::Array(letters(&doc)));
        let len = doc.chars().count();
        let (left, right) = both_orders(&data, array_op(&s, len), array_op(&c, len));
        prop_assert_eq!(left, right);
    }

    #[test]
    fn test_object_operations_converge(doc in object_props(), s in object_edit(), c in object_edit()) {
        let data = document("obj", DataValue::Object(numbers(&doc)));
        let (left, right) = both_orders(&data, object_op(&s, &doc), object_op(&c, &doc));
        prop_assert_eq!(left, right);
    }

    #[test]
    fn test_number_operations_converge(start in -100i32..100, s in number_edit(), c in number_edit()) {
        let data = document("n", DataValue::Number(f64::from(start)));
        let (left, right) = both_orders(&data, number_op(&s), number_op(&c));
        prop_assert_eq!(left, right);
    }

    #[test]
    fn test_nested_edits_converge(
        doc in "[a-e]{1,5}",
        structural in array_edit(),
        element in any::<usize>(),
        edit in string_edit(),
        structural_is_server in any::<bool>(),
    ) {
        // items holds one string per letter of `doc`
        let items: Vec<DataValue> = doc.chars().map(|c| DataValue::from(c.to_string().repeat(3))).collect();
        let data = document("items", DataValue::Array(items.clone()));

        let structural = array_op(&structural, items.len());
        let index = element % items.len();
        let text = items[index].as_str().unwrap_or_default().to_string();
        let nested = string_op(&edit, &text).with_path(path!["items", index]);

        let (left, right) = if structural_is_server {
            both_orders(&data, structural, nested)
        } else {
            both_orders(&data, nested, structural)
        };
        prop_assert_eq!(left, right);
    }
}
