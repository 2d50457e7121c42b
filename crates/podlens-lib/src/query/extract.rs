//! Optional-chained access into GraphQL response trees

use serde_json::Value;

/// One step of a path through a JSON tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hop {
    Key(&'static str),
    Index(usize),
}

/// `data → Get → Pod → [0] → _additional → generate → groupedResult`
pub const GROUPED_RESULT_PATH: &[Hop] = &[
    Hop::Key("data"),
    Hop::Key("Get"),
    Hop::Key("Pod"),
    Hop::Index(0),
    Hop::Key("_additional"),
    Hop::Key("generate"),
    Hop::Key("groupedResult"),
];

/// Follow `path` from `root`, stopping at the first absent or mismatched hop
pub fn descend<'a>(root: &'a Value, path: &[Hop]) -> Option<&'a Value> {
    path.iter().try_fold(root, |node, hop| match (hop, node) {
        (Hop::Key(key), Value::Object(map)) => map.get(*key),
        (Hop::Index(index), Value::Array(items)) => items.get(*index),
        _ => None,
    })
}

/// The generated answer, or `None` when the tree does not carry one
pub fn extract_grouped_result(response: &Value) -> Option<String> {
    descend(response, GROUPED_RESULT_PATH)
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Every non-null `_additional.generate.error` among the returned objects
pub fn generation_errors(response: &Value) -> Vec<String> {
    let objects = match descend(response, &GROUPED_RESULT_PATH[..3]).and_then(Value::as_array) {
        Some(objects) => objects,
        None => return Vec::new(),
    };

    objects
        .iter()
        .filter_map(|object| {
            descend(
                object,
                &[Hop::Key("_additional"), Hop::Key("generate"), Hop::Key("error")],
            )
        })
        .filter_map(Value::as_str)
        .filter(|message| !message.is_empty())
        .map(str::to_string)
        .collect()
}
