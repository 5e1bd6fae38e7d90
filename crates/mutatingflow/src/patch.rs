//! Construction of the JSON Patch ([RFC 6902]) operations returned to the API server.
//!
//! All paths are built from tokens, so keys containing `/` or `~` (such as annotation keys) are
//! escaped correctly.
//!
//! [RFC 6902]: https://datatracker.ietf.org/doc/html/rfc6902
use std::collections::BTreeMap;

use json_patch::{AddOperation, PatchOperation, ReplaceOperation, jsonptr::PointerBuf};
use serde::Serialize;
use serde_json::{Map, Value, json};
use snafu::{ResultExt, Snafu};

use crate::constants::{STATUS_ANNOTATION_KEY, STATUS_INJECTED};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to serialize patch value for {path}"))]
    SerializeValue {
        source: serde_json::Error,
        path: String,
    },
}

/// Creates an `add` operation at `path`.
pub fn add(path: PointerBuf, value: impl Serialize) -> Result<PatchOperation> {
    let value = to_value(&path, value)?;
    Ok(PatchOperation::Add(AddOperation { path, value }))
}

/// Creates a `replace` operation at `path`. The target must exist when the patch is applied.
pub fn replace(path: PointerBuf, value: impl Serialize) -> Result<PatchOperation> {
    let value = to_value(&path, value)?;
    Ok(PatchOperation::Replace(ReplaceOperation { path, value }))
}

fn to_value(path: &PointerBuf, value: impl Serialize) -> Result<Value> {
    serde_json::to_value(value).with_context(|_| SerializeValueSnafu {
        path: path.to_string(),
    })
}

/// Appends `items` to the array at `array`.
///
/// If the array is absent (or empty, which the API server serializes as absent), a single `add`
/// creates it with all items, otherwise every item is appended via `<array>/-`. No operation is
/// produced for an empty `items` list.
pub fn append_all<T: Serialize>(
    array: PointerBuf,
    array_is_populated: bool,
    items: Vec<T>,
) -> Result<Vec<PatchOperation>> {
    if items.is_empty() {
        return Ok(Vec::new());
    }

    if !array_is_populated {
        return Ok(vec![add(array, items)?]);
    }

    let mut append_path = array;
    append_path.push_back("-");

    items
        .into_iter()
        .map(|item| add(append_path.clone(), item))
        .collect()
}

/// The location of a [`PodSpec`][1] within the mutated object.
///
/// Pods carry it at `/spec`, notebooks one level deeper in their pod template.
///
/// [1]: k8s_openapi::api::core::v1::PodSpec
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PodSpecPointer(&'static [&'static str]);

impl PodSpecPointer {
    pub const POD: Self = Self(&["spec"]);
    pub const TEMPLATE: Self = Self(&["spec", "template", "spec"]);

    /// Returns the pointer to the pod spec itself.
    pub fn root(&self) -> PointerBuf {
        PointerBuf::from_tokens(self.0.iter().copied())
    }

    /// Returns the pointer to `field` of the pod spec, e.g. `/spec/volumes`.
    pub fn field(&self, field: &str) -> PointerBuf {
        let mut pointer = self.root();
        pointer.push_back(field);
        pointer
    }

    /// Returns the pointer to the element at `index` of the array `field`, e.g.
    /// `/spec/containers/0`.
    pub fn element(&self, field: &str, index: usize) -> PointerBuf {
        let mut pointer = self.field(field);
        pointer.push_back(index.to_string());
        pointer
    }
}

/// Returns the operation which sets the status annotation to `injected`.
///
/// - No (or an empty) annotation map: `add` the whole map.
/// - Map without the status key: `add` the single key.
/// - Status key present with any value: `replace` it. A `replace` of a missing key would be
///   rejected by the API server, which is why the current state decides the operation.
pub fn patch_status_annotation(annotations: Option<&BTreeMap<String, String>>) -> PatchOperation {
    let annotations_path = PointerBuf::from_tokens(["metadata", "annotations"]);
    let mut key_path = annotations_path.clone();
    key_path.push_back(STATUS_ANNOTATION_KEY);

    match annotations {
        Some(annotations) if annotations.contains_key(STATUS_ANNOTATION_KEY) => {
            PatchOperation::Replace(ReplaceOperation {
                path: key_path,
                value: json!(STATUS_INJECTED),
            })
        }
        Some(annotations) if !annotations.is_empty() => PatchOperation::Add(AddOperation {
            path: key_path,
            value: json!(STATUS_INJECTED),
        }),
        _ => PatchOperation::Add(AddOperation {
            path: annotations_path,
            value: Value::Object(Map::from_iter([(
                STATUS_ANNOTATION_KEY.to_owned(),
                json!(STATUS_INJECTED),
            )])),
        }),
    }
}
