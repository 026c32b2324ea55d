// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! JSON merge-patch (RFC 7386) used to fold independently fetched fragments into one
//! document.

use serde_json::{Map, Value};

/// Applies `patch` over `target`.
///
/// Object members recurse, every other value replaces the target value, and `null`
/// removes the member. Members absent from `patch` are left untouched.
pub fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch) = patch else {
        *target = patch.clone();
        return;
    };

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    let Value::Object(target) = target else {
        return;
    };

    for (key, value) in patch {
        if value.is_null() {
            target.remove(key);
            continue;
        }
        merge_patch(target.entry(key.as_str()).or_insert(Value::Null), value);
    }
}

/// Parses `fragment` and merges it into `target`. Fragments must be JSON objects.
pub fn merge_fragment(target: &mut Value, fragment: &[u8]) -> Result<(), String> {
    let patch: Value = serde_json::from_slice(fragment).map_err(|e| e.to_string())?;
    if !patch.is_object() {
        return Err("fragment is not a JSON object".to_string());
    }
    merge_patch(target, &patch);
    Ok(())
}
