use serde_json::Value;

use crate::error::{ApiError, ApiResult};
use crate::store::{Row, SqlValue};

/// ===============================
/// Build a partial-update row from a JSON patch
/// ===============================
///
/// Only columns listed in `allowed` are accepted; anything else is a 400 so a
/// client cannot write columns like `id` or `created_at`.
pub fn patch_row(payload: &Value, allowed: &[&'static str]) -> ApiResult<Row> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ApiError::bad_request("Payload must be a JSON object"))?;

    if obj.is_empty() {
        return Err(ApiError::bad_request("No fields provided for update"));
    }

    let mut row = Row::new();
    for (key, value) in obj {
        let column = allowed
            .iter()
            .copied()
            .find(|c| *c == key.as_str())
            .ok_or_else(|| ApiError::bad_request(format!("Field '{}' cannot be updated", key)))?;

        let value = SqlValue::from_json(value)
            .ok_or_else(|| ApiError::bad_request("Unsupported JSON value type"))?;

        row.push(column, value);
    }

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ALLOWED: [&str; 2] = ["designation", "base_salary"];

    #[test]
    fn allowed_fields_become_row_columns() {
        let row = patch_row(&json!({"designation": "Lead", "base_salary": 5200.5}), &ALLOWED)
            .unwrap();
        let mut columns = row.columns().collect::<Vec<_>>();
        columns.sort();
        assert_eq!(columns, vec!["base_salary", "designation"]);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = patch_row(&json!({"id": 9}), &ALLOWED).unwrap_err();
        assert_eq!(err.to_string(), "Field 'id' cannot be updated");
    }

    #[test]
    fn empty_and_non_object_payloads_are_rejected() {
        assert!(patch_row(&json!({}), &ALLOWED).is_err());
        assert!(patch_row(&json!([1, 2]), &ALLOWED).is_err());
    }

    #[test]
    fn nested_values_are_rejected() {
        assert!(patch_row(&json!({"designation": {"x": 1}}), &ALLOWED).is_err());
    }
}
