use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value;

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Timestamp(DateTime<Utc>),
    Null,
}

impl SqlValue {
    /// Converts a JSON scalar the way request bodies arrive.
    /// Strings that look like dates or date-times bind as such.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => {
                if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                    Some(SqlValue::Date(d))
                } else if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
                    Some(SqlValue::DateTime(dt))
                } else {
                    Some(SqlValue::String(s.clone()))
                }
            }
            Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    Some(SqlValue::U64(u))
                } else if let Some(i) = n.as_i64() {
                    Some(SqlValue::I64(i))
                } else {
                    n.as_f64().map(SqlValue::F64)
                }
            }
            Value::Bool(b) => Some(SqlValue::Bool(*b)),
            Value::Null => Some(SqlValue::Null),
            _ => None,
        }
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::String(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::String(v)
    }
}

impl From<&String> for SqlValue {
    fn from(v: &String) -> Self {
        SqlValue::String(v.clone())
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::I64(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::I64(v as i64)
    }
}

impl From<u64> for SqlValue {
    fn from(v: u64) -> Self {
        SqlValue::U64(v)
    }
}

impl From<u32> for SqlValue {
    fn from(v: u32) -> Self {
        SqlValue::U64(v as u64)
    }
}

impl From<u16> for SqlValue {
    fn from(v: u16) -> Self {
        SqlValue::U64(v as u64)
    }
}

impl From<u8> for SqlValue {
    fn from(v: u8) -> Self {
        SqlValue::U64(v as u64)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::F64(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl From<NaiveTime> for SqlValue {
    fn from(v: NaiveTime) -> Self {
        SqlValue::Time(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::DateTime(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => SqlValue::Null,
        }
    }
}

/// Ordered column/value pairs for insert, update and upsert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(&'static str, SqlValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
        self.push(column, value);
        self
    }

    pub fn push(&mut self, column: &'static str, value: impl Into<SqlValue>) {
        let value = value.into();
        match self.columns.iter_mut().find(|(c, _)| *c == column) {
            Some(slot) => slot.1 = value,
            None => self.columns.push((column, value)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|(c, _)| *c)
    }

    pub fn into_values(self) -> impl Iterator<Item = SqlValue> {
        self.columns.into_iter().map(|(_, v)| v)
    }
}

/// Binds a sequence of [`SqlValue`]s onto any sqlx query type.
macro_rules! bind_values {
    ($query:expr, $values:expr) => {{
        let mut query = $query;
        for value in $values {
            query = match value {
                $crate::store::SqlValue::String(v) => query.bind(v),
                $crate::store::SqlValue::I64(v) => query.bind(v),
                $crate::store::SqlValue::U64(v) => query.bind(v),
                $crate::store::SqlValue::F64(v) => query.bind(v),
                $crate::store::SqlValue::Bool(v) => query.bind(v),
                $crate::store::SqlValue::Date(v) => query.bind(v),
                $crate::store::SqlValue::Time(v) => query.bind(v),
                $crate::store::SqlValue::DateTime(v) => query.bind(v),
                $crate::store::SqlValue::Timestamp(v) => query.bind(v),
                $crate::store::SqlValue::Null => query.bind(None::<String>),
            };
        }
        query
    }};
}

pub(crate) use bind_values;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_strings_that_look_like_dates_bind_as_dates() {
        let v = SqlValue::from_json(&json!("2025-03-01"));
        assert_eq!(
            v,
            Some(SqlValue::Date(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()))
        );
        assert_eq!(
            SqlValue::from_json(&json!("Engineer")),
            Some(SqlValue::String("Engineer".into()))
        );
    }

    #[test]
    fn json_objects_are_not_bindable() {
        assert_eq!(SqlValue::from_json(&json!({"a": 1})), None);
        assert_eq!(SqlValue::from_json(&json!([1, 2])), None);
    }

    #[test]
    fn row_set_replaces_existing_column() {
        let row = Row::new().set("status", "present").set("status", "absent");
        assert_eq!(row.len(), 1);
        assert_eq!(
            row.into_values().collect::<Vec<_>>(),
            vec![SqlValue::String("absent".into())]
        );
    }
}
