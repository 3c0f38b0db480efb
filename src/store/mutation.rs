use super::{
    Store,
    error::{StoreError, StoreResult},
    filter::{Filterable, Filters},
    query::Statement,
    value::{Row, SqlValue},
};

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

pub struct Insert<'s> {
    store: &'s Store,
    table: &'static str,
    row: Row,
}

impl<'s> Insert<'s> {
    pub(super) fn new(store: &'s Store, table: &'static str, row: Row) -> Self {
        Self { store, table, row }
    }

    pub fn statement(&self) -> StoreResult<Statement> {
        if self.row.is_empty() {
            return Err(StoreError::EmptyRow(self.table));
        }
        let columns = self.row.columns().collect::<Vec<_>>();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            columns.join(", "),
            placeholders(columns.len())
        );
        Ok(Statement {
            sql,
            values: self.row.clone().into_values().collect(),
        })
    }

    /// Returns the generated primary key.
    pub async fn execute(self) -> StoreResult<u64> {
        let result = self.statement()?.execute(self.store.pool()).await?;
        Ok(result.last_insert_id())
    }
}

pub struct Update<'s> {
    store: &'s Store,
    table: &'static str,
    row: Row,
    filters: Filters,
}

impl Filterable for Update<'_> {
    fn filters_mut(&mut self) -> &mut Filters {
        &mut self.filters
    }
}

impl<'s> Update<'s> {
    pub(super) fn new(store: &'s Store, table: &'static str, row: Row) -> Self {
        Self {
            store,
            table,
            row,
            filters: Filters::default(),
        }
    }

    pub fn statement(&self) -> StoreResult<Statement> {
        if self.row.is_empty() {
            return Err(StoreError::EmptyRow(self.table));
        }
        if self.filters.is_empty() {
            return Err(StoreError::MissingFilter("update", self.table));
        }

        let set_clause = self
            .row
            .columns()
            .map(|c| format!("{} = ?", c))
            .collect::<Vec<_>>()
            .join(", ");

        let mut values: Vec<SqlValue> = self.row.clone().into_values().collect();
        let where_clause = self.filters.render(&mut values);

        Ok(Statement {
            sql: format!("UPDATE {} SET {}{}", self.table, set_clause, where_clause),
            values,
        })
    }

    /// Returns the number of affected rows.
    pub async fn execute(self) -> StoreResult<u64> {
        let result = self.statement()?.execute(self.store.pool()).await?;
        Ok(result.rows_affected())
    }
}

pub struct Delete<'s> {
    store: &'s Store,
    table: &'static str,
    filters: Filters,
}

impl Filterable for Delete<'_> {
    fn filters_mut(&mut self) -> &mut Filters {
        &mut self.filters
    }
}

impl<'s> Delete<'s> {
    pub(super) fn new(store: &'s Store, table: &'static str) -> Self {
        Self {
            store,
            table,
            filters: Filters::default(),
        }
    }

    pub fn statement(&self) -> StoreResult<Statement> {
        if self.filters.is_empty() {
            return Err(StoreError::MissingFilter("delete", self.table));
        }
        let mut values = Vec::new();
        let where_clause = self.filters.render(&mut values);
        Ok(Statement {
            sql: format!("DELETE FROM {}{}", self.table, where_clause),
            values,
        })
    }

    pub async fn execute(self) -> StoreResult<u64> {
        let result = self.statement()?.execute(self.store.pool()).await?;
        Ok(result.rows_affected())
    }
}

/// Insert-or-update keyed by a unique constraint. MySQL picks the conflicting
/// key itself; the declared conflict columns are the ones left untouched on update.
pub struct Upsert<'s> {
    store: &'s Store,
    table: &'static str,
    row: Row,
    conflict: Vec<&'static str>,
    guard: Option<(&'static str, SqlValue)>,
}

impl<'s> Upsert<'s> {
    pub(super) fn new(store: &'s Store, table: &'static str, row: Row) -> Self {
        Self {
            store,
            table,
            row,
            conflict: Vec::new(),
            guard: None,
        }
    }

    pub fn on_conflict(mut self, columns: &[&'static str]) -> Self {
        self.conflict = columns.to_vec();
        self
    }

    /// Only overwrite an existing row while `column` still equals `value`;
    /// otherwise the existing row is left untouched.
    pub fn only_when(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
        self.guard = Some((column, value.into()));
        self
    }

    pub fn statement(&self) -> StoreResult<Statement> {
        if self.row.is_empty() {
            return Err(StoreError::EmptyRow(self.table));
        }
        let columns = self.row.columns().collect::<Vec<_>>();

        let mut targets = columns
            .iter()
            .copied()
            .filter(|c| !self.conflict.contains(c))
            .collect::<Vec<_>>();
        let mut values: Vec<SqlValue> = self.row.clone().into_values().collect();

        let mut updates = match &self.guard {
            None => targets
                .iter()
                .map(|c| format!("{c} = VALUES({c})"))
                .collect::<Vec<_>>(),
            Some((guard, expected)) => {
                // assignments run left to right, so the guard column goes last
                targets.sort_by_key(|c| *c == *guard);
                targets
                    .iter()
                    .map(|c| {
                        values.push(expected.clone());
                        format!("{c} = IF({guard} = ?, VALUES({c}), {c})")
                    })
                    .collect::<Vec<_>>()
            }
        };
        if updates.is_empty() {
            // every column is part of the key: keep the existing row as-is
            updates.push(format!("{c} = {c}", c = columns[0]));
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) ON DUPLICATE KEY UPDATE {}",
            self.table,
            columns.join(", "),
            placeholders(columns.len()),
            updates.join(", ")
        );
        Ok(Statement { sql, values })
    }

    /// MySQL reports 1 for a fresh insert and 2 for an update of an existing row.
    pub async fn execute(self) -> StoreResult<u64> {
        let result = self.statement()?.execute(self.store.pool()).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::lazy_store;
    use chrono::NaiveDate;

    #[actix_web::test]
    async fn attendance_upsert_updates_every_non_key_column() {
        let store = lazy_store();
        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let row = Row::new()
            .set("employee_id", 7u64)
            .set("date", date)
            .set("status", "absent")
            .set("check_in_time", SqlValue::Null);

        let statement = store
            .from("attendance")
            .upsert(row)
            .on_conflict(&["employee_id", "date"])
            .statement()
            .unwrap();

        assert_eq!(
            statement.sql,
            "INSERT INTO attendance (employee_id, date, status, check_in_time) \
             VALUES (?, ?, ?, ?) ON DUPLICATE KEY UPDATE \
             status = VALUES(status), check_in_time = VALUES(check_in_time)"
        );
        assert_eq!(
            statement.values,
            vec![
                SqlValue::U64(7),
                SqlValue::Date(date),
                SqlValue::String("absent".into()),
                SqlValue::Null
            ]
        );
    }

    #[actix_web::test]
    async fn upsert_of_key_only_row_is_a_no_op_update() {
        let store = lazy_store();
        let statement = store
            .from("attendance")
            .upsert(Row::new().set("employee_id", 1u64).set("date", "2025-03-01"))
            .on_conflict(&["employee_id", "date"])
            .statement()
            .unwrap();
        assert!(
            statement
                .sql
                .ends_with("ON DUPLICATE KEY UPDATE employee_id = employee_id")
        );
    }

    #[actix_web::test]
    async fn guarded_upsert_leaves_rows_past_the_guard_untouched() {
        let store = lazy_store();
        let row = Row::new()
            .set("employee_id", 4u64)
            .set("month", 3u8)
            .set("year", 2025u16)
            .set("status", "draft")
            .set("net_salary", 1900.0);

        let statement = store
            .from("payroll")
            .upsert(row)
            .on_conflict(&["employee_id", "month", "year"])
            .only_when("status", "draft")
            .statement()
            .unwrap();

        assert_eq!(
            statement.sql,
            "INSERT INTO payroll (employee_id, month, year, status, net_salary) \
             VALUES (?, ?, ?, ?, ?) ON DUPLICATE KEY UPDATE \
             net_salary = IF(status = ?, VALUES(net_salary), net_salary), \
             status = IF(status = ?, VALUES(status), status)"
        );
        assert_eq!(statement.values.len(), 7);
        assert_eq!(
            statement.values[5..].to_vec(),
            vec![SqlValue::String("draft".into()); 2]
        );
    }

    #[actix_web::test]
    async fn update_binds_set_values_before_filters() {
        let store = lazy_store();
        let statement = store
            .from("leave_requests")
            .update(Row::new().set("status", "approved").set("reviewed_by", 3u64))
            .eq("id", 11u64)
            .eq("status", "pending")
            .statement()
            .unwrap();

        assert_eq!(
            statement.sql,
            "UPDATE leave_requests SET status = ?, reviewed_by = ? WHERE id = ? AND status = ?"
        );
        assert_eq!(
            statement.values,
            vec![
                SqlValue::String("approved".into()),
                SqlValue::U64(3),
                SqlValue::U64(11),
                SqlValue::String("pending".into())
            ]
        );
    }

    #[actix_web::test]
    async fn unfiltered_update_and_delete_are_refused() {
        let store = lazy_store();
        let update = store
            .from("payroll")
            .update(Row::new().set("status", "paid"))
            .statement();
        assert!(matches!(
            update,
            Err(StoreError::MissingFilter("update", "payroll"))
        ));

        let delete = store.from("departments").delete().statement();
        assert!(matches!(
            delete,
            Err(StoreError::MissingFilter("delete", "departments"))
        ));
    }

    #[actix_web::test]
    async fn empty_insert_is_refused() {
        let store = lazy_store();
        let insert = store.from("departments").insert(Row::new()).statement();
        assert!(matches!(insert, Err(StoreError::EmptyRow("departments"))));
    }

    #[actix_web::test]
    async fn insert_lists_columns_in_row_order() {
        let store = lazy_store();
        let statement = store
            .from("departments")
            .insert(Row::new().set("name", "Finance").set("description", None::<String>))
            .statement()
            .unwrap();
        assert_eq!(
            statement.sql,
            "INSERT INTO departments (name, description) VALUES (?, ?)"
        );
        assert_eq!(
            statement.values,
            vec![SqlValue::String("Finance".into()), SqlValue::Null]
        );
    }
}
