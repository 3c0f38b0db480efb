use sqlx::{
    Executor, FromRow, MySql,
    mysql::{MySqlQueryResult, MySqlRow},
};
use tracing::debug;

use super::{
    Store,
    error::{StoreError, StoreResult},
    filter::{Filterable, Filters},
    value::{SqlValue, bind_values},
};

/// A rendered SQL statement plus its bind values, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

impl Statement {
    pub async fn execute<'c, E>(self, executor: E) -> StoreResult<MySqlQueryResult>
    where
        E: Executor<'c, Database = MySql>,
    {
        debug!(sql = %self.sql, values = ?self.values, "execute");
        let query = bind_values!(sqlx::query(&self.sql), self.values);
        Ok(query.execute(executor).await?)
    }

    pub async fn fetch_all<'c, T, E>(self, executor: E) -> StoreResult<Vec<T>>
    where
        T: for<'r> FromRow<'r, MySqlRow> + Send + Unpin,
        E: Executor<'c, Database = MySql>,
    {
        debug!(sql = %self.sql, values = ?self.values, "fetch_all");
        let query = bind_values!(sqlx::query_as::<_, T>(&self.sql), self.values);
        Ok(query.fetch_all(executor).await?)
    }

    pub async fn fetch_optional<'c, T, E>(self, executor: E) -> StoreResult<Option<T>>
    where
        T: for<'r> FromRow<'r, MySqlRow> + Send + Unpin,
        E: Executor<'c, Database = MySql>,
    {
        debug!(sql = %self.sql, values = ?self.values, "fetch_optional");
        let query = bind_values!(sqlx::query_as::<_, T>(&self.sql), self.values);
        Ok(query.fetch_optional(executor).await?)
    }

    pub async fn fetch_scalar<'c, T, E>(self, executor: E) -> StoreResult<T>
    where
        (T,): for<'r> FromRow<'r, MySqlRow>,
        T: Send + Unpin,
        E: Executor<'c, Database = MySql>,
    {
        debug!(sql = %self.sql, values = ?self.values, "fetch_scalar");
        let query = bind_values!(sqlx::query_scalar::<_, T>(&self.sql), self.values);
        Ok(query.fetch_one(executor).await?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    fn as_sql(self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Join {
    kind: &'static str,
    table: &'static str,
    on: &'static str,
    values: Vec<SqlValue>,
}

/// SELECT builder. Joins stand in for relational embedding of
/// foreign-key-related rows.
pub struct Select<'s> {
    store: &'s Store,
    table: &'static str,
    columns: String,
    joins: Vec<Join>,
    filters: Filters,
    order: Vec<(&'static str, Order)>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl Filterable for Select<'_> {
    fn filters_mut(&mut self) -> &mut Filters {
        &mut self.filters
    }
}

impl<'s> Select<'s> {
    pub(super) fn new(store: &'s Store, table: &'static str, columns: &str) -> Self {
        Self {
            store,
            table,
            columns: columns.trim().to_string(),
            joins: Vec::new(),
            filters: Filters::default(),
            order: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn left_join(self, table: &'static str, on: &'static str) -> Self {
        self.join_with("LEFT JOIN", table, on, Vec::new())
    }

    /// LEFT JOIN whose ON clause carries its own placeholders.
    pub fn left_join_bound(
        self,
        table: &'static str,
        on: &'static str,
        values: Vec<SqlValue>,
    ) -> Self {
        self.join_with("LEFT JOIN", table, on, values)
    }

    fn join_with(
        mut self,
        kind: &'static str,
        table: &'static str,
        on: &'static str,
        values: Vec<SqlValue>,
    ) -> Self {
        self.joins.push(Join {
            kind,
            table,
            on,
            values,
        });
        self
    }

    pub fn order(mut self, column: &'static str, order: Order) -> Self {
        self.order.push((column, order));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// `FROM ... JOIN ... WHERE ...` shared by every select form.
    fn render_source(&self, values: &mut Vec<SqlValue>) -> String {
        let mut sql = format!(" FROM {}", self.table);
        for join in &self.joins {
            sql.push_str(&format!(" {} {} ON {}", join.kind, join.table, join.on));
            values.extend(join.values.iter().cloned());
        }
        sql.push_str(&self.filters.render(values));
        sql
    }

    pub fn statement(&self) -> Statement {
        let mut values = Vec::new();
        let mut sql = format!("SELECT {}", self.columns);
        sql.push_str(&self.render_source(&mut values));

        if !self.order.is_empty() {
            let order = self
                .order
                .iter()
                .map(|(c, o)| format!("{} {}", c, o.as_sql()))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" ORDER BY {}", order));
        }

        if let Some(limit) = self.limit {
            sql.push_str(" LIMIT ?");
            values.push(SqlValue::U64(limit));
            if let Some(offset) = self.offset {
                sql.push_str(" OFFSET ?");
                values.push(SqlValue::U64(offset));
            }
        }

        Statement { sql, values }
    }

    /// Exact row count under the same joins and filters; ordering and paging ignored.
    pub fn count_statement(&self) -> Statement {
        let mut values = Vec::new();
        let sql = format!("SELECT COUNT(*){}", self.render_source(&mut values));
        Statement { sql, values }
    }

    pub fn sum_statement(&self, column: &'static str) -> Statement {
        let mut values = Vec::new();
        let sql = format!("SELECT SUM({}){}", column, self.render_source(&mut values));
        Statement { sql, values }
    }

    pub async fn fetch_all<T>(self) -> StoreResult<Vec<T>>
    where
        T: for<'r> FromRow<'r, MySqlRow> + Send + Unpin,
    {
        self.statement().fetch_all(self.store.pool()).await
    }

    /// Exactly one row; zero rows is [`StoreError::NoRows`].
    pub async fn single<T>(self) -> StoreResult<T>
    where
        T: for<'r> FromRow<'r, MySqlRow> + Send + Unpin,
    {
        self.maybe_single().await?.ok_or(StoreError::NoRows)
    }

    pub async fn maybe_single<T>(self) -> StoreResult<Option<T>>
    where
        T: for<'r> FromRow<'r, MySqlRow> + Send + Unpin,
    {
        let mut statement = self.statement();
        if self.limit.is_none() {
            statement.sql.push_str(" LIMIT 1");
        }
        statement.fetch_optional(self.store.pool()).await
    }

    pub async fn count(self) -> StoreResult<i64> {
        self.count_statement().fetch_scalar(self.store.pool()).await
    }

    pub async fn sum(self, column: &'static str) -> StoreResult<f64> {
        let total: Option<f64> = self
            .sum_statement(column)
            .fetch_scalar(self.store.pool())
            .await?;
        Ok(total.unwrap_or(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::lazy_store;

    #[actix_web::test]
    async fn select_renders_joins_filters_order_and_paging() {
        let store = lazy_store();
        let select = store
            .from("employees e")
            .select("e.id, p.first_name")
            .left_join("profiles p", "p.id = e.profile_id")
            .eq("e.status", "active")
            .order("e.created_at", Order::Desc)
            .limit(20)
            .offset(40);

        let statement = select.statement();
        assert_eq!(
            statement.sql,
            "SELECT e.id, p.first_name FROM employees e \
             LEFT JOIN profiles p ON p.id = e.profile_id \
             WHERE e.status = ? ORDER BY e.created_at DESC LIMIT ? OFFSET ?"
        );
        assert_eq!(
            statement.values,
            vec![
                SqlValue::String("active".into()),
                SqlValue::U64(20),
                SqlValue::U64(40)
            ]
        );
    }

    #[actix_web::test]
    async fn join_values_bind_before_filter_values() {
        let store = lazy_store();
        let select = store
            .from("employees e")
            .select("e.id, a.status")
            .left_join_bound(
                "attendance a",
                "a.employee_id = e.id AND a.date = ?",
                vec![SqlValue::String("2025-03-01".into())],
            )
            .eq("e.status", "active");

        let statement = select.statement();
        assert!(statement.sql.contains("ON a.employee_id = e.id AND a.date = ? WHERE"));
        assert_eq!(
            statement.values,
            vec![
                SqlValue::String("2025-03-01".into()),
                SqlValue::String("active".into())
            ]
        );
    }

    #[actix_web::test]
    async fn count_ignores_ordering_and_paging() {
        let store = lazy_store();
        let select = store
            .from("leave_requests")
            .select("*")
            .eq("status", "pending")
            .order("created_at", Order::Desc)
            .limit(10);

        let statement = select.count_statement();
        assert_eq!(
            statement.sql,
            "SELECT COUNT(*) FROM leave_requests WHERE status = ?"
        );
        assert_eq!(statement.values, vec![SqlValue::String("pending".into())]);
    }

    #[actix_web::test]
    async fn sum_wraps_column() {
        let store = lazy_store();
        let statement = store
            .from("payroll")
            .select("net_salary")
            .eq("status", "approved")
            .sum_statement("net_salary");
        assert_eq!(
            statement.sql,
            "SELECT SUM(net_salary) FROM payroll WHERE status = ?"
        );
    }

    #[actix_web::test]
    async fn offset_without_limit_is_dropped() {
        let store = lazy_store();
        let statement = store.from("departments").select("*").offset(5).statement();
        assert_eq!(statement.sql, "SELECT * FROM departments");
        assert!(statement.values.is_empty());
    }
}
