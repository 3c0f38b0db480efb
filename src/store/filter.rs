use super::value::SqlValue;

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(&'static str, SqlValue),
    Gte(&'static str, SqlValue),
    Lte(&'static str, SqlValue),
    IsNull(&'static str),
    NotNull(&'static str),
    /// Case-insensitive substring match against any of the columns.
    ILikeAny(Vec<&'static str>, String),
}

/// A conjunction of filters rendered into a WHERE clause.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    items: Vec<Filter>,
}

impl Filters {
    pub fn push(&mut self, filter: Filter) {
        self.items.push(filter);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Renders ` WHERE ...` (with leading space) and appends bind values in order.
    pub fn render(&self, values: &mut Vec<SqlValue>) -> String {
        let mut conditions = Vec::with_capacity(self.items.len());

        for filter in &self.items {
            match filter {
                Filter::Eq(col, v) => {
                    conditions.push(format!("{} = ?", col));
                    values.push(v.clone());
                }
                Filter::Gte(col, v) => {
                    conditions.push(format!("{} >= ?", col));
                    values.push(v.clone());
                }
                Filter::Lte(col, v) => {
                    conditions.push(format!("{} <= ?", col));
                    values.push(v.clone());
                }
                Filter::IsNull(col) => conditions.push(format!("{} IS NULL", col)),
                Filter::NotNull(col) => conditions.push(format!("{} IS NOT NULL", col)),
                Filter::ILikeAny(cols, term) => {
                    if cols.is_empty() {
                        continue;
                    }
                    let pattern = format!("%{}%", escape_like(&term.to_lowercase()));
                    let any = cols
                        .iter()
                        .map(|c| format!("LOWER({}) LIKE ?", c))
                        .collect::<Vec<_>>()
                        .join(" OR ");
                    conditions.push(format!("({})", any));
                    for _ in cols {
                        values.push(SqlValue::String(pattern.clone()));
                    }
                }
            }
        }

        if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        }
    }
}

/// Escapes LIKE wildcards so user input matches literally.
pub fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Chainable filter methods shared by select, update and delete builders.
pub trait Filterable: Sized {
    fn filters_mut(&mut self) -> &mut Filters;

    fn eq(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
        self.filters_mut().push(Filter::Eq(column, value.into()));
        self
    }

    fn gte(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
        self.filters_mut().push(Filter::Gte(column, value.into()));
        self
    }

    fn lte(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
        self.filters_mut().push(Filter::Lte(column, value.into()));
        self
    }

    fn is_null(mut self, column: &'static str) -> Self {
        self.filters_mut().push(Filter::IsNull(column));
        self
    }

    fn not_null(mut self, column: &'static str) -> Self {
        self.filters_mut().push(Filter::NotNull(column));
        self
    }

    fn ilike_any(mut self, columns: &[&'static str], term: &str) -> Self {
        self.filters_mut()
            .push(Filter::ILikeAny(columns.to_vec(), term.to_string()));
        self
    }

    /// Applies `eq` only when a value is present.
    fn eq_opt<V: Into<SqlValue>>(self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.eq(column, v),
            None => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filters_render_nothing() {
        let mut values = Vec::new();
        assert_eq!(Filters::default().render(&mut values), "");
        assert!(values.is_empty());
    }

    #[test]
    fn filters_join_with_and_in_order() {
        let mut filters = Filters::default();
        filters.push(Filter::Eq("date", SqlValue::String("2025-03-01".into())));
        filters.push(Filter::Eq("status", SqlValue::String("present".into())));
        filters.push(Filter::IsNull("check_out_time"));

        let mut values = Vec::new();
        let sql = filters.render(&mut values);

        assert_eq!(
            sql,
            " WHERE date = ? AND status = ? AND check_out_time IS NULL"
        );
        assert_eq!(
            values,
            vec![
                SqlValue::String("2025-03-01".into()),
                SqlValue::String("present".into())
            ]
        );
    }

    #[test]
    fn ilike_any_lowercases_and_wraps_term() {
        let mut filters = Filters::default();
        filters.push(Filter::ILikeAny(
            vec!["p.first_name", "p.email"],
            "JoHn".into(),
        ));

        let mut values = Vec::new();
        let sql = filters.render(&mut values);

        assert_eq!(
            sql,
            " WHERE (LOWER(p.first_name) LIKE ? OR LOWER(p.email) LIKE ?)"
        );
        assert_eq!(values, vec![SqlValue::String("%john%".into()); 2]);
    }

    #[test]
    fn like_wildcards_in_search_terms_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
