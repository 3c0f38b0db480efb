use derive_more::Display;
use sqlx::mysql::MySqlDatabaseError;

/// Constraint failures the API reports as client errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// Duplicate entry for a unique key (MySQL 1062).
    Duplicate,
    /// Foreign key points at a row that does not exist (MySQL 1452).
    MissingReference,
}

impl Constraint {
    pub fn from_mysql(number: u16) -> Option<Self> {
        match number {
            1062 => Some(Constraint::Duplicate),
            1452 => Some(Constraint::MissingReference),
            _ => None,
        }
    }
}

#[derive(Debug, Display)]
pub enum StoreError {
    #[display(fmt = "no rows returned")]
    NoRows,

    #[display(fmt = "refusing to {} {} without a filter", _0, _1)]
    MissingFilter(&'static str, &'static str),

    #[display(fmt = "nothing to write into {}", _0)]
    EmptyRow(&'static str),

    #[display(fmt = "{}", _1)]
    Constraint(Constraint, sqlx::Error),

    #[display(fmt = "{}", _0)]
    Database(sqlx::Error),
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Constraint(_, e) | StoreError::Database(e) => Some(e),
            _ => None,
        }
    }
}

fn mysql_error_number(e: &sqlx::Error) -> Option<u16> {
    match e {
        sqlx::Error::Database(db_err) => db_err
            .try_downcast_ref::<MySqlDatabaseError>()
            .map(MySqlDatabaseError::number),
        _ => None,
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match mysql_error_number(&e).and_then(Constraint::from_mysql) {
            Some(constraint) => StoreError::Constraint(constraint, e),
            None => StoreError::Database(e),
        }
    }
}

impl StoreError {
    pub fn constraint(&self) -> Option<Constraint> {
        match self {
            StoreError::Constraint(c, _) => Some(*c),
            _ => None,
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        self.constraint() == Some(Constraint::Duplicate)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_duplicates_and_dangling_references_are_classified() {
        assert_eq!(Constraint::from_mysql(1062), Some(Constraint::Duplicate));
        assert_eq!(Constraint::from_mysql(1452), Some(Constraint::MissingReference));
        // 1451: deleting a referenced parent row; every FK here cascades
        assert_eq!(Constraint::from_mysql(1451), None);
        assert_eq!(Constraint::from_mysql(1213), None);
    }

    #[test]
    fn errors_without_a_server_code_stay_unclassified() {
        let err = StoreError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StoreError::Database(_)));
        assert!(!err.is_unique_violation());
    }
}
