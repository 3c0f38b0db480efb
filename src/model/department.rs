use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Department {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "Finance")]
    pub name: String,
    #[schema(example = "Accounts and payroll")]
    pub description: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    /// Employees currently assigned.
    #[schema(example = 4)]
    pub employee_count: i64,
}
