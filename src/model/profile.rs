use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Profile {
    #[schema(example = 12)]
    pub id: u64,
    #[schema(example = "Jane")]
    pub first_name: String,
    #[schema(example = "Doe")]
    pub last_name: String,
    #[schema(example = "jane@company.com")]
    pub email: String,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    #[schema(example = "employee")]
    pub role: String,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}
