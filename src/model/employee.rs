use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, AsRefStr, Display, EnumString, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EmployeeStatus {
    Active,
    Inactive,
    Terminated,
}

/// Employee row with its profile and department embedded.
pub const EMPLOYEE_COLUMNS: &str = "e.id, e.profile_id, e.employee_code, e.designation, e.hire_date, \
     e.base_salary, e.status, e.department_id, e.created_at, \
     p.first_name, p.last_name, p.email, p.phone, d.name AS department_name";

/// Columns the roster search matches against, case-insensitively.
pub const EMPLOYEE_SEARCH_COLUMNS: [&str; 4] =
    ["p.first_name", "p.last_name", "p.email", "e.employee_code"];

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "profile_id": 12,
        "employee_code": "EMP-001",
        "designation": "Accountant",
        "hire_date": "2024-01-01",
        "base_salary": 42000.0,
        "status": "active",
        "department_id": 3,
        "created_at": "2024-01-01T09:00:00Z",
        "first_name": "John",
        "last_name": "Doe",
        "email": "john.doe@company.com",
        "phone": "+8801712345678",
        "department_name": "Finance"
    })
)]
pub struct Employee {
    pub id: u64,
    pub profile_id: u64,
    pub employee_code: String,
    pub designation: Option<String>,
    #[schema(value_type = String, format = "date")]
    pub hire_date: NaiveDate,
    pub base_salary: f64,
    pub status: String,
    pub department_id: Option<u64>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,

    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department_name: Option<String>,
}
