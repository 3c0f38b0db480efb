use crate::{
    api::page_window,
    auth::auth::AuthUser,
    error::{ApiError, ApiResult},
    model::employee::{EMPLOYEE_COLUMNS, EMPLOYEE_SEARCH_COLUMNS, Employee, EmployeeStatus},
    store::{Filterable, Order, Row, Select, Store},
    utils::db_utils::patch_row,
};
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::str::FromStr;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

/// Columns a manager may change through the partial update endpoint.
const UPDATABLE_COLUMNS: [&str; 6] = [
    "employee_code",
    "designation",
    "hire_date",
    "base_salary",
    "status",
    "department_id",
];

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateEmployee {
    /// Profile (user account) the employee record belongs to
    #[schema(example = 12)]
    pub profile_id: u64,
    #[schema(example = "EMP-001")]
    pub employee_code: String,
    #[schema(example = "Accountant")]
    pub designation: Option<String>,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub hire_date: NaiveDate,
    #[schema(example = 42000.0)]
    pub base_salary: f64,
    #[schema(example = 3)]
    pub department_id: Option<u64>,
    pub status: Option<EmployeeStatus>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct EmployeeQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub department_id: Option<u64>,
    pub status: Option<EmployeeStatus>,
    /// Case-insensitive match on first name, last name, email or employee code
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<Employee>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 10)]
    pub total: i64,
}

/// Employees with profile and department embedded.
fn employee_select<'s>(store: &'s Store) -> Select<'s> {
    store
        .from("employees e")
        .select(EMPLOYEE_COLUMNS)
        .left_join("profiles p", "p.id = e.profile_id")
        .left_join("departments d", "d.id = e.department_id")
}

fn roster_query<'s>(store: &'s Store, query: &EmployeeQuery) -> Select<'s> {
    let mut select = employee_select(store)
        .eq_opt("e.department_id", query.department_id)
        .eq_opt("e.status", query.status.as_ref().map(|s| s.as_ref()));

    if let Some(term) = query.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        select = select.ilike_any(&EMPLOYEE_SEARCH_COLUMNS, term);
    }
    select
}

/// Rejects values the schema would accept but the business rules do not.
fn validate_patch(body: &Value) -> ApiResult<()> {
    if let Some(status) = body.get("status") {
        let valid = status
            .as_str()
            .is_some_and(|s| EmployeeStatus::from_str(s).is_ok());
        if !valid {
            return Err(ApiError::bad_request(
                "Invalid status. Allowed: active, inactive, terminated",
            ));
        }
    }
    if let Some(salary) = body.get("base_salary") {
        if !salary.as_f64().is_some_and(|s| s >= 0.0) {
            return Err(ApiError::bad_request("base_salary must be a non-negative number"));
        }
    }
    if let Some(code) = body.get("employee_code") {
        if !code.as_str().is_some_and(|c| !c.trim().is_empty()) {
            return Err(ApiError::bad_request("employee_code must not be empty"));
        }
    }
    Ok(())
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/employees",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created successfully", body = Object, example = json!({
            "message": "Employee created successfully",
            "id": 7
        })),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Profile not found"),
        (status = 409, description = "Employee code or profile already in use"),
        (status = 500, description = "Internal server error", body = Object, example = json!({
            "message": "Something went wrong, Contact with system admin"
        }))
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_employee(
    auth: AuthUser,
    store: web::Data<Store>,
    payload: web::Json<CreateEmployee>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let employee_code = payload.employee_code.trim();
    if employee_code.is_empty() {
        return Err(ApiError::bad_request("employee_code is required"));
    }
    if payload.base_salary < 0.0 {
        return Err(ApiError::bad_request("base_salary must not be negative"));
    }

    let profile_exists = store
        .from("profiles")
        .select("id")
        .eq("id", payload.profile_id)
        .count()
        .await?;
    if profile_exists == 0 {
        return Err(ApiError::NotFound("Profile not found"));
    }

    let status = payload.status.unwrap_or(EmployeeStatus::Active);
    let row = Row::new()
        .set("profile_id", payload.profile_id)
        .set("employee_code", employee_code)
        .set("designation", payload.designation.as_deref())
        .set("hire_date", payload.hire_date)
        .set("base_salary", payload.base_salary)
        .set("status", status.as_ref())
        .set("department_id", payload.department_id);

    let id = store.from("employees").insert(row).execute().await.map_err(|e| {
        error!(error = %e, profile_id = payload.profile_id, "Failed to create employee");
        e
    })?;

    info!(employee_id = id, by = auth.user_id, "Employee created");

    Ok(HttpResponse::Created().json(json!({
        "message": "Employee created successfully",
        "id": id
    })))
}

#[utoipa::path(
    get,
    path = "/api/employees",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeeListResponse),
        (status = 403, description = "Forbidden")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_employees(
    auth: AuthUser,
    store: web::Data<Store>,
    query: web::Query<EmployeeQuery>,
) -> ApiResult<HttpResponse> {
    auth.require_hr_or_admin()?;

    let (page, per_page, offset) = page_window(query.page, query.per_page, 20);

    let total = roster_query(&store, &query).count().await.map_err(|e| {
        error!(error = %e, "Failed to count employees");
        e
    })?;

    let employees = roster_query(&store, &query)
        .order("e.created_at", Order::Desc)
        .limit(per_page as u64)
        .offset(offset)
        .fetch_all::<Employee>()
        .await
        .map_err(|e| {
            error!(error = %e, page, per_page, "Failed to fetch employees");
            e
        })?;

    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        data: employees,
        page,
        per_page,
        total,
    }))
}

/// Update Employee
#[utoipa::path(
    put,
    path = "/api/employees/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    request_body(content = Object, description = "Any subset of employee_code, designation, hire_date, base_salary, status, department_id"),
    responses(
        (status = 200, description = "Employee updated successfully", body = Object, example = json!({
            "message": "Employee updated successfully"
        })),
        (status = 400, description = "Unknown or invalid field"),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_employee(
    auth: AuthUser,
    store: web::Data<Store>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let employee_id = path.into_inner();

    validate_patch(&body)?;
    let row = patch_row(&body, &UPDATABLE_COLUMNS)?;

    let exists = store
        .from("employees")
        .select("id")
        .eq("id", employee_id)
        .count()
        .await?;
    if exists == 0 {
        return Err(ApiError::NotFound("Employee not found"));
    }

    // MySQL reports 0 affected rows when nothing changed, so existence is checked first
    store
        .from("employees")
        .update(row)
        .eq("id", employee_id)
        .execute()
        .await
        .map_err(|e| {
            error!(error = %e, employee_id, "Failed to update employee");
            e
        })?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Employee updated successfully"
    })))
}

/// Delete Employee
#[utoipa::path(
    delete,
    path = "/api/employees/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Successfully deleted", body = Object, example = json!({
            "message": "Successfully deleted"
        })),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        })),
        (status = 500, description = "Internal server error", body = Object)
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_employee(
    auth: AuthUser,
    store: web::Data<Store>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let employee_id = path.into_inner();

    let deleted = store
        .from("employees")
        .delete()
        .eq("id", employee_id)
        .execute()
        .await
        .map_err(|e| {
            error!(error = %e, employee_id, "Failed to delete employee");
            e
        })?;

    if deleted == 0 {
        return Err(ApiError::NotFound("Employee not found"));
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Successfully deleted"
    })))
}

/// Get Employee by ID
#[utoipa::path(
    get,
    path = "/api/employees/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_employee(
    auth: AuthUser,
    store: web::Data<Store>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_hr_or_admin()?;

    let employee_id = path.into_inner();

    let employee = employee_select(&store)
        .eq("e.id", employee_id)
        .maybe_single::<Employee>()
        .await
        .map_err(|e| {
            error!(error = %e, employee_id, "Failed to fetch employee");
            e
        })?
        .ok_or(ApiError::NotFound("Employee not found"))?;

    Ok(HttpResponse::Ok().json(employee))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{SqlValue, tests::lazy_store};

    #[actix_web::test]
    async fn search_matches_four_columns_case_insensitively() {
        let store = lazy_store();
        let query = EmployeeQuery {
            page: None,
            per_page: None,
            department_id: None,
            status: Some(EmployeeStatus::Active),
            search: Some("  JaNe ".into()),
        };

        let statement = roster_query(&store, &query).count_statement();
        assert!(statement.sql.contains(
            "(LOWER(p.first_name) LIKE ? OR LOWER(p.last_name) LIKE ? \
             OR LOWER(p.email) LIKE ? OR LOWER(e.employee_code) LIKE ?)"
        ));
        assert_eq!(statement.values[0], SqlValue::String("active".into()));
        assert_eq!(
            statement.values[1..].to_vec(),
            vec![SqlValue::String("%jane%".into()); 4]
        );
    }

    #[actix_web::test]
    async fn blank_search_adds_no_filter() {
        let store = lazy_store();
        let query = EmployeeQuery {
            page: None,
            per_page: None,
            department_id: Some(3),
            status: None,
            search: Some("   ".into()),
        };

        let statement = roster_query(&store, &query).count_statement();
        assert!(statement.sql.ends_with("WHERE e.department_id = ?"));
        assert_eq!(statement.values, vec![SqlValue::U64(3)]);
    }

    #[test]
    fn patches_with_bad_status_or_salary_are_rejected() {
        assert!(validate_patch(&json!({"status": "retired"})).is_err());
        assert!(validate_patch(&json!({"base_salary": -1})).is_err());
        assert!(validate_patch(&json!({"base_salary": "lots"})).is_err());
        assert!(validate_patch(&json!({"employee_code": " "})).is_err());
        assert!(validate_patch(&json!({"status": "terminated", "base_salary": 10.5})).is_ok());
    }
}
