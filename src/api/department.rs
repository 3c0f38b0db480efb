use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};
use utoipa::ToSchema;

use crate::{
    auth::auth::AuthUser,
    error::{ApiError, ApiResult},
    model::department::Department,
    store::{Filterable, Order, Row, Store},
};

const DEPARTMENT_COLUMNS: &str = "d.id, d.name, d.description, d.created_at, \
     (SELECT COUNT(*) FROM employees e WHERE e.department_id = d.id) AS employee_count";

#[derive(Debug, Deserialize, ToSchema)]
pub struct DepartmentPayload {
    #[schema(example = "Finance")]
    pub name: String,
    #[schema(example = "Accounts and payroll")]
    pub description: Option<String>,
}

impl DepartmentPayload {
    fn into_row(self) -> ApiResult<Row> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ApiError::bad_request("Department name is required"));
        }
        let description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        Ok(Row::new().set("name", name).set("description", description))
    }
}

#[utoipa::path(
    get,
    path = "/api/departments",
    responses(
        (status = 200, description = "Departments ordered by name", body = [Department]),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Department"
)]
pub async fn list_departments(auth: AuthUser, store: web::Data<Store>) -> ApiResult<HttpResponse> {
    auth.require_hr_or_admin()?;

    let departments = store
        .from("departments d")
        .select(DEPARTMENT_COLUMNS)
        .order("d.name", Order::Asc)
        .fetch_all::<Department>()
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to list departments");
            e
        })?;

    Ok(HttpResponse::Ok().json(departments))
}

#[utoipa::path(
    post,
    path = "/api/departments",
    request_body = DepartmentPayload,
    responses(
        (status = 201, description = "Department created", body = Object, example = json!({
            "message": "Department created successfully",
            "id": 4
        })),
        (status = 400, description = "Missing name"),
        (status = 409, description = "Name already in use")
    ),
    security(("bearer_auth" = [])),
    tag = "Department"
)]
pub async fn create_department(
    auth: AuthUser,
    store: web::Data<Store>,
    payload: web::Json<DepartmentPayload>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let row = payload.into_inner().into_row()?;
    let id = store.from("departments").insert(row).execute().await?;

    info!(department_id = id, "Department created");

    Ok(HttpResponse::Created().json(json!({
        "message": "Department created successfully",
        "id": id
    })))
}

#[utoipa::path(
    put,
    path = "/api/departments/{department_id}",
    params(("department_id", Path, description = "Department ID")),
    request_body = DepartmentPayload,
    responses(
        (status = 200, description = "Department updated"),
        (status = 404, description = "Department not found"),
        (status = 409, description = "Name already in use")
    ),
    security(("bearer_auth" = [])),
    tag = "Department"
)]
pub async fn update_department(
    auth: AuthUser,
    store: web::Data<Store>,
    path: web::Path<u64>,
    payload: web::Json<DepartmentPayload>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let department_id = path.into_inner();
    let row = payload.into_inner().into_row()?;

    let exists = store
        .from("departments")
        .select("id")
        .eq("id", department_id)
        .count()
        .await?;
    if exists == 0 {
        return Err(ApiError::NotFound("Department not found"));
    }

    store
        .from("departments")
        .update(row)
        .eq("id", department_id)
        .execute()
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Department updated successfully"
    })))
}

/// Employees in a deleted department become unassigned.
#[utoipa::path(
    delete,
    path = "/api/departments/{department_id}",
    params(("department_id", Path, description = "Department ID")),
    responses(
        (status = 200, description = "Department deleted"),
        (status = 404, description = "Department not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Department"
)]
pub async fn delete_department(
    auth: AuthUser,
    store: web::Data<Store>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let department_id = path.into_inner();
    let deleted = store
        .from("departments")
        .delete()
        .eq("id", department_id)
        .execute()
        .await
        .map_err(|e| {
            error!(error = %e, department_id, "Failed to delete department");
            e
        })?;

    if deleted == 0 {
        return Err(ApiError::NotFound("Department not found"));
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Department deleted successfully"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqlValue;

    #[test]
    fn names_are_trimmed_and_blank_descriptions_dropped() {
        let row = DepartmentPayload {
            name: "  Finance ".into(),
            description: Some("   ".into()),
        }
        .into_row()
        .unwrap();
        assert_eq!(
            row.into_values().collect::<Vec<_>>(),
            vec![SqlValue::String("Finance".into()), SqlValue::Null]
        );
    }

    #[test]
    fn blank_names_are_rejected() {
        let result = DepartmentPayload {
            name: " ".into(),
            description: None,
        }
        .into_row();
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }
}
