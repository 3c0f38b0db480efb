use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use utoipa::ToSchema;

use crate::{
    auth::{auth::AuthUser, role::RoleResolver},
    error::{ApiError, ApiResult},
    model::role::Role,
    store::{Filterable, Row, Store},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignRole {
    pub role: Role,
}

/// Assign a role; takes effect on the user's next request
#[utoipa::path(
    put,
    path = "/api/users/{user_id}/role",
    params(("user_id", Path, description = "User (profile) ID")),
    request_body = AssignRole,
    responses(
        (status = 200, description = "Role assigned", body = Object, example = json!({
            "message": "Role updated to hr"
        })),
        (status = 400, description = "Admins cannot change their own role"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Session"
)]
pub async fn assign_role(
    auth: AuthUser,
    store: web::Data<Store>,
    resolver: web::Data<RoleResolver>,
    path: web::Path<u64>,
    payload: web::Json<AssignRole>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let user_id = path.into_inner();
    if user_id == auth.user_id {
        return Err(ApiError::bad_request("You cannot change your own role"));
    }

    let exists = store
        .from("profiles")
        .select("id")
        .eq("id", user_id)
        .count()
        .await?;
    if exists == 0 {
        return Err(ApiError::NotFound("User not found"));
    }

    store
        .from("profiles")
        .update(Row::new().set("role", payload.role.as_ref()))
        .eq("id", user_id)
        .execute()
        .await?;

    resolver.invalidate(user_id).await;

    info!(user_id, role = %payload.role, by = auth.user_id, "Role assigned");

    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Role updated to {}", payload.role)
    })))
}
