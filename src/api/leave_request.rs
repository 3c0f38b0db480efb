use crate::{
    api::page_window,
    auth::auth::AuthUser,
    error::{ApiError, ApiResult},
    model::{
        leave_request::{LEAVE_COLUMNS, LeaveRequest, LeaveStatus, LeaveType, leave_days},
        transition::StateMachine,
    },
    store::{Filterable, Order, Row, Select, Store},
};
use actix_web::{HttpResponse, web};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use tracing::{error, info, warn};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    #[schema(example = "sick")]
    pub leave_type: LeaveType, // enum ensures Swagger dropdown
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-03", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "Flu")]
    pub reason: String,
}

impl CreateLeave {
    /// Checks that need no database access.
    fn validate(&self) -> ApiResult<()> {
        if self.start_date > self.end_date {
            return Err(ApiError::bad_request("start_date cannot be after end_date"));
        }
        if self.reason.trim().is_empty() {
            return Err(ApiError::bad_request("A reason is required"));
        }
        Ok(())
    }
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct LeaveFilter {
    #[schema(example = 123)]
    /// Filter by employee ID
    pub employee_id: Option<u64>,
    /// Filter by leave status
    pub status: Option<LeaveStatus>,
    #[schema(example = 1)]
    /// Pagination page number (start with 1)
    pub page: Option<u32>,
    #[schema(example = 10)]
    /// Pagination per page number
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct LeaveListResponse {
    pub data: Vec<LeaveRequest>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

/// Leave requests with the requesting employee and the reviewer embedded.
fn leave_select<'s>(store: &'s Store) -> Select<'s> {
    store
        .from("leave_requests l")
        .select(LEAVE_COLUMNS)
        .left_join("employees e", "e.id = l.employee_id")
        .left_join("profiles p", "p.id = e.profile_id")
        .left_join("profiles r", "r.id = l.reviewed_by")
}

fn filtered<'s>(store: &'s Store, filter: &LeaveFilter) -> Select<'s> {
    leave_select(store)
        .eq_opt("l.employee_id", filter.employee_id)
        .eq_opt("l.status", filter.status.as_ref().map(|s| s.as_ref()))
}

/* =========================
Create leave request
========================= */
/// Submit a leave request for the caller; it always starts as pending
#[utoipa::path(
    post,
    path = "/api/my-leaves",
    request_body(
        content = CreateLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Leave request submitted successfully",
         body = Object,
         example = json!({
            "message": "Leave request submitted",
            "id": 31,
            "status": "pending",
            "days": 3
         })
        ),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    store: web::Data<Store>,
    payload: web::Json<CreateLeave>,
) -> ApiResult<HttpResponse> {
    // 1️⃣ validate
    payload.validate()?;

    // 2️⃣ resolve the caller's employee record
    let employee_id = auth.employee_id(&store).await?;

    // 3️⃣ insert request
    let id = store
        .from("leave_requests")
        .insert(
            Row::new()
                .set("employee_id", employee_id)
                .set("leave_type", payload.leave_type.as_ref())
                .set("start_date", payload.start_date)
                .set("end_date", payload.end_date)
                .set("reason", payload.reason.trim())
                .set("status", LeaveStatus::Pending.as_ref()),
        )
        .execute()
        .await
        .map_err(|e| {
            error!(error = %e, employee_id, "Failed to create leave request");
            e
        })?;

    Ok(HttpResponse::Created().json(json!({
        "message": "Leave request submitted",
        "id": id,
        "status": LeaveStatus::Pending,
        "days": leave_days(payload.start_date, payload.end_date)
    })))
}

/// The caller's own leave requests, newest first
#[utoipa::path(
    get,
    path = "/api/my-leaves",
    responses(
        (status = 200, description = "Own leave requests", body = [LeaveRequest]),
        (status = 403, description = "No employee profile")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn my_leaves(auth: AuthUser, store: web::Data<Store>) -> ApiResult<HttpResponse> {
    let employee_id = auth.employee_id(&store).await?;

    let leaves = leave_select(&store)
        .eq("l.employee_id", employee_id)
        .order("l.created_at", Order::Desc)
        .fetch_all::<LeaveRequest>()
        .await?;

    Ok(HttpResponse::Ok().json(leaves))
}

/// Moves a pending request to `target`, recording who reviewed it and when.
/// The update only lands if the status is still the one that was read.
async fn review_leave(
    auth: &AuthUser,
    store: &Store,
    leave_id: u64,
    target: LeaveStatus,
) -> ApiResult<()> {
    let current: Option<(String,)> = store
        .from("leave_requests")
        .select("status")
        .eq("id", leave_id)
        .maybe_single()
        .await?;
    let current = current.ok_or(ApiError::NotFound("Leave request not found"))?.0;

    let current = LeaveStatus::from_str(&current).map_err(|_| {
        warn!(leave_id, status = %current, "Unknown leave status in store");
        ApiError::Internal(format!("unknown leave status '{}'", current))
    })?;
    current.transition(target)?;

    let updated = store
        .from("leave_requests")
        .update(
            Row::new()
                .set("status", target.as_ref())
                .set("reviewed_by", auth.user_id)
                .set("reviewed_at", Utc::now()),
        )
        .eq("id", leave_id)
        .eq("status", current.as_ref())
        .execute()
        .await
        .map_err(|e| {
            error!(error = %e, leave_id, "Review leave failed");
            e
        })?;

    if updated == 0 {
        return Err(ApiError::Conflict(
            "Leave request was reviewed by someone else".into(),
        ));
    }

    info!(leave_id, status = %target, reviewer = auth.user_id, "Leave reviewed");
    Ok(())
}

/* =========================
Approve leave (HR/Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/leaves/{leave_id}/approve",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to approve")
    ),
    responses(
        (status = 200, description = "Leave approved successfully", body = Object, example = json!({
            "message": "Leave approved"
        })),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Leave request already processed", body = Object, example = json!({
            "message": "leave request cannot move from rejected to approved"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    store: web::Data<Store>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_hr_or_admin()?;

    review_leave(&auth, &store, path.into_inner(), LeaveStatus::Approved).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Leave approved"
    })))
}

/* =========================
Reject leave (HR/Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/leaves/{leave_id}/reject",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to reject")
    ),
    responses(
        (status = 200, description = "Leave rejected successfully", body = Object, example = json!({
            "message": "Leave rejected"
        })),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Leave request already processed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    store: web::Data<Store>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_hr_or_admin()?;

    review_leave(&auth, &store, path.into_inner(), LeaveStatus::Rejected).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Leave rejected"
    })))
}

/// for getting a leave application details endpoint
#[utoipa::path(
    get,
    path = "/api/leaves/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to fetch")
    ),
    responses(
        (status = 200, description = "Leave request found", body = LeaveRequest),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found", body = Object, example = json!({
            "message": "Leave request not found"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    store: web::Data<Store>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_hr_or_admin()?;

    let leave_id = path.into_inner();

    let leave = leave_select(&store)
        .eq("l.id", leave_id)
        .maybe_single::<LeaveRequest>()
        .await
        .map_err(|e| {
            error!(error = %e, leave_id, "Failed to fetch leave request");
            e
        })?
        .ok_or(ApiError::NotFound("Leave request not found"))?;

    Ok(HttpResponse::Ok().json(leave))
}

/// for getting leave applications endpoint
#[utoipa::path(
    get,
    path = "/api/leaves",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated leave list", body = LeaveListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    store: web::Data<Store>,
    query: web::Query<LeaveFilter>,
) -> ApiResult<HttpResponse> {
    auth.require_hr_or_admin()?;

    // -------------------------
    // Pagination
    // -------------------------
    let (page, per_page, offset) = page_window(query.page, query.per_page, 10);

    let total = filtered(&store, &query).count().await.map_err(|e| {
        error!(error = %e, "Failed to count leave requests");
        e
    })?;

    let leaves = filtered(&store, &query)
        .order("l.created_at", Order::Desc)
        .limit(per_page as u64)
        .offset(offset)
        .fetch_all::<LeaveRequest>()
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to fetch leave list");
            e
        })?;

    Ok(HttpResponse::Ok().json(LeaveListResponse {
        data: leaves,
        page,
        per_page,
        total,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{SqlValue, tests::lazy_store};

    fn leave(start: (i32, u32, u32), end: (i32, u32, u32), reason: &str) -> CreateLeave {
        CreateLeave {
            leave_type: LeaveType::Casual,
            start_date: NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
            end_date: NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap(),
            reason: reason.into(),
        }
    }

    #[test]
    fn start_after_end_is_rejected() {
        let err = leave((2025, 3, 5), (2025, 3, 1), "trip").validate().unwrap_err();
        assert_eq!(err.to_string(), "start_date cannot be after end_date");
    }

    #[test]
    fn blank_reason_is_rejected() {
        assert!(leave((2025, 3, 1), (2025, 3, 1), "  ").validate().is_err());
        assert!(leave((2025, 3, 1), (2025, 3, 2), "wedding").validate().is_ok());
    }

    #[actix_web::test]
    async fn list_embeds_employee_and_reviewer() {
        let store = lazy_store();
        let filter = LeaveFilter {
            employee_id: None,
            status: Some(LeaveStatus::Pending),
            page: None,
            per_page: None,
        };
        let statement = filtered(&store, &filter).statement();
        assert!(statement.sql.contains("LEFT JOIN profiles r ON r.id = l.reviewed_by"));
        assert!(statement.sql.ends_with("WHERE l.status = ?"));
        assert_eq!(statement.values, vec![SqlValue::String("pending".into())]);
    }
}
