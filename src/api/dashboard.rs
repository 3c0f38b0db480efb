use actix_web::{HttpResponse, web};
use chrono::Utc;
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

use crate::{
    auth::auth::AuthUser,
    error::ApiResult,
    model::{
        attendance::AttendanceStatus, employee::EmployeeStatus, leave_request::LeaveStatus,
        payroll::PayrollStatus, role::Role,
    },
    store::{Filterable, Store},
};

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardStats {
    #[schema(example = 42)]
    pub total_employees: i64,
    #[schema(example = 37)]
    pub present_today: i64,
    #[schema(example = 3)]
    pub pending_leaves: i64,
    /// Sum of net salary over approved payroll records.
    #[schema(example = 183250.5)]
    pub total_payroll: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardResponse {
    pub role: Role,
    pub stats: DashboardStats,
}

/// Organization-wide counters shown on the landing page
#[utoipa::path(
    get,
    path = "/api/dashboard",
    responses(
        (status = 200, description = "Dashboard counters", body = DashboardResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn dashboard(auth: AuthUser, store: web::Data<Store>) -> ApiResult<HttpResponse> {
    let today = Utc::now().date_naive();

    let total_employees = store
        .from("employees")
        .select("id")
        .eq("status", EmployeeStatus::Active.as_ref())
        .count();
    let present_today = store
        .from("attendance")
        .select("id")
        .eq("date", today)
        .eq("status", AttendanceStatus::Present.as_ref())
        .count();
    let pending_leaves = store
        .from("leave_requests")
        .select("id")
        .eq("status", LeaveStatus::Pending.as_ref())
        .count();
    let total_payroll = store
        .from("payroll")
        .select("net_salary")
        .eq("status", PayrollStatus::Approved.as_ref())
        .sum("net_salary");

    let (total_employees, present_today, pending_leaves, total_payroll) =
        futures::try_join!(total_employees, present_today, pending_leaves, total_payroll)
            .map_err(|e| {
                error!(error = %e, "Failed to load dashboard stats");
                e
            })?;

    Ok(HttpResponse::Ok().json(DashboardResponse {
        role: auth.role,
        stats: DashboardStats {
            total_employees,
            present_today,
            pending_leaves,
            total_payroll,
        },
    }))
}
