use actix_web::{HttpResponse, web};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use tracing::{error, info, warn};
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::attendance::month_bounds,
    auth::auth::AuthUser,
    error::{ApiError, ApiResult},
    model::{
        attendance::AttendanceTally,
        employee::EmployeeStatus,
        payroll::{
            PAYROLL_COLUMNS, Payroll, PayrollDraft, PayrollStatus, net_salary,
            working_days_in_month,
        },
        transition::StateMachine,
    },
    store::{Filterable, Order, Row, Select, Store, Upsert},
};

const PERIOD_KEY: [&str; 3] = ["employee_id", "month", "year"];

#[derive(Deserialize, ToSchema)]
pub struct CreatePayroll {
    #[schema(example = 1001)]
    pub employee_id: u64,
    #[schema(example = 3)]
    pub month: u8,
    #[schema(example = 2025)]
    pub year: u16,
    /// Defaults to the employee's base salary
    #[schema(example = 50000.0)]
    pub base_salary: Option<f64>,
    #[schema(example = 5000.0)]
    pub allowances: Option<f64>,
    #[schema(example = 2000.0)]
    pub deductions: Option<f64>,
    /// Defaults to the weekdays in the month
    #[schema(example = 21)]
    pub working_days: Option<u32>,
    /// Defaults to the working days
    #[schema(example = 21.0)]
    pub present_days: Option<f64>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdatePayroll {
    #[schema(example = 52000.0)]
    pub base_salary: Option<f64>,
    #[schema(example = 6000.0)]
    pub allowances: Option<f64>,
    #[schema(example = 2500.0)]
    pub deductions: Option<f64>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdatePayrollStatus {
    pub status: PayrollStatus,
}

#[derive(Deserialize, ToSchema)]
pub struct GeneratePayroll {
    #[schema(example = 3)]
    pub month: u8,
    #[schema(example = 2025)]
    pub year: u16,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct PayrollQuery {
    /// 1-12, defaults to the current month
    #[schema(example = 3)]
    pub month: Option<u8>,
    /// Defaults to the current year
    #[schema(example = 2025)]
    pub year: Option<u16>,
}

#[derive(Deserialize, IntoParams)]
pub struct YearQuery {
    /// Defaults to the current year
    pub year: Option<u16>,
}

#[derive(Serialize, ToSchema)]
pub struct PayrollListResponse {
    pub month: u8,
    pub year: u16,
    pub data: Vec<Payroll>,
}

#[derive(Serialize, ToSchema)]
pub struct MyPayrollResponse {
    pub year: u16,
    pub records: Vec<Payroll>,
    /// Net salary summed over the year's records
    #[schema(example = 636000.0)]
    pub total_earned: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GenerationSummary {
    #[schema(example = 40)]
    pub generated: usize,
    /// Employees whose record for the period is already approved or paid
    #[schema(example = 2)]
    pub skipped: usize,
}

fn check_period(month: u8, year: u16) -> ApiResult<u32> {
    working_days_in_month(year as i32, month as u32)
        .ok_or_else(|| ApiError::bad_request("month must be between 1 and 12"))
}

fn check_amounts(amounts: &[Option<f64>]) -> ApiResult<()> {
    if amounts.iter().flatten().any(|a| *a < 0.0 || !a.is_finite()) {
        return Err(ApiError::bad_request("Amounts must be non-negative numbers"));
    }
    Ok(())
}

fn current_period() -> (u8, u16) {
    let today = Utc::now().date_naive();
    (today.month() as u8, today.year() as u16)
}

fn parse_status(stored: &str, payroll_id: u64) -> ApiResult<PayrollStatus> {
    PayrollStatus::from_str(stored).map_err(|_| {
        warn!(payroll_id, status = %stored, "Unknown payroll status in store");
        ApiError::Internal(format!("unknown payroll status '{}'", stored))
    })
}

/// Payroll rows with the employee and their profile embedded.
fn payroll_select<'s>(store: &'s Store) -> Select<'s> {
    store
        .from("payroll pr")
        .select(PAYROLL_COLUMNS)
        .left_join("employees e", "e.id = pr.employee_id")
        .left_join("profiles p", "p.id = e.profile_id")
}

fn draft_row(employee_id: u64, month: u8, year: u16, draft: &PayrollDraft) -> Row {
    Row::new()
        .set("employee_id", employee_id)
        .set("month", month)
        .set("year", year)
        .set("base_salary", draft.base_salary)
        .set("allowances", draft.allowances)
        .set("deductions", draft.deductions)
        .set("net_salary", draft.net_salary)
        .set("working_days", draft.working_days)
        .set("present_days", draft.present_days)
        .set("status", PayrollStatus::Draft.as_ref())
}

/// Upsert of a period's draft. An approved or paid record that appeared since
/// it was read keeps its figures and status.
fn draft_upsert<'s>(store: &'s Store, employee_id: u64, month: u8, year: u16, draft: &PayrollDraft) -> Upsert<'s> {
    store
        .from("payroll")
        .upsert(draft_row(employee_id, month, year, draft))
        .on_conflict(&PERIOD_KEY)
        .only_when("status", PayrollStatus::Draft.as_ref())
}

async fn period_status(store: &Store, employee_id: u64, month: u8, year: u16) -> ApiResult<Option<String>> {
    let existing: Option<(String,)> = store
        .from("payroll")
        .select("status")
        .eq("employee_id", employee_id)
        .eq("month", month)
        .eq("year", year)
        .maybe_single()
        .await?;
    Ok(existing.map(|(status,)| status))
}

fn ensure_draft(status: Option<String>) -> ApiResult<()> {
    match status {
        Some(status) if PayrollStatus::from_str(&status).map_or(true, |s| !s.is_editable()) => {
            Err(ApiError::Conflict(format!(
                "Payroll for this period is already {}",
                status
            )))
        }
        _ => Ok(()),
    }
}

/// What a generation run writes: one draft per active employee whose record
/// for the period is absent or still a draft.
#[derive(Debug, PartialEq)]
struct GenerationPlan {
    drafts: Vec<(u64, PayrollDraft)>,
    skipped: usize,
}

fn plan_generation(
    employees: &[(u64, f64)],
    existing: &[(u64, String, f64)],
    attendance: &[(u64, String)],
    working_days: u32,
) -> GenerationPlan {
    let mut locked = HashSet::new();
    let mut allowances = HashMap::new();
    for (employee_id, status, existing_allowances) in existing {
        match PayrollStatus::from_str(status) {
            Ok(s) if s.is_editable() => {
                allowances.insert(*employee_id, *existing_allowances);
            }
            _ => {
                locked.insert(*employee_id);
            }
        }
    }

    let mut statuses: HashMap<u64, Vec<&str>> = HashMap::new();
    for (employee_id, status) in attendance {
        statuses.entry(*employee_id).or_default().push(status.as_str());
    }

    let mut plan = GenerationPlan {
        drafts: Vec::with_capacity(employees.len()),
        skipped: 0,
    };
    for (employee_id, base_salary) in employees {
        if locked.contains(employee_id) {
            plan.skipped += 1;
            continue;
        }
        let tally = AttendanceTally::from_statuses(
            statuses.get(employee_id).into_iter().flatten().copied(),
        );
        let draft = PayrollDraft::from_attendance(*base_salary, working_days, &tally)
            .with_allowances(allowances.get(employee_id).copied().unwrap_or(0.0));
        plan.drafts.push((*employee_id, draft));
    }
    plan
}

#[utoipa::path(
    get,
    path = "/api/payroll",
    params(PayrollQuery),
    responses(
        (status = 200, description = "Payroll for the period", body = PayrollListResponse),
        (status = 400, description = "Invalid month"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn list_payrolls(
    auth: AuthUser,
    store: web::Data<Store>,
    query: web::Query<PayrollQuery>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let (this_month, this_year) = current_period();
    let month = query.month.unwrap_or(this_month);
    let year = query.year.unwrap_or(this_year);
    check_period(month, year)?;

    let data = payroll_select(&store)
        .eq("pr.month", month)
        .eq("pr.year", year)
        .order("p.first_name", Order::Asc)
        .order("p.last_name", Order::Asc)
        .fetch_all::<Payroll>()
        .await
        .map_err(|e| {
            error!(error = %e, month, year, "Failed to list payroll");
            e
        })?;

    Ok(HttpResponse::Ok().json(PayrollListResponse { month, year, data }))
}

#[utoipa::path(
    get,
    path = "/api/payroll/{payroll_id}",
    params(("payroll_id", Path, description = "Payroll ID")),
    responses(
        (status = 200, body = Payroll),
        (status = 404, description = "Payroll not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn get_payroll(
    auth: AuthUser,
    store: web::Data<Store>,
    path: web::Path<u64>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let payroll_id = path.into_inner();
    let payroll = payroll_select(&store)
        .eq("pr.id", payroll_id)
        .maybe_single::<Payroll>()
        .await?
        .ok_or(ApiError::NotFound("Payroll not found"))?;

    Ok(HttpResponse::Ok().json(payroll))
}

/// Create or replace the draft for one employee and period
#[utoipa::path(
    post,
    path = "/api/payroll",
    request_body = CreatePayroll,
    responses(
        (status = 201, description = "Draft saved", body = Object, example = json!({
            "message": "Payroll draft saved",
            "net_salary": 53000.0
        })),
        (status = 400, description = "Invalid period or amounts"),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Record for the period is no longer a draft"),
        (status = 401),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn create_payroll(
    auth: AuthUser,
    store: web::Data<Store>,
    payload: web::Json<CreatePayroll>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let weekdays = check_period(payload.month, payload.year)?;
    check_amounts(&[
        payload.base_salary,
        payload.allowances,
        payload.deductions,
        payload.present_days,
    ])?;

    let employee: Option<(f64,)> = store
        .from("employees")
        .select("base_salary")
        .eq("id", payload.employee_id)
        .maybe_single()
        .await?;
    let (employee_salary,) = employee.ok_or(ApiError::NotFound("Employee not found"))?;

    ensure_draft(period_status(&store, payload.employee_id, payload.month, payload.year).await?)?;

    let base_salary = payload.base_salary.unwrap_or(employee_salary);
    let allowances = payload.allowances.unwrap_or(0.0);
    let deductions = payload.deductions.unwrap_or(0.0);
    let working_days = payload.working_days.unwrap_or(weekdays);
    let draft = PayrollDraft {
        base_salary,
        allowances,
        deductions,
        net_salary: net_salary(base_salary, allowances, deductions),
        working_days,
        present_days: payload.present_days.unwrap_or(working_days as f64),
    };

    draft_upsert(&store, payload.employee_id, payload.month, payload.year, &draft)
        .execute()
        .await
        .map_err(|e| {
            error!(error = %e, employee_id = payload.employee_id, "Failed to save payroll draft");
            e
        })?;
    // an approval that landed after the check above keeps the record locked
    ensure_draft(period_status(&store, payload.employee_id, payload.month, payload.year).await?)?;

    Ok(HttpResponse::Created().json(json!({
        "message": "Payroll draft saved",
        "net_salary": draft.net_salary
    })))
}

/// Edit a draft's amounts; net salary is recomputed
#[utoipa::path(
    put,
    path = "/api/payroll/{payroll_id}",
    request_body = UpdatePayroll,
    params(
        ("payroll_id", description = "Payroll ID")
    ),
    responses(
        (status = 200, description = "Payroll updated"),
        (status = 404, description = "Payroll not found"),
        (status = 409, description = "Payroll is no longer a draft"),
        (status = 401),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn update_payroll(
    auth: AuthUser,
    store: web::Data<Store>,
    path: web::Path<u64>,
    payload: web::Json<UpdatePayroll>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let payroll_id = path.into_inner();
    check_amounts(&[payload.base_salary, payload.allowances, payload.deductions])?;

    let current: Option<(f64, f64, f64, String)> = store
        .from("payroll")
        .select("base_salary, allowances, deductions, status")
        .eq("id", payroll_id)
        .maybe_single()
        .await?;
    let (base, allowances, deductions, status) =
        current.ok_or(ApiError::NotFound("Payroll not found"))?;

    if !parse_status(&status, payroll_id)?.is_editable() {
        return Err(ApiError::Conflict(format!(
            "Payroll is {} and can no longer be edited",
            status
        )));
    }

    let base = payload.base_salary.unwrap_or(base);
    let allowances = payload.allowances.unwrap_or(allowances);
    let deductions = payload.deductions.unwrap_or(deductions);
    let net = net_salary(base, allowances, deductions);

    let updated = store
        .from("payroll")
        .update(
            Row::new()
                .set("base_salary", base)
                .set("allowances", allowances)
                .set("deductions", deductions)
                .set("net_salary", net),
        )
        .eq("id", payroll_id)
        .eq("status", PayrollStatus::Draft.as_ref())
        .execute()
        .await?;

    if updated == 0 {
        // approved between the read and the write; an identical rewrite also lands here
        let still_draft = store
            .from("payroll")
            .select("id")
            .eq("id", payroll_id)
            .eq("status", PayrollStatus::Draft.as_ref())
            .count()
            .await?;
        if still_draft == 0 {
            return Err(ApiError::Conflict("Payroll is no longer a draft".into()));
        }
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Payroll updated successfully",
        "net_salary": net
    })))
}

/// Move a payroll record along draft → approved → paid
#[utoipa::path(
    put,
    path = "/api/payroll/{payroll_id}/status",
    request_body = UpdatePayrollStatus,
    params(("payroll_id", Path, description = "Payroll ID")),
    responses(
        (status = 200, description = "Status updated", body = Object, example = json!({
            "message": "Payroll status updated to approved"
        })),
        (status = 404, description = "Payroll not found"),
        (status = 409, description = "Transition not allowed")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn update_payroll_status(
    auth: AuthUser,
    store: web::Data<Store>,
    path: web::Path<u64>,
    payload: web::Json<UpdatePayrollStatus>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let payroll_id = path.into_inner();
    let current: Option<(String,)> = store
        .from("payroll")
        .select("status")
        .eq("id", payroll_id)
        .maybe_single()
        .await?;
    let (current,) = current.ok_or(ApiError::NotFound("Payroll not found"))?;

    let current = parse_status(&current, payroll_id)?;
    let next = current.transition(payload.status)?;

    let updated = store
        .from("payroll")
        .update(Row::new().set("status", next.as_ref()))
        .eq("id", payroll_id)
        .eq("status", current.as_ref())
        .execute()
        .await?;
    if updated == 0 {
        return Err(ApiError::Conflict(
            "Payroll status was changed by someone else".into(),
        ));
    }

    info!(payroll_id, from = %current, to = %next, by = auth.user_id, "Payroll status updated");

    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Payroll status updated to {}", next)
    })))
}

/// Build drafts for every active employee from the period's attendance
#[utoipa::path(
    post,
    path = "/api/payroll/generate",
    request_body = GeneratePayroll,
    responses(
        (status = 200, description = "Drafts generated", body = GenerationSummary),
        (status = 400, description = "Invalid month"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn generate_payroll(
    auth: AuthUser,
    store: web::Data<Store>,
    payload: web::Json<GeneratePayroll>,
) -> ApiResult<HttpResponse> {
    auth.require_admin()?;

    let (month, year) = (payload.month, payload.year);
    let working_days = check_period(month, year)?;
    let (start, end) = month_bounds(&format!("{:04}-{:02}", year, month))?;

    let employees: Vec<(u64, f64)> = store
        .from("employees")
        .select("id, base_salary")
        .eq("status", EmployeeStatus::Active.as_ref())
        .order("id", Order::Asc)
        .fetch_all()
        .await?;

    let existing: Vec<(u64, String, f64)> = store
        .from("payroll")
        .select("employee_id, status, allowances")
        .eq("month", month)
        .eq("year", year)
        .fetch_all()
        .await?;

    let attendance: Vec<(u64, String)> = store
        .from("attendance")
        .select("employee_id, status")
        .gte("date", start)
        .lte("date", end)
        .fetch_all()
        .await?;

    let plan = plan_generation(&employees, &existing, &attendance, working_days);

    let mut generated = 0;
    for (employee_id, draft) in &plan.drafts {
        draft_upsert(&store, *employee_id, month, year, draft)
            .execute()
            .await
            .map_err(|e| {
                error!(error = %e, employee_id, month, year, generated, "Payroll generation stopped");
                e
            })?;
        generated += 1;
    }

    info!(month, year, generated, skipped = plan.skipped, "Payroll generated");

    Ok(HttpResponse::Ok().json(GenerationSummary {
        generated,
        skipped: plan.skipped,
    }))
}

/// The caller's own payroll for a year, newest month first
#[utoipa::path(
    get,
    path = "/api/my-payroll",
    params(YearQuery),
    responses(
        (status = 200, body = MyPayrollResponse),
        (status = 403, description = "No employee profile")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn my_payroll(
    auth: AuthUser,
    store: web::Data<Store>,
    query: web::Query<YearQuery>,
) -> ApiResult<HttpResponse> {
    let year = query.year.unwrap_or_else(|| current_period().1);
    let employee_id = auth.employee_id(&store).await?;

    let records = payroll_select(&store)
        .eq("pr.employee_id", employee_id)
        .eq("pr.year", year)
        .order("pr.month", Order::Desc)
        .fetch_all::<Payroll>()
        .await?;

    let total_earned = records.iter().map(|r| r.net_salary).sum::<f64>();

    Ok(HttpResponse::Ok().json(MyPayrollResponse {
        year,
        records,
        total_earned: (total_earned * 100.0).round() / 100.0,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::lazy_store;

    #[actix_web::test]
    async fn draft_writes_never_reopen_locked_records() {
        let store = lazy_store();
        let draft = PayrollDraft::from_attendance(
            2000.0,
            20,
            &AttendanceTally {
                present: 20,
                ..Default::default()
            },
        );
        let statement = draft_upsert(&store, 4, 3, 2025, &draft).statement().unwrap();

        assert!(statement.sql.contains(
            "net_salary = IF(status = ?, VALUES(net_salary), net_salary)"
        ));
        assert!(
            statement
                .sql
                .ends_with("status = IF(status = ?, VALUES(status), status)")
        );
        assert!(!statement.sql.contains("status = VALUES(status)"));
    }

    #[test]
    fn only_drafts_can_be_replaced() {
        assert!(ensure_draft(None).is_ok());
        assert!(ensure_draft(Some("draft".into())).is_ok());
        assert!(matches!(
            ensure_draft(Some("approved".into())),
            Err(ApiError::Conflict(_))
        ));
        assert!(matches!(
            ensure_draft(Some("paid".into())),
            Err(ApiError::Conflict(_))
        ));
    }

    fn statuses(list: &[(u64, &str)]) -> Vec<(u64, String)> {
        list.iter().map(|(id, s)| (*id, s.to_string())).collect()
    }

    #[test]
    fn approved_and_paid_records_are_skipped() {
        let employees = [(1, 2000.0), (2, 2000.0), (3, 2000.0)];
        let existing = vec![
            (1, "approved".to_string(), 0.0),
            (2, "paid".to_string(), 0.0),
        ];
        let plan = plan_generation(&employees, &existing, &[], 20);
        assert_eq!(plan.skipped, 2);
        assert_eq!(plan.drafts.len(), 1);
        assert_eq!(plan.drafts[0].0, 3);
    }

    #[test]
    fn drafts_are_regenerated_keeping_allowances() {
        let employees = [(1, 2000.0)];
        let existing = vec![(1, "draft".to_string(), 150.0)];
        let attendance = statuses(&[(1, "present"); 20]);
        let plan = plan_generation(&employees, &existing, &attendance, 20);
        let (_, draft) = &plan.drafts[0];
        assert_eq!(draft.deductions, 0.0);
        assert_eq!(draft.allowances, 150.0);
        assert_eq!(draft.net_salary, 2150.0);
    }

    #[test]
    fn missing_attendance_is_fully_deducted() {
        let employees = [(9, 2100.0)];
        let attendance = statuses(&[(9, "present"), (9, "half_day"), (4, "present")]);
        let plan = plan_generation(&employees, &[], &attendance, 21);
        let (_, draft) = &plan.drafts[0];
        assert_eq!(draft.present_days, 1.5);
        // 19.5 unpaid days at 100 per day
        assert_eq!(draft.deductions, 1950.0);
        assert_eq!(draft.net_salary, 150.0);
    }

    #[test]
    fn invalid_months_are_rejected() {
        assert!(check_period(0, 2025).is_err());
        assert!(check_period(13, 2025).is_err());
        assert_eq!(check_period(3, 2025).unwrap(), 21);
    }

    #[test]
    fn negative_amounts_are_rejected() {
        assert!(check_amounts(&[Some(1.0), None, Some(-0.01)]).is_err());
        assert!(check_amounts(&[Some(f64::NAN)]).is_err());
        assert!(check_amounts(&[Some(0.0), None]).is_ok());
    }
}
