use crate::{
    auth::auth::AuthUser,
    error::{ApiError, ApiResult},
    model::{
        attendance::{Attendance, AttendanceStatus, AttendanceTally, RosterEntry},
        employee::EmployeeStatus,
    },
    store::{Filterable, Order, Row, Store, Update},
};
use actix_web::{HttpResponse, web};
use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

const ROSTER_COLUMNS: &str = "e.id AS employee_id, e.employee_code, p.first_name, p.last_name, \
     a.id AS attendance_id, COALESCE(a.status, 'absent') AS status, \
     a.check_in_time, a.check_out_time";

#[derive(Debug, Deserialize, IntoParams)]
pub struct RosterQuery {
    /// Day to show, `YYYY-MM-DD`. Defaults to today.
    #[param(value_type = Option<String>)]
    pub date: Option<NaiveDate>,
}

#[derive(Serialize, ToSchema)]
pub struct RosterResponse {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub entries: Vec<RosterEntry>,
    pub summary: AttendanceTally,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MarkAttendance {
    #[schema(example = 1001)]
    pub employee_id: u64,
    #[schema(example = "2025-03-01", format = "date", value_type = String)]
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    /// Defaults to 09:00 when marking present
    #[schema(example = "09:00:00", value_type = Option<String>)]
    pub check_in_time: Option<NaiveTime>,
    /// Defaults to 18:00 when marking present
    #[schema(example = "18:00:00", value_type = Option<String>)]
    pub check_out_time: Option<NaiveTime>,
}

impl MarkAttendance {
    /// The row written for this mark. Explicit times win over office hours.
    fn to_row(&self) -> Row {
        let (default_in, default_out) = self.status.default_times();
        let (check_in, check_out) = match self.status {
            AttendanceStatus::Present | AttendanceStatus::HalfDay => (
                self.check_in_time.or(default_in),
                self.check_out_time.or(default_out),
            ),
            _ => (None, None),
        };
        Row::new()
            .set("employee_id", self.employee_id)
            .set("date", self.date)
            .set("status", self.status.as_ref())
            .set("check_in_time", check_in)
            .set("check_out_time", check_out)
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct MonthQuery {
    /// `YYYY-MM`. Defaults to the current month.
    pub month: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct MyAttendanceResponse {
    #[schema(example = "2025-03")]
    pub month: String,
    pub records: Vec<Attendance>,
    pub stats: AttendanceTally,
}

/// First and last day of a `YYYY-MM` month.
pub(crate) fn month_bounds(month: &str) -> ApiResult<(NaiveDate, NaiveDate)> {
    let invalid = || ApiError::bad_request("month must be formatted as YYYY-MM");

    let first = NaiveDate::parse_from_str(&format!("{}-01", month.trim()), "%Y-%m-%d")
        .map_err(|_| invalid())?;
    let last = first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .ok_or_else(invalid)?;
    Ok((first, last))
}

/// Daily roster: every active employee with the status marked for the day
#[utoipa::path(
    get,
    path = "/api/attendance",
    params(RosterQuery),
    responses(
        (status = 200, description = "Roster for the day", body = RosterResponse),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn roster(
    auth: AuthUser,
    store: web::Data<Store>,
    query: web::Query<RosterQuery>,
) -> ApiResult<HttpResponse> {
    auth.require_hr_or_admin()?;

    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());

    let entries = store
        .from("employees e")
        .select(ROSTER_COLUMNS)
        .left_join("profiles p", "p.id = e.profile_id")
        .left_join_bound(
            "attendance a",
            "a.employee_id = e.id AND a.date = ?",
            vec![date.into()],
        )
        .eq("e.status", EmployeeStatus::Active.as_ref())
        .order("p.first_name", Order::Asc)
        .order("p.last_name", Order::Asc)
        .fetch_all::<RosterEntry>()
        .await
        .map_err(|e| {
            error!(error = %e, %date, "Failed to load attendance roster");
            e
        })?;

    let summary = AttendanceTally::from_statuses(entries.iter().map(|e| e.status.as_str()));

    Ok(HttpResponse::Ok().json(RosterResponse {
        date,
        entries,
        summary,
    }))
}

/// Mark (or re-mark) one employee's attendance for a day
#[utoipa::path(
    put,
    path = "/api/attendance",
    request_body = MarkAttendance,
    responses(
        (status = 200, description = "Attendance marked", body = Object, example = json!({
            "message": "Attendance marked"
        })),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn mark_attendance(
    auth: AuthUser,
    store: web::Data<Store>,
    payload: web::Json<MarkAttendance>,
) -> ApiResult<HttpResponse> {
    auth.require_hr_or_admin()?;

    if let (Some(check_in), Some(check_out)) = (payload.check_in_time, payload.check_out_time) {
        if check_out < check_in {
            return Err(ApiError::bad_request("check_out_time cannot be before check_in_time"));
        }
    }

    let exists = store
        .from("employees")
        .select("id")
        .eq("id", payload.employee_id)
        .count()
        .await?;
    if exists == 0 {
        return Err(ApiError::NotFound("Employee not found"));
    }

    store
        .from("attendance")
        .upsert(payload.to_row())
        .on_conflict(&["employee_id", "date"])
        .execute()
        .await
        .map_err(|e| {
            error!(error = %e, employee_id = payload.employee_id, "Failed to mark attendance");
            e
        })?;

    info!(
        employee_id = payload.employee_id,
        date = %payload.date,
        status = %payload.status,
        by = auth.user_id,
        "Attendance marked"
    );

    Ok(HttpResponse::Ok().json(json!({
        "message": "Attendance marked"
    })))
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    responses(
        (status = 200, description = "Checked in successfully", body = Object, example = json!({
            "message": "Checked in successfully"
        })),
        (status = 400, description = "Already checked in today", body = Object, example = json!({
            "message": "Already checked in today"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_in(auth: AuthUser, store: web::Data<Store>) -> ApiResult<HttpResponse> {
    let employee_id = auth.employee_id(&store).await?;
    let now = Utc::now();

    let result = store
        .from("attendance")
        .insert(
            Row::new()
                .set("employee_id", employee_id)
                .set("date", now.date_naive())
                .set("status", AttendanceStatus::Present.as_ref())
                .set("check_in_time", now.time()),
        )
        .execute()
        .await;

    match result {
        Ok(_) => {}
        // a row for today exists; it only counts as a check-in once it has a time
        Err(e) if e.is_unique_violation() => {
            let filled = fill_marked_day(&store, employee_id, now)
                .execute()
                .await
                .map_err(|e| {
                    error!(error = %e, employee_id, "Check-in failed");
                    e
                })?;
            if filled == 0 {
                return Err(ApiError::bad_request("Already checked in today"));
            }
            info!(employee_id, "Checked in over a marked day");
        }
        Err(e) => {
            error!(error = %e, employee_id, "Check-in failed");
            return Err(e.into());
        }
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Checked in successfully"
    })))
}

/// Turns today's row into a check-in when a manager marked the day but no
/// check-in time was recorded.
fn fill_marked_day<'s>(store: &'s Store, employee_id: u64, now: DateTime<Utc>) -> Update<'s> {
    store
        .from("attendance")
        .update(
            Row::new()
                .set("status", AttendanceStatus::Present.as_ref())
                .set("check_in_time", now.time()),
        )
        .eq("employee_id", employee_id)
        .eq("date", now.date_naive())
        .is_null("check_in_time")
}

/// Check-out endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-out",
    responses(
        (status = 200, description = "Checked out successfully", body = Object, example = json!({
            "message": "Checked out successfully"
        })),
        (status = 400, description = "No active check-in found for today", body = Object, example = json!({
            "message": "No active check-in found for today"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_out(auth: AuthUser, store: web::Data<Store>) -> ApiResult<HttpResponse> {
    let employee_id = auth.employee_id(&store).await?;
    let now = Utc::now();

    let updated = store
        .from("attendance")
        .update(Row::new().set("check_out_time", now.time()))
        .eq("employee_id", employee_id)
        .eq("date", now.date_naive())
        .not_null("check_in_time")
        .is_null("check_out_time")
        .execute()
        .await
        .map_err(|e| {
            error!(error = %e, employee_id, "Check-out failed");
            e
        })?;

    if updated == 0 {
        return Err(ApiError::bad_request("No active check-in found for today"));
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Checked out successfully"
    })))
}

/// The caller's own attendance for a month, with per-status counts
#[utoipa::path(
    get,
    path = "/api/my-attendance",
    params(MonthQuery),
    responses(
        (status = 200, description = "Own attendance", body = MyAttendanceResponse),
        (status = 400, description = "Malformed month"),
        (status = 403, description = "No employee profile")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn my_attendance(
    auth: AuthUser,
    store: web::Data<Store>,
    query: web::Query<MonthQuery>,
) -> ApiResult<HttpResponse> {
    let month = match query.month.as_deref() {
        Some(m) => m.trim().to_string(),
        None => {
            let today = Utc::now().date_naive();
            format!("{:04}-{:02}", today.year(), today.month())
        }
    };
    let (start, end) = month_bounds(&month)?;

    let employee_id = auth.employee_id(&store).await?;

    let records = store
        .from("attendance")
        .select("id, employee_id, date, status, check_in_time, check_out_time")
        .eq("employee_id", employee_id)
        .gte("date", start)
        .lte("date", end)
        .order("date", Order::Desc)
        .fetch_all::<Attendance>()
        .await?;

    let stats = AttendanceTally::from_statuses(records.iter().map(|r| r.status.as_str()));

    Ok(HttpResponse::Ok().json(MyAttendanceResponse {
        month,
        records,
        stats,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{SqlValue, tests::lazy_store};

    #[actix_web::test]
    async fn check_in_fills_a_day_marked_without_a_time() {
        let store = lazy_store();
        let now = DateTime::<Utc>::from_timestamp(1_741_251_600, 0).unwrap(); // 2025-03-06 09:00:00
        let statement = fill_marked_day(&store, 12, now).statement().unwrap();

        assert_eq!(
            statement.sql,
            "UPDATE attendance SET status = ?, check_in_time = ? \
             WHERE employee_id = ? AND date = ? AND check_in_time IS NULL"
        );
        assert_eq!(
            statement.values,
            vec![
                SqlValue::String("present".into()),
                SqlValue::Time(NaiveTime::from_hms_opt(9, 0, 0).unwrap()),
                SqlValue::U64(12),
                SqlValue::Date(date(2025, 3, 6)),
            ]
        );
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_bounds_cover_the_whole_month() {
        assert_eq!(
            month_bounds("2024-02").unwrap(),
            (date(2024, 2, 1), date(2024, 2, 29))
        );
        assert_eq!(
            month_bounds("2025-12").unwrap(),
            (date(2025, 12, 1), date(2025, 12, 31))
        );
    }

    #[test]
    fn malformed_months_are_bad_requests() {
        for bad in ["2025-13", "March", "2025/03", ""] {
            assert!(matches!(month_bounds(bad), Err(ApiError::BadRequest(_))), "{bad}");
        }
    }

    #[test]
    fn present_without_times_gets_office_hours() {
        let mark = MarkAttendance {
            employee_id: 7,
            date: date(2025, 3, 3),
            status: AttendanceStatus::Present,
            check_in_time: None,
            check_out_time: None,
        };
        let values = mark.to_row().into_values().collect::<Vec<_>>();
        assert_eq!(values[3], SqlValue::Time(NaiveTime::from_hms_opt(9, 0, 0).unwrap()));
        assert_eq!(values[4], SqlValue::Time(NaiveTime::from_hms_opt(18, 0, 0).unwrap()));
    }

    #[test]
    fn absent_and_leave_clear_times() {
        for status in [AttendanceStatus::Absent, AttendanceStatus::Leave] {
            let mark = MarkAttendance {
                employee_id: 7,
                date: date(2025, 3, 3),
                status,
                check_in_time: NaiveTime::from_hms_opt(9, 30, 0),
                check_out_time: None,
            };
            let values = mark.to_row().into_values().collect::<Vec<_>>();
            assert_eq!(values[3], SqlValue::Null);
            assert_eq!(values[4], SqlValue::Null);
        }
    }

    #[test]
    fn explicit_times_win_for_half_days() {
        let mark = MarkAttendance {
            employee_id: 7,
            date: date(2025, 3, 3),
            status: AttendanceStatus::HalfDay,
            check_in_time: NaiveTime::from_hms_opt(13, 0, 0),
            check_out_time: None,
        };
        let values = mark.to_row().into_values().collect::<Vec<_>>();
        assert_eq!(values[2], SqlValue::String("half_day".into()));
        assert_eq!(values[3], SqlValue::Time(NaiveTime::from_hms_opt(13, 0, 0).unwrap()));
        assert_eq!(values[4], SqlValue::Null);
    }
}
