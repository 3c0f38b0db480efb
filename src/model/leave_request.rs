use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

use super::transition::StateMachine;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, AsRefStr, Display, EnumIter, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveType {
    Sick,
    Casual,
    Vacation,
    Personal,
}

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, AsRefStr, Display, EnumIter, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

impl StateMachine for LeaveStatus {
    const ENTITY: &'static str = "leave request";

    fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (LeaveStatus::Pending, LeaveStatus::Approved)
                | (LeaveStatus::Pending, LeaveStatus::Rejected)
        )
    }

    fn is_terminal(self) -> bool {
        !matches!(self, LeaveStatus::Pending)
    }
}

/// Columns selected for every leave listing, with the requesting employee
/// and the reviewer embedded.
pub const LEAVE_COLUMNS: &str = "l.id, l.employee_id, l.leave_type, l.start_date, l.end_date, \
     l.reason, l.status, l.reviewed_by, l.reviewed_at, l.created_at, \
     e.employee_code, p.first_name, p.last_name, \
     r.first_name AS reviewer_first_name, r.last_name AS reviewer_last_name";

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LeaveRequest {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = "sick")]
    pub leave_type: String,
    #[schema(example = "2025-03-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2025-03-03", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "flu")]
    pub reason: String,
    #[schema(example = "pending")]
    pub status: String,
    pub reviewed_by: Option<u64>,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[schema(format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,

    #[schema(example = "EMP-001")]
    pub employee_code: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub reviewer_first_name: Option<String>,
    pub reviewer_last_name: Option<String>,
}

/// Inclusive number of calendar days covered by a leave range.
pub fn leave_days(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days() + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn pending_moves_to_approved_or_rejected() {
        assert_eq!(
            LeaveStatus::Pending.transition(LeaveStatus::Approved),
            Ok(LeaveStatus::Approved)
        );
        assert_eq!(
            LeaveStatus::Pending.transition(LeaveStatus::Rejected),
            Ok(LeaveStatus::Rejected)
        );
    }

    #[test]
    fn nothing_returns_to_pending() {
        for from in LeaveStatus::iter() {
            assert!(from.transition(LeaveStatus::Pending).is_err());
        }
    }

    #[test]
    fn reviewed_requests_are_final() {
        for from in [LeaveStatus::Approved, LeaveStatus::Rejected] {
            assert!(from.is_terminal());
            for to in LeaveStatus::iter() {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn leave_types_parse_from_form_values() {
        assert_eq!(LeaveType::from_str("sick").unwrap(), LeaveType::Sick);
        assert_eq!(LeaveType::from_str("vacation").unwrap(), LeaveType::Vacation);
        assert!(LeaveType::from_str("sabbatical").is_err());
    }

    #[test]
    fn leave_days_are_inclusive() {
        let start = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        assert_eq!(leave_days(start, end), 3);
        assert_eq!(leave_days(start, start), 1);
    }
}
