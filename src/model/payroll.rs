use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

use super::attendance::AttendanceTally;
use super::transition::StateMachine;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, AsRefStr, Display, EnumIter, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PayrollStatus {
    Draft,
    Approved,
    Paid,
}

impl StateMachine for PayrollStatus {
    const ENTITY: &'static str = "payroll";

    fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (PayrollStatus::Draft, PayrollStatus::Approved)
                | (PayrollStatus::Approved, PayrollStatus::Paid)
        )
    }

    fn is_terminal(self) -> bool {
        self == PayrollStatus::Paid
    }
}

impl PayrollStatus {
    /// Amounts may only change while the record is a draft.
    pub fn is_editable(self) -> bool {
        self == PayrollStatus::Draft
    }
}

pub const PAYROLL_COLUMNS: &str = "pr.id, pr.employee_id, pr.month, pr.year, pr.base_salary, \
     pr.allowances, pr.deductions, pr.net_salary, pr.working_days, pr.present_days, pr.status, \
     e.employee_code, p.first_name, p.last_name";

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Payroll {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1001)]
    pub employee_id: u64,
    #[schema(example = 3)]
    pub month: u8,
    #[schema(example = 2025)]
    pub year: u16,
    #[schema(example = 50000.0)]
    pub base_salary: f64,
    #[schema(example = 5000.0)]
    pub allowances: f64,
    #[schema(example = 2000.0)]
    pub deductions: f64,
    #[schema(example = 53000.0)]
    pub net_salary: f64,
    #[schema(example = 21)]
    pub working_days: u32,
    #[schema(example = 20.5)]
    pub present_days: f64,
    #[schema(example = "draft")]
    pub status: String,

    pub employee_code: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

pub fn net_salary(base_salary: f64, allowances: f64, deductions: f64) -> f64 {
    round_cents(base_salary + allowances - deductions)
}

/// Monday to Friday days in the month. `None` for an invalid month.
pub fn working_days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let days = first
        .iter_days()
        .take_while(|d| d.month() == month)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .count();
    Some(days as u32)
}

/// Draft figures for one employee and period, derived from attendance.
#[derive(Debug, Clone, PartialEq)]
pub struct PayrollDraft {
    pub base_salary: f64,
    pub allowances: f64,
    pub deductions: f64,
    pub net_salary: f64,
    pub working_days: u32,
    pub present_days: f64,
}

impl PayrollDraft {
    /// Unpaid days are the working days not covered by presence or approved
    /// leave; each costs a day's share of the base salary.
    pub fn from_attendance(base_salary: f64, working_days: u32, tally: &AttendanceTally) -> Self {
        let paid_days = tally.paid_days();
        let deductions = if working_days == 0 {
            0.0
        } else {
            let unpaid = (working_days as f64 - paid_days).max(0.0);
            round_cents(base_salary / working_days as f64 * unpaid)
        };

        Self {
            base_salary,
            allowances: 0.0,
            deductions,
            net_salary: net_salary(base_salary, 0.0, deductions),
            working_days,
            present_days: tally.present as f64 + tally.half_day as f64 * 0.5,
        }
    }

    /// Carries allowances over from an existing draft.
    pub fn with_allowances(mut self, allowances: f64) -> Self {
        self.allowances = allowances;
        self.net_salary = net_salary(self.base_salary, allowances, self.deductions);
        self
    }
}
