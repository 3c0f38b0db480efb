use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, AsRefStr, Display, EnumIter, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    HalfDay,
    Leave,
}

impl AttendanceStatus {
    /// Office hours recorded when a manager marks someone present without
    /// giving explicit times.
    pub fn default_times(self) -> (Option<NaiveTime>, Option<NaiveTime>) {
        match self {
            AttendanceStatus::Present => (
                NaiveTime::from_hms_opt(9, 0, 0),
                NaiveTime::from_hms_opt(18, 0, 0),
            ),
            _ => (None, None),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Attendance {
    pub id: u64,
    pub employee_id: u64,
    #[schema(example = "2025-03-01", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "present")]
    pub status: String,
    #[schema(example = "09:00:00", value_type = Option<String>)]
    pub check_in_time: Option<NaiveTime>,
    #[schema(example = "18:00:00", value_type = Option<String>)]
    pub check_out_time: Option<NaiveTime>,
}

/// One line of the daily roster: an active employee and whatever was marked
/// for them that day.
#[derive(Debug, Serialize, FromRow, ToSchema)]
pub struct RosterEntry {
    pub employee_id: u64,
    pub employee_code: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub attendance_id: Option<u64>,
    /// Unmarked days read as absent.
    #[schema(example = "absent")]
    pub status: String,
    #[schema(value_type = Option<String>)]
    pub check_in_time: Option<NaiveTime>,
    #[schema(value_type = Option<String>)]
    pub check_out_time: Option<NaiveTime>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct AttendanceTally {
    pub present: u32,
    pub absent: u32,
    pub half_day: u32,
    pub leave: u32,
}

impl AttendanceTally {
    pub fn record(&mut self, status: AttendanceStatus) {
        match status {
            AttendanceStatus::Present => self.present += 1,
            AttendanceStatus::Absent => self.absent += 1,
            AttendanceStatus::HalfDay => self.half_day += 1,
            AttendanceStatus::Leave => self.leave += 1,
        }
    }

    /// Tallies stored status strings; unknown values are skipped.
    pub fn from_statuses<'a>(statuses: impl IntoIterator<Item = &'a str>) -> Self {
        let mut tally = Self::default();
        for status in statuses {
            if let Ok(s) = AttendanceStatus::from_str(status) {
                tally.record(s);
            }
        }
        tally
    }

    /// Days that earn salary: presence and leave in full, half days by half.
    pub fn paid_days(&self) -> f64 {
        self.present as f64 + self.leave as f64 + self.half_day as f64 * 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_use_snake_case_names() {
        assert_eq!(AttendanceStatus::HalfDay.as_ref(), "half_day");
        assert_eq!(
            AttendanceStatus::from_str("half_day").unwrap(),
            AttendanceStatus::HalfDay
        );
        let json = serde_json::to_string(&AttendanceStatus::HalfDay).unwrap();
        assert_eq!(json, "\"half_day\"");
    }

    #[test]
    fn only_present_gets_office_hours() {
        let (check_in, check_out) = AttendanceStatus::Present.default_times();
        assert_eq!(check_in, NaiveTime::from_hms_opt(9, 0, 0));
        assert_eq!(check_out, NaiveTime::from_hms_opt(18, 0, 0));
        assert_eq!(AttendanceStatus::Absent.default_times(), (None, None));
        assert_eq!(AttendanceStatus::Leave.default_times(), (None, None));
    }

    #[test]
    fn tally_counts_each_status() {
        let tally = AttendanceTally::from_statuses([
            "present", "present", "absent", "half_day", "leave", "bogus",
        ]);
        assert_eq!(
            tally,
            AttendanceTally {
                present: 2,
                absent: 1,
                half_day: 1,
                leave: 1
            }
        );
        assert_eq!(tally.paid_days(), 3.5);
    }
}
