use crate::api::attendance::{MarkAttendance, MyAttendanceResponse, RosterResponse};
use crate::api::dashboard::{DashboardResponse, DashboardStats};
use crate::api::department::DepartmentPayload;
use crate::api::employee::{CreateEmployee, EmployeeListResponse, EmployeeQuery};
use crate::api::leave_request::{CreateLeave, LeaveFilter, LeaveListResponse};
use crate::api::navigation::{NavItem, NavigationResponse};
use crate::api::payroll::{
    CreatePayroll, GeneratePayroll, GenerationSummary, MyPayrollResponse, PayrollListResponse,
    PayrollQuery, UpdatePayroll, UpdatePayrollStatus,
};
use crate::api::profile::{ProfileResponse, UpdateProfile};
use crate::api::user_role::AssignRole;
use crate::auth::handlers::{SessionResponse, TokenPair};
use crate::model::attendance::{Attendance, AttendanceStatus, AttendanceTally, RosterEntry};
use crate::model::department::Department;
use crate::model::employee::{Employee, EmployeeStatus};
use crate::model::leave_request::{LeaveRequest, LeaveStatus, LeaveType};
use crate::model::payroll::{Payroll, PayrollStatus};
use crate::model::profile::Profile;
use crate::model::role::Role;
use crate::models::{SignInReq, SignUpReq};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Staffdesk API",
        version = "1.0.0",
        description = r#"
## Staffdesk

Role-based HR back office: one session, three portals.

### Roles
- **Admin**: everything, including payroll, departments and role assignment
- **HR**: employee roster, attendance marking and leave review
- **Employee**: self-service attendance, payslips, leave requests and profile

### Security
All `/api` endpoints expect a **JWT Bearer** access token obtained from `/auth/sign-in`.
Roles are looked up on every request, so an assignment takes effect immediately.

### Response Format
- JSON bodies; errors carry a `message` field
- Pagination (`page`, `per_page`) on list endpoints
"#,
    ),
    paths(
        crate::auth::handlers::sign_up,
        crate::auth::handlers::sign_in,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::sign_out,
        crate::auth::handlers::session,

        crate::api::dashboard::dashboard,
        crate::api::navigation::navigation,

        crate::api::employee::create_employee,
        crate::api::employee::get_employee,
        crate::api::employee::list_employees,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee,

        crate::api::department::list_departments,
        crate::api::department::create_department,
        crate::api::department::update_department,
        crate::api::department::delete_department,

        crate::api::attendance::roster,
        crate::api::attendance::mark_attendance,
        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::my_attendance,

        crate::api::leave_request::leave_list,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::create_leave,
        crate::api::leave_request::my_leaves,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,

        crate::api::payroll::list_payrolls,
        crate::api::payroll::get_payroll,
        crate::api::payroll::create_payroll,
        crate::api::payroll::update_payroll,
        crate::api::payroll::update_payroll_status,
        crate::api::payroll::generate_payroll,
        crate::api::payroll::my_payroll,

        crate::api::profile::get_profile,
        crate::api::profile::update_profile,
        crate::api::user_role::assign_role
    ),
    components(
        schemas(
            SignUpReq,
            SignInReq,
            TokenPair,
            SessionResponse,
            Role,
            Profile,
            NavItem,
            NavigationResponse,
            DashboardStats,
            DashboardResponse,
            Employee,
            EmployeeStatus,
            CreateEmployee,
            EmployeeQuery,
            EmployeeListResponse,
            Department,
            DepartmentPayload,
            Attendance,
            AttendanceStatus,
            AttendanceTally,
            RosterEntry,
            RosterResponse,
            MarkAttendance,
            MyAttendanceResponse,
            LeaveRequest,
            LeaveType,
            LeaveStatus,
            CreateLeave,
            LeaveFilter,
            LeaveListResponse,
            Payroll,
            PayrollStatus,
            CreatePayroll,
            UpdatePayroll,
            UpdatePayrollStatus,
            GeneratePayroll,
            GenerationSummary,
            PayrollQuery,
            PayrollListResponse,
            MyPayrollResponse,
            ProfileResponse,
            UpdateProfile,
            AssignRole
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Sign-up, sign-in and token refresh"),
        (name = "Session", description = "Current principal, navigation and role assignment"),
        (name = "Dashboard", description = "Headline statistics"),
        (name = "Employee", description = "Employee management APIs"),
        (name = "Department", description = "Department management APIs"),
        (name = "Attendance", description = "Attendance management APIs"),
        (name = "Leave", description = "Leave management APIs"),
        (name = "Payroll", description = "Payroll management APIs"),
        (name = "Profile", description = "Own profile"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_portal_and_the_bearer_scheme() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        for path in [
            "/auth/sign-in",
            "/api/dashboard",
            "/api/payroll/generate",
            "/api/my-leaves",
            "/api/users/{user_id}/role",
        ] {
            assert!(paths.contains_key(path), "missing {}", path);
        }
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
