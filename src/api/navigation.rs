use actix_web::HttpResponse;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{auth::auth::AuthUser, model::role::Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct NavItem {
    #[schema(example = "Dashboard")]
    pub label: &'static str,
    #[schema(example = "/dashboard")]
    pub path: &'static str,
}

const fn item(label: &'static str, path: &'static str) -> NavItem {
    NavItem { label, path }
}

const ADMIN_NAV: [NavItem; 6] = [
    item("Dashboard", "/dashboard"),
    item("Employees", "/employees"),
    item("Attendance", "/attendance"),
    item("Payroll", "/payroll"),
    item("Departments", "/departments"),
    item("Leave Requests", "/leaves"),
];

const HR_NAV: [NavItem; 4] = [
    item("Dashboard", "/dashboard"),
    item("Employees", "/employees"),
    item("Attendance", "/attendance"),
    item("Leave Requests", "/leaves"),
];

const EMPLOYEE_NAV: [NavItem; 4] = [
    item("Dashboard", "/dashboard"),
    item("My Attendance", "/my-attendance"),
    item("My Payroll", "/my-payroll"),
    item("My Leaves", "/my-leaves"),
];

/// Sidebar entries a role may see.
pub fn nav_items(role: Role) -> &'static [NavItem] {
    match role {
        Role::Admin => &ADMIN_NAV,
        Role::Hr => &HR_NAV,
        Role::Employee => &EMPLOYEE_NAV,
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NavigationResponse {
    pub role: Role,
    #[schema(example = "admin Portal")]
    pub portal: String,
    pub email: String,
    pub items: Vec<NavItem>,
}

#[utoipa::path(
    get,
    path = "/api/navigation",
    responses(
        (status = 200, description = "Role-gated sidebar", body = NavigationResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Session"
)]
pub async fn navigation(auth: AuthUser) -> HttpResponse {
    HttpResponse::Ok().json(NavigationResponse {
        role: auth.role,
        portal: format!("{} Portal", auth.role),
        email: auth.email,
        items: nav_items(auth.role).to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(role: Role) -> Vec<&'static str> {
        nav_items(role).iter().map(|i| i.path).collect()
    }

    #[test]
    fn only_admins_see_payroll_and_departments() {
        assert!(paths(Role::Admin).contains(&"/payroll"));
        assert!(paths(Role::Admin).contains(&"/departments"));
        assert!(!paths(Role::Hr).contains(&"/payroll"));
        assert!(!paths(Role::Hr).contains(&"/departments"));
    }

    #[test]
    fn employees_get_self_service_pages_only() {
        assert_eq!(
            paths(Role::Employee),
            vec!["/dashboard", "/my-attendance", "/my-payroll", "/my-leaves"]
        );
    }

    #[test]
    fn every_role_starts_at_the_dashboard() {
        for role in [Role::Admin, Role::Hr, Role::Employee] {
            assert_eq!(nav_items(role)[0].path, "/dashboard");
        }
    }
}
