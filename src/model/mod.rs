pub mod attendance;
pub mod department;
pub mod employee;
pub mod leave_request;
pub mod payroll;
pub mod profile;
pub mod role;
pub mod transition;
pub mod user;
