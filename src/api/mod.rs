pub mod attendance;
pub mod dashboard;
pub mod department;
pub mod employee;
pub mod leave_request;
pub mod navigation;
pub mod payroll;
pub mod profile;
pub mod user_role;

/// Normalized `(page, per_page, offset)` for list endpoints. Pages start at 1.
pub(crate) fn page_window(page: Option<u32>, per_page: Option<u32>, default: u32) -> (u32, u32, u64) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(default).clamp(1, 100);
    let offset = (page as u64 - 1) * per_page as u64;
    (page, per_page, offset)
}

#[cfg(test)]
mod tests {
    use super::page_window;

    #[test]
    fn pages_are_one_based_and_clamped() {
        assert_eq!(page_window(None, None, 20), (1, 20, 0));
        assert_eq!(page_window(Some(0), Some(500), 20), (1, 100, 0));
        assert_eq!(page_window(Some(3), Some(10), 20), (3, 10, 20));
        assert_eq!(page_window(Some(2), Some(0), 20), (2, 1, 1));
    }
}
