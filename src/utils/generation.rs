use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counter used to discard results that were requested before the
/// most recent invalidation.
#[derive(Debug, Default)]
pub struct Generation(AtomicU64);

impl Generation {
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Invalidates every ticket taken so far.
    pub fn bump(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn is_current(&self, ticket: u64) -> bool {
        self.current() == ticket
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tickets_go_stale_after_a_bump() {
        let generation = Generation::default();
        let ticket = generation.current();
        assert!(generation.is_current(ticket));

        generation.bump();
        assert!(!generation.is_current(ticket));
        assert!(generation.is_current(generation.current()));
    }
}
