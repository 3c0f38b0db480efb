use derive_more::Display;

#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display(fmt = "{} cannot move from {} to {}", entity, from, to)]
pub struct TransitionError {
    pub entity: &'static str,
    pub from: String,
    pub to: String,
}

impl TransitionError {
    pub fn new(entity: &'static str, from: &str, to: &str) -> Self {
        Self {
            entity,
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

impl std::error::Error for TransitionError {}

/// A status column whose allowed moves form a fixed graph.
pub trait StateMachine: Copy + PartialEq + AsRef<str> {
    const ENTITY: &'static str;

    fn can_transition_to(self, next: Self) -> bool;

    fn transition(self, next: Self) -> Result<Self, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError::new(Self::ENTITY, self.as_ref(), next.as_ref()))
        }
    }

    fn is_terminal(self) -> bool;
}
