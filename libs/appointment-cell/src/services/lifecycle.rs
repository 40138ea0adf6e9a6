// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus};

/// The ledger's state machine: `upcoming` is the only live state;
/// `completed` and `cancelled` are terminal. Every mutation path
/// (self-cancel, cascade, payment-timeout reaper, completion) funnels
/// through `validate_transition` so the rule set cannot drift apart.
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    pub fn valid_transitions(&self, current: &AppointmentStatus) -> Vec<AppointmentStatus> {
        match current {
            AppointmentStatus::Upcoming => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
            ],
            // Terminal states
            AppointmentStatus::Completed => vec![],
            AppointmentStatus::Cancelled => vec![],
        }
    }

    pub fn validate_transition(
        &self,
        current: &AppointmentStatus,
        next: &AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition {} -> {}", current, next);

        if !self.valid_transitions(current).contains(next) {
            warn!("Invalid status transition attempted: {} -> {}", current, next);
            return Err(AppointmentError::InvalidTransition { current: *current });
        }

        Ok(())
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn upcoming_can_complete_or_cancel() {
        let lifecycle = AppointmentLifecycleService::new();
        assert!(lifecycle
            .validate_transition(&AppointmentStatus::Upcoming, &AppointmentStatus::Completed)
            .is_ok());
        assert!(lifecycle
            .validate_transition(&AppointmentStatus::Upcoming, &AppointmentStatus::Cancelled)
            .is_ok());
    }

    #[test]
    fn terminal_states_reject_every_transition() {
        let lifecycle = AppointmentLifecycleService::new();
        assert!(!AppointmentStatus::Upcoming.is_terminal());
        for terminal in [AppointmentStatus::Completed, AppointmentStatus::Cancelled] {
            assert!(terminal.is_terminal());
            for next in [
                AppointmentStatus::Upcoming,
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
            ] {
                assert_matches!(
                    lifecycle.validate_transition(&terminal, &next),
                    Err(AppointmentError::InvalidTransition { current }) if current == terminal
                );
            }
        }
    }

    #[test]
    fn upcoming_cannot_loop_back_to_itself() {
        let lifecycle = AppointmentLifecycleService::new();
        assert_matches!(
            lifecycle.validate_transition(&AppointmentStatus::Upcoming, &AppointmentStatus::Upcoming),
            Err(AppointmentError::InvalidTransition { .. })
        );
    }
}
