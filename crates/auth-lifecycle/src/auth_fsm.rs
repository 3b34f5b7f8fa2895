//! Session lifecycle state machine.
//!
//! Explicit finite state machine for the authentication lifecycle, so every
//! legal transition is declared in one place instead of being derived from
//! storage checks scattered across call sites.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐
//! │    LoggedOut    │ (initial)
//! └────────┬────────┘
//!          │ AuthAttempt / SessionRestored
//!          ▼
//! ┌─────────────────┐  AuthFailed
//! │  Authenticating │ ───────────► LoggedOut
//! └────────┬────────┘
//!          │ AuthSucceeded
//!          ▼
//! ┌─────────────────┐  SevereExpiry   ┌─────────────────┐
//! │      Valid      │ ──────────────► │ SeverelyExpired │ ─ Cleared ─► LoggedOut
//! └────────┬────────┘                 └─────────────────┘
//!          │ RefreshDue
//!          ▼
//! ┌─────────────────┐  RefreshSucceeded
//! │    Expiring     │ ───────────────► Valid
//! └────────┬────────┘
//!          │ RefreshFailed            │ RecoveryUnavailable ─► LoggedOut
//!          ▼
//! ┌───────────────────┐  RecoverySucceeded ─► Valid
//! │ RecoverableExpired│
//! └───────────────────┘  RecoveryFailed ────► LoggedOut
//!
//! LogoutRequested routes every state to LoggedOut.
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};

// Generates a module `session_machine` with State, Input, and StateMachine
// types for the declared transition table.
state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub session_machine(LoggedOut)

    LoggedOut => {
        AuthAttempt => Authenticating,
        SessionRestored => Authenticating,
        LogoutRequested => LoggedOut
    },
    Authenticating => {
        AuthSucceeded => Valid,
        AuthFailed => LoggedOut,
        LogoutRequested => LoggedOut
    },
    Valid => {
        RefreshDue => Expiring,
        SevereExpiry => SeverelyExpired,
        AuthAttempt => Authenticating,
        LogoutRequested => LoggedOut
    },
    Expiring => {
        RefreshSucceeded => Valid,
        RefreshFailed => RecoverableExpired,
        RecoveryUnavailable => LoggedOut,
        LogoutRequested => LoggedOut
    },
    RecoverableExpired => {
        RecoverySucceeded => Valid,
        RecoveryFailed => LoggedOut,
        LogoutRequested => LoggedOut
    },
    SeverelyExpired => {
        Cleared => LoggedOut,
        LogoutRequested => LoggedOut
    }
}

// Re-export the generated types with clearer names
pub use session_machine::Input as SessionMachineInput;
pub use session_machine::State as SessionMachineState;
pub use session_machine::StateMachine as SessionMachine;

/// Lifecycle state exposed to consumers.
///
/// A simplified serde-friendly view of the FSM state for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    /// No session.
    LoggedOut,
    /// A login, registration, OTP verification, or restore is in flight.
    Authenticating,
    /// Session present with comfortable remaining lifetime.
    Valid,
    /// Remaining lifetime dropped below the refresh threshold.
    Expiring,
    /// Refresh failed but one recovery attempt is still permitted.
    RecoverableExpired,
    /// Expired past the grace window; routes straight to LoggedOut.
    SeverelyExpired,
}

impl AuthState {
    /// Returns true while a usable session is held (valid or refreshing).
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Valid | AuthState::Expiring)
    }

    /// Returns true for in-progress states.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AuthState::Authenticating
                | AuthState::RecoverableExpired
                | AuthState::SeverelyExpired
        )
    }
}

impl From<&SessionMachineState> for AuthState {
    fn from(state: &SessionMachineState) -> Self {
        match state {
            SessionMachineState::LoggedOut => AuthState::LoggedOut,
            SessionMachineState::Authenticating => AuthState::Authenticating,
            SessionMachineState::Valid => AuthState::Valid,
            SessionMachineState::Expiring => AuthState::Expiring,
            SessionMachineState::RecoverableExpired => AuthState::RecoverableExpired,
            SessionMachineState::SeverelyExpired => AuthState::SeverelyExpired,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_logged_out() {
        let machine = SessionMachine::new();
        assert_eq!(*machine.state(), SessionMachineState::LoggedOut);
    }

    #[test]
    fn test_login_flow() {
        let mut machine = SessionMachine::new();

        machine.consume(&SessionMachineInput::AuthAttempt).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Authenticating);

        machine.consume(&SessionMachineInput::AuthSucceeded).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Valid);
    }

    #[test]
    fn test_failed_login_returns_to_logged_out() {
        let mut machine = SessionMachine::new();

        machine.consume(&SessionMachineInput::AuthAttempt).unwrap();
        machine.consume(&SessionMachineInput::AuthFailed).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::LoggedOut);
    }

    #[test]
    fn test_refresh_cycle() {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionMachineInput::AuthAttempt).unwrap();
        machine.consume(&SessionMachineInput::AuthSucceeded).unwrap();

        machine.consume(&SessionMachineInput::RefreshDue).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Expiring);

        machine
            .consume(&SessionMachineInput::RefreshSucceeded)
            .unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Valid);
    }

    #[test]
    fn test_recovery_path() {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionMachineInput::AuthAttempt).unwrap();
        machine.consume(&SessionMachineInput::AuthSucceeded).unwrap();
        machine.consume(&SessionMachineInput::RefreshDue).unwrap();

        machine.consume(&SessionMachineInput::RefreshFailed).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::RecoverableExpired);

        machine
            .consume(&SessionMachineInput::RecoveryFailed)
            .unwrap();
        assert_eq!(*machine.state(), SessionMachineState::LoggedOut);
    }

    #[test]
    fn test_recovery_success_returns_to_valid() {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionMachineInput::AuthAttempt).unwrap();
        machine.consume(&SessionMachineInput::AuthSucceeded).unwrap();
        machine.consume(&SessionMachineInput::RefreshDue).unwrap();
        machine.consume(&SessionMachineInput::RefreshFailed).unwrap();

        machine
            .consume(&SessionMachineInput::RecoverySucceeded)
            .unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Valid);
    }

    #[test]
    fn test_severe_expiry_routes_to_logged_out() {
        let mut machine = SessionMachine::new();
        machine.consume(&SessionMachineInput::AuthAttempt).unwrap();
        machine.consume(&SessionMachineInput::AuthSucceeded).unwrap();

        machine.consume(&SessionMachineInput::SevereExpiry).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::SeverelyExpired);

        machine.consume(&SessionMachineInput::Cleared).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::LoggedOut);
    }

    #[test]
    fn test_logout_from_every_state() {
        let setups: Vec<Vec<SessionMachineInput>> = vec![
            vec![],
            vec![SessionMachineInput::AuthAttempt],
            vec![
                SessionMachineInput::AuthAttempt,
                SessionMachineInput::AuthSucceeded,
            ],
            vec![
                SessionMachineInput::AuthAttempt,
                SessionMachineInput::AuthSucceeded,
                SessionMachineInput::RefreshDue,
            ],
            vec![
                SessionMachineInput::AuthAttempt,
                SessionMachineInput::AuthSucceeded,
                SessionMachineInput::RefreshDue,
                SessionMachineInput::RefreshFailed,
            ],
            vec![
                SessionMachineInput::AuthAttempt,
                SessionMachineInput::AuthSucceeded,
                SessionMachineInput::SevereExpiry,
            ],
        ];

        for inputs in setups {
            let mut machine = SessionMachine::new();
            for input in &inputs {
                machine.consume(input).unwrap();
            }
            machine
                .consume(&SessionMachineInput::LogoutRequested)
                .unwrap();
            assert_eq!(*machine.state(), SessionMachineState::LoggedOut);
        }
    }

    #[test]
    fn test_provider_ready_restore_path() {
        let mut machine = SessionMachine::new();

        machine
            .consume(&SessionMachineInput::SessionRestored)
            .unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Authenticating);

        machine.consume(&SessionMachineInput::AuthSucceeded).unwrap();
        assert_eq!(*machine.state(), SessionMachineState::Valid);
    }

    #[test]
    fn test_invalid_transition_is_rejected() {
        let mut machine = SessionMachine::new();
        assert!(machine
            .consume(&SessionMachineInput::RefreshSucceeded)
            .is_err());
        assert!(machine.consume(&SessionMachineInput::AuthSucceeded).is_err());
    }

    #[test]
    fn test_auth_state_helpers() {
        assert!(AuthState::Valid.is_authenticated());
        assert!(AuthState::Expiring.is_authenticated());
        assert!(!AuthState::LoggedOut.is_authenticated());
        assert!(!AuthState::Authenticating.is_authenticated());

        assert!(AuthState::Authenticating.is_transient());
        assert!(AuthState::SeverelyExpired.is_transient());
        assert!(!AuthState::Valid.is_transient());
    }
}
