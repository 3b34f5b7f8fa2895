//! Session and authentication lifecycle for the Counterline terminal.
//!
//! This crate provides:
//! - The session model and its persisted record form
//! - `SessionManager` for save/load/clear and expiry policy
//! - An explicit FSM-based lifecycle state machine
//! - `AuthCoordinator` orchestrating login, registration, OTP, refresh,
//!   health checks, and provider reconciliation
//! - The `IdentityProviderClient` seam plus its Supabase implementation
//! - The zero-payload `SessionChanged` notification hub

mod auth_fsm;
mod clock;
mod coordinator;
mod error;
mod events;
mod manager;
mod provider;
mod session;
mod supabase;

pub use auth_fsm::session_machine;
pub use auth_fsm::{AuthState, SessionMachine, SessionMachineInput, SessionMachineState};
pub use clock::{Clock, SystemClock};
pub use coordinator::{AuthCoordinator, AuthSnapshot, DEFAULT_HEALTH_CHECK_INTERVAL};
pub use error::{AuthError, AuthResult};
pub use events::SessionChangedHub;
pub use manager::{
    SessionManager, PERSISTENT_REFRESH_THRESHOLD_SECS, SEVERE_EXPIRY_GRACE_DAYS,
    STANDARD_REFRESH_THRESHOLD_SECS,
};
pub use provider::IdentityProviderClient;
pub use session::{Session, SessionRecord, SessionUser};
pub use supabase::SupabaseIdentityClient;
