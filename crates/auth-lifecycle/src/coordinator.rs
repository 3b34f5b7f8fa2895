//! Authentication coordinator.
//!
//! Owns the session lifecycle state machine: login/registration/OTP flows,
//! the periodic health check, serialized refresh, reconciliation with an
//! identity provider that may initialize asynchronously, and the
//! `SessionChanged` notification.

use crate::auth_fsm::{AuthState, SessionMachine, SessionMachineInput, SessionMachineState};
use crate::clock::Clock;
use crate::events::SessionChangedHub;
use crate::manager::{SessionManager, SEVERE_EXPIRY_GRACE_DAYS};
use crate::provider::IdentityProviderClient;
use crate::session::{Session, SessionUser};
use crate::{AuthError, AuthResult};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Default period of the health-check timer.
pub const DEFAULT_HEALTH_CHECK_INTERVAL: std::time::Duration =
    std::time::Duration::from_secs(300);

/// Table consulted to decide whether a verified user already belongs to an
/// organization.
const ORG_MEMBERSHIP_TABLE: &str = "organization_members";

/// Snapshot of authentication state for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSnapshot {
    pub authenticated: bool,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub state: AuthState,
}

/// The session lifecycle owner.
///
/// All dependencies are constructor-injected: the session manager (which
/// carries the store and clock), the identity provider client, and the
/// clock for health-check arithmetic.
pub struct AuthCoordinator {
    manager: SessionManager,
    provider: Arc<dyn IdentityProviderClient>,
    clock: Arc<dyn Clock>,
    fsm: Mutex<SessionMachine>,
    hub: SessionChangedHub,
    /// Serializes refresh operations: holders of the gate perform the
    /// provider call; waiters observe the completed outcome instead.
    refresh_gate: tokio::sync::Mutex<()>,
    refresh_generation: AtomicU64,
    last_refresh_succeeded: AtomicBool,
    /// Incremented by logout; a refresh result from an older epoch is
    /// discarded rather than resurrecting a cleared session.
    logout_epoch: AtomicU64,
    provider_ready: AtomicBool,
    reconciled: AtomicBool,
}

impl AuthCoordinator {
    pub fn new(
        manager: SessionManager,
        provider: Arc<dyn IdentityProviderClient>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let provider_ready = provider.is_ready();
        Self {
            manager,
            provider,
            clock,
            fsm: Mutex::new(SessionMachine::new()),
            hub: SessionChangedHub::new(),
            refresh_gate: tokio::sync::Mutex::new(()),
            refresh_generation: AtomicU64::new(0),
            last_refresh_succeeded: AtomicBool::new(false),
            logout_epoch: AtomicU64::new(0),
            provider_ready: AtomicBool::new(provider_ready),
            reconciled: AtomicBool::new(false),
        }
    }

    /// Register a `SessionChanged` subscriber.
    pub fn subscribe(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.hub.subscribe(callback);
    }

    /// Current lifecycle state.
    pub fn state(&self) -> AuthState {
        let fsm = self.fsm.lock().unwrap();
        AuthState::from(fsm.state())
    }

    /// Apply an FSM input, ignoring transitions that are illegal from the
    /// current state (background paths must never fail on bookkeeping).
    fn apply(&self, input: &SessionMachineInput) -> AuthState {
        let mut fsm = self.fsm.lock().unwrap();
        let before = AuthState::from(fsm.state());
        if fsm.consume(input).is_err() {
            debug!(?input, state = ?fsm.state(), "Ignoring illegal session transition");
        }
        let after = AuthState::from(fsm.state());
        if before != after {
            debug!(from = ?before, to = ?after, "Session state transition");
        }
        after
    }

    /// Walk the FSM to `Valid` when a persisted record exists but the
    /// machine still reads `LoggedOut` (process restart, re-login races).
    fn mark_session_tracked(&self) {
        let mut fsm = self.fsm.lock().unwrap();
        if matches!(fsm.state(), SessionMachineState::LoggedOut) {
            let _ = fsm.consume(&SessionMachineInput::SessionRestored);
            let _ = fsm.consume(&SessionMachineInput::AuthSucceeded);
        }
    }

    // ==========================================
    // Login / registration / OTP
    // ==========================================

    /// Email/password login.
    ///
    /// Returns `Ok(None)` when the provider answered without a usable
    /// session; local state is untouched in that case.
    pub async fn login_with_email(
        &self,
        email: &str,
        password: &str,
        remember: bool,
    ) -> AuthResult<Option<Session>> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "email and password are required".to_string(),
            ));
        }

        self.apply(&SessionMachineInput::AuthAttempt);
        match self.provider.sign_in_password(email, password).await {
            Ok(Some(session)) if session.is_usable() => {
                self.adopt_session(&session, remember, false);
                Ok(Some(session))
            }
            Ok(_) => {
                self.apply(&SessionMachineInput::AuthFailed);
                Ok(None)
            }
            Err(e) => {
                self.apply(&SessionMachineInput::AuthFailed);
                Err(e)
            }
        }
    }

    /// Email/password registration. Marks the user as new.
    pub async fn register_with_email(
        &self,
        email: &str,
        password: &str,
        remember: bool,
    ) -> AuthResult<Option<Session>> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "email and password are required".to_string(),
            ));
        }

        self.apply(&SessionMachineInput::AuthAttempt);
        match self.provider.sign_up(email, password).await {
            Ok(Some(session)) if session.is_usable() => {
                self.adopt_session(&session, remember, true);
                Ok(Some(session))
            }
            Ok(_) => {
                self.apply(&SessionMachineInput::AuthFailed);
                Ok(None)
            }
            Err(e) => {
                self.apply(&SessionMachineInput::AuthFailed);
                Err(e)
            }
        }
    }

    /// Request an SMS one-time password. The phone number must be E.164.
    pub async fn request_login_otp(&self, phone: &str) -> AuthResult<()> {
        if !is_valid_e164(phone) {
            return Err(AuthError::Validation(format!(
                "phone number must be E.164 (got {})",
                mask_phone(phone)
            )));
        }

        info!(phone = %mask_phone(phone), "Requesting login OTP");
        self.provider.request_otp(phone).await
    }

    /// Verify an SMS one-time password.
    ///
    /// On success the new-user state is decided by an organization
    /// membership query and persisted with the session.
    pub async fn verify_login_otp(
        &self,
        phone: &str,
        code: &str,
        remember: bool,
    ) -> AuthResult<Option<Session>> {
        if !is_valid_e164(phone) {
            return Err(AuthError::Validation(format!(
                "phone number must be E.164 (got {})",
                mask_phone(phone)
            )));
        }
        if code.trim().is_empty() {
            return Err(AuthError::Validation("verification code is required".to_string()));
        }

        self.apply(&SessionMachineInput::AuthAttempt);
        match self.provider.verify_otp(phone, code).await {
            Ok(Some(session)) if session.is_usable() => {
                let is_new_user = self.user_is_new(&session).await;
                self.adopt_session(&session, remember, is_new_user);
                Ok(Some(session))
            }
            Ok(_) => {
                self.apply(&SessionMachineInput::AuthFailed);
                Ok(None)
            }
            Err(e) => {
                self.apply(&SessionMachineInput::AuthFailed);
                Err(e)
            }
        }
    }

    fn adopt_session(&self, session: &Session, remember: bool, is_new_user: bool) {
        if let Err(e) = self.manager.save_session(session, remember) {
            warn!(error = %e, "Session persistence failed; continuing unpersisted");
        }
        if let Err(e) = self.manager.set_user_new_state(is_new_user) {
            warn!(error = %e, "Failed to persist new-user flag");
        }
        self.apply(&SessionMachineInput::AuthSucceeded);
        info!(user_id = %session.user.id, is_new_user, "Authenticated");
        self.hub.emit();
    }

    async fn user_is_new(&self, session: &Session) -> bool {
        let query = format!("user_id=eq.{}&select=id&limit=1", session.user.id);
        match self
            .provider
            .query_rows(ORG_MEMBERSHIP_TABLE, &query, &session.access_token)
            .await
        {
            Ok(rows) => rows.is_empty(),
            Err(e) => {
                warn!(error = %e, "Organization membership check failed, assuming existing user");
                false
            }
        }
    }

    // ==========================================
    // Refresh
    // ==========================================

    /// Refresh the session against the provider.
    ///
    /// No-op returning `Ok(false)` when the provider is not ready, no
    /// session is persisted, or the record has no refresh token. At most
    /// one provider call is in flight at a time: a caller that waited
    /// while another refresh ran observes that outcome instead of issuing
    /// a duplicate request.
    pub async fn refresh_session(&self) -> AuthResult<bool> {
        if !self.provider_ready.load(Ordering::SeqCst) {
            debug!("Refresh skipped: provider not ready");
            return Ok(false);
        }
        let Some(record) = self.manager.load_session() else {
            return Ok(false);
        };
        if record.session.refresh_token.is_empty() {
            debug!("Refresh skipped: no refresh token");
            return Ok(false);
        }

        let epoch = self.logout_epoch.load(Ordering::SeqCst);
        let generation = self.refresh_generation.load(Ordering::SeqCst);
        let _gate = self.refresh_gate.lock().await;
        if self.refresh_generation.load(Ordering::SeqCst) != generation {
            let outcome = self.last_refresh_succeeded.load(Ordering::SeqCst);
            debug!(outcome, "Observed concurrent refresh instead of duplicating it");
            return Ok(outcome);
        }

        let result = self
            .provider
            .refresh_session(&record.session.refresh_token)
            .await;
        self.refresh_generation.fetch_add(1, Ordering::SeqCst);

        match result {
            Ok(Some(session)) if session.is_usable() => {
                if self.logout_epoch.load(Ordering::SeqCst) != epoch {
                    debug!("Discarding refresh result that arrived after logout");
                    self.last_refresh_succeeded.store(false, Ordering::SeqCst);
                    return Ok(false);
                }
                if let Err(e) = self.manager.save_session(&session, record.is_persistent) {
                    warn!(error = %e, "Failed to persist refreshed session");
                }
                self.last_refresh_succeeded.store(true, Ordering::SeqCst);
                self.apply(&SessionMachineInput::RefreshSucceeded);
                info!(user_id = %session.user.id, "Session refreshed");
                self.hub.emit();
                Ok(true)
            }
            Ok(_) => {
                self.last_refresh_succeeded.store(false, Ordering::SeqCst);
                warn!("Provider returned no usable session on refresh");
                Ok(false)
            }
            Err(e) => {
                self.last_refresh_succeeded.store(false, Ordering::SeqCst);
                warn!(error = %e, transient = e.is_transient(), "Refresh failed");
                Err(e)
            }
        }
    }

    // ==========================================
    // Health check
    // ==========================================

    /// Periodic health validation.
    ///
    /// Fully contained: never raises past its own boundary. Worst case it
    /// clears the session and emits `SessionChanged`.
    pub async fn validate_health(&self) {
        let Some(record) = self.manager.load_session() else {
            return;
        };
        self.mark_session_tracked();

        let Some(expiry) = record
            .absolute_expiry_utc
            .or_else(|| record.session.computed_expiry_utc())
        else {
            debug!("Session has no derivable expiry, skipping health check");
            return;
        };

        let remaining = expiry - self.clock.now_utc();

        if remaining < -Duration::days(SEVERE_EXPIRY_GRACE_DAYS) {
            info!(
                expired_days = (-remaining).num_days(),
                "Session expired beyond the grace window, clearing"
            );
            self.apply(&SessionMachineInput::SevereExpiry);
            self.apply(&SessionMachineInput::Cleared);
            self.manager.clear_session();
            self.hub.emit();
            return;
        }

        if remaining.num_seconds() >= self.manager.refresh_threshold_secs() {
            return;
        }

        debug!(
            remaining_secs = remaining.num_seconds(),
            "Session below refresh threshold"
        );
        self.apply(&SessionMachineInput::RefreshDue);

        if matches!(self.refresh_session().await, Ok(true)) {
            return;
        }

        let recoverable = !record.session.refresh_token.is_empty()
            && record.is_persistent
            && remaining >= -Duration::days(SEVERE_EXPIRY_GRACE_DAYS);

        if !recoverable {
            warn!("Refresh failed with no recovery available, clearing session");
            self.apply(&SessionMachineInput::RecoveryUnavailable);
            self.manager.clear_session();
            self.hub.emit();
            return;
        }

        self.apply(&SessionMachineInput::RefreshFailed);
        warn!("Refresh failed, attempting one recovery refresh");
        match self.refresh_session().await {
            Ok(true) => {
                self.apply(&SessionMachineInput::RecoverySucceeded);
            }
            Ok(false) | Err(_) => {
                warn!("Recovery refresh failed, clearing session");
                self.apply(&SessionMachineInput::RecoveryFailed);
                self.manager.clear_session();
                self.hub.emit();
            }
        }
    }

    /// Drive [`validate_health`](Self::validate_health) on a periodic timer.
    pub fn spawn_health_loop(
        self: &Arc<Self>,
        period: std::time::Duration,
    ) -> tokio::task::JoinHandle<()> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; a fresh start does not
            // need instant re-validation.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                coordinator.validate_health().await;
            }
        })
    }

    // ==========================================
    // Provider readiness
    // ==========================================

    /// Signal that the identity provider finished initializing.
    ///
    /// The first signal reconciles any persisted record with the provider:
    /// stored tokens are pushed, or refreshed immediately when expired.
    pub async fn notify_provider_ready(&self) {
        self.provider_ready.store(true, Ordering::SeqCst);
        self.reconcile_persisted_session().await;
    }

    /// Boot-time validation: reconcile the persisted record if the provider
    /// is already ready. Returns whether a valid session is held afterward.
    pub async fn validate_on_startup(&self) -> bool {
        if self.provider_ready.load(Ordering::SeqCst) || self.provider.is_ready() {
            self.provider_ready.store(true, Ordering::SeqCst);
            self.reconcile_persisted_session().await;
        }
        self.is_logged_in()
    }

    async fn reconcile_persisted_session(&self) {
        if self.reconciled.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(record) = self.manager.load_session() else {
            return;
        };

        info!(user_id = %record.session.user.id, "Reconciling persisted session with provider");
        self.apply(&SessionMachineInput::SessionRestored);

        if self.manager.is_expired() {
            // Hand the expired record to the health path, which refreshes,
            // recovers, or clears as policy dictates.
            self.apply(&SessionMachineInput::AuthSucceeded);
            self.validate_health().await;
            return;
        }

        match self
            .provider
            .set_session(&record.session.access_token, &record.session.refresh_token)
            .await
        {
            Ok(()) => {
                self.apply(&SessionMachineInput::AuthSucceeded);
                info!(user_id = %record.session.user.id, "Stored session adopted by provider");
                self.hub.emit();
            }
            Err(e) if e.is_transient() => {
                warn!(error = %e, "Provider unreachable during reconciliation, keeping session");
                self.apply(&SessionMachineInput::AuthSucceeded);
            }
            Err(e) => {
                warn!(error = %e, "Stored session rejected during reconciliation, clearing");
                self.apply(&SessionMachineInput::AuthFailed);
                self.manager.clear_session();
                self.hub.emit();
            }
        }
    }

    // ==========================================
    // Logout and queries
    // ==========================================

    /// Log out. Never fails: remote sign-out errors are logged, local state
    /// is always cleared, and the provider returns to anonymous.
    pub async fn logout(&self) {
        self.logout_epoch.fetch_add(1, Ordering::SeqCst);

        if let Some(record) = self.manager.load_session() {
            if let Err(e) = self.provider.sign_out(&record.session.access_token).await {
                warn!(error = %e, "Remote sign-out failed, clearing local session anyway");
            }
        }

        self.manager.clear_session();
        if let Err(e) = self.provider.reset().await {
            warn!(error = %e, "Provider reset failed");
        }
        self.apply(&SessionMachineInput::LogoutRequested);
        info!("Logged out");
        self.hub.emit();
    }

    /// Whether a non-expired session is persisted.
    pub fn is_logged_in(&self) -> bool {
        self.manager.load_session().is_some() && !self.manager.is_expired()
    }

    /// Identity of the signed-in user, if any.
    pub fn current_user(&self) -> Option<SessionUser> {
        self.manager.load_session().map(|record| record.session.user)
    }

    /// Whether the signed-in user has no organization yet.
    pub fn is_new_user(&self) -> bool {
        self.manager.user_new_state()
    }

    /// Mark the user as existing (onboarding completed).
    pub fn set_user_as_existing(&self) {
        if let Err(e) = self.manager.set_user_new_state(false) {
            warn!(error = %e, "Failed to persist new-user flag");
        }
    }

    /// Push attribute updates for the signed-in user.
    pub async fn update_user_attributes(
        &self,
        attributes: serde_json::Value,
    ) -> AuthResult<()> {
        if !self.provider_ready.load(Ordering::SeqCst) {
            return Err(AuthError::ProviderNotReady);
        }
        let record = self.manager.load_session().ok_or(AuthError::NotLoggedIn)?;
        self.provider
            .update_user_attributes(&record.session.access_token, attributes)
            .await
    }

    /// Status snapshot for reporting.
    pub fn status(&self) -> AuthSnapshot {
        let record = self.manager.load_session();
        let expired = self.manager.is_expired();
        AuthSnapshot {
            authenticated: record.is_some() && !expired,
            user_id: record.as_ref().map(|r| r.session.user.id.clone()),
            email: record.as_ref().and_then(|r| r.session.user.email.clone()),
            phone: record.as_ref().and_then(|r| r.session.user.phone.clone()),
            expires_at: record.as_ref().and_then(|r| r.absolute_expiry_utc),
            state: self.state(),
        }
    }
}

/// E.164: `+`, a leading digit 1-9, then up to 14 more digits.
fn is_valid_e164(phone: &str) -> bool {
    let Some(digits) = phone.strip_prefix('+') else {
        return false;
    };
    if !digits.starts_with(|c: char| ('1'..='9').contains(&c)) {
        return false;
    }
    (2..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

/// Mask a phone number for logging, keeping the last four digits.
fn mask_phone(phone: &str) -> String {
    if phone.len() <= 4 {
        return "****".to_string();
    }
    format!("****{}", &phone[phone.len() - 4..])
}
