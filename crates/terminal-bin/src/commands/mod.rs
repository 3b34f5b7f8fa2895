//! CLI command implementations.

pub mod auth;

use anyhow::{Context, Result};
use auth_lifecycle::{AuthCoordinator, SessionManager, SupabaseIdentityClient, SystemClock};
use std::sync::Arc;
use terminal_config_and_utils::{Config, Paths};
use terminal_storage::FileStore;

/// Wire the real storage, provider client, and coordinator together.
pub fn build_coordinator(config: &Config, paths: &Paths) -> Result<Arc<AuthCoordinator>> {
    paths.ensure_dirs().context("Failed to create app directories")?;

    let store = FileStore::open(paths.session_store_dir())
        .context("Failed to open session store")?;
    let provider = SupabaseIdentityClient::new(
        config.provider_url.clone(),
        config.provider_publishable_key.clone(),
    )
    .context("Failed to create identity provider client")?;

    let clock = Arc::new(SystemClock);
    let manager = SessionManager::new(Arc::new(store), clock.clone());

    Ok(Arc::new(AuthCoordinator::new(
        manager,
        Arc::new(provider),
        clock,
    )))
}
