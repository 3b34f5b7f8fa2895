//! Authentication commands.

use crate::output::{self, OutputFormat};
use anyhow::Result;
use auth_lifecycle::AuthCoordinator;
use std::io::{self, Write};
use std::sync::Arc;

/// Login with email and password.
pub async fn login(
    coordinator: Arc<AuthCoordinator>,
    remember: bool,
    format: &OutputFormat,
) -> Result<()> {
    if coordinator.validate_on_startup().await {
        let who = coordinator
            .current_user()
            .and_then(|user| user.email.or(user.phone))
            .unwrap_or_else(|| "unknown".to_string());
        output::print_success(&format!("Already logged in as {}", who), format);
        return Ok(());
    }

    print!("Email: ");
    io::stdout().flush()?;
    let mut email = String::new();
    io::stdin().read_line(&mut email)?;
    let email = email.trim().to_string();

    if email.is_empty() {
        output::print_error("Email is required", format);
        std::process::exit(1);
    }

    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        output::print_error("Password is required", format);
        std::process::exit(1);
    }

    println!("Logging in...");
    match coordinator.login_with_email(&email, &password, remember).await {
        Ok(Some(session)) => {
            output::print_success(&format!("Logged in as {}", session.user.id), format);
            Ok(())
        }
        Ok(None) => {
            output::print_error("Provider returned no session", format);
            std::process::exit(1);
        }
        Err(e) => {
            output::print_error(&format!("Login failed: {}", e), format);
            std::process::exit(1);
        }
    }
}

/// Register with email and password.
pub async fn register(
    coordinator: Arc<AuthCoordinator>,
    remember: bool,
    format: &OutputFormat,
) -> Result<()> {
    print!("Email: ");
    io::stdout().flush()?;
    let mut email = String::new();
    io::stdin().read_line(&mut email)?;
    let email = email.trim().to_string();

    let password = rpassword::prompt_password("Password: ")?;
    let confirm = rpassword::prompt_password("Confirm password: ")?;
    if password != confirm {
        output::print_error("Passwords do not match", format);
        std::process::exit(1);
    }

    println!("Registering...");
    match coordinator
        .register_with_email(&email, &password, remember)
        .await
    {
        Ok(Some(session)) => {
            output::print_success(
                &format!("Registered and logged in as {}", session.user.id),
                format,
            );
            Ok(())
        }
        Ok(None) => {
            output::print_error("Provider returned no session", format);
            std::process::exit(1);
        }
        Err(e) => {
            output::print_error(&format!("Registration failed: {}", e), format);
            std::process::exit(1);
        }
    }
}

/// Request a login OTP over SMS.
pub async fn otp_request(
    coordinator: Arc<AuthCoordinator>,
    phone: &str,
    format: &OutputFormat,
) -> Result<()> {
    match coordinator.request_login_otp(phone).await {
        Ok(()) => {
            output::print_success("OTP sent", format);
            Ok(())
        }
        Err(e) => {
            output::print_error(&format!("OTP request failed: {}", e), format);
            std::process::exit(1);
        }
    }
}

/// Verify a login OTP.
pub async fn otp_verify(
    coordinator: Arc<AuthCoordinator>,
    phone: &str,
    code: &str,
    remember: bool,
    format: &OutputFormat,
) -> Result<()> {
    match coordinator.verify_login_otp(phone, code, remember).await {
        Ok(Some(session)) => {
            let suffix = if coordinator.is_new_user() {
                " (new user)"
            } else {
                ""
            };
            output::print_success(
                &format!("Logged in as {}{}", session.user.id, suffix),
                format,
            );
            Ok(())
        }
        Ok(None) => {
            output::print_error("Invalid code", format);
            std::process::exit(1);
        }
        Err(e) => {
            output::print_error(&format!("OTP verification failed: {}", e), format);
            std::process::exit(1);
        }
    }
}

/// Show authentication status.
pub async fn status(coordinator: Arc<AuthCoordinator>, format: &OutputFormat) -> Result<()> {
    coordinator.validate_on_startup().await;
    let snapshot = coordinator.status();

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        OutputFormat::Text => {
            if snapshot.authenticated {
                let who = snapshot
                    .email
                    .or(snapshot.phone)
                    .or(snapshot.user_id)
                    .unwrap_or_else(|| "unknown".to_string());
                println!("Logged in as {}", who);
                if let Some(expires_at) = snapshot.expires_at {
                    println!("Session expires at {}", expires_at.to_rfc3339());
                }
            } else {
                println!("Not logged in");
            }
        }
    }
    Ok(())
}

/// Logout and clear the session.
pub async fn logout(coordinator: Arc<AuthCoordinator>, format: &OutputFormat) -> Result<()> {
    coordinator.logout().await;
    output::print_success("Logged out", format);
    Ok(())
}

/// Run the health loop in the foreground, printing session changes.
pub async fn watch(
    coordinator: Arc<AuthCoordinator>,
    interval_secs: u64,
    format: &OutputFormat,
) -> Result<()> {
    coordinator.validate_on_startup().await;

    {
        let weak = Arc::downgrade(&coordinator);
        let format = *format;
        coordinator.subscribe(move || {
            if let Some(coordinator) = weak.upgrade() {
                let logged_in = coordinator.is_logged_in();
                output::print_success(
                    &format!("Session changed: logged_in={}", logged_in),
                    &format,
                );
            }
        });
    }

    let handle =
        coordinator.spawn_health_loop(std::time::Duration::from_secs(interval_secs));
    println!("Watching session health (Ctrl-C to stop)...");

    tokio::signal::ctrl_c().await?;
    handle.abort();
    Ok(())
}
