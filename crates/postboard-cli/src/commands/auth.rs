//! Authentication commands.

use super::{prompt_credentials, Client};
use crate::output::{self, OutputFormat};
use anyhow::Result;
use session_state::{Session, SessionError};

fn display_name(user: &Session) -> &str {
    if user.email.is_empty() {
        &user.id
    } else {
        &user.email
    }
}

/// Login with email and password.
pub async fn login(client: &mut Client, format: &OutputFormat) -> Result<()> {
    let state = client.ensure_initialized().await?;
    if let Some(user) = state.user() {
        output::print_success(&format!("Already logged in as {}", display_name(user)), format);
        return Ok(());
    }

    let (email, password) = prompt_credentials()?;
    if let OutputFormat::Text = format {
        println!("Logging in...");
    }

    client
        .machine()
        .sign_in(&email, &password)
        .await
        .map_err(|e| anyhow::anyhow!("Login failed: {}", e))?;

    let state = client.machine().snapshot();
    let name = state.user().map(display_name).unwrap_or(email.as_str());
    output::print_success(&format!("Logged in as {}", name), format);
    Ok(())
}

/// Create an account, signing in when the project does not require email confirmation.
pub async fn signup(client: &mut Client, format: &OutputFormat) -> Result<()> {
    let state = client.ensure_initialized().await?;
    if let Some(user) = state.user() {
        anyhow::bail!(
            "Already logged in as {}. Run 'postboard logout' first",
            display_name(user)
        );
    }

    let (email, password) = prompt_credentials()?;
    if let OutputFormat::Text = format {
        println!("Creating account...");
    }

    match client.machine().sign_up(&email, &password).await {
        Ok(()) => {
            output::print_success(&format!("Account created. Logged in as {}", email), format);
            Ok(())
        }
        Err(SessionError::NoSession(message)) => {
            output::print_success(&message, format);
            Ok(())
        }
        Err(e) => anyhow::bail!("Sign up failed: {}", e),
    }
}

/// Logout and clear the stored session.
pub async fn logout(client: &mut Client, format: &OutputFormat) -> Result<()> {
    client.machine().sign_out().await;
    output::print_success("Logged out successfully", format);
    Ok(())
}

/// Check authentication status.
pub async fn status(client: &mut Client, format: &OutputFormat) -> Result<()> {
    let state = client.ensure_initialized().await?;
    output::print_state(&state, format);
    Ok(())
}

/// Print every session change until Ctrl-C.
pub async fn watch(client: &mut Client, format: &OutputFormat) -> Result<()> {
    let state = client.ensure_initialized().await?;
    output::print_state(&state, format);

    client.start_auto_refresh();
    let mut changes = client.machine().subscribe();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = changes.borrow_and_update().clone();
                if let OutputFormat::Text = format {
                    println!();
                }
                output::print_state(&state, format);
            }
            _ = &mut ctrl_c => break,
        }
    }

    Ok(())
}
