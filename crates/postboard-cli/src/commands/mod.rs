//! CLI command implementations.

mod auth;

pub use auth::{login, logout, signup, status, watch};

use anyhow::Result;
use credential_store::{CredentialKeys, CredentialStore, CredentialVault, FileStore};
use identity_gateway::SupabaseGateway;
use postboard_config::{Config, Paths};
use session_state::{SessionState, SessionStateMachine};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Session state machine wired to the Supabase gateway for one CLI run.
pub struct Client {
    gateway: Arc<SupabaseGateway>,
    machine: SessionStateMachine,
    refresh_margin: Duration,
    refresh_task: Option<JoinHandle<()>>,
    initialized: bool,
}

impl Client {
    pub fn open(paths: &Paths, config: &Config) -> Result<Self> {
        let vault = CredentialVault::new(open_store(paths));
        let gateway = Arc::new(SupabaseGateway::new(
            vault,
            &config.supabase_url,
            &config.supabase_anon_key,
        )?);
        let machine = SessionStateMachine::new(gateway.clone());

        Ok(Self {
            gateway,
            machine,
            refresh_margin: Duration::from_secs(config.refresh_margin_secs),
            refresh_task: None,
            initialized: false,
        })
    }

    pub fn machine(&self) -> &SessionStateMachine {
        &self.machine
    }

    /// Resolve the stored session once per run and return the state.
    pub async fn ensure_initialized(&mut self) -> Result<SessionState> {
        if !self.initialized {
            self.machine.initialize().await?;
            self.initialized = true;
        }
        Ok(self.machine.snapshot())
    }

    pub fn start_auto_refresh(&mut self) {
        if self.refresh_task.is_none() {
            self.refresh_task = Some(self.gateway.spawn_auto_refresh(self.refresh_margin));
        }
    }

    /// Stop background work and release the gateway subscription.
    pub fn close(mut self) {
        if let Some(task) = self.refresh_task.take() {
            task.abort();
        }
        self.machine.shutdown();
    }
}

/// Platform keychain when usable, otherwise the credentials file.
fn open_store(paths: &Paths) -> Box<dyn CredentialStore> {
    let keychain = credential_store::create_store().and_then(|store| {
        store.get(CredentialKeys::AUTH_TOKEN)?;
        Ok(store)
    });

    match keychain {
        Ok(store) => {
            debug!("Using platform keychain");
            store
        }
        Err(e) => {
            let path = paths.credentials_file();
            warn!(error = %e, path = %path.display(), "Keychain unavailable, using file store");
            Box::new(FileStore::new(path))
        }
    }
}

/// Prompt for email and password (hidden).
fn prompt_credentials() -> Result<(String, String)> {
    print!("Email: ");
    io::stdout().flush()?;
    let mut email = String::new();
    io::stdin().read_line(&mut email)?;
    let email = email.trim().to_string();

    if email.is_empty() {
        anyhow::bail!("Email is required");
    }

    let password = rpassword::prompt_password("Password: ")?;

    if password.is_empty() {
        anyhow::bail!("Password is required");
    }

    Ok((email, password))
}
