//! The session state machine.

use crate::operation::OperationSlot;
use crate::{CommandFamily, Session, SessionError, SessionResult, SessionState};
use identity_gateway::{GatewayResult, Identity, IdentityGateway, IdentityObserver, Subscription};
use std::future::Future;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Message recorded when initialization finds nobody signed in.
pub(crate) const NO_ACTIVE_SESSION: &str = "No active session";

/// Message recorded when sign-in succeeds but no identity becomes active.
pub(crate) const SIGN_IN_WITHOUT_SESSION: &str = "Signed in, but no active session was found";

/// Message recorded when an account is created but still needs confirming.
pub(crate) const SIGN_UP_PENDING_CONFIRMATION: &str =
    "Account created. Confirm your email address, then sign in.";

/// Apply a mutation through the single write path.
///
/// Readers are only woken when the state actually changed.
fn apply(
    state: &watch::Sender<SessionState>,
    event: &'static str,
    mutate: impl FnOnce(&mut SessionState),
) -> bool {
    let modified = state.send_if_modified(|current| {
        let before = current.clone();
        mutate(current);
        *current != before
    });

    if modified {
        let current = state.borrow();
        debug!(
            event,
            status = %current.status(),
            authenticated = current.is_authenticated(),
            "Session state changed"
        );
    }
    modified
}

/// Bridges gateway notifications into the state.
struct StateObserver {
    state: Weak<watch::Sender<SessionState>>,
}

impl IdentityObserver for StateObserver {
    fn identity_changed(&self, identity: Option<&Identity>) {
        if let Some(state) = self.state.upgrade() {
            let user = identity.map(Session::from);
            apply(&state, "notification", |s| s.set_user(user));
        }
    }
}

/// Canonical owner of the client's session state.
///
/// Every write, whether from a command phase or a gateway notification,
/// applies at the moment it arrives; the last arrival wins. Commands of the
/// same [`CommandFamily`] do not overlap: a second `initialize`, `sign_in`
/// or `sign_up` while one is pending fails with
/// [`SessionError::AlreadyInFlight`], and a second `sign_out` does nothing.
pub struct SessionStateMachine {
    gateway: Arc<dyn IdentityGateway>,
    state: Arc<watch::Sender<SessionState>>,
    subscription: Mutex<Option<Subscription>>,
    initialize_slot: OperationSlot,
    credentials_slot: OperationSlot,
    sign_out_slot: OperationSlot,
}

impl SessionStateMachine {
    /// Create the machine and subscribe to the gateway.
    ///
    /// The gateway may replay its current identity during this call.
    pub fn new(gateway: Arc<dyn IdentityGateway>) -> Self {
        let (sender, _) = watch::channel(SessionState::default());
        let state = Arc::new(sender);

        let observer = Arc::new(StateObserver {
            state: Arc::downgrade(&state),
        });
        let subscription = gateway.subscribe(observer);

        Self {
            gateway,
            state,
            subscription: Mutex::new(Some(subscription)),
            initialize_slot: OperationSlot::new(CommandFamily::Initialize),
            credentials_slot: OperationSlot::new(CommandFamily::Credentials),
            sign_out_slot: OperationSlot::new(CommandFamily::SignOut),
        }
    }

    /// Clone of the current state.
    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver that wakes whenever the state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// True while a command of `family` is pending.
    pub fn is_in_flight(&self, family: CommandFamily) -> bool {
        self.slot(family).is_in_flight()
    }

    /// Resolve the session from the gateway.
    ///
    /// Failures degrade to signed out and are recorded in the state; only a
    /// concurrent call is reported as an error.
    pub async fn initialize(&self) -> SessionResult<()> {
        let _guard = self.acquire(CommandFamily::Initialize)?;
        self.write("initialize", |s| s.begin(false));

        match self.gateway.fetch_current_identity().await {
            Ok(Some(identity)) => {
                info!(user_id = %identity.id, "Session restored");
                self.write("initialize", |s| s.succeed(Session::from(identity)));
            }
            Ok(None) => {
                debug!("No session to restore");
                self.write("initialize", |s| s.fail(NO_ACTIVE_SESSION.to_string()));
            }
            Err(e) => {
                warn!(error = %e, "Session initialization failed");
                self.write("initialize", |s| s.fail(e.to_string()));
            }
        }
        Ok(())
    }

    /// Sign in, then re-read the identity from the gateway.
    ///
    /// A failure is both recorded in the state and returned.
    pub async fn sign_in(&self, email: &str, password: &str) -> SessionResult<()> {
        let _guard = self.acquire(CommandFamily::Credentials)?;
        self.authenticate(
            "sign_in",
            self.gateway.sign_in(email, password),
            SIGN_IN_WITHOUT_SESSION,
        )
        .await
    }

    /// Register, then re-read the identity from the gateway.
    ///
    /// When the provider requires email confirmation no identity is active
    /// yet; that is reported as [`SessionError::NoSession`].
    pub async fn sign_up(&self, email: &str, password: &str) -> SessionResult<()> {
        let _guard = self.acquire(CommandFamily::Credentials)?;
        self.authenticate(
            "sign_up",
            self.gateway.sign_up(email, password),
            SIGN_UP_PENDING_CONFIRMATION,
        )
        .await
    }

    async fn authenticate(
        &self,
        event: &'static str,
        call: impl Future<Output = GatewayResult<()>>,
        no_session_message: &str,
    ) -> SessionResult<()> {
        self.write(event, |s| s.begin(true));

        let result: SessionResult<Identity> = async {
            call.await?;
            self.gateway
                .fetch_current_identity()
                .await?
                .ok_or_else(|| SessionError::NoSession(no_session_message.to_string()))
        }
        .await;

        match result {
            Ok(identity) => {
                info!(event, user_id = %identity.id, "Authenticated");
                self.write(event, |s| s.succeed(Session::from(identity)));
                Ok(())
            }
            Err(e) => {
                warn!(event, error = %e, "Authentication failed");
                self.write(event, |s| s.fail(e.to_string()));
                Err(e)
            }
        }
    }

    /// Sign out. Local state is cleared whatever the gateway reports.
    pub async fn sign_out(&self) {
        let Some(_guard) = self.sign_out_slot.try_acquire() else {
            debug!("Sign out already in progress");
            return;
        };
        self.write("sign_out", |s| s.begin(false));

        if let Err(e) = self.gateway.sign_out().await {
            warn!(error = %e, "Gateway sign out failed, clearing local session anyway");
        }

        self.write("sign_out", |s| s.sign_out());
        info!("Signed out");
    }

    /// Clear the recorded error. Status and user are kept.
    pub fn clear_error(&self) {
        self.write("clear_error", |s| s.clear_error());
    }

    /// Release the gateway subscription. Later calls do nothing.
    pub fn shutdown(&self) {
        let subscription = self
            .subscription
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        if let Some(subscription) = subscription {
            subscription.unsubscribe();
            debug!("Gateway subscription released");
        }
    }

    fn write(&self, event: &'static str, mutate: impl FnOnce(&mut SessionState)) -> bool {
        apply(&self.state, event, mutate)
    }

    fn slot(&self, family: CommandFamily) -> &OperationSlot {
        match family {
            CommandFamily::Initialize => &self.initialize_slot,
            CommandFamily::Credentials => &self.credentials_slot,
            CommandFamily::SignOut => &self.sign_out_slot,
        }
    }

    fn acquire(
        &self,
        family: CommandFamily,
    ) -> SessionResult<crate::operation::OperationGuard<'_>> {
        self.slot(family)
            .try_acquire()
            .ok_or(SessionError::AlreadyInFlight(family))
    }
}

impl Drop for SessionStateMachine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
