//! Test harness for the session state machine.

use crate::SessionStateMachine;
use async_trait::async_trait;
use credential_store::StoreError;
use identity_gateway::{
    GatewayError, GatewayResult, Identity, IdentityGateway, IdentityObserver, ObserverRegistry,
    Subscription,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

pub fn alice() -> Identity {
    Identity::new("u1", "a@x.com")
}

pub fn bob() -> Identity {
    Identity::new("u2", "b@x.com")
}

/// A gateway call paused at its start until released.
pub struct HeldCall {
    entered: Option<oneshot::Receiver<()>>,
    release: Option<oneshot::Sender<()>>,
}

impl HeldCall {
    /// Wait until the call has reached the gateway.
    pub async fn entered(&mut self) {
        if let Some(entered) = self.entered.take() {
            entered.await.unwrap();
        }
    }

    /// Let the call continue.
    pub fn release(mut self) {
        if let Some(release) = self.release.take() {
            let _ = release.send(());
        }
    }
}

type Gate = (oneshot::Sender<()>, oneshot::Receiver<()>);

#[derive(Default)]
struct Script {
    current: Option<Identity>,
    sign_in_identity: Option<Identity>,
    replay: Option<Option<Identity>>,
    fail_fetch: Option<String>,
    fail_sign_in: Option<String>,
    fail_sign_up: Option<String>,
    fail_sign_out: Option<String>,
    fail_credential_write: Option<String>,
}

/// Scriptable in-memory gateway.
///
/// Successful sign-in/sign-up make `sign_in_identity` current and notify;
/// sign-out always clears and notifies, like the real gateway.
pub struct MockGateway {
    script: Mutex<Script>,
    gates: Mutex<HashMap<&'static str, Gate>>,
    calls: Mutex<Vec<&'static str>>,
    observers: ObserverRegistry,
    subscribes: AtomicUsize,
    releases: Arc<AtomicUsize>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Script {
                sign_in_identity: Some(alice()),
                ..Script::default()
            }),
            gates: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            observers: ObserverRegistry::new(),
            subscribes: AtomicUsize::new(0),
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_current(&self, identity: Option<Identity>) {
        self.script.lock().unwrap().current = identity;
    }

    pub fn set_sign_in_identity(&self, identity: Option<Identity>) {
        self.script.lock().unwrap().sign_in_identity = identity;
    }

    /// Identity delivered synchronously on subscribe.
    pub fn set_replay(&self, identity: Option<Identity>) {
        self.script.lock().unwrap().replay = Some(identity);
    }

    pub fn fail_fetch(&self, message: Option<&str>) {
        self.script.lock().unwrap().fail_fetch = message.map(str::to_string);
    }

    pub fn fail_sign_in(&self, message: Option<&str>) {
        self.script.lock().unwrap().fail_sign_in = message.map(str::to_string);
    }

    pub fn fail_sign_up(&self, message: Option<&str>) {
        self.script.lock().unwrap().fail_sign_up = message.map(str::to_string);
    }

    pub fn fail_sign_out(&self, message: Option<&str>) {
        self.script.lock().unwrap().fail_sign_out = message.map(str::to_string);
    }

    /// Accept sign-in/sign-up but fail to persist the resulting session.
    pub fn fail_credential_write(&self, message: Option<&str>) {
        self.script.lock().unwrap().fail_credential_write = message.map(str::to_string);
    }

    /// Pause the next call to `op` ("fetch", "sign_in", "sign_up", "sign_out").
    pub fn hold(&self, op: &'static str) -> HeldCall {
        let (entered_tx, entered_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        self.gates
            .lock()
            .unwrap()
            .insert(op, (entered_tx, release_rx));
        HeldCall {
            entered: Some(entered_rx),
            release: Some(release_tx),
        }
    }

    /// Deliver a notification as the provider would.
    pub fn emit(&self, identity: Option<Identity>) {
        self.set_current(identity.clone());
        self.observers.notify(identity.as_ref());
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.calls().iter().filter(|c| **c == op).count()
    }

    pub fn subscribes(&self) -> usize {
        self.subscribes.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    async fn enter(&self, op: &'static str) {
        self.calls.lock().unwrap().push(op);
        let gate = self.gates.lock().unwrap().remove(op);
        if let Some((entered, release)) = gate {
            let _ = entered.send(());
            let _ = release.await;
        }
    }

    fn complete_sign_in(&self) -> GatewayResult<()> {
        let (identity, write_failure) = {
            let script = self.script.lock().unwrap();
            (
                script.sign_in_identity.clone(),
                script.fail_credential_write.clone(),
            )
        };
        if let Some(message) = write_failure {
            return Err(GatewayError::Storage(StoreError::Platform(message)));
        }
        if identity.is_some() {
            self.emit(identity);
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityGateway for MockGateway {
    async fn sign_up(&self, _email: &str, _password: &str) -> GatewayResult<()> {
        self.enter("sign_up").await;
        if let Some(message) = self.script.lock().unwrap().fail_sign_up.clone() {
            return Err(GatewayError::SignUpRejected(message));
        }
        self.complete_sign_in()
    }

    async fn sign_in(&self, _email: &str, _password: &str) -> GatewayResult<()> {
        self.enter("sign_in").await;
        if let Some(message) = self.script.lock().unwrap().fail_sign_in.clone() {
            return Err(GatewayError::InvalidCredentials(message));
        }
        self.complete_sign_in()
    }

    async fn sign_out(&self) -> GatewayResult<()> {
        self.enter("sign_out").await;
        let failure = self.script.lock().unwrap().fail_sign_out.clone();
        self.emit(None);
        match failure {
            Some(message) => Err(GatewayError::Server {
                status: 500,
                message,
            }),
            None => Ok(()),
        }
    }

    async fn fetch_current_identity(&self) -> GatewayResult<Option<Identity>> {
        self.enter("fetch").await;
        let script = self.script.lock().unwrap();
        match &script.fail_fetch {
            Some(message) => Err(GatewayError::Config(message.clone())),
            None => Ok(script.current.clone()),
        }
    }

    fn subscribe(&self, observer: Arc<dyn IdentityObserver>) -> Subscription {
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        let registration = self.observers.register(observer.clone());

        let replay = self.script.lock().unwrap().replay.clone();
        if let Some(identity) = replay {
            observer.identity_changed(identity.as_ref());
        }

        let releases = self.releases.clone();
        Subscription::new(move || {
            registration.unsubscribe();
            releases.fetch_add(1, Ordering::SeqCst);
        })
    }
}

pub struct TestHarness {
    pub gateway: Arc<MockGateway>,
    pub machine: Arc<SessionStateMachine>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_gateway(MockGateway::new())
    }

    pub fn with_gateway(gateway: MockGateway) -> Self {
        let gateway = Arc::new(gateway);
        let machine = Arc::new(SessionStateMachine::new(gateway.clone()));
        Self { gateway, machine }
    }

    /// Harness whose gateway already has `identity` signed in.
    pub fn signed_in_as(identity: Identity) -> Self {
        let gateway = MockGateway::new();
        gateway.set_current(Some(identity));
        Self::with_gateway(gateway)
    }

    pub fn spawn_initialize(&self) -> tokio::task::JoinHandle<crate::SessionResult<()>> {
        let machine = self.machine.clone();
        tokio::spawn(async move { machine.initialize().await })
    }

    pub fn spawn_sign_in(&self) -> tokio::task::JoinHandle<crate::SessionResult<()>> {
        let machine = self.machine.clone();
        tokio::spawn(async move { machine.sign_in("a@x.com", "secret").await })
    }

    pub fn spawn_sign_out(&self) -> tokio::task::JoinHandle<()> {
        let machine = self.machine.clone();
        tokio::spawn(async move { machine.sign_out().await })
    }
}
