use crate::adapters::{AuthUpdate, IdentityProvider};
use crate::errors::AppResult;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// The one piece of identity the rest of the system consumes.
/// `loading` stays true until the provider has delivered its first
/// state, present or absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub loading: bool,
    pub user_id: Option<String>,
}

impl SessionState {
    fn loading() -> Self {
        Self {
            loading: true,
            user_id: None,
        }
    }
}

/// Process-wide auth context: owns the subscription to the identity
/// provider and republishes its reports as `SessionState`. Injected
/// wherever identity is needed rather than reached for as a global.
pub struct Session {
    provider: Arc<dyn IdentityProvider>,
    state: watch::Sender<SessionState>,
    forwarder: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        let (state, _) = watch::channel(SessionState::loading());
        Self {
            provider,
            state,
            forwarder: Mutex::new(None),
        }
    }

    /// Subscribes to the provider. Idempotent; the previous forwarder is
    /// replaced if called twice.
    pub fn start(&self) {
        let mut updates = self.provider.updates();
        let state = self.state.clone();
        let handle = tokio::spawn(async move {
            loop {
                let report = updates.borrow_and_update().clone();
                match report {
                    AuthUpdate::Unknown => {}
                    AuthUpdate::SignedOut => {
                        state.send_replace(SessionState {
                            loading: false,
                            user_id: None,
                        });
                    }
                    AuthUpdate::SignedIn(user_id) => {
                        state.send_replace(SessionState {
                            loading: false,
                            user_id: Some(user_id),
                        });
                    }
                }
                if updates.changed().await.is_err() {
                    break;
                }
            }
        });

        let mut forwarder = self.forwarder.lock().expect("forwarder mutex");
        if let Some(previous) = forwarder.replace(handle) {
            previous.abort();
        }
    }

    /// Drops the provider subscription. Process-teardown only.
    pub fn stop(&self) {
        let mut forwarder = self.forwarder.lock().expect("forwarder mutex");
        if let Some(handle) = forwarder.take() {
            handle.abort();
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn current_user(&self) -> Option<String> {
        self.state.borrow().user_id.clone()
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> AppResult<String> {
        self.provider.sign_up(email, password).await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AppResult<String> {
        self.provider.sign_in(email, password).await
    }

    /// Delegates to the provider. Local state only changes via the
    /// provider's own notification; a failure leaves it untouched.
    pub async fn sign_out(&self) -> AppResult<()> {
        self.provider.sign_out().await
    }
}
