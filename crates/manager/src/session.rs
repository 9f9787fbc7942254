//! Session gate: credential checks in front of an auth provider, and the
//! view routing that depends on whether someone is signed in.

use std::sync::Arc;

use folio_core::{
    errors::CoreError,
    model::{Notice, Session, SignUp},
    traits::{AuthProvider, Notifier},
    validate::validate_credentials,
};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::notify::TracingNotifier;

pub const SIGN_IN_FAILED: &str = "sign-in failed; check your credentials";
pub const SIGN_UP_FAILED: &str = "could not create the account; try again";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Login,
    SignUp,
    Projects,
}

/// Picks the view to show. Auth forms are skipped once signed in and the
/// project list is only reachable with a session.
pub fn resolve_route(requested: Option<Route>, signed_in: bool) -> Route {
    match (requested, signed_in) {
        (Some(Route::Login | Route::SignUp), true) => Route::Projects,
        (Some(Route::Projects), false) => Route::Login,
        (Some(route), _) => route,
        (None, true) => Route::Projects,
        (None, false) => Route::Login,
    }
}

pub struct SessionGate<P> {
    provider: P,
    notifier: Arc<dyn Notifier>,
}

impl<P: AuthProvider> SessionGate<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            notifier: Arc::new(TracingNotifier),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn sign_in(&self, email: &str, password: &SecretString) -> Result<Session, CoreError> {
        if let Err(e) = validate_credentials(email, password.expose_secret()) {
            self.notifier.notify(Notice::error(e.to_string()));
            return Err(e.into());
        }
        match self.provider.sign_in(email, password) {
            Ok(session) => {
                self.notifier
                    .notify(Notice::success(format!("signed in as {}", session.email)));
                Ok(session)
            }
            Err(e) => {
                warn!(error = %e, "sign-in rejected");
                self.notifier.notify(Notice::error(SIGN_IN_FAILED));
                Err(CoreError::Auth(SIGN_IN_FAILED.to_owned()))
            }
        }
    }

    pub fn sign_up(&self, request: &SignUp) -> Result<Session, CoreError> {
        if let Err(e) = validate_credentials(&request.email, request.password.expose_secret()) {
            self.notifier.notify(Notice::error(e.to_string()));
            return Err(e.into());
        }
        match self.provider.sign_up(request) {
            Ok(session) => {
                self.notifier
                    .notify(Notice::success(format!("account created for {}", session.email)));
                Ok(session)
            }
            Err(e) => {
                warn!(error = %e, "sign-up rejected");
                self.notifier.notify(Notice::error(SIGN_UP_FAILED));
                Err(CoreError::Auth(SIGN_UP_FAILED.to_owned()))
            }
        }
    }

    pub fn sign_out(&self) -> Result<(), CoreError> {
        self.provider.sign_out().map_err(|e| {
            warn!(error = %e, "sign-out failed");
            self.notifier.notify(Notice::error("could not sign out"));
            CoreError::Auth(e.to_string())
        })?;
        info!("session closed");
        self.notifier.notify(Notice::info("signed out"));
        Ok(())
    }

    pub fn current(&self) -> Option<Session> {
        self.provider.current_session()
    }

    pub fn require_session(&self) -> Result<Session, CoreError> {
        self.current().ok_or(CoreError::Unauthenticated)
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.provider.subscribe()
    }

    pub fn route(&self, requested: Option<Route>) -> Route {
        resolve_route(requested, self.current().is_some())
    }
}
