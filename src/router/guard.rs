//! Navigation guard: auth and role gating for every route transition.
//!
//! SYSTEM CONTEXT
//! ==============
//! Runs before each navigation. It first resolves a stored-but-unloaded
//! credential by hydrating the session, then picks exactly one of allow,
//! redirect-to-login, redirect-to-user-landing, or redirect-to-role-landing.
//!
//! ERROR HANDLING
//! ==============
//! A failed hydration is an invalid credential: the session is logged out
//! and the transition continues as unauthenticated. A hydration that exceeds
//! the configured timeout keeps the credential but is also decided as
//! unauthenticated; redirect hops of the same navigation do not fetch again,
//! the next navigation does. Neither is surfaced as an error.

#[cfg(test)]
#[path = "guard_test.rs"]
mod guard_test;

use std::time::Duration;

use super::routes::RouteMatch;
use crate::config::{ConsoleConfig, DEFAULT_HYDRATION_TIMEOUT_SECS};
use crate::state::session::{Session, SessionAccessor, SessionError, SessionStorage};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardConfig {
    pub login_path: String,
    pub admin_landing: String,
    /// Where authenticated non-admins land, including when refused an
    /// admin-only route.
    pub user_landing: String,
    pub hydration_timeout: Option<Duration>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            login_path: "/".to_owned(),
            admin_landing: "/database".to_owned(),
            user_landing: "/knowledge".to_owned(),
            hydration_timeout: Some(Duration::from_secs(DEFAULT_HYDRATION_TIMEOUT_SECS)),
        }
    }
}

impl GuardConfig {
    #[must_use]
    pub fn from_console(config: &ConsoleConfig) -> Self {
        Self { hydration_timeout: config.hydration_timeout, ..Self::default() }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RedirectReason {
    /// Auth required and no loaded session; the requested path is remembered.
    Unauthenticated,
    /// Admin required and the loaded user is not one.
    NotAdmin,
    /// Already signed in and asked for the login page.
    AlreadyLoggedIn,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Redirect { to: String, reason: RedirectReason },
}

/// What the guard did about an unloaded credential.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hydration {
    NotNeeded,
    Hydrated,
    /// Fetch failed; the session was logged out.
    Failed,
    /// Fetch exceeded the timeout; the credential was kept.
    TimedOut,
    /// Not attempted because an earlier hop of the same navigation timed out.
    Deferred,
    /// The credential changed mid-fetch; the newer session was left alone.
    Superseded,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardOutcome {
    pub decision: Decision,
    pub hydration: Hydration,
}

pub struct NavigationGuard<A, S> {
    session: A,
    storage: S,
    config: GuardConfig,
}

impl<A: SessionAccessor, S: SessionStorage> NavigationGuard<A, S> {
    pub fn new(session: A, storage: S, config: GuardConfig) -> Self {
        Self { session, storage, config }
    }

    pub fn session(&self) -> &A {
        &self.session
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Gate a transition to `target`. Resolves fully before returning.
    pub async fn check(&self, target: &RouteMatch) -> GuardOutcome {
        self.check_hop(target, true).await
    }

    /// Gate one hop of a navigation. With `hydrate` false an unloaded
    /// credential is decided as unauthenticated without fetching.
    pub async fn check_hop(&self, target: &RouteMatch, hydrate: bool) -> GuardOutcome {
        let hydration = self.resolve_session(hydrate).await;
        let session = self.session.snapshot();
        let decision = decide(&self.config, target, &session);

        match &decision {
            Decision::Allow => tracing::debug!(path = %target.full_path, "navigation allowed"),
            Decision::Redirect { to, reason } => {
                tracing::debug!(path = %target.full_path, %to, ?reason, "navigation redirected");
                if *reason == RedirectReason::Unauthenticated {
                    if let Err(e) = self.storage.remember_redirect(&target.full_path) {
                        tracing::warn!(error = %e, "failed to remember post-login redirect");
                    }
                }
            }
        }

        GuardOutcome { decision, hydration }
    }

    async fn resolve_session(&self, hydrate: bool) -> Hydration {
        if !self.session.snapshot().needs_hydration() {
            return Hydration::NotNeeded;
        }
        if !hydrate {
            return Hydration::Deferred;
        }

        let result = match self.config.hydration_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.session.hydrate()).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(timeout_secs = limit.as_secs_f64(), "current user fetch timed out");
                    return Hydration::TimedOut;
                }
            },
            None => self.session.hydrate().await,
        };

        match result {
            Ok(()) => Hydration::Hydrated,
            Err(SessionError::Superseded) => {
                tracing::debug!("credential changed during current user fetch");
                Hydration::Superseded
            }
            Err(e) => {
                tracing::warn!(error = %e, "current user fetch failed; clearing session");
                self.session.logout();
                Hydration::Failed
            }
        }
    }
}

/// The decision table, first match wins.
#[must_use]
pub fn decide(config: &GuardConfig, target: &RouteMatch, session: &Session) -> Decision {
    let logged_in = session.is_logged_in();
    let admin = session.is_admin();

    if target.requires_auth() && !logged_in {
        return redirect(&config.login_path, RedirectReason::Unauthenticated);
    }
    if target.requires_admin() && !admin {
        return redirect(&config.user_landing, RedirectReason::NotAdmin);
    }
    if target.path == config.login_path && logged_in {
        let landing = if admin { &config.admin_landing } else { &config.user_landing };
        return redirect(landing, RedirectReason::AlreadyLoggedIn);
    }
    Decision::Allow
}

fn redirect(to: &str, reason: RedirectReason) -> Decision {
    Decision::Redirect { to: to.to_owned(), reason }
}
