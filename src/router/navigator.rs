//! Drives navigations: resolve, guard, follow redirects, commit.
//!
//! Each redirect is a fresh navigation that passes the guard again, so a
//! refused admin route lands on the user landing only after that landing has
//! itself been admitted. A hydration timeout is paid at most once per
//! navigation.

#[cfg(test)]
#[path = "navigator_test.rs"]
mod navigator_test;

use super::RouterError;
use super::guard::{Decision, GuardOutcome, Hydration, NavigationGuard};
use super::routes::{RouteMatch, RouteTable};
use crate::state::session::{SessionAccessor, SessionStorage};

pub const MAX_REDIRECTS: usize = 8;

/// A committed navigation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Navigation {
    pub location: RouteMatch,
    /// The originally requested location when any redirect happened.
    pub redirected_from: Option<String>,
    /// One outcome per hop, in order; the last is always `Allow`.
    pub outcomes: Vec<GuardOutcome>,
}

impl Navigation {
    #[must_use]
    pub fn was_redirected(&self) -> bool {
        self.redirected_from.is_some()
    }
}

pub struct Navigator<A, S> {
    table: RouteTable,
    guard: NavigationGuard<A, S>,
    current: Option<RouteMatch>,
}

impl<A: SessionAccessor, S: SessionStorage> Navigator<A, S> {
    pub fn new(table: RouteTable, guard: NavigationGuard<A, S>) -> Self {
        Self { table, guard, current: None }
    }

    pub fn guard(&self) -> &NavigationGuard<A, S> {
        &self.guard
    }

    /// The last committed location.
    pub fn current(&self) -> Option<&RouteMatch> {
        self.current.as_ref()
    }

    /// Navigate to `location`, following guard redirects.
    ///
    /// The current location only changes when the navigation commits.
    ///
    /// # Errors
    ///
    /// [`RouterError::NoMatch`] when a location resolves to no route, and
    /// [`RouterError::RedirectLoop`] after [`MAX_REDIRECTS`] redirects.
    pub async fn push(&mut self, location: &str) -> Result<Navigation, RouterError> {
        let mut next = location.to_owned();
        let mut outcomes = Vec::new();
        let mut hydrate = true;

        loop {
            let target = self.table.resolve(&next).ok_or_else(|| RouterError::NoMatch(next.clone()))?;
            let outcome = self.guard.check_hop(&target, hydrate).await;
            if outcome.hydration == Hydration::TimedOut {
                hydrate = false;
            }
            let decision = outcome.decision.clone();
            outcomes.push(outcome);

            match decision {
                Decision::Allow => {
                    let redirected_from = (outcomes.len() > 1).then(|| location.to_owned());
                    tracing::info!(path = %target.full_path, hops = outcomes.len() - 1, "navigation committed");
                    self.current = Some(target.clone());
                    return Ok(Navigation { location: target, redirected_from, outcomes });
                }
                Decision::Redirect { to, .. } => {
                    if outcomes.len() > MAX_REDIRECTS {
                        return Err(RouterError::RedirectLoop { path: location.to_owned(), hops: outcomes.len() });
                    }
                    next = to;
                }
            }
        }
    }
}
