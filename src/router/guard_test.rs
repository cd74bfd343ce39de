use super::*;
use crate::net::types::Role;
use crate::router::routes::app_routes;
use crate::state::session::{MemoryStorage, ProfileSource, SessionStore};
use crate::test_helpers::{FakeProfiles, GatedProfiles, HangingProfiles, profile};
use std::sync::Arc;

type Store<P> = SessionStore<P, Arc<MemoryStorage>>;

struct Harness<P> {
    guard: NavigationGuard<Arc<Store<P>>, Arc<MemoryStorage>>,
    store: Arc<Store<P>>,
    storage: Arc<MemoryStorage>,
}

fn harness<P: ProfileSource>(profiles: P, token: Option<&str>) -> Harness<P> {
    let storage = Arc::new(token.map_or_else(MemoryStorage::default, MemoryStorage::with_token));
    let store = Arc::new(SessionStore::open(profiles, Arc::clone(&storage)));
    let guard = NavigationGuard::new(Arc::clone(&store), Arc::clone(&storage), GuardConfig::default());
    Harness { guard, store, storage }
}

fn logged_in(role: Role) -> Harness<FakeProfiles> {
    let h = harness(FakeProfiles::default(), None);
    h.store.login("tok".to_owned(), Some(profile(role))).unwrap();
    h
}

fn target(location: &str) -> RouteMatch {
    app_routes().resolve(location).unwrap()
}

fn redirect_to(to: &str, reason: RedirectReason) -> Decision {
    Decision::Redirect { to: to.to_owned(), reason }
}

// =============================================================
// Public routes
// =============================================================

#[tokio::test]
async fn public_routes_allow_without_session() {
    let h = harness(FakeProfiles::default(), None);
    for path in ["/", "/missing/page"] {
        let outcome = h.guard.check(&target(path)).await;
        assert_eq!(outcome.decision, Decision::Allow, "{path}");
        assert_eq!(outcome.hydration, Hydration::NotNeeded);
    }
}

#[tokio::test]
async fn public_route_allows_even_when_hydration_fails() {
    let h = harness(FakeProfiles::rejecting(401), Some("stale"));
    let outcome = h.guard.check(&target("/missing/page")).await;
    assert_eq!(outcome.decision, Decision::Allow);
    assert_eq!(outcome.hydration, Hydration::Failed);
}

#[tokio::test]
async fn public_not_found_allows_for_logged_in_users() {
    for role in [Role::User, Role::Admin] {
        let h = logged_in(role);
        assert_eq!(h.guard.check(&target("/missing")).await.decision, Decision::Allow);
    }
}

// =============================================================
// Unauthenticated access
// =============================================================

#[tokio::test]
async fn auth_route_without_session_redirects_to_login_and_remembers() {
    let h = harness(FakeProfiles::default(), None);
    let outcome = h.guard.check(&target("/database/7?tab=files")).await;
    assert_eq!(outcome.decision, redirect_to("/", RedirectReason::Unauthenticated));
    assert_eq!(h.storage.peek_redirect().as_deref(), Some("/database/7?tab=files"));
}

#[tokio::test]
async fn admin_route_without_session_goes_to_login_not_landing() {
    let h = harness(FakeProfiles::default(), None);
    let outcome = h.guard.check(&target("/graph")).await;
    assert_eq!(outcome.decision, redirect_to("/", RedirectReason::Unauthenticated));
    assert_eq!(h.storage.peek_redirect().as_deref(), Some("/graph"));
}

// =============================================================
// Hydration
// =============================================================

#[tokio::test]
async fn failed_hydration_logs_out_and_redirects_to_login() {
    let h = harness(FakeProfiles::rejecting(401), Some("expired"));
    let outcome = h.guard.check(&target("/knowledge")).await;

    assert_eq!(outcome.hydration, Hydration::Failed);
    assert_eq!(outcome.decision, redirect_to("/", RedirectReason::Unauthenticated));
    assert_eq!(h.store.snapshot(), Session::default());
    assert_eq!(h.storage.load_token(), None);
    assert_eq!(h.storage.peek_redirect().as_deref(), Some("/knowledge"));
}

#[tokio::test]
async fn successful_hydration_admits_admin() {
    let h = harness(FakeProfiles::answering(profile(Role::Admin)), Some("good"));
    let outcome = h.guard.check(&target("/dashboard")).await;
    assert_eq!(outcome.hydration, Hydration::Hydrated);
    assert_eq!(outcome.decision, Decision::Allow);
    assert!(h.store.snapshot().is_admin());
}

#[tokio::test]
async fn loaded_session_is_not_refetched() {
    let h = harness(FakeProfiles::answering(profile(Role::User)), Some("good"));
    h.guard.check(&target("/knowledge")).await;
    let second = h.guard.check(&target("/database")).await;
    assert_eq!(second.hydration, Hydration::NotNeeded);
    assert_eq!(h.store.profiles().calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn hung_hydration_times_out_and_keeps_credential() {
    let h = harness(HangingProfiles, Some("slow"));
    let outcome = h.guard.check(&target("/knowledge")).await;

    assert_eq!(outcome.hydration, Hydration::TimedOut);
    assert_eq!(outcome.decision, redirect_to("/", RedirectReason::Unauthenticated));
    assert_eq!(h.store.snapshot().token.as_deref(), Some("slow"));
    assert_eq!(h.storage.load_token().as_deref(), Some("slow"));
}

#[tokio::test]
async fn superseded_hydration_keeps_newer_session() {
    let h = harness(GatedProfiles::new(profile(Role::Admin)), Some("old"));
    let target = target("/knowledge");

    let (outcome, ()) = tokio::join!(h.guard.check(&target), async {
        tokio::task::yield_now().await;
        h.store.login("new".to_owned(), Some(profile(Role::User))).unwrap();
        h.store.profiles().open_gate();
    });

    assert_eq!(outcome.hydration, Hydration::Superseded);
    assert_eq!(outcome.decision, Decision::Allow);
    assert_eq!(h.storage.load_token().as_deref(), Some("new"));
    assert!(!h.store.snapshot().is_admin());
}

#[tokio::test]
async fn hop_without_hydration_is_deferred_and_unauthenticated() {
    let h = harness(FakeProfiles::answering(profile(Role::User)), Some("tok"));
    let outcome = h.guard.check_hop(&target("/knowledge"), false).await;
    assert_eq!(outcome.hydration, Hydration::Deferred);
    assert_eq!(outcome.decision, redirect_to("/", RedirectReason::Unauthenticated));
    assert_eq!(h.store.profiles().calls(), 0);
    assert_eq!(h.store.snapshot().token.as_deref(), Some("tok"));
}

// =============================================================
// Role gating
// =============================================================

#[tokio::test]
async fn non_admin_on_admin_route_goes_to_user_landing() {
    let h = logged_in(Role::User);
    for path in ["/graph", "/dashboard", "/agent"] {
        let outcome = h.guard.check(&target(path)).await;
        assert_eq!(outcome.decision, redirect_to("/knowledge", RedirectReason::NotAdmin), "{path}");
    }
    assert_eq!(h.storage.peek_redirect(), None);
}

#[tokio::test]
async fn non_admin_may_open_single_agent_and_databases() {
    let h = logged_in(Role::User);
    for path in ["/agent/a1", "/database", "/database/kb_1", "/knowledge"] {
        assert_eq!(h.guard.check(&target(path)).await.decision, Decision::Allow, "{path}");
    }
}

#[tokio::test]
async fn superadmin_passes_admin_routes() {
    let h = logged_in(Role::SuperAdmin);
    assert_eq!(h.guard.check(&target("/graph")).await.decision, Decision::Allow);
}

// =============================================================
// Login page while signed in
// =============================================================

#[tokio::test]
async fn login_page_sends_admin_to_admin_landing() {
    let h = logged_in(Role::Admin);
    let outcome = h.guard.check(&target("/")).await;
    assert_eq!(outcome.decision, redirect_to("/database", RedirectReason::AlreadyLoggedIn));
}

#[tokio::test]
async fn login_page_sends_user_to_user_landing() {
    let h = logged_in(Role::User);
    let outcome = h.guard.check(&target("/?from=bookmark")).await;
    assert_eq!(outcome.decision, redirect_to("/knowledge", RedirectReason::AlreadyLoggedIn));
}

// =============================================================
// decide
// =============================================================

#[test]
fn decide_checks_auth_before_admin() {
    let config = GuardConfig::default();
    let anonymous = Session::default();
    assert_eq!(
        decide(&config, &target("/graph"), &anonymous),
        redirect_to("/", RedirectReason::Unauthenticated)
    );
}

#[test]
fn decide_honors_custom_landings() {
    let config = GuardConfig {
        login_path: "/".to_owned(),
        admin_landing: "/dashboard".to_owned(),
        user_landing: "/database".to_owned(),
        hydration_timeout: None,
    };
    let admin = Session { token: Some("t".to_owned()), user: Some(profile(Role::Admin)) };
    assert_eq!(decide(&config, &target("/"), &admin), redirect_to("/dashboard", RedirectReason::AlreadyLoggedIn));

    let user = Session { token: Some("t".to_owned()), user: Some(profile(Role::User)) };
    assert_eq!(decide(&config, &target("/graph"), &user), redirect_to("/database", RedirectReason::NotAdmin));
}

#[test]
fn guard_config_takes_timeout_from_console() {
    let console = ConsoleConfig {
        api_url: "http://x".to_owned(),
        timeouts: crate::config::HttpTimeouts::default(),
        hydration_timeout: None,
        session_file: "s.json".into(),
    };
    let config = GuardConfig::from_console(&console);
    assert_eq!(config.hydration_timeout, None);
    assert_eq!(config.user_landing, "/knowledge");
}
