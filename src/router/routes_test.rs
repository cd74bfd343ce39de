use super::*;

fn resolve(location: &str) -> RouteMatch {
    app_routes().resolve(location).unwrap()
}

// =============================================================
// parse_pattern
// =============================================================

#[test]
fn pattern_segments() {
    assert_eq!(
        parse_pattern("/agent/:agent_id"),
        vec![Segment::Static("agent".to_owned()), Segment::Param("agent_id".to_owned())]
    );
    assert_eq!(parse_pattern("/:pathMatch(.*)*"), vec![Segment::CatchAll("pathMatch".to_owned())]);
    assert!(parse_pattern("/").is_empty());
    assert!(parse_pattern("").is_empty());
}

// =============================================================
// Application table
// =============================================================

#[test]
fn root_is_public_login() {
    let m = resolve("/");
    assert_eq!(m.name(), Some(LOGIN_ROUTE));
    assert!(!m.requires_auth());
    assert!(!m.requires_admin());
}

#[test]
fn layout_index_children_inherit_into_chain() {
    let m = resolve("/graph");
    assert_eq!(m.matched.len(), 2);
    assert_eq!(m.matched[0].view, View::AppLayout);
    assert_eq!(m.matched[1].view, View::Graph);
    assert_eq!(m.matched[1].path, "/graph");
    assert!(m.requires_auth());
    assert!(m.requires_admin());
}

#[test]
fn database_routes_need_auth_only() {
    let index = resolve("/database");
    assert_eq!(index.name(), Some("DatabaseComp"));
    assert!(index.requires_auth());
    assert!(!index.requires_admin());
    assert!(index.keep_alive());

    let detail = resolve("/database/kb_42");
    assert_eq!(detail.name(), Some("DatabaseInfoComp"));
    assert_eq!(detail.param("database_id"), Some("kb_42"));
    assert_eq!(detail.matched[1].path, "/database/:database_id");
    assert!(detail.requires_auth());
    assert!(!detail.requires_admin());
    assert!(!detail.keep_alive());
}

#[test]
fn agent_index_needs_admin_but_single_agent_does_not() {
    let index = resolve("/agent");
    assert_eq!(index.name(), Some("AgentComp"));
    assert!(index.requires_admin());

    let single = resolve("/agent/a-9");
    assert_eq!(single.name(), Some("AgentSinglePage"));
    assert_eq!(single.matched.len(), 1);
    assert_eq!(single.param("agent_id"), Some("a-9"));
    assert!(single.requires_auth());
    assert!(!single.requires_admin());
}

#[test]
fn dashboard_and_knowledge_flags() {
    assert!(resolve("/dashboard").requires_admin());
    let knowledge = resolve("/knowledge");
    assert!(knowledge.requires_auth());
    assert!(!knowledge.requires_admin());
}

#[test]
fn unknown_paths_fall_to_public_not_found() {
    for path in ["/nope", "/graph/extra", "/database/1/2", "/a/b/c"] {
        let m = resolve(path);
        assert_eq!(m.name(), Some("NotFound"), "{path}");
        assert!(!m.requires_auth(), "{path}");
    }
    assert_eq!(resolve("/a/b/c").param("pathMatch"), Some("a/b/c"));
}

// =============================================================
// Location handling
// =============================================================

#[test]
fn query_and_fragment_are_kept_in_full_path_only() {
    let m = resolve("/database/7?tab=files#top");
    assert_eq!(m.path, "/database/7");
    assert_eq!(m.query.as_deref(), Some("tab=files"));
    assert_eq!(m.full_path, "/database/7?tab=files#top");
    assert_eq!(m.param("database_id"), Some("7"));
}

#[test]
fn trailing_slash_and_case_are_ignored_for_matching() {
    let m = resolve("/Knowledge/");
    assert_eq!(m.name(), Some("KnowledgeComp"));
    assert_eq!(m.path, "/Knowledge");
}

#[test]
fn empty_and_relative_locations_normalize() {
    assert_eq!(resolve("").name(), Some(LOGIN_ROUTE));
    assert_eq!(resolve("?next=1").path, "/");
    assert_eq!(resolve("graph").path, "/graph");
}

#[test]
fn first_declared_route_wins() {
    let table = RouteTable::new(vec![
        RouteRecord::new("/x/:id", View::Dashboard).name("param"),
        RouteRecord::new("/x/fixed", View::Graph).name("static"),
    ]);
    assert_eq!(table.resolve("/x/fixed").unwrap().name(), Some("param"));
}

#[test]
fn layout_without_matching_child_still_matches_alone() {
    let table = RouteTable::new(vec![
        RouteRecord::new("/shell", View::AppLayout)
            .meta(RouteMeta::auth())
            .children(vec![RouteRecord::new("inner", View::Knowledge)]),
    ]);
    let alone = table.resolve("/shell").unwrap();
    assert_eq!(alone.matched.len(), 1);
    assert!(alone.requires_auth());

    let inner = table.resolve("/shell/inner").unwrap();
    assert_eq!(inner.matched.len(), 2);
    assert!(inner.requires_auth(), "parent flag is inherited");
    assert!(table.resolve("/shell/other").is_none());
}

#[test]
fn no_table_match_is_none() {
    let table = RouteTable::new(vec![RouteRecord::new("/only", View::Login)]);
    assert!(table.resolve("/else").is_none());
}

#[test]
fn join_paths_handles_index_and_absolute_children() {
    assert_eq!(join_paths("/database", ""), "/database");
    assert_eq!(join_paths("/database", ":id"), "/database/:id");
    assert_eq!(join_paths("/database", "/abs"), "/abs");
    assert_eq!(join_paths("", "/"), "/");
}
