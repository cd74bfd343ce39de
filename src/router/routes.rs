//! Route tree, metadata inheritance, and path matching.
//!
//! DESIGN
//! ======
//! Routes form a tree: layout records own relative child records, and an
//! empty child path is the layout's index. Resolving a location yields the
//! whole matched chain from root to leaf so flags can be inherited. A route
//! requires auth when any record on the chain says so.
//!
//! Matching is first-declared-wins and depth-first. Static segments compare
//! ASCII case-insensitively, trailing slashes are ignored, and the query
//! string and fragment never take part in matching.

#[cfg(test)]
#[path = "routes_test.rs"]
mod routes_test;

use std::collections::BTreeMap;

/// The view a record renders.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum View {
    /// Shell with navigation chrome; renders its matched child.
    AppLayout,
    Login,
    Agent,
    AgentSingle,
    Graph,
    Database,
    DatabaseInfo,
    Dashboard,
    Knowledge,
    NotFound,
}

/// Per-record flags. Auth and admin requirements inherit down the chain;
/// `keep_alive` only affects view retention and is read from the leaf.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RouteMeta {
    pub requires_auth: bool,
    pub requires_admin: bool,
    pub keep_alive: bool,
}

impl RouteMeta {
    pub const PUBLIC: Self = Self { requires_auth: false, requires_admin: false, keep_alive: false };

    #[must_use]
    pub const fn auth() -> Self {
        Self { requires_auth: true, ..Self::PUBLIC }
    }

    #[must_use]
    pub const fn admin() -> Self {
        Self { requires_auth: true, requires_admin: true, keep_alive: false }
    }

    #[must_use]
    pub const fn keep_alive(mut self) -> Self {
        self.keep_alive = true;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param(String),
    /// `:name(.*)*` swallows the remainder, including nothing.
    CatchAll(String),
}

fn parse_pattern(pattern: &str) -> Vec<Segment> {
    pattern
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|raw| match raw.strip_prefix(':') {
            Some(param) => match param.strip_suffix("(.*)*") {
                Some(name) => Segment::CatchAll(name.to_owned()),
                None => Segment::Param(param.to_owned()),
            },
            None => Segment::Static(raw.to_owned()),
        })
        .collect()
}

#[derive(Clone, Debug)]
pub struct RouteRecord {
    pub path: String,
    pub name: Option<String>,
    pub view: View,
    pub meta: RouteMeta,
    pub children: Vec<RouteRecord>,
    segments: Vec<Segment>,
}

impl RouteRecord {
    /// `path` is absolute for roots and relative for children.
    #[must_use]
    pub fn new(path: &str, view: View) -> Self {
        Self {
            path: path.to_owned(),
            name: None,
            view,
            meta: RouteMeta::PUBLIC,
            children: Vec::new(),
            segments: parse_pattern(path),
        }
    }

    #[must_use]
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_owned());
        self
    }

    #[must_use]
    pub fn meta(mut self, meta: RouteMeta) -> Self {
        self.meta = meta;
        self
    }

    #[must_use]
    pub fn children(mut self, children: Vec<RouteRecord>) -> Self {
        self.children = children;
        self
    }

    /// Consume this record's own segments from the front of `segs`.
    fn match_prefix<'s>(&self, segs: &'s [&'s str], params: &mut BTreeMap<String, String>) -> Option<&'s [&'s str]> {
        let mut rest = segs;
        for segment in &self.segments {
            match segment {
                Segment::Static(expected) => {
                    let (head, tail) = rest.split_first()?;
                    if !head.eq_ignore_ascii_case(expected) {
                        return None;
                    }
                    rest = tail;
                }
                Segment::Param(name) => {
                    let (head, tail) = rest.split_first()?;
                    params.insert(name.clone(), (*head).to_owned());
                    rest = tail;
                }
                Segment::CatchAll(name) => {
                    params.insert(name.clone(), rest.join("/"));
                    rest = &[];
                }
            }
        }
        Some(rest)
    }
}

/// One record on a matched chain, with its path joined onto its ancestors'.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchedRecord {
    pub path: String,
    pub name: Option<String>,
    pub view: View,
    pub meta: RouteMeta,
}

/// A resolved location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteMatch {
    /// Normalized path without query or fragment.
    pub path: String,
    /// Path plus query and fragment, as it should be restored after login.
    pub full_path: String,
    pub query: Option<String>,
    pub params: BTreeMap<String, String>,
    /// Root to leaf; never empty.
    pub matched: Vec<MatchedRecord>,
}

impl RouteMatch {
    #[must_use]
    pub fn requires_auth(&self) -> bool {
        self.matched.iter().any(|r| r.meta.requires_auth)
    }

    #[must_use]
    pub fn requires_admin(&self) -> bool {
        self.matched.iter().any(|r| r.meta.requires_admin)
    }

    #[must_use]
    pub fn keep_alive(&self) -> bool {
        self.leaf().is_some_and(|r| r.meta.keep_alive)
    }

    #[must_use]
    pub fn leaf(&self) -> Option<&MatchedRecord> {
        self.matched.last()
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.leaf().and_then(|r| r.name.as_deref())
    }

    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

#[derive(Clone, Debug)]
pub struct RouteTable {
    routes: Vec<RouteRecord>,
}

impl RouteTable {
    #[must_use]
    pub fn new(routes: Vec<RouteRecord>) -> Self {
        Self { routes }
    }

    #[must_use]
    pub fn routes(&self) -> &[RouteRecord] {
        &self.routes
    }

    /// Resolve a location such as `/database/7?tab=files#top`.
    #[must_use]
    pub fn resolve(&self, location: &str) -> Option<RouteMatch> {
        let (path, query, fragment) = split_location(location);
        let segs: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let (chain, params) = self.routes.iter().find_map(|record| match_from(record, &segs))?;

        let mut full_path = path.clone();
        if let Some(q) = &query {
            full_path.push('?');
            full_path.push_str(q);
        }
        if let Some(f) = fragment {
            full_path.push('#');
            full_path.push_str(f);
        }

        let mut joined = String::new();
        let matched = chain
            .into_iter()
            .map(|record| {
                joined = join_paths(&joined, &record.path);
                MatchedRecord { path: joined.clone(), name: record.name.clone(), view: record.view, meta: record.meta }
            })
            .collect();

        Some(RouteMatch { path, full_path, query, params, matched })
    }
}

type Chain<'a> = (Vec<&'a RouteRecord>, BTreeMap<String, String>);

fn match_from<'a>(record: &'a RouteRecord, segs: &[&str]) -> Option<Chain<'a>> {
    let mut params = BTreeMap::new();
    let rest = record.match_prefix(segs, &mut params)?;

    for child in &record.children {
        if let Some((mut chain, child_params)) = match_from(child, rest) {
            chain.insert(0, record);
            params.extend(child_params);
            return Some((chain, params));
        }
    }

    rest.is_empty().then(|| (vec![record], params))
}

fn split_location(location: &str) -> (String, Option<String>, Option<&str>) {
    let (before_hash, fragment) = match location.split_once('#') {
        Some((before, frag)) => (before, Some(frag)),
        None => (location, None),
    };
    let (raw_path, query) = match before_hash.split_once('?') {
        Some((p, q)) => (p, Some(q.to_owned())),
        None => (before_hash, None),
    };
    (normalize_path(raw_path), query.filter(|q| !q.is_empty()), fragment.filter(|f| !f.is_empty()))
}

/// Leading slash added, trailing slashes dropped, `/` for the empty path.
#[must_use]
pub fn normalize_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_owned()
    } else if trimmed.starts_with('/') {
        trimmed.to_owned()
    } else {
        format!("/{trimmed}")
    }
}

fn join_paths(parent: &str, child: &str) -> String {
    if child.starts_with('/') || parent.is_empty() {
        return normalize_path(child);
    }
    if child.is_empty() {
        return parent.to_owned();
    }
    normalize_path(&format!("{}/{child}", parent.trim_end_matches('/')))
}

// =============================================================================
// APPLICATION ROUTES
// =============================================================================

/// Name of the login record; also the public root.
pub const LOGIN_ROUTE: &str = "login";

/// The console's route table.
#[must_use]
pub fn app_routes() -> RouteTable {
    RouteTable::new(vec![
        RouteRecord::new("/", View::Login).name(LOGIN_ROUTE),
        RouteRecord::new("/agent", View::AppLayout).name("AgentMain").children(vec![
            RouteRecord::new("", View::Agent).name("AgentComp").meta(RouteMeta::admin().keep_alive()),
        ]),
        RouteRecord::new("/agent/:agent_id", View::AgentSingle)
            .name("AgentSinglePage")
            .meta(RouteMeta::auth()),
        RouteRecord::new("/graph", View::AppLayout)
            .name("graph")
            .children(vec![RouteRecord::new("", View::Graph).name("GraphComp").meta(RouteMeta::admin())]),
        RouteRecord::new("/database", View::AppLayout).name("database").children(vec![
            RouteRecord::new("", View::Database).name("DatabaseComp").meta(RouteMeta::auth().keep_alive()),
            RouteRecord::new(":database_id", View::DatabaseInfo)
                .name("DatabaseInfoComp")
                .meta(RouteMeta::auth()),
        ]),
        RouteRecord::new("/dashboard", View::AppLayout).name("dashboard").children(vec![
            RouteRecord::new("", View::Dashboard).name("DashboardComp").meta(RouteMeta::admin()),
        ]),
        RouteRecord::new("/knowledge", View::AppLayout).name("knowledge").children(vec![
            RouteRecord::new("", View::Knowledge).name("KnowledgeComp").meta(RouteMeta::auth().keep_alive()),
        ]),
        RouteRecord::new("/:pathMatch(.*)*", View::NotFound).name("NotFound"),
    ])
}
