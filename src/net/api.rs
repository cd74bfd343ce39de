//! REST API wrappers for the knowledge-base backend.
//!
//! Each wrapper maps one console action to exactly one HTTP call against a
//! fixed path. Request shaping lives in the `*_request` builders so it can be
//! inspected without a network; the async methods only send and decode.
//!
//! ERROR HANDLING
//! ==============
//! Non-2xx responses come back as [`ApiError::Status`] with the body text
//! untouched. There are no retries. The one normalization is on list
//! endpoints, where any body that is not a successful envelope or a bare
//! array reads as "no results".

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use std::time::Duration;

use reqwest::{Method, Request, RequestBuilder, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::types::{
    Department, DepartmentCreate, DepartmentUpdate, Envelope, FileSearchRequest, FileSearchResult, FileStats,
    ListResponse, SearchableDepartments, TokenResponse, UserProfile,
};
use crate::config::{ConsoleConfig, HttpTimeouts, normalize_base_url};
use crate::state::session::ProfileSource;

const DEPARTMENTS: &str = "/api/departments";
const FILES_SEARCH: &str = "/api/files/search";
const FILES_STATS: &str = "/api/files/stats";
const FILES_MY_DEPARTMENTS: &str = "/api/files/my-departments";
const AUTH_ME: &str = "/api/auth/me";
const AUTH_TOKEN: &str = "/api/auth/token";

/// Errors produced by API calls.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("http request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("response decode failed: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ApiError {
    /// True when the backend rejected the credential itself.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Status { status: 401 | 403, .. })
    }
}

/// HTTP client bound to one backend origin and, optionally, one credential.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Build a client for `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL does not parse or the HTTP client cannot
    /// be constructed.
    pub fn new(base_url: &str, timeouts: HttpTimeouts) -> Result<Self, ApiError> {
        let base_url = normalize_base_url(base_url);
        Url::parse(&base_url).map_err(|e| ApiError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url, token: None })
    }

    /// Build a client from parsed console config.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::new`].
    pub fn from_config(config: &ConsoleConfig) -> Result<Self, ApiError> {
        Self::new(&config.api_url, config.timeouts)
    }

    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =========================================================================
    // DEPARTMENTS
    // =========================================================================

    pub fn get_departments_request(&self) -> Result<Request, ApiError> {
        Ok(self.builder(Method::GET, &format!("{DEPARTMENTS}/tree"))?.build()?)
    }

    /// Fetch the department tree, normalized to a bare list.
    ///
    /// # Errors
    ///
    /// Transport failures and non-2xx statuses. An unrecognized body is not
    /// an error; it yields an empty list.
    pub async fn get_departments(&self) -> Result<Vec<Department>, ApiError> {
        let request = self.get_departments_request()?;
        self.send_list(request).await
    }

    pub fn get_department_request(&self, id: i64) -> Result<Request, ApiError> {
        Ok(self.builder(Method::GET, &format!("{DEPARTMENTS}/{id}"))?.build()?)
    }

    /// Fetch one department together with its descendants.
    ///
    /// # Errors
    ///
    /// Transport failures, non-2xx statuses, undecodable bodies.
    pub async fn get_department(&self, id: i64) -> Result<Envelope<Vec<Department>>, ApiError> {
        let request = self.get_department_request(id)?;
        self.send_json(request).await
    }

    pub fn create_department_request(&self, body: &DepartmentCreate) -> Result<Request, ApiError> {
        Ok(self.builder(Method::POST, DEPARTMENTS)?.json(body).build()?)
    }

    /// # Errors
    ///
    /// Transport failures, non-2xx statuses, undecodable bodies.
    pub async fn create_department(&self, body: &DepartmentCreate) -> Result<Envelope<Department>, ApiError> {
        let request = self.create_department_request(body)?;
        self.send_json(request).await
    }

    pub fn update_department_request(&self, id: i64, body: &DepartmentUpdate) -> Result<Request, ApiError> {
        Ok(self.builder(Method::PUT, &format!("{DEPARTMENTS}/{id}"))?.json(body).build()?)
    }

    /// # Errors
    ///
    /// Transport failures, non-2xx statuses, undecodable bodies.
    pub async fn update_department(&self, id: i64, body: &DepartmentUpdate) -> Result<Envelope<Department>, ApiError> {
        let request = self.update_department_request(id, body)?;
        self.send_json(request).await
    }

    /// `force` also removes a department that still has children or members.
    pub fn delete_department_request(&self, id: i64, force: bool) -> Result<Request, ApiError> {
        let mut builder = self.builder(Method::DELETE, &format!("{DEPARTMENTS}/{id}"))?;
        if force {
            builder = builder.query(&[("force", "true")]);
        }
        Ok(builder.build()?)
    }

    /// # Errors
    ///
    /// Transport failures, non-2xx statuses, undecodable bodies.
    pub async fn delete_department(&self, id: i64, force: bool) -> Result<Envelope<serde_json::Value>, ApiError> {
        let request = self.delete_department_request(id, force)?;
        self.send_json(request).await
    }

    // =========================================================================
    // FILES
    // =========================================================================

    pub fn search_files_request(&self, params: &FileSearchRequest) -> Result<Request, ApiError> {
        Ok(self.builder(Method::POST, FILES_SEARCH)?.json(params).build()?)
    }

    /// Search files with a JSON body.
    ///
    /// # Errors
    ///
    /// Transport failures, non-2xx statuses, undecodable bodies.
    pub async fn search_files(&self, params: &FileSearchRequest) -> Result<Envelope<FileSearchResult>, ApiError> {
        let request = self.search_files_request(params)?;
        self.send_json(request).await
    }

    pub fn search_files_get_request(&self, params: &FileSearchRequest) -> Result<Request, ApiError> {
        Ok(self
            .builder(Method::GET, FILES_SEARCH)?
            .query(&search_query_pairs(params))
            .build()?)
    }

    /// Search files through the query-string variant.
    ///
    /// # Errors
    ///
    /// Transport failures, non-2xx statuses, undecodable bodies.
    pub async fn search_files_get(&self, params: &FileSearchRequest) -> Result<Envelope<FileSearchResult>, ApiError> {
        let request = self.search_files_get_request(params)?;
        self.send_json(request).await
    }

    pub fn get_file_stats_request(&self, department_ids: &[i64]) -> Result<Request, ApiError> {
        let mut pairs = Vec::new();
        if let Some(joined) = join_non_empty(department_ids) {
            pairs.push(("department_ids", joined));
        }
        Ok(self.builder(Method::GET, FILES_STATS)?.query(&pairs).build()?)
    }

    /// Knowledge-base and file counts for the given departments, or for the
    /// caller's own department when `department_ids` is empty.
    ///
    /// # Errors
    ///
    /// Transport failures, non-2xx statuses, undecodable bodies.
    pub async fn get_file_stats(&self, department_ids: &[i64]) -> Result<Envelope<FileStats>, ApiError> {
        let request = self.get_file_stats_request(department_ids)?;
        self.send_json(request).await
    }

    pub fn get_my_departments_request(&self) -> Result<Request, ApiError> {
        Ok(self.builder(Method::GET, FILES_MY_DEPARTMENTS)?.build()?)
    }

    /// # Errors
    ///
    /// Transport failures, non-2xx statuses, undecodable bodies.
    pub async fn get_my_departments(&self) -> Result<Envelope<SearchableDepartments>, ApiError> {
        let request = self.get_my_departments_request()?;
        self.send_json(request).await
    }

    // =========================================================================
    // AUTH
    // =========================================================================

    pub fn current_user_request(&self, token: &str) -> Result<Request, ApiError> {
        Ok(self.url_builder(Method::GET, AUTH_ME)?.bearer_auth(token).build()?)
    }

    /// Fetch the profile behind `token`.
    ///
    /// # Errors
    ///
    /// Transport failures, non-2xx statuses (401 for an expired credential),
    /// undecodable bodies.
    pub async fn current_user(&self, token: &str) -> Result<UserProfile, ApiError> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum MeResponse {
            Envelope { data: UserProfile },
            Bare(UserProfile),
        }

        let request = self.current_user_request(token)?;
        Ok(match self.send_json::<MeResponse>(request).await? {
            MeResponse::Envelope { data } | MeResponse::Bare(data) => data,
        })
    }

    pub fn login_request(&self, username: &str, password: &str) -> Result<Request, ApiError> {
        Ok(self
            .url_builder(Method::POST, AUTH_TOKEN)?
            .form(&[("username", username), ("password", password)])
            .build()?)
    }

    /// Exchange credentials for an access token.
    ///
    /// # Errors
    ///
    /// Transport failures, non-2xx statuses (401 for bad credentials),
    /// undecodable bodies.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenResponse, ApiError> {
        let request = self.login_request(username, password)?;
        self.send_json(request).await
    }

    // =========================================================================
    // TRANSPORT
    // =========================================================================

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        let raw = format!("{}{path}", self.base_url);
        Url::parse(&raw).map_err(|e| ApiError::InvalidBaseUrl(format!("{raw}: {e}")))
    }

    fn url_builder(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        Ok(self.http.request(method, self.url(path)?))
    }

    /// Start a request carrying the client's credential, if any.
    fn builder(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let builder = self.url_builder(method, path)?;
        Ok(match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    async fn send_text(&self, request: Request) -> Result<String, ApiError> {
        let method = request.method().clone();
        let path = request.url().path().to_owned();
        let response = self.http.execute(request).await?;
        let status = response.status();
        let body = response.text().await?;
        tracing::debug!(%method, %path, status = status.as_u16(), "api call finished");
        if !status.is_success() {
            return Err(ApiError::Status { status: status.as_u16(), body });
        }
        Ok(body)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: Request) -> Result<T, ApiError> {
        let body = self.send_text(request).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn send_list<T: DeserializeOwned>(&self, request: Request) -> Result<Vec<T>, ApiError> {
        let body = self.send_text(request).await?;
        Ok(parse_list(&body))
    }
}

#[async_trait::async_trait]
impl ProfileSource for ApiClient {
    async fn current_user(&self, token: &str) -> Result<UserProfile, ApiError> {
        Self::current_user(self, token).await
    }
}

/// Decode a list-endpoint body, treating anything unparsable as empty.
pub fn parse_list<T: DeserializeOwned>(body: &str) -> Vec<T> {
    match serde_json::from_str::<ListResponse>(body) {
        Ok(parsed) => parsed.into_list(),
        Err(e) => {
            tracing::debug!(error = %e, "list response is not JSON; treating as empty");
            Vec::new()
        }
    }
}

/// Flatten search parameters into query pairs.
///
/// Sequence-valued parameters become one comma-joined value each; empty
/// sequences and unset options are omitted.
#[must_use]
pub fn search_query_pairs(params: &FileSearchRequest) -> Vec<(&'static str, String)> {
    let mut pairs = Vec::new();
    if let Some(joined) = params.department_ids.as_deref().and_then(join_non_empty) {
        pairs.push(("department_ids", joined));
    }
    pairs.push(("include_subdepts", params.include_subdepts.to_string()));
    if let Some(keyword) = &params.keyword {
        pairs.push(("keyword", keyword.clone()));
    }
    if let Some(joined) = params.file_types.as_deref().and_then(join_non_empty) {
        pairs.push(("file_types", joined));
    }
    if let Some(from) = &params.date_from {
        pairs.push(("date_from", from.clone()));
    }
    if let Some(to) = &params.date_to {
        pairs.push(("date_to", to.clone()));
    }
    pairs.push(("page", params.page.to_string()));
    pairs.push(("page_size", params.page_size.to_string()));
    pairs.push(("sort_by", params.sort_by.as_str().to_owned()));
    pairs.push(("order", params.order.as_str().to_owned()));
    pairs
}

fn join_non_empty<T: ToString>(values: &[T]) -> Option<String> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().map(ToString::to_string).collect::<Vec<_>>().join(","))
}
