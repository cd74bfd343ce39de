//! Wire types for the knowledge-base REST API.
//!
//! DESIGN
//! ======
//! Response types decode leniently (defaults on everything the backend may
//! omit) so a backend adding or dropping optional columns never breaks the
//! console. Request types skip `None` fields so partial updates stay partial.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

// =============================================================================
// ENVELOPES
// =============================================================================

/// The `{success, data, message}` wrapper most endpoints return.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

/// Every shape a list endpoint has been observed to return.
///
/// Older backends answered list calls with a bare array; current ones wrap
/// it in an [`Envelope`]. Elements stay raw until [`ListResponse::into_list`]
/// so one malformed row cannot hide the rest. Anything else is kept verbatim
/// for diagnostics.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ListResponse {
    Envelope { success: bool, data: Vec<serde_json::Value> },
    Bare(Vec<serde_json::Value>),
    Unrecognized(serde_json::Value),
}

impl ListResponse {
    /// Collapse to the bare list of `T`.
    ///
    /// An envelope yields its `data` only when `success` is true; an
    /// unrecognized body yields an empty list. Elements that do not decode
    /// as `T` are skipped with a warning.
    pub fn into_list<T: DeserializeOwned>(self) -> Vec<T> {
        let rows = match self {
            Self::Envelope { success: true, data } | Self::Bare(data) => data,
            Self::Envelope { success: false, .. } => {
                tracing::debug!("list envelope reported failure; treating as empty");
                return Vec::new();
            }
            Self::Unrecognized(body) => {
                tracing::debug!(%body, "unrecognized list response; treating as empty");
                return Vec::new();
            }
        };

        rows.into_iter()
            .enumerate()
            .filter_map(|(index, row)| match serde_json::from_value(row) {
                Ok(item) => Some(item),
                Err(e) => {
                    tracing::warn!(index, error = %e, "skipping malformed list element");
                    None
                }
            })
            .collect()
    }
}

// =============================================================================
// USERS
// =============================================================================

/// Role attached to a loaded user profile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    SuperAdmin,
    Admin,
    /// Plain users, and any role string this console does not know.
    #[default]
    #[serde(other)]
    User,
}

impl Role {
    #[must_use]
    pub fn is_admin(self) -> bool {
        matches!(self, Self::Admin | Self::SuperAdmin)
    }
}

/// The current-user profile returned by `/api/auth/me`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub role: Role,
    pub department_id: Option<i64>,
    pub department_name: Option<String>,
}

/// Body of a successful `/api/auth/token` call.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: Option<String>,
}

// =============================================================================
// DEPARTMENTS
// =============================================================================

fn default_true() -> bool {
    true
}

/// A department node. Tree endpoints nest descendants under `children`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Department {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub level: i32,
    /// Materialized ancestor path, e.g. `/1/4/9`.
    pub path: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Department>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DepartmentCreate {
    pub name: String,
    /// `None` creates a top-level department.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub sort_order: i32,
}

impl DepartmentCreate {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), parent_id: None, description: None, sort_order: 0 }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DepartmentUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl DepartmentUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

// =============================================================================
// FILE SEARCH
// =============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Filename,
    FileSize,
}

impl SortField {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::Filename => "filename",
            Self::FileSize => "file_size",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Multi-department file search parameters.
///
/// `department_ids: None` lets the backend fall back to the caller's own
/// department.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FileSearchRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department_ids: Option<Vec<i64>>,
    pub include_subdepts: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_types: Option<Vec<String>>,
    /// ISO-8601 lower bound on `created_at`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_to: Option<String>,
    pub page: u32,
    pub page_size: u32,
    pub sort_by: SortField,
    pub order: SortOrder,
}

impl Default for FileSearchRequest {
    fn default() -> Self {
        Self {
            department_ids: None,
            include_subdepts: true,
            keyword: None,
            file_types: None,
            date_from: None,
            date_to: None,
            page: 1,
            page_size: 20,
            sort_by: SortField::default(),
            order: SortOrder::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: i64,
    #[serde(default)]
    pub file_id: String,
    #[serde(default)]
    pub kb_id: String,
    #[serde(default)]
    pub filename: String,
    pub file_path: Option<String>,
    pub file_size: Option<i64>,
    pub file_type: Option<String>,
    pub status: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub created_by_name: Option<String>,
    pub download_url: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSearchResult {
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub files: Vec<FileRecord>,
    /// File counts keyed by department id.
    pub department_stats: BTreeMap<String, u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStats {
    pub total_kbs: u64,
    pub accessible_kbs: u64,
    pub total_files: u64,
    pub department_ids: Vec<i64>,
}

/// Departments the caller may search, from `/api/files/my-departments`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchableDepartments {
    pub user_id: Option<i64>,
    pub departments: Vec<Department>,
    pub department: Option<Department>,
}
