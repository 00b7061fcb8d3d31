use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::pagination::ListQuery;

/// ApiResponse
///
/// The uniform JSON envelope returned by every non-paginated endpoint:
/// a success flag, a human-readable message and an optional payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    /// A success with nothing to return (deletes, restores).
    pub fn done(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

/// PageMeta
///
/// Echoes the *effective* (sanitized) list parameters back to the client so it
/// can tell when a requested sort field or limit was rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PageMeta {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub pages: i64,
    #[serde(rename = "sortBy")]
    pub sort_by: String,
    pub order: String,
    pub search: String,
}

impl PageMeta {
    pub fn new(query: &ListQuery, total: i64) -> Self {
        Self {
            page: query.page,
            limit: query.limit,
            total,
            pages: query.pages(total),
            sort_by: query.sort_by.to_string(),
            order: query.order.as_str().to_string(),
            search: query.search.clone(),
        }
    }
}

/// PageResponse
///
/// Envelope for the paginated list endpoints (`/api/*-pag`, `/api/users`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Vec<T>,
    pub meta: PageMeta,
}

impl<T> PageResponse<T> {
    pub fn new(message: impl Into<String>, data: Vec<T>, query: &ListQuery, total: i64) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
            meta: PageMeta::new(query, total),
        }
    }
}
