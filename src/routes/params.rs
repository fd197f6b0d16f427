//! Query parameter helpers shared by multiple API route handlers.
//!
//! The types follow Rocket's `FromForm` conventions and derive `JsonSchema` so
//! generated documentation reflects the available parameters and their defaults.

use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};

const fn default_page() -> i64 {
    1
}

const fn default_page_size() -> i64 {
    25
}

const MAX_PAGE_SIZE: i64 = 100;

/// Pagination plus an optional free-text filter for admin listings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, rocket::form::FromForm)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    /// Case-insensitive substring filter.
    #[serde(default)]
    pub q: Option<String>,
    /// One-based page index (defaults to the first page).
    #[field(default = 1)]
    #[serde(default = "default_page")]
    pub page: i64,
    /// Number of items per page (clamped between 1 and 100, default 25).
    #[field(default = 25)]
    #[serde(default = "default_page_size")]
    pub size: i64,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            q: None,
            page: default_page(),
            size: default_page_size(),
        }
    }
}

impl ListParams {
    /// Normalized 1-based page index.
    pub fn page(&self) -> i64 {
        self.page.max(1)
    }

    /// Normalized page size capped at [`MAX_PAGE_SIZE`].
    pub fn size(&self) -> i64 {
        self.size.clamp(1, MAX_PAGE_SIZE)
    }

    /// Row offset of the page, saturating for absurd page numbers.
    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.size())
    }

    /// `ILIKE` pattern for the search term, `None` when no filter applies.
    pub fn like_pattern(&self) -> Option<String> {
        self.q
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(|term| {
                let escaped = term
                    .replace('\\', "\\\\")
                    .replace('%', "\\%")
                    .replace('_', "\\_");
                format!("%{escaped}%")
            })
    }
}

/// Filters for a topic's question list.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, rocket::form::FromForm)]
pub struct TopicQuestionParams {
    /// Only demo questions when `true`.
    #[serde(default)]
    pub demo: Option<bool>,
    /// Maximum number of questions; ignored unless positive.
    #[serde(default)]
    pub limit: Option<i64>,
}

impl TopicQuestionParams {
    pub fn demo_only(&self) -> bool {
        self.demo.unwrap_or(false)
    }

    pub fn limit(&self) -> Option<i64> {
        self.limit.filter(|limit| *limit > 0)
    }
}

/// Subject/topic pair selecting a practice set. Both are required.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, rocket::form::FromForm)]
#[serde(rename_all = "camelCase")]
pub struct PracticeQuestionParams {
    #[field(name = "subjectId")]
    pub subject_id: Option<i32>,
    #[field(name = "topicId")]
    pub topic_id: Option<i32>,
}
