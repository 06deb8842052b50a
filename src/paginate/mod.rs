//! Adapts the fixed-size, page-indexed upstream listing to client-facing
//! offset/take and cursor/take pagination.
//!
//! Both modes fetch upstream pages strictly in order, sanitize each page,
//! and drop items whose identifier was already emitted in the same response.
//! Every loop is bounded by [`PageLimits::page_ceiling`].

pub mod cursor;
pub mod offset;

use serde::Serialize;
use serde_json::Value;

use crate::error::{GatewayError, Result};
use crate::sanitize::clean;
use crate::upstream::ListingSource;

pub const DEFAULT_TAKE: u32 = 20;
pub const MAX_TAKE: u32 = 100;
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const DEFAULT_PAGE_CEILING: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    /// Items per upstream page. Independent of the client's `take`.
    pub page_size: u32,
    /// Highest upstream page number a single request may fetch.
    pub page_ceiling: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            page_ceiling: DEFAULT_PAGE_CEILING,
        }
    }
}

impl PageLimits {
    pub fn new(page_size: u32, page_ceiling: u32) -> anyhow::Result<Self> {
        if page_size == 0 {
            anyhow::bail!("page size must be >= 1");
        }
        if page_ceiling == 0 {
            anyhow::bail!("page ceiling must be >= 1");
        }
        Ok(Self {
            page_size,
            page_ceiling,
        })
    }
}

pub fn validate_take(take: u32) -> Result<usize> {
    if !(1..=MAX_TAKE).contains(&take) {
        return Err(GatewayError::validation(format!(
            "take must be between 1 and {MAX_TAKE}, got {take}"
        )));
    }
    Ok(take as usize)
}

/// Identity of a listing item: `slug` for series, `id`/`index` for chapters.
pub fn item_key(item: &Value) -> Option<String> {
    if let Some(slug) = non_empty_str(item.get("slug")) {
        return Some(slug.to_owned());
    }
    if let Some(slug) = non_empty_str(item.get("data").and_then(|d| d.get("slug"))) {
        return Some(slug.to_owned());
    }
    ["id", "index"]
        .iter()
        .find_map(|field| scalar_key(item.get(*field)?))
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value?.as_str().filter(|s| !s.is_empty())
}

fn scalar_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Fetch and sanitize one upstream page. A missing or non-array `data` means exhausted.
async fn fetch_items(
    source: &dyn ListingSource,
    page: u32,
    limits: PageLimits,
) -> Result<Vec<Value>> {
    let raw = source.listing_page(page, limits.page_size).await?;
    let items = match clean(raw) {
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };
    Ok(items)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OffsetPage {
    pub status: u16,
    pub offset: u64,
    pub take: u32,
    pub count: usize,
    /// `count == take`; does not look past the requested window.
    pub has_more: bool,
    pub data: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorPage {
    pub status: u16,
    pub cursor: Option<String>,
    pub take: u32,
    pub count: usize,
    pub has_more: bool,
    pub data: Vec<Value>,
    pub next_cursor: Option<String>,
}

impl OffsetPage {
    pub fn map_items(mut self, f: impl FnMut(Value) -> Value) -> Self {
        self.data = self.data.into_iter().map(f).collect();
        self
    }
}

impl CursorPage {
    pub fn map_items(mut self, f: impl FnMut(Value) -> Value) -> Self {
        self.data = self.data.into_iter().map(f).collect();
        self
    }
}
