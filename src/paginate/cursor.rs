use std::collections::HashSet;

use crate::error::Result;
use crate::upstream::ListingSource;

use super::{CursorPage, PageLimits, fetch_items, item_key, validate_take};

/// Returns up to `take` distinct items that follow `cursor` in the listing.
///
/// The cursor is the identifier of the last item a client already has, so the
/// scan always restarts at upstream page 1 and skips everything up to and
/// including that item. A cursor that never shows up yields an empty page with
/// no `next_cursor`.
pub async fn paginate(
    source: &dyn ListingSource,
    limits: PageLimits,
    cursor: Option<&str>,
    take: u32,
) -> Result<CursorPage> {
    let want = validate_take(take)?;
    let cursor = cursor.map(str::trim).filter(|c| !c.is_empty());

    let mut found = cursor.is_none();
    let mut results = Vec::with_capacity(want);
    let mut seen: HashSet<String> = HashSet::new();
    let mut next_cursor: Option<String> = None;
    let mut page: u32 = 1;

    while results.len() < want {
        if page > limits.page_ceiling {
            tracing::warn!(
                page,
                ceiling = limits.page_ceiling,
                found_cursor = found,
                collected = results.len(),
                "page ceiling reached; treating listing as exhausted"
            );
            break;
        }

        let items = fetch_items(source, page, limits).await?;
        if items.is_empty() {
            tracing::debug!(page, "upstream exhausted");
            break;
        }

        for item in items {
            let Some(key) = item_key(&item) else {
                continue;
            };
            if !found {
                if cursor == Some(key.as_str()) {
                    tracing::debug!(page, cursor = %key, "cursor located");
                    found = true;
                    seen.insert(key);
                }
                continue;
            }
            if !seen.insert(key.clone()) {
                continue;
            }
            next_cursor = Some(key);
            results.push(item);
            if results.len() == want {
                break;
            }
        }
        tracing::debug!(page, collected = results.len(), "consumed page");

        page = page.saturating_add(1);
    }

    if !found {
        tracing::debug!(cursor = ?cursor, "cursor never matched; returning empty page");
    }

    Ok(CursorPage {
        status: 200,
        cursor: cursor.map(str::to_owned),
        take,
        count: results.len(),
        has_more: results.len() == want,
        data: results,
        next_cursor,
    })
}
