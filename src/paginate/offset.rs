use std::collections::HashSet;

use crate::error::Result;
use crate::upstream::ListingSource;

use super::{OffsetPage, PageLimits, fetch_items, item_key, validate_take};

/// Returns up to `take` distinct items starting at the `offset`-th item of the listing.
pub async fn paginate(
    source: &dyn ListingSource,
    limits: PageLimits,
    offset: u64,
    take: u32,
) -> Result<OffsetPage> {
    let want = validate_take(take)?;
    let page_size = u64::from(limits.page_size.max(1));
    let start_page = u32::try_from(offset / page_size + 1).unwrap_or(u32::MAX);
    let start_index = (offset % page_size) as usize;

    let mut results = Vec::with_capacity(want);
    let mut seen: HashSet<String> = HashSet::new();
    let mut page = start_page;

    while results.len() < want {
        if page > limits.page_ceiling {
            tracing::warn!(
                page,
                ceiling = limits.page_ceiling,
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

        let on_page = items.len();
        let skip = if page == start_page { start_index } else { 0 };
        for item in items.into_iter().skip(skip) {
            let Some(key) = item_key(&item) else {
                continue;
            };
            if !seen.insert(key) {
                continue;
            }
            results.push(item);
            if results.len() == want {
                break;
            }
        }
        tracing::debug!(page, on_page, collected = results.len(), "consumed page");

        page = page.saturating_add(1);
    }

    results.truncate(want);
    Ok(OffsetPage {
        status: 200,
        offset,
        take,
        count: results.len(),
        has_more: results.len() == want,
        data: results,
    })
}
