//! Paged partition queries.

use tracing::debug;

use super::{Item, Result, Table};
use crate::entity::KeyQuery;

/// List every item under a parent, following pages until exhaustion.
///
/// Callers never see a partial result; total size is unbounded.
pub async fn list_children(
    table: &dyn Table,
    query: &KeyQuery,
    page_size: usize,
) -> Result<Vec<Item>> {
    let page_size = page_size.max(1);
    let mut items = Vec::new();
    let mut start = None;
    let mut pages = 0usize;

    loop {
        let page = table.query(query, start.as_ref(), page_size).await?;
        pages += 1;
        items.extend(page.items);
        match page.last_evaluated {
            Some(last) => start = Some(last),
            None => break,
        }
    }

    debug!(
        partition = %query.partition,
        prefix = ?query.prefix,
        pages,
        count = items.len(),
        "Listed children"
    );

    Ok(items)
}
