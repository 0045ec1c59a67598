//! Draining paginated listings.

use std::future::Future;

use thiserror::Error;
use tracing::debug;

pub const DEFAULT_PAGE_SIZE: usize = 100;

/// A listing that stopped early. `records` holds every page fetched before
/// the failing one, in backend order.
#[derive(Debug, Error)]
#[error("listing stopped after {} records: {error}", records.len())]
pub struct PartialListing<T, E> {
    pub records: Vec<T>,
    #[source]
    pub error: E,
}

/// Fetch pages `1, 2, ...` of [`DEFAULT_PAGE_SIZE`] records until one comes
/// back short.
pub async fn scroll_all<T, E, F, Fut>(fetch: F) -> Result<Vec<T>, PartialListing<T, E>>
where
    F: FnMut(usize, usize) -> Fut,
    Fut: Future<Output = Result<Vec<T>, E>>,
{
    scroll_all_with_page_size(DEFAULT_PAGE_SIZE, fetch).await
}

/// Like [`scroll_all`] with an explicit page size. `fetch` receives
/// `(page_size, page_number)`; page numbers start at 1. The scroller does not
/// retry; wrap the fetch itself.
pub async fn scroll_all_with_page_size<T, E, F, Fut>(
    page_size: usize,
    mut fetch: F,
) -> Result<Vec<T>, PartialListing<T, E>>
where
    F: FnMut(usize, usize) -> Fut,
    Fut: Future<Output = Result<Vec<T>, E>>,
{
    let page_size = page_size.max(1);
    let mut records = Vec::new();
    let mut page_number = 1;
    loop {
        let page = match fetch(page_size, page_number).await {
            Ok(page) => page,
            Err(error) => return Err(PartialListing { records, error }),
        };
        let fetched = page.len();
        records.extend(page);
        debug!(page_number, fetched, total = records.len(), "fetched page");
        if fetched < page_size {
            return Ok(records);
        }
        page_number += 1;
    }
}
