//! Paginated retrieval of every item picked in a completed session.

use crate::client::SessionApi;
use crate::error::Result;
use crate::executor::TaskContext;
use crate::types::{MediaItem, SessionId};
use tracing::{debug, warn};

/// Why pagination stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchStop {
    /// The last page carried no next token
    Exhausted,
    /// A page came back empty but still carried a token; stopped early
    EmptyPageWithToken,
    /// `max_pages` pages were fetched and the server still offered more
    PageLimit,
}

/// Items gathered from all pages, in server order
#[derive(Clone, Debug)]
pub struct FetchOutcome {
    /// Every item, in the order the pages returned them
    pub items: Vec<MediaItem>,
    /// Pages requested
    pub pages: u32,
    /// Why the loop ended
    pub stop: FetchStop,
}

/// Walk all result pages of `session_id`
///
/// Runs inside an executor task. Checks for cancellation before every page;
/// neither the empty-page anomaly nor the page limit is an error, both return
/// what was gathered so far.
pub async fn fetch_all_media_items(
    api: &dyn SessionApi,
    ctx: &TaskContext,
    session_id: &SessionId,
    page_size: u32,
    max_pages: u32,
) -> Result<FetchOutcome> {
    let mut items = Vec::new();
    let mut page_token: Option<String> = None;
    let mut page_count = 0u32;
    let mut pages = 0u32;

    let stop = loop {
        ctx.check_cancelled()?;
        let page = api
            .fetch_page(session_id, page_size, page_token.as_deref())
            .await?;
        pages += 1;

        let page_items = page.media_items.len();
        let next_token = page.next_token().map(str::to_string);
        items.extend(page.media_items);

        let Some(next_token) = next_token else {
            break FetchStop::Exhausted;
        };

        if page_items == 0 {
            warn!(
                session_id = %session_id.short(),
                "Received 0 items but nextPageToken exists - stopping pagination"
            );
            break FetchStop::EmptyPageWithToken;
        }

        page_count += 1;
        debug!(
            page = page_count,
            page_items,
            total = items.len(),
            "Fetched media items page"
        );

        if page_count >= max_pages {
            warn!(
                session_id = %session_id.short(),
                max_pages,
                "Reached maximum page limit"
            );
            break FetchStop::PageLimit;
        }
        page_token = Some(next_token);
    };

    Ok(FetchOutcome { items, pages, stop })
}
