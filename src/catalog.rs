use async_stream::try_stream;
use chrono::{DateTime, Duration, Utc};
use futures::{Stream, TryStreamExt};
use tracing::{debug, instrument, trace};
use youtube::models::ListResponse;
use youtube::search::{self, Order};

use crate::models::CandidateItem;

/// Largest page the search endpoint hands out.
pub const PAGE_SIZE: u32 = 50;

/// Lower bound of a scan: the watermark, or `lookback` before `now` when the serial is new.
#[must_use]
pub fn published_after(
    watermark: Option<DateTime<Utc>>,
    lookback: Duration,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    watermark.unwrap_or_else(|| now - lookback)
}

/// Every result page of a channel search, newest first, following `nextPageToken`.
pub fn pages<'a>(
    client: &'a youtube::Client,
    channel_id: &'a str,
    published_after: DateTime<Utc>,
) -> impl Stream<Item = Result<ListResponse, youtube::Error>> + Send + 'a {
    try_stream! {
        let mut page_token: Option<String> = None;
        loop {
            let params = search::Params {
                channel_id: Some(channel_id),
                published_after: Some(published_after),
                max_results: Some(PAGE_SIZE),
                order: Some(Order::Date),
                page_token: page_token.as_deref(),
            };
            let page = search::list(client, &params).await?;
            let next = page.next_page_token.clone();
            let last = next.is_none() || next == page_token;
            trace!(items = page.items.len(), ?next, "received search page");
            yield page;
            if last {
                break;
            }
            page_token = next;
        }
    }
}

/// All videos of `channel_id` published after `published_after`, oldest first.
///
/// A failing page fails the whole search, nothing is returned partially.
#[instrument(skip(client))]
pub async fn search(
    client: &youtube::Client,
    channel_id: &str,
    published_after: DateTime<Utc>,
) -> Result<Vec<CandidateItem>, youtube::Error> {
    let pages: Vec<ListResponse> = pages(client, channel_id, published_after)
        .try_collect()
        .await?;
    if let Some(first) = pages.first() {
        debug!(total_results = first.page_info.total_results, "searched channel");
    }

    let mut items: Vec<CandidateItem> = pages
        .into_iter()
        .flat_map(|page| page.items)
        .filter_map(|result| match CandidateItem::try_from(result) {
            Ok(item) => Some(item),
            Err(result) => {
                trace!(kind = %result.id.kind, "skipping non video result");
                None
            }
        })
        .collect();
    items.reverse();
    // stable, ties keep the reversed server order
    items.sort_by_key(|item| item.published_at);
    Ok(items)
}
