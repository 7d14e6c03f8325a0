//! Picking the item to show next.
//!
//! The latest viewed item stays on screen until it goes stale: a view is
//! stale once `viewed_at - window` falls before the start of the current
//! local day. After that a new item is drawn uniformly from the candidates
//! the user has not seen yet.

use std::collections::HashSet;

use chrono::{DateTime, Duration, NaiveTime, Offset, TimeZone, Utc};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::SelectionConfig;
use crate::content::{resolve_content, ItemContent};
use crate::error::LyreError;
use crate::history::{read_ids, sort_by_time_desc, HistoryEntry};
use crate::wikidata::ItemSource;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Keep showing the latest viewed item.
    Keep(String),
    /// Draw a new item from the unread candidates.
    PickUnread,
}

/// Midnight of `now`'s calendar day, in `now`'s time zone.
pub fn start_of_day<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Utc> {
    let midnight = now.date_naive().and_time(NaiveTime::MIN);
    match now.timezone().from_local_datetime(&midnight).earliest() {
        Some(start) => start.with_timezone(&Utc),
        None => {
            // Midnight skipped by a DST jump.
            let offset = Duration::seconds(now.offset().fix().local_minus_utc() as i64);
            Utc.from_utc_datetime(&(midnight - offset))
        }
    }
}

pub fn is_stale(viewed_at: DateTime<Utc>, day_start: DateTime<Utc>, window: Duration) -> bool {
    viewed_at - window < day_start
}

pub fn decide(history: &[HistoryEntry], day_start: DateTime<Utc>, window: Duration) -> Decision {
    let mut sorted = history.to_vec();
    sort_by_time_desc(&mut sorted);

    match sorted.into_iter().next() {
        Some(latest) if !is_stale(latest.time, day_start, window) => Decision::Keep(latest.id),
        _ => Decision::PickUnread,
    }
}

/// Uniform sample from `all_ids` minus `read`; `None` when everything was read.
pub fn pick_unread<R: Rng + ?Sized>(
    all_ids: &[String],
    read: &HashSet<&str>,
    rng: &mut R,
) -> Option<String> {
    let unread: Vec<&String> = all_ids
        .iter()
        .filter(|id| !read.contains(id.as_str()))
        .collect();

    unread.choose(rng).map(|id| (*id).clone())
}

/// Decide on the next item for `history` and resolve its content.
pub async fn next_item<R: Rng + ?Sized + Send>(
    source: &dyn ItemSource,
    history: &[HistoryEntry],
    day_start: DateTime<Utc>,
    selection: &SelectionConfig,
    rng: &mut R,
) -> Result<ItemContent, LyreError> {
    let id = match decide(history, day_start, selection.refresh_window()) {
        Decision::Keep(id) => {
            tracing::info!(id = %id, "Latest item still fresh");
            id
        }
        Decision::PickUnread => {
            let all_ids = source.all_item_ids().await?;
            let picked = {
                let read = read_ids(history);
                pick_unread(&all_ids, &read, rng)
            };
            let id = picked.ok_or(LyreError::NoUnreadItems)?;
            tracing::info!(id = %id, candidates = all_ids.len(), read = history.len(), "Picked new item");
            id
        }
    };

    resolve_content(source, &id, &selection.language).await
}
