//! Refresh: pick the item for the user and record it in their history.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::SelectionConfig;
use crate::content::ItemContent;
use crate::error::LyreError;
use crate::history::{self, HistoryEntry};
use crate::selector;
use crate::session::{SessionStore, UserSession};
use crate::wikidata::ItemSource;

pub struct Refresher {
    source: Arc<dyn ItemSource>,
    store: Arc<dyn SessionStore>,
    selection: SelectionConfig,
    /// Seeds one RNG per refresh; never locked across an await.
    rng: Mutex<StdRng>,
}

impl Refresher {
    pub fn new(
        source: Arc<dyn ItemSource>,
        store: Arc<dyn SessionStore>,
        selection: SelectionConfig,
    ) -> Self {
        Self::with_rng(source, store, selection, StdRng::from_entropy())
    }

    pub fn with_rng(
        source: Arc<dyn ItemSource>,
        store: Arc<dyn SessionStore>,
        selection: SelectionConfig,
        rng: StdRng,
    ) -> Self {
        Self {
            source,
            store,
            selection,
            rng: Mutex::new(rng),
        }
    }

    /// Load the user behind `session_token` and refresh it.
    pub async fn refresh_token(&self, session_token: &str) -> Result<ItemContent, LyreError> {
        let mut session = self.store.current_user(session_token).await?;
        self.refresh(&mut session).await
    }

    pub async fn refresh(&self, session: &mut UserSession) -> Result<ItemContent, LyreError> {
        self.refresh_at(session, Local::now()).await
    }

    fn call_rng(&self) -> StdRng {
        let mut seed = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        StdRng::from_rng(&mut *seed).unwrap_or_else(|_| StdRng::from_entropy())
    }

    /// Select the next item as of `now`. A newly seen item is appended to the
    /// history and saved; a failed save is logged and the item still returned.
    /// Stored entries that cannot be decoded are ignored for selection and
    /// written back unchanged.
    pub async fn refresh_at<Tz: TimeZone>(
        &self,
        session: &mut UserSession,
        now: DateTime<Tz>,
    ) -> Result<ItemContent, LyreError>
    where
        Tz::Offset: Send,
    {
        let history = history::read_history(session);
        let day_start = selector::start_of_day(&now);

        let mut rng = self.call_rng();
        let item = selector::next_item(
            self.source.as_ref(),
            &history,
            day_start,
            &self.selection,
            &mut rng,
        )
        .await?;

        if history::contains(&history, &item.id) {
            return Ok(item);
        }

        let entry = HistoryEntry::new(item.id.clone(), now.with_timezone(&Utc));
        if let Err(e) = session.append_history(&entry) {
            tracing::error!(user = %session.object_id, error = %e, "Not saving history");
            return Ok(item);
        }

        match self.store.save(session).await {
            Ok(()) => tracing::info!(user = %session.object_id, id = %item.id, "Recorded item in history"),
            Err(e) => tracing::error!(user = %session.object_id, id = %item.id, error = %e, "Failed to save history"),
        }

        Ok(item)
    }
}
