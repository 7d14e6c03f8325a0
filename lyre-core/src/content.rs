//! Localized content for one item: the preferred wiki article, rewritten to
//! the mobile site.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::LyreError;
use crate::wikidata::{ItemSource, SiteLink};

/// What the app displays for an item. Every field but `id` is absent when
/// the entity has no site links at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemContent {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ItemContent {
    fn from_link(id: &str, link: SiteLink) -> Self {
        Self {
            id: id.to_string(),
            site: Some(link.site),
            title: Some(link.title),
            url: link.url.map(|url| mobile_url(&url)),
        }
    }

    fn bare(id: &str) -> Self {
        Self {
            id: id.to_string(),
            site: None,
            title: None,
            url: None,
        }
    }
}

/// Insert an `m` label after the first label of the host.
///
/// `https://en.wikipedia.org/wiki/X` becomes `https://en.m.wikipedia.org/wiki/X`.
/// Hosts without a dot, hosts that are already mobile and unparseable input
/// come back unchanged.
pub fn mobile_url(url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        tracing::debug!(url = %url, "Not an absolute URL, leaving as is");
        return url.to_string();
    };

    let Some(host) = parsed.host_str() else {
        return url.to_string();
    };

    let mut labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 || labels[1] == "m" {
        return url.to_string();
    }
    labels.insert(1, "m");
    let mobile_host = labels.join(".");

    match parsed.set_host(Some(&mobile_host)) {
        Ok(()) => parsed.to_string(),
        Err(e) => {
            tracing::debug!(url = %url, error = %e, "Could not rewrite host");
            url.to_string()
        }
    }
}

/// Fetch `id` from `source` and pick the `<lang>wiki` link, falling back to
/// the first link in wiki-code order, or to a bare `{id}` record when the
/// entity has no links.
pub async fn resolve_content(
    source: &dyn ItemSource,
    id: &str,
    lang: &str,
) -> Result<ItemContent, LyreError> {
    let mut sitelinks = source.item_sitelinks(id).await?;
    let wiki_name = format!("{}wiki", lang);

    let chosen = match sitelinks.remove(&wiki_name) {
        Some(link) => Some(link),
        None => sitelinks.into_values().next(),
    };

    let content = match chosen {
        Some(link) => ItemContent::from_link(id, link),
        None => {
            tracing::warn!(id = %id, "Item has no site links");
            ItemContent::bare(id)
        }
    };

    tracing::debug!(id = %id, site = ?content.site, "Resolved item content");
    Ok(content)
}
