//! Wikidata access: candidate discovery over SPARQL and site-link lookup over
//! the MediaWiki action API.
//!
//! Both calls sit behind the `ItemSource` trait so that selection and content
//! resolution can run against any source of entities.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

use crate::config::WikidataConfig;
use crate::error::LyreError;

// ============================================================================
// ItemSource trait
// ============================================================================

/// Abstraction over the knowledge graph the app draws its items from.
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// All candidate item identifiers (e.g. `Q6607`).
    async fn all_item_ids(&self) -> Result<Vec<String>, LyreError>;

    /// Site links of one item keyed by wiki code (`enwiki`, `dewiki`, ...).
    /// An item without any site links yields an empty map.
    async fn item_sitelinks(&self, id: &str) -> Result<BTreeMap<String, SiteLink>, LyreError>;
}

/// A per-language link from an entity to a wiki article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteLink {
    pub site: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

// ============================================================================
// API structs (private)
// ============================================================================

#[derive(Debug, Deserialize)]
struct SparqlResponse {
    results: SparqlResults,
}

#[derive(Debug, Deserialize)]
struct SparqlResults {
    bindings: Vec<SparqlBinding>,
}

#[derive(Debug, Deserialize)]
struct SparqlBinding {
    id: Option<SparqlValue>,
}

#[derive(Debug, Deserialize)]
struct SparqlValue {
    value: String,
}

#[derive(Debug, Deserialize)]
struct EntitiesResponse {
    #[serde(default)]
    entities: HashMap<String, EntityRecord>,
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct EntityRecord {
    #[serde(default)]
    sitelinks: BTreeMap<String, SiteLink>,
    missing: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    code: String,
    #[serde(default)]
    info: String,
}

/// SPARQL query selecting every transitive subclass of `category`.
pub fn all_items_query(category: &str) -> String {
    format!("SELECT ?id WHERE {{?id wdt:P279+ wd:{} .}}", category)
}

/// Last path segment of an entity IRI, `None` if the IRI ends in a slash.
pub fn id_from_iri(iri: &str) -> Option<&str> {
    iri.rsplit('/').next().filter(|segment| !segment.is_empty())
}

// ============================================================================
// WikidataClient
// ============================================================================

/// Wikidata client for the SPARQL query service and `wbgetentities`.
#[derive(Debug, Clone)]
pub struct WikidataClient {
    client: Client,
    config: WikidataConfig,
}

impl WikidataClient {
    pub fn new(config: WikidataConfig) -> Result<Self, LyreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client, config })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, LyreError> {
        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.config.max_retries);

        RetryIf::spawn(
            retry_strategy,
            || self.get_json_once(url, query),
            LyreError::is_retryable,
        )
        .await
    }

    async fn get_json_once<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, LyreError> {
        tracing::debug!(url = %url, "Querying Wikidata");

        let response = self
            .client
            .get(url)
            .query(query)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), message = %message, "Wikidata API error");
            return Err(LyreError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl ItemSource for WikidataClient {
    async fn all_item_ids(&self) -> Result<Vec<String>, LyreError> {
        let sparql = all_items_query(&self.config.category);
        let response: SparqlResponse = self
            .get_json(
                &self.config.query_endpoint,
                &[("query", sparql.as_str()), ("format", "json")],
            )
            .await?;

        let ids: Vec<String> = response
            .results
            .bindings
            .iter()
            .filter_map(|binding| binding.id.as_ref())
            .filter_map(|id| id_from_iri(&id.value))
            .map(str::to_string)
            .collect();

        tracing::info!(count = ids.len(), category = %self.config.category, "Fetched candidate items");
        Ok(ids)
    }

    async fn item_sitelinks(&self, id: &str) -> Result<BTreeMap<String, SiteLink>, LyreError> {
        let response: EntitiesResponse = self
            .get_json(
                &self.config.api_endpoint,
                &[
                    ("action", "wbgetentities"),
                    ("ids", id),
                    ("origin", "*"),
                    ("format", "json"),
                    ("props", "sitelinks/urls"),
                ],
            )
            .await?;

        if let Some(error) = response.error {
            if error.code == "no-such-entity" {
                return Err(LyreError::EntityNotFound(id.to_string()));
            }
            return Err(LyreError::Api {
                status: 200,
                message: format!("{}: {}", error.code, error.info),
            });
        }

        let mut entities = response.entities;
        match entities.remove(id) {
            Some(entity) if entity.missing.is_none() => Ok(entity.sitelinks),
            _ => Err(LyreError::EntityNotFound(id.to_string())),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
