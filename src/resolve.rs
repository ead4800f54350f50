use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::{Result, SEARCH_TIMEOUT_SECS, USER_AGENT, WIKIPEDIA_API_URL};

/// Anything that can turn an answer into a Wikipedia slug.
///
/// Implementations must never fail loudly: every kind of trouble is reported as `None`.
#[async_trait]
pub trait Resolve: Send + Sync + 'static {
    async fn resolve(&self, text: Option<&str>) -> Option<String>;
}

/// What a single search came back with, before it gets collapsed to an `Option`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(String),
    NotFound,
    Failed(String),
}

impl From<Lookup> for Option<String> {
    fn from(lookup: Lookup) -> Self {
        match lookup {
            Lookup::Found(slug) => Some(slug),
            Lookup::NotFound | Lookup::Failed(_) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    query: SearchQuery,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
}

/// Resolves answers with the MediaWiki search API, taking the top hit.
#[derive(Debug, Clone)]
pub struct WikiResolver {
    // Client uses Arc so we can clone cheaply
    client: Client,
    api_url: String,
    user_agent: String,
    timeout: Duration,
}

impl WikiResolver {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            api_url: WIKIPEDIA_API_URL.to_string(),
            user_agent: USER_AGENT.to_string(),
            timeout: Duration::from_secs(SEARCH_TIMEOUT_SECS),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs one search and reports exactly what happened.
    pub async fn lookup(&self, text: &str) -> Lookup {
        let text = text.trim();
        if text.is_empty() {
            return Lookup::NotFound;
        }

        match self.search(text).await {
            Ok(Some(title)) => match slug_from_title(&title) {
                Some(slug) => Lookup::Found(slug),
                None => Lookup::NotFound,
            },
            Ok(None) => Lookup::NotFound,
            Err(e) => Lookup::Failed(e.to_string()),
        }
    }

    /// Requests the top search hit and returns its title.
    async fn search(&self, text: &str) -> Result<Option<String>> {
        let res = self
            .client
            .get(&self.api_url)
            .query(&[
                ("action", "query"),
                ("format", "json"),
                ("list", "search"),
                ("srsearch", text),
                ("srlimit", "1"),
                ("srprop", ""),
            ])
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;

        let body: SearchResponse = res.json().await?;
        Ok(body.query.search.into_iter().next().map(|hit| hit.title))
    }
}

#[async_trait]
impl Resolve for WikiResolver {
    async fn resolve(&self, text: Option<&str>) -> Option<String> {
        let text = text?;
        let lookup = self.lookup(text).await;
        if let Lookup::Failed(reason) = &lookup {
            debug!(answer = text, %reason, "wiki lookup failed");
        }
        lookup.into()
    }
}

/// `"Eiffel Tower"` -> `"Eiffel_Tower"`. Blank titles have no slug.
pub fn slug_from_title(title: &str) -> Option<String> {
    let title = title.trim();
    if title.is_empty() {
        return None;
    }
    Some(
        title
            .chars()
            .map(|c| if c.is_whitespace() { '_' } else { c })
            .collect(),
    )
}
