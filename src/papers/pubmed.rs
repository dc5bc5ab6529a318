//! NIH PubMed E-utilities client.
//!
//! Two-step search: `esearch.fcgi` resolves a free-text query to PMIDs,
//! `esummary.fcgi` hydrates them. Both calls use `retmode=json`. An API key
//! is attached when configured (raises NIH's rate limit); failures map to
//! the crate's `Upstream` error.

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use super::ResearchPaper;
use crate::config::PubMedConfig;
use crate::error::{Error, Result};

pub struct PubMedClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct EsearchResponse {
    esearchresult: EsearchResult,
}

#[derive(Debug, Deserialize)]
struct EsearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

impl PubMedClient {
    pub fn new(config: &PubMedConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client,
        }
    }

    /// Search PubMed, newest first, returning at most `max_results` papers.
    pub async fn search(&self, query: &str, max_results: usize) -> Result<Vec<ResearchPaper>> {
        tracing::info!(query, max_results, "searching PubMed");

        let mut params: Vec<(&str, String)> = vec![
            ("db", "pubmed".into()),
            ("term", query.to_string()),
            ("retmax", max_results.to_string()),
            ("retmode", "json".into()),
            ("sort", "date".into()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }

        let response = self
            .client
            .get(format!("{}/esearch.fcgi", self.base_url))
            .query(&params)
            .send()
            .await
            .map_err(|e| Error::upstream(format!("pubmed search request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::upstream(format!(
                "pubmed search returned {}",
                response.status()
            )));
        }

        let parsed: EsearchResponse = response
            .json()
            .await
            .map_err(|e| Error::upstream(format!("pubmed search payload unreadable: {e}")))?;

        if parsed.esearchresult.idlist.is_empty() {
            tracing::debug!(query, "no PubMed results");
            return Ok(Vec::new());
        }

        self.summaries(&parsed.esearchresult.idlist).await
    }

    /// Fetch one paper by PMID. `Ok(None)` when PubMed does not know the id.
    pub async fn fetch(&self, pmid: &str) -> Result<Option<ResearchPaper>> {
        let papers = self.summaries(&[pmid.to_string()]).await?;
        Ok(papers.into_iter().next())
    }

    /// Hydrate a batch of PMIDs via esummary, preserving input order.
    async fn summaries(&self, pmids: &[String]) -> Result<Vec<ResearchPaper>> {
        let mut params: Vec<(&str, String)> = vec![
            ("db", "pubmed".into()),
            ("id", pmids.join(",")),
            ("retmode", "json".into()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }

        let response = self
            .client
            .get(format!("{}/esummary.fcgi", self.base_url))
            .query(&params)
            .send()
            .await
            .map_err(|e| Error::upstream(format!("pubmed summary request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::upstream(format!(
                "pubmed summary returned {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::upstream(format!("pubmed summary payload unreadable: {e}")))?;

        let result = body
            .get("result")
            .ok_or_else(|| Error::upstream("pubmed summary missing result object"))?;

        let mut papers = Vec::new();
        for pmid in pmids {
            let Some(doc) = result.get(pmid.as_str()) else {
                continue;
            };
            // Unknown ids come back as {"error": "..."} stubs
            if doc.get("error").is_some() {
                tracing::warn!(pmid = %pmid, "PubMed reported an error for id");
                continue;
            }
            papers.push(parse_summary(pmid, doc));
        }

        Ok(papers)
    }
}

/// Map one esummary document to a [`ResearchPaper`].
fn parse_summary(pmid: &str, doc: &Value) -> ResearchPaper {
    let title = doc
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or("No title available")
        .to_string();

    let journal = doc
        .get("fulljournalname")
        .or_else(|| doc.get("source"))
        .and_then(Value::as_str)
        .unwrap_or("Unknown journal")
        .to_string();

    let publication_date = doc
        .get("pubdate")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let authors = doc
        .get("authors")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|a| a.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let doi = doc
        .get("articleids")
        .and_then(Value::as_array)
        .and_then(|ids| {
            ids.iter().find_map(|id| {
                (id.get("idtype").and_then(Value::as_str) == Some("doi"))
                    .then(|| id.get("value").and_then(Value::as_str))
                    .flatten()
                    .map(str::to_string)
            })
        });

    ResearchPaper {
        id: format!("PMID{pmid}"),
        title,
        authors,
        summary: None,
        journal,
        publication_date,
        doi,
        pmid: pmid.to_string(),
        source: "pubmed".to_string(),
    }
}
