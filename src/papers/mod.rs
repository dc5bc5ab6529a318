//! Paper and recommendation lookup.
//!
//! The literature side talks to NIH PubMed through [`PubMedClient`]; the
//! guideline side is the static [`RecommendationLibrary`]. [`PaperIndex`]
//! fronts both behind the search contract the REST surface exposes:
//! free-text query plus a source filter, or lookup by id (`PMID…` ids route
//! to PubMed, everything else to the corpus).

pub mod pubmed;
pub mod recommendations;

use serde::{Deserialize, Serialize};

use crate::config::PubMedConfig;
use crate::error::{Error, Result};
pub use pubmed::PubMedClient;
pub use recommendations::{Priority, Recommendation, RecommendationLibrary};

/// Which corpus a search consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchSource {
    PubMed,
    Recommendations,
    All,
}

impl std::str::FromStr for SearchSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pubmed" => Ok(Self::PubMed),
            "recommendations" => Ok(Self::Recommendations),
            "all" => Ok(Self::All),
            _ => Err(format!("unknown search source: {s}")),
        }
    }
}

/// A research paper as surfaced from PubMed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchPaper {
    /// Stable id of the form `PMID<pmid>`.
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    /// Abstracts require a full-record fetch; the summary endpoint this
    /// client uses does not supply one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub journal: String,
    /// Publication date as reported by PubMed, e.g. `"2024 Jan 15"`.
    pub publication_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    pub pmid: String,
    pub source: String,
}

/// Combined result of one search call.
#[derive(Debug, Clone, Serialize)]
pub struct PaperSearchOutcome {
    pub papers: Vec<ResearchPaper>,
    pub recommendations: Vec<Recommendation>,
    pub total_count: usize,
    pub query: String,
}

/// Either kind of item a by-id lookup can return.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PaperItem {
    Paper(ResearchPaper),
    Recommendation(Recommendation),
}

/// Facade over both lookup collaborators.
pub struct PaperIndex {
    pubmed: PubMedClient,
    recommendations: RecommendationLibrary,
}

impl PaperIndex {
    pub fn new(config: &PubMedConfig) -> Self {
        Self {
            pubmed: PubMedClient::new(config),
            recommendations: RecommendationLibrary::new(),
        }
    }

    pub fn recommendations(&self) -> &RecommendationLibrary {
        &self.recommendations
    }

    /// Search the selected corpus. `All` splits the result budget between
    /// the literature API and the recommendation corpus.
    pub async fn search(
        &self,
        query: &str,
        max_results: usize,
        source: SearchSource,
    ) -> Result<PaperSearchOutcome> {
        let (papers, recommendations) = match source {
            SearchSource::PubMed => (self.pubmed.search(query, max_results).await?, Vec::new()),
            SearchSource::Recommendations => {
                (Vec::new(), self.recommendations.search(query, max_results))
            }
            SearchSource::All => {
                let half = (max_results / 2).max(1);
                (
                    self.pubmed.search(query, half).await?,
                    self.recommendations.search(query, half),
                )
            }
        };

        Ok(PaperSearchOutcome {
            total_count: papers.len() + recommendations.len(),
            papers,
            recommendations,
            query: query.to_string(),
        })
    }

    /// Look up a single item by id.
    pub async fn lookup(&self, id: &str) -> Result<PaperItem> {
        if let Some(pmid) = id.strip_prefix("PMID") {
            return match self.pubmed.fetch(pmid).await? {
                Some(paper) => Ok(PaperItem::Paper(paper)),
                None => Err(Error::not_found(format!("paper {id}"))),
            };
        }

        self.recommendations
            .by_id(id)
            .map(PaperItem::Recommendation)
            .ok_or_else(|| Error::not_found(format!("recommendation {id}")))
    }
}
