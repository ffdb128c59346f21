use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{EngineError, Result};
use crate::models::{CorpusInfo, ReferenceUnit};

use super::{resolve_unit, CorpusProvider, RawUnit};

/// Configuration for the REST corpus/persistence backend.
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Base URL of the PostgREST-style API
    pub base_url: String,
    /// API key sent as both `apikey` and bearer token
    pub api_key: String,
}

impl RestConfig {
    /// Create config from `CORPUS_API_URL` / `CORPUS_API_KEY`.
    pub fn from_env() -> anyhow::Result<Self> {
        let base_url = std::env::var("CORPUS_API_URL")
            .context("CORPUS_API_URL environment variable not set")?;
        let api_key = std::env::var("CORPUS_API_KEY")
            .context("CORPUS_API_KEY environment variable not set")?;
        Ok(Self { base_url, api_key })
    }
}

#[derive(Debug, Deserialize)]
struct RawCorpusInfo {
    unit_count: u32,
}

/// Corpus provider backed by a PostgREST-style HTTP API.
pub struct RestCorpus {
    client: Client,
    config: RestConfig,
}

impl RestCorpus {
    pub fn new(config: RestConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    async fn get_rows<T: DeserializeOwned>(
        &self,
        table: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), table);
        let response = self
            .client
            .get(&url)
            .header("apikey", &self.config.api_key)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .query(params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Provider(format!(
                "corpus API returned {status}: {body}"
            )));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl CorpusProvider for RestCorpus {
    async fn unit(&self, corpus_id: u32, unit_id: u32) -> Result<Option<ReferenceUnit>> {
        let rows: Vec<RawUnit> = self
            .get_rows(
                "reference_units",
                &[
                    ("corpus_id", format!("eq.{corpus_id}")),
                    ("unit_id", format!("eq.{unit_id}")),
                ],
            )
            .await?;
        Ok(rows.into_iter().next().map(resolve_unit))
    }

    async fn units_by_page(&self, page: u32) -> Result<Vec<ReferenceUnit>> {
        let rows: Vec<RawUnit> = self
            .get_rows(
                "reference_units",
                &[
                    ("page", format!("eq.{page}")),
                    ("order", "corpus_id.asc,unit_id.asc".to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().map(resolve_unit).collect())
    }

    async fn units_by_section(&self, section: u32) -> Result<Vec<ReferenceUnit>> {
        let rows: Vec<RawUnit> = self
            .get_rows(
                "reference_units",
                &[
                    ("section", format!("eq.{section}")),
                    ("order", "corpus_id.asc,unit_id.asc".to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().map(resolve_unit).collect())
    }

    async fn corpus_info(&self, corpus_id: u32) -> Result<Option<CorpusInfo>> {
        let rows: Vec<RawCorpusInfo> = self
            .get_rows("corpora", &[("corpus_id", format!("eq.{corpus_id}"))])
            .await?;
        Ok(rows.into_iter().next().map(|row| CorpusInfo {
            unit_count: row.unit_count,
        }))
    }
}
