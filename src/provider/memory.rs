use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;

use crate::error::Result;
use crate::models::{CorpusInfo, ReferenceUnit};

use super::{resolve_unit, CorpusProvider, RawUnit};

/// In-memory corpus, used by the CLI harness and tests.
///
/// Units are held sorted by `(corpus_id, unit_id)` so page and section
/// queries come back in traversal order.
pub struct StaticCorpus {
    units: Vec<ReferenceUnit>,
}

impl StaticCorpus {
    pub fn new(raw_units: Vec<RawUnit>) -> Self {
        let mut units: Vec<ReferenceUnit> = raw_units.into_iter().map(resolve_unit).collect();
        units.sort_by_key(|u| (u.corpus_id, u.unit_id));
        Self { units }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[async_trait]
impl CorpusProvider for StaticCorpus {
    async fn unit(&self, corpus_id: u32, unit_id: u32) -> Result<Option<ReferenceUnit>> {
        Ok(self
            .units
            .iter()
            .find(|u| u.corpus_id == corpus_id && u.unit_id == unit_id)
            .cloned())
    }

    async fn units_by_page(&self, page: u32) -> Result<Vec<ReferenceUnit>> {
        Ok(self
            .units
            .iter()
            .filter(|u| u.page == page)
            .cloned()
            .collect())
    }

    async fn units_by_section(&self, section: u32) -> Result<Vec<ReferenceUnit>> {
        Ok(self
            .units
            .iter()
            .filter(|u| u.section == section)
            .cloned()
            .collect())
    }

    async fn corpus_info(&self, corpus_id: u32) -> Result<Option<CorpusInfo>> {
        let count = self
            .units
            .iter()
            .filter(|u| u.corpus_id == corpus_id)
            .count() as u32;
        Ok((count > 0).then_some(CorpusInfo { unit_count: count }))
    }
}

/// Load raw unit records from a JSON file (an array of unit objects).
pub fn load_corpus_file(path: &Path) -> anyhow::Result<Vec<RawUnit>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read corpus file: {:?}", path))?;
    serde_json::from_str(&content).context("Failed to parse corpus JSON")
}
