//! Catalog bundle import.
//!
//! A bundle is a JSON document holding content drafts, either as a bare array
//! or wrapped as `{"content": [...]}`. Season drafts may carry their episodes
//! inline under `episodes`.
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::catalog::ContentDraft;
use crate::store::{ContentStore, StoreError};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Failed to read catalog bundle: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid catalog bundle: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Catalog bundle too large: {size} bytes (max {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("Failed to store '{title}': {source}")]
    Store {
        title: String,
        #[source]
        source: StoreError,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Bundle {
    Wrapped { content: Vec<ContentDraft> },
    Bare(Vec<ContentDraft>),
}

impl Bundle {
    fn into_drafts(self) -> Vec<ContentDraft> {
        match self {
            Bundle::Wrapped { content } => content,
            Bundle::Bare(content) => content,
        }
    }
}

/// Outcome of an import run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    pub episodes: usize,
    pub ids: Vec<String>,
}

/// Maximum bundle size (64 MB).
const MAX_BUNDLE_SIZE: u64 = 64 * 1024 * 1024;

pub fn parse_bundle(json: &str) -> Result<Vec<ContentDraft>, ImportError> {
    let bundle: Bundle = serde_json::from_str(json)?;
    Ok(bundle.into_drafts())
}

/// Read and store every draft in a bundle file.
///
/// Drafts are stored one by one; the first failure stops the import and
/// earlier drafts stay stored.
pub async fn import_file<S: ContentStore + ?Sized>(
    store: &S,
    path: &Path,
) -> Result<ImportSummary, ImportError> {
    let size = std::fs::metadata(path)?.len();
    if size > MAX_BUNDLE_SIZE {
        return Err(ImportError::TooLarge {
            size,
            max: MAX_BUNDLE_SIZE,
        });
    }

    let json = std::fs::read_to_string(path)?;
    let drafts = parse_bundle(&json)?;
    import_drafts(store, &drafts).await
}

pub async fn import_drafts<S: ContentStore + ?Sized>(
    store: &S,
    drafts: &[ContentDraft],
) -> Result<ImportSummary, ImportError> {
    let mut summary = ImportSummary::default();

    for draft in drafts {
        let id = store
            .upsert(draft)
            .await
            .map_err(|source| ImportError::Store {
                title: draft.title.clone(),
                source,
            })?;
        summary.imported += 1;
        summary.episodes += draft.episodes.len();
        summary.ids.push(id);
    }

    tracing::info!(
        imported = summary.imported,
        episodes = summary.episodes,
        "Catalog bundle imported"
    );
    Ok(summary)
}
