// Tie-up rate sheet store
// One JSON file per hospital in a directory. Reloads are transactional:
// the freshly built catalog replaces the old one only after every file has
// parsed and validated, so a bad reload never takes the old indices out of
// service. Index construction itself is partial-failure tolerant.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use bill_core_models::TieUpRateSheet;

use crate::embedding::EmbeddingProvider;
use crate::semantic_index::SemanticIndex;

/// Rate-sheet errors
#[derive(Debug, Error)]
pub enum RateSheetError {
    #[error("Rate sheet directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("Failed to read rate sheet: {0}")]
    ReadError(String),

    #[error("Failed to parse rate sheet: {0}")]
    ParseError(String),

    #[error("Rate sheet validation failed: {0}")]
    ValidationError(String),
}

/// Immutable snapshot of all loaded sheets plus their semantic indices
pub struct RateSheetCatalog {
    pub sheets: Vec<TieUpRateSheet>,
    /// Hospital-name index; keys point into `sheets`
    pub hospital_index: SemanticIndex,
    /// Category indices per hospital; keys point into that sheet's categories
    pub category_indexes: HashMap<String, SemanticIndex>,
    /// Item indices per (hospital, category); keys point into that
    /// category's items
    pub item_indexes: HashMap<(String, String), SemanticIndex>,
}

impl RateSheetCatalog {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            sheets: Vec::new(),
            hospital_index: SemanticIndex::default(),
            category_indexes: HashMap::new(),
            item_indexes: HashMap::new(),
        }
    }

    #[must_use]
    pub fn sheet_by_name(&self, hospital_name: &str) -> Option<&TieUpRateSheet> {
        self.sheets.iter().find(|s| s.hospital_name == hospital_name)
    }
}

/// Directory-backed store with atomically swapped catalogs
pub struct RateSheetStore {
    directory: PathBuf,
    current: RwLock<Arc<RateSheetCatalog>>,
}

impl RateSheetStore {
    #[must_use]
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
            current: RwLock::new(Arc::new(RateSheetCatalog::empty())),
        }
    }

    /// The catalog currently in service.
    ///
    /// # Panics
    /// Panics only if the catalog lock is poisoned.
    #[must_use]
    pub fn current(&self) -> Arc<RateSheetCatalog> {
        let guard = self.current.read().expect("catalog lock poisoned");
        Arc::clone(&guard)
    }

    /// Load every `*.json` sheet in the directory and rebuild the indices.
    ///
    /// Transactional: any read/parse/validation error leaves the previous
    /// catalog in service. Embedding failures inside index construction
    /// only shrink the affected sub-index.
    ///
    /// # Errors
    /// See [`RateSheetError`].
    pub async fn reload<P: EmbeddingProvider + ?Sized>(
        &self,
        provider: &P,
    ) -> Result<usize, RateSheetError> {
        let sheets = Self::load_sheets(&self.directory)?;
        let catalog = Self::build_catalog(provider, sheets).await;
        let count = catalog.sheets.len();

        let mut guard = self.current.write().expect("catalog lock poisoned");
        *guard = Arc::new(catalog);
        drop(guard);

        info!(count, directory = %self.directory.display(), "rate sheets reloaded");
        Ok(count)
    }

    fn load_sheets(directory: &Path) -> Result<Vec<TieUpRateSheet>, RateSheetError> {
        if !directory.is_dir() {
            return Err(RateSheetError::DirectoryNotFound(
                directory.display().to_string(),
            ));
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(directory)
            .map_err(|e| RateSheetError::ReadError(e.to_string()))?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut sheets = Vec::with_capacity(paths.len());
        for path in paths {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| RateSheetError::ReadError(format!("{}: {e}", path.display())))?;
            let sheet: TieUpRateSheet = serde_json::from_str(&contents)
                .map_err(|e| RateSheetError::ParseError(format!("{}: {e}", path.display())))?;
            Self::validate_sheet(&sheet, &path)?;
            sheets.push(sheet);
        }
        Ok(sheets)
    }

    fn validate_sheet(sheet: &TieUpRateSheet, path: &Path) -> Result<(), RateSheetError> {
        if sheet.hospital_name.trim().is_empty() {
            return Err(RateSheetError::ValidationError(format!(
                "{}: empty hospital name",
                path.display()
            )));
        }
        for category in &sheet.categories {
            for item in &category.items {
                if item.rate < 0.0 || !item.rate.is_finite() {
                    return Err(RateSheetError::ValidationError(format!(
                        "{}: negative rate for {}",
                        path.display(),
                        item.item_name
                    )));
                }
            }
        }
        Ok(())
    }

    async fn build_catalog<P: EmbeddingProvider + ?Sized>(
        provider: &P,
        sheets: Vec<TieUpRateSheet>,
    ) -> RateSheetCatalog {
        let hospital_names: Vec<String> =
            sheets.iter().map(|s| s.hospital_name.clone()).collect();
        let hospital_index = SemanticIndex::build(provider, &hospital_names).await;

        let mut category_indexes = HashMap::new();
        let mut item_indexes = HashMap::new();

        for sheet in &sheets {
            let category_names: Vec<String> = sheet
                .categories
                .iter()
                .map(|c| c.category_name.clone())
                .collect();
            category_indexes.insert(
                sheet.hospital_name.clone(),
                SemanticIndex::build(provider, &category_names).await,
            );

            for category in &sheet.categories {
                let item_names: Vec<String> =
                    category.items.iter().map(|i| i.item_name.clone()).collect();
                debug!(
                    hospital = %sheet.hospital_name,
                    category = %category.category_name,
                    items = item_names.len(),
                    "indexing rate sheet items"
                );
                item_indexes.insert(
                    (sheet.hospital_name.clone(), category.category_name.clone()),
                    SemanticIndex::build(provider, &item_names).await,
                );
            }
        }

        RateSheetCatalog {
            sheets,
            hospital_index,
            category_indexes,
            item_indexes,
        }
    }

    /// Watch the directory and emit a unit event on every relevant change.
    ///
    /// The caller owns the reload loop; dropping the returned watcher stops
    /// the notifications.
    ///
    /// # Errors
    /// `ReadError` when the filesystem watcher cannot be installed.
    pub fn watch(&self) -> Result<(RecommendedWatcher, mpsc::UnboundedReceiver<()>), RateSheetError> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| match result {
                Ok(event) => {
                    if matches!(
                        event.kind,
                        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                    ) {
                        let _ = tx.send(());
                    }
                }
                Err(e) => warn!(error = %e, "rate sheet watch error"),
            },
            notify::Config::default(),
        )
        .map_err(|e| RateSheetError::ReadError(e.to_string()))?;

        watcher
            .watch(&self.directory, RecursiveMode::NonRecursive)
            .map_err(|e| RateSheetError::ReadError(e.to_string()))?;

        Ok((watcher, rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::HashedBagEmbedder;

    fn write_sheet(dir: &Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name), contents).expect("write sheet");
    }

    const VALID_SHEET: &str = r#"{
        "hospital_name": "City Care Hospital",
        "categories": [
            {
                "category_name": "Radiology",
                "items": [
                    {"item_name": "X-Ray Chest PA", "rate": 800.0, "type": "service"},
                    {"item_name": "CT Scan Abdomen", "rate": 800.0, "type": "service"}
                ]
            }
        ]
    }"#;

    #[tokio::test]
    async fn test_load_and_index_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_sheet(dir.path(), "city_care.json", VALID_SHEET);

        let store = RateSheetStore::new(dir.path());
        let provider = HashedBagEmbedder::new(64);
        let count = store.reload(&provider).await.expect("reload succeeds");

        assert_eq!(count, 1);
        let catalog = store.current();
        assert_eq!(catalog.hospital_index.len(), 1);
        assert_eq!(
            catalog
                .item_indexes
                .get(&("City Care Hospital".to_string(), "Radiology".to_string()))
                .map(SemanticIndex::len),
            Some(2)
        );
    }

    #[tokio::test]
    async fn test_bad_file_keeps_previous_catalog() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_sheet(dir.path(), "city_care.json", VALID_SHEET);

        let store = RateSheetStore::new(dir.path());
        let provider = HashedBagEmbedder::new(64);
        store.reload(&provider).await.expect("first reload succeeds");

        write_sheet(dir.path(), "broken.json", "{ not json");
        let result = store.reload(&provider).await;
        assert!(result.is_err());

        // Old catalog still in service
        let catalog = store.current();
        assert_eq!(catalog.sheets.len(), 1);
        assert_eq!(catalog.sheets[0].hospital_name, "City Care Hospital");
    }

    #[tokio::test]
    async fn test_negative_rate_fails_validation() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_sheet(
            dir.path(),
            "bad_rate.json",
            r#"{
                "hospital_name": "H",
                "categories": [
                    {"category_name": "C", "items": [{"item_name": "I", "rate": -1.0, "type": "unit"}]}
                ]
            }"#,
        );

        let store = RateSheetStore::new(dir.path());
        let provider = HashedBagEmbedder::new(64);
        assert!(matches!(
            store.reload(&provider).await,
            Err(RateSheetError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_partial_indexing_on_embedding_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_sheet(dir.path(), "city_care.json", VALID_SHEET);

        let store = RateSheetStore::new(dir.path());
        // Embeddings fail for the CT row only; the rest of the index serves
        let provider = HashedBagEmbedder::failing_on(64, "CT Scan");
        store.reload(&provider).await.expect("reload succeeds");

        let catalog = store.current();
        let index = catalog
            .item_indexes
            .get(&("City Care Hospital".to_string(), "Radiology".to_string()))
            .expect("index exists");
        assert_eq!(index.len(), 1);
    }
}
