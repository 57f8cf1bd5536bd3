use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

use handset_core::PhoneRecord;

/// Load a catalog from a JSON array of phone records.
///
/// Records failing validation (non-positive or non-finite numbers) are
/// dropped with a warning; the rest keep their relative order.
pub fn load_catalog(path: &Path) -> Result<Vec<PhoneRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog: {}", path.display()))?;
    let records: Vec<PhoneRecord> = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse catalog: {}", path.display()))?;

    let total = records.len();
    let catalog: Vec<PhoneRecord> = records
        .into_iter()
        .enumerate()
        .filter_map(|(i, record)| match record.validate() {
            Ok(()) => Some(record),
            Err(e) => {
                warn!(entry = i, brand = %record.brand, "Skipping catalog entry: {}", e);
                None
            }
        })
        .collect();

    info!(
        "Loaded {} phones from {} ({} skipped)",
        catalog.len(),
        path.display(),
        total - catalog.len()
    );
    Ok(catalog)
}
