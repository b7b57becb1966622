//! Knowledge record loading.
//!
//! Each tenant's source truth is a single JSON document at
//! `<knowledge.dir>/<tenant>.json`, loaded wholesale at corpus-build
//! time. The engine does not watch these files; edits take effect on
//! the next rebuild.

use anyhow::{Context, Result};
use std::path::Path;

use crate::models::KnowledgeRecord;

/// Load a tenant's knowledge record. `Ok(None)` means no knowledge
/// source exists for this tenant (a degraded, not fatal, condition).
pub fn load_record(knowledge_dir: &Path, tenant: &str) -> Result<Option<KnowledgeRecord>> {
    let path = knowledge_dir.join(format!("{}.json", tenant));
    if !path.exists() {
        return Ok(None);
    }

    let data = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read knowledge file: {}", path.display()))?;
    let record: KnowledgeRecord = serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse knowledge file: {}", path.display()))?;

    Ok(Some(record))
}

/// List tenants by scanning the knowledge directory for `*.json` files,
/// sorted for stable output. The `index/` subdirectory holds built
/// stores, not knowledge, and is skipped.
pub fn list_tenants(knowledge_dir: &Path) -> Result<Vec<String>> {
    if !knowledge_dir.exists() {
        return Ok(Vec::new());
    }

    let mut tenants = Vec::new();

    for entry in std::fs::read_dir(knowledge_dir)
        .with_context(|| format!("Failed to read knowledge dir: {}", knowledge_dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("json") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                tenants.push(stem.to_string());
            }
        }
    }

    tenants.sort();
    Ok(tenants)
}
