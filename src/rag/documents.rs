//! Loading scraped documents for the ingestion job.
//!
//! Accepts either a JSON array of documents or JSON lines (one document
//! per line, blank lines ignored).

use std::fs;
use std::path::Path;

use super::types::RawDocument;
use crate::core::errors::RagError;

pub fn load_documents(path: &Path) -> Result<Vec<RawDocument>, RagError> {
    let raw = fs::read_to_string(path).map_err(|e| {
        RagError::InvalidInput(format!("failed to read {}: {}", path.display(), e))
    })?;
    parse_documents(&raw)
}

pub fn parse_documents(raw: &str) -> Result<Vec<RawDocument>, RagError> {
    let trimmed = raw.trim_start();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed)
            .map_err(|e| RagError::InvalidInput(format!("invalid document array: {}", e)));
    }

    let mut documents = Vec::new();
    for (line_no, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let document: RawDocument = serde_json::from_str(line).map_err(|e| {
            RagError::InvalidInput(format!("invalid document at line {}: {}", line_no + 1, e))
        })?;
        documents.push(document);
    }
    Ok(documents)
}
