use crate::{Document, IngestError};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

/// Reads files into upload-ready documents, keeping the given order.
pub fn load_documents(paths: &[PathBuf]) -> Result<Vec<Document>, IngestError> {
    if paths.is_empty() {
        return Err(IngestError::InvalidArgument(
            "no documents were supplied".to_string(),
        ));
    }

    paths
        .iter()
        .map(|path| {
            let name = path
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))?;
            Ok::<_, IngestError>(Document::new(name, fs::read(path)?))
        })
        .collect()
}
