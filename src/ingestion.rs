use std::path::Path;

use rayon::prelude::*;

use crate::{
    error::Error,
    file_id::FileId,
    index::{DocumentMeta, PreparedDocument, unix_now},
    source::{FileContent, FileSource},
    tokenizer::{Token, Tokenizer},
    walker::DiscoveredFile,
};

/// Outcome of loading one file.
#[derive(Debug)]
pub enum LoadOutcome {
    Ready(PreparedDocument),
    /// The file looked binary and was not indexed.
    Binary { path: String, id: FileId },
    Failed { path: String, error: Error },
}

/// Extract a title from file content.
///
/// Looks for the first markdown heading (line starting with `# `).
/// Falls back to the filename without extension.
fn extract_title(content: &str, file_path: &Path) -> String {
    for line in content.lines() {
        let trimmed = line.trim();
        if let Some(heading) = trimmed.strip_prefix("# ") {
            let title = heading.trim();
            if !title.is_empty() {
                return title.to_string();
            }
        }
    }

    file_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("untitled")
        .to_string()
}

/// Tokenize a file's text into a document ready for the index.
pub fn prepare_document(
    file: &DiscoveredFile,
    text: String,
    tokenizer: &Tokenizer,
) -> PreparedDocument {
    let path = file.path_key();
    let extension = file
        .relative_path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    let meta = DocumentMeta {
        title: extract_title(&text, &file.relative_path),
        path,
        extension,
        size_bytes: file.size,
        mtime: file.mtime,
        token_count: 0,
        indexed_at: unix_now(),
    };
    let tokens: Vec<Token> = tokenizer.tokenize(&text).collect();
    PreparedDocument::from_tokens(
        FileId::for_path(&meta.path),
        meta,
        text,
        tokens,
    )
}

/// Read and tokenize files in parallel.
///
/// Runs entirely outside the index lock; the caller commits the prepared
/// documents in one batch afterwards.
pub fn load_documents(
    source: &dyn FileSource,
    tokenizer: &Tokenizer,
    files: &[DiscoveredFile],
) -> Vec<LoadOutcome> {
    files
        .par_iter()
        .map(|file| match source.read_text(file) {
            Ok(FileContent::Text(text)) => {
                LoadOutcome::Ready(prepare_document(file, text, tokenizer))
            }
            Ok(FileContent::Binary) => {
                let path = file.path_key();
                LoadOutcome::Binary {
                    id: FileId::for_path(&path),
                    path,
                }
            }
            Err(error) => LoadOutcome::Failed {
                path: file.path_key(),
                error,
            },
        })
        .collect()
}
