use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::briefs::BriefResult;

pub const MARKDOWN_MIME: &str = "text/markdown";

/// A brief offered as a file download. The body is the brief content, untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkdownDownload {
    pub file_name: String,
    pub mime: &'static str,
    pub body: String,
}

impl MarkdownDownload {
    /// `position` is zero-based; file names count from 1.
    pub fn for_brief(position: usize, brief: &BriefResult) -> Self {
        Self {
            file_name: brief_file_name(position),
            mime: MARKDOWN_MIME,
            body: brief.content.clone(),
        }
    }
}

pub fn brief_file_name(position: usize) -> String {
    format!("brief_{}.md", position + 1)
}

/// Write the download into `dir` and return the file path.
pub async fn write_markdown(dir: &Path, download: &MarkdownDownload) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create export directory: {}", dir.display()))?;

    let path = dir.join(&download.file_name);
    tokio::fs::write(&path, download.body.as_bytes())
        .await
        .with_context(|| format!("Failed to write brief: {}", path.display()))?;
    Ok(path)
}

pub async fn read_markdown(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read brief: {}", path.display()))
}
