use anyhow::Result;
use log::info;
use std::path::{Path, PathBuf};

use crate::database::WordRecord;
use crate::file_utils::FileManager;

/// Tab-separated `word<TAB>meaning` lines, one per word
pub fn words_to_tsv(words: &[WordRecord]) -> String {
    let mut out = String::new();
    for word in words {
        out.push_str(&sanitize_field(&word.word));
        out.push('\t');
        out.push_str(&sanitize_field(&word.meaning));
        out.push('\n');
    }
    out
}

// Tabs and line breaks inside a field would break the row structure
fn sanitize_field(field: &str) -> String {
    field
        .chars()
        .map(|c| if matches!(c, '\t' | '\n' | '\r') { ' ' } else { c })
        .collect()
}

/// File name used when exporting a subtitle's words
pub fn export_filename(subtitle_name: &str) -> String {
    let stem = Path::new(subtitle_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| subtitle_name.to_string());
    format!("{}.tsv", FileManager::safe_filename(&stem))
}

/// Write the words of one subtitle into `dir`, returning the file written
pub fn export_words(dir: &Path, subtitle_name: &str, words: &[WordRecord]) -> Result<PathBuf> {
    let path = dir.join(export_filename(subtitle_name));
    FileManager::write_to_file(&path, &words_to_tsv(words))?;
    info!("Exported {} words to {:?}", words.len(), path);
    Ok(path)
}
