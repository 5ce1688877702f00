use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Result;
use crate::perspective::PerspectiveDocument;

/// File stem for a perspective display name.
/// Keeps alphanumerics, spaces, `-` and `_`; spaces become underscores.
pub fn safe_file_stem(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let stem = kept.trim().replace(' ', "_");
    if stem.is_empty() {
        "perspective".to_string()
    } else {
        stem
    }
}

/// Replace `path` with `contents` in one step: write a sibling temp file, then rename
pub fn write_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    fs::write(&tmp_path, contents)?;
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}

/// Writes finished perspectives, one file each, never reusing a name within a run
#[derive(Debug)]
pub struct PerspectiveWriter {
    output_dir: PathBuf,
    pretty: bool,
    used_stems: HashSet<String>,
}

impl PerspectiveWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            pretty: false,
            used_stems: HashSet::new(),
        }
    }

    /// Indent output instead of Bloom's minified form
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Path the next document with this name would be written to
    fn reserve_path(&mut self, name: &str) -> PathBuf {
        let base = safe_file_stem(name);
        let mut stem = base.clone();
        let mut n = 2;
        while !self.used_stems.insert(stem.to_lowercase()) {
            stem = format!("{}_{}", base, n);
            n += 1;
        }
        self.output_dir.join(format!("{}.json", stem))
    }

    pub fn write(&mut self, doc: &PerspectiveDocument) -> Result<PathBuf> {
        let json = if self.pretty {
            serde_json::to_string_pretty(doc)?
        } else {
            serde_json::to_string(doc)?
        };

        let path = self.reserve_path(&doc.name);
        write_atomically(&path, json.as_bytes())?;
        info!("Saved perspective '{}' to {}", doc.name, path.display());

        Ok(path)
    }
}
