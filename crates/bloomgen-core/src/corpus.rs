use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{BloomError, Result};

/// A previously accepted perspective, kept verbatim
#[derive(Debug, Clone)]
pub struct ExampleDocument {
    pub name: String,
    pub content: String,
}

/// Few-shot exemplars for the prompted generator. Read-only input.
#[derive(Debug, Clone, Default)]
pub struct ExampleCorpus {
    examples: Vec<ExampleDocument>,
}

impl ExampleCorpus {
    /// Load every `*.json` file of `dir`, ordered by file name
    pub fn load(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(BloomError::Config(format!(
                "Example directory not found: {}",
                dir.display()
            )));
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
            })
            .collect();
        paths.sort();

        let mut examples = Vec::with_capacity(paths.len());
        for path in paths {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str::<Value>(&content).map_err(|e| {
                BloomError::Config(format!("Example {} is not valid JSON: {}", path.display(), e))
            })?;

            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            examples.push(ExampleDocument { name, content });
        }

        info!("Loaded {} example perspective(s) from {}", examples.len(), dir.display());
        Ok(Self { examples })
    }

    pub fn from_documents(examples: Vec<ExampleDocument>) -> Self {
        Self { examples }
    }

    pub fn examples(&self) -> &[ExampleDocument] {
        &self.examples
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_orders_by_file_name_and_skips_other_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.json"), r#"{"name":"B"}"#).unwrap();
        fs::write(dir.path().join("a.json"), r#"{"name":"A"}"#).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

        let corpus = ExampleCorpus::load(dir.path()).unwrap();
        let names: Vec<_> = corpus.examples().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(corpus.examples()[0].content, r#"{"name":"A"}"#);
    }

    #[test]
    fn test_invalid_example_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.json"), "{ not json").unwrap();

        let err = ExampleCorpus::load(dir.path()).unwrap_err();
        assert!(matches!(err, BloomError::Config(msg) if msg.contains("broken.json")));
    }

    #[test]
    fn test_missing_directory() {
        assert!(matches!(
            ExampleCorpus::load(Path::new("/definitely/not/here")),
            Err(BloomError::Config(_))
        ));
    }
}
