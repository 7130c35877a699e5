//! Pattern library loader -- reads grok pattern definitions from disk.
//!
//! A pattern source is plain text with one definition per line:
//! `<name><whitespace><fragment>[#comment]`. Lines that do not follow this
//! grammar are skipped.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::error::LogPipelineError;

/// Full-line record grammar: name, fragment, optional trailing comment.
static RECORD_PATTERN: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^(\w+)\s+(.+?)(#.*)?$").expect("record grammar is a valid regex")
});

const BUILTIN_PATTERNS: &str = include_str!("../../../../conf/logstash_patterns/grok-patterns");

/// Immutable pattern-name to fragment mapping.
///
/// Built once, then shared read-only by every compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternLibrary {
    patterns: HashMap<String, String>,
}

impl PatternLibrary {
    /// Creates an empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// The bundled logstash base patterns.
    pub fn builtin() -> Self {
        Self::parse_records(BUILTIN_PATTERNS)
    }

    /// Loads a single pattern file, or every file of a directory.
    ///
    /// Directory entries are read concurrently, one task per file, and merged in
    /// completion order. When two files define the same name the definition
    /// that finishes loading last wins, so duplicates across files are
    /// nondeterministic.
    ///
    /// # Errors
    /// [`LogPipelineError::PatternLoad`] when the path is absent or any file
    /// in it cannot be read.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LogPipelineError> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| load_error(path, format!("failed to read metadata: {e}")))?;

        let library = if metadata.is_dir() {
            Self::load_directory(path).await?
        } else {
            Self::load_file(path).await?
        };

        info!(
            path = %path.display(),
            count = library.len(),
            "loaded grok patterns"
        );
        Ok(library)
    }

    /// Loads one pattern file.
    pub async fn load_file(path: impl AsRef<Path>) -> Result<Self, LogPipelineError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| load_error(path, format!("failed to read file: {e}")))?;
        Ok(Self::parse_records(&String::from_utf8_lossy(&bytes)))
    }

    async fn load_directory(dir: &Path) -> Result<Self, LogPipelineError> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| load_error(dir, format!("failed to read directory: {e}")))?;

        let mut files: Vec<PathBuf> = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| load_error(dir, format!("failed to read directory entry: {e}")))?
        {
            let path = entry.path();
            match entry.file_type().await {
                Ok(ft) if ft.is_dir() => {
                    debug!(path = %path.display(), "skipping nested directory");
                }
                _ => files.push(path),
            }
        }

        let mut tasks = JoinSet::new();
        for path in files {
            tasks.spawn(async move {
                let result = Self::load_file(&path).await;
                (path, result)
            });
        }

        let mut library = Self::new();
        while let Some(joined) = tasks.join_next().await {
            let (path, result) = joined
                .map_err(|e| load_error(dir, format!("pattern loading task failed: {e}")))?;
            let loaded = result?;
            debug!(
                path = %path.display(),
                count = loaded.len(),
                "merged pattern file"
            );
            library = library.merge(loaded);
        }

        Ok(library)
    }

    /// Parses a single record source. Malformed lines are skipped.
    ///
    /// Within one source, a later definition of a name replaces an earlier one.
    pub fn parse_records(text: &str) -> Self {
        let mut patterns = HashMap::new();
        for record in text.lines() {
            match RECORD_PATTERN.captures(record) {
                Some(caps) => {
                    let fragment = caps[2].trim();
                    if fragment.is_empty() {
                        debug!(record, "empty pattern fragment, skipped");
                        continue;
                    }
                    patterns.insert(caps[1].to_owned(), fragment.to_owned());
                }
                None => {
                    debug!(record, "record does not represent a pattern definition, skipped");
                }
            }
        }
        Self { patterns }
    }

    /// Adds or replaces one definition.
    pub fn with_pattern(
        mut self,
        name: impl Into<String>,
        fragment: impl Into<String>,
    ) -> Result<Self, LogPipelineError> {
        let (name, fragment) = (name.into(), fragment.into());
        if name.is_empty() {
            return Err(LogPipelineError::config(
                "patternDefinition",
                "pattern name must not be empty",
            ));
        }
        if fragment.is_empty() {
            return Err(LogPipelineError::config(
                "patternDefinition",
                format!("pattern '{name}' must not be empty"),
            ));
        }
        self.patterns.insert(name, fragment);
        Ok(self)
    }

    /// Adds or replaces several definitions.
    pub fn with_patterns<I, K, V>(mut self, patterns: I) -> Result<Self, LogPipelineError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, fragment) in patterns {
            self = self.with_pattern(name, fragment)?;
        }
        Ok(self)
    }

    /// Combines two libraries; definitions in `other` win.
    pub fn merge(mut self, other: PatternLibrary) -> Self {
        self.patterns.extend(other.patterns);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.patterns.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Defined names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.patterns.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn load_error(path: &Path, reason: String) -> LogPipelineError {
    LogPipelineError::PatternLoad {
        path: path.display().to_string(),
        reason,
    }
}
