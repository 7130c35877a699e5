//! Field extraction with a compiled grok pattern.

use std::sync::Arc;

use tailgrok_core::event::FieldMapping;

use crate::error::LogPipelineError;

use super::compiler::{CompiledPattern, GrokCompiler};
use super::loader::PatternLibrary;

impl CompiledPattern {
    /// Extracts named fields from `input`.
    ///
    /// The matcher searches the whole input (unanchored). Without a match the
    /// mapping is empty. Named groups are visited in the matcher's numbering
    /// order; a group starting before the end of the last accepted group is
    /// skipped, so captures nested inside a claimed span are not reported.
    /// Groups that did not take part in the match are ignored.
    pub fn extract(&self, input: &str) -> FieldMapping {
        let mut fields = FieldMapping::new();
        let Some(caps) = self.regex.captures(input) else {
            return fields;
        };

        let mut last_end: Option<usize> = None;
        for (index, name) in self.regex.capture_names().enumerate() {
            let Some(name) = name else {
                continue;
            };
            let Some(group) = caps.get(index) else {
                continue;
            };
            if last_end.is_some_and(|end| group.start() < end) {
                continue;
            }
            last_end = Some(group.end());
            fields.insert(name.to_owned(), group.as_str().to_owned());
        }
        fields
    }
}

/// Shared handle on a compiled pattern, cloned into every consumer.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    pattern: Arc<CompiledPattern>,
}

impl FieldExtractor {
    pub fn new(pattern: CompiledPattern) -> Self {
        Self {
            pattern: Arc::new(pattern),
        }
    }

    /// Compiles `definition` against `library`.
    pub fn from_definition(
        definition: &str,
        library: &PatternLibrary,
    ) -> Result<Self, LogPipelineError> {
        GrokCompiler::compile(definition, library).map(Self::new)
    }

    pub fn extract(&self, input: &str) -> FieldMapping {
        self.pattern.extract(input)
    }

    pub fn pattern(&self) -> &CompiledPattern {
        &self.pattern
    }
}
