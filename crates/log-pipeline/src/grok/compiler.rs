//! Grok expression compiler.
//!
//! References `%{NAME}` and `%{NAME:ALIAS}` are expanded against a
//! [`PatternLibrary`] until a full round performs no substitution:
//!
//! - `%{NAME}` becomes `(fragment)`
//! - `%{NAME:ALIAS}` becomes `(?<ALIAS>fragment)`
//!
//! Every occurrence of a token is replaced at once, and fragments may
//! reference other patterns to any depth. The library must be acyclic; a
//! cycle keeps the expansion growing forever.
//!
//! References whose name is not in the library stay in the expression as
//! literal text. Since `{` is a repetition operator for the regex engine,
//! those leftover tokens are escaped before compilation so they still match
//! the literal `%{...}` characters.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;

use crate::config::keys;
use crate::error::LogPipelineError;

use super::loader::PatternLibrary;

/// `%{NAME}` or `%{NAME:ALIAS}`
static REFERENCE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"%\{(\w+)(:(\w+))?\}").expect("reference grammar is a valid regex")
});

/// A grok definition compiled into a single matcher.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    definition: String,
    expression: String,
    pub(super) regex: Regex,
}

impl CompiledPattern {
    /// The definition this pattern was compiled from.
    pub fn definition(&self) -> &str {
        &self.definition
    }

    /// The fully expanded regular expression.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Named capture groups, in the order the matcher numbers them.
    pub fn field_names(&self) -> Vec<&str> {
        self.regex.capture_names().flatten().collect()
    }

    pub fn is_match(&self, input: &str) -> bool {
        self.regex.is_match(input)
    }
}

/// Expands grok definitions into compiled patterns.
pub struct GrokCompiler;

impl GrokCompiler {
    /// Expands and compiles `definition`.
    ///
    /// # Errors
    /// - [`LogPipelineError::Config`] for an empty definition
    /// - [`LogPipelineError::PatternSyntax`] when the expanded expression is not
    ///   a valid regular expression
    ///
    /// Every alias must be unique within the definition, even across
    /// alternation branches: `(?:%{IPV4:ip}|%{IPV6:ip})` fails with
    /// [`LogPipelineError::PatternSyntax`]. Logstash grok accepts such
    /// definitions and reports the first branch that matched; here each
    /// branch needs its own alias (`ipv4`, `ipv6`).
    pub fn compile(
        definition: &str,
        library: &PatternLibrary,
    ) -> Result<CompiledPattern, LogPipelineError> {
        if definition.is_empty() {
            return Err(LogPipelineError::config(
                keys::FILE_RECORD_MAPPING,
                "record mapping definition must not be empty",
            ));
        }

        let expanded = Self::expand(definition, library);
        let expression = escape_unresolved(&expanded);
        debug!(
            definition,
            expression = expression.as_str(),
            "expanded record mapping"
        );

        let regex = Regex::new(&expression).map_err(|e| LogPipelineError::PatternSyntax {
            expression: expression.clone(),
            reason: e.to_string(),
        })?;

        Ok(CompiledPattern {
            definition: definition.to_owned(),
            expression,
            regex,
        })
    }

    /// Expands references to a fixed point without compiling.
    ///
    /// Unresolved references are returned verbatim. The library must be
    /// acyclic: a self-referencing pattern never reaches a fixed point.
    pub fn expand(definition: &str, library: &PatternLibrary) -> String {
        let mut current = definition.to_owned();
        loop {
            let mut expanded = current.clone();
            for caps in REFERENCE_PATTERN.captures_iter(&current) {
                let Some(fragment) = library.get(&caps[1]) else {
                    continue;
                };
                let replacement = match caps.get(3) {
                    Some(alias) => format!("(?<{}>{fragment})", alias.as_str()),
                    None => format!("({fragment})"),
                };
                expanded = expanded.replace(&caps[0], &replacement);
            }

            if expanded == current {
                return current;
            }
            current = expanded;
        }
    }
}

fn escape_unresolved(expression: &str) -> String {
    REFERENCE_PATTERN
        .replace_all(expression, |caps: &Captures<'_>| regex::escape(&caps[0]))
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library() -> PatternLibrary {
        PatternLibrary::new()
            .with_patterns([
                ("LOGLEVEL", "INFO|WARN|ERROR"),
                ("GREEDYDATA", ".*"),
                ("INT", "[0-9]+"),
                ("PAIR", "%{INT:left}-%{INT}"),
            ])
            .unwrap()
    }

    #[test]
    fn aliased_reference_becomes_named_group() {
        let expanded = GrokCompiler::expand("%{LOGLEVEL:level}", &library());
        assert_eq!(expanded, "(?<level>INFO|WARN|ERROR)");
    }

    #[test]
    fn plain_reference_becomes_unnamed_group() {
        let expanded = GrokCompiler::expand("%{INT} items", &library());
        assert_eq!(expanded, "([0-9]+) items");
    }

    #[test]
    fn nested_references_expand_to_fixed_point() {
        let expanded = GrokCompiler::expand("%{PAIR:range}", &library());
        assert_eq!(expanded, "(?<range>(?<left>[0-9]+)-([0-9]+))");
    }

    #[test]
    fn all_occurrences_of_a_token_are_replaced() {
        let expanded = GrokCompiler::expand("%{INT}/%{INT}", &library());
        assert_eq!(expanded, "([0-9]+)/([0-9]+)");
    }

    #[test]
    fn unresolved_reference_is_left_verbatim() {
        let expanded = GrokCompiler::expand("%{MISSING:x} %{INT}", &library());
        assert_eq!(expanded, "%{MISSING:x} ([0-9]+)");
    }

    #[test]
    fn compile_escapes_unresolved_reference() {
        let pattern = GrokCompiler::compile("%{MISSING} done", &library()).unwrap();
        assert_eq!(pattern.expression(), r"%\{MISSING\} done");
        assert!(pattern.is_match("log %{MISSING} done"));
        assert!(!pattern.is_match("log anything done"));
    }

    #[test]
    fn compile_reports_field_names() {
        let pattern = GrokCompiler::compile(
            "%{LOGLEVEL:logLevel} %{GREEDYDATA:actualLoggingMessage}",
            &library(),
        )
        .unwrap();
        assert_eq!(pattern.field_names(), vec!["logLevel", "actualLoggingMessage"]);
        assert_eq!(
            pattern.definition(),
            "%{LOGLEVEL:logLevel} %{GREEDYDATA:actualLoggingMessage}"
        );
    }

    #[test]
    fn compile_rejects_empty_definition() {
        let err = GrokCompiler::compile("", &library()).unwrap_err();
        assert!(err.to_string().contains(keys::FILE_RECORD_MAPPING));
    }

    #[test]
    fn compile_rejects_invalid_expression() {
        let library = PatternLibrary::new().with_pattern("BROKEN", "[a-").unwrap();
        let err = GrokCompiler::compile("%{BROKEN:x}", &library).unwrap_err();
        assert!(matches!(err, LogPipelineError::PatternSyntax { .. }));
    }

    #[test]
    fn compile_rejects_duplicate_alias() {
        let err = GrokCompiler::compile("%{INT:n} %{LOGLEVEL:n}", &library()).unwrap_err();
        assert!(matches!(err, LogPipelineError::PatternSyntax { .. }));
    }

    #[test]
    fn compile_rejects_alias_repeated_across_alternation() {
        let err = GrokCompiler::compile(
            "(?:%{IPV4:ip}|%{IPV6:ip})",
            &PatternLibrary::builtin(),
        )
        .unwrap_err();
        assert!(matches!(err, LogPipelineError::PatternSyntax { .. }));

        let pattern = GrokCompiler::compile(
            "(?:%{IPV4:ipv4}|%{IPV6:ipv6})",
            &PatternLibrary::builtin(),
        )
        .unwrap();
        assert!(pattern.is_match("10.0.0.1"));
    }

    #[test]
    fn definition_without_references_is_a_plain_regex() {
        let pattern = GrokCompiler::compile("DOES NOT WORK", &library()).unwrap();
        assert!(pattern.field_names().is_empty());
        assert!(!pattern.is_match("INFO my test message"));
    }

    #[test]
    fn builtin_library_compiles_apache_log() {
        let pattern =
            GrokCompiler::compile("%{COMBINEDAPACHELOG}", &PatternLibrary::builtin()).unwrap();
        let names = pattern.field_names();
        assert!(names.contains(&"clientip"));
        assert!(names.contains(&"agent"));
    }
}
