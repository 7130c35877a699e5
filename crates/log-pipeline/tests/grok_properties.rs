//! Property tests for pattern records, compilation and extraction.

use std::collections::BTreeSet;

use proptest::prelude::*;
use tailgrok_log_pipeline::grok::{FieldExtractor, GrokCompiler, PatternLibrary};

fn library() -> PatternLibrary {
    PatternLibrary::new()
        .with_pattern("LOGLEVEL", "INFO|WARN|ERROR")
        .unwrap()
        .with_pattern("GREEDYDATA", ".*")
        .unwrap()
        .with_pattern("WORD", r"\b\w+\b")
        .unwrap()
        .with_pattern("INT", r"[+-]?\d+")
        .unwrap()
}

proptest! {
    #[test]
    fn extract_never_panics_and_is_empty_without_match(input in ".{0,200}") {
        let extractor =
            FieldExtractor::from_definition("%{LOGLEVEL:level} %{GREEDYDATA:message}", &library())
                .unwrap();
        let fields = extractor.extract(&input);
        prop_assert_eq!(fields.is_empty(), !extractor.pattern().is_match(&input));
    }

    #[test]
    fn one_named_group_per_aliased_reference(
        aliases in prop::collection::btree_set("[a-z][a-z0-9_]{0,8}", 1..6)
    ) {
        let definition = aliases
            .iter()
            .map(|alias| format!("%{{WORD:{alias}}}"))
            .collect::<Vec<_>>()
            .join(" ");
        let pattern = GrokCompiler::compile(&definition, &library()).unwrap();
        let names: BTreeSet<String> =
            pattern.field_names().into_iter().map(str::to_owned).collect();
        prop_assert_eq!(names, aliases);
    }

    #[test]
    fn compiling_twice_extracts_identically(
        level in "INFO|WARN|ERROR",
        count in -10_000i64..10_000,
        tail in "[a-z ]{0,30}",
    ) {
        let definition = "%{LOGLEVEL:level} %{INT:count}%{GREEDYDATA:rest}";
        let first = GrokCompiler::compile(definition, &library()).unwrap();
        let second = GrokCompiler::compile(definition, &library()).unwrap();
        let input = format!("{level} {count}{tail}");

        let fields = first.extract(&input);
        prop_assert_eq!(&fields, &second.extract(&input));
        prop_assert_eq!(fields["level"].as_str(), level.as_str());
        prop_assert_eq!(fields["count"].parse::<i64>().unwrap(), count);
    }

    #[test]
    fn unresolved_reference_matches_only_literal_text(
        name in "[A-Z]{3,10}_UNDEFINED",
        text in "[a-z ]{0,40}",
    ) {
        let definition = format!("%{{{name}}}");
        let pattern = GrokCompiler::compile(&definition, &library()).unwrap();
        prop_assert!(!pattern.is_match(&text));
        let literal = format!("{text}%{{{name}}}{text}");
        prop_assert!(pattern.is_match(&literal));
    }

    #[test]
    fn well_formed_records_are_parsed(
        name in "[A-Z][A-Z0-9_]{0,15}",
        fragment in r"[a-z0-9\\|()+*.\[\]-]{1,30}",
        comment in "[a-z ]{0,20}",
    ) {
        let text = format!("{name} {fragment} #{comment}\n");
        let parsed = PatternLibrary::parse_records(&text);
        prop_assert_eq!(parsed.get(&name), Some(fragment.as_str()));
    }

    #[test]
    fn record_parsing_never_panics(text in ".{0,300}") {
        let _ = PatternLibrary::parse_records(&text);
    }
}
