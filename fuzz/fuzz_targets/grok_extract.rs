#![no_main]

use std::sync::LazyLock;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tailgrok_log_pipeline::grok::{FieldExtractor, PatternLibrary};

static LIBRARY: LazyLock<PatternLibrary> = LazyLock::new(PatternLibrary::builtin);

const MAPPINGS: &[&str] = &[
    "%{COMBINEDAPACHELOG}",
    "%{SYSLOGBASE} %{GREEDYDATA:message}",
    "%{TIMESTAMP_ISO8601:timestamp} %{LOGLEVEL:level} %{GREEDYDATA:message}",
    "%{IP:client} %{WORD:method} %{URIPATHPARAM:request} %{NUMBER:bytes} %{NUMBER:duration}",
];

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    mapping: u8,
    line: String,
}

fuzz_target!(|input: FuzzInput| {
    let mapping = MAPPINGS[usize::from(input.mapping) % MAPPINGS.len()];
    let Ok(extractor) = FieldExtractor::from_definition(mapping, &LIBRARY) else {
        return;
    };

    let fields = extractor.extract(&input.line);
    if !extractor.pattern().is_match(&input.line) {
        assert!(fields.is_empty());
    }
});
