#![no_main]

use std::sync::LazyLock;

use libfuzzer_sys::fuzz_target;
use tailgrok_log_pipeline::grok::{GrokCompiler, PatternLibrary};

static LIBRARY: LazyLock<PatternLibrary> = LazyLock::new(PatternLibrary::builtin);

fuzz_target!(|data: &[u8]| {
    let Ok(definition) = std::str::from_utf8(data) else {
        return;
    };

    // Ok or PatternSyntax, never a panic
    if let Ok(pattern) = GrokCompiler::compile(definition, &LIBRARY) {
        let _ = pattern.is_match(definition);
    }
});
