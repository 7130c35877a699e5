#![no_main]

use libfuzzer_sys::fuzz_target;
use tailgrok_log_pipeline::grok::PatternLibrary;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let library = PatternLibrary::parse_records(&text);

    // every parsed record is a single non-empty name
    for name in library.names() {
        assert!(!name.is_empty());
        assert!(!name.contains(char::is_whitespace));
    }
});
