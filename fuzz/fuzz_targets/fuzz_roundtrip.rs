#![no_main]
use libfuzzer_sys::fuzz_target;
use xmlbridge::parser::parse_str;
use xmlbridge::serial::serialize;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Whatever parses must serialize to something that parses again.
        if let Ok(doc) = parse_str(s) {
            let output = serialize(&doc);
            assert!(parse_str(&output).is_ok(), "serializer produced malformed XML");
        }
    }
});
