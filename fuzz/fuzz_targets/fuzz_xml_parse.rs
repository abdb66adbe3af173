#![no_main]
use libfuzzer_sys::fuzz_target;
use xmlbridge::parser::{parse_bytes_with_options, parse_str_with_options, ParseOptions};
use xmlbridge::DocumentReader;

fuzz_target!(|data: &[u8]| {
    // Byte input goes through encoding detection; neither path may panic.
    let _ = parse_bytes_with_options(data, &ParseOptions::default());
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = parse_str_with_options(s, &ParseOptions::default().no_blanks(true));
        let mut reader = DocumentReader::new();
        let _ = reader.load_from_xml_string(s);
    }
});
