#![no_main]
use libfuzzer_sys::fuzz_target;
use xmlbridge::DocumentReader;

const INVOICE: &str = r#"<Invoice xmlns:cbc="urn:cbc" xmlns:cac="urn:cac">
  <cbc:ID>1</cbc:ID>
  <cac:InvoiceLine><cbc:ID>1</cbc:ID><cbc:Amount currencyID="EUR">2</cbc:Amount></cac:InvoiceLine>
</Invoice>"#;

fuzz_target!(|data: &[u8]| {
    if let Ok(expr) = std::str::from_utf8(data) {
        if let Ok(reader) = DocumentReader::from_xml_string(INVOICE) {
            // Query failures are values; nothing here may panic.
            let _ = reader.query(expr, None);
            let _ = reader.query_value(expr, None);
        }
    }
});
