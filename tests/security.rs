//! Resource-limit tests for the parser and the reader.
//!
//! Invoices arrive from outside the trust boundary, so the parser must
//! reject pathological input (deep nesting, huge names and text, entity
//! bombs) with an error instead of exhausting memory or the stack.

#![allow(clippy::unwrap_used)]

use std::fmt::Write;

use xmlbridge::parser::{parse_str_with_options, ParseOptions};
use xmlbridge::{Document, DocumentReader, ReaderError};

fn nested(depth: usize) -> String {
    let open: String = (0..depth).map(|_| "<a>").collect();
    let close: String = (0..depth).map(|_| "</a>").collect();
    format!("{open}{close}")
}

// ---------------------------------------------------------------------------
// Depth limit tests
// ---------------------------------------------------------------------------

#[test]
fn test_deeply_nested_elements_rejected() {
    // 300 levels, beyond the default limit of 256. Debug builds need the
    // larger stack.
    let result = std::thread::Builder::new()
        .stack_size(8 * 1024 * 1024)
        .spawn(|| Document::parse_str(&nested(300)))
        .unwrap()
        .join()
        .unwrap();
    let err = result.unwrap_err();
    assert!(
        err.message.contains("depth"),
        "error should mention depth: {}",
        err.message
    );
}

#[test]
fn test_depth_limit_exact_boundary() {
    let opts = ParseOptions::default().max_depth(3);
    assert!(parse_str_with_options(&nested(3), &opts).is_ok());
    assert!(parse_str_with_options(&nested(4), &opts).is_err());
}

#[test]
fn test_depth_limit_applies_to_reader() {
    let mut reader = DocumentReader::new().with_parse_options(ParseOptions::default().max_depth(2));
    let err = reader.load_from_xml_string(&nested(3)).unwrap_err();
    assert!(matches!(err, ReaderError::Parse));
    assert!(!reader.is_loaded());
    reader.load_from_xml_string(&nested(2)).unwrap();
    assert!(reader.is_loaded());
}

// ---------------------------------------------------------------------------
// Name and text length tests
// ---------------------------------------------------------------------------

#[test]
fn test_long_element_name_rejected() {
    let name = "n".repeat(65);
    let xml = format!("<{name}/>");
    let opts = ParseOptions::default().max_name_length(64);
    let err = parse_str_with_options(&xml, &opts).unwrap_err();
    assert!(err.message.contains("name"), "unexpected: {}", err.message);
}

#[test]
fn test_long_attribute_name_rejected() {
    let name = "n".repeat(65);
    let xml = format!("<a {name}=\"1\"/>");
    let opts = ParseOptions::default().max_name_length(64);
    assert!(parse_str_with_options(&xml, &opts).is_err());
}

#[test]
fn test_name_at_limit_accepted() {
    let name = "n".repeat(64);
    let xml = format!("<{name}/>");
    let opts = ParseOptions::default().max_name_length(64);
    let doc = parse_str_with_options(&xml, &opts).unwrap();
    let root = doc.root_element().unwrap();
    assert_eq!(doc.node_name(root), Some(name.as_str()));
}

#[test]
fn test_long_text_rejected() {
    let xml = format!("<Note>{}</Note>", "x".repeat(2_000));
    let opts = ParseOptions::default().max_text_length(1_000);
    let err = parse_str_with_options(&xml, &opts).unwrap_err();
    assert!(err.message.contains("length"), "unexpected: {}", err.message);
}

#[test]
fn test_long_attribute_value_rejected() {
    let xml = format!("<a b=\"{}\"/>", "x".repeat(2_000));
    let opts = ParseOptions::default().max_text_length(1_000);
    assert!(parse_str_with_options(&xml, &opts).is_err());
}

// ---------------------------------------------------------------------------
// Attribute count tests
// ---------------------------------------------------------------------------

#[test]
fn test_too_many_attributes_rejected() {
    let mut xml = String::from("<a");
    for i in 0..20 {
        write!(xml, " x{i}=\"{i}\"").unwrap();
    }
    xml.push_str("/>");

    let opts = ParseOptions::default().max_attributes(10);
    let err = parse_str_with_options(&xml, &opts).unwrap_err();
    assert!(
        err.message.contains("attributes"),
        "unexpected: {}",
        err.message
    );

    let opts = ParseOptions::default().max_attributes(20);
    let doc = parse_str_with_options(&xml, &opts).unwrap();
    assert_eq!(doc.attributes(doc.root_element().unwrap()).len(), 20);
}

// ---------------------------------------------------------------------------
// Entity tests
// ---------------------------------------------------------------------------

fn billion_laughs() -> String {
    let mut xml = String::from("<?xml version=\"1.0\"?>\n<!DOCTYPE lolz [\n  <!ENTITY lol0 \"lol\">\n");
    for level in 1..=9 {
        let refs: String = (0..10).map(|_| format!("&lol{};", level - 1)).collect();
        writeln!(xml, "  <!ENTITY lol{level} \"{refs}\">").unwrap();
    }
    xml.push_str("]>\n<lolz>&lol9;</lolz>");
    xml
}

#[test]
fn test_billion_laughs_rejected() {
    let err = Document::parse_str(&billion_laughs()).unwrap_err();
    assert!(
        err.message.contains("expansion limit"),
        "unexpected: {}",
        err.message
    );
}

#[test]
fn test_billion_laughs_rejected_by_reader() {
    let mut reader = DocumentReader::new();
    assert!(matches!(
        reader.load_from_xml_string(&billion_laughs()),
        Err(ReaderError::Parse)
    ));
}

#[test]
fn test_entity_expansion_limit_configurable() {
    let xml = r#"<!DOCTYPE a [<!ENTITY e "x">]><a>&e;&e;&e;</a>"#;
    let opts = ParseOptions::default().max_entity_expansions(2);
    assert!(parse_str_with_options(xml, &opts).is_err());
    let opts = ParseOptions::default().max_entity_expansions(3);
    let doc = parse_str_with_options(xml, &opts).unwrap();
    assert_eq!(doc.text_content(doc.root_element().unwrap()), "xxx");
}

#[test]
fn test_quadratic_blowup_capped_by_text_length() {
    // One large entity referenced many times stays under the expansion
    // count but not under the text limit.
    let big = "x".repeat(10_000);
    let refs = "&big;".repeat(500);
    let xml = format!("<!DOCTYPE a [<!ENTITY big \"{big}\">]><a>{refs}</a>");
    let opts = ParseOptions::default().max_text_length(1_000_000);
    let err = parse_str_with_options(&xml, &opts).unwrap_err();
    assert!(err.message.contains("length"), "unexpected: {}", err.message);
}

#[test]
fn test_recursive_entity_rejected() {
    let xml = r#"<!DOCTYPE a [<!ENTITY a "&b;"><!ENTITY b "&a;">]><a>&a;</a>"#;
    let err = Document::parse_str(xml).unwrap_err();
    assert!(err.message.contains("recursive"), "unexpected: {}", err.message);
}

#[test]
fn test_external_entity_not_resolved() {
    let xml = r#"<!DOCTYPE Invoice [
  <!ENTITY xxe SYSTEM "file:///etc/passwd">
]>
<Invoice><Note>&xxe;</Note></Invoice>"#;
    let mut reader = DocumentReader::new();
    assert!(matches!(
        reader.load_from_xml_string(xml),
        Err(ReaderError::Parse)
    ));
}

#[test]
fn test_predefined_and_character_references_expand() {
    let doc = Document::parse_str("<a>&lt;&amp;&gt;&apos;&quot;&#65;&#x42;</a>").unwrap();
    let root = doc.root_element().unwrap();
    assert_eq!(doc.text_content(root), "<&>'\"AB");
}

#[test]
fn test_invalid_character_reference_rejected() {
    assert!(Document::parse_str("<a>&#0;</a>").is_err());
    assert!(Document::parse_str("<a>&#xD800;</a>").is_err());
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

#[test]
fn test_default_limits_accept_realistic_invoice() {
    let mut xml = String::from(r#"<Invoice xmlns:cbc="urn:cbc">"#);
    for i in 0..2_000 {
        write!(xml, "<Line><cbc:ID>{i}</cbc:ID><cbc:Note>line {i}</cbc:Note></Line>").unwrap();
    }
    xml.push_str("</Invoice>");

    let mut reader = DocumentReader::new();
    reader.add_namespace("cbc", "urn:cbc");
    reader.load_from_xml_string(&xml).unwrap();
    assert_eq!(reader.query_all("/Invoice/Line", None).len(), 2_000);
    assert_eq!(
        reader.query_value("/Invoice/Line[last()]/cbc:ID", None).as_deref(),
        Some("1999")
    );
}
