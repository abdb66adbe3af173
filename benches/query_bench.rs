#![allow(clippy::expect_used)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::fmt::Write;
use xmlbridge::{Callback, DocumentReader};

const CBC: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2";
const CAC: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2";

/// Generates a UBL invoice with `lines` invoice lines.
fn make_invoice(lines: usize) -> String {
    let mut xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <Invoice xmlns=\"urn:oasis:names:specification:ubl:schema:xsd:Invoice-2\" \
         xmlns:cbc=\"{CBC}\" xmlns:cac=\"{CAC}\">\n  <cbc:ID>INV-1</cbc:ID>\n"
    );
    for i in 0..lines {
        let _ = writeln!(
            xml,
            "  <cac:InvoiceLine><cbc:ID>{i}</cbc:ID>\
             <cbc:InvoicedQuantity unitCode=\"C62\">{}</cbc:InvoicedQuantity>\
             <cbc:LineExtensionAmount currencyID=\"EUR\">{}.00</cbc:LineExtensionAmount>\
             </cac:InvoiceLine>",
            i % 7 + 1,
            i * 3
        );
    }
    xml.push_str("</Invoice>\n");
    xml
}

fn bench_load(c: &mut Criterion) {
    let small = make_invoice(10);
    let large = make_invoice(1000);
    c.bench_function("load_10_lines", |b| {
        b.iter(|| DocumentReader::from_xml_string(black_box(&small)).expect("load"));
    });
    c.bench_function("load_1000_lines", |b| {
        b.iter(|| DocumentReader::from_xml_string(black_box(&large)).expect("load"));
    });
}

fn bench_queries(c: &mut Criterion) {
    let mut reader = DocumentReader::new();
    reader.add_namespace("cbc", CBC).add_namespace("cac", CAC);
    reader
        .load_from_xml_string(&make_invoice(1000))
        .expect("load");

    c.bench_function("query_value_header", |b| {
        b.iter(|| reader.query_value(black_box("/*/cbc:ID"), None));
    });
    c.bench_function("query_all_lines", |b| {
        b.iter(|| reader.query_all(black_box("//cac:InvoiceLine"), None).len());
    });
    c.bench_function("per_line_dispatch", |b| {
        let lines = reader.query_all("//cac:InvoiceLine", None);
        b.iter(|| {
            let mut total = 0usize;
            for line in &lines {
                reader
                    .when_exists(
                        "cbc:LineExtensionAmount",
                        Some(line),
                        Some(Callback::no_args(|| {
                            total += 1;
                            Ok(())
                        })),
                        None,
                    )
                    .expect("dispatch");
            }
            total
        });
    });
}

criterion_group!(benches, bench_load, bench_queries);
criterion_main!(benches);
