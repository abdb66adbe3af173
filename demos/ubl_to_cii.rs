//! Converts a UBL invoice into a UN/CEFACT Cross Industry Invoice.
//!
//! One reader answers queries against the UBL source while a second one
//! holds the CII tree being built, so the result can be checked with the
//! same query surface before it is written out.
//!
//! Run with: `cargo run --example ubl_to_cii [input.xml] [output.xml]`
#![allow(clippy::expect_used)]

use std::cell::RefCell;

use tracing_subscriber::EnvFilter;
use xmlbridge::error::{BoxError, Result};
use xmlbridge::{Callback, Document, DocumentReader, NodeId};

const RSM: &str = "urn:un:unece:uncefact:data:standard:CrossIndustryInvoice:100";
const RAM: &str =
    "urn:un:unece:uncefact:data:standard:ReusableAggregateBusinessInformationEntity:100";
const UDT: &str = "urn:un:unece:uncefact:data:standard:UnqualifiedDataType:100";

const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Invoice xmlns="urn:oasis:names:specification:ubl:schema:xsd:Invoice-2"
         xmlns:cac="urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2"
         xmlns:cbc="urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2">
  <cbc:ID>RE-2024-0042</cbc:ID>
  <cbc:IssueDate>2024-03-15</cbc:IssueDate>
  <cbc:InvoiceTypeCode>380</cbc:InvoiceTypeCode>
  <cbc:Note>Thank you for your order</cbc:Note>
  <cbc:DocumentCurrencyCode>EUR</cbc:DocumentCurrencyCode>
  <cac:AccountingSupplierParty>
    <cac:Party>
      <cac:PartyLegalEntity><cbc:RegistrationName>Seller GmbH</cbc:RegistrationName></cac:PartyLegalEntity>
    </cac:Party>
  </cac:AccountingSupplierParty>
  <cac:AccountingCustomerParty>
    <cac:Party>
      <cac:PartyName><cbc:Name>Buyer AG</cbc:Name></cac:PartyName>
    </cac:Party>
  </cac:AccountingCustomerParty>
  <cac:InvoiceLine>
    <cbc:ID>1</cbc:ID>
    <cbc:InvoicedQuantity unitCode="H87">2</cbc:InvoicedQuantity>
    <cac:Item><cbc:Name>Widget</cbc:Name></cac:Item>
  </cac:InvoiceLine>
  <cac:InvoiceLine>
    <cbc:ID>2</cbc:ID>
    <cbc:InvoicedQuantity unitCode="HUR">1</cbc:InvoicedQuantity>
    <cac:Item><cbc:Name>Installation</cbc:Name></cac:Item>
  </cac:InvoiceLine>
</Invoice>"#;

/// Appends CII elements to a tree under construction.
struct CiiBuilder {
    doc: Document,
}

impl CiiBuilder {
    fn new() -> (Self, NodeId) {
        let mut doc = Document::new();
        let root = doc.create_element("rsm:CrossIndustryInvoice", Some(RSM));
        doc.declare_namespace(root, Some("rsm"), RSM);
        doc.declare_namespace(root, Some("ram"), RAM);
        doc.declare_namespace(root, Some("udt"), UDT);
        let top = doc.root();
        doc.append_child(top, root);
        (Self { doc }, root)
    }

    fn element(&mut self, parent: NodeId, qname: &str) -> NodeId {
        let namespace = match qname.split_once(':') {
            Some(("rsm", _)) => RSM,
            Some(("udt", _)) => UDT,
            _ => RAM,
        };
        let node = self.doc.create_element(qname, Some(namespace));
        self.doc.append_child(parent, node);
        node
    }

    fn text(&mut self, parent: NodeId, qname: &str, value: &str) -> NodeId {
        let node = self.element(parent, qname);
        let text = self.doc.create_text(value);
        self.doc.append_child(node, text);
        node
    }
}

fn value(reader: &DocumentReader, node: NodeId) -> std::result::Result<String, BoxError> {
    reader
        .node_value(node)
        .ok_or_else(|| "matched node has no value".into())
}

/// UBL dates are `YYYY-MM-DD`; CII format 102 is `YYYYMMDD`.
fn to_format_102(date: &str) -> String {
    date.chars().filter(char::is_ascii_digit).collect()
}

fn map_header(src: &DocumentReader, out: &mut CiiBuilder, root: NodeId) -> Result<()> {
    let context = out.element(root, "rsm:ExchangedDocumentContext");
    let guideline = out.element(context, "ram:GuidelineSpecifiedDocumentContextParameter");
    out.text(guideline, "ram:ID", "urn:cen.eu:en16931:2017");

    let exchanged = out.element(root, "rsm:ExchangedDocument");
    let out = RefCell::new(out);

    src.when_exists(
        "/ubl:Invoice/cbc:ID",
        None,
        Some(Callback::node(|id| {
            out.borrow_mut().text(exchanged, "ram:ID", &value(src, id)?);
            Ok(())
        })),
        Some(Callback::no_args(|| Err("invoice has no ID".into()))),
    )?
    .when_equals(
        "/ubl:Invoice/cbc:InvoiceTypeCode",
        None,
        ["380", "381", "384", "389"],
        Some(Callback::node(|code| {
            out.borrow_mut().text(exchanged, "ram:TypeCode", &value(src, code)?);
            Ok(())
        })),
        Some(Callback::no_args(|| {
            out.borrow_mut().text(exchanged, "ram:TypeCode", "380");
            Ok(())
        })),
    )?
    .when_exists(
        "/ubl:Invoice/cbc:IssueDate",
        None,
        Some(Callback::node(|date| {
            let mut out = out.borrow_mut();
            let issued = out.element(exchanged, "ram:IssueDateTime");
            let stamp = out.text(issued, "udt:DateTimeString", &to_format_102(&value(src, date)?));
            out.doc.set_attribute(stamp, "format", "102");
            Ok(())
        })),
        None,
    )?
    .when_exists(
        "/ubl:Invoice/cbc:Note",
        None,
        Some(Callback::node(|note| {
            let mut out = out.borrow_mut();
            let included = out.element(exchanged, "ram:IncludedNote");
            out.text(included, "ram:Content", &value(src, note)?);
            Ok(())
        })),
        None,
    )?;
    Ok(())
}

fn map_lines(src: &DocumentReader, out: &mut CiiBuilder, transaction: NodeId) -> Result<()> {
    for line in &src.query_all("/ubl:Invoice/cac:InvoiceLine", None) {
        let item = out.element(transaction, "ram:IncludedSupplyChainTradeLineItem");
        let out = RefCell::new(&mut *out);
        src.when_exists(
            "cbc:ID",
            Some(line),
            Some(Callback::node(|id| {
                let mut out = out.borrow_mut();
                let doc_line = out.element(item, "ram:AssociatedDocumentLineDocument");
                out.text(doc_line, "ram:LineID", &value(src, id)?);
                Ok(())
            })),
            None,
        )?
        .when_exists(
            "cac:Item/cbc:Name",
            Some(line),
            Some(Callback::node(|name| {
                let mut out = out.borrow_mut();
                let product = out.element(item, "ram:SpecifiedTradeProduct");
                out.text(product, "ram:Name", &value(src, name)?);
                Ok(())
            })),
            None,
        )?
        .when_exists(
            "cbc:InvoicedQuantity",
            Some(line),
            Some(Callback::node(|quantity| {
                let unit = src
                    .query_value("@unitCode", Some(quantity))
                    .unwrap_or_else(|| "C62".to_string());
                let mut out = out.borrow_mut();
                let delivery = out.element(item, "ram:SpecifiedLineTradeDelivery");
                let billed = out.text(delivery, "ram:BilledQuantity", &value(src, quantity)?);
                out.doc.set_attribute(billed, "unitCode", &unit);
                Ok(())
            })),
            None,
        )?;
    }
    Ok(())
}

fn map_parties(src: &DocumentReader, out: &mut CiiBuilder, agreement: NodeId) -> Result<()> {
    let parties = [
        ("cac:AccountingSupplierParty", "ram:SellerTradeParty"),
        ("cac:AccountingCustomerParty", "ram:BuyerTradeParty"),
    ];
    for (ubl, cii) in parties {
        let party = out.element(agreement, cii);
        let registration = format!("/ubl:Invoice/{ubl}/cac:Party/cac:PartyLegalEntity/cbc:RegistrationName");
        let trading = format!("/ubl:Invoice/{ubl}/cac:Party/cac:PartyName/cbc:Name");
        src.when_one_exists(
            &[registration.as_str(), trading.as_str()],
            &[None, None],
            Some(Callback::node(|name| {
                out.text(party, "ram:Name", &value(src, name)?);
                Ok(())
            })),
            None,
        )?;
    }
    Ok(())
}

fn convert(src: &DocumentReader) -> Result<DocumentReader> {
    let (mut out, root) = CiiBuilder::new();
    map_header(src, &mut out, root)?;

    let transaction = out.element(root, "rsm:SupplyChainTradeTransaction");
    map_lines(src, &mut out, transaction)?;

    let agreement = out.element(transaction, "ram:ApplicableHeaderTradeAgreement");
    map_parties(src, &mut out, agreement)?;

    let settlement = out.element(transaction, "ram:ApplicableHeaderTradeSettlement");
    let currency = src
        .query_value("/ubl:Invoice/cbc:DocumentCurrencyCode", None)
        .unwrap_or_else(|| "EUR".to_string());
    out.text(settlement, "ram:InvoiceCurrencyCode", &currency);

    Ok(DocumentReader::from_document(out.doc))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let mut src = DocumentReader::new();
    src.add_namespace("ubl", "urn:oasis:names:specification:ubl:schema:xsd:Invoice-2")
        .add_namespace(
            "cac",
            "urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2",
        )
        .add_namespace(
            "cbc",
            "urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2",
        );
    let loaded = match args.next() {
        Some(path) => src.load_from_xml_file(&path),
        None => src.load_from_xml_string(SAMPLE),
    };
    loaded.expect("failed to load UBL invoice");

    let cii = convert(&src).expect("conversion failed");

    let lines = cii.query_all("//ram:IncludedSupplyChainTradeLineItem", None);
    eprintln!(
        "converted {} as CII with {} line(s)",
        cii.query_value("/rsm:CrossIndustryInvoice/rsm:ExchangedDocument/ram:ID", None)
            .unwrap_or_default(),
        lines.len()
    );

    match args.next() {
        Some(path) => cii.serialize_to_file(path).expect("failed to write output"),
        None => print!("{}", cii.serialize().expect("failed to serialize")),
    }
}
