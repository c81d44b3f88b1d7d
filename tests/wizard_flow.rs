use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::rc::Rc;

use chrono::NaiveDate;
use invoice_wizard::columns::Column;
use invoice_wizard::forms::{BillToForm, CompanyForm};
use invoice_wizard::{
    ColumnSelection, Document, DocumentSink, LineEdit, PublishError, Slice, Step, Wizard,
};

/// Keeps every saved document and counts live previews.
#[derive(Default)]
struct RecordingSink {
    saved: RefCell<Vec<Document>>,
    previews: Rc<Cell<usize>>,
}

struct OpenPreview(Rc<Cell<usize>>);

impl Drop for OpenPreview {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

impl DocumentSink for RecordingSink {
    type Preview = OpenPreview;

    fn save(&self, document: &Document) -> Result<PathBuf, PublishError> {
        self.saved.borrow_mut().push(document.clone());
        Ok(PathBuf::from(format!("invoice_{}.pdf", self.saved.borrow().len())))
    }

    fn preview(&self, _document: &Document) -> Result<OpenPreview, PublishError> {
        self.previews.set(self.previews.get() + 1);
        Ok(OpenPreview(self.previews.clone()))
    }
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
}

fn acme() -> CompanyForm {
    CompanyForm {
        company_name: "Acme Co".into(),
        company_address: "1 Road".into(),
        city: "Springfield".into(),
        state: "IL".into(),
        zip: "62701".into(),
        phone: "555-0100".into(),
        email: "billing@acme.test".into(),
        invoice_number: "INV-001".into(),
        terms: "Net 30".into(),
        ..Default::default()
    }
}

fn beta() -> BillToForm {
    BillToForm {
        client_company_name: "Beta LLC".into(),
        client_company_address: "9 Ave".into(),
        city: "Shelbyville".into(),
        state: "IL".into(),
        zip: "62565".into(),
        phone: "555-0199".into(),
        email: "ap@beta.test".into(),
    }
}

/// Walks the first three steps with the Acme/Beta answers and a 10% tax.
fn wizard_at_items() -> Wizard<RecordingSink> {
    let mut wizard = Wizard::new(RecordingSink::default());
    wizard.advance(Slice::Company(acme().submit(date()).unwrap())).unwrap();
    wizard.advance(Slice::BillTo(beta().submit().unwrap())).unwrap();

    let mut selector = wizard.column_selector();
    selector.set(Column::Tax, true);
    selector.set_tax_rate("10");
    wizard.advance(Slice::Columns(selector.submit().unwrap())).unwrap();
    assert_eq!(wizard.step(), Step::LineItems);
    wizard
}

fn total_line(doc: &Document, label: &str) -> String {
    doc.totals
        .iter()
        .find(|t| t.label == label)
        .map(|t| t.value.clone())
        .unwrap_or_else(|| panic!("no {label} line in {:?}", doc.totals))
}

#[test]
fn acme_invoice_end_to_end() {
    let mut wizard = wizard_at_items();
    let mut editor = wizard.editor();
    editor.update_field(0, LineEdit::Description("Widget".into())).unwrap();
    editor.update_field(0, LineEdit::Quantity(3)).unwrap();
    editor.update_field(0, LineEdit::PricePerItem(20.0)).unwrap();

    let (items, subtotal) = editor.snapshot();
    assert_eq!(subtotal, 60.0);
    let path = wizard.submit(items, subtotal).unwrap();
    assert_eq!(path, Some(PathBuf::from("invoice_1.pdf")));

    let saved = wizard.sink().saved.borrow();
    let doc = &saved[0];
    assert_eq!(doc.issuer.name, "ACME CO");
    assert_eq!(doc.recipient.name, "BETA LLC");
    assert_eq!(doc.invoice_date, "18 October 2026");

    let headers: Vec<&str> = doc.table.columns.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(headers, ["Sr. No.", "Description", "Qty", "Price per Item", "Total Price"]);
    assert_eq!(doc.table.rows[0].cells, ["1", "Widget", "3", "20.00", "60.00"]);

    assert_eq!(total_line(doc, "Subtotal"), "60.00");
    assert_eq!(total_line(doc, "Tax (10.00%)"), "6.00");
    assert_eq!(total_line(doc, "Total"), "66.00");
    assert_eq!(doc.terms.as_deref(), Some(&["Net 30".to_string()][..]));
    assert!(doc.logo.is_none());
}

#[test]
fn zero_items_still_produce_an_invoice() {
    let mut wizard = wizard_at_items();
    let mut editor = wizard.editor();
    editor.delete_row(0).unwrap();

    let (items, subtotal) = editor.snapshot();
    assert!(items.is_empty());
    wizard.submit(items, subtotal).unwrap();

    let saved = wizard.sink().saved.borrow();
    let doc = &saved[0];
    assert!(doc.table.rows.is_empty());
    assert_eq!(total_line(doc, "Subtotal"), "0.00");
    assert_eq!(total_line(doc, "Total"), "0.00");
}

#[test]
fn going_back_and_forward_without_edits_keeps_every_slice() {
    let mut wizard = wizard_at_items();
    let mut editor = wizard.editor();
    editor.update_field(0, LineEdit::Quantity(2)).unwrap();
    wizard.keep_items(editor.items().to_vec());
    let before = wizard.state().clone();

    wizard.retreat();
    wizard.retreat();
    wizard.retreat();
    assert_eq!(wizard.step(), Step::CompanyDetails);

    let company = wizard.company_form().submit(date()).unwrap();
    wizard.advance(Slice::Company(company)).unwrap();
    let bill_to = wizard.bill_to_form().submit().unwrap();
    wizard.advance(Slice::BillTo(bill_to)).unwrap();
    let columns = wizard.column_selector().submit().unwrap();
    wizard.advance(Slice::Columns(columns)).unwrap();

    assert_eq!(wizard.state(), &before);
    assert_eq!(wizard.editor().items(), before.items.as_slice());
}

#[test]
fn narrowing_columns_reshapes_kept_items() {
    let mut wizard = wizard_at_items();
    let mut editor = wizard.editor();
    editor.update_field(0, LineEdit::Description("Bolt".into())).unwrap();
    editor.update_field(0, LineEdit::PricePerItem(5.0)).unwrap();
    wizard.keep_items(editor.items().to_vec());

    wizard.retreat();
    let narrower = ColumnSelection::new([Column::Description, Column::Quantity], None);
    wizard.advance(Slice::Columns(narrower)).unwrap();

    let editor = wizard.editor();
    assert_eq!(editor.items()[0].description.as_deref(), Some("Bolt"));
    assert_eq!(editor.items()[0].price_per_item, None);
    assert_eq!(editor.subtotal(), 0.0);
}

#[test]
fn previews_never_outlive_their_replacement() {
    let mut wizard = wizard_at_items();
    let live = wizard.sink().previews.clone();
    let (items, subtotal) = wizard.editor().snapshot();

    assert!(wizard.preview(items.clone(), subtotal).unwrap().is_some());
    assert!(wizard.preview(items.clone(), subtotal).unwrap().is_some());
    assert_eq!(live.get(), 1);

    wizard.submit(items, subtotal).unwrap();
    assert_eq!(live.get(), 1, "saving leaves the preview to the caller");
    assert!(wizard.dismiss_preview());
    assert_eq!(live.get(), 0);

    drop(wizard);
    assert_eq!(live.get(), 0);
}

#[test]
fn dropping_the_wizard_releases_an_open_preview() {
    let mut wizard = wizard_at_items();
    let live = wizard.sink().previews.clone();
    wizard.preview(vec![], 0.0).unwrap();
    assert_eq!(live.get(), 1);
    drop(wizard);
    assert_eq!(live.get(), 0);
}
