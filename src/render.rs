//! Invoice layout.
//!
//! [`render`] maps the collected slices to a [`Document`]: every string that
//! ends up on the page, already resolved and formatted. Turning that into a
//! PDF is the publisher's job (see `typst.rs`).

use serde::Serialize;
use tracing::warn;

use crate::columns::{Column, ColumnSelection};
use crate::logo::InlineImage;
use crate::model::{Address, BillToDetails, CompanyDetails, InvoiceLineItem, Totals};

pub const TITLE: &str = "INVOICE";
pub const TOTAL_PRICE_HEADER: &str = "Total Price";
pub const CLOSING_NOTES: [&str; 2] = [
    "Thank you for your business!",
    "This is an electronically generated document, no signature is required.",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub title: String,
    pub invoice_number: String,
    pub invoice_date: String,
    #[serde(skip)]
    pub logo: Option<InlineImage>,
    pub issuer: PartyBlock,
    pub recipient: PartyBlock,
    pub table: ItemTable,
    pub totals: Vec<TotalLine>,
    /// `None` when the issuer left the terms blank.
    pub terms: Option<Vec<String>>,
    pub closing: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartyBlock {
    pub heading: String,
    pub name: String,
    pub street: String,
    pub locality: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableColumn {
    pub label: String,
    pub align: Align,
    /// Relative width in fractions of the table.
    pub width: u8,
    /// Draw a vertical rule after this column.
    pub divider: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub cells: Vec<String>,
    pub striped: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemTable {
    pub columns: Vec<TableColumn>,
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalLine {
    pub label: String,
    pub value: String,
    pub emphasis: bool,
}

/// Lays out the invoice. Returns `None` instead of a half-filled document
/// when the issuer, recipient or item list is missing.
pub fn render(
    company: Option<&CompanyDetails>,
    bill_to: Option<&BillToDetails>,
    columns: &ColumnSelection,
    items: Option<&[InvoiceLineItem]>,
    subtotal: f64,
    tax_rate_percent: f64,
) -> Option<Document> {
    let (Some(company), Some(bill_to), Some(items)) = (company, bill_to, items) else {
        warn!(
            company = company.is_some(),
            bill_to = bill_to.is_some(),
            items = items.is_some(),
            "refusing to render incomplete invoice"
        );
        return None;
    };

    let totals = Totals::from_subtotal(subtotal, tax_rate_percent);

    Some(Document {
        title: TITLE.to_string(),
        invoice_number: company.invoice_number.clone(),
        invoice_date: company.invoice_date.format("%-d %B %Y").to_string(),
        logo: company.logo.clone(),
        issuer: party(
            "Billed By",
            &company.company_name,
            &company.address,
            &company.email,
            &company.phone,
        ),
        recipient: party(
            "Billed To",
            &bill_to.client_company_name,
            &bill_to.address,
            &bill_to.email,
            &bill_to.phone,
        ),
        table: item_table(columns, items),
        totals: totals_block(columns, &totals),
        terms: terms_lines(&company.terms),
        closing: CLOSING_NOTES.iter().map(|s| s.to_string()).collect(),
    })
}

fn party(heading: &str, name: &str, address: &Address, email: &str, phone: &str) -> PartyBlock {
    PartyBlock {
        heading: heading.to_string(),
        name: name.to_uppercase(),
        street: address.street.clone(),
        locality: address.locality_line(),
        email: email.to_string(),
        phone: phone.to_string(),
    }
}

fn item_table(columns: &ColumnSelection, items: &[InvoiceLineItem]) -> ItemTable {
    let mut layout: Vec<TableColumn> = columns
        .table_columns()
        .map(|c| {
            let (align, width) = match c {
                Column::Description => (Align::Left, 4),
                Column::PricePerItem => (Align::Right, 2),
                _ => (Align::Center, 1),
            };
            TableColumn {
                label: c.header().to_string(),
                align,
                width,
                divider: true,
            }
        })
        .collect();
    layout.push(TableColumn {
        label: TOTAL_PRICE_HEADER.to_string(),
        align: Align::Right,
        width: 2,
        divider: false,
    });

    let rows = items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            let mut cells: Vec<String> =
                columns.table_columns().map(|c| cell(c, idx, item)).collect();
            cells.push(format!("{:.2}", item.line_total(columns)));
            TableRow {
                cells,
                striped: idx % 2 == 1,
            }
        })
        .collect();

    ItemTable { columns: layout, rows }
}

/// Text of one table cell; `idx` is the 0-based row position.
pub fn cell(column: Column, idx: usize, item: &InvoiceLineItem) -> String {
    match column {
        Column::SrNo => (idx + 1).to_string(),
        Column::Description => item.description.clone().unwrap_or_default(),
        Column::Quantity => item.quantity.map(|q| q.to_string()).unwrap_or_default(),
        Column::Uom => item.uom.clone().unwrap_or_default(),
        Column::NetWeight => item.net_weight.clone().unwrap_or_default(),
        Column::PricePerItem => item
            .price_per_item
            .map(|p| format!("{p:.2}"))
            .unwrap_or_default(),
        Column::Tax => String::new(),
    }
}

fn totals_block(columns: &ColumnSelection, totals: &Totals) -> Vec<TotalLine> {
    let mut lines = vec![TotalLine {
        label: "Subtotal".to_string(),
        value: format!("{:.2}", totals.subtotal),
        emphasis: false,
    }];
    if columns.has_tax() {
        lines.push(TotalLine {
            label: format!("Tax ({:.2}%)", totals.tax_rate_percent),
            value: format!("{:.2}", totals.tax_due),
            emphasis: false,
        });
    }
    lines.push(TotalLine {
        label: "Total".to_string(),
        value: format!("{:.2}", totals.total),
        emphasis: true,
    });
    lines
}

fn terms_lines(terms: &str) -> Option<Vec<String>> {
    if terms.trim().is_empty() {
        return None;
    }
    Some(terms.lines().map(|l| l.trim_end().to_string()).collect())
}
