use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::columns::{Column, ColumnSelection};
use crate::logo::InlineImage;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

impl Address {
    /// "City, State, Zip" with blank parts left out.
    pub fn locality_line(&self) -> String {
        [&self.city, &self.state, &self.zip]
            .into_iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Issuer identity and invoice metadata (step 1).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CompanyDetails {
    pub logo: Option<InlineImage>,
    pub company_name: String,
    pub address: Address,
    pub phone: String,
    pub email: String,
    pub invoice_number: String,
    pub terms: String,
    pub invoice_date: NaiveDate,
}

/// Recipient identity (step 2).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BillToDetails {
    pub client_company_name: String,
    pub address: Address,
    pub phone: String,
    pub email: String,
}

/// One invoice line. Only the fields of enabled columns are `Some`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceLineItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uom: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_weight: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_per_item: Option<f64>,
}

impl InvoiceLineItem {
    pub const DEFAULT_QUANTITY: u32 = 1;

    /// A blank row for the given columns.
    pub fn for_columns(columns: &ColumnSelection) -> Self {
        Self::default().project(columns)
    }

    /// Re-shapes the row for another column set: values of still-enabled
    /// columns survive, newly enabled ones get defaults, disabled ones go.
    pub fn project(&self, columns: &ColumnSelection) -> Self {
        let keep = |c: Column| columns.contains(c);
        Self {
            description: keep(Column::Description)
                .then(|| self.description.clone().unwrap_or_default()),
            quantity: keep(Column::Quantity)
                .then(|| self.quantity.unwrap_or(Self::DEFAULT_QUANTITY)),
            uom: keep(Column::Uom).then(|| self.uom.clone().unwrap_or_default()),
            net_weight: keep(Column::NetWeight)
                .then(|| self.net_weight.clone().unwrap_or_default()),
            price_per_item: keep(Column::PricePerItem)
                .then(|| self.price_per_item.unwrap_or(0.0)),
        }
    }

    /// New row with exactly one field replaced.
    pub fn with_edit(&self, edit: LineEdit) -> Self {
        let mut row = self.clone();
        match edit {
            LineEdit::Description(v) => row.description = Some(v),
            LineEdit::Quantity(v) => row.quantity = Some(v),
            LineEdit::Uom(v) => row.uom = Some(v),
            LineEdit::NetWeight(v) => row.net_weight = Some(v),
            LineEdit::PricePerItem(v) => row.price_per_item = Some(v),
        }
        row
    }

    /// `quantity × price_per_item`, or 0 when either column is disabled.
    pub fn line_total(&self, columns: &ColumnSelection) -> f64 {
        if !(columns.contains(Column::Quantity) && columns.contains(Column::PricePerItem)) {
            return 0.0;
        }
        let quantity = self.quantity.unwrap_or(0) as f64;
        quantity * self.price_per_item.unwrap_or(0.0)
    }
}

/// A single-field change to a line item.
#[derive(Debug, Clone, PartialEq)]
pub enum LineEdit {
    Description(String),
    Quantity(u32),
    Uom(String),
    NetWeight(String),
    PricePerItem(f64),
}

impl LineEdit {
    pub fn column(&self) -> Column {
        match self {
            LineEdit::Description(_) => Column::Description,
            LineEdit::Quantity(_) => Column::Quantity,
            LineEdit::Uom(_) => Column::Uom,
            LineEdit::NetWeight(_) => Column::NetWeight,
            LineEdit::PricePerItem(_) => Column::PricePerItem,
        }
    }
}

/// Sum of the line totals. An empty list is `0.0`, never `-0.0`.
pub fn subtotal(items: &[InvoiceLineItem], columns: &ColumnSelection) -> f64 {
    items.iter().fold(0.0, |acc, i| acc + i.line_total(columns))
}

/// Derived amounts; never stored alongside the items.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Totals {
    pub subtotal: f64,
    pub tax_rate_percent: f64,
    pub tax_due: f64,
    pub total: f64,
}

impl Totals {
    /// Signed zeros are normalised so nothing formats as `-0.00`.
    pub fn from_subtotal(subtotal: f64, tax_rate_percent: f64) -> Self {
        let subtotal = subtotal + 0.0;
        let tax_rate_percent = tax_rate_percent + 0.0;
        let tax_due = subtotal * (tax_rate_percent / 100.0) + 0.0;
        Self {
            subtotal,
            tax_rate_percent,
            tax_due,
            total: subtotal + tax_due,
        }
    }

    pub fn compute(items: &[InvoiceLineItem], columns: &ColumnSelection) -> Self {
        Self::from_subtotal(subtotal(items, columns), columns.tax_rate_percent())
    }
}
