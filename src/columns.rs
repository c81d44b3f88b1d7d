use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FieldErrors;

/// Optional invoice-line attributes. "Total Price" is always rendered and is
/// not a variant.
///
/// Variant order is the canonical column order; `Ord` follows it, so a
/// `BTreeSet<Column>` always iterates in table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Column {
    SrNo,
    Description,
    Quantity,
    Uom,
    NetWeight,
    PricePerItem,
    Tax,
}

impl Column {
    pub const ALL: [Column; 7] = [
        Column::SrNo,
        Column::Description,
        Column::Quantity,
        Column::Uom,
        Column::NetWeight,
        Column::PricePerItem,
        Column::Tax,
    ];

    /// Columns that become table columns, in the order they are drawn.
    /// `Tax` only affects the totals block.
    pub const TABLE_ORDER: [Column; 6] = [
        Column::SrNo,
        Column::Description,
        Column::Quantity,
        Column::Uom,
        Column::NetWeight,
        Column::PricePerItem,
    ];

    pub const DEFAULTS: [Column; 4] = [
        Column::SrNo,
        Column::Description,
        Column::Quantity,
        Column::PricePerItem,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Column::SrNo => "srNo",
            Column::Description => "description",
            Column::Quantity => "quantity",
            Column::Uom => "uom",
            Column::NetWeight => "netWeight",
            Column::PricePerItem => "pricePerItem",
            Column::Tax => "tax",
        }
    }

    /// Label shown by the column selector.
    pub fn label(self) -> &'static str {
        match self {
            Column::SrNo => "Sr. No.",
            Column::Description => "Description",
            Column::Quantity => "Quantity",
            Column::Uom => "Unit of Measure (UOM)",
            Column::NetWeight => "Net Weight",
            Column::PricePerItem => "Price per Item",
            Column::Tax => "Tax",
        }
    }

    /// Header text in the rendered item table.
    pub fn header(self) -> &'static str {
        match self {
            Column::SrNo => "Sr. No.",
            Column::Description => "Description",
            Column::Quantity => "Qty",
            Column::Uom => "UOM",
            Column::NetWeight => "Net Weight",
            Column::PricePerItem => "Price per Item",
            Column::Tax => "Tax",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// The enabled optional columns plus the tax rate that goes with `Tax`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSelection {
    columns: BTreeSet<Column>,
    tax_rate_percent: Option<f64>,
}

impl Default for ColumnSelection {
    fn default() -> Self {
        Self::new(Column::DEFAULTS, None)
    }
}

impl ColumnSelection {
    /// A rate given without the `Tax` column is dropped.
    pub fn new(columns: impl IntoIterator<Item = Column>, tax_rate_percent: Option<f64>) -> Self {
        let columns: BTreeSet<Column> = columns.into_iter().collect();
        let tax_rate_percent = tax_rate_percent.filter(|_| columns.contains(&Column::Tax));
        Self { columns, tax_rate_percent }
    }

    pub fn contains(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    pub fn iter(&self) -> impl Iterator<Item = Column> + '_ {
        self.columns.iter().copied()
    }

    pub fn table_columns(&self) -> impl Iterator<Item = Column> + '_ {
        Column::TABLE_ORDER.into_iter().filter(|c| self.contains(*c))
    }

    pub fn has_tax(&self) -> bool {
        self.contains(Column::Tax)
    }

    /// The rate as entered, `None` when left blank or when tax is disabled.
    pub fn tax_rate(&self) -> Option<f64> {
        self.tax_rate_percent
    }

    /// Resolved rate used for totals; blank means 0%.
    pub fn tax_rate_percent(&self) -> f64 {
        self.tax_rate_percent.unwrap_or(0.0)
    }
}

/// Editable draft behind the column step.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSelector {
    selected: BTreeSet<Column>,
    tax_rate: String,
}

impl Default for ColumnSelector {
    fn default() -> Self {
        Self::from_selection(&ColumnSelection::default())
    }
}

impl ColumnSelector {
    pub fn from_selection(selection: &ColumnSelection) -> Self {
        Self {
            selected: selection.columns.clone(),
            tax_rate: selection.tax_rate().map(|r| r.to_string()).unwrap_or_default(),
        }
    }

    pub fn is_selected(&self, column: Column) -> bool {
        self.selected.contains(&column)
    }

    /// Flips membership and returns the new state.
    pub fn toggle(&mut self, column: Column) -> bool {
        let enabled = !self.is_selected(column);
        self.set(column, enabled);
        enabled
    }

    pub fn set(&mut self, column: Column, enabled: bool) {
        if enabled {
            self.selected.insert(column);
        } else {
            self.selected.remove(&column);
            if column == Column::Tax {
                self.tax_rate.clear();
            }
        }
    }

    /// Stores the raw rate input. Ignored (returns false) while `Tax` is off.
    pub fn set_tax_rate(&mut self, raw: impl Into<String>) -> bool {
        if !self.is_selected(Column::Tax) {
            return false;
        }
        self.tax_rate = raw.into();
        true
    }

    pub fn tax_rate_input(&self) -> &str {
        &self.tax_rate
    }

    pub fn submit(&self) -> Result<ColumnSelection, FieldErrors> {
        let mut errors = FieldErrors::new();
        let rate = if self.is_selected(Column::Tax) {
            match parse_tax_rate(&self.tax_rate) {
                Ok(rate) => rate,
                Err(message) => {
                    errors.insert("tax_rate", message);
                    None
                }
            }
        } else {
            None
        };
        errors.into_result(ColumnSelection::new(self.selected.iter().copied(), rate))
    }
}

/// Parses a percentage in 0..=100 rounded to 2 decimals. Blank input is `None`.
pub fn parse_tax_rate(raw: &str) -> Result<Option<f64>, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let rate: f64 = raw
        .trim_end_matches('%')
        .trim()
        .parse()
        .map_err(|_| format!("'{raw}' is not a number"))?;
    if !rate.is_finite() || !(0.0..=100.0).contains(&rate) {
        return Err("Tax percentage must be between 0 and 100".to_string());
    }
    // `+ 0.0` turns an entered "-0" into 0
    Ok(Some((rate * 100.0).round() / 100.0 + 0.0))
}
