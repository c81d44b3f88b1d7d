use tracing::debug;

use crate::columns::ColumnSelection;
use crate::error::EditorError;
use crate::model::{self, InvoiceLineItem, LineEdit};

/// Ordered invoice lines for one column set.
///
/// Every mutation builds a new row vector rather than patching rows in
/// place; the subtotal is always derived from the current rows.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItemEditor {
    columns: ColumnSelection,
    items: Vec<InvoiceLineItem>,
}

impl LineItemEditor {
    /// Starts with a single blank row.
    pub fn new(columns: ColumnSelection) -> Self {
        let items = vec![InvoiceLineItem::for_columns(&columns)];
        Self { columns, items }
    }

    /// Re-opens previously entered rows, re-shaped for `columns`. Falls back
    /// to one blank row when there is nothing to restore.
    pub fn with_items(columns: ColumnSelection, items: &[InvoiceLineItem]) -> Self {
        if items.is_empty() {
            return Self::new(columns);
        }
        let items = items.iter().map(|i| i.project(&columns)).collect();
        Self { columns, items }
    }

    pub fn columns(&self) -> &ColumnSelection {
        &self.columns
    }

    pub fn items(&self) -> &[InvoiceLineItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn subtotal(&self) -> f64 {
        model::subtotal(&self.items, &self.columns)
    }

    pub fn add_row(&mut self) {
        let mut items = self.items.clone();
        items.push(InvoiceLineItem::for_columns(&self.columns));
        self.replace(items);
    }

    /// Inserts a copy of row `index` directly after it.
    pub fn duplicate_row(&mut self, index: usize) -> Result<(), EditorError> {
        let copy = self.row(index)?.clone();
        let mut items = self.items.clone();
        items.insert(index + 1, copy);
        self.replace(items);
        Ok(())
    }

    /// Removes row `index`. Deleting the last row leaves an empty table.
    pub fn delete_row(&mut self, index: usize) -> Result<InvoiceLineItem, EditorError> {
        let removed = self.row(index)?.clone();
        let items = self
            .items
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, item)| item.clone())
            .collect();
        self.replace(items);
        Ok(removed)
    }

    pub fn update_field(&mut self, index: usize, edit: LineEdit) -> Result<(), EditorError> {
        let row = self.row(index)?;
        let column = edit.column();
        if !self.columns.contains(column) {
            return Err(EditorError::ColumnDisabled(column));
        }
        match edit {
            LineEdit::Quantity(q) if q < 1 => return Err(EditorError::InvalidQuantity),
            LineEdit::PricePerItem(p) if !p.is_finite() || p < 0.0 => {
                return Err(EditorError::InvalidPrice(p));
            }
            _ => {}
        }
        let updated = row.with_edit(edit);
        let items = self
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| if i == index { updated.clone() } else { item.clone() })
            .collect();
        self.replace(items);
        Ok(())
    }

    /// Hands the rows out for storage; the editor is not reset.
    pub fn snapshot(&self) -> (Vec<InvoiceLineItem>, f64) {
        (self.items.clone(), self.subtotal())
    }

    fn row(&self, index: usize) -> Result<&InvoiceLineItem, EditorError> {
        self.items.get(index).ok_or(EditorError::RowOutOfRange {
            index,
            len: self.items.len(),
        })
    }

    fn replace(&mut self, items: Vec<InvoiceLineItem>) {
        self.items = items;
        debug!(rows = self.items.len(), subtotal = self.subtotal(), "line items changed");
    }
}
