//! Step-by-step invoice builder.
//!
//! Four collectors (company, bill-to, columns, line items) feed a
//! [`wizard::Wizard`], which renders a [`render::Document`] and hands it to a
//! [`wizard::DocumentSink`] for saving or previewing as PDF.

pub mod columns;
pub mod config;
pub mod editor;
pub mod error;
pub mod forms;
pub mod logo;
pub mod model;
pub mod prompt;
pub mod render;
pub mod stepper;
pub mod typst;
pub mod wizard;

pub use columns::{Column, ColumnSelection, ColumnSelector};
pub use config::Settings;
pub use editor::LineItemEditor;
pub use error::{FieldErrors, PublishError, WizardError};
pub use model::{BillToDetails, CompanyDetails, InvoiceLineItem, LineEdit, Totals};
pub use render::{Document, render};
pub use typst::Publisher;
pub use wizard::{DocumentSink, Slice, Step, Wizard, WizardState};
