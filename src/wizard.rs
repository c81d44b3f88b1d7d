use std::fmt;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::columns::{ColumnSelection, ColumnSelector};
use crate::editor::LineItemEditor;
use crate::error::{PublishError, WizardError};
use crate::forms::{BillToForm, CompanyForm};
use crate::model::{BillToDetails, CompanyDetails, InvoiceLineItem};
use crate::render::{self, Document};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Step {
    #[default]
    CompanyDetails,
    BillTo,
    Columns,
    LineItems,
}

impl Step {
    pub const ALL: [Step; 4] = [Step::CompanyDetails, Step::BillTo, Step::Columns, Step::LineItems];
    pub const LAST: Step = Step::LineItems;

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Step> {
        Self::ALL.get(index).copied()
    }

    pub fn title(self) -> &'static str {
        match self {
            Step::CompanyDetails => "Company Details",
            Step::BillTo => "Bill To",
            Step::Columns => "Column Selector",
            Step::LineItems => "Invoice Items",
        }
    }

    /// Following step, staying put on the last one.
    pub fn next(self) -> Step {
        Self::from_index(self.index() + 1).unwrap_or(Self::LAST)
    }

    /// Preceding step, staying put on the first one.
    pub fn prev(self) -> Step {
        self.index()
            .checked_sub(1)
            .and_then(Self::from_index)
            .unwrap_or(Step::CompanyDetails)
    }

    pub fn is_last(self) -> bool {
        self == Self::LAST
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// A complete replacement value for one part of the wizard state.
#[derive(Debug, Clone, PartialEq)]
pub enum Slice {
    Company(CompanyDetails),
    BillTo(BillToDetails),
    Columns(ColumnSelection),
    Items(Vec<InvoiceLineItem>),
}

impl Slice {
    /// The step that collects this slice.
    pub fn step(&self) -> Step {
        match self {
            Slice::Company(_) => Step::CompanyDetails,
            Slice::BillTo(_) => Step::BillTo,
            Slice::Columns(_) => Step::Columns,
            Slice::Items(_) => Step::LineItems,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct WizardState {
    pub step: Step,
    pub company: Option<CompanyDetails>,
    pub bill_to: Option<BillToDetails>,
    pub columns: ColumnSelection,
    pub items: Vec<InvoiceLineItem>,
}

/// Where rendered documents go.
pub trait DocumentSink {
    /// Handle that keeps a preview alive; dropping it releases the preview.
    type Preview;

    fn save(&self, document: &Document) -> Result<PathBuf, PublishError>;
    fn preview(&self, document: &Document) -> Result<Self::Preview, PublishError>;
}

/// Owns the step index and every slice. Collectors get snapshots through
/// the `*_form` accessors and give back whole slices through [`advance`].
///
/// [`advance`]: Wizard::advance
pub struct Wizard<S: DocumentSink> {
    state: WizardState,
    sink: S,
    preview: Option<S::Preview>,
}

impl<S: DocumentSink> Wizard<S> {
    pub fn new(sink: S) -> Self {
        Self {
            state: WizardState::default(),
            sink,
            preview: None,
        }
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn step(&self) -> Step {
        self.state.step
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Replaces the current step's slice and moves one step forward.
    /// Validation is the collector's job and has already happened; a slice
    /// belonging to another step is rejected and nothing changes.
    pub fn advance(&mut self, slice: Slice) -> Result<(), WizardError> {
        let from = self.state.step;
        if slice.step() != from {
            return Err(WizardError::WrongStep {
                step: from,
                slice: slice.step(),
            });
        }
        self.replace(slice);
        self.state.step = from.next();
        info!(from = %from, to = %self.state.step, "advanced");
        Ok(())
    }

    /// Moves one step back; no slice is discarded.
    pub fn retreat(&mut self) {
        let from = self.state.step;
        self.state.step = from.prev();
        info!(from = %from, to = %self.state.step, "went back");
    }

    /// Stores the editor rows without moving, e.g. before going back.
    pub fn keep_items(&mut self, items: Vec<InvoiceLineItem>) {
        self.replace(Slice::Items(items));
    }

    pub fn company_form(&self) -> CompanyForm {
        self.state
            .company
            .as_ref()
            .map(CompanyForm::from_details)
            .unwrap_or_default()
    }

    pub fn bill_to_form(&self) -> BillToForm {
        self.state
            .bill_to
            .as_ref()
            .map(BillToForm::from_details)
            .unwrap_or_default()
    }

    pub fn column_selector(&self) -> ColumnSelector {
        ColumnSelector::from_selection(&self.state.columns)
    }

    /// Editor seeded from stored rows, or a single blank row.
    pub fn editor(&self) -> LineItemEditor {
        LineItemEditor::with_items(self.state.columns.clone(), &self.state.items)
    }

    /// Renders and saves the invoice. Only allowed on the last step; the
    /// step does not change. `Ok(None)` means the renderer declined.
    pub fn submit(
        &mut self,
        items: Vec<InvoiceLineItem>,
        subtotal: f64,
    ) -> Result<Option<PathBuf>, WizardError> {
        self.ensure_last_step()?;
        self.keep_items(items);
        let Some(document) = self.render(subtotal) else {
            return Ok(None);
        };
        let path = self.sink.save(&document)?;
        info!(path = %path.display(), "invoice saved");
        Ok(Some(path))
    }

    /// Renders and opens a transient preview, releasing any earlier one.
    pub fn preview(
        &mut self,
        items: Vec<InvoiceLineItem>,
        subtotal: f64,
    ) -> Result<Option<&S::Preview>, WizardError> {
        self.ensure_last_step()?;
        self.keep_items(items);
        self.dismiss_preview();
        let Some(document) = self.render(subtotal) else {
            return Ok(None);
        };
        let preview = self.sink.preview(&document)?;
        info!("preview opened");
        let preview: &S::Preview = self.preview.insert(preview);
        Ok(Some(preview))
    }

    pub fn active_preview(&self) -> Option<&S::Preview> {
        self.preview.as_ref()
    }

    /// Drops the active preview. Returns whether there was one.
    pub fn dismiss_preview(&mut self) -> bool {
        let had = self.preview.take().is_some();
        if had {
            debug!("preview released");
        }
        had
    }

    fn ensure_last_step(&self) -> Result<(), WizardError> {
        if self.state.step.is_last() {
            Ok(())
        } else {
            Err(WizardError::NotOnLastStep(self.state.step))
        }
    }

    fn render(&self, subtotal: f64) -> Option<Document> {
        render::render(
            self.state.company.as_ref(),
            self.state.bill_to.as_ref(),
            &self.state.columns,
            Some(self.state.items.as_slice()),
            subtotal,
            self.state.columns.tax_rate_percent(),
        )
    }

    fn replace(&mut self, slice: Slice) {
        match slice {
            Slice::Company(c) => {
                debug!(company = %c.company_name, "company slice replaced");
                self.state.company = Some(c);
            }
            Slice::BillTo(b) => {
                debug!(client = %b.client_company_name, "bill-to slice replaced");
                self.state.bill_to = Some(b);
            }
            Slice::Columns(c) => {
                debug!(columns = ?c.iter().collect::<Vec<_>>(), "column slice replaced");
                self.state.columns = c;
            }
            Slice::Items(items) => {
                debug!(rows = items.len(), "item slice replaced");
                self.state.items = items;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Recorder {
        saved: RefCell<Vec<Document>>,
        live_previews: Rc<RefCell<usize>>,
    }

    struct PreviewGuard(Rc<RefCell<usize>>);

    impl Drop for PreviewGuard {
        fn drop(&mut self) {
            *self.0.borrow_mut() -= 1;
        }
    }

    impl DocumentSink for Recorder {
        type Preview = PreviewGuard;

        fn save(&self, document: &Document) -> Result<PathBuf, PublishError> {
            self.saved.borrow_mut().push(document.clone());
            Ok(PathBuf::from("invoice_2026-10-18.pdf"))
        }

        fn preview(&self, _document: &Document) -> Result<PreviewGuard, PublishError> {
            *self.live_previews.borrow_mut() += 1;
            Ok(PreviewGuard(self.live_previews.clone()))
        }
    }

    fn company() -> CompanyDetails {
        CompanyForm {
            company_name: "Acme Co".into(),
            company_address: "1 Road".into(),
            city: "Springfield".into(),
            state: "IL".into(),
            zip: "62701".into(),
            phone: "555-0100".into(),
            email: "billing@acme.test".into(),
            invoice_number: "INV-001".into(),
            ..Default::default()
        }
        .submit(chrono::NaiveDate::from_ymd_opt(2026, 10, 18).unwrap())
        .unwrap()
    }

    fn bill_to() -> BillToDetails {
        BillToForm {
            client_company_name: "Beta LLC".into(),
            client_company_address: "9 Ave".into(),
            city: "Shelbyville".into(),
            state: "IL".into(),
            zip: "62565".into(),
            phone: "555-0199".into(),
            email: "ap@beta.test".into(),
        }
        .submit()
        .unwrap()
    }

    #[test]
    fn step_navigation_is_clamped() {
        assert_eq!(Step::CompanyDetails.prev(), Step::CompanyDetails);
        assert_eq!(Step::LineItems.next(), Step::LineItems);
        assert_eq!(Step::BillTo.next(), Step::Columns);
        assert_eq!(Step::from_index(3), Some(Step::LineItems));
        assert_eq!(Step::from_index(4), None);
    }

    #[test]
    fn retreat_at_first_step_stays_put() {
        let mut w = Wizard::new(Recorder::default());
        w.retreat();
        assert_eq!(w.step(), Step::CompanyDetails);
    }

    #[test]
    fn slices_for_another_step_are_rejected() {
        let mut w = Wizard::new(Recorder::default());
        let err = w.advance(Slice::Columns(ColumnSelection::default())).unwrap_err();
        assert!(matches!(
            err,
            WizardError::WrongStep { step: Step::CompanyDetails, slice: Step::Columns }
        ));
        assert_eq!(w.step(), Step::CompanyDetails);
        assert_eq!(w.state(), &WizardState::default());
    }

    #[test]
    fn advance_walks_every_step_and_stays_on_the_last() {
        let mut w = Wizard::new(Recorder::default());
        w.advance(Slice::Company(company())).unwrap();
        w.advance(Slice::BillTo(bill_to())).unwrap();
        w.advance(Slice::Columns(ColumnSelection::default())).unwrap();
        assert_eq!(w.step(), Step::LineItems);

        w.advance(Slice::Items(vec![])).unwrap();
        assert_eq!(w.step(), Step::LineItems);
    }

    #[test]
    fn submit_is_rejected_before_last_step() {
        let mut w = Wizard::new(Recorder::default());
        let err = w.submit(vec![], 0.0).unwrap_err();
        assert!(matches!(err, WizardError::NotOnLastStep(Step::CompanyDetails)));
        assert!(w.sink().saved.borrow().is_empty());
    }

    #[test]
    fn submit_without_upstream_slices_renders_nothing() {
        let mut w = Wizard::new(Recorder::default());
        w.state.step = Step::LineItems;
        assert_eq!(w.submit(vec![], 0.0).unwrap(), None);
        assert!(w.sink().saved.borrow().is_empty());
        assert_eq!(w.step(), Step::LineItems);
    }

    #[test]
    fn previews_are_released_when_superseded_or_dismissed() {
        let mut w = Wizard::new(Recorder::default());
        w.state.step = Step::LineItems;
        w.state.company = Some(company());
        w.state.bill_to = Some(bill_to());
        let live = w.sink().live_previews.clone();

        assert!(w.preview(vec![], 0.0).unwrap().is_some());
        assert!(w.preview(vec![], 0.0).unwrap().is_some());
        assert_eq!(*live.borrow(), 1);

        assert!(w.dismiss_preview());
        assert_eq!(*live.borrow(), 0);
        assert!(!w.dismiss_preview());
        assert_eq!(w.step(), Step::LineItems);
    }

    #[test]
    fn editor_is_seeded_from_stored_items() {
        let mut w = Wizard::new(Recorder::default());
        assert_eq!(w.editor().len(), 1);

        let mut ed = w.editor();
        ed.add_row();
        ed.add_row();
        w.keep_items(ed.items().to_vec());
        assert_eq!(w.editor().len(), 3);
    }
}
