//! Terminal front end: one `inquire` prompt sequence per wizard step.
//!
//! Esc on a prompt goes back one step, Ctrl-C aborts the whole run.

use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use comfy_table::{Attribute, Cell, CellAlignment, Table};
use inquire::validator::Validation;
use inquire::{
    Confirm, CustomType, CustomUserError, DateSelect, InquireError, MultiSelect, Select, Text,
};
use tracing::{debug, warn};

use crate::columns::{Column, ColumnSelection, ColumnSelector, parse_tax_rate};
use crate::config::Settings;
use crate::editor::LineItemEditor;
use crate::error::FieldErrors;
use crate::forms::{BillToForm, CompanyForm, LogoInput, is_valid_email};
use crate::logo::ACCEPTED_EXTENSIONS;
use crate::model::{BillToDetails, CompanyDetails, LineEdit, Totals};
use crate::render::{TOTAL_PRICE_HEADER, cell};
use crate::stepper::StepIndicator;
use crate::typst::Publisher;
use crate::wizard::{Slice, Step, Wizard};

/// Result of one step's prompt sequence.
enum Flow<T> {
    Done(T),
    Back,
}

/// Runs the wizard until an invoice is saved. Returns the saved path, or
/// `None` when the user backed out of the first step.
pub fn run(wizard: &mut Wizard<Publisher>) -> Result<Option<PathBuf>> {
    loop {
        println!("\n{}\n", StepIndicator::new(&Step::ALL, wizard.step()));
        match wizard.step() {
            Step::CompanyDetails => match company_step(wizard.company_form())? {
                Flow::Done(details) => wizard.advance(Slice::Company(details))?,
                Flow::Back => {
                    if confirm_quit()? {
                        return Ok(None);
                    }
                }
            },
            Step::BillTo => match bill_to_step(wizard.bill_to_form())? {
                Flow::Done(details) => wizard.advance(Slice::BillTo(details))?,
                Flow::Back => wizard.retreat(),
            },
            Step::Columns => match columns_step(wizard.column_selector())? {
                Flow::Done(selection) => wizard.advance(Slice::Columns(selection))?,
                Flow::Back => wizard.retreat(),
            },
            Step::LineItems => match items_step(wizard)? {
                Flow::Done(path) => return Ok(Some(path)),
                Flow::Back => wizard.retreat(),
            },
        }
    }
}

// ==========================================
// Prompt helpers
// ==========================================

/// `Ok(None)` on Esc; Ctrl-C and I/O failures propagate.
fn answer<T>(result: Result<T, InquireError>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(InquireError::OperationCanceled) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn confirm_quit() -> Result<bool> {
    Ok(answer(Confirm::new("Quit without creating an invoice?").with_default(false).prompt())?
        .unwrap_or(false))
}

fn required_validator(
    label: &'static str,
) -> impl Fn(&str) -> Result<Validation, CustomUserError> + Clone {
    move |input: &str| {
        Ok(if input.trim().is_empty() {
            Validation::Invalid(format!("{label} is required").into())
        } else {
            Validation::Valid
        })
    }
}

fn email_validator(input: &str) -> Result<Validation, CustomUserError> {
    Ok(if is_valid_email(input) {
        Validation::Valid
    } else {
        Validation::Invalid("Invalid email".into())
    })
}

/// Required text field pre-filled with the current value.
fn field(label: &'static str, current: &str) -> Result<Option<String>> {
    answer(
        Text::new(&format!("{label}:"))
            .with_initial_value(current)
            .with_validator(required_validator(label))
            .prompt(),
    )
}

fn email_field(current: &str) -> Result<Option<String>> {
    answer(
        Text::new("Email:")
            .with_initial_value(current)
            .with_validator(required_validator("Email"))
            .with_validator(email_validator)
            .prompt(),
    )
}

struct AddressFields<'a> {
    street: &'a mut String,
    city: &'a mut String,
    state: &'a mut String,
    zip: &'a mut String,
}

/// Street, ZIP, then city/state with ZIP lookup suggestions.
fn address(street_label: &'static str, fields: AddressFields<'_>) -> Result<Option<()>> {
    let Some(street) = field(street_label, fields.street)? else { return Ok(None) };
    *fields.street = street;

    let Some(zip) = field("ZIP", fields.zip)? else { return Ok(None) };
    *fields.zip = zip;

    if fields.city.trim().is_empty() || fields.state.trim().is_empty() {
        if let Ok(results) = zipcodes::matching(fields.zip.trim(), None) {
            if let Some(info) = results.first() {
                println!("🚀 Found: {}, {}", info.city, info.state);
                if fields.city.trim().is_empty() {
                    *fields.city = info.city.to_string();
                }
                if fields.state.trim().is_empty() {
                    *fields.state = info.state.to_string();
                }
            }
        }
    }

    let Some(city) = field("City", fields.city)? else { return Ok(None) };
    *fields.city = city;
    let Some(state) = field("State", fields.state)? else { return Ok(None) };
    *fields.state = state;
    Ok(Some(()))
}

fn report(errors: &FieldErrors) {
    println!("❌ Please fix the following:");
    for (field, message) in errors.iter() {
        println!("   {field}: {message}");
    }
}

// ==========================================
// 1. Company Details
// ==========================================

fn company_step(mut form: CompanyForm) -> Result<Flow<CompanyDetails>> {
    loop {
        if fill_company(&mut form)?.is_none() {
            return Ok(Flow::Back);
        }
        println!("⏳ Preparing company details...");
        match form.submit(Local::now().date_naive()) {
            Ok(details) => return Ok(Flow::Done(details)),
            Err(errors) => {
                report(&errors);
                // a failed conversion must not be retried silently
                if errors.get("logo").is_some() {
                    form.logo = LogoInput::None;
                }
            }
        }
    }
}

fn fill_company(form: &mut CompanyForm) -> Result<Option<()>> {
    println!("--- Company Details ---");
    let Some(logo) = pick_logo(&form.logo)? else { return Ok(None) };
    form.logo = logo;

    let Some(name) = field("Company Name", &form.company_name)? else { return Ok(None) };
    form.company_name = name;

    let fields = AddressFields {
        street: &mut form.company_address,
        city: &mut form.city,
        state: &mut form.state,
        zip: &mut form.zip,
    };
    if address("Company Address", fields)?.is_none() {
        return Ok(None);
    }

    let Some(phone) = field("Phone Number", &form.phone)? else { return Ok(None) };
    form.phone = phone;
    let Some(email) = email_field(&form.email)? else { return Ok(None) };
    form.email = email;
    let Some(number) = field("Invoice Number", &form.invoice_number)? else { return Ok(None) };
    form.invoice_number = number;

    let default_date = form.invoice_date.unwrap_or_else(|| Local::now().date_naive());
    let Some(date) = answer(DateSelect::new("Invoice Date:").with_default(default_date).prompt())?
    else {
        return Ok(None);
    };
    form.invoice_date = Some(date);

    // terms are entered on one line; '\n' marks a line break
    let current_terms = form.terms.replace('\n', "\\n");
    let Some(terms) = answer(
        Text::new("Terms & Conditions (optional):")
            .with_initial_value(&current_terms)
            .with_help_message("Use '\\n' for new lines")
            .prompt(),
    )?
    else {
        return Ok(None);
    };
    form.terms = terms.replace("\\n", "\n");
    Ok(Some(()))
}

#[derive(Clone, Copy)]
enum LogoChoice {
    Keep,
    Pick,
    Remove,
    Skip,
}

impl fmt::Display for LogoChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogoChoice::Keep => "Keep current logo",
            LogoChoice::Pick => "Choose logo file...",
            LogoChoice::Remove => "Remove logo",
            LogoChoice::Skip => "No logo",
        })
    }
}

fn pick_logo(current: &LogoInput) -> Result<Option<LogoInput>> {
    let options = match current {
        LogoInput::None => vec![LogoChoice::Skip, LogoChoice::Pick],
        _ => vec![LogoChoice::Keep, LogoChoice::Pick, LogoChoice::Remove],
    };
    let Some(choice) = answer(Select::new("Company Logo:", options).prompt())? else {
        return Ok(None);
    };
    Ok(Some(match choice {
        LogoChoice::Keep => current.clone(),
        LogoChoice::Remove | LogoChoice::Skip => LogoInput::None,
        LogoChoice::Pick => {
            println!("📂 Opening file picker...");
            let picked = rfd::FileDialog::new()
                .set_title("Select Company Logo")
                .add_filter("Images", &ACCEPTED_EXTENSIONS)
                .pick_file();
            match picked {
                Some(path) => LogoInput::File(path),
                None => {
                    println!("❌ No file selected. Falling back to manual input.");
                    let Some(path) = answer(
                        Text::new("Logo path (leave empty to skip):").prompt(),
                    )?
                    else {
                        return Ok(None);
                    };
                    let path = path.trim();
                    if path.is_empty() {
                        LogoInput::None
                    } else {
                        LogoInput::File(PathBuf::from(crate::config::expand_home_dir(path)))
                    }
                }
            }
        }
    }))
}

// ==========================================
// 2. Bill To
// ==========================================

fn bill_to_step(mut form: BillToForm) -> Result<Flow<BillToDetails>> {
    loop {
        println!("--- Bill To ---");
        if fill_bill_to(&mut form)?.is_none() {
            return Ok(Flow::Back);
        }
        match form.submit() {
            Ok(details) => return Ok(Flow::Done(details)),
            Err(errors) => report(&errors),
        }
    }
}

fn fill_bill_to(form: &mut BillToForm) -> Result<Option<()>> {
    let Some(name) = field("Client Company Name", &form.client_company_name)? else {
        return Ok(None);
    };
    form.client_company_name = name;

    let fields = AddressFields {
        street: &mut form.client_company_address,
        city: &mut form.city,
        state: &mut form.state,
        zip: &mut form.zip,
    };
    if address("Client Company Address", fields)?.is_none() {
        return Ok(None);
    }

    let Some(phone) = field("Phone Number", &form.phone)? else { return Ok(None) };
    form.phone = phone;
    let Some(email) = email_field(&form.email)? else { return Ok(None) };
    form.email = email;
    Ok(Some(()))
}

// ==========================================
// 3. Columns
// ==========================================

struct ColumnOption(Column);

impl fmt::Display for ColumnOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.label())
    }
}

fn columns_step(mut selector: ColumnSelector) -> Result<Flow<ColumnSelection>> {
    loop {
        println!("--- Select Invoice Item Columns ---");
        println!("💡 \"{TOTAL_PRICE_HEADER}\" is always included: Quantity × Price/Item");

        let defaults: Vec<usize> = Column::ALL
            .iter()
            .enumerate()
            .filter(|(_, c)| selector.is_selected(**c))
            .map(|(i, _)| i)
            .collect();
        let options = Column::ALL.into_iter().map(ColumnOption).collect();
        let Some(chosen) = answer(
            MultiSelect::new("Columns:", options)
                .with_default(&defaults)
                .prompt(),
        )?
        else {
            return Ok(Flow::Back);
        };
        for column in Column::ALL {
            selector.set(column, chosen.iter().any(|o| o.0 == column));
        }

        if selector.is_selected(Column::Tax) {
            let Some(rate) = answer(
                Text::new("Tax Percentage (%):")
                    .with_initial_value(selector.tax_rate_input())
                    .with_help_message("0-100, leave empty for 0%")
                    .with_validator(|input: &str| {
                        Ok(match parse_tax_rate(input) {
                            Ok(_) => Validation::Valid,
                            Err(message) => Validation::Invalid(message.into()),
                        })
                    })
                    .prompt(),
            )?
            else {
                return Ok(Flow::Back);
            };
            selector.set_tax_rate(rate);
        }

        match selector.submit() {
            Ok(selection) => return Ok(Flow::Done(selection)),
            Err(errors) => report(&errors),
        }
    }
}

// ==========================================
// 4. Invoice Items
// ==========================================

#[derive(Clone, Copy, PartialEq)]
enum ItemAction {
    Add,
    Edit,
    Duplicate,
    Delete,
    Preview,
    ClosePreview,
    Generate,
    Back,
}

impl fmt::Display for ItemAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ItemAction::Add => "➕ Add Item",
            ItemAction::Edit => "✏️  Edit Item",
            ItemAction::Duplicate => "📄 Duplicate Item",
            ItemAction::Delete => "🗑  Delete Item",
            ItemAction::Preview => "👀 Preview Invoice",
            ItemAction::ClosePreview => "❎ Close Preview",
            ItemAction::Generate => "✅ Generate Invoice",
            ItemAction::Back => "⬅️  Back",
        })
    }
}

fn items_step(wizard: &mut Wizard<Publisher>) -> Result<Flow<PathBuf>> {
    let mut editor = wizard.editor();
    if editor.len() == 1 && wizard.state().items.is_empty() {
        // a brand-new row goes straight to editing
        edit_row(&mut editor, 0)?;
    }

    loop {
        println!("{}", items_table(&editor));

        let mut actions = vec![ItemAction::Add];
        if !editor.is_empty() {
            actions.extend([ItemAction::Edit, ItemAction::Duplicate, ItemAction::Delete]);
        }
        actions.push(ItemAction::Preview);
        if wizard.active_preview().is_some() {
            actions.push(ItemAction::ClosePreview);
        }
        actions.extend([ItemAction::Generate, ItemAction::Back]);

        let choice = answer(Select::new("Invoice Items:", actions).prompt())?
            .unwrap_or(ItemAction::Back);

        match choice {
            ItemAction::Add => {
                editor.add_row();
                let last = editor.len() - 1;
                edit_row(&mut editor, last)?;
            }
            ItemAction::Edit => {
                if let Some(idx) = pick_row(&editor, "Edit which item?")? {
                    edit_row(&mut editor, idx)?;
                }
            }
            ItemAction::Duplicate => {
                if let Some(idx) = pick_row(&editor, "Duplicate which item?")? {
                    editor.duplicate_row(idx)?;
                }
            }
            ItemAction::Delete => {
                if let Some(idx) = pick_row(&editor, "Delete which item?")? {
                    editor.delete_row(idx)?;
                }
            }
            ItemAction::Preview => {
                let (items, subtotal) = editor.snapshot();
                println!("\n🔨 Compiling preview...");
                match wizard.preview(items, subtotal) {
                    Ok(Some(preview)) => println!(
                        "👀 Preview opened: {}\n   Choose \"Close Preview\" when done.",
                        preview.path().display()
                    ),
                    Ok(None) => println!("❌ Invoice details are incomplete, nothing to preview."),
                    Err(e) => println!("❌ {e}"),
                }
            }
            ItemAction::ClosePreview => {
                wizard.dismiss_preview();
            }
            ItemAction::Generate => {
                let (items, subtotal) = editor.snapshot();
                println!("\n🔨 Compiling PDF...");
                match wizard.submit(items, subtotal) {
                    Ok(Some(path)) => {
                        wizard.dismiss_preview();
                        println!("✅ PDF Generated: {}", path.display());
                        return Ok(Flow::Done(path));
                    }
                    Ok(None) => println!("❌ Invoice details are incomplete, nothing was saved."),
                    Err(e) => {
                        warn!(error = %e, "invoice generation failed");
                        println!("❌ {e}");
                    }
                }
            }
            ItemAction::Back => {
                wizard.keep_items(editor.items().to_vec());
                wizard.dismiss_preview();
                return Ok(Flow::Back);
            }
        }
    }
}

fn items_table(editor: &LineItemEditor) -> Table {
    let columns = editor.columns();
    let mut table = Table::new();
    let mut header: Vec<Cell> = columns.table_columns().map(|c| Cell::new(c.header())).collect();
    header.push(Cell::new(TOTAL_PRICE_HEADER));
    table.set_header(header);

    for (idx, item) in editor.items().iter().enumerate() {
        let mut row: Vec<Cell> = columns
            .table_columns()
            .map(|c| Cell::new(cell(c, idx, item)))
            .collect();
        row.push(
            Cell::new(format!("{:.2}", item.line_total(columns)))
                .set_alignment(CellAlignment::Right),
        );
        table.add_row(row);
    }

    let totals = Totals::compute(editor.items(), columns);
    let mut footer = vec![("Subtotal".to_string(), totals.subtotal)];
    if columns.has_tax() {
        footer.push((format!("Tax ({:.2}%)", totals.tax_rate_percent), totals.tax_due));
        footer.push(("Total".to_string(), totals.total));
    }

    let width = columns.table_columns().count();
    for (label, amount) in footer {
        let mut row: Vec<Cell> = vec![Cell::new(""); width.saturating_sub(1)];
        row.push(Cell::new(label).add_attribute(Attribute::Bold));
        row.push(
            Cell::new(format!("{amount:.2}"))
                .add_attribute(Attribute::Bold)
                .set_alignment(CellAlignment::Right),
        );
        table.add_row(row);
    }
    table
}

struct RowOption {
    idx: usize,
    label: String,
}

impl fmt::Display for RowOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. {}", self.idx + 1, self.label)
    }
}

fn pick_row(editor: &LineItemEditor, message: &str) -> Result<Option<usize>> {
    if editor.len() == 1 {
        return Ok(Some(0));
    }
    let options: Vec<RowOption> = editor
        .items()
        .iter()
        .enumerate()
        .map(|(idx, item)| RowOption {
            idx,
            label: format!(
                "{} ({:.2})",
                item.description.as_deref().unwrap_or("Item"),
                item.line_total(editor.columns())
            ),
        })
        .collect();
    Ok(answer(Select::new(message, options).prompt())?.map(|o| o.idx))
}

/// Prompts every enabled field of row `idx`. Esc keeps the edits made so far.
fn edit_row(editor: &mut LineItemEditor, idx: usize) -> Result<()> {
    let row = editor
        .items()
        .get(idx)
        .cloned()
        .context("selected item no longer exists")?;
    let columns = editor.columns().clone();
    debug!(row = idx, "editing line item");

    let mut edits = Vec::new();
    if let Some(current) = row.description.as_deref().filter(|_| columns.contains(Column::Description)) {
        let Some(v) = answer(
            Text::new("Description:")
                .with_initial_value(current)
                .with_validator(required_validator("Description"))
                .prompt(),
        )?
        else {
            return Ok(());
        };
        edits.push(LineEdit::Description(v));
    }
    if let Some(current) = row.quantity.filter(|_| columns.contains(Column::Quantity)) {
        let Some(v) = answer(
            CustomType::<u32>::new("Quantity:")
                .with_default(current)
                .with_error_message("Please enter a whole number")
                .with_validator(|q: &u32| {
                    Ok(if *q >= 1 {
                        Validation::Valid
                    } else {
                        Validation::Invalid("Quantity must be at least 1".into())
                    })
                })
                .prompt(),
        )?
        else {
            return apply(editor, idx, edits);
        };
        edits.push(LineEdit::Quantity(v));
    }
    if let Some(current) = row.uom.as_deref().filter(|_| columns.contains(Column::Uom)) {
        let Some(v) = answer(Text::new("UOM:").with_initial_value(current).prompt())? else {
            return apply(editor, idx, edits);
        };
        edits.push(LineEdit::Uom(v));
    }
    if let Some(current) = row.net_weight.as_deref().filter(|_| columns.contains(Column::NetWeight)) {
        let Some(v) = answer(Text::new("Net Weight:").with_initial_value(current).prompt())? else {
            return apply(editor, idx, edits);
        };
        edits.push(LineEdit::NetWeight(v));
    }
    if let Some(current) = row.price_per_item.filter(|_| columns.contains(Column::PricePerItem)) {
        let Some(v) = answer(
            CustomType::<f64>::new("Price per Item:")
                .with_default(current)
                .with_formatter(&|p: f64| format!("{p:.2}"))
                .with_error_message("Please enter a number")
                .with_validator(|p: &f64| {
                    Ok(if p.is_finite() && *p >= 0.0 {
                        Validation::Valid
                    } else {
                        Validation::Invalid("Price must be 0 or more".into())
                    })
                })
                .prompt(),
        )?
        else {
            return apply(editor, idx, edits);
        };
        edits.push(LineEdit::PricePerItem(v));
    }
    apply(editor, idx, edits)
}

fn apply(editor: &mut LineItemEditor, idx: usize, edits: Vec<LineEdit>) -> Result<()> {
    for edit in edits {
        if let Err(e) = editor.update_field(idx, edit) {
            println!("❌ {e}");
        }
    }
    Ok(())
}

// ==========================================
// Config
// ==========================================

pub fn config_wizard(current: Settings) -> Result<Settings> {
    println!("\n⚙️  --- Configuration Setup ---");

    println!("📂 Opening folder picker...");
    let picked_path = rfd::FileDialog::new()
        .set_title("Select Invoice Output Directory")
        .pick_folder();

    let output_dir = match picked_path {
        Some(path) => path.to_string_lossy().to_string(),
        None => {
            println!("❌ No folder selected. Falling back to manual input.");
            Text::new("Invoice Output Directory:")
                .with_default(&current.output_dir)
                .prompt()?
        }
    };

    let typst_bin = Text::new("Typst binary:")
        .with_default(&current.typst_bin)
        .prompt()?;
    let open_after_save = Confirm::new("Reveal saved invoices in the file manager?")
        .with_default(current.open_after_save)
        .prompt()?;
    let template = Text::new("Custom template (optional, leave empty for built-in):")
        .with_initial_value(current.template.as_deref().unwrap_or(""))
        .prompt()?;
    let template = Some(template.trim().to_string()).filter(|t| !t.is_empty());

    Ok(Settings {
        output_dir,
        typst_bin,
        open_after_save,
        template,
    })
}
