//! PDF output through Typst.
//!
//! A [`Document`] is rendered into Typst source with a Tera template, written
//! to a scratch directory together with the decoded logo, and compiled by the
//! `typst` CLI. Saved PDFs are copied out of the scratch directory; previews
//! keep theirs alive until the [`Preview`] is dropped.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{Local, NaiveDate};
use tempfile::TempDir;
use tera::{Context, Tera, Value};
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::PublishError;
use crate::render::Document;
use crate::wizard::DocumentSink;

// Embed template at compile time so a fresh install works without setup
pub const DEFAULT_TEMPLATE: &str = include_str!("../templates/invoice.typ.tera");
const TEMPLATE_NAME: &str = "invoice.typ";

pub struct Publisher {
    tera: Tera,
    typst_bin: String,
    output_dir: PathBuf,
    open_after_save: bool,
}

impl Publisher {
    pub fn new(settings: &Settings) -> Result<Self, PublishError> {
        let mut tera = Tera::default();
        match settings.template_path() {
            Some(path) => {
                info!(path = %path.display(), "using custom invoice template");
                tera.add_template_file(&path, Some(TEMPLATE_NAME))?;
            }
            None => tera.add_raw_template(TEMPLATE_NAME, DEFAULT_TEMPLATE)?,
        }
        tera.register_filter("typst_str", typst_str);

        Ok(Self {
            tera,
            typst_bin: settings.typst_bin.clone(),
            output_dir: settings.output_dir(),
            open_after_save: settings.open_after_save,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Typst source for `document`. `logo_file` is the image path relative
    /// to the source file, if a logo was written next to it.
    pub fn render_source(
        &self,
        document: &Document,
        logo_file: Option<&str>,
    ) -> Result<String, PublishError> {
        let mut context = Context::new();
        context.insert("doc", document);
        context.insert("logo_file", &logo_file);
        Ok(self.tera.render(TEMPLATE_NAME, &context)?)
    }

    /// Writes source (and logo) into `dir` and compiles `invoice.pdf` there.
    fn compile_in(&self, document: &Document, dir: &Path) -> Result<PathBuf, PublishError> {
        let logo_file = match &document.logo {
            Some(image) => {
                let name = format!("logo.{}", image.extension());
                fs::write(dir.join(&name), image.decode()?)
                    .map_err(PublishError::io("writing logo image"))?;
                Some(name)
            }
            None => None,
        };

        let source = self.render_source(document, logo_file.as_deref())?;
        let typ_path = dir.join("invoice.typ");
        let pdf_path = dir.join("invoice.pdf");
        fs::write(&typ_path, source).map_err(PublishError::io("writing .typ file"))?;

        debug!(bin = %self.typst_bin, path = %typ_path.display(), "compiling PDF");
        let output = Command::new(&self.typst_bin)
            .arg("compile")
            .arg(&typ_path)
            .arg(&pdf_path)
            .output()
            .map_err(|_| PublishError::TypstMissing(self.typst_bin.clone()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(status = ?output.status.code(), "typst compilation failed");
            return Err(PublishError::Compile(stderr));
        }
        Ok(pdf_path)
    }
}

impl DocumentSink for Publisher {
    type Preview = Preview;

    fn save(&self, document: &Document) -> Result<PathBuf, PublishError> {
        let scratch = tempfile::tempdir().map_err(PublishError::io("creating scratch directory"))?;
        let pdf = self.compile_in(document, scratch.path())?;

        fs::create_dir_all(&self.output_dir).map_err(PublishError::io(format!(
            "creating output directory {}",
            self.output_dir.display()
        )))?;
        let target = next_output_path(&self.output_dir, Local::now().date_naive());
        fs::copy(&pdf, &target).map_err(PublishError::io(format!(
            "saving {}",
            target.display()
        )))?;

        if self.open_after_save {
            open_and_reveal(&target);
        }
        Ok(target)
    }

    fn preview(&self, document: &Document) -> Result<Preview, PublishError> {
        let dir = tempfile::Builder::new()
            .prefix("invoice-preview-")
            .tempdir()
            .map_err(PublishError::io("creating preview directory"))?;
        let pdf = self.compile_in(document, dir.path())?;
        open_path(&pdf);
        Ok(Preview { pdf, _dir: dir })
    }
}

/// A compiled preview. The PDF and its directory are removed when this is
/// dropped.
#[derive(Debug)]
pub struct Preview {
    pdf: PathBuf,
    _dir: TempDir,
}

impl Preview {
    pub fn path(&self) -> &Path {
        &self.pdf
    }
}

/// `invoice_<date>.pdf`, or `invoice_<date>-NN.pdf` when that name is taken.
pub fn next_output_path(dir: &Path, date: NaiveDate) -> PathBuf {
    let stem = format!("invoice_{}", date.format("%Y-%m-%d"));
    let first = dir.join(format!("{stem}.pdf"));
    if !first.exists() {
        return first;
    }
    (2u32..)
        .map(|idx| dir.join(format!("{stem}-{idx:02}.pdf")))
        .find(|p| !p.exists())
        .unwrap_or(first)
}

/// Tera filter: quoted, escaped Typst string literal. `null` becomes `""`.
fn typst_str(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('"');
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => {}
            c => out.push(c),
        }
    }
    out.push('"');
    Ok(Value::String(out))
}

// Helper: Open file and reveal in Finder/Explorer
fn open_and_reveal(path: &Path) {
    #[cfg(target_os = "macos")]
    Command::new("open").arg("-R").arg(path).spawn().ok();

    #[cfg(target_os = "windows")]
    Command::new("explorer")
        .arg(format!("/select,{}", path.to_string_lossy()))
        .spawn()
        .ok();

    #[cfg(target_os = "linux")]
    let parent = path.parent().unwrap_or(path);
    #[cfg(target_os = "linux")]
    Command::new("xdg-open").arg(parent).spawn().ok();
}

fn open_path(path: &Path) {
    #[cfg(target_os = "macos")]
    Command::new("open").arg(path).spawn().ok();

    #[cfg(target_os = "windows")]
    Command::new("explorer").arg(path).spawn().ok();

    #[cfg(target_os = "linux")]
    Command::new("xdg-open").arg(path).spawn().ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::{Column, ColumnSelection};
    use crate::logo::InlineImage;
    use crate::model::{Address, BillToDetails, CompanyDetails, InvoiceLineItem};
    use crate::render::render;
    use tempfile::tempdir;

    fn publisher() -> Publisher {
        Publisher::new(&Settings {
            output_dir: "/tmp/unused".into(),
            open_after_save: false,
            ..Settings::default()
        })
        .unwrap()
    }

    fn document(terms: &str, logo: Option<InlineImage>) -> Document {
        let company = CompanyDetails {
            logo,
            company_name: "Acme \"Quotes\" Co".into(),
            address: Address {
                street: "1 Road".into(),
                city: "Springfield".into(),
                state: "IL".into(),
                zip: "62701".into(),
            },
            phone: "555-0100".into(),
            email: "billing@acme.test".into(),
            invoice_number: "INV-001".into(),
            terms: terms.into(),
            invoice_date: NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
        };
        let bill_to = BillToDetails {
            client_company_name: "Beta LLC".into(),
            address: Address::default(),
            phone: String::new(),
            email: String::new(),
        };
        let columns = ColumnSelection::new(
            [Column::SrNo, Column::Description, Column::Quantity, Column::PricePerItem, Column::Tax],
            Some(10.0),
        );
        let items = [InvoiceLineItem {
            description: Some("Widget #1 \\ back".into()),
            quantity: Some(3),
            price_per_item: Some(20.0),
            ..Default::default()
        }];
        render(Some(&company), Some(&bill_to), &columns, Some(&items[..]), 60.0, 10.0).unwrap()
    }

    fn filter(input: Value) -> String {
        match typst_str(&input, &HashMap::new()).unwrap() {
            Value::String(s) => s,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn filter_quotes_and_escapes() {
        assert_eq!(filter(Value::String("a\"b\\c\nd".into())), r#""a\"b\\c\nd""#);
        assert_eq!(filter(Value::Null), r#""""#);
        assert_eq!(filter(Value::from(3)), r#""3""#);
    }

    #[test]
    fn source_contains_escaped_values_and_totals() {
        let src = publisher().render_source(&document("", None), None).unwrap();
        assert!(src.contains(r#""ACME \"QUOTES\" CO""#), "{src}");
        assert!(src.contains(r#""Widget #1 \\ back""#));
        assert!(src.contains(r#""Tax (10.00%)""#));
        assert!(src.contains(r#""66.00""#));
        assert!(src.contains(r#""Total Price""#));
        assert!(!src.contains("Terms & Conditions"));
        assert!(!src.contains("image("));
    }

    #[test]
    fn only_inner_columns_get_dividers() {
        let src = publisher().render_source(&document("", None), None).unwrap();
        assert_eq!(src.matches("table.vline(").count(), 4);
        assert!(src.contains("table.vline(x: 4"));
        assert!(!src.contains("table.vline(x: 5"));
    }

    #[test]
    fn terms_and_logo_are_rendered_when_present() {
        let logo = InlineImage::from_bytes("image/jpeg", b"jpg");
        let src = publisher()
            .render_source(&document("Net 30\nNo returns", Some(logo)), Some("logo.jpg"))
            .unwrap();
        assert!(src.contains("Terms & Conditions"));
        assert!(src.contains(r#"#"Net 30" \"#));
        assert!(src.contains(r#"#"No returns" \"#));
        assert!(src.contains(r#"image("logo.jpg""#));
    }

    #[test]
    fn custom_template_replaces_builtin() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mine.typ.tera");
        fs::write(&path, "= {{ doc.title }} {{ doc.invoice_number | typst_str }}").unwrap();
        let p = Publisher::new(&Settings {
            template: Some(path.to_string_lossy().into_owned()),
            ..Settings::default()
        })
        .unwrap();
        let src = p.render_source(&document("", None), None).unwrap();
        assert_eq!(src, r#"= INVOICE "INV-001""#);
    }

    #[test]
    fn output_names_do_not_clobber_earlier_invoices() {
        let dir = tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let first = next_output_path(dir.path(), date);
        assert_eq!(first.file_name().unwrap(), "invoice_2026-10-18.pdf");

        fs::write(&first, b"%PDF").unwrap();
        let second = next_output_path(dir.path(), date);
        assert_eq!(second.file_name().unwrap(), "invoice_2026-10-18-02.pdf");
    }

    /// Fake `typst` that copies the source to the PDF path and logs the
    /// directory it compiled in.
    #[cfg(unix)]
    fn stub_typst(dir: &Path) -> (PathBuf, PathBuf) {
        use std::os::unix::fs::PermissionsExt;

        let log = dir.join("compiled_in.log");
        let script = dir.join("typst-stub.sh");
        fs::write(
            &script,
            format!(
                "#!/bin/sh\ncp \"$2\" \"$3\"\ndirname \"$2\" >> \"{}\"\n",
                log.display()
            ),
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        (script, log)
    }

    #[cfg(unix)]
    fn stub_publisher(root: &Path) -> (Publisher, PathBuf) {
        let (script, log) = stub_typst(root);
        let p = Publisher::new(&Settings {
            output_dir: root.join("out/nested").to_string_lossy().into_owned(),
            typst_bin: script.to_string_lossy().into_owned(),
            open_after_save: false,
            template: None,
        })
        .unwrap();
        (p, log)
    }

    #[cfg(unix)]
    #[test]
    fn save_creates_output_dir_and_never_overwrites() {
        let root = tempdir().unwrap();
        let (p, log) = stub_publisher(root.path());
        let doc = document("", None);

        let first = p.save(&doc).unwrap();
        let second = p.save(&doc).unwrap();

        let today = Local::now().date_naive().format("%Y-%m-%d").to_string();
        assert_eq!(first.parent().unwrap(), root.path().join("out/nested"));
        assert_eq!(first.file_name().unwrap().to_string_lossy(), format!("invoice_{today}.pdf"));
        assert_eq!(
            second.file_name().unwrap().to_string_lossy(),
            format!("invoice_{today}-02.pdf")
        );

        let saved = fs::read_to_string(&first).unwrap();
        assert_eq!(saved, p.render_source(&doc, None).unwrap());

        // scratch directories are gone once the PDF is copied out
        let scratch = fs::read_to_string(log).unwrap();
        let dirs: Vec<&str> = scratch.lines().collect();
        assert_eq!(dirs.len(), 2);
        for dir in dirs {
            assert!(!Path::new(dir).exists(), "{dir} was left behind");
        }
    }

    #[cfg(unix)]
    #[test]
    fn preview_writes_logo_and_is_removed_on_drop() {
        let root = tempdir().unwrap();
        let (p, _log) = stub_publisher(root.path());
        let logo = InlineImage::from_bytes("image/png", b"\x89PNG");

        let preview = p.preview(&document("", Some(logo))).unwrap();
        let dir = preview.path().parent().unwrap().to_path_buf();
        assert_eq!(fs::read(dir.join("logo.png")).unwrap(), b"\x89PNG");
        let source = fs::read_to_string(preview.path()).unwrap();
        assert!(source.contains(r#"image("logo.png""#), "{source}");

        drop(preview);
        assert!(!dir.exists());
        assert!(!root.path().join("out").exists(), "previews never touch the output dir");
    }

    #[test]
    fn missing_typst_binary_is_reported() {
        let p = Publisher::new(&Settings {
            typst_bin: "definitely-not-a-typst-binary".into(),
            open_after_save: false,
            ..Settings::default()
        })
        .unwrap();
        let err = p.preview(&document("", None)).unwrap_err();
        assert!(matches!(err, PublishError::TypstMissing(bin) if bin == "definitely-not-a-typst-binary"));
    }
}
