//! Company and Bill-To collectors.
//!
//! A form is a mutable draft of strings. `submit` either returns a complete,
//! trimmed value object or the full set of field errors; it never hands back
//! a partially filled value.

use std::path::PathBuf;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::FieldErrors;
use crate::logo::InlineImage;
use crate::model::{Address, BillToDetails, CompanyDetails};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\S+@\S+$").expect("email pattern compiles"));

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value.trim())
}

/// Where the logo for the next submission comes from.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LogoInput {
    #[default]
    None,
    /// Already converted on an earlier submission.
    Encoded(InlineImage),
    /// Freshly picked; converted during `submit`.
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompanyForm {
    pub logo: LogoInput,
    pub company_name: String,
    pub company_address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub phone: String,
    pub email: String,
    pub invoice_number: String,
    pub terms: String,
    pub invoice_date: Option<NaiveDate>,
}

impl CompanyForm {
    /// Pre-fills the form from a previous submission.
    pub fn from_details(details: &CompanyDetails) -> Self {
        Self {
            logo: details
                .logo
                .clone()
                .map(LogoInput::Encoded)
                .unwrap_or_default(),
            company_name: details.company_name.clone(),
            company_address: details.address.street.clone(),
            city: details.address.city.clone(),
            state: details.address.state.clone(),
            zip: details.address.zip.clone(),
            phone: details.phone.clone(),
            email: details.email.clone(),
            invoice_number: details.invoice_number.clone(),
            terms: details.terms.clone(),
            invoice_date: Some(details.invoice_date),
        }
    }

    /// Synchronous field checks only; the logo is not read here.
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        require(&mut errors, "company_name", "Company Name", &self.company_name);
        require(&mut errors, "company_address", "Company Address", &self.company_address);
        require(&mut errors, "city", "City", &self.city);
        require(&mut errors, "state", "State", &self.state);
        require(&mut errors, "zip", "ZIP Code", &self.zip);
        require(&mut errors, "phone", "Phone", &self.phone);
        require_email(&mut errors, &self.email);
        require(&mut errors, "invoice_number", "Invoice Number", &self.invoice_number);
        if let LogoInput::File(path) = &self.logo {
            if !crate::logo::is_accepted(path) {
                errors.insert("logo", "Logo must be a .jpg, .jpeg, .png or .webp file");
            }
        }
        errors
    }

    /// Validates, converts a picked logo, and builds the details. A failed
    /// conversion is reported on the `logo` field and blocks the step.
    pub fn submit(&self, today: NaiveDate) -> Result<CompanyDetails, FieldErrors> {
        let mut errors = self.validate();
        if !errors.is_empty() {
            return Err(errors);
        }

        let logo = match &self.logo {
            LogoInput::None => None,
            LogoInput::Encoded(image) => Some(image.clone()),
            LogoInput::File(path) => match InlineImage::from_file(path) {
                Ok(image) => Some(image),
                Err(e) => {
                    warn!(error = %e, "logo conversion failed");
                    errors.insert("logo", e.to_string());
                    return Err(errors);
                }
            },
        };

        let details = CompanyDetails {
            logo,
            company_name: self.company_name.trim().to_string(),
            address: Address {
                street: self.company_address.trim().to_string(),
                city: self.city.trim().to_string(),
                state: self.state.trim().to_string(),
                zip: self.zip.trim().to_string(),
            },
            phone: self.phone.trim().to_string(),
            email: self.email.trim().to_string(),
            invoice_number: self.invoice_number.trim().to_string(),
            terms: self.terms.clone(),
            invoice_date: self.invoice_date.unwrap_or(today),
        };
        debug!(company = %details.company_name, "company details accepted");
        Ok(details)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BillToForm {
    pub client_company_name: String,
    pub client_company_address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub phone: String,
    pub email: String,
}

impl BillToForm {
    pub fn from_details(details: &BillToDetails) -> Self {
        Self {
            client_company_name: details.client_company_name.clone(),
            client_company_address: details.address.street.clone(),
            city: details.address.city.clone(),
            state: details.address.state.clone(),
            zip: details.address.zip.clone(),
            phone: details.phone.clone(),
            email: details.email.clone(),
        }
    }

    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        require(&mut errors, "client_company_name", "Client Company Name", &self.client_company_name);
        require(
            &mut errors,
            "client_company_address",
            "Client Company Address",
            &self.client_company_address,
        );
        require(&mut errors, "city", "City", &self.city);
        require(&mut errors, "state", "State", &self.state);
        require(&mut errors, "zip", "ZIP Code", &self.zip);
        require(&mut errors, "phone", "Phone", &self.phone);
        require_email(&mut errors, &self.email);
        errors
    }

    pub fn submit(&self) -> Result<BillToDetails, FieldErrors> {
        let details = BillToDetails {
            client_company_name: self.client_company_name.trim().to_string(),
            address: Address {
                street: self.client_company_address.trim().to_string(),
                city: self.city.trim().to_string(),
                state: self.state.trim().to_string(),
                zip: self.zip.trim().to_string(),
            },
            phone: self.phone.trim().to_string(),
            email: self.email.trim().to_string(),
        };
        self.validate().into_result(details)
    }
}

fn require(errors: &mut FieldErrors, field: &'static str, label: &str, value: &str) {
    if value.trim().is_empty() {
        errors.insert(field, format!("{label} is required"));
    }
}

fn require_email(errors: &mut FieldErrors, value: &str) {
    require(errors, "email", "Email", value);
    if !is_valid_email(value) {
        errors.insert("email", "Invalid email");
    }
}
