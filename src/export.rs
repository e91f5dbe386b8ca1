use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use base64::{Engine as _, engine::general_purpose};
use regex::Regex;
use serde::Serialize;
use tera::{Context, Tera, Value};
use thiserror::Error;

use crate::currency::currency_symbol;
use crate::model::{InvoiceData, InvoiceDraft};
use crate::totals::calculate_totals;

// Embed template at compile time to ensure availability
const DEFAULT_TEMPLATE: &str = include_str!("../templates/invoice.tera");

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("'typst' is not installed. Please install it (brew install typst)")]
    TypstMissing,
    #[error("typst compilation failed")]
    CompileFailed,
    #[error("template error: {0}")]
    Template(#[from] tera::Error),
    #[error("unsupported image type: {0:?} (use png, jpg, gif or webp)")]
    UnsupportedImage(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Download-style filename for a draft: the invoice number, or "invoice"
/// when the number is empty.
pub fn pdf_file_name(invoice_number: &str) -> String {
    format!("{}.pdf", pdf_file_stem(invoice_number))
}

fn pdf_file_stem(invoice_number: &str) -> &str {
    if invoice_number.is_empty() {
        "invoice"
    } else {
        invoice_number
    }
}

/// Reads an image file and encodes it as a base64 data URI, with the mime
/// type taken from the file extension.
pub fn read_image_as_data_uri(path: &Path) -> Result<String, ExportError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let mime = mime_for_extension(ext).ok_or_else(|| ExportError::UnsupportedImage(ext.to_string()))?;
    let bytes = fs::read(path)?;
    let encoded = general_purpose::STANDARD.encode(&bytes);
    Ok(format!("data:{mime};base64,{encoded}"))
}

/// Splits a data URI into mime type and decoded payload. Anything that is
/// not a well-formed base64 data URI is `None`.
pub fn decode_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let re = Regex::new(r"^data:([\w/+.-]+);base64,(.+)$").ok()?;
    let caps = re.captures(uri)?;
    let bytes = general_purpose::STANDARD.decode(&caps[2]).ok()?;
    Some((caps[1].to_string(), bytes))
}

fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "png",
    }
}

/// Renders the draft through the Tera template and compiles it with the
/// external typst binary. Returns the path of the generated PDF.
pub fn export_pdf(root: &Path, draft: &InvoiceDraft) -> Result<PathBuf, ExportError> {
    // Check if Typst is installed
    if Command::new("typst").arg("--version").output().is_err() {
        return Err(ExportError::TypstMissing);
    }

    let template_dir = root.join("templates");
    fs::create_dir_all(&template_dir)?;
    let template_path = template_dir.join("invoice.tera");
    if !template_path.exists() {
        println!("✨ Initializing default template...");
        fs::write(&template_path, DEFAULT_TEMPLATE)?;
    }

    let glob = template_dir.join("*.tera");
    let mut tera = Tera::new(&glob.to_string_lossy())?;
    tera.register_filter("typst_escape", typst_escape);

    let output_dir = root.join("output");
    fs::create_dir_all(&output_dir)?;

    let signature_file = match &draft.signature {
        Some(uri) => match decode_data_uri(uri) {
            Some((mime, bytes)) => {
                let file_name = format!("signature.{}", extension_for_mime(&mime));
                fs::write(output_dir.join(&file_name), &bytes)?;
                Some(file_name)
            }
            None => {
                tracing::warn!("signature is not a valid data URI, exporting without it");
                None
            }
        },
        None => None,
    };

    let rendered = render_invoice(&tera, draft, signature_file)?;

    let stem = pdf_file_stem(&draft.invoice.invoice_number);
    let typ_path = output_dir.join(format!("{stem}.typ"));
    let pdf_path = output_dir.join(pdf_file_name(&draft.invoice.invoice_number));
    fs::write(&typ_path, rendered)?;

    println!("\n🔨 Compiling PDF...");
    match Command::new("typst")
        .arg("compile")
        .arg(&typ_path)
        .arg(&pdf_path)
        .status()
    {
        Ok(s) if s.success() => Ok(pdf_path),
        _ => Err(ExportError::CompileFailed),
    }
}

#[derive(Serialize)]
struct ItemRow {
    description: String,
    quantity: String,
    rate: String,
    amount: String,
}

#[derive(Serialize)]
struct ExportContext<'a> {
    invoice: &'a InvoiceData,
    items: Vec<ItemRow>,
    subtotal: String,
    discount: String,
    tax: String,
    total: String,
    discount_rate: String,
    tax_rate: String,
    has_discount: bool,
    has_tax: bool,
    signature_file: Option<String>,
}

fn render_invoice(
    tera: &Tera,
    draft: &InvoiceDraft,
    signature_file: Option<String>,
) -> Result<String, ExportError> {
    let invoice = &draft.invoice;
    let symbol = currency_symbol(&invoice.currency);
    let totals = calculate_totals(&invoice.items, invoice.tax_rate, invoice.discount_rate);

    let items = invoice
        .items
        .iter()
        .map(|i| ItemRow {
            description: i.description.clone(),
            quantity: i.quantity.to_string(),
            rate: format!("{symbol}{:.2}", i.rate),
            amount: format!("{symbol}{:.2}", i.amount()),
        })
        .collect();

    let context_data = ExportContext {
        invoice,
        items,
        subtotal: format!("{symbol}{:.2}", totals.subtotal),
        discount: format!("{symbol}{:.2}", totals.discount),
        tax: format!("{symbol}{:.2}", totals.tax),
        total: format!("{symbol}{:.2}", totals.total),
        discount_rate: invoice.discount_rate.to_string(),
        tax_rate: invoice.tax_rate.to_string(),
        has_discount: invoice.discount_rate > 0.0,
        has_tax: invoice.tax_rate > 0.0,
        signature_file,
    };

    let context = Context::from_serialize(&context_data)?;
    Ok(tera.render("invoice.tera", &context)?)
}

// Escapes text for Typst markup. Newlines become hard line breaks so
// multi-line addresses and notes keep their shape.
fn typst_escape(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let s = tera::try_get_value!("typst_escape", "value", String, value);
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' | '#' | '$' | '%' | '&' | '~' | '_' | '*' | '@' | '[' | ']' | '`' | '<'
            | '>' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '\r' => {}
            '\n' => escaped.push_str("\\\n"),
            _ => escaped.push(c),
        }
    }
    Ok(Value::String(escaped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::new_draft;

    fn template() -> Tera {
        let mut tera = Tera::default();
        tera.register_filter("typst_escape", typst_escape);
        tera.add_raw_template("invoice.tera", DEFAULT_TEMPLATE).unwrap();
        tera
    }

    #[test]
    fn file_name_falls_back_when_number_is_empty() {
        assert_eq!(pdf_file_name("INV-007"), "INV-007.pdf");
        assert_eq!(pdf_file_name(""), "invoice.pdf");
    }

    #[test]
    fn image_file_round_trips_through_data_uri() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sig.PNG");
        fs::write(&path, b"not really a png").unwrap();

        let uri = read_image_as_data_uri(&path).unwrap();
        assert!(uri.starts_with("data:image/png;base64,"));

        let (mime, bytes) = decode_data_uri(&uri).unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, b"not really a png");
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sig.txt");
        fs::write(&path, b"x").unwrap();
        assert!(matches!(
            read_image_as_data_uri(&path),
            Err(ExportError::UnsupportedImage(_))
        ));
    }

    #[test]
    fn malformed_data_uris_decode_to_none() {
        assert!(decode_data_uri("not a uri").is_none());
        assert!(decode_data_uri("data:image/png;base64,!!!").is_none());
        assert!(decode_data_uri("data:image/png;base64,").is_none());
    }

    #[test]
    fn default_template_renders_totals_and_signature() {
        let mut draft = new_draft(Some("Render"));
        draft.invoice.to_name = "Acme Co".to_string();
        draft.invoice.items[0].description = "Design work".to_string();
        draft.invoice.items[0].quantity = 2.0;
        draft.invoice.items[0].rate = 100.0;
        draft.invoice.tax_rate = 10.0;
        draft.invoice.notes = "Net 30".to_string();

        let rendered =
            render_invoice(&template(), &draft, Some("signature.png".to_string())).unwrap();
        assert!(rendered.contains("INV-001"));
        assert!(rendered.contains("Acme Co"));
        assert!(rendered.contains("\\$220.00"));
        assert!(rendered.contains("signature.png"));
        assert!(rendered.contains("Net 30"));
    }

    #[test]
    fn template_escapes_markup_in_user_text() {
        let mut draft = new_draft(None);
        draft.invoice.to_name = "Acme #1 [Main]".to_string();
        draft.invoice.notes = "50% upfront, $100 deposit".to_string();

        let rendered = render_invoice(&template(), &draft, None).unwrap();
        assert!(rendered.contains("Acme \\#1 \\[Main\\]"));
        assert!(rendered.contains("50\\% upfront, \\$100 deposit"));
    }

    #[test]
    fn multiline_fields_become_hard_breaks() {
        let mut draft = new_draft(None);
        draft.invoice.from_address = "12 Bay St\nSpringfield".to_string();

        let rendered = render_invoice(&template(), &draft, None).unwrap();
        assert!(rendered.contains("12 Bay St\\\nSpringfield"));
    }
}
