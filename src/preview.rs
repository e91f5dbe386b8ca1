use comfy_table::{Attribute, Cell, Table};

use crate::currency::currency_symbol;
use crate::model::InvoiceDraft;
use crate::totals::calculate_totals;

/// Renders a draft the way the exported document lays it out: header,
/// parties, item table, totals block, notes, signature marker.
pub fn render_preview(draft: &InvoiceDraft) -> String {
    let invoice = &draft.invoice;
    let symbol = currency_symbol(&invoice.currency);
    let totals = calculate_totals(&invoice.items, invoice.tax_rate, invoice.discount_rate);

    let mut out = String::new();
    out.push_str(&format!("\nINVOICE  {}\n", invoice.invoice_number));
    if !invoice.issue_date.is_empty() {
        out.push_str(&format!("Issued: {}\n", invoice.issue_date));
    }
    if !invoice.due_date.is_empty() {
        out.push_str(&format!("Due:    {}\n", invoice.due_date));
    }

    let mut parties = Table::new();
    parties.set_header(vec![
        Cell::new("From").add_attribute(Attribute::Bold),
        Cell::new("Bill To").add_attribute(Attribute::Bold),
    ]);
    parties.add_row(vec![
        Cell::new(party_block(&[
            &invoice.from_name,
            &invoice.from_email,
            &invoice.from_address,
            &invoice.from_phone,
        ])),
        Cell::new(party_block(&[
            &invoice.to_name,
            &invoice.to_email,
            &invoice.to_address,
        ])),
    ]);
    out.push('\n');
    out.push_str(&parties.to_string());
    out.push('\n');

    let mut items = Table::new();
    items.set_header(vec![
        Cell::new("Description").add_attribute(Attribute::Bold),
        Cell::new("Qty").add_attribute(Attribute::Bold),
        Cell::new("Rate").add_attribute(Attribute::Bold),
        Cell::new("Amount").add_attribute(Attribute::Bold),
    ]);
    for item in &invoice.items {
        items.add_row(vec![
            Cell::new(&item.description),
            Cell::new(item.quantity.to_string()),
            Cell::new(format!("{symbol}{:.2}", item.rate)),
            Cell::new(format!("{symbol}{:.2}", item.amount())),
        ]);
    }
    out.push('\n');
    out.push_str(&items.to_string());
    out.push('\n');

    out.push_str(&format!("\n{:>22} {symbol}{:.2}\n", "Subtotal:", totals.subtotal));
    if invoice.discount_rate > 0.0 {
        out.push_str(&format!(
            "{:>22} -{symbol}{:.2}\n",
            format!("Discount ({}%):", invoice.discount_rate),
            totals.discount
        ));
    }
    if invoice.tax_rate > 0.0 {
        out.push_str(&format!(
            "{:>22} {symbol}{:.2}\n",
            format!("Tax ({}%):", invoice.tax_rate),
            totals.tax
        ));
    }
    out.push_str(&format!("{:>22} {symbol}{:.2}\n", "Total:", totals.total));

    if !invoice.notes.is_empty() {
        out.push_str("\nNotes\n");
        out.push_str(&invoice.notes);
        out.push('\n');
    }

    if draft.signature.is_some() {
        out.push_str("\nAuthorized Signature: [image attached]\n");
    }

    out
}

fn party_block(fields: &[&String]) -> String {
    fields
        .iter()
        .filter(|v| !v.is_empty())
        .map(|v| v.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LineItemUpdate, new_draft};

    fn sample_draft() -> InvoiceDraft {
        let mut draft = new_draft(Some("Preview"));
        draft.invoice.to_name = "Acme Co".to_string();
        let update = LineItemUpdate {
            description: Some("Design work".to_string()),
            quantity: Some(2.0),
            rate: Some(100.0),
        };
        let id = draft.invoice.items[0].id.clone();
        if let Some(item) = draft.invoice.item_mut(&id) {
            update.apply_to(item);
        }
        draft
    }

    #[test]
    fn preview_shows_items_and_totals() {
        let out = render_preview(&sample_draft());
        assert!(out.contains("INVOICE  INV-001"));
        assert!(out.contains("Acme Co"));
        assert!(out.contains("Design work"));
        assert!(out.contains("Subtotal: $200.00"));
        assert!(out.contains("Total: $200.00"));
    }

    #[test]
    fn discount_and_tax_rows_appear_only_when_set() {
        let mut draft = sample_draft();
        let out = render_preview(&draft);
        assert!(!out.contains("Discount"));
        assert!(!out.contains("Tax"));

        draft.invoice.discount_rate = 10.0;
        draft.invoice.tax_rate = 10.0;
        let out = render_preview(&draft);
        assert!(out.contains("Discount (10%): -$20.00"));
        assert!(out.contains("Tax (10%): $18.00"));
    }

    #[test]
    fn unknown_currency_code_is_used_verbatim() {
        let mut draft = sample_draft();
        draft.invoice.currency = "ZZZ".to_string();
        let out = render_preview(&draft);
        assert!(out.contains("Subtotal: ZZZ200.00"));
    }

    #[test]
    fn signature_marker_tracks_presence() {
        let mut draft = sample_draft();
        assert!(!render_preview(&draft).contains("Authorized Signature"));
        draft.signature = Some("data:image/png;base64,AAAA".to_string());
        assert!(render_preview(&draft).contains("Authorized Signature"));
    }
}
