use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_DRAFT_NAME: &str = "Untitled Invoice";
pub const DEFAULT_INVOICE_NUMBER: &str = "INV-001";
pub const DEFAULT_CURRENCY: &str = "USD";

/// One billable row of an invoice.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LineItem {
    pub id: String,
    pub description: String,
    pub quantity: f64,
    pub rate: f64,
}

impl LineItem {
    pub fn amount(&self) -> f64 {
        self.quantity * self.rate
    }
}

// Field names stay camelCase on disk: the persisted JSON format predates
// this tool.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceData {
    pub from_name: String,
    pub from_email: String,
    pub from_address: String,
    pub from_phone: String,
    pub to_name: String,
    pub to_email: String,
    pub to_address: String,
    pub invoice_number: String,
    pub issue_date: String,
    pub due_date: String,
    pub items: Vec<LineItem>,
    pub tax_rate: f64,
    pub discount_rate: f64,
    pub notes: String,
    pub currency: String,
}

impl InvoiceData {
    /// Appends a fresh line item and returns its id.
    pub fn add_item(&mut self) -> String {
        let item = new_line_item();
        let id = item.id.clone();
        self.items.push(item);
        id
    }

    /// Removes the named item. An invoice always keeps at least one item,
    /// so removing the last remaining one is a no-op returning false.
    pub fn remove_item(&mut self, id: &str) -> bool {
        if self.items.len() <= 1 {
            return false;
        }
        let before = self.items.len();
        self.items.retain(|i| i.id != id);
        self.items.len() < before
    }

    pub fn item_mut(&mut self, id: &str) -> Option<&mut LineItem> {
        self.items.iter_mut().find(|i| i.id == id)
    }
}

/// A named invoice-in-progress with its own signature image.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDraft {
    pub id: String,
    pub name: String,
    pub invoice: InvoiceData,
    pub signature: Option<String>,
    pub updated_at: i64,
}

impl InvoiceDraft {
    /// Refreshes the modification timestamp; never moves backwards.
    pub fn touch(&mut self) {
        self.updated_at = now_millis().max(self.updated_at);
    }
}

/// Partial update for an invoice. `None` fields are left untouched.
#[derive(Debug, Default, Clone)]
pub struct InvoiceUpdate {
    pub from_name: Option<String>,
    pub from_email: Option<String>,
    pub from_address: Option<String>,
    pub from_phone: Option<String>,
    pub to_name: Option<String>,
    pub to_email: Option<String>,
    pub to_address: Option<String>,
    pub invoice_number: Option<String>,
    pub issue_date: Option<String>,
    pub due_date: Option<String>,
    pub items: Option<Vec<LineItem>>,
    pub tax_rate: Option<f64>,
    pub discount_rate: Option<f64>,
    pub notes: Option<String>,
    pub currency: Option<String>,
}

impl InvoiceUpdate {
    pub fn apply_to(self, invoice: &mut InvoiceData) {
        if let Some(v) = self.from_name {
            invoice.from_name = v;
        }
        if let Some(v) = self.from_email {
            invoice.from_email = v;
        }
        if let Some(v) = self.from_address {
            invoice.from_address = v;
        }
        if let Some(v) = self.from_phone {
            invoice.from_phone = v;
        }
        if let Some(v) = self.to_name {
            invoice.to_name = v;
        }
        if let Some(v) = self.to_email {
            invoice.to_email = v;
        }
        if let Some(v) = self.to_address {
            invoice.to_address = v;
        }
        if let Some(v) = self.invoice_number {
            invoice.invoice_number = v;
        }
        if let Some(v) = self.issue_date {
            invoice.issue_date = v;
        }
        if let Some(v) = self.due_date {
            invoice.due_date = v;
        }
        if let Some(v) = self.items {
            invoice.items = v;
        }
        if let Some(v) = self.tax_rate {
            invoice.tax_rate = v;
        }
        if let Some(v) = self.discount_rate {
            invoice.discount_rate = v;
        }
        if let Some(v) = self.notes {
            invoice.notes = v;
        }
        if let Some(v) = self.currency {
            invoice.currency = v;
        }
    }
}

/// Partial update for a single line item.
#[derive(Debug, Default, Clone)]
pub struct LineItemUpdate {
    pub description: Option<String>,
    pub quantity: Option<f64>,
    pub rate: Option<f64>,
}

impl LineItemUpdate {
    pub fn apply_to(self, item: &mut LineItem) {
        if let Some(v) = self.description {
            item.description = v;
        }
        if let Some(v) = self.quantity {
            item.quantity = v;
        }
        if let Some(v) = self.rate {
            item.rate = v;
        }
    }
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn new_line_item() -> LineItem {
    LineItem {
        id: new_id(),
        description: String::new(),
        quantity: 1.0,
        rate: 0.0,
    }
}

/// Blank invoice as presented on first run: today's date, one empty item.
pub fn default_invoice() -> InvoiceData {
    InvoiceData {
        from_name: String::new(),
        from_email: String::new(),
        from_address: String::new(),
        from_phone: String::new(),
        to_name: String::new(),
        to_email: String::new(),
        to_address: String::new(),
        invoice_number: DEFAULT_INVOICE_NUMBER.to_string(),
        issue_date: Local::now().date_naive().to_string(),
        due_date: String::new(),
        items: vec![new_line_item()],
        tax_rate: 0.0,
        discount_rate: 0.0,
        notes: String::new(),
        currency: DEFAULT_CURRENCY.to_string(),
    }
}

pub fn new_draft(name: Option<&str>) -> InvoiceDraft {
    let name = match name {
        Some(n) if !n.is_empty() => n.to_string(),
        _ => DEFAULT_DRAFT_NAME.to_string(),
    };
    InvoiceDraft {
        id: new_id(),
        name,
        invoice: default_invoice(),
        signature: None,
        updated_at: now_millis(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_invoice_starts_with_one_empty_item() {
        let invoice = default_invoice();
        assert_eq!(invoice.invoice_number, "INV-001");
        assert_eq!(invoice.currency, "USD");
        assert_eq!(invoice.items.len(), 1);
        assert_eq!(invoice.items[0].description, "");
        assert_eq!(invoice.items[0].quantity, 1.0);
        assert_eq!(invoice.items[0].rate, 0.0);
        assert_eq!(invoice.issue_date.len(), 10);
    }

    #[test]
    fn new_draft_uses_fallback_name() {
        assert_eq!(new_draft(None).name, "Untitled Invoice");
        assert_eq!(new_draft(Some("")).name, "Untitled Invoice");
        assert_eq!(new_draft(Some("Acme March")).name, "Acme March");
    }

    #[test]
    fn drafts_get_distinct_ids() {
        assert_ne!(new_draft(None).id, new_draft(None).id);
    }

    #[test]
    fn last_item_cannot_be_removed() {
        let mut invoice = default_invoice();
        let only_id = invoice.items[0].id.clone();
        assert!(!invoice.remove_item(&only_id));
        assert_eq!(invoice.items.len(), 1);

        let second = invoice.add_item();
        assert_eq!(invoice.items.len(), 2);
        assert!(invoice.remove_item(&second));
        assert_eq!(invoice.items.len(), 1);
        assert_eq!(invoice.items[0].id, only_id);
    }

    #[test]
    fn remove_item_ignores_unknown_id() {
        let mut invoice = default_invoice();
        invoice.add_item();
        assert!(!invoice.remove_item("no-such-item"));
        assert_eq!(invoice.items.len(), 2);
    }

    #[test]
    fn update_touches_only_given_fields() {
        let mut invoice = default_invoice();
        invoice.to_name = "Initial Client".to_string();

        let update = InvoiceUpdate {
            from_name: Some("Jo Freelance".to_string()),
            tax_rate: Some(8.875),
            ..Default::default()
        };
        update.apply_to(&mut invoice);

        assert_eq!(invoice.from_name, "Jo Freelance");
        assert_eq!(invoice.tax_rate, 8.875);
        assert_eq!(invoice.to_name, "Initial Client");
        assert_eq!(invoice.invoice_number, "INV-001");
    }

    #[test]
    fn touch_never_moves_backwards() {
        let mut draft = new_draft(None);
        draft.updated_at = i64::MAX - 1;
        draft.touch();
        assert_eq!(draft.updated_at, i64::MAX - 1);
    }

    #[test]
    fn draft_serializes_with_camel_case_keys_and_null_signature() {
        let draft = new_draft(Some("Rooftop Job"));
        let json = serde_json::to_string(&draft).unwrap();
        assert!(json.contains("\"updatedAt\""));
        assert!(json.contains("\"invoiceNumber\""));
        assert!(json.contains("\"signature\":null"));
    }
}
