mod currency;
mod export;
mod model;
mod preview;
mod store;
mod totals;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Context;
use chrono::{DateTime, Local, NaiveDate};
use clap::{Parser, Subcommand};
use comfy_table::{Attribute, Cell, Color, Table};
use directories::{BaseDirs, ProjectDirs};
use inquire::{Confirm, DateSelect, Select, Text};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::currency::{CURRENCIES, currency_symbol};
use crate::model::{InvoiceUpdate, LineItemUpdate};
use crate::preview::render_preview;
use crate::store::{DraftStore, FileStorage};
use crate::totals::calculate_totals;

// ==========================================
// Constants
// ==========================================
const ADD_ITEM_OPT: &str = "➕ Add line item";
const DONE_OPT: &str = "✅ Done";

// ==========================================
// Structs & Enums
// ==========================================

#[derive(Debug, Serialize, Deserialize)]
struct AppSettings {
    data_root: String,
}

#[derive(Parser)]
#[command(name = "invoice-studio")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new draft and switch to it
    New {
        /// Name for the new draft
        #[arg(long)]
        name: Option<String>,
    },
    /// List all drafts, most recently updated first
    List,
    /// Switch the active draft
    Switch,
    /// Rename a draft (keeps its last-updated time)
    Rename,
    /// Delete a draft
    Delete,
    /// Edit the active draft section by section
    Edit,
    /// Print a preview of the active draft
    Show,
    /// Attach, replace or remove the signature image
    Sign,
    /// Reset the active draft's invoice to defaults
    Reset,
    /// Export the active draft as a PDF
    Export,
    /// Configure data directory
    Config,
}

// ==========================================
// Main Function
// ==========================================

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        use clap::CommandFactory;
        let _ = Cli::command().print_help();
        return;
    };

    if let Err(e) = run(command) {
        eprintln!("❌ {e:#}");
        std::process::exit(1);
    }
}

fn run(command: Commands) -> anyhow::Result<()> {
    if let Commands::Config = command {
        setup_config_wizard()?;
        return Ok(());
    }

    // 1. Initialize configuration
    let settings = match load_settings() {
        Some(s) => s,
        None => setup_config_wizard()?,
    };
    let root = PathBuf::from(expand_home_dir(&settings.data_root));
    let mut store = DraftStore::open(FileStorage::new(root.join("data")));

    match command {
        Commands::New { name } => cmd_new(&mut store, name.as_deref()),
        Commands::List => cmd_list(&store),
        Commands::Switch => cmd_switch(&mut store),
        Commands::Rename => cmd_rename(&mut store),
        Commands::Delete => cmd_delete(&mut store),
        Commands::Edit => cmd_edit(&mut store),
        Commands::Show => cmd_show(&store),
        Commands::Sign => cmd_sign(&mut store),
        Commands::Reset => cmd_reset(&mut store),
        Commands::Export => cmd_export(&store, &root),
        Commands::Config => Ok(()),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

// ==========================================
// 1. Draft Commands
// ==========================================

fn cmd_new(store: &mut DraftStore<FileStorage>, name: Option<&str>) -> anyhow::Result<()> {
    let name = match name {
        Some(n) => Some(n.to_string()),
        None => {
            let input = Text::new("Draft name (leave empty for default):").prompt()?;
            if input.trim().is_empty() { None } else { Some(input) }
        }
    };
    store.add_draft(name.as_deref());
    println!("✅ Created draft: {} (now active)", store.active().name);
    println!("💡 Run 'invoice-studio edit' to fill it in.");
    Ok(())
}

fn cmd_list(store: &DraftStore<FileStorage>) -> anyhow::Result<()> {
    let mut table = Table::new();
    table.set_header(vec![
        Cell::new(""),
        Cell::new("Name").add_attribute(Attribute::Bold),
        Cell::new("Invoice #").add_attribute(Attribute::Bold),
        Cell::new("Total").add_attribute(Attribute::Bold),
        Cell::new("Updated").add_attribute(Attribute::Bold),
    ]);

    for draft in store.drafts_by_recency() {
        let invoice = &draft.invoice;
        let totals = calculate_totals(&invoice.items, invoice.tax_rate, invoice.discount_rate);
        let symbol = currency_symbol(&invoice.currency);
        let marker = if draft.id == store.active_id() {
            Cell::new("➤").fg(Color::Rgb { r: 4, g: 120, b: 87 })
        } else {
            Cell::new("")
        };
        table.add_row(vec![
            marker,
            Cell::new(&draft.name),
            Cell::new(&invoice.invoice_number),
            Cell::new(format!("{symbol}{:.2}", totals.total)),
            Cell::new(format_updated(draft.updated_at)),
        ]);
    }

    println!("{table}");
    Ok(())
}

fn cmd_switch(store: &mut DraftStore<FileStorage>) -> anyhow::Result<()> {
    let id = select_draft(store, "Select draft:")?;
    store.switch_draft(&id);
    println!("✅ Active draft: {}", store.active().name);
    Ok(())
}

fn cmd_rename(store: &mut DraftStore<FileStorage>) -> anyhow::Result<()> {
    let id = select_draft(store, "Select draft to rename:")?;
    let current = store
        .drafts()
        .iter()
        .find(|d| d.id == id)
        .map(|d| d.name.clone())
        .unwrap_or_default();

    let name = Text::new("New name:").with_initial_value(&current).prompt()?;
    let trimmed = name.trim();
    if trimmed.is_empty() {
        println!("Name unchanged.");
    } else {
        store.rename_draft(&id, trimmed);
        println!("✅ Renamed to: {trimmed}");
    }
    Ok(())
}

fn cmd_delete(store: &mut DraftStore<FileStorage>) -> anyhow::Result<()> {
    let id = select_draft(store, "Select draft to delete:")?;
    let name = store
        .drafts()
        .iter()
        .find(|d| d.id == id)
        .map(|d| d.name.clone())
        .unwrap_or_default();

    let confirmed = Confirm::new(&format!("Delete draft '{name}'?"))
        .with_default(false)
        .prompt()?;
    if !confirmed {
        println!("Cancelled");
        return Ok(());
    }

    store.delete_draft(&id);
    println!("✅ Deleted. Active draft is now: {}", store.active().name);
    Ok(())
}

// Draft picker over the recency-sorted view, mapping back by list index.
fn select_draft(store: &DraftStore<FileStorage>, prompt: &str) -> anyhow::Result<String> {
    let view = store.drafts_by_recency();
    let options: Vec<String> = view
        .iter()
        .map(|d| {
            format!(
                "{} | {} | {}",
                d.name,
                d.invoice.invoice_number,
                format_updated(d.updated_at)
            )
        })
        .collect();

    let choice = Select::new(prompt, options).with_page_size(10).raw_prompt()?;
    Ok(view[choice.index].id.clone())
}

// ==========================================
// 2. Edit Wizards
// ==========================================

fn cmd_edit(store: &mut DraftStore<FileStorage>) -> anyhow::Result<()> {
    println!("📄 Editing draft: {}", store.active().name);
    loop {
        let section = Select::new(
            "Edit which section?",
            vec![
                "Invoice Details",
                "Your Business",
                "Bill To",
                "Line Items",
                "Tax & Discount",
                "Notes",
                "Done",
            ],
        )
        .raw_prompt()?;

        match section.index {
            0 => edit_details(store)?,
            1 => edit_from(store)?,
            2 => edit_to(store)?,
            3 => edit_items(store)?,
            4 => edit_rates(store)?,
            5 => edit_notes(store)?,
            _ => break,
        }
    }
    println!("{}", render_preview(store.active()));
    Ok(())
}

fn edit_details(store: &mut DraftStore<FileStorage>) -> anyhow::Result<()> {
    let invoice = store.active().invoice.clone();
    println!("\n--- Invoice Details ---");

    let number = Text::new("Invoice Number:")
        .with_initial_value(&invoice.invoice_number)
        .prompt()?;

    let issue = DateSelect::new("Issue Date:")
        .with_default(parse_date(&invoice.issue_date))
        .prompt()?;

    let set_due = Confirm::new("Set a due date?")
        .with_default(!invoice.due_date.is_empty())
        .prompt()?;
    let due = if set_due {
        let initial = if invoice.due_date.is_empty() {
            &invoice.issue_date
        } else {
            &invoice.due_date
        };
        DateSelect::new("Due Date:")
            .with_default(parse_date(initial))
            .prompt()?
            .to_string()
    } else {
        String::new()
    };

    let cursor = CURRENCIES
        .iter()
        .position(|c| c.code == invoice.currency)
        .unwrap_or(0);
    let labels: Vec<String> = CURRENCIES
        .iter()
        .map(|c| format!("{} | {} | {}", c.code, c.name, c.symbol))
        .collect();
    let picked = Select::new("Currency:", labels)
        .with_starting_cursor(cursor)
        .raw_prompt()?;

    store.update_invoice(InvoiceUpdate {
        invoice_number: Some(number),
        issue_date: Some(issue.to_string()),
        due_date: Some(due),
        currency: Some(CURRENCIES[picked.index].code.to_string()),
        ..Default::default()
    });
    Ok(())
}

fn edit_from(store: &mut DraftStore<FileStorage>) -> anyhow::Result<()> {
    let invoice = store.active().invoice.clone();
    println!("\n--- Your Business ---");

    let name = Text::new("Name:").with_initial_value(&invoice.from_name).prompt()?;
    let email = Text::new("Email:").with_initial_value(&invoice.from_email).prompt()?;
    let phone = Text::new("Phone:").with_initial_value(&invoice.from_phone).prompt()?;
    let address = wizard_address("Business Address")?;

    store.update_invoice(InvoiceUpdate {
        from_name: Some(name),
        from_email: Some(email),
        from_phone: Some(phone),
        from_address: address,
        ..Default::default()
    });
    Ok(())
}

fn edit_to(store: &mut DraftStore<FileStorage>) -> anyhow::Result<()> {
    let invoice = store.active().invoice.clone();
    println!("\n--- Bill To ---");

    let name = Text::new("Client Name:").with_initial_value(&invoice.to_name).prompt()?;
    let email = Text::new("Client Email:").with_initial_value(&invoice.to_email).prompt()?;
    let address = wizard_address("Client Address")?;

    store.update_invoice(InvoiceUpdate {
        to_name: Some(name),
        to_email: Some(email),
        to_address: address,
        ..Default::default()
    });
    Ok(())
}

fn edit_items(store: &mut DraftStore<FileStorage>) -> anyhow::Result<()> {
    loop {
        let invoice = store.active().invoice.clone();
        let symbol = currency_symbol(&invoice.currency).to_string();

        let mut options: Vec<String> = invoice
            .items
            .iter()
            .map(|i| {
                let desc = if i.description.is_empty() {
                    "(no description)"
                } else {
                    i.description.as_str()
                };
                format!("{} | qty {} | {}{:.2}", desc, i.quantity, symbol, i.rate)
            })
            .collect();
        options.push(ADD_ITEM_OPT.to_string());
        options.push(DONE_OPT.to_string());

        let choice = Select::new("Line Items:", options)
            .with_page_size(12)
            .raw_prompt()?;

        if choice.index == invoice.items.len() {
            let id = store.add_line_item();
            edit_item_fields(store, &id)?;
        } else if choice.index == invoice.items.len() + 1 {
            return Ok(());
        } else {
            let item = &invoice.items[choice.index];
            let action = Select::new("Action:", vec!["Edit", "Remove", "Back"]).raw_prompt()?;
            match action.index {
                0 => edit_item_fields(store, &item.id)?,
                1 => {
                    if !store.remove_line_item(&item.id) {
                        println!("⚠️  An invoice needs at least one line item.");
                    }
                }
                _ => {}
            }
        }
    }
}

fn edit_item_fields(store: &mut DraftStore<FileStorage>, id: &str) -> anyhow::Result<()> {
    let Some(current) = store
        .active()
        .invoice
        .items
        .iter()
        .find(|i| i.id == id)
        .cloned()
    else {
        return Ok(());
    };

    println!("💡 Tip: Use '\\n' for new lines, and '- ' for bullet points.");
    let desc = Text::new("Description:")
        .with_initial_value(&current.description)
        .prompt()?;

    let qty_str = Text::new("Quantity:")
        .with_default(&current.quantity.to_string())
        .prompt()?;
    let quantity: f64 = qty_str.trim().parse().unwrap_or(current.quantity);

    let rate_str = Text::new("Rate:")
        .with_default(&current.rate.to_string())
        .prompt()?;
    let rate: f64 = rate_str.trim().parse().unwrap_or(current.rate);

    store.update_line_item(
        id,
        LineItemUpdate {
            description: Some(desc.replace("\\n", "\n")),
            quantity: Some(quantity),
            rate: Some(rate),
        },
    );
    Ok(())
}

fn edit_rates(store: &mut DraftStore<FileStorage>) -> anyhow::Result<()> {
    let invoice = store.active().invoice.clone();
    println!("\n--- Tax & Discount ---");

    let tax_str = Text::new("Tax Rate % (0 for none):")
        .with_default(&invoice.tax_rate.to_string())
        .prompt()?;
    let tax_rate: f64 = tax_str.trim().parse().unwrap_or(invoice.tax_rate).max(0.0);

    let discount_str = Text::new("Discount Rate % (0 for none):")
        .with_default(&invoice.discount_rate.to_string())
        .prompt()?;
    let discount_rate: f64 = discount_str
        .trim()
        .parse()
        .unwrap_or(invoice.discount_rate)
        .max(0.0);

    store.update_invoice(InvoiceUpdate {
        tax_rate: Some(tax_rate),
        discount_rate: Some(discount_rate),
        ..Default::default()
    });
    Ok(())
}

fn edit_notes(store: &mut DraftStore<FileStorage>) -> anyhow::Result<()> {
    println!("💡 Tip: Use '\\n' for new lines.");
    let notes = Text::new("Notes:")
        .with_initial_value(&store.active().invoice.notes)
        .prompt()?;
    store.update_invoice(InvoiceUpdate {
        notes: Some(notes.replace("\\n", "\n")),
        ..Default::default()
    });
    Ok(())
}

// Composes a one-field postal address, with an optional zip lookup to
// prefill city and state. Empty street keeps the stored address.
fn wizard_address(label: &str) -> anyhow::Result<Option<String>> {
    println!("--- {label} ---");
    let street = Text::new("Street (leave empty to keep current):").prompt()?;
    if street.trim().is_empty() {
        return Ok(None);
    }

    let zip = Text::new("Zip Code (leave empty to skip lookup):").prompt()?;
    let (mut def_city, mut def_state) = (String::new(), String::new());

    if !zip.trim().is_empty() {
        if let Ok(results) = zipcodes::matching(&zip, None) {
            if let Some(info) = results.first() {
                println!("🚀 Found: {}, {}", info.city, info.state);
                def_city = info.city.to_string();
                def_state = info.state.to_string();
            }
        }
    }

    let city = Text::new("City:").with_default(&def_city).prompt()?;
    let state = Text::new("State:").with_default(&def_state).prompt()?;

    let mut line2 = vec![];
    for part in [city.trim(), state.trim(), zip.trim()] {
        if !part.is_empty() {
            line2.push(part);
        }
    }
    let address = if line2.is_empty() {
        street
    } else {
        format!("{street}\n{}", line2.join(", "))
    };
    Ok(Some(address))
}

// ==========================================
// 3. Preview, Signature & Export
// ==========================================

fn cmd_show(store: &DraftStore<FileStorage>) -> anyhow::Result<()> {
    let draft = store.active();
    println!("📄 Draft: {}", draft.name);
    println!("{}", render_preview(draft));
    Ok(())
}

fn cmd_sign(store: &mut DraftStore<FileStorage>) -> anyhow::Result<()> {
    if store.active().signature.is_some() {
        let action = Select::new(
            "A signature is already attached:",
            vec!["Replace", "Remove", "Keep"],
        )
        .raw_prompt()?;
        match action.index {
            1 => {
                store.set_signature(None);
                println!("✅ Signature removed.");
                return Ok(());
            }
            2 => return Ok(()),
            _ => {}
        }
    }

    println!("📂 Opening file picker...");
    let picked = rfd::FileDialog::new()
        .set_title("Select Signature Image")
        .add_filter("Images", &["png", "jpg", "jpeg", "gif", "webp"])
        .pick_file();

    let path = match picked {
        Some(p) => p,
        None => {
            println!("❌ No file selected. Falling back to manual input.");
            PathBuf::from(Text::new("Path to image file:").prompt()?)
        }
    };

    // A failed read leaves the stored signature untouched.
    match export::read_image_as_data_uri(&path) {
        Ok(uri) => {
            store.set_signature(Some(uri));
            println!("✅ Signature attached.");
        }
        Err(e) => println!("❌ Could not read image: {e}. Signature unchanged."),
    }
    Ok(())
}

fn cmd_reset(store: &mut DraftStore<FileStorage>) -> anyhow::Result<()> {
    let name = store.active().name.clone();
    let confirmed = Confirm::new(&format!(
        "Reset the invoice on '{name}'? This clears every field and the signature."
    ))
    .with_default(false)
    .prompt()?;
    if !confirmed {
        println!("Cancelled");
        return Ok(());
    }

    store.reset_invoice();
    println!("✅ Invoice reset to defaults.");
    Ok(())
}

fn cmd_export(store: &DraftStore<FileStorage>, root: &Path) -> anyhow::Result<()> {
    let pdf_path = export::export_pdf(root, store.active())?;
    println!("✅ PDF Generated: {:?}", pdf_path);
    open_file(&pdf_path);
    Ok(())
}

// ==========================================
// 4. Config & Utilities
// ==========================================

fn get_config_path() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("com", "invoice-studio", "app") {
        let config_dir = proj_dirs.config_dir();
        if !config_dir.exists() {
            fs::create_dir_all(config_dir).ok();
        }
        return config_dir.join("settings.toml");
    }
    PathBuf::from("settings.toml")
}

fn load_settings() -> Option<AppSettings> {
    let path = get_config_path();
    if !path.exists() {
        return None;
    }
    let content = fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}

fn setup_config_wizard() -> anyhow::Result<AppSettings> {
    println!("\n⚙️  --- Configuration Setup ---");
    let current = load_settings();
    let default_val = current
        .map(|s| s.data_root)
        .unwrap_or_else(|| "~/Documents/Invoices".to_string());

    println!("📂 Opening folder picker...");
    let picked_path = rfd::FileDialog::new()
        .set_title("Select Root Data Directory")
        .pick_folder();

    let new_root = if let Some(path) = picked_path {
        path.to_string_lossy().to_string()
    } else {
        println!("❌ No folder selected. Falling back to manual input.");
        Text::new("Enter Root Data Directory:")
            .with_default(&default_val)
            .prompt()?
    };

    let settings = AppSettings { data_root: new_root };
    let path = get_config_path();
    let toml_str = toml::to_string_pretty(&settings).context("failed to encode settings")?;
    fs::write(&path, toml_str).context("failed to save settings")?;
    println!("✅ Settings saved.");
    Ok(settings)
}

fn expand_home_dir(path: &str) -> String {
    if path.starts_with("~") {
        if let Some(base_dirs) = BaseDirs::new() {
            let home = base_dirs.home_dir().to_string_lossy();
            return path.replacen("~", &home, 1);
        }
    }
    path.to_string()
}

fn format_updated(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn parse_date(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap_or_else(|_| Local::now().date_naive())
}

// Open the generated file with the platform default viewer.
fn open_file(path: &Path) {
    #[cfg(target_os = "macos")]
    Command::new("open").arg(path).spawn().ok();

    #[cfg(target_os = "windows")]
    Command::new("explorer").arg(path).spawn().ok();

    #[cfg(target_os = "linux")]
    Command::new("xdg-open").arg(path).spawn().ok();
}
