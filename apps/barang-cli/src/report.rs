use anyhow::Result;
use barang_scanner::ScanOutcome;
use barang_types::BarangError;
use serde_json::{json, Value};

pub fn print_outcome(outcome: &ScanOutcome, as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }
    match outcome {
        ScanOutcome::ExistingLocker { locker, items } => {
            let label = locker.label.as_deref().unwrap_or(&locker.code);
            println!("Locker {label} ({})", locker.code);
            if items.is_empty() {
                println!("  (empty)");
            }
            for item in items {
                match &item.category {
                    Some(category) => {
                        println!("  {} x{} [{category}]", item.name, item.quantity)
                    }
                    None => println!("  {} x{}", item.name, item.quantity),
                }
            }
        }
        ScanOutcome::InitializeLocker { qr_code_id, code } => {
            println!("Label {code} is not assigned yet; set up a new locker for {qr_code_id}.");
        }
    }
    Ok(())
}

pub fn print_error(err: &BarangError, hint: Option<&str>, as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(&error_body(err, hint))?);
    } else {
        eprintln!("{}", err.user_message());
        if let Some(hint) = hint {
            eprintln!("{hint}");
        }
    }
    Ok(())
}

fn error_body(err: &BarangError, hint: Option<&str>) -> Value {
    let mut body = json!({
        "error": err.category(),
        "message": err.user_message(),
    });
    if let Some(hint) = hint {
        body["hint"] = json!(hint);
    }
    body
}
