//! Transaction command implementations

use std::str::FromStr;

use anyhow::{Context, Result};
use concierge_core::models::{NewTransaction, TransactionType};
use concierge_core::Database;
use rust_decimal::Decimal;

use super::{find_user, now, parse_date, truncate};

/// Build a transaction from raw CLI values
pub fn new_transaction(
    user_id: i64,
    amount: &str,
    category: &str,
    description: &str,
    date: Option<&str>,
    kind: &str,
    location: Option<&str>,
) -> Result<NewTransaction> {
    let amount = Decimal::from_str(amount.trim())
        .with_context(|| format!("Invalid amount '{}'", amount))?;
    if amount.is_sign_negative() {
        anyhow::bail!("Amount must not be negative; use --kind to record income or savings");
    }

    let kind = TransactionType::from_str(kind).map_err(|e| anyhow::anyhow!(e))?;
    if kind == TransactionType::System {
        anyhow::bail!("System transactions are recorded automatically");
    }

    let date = match date {
        // Noon keeps the day stable across time zones
        Some(d) => parse_date(d)?
            .and_hms_opt(12, 0, 0)
            .context("Invalid time of day")?,
        None => now(),
    };

    let mut tx = NewTransaction::expense(user_id, amount, category.trim(), description.trim(), date);
    tx.transaction_type = kind;
    tx.location = location.map(str::to_string);
    Ok(tx)
}

#[allow(clippy::too_many_arguments)]
pub fn cmd_tx_add(
    db: &Database,
    username: &str,
    amount: &str,
    category: &str,
    description: &str,
    date: Option<&str>,
    kind: &str,
    location: Option<&str>,
) -> Result<()> {
    let user = find_user(db, username)?;
    let tx = new_transaction(user.id, amount, category, description, date, kind, location)?;
    let id = db
        .insert_transaction(&tx)
        .context("Failed to record transaction")?;

    println!(
        "✅ Recorded {} #{}: R$ {:.2} │ {} │ {}",
        tx.transaction_type, id, tx.amount, tx.category, tx.description
    );
    Ok(())
}

pub fn cmd_tx_list(db: &Database, username: &str, limit: i64) -> Result<()> {
    let user = find_user(db, username)?;
    let transactions = db.list_transactions(user.id, limit)?;

    if transactions.is_empty() {
        println!("No transactions found. Record one with:");
        println!(
            "  concierge tx add --user {} 120.00 restaurant \"Fasano\"",
            user.username
        );
        return Ok(());
    }

    println!();
    println!("📝 Recent Transactions");
    println!("   ─────────────────────────────────────────────────────────────");

    for tx in transactions {
        let amount_str = match tx.transaction_type {
            TransactionType::Expense => format!("\x1b[31mR$ {:.2}\x1b[0m", tx.amount), // Red for expenses
            TransactionType::System => "-".to_string(),
            _ => format!("\x1b[32m+R$ {:.2}\x1b[0m", tx.amount), // Green for income and savings
        };

        println!(
            "   {} │ {:>12} │ {:<12} │ {}",
            tx.date.format("%Y-%m-%d"),
            amount_str,
            truncate(&tx.category, 12),
            truncate(&tx.description, 40)
        );
    }

    Ok(())
}
