//! Transaction store
//!
//! Pattern queries skip `system` records so profile audits never look like
//! spending habits.

use std::str::FromStr;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};

use super::{format_datetime, parse_datetime, parse_naive_datetime, Database};
use crate::analyzer::RecurringGroup;
use crate::error::{Error, Result};
use crate::models::{NewTransaction, Transaction, TransactionType};

const TRANSACTION_COLUMNS: &str =
    "id, user_id, amount, type, category, description, date, location, metadata, created_at";

fn row_to_transaction(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let amount: String = row.get(2)?;
    let amount = Decimal::from_str(&amount)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
    let tx_type: String = row.get(3)?;
    let date: String = row.get(6)?;
    let metadata: Option<String> = row.get(8)?;
    let created_at: String = row.get(9)?;

    Ok(Transaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        amount,
        transaction_type: tx_type.parse().unwrap_or_default(),
        category: row.get(4)?,
        description: row.get(5)?,
        date: parse_naive_datetime(&date),
        location: row.get(7)?,
        metadata: metadata.and_then(|m| serde_json::from_str(&m).ok()),
        created_at: parse_datetime(&created_at),
    })
}

/// Insert on an existing connection, so callers can batch it with other writes
pub(super) fn insert_transaction_on(conn: &Connection, tx: &NewTransaction) -> Result<i64> {
    if tx.category.trim().is_empty() {
        return Err(Error::InvalidData("category must not be empty".to_string()));
    }

    let metadata = tx
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.execute(
        r#"
        INSERT INTO transactions (user_id, amount, type, category, description, date, location, metadata)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            tx.user_id,
            tx.amount.round_dp(2).to_string(),
            tx.transaction_type.as_str(),
            tx.category.trim(),
            tx.description.trim(),
            format_datetime(tx.date),
            tx.location,
            metadata,
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

impl Database {
    pub fn insert_transaction(&self, tx: &NewTransaction) -> Result<i64> {
        let conn = self.conn()?;
        insert_transaction_on(&conn, tx)
    }

    pub fn get_transaction(&self, id: i64) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM transactions WHERE id = ?", TRANSACTION_COLUMNS);
        match conn.query_row(&sql, params![id], row_to_transaction) {
            Ok(tx) => Ok(Some(tx)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Newest first, including audit records
    pub fn list_transactions(&self, user_id: i64, limit: i64) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM transactions WHERE user_id = ? ORDER BY date DESC, id DESC LIMIT ?",
            TRANSACTION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let txs = stmt
            .query_map(params![user_id, limit], row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(txs)
    }

    /// Non-system transactions with `start <= date < end`, oldest first
    pub fn list_transactions_between(
        &self,
        user_id: i64,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM transactions
            WHERE user_id = ? AND type != 'system' AND date >= ? AND date < ?
            ORDER BY date ASC, id ASC
            "#,
            TRANSACTION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let txs = stmt
            .query_map(
                params![user_id, format_datetime(start), format_datetime(end)],
                row_to_transaction,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(txs)
    }

    /// Non-system transactions since `since`, newest first, capped at `limit`
    pub fn recent_transactions(
        &self,
        user_id: i64,
        since: NaiveDateTime,
        limit: i64,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM transactions
            WHERE user_id = ? AND type != 'system' AND date >= ?
            ORDER BY date DESC, id DESC
            LIMIT ?
            "#,
            TRANSACTION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let txs = stmt
            .query_map(
                params![user_id, format_datetime(since), limit],
                row_to_transaction,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(txs)
    }

    /// All transactions for a category, optionally narrowed to one description.
    /// Oldest first.
    pub fn list_transactions_matching(
        &self,
        user_id: i64,
        category: &str,
        description: Option<&str>,
    ) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM transactions
            WHERE user_id = ? AND type != 'system' AND category = ?
            AND (? IS NULL OR description = ?)
            ORDER BY date ASC, id ASC
            "#,
            TRANSACTION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let txs = stmt
            .query_map(
                params![user_id, category, description, description],
                row_to_transaction,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(txs)
    }

    /// Every non-system transaction for a user, oldest first
    pub fn list_all_spending(&self, user_id: i64) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM transactions WHERE user_id = ? AND type != 'system' ORDER BY date ASC, id ASC",
            TRANSACTION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let txs = stmt
            .query_map(params![user_id], row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(txs)
    }

    /// (category, description) groups with at least `min_count` occurrences
    /// on or after `since`, with the date of the most recent occurrence
    pub fn recurring_groups(
        &self,
        user_id: i64,
        since: NaiveDateTime,
        min_count: u32,
    ) -> Result<Vec<RecurringGroup>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT category, description, COUNT(*) AS frequency, MAX(date) AS last_date
            FROM transactions
            WHERE user_id = ? AND type != 'system' AND date >= ?
            GROUP BY category, description
            HAVING COUNT(*) >= ?
            ORDER BY frequency DESC, category, description
            "#,
        )?;
        let groups = stmt
            .query_map(params![user_id, format_datetime(since), min_count], |row| {
                let last: String = row.get(3)?;
                Ok(RecurringGroup {
                    category: row.get(0)?,
                    description: row.get(1)?,
                    count: row.get(2)?,
                    last_date: parse_naive_datetime(&last).date(),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(groups)
    }

    pub fn delete_transaction(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM transactions WHERE id = ?", params![id])?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("transaction {}", id)));
        }
        Ok(())
    }

    /// Count and sum of expenses with `date >= since`
    pub fn spending_since(&self, user_id: i64, since: NaiveDateTime) -> Result<(i64, Decimal)> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT amount FROM transactions WHERE user_id = ? AND type = ? AND date >= ?",
        )?;
        let amounts = stmt
            .query_map(
                params![
                    user_id,
                    TransactionType::Expense.as_str(),
                    format_datetime(since)
                ],
                |row| row.get::<_, String>(0),
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let total = amounts
            .iter()
            .filter_map(|a| Decimal::from_str(a).ok())
            .sum::<Decimal>();
        Ok((amounts.len() as i64, total))
    }
}
