//! 记账数据访问对象

use super::validate_day;
use crate::database::now_rfc3339;
use crate::errors::DaoError;
use crate::pricing::round_money;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Income,
    Expense,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountingEntry {
    pub id: i64,
    pub kind: EntryKind,
    pub amount: f64,
    pub description: String,
    pub category: String,
    pub entry_date: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAccountingEntry {
    pub kind: EntryKind,
    pub amount: f64,
    #[serde(default)]
    pub description: String,
    pub category: Option<String>,
    pub entry_date: String,
}

/// 日期区间，两端均为闭区间
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DateRange {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct AccountingSummary {
    pub income: f64,
    pub expense: f64,
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountingReport {
    pub entries: Vec<AccountingEntry>,
    pub summary: AccountingSummary,
}

fn from_row(row: &Row<'_>) -> Result<AccountingEntry, rusqlite::Error> {
    let kind: String = row.get(1)?;
    let kind = match kind.as_str() {
        "income" => EntryKind::Income,
        "expense" => EntryKind::Expense,
        _ => {
            return Err(rusqlite::Error::InvalidColumnType(
                1,
                "kind".into(),
                rusqlite::types::Type::Text,
            ))
        }
    };
    Ok(AccountingEntry {
        id: row.get(0)?,
        kind,
        amount: row.get(2)?,
        description: row.get(3)?,
        category: row.get(4)?,
        entry_date: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// 汇总收入、支出与结余
pub fn summarize(entries: &[AccountingEntry]) -> AccountingSummary {
    let (income, expense) = entries.iter().fold((0.0, 0.0), |(inc, exp), e| match e.kind {
        EntryKind::Income => (inc + e.amount, exp),
        EntryKind::Expense => (inc, exp + e.amount),
    });
    AccountingSummary {
        income: round_money(income),
        expense: round_money(expense),
        balance: round_money(income - expense),
    }
}

pub struct AccountingDao;

impl AccountingDao {
    pub fn list(conn: &Connection, range: &DateRange) -> Result<AccountingReport, DaoError> {
        if let Some(from) = &range.from {
            validate_day(from)?;
        }
        if let Some(to) = &range.to {
            validate_day(to)?;
        }
        let mut stmt = conn.prepare(
            "SELECT id, kind, amount, description, category, entry_date, created_at
             FROM accounting_entries
             WHERE (?1 IS NULL OR entry_date >= ?1)
               AND (?2 IS NULL OR entry_date <= ?2)
             ORDER BY entry_date DESC, id DESC",
        )?;
        let entries = stmt
            .query_map(params![range.from, range.to], from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        let summary = summarize(&entries);
        Ok(AccountingReport { entries, summary })
    }

    pub fn create(conn: &Connection, entry: &NewAccountingEntry) -> Result<AccountingEntry, DaoError> {
        if !(entry.amount > 0.0) {
            return Err(DaoError::invalid("金额必须大于 0"));
        }
        validate_day(&entry.entry_date)?;
        let category = entry
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or("general")
            .to_string();
        let now = now_rfc3339();
        conn.execute(
            "INSERT INTO accounting_entries (kind, amount, description, category, entry_date, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![entry.kind.as_str(), entry.amount, entry.description, category, entry.entry_date, now],
        )?;
        Ok(AccountingEntry {
            id: conn.last_insert_rowid(),
            kind: entry.kind,
            amount: entry.amount,
            description: entry.description.clone(),
            category,
            entry_date: entry.entry_date.clone(),
            created_at: now,
        })
    }

    pub fn delete(conn: &Connection, id: i64) -> Result<(), DaoError> {
        let changed = conn.execute("DELETE FROM accounting_entries WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(DaoError::not_found(format!("账目 {id}")));
        }
        Ok(())
    }
}
