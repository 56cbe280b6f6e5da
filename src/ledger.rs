//! Income/expense ledger.
//!
//! Amounts are whole Chilean pesos. The server stamps the date at creation;
//! clients never supply it.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::storage::{Store, StoreResult};

pub const CATEGORY_MAX_CHARS: usize = 50;
pub const NOTE_MAX_CHARS: usize = 200;
/// Largest single amount accepted from clients, in pesos.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000_000;
pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxKind {
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "OUT")]
    Out,
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::In => "IN",
            TxKind::Out => "OUT",
        }
    }

    /// Spanish label used by the pages.
    pub fn label(&self) -> &'static str {
        match self {
            TxKind::In => "Ingreso",
            TxKind::Out => "Egreso",
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for TxKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN" => Ok(TxKind::In),
            "OUT" => Ok(TxKind::Out),
            other => Err(format!("unknown transaction kind {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: TxKind,
    pub amount: i64,
    pub category: Option<String>,
    pub note: Option<String>,
    pub date: DateTime<Utc>,
}

/// A validated transaction waiting for its id and date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub kind: TxKind,
    pub amount: i64,
    pub category: Option<String>,
    pub note: Option<String>,
}

/// One validation problem, keyed by the offending field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub path: String,
    pub message: String,
}

impl Issue {
    fn new(path: &str, message: impl Into<String>) -> Self {
        Self { path: path.to_string(), message: message.into() }
    }
}

/// Raw create request as sent by the add form. Every field is optional at this
/// stage; `validate` decides what is acceptable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePayload {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

impl CreatePayload {
    pub fn validate(self) -> Result<NewTransaction, Vec<Issue>> {
        let mut issues = Vec::new();

        let kind = match self.kind.as_deref().map(TxKind::from_str) {
            Some(Ok(k)) => Some(k),
            Some(Err(_)) => { issues.push(Issue::new("type", "expected 'IN' or 'OUT'")); None }
            None => { issues.push(Issue::new("type", "required")); None }
        };

        let amount = match parse_amount(self.amount.as_ref()) {
            Ok(a) if a > MAX_AMOUNT => { issues.push(Issue::new("amount", format!("must be at most {MAX_AMOUNT}"))); None }
            Ok(a) if a > 0 => Some(a),
            Ok(_) => { issues.push(Issue::new("amount", "must be greater than 0")); None }
            Err(msg) => { issues.push(Issue::new("amount", msg)); None }
        };

        let category = optional_text(self.category, "category", CATEGORY_MAX_CHARS, &mut issues);
        let note = optional_text(self.note, "note", NOTE_MAX_CHARS, &mut issues);

        match (kind, amount) {
            (Some(kind), Some(amount)) if issues.is_empty() => Ok(NewTransaction { kind, amount, category, note }),
            _ => Err(issues),
        }
    }
}

/// Accept a JSON number or a numeric string; fractions are rejected.
fn parse_amount(v: Option<&Value>) -> Result<i64, &'static str> {
    match v {
        None | Some(Value::Null) => Err("required"),
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
            match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(f as i64),
                _ => Err("must be a whole number of pesos"),
            }
        }
        Some(Value::String(s)) => s.trim().parse::<i64>().map_err(|_| "must be a whole number of pesos"),
        Some(_) => Err("expected number"),
    }
}

fn optional_text(v: Option<String>, field: &str, max: usize, issues: &mut Vec<Issue>) -> Option<String> {
    let s = v?;
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().count() > max {
        issues.push(Issue::new(field, format!("at most {max} characters")));
        return None;
    }
    Some(s.to_string())
}

/// Query-string paging as sent by clients; anything unparsable falls back to defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageRequest {
    pub page: Option<String>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<String>,
}

impl PageRequest {
    /// Returns `(page, page_size)` with page ≥ 1 and 1 ≤ page_size ≤ MAX_PAGE_SIZE.
    pub fn normalize(&self) -> (i64, i64) {
        let page = self.page.as_deref().and_then(|p| p.trim().parse::<i64>().ok()).unwrap_or(1).max(1);
        let size = self
            .page_size
            .as_deref()
            .and_then(|p| p.trim().parse::<i64>().ok())
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        (page, size)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub pages: i64,
}

/// Σ IN − Σ OUT for one user, saturated to the `i64` range.
pub fn balance(store: &Store, user_id: &str) -> StoreResult<i64> {
    let ins = store.sum_amount(user_id, TxKind::In)?;
    let outs = store.sum_amount(user_id, TxKind::Out)?;
    let diff = ins - outs;
    Ok(i64::try_from(diff).unwrap_or(if diff < 0 { i64::MIN } else { i64::MAX }))
}

pub fn list_page(store: &Store, user_id: &str, page: i64, page_size: i64) -> StoreResult<Page<Transaction>> {
    let total = store.count_transactions(user_id)?;
    let offset = (page - 1).saturating_mul(page_size);
    let data = store.list_transactions(user_id, offset, page_size)?;
    let pages = if total == 0 { 0 } else { (total + page_size - 1) / page_size };
    Ok(Page { data, page, page_size, total, pages })
}

pub fn recent(store: &Store, user_id: &str, limit: i64) -> StoreResult<Vec<Transaction>> {
    store.list_transactions(user_id, 0, limit)
}

pub fn record(store: &Store, user_id: &str, new: NewTransaction) -> StoreResult<Transaction> {
    record_at(store, user_id, new, Utc::now())
}

pub(crate) fn record_at(store: &Store, user_id: &str, new: NewTransaction, date: DateTime<Utc>) -> StoreResult<Transaction> {
    let tx = Transaction {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        kind: new.kind,
        amount: new.amount,
        category: new.category,
        note: new.note,
        date,
    };
    store.insert_transaction(&tx)?;
    tracing::debug!(user_id, id = %tx.id, kind = %tx.kind, amount = tx.amount, "transaction recorded");
    Ok(tx)
}
