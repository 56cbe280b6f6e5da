use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Row};

use super::{Store, StoreResult};
use crate::ledger::{Transaction, TxKind};

fn map_transaction(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let kind: String = row.get(2)?;
    let kind = kind
        .parse::<TxKind>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, e.into()))?;
    let date_ms: i64 = row.get(6)?;
    let date = DateTime::<Utc>::from_timestamp_millis(date_ms)
        .ok_or_else(|| rusqlite::Error::FromSqlConversionFailure(6, Type::Integer, "timestamp out of range".into()))?;
    Ok(Transaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind,
        amount: row.get(3)?,
        category: row.get(4)?,
        note: row.get(5)?,
        date,
    })
}

impl Store {
    pub fn insert_transaction(&self, tx: &Transaction) -> StoreResult<()> {
        self.conn().execute(
            "INSERT INTO transactions (id, user_id, kind, amount, category, note, date) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                tx.id,
                tx.user_id,
                tx.kind.as_str(),
                tx.amount,
                tx.category,
                tx.note,
                tx.date.timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    /// Sum of amounts of one kind for a user; 0 when there are none.
    ///
    /// SQLite's integer `SUM` errors on overflow, so the amounts are summed in
    /// two halves (millions and remainder) and recombined as `i128`.
    pub fn sum_amount(&self, user_id: &str, kind: TxKind) -> StoreResult<i128> {
        let (high, low): (i64, i64) = self.conn().query_row(
            "SELECT COALESCE(SUM(amount / 1000000), 0), COALESCE(SUM(amount % 1000000), 0) \
             FROM transactions WHERE user_id = ?1 AND kind = ?2",
            params![user_id, kind.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(i128::from(high) * 1_000_000 + i128::from(low))
    }

    pub fn count_transactions(&self, user_id: &str) -> StoreResult<i64> {
        let n: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM transactions WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(n)
    }

    /// Newest first. Ties on `date` fall back to insertion order, newest first.
    pub fn list_transactions(&self, user_id: &str, offset: i64, limit: i64) -> StoreResult<Vec<Transaction>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, user_id, kind, amount, category, note, date FROM transactions \
             WHERE user_id = ?1 ORDER BY date DESC, rowid DESC LIMIT ?2 OFFSET ?3",
        )?;
        let rows = stmt
            .query_map(params![user_id, limit, offset.max(0)], map_transaction)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoreError;

    fn tx(id: &str, user_id: &str, kind: TxKind, amount: i64, ms: i64) -> Transaction {
        Transaction {
            id: id.into(),
            user_id: user_id.into(),
            kind,
            amount,
            category: Some("Sueldo".into()),
            note: None,
            date: DateTime::<Utc>::from_timestamp_millis(ms).unwrap(),
        }
    }

    #[test]
    fn insert_and_read_back_round_trips_fields() {
        let store = Store::open_in_memory().unwrap();
        let u = store.insert_user("111111111", "x").unwrap();
        let t = tx("t1", &u.id, TxKind::In, 1500, 1_700_000_000_123);
        store.insert_transaction(&t).unwrap();
        assert_eq!(store.list_transactions(&u.id, 0, 10).unwrap(), vec![t]);
    }

    #[test]
    fn same_timestamp_orders_by_insertion() {
        let store = Store::open_in_memory().unwrap();
        let u = store.insert_user("111111111", "x").unwrap();
        store.insert_transaction(&tx("a", &u.id, TxKind::In, 1, 1000)).unwrap();
        store.insert_transaction(&tx("b", &u.id, TxKind::In, 2, 1000)).unwrap();
        let ids: Vec<String> = store.list_transactions(&u.id, 0, 10).unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn unknown_owner_is_rejected_by_foreign_key() {
        let store = Store::open_in_memory().unwrap();
        let err = store.insert_transaction(&tx("t1", "ghost", TxKind::Out, 1, 0)).unwrap_err();
        assert!(matches!(err, StoreError::Sqlite(_)));
    }

    #[test]
    fn sums_split_by_kind() {
        let store = Store::open_in_memory().unwrap();
        let u = store.insert_user("111111111", "x").unwrap();
        store.insert_transaction(&tx("a", &u.id, TxKind::In, 10, 1)).unwrap();
        store.insert_transaction(&tx("b", &u.id, TxKind::Out, 4, 2)).unwrap();
        store.insert_transaction(&tx("c", &u.id, TxKind::In, 5, 3)).unwrap();
        assert_eq!(store.sum_amount(&u.id, TxKind::In).unwrap(), 15);
        assert_eq!(store.sum_amount(&u.id, TxKind::Out).unwrap(), 4);
        assert_eq!(store.count_transactions(&u.id).unwrap(), 3);
    }

    #[test]
    fn sums_past_i64_range_do_not_error() {
        let store = Store::open_in_memory().unwrap();
        let u = store.insert_user("111111111", "x").unwrap();
        store.insert_transaction(&tx("a", &u.id, TxKind::In, i64::MAX, 1)).unwrap();
        store.insert_transaction(&tx("b", &u.id, TxKind::In, 1_234_567, 2)).unwrap();
        assert_eq!(store.sum_amount(&u.id, TxKind::In).unwrap(), i128::from(i64::MAX) + 1_234_567);
        assert_eq!(store.sum_amount(&u.id, TxKind::Out).unwrap(), 0);
    }
}
