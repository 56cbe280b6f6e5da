use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use super::{map_constraint, Store, StoreError, StoreResult};
use crate::identity::Identity;
use crate::rut;

fn map_identity(row: &Row<'_>) -> rusqlite::Result<Identity> {
    Ok(Identity {
        id: row.get(0)?,
        rut: row.get(1)?,
        password_hash: row.get(2)?,
    })
}

impl Store {
    /// Exact match on the stored `rut` column. Callers decide which surface form to ask for.
    pub fn find_user_by_rut(&self, rut: &str) -> StoreResult<Option<Identity>> {
        let found = self
            .conn()
            .query_row(
                "SELECT id, rut, password_hash FROM users WHERE rut = ?1",
                params![rut],
                map_identity,
            )
            .optional()?;
        Ok(found)
    }

    /// Rewrite one user's stored identifier. Returns whether a row was touched.
    pub fn update_user_rut(&self, id: &str, rut: &str) -> StoreResult<bool> {
        let n = self
            .conn()
            .execute("UPDATE users SET rut = ?1 WHERE id = ?2", params![rut, id])
            .map_err(|e| map_constraint(e, rut))?;
        Ok(n > 0)
    }

    pub fn insert_user(&self, rut: &str, password_hash: &str) -> StoreResult<Identity> {
        let id = Uuid::new_v4().to_string();
        let now_ms = chrono::Utc::now().timestamp_millis();
        self.conn()
            .execute(
                "INSERT INTO users (id, rut, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![id, rut, password_hash, now_ms],
            )
            .map_err(|e| map_constraint(e, rut))?;
        Ok(Identity { id, rut: rut.to_string(), password_hash: password_hash.to_string() })
    }

    /// Look a canonical RUT up under its canonical form, then its legacy dotted form.
    pub fn find_user_by_canonical_rut(&self, canonical: &str) -> StoreResult<Option<Identity>> {
        if let Some(found) = self.find_user_by_rut(canonical)? {
            return Ok(Some(found));
        }
        self.find_user_by_rut(&rut::format_legacy(canonical))
    }

    /// Insert a new identity under its canonical RUT, refusing when the same
    /// RUT is already stored in either form.
    pub fn create_user(&self, canonical: &str, password_hash: &str) -> StoreResult<Identity> {
        if let Some(existing) = self.find_user_by_canonical_rut(canonical)? {
            return Err(StoreError::Duplicate(existing.rut));
        }
        self.insert_user(canonical, password_hash)
    }

    pub fn set_password_hash(&self, id: &str, password_hash: &str) -> StoreResult<bool> {
        let n = self
            .conn()
            .execute("UPDATE users SET password_hash = ?1 WHERE id = ?2", params![password_hash, id])?;
        Ok(n > 0)
    }
}
