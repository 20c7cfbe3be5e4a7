// src/store/tenants.rs

use sqlx::{Row, SqlitePool};

use crate::error::StoreError;

use super::types::Tenant;

pub struct TenantOperations {
    pool: SqlitePool,
}

impl TenantOperations {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn add_tenant(
        &self,
        api_id: Option<i64>,
        api_hash: Option<&str>,
        phone: &str,
        session_name: &str,
    ) -> Result<i64, StoreError> {
        let result = sqlx::query(
            r#"INSERT INTO tenants (api_id, api_hash, phone, session_name, is_active)
               VALUES (?, ?, ?, ?, 1)"#,
        )
        .bind(api_id)
        .bind(api_hash)
        .bind(phone)
        .bind(session_name)
        .execute(&self.pool)
        .await
        .map_err(StoreError::Query)?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_tenants(&self, active_only: bool) -> Result<Vec<Tenant>, StoreError> {
        let query = if active_only {
            "SELECT * FROM tenants WHERE is_active = 1 ORDER BY created_at"
        } else {
            "SELECT * FROM tenants ORDER BY created_at"
        };
        let rows = sqlx::query(query).fetch_all(&self.pool).await.map_err(StoreError::Query)?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let is_active: i64 = row.get("is_active");
                Tenant {
                    id: row.get("id"),
                    api_id: row.get("api_id"),
                    api_hash: row.get("api_hash"),
                    phone: row.get("phone"),
                    session_name: row.get("session_name"),
                    is_active: is_active != 0,
                    created_at: row.get("created_at"),
                }
            })
            .collect())
    }

    pub async fn set_tenant_active(&self, tenant_id: i64, is_active: bool) -> Result<(), StoreError> {
        sqlx::query("UPDATE tenants SET is_active = ? WHERE id = ?")
            .bind(is_active as i64)
            .bind(tenant_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::Query)?;
        Ok(())
    }
}
