//! SQLite repository adapter.
#![allow(clippy::collapsible_if)]

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::str::FromStr;

use delivery_types::{
    Company, CompanyId, CompanyRepository, CreateCompanyRequest, ListParcelsQuery, NewParcel,
    Parcel, ParcelId, ParcelRepository, ParcelType, ParcelTypeId, ParcelWithType, RepoError,
    SessionId,
};

use crate::types::{
    DbCompany, DbParcelType, PARCEL_COLUMNS, SqliteParcelRow, SqliteParcelWithTypeRow,
    format_timestamp, map_db_error,
};

// ─────────────────────────────────────────────────────────────────────────────
// SQLite Repository
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite repository implementation.
pub struct SqliteRepo {
    pool: SqlitePool,
}

/// Executes SQL statements from a migration file, splitting by semicolons.
async fn execute_migration(pool: &SqlitePool, sql: &str, name: &str) -> anyhow::Result<()> {
    for statement in sql.split(';') {
        let stmt = statement.trim();
        if !stmt.is_empty() {
            sqlx::query(stmt)
                .execute(pool)
                .await
                .map_err(|e| anyhow::anyhow!("Migration {} failed: {}", name, e))?;
        }
    }
    Ok(())
}

async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    execute_migration(
        pool,
        include_str!("../migrations/0001_create_tables.sql"),
        "0001",
    )
    .await?;

    execute_migration(
        pool,
        include_str!("../migrations/0002_seed_parcel_types.sql"),
        "0002",
    )
    .await?;

    Ok(())
}

impl SqliteRepo {
    /// Creates a new SQLite repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Ensure on-disk SQLite target directory exists (no-op for in-memory).
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            let path = path.split('?').next().unwrap_or(path);
            if path != ":memory:" {
                let p = std::path::Path::new(path);
                if let Some(parent) = p.parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to `:memory:` opens a separate database, and the
        // database is gone once its only connection closes.
        let pool_options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options.connect_with(options).await?;

        run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Loads a single parcel regardless of session.
    pub async fn get_parcel(&self, id: ParcelId) -> Result<Option<Parcel>, RepoError> {
        let sql = format!("SELECT {} FROM parcels p WHERE p.id = ?", PARCEL_COLUMNS);
        let row: Option<SqliteParcelRow> = sqlx::query_as(&sql)
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        row.map(SqliteParcelRow::into_domain).transpose()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Parcels
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl ParcelRepository for SqliteRepo {
    #[tracing::instrument(skip(self, parcel), fields(session_id = %parcel.session_id))]
    async fn create_parcel(&self, parcel: NewParcel) -> Result<ParcelId, RepoError> {
        let now = format_timestamp(chrono::Utc::now());

        let result = sqlx::query(
            r#"INSERT INTO parcels (session_id, name, weight, type_id, content_value_usd, delivery_price, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, NULL, ?, ?)"#,
        )
        .bind(parcel.session_id.as_str())
        .bind(&parcel.name)
        .bind(parcel.weight)
        .bind(parcel.type_id.value())
        .bind(parcel.content_value_usd)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(ParcelId::new(result.last_insert_rowid()))
    }

    async fn find_by_name_and_session(
        &self,
        name: &str,
        session_id: &SessionId,
    ) -> Result<Option<Parcel>, RepoError> {
        let sql = format!(
            "SELECT {} FROM parcels p WHERE p.name = ? AND p.session_id = ?",
            PARCEL_COLUMNS
        );
        let row: Option<SqliteParcelRow> = sqlx::query_as(&sql)
            .bind(name)
            .bind(session_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        row.map(SqliteParcelRow::into_domain).transpose()
    }

    async fn get_by_id_and_session(
        &self,
        id: ParcelId,
        session_id: &SessionId,
    ) -> Result<Option<ParcelWithType>, RepoError> {
        let sql = format!(
            "SELECT {}, t.name AS type_name FROM parcels p \
             JOIN parcel_types t ON t.id = p.type_id \
             WHERE p.id = ? AND p.session_id = ?",
            PARCEL_COLUMNS
        );
        let row: Option<SqliteParcelWithTypeRow> = sqlx::query_as(&sql)
            .bind(id.value())
            .bind(session_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        row.map(SqliteParcelWithTypeRow::into_domain).transpose()
    }

    async fn list_by_filters(
        &self,
        session_id: &SessionId,
        query: &ListParcelsQuery,
    ) -> Result<Vec<ParcelWithType>, RepoError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {}, t.name AS type_name FROM parcels p \
             JOIN parcel_types t ON t.id = p.type_id WHERE p.session_id = ",
            PARCEL_COLUMNS
        ));
        qb.push_bind(session_id.as_str().to_string());

        if let Some(type_id) = query.type_id {
            qb.push(" AND p.type_id = ").push_bind(type_id.value());
        }
        match query.has_delivery_cost {
            Some(true) => {
                qb.push(" AND p.delivery_price IS NOT NULL");
            }
            Some(false) => {
                qb.push(" AND p.delivery_price IS NULL");
            }
            None => {}
        }

        qb.push(" ORDER BY p.created_at DESC, p.id DESC LIMIT ")
            .push_bind(query.limit)
            .push(" OFFSET ")
            .push_bind(query.offset);

        let rows: Vec<SqliteParcelWithTypeRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        rows.into_iter()
            .map(SqliteParcelWithTypeRow::into_domain)
            .collect()
    }

    async fn list_parcel_types(&self) -> Result<Vec<ParcelType>, RepoError> {
        let rows: Vec<DbParcelType> =
            sqlx::query_as(r#"SELECT id, name FROM parcel_types ORDER BY id"#)
                .fetch_all(&self.pool)
                .await
                .map_err(map_db_error)?;

        Ok(rows.into_iter().map(ParcelType::from).collect())
    }

    async fn get_parcel_type(&self, id: ParcelTypeId) -> Result<Option<ParcelType>, RepoError> {
        let row: Option<DbParcelType> =
            sqlx::query_as(r#"SELECT id, name FROM parcel_types WHERE id = ?"#)
                .bind(id.value())
                .fetch_optional(&self.pool)
                .await
                .map_err(map_db_error)?;

        Ok(row.map(ParcelType::from))
    }

    async fn get_unpriced_parcels(&self) -> Result<Vec<Parcel>, RepoError> {
        let sql = format!(
            "SELECT {} FROM parcels p WHERE p.delivery_price IS NULL ORDER BY p.id",
            PARCEL_COLUMNS
        );
        let rows: Vec<SqliteParcelRow> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        rows.into_iter().map(SqliteParcelRow::into_domain).collect()
    }

    async fn persist(&self, parcel: &Parcel) -> Result<(), RepoError> {
        let result =
            sqlx::query(r#"UPDATE parcels SET delivery_price = ?, updated_at = ? WHERE id = ?"#)
                .bind(parcel.delivery_price)
                .bind(format_timestamp(parcel.updated_at))
                .bind(parcel.id.value())
                .execute(&self.pool)
                .await
                .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn bind_company(
        &self,
        parcel_id: ParcelId,
        company_id: CompanyId,
    ) -> Result<bool, RepoError> {
        let now = format_timestamp(chrono::Utc::now());

        let result = sqlx::query(
            r#"UPDATE parcels SET company_id = ?, updated_at = ?
               WHERE id = ? AND company_id IS NULL"#,
        )
        .bind(company_id.value())
        .bind(&now)
        .bind(parcel_id.value())
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.rows_affected() > 0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Companies
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl CompanyRepository for SqliteRepo {
    async fn create_company(&self, req: CreateCompanyRequest) -> Result<Company, RepoError> {
        let name = req.name.trim().to_string();
        Company::validate_name(&name)?;

        let result = sqlx::query(r#"INSERT INTO companies (name) VALUES (?)"#)
            .bind(&name)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(Company {
            id: CompanyId::new(result.last_insert_rowid()),
            name,
        })
    }

    async fn list_companies(&self) -> Result<Vec<Company>, RepoError> {
        let rows: Vec<DbCompany> = sqlx::query_as(r#"SELECT id, name FROM companies ORDER BY id"#)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(rows.into_iter().map(Company::from).collect())
    }

    async fn get_company(&self, id: CompanyId) -> Result<Option<Company>, RepoError> {
        let row: Option<DbCompany> = sqlx::query_as(r#"SELECT id, name FROM companies WHERE id = ?"#)
            .bind(id.value())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(row.map(Company::from))
    }
}
