//! PostgreSQL repository adapter.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder};

use delivery_types::{
    Company, CompanyId, CompanyRepository, CreateCompanyRequest, ListParcelsQuery, NewParcel,
    Parcel, ParcelId, ParcelRepository, ParcelType, ParcelTypeId, ParcelWithType, RepoError,
    SessionId,
};

use crate::types::{
    DbCompany, DbParcelType, PARCEL_COLUMNS, PgParcelRow, PgParcelWithTypeRow, map_db_error,
};

// ─────────────────────────────────────────────────────────────────────────────
// PostgreSQL Repository
// ─────────────────────────────────────────────────────────────────────────────

/// PostgreSQL repository.
///
/// Company binding relies on a conditional `UPDATE`, which row locks make
/// atomic under concurrent writers.
pub struct PostgresRepo {
    pool: PgPool,
}

/// Executes SQL statements from a migration file, splitting by semicolons.
async fn execute_migration(pool: &PgPool, sql: &str, name: &str) -> Result<(), anyhow::Error> {
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

/// Runs all database migrations.
async fn run_migrations(pool: &PgPool) -> Result<(), anyhow::Error> {
    execute_migration(
        pool,
        include_str!("../migrations/0001_create_tables_pg.sql"),
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

impl PostgresRepo {
    /// Creates a new PostgreSQL repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Parcels
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl ParcelRepository for PostgresRepo {
    #[tracing::instrument(skip(self, parcel), fields(session_id = %parcel.session_id))]
    async fn create_parcel(&self, parcel: NewParcel) -> Result<ParcelId, RepoError> {
        let now = Utc::now();

        let id: i64 = sqlx::query_scalar(
            r#"INSERT INTO parcels (session_id, name, weight, type_id, content_value_usd, delivery_price, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, NULL, $6, $6)
               RETURNING id"#,
        )
        .bind(parcel.session_id.as_str())
        .bind(&parcel.name)
        .bind(parcel.weight)
        .bind(parcel.type_id.value())
        .bind(parcel.content_value_usd)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(ParcelId::new(id))
    }

    async fn find_by_name_and_session(
        &self,
        name: &str,
        session_id: &SessionId,
    ) -> Result<Option<Parcel>, RepoError> {
        let sql = format!(
            "SELECT {} FROM parcels p WHERE p.name = $1 AND p.session_id = $2",
            PARCEL_COLUMNS
        );
        let row: Option<PgParcelRow> = sqlx::query_as(&sql)
            .bind(name)
            .bind(session_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        row.map(PgParcelRow::into_domain).transpose()
    }

    async fn get_by_id_and_session(
        &self,
        id: ParcelId,
        session_id: &SessionId,
    ) -> Result<Option<ParcelWithType>, RepoError> {
        let sql = format!(
            "SELECT {}, t.name AS type_name FROM parcels p \
             JOIN parcel_types t ON t.id = p.type_id \
             WHERE p.id = $1 AND p.session_id = $2",
            PARCEL_COLUMNS
        );
        let row: Option<PgParcelWithTypeRow> = sqlx::query_as(&sql)
            .bind(id.value())
            .bind(session_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)?;

        row.map(PgParcelWithTypeRow::into_domain).transpose()
    }

    async fn list_by_filters(
        &self,
        session_id: &SessionId,
        query: &ListParcelsQuery,
    ) -> Result<Vec<ParcelWithType>, RepoError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
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

        let rows: Vec<PgParcelWithTypeRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        rows.into_iter().map(PgParcelWithTypeRow::into_domain).collect()
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
            sqlx::query_as(r#"SELECT id, name FROM parcel_types WHERE id = $1"#)
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
        let rows: Vec<PgParcelRow> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        rows.into_iter().map(PgParcelRow::into_domain).collect()
    }

    async fn persist(&self, parcel: &Parcel) -> Result<(), RepoError> {
        let result =
            sqlx::query(r#"UPDATE parcels SET delivery_price = $1, updated_at = $2 WHERE id = $3"#)
                .bind(parcel.delivery_price)
                .bind(parcel.updated_at)
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
        let result = sqlx::query(
            r#"UPDATE parcels SET company_id = $1, updated_at = $2
               WHERE id = $3 AND company_id IS NULL"#,
        )
        .bind(company_id.value())
        .bind(Utc::now())
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
impl CompanyRepository for PostgresRepo {
    async fn create_company(&self, req: CreateCompanyRequest) -> Result<Company, RepoError> {
        let name = req.name.trim().to_string();
        Company::validate_name(&name)?;

        let row: DbCompany =
            sqlx::query_as(r#"INSERT INTO companies (name) VALUES ($1) RETURNING id, name"#)
                .bind(&name)
                .fetch_one(&self.pool)
                .await
                .map_err(map_db_error)?;

        Ok(row.into())
    }

    async fn list_companies(&self) -> Result<Vec<Company>, RepoError> {
        let rows: Vec<DbCompany> = sqlx::query_as(r#"SELECT id, name FROM companies ORDER BY id"#)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(rows.into_iter().map(Company::from).collect())
    }

    async fn get_company(&self, id: CompanyId) -> Result<Option<Company>, RepoError> {
        let row: Option<DbCompany> =
            sqlx::query_as(r#"SELECT id, name FROM companies WHERE id = $1"#)
                .bind(id.value())
                .fetch_optional(&self.pool)
                .await
                .map_err(map_db_error)?;

        Ok(row.map(Company::from))
    }
}
