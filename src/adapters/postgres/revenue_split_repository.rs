//! PostgreSQL implementation of RevenueSplitRepository.
//!
//! Splits are inserted by the ledger inside its transition transaction
//! ([`insert_split`]); this repository reads and settles them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{db_error, parse_user_id};
use crate::domain::foundation::{
    DomainError, EnrollmentId, ErrorCode, PaymentId, RevenueSplitId, Timestamp,
};
use crate::domain::revenue::{RevenueSplit, RevenueSplitStatus};
use crate::ports::RevenueSplitRepository;

const SPLIT_COLUMNS: &str = r#"
    id, payment_id, enrollment_id, instructor_id, method, gross_amount, net_amount,
    platform_fee, payment_fee, instructor_amount, platform_amount, status,
    processed_at, created_at
"#;

/// PostgreSQL implementation of the RevenueSplitRepository port.
#[derive(Clone)]
pub struct PostgresRevenueSplitRepository {
    pool: PgPool,
}

impl PostgresRevenueSplitRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SplitRow {
    id: Uuid,
    payment_id: Uuid,
    enrollment_id: Option<Uuid>,
    instructor_id: Option<String>,
    method: String,
    gross_amount: f64,
    net_amount: f64,
    platform_fee: f64,
    payment_fee: f64,
    instructor_amount: f64,
    platform_amount: f64,
    status: String,
    processed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<SplitRow> for RevenueSplit {
    type Error = DomainError;

    fn try_from(row: SplitRow) -> Result<Self, Self::Error> {
        Ok(RevenueSplit {
            id: RevenueSplitId::from_uuid(row.id),
            payment_id: PaymentId::from_uuid(row.payment_id),
            enrollment_id: row.enrollment_id.map(EnrollmentId::from_uuid),
            instructor_id: row.instructor_id.map(parse_user_id).transpose()?,
            method: row
                .method
                .parse()
                .map_err(|e| db_error("decode revenue split method", e))?,
            gross_amount: row.gross_amount,
            net_amount: row.net_amount,
            platform_fee: row.platform_fee,
            payment_fee: row.payment_fee,
            instructor_amount: row.instructor_amount,
            platform_amount: row.platform_amount,
            status: row
                .status
                .parse()
                .map_err(|e| db_error("decode revenue split status", e))?,
            processed_at: row.processed_at.map(Timestamp::from_datetime),
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

/// Inserts a pending split as part of a ledger transaction.
pub(super) async fn insert_split(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    split: &RevenueSplit,
) -> Result<(), DomainError> {
    sqlx::query(
        r#"
        INSERT INTO revenue_splits (
            id, payment_id, enrollment_id, instructor_id, method, gross_amount, net_amount,
            platform_fee, payment_fee, instructor_amount, platform_amount, status,
            processed_at, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        "#,
    )
    .bind(split.id.as_uuid())
    .bind(split.payment_id.as_uuid())
    .bind(split.enrollment_id.map(|id| *id.as_uuid()))
    .bind(split.instructor_id.as_ref().map(|id| id.as_str()))
    .bind(split.method.as_str())
    .bind(split.gross_amount)
    .bind(split.net_amount)
    .bind(split.platform_fee)
    .bind(split.payment_fee)
    .bind(split.instructor_amount)
    .bind(split.platform_amount)
    .bind(split.status.as_str())
    .bind(split.processed_at.map(|t| *t.as_datetime()))
    .bind(split.created_at.as_datetime())
    .execute(&mut **tx)
    .await
    .map_err(|e| db_error("insert revenue split", e))?;

    Ok(())
}

#[async_trait]
impl RevenueSplitRepository for PostgresRevenueSplitRepository {
    async fn find_split(&self, id: &RevenueSplitId) -> Result<Option<RevenueSplit>, DomainError> {
        let query = format!("SELECT {} FROM revenue_splits WHERE id = $1", SPLIT_COLUMNS);
        sqlx::query_as::<_, SplitRow>(&query)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("fetch revenue split", e))?
            .map(RevenueSplit::try_from)
            .transpose()
    }

    async fn find_split_by_payment(
        &self,
        payment_id: &PaymentId,
    ) -> Result<Option<RevenueSplit>, DomainError> {
        let query = format!(
            "SELECT {} FROM revenue_splits WHERE payment_id = $1",
            SPLIT_COLUMNS
        );
        sqlx::query_as::<_, SplitRow>(&query)
            .bind(payment_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("fetch revenue split", e))?
            .map(RevenueSplit::try_from)
            .transpose()
    }

    async fn update_split_status(
        &self,
        split: &RevenueSplit,
        expected: RevenueSplitStatus,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE revenue_splits SET status = $2, processed_at = $3
            WHERE id = $1 AND status = $4
            "#,
        )
        .bind(split.id.as_uuid())
        .bind(split.status.as_str())
        .bind(split.processed_at.map(|t| *t.as_datetime()))
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("update revenue split", e))?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }

        let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM revenue_splits WHERE id = $1")
            .bind(split.id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("fetch revenue split", e))?;
        match exists {
            Some(_) => Ok(false),
            None => Err(DomainError::new(
                ErrorCode::RevenueSplitNotFound,
                format!("Revenue split not found: {}", split.id),
            )),
        }
    }
}
