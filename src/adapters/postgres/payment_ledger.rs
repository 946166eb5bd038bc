//! PostgreSQL implementation of PaymentLedger.
//!
//! Each write runs in one database transaction. Transitions lock the payment
//! row (`SELECT ... FOR UPDATE`), check the idempotency key and the version,
//! then update the row, append the audit record and insert the derived rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::coupon_repository::{consume_coupon, release_coupon};
use super::revenue_split_repository::insert_split;
use super::{db_error, parse_user_id};
use crate::domain::foundation::{
    CouponId, CourseId, DomainError, EnrollmentId, ErrorCode, PaymentId, PaymentTransactionId,
    Timestamp,
};
use crate::domain::payment::{EventSource, Payer, Payment, PaymentStatus, PaymentTransaction};
use crate::ports::{LedgerWrite, NewLedgerEntry, PaymentLedger, TransitionOutcome};

const PAYMENT_COLUMNS: &str = r#"
    id, enrollment_id, course_id, instructor_id, payer_name, payer_email, payer_document,
    gross_amount, discount_amount, net_amount, gateway_fee, refunded_amount,
    method, gateway, gateway_payment_id, gateway_customer_id, installments, installment_value,
    status, coupon_id, due_date, paid_at, refunded_at, cancelled_at, expires_at,
    created_at, updated_at, version
"#;

const TRANSACTION_COLUMNS: &str = r#"
    id, payment_id, previous_status, new_status, source, event_type, gateway_event_id,
    idempotency_key, amount, raw_body, raw_payload, metadata, created_at
"#;

/// PostgreSQL implementation of the PaymentLedger port.
#[derive(Clone)]
pub struct PostgresPaymentLedger {
    pool: PgPool,
}

impl PostgresPaymentLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    enrollment_id: Option<Uuid>,
    course_id: Option<Uuid>,
    instructor_id: Option<String>,
    payer_name: String,
    payer_email: Option<String>,
    payer_document: String,
    gross_amount: f64,
    discount_amount: f64,
    net_amount: f64,
    gateway_fee: f64,
    refunded_amount: f64,
    method: String,
    gateway: Option<String>,
    gateway_payment_id: Option<String>,
    gateway_customer_id: Option<String>,
    installments: Option<i32>,
    installment_value: Option<f64>,
    status: String,
    coupon_id: Option<Uuid>,
    due_date: Option<DateTime<Utc>>,
    paid_at: Option<DateTime<Utc>>,
    refunded_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = DomainError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(Payment {
            id: PaymentId::from_uuid(row.id),
            enrollment_id: row.enrollment_id.map(EnrollmentId::from_uuid),
            course_id: row.course_id.map(CourseId::from_uuid),
            instructor_id: row.instructor_id.map(parse_user_id).transpose()?,
            // Rows are written from validated payers; no re-validation on read.
            payer: Payer {
                name: row.payer_name,
                email: row.payer_email,
                document: row.payer_document,
            },
            gross_amount: row.gross_amount,
            discount_amount: row.discount_amount,
            net_amount: row.net_amount,
            gateway_fee: row.gateway_fee,
            refunded_amount: row.refunded_amount,
            method: row
                .method
                .parse()
                .map_err(|e| db_error("decode payment method", e))?,
            gateway: row.gateway,
            gateway_payment_id: row.gateway_payment_id,
            gateway_customer_id: row.gateway_customer_id,
            installments: row.installments.map(|n| n.max(0) as u32),
            installment_value: row.installment_value,
            status: row
                .status
                .parse()
                .map_err(|e| db_error("decode payment status", e))?,
            coupon_id: row.coupon_id.map(CouponId::from_uuid),
            due_date: row.due_date.map(Timestamp::from_datetime),
            paid_at: row.paid_at.map(Timestamp::from_datetime),
            refunded_at: row.refunded_at.map(Timestamp::from_datetime),
            cancelled_at: row.cancelled_at.map(Timestamp::from_datetime),
            expires_at: row.expires_at.map(Timestamp::from_datetime),
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
            version: row.version,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    payment_id: Uuid,
    previous_status: Option<String>,
    new_status: String,
    source: String,
    event_type: String,
    gateway_event_id: Option<String>,
    idempotency_key: Option<String>,
    amount: Option<f64>,
    raw_body: Option<Vec<u8>>,
    raw_payload: Option<serde_json::Value>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for PaymentTransaction {
    type Error = DomainError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let source = EventSource::parse(&row.source).ok_or_else(|| {
            DomainError::database(format!("Invalid transaction source: {}", row.source))
        })?;
        Ok(PaymentTransaction {
            id: PaymentTransactionId::from_uuid(row.id),
            payment_id: PaymentId::from_uuid(row.payment_id),
            previous_status: row
                .previous_status
                .map(|s| s.parse::<PaymentStatus>())
                .transpose()
                .map_err(|e| db_error("decode previous status", e))?,
            new_status: row
                .new_status
                .parse()
                .map_err(|e| db_error("decode new status", e))?,
            source,
            event_type: row.event_type,
            gateway_event_id: row.gateway_event_id,
            idempotency_key: row.idempotency_key,
            amount: row.amount,
            raw_body: row.raw_body,
            raw_payload: row.raw_payload,
            metadata: row.metadata,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

async fn insert_payment(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    payment: &Payment,
) -> Result<(), DomainError> {
    sqlx::query(
        r#"
        INSERT INTO payments (
            id, enrollment_id, course_id, instructor_id, payer_name, payer_email, payer_document,
            gross_amount, discount_amount, net_amount, gateway_fee, refunded_amount,
            method, gateway, gateway_payment_id, gateway_customer_id, installments,
            installment_value, status, coupon_id, due_date, paid_at, refunded_at,
            cancelled_at, expires_at, created_at, updated_at, version
        ) VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
            $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28
        )
        "#,
    )
    .bind(payment.id.as_uuid())
    .bind(payment.enrollment_id.map(|id| *id.as_uuid()))
    .bind(payment.course_id.map(|id| *id.as_uuid()))
    .bind(payment.instructor_id.as_ref().map(|id| id.as_str()))
    .bind(&payment.payer.name)
    .bind(&payment.payer.email)
    .bind(&payment.payer.document)
    .bind(payment.gross_amount)
    .bind(payment.discount_amount)
    .bind(payment.net_amount)
    .bind(payment.gateway_fee)
    .bind(payment.refunded_amount)
    .bind(payment.method.as_str())
    .bind(&payment.gateway)
    .bind(&payment.gateway_payment_id)
    .bind(&payment.gateway_customer_id)
    .bind(payment.installments.map(|n| n as i32))
    .bind(payment.installment_value)
    .bind(payment.status.as_str())
    .bind(payment.coupon_id.map(|id| *id.as_uuid()))
    .bind(payment.due_date.map(|t| *t.as_datetime()))
    .bind(payment.paid_at.map(|t| *t.as_datetime()))
    .bind(payment.refunded_at.map(|t| *t.as_datetime()))
    .bind(payment.cancelled_at.map(|t| *t.as_datetime()))
    .bind(payment.expires_at.map(|t| *t.as_datetime()))
    .bind(payment.created_at.as_datetime())
    .bind(payment.updated_at.as_datetime())
    .bind(payment.version)
    .execute(&mut **tx)
    .await
    .map_err(|e| db_error("insert payment", e))?;

    Ok(())
}

/// Overwrites the mutable columns, guarded by the version the caller read.
async fn update_payment(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    payment: &Payment,
    expected_version: i64,
) -> Result<bool, DomainError> {
    let result = sqlx::query(
        r#"
        UPDATE payments SET
            net_amount = $3,
            refunded_amount = $4,
            gateway_customer_id = $5,
            status = $6,
            due_date = $7,
            paid_at = $8,
            refunded_at = $9,
            cancelled_at = $10,
            expires_at = $11,
            updated_at = $12,
            version = version + 1
        WHERE id = $1 AND version = $2
        "#,
    )
    .bind(payment.id.as_uuid())
    .bind(expected_version)
    .bind(payment.net_amount)
    .bind(payment.refunded_amount)
    .bind(&payment.gateway_customer_id)
    .bind(payment.status.as_str())
    .bind(payment.due_date.map(|t| *t.as_datetime()))
    .bind(payment.paid_at.map(|t| *t.as_datetime()))
    .bind(payment.refunded_at.map(|t| *t.as_datetime()))
    .bind(payment.cancelled_at.map(|t| *t.as_datetime()))
    .bind(payment.expires_at.map(|t| *t.as_datetime()))
    .bind(payment.updated_at.as_datetime())
    .execute(&mut **tx)
    .await
    .map_err(|e| db_error("update payment", e))?;

    Ok(result.rows_affected() == 1)
}

/// Appends an audit record. `Ok(false)` when the idempotency key already exists.
async fn insert_transaction(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    transaction: &PaymentTransaction,
) -> Result<bool, DomainError> {
    let result = sqlx::query(
        r#"
        INSERT INTO payment_transactions (
            id, payment_id, previous_status, new_status, source, event_type, gateway_event_id,
            idempotency_key, amount, raw_body, raw_payload, metadata, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#,
    )
    .bind(transaction.id.as_uuid())
    .bind(transaction.payment_id.as_uuid())
    .bind(transaction.previous_status.map(|s| s.as_str()))
    .bind(transaction.new_status.as_str())
    .bind(transaction.source.as_str())
    .bind(&transaction.event_type)
    .bind(&transaction.gateway_event_id)
    .bind(&transaction.idempotency_key)
    .bind(transaction.amount)
    .bind(&transaction.raw_body)
    .bind(&transaction.raw_payload)
    .bind(&transaction.metadata)
    .bind(transaction.created_at.as_datetime())
    .execute(&mut **tx)
    .await;

    match result {
        Ok(_) => Ok(true),
        Err(sqlx::Error::Database(db))
            if db.constraint() == Some("payment_transactions_idempotency_key") =>
        {
            Ok(false)
        }
        Err(e) => Err(db_error("insert payment transaction", e)),
    }
}

async fn commit(tx: sqlx::Transaction<'_, sqlx::Postgres>) -> Result<(), DomainError> {
    tx.commit()
        .await
        .map_err(|e| db_error("commit transaction", e))
}

#[async_trait]
impl PaymentLedger for PostgresPaymentLedger {
    async fn create(&self, entry: NewLedgerEntry) -> Result<(), DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin transaction", e))?;

        insert_payment(&mut tx, &entry.payment).await?;
        insert_transaction(&mut tx, &entry.transaction).await?;
        if let Some(usage) = &entry.coupon_usage {
            consume_coupon(&mut tx, usage).await?;
        }
        if let Some(split) = &entry.revenue_split {
            insert_split(&mut tx, split).await?;
        }

        commit(tx).await
    }

    async fn find_by_id(&self, id: &PaymentId) -> Result<Option<Payment>, DomainError> {
        let query = format!("SELECT {} FROM payments WHERE id = $1", PAYMENT_COLUMNS);
        sqlx::query_as::<_, PaymentRow>(&query)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("fetch payment", e))?
            .map(Payment::try_from)
            .transpose()
    }

    async fn find_by_gateway_id(
        &self,
        gateway: &str,
        gateway_payment_id: &str,
    ) -> Result<Option<Payment>, DomainError> {
        let query = format!(
            "SELECT {} FROM payments WHERE gateway = $1 AND gateway_payment_id = $2",
            PAYMENT_COLUMNS
        );
        sqlx::query_as::<_, PaymentRow>(&query)
            .bind(gateway)
            .bind(gateway_payment_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("fetch payment", e))?
            .map(Payment::try_from)
            .transpose()
    }

    async fn find_transaction_by_key(
        &self,
        payment_id: &PaymentId,
        idempotency_key: &str,
    ) -> Result<Option<PaymentTransaction>, DomainError> {
        let query = format!(
            "SELECT {} FROM payment_transactions WHERE payment_id = $1 AND idempotency_key = $2",
            TRANSACTION_COLUMNS
        );
        sqlx::query_as::<_, TransactionRow>(&query)
            .bind(payment_id.as_uuid())
            .bind(idempotency_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("fetch payment transaction", e))?
            .map(PaymentTransaction::try_from)
            .transpose()
    }

    async fn record_transition(
        &self,
        write: LedgerWrite,
    ) -> Result<TransitionOutcome, DomainError> {
        let payment_id = write.payment.id;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin transaction", e))?;

        let locked: Option<(i64,)> =
            sqlx::query_as("SELECT version FROM payments WHERE id = $1 FOR UPDATE")
                .bind(payment_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| db_error("lock payment", e))?;
        let (stored_version,) = locked.ok_or_else(|| {
            DomainError::new(ErrorCode::PaymentNotFound, "Payment not found")
                .with_detail("payment_id", payment_id.to_string())
        })?;

        if let Some(key) = &write.transaction.idempotency_key {
            let existing: Option<(Uuid,)> = sqlx::query_as(
                "SELECT id FROM payment_transactions WHERE payment_id = $1 AND idempotency_key = $2",
            )
            .bind(payment_id.as_uuid())
            .bind(key)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| db_error("check idempotency key", e))?;
            if existing.is_some() {
                return Ok(TransitionOutcome::Duplicate);
            }
        }

        if stored_version != write.expected_version
            || !update_payment(&mut tx, &write.payment, write.expected_version).await?
        {
            return Ok(TransitionOutcome::VersionConflict);
        }

        if !insert_transaction(&mut tx, &write.transaction).await? {
            return Ok(TransitionOutcome::Duplicate);
        }
        if write.release_coupon {
            release_coupon(&mut tx, &payment_id).await?;
        }
        if let Some(split) = &write.revenue_split {
            insert_split(&mut tx, split).await?;
        }

        commit(tx).await?;
        Ok(TransitionOutcome::Applied)
    }

    async fn list_transactions(
        &self,
        payment_id: &PaymentId,
    ) -> Result<Vec<PaymentTransaction>, DomainError> {
        let query = format!(
            "SELECT {} FROM payment_transactions WHERE payment_id = $1 ORDER BY seq",
            TRANSACTION_COLUMNS
        );
        sqlx::query_as::<_, TransactionRow>(&query)
            .bind(payment_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("list payment transactions", e))?
            .into_iter()
            .map(PaymentTransaction::try_from)
            .collect()
    }
}
