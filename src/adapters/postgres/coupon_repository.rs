//! PostgreSQL implementation of CouponRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{db_error, parse_user_id};
use crate::domain::coupon::{
    decode_course_ids, encode_course_ids, normalize_code, Coupon, CouponUsage,
};
use crate::domain::foundation::{
    CouponId, CouponUsageId, DomainError, EnrollmentId, ErrorCode, PaymentId, Timestamp, UserId,
};
use crate::ports::CouponRepository;

const COUPON_COLUMNS: &str = r#"
    id, code, discount_type, discount_value, max_discount_amount, min_order_amount,
    max_uses, max_uses_per_user, current_uses, course_ids, starts_at, expires_at,
    is_active, created_at, updated_at
"#;

/// PostgreSQL implementation of the CouponRepository port.
#[derive(Clone)]
pub struct PostgresCouponRepository {
    pool: PgPool,
}

impl PostgresCouponRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a coupon. Codes are unique.
    pub async fn save(&self, coupon: &Coupon) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO coupons (
                id, code, discount_type, discount_value, max_discount_amount, min_order_amount,
                max_uses, max_uses_per_user, current_uses, course_ids, starts_at, expires_at,
                is_active, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(coupon.id.as_uuid())
        .bind(&coupon.code)
        .bind(coupon.discount_type.as_str())
        .bind(coupon.discount_value)
        .bind(coupon.max_discount_amount)
        .bind(coupon.min_order_amount)
        .bind(coupon.max_uses)
        .bind(coupon.max_uses_per_user)
        .bind(coupon.current_uses)
        .bind(encode_course_ids(coupon.course_ids.as_deref()))
        .bind(coupon.starts_at.map(|t| *t.as_datetime()))
        .bind(coupon.expires_at.map(|t| *t.as_datetime()))
        .bind(coupon.is_active)
        .bind(coupon.created_at.as_datetime())
        .bind(coupon.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("insert coupon", e))?;

        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CouponRow {
    id: Uuid,
    code: String,
    discount_type: String,
    discount_value: f64,
    max_discount_amount: Option<f64>,
    min_order_amount: Option<f64>,
    max_uses: Option<i32>,
    max_uses_per_user: Option<i32>,
    current_uses: i32,
    course_ids: Option<String>,
    starts_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = DomainError;

    fn try_from(row: CouponRow) -> Result<Self, Self::Error> {
        Ok(Coupon {
            id: CouponId::from_uuid(row.id),
            code: row.code,
            discount_type: row
                .discount_type
                .parse()
                .map_err(|e| db_error("decode discount type", e))?,
            discount_value: row.discount_value,
            max_discount_amount: row.max_discount_amount,
            min_order_amount: row.min_order_amount,
            max_uses: row.max_uses,
            max_uses_per_user: row.max_uses_per_user,
            current_uses: row.current_uses,
            course_ids: decode_course_ids(row.course_ids.as_deref())
                .map_err(|e| db_error("decode course_ids", e))?,
            starts_at: row.starts_at.map(Timestamp::from_datetime),
            expires_at: row.expires_at.map(Timestamp::from_datetime),
            is_active: row.is_active,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UsageRow {
    id: Uuid,
    coupon_id: Uuid,
    payment_id: Uuid,
    enrollment_id: Option<Uuid>,
    user_id: Option<String>,
    discount_amount: f64,
    created_at: DateTime<Utc>,
}

impl TryFrom<UsageRow> for CouponUsage {
    type Error = DomainError;

    fn try_from(row: UsageRow) -> Result<Self, Self::Error> {
        Ok(CouponUsage {
            id: CouponUsageId::from_uuid(row.id),
            coupon_id: CouponId::from_uuid(row.coupon_id),
            payment_id: PaymentId::from_uuid(row.payment_id),
            enrollment_id: row.enrollment_id.map(EnrollmentId::from_uuid),
            user_id: row.user_id.map(parse_user_id).transpose()?,
            discount_amount: row.discount_amount,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

/// Records a coupon usage and increments the coupon's counter inside a
/// ledger transaction.
///
/// The coupon row is locked first, which also serializes the per-user count.
/// An exhausted coupon or user fails the whole transaction.
pub(super) async fn consume_coupon(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    usage: &CouponUsage,
) -> Result<(), DomainError> {
    let row: Option<(String, Option<i32>, Option<i32>, i32)> = sqlx::query_as(
        "SELECT code, max_uses, max_uses_per_user, current_uses FROM coupons WHERE id = $1 FOR UPDATE",
    )
    .bind(usage.coupon_id.as_uuid())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| db_error("lock coupon", e))?;

    let (code, max_uses, max_uses_per_user, current_uses) = row.ok_or_else(|| {
        DomainError::new(ErrorCode::CouponNotFound, "Coupon not found")
            .with_detail("coupon_id", usage.coupon_id.to_string())
    })?;
    if max_uses.is_some_and(|max| current_uses >= max) {
        return Err(no_uses_left(&code, "has no uses left"));
    }
    if let (Some(max), Some(user_id)) = (max_uses_per_user, &usage.user_id) {
        let (held,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM coupon_usages WHERE coupon_id = $1 AND user_id = $2",
        )
        .bind(usage.coupon_id.as_uuid())
        .bind(user_id.as_str())
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| db_error("count user coupon usages", e))?;
        if held >= i64::from(max) {
            return Err(no_uses_left(&code, "has no uses left for this user"));
        }
    }

    sqlx::query(
        r#"
        INSERT INTO coupon_usages (
            id, coupon_id, payment_id, enrollment_id, user_id, discount_amount, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(usage.id.as_uuid())
    .bind(usage.coupon_id.as_uuid())
    .bind(usage.payment_id.as_uuid())
    .bind(usage.enrollment_id.map(|id| *id.as_uuid()))
    .bind(usage.user_id.as_ref().map(|id| id.as_str()))
    .bind(usage.discount_amount)
    .bind(usage.created_at.as_datetime())
    .execute(&mut **tx)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => DomainError::new(
            ErrorCode::DuplicateEvent,
            format!("Payment {} already used a coupon", usage.payment_id),
        ),
        _ => db_error("insert coupon usage", e),
    })?;

    sqlx::query(
        "UPDATE coupons SET current_uses = current_uses + 1, updated_at = NOW() WHERE id = $1",
    )
    .bind(usage.coupon_id.as_uuid())
    .execute(&mut **tx)
    .await
    .map_err(|e| db_error("increment coupon uses", e))?;

    Ok(())
}

/// Deletes the payment's usage and decrements the coupon's counter inside a
/// ledger transaction. No-op when the payment holds no use.
pub(super) async fn release_coupon(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    payment_id: &PaymentId,
) -> Result<(), DomainError> {
    let released: Option<(Uuid,)> =
        sqlx::query_as("DELETE FROM coupon_usages WHERE payment_id = $1 RETURNING coupon_id")
            .bind(payment_id.as_uuid())
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| db_error("delete coupon usage", e))?;

    if let Some((coupon_id,)) = released {
        sqlx::query(
            r#"
            UPDATE coupons SET current_uses = GREATEST(current_uses - 1, 0), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(coupon_id)
        .execute(&mut **tx)
        .await
        .map_err(|e| db_error("decrement coupon uses", e))?;
    }
    Ok(())
}

fn no_uses_left(code: &str, reason: &str) -> DomainError {
    DomainError::new(ErrorCode::ValidationFailed, format!("Coupon {} {}", code, reason))
        .with_detail("field", "coupon_code")
}

#[async_trait]
impl CouponRepository for PostgresCouponRepository {
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, DomainError> {
        let Ok(code) = normalize_code(code) else {
            return Ok(None);
        };
        let query = format!("SELECT {} FROM coupons WHERE code = $1", COUPON_COLUMNS);
        sqlx::query_as::<_, CouponRow>(&query)
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("fetch coupon", e))?
            .map(Coupon::try_from)
            .transpose()
    }

    async fn find_by_id(&self, id: &CouponId) -> Result<Option<Coupon>, DomainError> {
        let query = format!("SELECT {} FROM coupons WHERE id = $1", COUPON_COLUMNS);
        sqlx::query_as::<_, CouponRow>(&query)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("fetch coupon", e))?
            .map(Coupon::try_from)
            .transpose()
    }

    async fn find_usage_by_payment(
        &self,
        payment_id: &PaymentId,
    ) -> Result<Option<CouponUsage>, DomainError> {
        sqlx::query_as::<_, UsageRow>(
            r#"
            SELECT id, coupon_id, payment_id, enrollment_id, user_id, discount_amount, created_at
            FROM coupon_usages WHERE payment_id = $1
            "#,
        )
        .bind(payment_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("fetch coupon usage", e))?
        .map(CouponUsage::try_from)
        .transpose()
    }

    async fn count_user_usages(
        &self,
        coupon_id: &CouponId,
        user_id: &UserId,
    ) -> Result<i64, DomainError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM coupon_usages WHERE coupon_id = $1 AND user_id = $2",
        )
        .bind(coupon_id.as_uuid())
        .bind(user_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("count user coupon usages", e))?;
        Ok(count)
    }
}
