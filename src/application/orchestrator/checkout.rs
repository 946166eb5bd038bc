//! Checkout and coupon preview.

use super::gateway_ops::{
    card_charge_request, charge_request, parse_due_date, require, require_positive,
    validate_card_payment,
};
use super::{
    CheckoutCommand, CheckoutResult, CreateCardChargeCommand, CreateChargeCommand,
    DiscountPreview, PaymentOrchestrator,
};
use crate::domain::coupon::{normalize_code, Coupon, CouponUsage};
use crate::domain::foundation::{round_currency, CourseId, Timestamp, UserId};
use crate::domain::payment::{
    BillingType, EventSource, Payment, PaymentFlowError, PaymentMethod, PaymentStatus,
    PaymentTransaction,
};
use crate::domain::revenue::{calculate_payment_fee, RevenueSplit};
use crate::ports::{CreateCustomerRequest, GatewayPayment, NewLedgerEntry, PaymentGateway};

const CREATED_EVENT: &str = "payment_created";

impl PaymentOrchestrator {
    /// Starts a checkout: applies the coupon, charges the active gateway and
    /// records the payment with its first audit entry.
    ///
    /// A fully discounted order is confirmed without touching a gateway.
    pub async fn start_checkout(
        &self,
        command: CheckoutCommand,
    ) -> Result<CheckoutResult, PaymentFlowError> {
        require_positive("amount", command.amount)?;
        if command.billing_type.is_card() {
            match &command.card {
                Some(card) => validate_card_payment(card)?,
                None => {
                    return Err(PaymentFlowError::validation(
                        "card",
                        "card details are required for card payments",
                    ))
                }
            }
        }
        parse_due_date(command.due_date.as_deref())?;

        let coupon = match command.coupon_code.as_deref() {
            Some(code) => Some(self.eligible_coupon(code, &command).await?),
            None => None,
        };
        let discount = coupon
            .as_ref()
            .map(|c| round_currency(c.calculate_discount(command.amount)))
            .unwrap_or(0.0);
        let charge_amount = round_currency(command.amount - discount);

        if charge_amount <= 0.0 {
            return self.free_checkout(command, coupon, discount).await;
        }

        let gateway = self.registry.active()?;
        let fee = calculate_payment_fee(
            charge_amount,
            command.billing_type.as_str(),
            &gateway.fees(),
        );

        let mut payment = Payment::new(
            command.payer.clone(),
            command.amount,
            discount,
            fee,
            PaymentMethod::from(command.billing_type),
        )?;
        payment.enrollment_id = command.enrollment_id;
        payment.course_id = command.course_id;
        payment.instructor_id = command.instructor_id.clone();
        payment.coupon_id = coupon.as_ref().map(|c| c.id);

        let customer_id = self.ensure_customer(gateway.as_ref(), &command).await?;
        let billing_type = command.billing_type;
        let charge_command = CreateChargeCommand {
            customer_id: customer_id.clone(),
            amount: charge_amount,
            due_date: command.due_date.clone(),
            description: command.description.clone(),
            external_reference: Some(payment.id.to_string()),
        };

        let charge = match (billing_type, command.card) {
            (BillingType::Pix, _) => {
                gateway.create_pix_payment(charge_request(charge_command)?).await?
            }
            (BillingType::Boleto, _) => {
                gateway.create_boleto_payment(charge_request(charge_command)?).await?
            }
            (_, Some(card)) => {
                let installments = card.installments;
                let request = card_charge_request(CreateCardChargeCommand {
                    charge: charge_command,
                    billing_type,
                    payment: card,
                })?;
                payment.installments = Some(installments);
                payment.installment_value =
                    Some(round_currency(charge_amount / f64::from(installments)));
                gateway.create_card_payment(request).await?
            }
            (_, None) => {
                return Err(PaymentFlowError::validation(
                    "card",
                    "card details are required for card payments",
                ))
            }
        };

        payment.issue(gateway.name(), charge.id.clone(), customer_id, charge.status);
        payment.due_date = charge.due_date.map(Timestamp::from_date);

        let transaction = PaymentTransaction::initial(
            payment.id,
            payment.status,
            EventSource::Api,
            CREATED_EVENT,
        )
        .with_amount(charge_amount)
        .with_metadata("gateway", gateway.name())
        .with_metadata("billing_type", billing_type.as_str());

        let entry = NewLedgerEntry {
            revenue_split: payment.status.is_paid().then(|| {
                RevenueSplit::for_payment(
                    &payment,
                    self.settings.default_instructor_percent,
                    self.settings.default_platform_percent,
                )
            }),
            coupon_usage: reserve_coupon(&payment, command.user_id.clone()),
            payment: payment.clone(),
            transaction,
        };

        if let Err(err) = self.ledger.create(entry).await {
            tracing::error!(
                payment_id = %payment.id,
                gateway_payment_id = %charge.id,
                error = %err,
                "Failed to record charged payment, cancelling upstream charge"
            );
            if let Err(cancel_err) = gateway.cancel_payment(&charge.id).await {
                tracing::error!(
                    gateway_payment_id = %charge.id,
                    error = %cancel_err,
                    "Compensating cancel failed"
                );
            }
            return Err(err.into());
        }

        tracing::info!(
            payment_id = %payment.id,
            gateway = gateway.name(),
            status = %payment.status,
            amount = charge_amount,
            "Checkout started"
        );

        Ok(CheckoutResult {
            payment,
            charge: Some(charge),
        })
    }

    /// Discount a coupon would give for `amount`, without side effects.
    pub async fn preview_discount(
        &self,
        code: &str,
        amount: f64,
        course_id: Option<&CourseId>,
    ) -> Result<DiscountPreview, PaymentFlowError> {
        require("coupon_code", code)?;
        let code = normalize_code(code)?;
        let coupon = self
            .coupons
            .find_by_code(&code)
            .await?
            .ok_or_else(|| PaymentFlowError::not_found("coupon", &code))?;

        let reason = if !coupon.applies_to_course(course_id) {
            Some("coupon does not apply to this course".to_string())
        } else {
            coupon
                .check_eligibility(amount, Timestamp::now())
                .err()
                .map(|e| e.to_string())
        };
        let discount_amount = match reason {
            Some(_) => 0.0,
            None => round_currency(coupon.calculate_discount(amount)),
        };

        Ok(DiscountPreview {
            coupon_code: coupon.code,
            order_amount: amount,
            discount_amount,
            final_amount: round_currency((amount - discount_amount).max(0.0)),
            eligible: reason.is_none(),
            reason,
        })
    }

    async fn eligible_coupon(
        &self,
        code: &str,
        command: &CheckoutCommand,
    ) -> Result<Coupon, PaymentFlowError> {
        let code = normalize_code(code)?;
        let coupon = self
            .coupons
            .find_by_code(&code)
            .await?
            .ok_or_else(|| PaymentFlowError::validation("coupon_code", "unknown coupon"))?;

        if !coupon.applies_to_course(command.course_id.as_ref()) {
            return Err(PaymentFlowError::validation(
                "coupon_code",
                "coupon does not apply to this course",
            ));
        }
        coupon
            .check_eligibility(command.amount, Timestamp::now())
            .map_err(|e| PaymentFlowError::validation("coupon_code", e.to_string()))?;

        if let (Some(user_id), Some(_)) = (&command.user_id, coupon.max_uses_per_user) {
            let held = self.coupons.count_user_usages(&coupon.id, user_id).await?;
            coupon
                .check_user_limit(held)
                .map_err(|e| PaymentFlowError::validation("coupon_code", e.to_string()))?;
        }
        Ok(coupon)
    }

    async fn ensure_customer(
        &self,
        gateway: &dyn PaymentGateway,
        command: &CheckoutCommand,
    ) -> Result<String, PaymentFlowError> {
        if let Some(customer) = gateway
            .find_customer_by_document(&command.payer.document)
            .await?
        {
            return Ok(customer.id);
        }
        let customer = gateway
            .create_customer(CreateCustomerRequest {
                name: command.payer.name.clone(),
                email: command.payer.email.clone(),
                document: command.payer.document.clone(),
                phone: command.payer_phone.clone(),
                external_reference: command.user_id.as_ref().map(|u| u.to_string()),
            })
            .await?;
        tracing::info!(gateway = gateway.name(), customer_id = %customer.id, "Customer created");
        Ok(customer.id)
    }

    async fn free_checkout(
        &self,
        command: CheckoutCommand,
        coupon: Option<Coupon>,
        discount: f64,
    ) -> Result<CheckoutResult, PaymentFlowError> {
        let mut payment = Payment::new(
            command.payer,
            command.amount,
            discount,
            0.0,
            PaymentMethod::Free,
        )?;
        payment.enrollment_id = command.enrollment_id;
        payment.course_id = command.course_id;
        payment.instructor_id = command.instructor_id;
        payment.coupon_id = coupon.as_ref().map(|c| c.id);
        payment.status = PaymentStatus::Confirmed;
        payment.paid_at = Some(payment.created_at);

        let mut transaction = PaymentTransaction::initial(
            payment.id,
            payment.status,
            EventSource::Api,
            CREATED_EVENT,
        )
        .with_amount(0.0);
        if let Some(coupon) = &coupon {
            transaction = transaction.with_metadata("coupon_code", coupon.code.as_str());
        }

        self.ledger
            .create(NewLedgerEntry {
                coupon_usage: reserve_coupon(&payment, command.user_id),
                payment: payment.clone(),
                transaction,
                revenue_split: None,
            })
            .await?;

        tracing::info!(payment_id = %payment.id, "Fully discounted order confirmed");
        Ok(CheckoutResult {
            payment,
            charge: None::<GatewayPayment>,
        })
    }
}

/// The coupon use a discounted payment holds from checkout on.
fn reserve_coupon(payment: &Payment, user_id: Option<UserId>) -> Option<CouponUsage> {
    match payment.coupon_id {
        Some(coupon_id) if payment.discount_amount > 0.0 => Some(CouponUsage::new(
            coupon_id,
            payment.id,
            payment.enrollment_id,
            user_id,
            payment.discount_amount,
        )),
        _ => None,
    }
}
