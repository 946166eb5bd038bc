//! Customer and charge operations delegated to the active gateway.

use chrono::NaiveDate;

use super::{CardPayment, CreateCardChargeCommand, CreateChargeCommand, PaymentOrchestrator};
use super::{PaymentStatusView, StatusSource};
use crate::domain::foundation::PaymentId;
use crate::domain::payment::PaymentFlowError;
use crate::ports::{
    CardChargeRequest, ChargeRequest, CreateCustomerRequest, GatewayCustomer, GatewayPayment,
};
use secrecy::ExposeSecret;

impl PaymentOrchestrator {
    /// Creates a customer with the active gateway.
    pub async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<GatewayCustomer, PaymentFlowError> {
        require("name", &request.name)?;
        require("document", &request.document)?;

        let gateway = self.registry.active()?;
        let customer = gateway.create_customer(request).await?;
        tracing::info!(gateway = gateway.name(), customer_id = %customer.id, "Customer created");
        Ok(customer)
    }

    /// Looks up a customer by tax document. Absence is not an error.
    pub async fn find_customer_by_document(
        &self,
        document: &str,
    ) -> Result<Option<GatewayCustomer>, PaymentFlowError> {
        require("document", document)?;
        let gateway = self.registry.active()?;
        Ok(gateway.find_customer_by_document(document).await?)
    }

    pub async fn create_pix_payment(
        &self,
        command: CreateChargeCommand,
    ) -> Result<GatewayPayment, PaymentFlowError> {
        let request = charge_request(command)?;
        let gateway = self.registry.active()?;
        Ok(gateway.create_pix_payment(request).await?)
    }

    pub async fn create_boleto_payment(
        &self,
        command: CreateChargeCommand,
    ) -> Result<GatewayPayment, PaymentFlowError> {
        let request = charge_request(command)?;
        let gateway = self.registry.active()?;
        Ok(gateway.create_boleto_payment(request).await?)
    }

    pub async fn create_card_payment(
        &self,
        command: CreateCardChargeCommand,
    ) -> Result<GatewayPayment, PaymentFlowError> {
        let request = card_charge_request(command)?;
        let gateway = self.registry.active()?;
        Ok(gateway.create_card_payment(request).await?)
    }

    /// Status of a payment.
    ///
    /// `id` is tried as a local payment id first; the gateway's live status is
    /// attached best effort. Otherwise `id` is treated as a gateway payment id
    /// and the active gateway is asked directly.
    pub async fn get_payment_status(&self, id: &str) -> Result<PaymentStatusView, PaymentFlowError> {
        let local = match id.parse::<PaymentId>() {
            Ok(payment_id) => self.ledger.find_by_id(&payment_id).await?,
            Err(_) => None,
        };

        if let Some(payment) = local {
            let gateway_status = match (&payment.gateway_payment_id, self.gateway_for(&payment)) {
                (Some(gateway_payment_id), Ok(gateway)) => {
                    match gateway.get_payment(gateway_payment_id).await {
                        Ok(found) => found.map(|p| p.status),
                        Err(err) => {
                            tracing::warn!(
                                payment_id = %payment.id,
                                error = %err,
                                "Live gateway status lookup failed"
                            );
                            None
                        }
                    }
                }
                _ => None,
            };

            return Ok(PaymentStatusView {
                payment_id: Some(payment.id),
                gateway_payment_id: payment.gateway_payment_id.clone(),
                status: payment.status,
                gateway_status,
                source: StatusSource::Ledger,
            });
        }

        let gateway = self.registry.active()?;
        let remote = gateway
            .get_payment(id)
            .await?
            .ok_or_else(|| PaymentFlowError::not_found("payment", id))?;

        Ok(PaymentStatusView {
            payment_id: None,
            gateway_payment_id: Some(remote.id),
            status: remote.status,
            gateway_status: Some(remote.status),
            source: StatusSource::Gateway,
        })
    }
}

pub(super) fn require(field: &str, value: &str) -> Result<(), PaymentFlowError> {
    if value.trim().is_empty() {
        return Err(PaymentFlowError::validation(field, "is required"));
    }
    Ok(())
}

pub(super) fn require_positive(field: &str, value: f64) -> Result<(), PaymentFlowError> {
    if !(value.is_finite() && value > 0.0) {
        return Err(PaymentFlowError::validation(field, "must be greater than zero"));
    }
    Ok(())
}

/// Parses a date-only `YYYY-MM-DD` string.
pub(super) fn parse_due_date(raw: Option<&str>) -> Result<Option<NaiveDate>, PaymentFlowError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| PaymentFlowError::validation("due_date", "expected YYYY-MM-DD")),
    }
}

pub(super) fn charge_request(command: CreateChargeCommand) -> Result<ChargeRequest, PaymentFlowError> {
    require("customer_id", &command.customer_id)?;
    require_positive("amount", command.amount)?;
    let due_date = parse_due_date(command.due_date.as_deref())?;

    Ok(ChargeRequest {
        customer_id: command.customer_id,
        amount: command.amount,
        due_date,
        description: command.description,
        external_reference: command.external_reference,
    })
}

pub(super) fn card_charge_request(
    command: CreateCardChargeCommand,
) -> Result<CardChargeRequest, PaymentFlowError> {
    if !command.billing_type.is_card() {
        return Err(PaymentFlowError::validation(
            "billing_type",
            "card charges require credit_card or debit_card",
        ));
    }
    let charge = charge_request(command.charge)?;
    let payment = command.payment;
    validate_card_payment(&payment)?;

    Ok(CardChargeRequest {
        charge,
        billing_type: command.billing_type,
        card: payment.card,
        holder: payment.holder,
        installments: payment.installments,
        remote_ip: payment.remote_ip,
    })
}

/// Card and holder fields every gateway needs.
pub(super) fn validate_card_payment(payment: &CardPayment) -> Result<(), PaymentFlowError> {
    require("card.holder_name", &payment.card.holder_name)?;
    require("card.number", payment.card.number.expose_secret())?;
    require("card.expiry_month", &payment.card.expiry_month)?;
    require("card.expiry_year", &payment.card.expiry_year)?;
    require("card.cvv", payment.card.cvv.expose_secret())?;
    require("holder.name", &payment.holder.name)?;
    require("holder.email", &payment.holder.email)?;
    require("holder.document", &payment.holder.document)?;
    require("holder.postal_code", &payment.holder.postal_code)?;
    require("holder.address_number", &payment.holder.address_number)?;
    if payment.installments == 0 {
        return Err(PaymentFlowError::validation(
            "installments",
            "must be at least 1",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::CardPayment;
    use super::*;
    use crate::domain::payment::{BillingType, PaymentStatus};
    use crate::ports::{CardDetails, CardHolder};
    use secrecy::SecretString;

    fn charge(amount: f64, due_date: Option<&str>) -> CreateChargeCommand {
        CreateChargeCommand {
            customer_id: "cus_1".to_string(),
            amount,
            due_date: due_date.map(str::to_string),
            description: None,
            external_reference: None,
        }
    }

    fn card(number: &str) -> CardPayment {
        CardPayment {
            card: CardDetails {
                holder_name: "ANA SOUZA".into(),
                number: SecretString::new(number.into()),
                expiry_month: "12".into(),
                expiry_year: "2030".into(),
                cvv: SecretString::new("123".into()),
            },
            holder: CardHolder {
                name: "Ana Souza".into(),
                email: "ana@example.com".into(),
                document: "12345678900".into(),
                postal_code: "01310-100".into(),
                address_number: "100".into(),
                phone: None,
            },
            installments: 1,
            remote_ip: None,
        }
    }

    #[tokio::test]
    async fn create_customer_requires_name_and_document() {
        let h = harness();
        let err = h
            .orchestrator
            .create_customer(CreateCustomerRequest {
                name: "".into(),
                email: None,
                document: "123".into(),
                phone: None,
                external_reference: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentFlowError::Validation { ref field, .. } if field == "name"));
        assert_eq!(h.gateway.customer_count(), 0);
    }

    #[tokio::test]
    async fn customer_can_be_found_by_document() {
        let h = harness();
        let created = h
            .orchestrator
            .create_customer(CreateCustomerRequest {
                name: "Ana".into(),
                email: None,
                document: "123".into(),
                phone: None,
                external_reference: None,
            })
            .await
            .unwrap();

        let found = h.orchestrator.find_customer_by_document("123").await.unwrap();
        assert_eq!(found, Some(created));
        assert_eq!(h.orchestrator.find_customer_by_document("999").await.unwrap(), None);
    }

    #[tokio::test]
    async fn pix_payment_rejects_non_positive_amount() {
        let h = harness();
        let err = h
            .orchestrator
            .create_pix_payment(charge(0.0, None))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentFlowError::Validation { ref field, .. } if field == "amount"));
    }

    #[tokio::test]
    async fn boleto_payment_rejects_unparsable_due_date() {
        let h = harness();
        let err = h
            .orchestrator
            .create_boleto_payment(charge(50.0, Some("15/03/2026")))
            .await
            .unwrap_err();
        assert!(
            matches!(err, PaymentFlowError::Validation { ref field, .. } if field == "due_date")
        );
    }

    #[tokio::test]
    async fn boleto_payment_passes_due_date_to_gateway() {
        let h = harness();
        let payment = h
            .orchestrator
            .create_boleto_payment(charge(50.0, Some("2026-03-15")))
            .await
            .unwrap();
        assert_eq!(payment.due_date, NaiveDate::from_ymd_opt(2026, 3, 15));
        assert!(payment.boleto.is_some());
        assert_eq!(payment.status, PaymentStatus::AwaitingPayment);
    }

    #[tokio::test]
    async fn card_payment_requires_card_number() {
        let h = harness();
        let err = h
            .orchestrator
            .create_card_payment(CreateCardChargeCommand {
                charge: charge(50.0, None),
                billing_type: BillingType::CreditCard,
                payment: card(""),
            })
            .await
            .unwrap_err();
        assert!(
            matches!(err, PaymentFlowError::Validation { ref field, .. } if field == "card.number")
        );
    }

    #[tokio::test]
    async fn card_payment_is_confirmed_by_sandbox() {
        let h = harness();
        let payment = h
            .orchestrator
            .create_card_payment(CreateCardChargeCommand {
                charge: charge(50.0, None),
                billing_type: BillingType::CreditCard,
                payment: card("4111111111111111"),
            })
            .await
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Confirmed);
        assert_eq!(payment.card.unwrap().last_four, "1111");
    }

    #[tokio::test]
    async fn status_of_local_payment_includes_live_status() {
        let h = harness();
        let gateway_payment = h
            .orchestrator
            .create_pix_payment(charge(100.0, None))
            .await
            .unwrap();
        let payment = seed_payment(&h, &gateway_payment.id).await;

        let view = h
            .orchestrator
            .get_payment_status(&payment.id.to_string())
            .await
            .unwrap();

        assert_eq!(view.source, StatusSource::Ledger);
        assert_eq!(view.status, PaymentStatus::AwaitingPayment);
        assert_eq!(view.gateway_status, Some(PaymentStatus::AwaitingPayment));
    }

    #[tokio::test]
    async fn status_survives_gateway_lookup_failure() {
        let h = harness();
        let payment = seed_payment(&h, "pay_missing").await;
        h.gateway.fail_next_calls(1);

        let view = h
            .orchestrator
            .get_payment_status(&payment.id.to_string())
            .await
            .unwrap();

        assert_eq!(view.status, PaymentStatus::AwaitingPayment);
        assert_eq!(view.gateway_status, None);
    }

    #[tokio::test]
    async fn status_falls_back_to_gateway_id() {
        let h = harness();
        let gateway_payment = h
            .orchestrator
            .create_pix_payment(charge(100.0, None))
            .await
            .unwrap();

        let view = h
            .orchestrator
            .get_payment_status(&gateway_payment.id)
            .await
            .unwrap();

        assert_eq!(view.source, StatusSource::Gateway);
        assert_eq!(view.payment_id, None);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let h = harness();
        let err = h
            .orchestrator
            .get_payment_status("pay_nowhere")
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentFlowError::NotFound { .. }));
    }
}
