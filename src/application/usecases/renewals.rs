use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    application::interfaces::{gateway::PaymentGateway, notifications::SuspensionNotifier},
    config::config_model::RenewalJobConfig,
    domain::{
        entities::{
            payment_transactions::InsertPaymentTransactionEntity,
            subscriptions::SubscriptionEntity,
        },
        repositories::{
            payment_methods::PaymentMethodRepository,
            payment_transactions::PaymentTransactionRepository,
            subscriptions::SubscriptionRepository,
        },
        value_objects::{
            enums::{
                billing_cycles::BillingCycle, subscription_statuses::SubscriptionStatus,
                transaction_statuses::TransactionStatus, transaction_types::TransactionType,
            },
            payments::ChargeOutcome,
            renewals::{RenewalOutcome, RenewalResult},
        },
    },
};

/// Upper bound on one token charge; the gateway call has no timeout of its
/// own and a hung charge must become a retryable failure, not a stuck pass.
const CHARGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Throttle between candidates so a large pass does not hammer the gateway.
const DELAY_BETWEEN_CANDIDATES: Duration = Duration::from_secs(1);

pub struct RenewalUseCase {
    subscription_repo: Arc<dyn SubscriptionRepository>,
    transaction_repo: Arc<dyn PaymentTransactionRepository>,
    payment_method_repo: Arc<dyn PaymentMethodRepository>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn SuspensionNotifier>,
}

impl RenewalUseCase {
    pub fn new(
        subscription_repo: Arc<dyn SubscriptionRepository>,
        transaction_repo: Arc<dyn PaymentTransactionRepository>,
        payment_method_repo: Arc<dyn PaymentMethodRepository>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn SuspensionNotifier>,
    ) -> Self {
        Self {
            subscription_repo,
            transaction_repo,
            payment_method_repo,
            gateway,
            notifier,
        }
    }

    /// One renewal pass: housekeeping, candidate selection, sequential
    /// per-subscription processing, reconciliation. Never fails outright —
    /// problems land in the returned report's `errors`.
    pub async fn run_once(&self, config: &RenewalJobConfig) -> RenewalResult {
        let mut result = RenewalResult::default();

        match self.subscription_repo.expire_lapsed(Utc::now()).await {
            Ok(0) => {}
            Ok(expired) => info!(expired, "renewals: expired lapsed subscriptions"),
            Err(err) => {
                error!(error = ?err, "renewals: failed to expire lapsed subscriptions");
                result.errors.push(format!("expire lapsed failed: {err}"));
            }
        }

        let candidates = match self
            .subscription_repo
            .list_due_for_renewal(config.days_before_expiry)
            .await
        {
            Ok(candidates) => candidates,
            Err(err) => {
                error!(error = ?err, "renewals: candidate query failed, aborting pass");
                result.errors.push(format!("candidate query failed: {err}"));
                return result;
            }
        };

        if candidates.is_empty() {
            info!("renewals: no subscriptions due for renewal");
            return result;
        }

        result.total_checked = candidates.len();
        info!(
            candidates = result.total_checked,
            days_before_expiry = config.days_before_expiry,
            "renewals: starting pass"
        );

        for (index, subscription) in candidates.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(DELAY_BETWEEN_CANDIDATES).await;
            }

            match self.process_subscription(subscription, config).await {
                Ok(RenewalOutcome::Renewed) => result.successful_renewals += 1,
                Ok(RenewalOutcome::Skipped(reason)) => {
                    info!(
                        subscription_id = %subscription.id,
                        reason = %reason,
                        "renewals: candidate skipped"
                    );
                    result.skipped_renewals += 1;
                }
                Ok(RenewalOutcome::RetryScheduled) => {
                    result.failed_renewals += 1;
                    result.errors.push(format!(
                        "subscription {}: charge failed, retry scheduled",
                        subscription.id
                    ));
                }
                Ok(RenewalOutcome::Suspended) => {
                    result.failed_renewals += 1;
                    result.errors.push(format!(
                        "subscription {}: suspended after exhausting retries",
                        subscription.id
                    ));
                }
                Ok(RenewalOutcome::AutoRenewalDisabled) => {
                    result.failed_renewals += 1;
                    result.errors.push(format!(
                        "subscription {}: no active default payment method, auto-renewal disabled",
                        subscription.id
                    ));
                }
                Err(err) => {
                    error!(
                        subscription_id = %subscription.id,
                        error = ?err,
                        "renewals: candidate processing failed"
                    );
                    result.failed_renewals += 1;
                    result
                        .errors
                        .push(format!("subscription {}: {err}", subscription.id));
                }
            }
        }

        match self.reconcile_unapplied_renewals().await {
            Ok(0) => {}
            Ok(repaired) => info!(repaired, "renewals: repaired unapplied renewals"),
            Err(err) => {
                error!(error = ?err, "renewals: reconciliation failed");
                result.errors.push(format!("reconciliation failed: {err}"));
            }
        }

        info!(
            total_checked = result.total_checked,
            successful = result.successful_renewals,
            failed = result.failed_renewals,
            skipped = result.skipped_renewals,
            "renewals: pass finished"
        );

        result
    }

    /// The per-subscription state machine:
    /// eligible -> charging -> renewed | retry-scheduled | suspended.
    pub async fn process_subscription(
        &self,
        subscription: &SubscriptionEntity,
        config: &RenewalJobConfig,
    ) -> Result<RenewalOutcome> {
        if subscription.status_enum() != Some(SubscriptionStatus::Active) {
            return Ok(RenewalOutcome::Skipped(format!(
                "status is {}",
                subscription.status
            )));
        }
        if !subscription.auto_renewal {
            return Ok(RenewalOutcome::Skipped("auto-renewal disabled".to_string()));
        }
        if subscription.billing_cycle_enum() == Some(BillingCycle::OneTime) {
            return Ok(RenewalOutcome::Skipped(
                "one-time subscriptions do not renew".to_string(),
            ));
        }

        let payment_method = self
            .payment_method_repo
            .find_default_active(subscription.user_id)
            .await
            .context("failed to load default payment method")?;

        let Some(payment_method) = payment_method else {
            // Invariant repair: auto-renewal without a chargeable method is
            // cleared instead of failing forever. The retry counter stays
            // untouched — there is nothing to retry with.
            warn!(
                subscription_id = %subscription.id,
                user_id = %subscription.user_id,
                "renewals: no active default payment method, disabling auto-renewal"
            );
            self.subscription_repo
                .disable_auto_renewal(
                    subscription.id,
                    "no active default payment method at renewal time".to_string(),
                )
                .await
                .context("failed to disable auto-renewal")?;
            return Ok(RenewalOutcome::AutoRenewalDisabled);
        };

        info!(
            subscription_id = %subscription.id,
            payment_method_id = %payment_method.id,
            amount = subscription.amount,
            currency = %subscription.currency,
            "renewals: charging stored payment method"
        );

        let outcome = match tokio::time::timeout(
            CHARGE_TIMEOUT,
            self.gateway
                .charge_stored_token(&payment_method, subscription.amount, &subscription.currency),
        )
        .await
        {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => ChargeOutcome::failed(format!("charge request failed: {err}")),
            Err(_) => ChargeOutcome::failed(format!(
                "charge timed out after {}s",
                CHARGE_TIMEOUT.as_secs()
            )),
        };

        if outcome.success {
            self.handle_charge_success(subscription, &payment_method.id, outcome)
                .await
        } else {
            self.handle_charge_failure(subscription, config, outcome)
                .await
        }
    }

    async fn handle_charge_success(
        &self,
        subscription: &SubscriptionEntity,
        payment_method_id: &Uuid,
        outcome: ChargeOutcome,
    ) -> Result<RenewalOutcome> {
        self.transaction_repo
            .create(InsertPaymentTransactionEntity {
                subscription_id: Some(subscription.id),
                user_id: subscription.user_id,
                amount: subscription.amount,
                currency: subscription.currency.clone(),
                method: "card".to_string(),
                transaction_type: TransactionType::Renewal.to_string(),
                status: TransactionStatus::Completed.to_string(),
                txn_ref: Uuid::new_v4().simple().to_string(),
                gateway_txn_no: outcome.transaction_id.clone(),
                gateway_response: None,
                payment_date: Some(Utc::now()),
                failure_reason: None,
            })
            .await
            .context("failed to record completed renewal transaction")?;

        let renewed = self
            .subscription_repo
            .record_renewal(subscription.id)
            .await
            .context("failed to extend subscription period")?;

        info!(
            subscription_id = %subscription.id,
            payment_method_id = %payment_method_id,
            gateway_txn_no = ?outcome.transaction_id,
            new_period_end = %renewed.current_period_end,
            "renewals: subscription renewed"
        );

        Ok(RenewalOutcome::Renewed)
    }

    async fn handle_charge_failure(
        &self,
        subscription: &SubscriptionEntity,
        config: &RenewalJobConfig,
        outcome: ChargeOutcome,
    ) -> Result<RenewalOutcome> {
        let reason = outcome
            .error
            .unwrap_or_else(|| "charge declined".to_string());

        self.transaction_repo
            .create(InsertPaymentTransactionEntity {
                subscription_id: Some(subscription.id),
                user_id: subscription.user_id,
                amount: subscription.amount,
                currency: subscription.currency.clone(),
                method: "card".to_string(),
                transaction_type: TransactionType::Renewal.to_string(),
                status: TransactionStatus::Failed.to_string(),
                txn_ref: Uuid::new_v4().simple().to_string(),
                gateway_txn_no: None,
                gateway_response: None,
                payment_date: None,
                failure_reason: Some(reason.clone()),
            })
            .await
            .context("failed to record failed renewal transaction")?;

        let attempts = subscription.retry_count + 1;
        if attempts >= config.max_retry_attempts {
            warn!(
                subscription_id = %subscription.id,
                attempts,
                max_retry_attempts = config.max_retry_attempts,
                reason = %reason,
                "renewals: retries exhausted, suspending subscription"
            );
            self.subscription_repo
                .suspend(subscription.id, reason.clone())
                .await
                .context("failed to suspend subscription")?;
            self.notifier
                .subscription_suspended(subscription, &reason)
                .await;
            return Ok(RenewalOutcome::Suspended);
        }

        let next_retry_at = Utc::now() + chrono::Duration::milliseconds(config.retry_delay_ms as i64);
        info!(
            subscription_id = %subscription.id,
            attempts,
            next_retry_at = %next_retry_at,
            reason = %reason,
            "renewals: charge failed, retry scheduled"
        );
        self.subscription_repo
            .schedule_retry(subscription.id, attempts, next_retry_at, reason)
            .await
            .context("failed to schedule retry")?;

        Ok(RenewalOutcome::RetryScheduled)
    }

    /// Repairs completed renewal ledger rows whose period extension never
    /// landed (crash between ledger write and subscription update).
    async fn reconcile_unapplied_renewals(&self) -> Result<usize> {
        let orphans = self.transaction_repo.list_unapplied_renewals().await?;
        let mut repaired = 0;

        for orphan in orphans {
            match self
                .subscription_repo
                .record_renewal(orphan.subscription_id)
                .await
            {
                Ok(_) => {
                    warn!(
                        subscription_id = %orphan.subscription_id,
                        transaction_id = %orphan.transaction_id,
                        "renewals: re-applied period extension for orphaned ledger row"
                    );
                    repaired += 1;
                }
                Err(err) => {
                    error!(
                        subscription_id = %orphan.subscription_id,
                        transaction_id = %orphan.transaction_id,
                        error = ?err,
                        "renewals: failed to repair orphaned ledger row"
                    );
                }
            }
        }

        Ok(repaired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        application::interfaces::{
            gateway::MockPaymentGateway, notifications::MockSuspensionNotifier,
        },
        domain::{
            entities::payment_methods::PaymentMethodEntity,
            repositories::{
                payment_methods::MockPaymentMethodRepository,
                payment_transactions::MockPaymentTransactionRepository,
                subscriptions::MockSubscriptionRepository,
            },
        },
    };
    use chrono::{Duration as ChronoDuration, Utc};

    fn job_config() -> RenewalJobConfig {
        RenewalJobConfig {
            check_interval_ms: 60_000,
            days_before_expiry: 3,
            max_retry_attempts: 3,
            retry_delay_ms: 3_600_000,
        }
    }

    fn sample_subscription() -> SubscriptionEntity {
        let now = Utc::now();
        SubscriptionEntity {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            plan_type: "premium".to_string(),
            status: "active".to_string(),
            amount: 150,
            currency: "USD".to_string(),
            billing_cycle: "monthly".to_string(),
            current_period_start: now - ChronoDuration::days(30),
            current_period_end: now + ChronoDuration::days(1),
            next_billing_date: Some(now + ChronoDuration::days(1)),
            auto_renewal: true,
            grace_period_days: 7,
            retry_count: 0,
            next_retry_at: None,
            last_renewal_error: None,
            auto_renewal_disabled_reason: None,
            suspended_at: None,
            created_at: now - ChronoDuration::days(30),
            updated_at: now,
        }
    }

    fn payment_method(user_id: Uuid) -> PaymentMethodEntity {
        PaymentMethodEntity {
            id: Uuid::new_v4(),
            user_id,
            subscription_id: None,
            gateway_token: "tok_stored".to_string(),
            card_brand: Some("visa".to_string()),
            card_last4: Some("4242".to_string()),
            card_expiry: Some("12/27".to_string()),
            is_active: true,
            is_default: true,
            created_at: Utc::now(),
        }
    }

    struct Mocks {
        subscriptions: MockSubscriptionRepository,
        transactions: MockPaymentTransactionRepository,
        payment_methods: MockPaymentMethodRepository,
        gateway: MockPaymentGateway,
        notifier: MockSuspensionNotifier,
    }

    impl Mocks {
        fn new() -> Self {
            Self {
                subscriptions: MockSubscriptionRepository::new(),
                transactions: MockPaymentTransactionRepository::new(),
                payment_methods: MockPaymentMethodRepository::new(),
                gateway: MockPaymentGateway::new(),
                notifier: MockSuspensionNotifier::new(),
            }
        }

        fn into_usecase(self) -> RenewalUseCase {
            RenewalUseCase::new(
                Arc::new(self.subscriptions),
                Arc::new(self.transactions),
                Arc::new(self.payment_methods),
                Arc::new(self.gateway),
                Arc::new(self.notifier),
            )
        }
    }

    #[tokio::test]
    async fn test_skips_subscription_without_auto_renewal() {
        let mut mocks = Mocks::new();
        // the gateway must never see ineligible subscriptions
        mocks.gateway.expect_charge_stored_token().times(0);
        mocks.payment_methods.expect_find_default_active().times(0);

        let mut subscription = sample_subscription();
        subscription.auto_renewal = false;

        let outcome = mocks
            .into_usecase()
            .process_subscription(&subscription, &job_config())
            .await
            .unwrap();

        assert!(matches!(outcome, RenewalOutcome::Skipped(_)));
    }

    #[tokio::test]
    async fn test_skips_one_time_subscription() {
        let mut mocks = Mocks::new();
        mocks.gateway.expect_charge_stored_token().times(0);
        mocks.payment_methods.expect_find_default_active().times(0);

        let mut subscription = sample_subscription();
        subscription.billing_cycle = "one_time".to_string();

        let outcome = mocks
            .into_usecase()
            .process_subscription(&subscription, &job_config())
            .await
            .unwrap();

        assert!(matches!(outcome, RenewalOutcome::Skipped(_)));
    }

    #[tokio::test]
    async fn test_skips_non_active_subscription() {
        let mut mocks = Mocks::new();
        mocks.gateway.expect_charge_stored_token().times(0);
        mocks.payment_methods.expect_find_default_active().times(0);

        let mut subscription = sample_subscription();
        subscription.status = "suspended".to_string();

        let outcome = mocks
            .into_usecase()
            .process_subscription(&subscription, &job_config())
            .await
            .unwrap();

        assert!(matches!(outcome, RenewalOutcome::Skipped(_)));
    }

    #[tokio::test]
    async fn test_missing_payment_method_disables_auto_renewal_without_retry() {
        let mut mocks = Mocks::new();
        let subscription = sample_subscription();
        let subscription_id = subscription.id;

        mocks
            .payment_methods
            .expect_find_default_active()
            .times(1)
            .returning(|_| Ok(None));
        mocks
            .subscriptions
            .expect_disable_auto_renewal()
            .withf(move |id, reason| *id == subscription_id && reason.contains("payment method"))
            .times(1)
            .returning(|_, _| Ok(()));
        // no charge, no retry bookkeeping
        mocks.gateway.expect_charge_stored_token().times(0);
        mocks.subscriptions.expect_schedule_retry().times(0);

        let outcome = mocks
            .into_usecase()
            .process_subscription(&subscription, &job_config())
            .await
            .unwrap();

        assert_eq!(outcome, RenewalOutcome::AutoRenewalDisabled);
    }

    #[tokio::test]
    async fn test_successful_charge_extends_period_and_writes_ledger() {
        let mut mocks = Mocks::new();
        let subscription = sample_subscription();
        let subscription_id = subscription.id;
        let user_id = subscription.user_id;

        mocks
            .payment_methods
            .expect_find_default_active()
            .returning(move |_| Ok(Some(payment_method(user_id))));
        mocks
            .gateway
            .expect_charge_stored_token()
            .times(1)
            .returning(|_, _, _| Ok(ChargeOutcome::succeeded("GW-1".to_string())));
        mocks
            .transactions
            .expect_create()
            .withf(|tx| {
                tx.status == "completed"
                    && tx.transaction_type == "renewal"
                    && tx.gateway_txn_no.as_deref() == Some("GW-1")
            })
            .times(1)
            .returning(|_| Ok(Uuid::new_v4()));
        mocks
            .subscriptions
            .expect_record_renewal()
            .withf(move |id| *id == subscription_id)
            .times(1)
            .returning(|_| {
                let mut renewed = sample_subscription();
                renewed.retry_count = 0;
                Ok(renewed)
            });

        let outcome = mocks
            .into_usecase()
            .process_subscription(&subscription, &job_config())
            .await
            .unwrap();

        assert_eq!(outcome, RenewalOutcome::Renewed);
    }

    #[tokio::test]
    async fn test_failed_charge_schedules_retry_below_max_attempts() {
        let mut mocks = Mocks::new();
        let subscription = sample_subscription();
        let user_id = subscription.user_id;

        mocks
            .payment_methods
            .expect_find_default_active()
            .returning(move |_| Ok(Some(payment_method(user_id))));
        mocks
            .gateway
            .expect_charge_stored_token()
            .returning(|_, _, _| Ok(ChargeOutcome::failed("insufficient funds (51)")));
        mocks
            .transactions
            .expect_create()
            .withf(|tx| tx.status == "failed" && tx.failure_reason.is_some())
            .times(1)
            .returning(|_| Ok(Uuid::new_v4()));
        mocks
            .subscriptions
            .expect_schedule_retry()
            .withf(|_, retry_count, _, reason| {
                *retry_count == 1 && reason.contains("insufficient funds")
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        mocks.subscriptions.expect_suspend().times(0);
        mocks.notifier.expect_subscription_suspended().times(0);

        let outcome = mocks
            .into_usecase()
            .process_subscription(&subscription, &job_config())
            .await
            .unwrap();

        assert_eq!(outcome, RenewalOutcome::RetryScheduled);
    }

    #[tokio::test]
    async fn test_third_consecutive_failure_suspends() {
        let mut mocks = Mocks::new();
        let mut subscription = sample_subscription();
        // two failed passes already recorded
        subscription.retry_count = 2;
        let subscription_id = subscription.id;
        let user_id = subscription.user_id;

        mocks
            .payment_methods
            .expect_find_default_active()
            .returning(move |_| Ok(Some(payment_method(user_id))));
        mocks
            .gateway
            .expect_charge_stored_token()
            .returning(|_, _, _| Ok(ChargeOutcome::failed("card is locked (12)")));
        mocks
            .transactions
            .expect_create()
            .times(1)
            .returning(|_| Ok(Uuid::new_v4()));
        mocks
            .subscriptions
            .expect_suspend()
            .withf(move |id, _| *id == subscription_id)
            .times(1)
            .returning(|_, _| Ok(()));
        mocks
            .notifier
            .expect_subscription_suspended()
            .times(1)
            .return_const(());
        mocks.subscriptions.expect_schedule_retry().times(0);

        let outcome = mocks
            .into_usecase()
            .process_subscription(&subscription, &job_config())
            .await
            .unwrap();

        assert_eq!(outcome, RenewalOutcome::Suspended);
    }

    #[tokio::test]
    async fn test_second_failure_does_not_suspend_early() {
        let mut mocks = Mocks::new();
        let mut subscription = sample_subscription();
        subscription.retry_count = 1;
        let user_id = subscription.user_id;

        mocks
            .payment_methods
            .expect_find_default_active()
            .returning(move |_| Ok(Some(payment_method(user_id))));
        mocks
            .gateway
            .expect_charge_stored_token()
            .returning(|_, _, _| Ok(ChargeOutcome::failed("insufficient funds (51)")));
        mocks
            .transactions
            .expect_create()
            .returning(|_| Ok(Uuid::new_v4()));
        mocks
            .subscriptions
            .expect_schedule_retry()
            .withf(|_, retry_count, _, _| *retry_count == 2)
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        mocks.subscriptions.expect_suspend().times(0);

        let outcome = mocks
            .into_usecase()
            .process_subscription(&subscription, &job_config())
            .await
            .unwrap();

        assert_eq!(outcome, RenewalOutcome::RetryScheduled);
    }

    #[tokio::test]
    async fn test_transport_error_feeds_retry_path() {
        let mut mocks = Mocks::new();
        let subscription = sample_subscription();
        let user_id = subscription.user_id;

        mocks
            .payment_methods
            .expect_find_default_active()
            .returning(move |_| Ok(Some(payment_method(user_id))));
        mocks
            .gateway
            .expect_charge_stored_token()
            .returning(|_, _, _| Err(anyhow::anyhow!("connection reset by peer")));
        mocks
            .transactions
            .expect_create()
            .withf(|tx| {
                tx.status == "failed"
                    && tx
                        .failure_reason
                        .as_deref()
                        .is_some_and(|r| r.contains("connection reset"))
            })
            .times(1)
            .returning(|_| Ok(Uuid::new_v4()));
        mocks
            .subscriptions
            .expect_schedule_retry()
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let outcome = mocks
            .into_usecase()
            .process_subscription(&subscription, &job_config())
            .await
            .unwrap();

        assert_eq!(outcome, RenewalOutcome::RetryScheduled);
    }

    #[tokio::test]
    async fn test_run_once_returns_zero_result_without_candidates() {
        let mut mocks = Mocks::new();
        mocks.subscriptions.expect_expire_lapsed().returning(|_| Ok(0));
        mocks
            .subscriptions
            .expect_list_due_for_renewal()
            .returning(|_| Ok(vec![]));

        let result = mocks.into_usecase().run_once(&job_config()).await;

        assert_eq!(result, RenewalResult::default());
    }

    #[tokio::test]
    async fn test_run_once_records_candidate_query_failure() {
        let mut mocks = Mocks::new();
        mocks.subscriptions.expect_expire_lapsed().returning(|_| Ok(0));
        mocks
            .subscriptions
            .expect_list_due_for_renewal()
            .returning(|_| Err(anyhow::anyhow!("connection pool exhausted")));

        let result = mocks.into_usecase().run_once(&job_config()).await;

        assert_eq!(result.total_checked, 0);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("candidate query failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_once_continues_after_candidate_error() {
        let mut mocks = Mocks::new();
        let healthy = sample_subscription();
        let mut broken = sample_subscription();
        broken.billing_cycle = "bogus".to_string();
        let healthy_user = healthy.user_id;

        mocks.subscriptions.expect_expire_lapsed().returning(|_| Ok(0));
        let candidates = vec![broken, healthy];
        mocks
            .subscriptions
            .expect_list_due_for_renewal()
            .return_once(move |_| Ok(candidates));
        mocks
            .transactions
            .expect_list_unapplied_renewals()
            .returning(|| Ok(vec![]));

        // the broken candidate has an unknown cycle: the payment-method and
        // charge path still runs, gateway succeeds, but period extension
        // fails inside record_renewal
        mocks
            .payment_methods
            .expect_find_default_active()
            .returning(move |_| Ok(Some(payment_method(healthy_user))));
        mocks
            .gateway
            .expect_charge_stored_token()
            .returning(|_, _, _| Ok(ChargeOutcome::succeeded("GW-2".to_string())));
        mocks
            .transactions
            .expect_create()
            .returning(|_| Ok(Uuid::new_v4()));
        let mut record_renewal_calls = 0;
        mocks
            .subscriptions
            .expect_record_renewal()
            .times(2)
            .returning(move |_| {
                record_renewal_calls += 1;
                if record_renewal_calls == 1 {
                    Err(anyhow::anyhow!("unknown billing cycle: bogus"))
                } else {
                    Ok(sample_subscription())
                }
            });

        let result = mocks.into_usecase().run_once(&job_config()).await;

        assert_eq!(result.total_checked, 2);
        assert_eq!(result.successful_renewals, 1);
        assert_eq!(result.failed_renewals, 1);
        assert_eq!(result.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_end_to_end_success_scenario() {
        let mut mocks = Mocks::new();
        let candidate = sample_subscription();
        let user_id = candidate.user_id;

        mocks.subscriptions.expect_expire_lapsed().returning(|_| Ok(0));
        let candidates = vec![candidate];
        mocks
            .subscriptions
            .expect_list_due_for_renewal()
            .return_once(move |_| Ok(candidates));
        mocks
            .payment_methods
            .expect_find_default_active()
            .returning(move |_| Ok(Some(payment_method(user_id))));
        mocks
            .gateway
            .expect_charge_stored_token()
            .returning(|_, _, _| Ok(ChargeOutcome::succeeded("GW-3".to_string())));
        mocks
            .transactions
            .expect_create()
            .withf(|tx| tx.status == "completed")
            .times(1)
            .returning(|_| Ok(Uuid::new_v4()));
        mocks
            .subscriptions
            .expect_record_renewal()
            .times(1)
            .returning(|_| {
                let mut renewed = sample_subscription();
                renewed.retry_count = 0;
                Ok(renewed)
            });
        mocks
            .transactions
            .expect_list_unapplied_renewals()
            .returning(|| Ok(vec![]));

        let result = mocks.into_usecase().run_once(&job_config()).await;

        assert_eq!(result.successful_renewals, 1);
        assert_eq!(result.failed_renewals, 0);
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn test_reconciliation_repairs_orphaned_ledger_rows() {
        let mut mocks = Mocks::new();
        let orphan_subscription = Uuid::new_v4();
        let candidate = sample_subscription();
        let user_id = candidate.user_id;
        mocks.subscriptions.expect_expire_lapsed().returning(|_| Ok(0));
        let candidates = vec![candidate];
        mocks
            .subscriptions
            .expect_list_due_for_renewal()
            .return_once(move |_| Ok(candidates));
        mocks
            .payment_methods
            .expect_find_default_active()
            .returning(move |_| Ok(Some(payment_method(user_id))));
        mocks
            .gateway
            .expect_charge_stored_token()
            .returning(|_, _, _| Ok(ChargeOutcome::succeeded("GW-4".to_string())));
        mocks
            .transactions
            .expect_create()
            .returning(|_| Ok(Uuid::new_v4()));
        // one renewal from the candidate, one from the orphan repair
        mocks
            .subscriptions
            .expect_record_renewal()
            .times(2)
            .returning(|_| Ok(sample_subscription()));
        mocks
            .transactions
            .expect_list_unapplied_renewals()
            .returning(move || {
                Ok(vec![
                    crate::domain::repositories::payment_transactions::UnappliedRenewal {
                        transaction_id: Uuid::new_v4(),
                        subscription_id: orphan_subscription,
                    },
                ])
            });

        let result = mocks.into_usecase().run_once(&job_config()).await;

        assert_eq!(result.successful_renewals, 1);
        assert!(result.errors.is_empty());
    }
}
