use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use crate::{
    application::{jobs::renewal_job::{RenewalJob, RenewalJobStatus}, usecases::renewals::RenewalUseCase},
    config::config_model::JobsConfig,
    config::stage::Stage,
    domain::value_objects::renewals::RenewalResult,
};

#[derive(Debug, Clone, Serialize)]
pub struct JobsStatus {
    pub is_initialized: bool,
    pub config: JobsConfig,
    pub renewal_job: RenewalJobStatus,
}

/// Partial configuration update; absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobsConfigUpdate {
    pub enable_renewal_job: Option<bool>,
    pub check_interval_ms: Option<u64>,
    pub days_before_expiry: Option<i64>,
    pub max_retry_attempts: Option<i32>,
    pub retry_delay_ms: Option<u64>,
}

/// Job lifecycle owner, constructed once at the composition root and handed
/// to whoever needs it. The scheduler only self-arms in production (or under
/// an explicit opt-in); everywhere else the job stays manually runnable.
pub struct JobsManager {
    config: Arc<RwLock<JobsConfig>>,
    job: Arc<RenewalJob>,
    stage: Stage,
    force_schedule: bool,
    initialized: AtomicBool,
}

impl JobsManager {
    pub fn new(
        config: JobsConfig,
        stage: Stage,
        force_schedule: bool,
        usecase: Arc<RenewalUseCase>,
    ) -> Self {
        let config = Arc::new(RwLock::new(config));
        let job = Arc::new(RenewalJob::new(usecase, Arc::clone(&config)));

        Self {
            config,
            job,
            stage,
            force_schedule,
            initialized: AtomicBool::new(false),
        }
    }

    fn scheduling_permitted(&self) -> bool {
        self.stage.allows_scheduling() || self.force_schedule
    }

    /// Idempotent: the first call wires everything up, later calls no-op.
    pub async fn initialize(&self) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            info!("jobs manager: already initialized");
            return;
        }

        let enabled = self.config.read().await.enable_renewal_job;
        if !enabled {
            info!("jobs manager: renewal job disabled by configuration");
            return;
        }
        if !self.scheduling_permitted() {
            info!(
                stage = %self.stage,
                "jobs manager: stage does not permit scheduling, renewal job stays manual-only"
            );
            return;
        }

        self.job.start().await;
        info!("jobs manager: initialized");
    }

    pub async fn shutdown(&self) {
        if !self.initialized.swap(false, Ordering::SeqCst) {
            info!("jobs manager: not initialized, shutdown ignored");
            return;
        }

        self.job.stop().await;
        info!("jobs manager: shut down");
    }

    /// Admin trigger: one pass now, timer untouched.
    pub async fn run_manually(&self) -> RenewalResult {
        info!("jobs manager: manual renewal pass requested");
        self.job.run_once().await
    }

    pub async fn status(&self) -> JobsStatus {
        JobsStatus {
            is_initialized: self.initialized.load(Ordering::SeqCst),
            config: self.config.read().await.clone(),
            renewal_job: self.job.status().await,
        }
    }

    /// Merges the partial update. The running job reads interval and
    /// thresholds at the start of every lap, so nothing needs a restart;
    /// flipping the enable switch starts or stops the worker.
    pub async fn update_config(&self, update: JobsConfigUpdate) {
        let enabled_now = {
            let mut config = self.config.write().await;
            if let Some(enable_renewal_job) = update.enable_renewal_job {
                config.enable_renewal_job = enable_renewal_job;
            }
            if let Some(check_interval_ms) = update.check_interval_ms {
                config.renewal_job.check_interval_ms = check_interval_ms;
            }
            if let Some(days_before_expiry) = update.days_before_expiry {
                config.renewal_job.days_before_expiry = days_before_expiry;
            }
            if let Some(max_retry_attempts) = update.max_retry_attempts {
                config.renewal_job.max_retry_attempts = max_retry_attempts;
            }
            if let Some(retry_delay_ms) = update.retry_delay_ms {
                config.renewal_job.retry_delay_ms = retry_delay_ms;
            }
            config.enable_renewal_job
        };

        info!(enabled = enabled_now, "jobs manager: configuration updated");

        if !self.initialized.load(Ordering::SeqCst) {
            return;
        }

        if enabled_now && self.scheduling_permitted() {
            self.job.start().await;
        } else if !enabled_now {
            self.job.stop().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        application::interfaces::{
            gateway::MockPaymentGateway, notifications::MockSuspensionNotifier,
        },
        domain::repositories::{
            payment_methods::MockPaymentMethodRepository,
            payment_transactions::MockPaymentTransactionRepository,
            subscriptions::MockSubscriptionRepository,
        },
    };

    fn usecase_with(subscriptions: MockSubscriptionRepository) -> Arc<RenewalUseCase> {
        Arc::new(RenewalUseCase::new(
            Arc::new(subscriptions),
            Arc::new(MockPaymentTransactionRepository::new()),
            Arc::new(MockPaymentMethodRepository::new()),
            Arc::new(MockPaymentGateway::new()),
            Arc::new(MockSuspensionNotifier::new()),
        ))
    }

    fn idle_subscriptions() -> MockSubscriptionRepository {
        let mut subscriptions = MockSubscriptionRepository::new();
        subscriptions.expect_expire_lapsed().returning(|_| Ok(0));
        subscriptions
            .expect_list_due_for_renewal()
            .returning(|_| Ok(vec![]));
        subscriptions
    }

    #[tokio::test]
    async fn test_non_production_stage_does_not_self_schedule() {
        let manager = JobsManager::new(
            JobsConfig::default(),
            Stage::Local,
            false,
            usecase_with(MockSubscriptionRepository::new()),
        );

        manager.initialize().await;

        let status = manager.status().await;
        assert!(status.is_initialized);
        assert!(!status.renewal_job.is_running);
    }

    #[tokio::test]
    async fn test_production_stage_arms_the_timer() {
        let manager = JobsManager::new(
            JobsConfig::default(),
            Stage::Production,
            false,
            usecase_with(idle_subscriptions()),
        );

        manager.initialize().await;
        assert!(manager.status().await.renewal_job.is_running);

        manager.shutdown().await;
        let status = manager.status().await;
        assert!(!status.is_initialized);
        assert!(!status.renewal_job.is_running);
    }

    #[tokio::test]
    async fn test_force_schedule_overrides_stage() {
        let manager = JobsManager::new(
            JobsConfig::default(),
            Stage::Development,
            true,
            usecase_with(idle_subscriptions()),
        );

        manager.initialize().await;
        assert!(manager.status().await.renewal_job.is_running);
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let manager = JobsManager::new(
            JobsConfig::default(),
            Stage::Local,
            false,
            usecase_with(MockSubscriptionRepository::new()),
        );

        manager.initialize().await;
        manager.initialize().await;
        assert!(manager.status().await.is_initialized);
    }

    #[tokio::test]
    async fn test_shutdown_without_initialize_is_noop() {
        let manager = JobsManager::new(
            JobsConfig::default(),
            Stage::Local,
            false,
            usecase_with(MockSubscriptionRepository::new()),
        );

        manager.shutdown().await;
        assert!(!manager.status().await.is_initialized);
    }

    #[tokio::test]
    async fn test_run_manually_executes_a_pass_without_timer() {
        let manager = JobsManager::new(
            JobsConfig::default(),
            Stage::Local,
            false,
            usecase_with(idle_subscriptions()),
        );
        manager.initialize().await;

        let result = manager.run_manually().await;

        assert_eq!(result, RenewalResult::default());
        assert!(!manager.status().await.renewal_job.is_running);
    }

    #[tokio::test]
    async fn test_update_config_merges_partial_fields() {
        let manager = JobsManager::new(
            JobsConfig::default(),
            Stage::Local,
            false,
            usecase_with(MockSubscriptionRepository::new()),
        );

        manager
            .update_config(JobsConfigUpdate {
                check_interval_ms: Some(60_000),
                max_retry_attempts: Some(5),
                ..JobsConfigUpdate::default()
            })
            .await;

        let status = manager.status().await;
        assert_eq!(status.config.renewal_job.check_interval_ms, 60_000);
        assert_eq!(status.config.renewal_job.max_retry_attempts, 5);
        // untouched fields keep their defaults
        assert_eq!(status.config.renewal_job.days_before_expiry, 3);
    }

    #[tokio::test]
    async fn test_update_config_can_stop_running_job() {
        let manager = JobsManager::new(
            JobsConfig::default(),
            Stage::Production,
            false,
            usecase_with(idle_subscriptions()),
        );
        manager.initialize().await;
        assert!(manager.status().await.renewal_job.is_running);

        manager
            .update_config(JobsConfigUpdate {
                enable_renewal_job: Some(false),
                ..JobsConfigUpdate::default()
            })
            .await;

        assert!(!manager.status().await.renewal_job.is_running);
        manager.shutdown().await;
    }
}
