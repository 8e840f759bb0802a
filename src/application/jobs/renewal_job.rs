use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::{
    application::usecases::renewals::RenewalUseCase,
    config::config_model::{JobsConfig, RenewalJobConfig},
    domain::value_objects::renewals::RenewalResult,
};

#[derive(Debug, Clone, Serialize)]
pub struct RenewalJobStatus {
    pub is_running: bool,
    pub config: RenewalJobConfig,
}

/// Owns the recurring renewal timer. The scheduled tick and the manual
/// trigger share the same single-pass entry point, and one in-flight guard
/// makes a concurrent second pass a no-op instead of a double charge.
pub struct RenewalJob {
    usecase: Arc<RenewalUseCase>,
    config: Arc<RwLock<JobsConfig>>,
    worker: Mutex<Option<(watch::Sender<bool>, JoinHandle<()>)>>,
    pass_guard: Arc<Mutex<()>>,
}

/// Guarded pass shared by the worker loop and `run_once`. A held guard means
/// another pass is mid-flight; the caller gets an empty report.
async fn run_pass(
    usecase: &RenewalUseCase,
    config: &RwLock<JobsConfig>,
    pass_guard: &Mutex<()>,
) -> RenewalResult {
    let Ok(_guard) = pass_guard.try_lock() else {
        warn!("renewal job: pass already in flight, skipping concurrent run");
        return RenewalResult::default();
    };

    let job_config = config.read().await.renewal_job.clone();
    usecase.run_once(&job_config).await
}

impl RenewalJob {
    pub fn new(usecase: Arc<RenewalUseCase>, config: Arc<RwLock<JobsConfig>>) -> Self {
        Self {
            usecase,
            config,
            worker: Mutex::new(None),
            pass_guard: Arc::new(Mutex::new(())),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.worker
            .lock()
            .await
            .as_ref()
            .is_some_and(|(_, handle)| !handle.is_finished())
    }

    pub async fn status(&self) -> RenewalJobStatus {
        RenewalJobStatus {
            is_running: self.is_running().await,
            config: self.config.read().await.renewal_job.clone(),
        }
    }

    /// Runs one pass immediately, then re-arms on the configured interval.
    /// Starting an already-running job is a logged no-op.
    pub async fn start(&self) {
        let mut worker = self.worker.lock().await;
        if worker.as_ref().is_some_and(|(_, handle)| !handle.is_finished()) {
            info!("renewal job: already running, start ignored");
            return;
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let usecase = Arc::clone(&self.usecase);
        let config = Arc::clone(&self.config);
        let pass_guard = Arc::clone(&self.pass_guard);
        let handle = tokio::spawn(async move {
            info!("renewal job: started");
            run_pass(&usecase, &config, &pass_guard).await;

            loop {
                // Interval is re-read every lap so config updates apply
                // without a restart.
                let interval =
                    Duration::from_millis(config.read().await.renewal_job.check_interval_ms);
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        run_pass(&usecase, &config, &pass_guard).await;
                    }
                    _ = shutdown_rx.changed() => {
                        info!("renewal job: shutdown signal received");
                        break;
                    }
                }
            }
        });

        *worker = Some((shutdown_tx, handle));
    }

    /// Signals the loop and waits for it to wind down; a pass already in
    /// flight finishes first. Stopping a stopped job is a no-op.
    pub async fn stop(&self) {
        let Some((shutdown_tx, handle)) = self.worker.lock().await.take() else {
            info!("renewal job: not running, stop ignored");
            return;
        };

        let _ = shutdown_tx.send(true);
        if let Err(err) = handle.await {
            warn!(error = ?err, "renewal job: worker task ended abnormally");
        }
        info!("renewal job: stopped");
    }

    /// Single-pass entry point shared by the timer and the manual trigger.
    pub async fn run_once(&self) -> RenewalResult {
        run_pass(&self.usecase, &self.config, &self.pass_guard).await
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

    fn shared_config(check_interval_ms: u64) -> Arc<RwLock<JobsConfig>> {
        Arc::new(RwLock::new(JobsConfig {
            enable_renewal_job: true,
            renewal_job: RenewalJobConfig {
                check_interval_ms,
                ..RenewalJobConfig::default()
            },
        }))
    }

    fn usecase_with(subscriptions: MockSubscriptionRepository) -> Arc<RenewalUseCase> {
        Arc::new(RenewalUseCase::new(
            Arc::new(subscriptions),
            Arc::new(MockPaymentTransactionRepository::new()),
            Arc::new(MockPaymentMethodRepository::new()),
            Arc::new(MockPaymentGateway::new()),
            Arc::new(MockSuspensionNotifier::new()),
        ))
    }

    #[tokio::test]
    async fn test_start_runs_immediate_pass_and_stop_halts_worker() {
        let mut subscriptions = MockSubscriptionRepository::new();
        subscriptions.expect_expire_lapsed().returning(|_| Ok(0));
        // exactly the immediate pass; the interval is an hour
        subscriptions
            .expect_list_due_for_renewal()
            .times(1)
            .returning(|_| Ok(vec![]));

        let job = RenewalJob::new(usecase_with(subscriptions), shared_config(3_600_000));

        job.start().await;
        assert!(job.is_running().await);

        // second start must not spawn a second worker (and with it a second
        // immediate pass, which would trip the times(1) above)
        job.start().await;

        job.stop().await;
        assert!(!job.is_running().await);
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let job = RenewalJob::new(
            usecase_with(MockSubscriptionRepository::new()),
            shared_config(3_600_000),
        );

        job.stop().await;
        assert!(!job.is_running().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_run_once_is_a_noop() {
        let mut subscriptions = MockSubscriptionRepository::new();
        subscriptions.expect_expire_lapsed().returning(|_| Ok(0));
        // the first pass parks here long enough for the second call to
        // observe the held guard
        subscriptions
            .expect_list_due_for_renewal()
            .times(1)
            .returning(|_| {
                std::thread::sleep(std::time::Duration::from_millis(300));
                Ok(vec![])
            });

        let job = Arc::new(RenewalJob::new(
            usecase_with(subscriptions),
            shared_config(3_600_000),
        ));

        let first = {
            let job = Arc::clone(&job);
            tokio::spawn(async move { job.run_once().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = job.run_once().await;
        assert_eq!(second, RenewalResult::default());

        first.await.unwrap();
    }
}
