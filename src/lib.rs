pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::{
    application::{
        interfaces::{gateway::PaymentGateway, notifications::LogSuspensionNotifier},
        jobs::jobs_manager::JobsManager,
        usecases::{payments::PaymentUseCase, renewals::RenewalUseCase},
    },
    config::{config_loader, stage::Stage},
    domain::repositories::{
        payment_methods::PaymentMethodRepository,
        payment_transactions::PaymentTransactionRepository,
        subscriptions::SubscriptionRepository,
    },
    infrastructure::{
        axum_http::http_serve,
        gateway::{redirect_client::RedirectGatewayClient, simulated::SimulatedGateway},
        postgres::{
            postgres_connection,
            repositories::{
                payment_methods::PaymentMethodPostgres,
                payment_transactions::PaymentTransactionPostgres,
                subscriptions::SubscriptionPostgres,
            },
        },
    },
};

pub async fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let dotenvy_env = config_loader::load()?;
    info!("ENV has been loaded");

    let stage = config_loader::get_stage();
    let force_schedule = config_loader::get_force_schedule();
    info!(stage = %stage, "Stage resolved");

    let postgres_pool = postgres_connection::establish_connection(&dotenvy_env.database.url)?;
    info!("Postgres connection has been established");
    let db_pool = Arc::new(postgres_pool);

    let subscription_repo: Arc<dyn SubscriptionRepository> =
        Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool)));
    let transaction_repo: Arc<dyn PaymentTransactionRepository> =
        Arc::new(PaymentTransactionPostgres::new(Arc::clone(&db_pool)));
    let payment_method_repo: Arc<dyn PaymentMethodRepository> =
        Arc::new(PaymentMethodPostgres::new(Arc::clone(&db_pool)));

    // Production requires real gateway credentials; elsewhere a simulated
    // gateway keeps the renewal paths exercisable without them.
    let gateway: Arc<dyn PaymentGateway> = match RedirectGatewayClient::new(
        dotenvy_env.gateway.clone(),
    ) {
        Ok(client) => Arc::new(client),
        Err(err) if stage != Stage::Production => {
            warn!(error = %err, "Gateway credentials missing, using simulated gateway");
            Arc::new(SimulatedGateway::new())
        }
        Err(err) => return Err(err.into()),
    };

    let renewal_usecase = Arc::new(RenewalUseCase::new(
        Arc::clone(&subscription_repo),
        Arc::clone(&transaction_repo),
        Arc::clone(&payment_method_repo),
        Arc::clone(&gateway),
        Arc::new(LogSuspensionNotifier),
    ));
    let payment_usecase = Arc::new(PaymentUseCase::new(
        subscription_repo,
        transaction_repo,
        payment_method_repo,
        gateway,
    ));

    let jobs_manager = Arc::new(JobsManager::new(
        dotenvy_env.jobs.clone(),
        stage,
        force_schedule,
        renewal_usecase,
    ));
    jobs_manager.initialize().await;

    http_serve::start(
        Arc::new(dotenvy_env),
        payment_usecase,
        Arc::clone(&jobs_manager),
    )
    .await?;

    jobs_manager.shutdown().await;

    Ok(())
}
