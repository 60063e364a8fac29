//! `accrual-daemons` — runs the event-processor and accrual-poll daemons in
//! one process, sharing the in-process pub/sub hint queue between them.

use std::sync::Arc;

use accrual_calculator_client::CalculatorClient;
use accrual_daemons::processor::Breakers;
use accrual_daemons::{poll, processor};
use accrual_orders_client::OrdersClient;
use accrual_pubsub::RedisQueue;
use accrual_runtime::{init_tracing, shutdown, CircuitBreaker, Config};
use accrual_store::PgEventRepository;
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config);

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    sqlx::query(accrual_store::SCHEMA).execute(&pool).await?;
    let repo = Arc::new(PgEventRepository::new(pool));

    let orders = Arc::new(OrdersClient::connect(config.gophermart_grpc_address.clone()).await?);
    let calculator = Arc::new(CalculatorClient::new(config.accrual_http_address.clone()));
    let queue = Arc::new(RedisQueue::connect(&config.redis_url, config.accruals_queue_name.clone())?);

    let processor_breakers = Breakers::default();
    let poll_breaker = CircuitBreaker::new();

    let (shutdown_tx, shutdown_rx) = shutdown::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let processor_handle = tokio::spawn(processor::run(
        repo.clone(),
        orders,
        calculator.clone(),
        queue.clone(),
        processor_breakers,
        config.daemon_poll_interval,
        config.daemon_workers_count,
        shutdown_rx.clone(),
    ));

    let poll_handle = tokio::spawn(poll::run(
        repo,
        calculator,
        queue,
        poll_breaker,
        config.daemon_workers_count,
        shutdown_rx,
    ));

    let _ = tokio::join!(processor_handle, poll_handle);
    tracing::info!("accrual-daemons exited cleanly");
    Ok(())
}
