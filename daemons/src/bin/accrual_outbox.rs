//! `accrual-outbox` — drains `accrual_*` rows and publishes them to the
//! outbound broker topic, keyed by order number.

use std::sync::Arc;

use accrual_broker::OutboxWriter;
use accrual_daemons::outbox;
use accrual_runtime::{init_tracing, shutdown, Config};
use accrual_store::PgEventRepository;
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config);

    let pool = PgPoolOptions::new()
        .max_connections(config.accruals_outbox_workers_count as u32 + 1)
        .connect(&config.database_url)
        .await?;
    sqlx::query(accrual_store::SCHEMA).execute(&pool).await?;
    let repo = Arc::new(PgEventRepository::new(pool));

    let writer = Arc::new(OutboxWriter::connect(&config.kafka_brokers, &config.kafka_accruals_topic)?);

    let (shutdown_tx, shutdown_rx) = shutdown::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    outbox::run(
        repo,
        writer,
        config.accruals_outbox_poll_interval,
        config.accruals_outbox_workers_count,
        shutdown_rx,
    )
    .await;

    tracing::info!("accrual-outbox exited cleanly");
    Ok(())
}
