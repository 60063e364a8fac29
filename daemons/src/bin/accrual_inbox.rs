//! `accrual-inbox` — consumes the upstream `order_created` broker topic
//! into the durable event store. No CLI arguments; everything is read from
//! the environment (see `accrual_runtime::Config`).

use accrual_broker::InboxReader;
use accrual_daemons::inbox;
use accrual_runtime::{init_tracing, shutdown, Config};
use accrual_store::PgEventRepository;
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config);

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    sqlx::query(accrual_store::SCHEMA).execute(&pool).await?;
    let repo = PgEventRepository::new(pool);

    let reader = InboxReader::connect(
        &config.kafka_brokers,
        &config.kafka_order_created_group_id,
        &config.kafka_order_created_topic,
    )?;

    let (shutdown_tx, shutdown_rx) = shutdown::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    inbox::run(&reader, &repo, shutdown_rx).await;
    tracing::info!("accrual-inbox exited cleanly");
    Ok(())
}
