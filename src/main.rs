use anyhow::Result;
use async_taskpool::{
    collector::ResultCollector,
    generator::{forward_tasks, GeneratorConfig, TaskGenerator},
    Config, DispatchOrder, WorkerPoolInner,
};
use clap::Parser;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};


#[derive(Debug, Parser)]
#[command(name = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
        about = env!("CARGO_PKG_DESCRIPTION"))]
struct Cli {
    /// Число воркеров
    #[arg(long, default_value_t = 5)]
    workers: usize,

    /// Сколько секунд генерировать задачи
    #[arg(long, default_value_t = 10)]
    run_secs: u64,

    /// Вероятность имитируемой ошибки обработки
    #[arg(long, default_value_t = 0.1)]
    failure_rate: f64,

    /// Интервал монитора в миллисекундах
    #[arg(long, default_value_t = 2000)]
    monitor_ms: u64,

    /// Выдавать задачи по приоритету, а не FIFO
    #[arg(long)]
    priority: bool,

    /// Seed генератора задач
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "async_taskpool=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config {
        num_workers: cli.workers,
        failure_rate: cli.failure_rate,
        monitor_interval: Duration::from_millis(cli.monitor_ms),
        dispatch: if cli.priority { DispatchOrder::Priority } else { DispatchOrder::Fifo },
        ..Default::default()
    };

    let pool = WorkerPoolInner::with_config(config)?;
    pool.start();

    let run = CancellationToken::new();
    let generator = TaskGenerator::new(GeneratorConfig {
        seed: cli.seed,
        ..Default::default()
    });
    let (tasks, generated) = generator.spawn(run.clone());
    let forwarder = forward_tasks(pool.clone(), tasks);

    let shutdown = CancellationToken::new();
    let collector = tokio::spawn(ResultCollector::new(pool.results(), pool.errors()).run(shutdown.clone()));

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(cli.run_secs)) => {
            tracing::info!("run time elapsed");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted");
            shutdown.cancel();
        }
    }
    run.cancel();

    let generated = generated.await?;
    let unclaimed = pool.stop().await;
    let forwarded = forwarder.await?;
    let summary = collector.await?;

    let (active, completed) = pool.get_stats();
    tracing::info!(
        generated,
        submitted = forwarded.submitted,
        unclaimed = unclaimed.len(),
        collected = summary.total_results(),
        "run finished"
    );
    tracing::info!(active, completed, "final stats");
    Ok(())
}
