use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod assistant;
mod db;
mod error;
mod metrics;
mod models;

#[derive(Parser)]
#[command(name = "pulse-analytics")]
#[command(about = "Organizational pulse analytics service", long_about = None)]
struct Cli {
    /// Postgres connection string for the system of record
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 5)]
    max_connections: u32,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the analytics HTTP API
    Serve {
        #[arg(long, env = "HOST", default_value = "0.0.0.0")]
        host: String,
        #[arg(long, env = "PORT", default_value_t = 8000)]
        port: u16,
    },
    /// Print growth velocity, district heatmap and unit leaderboard
    Pulse {
        #[arg(long)]
        json: bool,
    },
    /// Ask the assistant a question
    Ask {
        #[arg(required = true)]
        query: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let pool = PgPoolOptions::new()
        .max_connections(cli.max_connections)
        .connect(&cli.database_url)
        .await
        .context("failed to connect to Postgres")?;

    let engine = metrics::PulseEngine::new(Arc::new(db::PgMetricsStore::new(pool.clone())));

    let outcome = run(cli.command, engine).await;
    pool.close().await;
    outcome
}

async fn run(command: Commands, engine: metrics::PulseEngine) -> anyhow::Result<()> {
    match command {
        Commands::Serve { host, port } => {
            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;
            tracing::info!("analytics service listening on {addr}");

            axum::serve(listener, api::router(engine))
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("HTTP server failed")?;
            tracing::info!("analytics service stopped");
        }
        Commands::Pulse { json } => {
            let pulse = engine.pulse().await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&pulse)?);
                return Ok(());
            }

            println!("Growth velocity: {:.2}% week-over-week", pulse.growth_velocity);
            println!();
            println!("District activity:");
            if pulse.heatmap.is_empty() {
                println!("- no activity recorded");
            }
            for district in pulse.heatmap.iter() {
                println!("- {}: {}", district.district_name, district.activity_count);
            }
            println!();
            println!("Top performing units:");
            if pulse.top_performing_units.is_empty() {
                println!("- no units found");
            }
            for unit in pulse.top_performing_units.iter() {
                println!("- {} score {}", unit.unit_name, unit.score);
            }
        }
        Commands::Ask { query } => {
            let answer = assistant::route(&engine, &query.join(" ")).await?;
            println!("{answer}");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!("failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
