use actix_web::{middleware, App, HttpServer};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;

use scm_market::config::Config;
use scm_market::MarketService;
use scm_persistence::executor::DbExecutor;

#[derive(Parser, Debug)]
#[command(version, about = "SC Market offer negotiation service")]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Runs server in foreground
    Run(RunArgs),
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Service address
    #[arg(short, long, default_value = "127.0.0.1")]
    address: String,

    /// Service port
    #[arg(short, long, default_value = "7466")]
    port: u16,

    /// SQLite database file
    #[arg(long, env = "DATABASE_URL", default_value = "sc-market.db")]
    database_url: String,
}

impl RunArgs {
    async fn run(&self) -> Result<()> {
        let config = Config::from_env().context("Invalid market configuration")?;
        let db = DbExecutor::new(self.database_url.as_str())
            .with_context(|| format!("Failed to open database {}", self.database_url))?;

        let market = Arc::new(MarketService::new(&db, Arc::new(config))?);
        market.start();

        log::info!(
            "Running {} on {}:{}",
            env!("CARGO_PKG_NAME"),
            self.address,
            self.port
        );

        let server_market = market.clone();
        let result = HttpServer::new(move || {
            App::new()
                .wrap(middleware::Logger::default())
                .service(MarketService::bind_rest(server_market.clone()))
        })
        .bind((self.address.as_str(), self.port))
        .with_context(|| format!("Failed to bind {}:{}", self.address, self.port))?
        .run()
        .await;

        market.shutdown();
        log::info!("{} stopped", env!("CARGO_PKG_NAME"));
        Ok(result?)
    }
}

#[actix_rt::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = CliArgs::parse();

    env_logger::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match &args.command {
        Command::Run(run) => run.run().await,
    }
}
