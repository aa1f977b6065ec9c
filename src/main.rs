use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use token_ledger::adapters::{
    PostgresChannelStore, PostgresTransactionRepository, PostgresUserStore,
};
use token_ledger::cli::{self, Cli, Commands, DbCommands, TxCommands};
use token_ledger::config::Config;
use token_ledger::db::{self, Stores};
use token_ledger::observability::{init_tracing, TracingObserver};
use token_ledger::services::{TransactionLedger, TransactionQueryService};
use token_ledger::{create_app, AppState};

fn build_state(stores: &Stores, config: &Config) -> AppState {
    let transactions = Arc::new(PostgresTransactionRepository::new(stores.private.clone()));
    let users = Arc::new(PostgresUserStore::new(stores.private.clone()));
    let channels = Arc::new(PostgresChannelStore::new(stores.public.clone()));

    let ledger = TransactionLedger::new(
        transactions.clone(),
        users,
        channels,
        Arc::new(TracingObserver),
    )
    .with_config(config.ledger);

    AppState {
        ledger: Arc::new(ledger),
        queries: TransactionQueryService::new(transactions),
    }
}

async fn serve(config: &Config, stores: &Stores) -> anyhow::Result<()> {
    let app = create_app(build_state(stores, config));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    init_tracing(config.log_format);

    if let Some(Commands::Config) = cli.command {
        return cli::handle_config_validate(&config);
    }

    let stores = db::connect(&config).await?;
    tracing::info!("Connected to private and public stores");

    match cli.command {
        None | Some(Commands::Serve) => serve(&config, &stores).await,
        Some(Commands::Db(DbCommands::Migrate)) => cli::handle_db_migrate(&stores).await,
        Some(Commands::Tx(command)) => {
            let state = build_state(&stores, &config);
            match command {
                TxCommands::Show { tx_id } => cli::handle_tx_show(&state, &tx_id).await,
                TxCommands::Cancel { tx_id, reason } => {
                    cli::handle_tx_cancel(&state, &tx_id, &reason).await
                }
                TxCommands::Claim {
                    user_id,
                    token_type,
                    amount,
                } => cli::handle_tx_claim(&state, &user_id, token_type, amount).await,
                TxCommands::Pending { older_than_secs } => {
                    cli::handle_tx_pending(&state, older_than_secs).await
                }
            }
        }
        Some(Commands::Config) => Ok(()),
    }
}
