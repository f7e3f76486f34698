use crate::cli::{Cli, ClientCommands, Commands, ConfigCommands};
use anyhow::{Context, Result, bail};
use std::sync::Arc;
use tracing::info;

use crate::Config;
use crate::access::{AccessPolicy, AccessWindowController, SystemClock};
use crate::app::status::{render_check, render_client_status};
use crate::config::StorageBackend;
use crate::store::{StoreHandle, open_store};

async fn open_configured_store(config: &Config) -> crate::Result<StoreHandle> {
    Ok(open_store(&config.storage, &config.data_dir).await?)
}

fn warn_if_ephemeral(config: &Config) {
    if config.storage.backend == StorageBackend::Memory {
        tracing::warn!("storage backend is in-memory; client commands see an empty store");
    }
}

async fn serve(config: Arc<Config>, host: Option<String>, port: Option<u16>) -> Result<()> {
    let port = port.unwrap_or(config.gateway.port);
    let host = host.unwrap_or_else(|| config.gateway.host.clone());
    if port == 0 {
        info!("Starting report gateway on {host} (random port)");
    } else {
        info!("Starting report gateway on {host}:{port}");
    }

    let store = open_configured_store(&config).await?;
    let state =
        crate::transport::gateway::build_state(Arc::clone(&config), store, Arc::new(SystemClock))?;
    crate::transport::gateway::run_gateway(&host, port, state).await
}

async fn client_command(config: &Config, command: ClientCommands) -> Result<()> {
    warn_if_ephemeral(config);
    let store = open_configured_store(config).await?;
    let policy = AccessPolicy::from(&config.access);

    match command {
        ClientCommands::Show { client_id } => {
            let client_id = client_id.trim();
            let Some(record) = store.clients.get(client_id).await? else {
                bail!("No client named {client_id:?}");
            };
            let payload = store.payloads.get_payload(client_id).await?;
            println!(
                "{}",
                render_client_status(&record, payload.as_ref(), &policy, chrono::Utc::now())
            );
        }
        ClientCommands::Check { client_id } => {
            let client_id = client_id.trim();
            let controller =
                AccessWindowController::new(store.clients, policy, Arc::new(SystemClock));
            let outcome = controller.check_window(client_id).await?;
            println!("{}", render_check(client_id, &outcome));
        }
    }
    Ok(())
}

fn config_command(config: &Config, command: &ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Path => println!("{}", config.config_path.display()),
        ConfigCommands::Show => {
            let mut shown = config.clone();
            if shown.push_enabled() {
                shown.api_key = "********".into();
            }
            let rendered = toml::to_string_pretty(&shown).context("serialize config")?;
            println!("# {}", config.config_path.display());
            print!("{rendered}");
        }
    }
    Ok(())
}

pub async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    let config = Arc::new(config);

    match cli.command {
        Commands::Serve { port, host } => serve(config, host, port).await,
        Commands::Client { client_command: command } => client_command(&config, command).await,
        Commands::Config { config_command: command } => config_command(&config, &command),
    }
}
