use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;

use relay_channels::CliChannel;
use relay_core::config::Config;
use relay_core::dispatch::Dispatcher;
use relay_core::driver::Driver;
use relay_core::vault::EnvVaultProvider;
use relay_llm::openai::OpenAiProvider;
use relay_mcp::{McpManager, RmcpConnector, load_descriptors};

/// Chat with an OpenAI model that can call tools on MCP servers.
#[derive(Debug, Parser)]
#[command(name = "relay", version, about)]
struct Cli {
    /// Config file (falls back to `RELAY_CONFIG`, then `config/default.toml`)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// MCP server descriptor file
    #[arg(long, value_name = "PATH")]
    servers: Option<PathBuf>,

    /// Model name sent to the Responses API
    #[arg(long, value_name = "NAME")]
    model: Option<String>,
}

fn main() -> anyhow::Result<()> {
    init_subscriber();
    let cli = Cli::parse();

    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    let result = runtime.block_on(run(cli));
    // a pending stdin read cannot be cancelled; don't wait for it
    runtime.shutdown_background();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = Config::resolve_path(cli.config.as_deref());
    let mut config = Config::load(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;
    if let Some(servers) = cli.servers {
        config.mcp.servers_path = servers;
    }
    if let Some(model) = cli.model {
        config.llm.model = model;
    }
    config.validate()?;
    config.resolve_secrets(&EnvVaultProvider).await?;
    let api_key = config
        .secrets
        .openai_api_key
        .as_ref()
        .context("OPENAI_API_KEY is not set")?
        .expose()
        .to_owned();

    let descriptors = load_descriptors(&config.mcp.servers_path)?;
    let connector = RmcpConnector {
        handshake_timeout: config.mcp.handshake_timeout(),
        call_timeout: config.mcp.call_timeout(),
    };
    let manager = McpManager::load(&connector, &descriptors.servers).await;
    let failed = descriptors.rejected.len() + manager.failures().len();
    tracing::info!(
        servers = manager.server_count(),
        tools = manager.catalog().len(),
        failed,
        "MCP servers loaded"
    );

    let provider = OpenAiProvider::new(
        api_key,
        config.llm.base_url.clone(),
        config.llm.model.clone(),
    )
    .with_instructions(config.llm.instructions.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e:#}");
            return;
        }
        tracing::info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    let dispatcher =
        Dispatcher::new(&provider, &manager).with_round_limit(config.agent.round_limit());
    let mut driver = Driver::new(dispatcher, CliChannel::new());
    let run_result = driver.run(shutdown_rx).await;
    drop(driver);

    let report = manager.unload().await;
    tracing::info!(closed = report.closed, failed = report.failed, "MCP servers unloaded");

    run_result.context("terminal I/O failed")
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
