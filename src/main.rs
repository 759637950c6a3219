use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use mbti_channels::CliChannel;
use mbti_core::bootstrap::AppBuilder;
use mbti_core::{Session, conversation};
use mbti_gateway::GatewayServer;
use tokio::sync::watch;

#[derive(Parser)]
#[command(name = "mbti-chat", version, about = "Chat with MBTI personas grounded in reference texts")]
struct Cli {
    /// Configuration file (defaults to $MBTI_CONFIG, then config/default.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Split, embed and store every persona's reference document
    Index {
        /// Drop existing collections first (needed after changing the embedding model)
        #[arg(long)]
        fresh: bool,
    },
    /// Interactive chat on the terminal
    Chat {
        /// Persona to start with, e.g. INFP
        #[arg(long)]
        persona: Option<String>,
        /// Print whole replies instead of streaming them
        #[arg(long)]
        no_stream: bool,
    },
    /// Serve the HTTP gateway
    Serve {
        #[arg(long)]
        bind: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();

    let cli = Cli::parse();
    let mut app = AppBuilder::load(cli.config.as_deref())?;

    match cli.command {
        Command::Index { fresh } => run_index(&app, fresh).await,
        Command::Chat { persona, no_stream } => run_chat(&app, persona.as_deref(), no_stream).await,
        Command::Serve { bind, port } => {
            if let Some(bind) = bind {
                app.config_mut().gateway.bind = bind;
            }
            if let Some(port) = port {
                app.config_mut().gateway.port = port;
            }
            run_serve(&app).await
        }
    }
}

async fn run_index(app: &AppBuilder, fresh: bool) -> anyhow::Result<()> {
    let provider = app.build_provider()?;
    let store = app.build_store().await?;
    let indexer = app
        .build_indexer(&provider, store)?
        .with_fresh_collections(fresh);
    let catalog = app.persona_catalog()?;

    let sources: Vec<_> = catalog
        .iter()
        .map(|p| (p.code.as_str(), p.document.as_path()))
        .collect();
    let reports = indexer
        .index_all(sources)
        .await
        .context("indexing reference documents")?;

    for report in &reports {
        tracing::info!(persona = %report.persona, chunks = report.chunks, "indexed");
    }
    tracing::info!(
        personas = reports.len(),
        chunks = reports.iter().map(|r| r.chunks).sum::<usize>(),
        "indexing complete"
    );
    Ok(())
}

async fn run_chat(app: &AppBuilder, persona: Option<&str>, no_stream: bool) -> anyhow::Result<()> {
    let provider = app.build_provider()?;
    let store = app.build_store().await?;
    let retriever = app.build_retriever(&provider, store);
    let orchestrator = app.build_orchestrator(provider, retriever)?;

    let mut channel = CliChannel::stdio();
    if no_stream {
        channel = channel.without_streaming();
    }

    let mut session = Session::new("cli");
    if let Some(code) = persona {
        orchestrator
            .set_persona(&mut session, code)
            .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    }
    if let Some(code) = session.persona() {
        channel.set_reply_label(code.as_str());
    }

    conversation::run(&orchestrator, &mut channel, &mut session)
        .await
        .context("terminal channel failed")?;
    Ok(())
}

async fn run_serve(app: &AppBuilder) -> anyhow::Result<()> {
    let provider = app.build_provider()?;
    let store = app.build_store().await?;
    let retriever = app.build_retriever(&provider, store);
    let orchestrator = Arc::new(app.build_orchestrator(provider, retriever)?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e:#}");
            return;
        }
        tracing::info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    let gateway = &app.config().gateway;
    GatewayServer::new(&gateway.bind, gateway.port, orchestrator, shutdown_rx)?
        .with_max_body_size(gateway.max_body_size)
        .with_session_idle_timeout(Duration::from_secs(gateway.session_idle_seconds))
        .serve()
        .await?;
    Ok(())
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
