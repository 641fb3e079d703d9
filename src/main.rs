use clap::{Parser, Subcommand};
use std::sync::Arc;

use warden_bot::application::messaging::EventDispatcher;
use warden_bot::application::services::{
    AccessControl, BroadcastEngine, ChatRegistry, ModerationGate, PresenceTracker,
};
use warden_bot::domain::traits::ChatApi;
use warden_bot::infrastructure::adapters::TelegramAdapter;
use warden_bot::infrastructure::config::Config;
use warden_bot::infrastructure::database::Database;

#[derive(Parser)]
#[command(name = "warden-bot")]
#[command(about = "A moderation and presence bot for group chats", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Bot token (overrides config)
    #[arg(short, long)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot
    Run,
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run => {
            run_bot(cli.config, cli.token);
        }
        Commands::Version => {
            println!("warden-bot v{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::InitConfig => {
            init_config(&cli.config);
        }
    }
}

fn init_config(path: &str) {
    if std::path::Path::new(path).exists() {
        eprintln!("Config file {} already exists, not overwriting", path);
        return;
    }
    match Config::default().save(path) {
        Ok(()) => println!("Wrote default config to {}", path),
        Err(e) => eprintln!("Could not write config: {}", e),
    }
}

fn run_bot(config_path: String, token_override: Option<String>) {
    // Load config
    let config = if std::path::Path::new(&config_path).exists() {
        Config::load(&config_path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config: {}, using environment", e);
            Config::load_env()
        })
    } else {
        Config::load_env()
    };

    tracing::info!("Starting warden-bot: {}", config.bot.name);

    if config.owner.id == 0 {
        tracing::warn!("No owner id configured; sudo and broadcast will be unusable");
    }

    let Some(token) = token_override.or_else(|| config.telegram_token()) else {
        tracing::error!("No Telegram token configured (config or BOT_TOKEN)");
        return;
    };

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(run(config, token));
}

async fn run(config: Config, token: String) {
    let db = match Database::new(&config.database.path) {
        Ok(db) => {
            tracing::info!("Database initialized at {:?}", config.database.path);
            Arc::new(db)
        }
        Err(e) => {
            tracing::error!("Failed to initialize database: {}", e);
            return;
        }
    };

    let mut adapter = TelegramAdapter::new(token);
    if let Err(e) = adapter.fetch_bot_info().await {
        tracing::error!("Failed to fetch bot info: {}", e);
        return;
    }
    if let Err(e) = adapter.register_commands().await {
        tracing::warn!("Failed to register commands: {}", e);
    }

    let adapter = Arc::new(adapter);
    let api: Arc<dyn ChatApi> = adapter.clone();

    // Construct each store and service once and hand out shared references.
    let access = Arc::new(AccessControl::new(config.owner.id, db.clone(), api.clone()));
    let registry = Arc::new(ChatRegistry::new(db.clone()));
    let presence = Arc::new(PresenceTracker::new(db.clone()));
    let moderation = Arc::new(ModerationGate::new(db.clone(), access.clone(), api.clone()));
    let broadcast = Arc::new(BroadcastEngine::new(
        db.clone(),
        access.clone(),
        registry.clone(),
        api.clone(),
    ));
    let dispatcher = Arc::new(EventDispatcher::new(
        api,
        db,
        registry,
        presence,
        moderation,
        broadcast,
        access,
        &config.bot.prefix,
    ));

    let info = adapter.bot_info();
    tracing::info!("Bot started: @{}", info.username);

    let mut offset: i64 = 0;
    let timeout_seconds = 30;

    tracing::info!("Starting update loop...");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown requested");
                break;
            }
            updates = adapter.get_updates(offset, timeout_seconds) => match updates {
                Ok(updates) => {
                    if !updates.is_empty() {
                        tracing::debug!("Received {} updates", updates.len());
                        offset = TelegramAdapter::get_next_offset(&updates);
                    }
                    for update in updates {
                        let Some(event) = TelegramAdapter::decode_update(update) else {
                            continue;
                        };
                        // Events are independent; handle each on its own task
                        // so one slow chat never stalls the rest.
                        let dispatcher = dispatcher.clone();
                        tokio::spawn(async move {
                            dispatcher.dispatch(event).await;
                        });
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to get updates: {}", e);
                    tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
                }
            }
        }
    }

    // Dropping the dispatcher releases the store and client handles.
    tracing::info!("Stopped; store handles released");
}
