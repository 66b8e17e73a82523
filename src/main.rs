use dotenvy::dotenv;
use katy_bot::autokick::{self, ChatModerator};
use katy_bot::bot;
use katy_bot::bot::handlers::Command;
use katy_bot::config::{get_auto_kick_poll_secs, get_candidate_ttl_secs, Settings};
use katy_bot::imdb::ImdbService;
use katy_bot::logging::{init_logging, Redactor};
use katy_bot::storage::{self, StorageProvider};
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, Me};
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    // Compile redaction rules before anything is logged
    let redactor = Arc::new(Redactor::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);
    init_logging(redactor);

    info!("Starting Katy bot...");

    let settings = init_settings();
    let storage = init_storage(&settings).await;
    let service = init_imdb(&settings, Arc::clone(&storage)).await;

    let bot = Bot::new(settings.telegram_token.clone());
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to register bot commands: {e}");
    }

    let moderator: Arc<dyn ChatModerator> = Arc::new(bot.clone());
    tokio::spawn(autokick::run_poller(
        Arc::clone(&storage),
        moderator,
        get_auto_kick_poll_secs(),
    ));

    let handler = setup_handler();

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![storage, service, settings])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn init_settings() -> Arc<Settings> {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

async fn init_storage(settings: &Settings) -> Arc<dyn StorageProvider> {
    match storage::R2Storage::new(settings).await {
        Ok(s) => {
            info!("R2 Storage initialized.");
            if s.check_connection().await.is_err() {
                error!("R2 Storage connection check returned error.");
            }
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to initialize R2 Storage: {}", e);
            std::process::exit(1);
        }
    }
}

async fn init_imdb(settings: &Settings, storage: Arc<dyn StorageProvider>) -> Arc<ImdbService> {
    let ttl = get_candidate_ttl_secs();
    match ImdbService::from_settings(settings, storage, ttl).await {
        Ok(service) => {
            info!(
                "IMDb service initialized (query ttl: {ttl}s, solver: {}).",
                settings.solver_url().unwrap_or("disabled")
            );
            Arc::new(service)
        }
        Err(e) => {
            error!("Failed to initialize IMDb service: {}", e);
            std::process::exit(1);
        }
    }
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handle_callback))
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    storage: Arc<dyn StorageProvider>,
    service: Arc<ImdbService>,
    settings: Arc<Settings>,
) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start => bot::handlers::start(bot, msg).await,
        Command::Imdb(query) => {
            bot::imdb_handlers::imdb(bot, msg, query, service, settings).await
        }
        Command::Imdbset => bot::imdb_handlers::imdbset(bot, msg, settings).await,
        Command::Imdbtemplate(args) => {
            bot::imdb_handlers::imdbtemplate(bot, msg, args, service).await
        }
        Command::Imdbby(args) => bot::imdb_handlers::imdbby(bot, msg, args, service).await,
        Command::AutoKick(args) => bot::handlers::auto_kick(bot, msg, args, storage).await,
        Command::Post(args) => bot::handlers::post(bot, msg, args).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    service: Arc<ImdbService>,
    me: Me,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::imdb_handlers::handle_callback(bot, q, service, me).await {
        error!("Callback handler error: {}", e);
    }
    respond(())
}
