use crate::bot;
use crate::bot::handlers::Command;
use crate::bot::transport::TelegramTransport;
use crate::config::BotSettings;
use exam_result_core::admin::AdminConsole;
use exam_result_core::cache::ResultCache;
use exam_result_core::config::get_result_http_timeout_secs;
use exam_result_core::engine::ConversationEngine;
use exam_result_core::fetcher::ResultFetcher;
use exam_result_core::proxy::ZyteProxy;
use exam_result_core::storage::{InMemoryStorage, R2Storage, StorageProvider};
use std::sync::Arc;
use std::time::Duration;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use tracing::{error, info, warn};

/// Run the Telegram transport runtime.
pub async fn run_bot(settings: Arc<BotSettings>) {
    let storage = init_storage(&settings).await;

    let Some(api_key) = settings
        .results
        .proxy_api_key
        .clone()
        .filter(|key| !key.is_empty())
    else {
        error!("PROXY_API_KEY is not set; result lookups cannot run.");
        std::process::exit(1);
    };
    let proxy = Arc::new(ZyteProxy::new(
        settings.results.proxy_url.clone(),
        api_key,
        Duration::from_secs(get_result_http_timeout_secs()),
    ));

    let cache = ResultCache::from_env();
    info!(capacity = cache.capacity(), "Result cache initialized.");
    let fetcher = Arc::new(ResultFetcher::from_settings(
        settings.results.as_ref(),
        cache,
        proxy,
    ));

    let bot = Bot::new(settings.telegram.telegram_token.clone());
    let transport = Arc::new(TelegramTransport::new(
        bot.clone(),
        settings.telegram.channel(),
    ));

    let admin = Arc::new(AdminConsole::new(
        transport.clone(),
        storage.clone(),
        settings.results.admin_ids(),
    ));
    let engine = Arc::new(ConversationEngine::new(
        transport,
        storage,
        fetcher,
        admin.clone(),
        settings.telegram.channel_id.clone(),
    ));

    let handler = setup_handler();

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![engine, admin])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn init_storage(settings: &BotSettings) -> Arc<dyn StorageProvider> {
    if !settings.results.has_r2() {
        warn!("R2 settings incomplete, keeping subscribers and feedback in memory only.");
        return Arc::new(InMemoryStorage::new());
    }

    match R2Storage::new(settings.results.as_ref()).await {
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

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handle_callback))
        .branch(
            Update::filter_message()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(handle_command),
                )
                .branch(
                    dptree::filter(|msg: Message| msg.text().is_some()).endpoint(handle_text),
                ),
        )
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    engine: Arc<ConversationEngine>,
    admin: Arc<AdminConsole>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::handlers::command(bot, msg, cmd, engine, admin).await {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_text(
    msg: Message,
    engine: Arc<ConversationEngine>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::handlers::text(msg, engine).await {
        error!("Text handler error: {}", e);
    }
    respond(())
}

async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    engine: Arc<ConversationEngine>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::handlers::callback(bot, q, engine).await {
        error!("Callback handler error: {}", e);
    }
    respond(())
}
