use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tracing::{info, warn};

use pinrelay_core::{
    config::Config,
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    relay::RelayService,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<RelayService>,
    /// Our own user id, to recognize "bot added to group" service messages.
    pub bot_id: teloxide::types::UserId,
}

/// Long-poll Telegram until Ctrl-C.
pub async fn run_polling(cfg: Arc<Config>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    let me = bot.get_me().await?;
    info!(
        username = %me.username(),
        recipient = %cfg.recipient,
        data_channel = %cfg.data_channel,
        keywords = cfg.keywords.len(),
        "pinrelay started"
    );

    // Throttle outgoing calls to stay under Telegram's flood limits; the
    // adapter still retries once on RetryAfter.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let relay = Arc::new(RelayService::new(&cfg, messenger));
    if !relay.start().await {
        warn!("running without persistence until the data channel is reachable");
    }

    let state = Arc::new(AppState {
        relay,
        bot_id: me.user.id,
    });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("polling stopped");
    Ok(())
}
