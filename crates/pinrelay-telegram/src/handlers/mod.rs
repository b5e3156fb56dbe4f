//! Telegram update handlers.
//!
//! Each handler only translates the teloxide update into a core
//! `IncomingUpdate` and hands it to the relay service.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message},
};
use tracing::error;

use pinrelay_core::messaging::types::IncomingUpdate;

use crate::router::AppState;

mod callback;
mod commands;
mod group;

pub async fn handle_callback(q: CallbackQuery, state: Arc<AppState>) -> ResponseResult<()> {
    let update = callback::to_update(&q);
    dispatch(&state, update).await;
    Ok(())
}

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let update = if msg.chat.is_private() {
        commands::to_update(&msg)
    } else if msg.chat.is_group() || msg.chat.is_supergroup() {
        group::to_update(&msg, state.bot_id)
    } else {
        None
    };

    if let Some(update) = update {
        dispatch(&state, update).await;
    }
    Ok(())
}

/// Failures are logged and the update dropped; polling never stops for them.
async fn dispatch(state: &AppState, update: IncomingUpdate) {
    let kind = match &update {
        IncomingUpdate::Command(_) => "command",
        IncomingUpdate::GroupText(_) => "group message",
        IncomingUpdate::GroupJoined(_) => "group join",
        IncomingUpdate::Callback(_) => "callback",
    };
    if let Err(e) = state.relay.handle(update).await {
        error!("failed to handle {kind}: {e}");
    }
}
