//! Discord event handlers.
//!
//! Each handler is a small adapter that converts the serenity payload into
//! core types, calls into `privbot-core`, and renders the reply.

use serenity::all::{CommandInteraction, Context, Message};

use crate::observed_message;
use crate::router::AppState;

pub mod commands;

pub async fn handle_message(ctx: &Context, msg: &Message, state: &AppState) {
    let me = ctx.cache.current_user().id;
    let observed = observed_message(msg, me);

    state.cleanup.observe(&observed);
    state.privacy.observe_message(&observed).await;
}

pub async fn handle_command(ctx: &Context, cmd: &CommandInteraction, state: &AppState) {
    commands::handle_command(ctx, cmd, state).await
}
