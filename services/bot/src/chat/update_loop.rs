//! services/bot/src/chat/update_loop.rs
//!
//! This is the main control loop for inbound chat events. Events are handled one
//! at a time, in arrival order. Handler failures are turned into chat text here
//! and nowhere else.

use crate::chat::{
    callbacks::handle_button_press,
    conversation::handle_text,
    protocol::{InboundEvent, Reply},
    state::AppState,
};
use episode_tracker_core::domain::MessageOptions;
use futures::{Stream, StreamExt};
use tracing::{error, info, warn};

/// Consumes `events` until the stream ends.
pub async fn run_update_loop<S>(state: AppState, events: S)
where
    S: Stream<Item = InboundEvent>,
{
    info!("Update loop started.");
    futures::pin_mut!(events);
    while let Some(event) = events.next().await {
        handle_event(&state, event).await;
    }
    info!("Update loop finished.");
}

/// Runs the handler for one event and delivers its reply or error message.
pub async fn handle_event(state: &AppState, event: InboundEvent) {
    let user_id = event.user_id();
    match event {
        InboundEvent::Text(msg) => {
            let reply = match handle_text(state, &msg).await {
                Ok(reply) => reply,
                Err(e) => {
                    error!(user_id, "Handler failed: {:?}", e.source);
                    Reply::text(e.message)
                }
            };
            if let Err(e) = state
                .transport
                .send_message(msg.chat_id, &reply.text, &reply.options)
                .await
            {
                warn!(user_id, "Failed to send reply: {}", e);
            }
        }
        InboundEvent::ButtonPress(press) => {
            let outcome = match handle_button_press(state, &press).await {
                Ok(Some(reply)) => {
                    state
                        .transport
                        .edit_message(press.chat_id, press.message_id, &reply.text, &reply.options)
                        .await
                }
                Ok(None) => Ok(()),
                Err(e) => {
                    error!(user_id, "Button handler failed: {:?}", e.source);
                    state
                        .transport
                        .send_message(press.chat_id, &e.message, &MessageOptions::default())
                        .await
                }
            };
            if let Err(e) = outcome {
                warn!(user_id, "Failed to deliver button reply: {}", e);
            }
        }
    }
}
