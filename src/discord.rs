//! # Discord Transport
//!
//! Renders `Reply` values as Discord messages and buttons, routes messages and
//! component clicks into the `RemindHandler`, and delivers reminders by DM.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.2.0
//! - **Toggleable**: false

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use chrono::Utc;
use log::{debug, error, info};
use serenity::builder::CreateComponents;
use serenity::http::Http;
use serenity::model::application::component::ButtonStyle;
use serenity::model::application::interaction::message_component::MessageComponentInteraction;
use serenity::model::application::interaction::{Interaction, InteractionResponseType};
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::model::id::UserId;
use serenity::prelude::{Context, EventHandler};
use std::sync::Arc;

use crate::commands::{RemindHandler, Reply, ReplyButton};
use crate::core::response::{chunk_for_message, truncate_for_message};
use crate::features::reminders::{NotificationOptions, Notifier};

const ERROR_REPLY: &str = "Sorry, I encountered an error processing your message.";

fn button_style(button: ReplyButton) -> ButtonStyle {
    match button {
        ReplyButton::Confirm => ButtonStyle::Success,
        ReplyButton::Cancel => ButtonStyle::Danger,
        ReplyButton::NewReminder => ButtonStyle::Primary,
    }
}

/// Add one action row holding `buttons`
fn add_buttons<'a>(
    components: &'a mut CreateComponents,
    buttons: &[ReplyButton],
) -> &'a mut CreateComponents {
    components.create_action_row(|row| {
        for button in buttons {
            row.create_button(|btn| {
                btn.custom_id(button.custom_id())
                    .label(button.label())
                    .style(button_style(*button))
            });
        }
        row
    })
}

/// Delivers notifications as direct messages
pub struct DiscordNotifier {
    http: Arc<Http>,
}

impl DiscordNotifier {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn send_notification(
        &self,
        owner: &str,
        text: &str,
        options: &NotificationOptions,
    ) -> Result<()> {
        let user_id: u64 = owner
            .parse()
            .with_context(|| format!("Invalid Discord user id: {owner}"))?;
        let http = self.http.as_ref();
        let dm = UserId(user_id).create_dm_channel(http).await?;

        let chunks = chunk_for_message(text);
        let last = chunks.len().saturating_sub(1);
        for (i, chunk) in chunks.iter().enumerate() {
            dm.send_message(http, |m| {
                m.content(chunk);
                if options.silent {
                    m.allowed_mentions(|am| am.empty_parse());
                }
                if options.new_reminder_button && i == last {
                    m.components(|c| add_buttons(c, &[ReplyButton::NewReminder]));
                }
                m
            })
            .await?;
        }

        debug!("Sent DM to {owner} ({} chunk(s))", chunks.len());
        Ok(())
    }
}

/// Serenity event handler for the reminder bot
pub struct ReminderBot {
    handler: Arc<RemindHandler>,
}

impl ReminderBot {
    pub fn new(handler: Arc<RemindHandler>) -> Self {
        Self { handler }
    }

    /// DMs get everything; guild channels only get `!` commands
    fn should_handle(msg: &Message) -> bool {
        !msg.author.bot && (msg.guild_id.is_none() || msg.content.trim_start().starts_with('!'))
    }

    async fn send_reply(ctx: &Context, msg: &Message, reply: &Reply) -> Result<()> {
        let chunks = chunk_for_message(&reply.content);
        let last = chunks.len().saturating_sub(1);
        for (i, chunk) in chunks.iter().enumerate() {
            msg.channel_id
                .send_message(&ctx.http, |m| {
                    m.content(chunk);
                    if i == last && !reply.buttons.is_empty() {
                        m.components(|c| add_buttons(c, &reply.buttons));
                    }
                    m
                })
                .await?;
        }
        Ok(())
    }

    async fn handle_component(
        &self,
        ctx: &Context,
        component: &MessageComponentInteraction,
    ) -> Result<()> {
        let user_id = component.user.id.to_string();
        let custom_id = &component.data.custom_id;
        info!("Processing component interaction: {custom_id} from user: {user_id}");

        let reply = self
            .handler
            .handle_button(&user_id, custom_id, Utc::now())
            .await?;

        component
            .create_interaction_response(&ctx.http, |response| {
                response
                    .kind(InteractionResponseType::ChannelMessageWithSource)
                    .interaction_response_data(|m| {
                        m.content(truncate_for_message(&reply.content));
                        if !reply.buttons.is_empty() {
                            m.components(|c| add_buttons(c, &reply.buttons));
                        }
                        m
                    })
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl EventHandler for ReminderBot {
    async fn message(&self, ctx: Context, msg: Message) {
        if !Self::should_handle(&msg) {
            return;
        }

        let user_id = msg.author.id.to_string();
        let result = match self
            .handler
            .handle_message(&user_id, &msg.content, Utc::now())
            .await
        {
            Ok(reply) => Self::send_reply(&ctx, &msg, &reply).await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            error!("Error handling message from {user_id}: {e:#}");
            if let Err(why) = msg.channel_id.say(&ctx.http, ERROR_REPLY).await {
                error!("Failed to send error message: {why}");
            }
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::MessageComponent(component) = interaction else {
            return;
        };

        if let Err(e) = self.handle_component(&ctx, &component).await {
            error!(
                "Error handling component interaction '{}': {e:#}",
                component.data.custom_id
            );
            let _ = component
                .create_interaction_response(&ctx.http, |response| {
                    response
                        .kind(InteractionResponseType::ChannelMessageWithSource)
                        .interaction_response_data(|m| {
                            m.content("❌ Sorry, I encountered an error processing your interaction. Please try again.")
                        })
                })
                .await;
        }
    }

    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("{} is connected to Discord", ready.user.name);
    }
}
