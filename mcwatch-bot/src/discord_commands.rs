use crate::Context;
use mcwatch_bot::DEFAULT_TOP_LIMIT;
use mcwatch_bot::embeds;
use mcwatch_bot::helpers::now;
use mcwatch_bot::ping::{ServerStatus, SnapshotSource};
use mcwatch_bot::validation;
use poise::serenity_prelude::CreateAttachment;
use poise::{CreateReply, ReplyHandle, command};

pub(crate) type Error = Box<dyn std::error::Error + Send + Sync>;

/// Most rows the playtime command lists; the embed trims further if names are huge
const MAX_PLAYTIME_ROWS: usize = 25;

#[derive(Debug, poise::ChoiceParameter)]
pub enum Toggle {
    On,
    Off,
}

/// Query the server, replacing the placeholder message with an error on failure.
async fn query_status(
    ctx: Context<'_>,
    pending: &ReplyHandle<'_>,
) -> Result<Option<ServerStatus>, Error> {
    match ctx.data().status.status().await {
        Ok(status) => Ok(Some(status)),
        Err(e) if e.is_timeout() => {
            pending
                .edit(
                    ctx,
                    CreateReply::default()
                        .content("")
                        .embed(embeds::server_not_responding()),
                )
                .await?;
            Ok(None)
        }
        Err(e) => {
            tracing::warn!(error = %e, "status query failed");
            pending
                .edit(
                    ctx,
                    CreateReply::default().content(format!("❌ An error occurred: {}", e)),
                )
                .await?;
            Ok(None)
        }
    }
}

/// Check Minecraft server status
#[command(slash_command, prefix_command)]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let pending = ctx.say("Checking server status...").await?;
    let Some(status) = query_status(ctx, &pending).await? else {
        return Ok(());
    };

    let favicon = status.favicon_png();
    let reply = CreateReply::default()
        .content("")
        .embed(embeds::server_status(&status, favicon.is_some()));
    let reply = match favicon {
        Some(png) => reply.attachment(CreateAttachment::bytes(png, embeds::FAVICON_FILENAME)),
        None => reply,
    };
    pending.edit(ctx, reply).await?;
    Ok(())
}

/// Show players currently on the server
#[command(slash_command, prefix_command)]
pub async fn players(ctx: Context<'_>) -> Result<(), Error> {
    let pending = ctx.say("Fetching players...").await?;
    let Some(status) = query_status(ctx, &pending).await? else {
        return Ok(());
    };

    // Same bookkeeping as a scheduled poll
    if let Err(e) = ctx.data().tracker.ingest(&status.snapshot(now())).await {
        tracing::error!(error = %e, "failed to persist player data");
    }

    pending
        .edit(
            ctx,
            CreateReply::default()
                .content("")
                .embed(embeds::players_online(&status)),
        )
        .await?;
    Ok(())
}

/// Show the players with the most time on the server
#[command(slash_command, prefix_command)]
pub async fn playtime(
    ctx: Context<'_>,
    #[description = "How many players to list (default 10)"] limit: Option<u32>,
) -> Result<(), Error> {
    let limit = limit
        .map_or(DEFAULT_TOP_LIMIT, |l| l as usize)
        .clamp(1, MAX_PLAYTIME_ROWS);
    let top = ctx.data().tracker.top_players(limit).await;

    if top.is_empty() {
        ctx.say("No playtime data yet.").await?;
        return Ok(());
    }

    ctx.send(CreateReply::default().embed(embeds::playtime(&top, now())))
        .await?;
    Ok(())
}

/// Show playtime details for one player
#[command(slash_command, prefix_command)]
pub async fn player(
    ctx: Context<'_>,
    #[description = "Minecraft username"] name: String,
) -> Result<(), Error> {
    if let Err(e) = validation::validate_player_lookup(&name) {
        ctx.say(format!("❌ {}", e)).await?;
        return Ok(());
    }

    let current_time = now();
    match ctx.data().tracker.player_info(&name, current_time).await {
        Some(info) => {
            ctx.send(
                CreateReply::default().embed(embeds::player_detail(&name, &info, current_time)),
            )
            .await?
        }
        None => {
            ctx.say(format!("No playtime recorded for **{}** yet.", name))
                .await?
        }
    };
    Ok(())
}

/// Enable or disable automatic server alerts
#[command(slash_command, prefix_command)]
pub async fn autocheck(
    ctx: Context<'_>,
    #[description = "Turn periodic checks on or off"] state: Toggle,
) -> Result<(), Error> {
    let data = ctx.data();
    let enable = matches!(state, Toggle::On);
    let changed = data.auto_check.set_enabled(enable);

    let reply = match (enable, changed) {
        (true, true) => "✅ Auto-check enabled.",
        (true, false) => "Auto-check is already on.",
        (false, true) => "🛑 Auto-check disabled.",
        (false, false) => "Auto-check is already off.",
    };
    let reply = if enable && !data.alert_channel_configured {
        format!(
            "{} No alert channel is configured, so only playtime will be tracked.",
            reply
        )
    } else {
        reply.to_string()
    };

    ctx.say(reply).await?;
    Ok(())
}

/// List the available commands
#[command(slash_command, prefix_command)]
pub async fn help(ctx: Context<'_>) -> Result<(), Error> {
    let prefix = &ctx.data().command_prefix;
    let message = format!(
        "**Available Commands:**\n\
        `{p}status` - Check Minecraft server status\n\
        `{p}players` - Show current players\n\
        `{p}playtime [limit]` - Show players' playtime\n\
        `{p}player <name>` - Show one player's playtime\n\
        `{p}autocheck on/off` - Enable/disable auto-alert",
        p = prefix
    );
    ctx.say(message).await?;
    Ok(())
}
