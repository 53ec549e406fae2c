mod discord_commands;

use anyhow::Context as _;
use mcwatch_bot::create_app;
use mcwatch_bot::notifier::DiscordNotifier;
use mcwatch_bot::ping::{ServerAddress, StatusClient};
use mcwatch_bot::scheduler::{AutoCheck, Poller};
use mcwatch_db::{JsonFileStore, Tracker};
use poise::{Framework, FrameworkOptions, PrefixFrameworkOptions, serenity_prelude as serenity};
use std::sync::Arc;
use tokio::net::TcpListener;

type Context<'a> = poise::Context<'a, crate::Data, crate::discord_commands::Error>;

pub(crate) struct Data {
    pub(crate) tracker: Arc<Tracker>,
    pub(crate) status: StatusClient,
    pub(crate) auto_check: AutoCheck,
    pub(crate) alert_channel_configured: bool,
    pub(crate) command_prefix: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing for structured logging
    #[cfg(debug_assertions)]
    let log_level = tracing::Level::DEBUG;
    #[cfg(not(debug_assertions))]
    let log_level = tracing::Level::INFO;

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();
    tracing::info!("Starting mcwatch bot...");

    let config = mcwatch_bot::config::Config::from_env();
    let token = config
        .discord_token
        .clone()
        .context("DISCORD_TOKEN environment variable is required")?;
    let address = config
        .server_address
        .as_deref()
        .context("SERVER_ADDRESS (or SERVER_IP) environment variable is required")?;
    let address = ServerAddress::parse(address)?;
    tracing::info!(
        "Configuration: server={}, data_path={}, prefix={}, poll_interval={}s, status_timeout={}s, alert_channel={:?}, http_port={:?}",
        address,
        config.data_path,
        config.command_prefix,
        config.poll_interval.as_secs(),
        config.status_timeout.as_secs(),
        config.alert_channel_id,
        config.http_port
    );

    let tracker = Arc::new(
        Tracker::open(JsonFileStore::new(&config.data_path))
            .await
            .context("failed to load player data")?,
    );
    let status = StatusClient::new(address, config.status_timeout);

    // Prefix commands need message content on top of the defaults
    let intents =
        serenity::GatewayIntents::non_privileged() | serenity::GatewayIntents::MESSAGE_CONTENT;

    let setup_config = config.clone();
    let setup_tracker = tracker.clone();
    let framework = Framework::builder()
        .options(FrameworkOptions {
            commands: vec![
                discord_commands::status(),
                discord_commands::players(),
                discord_commands::playtime(),
                discord_commands::player(),
                discord_commands::autocheck(),
                discord_commands::help(),
            ],
            prefix_options: PrefixFrameworkOptions {
                prefix: Some(config.command_prefix.clone()),
                ..Default::default()
            },
            pre_command: |ctx| {
                Box::pin(async move {
                    tracing::info!(
                        "Executing command '{}' by user '{}'",
                        ctx.command().name,
                        ctx.author().name
                    );
                })
            },
            post_command: |ctx| {
                Box::pin(async move {
                    tracing::info!(
                        "Finished command '{}' by user '{}'",
                        ctx.command().name,
                        ctx.author().name
                    );
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            let config = setup_config.clone();
            let tracker = setup_tracker.clone();
            let status = status.clone();
            let http = ctx.http.clone();
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                tracing::info!(
                    "Logged in as {} in {} guilds",
                    ready.user.name,
                    ready.guilds.len()
                );

                let notifier =
                    DiscordNotifier::new(http, config.alert_channel_id, config.ping_user_id);
                let poller = Arc::new(Poller::new(status.clone(), tracker.clone(), notifier));
                let auto_check = AutoCheck::spawn(poller, config.poll_interval);
                if config.alert_channel_id.is_some() {
                    auto_check.set_enabled(true);
                }

                Ok(Data {
                    tracker,
                    status,
                    auto_check,
                    alert_channel_configured: config.alert_channel_id.is_some(),
                    command_prefix: config.command_prefix,
                })
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&token, intents)
        .framework(framework)
        .await
        .context("Error creating Discord client")?;
    let shard_manager = client.shard_manager.clone();

    let api = async {
        let Some(port) = config.http_port else {
            return std::future::pending::<anyhow::Result<()>>().await;
        };
        let app = create_app(
            tracker.clone(),
            config.request_body_limit,
            config.request_timeout,
        );
        let addr = format!("0.0.0.0:{}", port);
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!("HTTP API listening on {}", addr);
        axum::serve(listener, app).await?;
        anyhow::Ok(())
    };

    tokio::select! {
        result = api => {
            if let Err(e) = result {
                tracing::error!("HTTP API error: {}", e);
            }
        }
        result = client.start() => {
            if let Err(e) = result {
                tracing::error!("Discord client error: {:?}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
            shard_manager.shutdown_all().await;
        }
    }

    Ok(())
}
