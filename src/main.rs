use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use clap::{Parser, Subcommand};
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use dotenvy::dotenv;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

mod bridge;
mod chatbot;
mod dispatch;
mod error;
mod handlers {
    pub mod campaign_handlers;
    pub mod chat_handlers;
    pub mod group_handlers;
    pub mod instance_auth;
    pub mod instance_handlers;
    pub mod media_handlers;
    pub mod message_handlers;
    pub mod profile_handlers;
}
mod models {
    pub mod chatbot;
    pub mod core;
    pub mod dispatch;
}
mod repositories {
    pub mod chatbot_store;
    pub mod dispatch_store;
    pub mod identity;
    pub mod instance_store;
    pub mod media_file_store;
    pub mod message_history;
    pub mod webhook_error_log;
}
mod schema;
mod session_manager;
mod webhook;

use bridge::BridgeClient;
use repositories::{
    chatbot_store::ChatbotStore, dispatch_store::DispatchStore, identity::IdentityRepository,
    instance_store::InstanceStore, media_file_store::MediaFileStore, message_history::MessageHistory,
    webhook_error_log::WebhookErrorLogRepository,
};
use session_manager::SessionManager;

pub type DbPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

/// Shared process state handed to every axum handler and every long-running CLI
/// worker (spec §10.1): one pool, one set of repositories, one Bridge client.
pub struct AppState {
    pub db_pool: DbPool,
    pub instances: Arc<InstanceStore>,
    pub identity: Arc<IdentityRepository>,
    pub chatbot_store: Arc<ChatbotStore>,
    pub dispatch_store: Arc<DispatchStore>,
    pub media_files: Arc<MediaFileStore>,
    pub message_history: Arc<MessageHistory>,
    pub webhook_error_log: Arc<WebhookErrorLogRepository>,
    pub bridge: Arc<BridgeClient>,
    pub session_manager: Arc<SessionManager>,
    pub http_client: reqwest::Client,
    pub chatbot_locks: tokio::sync::Mutex<HashMap<(i32, String), Arc<tokio::sync::Mutex<()>>>>,
}

pub fn validate_env() {
    let required_vars = [
        "DATABASE_URL",
        "BRIDGE_BASE_URL",
        "BRIDGE_ADMIN_API_KEY",
        "WEBHOOK_ADMIN_SECRET",
        "ENVIRONMENT",
    ];
    for var in required_vars.iter() {
        std::env::var(var).unwrap_or_else(|_| panic!("{} must be set", var));
    }
}

fn build_state() -> Arc<AppState> {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set in environment");
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    let pool = r2d2::Pool::builder().build(manager).expect("Failed to create pool");

    let bridge_base_url = std::env::var("BRIDGE_BASE_URL").expect("BRIDGE_BASE_URL must be set");
    let bridge_admin_key = std::env::var("BRIDGE_ADMIN_API_KEY").expect("BRIDGE_ADMIN_API_KEY must be set");
    let bridge = Arc::new(BridgeClient::new(bridge_base_url, bridge_admin_key));
    let instances = Arc::new(InstanceStore::new(pool.clone()));

    Arc::new(AppState {
        db_pool: pool.clone(),
        instances: instances.clone(),
        identity: Arc::new(IdentityRepository::new(pool.clone())),
        chatbot_store: Arc::new(ChatbotStore::new(pool.clone())),
        dispatch_store: Arc::new(DispatchStore::new(pool.clone())),
        media_files: Arc::new(MediaFileStore::new(pool.clone())),
        message_history: Arc::new(MessageHistory::new(pool.clone())),
        webhook_error_log: Arc::new(WebhookErrorLogRepository::new(pool)),
        bridge: bridge.clone(),
        session_manager: Arc::new(SessionManager::new(bridge, instances)),
        http_client: reqwest::Client::new(),
        chatbot_locks: tokio::sync::Mutex::new(HashMap::new()),
    })
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,fillow_panel=debug"));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}

async fn health_check() -> &'static str {
    "OK"
}

fn build_router(state: Arc<AppState>) -> Router {
    use handlers::{campaign_handlers, chat_handlers, group_handlers, instance_handlers, media_handlers, message_handlers, profile_handlers};

    let message_routes = Router::new()
        .route("/message/send", post(message_handlers::send_text))
        .route("/message/send-media", post(message_handlers::send_media))
        .route("/message/send-voice", post(message_handlers::send_voice))
        .route("/message/poll", post(message_handlers::send_poll))
        .route("/message/location", post(message_handlers::send_location))
        .route("/message/contact", post(message_handlers::send_contact))
        .route("/message/reaction", post(message_handlers::send_reaction))
        .route("/message/manage/edit", post(message_handlers::edit_message))
        .route("/message/manage/delete", post(message_handlers::delete_message))
        .route("/message/manage/pin", post(message_handlers::pin_message))
        .route("/message/manage/unpin", post(message_handlers::unpin_message))
        .route("/message/manage/star", post(message_handlers::star_message))
        .route("/message/manage/mark-read", post(message_handlers::mark_messages_read));

    let chat_routes = Router::new()
        .route("/chat/manage/archive", post(chat_handlers::archive_chat))
        .route("/chat/manage/mute", post(chat_handlers::mute_chat))
        .route("/chat/manage/clear", post(chat_handlers::clear_chat))
        .route("/chat/manage/mark-read", post(chat_handlers::mark_chat_read));

    let group_routes = Router::new()
        .route("/groups/", get(group_handlers::list_groups))
        .route("/groups/create", post(group_handlers::create_group))
        .route("/groups/join", post(group_handlers::join_group))
        .route("/groups/{gid}/participants", post(group_handlers::update_participants))
        .route("/groups/{gid}/leave", post(group_handlers::leave_group))
        .route("/groups/{gid}/revoke-invite", post(group_handlers::revoke_invite))
        .route("/groups/{gid}/invite-code", get(group_handlers::invite_code))
        .route("/groups/{gid}/subject", post(group_handlers::update_subject))
        .route("/groups/{gid}/description", post(group_handlers::update_description))
        .route("/groups/{gid}/settings", post(group_handlers::update_setting));

    let profile_routes = Router::new()
        .route("/profile/info/{jid}", get(profile_handlers::fetch_profile))
        .route("/profile/blocklist", get(profile_handlers::get_blocklist))
        .route("/profile/manage/status", post(profile_handlers::update_status))
        .route("/profile/manage/picture", post(profile_handlers::update_picture))
        .route("/users/block", post(profile_handlers::block_user))
        .route("/users/check", post(profile_handlers::check_on_whatsapp));

    let campaign_routes = Router::new()
        .route("/campaigns", post(campaign_handlers::create_campaign))
        .route("/campaigns/{id}", get(campaign_handlers::campaign_status))
        .route("/campaigns/{id}/queue-items", get(campaign_handlers::list_queue_items))
        .route("/campaigns/{id}/media", post(campaign_handlers::attach_media))
        .route("/campaigns/{id}/pause", post(campaign_handlers::pause_campaign))
        .route("/campaigns/{id}/resume", post(campaign_handlers::resume_campaign));

    let admin_instance_routes = Router::new()
        .route("/admin/instances", post(instance_handlers::create_instance))
        .route("/admin/instances/tenant/{tenant_id}", get(instance_handlers::list_instances))
        .route("/admin/instances/{id}", get(instance_handlers::get_instance))
        .route("/admin/instances/{id}", delete(instance_handlers::delete_instance))
        .route("/admin/instances/{id}/start", post(instance_handlers::start_instance))
        .route("/admin/instances/{id}/status", get(instance_handlers::instance_status))
        .route("/admin/instances/{id}/qr", get(instance_handlers::instance_qrcode))
        .route("/admin/instances/{id}/webhook-config", post(instance_handlers::update_webhook_config));

    let webhook_routes = Router::new().route("/webhook/node/", post(webhook::receive_webhook));

    let chatbot_media_routes = Router::new()
        .route("/chatbot/media", post(media_handlers::create_media_asset))
        .route("/chatbot/media", get(media_handlers::list_media_assets))
        .route("/chatbot/media/{id}", post(media_handlers::update_media_asset))
        .route("/chatbot/media/{id}", delete(media_handlers::delete_media_asset))
        .route("/chatbot/media/{id}/file", post(media_handlers::replace_media_asset_file));

    let media_file_routes = Router::new()
        .route("/media", get(media_handlers::list_media_files))
        .route("/media", post(media_handlers::upload_media_file))
        .route("/media/{id}", post(media_handlers::update_media_file))
        .route("/media/{id}", delete(media_handlers::delete_media_file));

    Router::new()
        .route("/api/health", get(health_check))
        .merge(message_routes)
        .merge(chat_routes)
        .merge(group_routes)
        .merge(profile_routes)
        .merge(campaign_routes)
        .merge(admin_instance_routes)
        .merge(webhook_routes)
        .merge(chatbot_media_routes)
        .merge(media_file_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(
            CorsLayer::new()
                .allow_methods([axum::http::Method::GET, axum::http::Method::POST, axum::http::Method::DELETE])
                .allow_origin(AllowOrigin::any())
                .allow_headers([
                    axum::http::header::CONTENT_TYPE,
                    axum::http::header::AUTHORIZATION,
                    axum::http::header::ACCEPT,
                ]),
        )
        .with_state(state)
}

#[derive(Parser)]
#[command(name = "fillow-panel")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP control-plane API (northbound + webhook ingress).
    Serve {
        #[arg(long, default_value_t = 3000)]
        port: u16,
    },
    /// Single reconciliation sweep over all Instances, then exit.
    MonitorInstances,
    /// Continuous reconciler loop.
    Reconcile {
        #[arg(long, default_value_t = 60)]
        interval: u64,
        #[arg(long, default_value_t = 0)]
        sleep_per_instance: u64,
        #[arg(long)]
        start_if_missing: bool,
        #[arg(long)]
        only_stale_seconds: Option<i32>,
        #[arg(long)]
        max: Option<usize>,
    },
    /// Campaign worker loop.
    Dispatcher {
        #[arg(long)]
        once: bool,
        #[arg(long, default_value_t = 50)]
        max_items: i64,
        #[arg(long, default_value_t = 5)]
        sleep: u64,
    },
    /// WebSocket listener for Bridge events (alternative ingestion path to the HTTP webhook).
    Listener,
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    let sentry_dsn = std::env::var("SENTRY_DSN").unwrap_or_default();
    let _guard = sentry::init((
        sentry_dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    ));
    init_tracing();
    validate_env();

    let cli = Cli::parse();
    let state = build_state();

    match cli.command {
        Command::Serve { port } => {
            let app = build_router(state);
            let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await.unwrap();
            tracing::info!(port, "starting server");
            axum::serve(listener, app.into_make_service()).await.unwrap();
        }
        Command::MonitorInstances => {
            let report = state
                .session_manager
                .reconcile_once(false, None, None)
                .await
                .expect("reconcile sweep failed");
            tracing::info!(
                checked = report.checked,
                updated = report.updated,
                zombies = report.zombies,
                started = report.started,
                "monitor-instances sweep complete"
            );
        }
        Command::Reconcile { interval, sleep_per_instance, start_if_missing, only_stale_seconds, max } => {
            state
                .session_manager
                .reconcile_loop(
                    Duration::from_secs(interval),
                    Duration::from_secs(sleep_per_instance),
                    start_if_missing,
                    only_stale_seconds,
                    max,
                )
                .await
                .expect("reconciler loop exited with an error");
        }
        Command::Dispatcher { once, max_items, sleep } => {
            if once {
                dispatch::worker::run_tick(&state, max_items).await.expect("dispatcher tick failed");
            } else {
                dispatch::worker::run_loop(&state, max_items, Duration::from_secs(sleep))
                    .await
                    .expect("dispatcher loop exited with an error");
            }
        }
        Command::Listener => {
            run_listener(state).await;
        }
    }
}

/// Alternative ingestion transport to `POST /webhook/node/` (spec §10.4): opens a
/// WebSocket to the Bridge and funnels every `{type, data}` envelope through the
/// identical `webhook::process_envelope` pipeline the HTTP ingress uses.
async fn run_listener(state: Arc<AppState>) {
    use futures_util::StreamExt;
    use tokio_tungstenite::connect_async;

    let base_url = std::env::var("BRIDGE_BASE_URL").expect("BRIDGE_BASE_URL must be set");
    let ws_url = base_url.replacen("http", "ws", 1) + "/ws";

    loop {
        tracing::info!(url = %ws_url, "listener: connecting to bridge websocket");
        let (ws_stream, _) = match connect_async(&ws_url).await {
            Ok(pair) => pair,
            Err(err) => {
                tracing::warn!(error = %err, "listener: connect failed, retrying in 5s");
                tokio::time::sleep(Duration::from_secs(5)).await;
                continue;
            }
        };
        let (_write, mut read) = ws_stream.split();
        while let Some(msg) = read.next().await {
            let msg = match msg {
                Ok(m) => m,
                Err(err) => {
                    tracing::warn!(error = %err, "listener: websocket read error");
                    break;
                }
            };
            if let tokio_tungstenite::tungstenite::Message::Text(text) = msg {
                match serde_json::from_str::<webhook::WebhookEnvelope>(&text) {
                    Ok(envelope) => {
                        let _ = webhook::process_envelope(&state, &envelope).await;
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "listener: failed to decode envelope");
                    }
                }
            }
        }
        tracing::warn!("listener: websocket closed, reconnecting in 5s");
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
}
