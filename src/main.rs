use std::sync::Arc;

use anyhow::Context;
use texter::campaign::CampaignDeps;
use texter::config::{ApiConfig, CampaignConfig, ServerConfig, TwilioConfig};
use texter::external::CampaignSystemClient;
use texter::merge::CongressTagMerger;
use texter::server::{AppState, routes};
use texter::sms::TwilioTransport;
use texter::store::{LibSqlAudienceSource, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let server_config = ServerConfig::from_env();
    let campaign_config = CampaignConfig::from_env()?;
    let twilio_config = TwilioConfig::from_env()?;
    let api_config = ApiConfig::from_env()?;

    eprintln!("📱 texter v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   HTTP: http://0.0.0.0:{}", server_config.port);
    eprintln!("   From: {}", campaign_config.from_number);
    eprintln!("   Campaign API: {}", api_config.base_url);

    // ── Stores ───────────────────────────────────────────────────────────
    let store = Arc::new(
        LibSqlBackend::new_local(&server_config.db_path)
            .await
            .with_context(|| format!("opening record store at {}", server_config.db_path.display()))?,
    );
    eprintln!("   Database: {}", server_config.db_path.display());

    let source = Arc::new(
        LibSqlAudienceSource::new_local(&server_config.audience_db_path)
            .await
            .with_context(|| {
                format!(
                    "opening audience source at {}",
                    server_config.audience_db_path.display()
                )
            })?,
    );
    eprintln!("   Audience: {}", server_config.audience_db_path.display());

    // ── Collaborators ────────────────────────────────────────────────────
    let api = CampaignSystemClient::new(api_config);
    if !api.is_secured() {
        tracing::warn!("RRN_API_SECRET not set, campaign system requests are unauthenticated");
    }

    let deps = CampaignDeps {
        transport: Arc::new(TwilioTransport::new(twilio_config)),
        merger: Arc::new(CongressTagMerger),
        store,
        api: Arc::new(api),
        config: campaign_config,
    };
    let state = AppState::new(deps, source);
    let manager = state.manager.clone();

    // ── HTTP ─────────────────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", server_config.port))
        .await
        .with_context(|| format!("binding port {}", server_config.port))?;
    tracing::info!(port = server_config.port, "texter server started");

    axum::serve(listener, routes(state))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutdown requested");
        })
        .await?;

    // Persist where every running campaign stopped.
    manager.stop_all().await;
    tracing::info!("texter stopped");
    Ok(())
}
