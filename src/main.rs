//! Clinic IVR - stateless telephone menu server
//!
//! Answers telephony provider webhooks with `TwiML`. All per-call state
//! travels in the callback addresses, so any instance can serve any request.

mod api;
mod config;
mod gateway;
mod ivr;
mod locale;
mod menu;
mod twiml;

use api::{create_router, AppState};
use config::Config;
use gateway::{TelephonyGateway, TwilioGateway, UnconfiguredGateway};
use ivr::DialogEngine;
use locale::LocaleTable;
use menu::MenuScript;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clinic_ivr=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = Config::from_env()?;

    // Prompt table
    let locales = match &config.locales_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading prompt table");
            LocaleTable::load(path, &config.base_locale)?
        }
        None => LocaleTable::builtin(&config.base_locale)?,
    };
    tracing::info!(
        locales = ?locales.locales().collect::<Vec<_>>(),
        base = %locales.base(),
        "Prompt table loaded"
    );

    // Dialog engine; refuses to start on an incomplete script or table
    let script = MenuScript::clinic(&config.menu);
    let engine = DialogEngine::new(Arc::new(script), Arc::new(locales))?;
    tracing::info!(
        nodes = engine.script().nodes.len(),
        entry = %engine.script().entry,
        "Menu script validated"
    );

    // Outbound calling
    let gateway: Arc<dyn TelephonyGateway> = match config.twilio.clone() {
        Some(twilio) => {
            tracing::info!(from = %twilio.from_number, "Twilio gateway configured");
            Arc::new(TwilioGateway::new(twilio)?)
        }
        None => {
            tracing::warn!(
                "No Twilio credentials configured. Set TWILIO_ACCOUNT_SID, TWILIO_AUTH_TOKEN and TWILIO_FROM_NUMBER to place outbound calls."
            );
            Arc::new(UnconfiguredGateway)
        }
    };

    if config.public_base_url.is_none() {
        tracing::info!("IVR_PUBLIC_BASE_URL not set; deriving callback addresses from request headers");
    }

    let state = AppState::new(Arc::new(engine), gateway, config.public_base_url.clone());
    let app = create_router(state);

    // Start server
    tracing::info!(addr = %config.bind_address, "Clinic IVR listening");

    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
