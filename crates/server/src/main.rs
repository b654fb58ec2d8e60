use std::net::SocketAddr;
use std::sync::Arc;

use tinta_server::config::AppConfig;
use tinta_server::export::{PdfRenderer, RENDER_TIMEOUT};
use tinta_server::mail::{HttpMailer, LogMailer, MAIL_TIMEOUT, Mailer};
use tinta_server::{AppState, build_router, storage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tinta_server=info,tower_http=info".into()),
        )
        .init();

    let config = AppConfig::from_env();
    tracing::info!("data directory: {}", config.data_dir.display());

    // Initialize database
    let db = storage::init_db(&config.data_dir)?;
    tracing::info!("database initialized");

    if config.jwt_secret.is_empty() {
        tracing::warn!("JWT_SECRET not set, login and authenticated routes are disabled");
    }

    let mailer: Arc<dyn Mailer> = match config.email.clone() {
        Some(provider) => {
            tracing::info!("email provider: {}", provider.url);
            Arc::new(HttpMailer::new(provider, MAIL_TIMEOUT)?)
        }
        None => {
            tracing::warn!("no email provider configured, emails will only be logged");
            Arc::new(LogMailer::new())
        }
    };

    let pdf = config
        .pdf_render_url
        .as_deref()
        .map(|url| PdfRenderer::new(url, RENDER_TIMEOUT))
        .transpose()?;
    if pdf.is_none() {
        tracing::info!("PDF_RENDER_URL not set, PDF export disabled");
    }

    let port = config.port;
    let base_url = config.base_url.clone();
    let app = build_router(AppState {
        db,
        config,
        mailer,
        pdf,
    });

    tracing::info!("starting server at {base_url}");

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
