use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use careers_api::applications::pg_store::PgApplicationStore;
use careers_api::config::Config;
use careers_api::db::create_pool;
use careers_api::notifications::{
    DisabledMailer, Mailer, NotificationSettings, Notifier, SmtpMailer,
};
use careers_api::routes::build_router;
use careers_api::state::AppState;
use careers_api::storage::{DisabledStorage, ResumeStorage, S3ResumeStorage};

#[tokio::main]
async fn main() -> Result<()> {
    // Fails fast on missing required env vars
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Careers API v{}", env!("CARGO_PKG_VERSION"));

    let db = create_pool(&config.database_url).await?;
    let store = Arc::new(PgApplicationStore::new(db));

    let storage: Arc<dyn ResumeStorage> = match &config.storage {
        Some(storage_config) => {
            info!("Resume storage: bucket {}", storage_config.bucket);
            Arc::new(S3ResumeStorage::from_config(storage_config, config.max_resume_bytes).await)
        }
        None => {
            warn!("S3_BUCKET not configured; resume uploads are disabled");
            Arc::new(DisabledStorage)
        }
    };

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => match SmtpMailer::from_config(smtp, &config.company_name) {
            Ok(mailer) => {
                info!("SMTP mailer ready ({}:{})", smtp.host, smtp.port);
                Arc::new(mailer)
            }
            Err(e) => {
                warn!("SMTP mailer could not be built, email is disabled: {e}");
                Arc::new(DisabledMailer)
            }
        },
        None => {
            warn!("SMTP not configured; notification emails are disabled");
            Arc::new(DisabledMailer)
        }
    };

    let notifier = Notifier::new(
        mailer,
        NotificationSettings {
            company_name: config.company_name.clone(),
            frontend_url: config.frontend_url.clone(),
            hr_mailbox: config.smtp.as_ref().map(|smtp| smtp.hr_mailbox.clone()),
        },
    );

    let state = AppState {
        store,
        storage,
        notifier,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
