//! Entitlement Engine server
//!
//! ## Endpoints
//!
//! - `POST /webhooks/:gateway` - provider callbacks (stripe, razorpay)
//! - `/api/purchases/...` - lifecycle commands and record lookups
//! - `/api/users/:user_id/...` - history and entitlement checks
//! - `GET /api/entitlements?credential=...` - credential lookup
//! - `GET /health` - liveness probe

use std::sync::Arc;

use anyhow::Context;
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::signal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use entitlement_engine::adapters::events::TracingEventPublisher;
use entitlement_engine::adapters::http::{router, AppState};
use entitlement_engine::adapters::postgres::{
    PostgresPlanCatalog, PostgresPurchaseRepository, PostgresWebhookEventRepository,
};
use entitlement_engine::adapters::razorpay::{RazorpayClient, RazorpayClientConfig};
use entitlement_engine::adapters::stripe::{StripeClient, StripeClientConfig};
use entitlement_engine::application::{
    CredentialManager, LifecycleManager, RazorpayReconciler, ReconcilerRegistry,
    ReconciliationService, StripeReconciler,
};
use entitlement_engine::config::{AppConfig, DatabaseConfig, PaymentConfig};
use entitlement_engine::ports::PurchaseRepository;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("loading configuration")?;
    init_tracing(&config);
    config.validate().context("invalid configuration")?;

    tracing::info!(
        environment = ?config.server.environment,
        port = config.server.port,
        "starting entitlement engine"
    );

    let pool = connect(&config.database).await?;

    let purchases: Arc<dyn PurchaseRepository> =
        Arc::new(PostgresPurchaseRepository::new(pool.clone()));
    let lifecycle = Arc::new(LifecycleManager::new(
        purchases.clone(),
        Arc::new(PostgresPlanCatalog::new(pool.clone())),
        CredentialManager::new(purchases.clone(), config.credentials.max_attempts),
        Arc::new(TracingEventPublisher::new()),
    ));

    let registry = build_registry(&config.payment)?;
    tracing::info!(gateways = ?registry.gateways(), "webhook reconcilers registered");

    let reconciliation = Arc::new(ReconciliationService::new(
        registry,
        lifecycle.clone(),
        purchases,
        Arc::new(PostgresWebhookEventRepository::new(pool)),
    ));

    let app = router(
        AppState {
            lifecycle,
            reconciliation,
        },
        config.server.request_timeout(),
    );

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    tracing::info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins over `server.log_level`; JSON lines in production.
fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if config.is_production() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn connect(database: &DatabaseConfig) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .min_connections(database.min_connections)
        .max_connections(database.max_connections)
        .acquire_timeout(database.acquire_timeout())
        .idle_timeout(Some(database.idle_timeout()))
        .connect(&database.url)
        .await
        .context("connecting to database")?;

    if database.run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("running migrations")?;
        tracing::info!("migrations applied");
    }
    Ok(pool)
}

/// One reconciler per configured provider. Follow-up API clients are only
/// attached when API credentials are configured.
fn build_registry(payment: &PaymentConfig) -> anyhow::Result<ReconcilerRegistry> {
    let mut registry = ReconcilerRegistry::new();

    if let Some(stripe) = &payment.stripe {
        let mut reconciler =
            StripeReconciler::new(SecretString::new(stripe.webhook_secret.clone()));
        if let Some(api_key) = &stripe.api_key {
            let mut client_config = StripeClientConfig::new(SecretString::new(api_key.clone()))
                .with_timeout(payment.http_timeout());
            if let Some(url) = &stripe.api_base_url {
                client_config = client_config.with_base_url(url.as_str());
            }
            reconciler = reconciler.with_client(Arc::new(StripeClient::new(client_config)?));
        } else {
            tracing::warn!("stripe api_key not set; invoice lookups disabled");
        }
        registry = registry.register(Arc::new(reconciler));
    }

    if let Some(razorpay) = &payment.razorpay {
        let mut reconciler =
            RazorpayReconciler::new(SecretString::new(razorpay.webhook_secret.clone()));
        if let Some((key_id, key_secret)) = razorpay.api_credentials() {
            let mut client_config =
                RazorpayClientConfig::new(key_id, SecretString::new(key_secret.to_string()))
                    .with_timeout(payment.http_timeout());
            if let Some(url) = &razorpay.api_base_url {
                client_config = client_config.with_base_url(url.as_str());
            }
            reconciler = reconciler.with_client(Arc::new(RazorpayClient::new(client_config)?));
        } else {
            tracing::warn!("razorpay key_id/key_secret not set; order lookups disabled");
        }
        registry = registry.register(Arc::new(reconciler));
    }

    Ok(registry)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => tracing::error!(error = %err, "failed to listen for SIGTERM"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
