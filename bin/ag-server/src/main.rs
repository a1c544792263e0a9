//! AuthGate Server
//!
//! Thin backend that delegates identity to an external OIDC provider:
//! - Browser sign-in: /login, /callback, /logout, /user-info, /protected
//! - Phone verification via the provider management API: /send-code, /verify-code
//!
//! ## Configuration
//!
//! Settings come from `config.toml` / `authgate.toml` with `AUTHGATE_*`
//! environment overrides, see `ag-config`. The server refuses to start on
//! missing provider credentials or a weak session secret.
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `AUTHGATE_CONFIG` | Explicit config file path |
//! | `AUTHGATE_PROVIDER_ENDPOINT` | Provider base URL |
//! | `AUTHGATE_PROVIDER_APP_ID` / `_APP_SECRET` | Browser-facing app credentials |
//! | `AUTHGATE_M2M_APP_ID` / `_APP_SECRET` | Management API credentials |
//! | `AUTHGATE_SESSION_SECRET` | Session cookie HMAC key (>= 32 chars) |
//! | `RUST_LOG` | Log level (default `info`) |
//! | `LOG_FORMAT` | `json` for JSON logs |

use anyhow::Result;
use axum::{http::HeaderValue, response::Json, routing::get, Router};
use tokio::{net::TcpListener, signal};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use ag_config::AppConfig;
use ag_gateway::{auth_router, verification_router, GatewayState};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "AuthGate API",
        description = "OIDC sign-in gateway and provider verification operations"
    ),
    paths(
        ag_gateway::auth_api::home,
        ag_gateway::auth_api::login,
        ag_gateway::auth_api::callback,
        ag_gateway::auth_api::logout,
        ag_gateway::auth_api::user_info,
        ag_gateway::auth_api::protected,
        ag_gateway::verification_api::send_code,
        ag_gateway::verification_api::verify_code,
    ),
    tags(
        (name = "auth", description = "Browser sign-in flow"),
        (name = "verification", description = "Phone verification codes")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> Result<()> {
    ag_common::logging::init_logging("ag-server");

    info!("Starting AuthGate server");

    let config = AppConfig::load()?;
    config.validate()?;

    let addr = format!("{}:{}", config.http.host, config.http.port);
    let cors_origins: Vec<HeaderValue> = config
        .http
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let state = GatewayState::from_config(config)?;

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(cors_origins))
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(auth_router(state.clone()))
        .merge(verification_router(state))
        .route("/health", get(health_handler))
        .merge(SwaggerUi::new("/swagger-ui").url("/q/openapi", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    info!("API server listening on http://{}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("AuthGate server shutdown complete");
    Ok(())
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "UP",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
