//! Local Expensa API stand-in for demos and manual testing.
//!
//! Seeds `alice` / `p1` (administrator) and `eve` / `p2` (employee).

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use mock_api::{MockConfig, MockState, API_PREFIX};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = MockConfig::from_env();
    let addr = format!("0.0.0.0:{}", config.listen_port);
    info!(
        access_ttl_secs = config.access_token_ttl_secs,
        "seeded accounts: alice/p1 (admin), eve/p2 (employee)"
    );

    let state = Arc::new(MockState::seeded(config));
    let listener = TcpListener::bind(&addr).await?;
    info!(address = %addr, prefix = API_PREFIX, "mock API listening");
    mock_api::serve(listener, state).await
}
