use std::sync::Arc;

use anyhow::Context;
use beckn_adapter::AdapterState;
use beckn_core::types::Role;
use beckn_store::StoreDb;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    beckn_node::init();
    info!("beckn-bap starting");

    let store = Arc::new(StoreDb::open(beckn_node::db_path()).context("opening state database")?);
    let identity = beckn_node::load_identity()?;

    let state = AdapterState {
        store,
        role: Role::Bap,
        subscriber_id: identity.subscriber_id,
        unique_key_id: identity.unique_key_id,
        signing_key: identity.signing_key,
        middleware_config: beckn_node::load_middleware_config(),
        enforce_settlement: false,
        http_client: reqwest::Client::new(),
    };

    let addr = beckn_node::listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await.context("binding listener")?;
    info!(%addr, "BAP adapter listening");
    axum::serve(
        listener,
        beckn_adapter::router(state).into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .context("serving BAP adapter")?;

    Ok(())
}
