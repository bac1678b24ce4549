use std::sync::Arc;

use anyhow::Context;
use beckn_gateway::GatewayState;
use beckn_store::StoreDb;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    beckn_node::init();
    info!("beckn-gateway starting");

    let store = Arc::new(StoreDb::open(beckn_node::db_path()).context("opening state database")?);
    let identity = beckn_node::load_identity()?;
    let domain = std::env::var("BECKN_GATEWAY_DOMAIN").context("missing BECKN_GATEWAY_DOMAIN")?;

    let broker = beckn_gateway::broker::connect(&beckn_node::amqp_url())
        .await
        .map_err(|e| anyhow::anyhow!("connecting to broker: {e}"))?;

    let state = GatewayState {
        store,
        signing_key: identity.signing_key,
        subscriber_id: identity.subscriber_id,
        unique_key_id: identity.unique_key_id,
        domain,
        middleware_config: beckn_node::load_middleware_config(),
        broker: Some(broker),
        http_client: reqwest::Client::new(),
    };

    beckn_gateway::spawn_workers(state.clone(), beckn_node::gateway_worker_count());

    let addr = beckn_node::listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await.context("binding listener")?;
    info!(%addr, "gateway listening");
    axum::serve(
        listener,
        beckn_gateway::router(state).into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .context("serving gateway")?;

    Ok(())
}
