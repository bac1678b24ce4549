use std::sync::Arc;

use anyhow::Context;
use beckn_registry::RegistryState;
use beckn_store::StoreDb;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    beckn_node::init();
    info!("beckn-registry starting");

    let store = Arc::new(StoreDb::open(beckn_node::db_path()).context("opening state database")?);
    let identity = beckn_node::load_identity()?;

    let site_verification_request_id =
        std::env::var("BECKN_SITE_VERIFICATION_REQUEST_ID").context("missing BECKN_SITE_VERIFICATION_REQUEST_ID")?;

    let state = RegistryState {
        store,
        signing_key: identity.signing_key,
        x25519_secret: identity.x25519_secret,
        site_verification_request_id,
    };

    let addr = beckn_node::listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await.context("binding listener")?;
    info!(%addr, "registry listening");
    axum::serve(listener, beckn_registry::router(state)).await.context("serving registry")?;

    Ok(())
}
