use llm_responses::analytics::PayloadStore;
use llm_responses::client::ResponsesClient;
use llm_responses::server::{build_router, AppState};
use llm_responses::util::{env_bind_addr, init_tracing};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let client = ResponsesClient::from_env();
    tracing::info!(
        upstream = %client.config().api_base,
        priced_models = client.pricing().models.len(),
        "Responses client configured"
    );
    if client.config().api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY not set; upstream requests are sent without auth");
    }

    match PayloadStore::from_env() {
        Ok(Some(store)) => {
            tracing::info!("Recording logging payloads to {} store", store.backend_type());
            client.add_callback(Arc::new(store));
        }
        Ok(None) => {}
        Err(e) => tracing::error!("Failed to initialize payload store: {}", e),
    }

    let app = build_router(AppState::new(client));

    let addr = env_bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("llm-responses listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
