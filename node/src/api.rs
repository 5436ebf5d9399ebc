//! # REST API
//!
//! Read-mostly HTTP surface over the contract gateway. Everything served
//! here is fetched from the chain on demand — the node indexes nothing
//! and caches nothing, so a response is never staler than the view call
//! behind it.
//!
//! Routes:
//!
//! - `GET  /health` — liveness probe.
//! - `GET  /status` — network name, chain ID, block height, version.
//! - `GET  /amc-pools` — every pool, fetched in fixed-size pages.
//! - `GET  /pools/:id` — one pool, 404 when unknown.
//! - `GET  /receivables/:id` — one receivable, 404 when unknown.
//! - `GET  /exporters/:address/receivables` — an exporter's receivables.
//! - `GET  /listings/:id` — one marketplace listing, 404 when unknown.
//! - `POST /faucet` — devnet MockUSDC mint to the given address.

use std::sync::Arc;

use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use novax_contracts::chain::LocalChain;
use novax_protocol::chain::ChainError;
use novax_protocol::config::{self, CHAIN_ID_HEX, FAUCET_AMOUNT_USDC};
use novax_protocol::gateway::{ContractService, GatewayError, ListingView, PoolView, ReceivableView};

use crate::metrics::SharedMetrics;

/// Shared application state for all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Gateway the handlers read through.
    pub service: Arc<ContractService>,
    /// The backing devnet chain, for height and faucet access.
    pub chain: Arc<LocalChain>,
    /// Prometheus handles.
    pub metrics: SharedMetrics,
    /// Node version reported by `/health` and `/status`.
    pub version: String,
}

/// Builds the API router with CORS, tracing, and latency instrumentation.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/amc-pools", get(amc_pools))
        .route("/pools/:id", get(pool_by_id))
        .route("/receivables/:id", get(receivable_by_id))
        .route("/exporters/:address/receivables", get(exporter_receivables))
        .route("/listings/:id", get(listing_by_id))
        .route("/faucet", post(faucet))
        .layer(middleware::from_fn_with_state(
            state.metrics.clone(),
            track_latency,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Records wall-clock request latency into the histogram.
async fn track_latency(
    State(metrics): State<SharedMetrics>,
    request: Request,
    next: Next,
) -> Response {
    let timer = metrics.request_latency_seconds.start_timer();
    let response = next.run(request).await;
    timer.observe_duration();
    response
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Standard error payload.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub network: String,
    pub chain_id: String,
    pub block_height: u64,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PoolsResponse {
    pub pools: Vec<PoolView>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReceivablesResponse {
    pub receivables: Vec<ReceivableView>,
    pub count: usize,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct FaucetRequest {
    pub address: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FaucetResponse {
    pub address: String,
    /// Minted amount in 6-decimal USDC units, string-encoded like every
    /// other raw amount on the wire.
    pub amount: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: state.version.clone(),
    })
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let height = state.chain.height();
    state.metrics.block_height.set(height as i64);
    Json(StatusResponse {
        network: config::network_name(CHAIN_ID_HEX),
        chain_id: CHAIN_ID_HEX.into(),
        block_height: height,
        version: state.version.clone(),
        timestamp: Utc::now(),
    })
}

async fn amc_pools(State(state): State<AppState>) -> Result<Json<PoolsResponse>, Response> {
    let pools = state
        .service
        .get_all_pools()
        .await
        .map_err(gateway_error_response)?;
    let active = pools.iter().filter(|p| p.status == "Active").count();
    state.metrics.pools_active.set(active as i64);
    let count = pools.len();
    Ok(Json(PoolsResponse { pools, count }))
}

async fn pool_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PoolView>, Response> {
    match state.service.get_pool(&id).await {
        Ok(Some(pool)) => Ok(Json(pool)),
        Ok(None) => Err(not_found("pool")),
        Err(e) => Err(gateway_error_response(e)),
    }
}

async fn receivable_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ReceivableView>, Response> {
    match state.service.get_receivable(&id).await {
        Ok(Some(receivable)) => Ok(Json(receivable)),
        Ok(None) => Err(not_found("receivable")),
        Err(e) => Err(gateway_error_response(e)),
    }
}

async fn exporter_receivables(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<ReceivablesResponse>, Response> {
    let receivables = state
        .service
        .get_exporter_receivables(&address)
        .await
        .map_err(gateway_error_response)?;
    let count = receivables.len();
    Ok(Json(ReceivablesResponse { receivables, count }))
}

async fn listing_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ListingView>, Response> {
    match state.service.get_listing(&id).await {
        Ok(Some(listing)) => Ok(Json(listing)),
        Ok(None) => Err(not_found("listing")),
        Err(e) => Err(gateway_error_response(e)),
    }
}

/// Devnet-only: mints the standard faucet amount of MockUSDC.
async fn faucet(
    State(state): State<AppState>,
    Json(request): Json<FaucetRequest>,
) -> Result<Json<FaucetResponse>, Response> {
    if !request.address.starts_with("0x") {
        return Err(bad_request("address must be 0x-prefixed"));
    }
    state
        .chain
        .faucet_mint(&request.address, FAUCET_AMOUNT_USDC)
        .map_err(|e| bad_request(&e.to_string()))?;
    tracing::info!(address = %request.address, "faucet mint");
    Ok(Json(FaucetResponse {
        address: request.address,
        amount: FAUCET_AMOUNT_USDC.to_string(),
    }))
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

fn not_found(what: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("{what} not found"),
        }),
    )
        .into_response()
}

fn bad_request(reason: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: reason.to_string(),
        }),
    )
        .into_response()
}

/// Maps gateway failures onto HTTP statuses: reverts are the caller's
/// fault, missing provider means the node is not ready, transport
/// failures are upstream trouble.
fn gateway_error_response(e: GatewayError) -> Response {
    let status = match &e {
        GatewayError::Chain(ChainError::Revert(_)) => StatusCode::BAD_REQUEST,
        GatewayError::ProviderNotInitialized | GatewayError::SignerNotInitialized => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        GatewayError::Chain(err) if err.is_transient() => StatusCode::BAD_GATEWAY,
        GatewayError::Chain(ChainError::AllEndpointsFailed(_)) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    tracing::warn!(error = %e, status = %status, "request failed");
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{MeteredProvider, NodeMetrics};
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use chrono::Duration;
    use http_body_util::BodyExt;
    use novax_protocol::chain::ChainProvider;
    use novax_protocol::gateway::AddressBook;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const AMC: &str = "0xamc";
    const EXPORTER: &str = "0xexporter";
    const HUNDRED_USDC: u128 = 100_000_000;

    async fn test_state() -> AppState {
        let chain = Arc::new(LocalChain::new(AddressBook::devnet(), AMC));
        let metrics = Arc::new(NodeMetrics::new());
        let service = Arc::new(ContractService::new(AddressBook::devnet()));
        let provider: Arc<dyn ChainProvider> =
            Arc::new(MeteredProvider::new(chain.clone(), metrics.clone()));
        service.initialize(provider, AMC).await;
        AppState {
            service,
            chain,
            metrics,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Signs the state's gateway as another actor, re-wrapping the chain
    /// in the same metered provider.
    async fn sign_as(state: &AppState, actor: &str) {
        let provider: Arc<dyn ChainProvider> = Arc::new(MeteredProvider::new(
            state.chain.clone(),
            state.metrics.clone(),
        ));
        state.service.initialize(provider, actor).await;
    }

    /// Creates a verified receivable and an open pool. Leaves the gateway
    /// signed as the AMC.
    async fn seeded_pool(state: &AppState) -> (String, String) {
        sign_as(state, EXPORTER).await;
        let created = state
            .service
            .create_receivable(
                "0ximporter",
                HUNDRED_USDC,
                Utc::now() + Duration::days(90),
                "QmDocs",
            )
            .await
            .unwrap();
        sign_as(state, AMC).await;
        state
            .service
            .verify_receivable(&created.receivable_id, true, 30, 800)
            .await
            .unwrap();
        let pool = state
            .service
            .create_pool(
                &created.receivable_id,
                HUNDRED_USDC,
                800,
                Utc::now() + Duration::days(90),
            )
            .await
            .unwrap();
        (created.receivable_id, pool.pool_id)
    }

    async fn get(app: Router, path: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri(path)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn post_json(app: Router, path: &str, body: Value) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri(path)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let state = test_state().await;
        let app = create_router(state);

        let (status, body) = get(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn status_reports_network_and_height() {
        let state = test_state().await;
        seeded_pool(&state).await;
        let app = create_router(state.clone());

        let (status, body) = get(app, "/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["network"], "Etherlink Testnet");
        assert_eq!(body["chain_id"], CHAIN_ID_HEX);
        // Three transactions were sealed during seeding.
        assert!(body["block_height"].as_u64().unwrap() >= 3);
        assert_eq!(state.metrics.block_height.get() as u64, state.chain.height());
    }

    #[tokio::test]
    async fn pool_lookup_finds_and_404s() {
        let state = test_state().await;
        let (_, pool_id) = seeded_pool(&state).await;

        let (status, body) = get(create_router(state.clone()), &format!("/pools/{pool_id}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pool_id"], pool_id);
        assert_eq!(body["status"], "Active");
        assert_eq!(body["target_amount"], "100000000");

        let (status, body) = get(create_router(state), "/pools/0xdeadbeef").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "pool not found");
    }

    #[tokio::test]
    async fn receivable_lookup_finds_and_404s() {
        let state = test_state().await;
        let (receivable_id, _) = seeded_pool(&state).await;

        let (status, body) = get(
            create_router(state.clone()),
            &format!("/receivables/{receivable_id}"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], receivable_id);
        assert_eq!(body["status"], "Verified");

        let (status, _) = get(create_router(state), "/receivables/0xnope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn exporter_index_is_scoped_to_the_address() {
        let state = test_state().await;
        seeded_pool(&state).await;
        seeded_pool(&state).await;

        let (status, body) = get(
            create_router(state.clone()),
            &format!("/exporters/{EXPORTER}/receivables"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);

        let (status, body) = get(create_router(state), "/exporters/0xnobody/receivables").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn amc_pools_lists_all_and_tracks_the_gauge() {
        let state = test_state().await;
        let (_, first) = seeded_pool(&state).await;
        let (_, second) = seeded_pool(&state).await;

        let (status, body) = get(create_router(state.clone()), "/amc-pools").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
        let ids: Vec<&str> = body["pools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["pool_id"].as_str().unwrap())
            .collect();
        assert!(ids.contains(&first.as_str()));
        assert!(ids.contains(&second.as_str()));
        assert_eq!(state.metrics.pools_active.get(), 2);
    }

    #[tokio::test]
    async fn listing_lookup_404s_when_unknown() {
        let state = test_state().await;
        let (status, body) = get(create_router(state), "/listings/0xmissing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "listing not found");
    }

    #[tokio::test]
    async fn faucet_mints_the_standard_amount() {
        let state = test_state().await;
        let (status, body) = post_json(
            create_router(state.clone()),
            "/faucet",
            json!({ "address": "0xalice" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["address"], "0xalice");
        assert_eq!(body["amount"], FAUCET_AMOUNT_USDC.to_string());

        let balance = state
            .service
            .balance_of(&state.service.addresses().usdc_token, "0xalice")
            .await
            .unwrap();
        assert_eq!(balance, FAUCET_AMOUNT_USDC);
    }

    #[tokio::test]
    async fn faucet_rejects_malformed_addresses() {
        let state = test_state().await;
        let (status, body) = post_json(
            create_router(state),
            "/faucet",
            json!({ "address": "alice" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("0x"));
    }
}
