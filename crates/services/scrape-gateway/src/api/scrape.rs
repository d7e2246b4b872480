//! SSE scrape endpoints
//!
//! Each request goes through the same gate: authenticate (when enabled),
//! validate the query, then hand the typed request to the engine behind a
//! [`relay`]. Failures before that point are plain HTTP errors; after it,
//! they are `error` frames.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Query, State},
    http::HeaderMap,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use futures::stream::Stream;
use tokio_stream::StreamExt;

use super::AppState;
use crate::auth::AuthDecision;
use crate::error::ApiError;
use crate::relay::{relay, SseFrame};
use crate::schema::{self, QueryParams};

/// Full discovery for a movie or show
///
/// GET /scrape
pub async fn scrape(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Query(query): Query<QueryParams>,
) -> Result<impl IntoResponse, ApiError> {
    let token = authorize(&state, &headers, &query, peer).await?;
    let media = schema::parse_scrape_media(&query).map_err(ApiError::Validation)?;

    tracing::info!(
        media_type = media.kind(),
        tmdb_id = %media.tmdb_id(),
        "Starting scrape"
    );

    let engine = state.engine.clone();
    Ok(sse(relay(token, move |sink| async move {
        engine.run_all(media, sink).await
    })))
}

/// Run one embed scraper against a discovered embed URL
///
/// GET /scrape/embed
pub async fn scrape_embed(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Query(query): Query<QueryParams>,
) -> Result<impl IntoResponse, ApiError> {
    let token = authorize(&state, &headers, &query, peer).await?;
    let request = schema::parse_embed_request(&query).map_err(ApiError::Validation)?;

    tracing::info!(embed_id = %request.id, "Starting embed scrape");

    let engine = state.engine.clone();
    Ok(sse(relay(token, move |sink| async move {
        engine.run_embed_scraper(request, sink).await
    })))
}

/// Run one source scraper
///
/// GET /scrape/source
pub async fn scrape_source(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Query(query): Query<QueryParams>,
) -> Result<impl IntoResponse, ApiError> {
    let token = authorize(&state, &headers, &query, peer).await?;
    let request = schema::parse_source_request(&query).map_err(ApiError::Validation)?;

    tracing::info!(
        source_id = %request.id,
        media_type = request.media.kind(),
        "Starting source scrape"
    );

    let engine = state.engine.clone();
    Ok(sse(relay(token, move |sink| async move {
        engine.run_source_scraper(request, sink).await
    })))
}

fn sse<S>(frames: S) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    S: Stream<Item = SseFrame> + Send + 'static,
{
    Sse::new(frames.map(|frame| Ok(frame.to_event()))).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Run the credential gate; returns a freshly issued session token, if any
async fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    query: &QueryParams,
    peer: Option<ConnectInfo<SocketAddr>>,
) -> Result<Option<String>, ApiError> {
    let broker = match &state.auth {
        Some(broker) => broker,
        None => return Ok(None),
    };

    let auth = &state.config.auth;
    let credential = headers
        .get(auth.token_header.as_str())
        .and_then(|value| value.to_str().ok())
        .or_else(|| query.get(&auth.token_query_param).map(String::as_str))
        .unwrap_or_default();

    let client_ip = client_ip(state, headers, peer)?;

    match broker.authenticate(credential, &client_ip).await {
        AuthDecision::Granted { new_token } => Ok(new_token),
        AuthDecision::Denied { error_codes } => {
            tracing::info!(
                client_ip = %client_ip,
                error_codes = ?error_codes,
                "Rejected unauthenticated request"
            );
            Err(ApiError::Unauthorized(error_codes))
        }
    }
}

/// Client IP as observed by the transport, or by a trusted edge header
fn client_ip(
    state: &AppState,
    headers: &HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
) -> Result<String, ApiError> {
    if let Some(header) = &state.config.server.client_ip_header {
        let forwarded = headers
            .get(header.as_str())
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());

        if let Some(ip) = forwarded {
            return Ok(ip.to_string());
        }
        tracing::debug!(header = %header, "Client IP header missing, using peer address");
    }

    peer.map(|ConnectInfo(addr)| addr.ip().to_string())
        .ok_or_else(|| ApiError::Internal("client address unavailable".to_string()))
}
