//! Shared fixtures for gateway integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::connect_info::MockConnectInfo,
    http::{Request, Response},
    Router,
};
use http_body_util::BodyExt;
use tower::ServiceExt;

use mediascrape_engine::events::{DiscoverEmbedsEvent, DiscoveredEmbed, InitEvent};
use mediascrape_engine::media::{EmbedRequest, ScrapeMedia, SourceRequest};
use mediascrape_engine::output::{EmbedOutput, MediaStream, RunOutput, SourcererOutput};
use mediascrape_engine::{
    EngineError, EngineEvent, EventSink, ProviderMeta, ScrapeEngine, UpdateEvent,
};
use mediascrape_gateway::api::{build_router, AppState};
use mediascrape_gateway::auth::jwt::SessionTokenCodec;
use mediascrape_gateway::auth::turnstile::{
    AttestationOutcome, AttestationVerifier, TurnstileError,
};
use mediascrape_gateway::auth::AuthBroker;
use mediascrape_gateway::config::Config;

pub const CLIENT_IP: [u8; 4] = [203, 0, 113, 7];
pub const JWT_SECRET: &str = "integration-secret";

/// How the stub engine resolves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Stream,
    Nothing,
    Fail,
}

/// Engine reporting a fixed event script, then resolving with `outcome`
pub struct StubEngine {
    pub outcome: Outcome,
    pub invocations: AtomicUsize,
}

impl StubEngine {
    pub fn new(outcome: Outcome) -> Arc<Self> {
        Arc::new(Self {
            outcome,
            invocations: AtomicUsize::new(0),
        })
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    fn hls() -> MediaStream {
        MediaStream::Hls {
            id: "primary".to_string(),
            playlist: "https://cdn.example/master.m3u8".to_string(),
            flags: vec!["cors-allowed".to_string()],
            captions: vec![],
        }
    }

    fn failure() -> EngineError {
        EngineError::Scraper {
            id: "alpha".to_string(),
            message: "layout changed".to_string(),
        }
    }
}

#[async_trait]
impl ScrapeEngine for StubEngine {
    async fn run_all(
        &self,
        _media: ScrapeMedia,
        events: EventSink,
    ) -> mediascrape_engine::Result<Option<RunOutput>> {
        self.invocations.fetch_add(1, Ordering::SeqCst);

        events.emit(EngineEvent::Init(InitEvent {
            source_ids: vec!["alpha".to_string(), "beta".to_string()],
        }));
        events.emit(EngineEvent::Start("alpha".to_string()));
        events.emit(EngineEvent::Update(UpdateEvent::pending("alpha", 50)));
        events.emit(EngineEvent::DiscoverEmbeds(DiscoverEmbedsEvent {
            source_id: "alpha".to_string(),
            embeds: vec![DiscoveredEmbed {
                id: "alpha-0".to_string(),
                embed_scraper_id: "upcloud".to_string(),
            }],
        }));

        match self.outcome {
            Outcome::Stream => Ok(Some(RunOutput {
                source_id: "alpha".to_string(),
                embed_id: Some("upcloud".to_string()),
                stream: Self::hls(),
            })),
            Outcome::Nothing => Ok(None),
            Outcome::Fail => Err(Self::failure()),
        }
    }

    async fn run_source_scraper(
        &self,
        request: SourceRequest,
        events: EventSink,
    ) -> mediascrape_engine::Result<SourcererOutput> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        events.emit(EngineEvent::Update(UpdateEvent::pending(request.id.as_str(), 10)));

        match self.outcome {
            Outcome::Stream => Ok(SourcererOutput {
                embeds: vec![],
                stream: Some(vec![Self::hls()]),
            }),
            Outcome::Nothing => Ok(SourcererOutput::default()),
            Outcome::Fail => Err(Self::failure()),
        }
    }

    async fn run_embed_scraper(
        &self,
        request: EmbedRequest,
        events: EventSink,
    ) -> mediascrape_engine::Result<EmbedOutput> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        events.emit(EngineEvent::Update(UpdateEvent::pending(request.id.as_str(), 10)));

        match self.outcome {
            Outcome::Stream => Ok(EmbedOutput {
                stream: vec![Self::hls()],
            }),
            Outcome::Nothing => Ok(EmbedOutput::default()),
            Outcome::Fail => Err(Self::failure()),
        }
    }

    fn list_sources(&self) -> Vec<ProviderMeta> {
        vec![
            ProviderMeta::source("alpha", "Alpha", 200),
            ProviderMeta::source("beta", "Beta", 100),
        ]
    }

    fn list_embeds(&self) -> Vec<ProviderMeta> {
        vec![ProviderMeta::embed("upcloud", "UpCloud", 300)]
    }
}

/// Attestation service accepting exactly the response "human"
#[derive(Default)]
pub struct StubVerifier {
    pub calls: AtomicUsize,
}

#[async_trait]
impl AttestationVerifier for StubVerifier {
    async fn verify(
        &self,
        response: &str,
        _remote_ip: &str,
    ) -> Result<AttestationOutcome, TurnstileError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if response == "human" {
            Ok(AttestationOutcome {
                success: true,
                error_codes: vec![],
            })
        } else {
            Ok(AttestationOutcome {
                success: false,
                error_codes: vec!["invalid-input-response".to_string()],
            })
        }
    }
}

/// Router without authentication
pub fn open_app(engine: Arc<StubEngine>) -> Router {
    app(engine, None, Config::default())
}

/// Router with the credential gate enabled
pub fn gated_app(engine: Arc<StubEngine>, verifier: Arc<StubVerifier>) -> Router {
    let mut config = Config::default();
    config.auth.enabled = true;
    config.auth.jwt_secret = JWT_SECRET.to_string();

    let broker = AuthBroker::new(verifier, SessionTokenCodec::new(JWT_SECRET, 600));
    app(engine, Some(Arc::new(broker)), config)
}

pub fn app(engine: Arc<StubEngine>, auth: Option<Arc<AuthBroker>>, config: Config) -> Router {
    let state = AppState::new(engine, auth, Arc::new(config));
    build_router(state).layer(MockConnectInfo(SocketAddr::from((CLIENT_IP, 40000))))
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn get_with_header(app: Router, uri: &str, name: &str, value: &str) -> Response<Body> {
    app.oneshot(
        Request::get(uri)
            .header(name, value)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

/// A parsed server-sent event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub id: u64,
    pub event: String,
    pub data: String,
}

/// Parse an SSE body, skipping keep-alive comments
pub fn parse_frames(body: &str) -> Vec<Frame> {
    body.split("\n\n")
        .filter_map(|block| {
            let mut id = None;
            let mut event = None;
            let mut data: Vec<&str> = Vec::new();

            for line in block.lines() {
                if let Some(value) = field(line, "id") {
                    id = value.parse().ok();
                } else if let Some(value) = field(line, "event") {
                    event = Some(value.to_string());
                } else if let Some(value) = field(line, "data") {
                    data.push(value);
                }
            }

            Some(Frame {
                id: id?,
                event: event?,
                data: data.join("\n"),
            })
        })
        .collect()
}

fn field<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(name)?.strip_prefix(':')?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

pub async fn frames_of(response: Response<Body>) -> Vec<Frame> {
    parse_frames(&body_string(response).await)
}

pub const MOVIE_QUERY: &str = "type=movie&title=Heat&releaseYear=1995&tmdbId=949";
