//! Media Scrape Gateway
//!
//! Streams media scraping progress to browsers over Server-Sent Events.
//! Requests are gated by a Turnstile attestation or a short-lived session
//! token bound to the client IP; scrapers reach the network through a router
//! that relays selected hosts via a proxy.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │                         mediascrape-gateway                           │
//! ├───────────────────────────────────────────────────────────────────────┤
//! │                                                                       │
//! │  ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────┐  │
//! │  │  HTTP API (axum) │──▶│  Auth Broker     │──▶│  Turnstile /     │  │
//! │  │  /scrape[/...]   │   │  (credential)    │   │  session codec   │  │
//! │  └────────┬─────────┘   └──────────────────┘   └──────────────────┘  │
//! │           │ validated request                                         │
//! │           ▼                                                           │
//! │  ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────┐  │
//! │  │  Event Relay     │──▶│  Scrape Engine   │──▶│  Fetch Router    │  │
//! │  │  (SSE frames)    │◀──│  (EventSink)     │   │  direct / proxy  │  │
//! │  └──────────────────┘   └──────────────────┘   └──────────────────┘  │
//! └───────────────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod fetch_router;
pub mod relay;
pub mod schema;
