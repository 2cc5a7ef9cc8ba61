//! A client for the [Aggregated Discovery Service](https://www.envoyproxy.io/docs/envoy/latest/api-docs/xds_protocol)
//! that keeps a local view of clusters (CDS) and their endpoints (EDS).
//!
//! The client handles:
//! - The ADS stream lifecycle (open, receive loop, close)
//! - Discovery of every cluster, then subscription to their endpoints
//! - Version/nonce tracking and ACK/NACK
//! - A thread-safe [`ResourceStore`] answering "which clusters exist" and
//!   "which endpoints belong to this cluster"
//!
//! It does NOT pick endpoints, health-check them, or handle any resource
//! type other than `Cluster` and `ClusterLoadAssignment`.
//!
//! # Example
//!
//! ```no_run
//! # async fn example() -> ads_client::Result<()> {
//! use std::sync::Arc;
//! use ads_client::{AdsClient, TokioRuntime};
//!
//! let client = Arc::new(AdsClient::open("http://127.0.0.1:18000", "dns-1").await?);
//! client.spawn(TokioRuntime);
//!
//! // Later, from any thread:
//! for cluster in client.clusters() {
//!     if let Some(assignment) = client.assignment(&cluster) {
//!         for address in assignment.addresses() {
//!             println!("{cluster}: {address}");
//!         }
//!     }
//! }
//!
//! client.close();
//! # Ok(())
//! # }
//! ```
//!
//! # Feature Flags
//!
//! - `transport-tonic`: Enables the `tonic` transport and [`AdsClient::open`]. Enables `rt-tokio`. Enabled by default.
//! - `rt-tokio`: Enables the `tokio` runtime used by the supervisor. Enabled by default.
//! - `test-util`: Exposes the in-memory `testutil::MockTransport`.

pub mod client;
pub mod codec;
pub mod error;
pub mod message;
pub mod resource;
pub mod runtime;
pub mod store;
pub mod transport;

#[cfg(any(test, feature = "test-util"))]
pub mod testutil;

pub use client::config::ClientConfig;
pub use client::dispatch::{FollowUp, ResponseDispatcher, TypeState};
pub use client::request::RequestBuilder;
pub use client::retry::{Backoff, RetryPolicy};
pub use client::supervisor::supervise;
pub use client::{AdsClient, AdsStream, SessionState};
pub use codec::XdsCodec;
pub use codec::prost::ProstCodec;
pub use error::{Error, Result};
pub use message::{DiscoveryRequest, DiscoveryResponse, ErrorDetail, Locality, Node, ResourceAny};
pub use resource::{
    Cluster, ClusterLoadAssignment, EndpointAddress, EndpointHost, LbEndpoint, LocalityEndpoints,
    Resource, ResourceKind, TypeUrl,
};
pub use runtime::Runtime;
pub use store::ResourceStore;
pub use transport::{Transport, TransportStream};

// Tokio runtime
#[cfg(feature = "rt-tokio")]
pub use runtime::tokio::TokioRuntime;

// Tonic transport
#[cfg(feature = "transport-tonic")]
pub use transport::tonic::{TonicAdsStream, TonicTransport};
