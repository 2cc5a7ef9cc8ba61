//! The ADS session: owns the stream, drives the request/response loop and
//! exposes the resulting cluster view.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;
use tracing::{Span, info, info_span, warn};

use crate::client::config::ClientConfig;
use crate::client::dispatch::{FollowUp, ResponseDispatcher};
use crate::client::request::RequestBuilder;
use crate::client::retry::RetryPolicy;
use crate::codec::XdsCodec;
use crate::error::{Error, Result};
use crate::message::Node;
use crate::resource::{ClusterLoadAssignment, TypeUrl};
use crate::store::ResourceStore;
use crate::transport::{Transport, TransportStream};

#[cfg(feature = "transport-tonic")]
use crate::codec::prost::ProstCodec;
#[cfg(feature = "transport-tonic")]
use crate::transport::tonic::TonicTransport;

pub mod config;
pub mod dispatch;
pub mod request;
pub mod retry;
pub mod supervisor;

/// Lifecycle of an [`AdsClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, no stream open. The initial state, and the state a session
    /// returns to when its stream ends on its own.
    Created,
    /// A stream is open and its receive loop may run.
    Streaming,
    /// Closed locally. Terminal.
    Closed,
}

/// An open ADS stream together with its per-stream protocol state.
///
/// Returned by [`AdsClient::run`] and consumed by [`AdsClient::receive_loop`].
#[derive(Debug)]
pub struct AdsStream<S> {
    stream: S,
    dispatcher: ResponseDispatcher,
}

impl<S> AdsStream<S> {
    /// Version/nonce bookkeeping for this stream.
    pub fn dispatcher(&self) -> &ResponseDispatcher {
        &self.dispatcher
    }
}

/// Client for the Aggregated Discovery Service.
///
/// The session discovers every cluster through CDS, subscribes to the
/// endpoints of those clusters through EDS, and keeps the results in a
/// [`ResourceStore`] that can be queried from any thread.
///
/// # Example
///
/// ```no_run
/// # async fn example() -> ads_client::Result<()> {
/// use ads_client::AdsClient;
///
/// let client = AdsClient::open("http://127.0.0.1:18000", "dns-1").await?;
/// let stream = client.run().await?;
/// let error = client.receive_loop(stream).await;
/// eprintln!("stream ended: {error}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct AdsClient<T, C> {
    transport: Mutex<Option<Arc<T>>>,
    codec: C,
    requests: RequestBuilder,
    store: Arc<ResourceStore>,
    state: Mutex<SessionState>,
    cancel: CancellationToken,
    nack_on_invalid: bool,
    retry_policy: RetryPolicy,
    span: Span,
}

#[cfg(feature = "transport-tonic")]
impl AdsClient<TonicTransport, ProstCodec> {
    /// Dial `address` and prepare a session identifying itself as `node_id`.
    ///
    /// The stream is not opened until [`run`](Self::run) is called.
    pub async fn open(address: impl Into<String>, node_id: impl Into<String>) -> Result<Self> {
        let node = Node::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")).with_id(node_id);
        Self::connect(ClientConfig::new(node, address)).await
    }

    /// Dial the server named in `config`.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let transport = TonicTransport::connect(config.server_uri.clone()).await?;
        Ok(Self::with_transport(config, transport, ProstCodec))
    }
}

impl<T, C> AdsClient<T, C>
where
    T: Transport,
    C: XdsCodec,
{
    /// Build a session over an already established transport.
    pub fn with_transport(config: ClientConfig, transport: T, codec: C) -> Self {
        let span = info_span!(
            "ads_client",
            node = config.node.id.as_deref().unwrap_or_default(),
            server = %config.server_uri,
        );

        Self {
            transport: Mutex::new(Some(Arc::new(transport))),
            codec,
            requests: RequestBuilder::new(config.node),
            store: Arc::new(ResourceStore::new()),
            state: Mutex::new(SessionState::Created),
            cancel: CancellationToken::new(),
            nack_on_invalid: config.nack_on_invalid,
            retry_policy: config.retry_policy,
            span,
        }
    }

    /// Open the ADS stream and send the initial wildcard cluster request.
    ///
    /// A session has at most one stream at a time: this fails with
    /// [`Error::AlreadyStreaming`] while a previous stream is still open, and
    /// with [`Error::Closed`] once the session is closed.
    pub async fn run(&self) -> Result<AdsStream<T::Stream>> {
        {
            let mut state = self.lock_state();
            match *state {
                SessionState::Closed => return Err(Error::Closed),
                SessionState::Streaming => return Err(Error::AlreadyStreaming),
                SessionState::Created => *state = SessionState::Streaming,
            }
        }
        let reservation = StreamReservation {
            state: &self.state,
            opened: false,
        };

        let stream = self.open_stream().await?;
        if self.state() == SessionState::Closed {
            return Err(Error::Closed);
        }
        reservation.complete();
        info!(parent: &self.span, "ADS stream opened");

        Ok(AdsStream {
            stream,
            dispatcher: ResponseDispatcher::new(
                Arc::clone(&self.store),
                self.nack_on_invalid,
                self.span.clone(),
            ),
        })
    }

    async fn open_stream(&self) -> Result<T::Stream> {
        let transport = self
            .transport
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(Error::Closed)?;

        let initial = self
            .codec
            .encode_request(&self.requests.initial(TypeUrl::CLUSTER))?;

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Closed),
            stream = transport.new_stream(vec![initial]) => stream,
        }
    }

    /// Process responses from `stream` until it ends.
    ///
    /// Always returns the reason the stream ended: [`Error::Closed`] when the
    /// session was closed, [`Error::StreamClosed`] when the server finished
    /// the stream, or the transport error.
    pub async fn receive_loop(&self, mut stream: AdsStream<T::Stream>) -> Error {
        let error = loop {
            let received = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break Error::Closed,
                received = stream.stream.recv() => received,
            };

            let bytes = match received {
                Ok(Some(bytes)) => bytes,
                Ok(None) => break Error::StreamClosed,
                Err(error) => break error,
            };

            let response = match self.codec.decode_response(bytes) {
                Ok(response) => response,
                Err(error) => break error,
            };

            for follow_up in stream.dispatcher.dispatch(&response) {
                self.send(&mut stream.stream, &follow_up).await;
            }
        };

        let mut state = self.lock_state();
        if *state == SessionState::Closed {
            info!(parent: &self.span, "ADS stream cancelled");
        } else {
            *state = SessionState::Created;
            warn!(parent: &self.span, %error, "ADS stream ended");
        }
        error
    }

    /// Send one follow-up request. Failures are logged and otherwise ignored:
    /// the server re-sends whatever it does not see acknowledged.
    async fn send(&self, stream: &mut T::Stream, follow_up: &FollowUp) {
        let request = follow_up.to_request(&self.requests);
        let result = match self.codec.encode_request(&request) {
            Ok(bytes) => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                result = stream.send(bytes) => result,
            },
            Err(error) => Err(error),
        };

        if let Err(error) = result {
            let kind = if follow_up.is_nack() { "NACK" } else { "request" };
            warn!(
                parent: &self.span,
                type_url = %follow_up.type_url,
                %error,
                "failed to send discovery {kind}"
            );
        }
    }

    /// Close the session. Idempotent.
    ///
    /// Cancels any running stream open or receive loop and releases the
    /// transport.
    pub fn close(&self) {
        {
            let mut state = self.lock_state();
            if *state == SessionState::Closed {
                return;
            }
            *state = SessionState::Closed;
        }
        self.cancel.cancel();
        self.transport
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        info!(parent: &self.span, "ADS session closed");
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.lock_state()
    }

    /// The node sent with every request.
    pub fn node(&self) -> &Node {
        self.requests.node()
    }

    /// Shared handle to the session's resource store.
    pub fn store(&self) -> Arc<ResourceStore> {
        Arc::clone(&self.store)
    }

    /// Snapshot of every known cluster name.
    pub fn clusters(&self) -> Vec<String> {
        self.store.list_cluster_names()
    }

    /// The latest endpoint assignment for `cluster`, if any.
    pub fn assignment(&self, cluster: &str) -> Option<Arc<ClusterLoadAssignment>> {
        self.store.lookup_assignment(cluster)
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Holds `Streaming` while a stream is being opened. Dropped before the
/// stream is open (failure or cancelled `run`), it returns the session to
/// `Created`.
struct StreamReservation<'a> {
    state: &'a Mutex<SessionState>,
    opened: bool,
}

impl StreamReservation<'_> {
    fn complete(mut self) {
        self.opened = true;
    }
}

impl Drop for StreamReservation<'_> {
    fn drop(&mut self) {
        if self.opened {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == SessionState::Streaming {
            *state = SessionState::Created;
        }
    }
}

impl<T, C> Drop for AdsClient<T, C> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
