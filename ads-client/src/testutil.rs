//! In-memory transport for exercising a session without a network.
//!
//! [`MockTransport`] hands every stream it opens to a paired [`MockServer`],
//! which plays the management server side of the conversation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use envoy_types::pb::envoy::service::discovery::v3 as discovery;
use envoy_types::pb::google::protobuf::Any;
use prost::Message;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::message::ResourceAny;
use crate::resource::TypeUrl;
use crate::transport::{Transport, TransportStream};

/// Client side of the in-memory transport.
#[derive(Debug, Clone)]
pub struct MockTransport {
    accept_tx: mpsc::UnboundedSender<MockServerStream>,
    refuse: Arc<AtomicBool>,
}

impl MockTransport {
    /// Create a transport and the server that receives its streams.
    pub fn new() -> (Self, MockServer) {
        let (accept_tx, accept_rx) = mpsc::unbounded_channel();
        let transport = Self {
            accept_tx,
            refuse: Arc::new(AtomicBool::new(false)),
        };
        (transport, MockServer { accept_rx })
    }

    /// Make subsequent `new_stream` calls fail (or succeed again).
    pub fn set_refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }
}

impl Transport for MockTransport {
    type Stream = MockStream;

    async fn new_stream(&self, initial_requests: Vec<Bytes>) -> Result<Self::Stream> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(Error::Connection("connection refused".into()));
        }

        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (response_tx, response_rx) = mpsc::unbounded_channel();
        for request in initial_requests {
            let _ = request_tx.send(request);
        }

        self.accept_tx
            .send(MockServerStream {
                requests: request_rx,
                responses: response_tx,
            })
            .map_err(|_| Error::Connection("mock server is gone".into()))?;

        Ok(MockStream {
            requests: request_tx,
            responses: response_rx,
        })
    }
}

/// Client end of an in-memory stream.
#[derive(Debug)]
pub struct MockStream {
    requests: mpsc::UnboundedSender<Bytes>,
    responses: mpsc::UnboundedReceiver<Result<Bytes>>,
}

impl TransportStream for MockStream {
    async fn send(&mut self, request: Bytes) -> Result<()> {
        self.requests.send(request).map_err(|_| Error::StreamClosed)
    }

    async fn recv(&mut self) -> Result<Option<Bytes>> {
        match self.responses.recv().await {
            Some(Ok(bytes)) => Ok(Some(bytes)),
            Some(Err(error)) => Err(error),
            None => Ok(None),
        }
    }
}

/// Accepts the streams opened through a [`MockTransport`].
#[derive(Debug)]
pub struct MockServer {
    accept_rx: mpsc::UnboundedReceiver<MockServerStream>,
}

impl MockServer {
    /// Wait for the client to open the next stream.
    pub async fn accept(&mut self) -> Option<MockServerStream> {
        self.accept_rx.recv().await
    }
}

/// Server end of an in-memory stream.
///
/// Dropping it ends the stream as if the server closed it cleanly.
#[derive(Debug)]
pub struct MockServerStream {
    requests: mpsc::UnboundedReceiver<Bytes>,
    responses: mpsc::UnboundedSender<Result<Bytes>>,
}

impl MockServerStream {
    /// Wait for the next request from the client, decoded.
    pub async fn next_request(&mut self) -> Option<discovery::DiscoveryRequest> {
        let bytes = self.requests.recv().await?;
        discovery::DiscoveryRequest::decode(bytes).ok()
    }

    /// Stop accepting requests while still sending responses.
    ///
    /// Every later client send fails with [`Error::StreamClosed`].
    pub fn close_requests(&mut self) {
        self.requests.close();
    }

    /// Send a response with the given resources.
    pub fn respond(
        &self,
        type_url: TypeUrl,
        version: &str,
        nonce: &str,
        resources: Vec<ResourceAny>,
    ) {
        let response = discovery::DiscoveryResponse {
            version_info: version.to_string(),
            type_url: type_url.as_str().to_string(),
            nonce: nonce.to_string(),
            resources: resources
                .into_iter()
                .map(|r| Any {
                    type_url: r.type_url,
                    value: r.value.to_vec(),
                })
                .collect(),
            ..Default::default()
        };
        let _ = self.responses.send(Ok(response.encode_to_vec().into()));
    }

    /// Send raw bytes as a response.
    pub fn respond_raw(&self, bytes: Bytes) {
        let _ = self.responses.send(Ok(bytes));
    }

    /// Fail the stream with `error`.
    pub fn fail(&self, error: Error) {
        let _ = self.responses.send(Err(error));
    }
}
