//! ADS over a tonic [`Channel`].
//!
//! The RPC is driven through tonic's low-level [`Grpc`] client with a
//! pass-through codec, so the session's [`XdsCodec`](crate::codec::XdsCodec)
//! stays the only place that knows the message schema.

use crate::error::{Error, Result};
use crate::transport::{Transport, TransportStream};
use bytes::{Buf, BufMut, Bytes};
use http::uri::PathAndQuery;
use tokio::sync::mpsc;
use tokio_stream::StreamExt as _;
use tokio_stream::wrappers::ReceiverStream;
use tonic::client::Grpc;
use tonic::codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder};
use tonic::transport::{Channel, Endpoint};
use tonic::{Status, Streaming};

const STREAM_AGGREGATED_RESOURCES: &str =
    "/envoy.service.discovery.v3.AggregatedDiscoveryService/StreamAggregatedResources";

/// Follow-up requests queued ahead of the HTTP/2 send window.
const OUTBOUND_QUEUE: usize = 16;

/// Moves already-serialized messages in and out of gRPC frames untouched.
#[derive(Debug, Clone, Copy, Default)]
struct RawCodec;

impl Codec for RawCodec {
    type Encode = Bytes;
    type Decode = Bytes;
    type Encoder = RawCodec;
    type Decoder = RawCodec;

    fn encoder(&mut self) -> Self::Encoder {
        RawCodec
    }

    fn decoder(&mut self) -> Self::Decoder {
        RawCodec
    }
}

impl Encoder for RawCodec {
    type Item = Bytes;
    type Error = Status;

    fn encode(&mut self, item: Bytes, dst: &mut EncodeBuf<'_>) -> std::result::Result<(), Status> {
        dst.put(item);
        Ok(())
    }
}

impl Decoder for RawCodec {
    type Item = Bytes;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> std::result::Result<Option<Bytes>, Status> {
        let len = src.remaining();
        Ok(Some(src.copy_to_bytes(len)))
    }
}

/// Opens `StreamAggregatedResources` calls on a single management server
/// connection.
///
/// Cloning is cheap and shares the connection. Every stream opened from it
/// is an independent RPC.
#[derive(Clone, Debug)]
pub struct TonicTransport {
    channel: Channel,
}

impl From<Channel> for TonicTransport {
    fn from(channel: Channel) -> Self {
        Self::from_channel(channel)
    }
}

impl TonicTransport {
    /// Wrap a channel the caller configured (TLS, timeouts, interceptors).
    ///
    /// ```ignore
    /// use tonic::transport::{Certificate, Channel, ClientTlsConfig};
    ///
    /// let channel = Channel::from_static("https://ads.example.com:443")
    ///     .tls_config(ClientTlsConfig::new().ca_certificate(Certificate::from_pem(ca)))?
    ///     .connect()
    ///     .await?;
    /// let transport = TonicTransport::from_channel(channel);
    /// ```
    pub fn from_channel(channel: Channel) -> Self {
        Self { channel }
    }

    /// Dial `uri` eagerly with default channel settings.
    ///
    /// A malformed URI and an unreachable server both surface as
    /// [`Error::Connection`].
    pub async fn connect(uri: impl Into<String>) -> Result<Self> {
        let endpoint =
            Endpoint::from_shared(uri.into()).map_err(|e| Error::Connection(e.to_string()))?;
        let channel = endpoint
            .connect()
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;
        Ok(Self::from_channel(channel))
    }
}

impl Transport for TonicTransport {
    type Stream = TonicAdsStream;

    async fn new_stream(&self, initial_requests: Vec<Bytes>) -> Result<TonicAdsStream> {
        let mut grpc = Grpc::new(self.channel.clone());
        grpc.ready()
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        // Some control planes hold response headers until the first request
        // arrives, so the initial requests lead the body.
        let (outbound, queue) = mpsc::channel(OUTBOUND_QUEUE);
        let body = tokio_stream::iter(initial_requests).chain(ReceiverStream::new(queue));

        let response = grpc
            .streaming(
                tonic::Request::new(body),
                PathAndQuery::from_static(STREAM_AGGREGATED_RESOURCES),
                RawCodec,
            )
            .await?;

        Ok(TonicAdsStream {
            outbound,
            inbound: response.into_inner(),
        })
    }
}

/// One live `StreamAggregatedResources` call.
///
/// Dropping it cancels the RPC.
#[derive(Debug)]
pub struct TonicAdsStream {
    outbound: mpsc::Sender<Bytes>,
    inbound: Streaming<Bytes>,
}

impl TransportStream for TonicAdsStream {
    async fn send(&mut self, request: Bytes) -> Result<()> {
        self.outbound
            .send(request)
            .await
            .map_err(|_| Error::StreamClosed)
    }

    async fn recv(&mut self) -> Result<Option<Bytes>> {
        let message = self.inbound.message().await?;
        Ok(message)
    }
}
