//! Discovery resource types handled by the client.

use crate::error::{Error, Result};
use crate::message::ResourceAny;
use bytes::Bytes;

pub mod cluster;
pub mod endpoint;

pub use cluster::Cluster;
pub use endpoint::{ClusterLoadAssignment, EndpointAddress, EndpointHost, LbEndpoint, LocalityEndpoints};

/// A resource type identifier, e.g. `type.googleapis.com/envoy.config.cluster.v3.Cluster`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeUrl(&'static str);

impl TypeUrl {
    /// Cluster discovery (CDS).
    pub const CLUSTER: TypeUrl = TypeUrl("type.googleapis.com/envoy.config.cluster.v3.Cluster");

    /// Endpoint discovery (EDS).
    pub const ENDPOINT: TypeUrl =
        TypeUrl("type.googleapis.com/envoy.config.endpoint.v3.ClusterLoadAssignment");

    /// Wrap a type URL.
    pub const fn new(url: &'static str) -> Self {
        Self(url)
    }

    /// The type URL string.
    pub const fn as_str(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for TypeUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// The resource kinds this client understands.
///
/// Anything else arriving on the stream is unknown and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// `Cluster` resources (CDS).
    Cluster,
    /// `ClusterLoadAssignment` resources (EDS).
    Endpoint,
}

impl ResourceKind {
    /// Classify a type URL, returning `None` for unknown types.
    pub fn from_type_url(type_url: &str) -> Option<Self> {
        if type_url == TypeUrl::CLUSTER.as_str() {
            Some(Self::Cluster)
        } else if type_url == TypeUrl::ENDPOINT.as_str() {
            Some(Self::Endpoint)
        } else {
            None
        }
    }

    /// The type URL of this kind.
    pub fn type_url(self) -> TypeUrl {
        match self {
            Self::Cluster => TypeUrl::CLUSTER,
            Self::Endpoint => TypeUrl::ENDPOINT,
        }
    }
}

/// Trait for discovery resources.
///
/// # Validation
///
/// The `decode` method should:
/// - Parse the raw protobuf bytes.
/// - Validate the parsed resource against what the client needs from it.
///
/// It should return `Err` if parsing fails or validation fails. Such a
/// resource is skipped by the dispatcher and the error message is logged
/// (and carried in the NACK when that policy is enabled).
pub trait Resource: Send + Sync + Clone + std::fmt::Debug + 'static {
    /// The type URL for this resource type.
    const TYPE_URL: TypeUrl;

    /// Decode and validate a resource from its serialized bytes.
    fn decode(bytes: Bytes) -> Result<Self>;

    /// Returns the resource name.
    ///
    /// The resource name combined with the type URL uniquely identifies a resource.
    fn name(&self) -> &str;
}

/// Unpack a `google.protobuf.Any` as resource `R`.
///
/// Fails if the embedded type URL is not `R::TYPE_URL` or if decoding fails.
pub fn unpack<R: Resource>(any: &ResourceAny) -> Result<R> {
    if any.type_url != R::TYPE_URL.as_str() {
        return Err(Error::Validation(format!(
            "unexpected resource type {:?}, want {:?}",
            any.type_url,
            R::TYPE_URL.as_str()
        )));
    }
    R::decode(any.value.clone())
}
