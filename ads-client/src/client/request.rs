//! Construction of outgoing discovery requests.

use crate::message::{DiscoveryRequest, ErrorDetail, Node};
use crate::resource::TypeUrl;

/// Builds [`DiscoveryRequest`]s that all carry the same node identity.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    node: Node,
}

impl RequestBuilder {
    /// Create a builder for `node`. The node never changes afterwards.
    pub fn new(node: Node) -> Self {
        Self { node }
    }

    /// The node sent with every request.
    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Build a request for `type_url`.
    ///
    /// An empty `resource_names` subscribes to every resource of the type.
    pub fn request<'a>(
        &'a self,
        type_url: TypeUrl,
        version_info: &'a str,
        response_nonce: &'a str,
        resource_names: &'a [String],
    ) -> DiscoveryRequest<'a> {
        DiscoveryRequest {
            version_info,
            node: &self.node,
            resource_names,
            type_url: type_url.as_str(),
            response_nonce,
            error_detail: None,
        }
    }

    /// Build the wildcard request that starts discovery of a type on a new stream.
    pub fn initial(&self, type_url: TypeUrl) -> DiscoveryRequest<'_> {
        self.request(type_url, "", "", &[])
    }

    /// Build a NACK: same shape as a request, plus the rejection detail.
    pub fn nack<'a>(
        &'a self,
        type_url: TypeUrl,
        version_info: &'a str,
        response_nonce: &'a str,
        resource_names: &'a [String],
        error_detail: &'a ErrorDetail,
    ) -> DiscoveryRequest<'a> {
        DiscoveryRequest {
            error_detail: Some(error_detail),
            ..self.request(type_url, version_info, response_nonce, resource_names)
        }
    }
}
