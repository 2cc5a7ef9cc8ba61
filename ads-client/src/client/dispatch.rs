//! Demultiplexing of discovery responses.
//!
//! The dispatcher classifies each response by type URL, unpacks its
//! resources, applies them to the [`ResourceStore`] and works out which
//! requests have to go back to the server. It never touches the stream
//! itself so the whole protocol decision can be exercised without a server.

use std::sync::Arc;

use tracing::{Span, debug, warn};

use crate::client::request::RequestBuilder;
use crate::error::Error;
use crate::message::{DiscoveryRequest, DiscoveryResponse, ErrorDetail};
use crate::resource::{Cluster, ClusterLoadAssignment, Resource, ResourceKind, TypeUrl, unpack};
use crate::store::ResourceStore;

/// Version and nonce lineage of one resource type on one stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeState {
    /// Version of the last accepted response. Empty until something is accepted.
    pub version_info: String,
    /// Nonce of the last response received.
    pub nonce: String,
}

/// A request the dispatcher wants sent back to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowUp {
    /// Type being requested or acknowledged.
    pub type_url: TypeUrl,
    /// Version to report.
    pub version_info: String,
    /// Nonce being answered.
    pub response_nonce: String,
    /// Full subscription for the type.
    pub resource_names: Vec<String>,
    /// Set when the response is rejected.
    pub error_detail: Option<ErrorDetail>,
}

impl FollowUp {
    /// Returns true if this rejects the response it answers.
    pub fn is_nack(&self) -> bool {
        self.error_detail.is_some()
    }

    /// Turn this into a wire request carrying the builder's node.
    pub fn to_request<'a>(&'a self, builder: &'a RequestBuilder) -> DiscoveryRequest<'a> {
        match &self.error_detail {
            Some(detail) => builder.nack(
                self.type_url,
                &self.version_info,
                &self.response_nonce,
                &self.resource_names,
                detail,
            ),
            None => builder.request(
                self.type_url,
                &self.version_info,
                &self.response_nonce,
                &self.resource_names,
            ),
        }
    }
}

/// Applies responses to the store and decides the next requests.
///
/// One dispatcher exists per stream: versions and nonces start empty when a
/// stream is opened.
#[derive(Debug)]
pub struct ResponseDispatcher {
    store: Arc<ResourceStore>,
    clusters: TypeState,
    endpoints: TypeState,
    nack_on_invalid: bool,
    span: Span,
}

impl ResponseDispatcher {
    /// Create a dispatcher writing into `store`, logging inside `span`.
    pub fn new(store: Arc<ResourceStore>, nack_on_invalid: bool, span: Span) -> Self {
        Self {
            store,
            clusters: TypeState::default(),
            endpoints: TypeState::default(),
            nack_on_invalid,
            span,
        }
    }

    /// Current version/nonce lineage of `kind`.
    pub fn type_state(&self, kind: ResourceKind) -> &TypeState {
        match kind {
            ResourceKind::Cluster => &self.clusters,
            ResourceKind::Endpoint => &self.endpoints,
        }
    }

    fn type_state_mut(&mut self, kind: ResourceKind) -> &mut TypeState {
        match kind {
            ResourceKind::Cluster => &mut self.clusters,
            ResourceKind::Endpoint => &mut self.endpoints,
        }
    }

    /// Process one response and return the requests to send, in order.
    ///
    /// Responses of an unknown type are dropped and produce no request.
    pub fn dispatch(&mut self, response: &DiscoveryResponse) -> Vec<FollowUp> {
        let span = self.span.clone();
        let _enter = span.enter();

        match ResourceKind::from_type_url(&response.type_url) {
            Some(ResourceKind::Cluster) => self.on_clusters(response),
            Some(ResourceKind::Endpoint) => self.on_endpoints(response),
            None => {
                warn!(type_url = %response.type_url, "unknown response type for discovery");
                Vec::new()
            }
        }
    }

    fn on_clusters(&mut self, response: &DiscoveryResponse) -> Vec<FollowUp> {
        let (clusters, errors) = unpack_all::<Cluster>(response);

        let mut added = 0usize;
        for cluster in &clusters {
            if self.store.record_cluster_seen(cluster.name()) {
                added += 1;
            }
        }
        debug!(
            version = %response.version_info,
            resources = response.resources.len(),
            accepted = clusters.len(),
            added,
            "cluster discovery processed"
        );

        let names = self.store.list_cluster_names();
        let ack = self.answer(ResourceKind::Cluster, response, &errors, names.clone());

        let endpoints = &self.endpoints;
        let discover = FollowUp {
            type_url: TypeUrl::ENDPOINT,
            version_info: endpoints.version_info.clone(),
            response_nonce: endpoints.nonce.clone(),
            resource_names: names,
            error_detail: None,
        };

        vec![ack, discover]
    }

    fn on_endpoints(&mut self, response: &DiscoveryResponse) -> Vec<FollowUp> {
        let (assignments, errors) = unpack_all::<ClusterLoadAssignment>(response);

        let accepted = assignments.len();
        for assignment in assignments {
            debug!(
                cluster = %assignment.cluster_name,
                endpoints = assignment.len(),
                "endpoint assignment updated"
            );
            self.store.record_assignment(assignment);
        }
        debug!(
            version = %response.version_info,
            resources = response.resources.len(),
            accepted,
            "endpoint discovery processed"
        );

        let names = self.store.list_cluster_names();
        vec![self.answer(ResourceKind::Endpoint, response, &errors, names)]
    }

    /// Build the ACK (or NACK) for `response` and advance the type's lineage.
    fn answer(
        &mut self,
        kind: ResourceKind,
        response: &DiscoveryResponse,
        errors: &[String],
        resource_names: Vec<String>,
    ) -> FollowUp {
        let reject = self.nack_on_invalid && !errors.is_empty();
        let state = self.type_state_mut(kind);
        state.nonce = response.nonce.clone();

        if reject {
            warn!(
                type_url = %response.type_url,
                version = %response.version_info,
                rejected = errors.len(),
                "rejecting discovery response"
            );
            // The previous version stays current so the server knows what we still run.
            return FollowUp {
                type_url: kind.type_url(),
                version_info: state.version_info.clone(),
                response_nonce: response.nonce.clone(),
                resource_names,
                error_detail: Some(ErrorDetail::invalid_argument(errors.join("; "))),
            };
        }

        state.version_info = response.version_info.clone();
        FollowUp {
            type_url: kind.type_url(),
            version_info: response.version_info.clone(),
            response_nonce: response.nonce.clone(),
            resource_names,
            error_detail: None,
        }
    }
}

/// Unpack every resource of `response` as `R`, collecting failures instead of
/// stopping at the first one.
fn unpack_all<R: Resource>(response: &DiscoveryResponse) -> (Vec<R>, Vec<String>) {
    let mut resources = Vec::with_capacity(response.resources.len());
    let mut errors = Vec::new();

    for (index, any) in response.resources.iter().enumerate() {
        match unpack::<R>(any) {
            Ok(resource) => resources.push(resource),
            Err(error) => {
                warn!(
                    type_url = %response.type_url,
                    index,
                    %error,
                    "skipping malformed resource"
                );
                errors.push(describe(index, &error));
            }
        }
    }

    (resources, errors)
}

fn describe(index: usize, error: &Error) -> String {
    format!("resource {index}: {error}")
}
