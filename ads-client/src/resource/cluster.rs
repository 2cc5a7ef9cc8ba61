//! CDS `Cluster` resource.

use bytes::Bytes;
use envoy_types::pb::envoy::config::cluster::v3::Cluster as ClusterProto;
use prost::Message;

use crate::error::{Error, Result};
use crate::resource::{Resource, TypeUrl};

/// A cluster announced by the management server.
///
/// Only the name is kept: existence of a cluster is all CDS tells the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    /// The cluster name.
    pub name: String,
}

impl Resource for Cluster {
    const TYPE_URL: TypeUrl = TypeUrl::CLUSTER;

    fn decode(bytes: Bytes) -> Result<Self> {
        let proto = ClusterProto::decode(bytes)?;
        if proto.name.is_empty() {
            return Err(Error::Validation("cluster name is empty".into()));
        }
        Ok(Self { name: proto.name })
    }

    fn name(&self) -> &str {
        &self.name
    }
}
