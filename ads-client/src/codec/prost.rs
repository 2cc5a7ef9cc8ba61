//! Prost-based codec using envoy-types.

use crate::codec::XdsCodec;
use crate::error::Result;
use crate::message::{DiscoveryRequest, DiscoveryResponse, ResourceAny};
use bytes::Bytes;
use prost::Message;

/// A codec that uses prost/envoy-types v3 messages for serialization.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProstCodec;

impl XdsCodec for ProstCodec {
    fn encode_request(&self, request: &DiscoveryRequest<'_>) -> Result<Bytes> {
        use envoy_types::pb::envoy::config::core::v3 as core;
        use envoy_types::pb::envoy::service::discovery::v3 as discovery;
        use envoy_types::pb::google::rpc::Status;

        let node = request.node;
        let proto_request = discovery::DiscoveryRequest {
            version_info: request.version_info.to_owned(),
            node: Some(core::Node {
                id: node.id.clone().unwrap_or_default(),
                cluster: node.cluster.clone().unwrap_or_default(),
                user_agent_name: node.user_agent_name.clone(),
                user_agent_version_type: Some(core::node::UserAgentVersionType::UserAgentVersion(
                    node.user_agent_version.clone(),
                )),
                locality: node.locality.as_ref().map(|l| core::Locality {
                    region: l.region.clone(),
                    zone: l.zone.clone(),
                    sub_zone: l.sub_zone.clone(),
                }),
                ..Default::default()
            }),
            resource_names: request.resource_names.to_vec(),
            type_url: request.type_url.to_owned(),
            response_nonce: request.response_nonce.to_owned(),
            error_detail: request.error_detail.map(|e| Status {
                code: e.code,
                message: e.message.clone(),
                details: vec![],
            }),
            ..Default::default()
        };

        Ok(proto_request.encode_to_vec().into())
    }

    fn decode_response(&self, bytes: Bytes) -> Result<DiscoveryResponse> {
        use envoy_types::pb::envoy::service::discovery::v3 as discovery;

        let proto_response = discovery::DiscoveryResponse::decode(bytes)?;

        Ok(DiscoveryResponse {
            version_info: proto_response.version_info,
            resources: proto_response
                .resources
                .into_iter()
                .map(|any| ResourceAny {
                    type_url: any.type_url,
                    value: any.value.into(),
                })
                .collect(),
            type_url: proto_response.type_url,
            nonce: proto_response.nonce,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::message::{ErrorDetail, Locality, Node};
    use crate::resource::TypeUrl;
    use envoy_types::pb::envoy::service::discovery::v3 as discovery;

    #[test]
    fn test_encode_initial_cluster_request() {
        let codec = ProstCodec;
        let node = Node::new("ads-client", "0.1").with_id("test-id");
        let request = DiscoveryRequest {
            version_info: "",
            node: &node,
            type_url: TypeUrl::CLUSTER.as_str(),
            resource_names: &[],
            response_nonce: "",
            error_detail: None,
        };

        let bytes = codec.encode_request(&request).unwrap();
        let decoded = discovery::DiscoveryRequest::decode(bytes).unwrap();
        assert_eq!(decoded.type_url, TypeUrl::CLUSTER.as_str());
        assert!(decoded.resource_names.is_empty());
        assert!(decoded.version_info.is_empty());
        assert!(decoded.response_nonce.is_empty());
        assert!(decoded.error_detail.is_none());
        assert_eq!(decoded.node.unwrap().id, "test-id");
    }

    #[test]
    fn test_encode_request_with_node() {
        use envoy_types::pb::envoy::config::core::v3 as core;

        let codec = ProstCodec;
        let node = Node::new("ads-client", "1.0")
            .with_id("node-1")
            .with_cluster("dns")
            .with_locality(Locality {
                region: "us-west".to_string(),
                zone: "us-west-1a".to_string(),
                sub_zone: "rack-1".to_string(),
            });
        let request = DiscoveryRequest {
            version_info: "",
            node: &node,
            type_url: TypeUrl::ENDPOINT.as_str(),
            resource_names: &["a".to_string()],
            response_nonce: "",
            error_detail: None,
        };

        let bytes = codec.encode_request(&request).unwrap();
        let decoded = discovery::DiscoveryRequest::decode(bytes).unwrap();
        assert_eq!(decoded.resource_names, vec!["a".to_string()]);
        let node = decoded.node.unwrap();
        assert_eq!(node.id, "node-1");
        assert_eq!(node.cluster, "dns");
        assert_eq!(node.user_agent_name, "ads-client");
        match node.user_agent_version_type {
            Some(core::node::UserAgentVersionType::UserAgentVersion(version)) => {
                assert_eq!(version, "1.0");
            }
            _ => panic!("Expected UserAgentVersion to be set"),
        }
        let locality = node.locality.unwrap();
        assert_eq!(locality.region, "us-west");
        assert_eq!(locality.zone, "us-west-1a");
        assert_eq!(locality.sub_zone, "rack-1");
    }

    #[test]
    fn test_encode_nack_carries_error_detail() {
        let codec = ProstCodec;
        let node = Node::new("ads-client", "1.0");
        let names = vec!["a".to_string(), "b".to_string()];
        let detail = ErrorDetail::invalid_argument("cluster has no name");
        let request = DiscoveryRequest {
            version_info: "41",
            node: &node,
            type_url: TypeUrl::CLUSTER.as_str(),
            resource_names: &names,
            response_nonce: "nonce-abc",
            error_detail: Some(&detail),
        };

        let bytes = codec.encode_request(&request).unwrap();
        let decoded = discovery::DiscoveryRequest::decode(bytes).unwrap();
        assert_eq!(decoded.version_info, "41");
        assert_eq!(decoded.response_nonce, "nonce-abc");
        let status = decoded.error_detail.unwrap();
        assert_eq!(status.code, 3);
        assert_eq!(status.message, "cluster has no name");
    }

    #[test]
    fn test_decode_response() {
        use envoy_types::pb::google::protobuf::Any;

        let proto_response = discovery::DiscoveryResponse {
            version_info: "1".to_string(),
            type_url: TypeUrl::CLUSTER.as_str().to_string(),
            nonce: "nonce-1".to_string(),
            resources: vec![Any {
                type_url: TypeUrl::CLUSTER.as_str().to_string(),
                value: b"fake-cluster-bytes".to_vec(),
            }],
            ..Default::default()
        };

        let bytes: Bytes = proto_response.encode_to_vec().into();
        let response = ProstCodec.decode_response(bytes).unwrap();

        assert_eq!(response.version_info, "1");
        assert_eq!(response.type_url, TypeUrl::CLUSTER.as_str());
        assert_eq!(response.nonce, "nonce-1");
        assert_eq!(response.resources.len(), 1);
        assert_eq!(response.resources[0].value.as_ref(), b"fake-cluster-bytes");
    }

    #[test]
    fn test_decode_garbage_response_fails() {
        let err = ProstCodec
            .decode_response(Bytes::from_static(&[0xff, 0xff, 0xff]))
            .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }
}
