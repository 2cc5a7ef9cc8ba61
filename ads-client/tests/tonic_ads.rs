//! End-to-end: a session against a tonic ADS server serving CDS and EDS.

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use ads_client::{AdsClient, Error, SessionState, TokioRuntime, TypeUrl};
use envoy_types::pb::envoy::config::cluster::v3::Cluster;
use envoy_types::pb::envoy::config::core::v3::{Address, SocketAddress, address, socket_address};
use envoy_types::pb::envoy::config::endpoint::v3::{
    ClusterLoadAssignment, Endpoint, LbEndpoint, LocalityLbEndpoints, lb_endpoint::HostIdentifier,
};
use envoy_types::pb::envoy::service::discovery::v3::{
    DeltaDiscoveryRequest, DeltaDiscoveryResponse, DiscoveryRequest, DiscoveryResponse,
    aggregated_discovery_service_server::{
        AggregatedDiscoveryService, AggregatedDiscoveryServiceServer,
    },
};
use envoy_types::pb::google::protobuf::Any;
use prost::Message;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_stream::{Stream, StreamExt};
use tonic::{Request, Response, Status};

/// Serves clusters `a` and `b` and one endpoint for `a`. Every request it
/// receives is forwarded to `seen`.
struct ControlPlane {
    seen: mpsc::UnboundedSender<DiscoveryRequest>,
}

fn cluster(name: &str) -> Any {
    Any {
        type_url: TypeUrl::CLUSTER.as_str().to_string(),
        value: Cluster {
            name: name.to_string(),
            ..Default::default()
        }
        .encode_to_vec(),
    }
}

fn assignment(cluster: &str, host: &str, port: u32) -> Any {
    let endpoint = LbEndpoint {
        host_identifier: Some(HostIdentifier::Endpoint(Endpoint {
            address: Some(Address {
                address: Some(address::Address::SocketAddress(SocketAddress {
                    address: host.to_string(),
                    port_specifier: Some(socket_address::PortSpecifier::PortValue(port)),
                    ..Default::default()
                })),
            }),
            ..Default::default()
        })),
        ..Default::default()
    };
    Any {
        type_url: TypeUrl::ENDPOINT.as_str().to_string(),
        value: ClusterLoadAssignment {
            cluster_name: cluster.to_string(),
            endpoints: vec![LocalityLbEndpoints {
                lb_endpoints: vec![endpoint],
                ..Default::default()
            }],
            ..Default::default()
        }
        .encode_to_vec(),
    }
}

#[tonic::async_trait]
impl AggregatedDiscoveryService for ControlPlane {
    type StreamAggregatedResourcesStream =
        Pin<Box<dyn Stream<Item = Result<DiscoveryResponse, Status>> + Send>>;

    async fn stream_aggregated_resources(
        &self,
        request: Request<tonic::Streaming<DiscoveryRequest>>,
    ) -> Result<Response<Self::StreamAggregatedResourcesStream>, Status> {
        let mut inbound = request.into_inner();
        let seen = self.seen.clone();

        let outbound = async_stream::try_stream! {
            while let Some(req) = inbound.next().await {
                let req = req?;
                let _ = seen.send(req.clone());

                // Only answer requests that are not acknowledgements.
                if !req.response_nonce.is_empty() {
                    continue;
                }
                if req.type_url == TypeUrl::CLUSTER.as_str() {
                    yield DiscoveryResponse {
                        version_info: "c1".to_string(),
                        type_url: req.type_url.clone(),
                        nonce: "cn1".to_string(),
                        resources: vec![cluster("a"), cluster("b")],
                        ..Default::default()
                    };
                } else if req.type_url == TypeUrl::ENDPOINT.as_str() {
                    yield DiscoveryResponse {
                        version_info: "e1".to_string(),
                        type_url: req.type_url.clone(),
                        nonce: "en1".to_string(),
                        resources: vec![assignment("a", "1.2.3.4", 80)],
                        ..Default::default()
                    };
                }
            }
        };

        Ok(Response::new(Box::pin(outbound)))
    }

    type DeltaAggregatedResourcesStream =
        Pin<Box<dyn Stream<Item = Result<DeltaDiscoveryResponse, Status>> + Send>>;

    async fn delta_aggregated_resources(
        &self,
        _request: Request<tonic::Streaming<DeltaDiscoveryRequest>>,
    ) -> Result<Response<Self::DeltaAggregatedResourcesStream>, Status> {
        Err(Status::unimplemented("delta not supported in mock"))
    }
}

async fn start_control_plane() -> (SocketAddr, mpsc::UnboundedReceiver<DiscoveryRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (seen, seen_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        tonic::transport::Server::builder()
            .add_service(AggregatedDiscoveryServiceServer::new(ControlPlane { seen }))
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    (addr, seen_rx)
}

#[tokio::test]
async fn discovers_clusters_and_endpoints() {
    let (addr, mut seen) = start_control_plane().await;
    let client = Arc::new(
        AdsClient::open(format!("http://{addr}"), "it-node")
            .await
            .unwrap(),
    );
    client.spawn(TokioRuntime);

    let mut requests = Vec::new();
    while requests.len() < 4 {
        let request = tokio::time::timeout(Duration::from_secs(5), seen.recv())
            .await
            .unwrap()
            .unwrap();
        requests.push(request);
    }

    let initial = &requests[0];
    assert_eq!(initial.type_url, TypeUrl::CLUSTER.as_str());
    assert!(initial.resource_names.is_empty());
    assert_eq!(initial.node.as_ref().unwrap().id, "it-node");

    let cds_ack = &requests[1];
    assert_eq!(cds_ack.type_url, TypeUrl::CLUSTER.as_str());
    assert_eq!(cds_ack.version_info, "c1");
    assert_eq!(cds_ack.response_nonce, "cn1");
    assert_eq!(cds_ack.resource_names, vec!["a", "b"]);

    let eds = &requests[2];
    assert_eq!(eds.type_url, TypeUrl::ENDPOINT.as_str());
    assert_eq!(eds.resource_names, vec!["a", "b"]);

    let eds_ack = &requests[3];
    assert_eq!(eds_ack.type_url, TypeUrl::ENDPOINT.as_str());
    assert_eq!(eds_ack.version_info, "e1");
    assert_eq!(eds_ack.response_nonce, "en1");

    assert_eq!(client.clusters(), vec!["a", "b"]);
    let a = client.assignment("a").unwrap();
    let addrs: Vec<String> = a.addresses().map(ToString::to_string).collect();
    assert_eq!(addrs, vec!["1.2.3.4:80"]);
    assert!(client.assignment("b").is_none());

    client.close();
    assert_eq!(client.state(), SessionState::Closed);
    assert!(matches!(client.run().await, Err(Error::Closed)));
}

#[tokio::test]
async fn open_fails_without_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = AdsClient::open(format!("http://{addr}"), "it-node")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Connection(_)));
}
