//! EDS `ClusterLoadAssignment` resource.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use bytes::Bytes;
use envoy_types::pb::envoy::config::core::v3::{Address, address, socket_address};
use envoy_types::pb::envoy::config::endpoint::v3::{
    ClusterLoadAssignment as ClusterLoadAssignmentProto, LbEndpoint as LbEndpointProto,
    LocalityLbEndpoints, lb_endpoint::HostIdentifier,
};
use prost::Message;

use crate::error::{Error, Result};
use crate::message::Locality;
use crate::resource::{Resource, TypeUrl};

/// The endpoints currently assigned to a cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterLoadAssignment {
    /// Name of the cluster these endpoints belong to.
    pub cluster_name: String,
    /// Endpoints grouped by locality, in the order the server sent them.
    pub localities: Vec<LocalityEndpoints>,
}

impl ClusterLoadAssignment {
    /// All endpoint addresses across every locality.
    pub fn addresses(&self) -> impl Iterator<Item = &EndpointAddress> {
        self.localities
            .iter()
            .flat_map(|l| l.endpoints.iter().map(|e| &e.address))
    }

    /// Total number of endpoints.
    pub fn len(&self) -> usize {
        self.localities.iter().map(|l| l.endpoints.len()).sum()
    }

    /// Returns true if the assignment has no endpoints.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A group of endpoints sharing a locality and priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalityEndpoints {
    /// Where the endpoints run, if the server said.
    pub locality: Option<Locality>,
    /// Priority of the group, 0 being the highest.
    pub priority: u32,
    /// Share of traffic this locality gets among localities of the same
    /// priority. `None` when the server left it unset.
    pub weight: Option<u32>,
    /// The endpoints.
    pub endpoints: Vec<LbEndpoint>,
}

/// A single upstream endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LbEndpoint {
    /// The endpoint's address.
    pub address: EndpointAddress,
    /// Relative load balancing weight within its locality, if set.
    pub weight: Option<u32>,
}

/// Host part of an endpoint address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EndpointHost {
    /// An IPv4 address.
    Ipv4(Ipv4Addr),
    /// An IPv6 address.
    Ipv6(Ipv6Addr),
    /// A hostname left for the consumer to resolve.
    Hostname(String),
}

/// Represents a validated endpoint address extracted from EDS.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointAddress {
    host: EndpointHost,
    port: u16,
}

impl EndpointAddress {
    /// Build an address from a host string and a port.
    ///
    /// IP literals are parsed, anything else is kept as a hostname.
    pub fn new(host: &str, port: u16) -> Self {
        let host = match host.parse::<IpAddr>() {
            Ok(IpAddr::V4(ip)) => EndpointHost::Ipv4(ip),
            Ok(IpAddr::V6(ip)) => EndpointHost::Ipv6(ip),
            Err(_) => EndpointHost::Hostname(host.to_string()),
        };
        Self { host, port }
    }

    /// The host.
    pub fn host(&self) -> &EndpointHost {
        &self.host
    }

    /// The port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The socket address, if the host is an IP literal.
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        match &self.host {
            EndpointHost::Ipv4(ip) => Some(SocketAddr::new(IpAddr::V4(*ip), self.port)),
            EndpointHost::Ipv6(ip) => Some(SocketAddr::new(IpAddr::V6(*ip), self.port)),
            EndpointHost::Hostname(_) => None,
        }
    }
}

impl From<SocketAddr> for EndpointAddress {
    fn from(addr: SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(v4_addr) => Self {
                host: EndpointHost::Ipv4(*v4_addr.ip()),
                port: v4_addr.port(),
            },
            SocketAddr::V6(v6_addr) => Self {
                host: EndpointHost::Ipv6(*v6_addr.ip()),
                port: v6_addr.port(),
            },
        }
    }
}

impl fmt::Display for EndpointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.host {
            EndpointHost::Ipv4(ip) => write!(f, "{ip}:{}", self.port),
            EndpointHost::Ipv6(ip) => write!(f, "[{ip}]:{}", self.port),
            EndpointHost::Hostname(host) => write!(f, "{host}:{}", self.port),
        }
    }
}

impl Resource for ClusterLoadAssignment {
    const TYPE_URL: TypeUrl = TypeUrl::ENDPOINT;

    fn decode(bytes: Bytes) -> Result<Self> {
        let proto = ClusterLoadAssignmentProto::decode(bytes)?;
        if proto.cluster_name.is_empty() {
            return Err(Error::Validation(
                "load assignment has an empty cluster_name".into(),
            ));
        }

        let localities = proto
            .endpoints
            .into_iter()
            .map(locality_endpoints)
            .collect::<Result<Vec<_>>>()
            .map_err(|e| match e {
                Error::Validation(msg) => {
                    Error::Validation(format!("cluster {}: {msg}", proto.cluster_name))
                }
                other => other,
            })?;

        Ok(Self {
            cluster_name: proto.cluster_name,
            localities,
        })
    }

    fn name(&self) -> &str {
        &self.cluster_name
    }
}

fn locality_endpoints(proto: LocalityLbEndpoints) -> Result<LocalityEndpoints> {
    let endpoints = proto
        .lb_endpoints
        .into_iter()
        .map(lb_endpoint)
        .collect::<Result<Vec<_>>>()?;

    Ok(LocalityEndpoints {
        locality: proto.locality.map(|l| Locality {
            region: l.region,
            zone: l.zone,
            sub_zone: l.sub_zone,
        }),
        priority: proto.priority,
        weight: proto.load_balancing_weight.map(|w| w.value),
        endpoints,
    })
}

fn lb_endpoint(proto: LbEndpointProto) -> Result<LbEndpoint> {
    let endpoint = match proto.host_identifier {
        Some(HostIdentifier::Endpoint(endpoint)) => endpoint,
        Some(HostIdentifier::EndpointName(name)) => {
            return Err(Error::Validation(format!(
                "named endpoint {name:?} is not supported"
            )));
        }
        None => return Err(Error::Validation("endpoint has no host".into())),
    };

    let address = endpoint
        .address
        .ok_or_else(|| Error::Validation("endpoint has no address".into()))?;

    Ok(LbEndpoint {
        address: endpoint_address(address)?,
        weight: proto.load_balancing_weight.map(|w| w.value),
    })
}

fn endpoint_address(address: Address) -> Result<EndpointAddress> {
    let socket = match address.address {
        Some(address::Address::SocketAddress(socket)) => socket,
        _ => return Err(Error::Validation("endpoint is not a socket address".into())),
    };

    let port = match socket.port_specifier {
        Some(socket_address::PortSpecifier::PortValue(port)) => u16::try_from(port)
            .map_err(|_| Error::Validation(format!("port {port} out of range")))?,
        Some(socket_address::PortSpecifier::NamedPort(name)) => {
            return Err(Error::Validation(format!(
                "named port {name:?} is not supported"
            )));
        }
        None => return Err(Error::Validation("endpoint has no port".into())),
    };

    if socket.address.is_empty() {
        return Err(Error::Validation("endpoint has an empty host".into()));
    }

    Ok(EndpointAddress::new(&socket.address, port))
}
