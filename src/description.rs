//! Server description snapshots
//!
//! A `ServerDescription` is built once per heartbeat and never mutated after
//! it is published. The monitor shares it as `Arc<ServerDescription>`.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, SystemTime};

use serde::Deserialize;

use crate::connection::{BuildInfoResult, ConnectionError, IsMasterResult};

/// Port assumed when an endpoint does not name one
pub const DEFAULT_PORT: u16 = 27017;

/// Address of a server (host:port, [ipv6]:port or a unix socket path)
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(transparent)]
pub struct Endpoint(String);

impl Endpoint {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn is_socket(&self) -> bool {
        self.0.ends_with(".sock")
    }

    /// Split into host and optional port text
    fn split(&self) -> (&str, Option<&str>) {
        let s = self.0.as_str();
        if self.is_socket() {
            return (s, None);
        }
        if let Some(rest) = s.strip_prefix('[') {
            return match rest.split_once(']') {
                Some((host, tail)) => (host, tail.strip_prefix(':')),
                None => (s, None),
            };
        }
        match s.rsplit_once(':') {
            // A bare IPv6 address has several colons and no port
            Some((host, _)) if host.contains(':') => (s, None),
            Some((host, port)) => (host, Some(port)),
            None => (s, None),
        }
    }

    /// Host part, without brackets for IPv6 literals
    pub fn host(&self) -> &str {
        self.split().0
    }

    /// Port text exactly as written, if any
    pub fn port_str(&self) -> Option<&str> {
        self.split().1
    }

    /// Numeric port, falling back to `DEFAULT_PORT`
    pub fn port(&self) -> Option<u16> {
        match self.port_str() {
            Some(p) => p.parse().ok(),
            None if self.is_socket() => None,
            None => Some(DEFAULT_PORT),
        }
    }

    /// Lower-case the address and append the default port when missing
    pub fn canonicalize(&self) -> Endpoint {
        let lowered = self.0.to_lowercase();
        let endpoint = Endpoint(lowered);
        if endpoint.is_empty() || endpoint.is_socket() || endpoint.port_str().is_some() {
            return endpoint;
        }
        Endpoint(format!("{}:{}", endpoint.0, DEFAULT_PORT))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Endpoint {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Endpoint {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Classification of a server derived from its handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ServerType {
    #[default]
    Unknown,
    Standalone,
    Mongos,
    RsPrimary,
    RsSecondary,
    RsArbiter,
    RsMember,
    RsGhost,
}

impl ServerType {
    /// Whether the server belongs to a replica set
    pub fn is_replica_set_member(self) -> bool {
        matches!(
            self,
            ServerType::RsPrimary
                | ServerType::RsSecondary
                | ServerType::RsArbiter
                | ServerType::RsMember
                | ServerType::RsGhost
        )
    }
}

/// Inclusive range of supported wire protocol versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WireVersionRange {
    pub min: i32,
    pub max: i32,
}

impl WireVersionRange {
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn includes(&self, version: i32) -> bool {
        self.min <= version && version <= self.max
    }
}

/// Server build version as reported by build info
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Version {
    /// Descriptive version string, e.g. "3.4.2-rc0"
    pub desc: String,
    /// Numeric components, e.g. [3, 4, 2, -100]
    pub parts: Vec<i32>,
}

impl Version {
    pub fn new(desc: impl Into<String>, parts: Vec<i32>) -> Self {
        Self {
            desc: desc.into(),
            parts,
        }
    }

    /// Compare numeric components against `other`, missing components count as 0
    pub fn at_least(&self, other: &[i32]) -> bool {
        let len = self.parts.len().max(other.len());
        for i in 0..len {
            let mine = self.parts.get(i).copied().unwrap_or(0);
            let theirs = other.get(i).copied().unwrap_or(0);
            if mine != theirs {
                return mine > theirs;
            }
        }
        true
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.desc)
    }
}

/// Why the latest heartbeat did not produce a healthy description
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeartbeatError {
    #[error("{0}")]
    Connection(#[from] ConnectionError),
    #[error("not ok")]
    NotOk,
}

/// Immutable snapshot of a server's observed state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerDescription {
    /// Address this monitor targets
    pub endpoint: Endpoint,
    /// Address the server reports for itself, or `endpoint`
    pub canonical_endpoint: Endpoint,
    pub server_type: ServerType,
    pub set_name: Option<String>,
    pub set_version: Option<u32>,
    pub election_id: Option<String>,
    /// Peers this server knows about
    pub members: Vec<Endpoint>,
    pub last_write_timestamp: Option<SystemTime>,
    pub max_batch_count: u32,
    pub max_document_size: u32,
    pub max_message_size: u32,
    pub wire_version: Option<WireVersionRange>,
    pub tags: BTreeMap<String, String>,
    pub version: Option<Version>,
    /// Smoothed round-trip time, set by the monitor
    pub average_rtt: Option<Duration>,
    pub last_error: Option<HeartbeatError>,
}

impl ServerDescription {
    /// Description of a server that has not been checked yet
    pub fn unknown(endpoint: Endpoint) -> Self {
        Self {
            canonical_endpoint: endpoint.clone(),
            endpoint,
            ..Default::default()
        }
    }

    /// Description of a server that could not be reached
    ///
    /// Only `endpoint` and `last_error` are populated.
    pub fn failed(endpoint: Endpoint, error: HeartbeatError) -> Self {
        Self {
            endpoint,
            last_error: Some(error),
            ..Default::default()
        }
    }

    /// Build a description from the raw handshake and build-info replies
    pub fn from_probe(
        endpoint: Endpoint,
        is_master: &IsMasterResult,
        build_info: &BuildInfoResult,
    ) -> Self {
        let canonical_endpoint = if is_master.me.is_empty() {
            endpoint.clone()
        } else {
            Endpoint::new(is_master.me.as_str()).canonicalize()
        };

        let set_name = (!is_master.set_name.is_empty()).then(|| is_master.set_name.clone());

        Self {
            endpoint,
            canonical_endpoint,
            server_type: is_master.server_type(),
            set_name,
            set_version: is_master.set_version,
            election_id: is_master.election_id.clone(),
            members: is_master.members(),
            last_write_timestamp: is_master.last_write_timestamp,
            max_batch_count: is_master.max_write_batch_size,
            max_document_size: is_master.max_bson_object_size,
            max_message_size: is_master.max_message_size_bytes,
            wire_version: Some(WireVersionRange::new(
                is_master.min_wire_version,
                is_master.max_wire_version,
            )),
            tags: is_master.tags.clone(),
            version: Some(Version::new(
                build_info.version.as_str(),
                build_info.version_array.clone(),
            )),
            average_rtt: None,
            last_error: (!is_master.ok).then_some(HeartbeatError::NotOk),
        }
    }

    /// Attach the smoothed round-trip time
    pub fn with_average_rtt(mut self, rtt: Duration) -> Self {
        self.average_rtt = Some(rtt);
        self
    }

    /// True when the latest heartbeat reached the server and it reported ok
    pub fn is_healthy(&self) -> bool {
        self.last_error.is_none() && self.server_type != ServerType::Unknown
    }
}
