use std::collections::BTreeMap;
use std::time::SystemTime;

use crate::description::{Endpoint, ServerType};

/// Decoded reply to the handshake command
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IsMasterResult {
    pub ok: bool,
    pub is_master: bool,
    pub secondary: bool,
    pub arbiter_only: bool,
    pub hidden: bool,
    pub is_replica_set: bool,
    /// "isdbgrid" when talking to a router
    pub msg: String,
    /// Address the server reports for itself
    pub me: String,
    pub election_id: Option<String>,
    pub set_name: String,
    pub set_version: Option<u32>,
    pub hosts: Vec<String>,
    pub passives: Vec<String>,
    pub arbiters: Vec<String>,
    pub last_write_timestamp: Option<SystemTime>,
    pub max_write_batch_size: u32,
    pub max_bson_object_size: u32,
    pub max_message_size_bytes: u32,
    pub min_wire_version: i32,
    pub max_wire_version: i32,
    pub tags: BTreeMap<String, String>,
}

impl IsMasterResult {
    /// Classify the server from its reply
    pub fn server_type(&self) -> ServerType {
        if !self.ok {
            return ServerType::Unknown;
        }
        if self.is_replica_set {
            return ServerType::RsGhost;
        }
        if !self.set_name.is_empty() {
            return if self.is_master {
                ServerType::RsPrimary
            } else if self.hidden {
                ServerType::RsMember
            } else if self.secondary {
                ServerType::RsSecondary
            } else if self.arbiter_only {
                ServerType::RsArbiter
            } else {
                ServerType::RsMember
            };
        }
        if self.msg == "isdbgrid" {
            return ServerType::Mongos;
        }
        ServerType::Standalone
    }

    /// Every peer the server reports: hosts, then passives, then arbiters
    pub fn members(&self) -> Vec<Endpoint> {
        let mut members: Vec<Endpoint> = Vec::new();
        let all = self.hosts.iter().chain(&self.passives).chain(&self.arbiters);
        for addr in all {
            let endpoint = Endpoint::new(addr.as_str()).canonicalize();
            if !members.contains(&endpoint) {
                members.push(endpoint);
            }
        }
        members
    }
}

/// Decoded reply to the build-info command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildInfoResult {
    pub version: String,
    pub version_array: Vec<i32>,
}
