//! Emulated network: the two-namespace virtual link and its impairment
//!
//! The link itself is created by external setup and cleanup scripts. This
//! module wraps them ([`Topology`]) and drives `tc netem` on both endpoints
//! ([`NetworkConditionController`]).

pub mod controller;
pub mod topology;

pub use controller::{NetworkConditionController, QdiscAction};
pub use topology::{Topology, TopologyScripts};

use crate::defaults;
use serde::{Deserialize, Serialize};

/// One side of the virtual Ethernet link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEndpoint {
    pub namespace: String,
    pub device: String,
    pub address: String,
    pub mac: String,
}

impl LinkEndpoint {
    pub fn new(namespace: &str, device: &str, address: &str, mac: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            device: device.to_string(),
            address: address.to_string(),
            mac: mac.to_string(),
        }
    }
}

/// Responder and initiator endpoints plus the rendezvous port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkPair {
    pub responder: LinkEndpoint,
    pub initiator: LinkEndpoint,
    pub port: u16,
}

impl Default for LinkPair {
    fn default() -> Self {
        Self {
            responder: LinkEndpoint::new(
                defaults::RESPONDER_NAMESPACE,
                defaults::RESPONDER_DEVICE,
                defaults::RESPONDER_ADDRESS,
                defaults::RESPONDER_MAC,
            ),
            initiator: LinkEndpoint::new(
                defaults::INITIATOR_NAMESPACE,
                defaults::INITIATOR_DEVICE,
                defaults::INITIATOR_ADDRESS,
                defaults::INITIATOR_MAC,
            ),
            port: defaults::RENDEZVOUS_PORT,
        }
    }
}

impl LinkPair {
    /// `address:port` the initiator connects to
    pub fn rendezvous(&self) -> String {
        format!("{}:{}", self.responder.address, self.port)
    }

    /// Responder first, then initiator
    pub fn endpoints(&self) -> [&LinkEndpoint; 2] {
        [&self.responder, &self.initiator]
    }

    /// Each endpoint paired with the endpoint it talks to
    pub fn neighbours(&self) -> [(&LinkEndpoint, &LinkEndpoint); 2] {
        [(&self.responder, &self.initiator), (&self.initiator, &self.responder)]
    }
}
