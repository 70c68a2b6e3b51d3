//! Bus master/slave wiring.
//!
//! The wiring is kept as a directed graph with an edge from every master to
//! its bus and from every bus to each of its slaves, so edges follow the
//! direction in which transactions are initiated.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use crate::error::ComposeError;

/// Identifier of an on-chip bus (e.g. `wishbone`).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusId(String);

impl BusId {
    /// Creates a bus identifier.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the bus name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BusId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// The side of a bus transaction a peer takes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusRole {
    /// Initiates transactions.
    Master,
    /// Responds to transactions.
    Slave,
}

impl fmt::Display for BusRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusRole::Master => write!(f, "master"),
            BusRole::Slave => write!(f, "slave"),
        }
    }
}

/// The set of bus roles a peer is able to take.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct RoleSet {
    master: bool,
    slave: bool,
}

impl RoleSet {
    /// A peer that never sits on a shared bus.
    pub const NONE: RoleSet = RoleSet {
        master: false,
        slave: false,
    };
    /// A peer that can only respond.
    pub const SLAVE: RoleSet = RoleSet {
        master: false,
        slave: true,
    };
    /// A peer that can only initiate.
    pub const MASTER: RoleSet = RoleSet {
        master: true,
        slave: false,
    };
    /// A peer that can do both, such as a debug bridge with its own registers.
    pub const MASTER_SLAVE: RoleSet = RoleSet {
        master: true,
        slave: true,
    };

    /// Returns `true` if `role` is in the set.
    pub fn contains(self, role: BusRole) -> bool {
        match role {
            BusRole::Master => self.master,
            BusRole::Slave => self.slave,
        }
    }
}

/// One edge of the finalized wiring.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct BusAttachment {
    /// The bus.
    pub bus_id: BusId,
    /// The role the peer takes on it.
    pub role: BusRole,
    /// The attached peer.
    pub peer: String,
}

#[derive(Debug, Clone)]
enum WiringNode {
    Bus(BusId),
    Peer(String),
}

/// Tracks which peers sit on which bus and in what role.
///
/// Peers are declared with their [`RoleSet`] first; [`attach`](Self::attach)
/// then refuses any role the peer did not declare. No cycle detection is
/// done: masters fan out to slaves through buses, so the graph is a forest of
/// stars by construction.
#[derive(Debug, Default)]
pub struct BusWiringGraph {
    graph: DiGraph<WiringNode, BusRole>,
    buses: HashMap<BusId, NodeIndex>,
    peers: HashMap<String, (NodeIndex, RoleSet)>,
    attachments: BTreeSet<BusAttachment>,
}

impl BusWiringGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a peer and the roles it supports.
    pub fn add_peer(&mut self, peer_id: &str, roles: RoleSet) -> Result<(), ComposeError> {
        if self.peers.contains_key(peer_id) {
            return Err(ComposeError::DuplicateName {
                name: peer_id.to_string(),
                scope: "the bus peers".to_string(),
            });
        }
        let node = self.graph.add_node(WiringNode::Peer(peer_id.to_string()));
        self.peers.insert(peer_id.to_string(), (node, roles));
        Ok(())
    }

    /// Attaches a declared peer to `bus_id` in `role`.
    pub fn attach(
        &mut self,
        bus_id: &BusId,
        role: BusRole,
        peer_id: &str,
    ) -> Result<(), ComposeError> {
        let &(peer_node, roles) =
            self.peers
                .get(peer_id)
                .ok_or_else(|| ComposeError::UnknownPeer {
                    peer: peer_id.to_string(),
                })?;

        if !roles.contains(role) {
            return Err(ComposeError::RoleNotSupported {
                peer: peer_id.to_string(),
                bus: bus_id.clone(),
                role,
            });
        }

        let attachment = BusAttachment {
            bus_id: bus_id.clone(),
            role,
            peer: peer_id.to_string(),
        };
        if self.attachments.contains(&attachment) {
            return Err(ComposeError::DuplicateAttachment {
                peer: peer_id.to_string(),
                bus: bus_id.clone(),
                role,
            });
        }

        let bus_node = self.bus_node(bus_id);
        match role {
            BusRole::Master => self.graph.add_edge(peer_node, bus_node, role),
            BusRole::Slave => self.graph.add_edge(bus_node, peer_node, role),
        };
        self.attachments.insert(attachment);
        tracing::debug!(peer = peer_id, bus = %bus_id, %role, "attached bus peer");
        Ok(())
    }

    /// Freezes the graph into a [`BusTopology`].
    ///
    /// Buses that have slaves but no master are logged as warnings: the
    /// composition is still valid, but nothing can reach those slaves.
    pub fn finalize(self) -> BusTopology {
        let topology = BusTopology {
            graph: self.graph,
            buses: self.buses,
            attachments: self.attachments.into_iter().collect(),
        };
        for bus in topology.bus_ids() {
            if topology.masters(bus).is_empty() && !topology.slaves(bus).is_empty() {
                tracing::warn!(bus = %bus, "bus has slaves but no master");
            }
        }
        topology
    }

    fn bus_node(&mut self, bus_id: &BusId) -> NodeIndex {
        if let Some(&node) = self.buses.get(bus_id) {
            return node;
        }
        let node = self.graph.add_node(WiringNode::Bus(bus_id.clone()));
        self.buses.insert(bus_id.clone(), node);
        node
    }
}

/// The immutable bus wiring of one composition.
#[derive(Debug, Clone, Default)]
pub struct BusTopology {
    graph: DiGraph<WiringNode, BusRole>,
    buses: HashMap<BusId, NodeIndex>,
    attachments: Vec<BusAttachment>,
}

impl BusTopology {
    /// All attachments, ordered by bus, role and peer name.
    pub fn attachments(&self) -> &[BusAttachment] {
        &self.attachments
    }

    /// Bus identifiers in sorted order.
    pub fn bus_ids(&self) -> Vec<&BusId> {
        let mut ids: Vec<_> = self.buses.keys().collect();
        ids.sort();
        ids
    }

    /// Peers attached to `bus_id` as masters, sorted by name.
    pub fn masters(&self, bus_id: &BusId) -> Vec<&str> {
        self.neighbours(bus_id, Direction::Incoming)
    }

    /// Peers attached to `bus_id` as slaves, sorted by name.
    pub fn slaves(&self, bus_id: &BusId) -> Vec<&str> {
        self.neighbours(bus_id, Direction::Outgoing)
    }

    fn neighbours(&self, bus_id: &BusId, direction: Direction) -> Vec<&str> {
        let Some(&bus) = self.buses.get(bus_id) else {
            return Vec::new();
        };
        let mut peers: Vec<&str> = self
            .graph
            .neighbors_directed(bus, direction)
            .filter_map(|n| match &self.graph[n] {
                WiringNode::Peer(name) => Some(name.as_str()),
                WiringNode::Bus(_) => None,
            })
            .collect();
        peers.sort_unstable();
        peers
    }
}

impl PartialEq for BusTopology {
    fn eq(&self, other: &Self) -> bool {
        self.attachments == other.attachments
    }
}

impl Eq for BusTopology {}

impl Serialize for BusTopology {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.attachments)
    }
}
