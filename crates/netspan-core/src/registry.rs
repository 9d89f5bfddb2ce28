//! The hub's session registry.
//!
//! One entry per accepted connection, guarded by a single lock at the
//! hub (the registry itself is a plain data structure; the hub wraps it
//! in `tokio::sync::Mutex`). Operations performed under that lock:
//! allocate an SSID, insert a session, remove a session, and snapshot
//! viewer write handles for fan-out.
//!
//! # Invariants
//!
//! - every live connection has exactly one session entry
//! - SSIDs are unique and strictly increasing within a hub process; a
//!   consumed SSID is never returned to the pool, including when the
//!   registration that consumed it fails
//! - a fan-out snapshot sees a consistent set of handles: sessions
//!   removed before the snapshot are absent, sessions added afterwards
//!   need not be included

use std::{collections::HashMap, net::IpAddr, sync::Arc};

use netspan_proto::Role;
use tokio::sync::Mutex;

/// Shared, serialized write capability for one connection.
///
/// Cloneable so fan-out can write into a viewer's transport without
/// owning it; the inner mutex serializes competing sniffer workers on
/// the same handle.
pub type SharedWriter<W> = Arc<Mutex<W>>;

/// Hub-local record for one accepted connection.
#[derive(Debug)]
pub struct Session<W> {
    /// Assigned session id
    pub ssid: u32,
    /// Peer address as observed at accept time
    pub peer: IpAddr,
    /// Client role from the hello exchange
    pub role: Role,
    /// Write handle for this connection
    pub writer: SharedWriter<W>,
}

/// In-memory index of all live sessions.
#[derive(Debug)]
pub struct SessionRegistry<W> {
    sessions: HashMap<u32, Session<W>>,
    next_ssid: u32,
    sniffer_sources: HashMap<IpAddr, u32>,
    next_sniffer_index: u32,
}

impl<W> SessionRegistry<W> {
    /// Empty registry; the first SSID handed out is 1 (0 is reserved as
    /// "unassigned" on the wire).
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            next_ssid: 1,
            sniffer_sources: HashMap::new(),
            next_sniffer_index: 1,
        }
    }

    /// Register a new session and return its SSID.
    ///
    /// The SSID is consumed even if the caller subsequently fails to
    /// deliver the hello response and removes the session again.
    pub fn register(&mut self, peer: IpAddr, role: Role, writer: SharedWriter<W>) -> u32 {
        let ssid = self.next_ssid;
        self.next_ssid += 1;
        self.sessions.insert(ssid, Session { ssid, peer, role, writer });
        ssid
    }

    /// Remove a session, returning its entry if it was still present.
    ///
    /// Idempotent: a session may be torn down by its own worker and by a
    /// sniffer worker that saw a send failure, in either order.
    pub fn remove(&mut self, ssid: u32) -> Option<Session<W>> {
        self.sessions.remove(&ssid)
    }

    /// Snapshot the write handles of every registered viewer.
    ///
    /// Fan-out takes this snapshot under the registry lock, releases the
    /// lock, then writes; a handle may refer to a session that is gone by
    /// the time the write happens, and the writer treats any error as
    /// "this viewer is gone".
    #[must_use]
    pub fn viewers(&self) -> Vec<(u32, SharedWriter<W>)> {
        self.sessions
            .values()
            .filter(|s| s.role == Role::Viewer)
            .map(|s| (s.ssid, Arc::clone(&s.writer)))
            .collect()
    }

    /// Sequential index of the sniffer source at `peer`, assigned on
    /// first registration from that address.
    pub fn sniffer_source_index(&mut self, peer: IpAddr) -> u32 {
        if let Some(&index) = self.sniffer_sources.get(&peer) {
            return index;
        }
        let index = self.next_sniffer_index;
        self.next_sniffer_index += 1;
        self.sniffer_sources.insert(peer, index);
        index
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// True if no sessions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Look up a live session by SSID.
    #[must_use]
    pub fn get(&self, ssid: u32) -> Option<&Session<W>> {
        self.sessions.get(&ssid)
    }
}

impl<W> Default for SessionRegistry<W> {
    fn default() -> Self {
        Self::new()
    }
}
