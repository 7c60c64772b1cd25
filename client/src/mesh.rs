//! Peer mesh coordinator — one WebRTC link per pair of room participants.
//!
//! DESIGN
//! ======
//! The browser/WebRTC stack sits behind the [`LinkDriver`] trait: the mesh
//! decides *when* to create links, offer, answer, and tear down; the driver
//! does the platform work and reports back through [`LinkEvent`]s. Tests
//! substitute a recording driver.
//!
//! Caller/callee convention (glare is avoided structurally, not resolved):
//! the side that already held a roster entry for the peer initiates. So a
//! joining client creates no links for peers it finds in the `room-info`
//! roster — those peers observed its `user-joined` and will call. Links are
//! created either on `user-joined` (we call) or on receiving an offer (we
//! answer). Renegotiation fires only on the initiator side and only while
//! the link is `Connected`.
//!
//! LIFECYCLE
//! =========
//! `user-joined` → offer → answer → `Connected` (data channel opens; the
//! caller created it, the callee accepts it). Any transition to
//! `Disconnected`/`Failed`/`Closed`, a `user-left`, or a negotiation
//! timeout tears the link down completely.

use std::collections::HashMap;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use events::{ClientEvent, CursorMsg};

use crate::consts;

// =============================================================================
// DRIVER BOUNDARY
// =============================================================================

/// Opaque handle to a local or remote media track, owned by the driver.
pub type TrackId = Uuid;

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("no link for peer {0}")]
    NoSuchPeer(Uuid),
    #[error("media capture unavailable: {0}")]
    CaptureUnavailable(String),
    #[error("negotiation failed: {0}")]
    Negotiation(String),
}

/// Connection state of one peer link, as reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Negotiating,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Platform WebRTC operations the mesh needs. One implementation wraps the
/// browser peer-connection API; tests use a recording mock.
pub trait LinkDriver {
    /// Create the underlying connection for a peer. The initiator also
    /// creates the (single) data channel here.
    fn open_link(&mut self, peer: Uuid, initiator: bool) -> Result<(), LinkError>;

    /// Produce an SDP offer for the peer's link.
    fn create_offer(&mut self, peer: Uuid) -> Result<Value, LinkError>;

    /// Produce an SDP answer to a received offer.
    fn create_answer(&mut self, peer: Uuid, offer: &Value) -> Result<Value, LinkError>;

    /// Apply a received SDP answer.
    fn apply_answer(&mut self, peer: Uuid, answer: &Value) -> Result<(), LinkError>;

    /// Apply a received ICE candidate.
    fn apply_candidate(&mut self, peer: Uuid, candidate: &Value) -> Result<(), LinkError>;

    /// Attach a local media track to the peer's link.
    fn attach_track(&mut self, peer: Uuid, track: TrackId) -> Result<(), LinkError>;

    /// Detach a local media track from the peer's link.
    fn detach_track(&mut self, peer: Uuid, track: TrackId) -> Result<(), LinkError>;

    /// Best-effort send on the peer's data channel. Lossy; never retried.
    fn send_data(&mut self, peer: Uuid, payload: &[u8]);

    /// Close and release the peer's link.
    fn close_link(&mut self, peer: Uuid);

    /// Acquire local camera/microphone capture; returns the track handles.
    fn acquire_capture(&mut self) -> Result<Vec<TrackId>, LinkError>;

    /// Stop and release local capture.
    fn stop_capture(&mut self);
}

/// Asynchronous notifications from the driver back into the mesh.
#[derive(Debug, Clone)]
pub enum LinkEvent {
    StateChanged { peer: Uuid, state: LinkState },
    /// The data channel is open (created by the caller, accepted by the
    /// callee).
    ChannelOpen { peer: Uuid },
    /// The connection wants renegotiation (e.g. a track was attached).
    NegotiationNeeded { peer: Uuid },
    Data { peer: Uuid, payload: Vec<u8> },
    TrackAdded { peer: Uuid, track: TrackId },
}

/// What a link event amounts to, for the session to act on.
#[derive(Debug)]
pub enum MeshEffect {
    /// Nothing for the session to do.
    None,
    /// Send these signaling intents out on the transport.
    Signal(Vec<ClientEvent>),
    /// A peer cursor arrived on the data channel.
    Cursor(CursorMsg),
    /// A remote media track became available.
    RemoteTrack { peer: Uuid, track: TrackId },
    /// The peer's link is gone; cursor and media state must be dropped.
    PeerDropped(Uuid),
}

// =============================================================================
// MESH
// =============================================================================

#[derive(Debug)]
struct PeerLink {
    state: LinkState,
    initiator: bool,
    channel_open: bool,
    negotiating_since: Instant,
}

/// Full-mesh coordinator. Small rooms only; every pair gets a direct link.
pub struct PeerMesh<D: LinkDriver> {
    self_id: Uuid,
    driver: D,
    links: HashMap<Uuid, PeerLink>,
}

impl<D: LinkDriver> PeerMesh<D> {
    pub fn new(self_id: Uuid, driver: D) -> Self {
        Self { self_id, driver, links: HashMap::new() }
    }

    #[must_use]
    pub fn link_state(&self, peer: Uuid) -> Option<LinkState> {
        self.links.get(&peer).map(|l| l.state)
    }

    #[must_use]
    pub fn connected_peers(&self) -> Vec<Uuid> {
        let mut peers: Vec<Uuid> = self
            .links
            .iter()
            .filter(|(_, l)| l.state == LinkState::Connected)
            .map(|(peer, _)| *peer)
            .collect();
        peers.sort();
        peers
    }

    /// A peer joined the room after us: we are the established side, so we
    /// call. No-op if a link already exists (a reconnecting peer announces
    /// itself again before its old link has died).
    pub fn on_user_joined(&mut self, peer: Uuid, now: Instant) -> Vec<ClientEvent> {
        if peer == self.self_id || self.links.contains_key(&peer) {
            return vec![];
        }
        match self.open_as_caller(peer, now) {
            Ok(events) => events,
            Err(e) => {
                warn!(%peer, error = %e, "failed to open caller link");
                self.teardown(peer);
                vec![]
            }
        }
    }

    /// An offer arrived. For an unknown peer this creates the callee side of
    /// the link; for a `Connected` link it is the initiator renegotiating.
    pub fn on_offer(&mut self, from: Uuid, offer: &Value, now: Instant) -> Vec<ClientEvent> {
        if let Some(link) = self.links.get_mut(&from) {
            if link.initiator {
                // Should not happen under the caller/callee convention.
                warn!(peer = %from, "offer from a peer we initiated toward, ignored");
                return vec![];
            }
            link.state = LinkState::Negotiating;
            link.negotiating_since = now;
        } else if let Err(e) = self.driver.open_link(from, false) {
            warn!(peer = %from, error = %e, "failed to open callee link");
            return vec![];
        } else {
            self.links.insert(
                from,
                PeerLink {
                    state: LinkState::Negotiating,
                    initiator: false,
                    channel_open: false,
                    negotiating_since: now,
                },
            );
        }

        match self.driver.create_answer(from, offer) {
            Ok(answer) => {
                debug!(peer = %from, "answering offer");
                vec![ClientEvent::WebrtcAnswer { to: from, from: self.self_id, answer }]
            }
            Err(e) => {
                warn!(peer = %from, error = %e, "failed to answer offer");
                self.teardown(from);
                vec![]
            }
        }
    }

    /// An answer to our offer arrived.
    pub fn on_answer(&mut self, from: Uuid, answer: &Value) {
        if !self.links.contains_key(&from) {
            debug!(peer = %from, "answer for unknown link dropped");
            return;
        }
        if let Err(e) = self.driver.apply_answer(from, answer) {
            warn!(peer = %from, error = %e, "failed to apply answer");
            self.teardown(from);
        }
    }

    /// A relayed ICE candidate arrived.
    pub fn on_candidate(&mut self, from: Uuid, candidate: &Value) {
        if !self.links.contains_key(&from) {
            // Candidates can trail a teardown; expected, not an error.
            debug!(peer = %from, "candidate for unknown link dropped");
            return;
        }
        if let Err(e) = self.driver.apply_candidate(from, candidate) {
            warn!(peer = %from, error = %e, "failed to apply candidate");
        }
    }

    /// The peer left the room: proactive teardown, before the connection
    /// layer notices on its own.
    pub fn on_user_left(&mut self, peer: Uuid) {
        if self.links.contains_key(&peer) {
            info!(%peer, "peer left, closing link");
            self.teardown(peer);
        }
    }

    /// Process a driver notification.
    pub fn on_link_event(&mut self, event: &LinkEvent, now: Instant) -> MeshEffect {
        match event {
            LinkEvent::StateChanged { peer, state } => self.on_state_changed(*peer, *state),
            LinkEvent::ChannelOpen { peer } => {
                if let Some(link) = self.links.get_mut(peer) {
                    link.channel_open = true;
                }
                MeshEffect::None
            }
            LinkEvent::NegotiationNeeded { peer } => self.on_negotiation_needed(*peer, now),
            LinkEvent::Data { peer, payload } => match serde_json::from_slice(payload) {
                Ok(msg) => MeshEffect::Cursor(msg),
                Err(e) => {
                    // Malformed channel data is dropped, never fatal.
                    debug!(%peer, error = %e, "undecodable data channel payload");
                    MeshEffect::None
                }
            },
            LinkEvent::TrackAdded { peer, track } => {
                MeshEffect::RemoteTrack { peer: *peer, track: *track }
            }
        }
    }

    /// Fail out negotiations that have been stuck longer than
    /// [`consts::NEGOTIATION_TIMEOUT`]. Returns the peers dropped.
    pub fn tick(&mut self, now: Instant) -> Vec<Uuid> {
        let stale: Vec<Uuid> = self
            .links
            .iter()
            .filter(|(_, l)| {
                l.state == LinkState::Negotiating
                    && now.duration_since(l.negotiating_since) >= consts::NEGOTIATION_TIMEOUT
            })
            .map(|(peer, _)| *peer)
            .collect();
        for peer in &stale {
            warn!(%peer, timeout = ?consts::NEGOTIATION_TIMEOUT, "negotiation timed out");
            self.teardown(*peer);
        }
        stale
    }

    /// Broadcast the local cursor to every peer with an open channel.
    /// Best-effort; peers without an open channel are skipped.
    pub fn send_cursor(&mut self, x: f64, y: f64) {
        let msg = CursorMsg { user_id: self.self_id, x, y };
        let Ok(payload) = serde_json::to_vec(&msg) else { return };
        let open: Vec<Uuid> = self
            .links
            .iter()
            .filter(|(_, l)| l.channel_open)
            .map(|(peer, _)| *peer)
            .collect();
        for peer in open {
            self.driver.send_data(peer, &payload);
        }
    }

    /// Attach a local track to every open link (call start).
    pub fn attach_track_all(&mut self, track: TrackId) {
        let peers: Vec<Uuid> = self.links.keys().copied().collect();
        for peer in peers {
            if let Err(e) = self.driver.attach_track(peer, track) {
                warn!(%peer, error = %e, "failed to attach track");
            }
        }
    }

    /// Detach a local track from every link (call end). Links stay up; only
    /// the media goes away.
    pub fn detach_track_all(&mut self, track: TrackId) {
        let peers: Vec<Uuid> = self.links.keys().copied().collect();
        for peer in peers {
            if let Err(e) = self.driver.detach_track(peer, track) {
                warn!(%peer, error = %e, "failed to detach track");
            }
        }
    }

    pub fn acquire_capture(&mut self) -> Result<Vec<TrackId>, LinkError> {
        self.driver.acquire_capture()
    }

    pub fn stop_capture(&mut self) {
        self.driver.stop_capture();
    }

    /// Close every link (leaving the room).
    pub fn close_all(&mut self) {
        let peers: Vec<Uuid> = self.links.keys().copied().collect();
        for peer in peers {
            self.teardown(peer);
        }
    }

    // =========================================================================
    // INTERNAL
    // =========================================================================

    fn open_as_caller(&mut self, peer: Uuid, now: Instant) -> Result<Vec<ClientEvent>, LinkError> {
        self.driver.open_link(peer, true)?;
        self.links.insert(
            peer,
            PeerLink {
                state: LinkState::Negotiating,
                initiator: true,
                channel_open: false,
                negotiating_since: now,
            },
        );
        let offer = self.driver.create_offer(peer)?;
        info!(%peer, "calling peer");
        Ok(vec![ClientEvent::WebrtcOffer { to: peer, from: self.self_id, offer }])
    }

    fn on_state_changed(&mut self, peer: Uuid, state: LinkState) -> MeshEffect {
        let Some(link) = self.links.get_mut(&peer) else {
            return MeshEffect::None;
        };
        match state {
            LinkState::Connected => {
                link.state = LinkState::Connected;
                info!(%peer, "link connected");
                MeshEffect::None
            }
            LinkState::Disconnected | LinkState::Failed | LinkState::Closed => {
                info!(%peer, ?state, "link lost, tearing down");
                self.teardown(peer);
                MeshEffect::PeerDropped(peer)
            }
            LinkState::Negotiating => {
                link.state = LinkState::Negotiating;
                MeshEffect::None
            }
        }
    }

    /// Renegotiation guard: only the initiator renegotiates, and only from a
    /// stable (`Connected`) state. Everything else would risk glare.
    fn on_negotiation_needed(&mut self, peer: Uuid, now: Instant) -> MeshEffect {
        let Some(link) = self.links.get_mut(&peer) else {
            return MeshEffect::None;
        };
        if !link.initiator || link.state != LinkState::Connected {
            debug!(%peer, initiator = link.initiator, state = ?link.state,
                "negotiation-needed suppressed");
            return MeshEffect::None;
        }
        link.state = LinkState::Negotiating;
        link.negotiating_since = now;
        match self.driver.create_offer(peer) {
            Ok(offer) => MeshEffect::Signal(vec![ClientEvent::WebrtcOffer {
                to: peer,
                from: self.self_id,
                offer,
            }]),
            Err(e) => {
                warn!(%peer, error = %e, "renegotiation offer failed");
                self.teardown(peer);
                MeshEffect::PeerDropped(peer)
            }
        }
    }

    fn teardown(&mut self, peer: Uuid) {
        self.driver.close_link(peer);
        self.links.remove(&peer);
    }
}

#[cfg(test)]
pub(crate) mod test_driver {
    //! Recording [`LinkDriver`] shared by the mesh/media/session tests.

    use std::cell::RefCell;
    use std::rc::Rc;

    use super::{LinkDriver, LinkError, TrackId};
    use serde_json::Value;
    use uuid::Uuid;

    #[derive(Debug, PartialEq)]
    pub enum Call {
        Open { peer: Uuid, initiator: bool },
        Offer(Uuid),
        Answer(Uuid),
        ApplyAnswer(Uuid),
        Candidate(Uuid),
        Attach(Uuid, TrackId),
        Detach(Uuid, TrackId),
        Close(Uuid),
        Capture,
        StopCapture,
    }

    #[derive(Default)]
    pub struct Log {
        pub calls: Vec<Call>,
        pub sent: Vec<(Uuid, Vec<u8>)>,
    }

    /// Recording driver. SDP payloads are placeholder JSON; the mesh never
    /// inspects them.
    #[derive(Clone, Default)]
    pub struct MockDriver {
        pub log: Rc<RefCell<Log>>,
        pub fail_capture: bool,
    }

    impl MockDriver {
        pub fn new() -> (Self, Rc<RefCell<Log>>) {
            let driver = Self::default();
            let log = Rc::clone(&driver.log);
            (driver, log)
        }
    }

    impl LinkDriver for MockDriver {
        fn open_link(&mut self, peer: Uuid, initiator: bool) -> Result<(), LinkError> {
            self.log.borrow_mut().calls.push(Call::Open { peer, initiator });
            Ok(())
        }

        fn create_offer(&mut self, peer: Uuid) -> Result<Value, LinkError> {
            self.log.borrow_mut().calls.push(Call::Offer(peer));
            Ok(serde_json::json!({"type": "offer", "sdp": "v=0"}))
        }

        fn create_answer(&mut self, peer: Uuid, _offer: &Value) -> Result<Value, LinkError> {
            self.log.borrow_mut().calls.push(Call::Answer(peer));
            Ok(serde_json::json!({"type": "answer", "sdp": "v=0"}))
        }

        fn apply_answer(&mut self, peer: Uuid, _answer: &Value) -> Result<(), LinkError> {
            self.log.borrow_mut().calls.push(Call::ApplyAnswer(peer));
            Ok(())
        }

        fn apply_candidate(&mut self, peer: Uuid, _candidate: &Value) -> Result<(), LinkError> {
            self.log.borrow_mut().calls.push(Call::Candidate(peer));
            Ok(())
        }

        fn attach_track(&mut self, peer: Uuid, track: TrackId) -> Result<(), LinkError> {
            self.log.borrow_mut().calls.push(Call::Attach(peer, track));
            Ok(())
        }

        fn detach_track(&mut self, peer: Uuid, track: TrackId) -> Result<(), LinkError> {
            self.log.borrow_mut().calls.push(Call::Detach(peer, track));
            Ok(())
        }

        fn send_data(&mut self, peer: Uuid, payload: &[u8]) {
            self.log.borrow_mut().sent.push((peer, payload.to_vec()));
        }

        fn close_link(&mut self, peer: Uuid) {
            self.log.borrow_mut().calls.push(Call::Close(peer));
        }

        fn acquire_capture(&mut self) -> Result<Vec<TrackId>, LinkError> {
            self.log.borrow_mut().calls.push(Call::Capture);
            if self.fail_capture {
                return Err(LinkError::CaptureUnavailable("denied".into()));
            }
            Ok(vec![Uuid::new_v4(), Uuid::new_v4()])
        }

        fn stop_capture(&mut self) {
            self.log.borrow_mut().calls.push(Call::StopCapture);
        }
    }
}

#[cfg(test)]
#[path = "mesh_test.rs"]
mod tests;
