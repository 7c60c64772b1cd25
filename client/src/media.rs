//! Media call control.
//!
//! Starting a call acquires local capture and attaches every captured track
//! to every peer link, which makes the driver fire negotiation-needed per
//! link (handled by the mesh under its renegotiation guard). Ending a call
//! detaches and stops the local tracks only — the peer links, and with them
//! the cursor data channel, stay alive across call start/stop cycles.

use std::collections::HashMap;

use tracing::info;
use uuid::Uuid;

use crate::mesh::{LinkDriver, LinkError, PeerMesh, TrackId};

#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// Capture denied or unavailable. Call setup failed; object sync is
    /// unaffected.
    #[error(transparent)]
    Capture(#[from] LinkError),
    #[error("call already active")]
    AlreadyActive,
}

/// Local call state plus the remote tracks received per peer.
#[derive(Debug, Default)]
pub struct MediaCall {
    local_tracks: Vec<TrackId>,
    remote_tracks: HashMap<Uuid, Vec<TrackId>>,
}

impl MediaCall {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.local_tracks.is_empty()
    }

    #[must_use]
    pub fn remote_tracks(&self, peer: Uuid) -> &[TrackId] {
        self.remote_tracks.get(&peer).map_or(&[], Vec::as_slice)
    }

    /// Start the call: acquire capture, attach all tracks to all links.
    ///
    /// # Errors
    ///
    /// [`CallError::Capture`] when the platform refuses camera/microphone
    /// access; nothing is attached in that case.
    pub fn start<D: LinkDriver>(&mut self, mesh: &mut PeerMesh<D>) -> Result<(), CallError> {
        if self.is_active() {
            return Err(CallError::AlreadyActive);
        }
        let tracks = mesh.acquire_capture()?;
        info!(tracks = tracks.len(), "call started");
        for track in &tracks {
            mesh.attach_track_all(*track);
        }
        self.local_tracks = tracks;
        Ok(())
    }

    /// End the call: detach and stop local tracks. Peer links survive.
    pub fn end<D: LinkDriver>(&mut self, mesh: &mut PeerMesh<D>) {
        if !self.is_active() {
            return;
        }
        for track in self.local_tracks.drain(..) {
            mesh.detach_track_all(track);
        }
        mesh.stop_capture();
        info!("call ended");
    }

    /// A remote track arrived on a peer link.
    pub fn on_remote_track(&mut self, peer: Uuid, track: TrackId) {
        self.remote_tracks.entry(peer).or_default().push(track);
    }

    /// The peer's link is gone; forget its media.
    pub fn on_peer_dropped(&mut self, peer: Uuid) {
        self.remote_tracks.remove(&peer);
    }

    /// Full reset (leaving the room).
    pub fn reset<D: LinkDriver>(&mut self, mesh: &mut PeerMesh<D>) {
        self.end(mesh);
        self.remote_tracks.clear();
    }
}

#[cfg(test)]
#[path = "media_test.rs"]
mod tests;
