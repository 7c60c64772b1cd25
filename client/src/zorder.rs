//! Focus tracking and cross-kind stacking order.
//!
//! The z arena is shared by all three object kinds; bring-to-front is
//! computed client-side as `max(z) + 1` and broadcast as an update, so the
//! order stays globally consistent once every client has seen every
//! broadcast. Two clients raising different objects inside the same round
//! trip may transiently disagree; the relay's arrival order settles it.

use events::{ClientEvent, Node};

use crate::store::{ObjectKind, ObjectStore};

/// Which object is active, and the bring-to-front operation.
#[derive(Debug, Default)]
pub struct FocusController {
    focused: Option<(ObjectKind, Node)>,
}

impl FocusController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn focused(&self) -> Option<(ObjectKind, Node)> {
        self.focused
    }

    pub fn blur(&mut self) {
        self.focused = None;
    }

    /// Drop focus if the given object was focused (it was deleted or its
    /// project went away).
    pub fn forget(&mut self, kind: ObjectKind, node: Node) {
        if self.focused == Some((kind, node)) {
            self.focused = None;
        }
    }

    /// Focus an object and raise it above everything else. Each call
    /// strictly increments the arena maximum, so ties cannot occur locally.
    /// Returns the update intent, or `None` for an unconfirmed node (focus
    /// is still taken so the pending object shows as selected).
    pub fn focus(
        &mut self,
        store: &mut ObjectStore,
        kind: ObjectKind,
        node: Node,
    ) -> Option<ClientEvent> {
        self.focused = Some((kind, node));
        let next = store.max_z() + 1;
        store.set_z_index(kind, node, next)
    }
}

#[cfg(test)]
#[path = "zorder_test.rs"]
mod tests;
