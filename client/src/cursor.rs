//! Peer cursor state. Latest message per peer wins; the data channel is
//! lossy and nothing here retries or orders.

use std::collections::HashMap;

use uuid::Uuid;

use events::CursorMsg;

#[derive(Debug, Default)]
pub struct CursorMap {
    cursors: HashMap<Uuid, CursorMsg>,
}

impl CursorMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the peer's position with the newest message.
    pub fn update(&mut self, msg: CursorMsg) {
        self.cursors.insert(msg.user_id, msg);
    }

    /// Forget a peer (left the room or their link went down).
    pub fn remove(&mut self, user_id: Uuid) {
        self.cursors.remove(&user_id);
    }

    #[must_use]
    pub fn get(&self, user_id: Uuid) -> Option<&CursorMsg> {
        self.cursors.get(&user_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CursorMsg> {
        self.cursors.values()
    }

    pub fn clear(&mut self) {
        self.cursors.clear();
    }
}

#[cfg(test)]
#[path = "cursor_test.rs"]
mod tests;
