//! Canvas interaction surface — pointer input to store mutations.
//!
//! Hit-testing by descending z, click-to-create for the active tool,
//! drag-to-move, and drag-to-resize from the bottom-right handle.
//! Everything it emits goes through the store, so clamping and the
//! confirmed-node preconditions apply uniformly.

use events::{ClientEvent, Node, VoteOption};

use crate::consts;
use crate::mesh::LinkDriver;
use crate::session::Session;
use crate::store::ObjectKind;

/// Active creation/selection tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Select,
    Text,
    Vote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragAction {
    Move,
    Resize,
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    kind: ObjectKind,
    node: Node,
    action: DragAction,
    /// Pointer offset from the object origin at grab time, so the object
    /// does not jump under the cursor.
    grab_dx: f64,
    grab_dy: f64,
}

/// Pointer state machine over one session.
#[derive(Debug, Default)]
pub struct PointerSurface {
    tool: Tool,
    drag: Option<Drag>,
}

impl PointerSurface {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    #[must_use]
    pub fn tool(&self) -> Tool {
        self.tool
    }

    #[must_use]
    pub fn drag_action(&self) -> Option<DragAction> {
        self.drag.as_ref().map(|d| d.action)
    }

    /// Pointer pressed. Creation tools create at the point; the select tool
    /// hit-tests, focuses, raises, and starts a drag.
    pub fn pointer_down<D: LinkDriver>(
        &mut self,
        session: &mut Session<D>,
        x: f64,
        y: f64,
    ) -> Vec<ClientEvent> {
        match self.tool {
            Tool::Text => {
                self.tool = Tool::Select;
                session.create_text(x, y, "").into_iter().collect()
            }
            Tool::Vote => {
                self.tool = Tool::Select;
                let options = vec![
                    VoteOption { content: "Option 1".to_owned() },
                    VoteOption { content: "Option 2".to_owned() },
                ];
                session.create_vote(x, y, "", options).into_iter().collect()
            }
            Tool::Select => self.select_at(session, x, y),
        }
    }

    /// Pointer moved. Advances an active drag and broadcasts the cursor to
    /// peers either way.
    pub fn pointer_move<D: LinkDriver>(
        &mut self,
        session: &mut Session<D>,
        x: f64,
        y: f64,
    ) -> Vec<ClientEvent> {
        session.send_cursor(x, y);
        let Some(drag) = self.drag else { return vec![] };
        let Some(current) = box_of(session, drag.kind, drag.node) else {
            // Deleted out from under the drag by another client.
            self.drag = None;
            return vec![];
        };
        let (bx, by, bw, bh) = current;

        let intent = match drag.action {
            DragAction::Move => session.move_resize(
                drag.kind,
                drag.node,
                x - drag.grab_dx,
                y - drag.grab_dy,
                bw,
                bh,
            ),
            DragAction::Resize => {
                session.move_resize(drag.kind, drag.node, bx, by, x - bx, y - by)
            }
        };
        intent.into_iter().collect()
    }

    /// Pointer released: the drag ends. The last emitted move already holds
    /// the final geometry; nothing more to send.
    pub fn pointer_up(&mut self) {
        self.drag = None;
    }

    fn select_at<D: LinkDriver>(
        &mut self,
        session: &mut Session<D>,
        x: f64,
        y: f64,
    ) -> Vec<ClientEvent> {
        let Some((kind, node, bx, by, bw, bh)) = hit_test(session, x, y) else {
            session.focus.blur();
            self.drag = None;
            return vec![];
        };

        let near_handle = (x - (bx + bw)).abs() <= consts::HANDLE_RADIUS
            && (y - (by + bh)).abs() <= consts::HANDLE_RADIUS;
        self.drag = Some(Drag {
            kind,
            node,
            action: if near_handle { DragAction::Resize } else { DragAction::Move },
            grab_dx: x - bx,
            grab_dy: y - by,
        });

        session.select(kind, node).into_iter().collect()
    }
}

/// Topmost object under the point, by descending z across all kinds.
fn hit_test<D: LinkDriver>(
    session: &Session<D>,
    x: f64,
    y: f64,
) -> Option<(ObjectKind, Node, f64, f64, f64, f64)> {
    session
        .store
        .boxes()
        .filter(|(_, b)| x >= b.x && x <= b.x + b.width && y >= b.y && y <= b.y + b.height)
        .max_by_key(|(_, b)| b.z_index)
        .map(|(kind, b)| (kind, b.node, b.x, b.y, b.width, b.height))
}

fn box_of<D: LinkDriver>(
    session: &Session<D>,
    kind: ObjectKind,
    node: Node,
) -> Option<(f64, f64, f64, f64)> {
    session
        .store
        .boxes()
        .find(|(k, b)| *k == kind && b.node == node)
        .map(|(_, b)| (b.x, b.y, b.width, b.height))
}

#[cfg(test)]
#[path = "surface_test.rs"]
mod tests;
