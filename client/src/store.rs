//! Canvas object store — the local mirror of one project's objects.
//!
//! DESIGN
//! ======
//! Three confirmed collections keyed by the relay-assigned node, plus three
//! pending collections keyed by a client-generated correlation token. A
//! `create` inserts an optimistic object into the pending map (zero-latency
//! feedback) and returns the intent to send; the relay echoes the
//! correlation in its `add*` confirmation, and [`ObjectStore::apply`] swaps
//! the placeholder for the canonical object deterministically. No debounce,
//! no guessing.
//!
//! Mutations (`update`/`move`/`delete`) require a confirmed node; an unknown
//! node is a silent no-op, never an error — the object was most likely
//! deleted by another client moments earlier, or is still pending.
//!
//! Broadcast application is idempotent by value: re-applying the same event
//! leaves the store unchanged. Switching projects is a hard reset; pending
//! objects that were never confirmed are abandoned with the rest.

use std::collections::HashMap;

use tracing::{debug, warn};
use uuid::Uuid;

use events::{
    ClientEvent, Fnc, ImageEvent, ImageFields, ImageObject, Node, ObjectBox, ServerEvent,
    TextEvent, TextFields, TextObject, VoteEvent, VoteFields, VoteObject, VoteOption,
};

use crate::consts;

// =============================================================================
// TYPES
// =============================================================================

/// The three synchronized object kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Text,
    Image,
    Vote,
}

/// Clamped placement handed to the asset upload side-channel for a staged
/// image. The correlation token lets the store resolve the `addImage`
/// broadcast back to its placeholder.
#[derive(Debug, Clone, Copy)]
pub struct ImagePlacement {
    pub correlation: Uuid,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Local mirror of the current project's canvas objects.
#[derive(Debug)]
pub struct ObjectStore {
    team_id: Uuid,
    user_id: Uuid,
    project_id: Option<Uuid>,
    viewport: (f64, f64),

    pub texts: HashMap<Node, TextObject>,
    pub images: HashMap<Node, ImageObject>,
    pub votes: HashMap<Node, VoteObject>,

    pending_texts: HashMap<Uuid, TextObject>,
    pending_images: HashMap<Uuid, ImageObject>,
    pending_votes: HashMap<Uuid, VoteObject>,
}

impl ObjectStore {
    #[must_use]
    pub fn new(team_id: Uuid, user_id: Uuid) -> Self {
        Self {
            team_id,
            user_id,
            project_id: None,
            viewport: consts::DEFAULT_VIEWPORT,
            texts: HashMap::new(),
            images: HashMap::new(),
            votes: HashMap::new(),
            pending_texts: HashMap::new(),
            pending_images: HashMap::new(),
            pending_votes: HashMap::new(),
        }
    }

    #[must_use]
    pub fn project_id(&self) -> Option<Uuid> {
        self.project_id
    }

    pub fn set_viewport(&mut self, width: f64, height: f64) {
        self.viewport = (width, height);
    }

    /// Rebuild wholesale from an authoritative project snapshot. Pending
    /// objects from the previous project are abandoned.
    pub fn load(
        &mut self,
        project_id: Uuid,
        texts: Vec<TextObject>,
        images: Vec<ImageObject>,
        votes: Vec<VoteObject>,
    ) {
        self.reset();
        self.project_id = Some(project_id);
        self.texts = texts.into_iter().map(|o| (o.base.node, o)).collect();
        self.images = images.into_iter().map(|o| (o.base.node, o)).collect();
        self.votes = votes.into_iter().map(|o| (o.base.node, o)).collect();
    }

    /// Drop all state, confirmed and pending.
    pub fn reset(&mut self) {
        self.project_id = None;
        self.texts.clear();
        self.images.clear();
        self.votes.clear();
        self.pending_texts.clear();
        self.pending_images.clear();
        self.pending_votes.clear();
    }

    /// Highest z-index across all three kinds, pending included. The
    /// stacking order is one arena shared by every object on the canvas.
    #[must_use]
    pub fn max_z(&self) -> i64 {
        let confirmed = self
            .texts
            .values()
            .map(|o| o.base.z_index)
            .chain(self.images.values().map(|o| o.base.z_index))
            .chain(self.votes.values().map(|o| o.base.z_index));
        let pending = self
            .pending_texts
            .values()
            .map(|o| o.base.z_index)
            .chain(self.pending_images.values().map(|o| o.base.z_index))
            .chain(self.pending_votes.values().map(|o| o.base.z_index));
        confirmed.chain(pending).max().unwrap_or(0)
    }

    /// Number of objects not yet confirmed by the relay.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending_texts.len() + self.pending_images.len() + self.pending_votes.len()
    }

    // =========================================================================
    // CREATE
    // =========================================================================

    /// Optimistically create a text box at the given point. Returns the
    /// intent to send, or `None` when no project is active.
    pub fn create_text(&mut self, x: f64, y: f64, content: &str) -> Option<ClientEvent> {
        let project_id = self.project_id?;
        let correlation = Uuid::new_v4();
        let (x, y, width, height) = self.clamp(
            ObjectKind::Text,
            x,
            y,
            consts::DEFAULT_TEXT_WIDTH,
            consts::DEFAULT_TEXT_HEIGHT,
        );

        let object = TextObject {
            base: self.placeholder_box(correlation, project_id, x, y, width, height),
            content: content.to_owned(),
            color: events::participant_color(self.user_id).to_owned(),
            font_size: 16.0,
            font_family: "sans-serif".to_owned(),
        };
        self.pending_texts.insert(correlation, object);

        Some(ClientEvent::TextEvent(TextEvent {
            fnc: Fnc::New,
            node: None,
            project_id,
            correlation: Some(correlation),
            fields: TextFields {
                x: Some(x),
                y: Some(y),
                width: Some(width),
                height: Some(height),
                content: Some(content.to_owned()),
                ..TextFields::default()
            },
        }))
    }

    /// Optimistically create a vote box. The local placeholder starts with
    /// an all-zero tally; the tally is authoritative from the relay and is
    /// never computed here.
    pub fn create_vote(
        &mut self,
        x: f64,
        y: f64,
        title: &str,
        options: Vec<VoteOption>,
    ) -> Option<ClientEvent> {
        let project_id = self.project_id?;
        if options.len() < 2 {
            warn!(count = options.len(), "vote needs at least two options, not created");
            return None;
        }
        let correlation = Uuid::new_v4();
        let (x, y, width, height) = self.clamp(
            ObjectKind::Vote,
            x,
            y,
            consts::DEFAULT_VOTE_WIDTH,
            consts::DEFAULT_VOTE_HEIGHT,
        );

        let object = VoteObject {
            base: self.placeholder_box(correlation, project_id, x, y, width, height),
            title: title.to_owned(),
            options: options.clone(),
            tally: vec![0; options.len()],
            ballots: Vec::new(),
        };
        self.pending_votes.insert(correlation, object);

        Some(ClientEvent::VoteEvent(VoteEvent {
            fnc: Fnc::New,
            node: None,
            project_id,
            correlation: Some(correlation),
            fields: VoteFields {
                x: Some(x),
                y: Some(y),
                width: Some(width),
                height: Some(height),
                title: Some(title.to_owned()),
                options: Some(options),
                ..VoteFields::default()
            },
        }))
    }

    /// Stage an image placeholder ahead of its asset upload. The returned
    /// placement (clamped) and correlation go to the upload side-channel;
    /// the `addImage` broadcast resolves the placeholder.
    pub fn stage_image(
        &mut self,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        file_name: &str,
    ) -> Option<ImagePlacement> {
        let project_id = self.project_id?;
        let correlation = Uuid::new_v4();
        let (x, y, width, height) = self.clamp(ObjectKind::Image, x, y, width, height);

        let object = ImageObject {
            base: self.placeholder_box(correlation, project_id, x, y, width, height),
            file_name: file_name.to_owned(),
            mime_type: String::new(),
            owner_user_id: self.user_id,
        };
        self.pending_images.insert(correlation, object);
        Some(ImagePlacement { correlation, x, y, width, height })
    }

    // =========================================================================
    // MUTATE (confirmed nodes only)
    // =========================================================================

    /// Update a confirmed text box. Box fields are clamped; the same
    /// (clamped) fields are applied locally and sent in the intent.
    pub fn update_text(&mut self, node: Node, mut fields: TextFields) -> Option<ClientEvent> {
        let project_id = self.project_id?;
        let Some(object) = self.texts.get(&node) else {
            debug!(%node, "update for unconfirmed or unknown text node dropped");
            return None;
        };
        self.clamp_fields(
            ObjectKind::Text,
            &object.base,
            &mut fields.x,
            &mut fields.y,
            &mut fields.width,
            &mut fields.height,
        );

        let object = self.texts.get_mut(&node)?;
        apply_box_fields(&mut object.base, fields.x, fields.y, fields.width, fields.height,
            fields.z_index);
        if let Some(content) = &fields.content {
            object.content.clone_from(content);
        }
        if let Some(color) = &fields.color {
            object.color.clone_from(color);
        }
        if let Some(size) = fields.font_size {
            object.font_size = size;
        }
        if let Some(family) = &fields.font_family {
            object.font_family.clone_from(family);
        }

        Some(ClientEvent::TextEvent(TextEvent {
            fnc: Fnc::Update,
            node: Some(node),
            project_id,
            correlation: None,
            fields,
        }))
    }

    /// Update a confirmed vote box (title/options). Changing options resets
    /// the local ballots and tally exactly as the relay will.
    pub fn update_vote(&mut self, node: Node, mut fields: VoteFields) -> Option<ClientEvent> {
        let project_id = self.project_id?;
        let Some(object) = self.votes.get(&node) else {
            debug!(%node, "update for unconfirmed or unknown vote node dropped");
            return None;
        };
        self.clamp_fields(
            ObjectKind::Vote,
            &object.base,
            &mut fields.x,
            &mut fields.y,
            &mut fields.width,
            &mut fields.height,
        );

        let object = self.votes.get_mut(&node)?;
        apply_box_fields(&mut object.base, fields.x, fields.y, fields.width, fields.height,
            fields.z_index);
        if let Some(title) = &fields.title {
            object.title.clone_from(title);
        }
        if let Some(options) = &fields.options {
            object.options.clone_from(options);
            object.ballots.clear();
            object.tally = vec![0; options.len()];
        }

        Some(ClientEvent::VoteEvent(VoteEvent {
            fnc: Fnc::Update,
            node: Some(node),
            project_id,
            correlation: None,
            fields,
        }))
    }

    /// Move/resize a confirmed object of any kind. Position and size are
    /// clamped to the viewport and the kind's minimum size.
    pub fn move_resize(
        &mut self,
        kind: ObjectKind,
        node: Node,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> Option<ClientEvent> {
        let project_id = self.project_id?;
        let (x, y, width, height) = self.clamp(kind, x, y, width, height);

        let base = match kind {
            ObjectKind::Text => self.texts.get_mut(&node).map(|o| &mut o.base),
            ObjectKind::Image => self.images.get_mut(&node).map(|o| &mut o.base),
            ObjectKind::Vote => self.votes.get_mut(&node).map(|o| &mut o.base),
        };
        let Some(base) = base else {
            debug!(%node, ?kind, "move for unconfirmed or unknown node dropped");
            return None;
        };
        base.x = x;
        base.y = y;
        base.width = width;
        base.height = height;

        Some(move_intent(kind, node, project_id, x, y, width, height))
    }

    /// Delete a confirmed object of any kind.
    pub fn delete(&mut self, kind: ObjectKind, node: Node) -> Option<ClientEvent> {
        let project_id = self.project_id?;
        let removed = match kind {
            ObjectKind::Text => self.texts.remove(&node).is_some(),
            ObjectKind::Image => self.images.remove(&node).is_some(),
            ObjectKind::Vote => self.votes.remove(&node).is_some(),
        };
        if !removed {
            debug!(%node, ?kind, "delete for unconfirmed or unknown node dropped");
            return None;
        }

        Some(match kind {
            ObjectKind::Text => ClientEvent::TextEvent(TextEvent {
                fnc: Fnc::Delete,
                node: Some(node),
                project_id,
                correlation: None,
                fields: TextFields::default(),
            }),
            ObjectKind::Image => ClientEvent::ImageEvent(ImageEvent {
                fnc: Fnc::Delete,
                node: Some(node),
                project_id,
                fields: ImageFields::default(),
            }),
            ObjectKind::Vote => ClientEvent::VoteEvent(VoteEvent {
                fnc: Fnc::Delete,
                node: Some(node),
                project_id,
                correlation: None,
                fields: VoteFields::default(),
            }),
        })
    }

    /// Re-stack a confirmed object. Used by the focus controller for
    /// bring-to-front; travels as an `update` carrying only `zIndex`.
    pub fn set_z_index(&mut self, kind: ObjectKind, node: Node, z_index: i64) -> Option<ClientEvent> {
        let project_id = self.project_id?;
        let base = match kind {
            ObjectKind::Text => self.texts.get_mut(&node).map(|o| &mut o.base),
            ObjectKind::Image => self.images.get_mut(&node).map(|o| &mut o.base),
            ObjectKind::Vote => self.votes.get_mut(&node).map(|o| &mut o.base),
        };
        let base = base?;
        base.z_index = z_index;

        Some(match kind {
            ObjectKind::Text => ClientEvent::TextEvent(TextEvent {
                fnc: Fnc::Update,
                node: Some(node),
                project_id,
                correlation: None,
                fields: TextFields { z_index: Some(z_index), ..TextFields::default() },
            }),
            ObjectKind::Image => ClientEvent::ImageEvent(ImageEvent {
                fnc: Fnc::Update,
                node: Some(node),
                project_id,
                fields: ImageFields { z_index: Some(z_index), ..ImageFields::default() },
            }),
            ObjectKind::Vote => ClientEvent::VoteEvent(VoteEvent {
                fnc: Fnc::Update,
                node: Some(node),
                project_id,
                correlation: None,
                fields: VoteFields { z_index: Some(z_index), ..VoteFields::default() },
            }),
        })
    }

    /// Cast, change, or retract a ballot (`option_index == 0` retracts).
    /// The tally is not touched locally; it arrives in the `choiceVote`
    /// broadcast.
    pub fn cast_ballot(&mut self, node: Node, option_index: u32) -> Option<ClientEvent> {
        let project_id = self.project_id?;
        if !self.votes.contains_key(&node) {
            debug!(%node, "ballot for unconfirmed or unknown vote node dropped");
            return None;
        }
        Some(ClientEvent::VoteEvent(VoteEvent {
            fnc: Fnc::Choice,
            node: Some(node),
            project_id,
            correlation: None,
            fields: VoteFields { option_index: Some(option_index), ..VoteFields::default() },
        }))
    }

    // =========================================================================
    // BROADCAST APPLICATION
    // =========================================================================

    /// Apply an authoritative broadcast. Idempotent by value; events whose
    /// node is unknown where a node is required are ignored.
    pub fn apply(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::AddTextBox { object, correlation } => {
                if let Some(correlation) = correlation {
                    self.pending_texts.remove(correlation);
                }
                self.texts.insert(object.base.node, object.clone());
            }
            ServerEvent::UpdateTextBox { object } => {
                self.texts.insert(object.base.node, object.clone());
            }
            ServerEvent::MoveTextBox(mv) => {
                if let Some(object) = self.texts.get_mut(&mv.node) {
                    apply_move(&mut object.base, mv.x, mv.y, mv.width, mv.height);
                }
            }
            ServerEvent::RemoveTextBox { node, .. } => {
                self.texts.remove(node);
            }

            ServerEvent::AddImage { object, correlation } => {
                if let Some(correlation) = correlation {
                    self.pending_images.remove(correlation);
                }
                self.images.insert(object.base.node, object.clone());
            }
            ServerEvent::UpdateImage { object } => {
                self.images.insert(object.base.node, object.clone());
            }
            ServerEvent::MoveImage(mv) => {
                if let Some(object) = self.images.get_mut(&mv.node) {
                    apply_move(&mut object.base, mv.x, mv.y, mv.width, mv.height);
                }
            }
            ServerEvent::RemoveImage { node, .. } => {
                self.images.remove(node);
            }

            ServerEvent::AddVote { object, correlation } => {
                if let Some(correlation) = correlation {
                    self.pending_votes.remove(correlation);
                }
                self.votes.insert(object.base.node, object.clone());
            }
            ServerEvent::UpdateVote { object } => {
                self.votes.insert(object.base.node, object.clone());
            }
            ServerEvent::MoveVote(mv) => {
                if let Some(object) = self.votes.get_mut(&mv.node) {
                    apply_move(&mut object.base, mv.x, mv.y, mv.width, mv.height);
                }
            }
            ServerEvent::RemoveVote { node, .. } => {
                self.votes.remove(node);
            }
            ServerEvent::ChoiceVote { node, tally, voter_id, option_index, .. } => {
                if let Some(object) = self.votes.get_mut(node) {
                    object.tally.clone_from(tally);
                    object.ballots.retain(|b| b.user_id != *voter_id);
                    if *option_index != 0 {
                        object.ballots.push(events::Ballot {
                            user_id: *voter_id,
                            option_index: *option_index,
                        });
                    }
                }
            }

            _ => {}
        }
    }

    /// Iterate all confirmed and pending objects as `(kind, base)` pairs,
    /// for hit-testing and rendering order.
    pub fn boxes(&self) -> impl Iterator<Item = (ObjectKind, &ObjectBox)> {
        let texts = self.texts.values().map(|o| (ObjectKind::Text, &o.base));
        let images = self.images.values().map(|o| (ObjectKind::Image, &o.base));
        let votes = self.votes.values().map(|o| (ObjectKind::Vote, &o.base));
        let pending = self
            .pending_texts
            .values()
            .map(|o| (ObjectKind::Text, &o.base))
            .chain(self.pending_images.values().map(|o| (ObjectKind::Image, &o.base)))
            .chain(self.pending_votes.values().map(|o| (ObjectKind::Vote, &o.base)));
        texts.chain(images).chain(votes).chain(pending)
    }

    // =========================================================================
    // INTERNAL
    // =========================================================================

    fn placeholder_box(
        &self,
        correlation: Uuid,
        project_id: Uuid,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> ObjectBox {
        // The correlation doubles as the placeholder node so pending objects
        // stay addressable by the renderer. Replaced on confirmation.
        ObjectBox {
            node: correlation,
            project_id,
            team_id: self.team_id,
            x,
            y,
            width,
            height,
            z_index: self.max_z() + 1,
        }
    }

    fn clamp(
        &self,
        kind: ObjectKind,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> (f64, f64, f64, f64) {
        let (min_w, min_h) = min_size(kind);
        let (vw, vh) = self.viewport;
        let width = width.max(min_w).min(vw);
        let height = height.max(min_h).min(vh);
        let x = x.clamp(0.0, (vw - width).max(0.0));
        let y = y.clamp(0.0, (vh - height).max(0.0));
        (x, y, width, height)
    }

    /// Clamp the box fields of a sparse update against the object's current
    /// box, filling in whichever of position/size the update omits.
    fn clamp_fields(
        &self,
        kind: ObjectKind,
        current: &ObjectBox,
        x: &mut Option<f64>,
        y: &mut Option<f64>,
        width: &mut Option<f64>,
        height: &mut Option<f64>,
    ) {
        if x.is_none() && y.is_none() && width.is_none() && height.is_none() {
            return;
        }
        let (cx, cy, cw, ch) = self.clamp(
            kind,
            x.unwrap_or(current.x),
            y.unwrap_or(current.y),
            width.unwrap_or(current.width),
            height.unwrap_or(current.height),
        );
        if x.is_some() {
            *x = Some(cx);
        }
        if y.is_some() {
            *y = Some(cy);
        }
        if width.is_some() {
            *width = Some(cw);
        }
        if height.is_some() {
            *height = Some(ch);
        }
    }
}

fn min_size(kind: ObjectKind) -> (f64, f64) {
    match kind {
        ObjectKind::Text => (consts::MIN_TEXT_WIDTH, consts::MIN_TEXT_HEIGHT),
        ObjectKind::Image => (consts::MIN_IMAGE_WIDTH, consts::MIN_IMAGE_HEIGHT),
        ObjectKind::Vote => (consts::MIN_VOTE_WIDTH, consts::MIN_VOTE_HEIGHT),
    }
}

fn move_intent(
    kind: ObjectKind,
    node: Node,
    project_id: Uuid,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
) -> ClientEvent {
    match kind {
        ObjectKind::Text => ClientEvent::TextEvent(TextEvent {
            fnc: Fnc::Move,
            node: Some(node),
            project_id,
            correlation: None,
            fields: TextFields {
                x: Some(x),
                y: Some(y),
                width: Some(width),
                height: Some(height),
                ..TextFields::default()
            },
        }),
        ObjectKind::Image => ClientEvent::ImageEvent(ImageEvent {
            fnc: Fnc::Move,
            node: Some(node),
            project_id,
            fields: ImageFields {
                x: Some(x),
                y: Some(y),
                width: Some(width),
                height: Some(height),
                ..ImageFields::default()
            },
        }),
        ObjectKind::Vote => ClientEvent::VoteEvent(VoteEvent {
            fnc: Fnc::Move,
            node: Some(node),
            project_id,
            correlation: None,
            fields: VoteFields {
                x: Some(x),
                y: Some(y),
                width: Some(width),
                height: Some(height),
                ..VoteFields::default()
            },
        }),
    }
}

fn apply_box_fields(
    base: &mut ObjectBox,
    x: Option<f64>,
    y: Option<f64>,
    width: Option<f64>,
    height: Option<f64>,
    z_index: Option<i64>,
) {
    if let Some(x) = x {
        base.x = x;
    }
    if let Some(y) = y {
        base.y = y;
    }
    if let Some(width) = width {
        base.width = width;
    }
    if let Some(height) = height {
        base.height = height;
    }
    if let Some(z) = z_index {
        base.z_index = z;
    }
}

fn apply_move(base: &mut ObjectBox, x: f64, y: f64, width: f64, height: f64) {
    base.x = x;
    base.y = y;
    base.width = width;
    base.height = height;
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
