//! Pointer-driven region editing.
//!
//! The [`Cursor`] is an explicit state machine (`idle`, `creating`, `editing`)
//! fed with [`PointerEvent`]s in screen space. In-progress geometry lives in
//! the cursor and is only pushed into the draft when it is finished, so an
//! abandoned stroke never reaches the draft. Edits of existing regions go
//! through [`DraftManager::mutate`] as they happen.
//!
//! Anything that cannot find a valid target (pointer outside the canvas, no
//! active region type, index out of range) is a no-op.

use serde::{Deserialize, Serialize};

use crate::constants::{mask, pointer};
use crate::model::{
    BoxGeometry, Dimensions, LabelDocument, LabelMap, Mask, Point, PolygonGeometry, Region,
    RegionGeometry, RegionKind,
};
use crate::raster;
use crate::state::DraftManager;
use crate::viewport::Viewport;

/// Interaction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorMode {
    #[default]
    Idle,
    Creating,
    Editing,
}

/// Kind of pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PointerKind {
    Down,
    Move,
    Up,
    DoubleClick,
    Leave,
}

/// A pointer event in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub x: f64,
    pub y: f64,
}

impl PointerEvent {
    pub fn new(kind: PointerKind, x: f64, y: f64) -> Self {
        Self { kind, x, y }
    }

    pub fn down(x: f64, y: f64) -> Self {
        Self::new(PointerKind::Down, x, y)
    }

    pub fn moved(x: f64, y: f64) -> Self {
        Self::new(PointerKind::Move, x, y)
    }

    pub fn up(x: f64, y: f64) -> Self {
        Self::new(PointerKind::Up, x, y)
    }

    pub fn double_click(x: f64, y: f64) -> Self {
        Self::new(PointerKind::DoubleClick, x, y)
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Keyboard commands that act on the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "key", content = "tool")]
pub enum KeyCommand {
    /// Abandon in-progress geometry and clear the selection.
    Cancel,
    /// Delete the selected region.
    DeleteRegion,
    /// Switch tool; `None` disables region drawing.
    SelectTool(Option<RegionKind>),
    /// Switch mask painting between paint and erase.
    ToggleErase,
    /// Finish an in-progress polygon.
    ClosePolygon,
}

/// Tunables for pointer interaction, in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorOptions {
    pub hit_tolerance: f64,
    pub close_tolerance: f64,
    pub brush_radius: f64,
}

impl Default for CursorOptions {
    fn default() -> Self {
        Self {
            hit_tolerance: pointer::HIT_TOLERANCE,
            close_tolerance: pointer::POLYGON_CLOSE_TOLERANCE,
            brush_radius: mask::BRUSH_RADIUS,
        }
    }
}

/// Interaction state for the open item.
#[derive(Debug, Clone, Default)]
pub struct Cursor {
    pub mode: CursorMode,
    pub region_type: Option<RegionKind>,
    /// Selected region within `region_type`.
    pub region_index: Option<usize>,
    /// Grabbed corner or vertex while editing.
    pub vertex_index: Option<usize>,
    /// Last pointer position in normalized media space, `None` off-canvas.
    pub coords: Option<Point>,
    /// Normalized position where the current drag started.
    pub drag_origin: Option<Point>,
    /// Mask painting erases instead of painting.
    pub erase: bool,
    /// Geometry being created, not yet part of the draft.
    pending: Option<RegionGeometry>,
    options: CursorOptions,
}

impl Cursor {
    pub fn new(options: CursorOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    pub fn options(&self) -> &CursorOptions {
        &self.options
    }

    /// Geometry currently being drawn.
    pub fn pending(&self) -> Option<&RegionGeometry> {
        self.pending.as_ref()
    }

    /// Switch the active region type; abandons anything in progress.
    pub fn set_region_type(&mut self, region_type: Option<RegionKind>) {
        if self.region_type != region_type {
            log::debug!("Cursor tool: {:?} -> {:?}", self.region_type, region_type);
            self.abandon();
            self.region_index = None;
            self.region_type = region_type;
        }
    }

    /// Select an existing region of the active type (or clear the selection).
    pub fn select_region(&mut self, index: Option<usize>) {
        self.abandon();
        self.region_index = index;
    }

    /// Drop in-progress geometry and return to idle without touching the draft.
    pub fn abandon(&mut self) {
        if self.pending.take().is_some() {
            log::debug!("Abandoned in-progress {:?} region", self.region_type);
        }
        self.mode = CursorMode::Idle;
        self.vertex_index = None;
        self.drag_origin = None;
    }

    /// Forget everything tied to the current item, keeping the tool choice.
    pub fn reset_for_item(&mut self) {
        self.abandon();
        self.region_index = None;
        self.coords = None;
    }

    /// Process one pointer event. Returns `true` if the draft or cursor changed.
    ///
    /// `canvas` is the bitmap size used for newly created masks.
    pub fn handle_pointer(
        &mut self,
        event: PointerEvent,
        viewport: &Viewport,
        canvas: Dimensions,
        draft: &mut DraftManager,
    ) -> bool {
        if !viewport.is_valid() {
            return false;
        }
        let screen = event.position();
        let inside = viewport.contains(screen);
        let media = viewport.to_media(screen);
        self.coords = inside.then_some(media);

        let Some(kind) = self.region_type else {
            return false;
        };

        log::trace!(
            "Pointer {:?} at ({:.1}, {:.1}) mode={:?} tool={:?}",
            event.kind,
            screen.x,
            screen.y,
            self.mode,
            kind
        );

        match event.kind {
            PointerKind::Leave => {
                self.coords = None;
                true
            }
            PointerKind::Down if !inside && self.mode == CursorMode::Idle => false,
            PointerKind::Down => match kind {
                RegionKind::Box => self.box_down(screen, media, viewport, draft),
                RegionKind::Polygon => self.polygon_down(screen, media, viewport, draft),
                RegionKind::Mask => self.mask_down(media, viewport, canvas, draft),
            },
            PointerKind::Move => self.drag(kind, media.clamped(), viewport, draft),
            PointerKind::Up => self.release(kind, draft),
            PointerKind::DoubleClick => {
                if kind == RegionKind::Polygon && self.mode == CursorMode::Creating {
                    self.finish_polygon(draft)
                } else {
                    false
                }
            }
        }
    }

    /// Process a keyboard command.
    pub fn handle_key(&mut self, key: KeyCommand, draft: &mut DraftManager) -> bool {
        match key {
            KeyCommand::Cancel => {
                let changed = self.pending.is_some() || self.region_index.is_some();
                self.abandon();
                self.region_index = None;
                changed
            }
            KeyCommand::DeleteRegion => {
                let (Some(kind), Some(index)) = (self.region_type, self.region_index) else {
                    return false;
                };
                if index >= draft.labels().region_count(kind) {
                    return false;
                }
                self.abandon();
                draft.mutate(|doc| {
                    doc.remove_region(kind, index);
                });
                self.region_index = None;
                log::debug!("Deleted {} region {}", kind.name(), index);
                true
            }
            KeyCommand::SelectTool(kind) => {
                let changed = self.region_type != kind;
                self.set_region_type(kind);
                changed
            }
            KeyCommand::ToggleErase => {
                self.erase = !self.erase;
                log::debug!("Mask erase: {}", self.erase);
                true
            }
            KeyCommand::ClosePolygon => {
                if self.region_type == Some(RegionKind::Polygon)
                    && self.mode == CursorMode::Creating
                {
                    self.finish_polygon(draft)
                } else {
                    false
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Boxes
    // ------------------------------------------------------------------------

    fn box_down(
        &mut self,
        screen: Point,
        media: Point,
        viewport: &Viewport,
        draft: &DraftManager,
    ) -> bool {
        if self.mode != CursorMode::Idle {
            return false;
        }
        let grabbed = draft
            .labels()
            .boxes
            .iter()
            .enumerate()
            .rev()
            .find_map(|(i, b)| {
                b.geometry
                    .hit_test(screen, viewport, self.options.hit_tolerance)
                    .map(|corner| (i, corner))
            });

        if let Some((index, corner)) = grabbed {
            log::debug!("Editing box {} corner {}", index, corner);
            self.begin_edit(index, corner, media);
        } else {
            log::debug!("Creating box at ({:.3}, {:.3})", media.x, media.y);
            self.mode = CursorMode::Creating;
            self.region_index = None;
            self.drag_origin = Some(media);
            self.pending = Some(RegionGeometry::Box(BoxGeometry::new(media, media)));
        }
        true
    }

    // ------------------------------------------------------------------------
    // Polygons
    // ------------------------------------------------------------------------

    fn polygon_down(
        &mut self,
        screen: Point,
        media: Point,
        viewport: &Viewport,
        draft: &mut DraftManager,
    ) -> bool {
        match self.mode {
            CursorMode::Creating => {
                let Some(RegionGeometry::Polygon(poly)) = &mut self.pending else {
                    return false;
                };
                let closes = poly.points.first().is_some_and(|first| {
                    viewport.to_screen(*first).distance_to(&screen) <= self.options.close_tolerance
                });
                if closes && poly.points.len() > 1 {
                    return self.finish_polygon(draft);
                }
                poly.points.push(media.clamped());
                true
            }
            CursorMode::Editing => false,
            CursorMode::Idle => {
                let grabbed = draft
                    .labels()
                    .polygons
                    .iter()
                    .enumerate()
                    .rev()
                    .find_map(|(i, p)| {
                        p.geometry
                            .hit_test(screen, viewport, self.options.hit_tolerance)
                            .map(|vertex| (i, vertex))
                    });

                if let Some((index, vertex)) = grabbed {
                    log::debug!("Editing polygon {} vertex {}", index, vertex);
                    self.begin_edit(index, vertex, media);
                } else {
                    log::debug!("Creating polygon at ({:.3}, {:.3})", media.x, media.y);
                    self.mode = CursorMode::Creating;
                    self.region_index = None;
                    self.drag_origin = Some(media);
                    self.pending = Some(RegionGeometry::Polygon(PolygonGeometry::new(vec![
                        media.clamped(),
                    ])));
                }
                true
            }
        }
    }

    fn finish_polygon(&mut self, draft: &mut DraftManager) -> bool {
        let Some(RegionGeometry::Polygon(poly)) = self.pending.take() else {
            return false;
        };
        self.mode = CursorMode::Idle;
        self.drag_origin = None;

        let poly = poly.to_normalized(None);
        if let Err(e) = poly.validate() {
            log::debug!("Discarding polygon: {}", e);
            return true;
        }
        self.push_to_draft(RegionGeometry::Polygon(poly), draft);
        true
    }

    // ------------------------------------------------------------------------
    // Masks
    // ------------------------------------------------------------------------

    fn mask_down(
        &mut self,
        media: Point,
        viewport: &Viewport,
        canvas: Dimensions,
        draft: &DraftManager,
    ) -> bool {
        if self.mode != CursorMode::Idle {
            return false;
        }
        // Strokes accumulate on the selected mask; otherwise start a new one.
        let target = self
            .region_index
            .and_then(|i| draft.labels().masks.get(i))
            .map(|m| m.geometry.clone());
        if target.is_none() {
            self.region_index = None;
        }
        let mut bitmap = target.unwrap_or_else(|| Mask::empty(canvas));

        paint_stroke(&mut bitmap, media, viewport, self.options.brush_radius, self.erase);
        log::debug!(
            "Mask stroke started on {:?} ({}x{})",
            self.region_index,
            bitmap.dimensions.width,
            bitmap.dimensions.height
        );
        self.mode = CursorMode::Creating;
        self.drag_origin = Some(media);
        self.pending = Some(RegionGeometry::Mask(bitmap));
        true
    }

    // ------------------------------------------------------------------------
    // Shared
    // ------------------------------------------------------------------------

    fn begin_edit(&mut self, index: usize, vertex: usize, media: Point) {
        self.mode = CursorMode::Editing;
        self.region_index = Some(index);
        self.vertex_index = Some(vertex);
        self.drag_origin = Some(media);
    }

    fn drag(
        &mut self,
        kind: RegionKind,
        media: Point,
        viewport: &Viewport,
        draft: &mut DraftManager,
    ) -> bool {
        match self.mode {
            CursorMode::Idle => self.coords.is_some(),
            CursorMode::Creating => match &mut self.pending {
                Some(RegionGeometry::Box(b)) => {
                    b.pt2 = media;
                    true
                }
                Some(RegionGeometry::Mask(bitmap)) => {
                    paint_stroke(bitmap, media, viewport, self.options.brush_radius, self.erase);
                    true
                }
                // Polygons only move the preview point.
                Some(RegionGeometry::Polygon(_)) => true,
                None => false,
            },
            CursorMode::Editing => {
                let (Some(index), Some(vertex)) = (self.region_index, self.vertex_index) else {
                    return false;
                };
                if index >= draft.labels().region_count(kind) {
                    return false;
                }
                draft.mutate(|doc| move_vertex(doc, kind, index, vertex, media));
                true
            }
        }
    }

    fn release(&mut self, kind: RegionKind, draft: &mut DraftManager) -> bool {
        match self.mode {
            CursorMode::Idle => false,
            CursorMode::Editing => {
                if let (RegionKind::Box, Some(index)) = (kind, self.region_index) {
                    draft.mutate(|doc| {
                        if let Some(b) = doc.boxes.get_mut(index) {
                            b.geometry = b.geometry.to_normalized(None);
                        }
                    });
                }
                log::debug!("Finished editing {} {:?}", kind.name(), self.region_index);
                self.mode = CursorMode::Idle;
                self.vertex_index = None;
                self.drag_origin = None;
                true
            }
            CursorMode::Creating => match self.pending.take() {
                Some(RegionGeometry::Box(b)) => {
                    self.mode = CursorMode::Idle;
                    self.drag_origin = None;
                    let b = b.to_normalized(None);
                    match b.validate() {
                        Ok(()) => self.push_to_draft(RegionGeometry::Box(b), draft),
                        Err(e) => log::debug!("Discarding box: {}", e),
                    }
                    true
                }
                Some(RegionGeometry::Mask(bitmap)) => {
                    self.mode = CursorMode::Idle;
                    self.drag_origin = None;
                    match self.region_index {
                        Some(index) if index < draft.labels().masks.len() => {
                            draft.mutate(|doc| doc.masks[index].geometry = bitmap);
                        }
                        _ => self.push_to_draft(RegionGeometry::Mask(bitmap), draft),
                    }
                    true
                }
                // Polygons stay open until closed explicitly.
                pending @ Some(RegionGeometry::Polygon(_)) => {
                    self.pending = pending;
                    false
                }
                None => {
                    self.mode = CursorMode::Idle;
                    false
                }
            },
        }
    }

    fn push_to_draft(&mut self, geometry: RegionGeometry, draft: &mut DraftManager) {
        let mut added = None;
        draft.mutate(|doc| added = Some(doc.push_region(LabelMap::new(), geometry)));
        if let Some((kind, index)) = added {
            log::debug!("Added {} region {} to draft", kind.name(), index);
            self.region_index = Some(index);
        }
    }
}

/// Paint (or erase) one brush dab. The radius is given in screen pixels.
fn paint_stroke(bitmap: &mut Mask, media: Point, viewport: &Viewport, radius: f64, erase: bool) {
    let radius = viewport.screen_length_to_pixels(radius, bitmap.dimensions);
    let value = if erase { mask::OFF } else { mask::ON };
    let center = bitmap.pixel_at(media);
    raster::paint_disc(bitmap, center, radius, value);
}

fn move_vertex(doc: &mut LabelDocument, kind: RegionKind, index: usize, vertex: usize, to: Point) {
    match kind {
        RegionKind::Box => {
            if let Some(b) = doc.boxes.get_mut(index) {
                b.geometry.move_corner(vertex, to);
            }
        }
        RegionKind::Polygon => {
            if let Some(p) = doc
                .polygons
                .get_mut(index)
                .and_then(|p| p.geometry.points.get_mut(vertex))
            {
                *p = to;
            }
        }
        RegionKind::Mask => {}
    }
}
