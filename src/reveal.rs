//! Before/after reveal control
//!
//! A split view with a draggable divider: the "before" image shows left of
//! the divider and the "after" image to its right. While a drag is active the
//! control listens at the document level, so the drag ends on a pointer
//! release anywhere and not only over the control. The control is purely
//! presentational and never touches session state.

use crate::error::Result;
use crate::image_handle::ImageHandle;
use crate::tracing_config::spans;
use image::{imageops, DynamicImage, Rgba, RgbaImage};
use std::sync::{Arc, Mutex, MutexGuard};

/// Initial divider position
pub const DEFAULT_SPLIT_PERCENT: f64 = 50.0;

/// Label of the left half
pub const BEFORE_LABEL: &str = "Original";

/// Label of the right half
pub const AFTER_LABEL: &str = "Removed BG";

/// Edge length of a checkerboard square in the composite, in pixels
pub const CHECKER_TILE: u32 = 20;

/// Width of the divider line in the composite, in pixels
pub const DIVIDER_WIDTH: u32 = 2;

const CHECKER_DARK: Rgba<u8> = Rgba([0x1f, 0x1f, 0x1f, 0xff]);
const CHECKER_LIGHT: Rgba<u8> = Rgba([0x2a, 0x2a, 0x2a, 0xff]);
const DIVIDER_COLOR: Rgba<u8> = Rgba([0xff, 0xff, 0xff, 0xff]);

/// Horizontal extent of the control on screen
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Left edge in client coordinates
    pub left: f64,
    /// Width in client coordinates
    pub width: f64,
}

impl Bounds {
    /// Bounds starting at `left` spanning `width`
    #[must_use]
    pub fn new(left: f64, width: f64) -> Self {
        Self { left, width }
    }

    /// Pointer position as a percentage of the width, clamped to [0, 100]
    ///
    /// Returns `None` for a collapsed control or non-finite geometry.
    #[must_use]
    pub fn percent_at(&self, client_x: f64) -> Option<f64> {
        let finite = self.width.is_finite() && self.left.is_finite() && client_x.is_finite();
        if !finite || self.width <= 0.0 {
            return None;
        }
        let x = (client_x - self.left).clamp(0.0, self.width);
        let percent = x / self.width * 100.0;
        percent.is_finite().then_some(percent)
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::new(0.0, 100.0)
    }
}

/// Device that produced a pointer event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerSource {
    /// Mouse
    Mouse,
    /// Touch screen; the first touch point is used
    Touch,
}

/// Kind of pointer event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    /// mousedown / touchstart
    Down,
    /// mousemove / touchmove
    Move,
    /// mouseup / touchend
    Up,
    /// touchcancel, or the pointer was lost
    Cancel,
}

/// Element the event was dispatched on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerTarget {
    /// The divider handle
    Handle,
    /// Anywhere else inside the control
    Control,
    /// Outside the control
    Document,
}

/// Pointer input delivered to the control
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    /// Event kind
    pub phase: PointerPhase,
    /// Input device
    pub source: PointerSource,
    /// Horizontal client coordinate, absent for touch releases without points
    pub client_x: Option<f64>,
    /// Element the event was dispatched on
    pub target: PointerTarget,
}

impl PointerEvent {
    /// Mouse event at `client_x`
    #[must_use]
    pub fn mouse(phase: PointerPhase, client_x: f64, target: PointerTarget) -> Self {
        Self {
            phase,
            source: PointerSource::Mouse,
            client_x: Some(client_x),
            target,
        }
    }

    /// Touch event; only the first of `touch_points` is considered
    #[must_use]
    pub fn touch(phase: PointerPhase, touch_points: &[f64], target: PointerTarget) -> Self {
        Self {
            phase,
            source: PointerSource::Touch,
            client_x: touch_points.first().copied(),
            target,
        }
    }
}

/// Document-level listener kinds attached while dragging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    /// `mousemove`
    MouseMove,
    /// `mouseup`
    MouseUp,
    /// `touchmove`
    TouchMove,
    /// `touchend`
    TouchEnd,
    /// `touchcancel`
    TouchCancel,
}

impl ListenerKind {
    /// Every listener a drag attaches
    pub const DRAG: [Self; 5] = [
        Self::MouseMove,
        Self::MouseUp,
        Self::TouchMove,
        Self::TouchEnd,
        Self::TouchCancel,
    ];
}

/// Identifier of an attached listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Debug, Default)]
struct ListenerTable {
    next_id: u64,
    attached: Vec<(ListenerId, ListenerKind)>,
}

/// Table of listeners attached at the document level
///
/// Clones share the same table, the way every component of a page shares
/// one document.
#[derive(Debug, Clone, Default)]
pub struct DocumentListeners {
    table: Arc<Mutex<ListenerTable>>,
}

impl DocumentListeners {
    /// Empty listener table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ListenerTable> {
        self.table
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Attach a listener
    pub fn attach(&self, kind: ListenerKind) -> ListenerId {
        let mut table = self.lock();
        let id = ListenerId(table.next_id);
        table.next_id += 1;
        table.attached.push((id, kind));
        id
    }

    /// Detach a listener; returns `false` if it was not attached
    pub fn detach(&self, id: ListenerId) -> bool {
        let mut table = self.lock();
        let before = table.attached.len();
        table.attached.retain(|(attached, _)| *attached != id);
        table.attached.len() != before
    }

    /// Number of attached listeners
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().attached.len()
    }

    /// Whether no listener is attached
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().attached.is_empty()
    }

    /// Whether a listener of `kind` is attached
    #[must_use]
    pub fn has(&self, kind: ListenerKind) -> bool {
        self.lock().attached.iter().any(|(_, k)| *k == kind)
    }
}

/// An active drag; its document listeners are detached when it is dropped
#[derive(Debug)]
pub struct DragSession {
    listeners: DocumentListeners,
    ids: Vec<ListenerId>,
    source: PointerSource,
}

impl DragSession {
    fn begin(listeners: &DocumentListeners, source: PointerSource) -> Self {
        let ids = ListenerKind::DRAG
            .iter()
            .map(|kind| listeners.attach(*kind))
            .collect();
        log::trace!("Drag started ({:?})", source);
        Self {
            listeners: listeners.clone(),
            ids,
            source,
        }
    }

    /// Device that started the drag
    #[must_use]
    pub fn source(&self) -> PointerSource {
        self.source
    }
}

impl Drop for DragSession {
    fn drop(&mut self) {
        for id in self.ids.drain(..) {
            self.listeners.detach(id);
        }
        log::trace!("Drag ended");
    }
}

/// Positions of the two halves and the divider, in client coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RevealLayout {
    /// Divider position
    pub divider_x: f64,
    /// Visible width of the "before" image
    pub before_width: f64,
    /// Visible width of the "after" image
    pub after_width: f64,
}

/// Draggable before/after comparison
#[derive(Debug)]
pub struct RevealControl {
    before: ImageHandle,
    after: ImageHandle,
    split_percent: f64,
    bounds: Bounds,
    listeners: DocumentListeners,
    drag: Option<DragSession>,
}

impl RevealControl {
    /// Control comparing `before` and `after`, split at 50%
    #[must_use]
    pub fn new(before: ImageHandle, after: ImageHandle, listeners: DocumentListeners) -> Self {
        Self {
            before,
            after,
            split_percent: DEFAULT_SPLIT_PERCENT,
            bounds: Bounds::default(),
            listeners,
            drag: None,
        }
    }

    /// Image left of the divider
    #[must_use]
    pub fn before(&self) -> &ImageHandle {
        &self.before
    }

    /// Image right of the divider
    #[must_use]
    pub fn after(&self) -> &ImageHandle {
        &self.after
    }

    /// Divider position as a percentage of the width
    #[must_use]
    pub fn split_percent(&self) -> f64 {
        self.split_percent
    }

    /// Move the divider, clamping to [0, 100]; non-finite values are ignored
    pub fn set_split(&mut self, percent: f64) {
        if percent.is_finite() {
            self.split_percent = percent.clamp(0.0, 100.0);
        }
    }

    /// Current on-screen bounds
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Update the on-screen bounds, e.g. after a resize
    pub fn set_bounds(&mut self, bounds: Bounds) {
        self.bounds = bounds;
    }

    /// Whether a drag is active
    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Labels of the left and right halves
    #[must_use]
    pub fn labels(&self) -> (&'static str, &'static str) {
        (BEFORE_LABEL, AFTER_LABEL)
    }

    /// Feed a pointer event; returns whether the divider moved or the drag state changed
    ///
    /// Mouse and touch events are handled identically. A drag starts on a
    /// press over the handle. While dragging, moves anywhere in the document
    /// move the divider and a release or cancel anywhere ends the drag.
    pub fn handle_event(&mut self, event: &PointerEvent) -> bool {
        match event.phase {
            PointerPhase::Down => {
                if event.target != PointerTarget::Handle || self.drag.is_some() {
                    return false;
                }
                self.drag = Some(DragSession::begin(&self.listeners, event.source));
                true
            },
            PointerPhase::Move => {
                if self.drag.is_none() {
                    return false;
                }
                let Some(percent) = event.client_x.and_then(|x| self.bounds.percent_at(x)) else {
                    return false;
                };
                let changed = (percent - self.split_percent).abs() > f64::EPSILON;
                self.split_percent = percent;
                changed
            },
            PointerPhase::Up | PointerPhase::Cancel => self.end_drag(),
        }
    }

    /// End any active drag; returns whether one was active
    pub fn end_drag(&mut self) -> bool {
        self.drag.take().is_some()
    }

    /// Current layout in client coordinates
    #[must_use]
    pub fn layout(&self) -> RevealLayout {
        let before_width = self.bounds.width * self.split_percent / 100.0;
        RevealLayout {
            divider_x: self.bounds.left + before_width,
            before_width,
            after_width: self.bounds.width - before_width,
        }
    }

    /// Render the comparison at the current split
    ///
    /// # Errors
    /// - Either image cannot be decoded
    pub fn render(&self) -> Result<RgbaImage> {
        let before = self.before.decode()?;
        let after = self.after.decode()?;
        Ok(compose(&before, &after, self.split_percent))
    }
}

fn checker_color(x: u32, y: u32) -> Rgba<u8> {
    if (x / CHECKER_TILE + y / CHECKER_TILE) % 2 == 0 {
        CHECKER_DARK
    } else {
        CHECKER_LIGHT
    }
}

fn blend_over(src: Rgba<u8>, backdrop: Rgba<u8>) -> Rgba<u8> {
    let alpha = u32::from(src[3]);
    let mix = |s: u8, b: u8| ((u32::from(s) * alpha + u32::from(b) * (255 - alpha) + 127) / 255) as u8;
    Rgba([
        mix(src[0], backdrop[0]),
        mix(src[1], backdrop[1]),
        mix(src[2], backdrop[2]),
        0xff,
    ])
}

/// Render a before/after composite
///
/// The output has the dimensions of `before`; `after` is resized to match
/// when needed. Both halves are drawn over a checkerboard so transparent
/// regions stay visible, and a white divider marks the split.
#[must_use]
pub fn compose(before: &DynamicImage, after: &DynamicImage, split_percent: f64) -> RgbaImage {
    let before = before.to_rgba8();
    let (width, height) = before.dimensions();
    let split_percent = if split_percent.is_finite() {
        split_percent.clamp(0.0, 100.0)
    } else {
        DEFAULT_SPLIT_PERCENT
    };

    let _span = spans::reveal_export((width, height), split_percent).entered();

    let after = if after.width() == width && after.height() == height {
        after.to_rgba8()
    } else {
        log::debug!(
            "Resizing result from {}x{} to {}x{}",
            after.width(),
            after.height(),
            width,
            height
        );
        imageops::resize(&after.to_rgba8(), width, height, imageops::FilterType::Triangle)
    };

    let split_x = (f64::from(width) * split_percent / 100.0).round() as u32;
    let divider_start = split_x.saturating_sub(DIVIDER_WIDTH / 2);
    let divider_end = (divider_start + DIVIDER_WIDTH).min(width);

    RgbaImage::from_fn(width, height, |x, y| {
        if (divider_start..divider_end).contains(&x) {
            DIVIDER_COLOR
        } else if x < split_x {
            blend_over(*before.get_pixel(x, y), checker_color(x, y))
        } else {
            blend_over(*after.get_pixel(x, y), checker_color(x, y))
        }
    })
}
