use std::collections::HashMap;

use crossterm::event::{KeyEvent, MouseEvent};
use ratatui::buffer::Buffer;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Text};
use smol_str::SmolStr;

use crate::docs::DocStore;
use crate::editor::EditorWindow;
use crate::keys::KeyMap;
use crate::logbuf::LogBuffer;
use crate::tracer::TracerStack;
use crate::vars_pane::VarsMode;

/// Shared state pane contents borrow while rendering or handling input.
/// Panes never own application records; they look them up by token.
pub struct PaneCtx<'a> {
    pub editors: &'a mut HashMap<i64, EditorWindow>,
    pub tracer: &'a TracerStack,
    pub log: &'a LogBuffer,
    pub keys: &'a KeyMap,
    pub docs: Option<&'a DocStore>,
    pub accent: Color,
}

/// Tracer commands, named after the protocol messages they become.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracerCommand {
    StepInto,
    StepOver,
    StepOut,
    Resume,
    ResumeAll,
    Backward,
    Forward,
}

impl TracerCommand {
    pub fn message_name(self) -> &'static str {
        match self {
            TracerCommand::StepInto => "StepInto",
            TracerCommand::StepOver => "RunCurrentLine",
            TracerCommand::StepOut => "ContinueTrace",
            TracerCommand::Resume => "Continue",
            TracerCommand::ResumeAll => "RestartThreads",
            TracerCommand::Backward => "TraceBackward",
            TracerCommand::Forward => "TraceForward",
        }
    }
}

/// One-shot requests a pane hands back to the dispatcher instead of
/// calling into the application directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaneRequest {
    CloseEditor(i64),
    SaveEditor(i64),
    Tracer(TracerCommand, i64),
    /// A command-palette choice.
    Action(SmolStr),
    /// A symbol-search choice.
    InsertGlyph(char),
    /// An idiom-search choice.
    InsertText(String),
    /// A stack-pane choice.
    SurfaceFrame(i64),
    /// A variables-pane choice.
    OpenVariable(String),
    RefreshVariables(VarsMode),
    Autocomplete {
        token: i64,
        line: String,
        pos: usize,
    },
}

#[derive(Debug, Default)]
pub struct KeyOutcome {
    pub consumed: bool,
    pub request: Option<PaneRequest>,
}

impl KeyOutcome {
    pub fn consumed() -> Self {
        Self {
            consumed: true,
            request: None,
        }
    }

    pub fn ignored() -> Self {
        Self::default()
    }

    pub fn request(request: PaneRequest) -> Self {
        Self {
            consumed: true,
            request: Some(request),
        }
    }
}

/// The capability set a floating pane's content implements.
pub trait PaneContent {
    fn title(&self, ctx: &PaneCtx<'_>) -> String;
    fn render(&mut self, w: u16, h: u16, ctx: &mut PaneCtx<'_>) -> Text<'static>;
    fn handle_key(&mut self, key: KeyEvent, ctx: &mut PaneCtx<'_>) -> KeyOutcome;
    fn handle_mouse(&mut self, x: u16, y: u16, event: MouseEvent, ctx: &mut PaneCtx<'_>)
        -> Option<PaneRequest>;
    /// Downcast hook so the dispatcher can hand async results (fetched
    /// idioms, captured variables) to the concrete pane.
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    Move,
    ResizeN,
    ResizeS,
    ResizeE,
    ResizeW,
    ResizeNe,
    ResizeNw,
    ResizeSe,
    ResizeSw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitZone {
    None,
    /// The top edge; dragging it moves the pane.
    TitleBar,
    Content,
    EdgeN,
    EdgeS,
    EdgeE,
    EdgeW,
    CornerNe,
    CornerNw,
    CornerSe,
    CornerSw,
}

pub fn zone_to_drag_mode(zone: HitZone) -> Option<DragMode> {
    match zone {
        HitZone::TitleBar => Some(DragMode::Move),
        HitZone::EdgeN => Some(DragMode::ResizeN),
        HitZone::EdgeS => Some(DragMode::ResizeS),
        HitZone::EdgeE => Some(DragMode::ResizeE),
        HitZone::EdgeW => Some(DragMode::ResizeW),
        HitZone::CornerNe => Some(DragMode::ResizeNe),
        HitZone::CornerNw => Some(DragMode::ResizeNw),
        HitZone::CornerSe => Some(DragMode::ResizeSe),
        HitZone::CornerSw => Some(DragMode::ResizeSw),
        HitZone::None | HitZone::Content => None,
    }
}

#[derive(Debug, Clone, Copy)]
struct DragState {
    mode: DragMode,
    start_x: i32,
    start_y: i32,
    offset_x: i32,
    offset_y: i32,
}

/// A floating pane: geometry plus boxed content.
pub struct Pane {
    pub id: SmolStr,
    pub x: i32,
    pub y: i32,
    pub width: u16,
    pub height: u16,
    pub min_width: u16,
    pub min_height: u16,
    pub focused: bool,
    pub content: Box<dyn PaneContent>,
    drag: Option<DragState>,
}

impl Pane {
    pub fn new(id: impl Into<SmolStr>, content: Box<dyn PaneContent>, x: i32, y: i32, w: u16, h: u16) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            width: w.max(20),
            height: h.max(5),
            min_width: 20,
            min_height: 5,
            focused: false,
            content,
            drag: None,
        }
    }

    pub fn hit_zone(&self, x: i32, y: i32) -> HitZone {
        let w = self.width as i32;
        let h = self.height as i32;
        if x < self.x || x >= self.x + w || y < self.y || y >= self.y + h {
            return HitZone::None;
        }
        let rel_x = x - self.x;
        let rel_y = y - self.y;

        match (rel_x, rel_y) {
            (0, 0) => HitZone::CornerNw,
            (rx, 0) if rx == w - 1 => HitZone::CornerNe,
            (0, ry) if ry == h - 1 => HitZone::CornerSw,
            (rx, ry) if rx == w - 1 && ry == h - 1 => HitZone::CornerSe,
            (_, 0) => HitZone::TitleBar,
            (_, ry) if ry == h - 1 => HitZone::EdgeS,
            (0, _) => HitZone::EdgeW,
            (rx, _) if rx == w - 1 => HitZone::EdgeE,
            _ => HitZone::Content,
        }
    }

    pub fn start_drag(&mut self, mode: DragMode, mouse_x: i32, mouse_y: i32) {
        self.drag = Some(DragState {
            mode,
            start_x: mouse_x,
            start_y: mouse_y,
            offset_x: mouse_x - self.x,
            offset_y: mouse_y - self.y,
        });
    }

    pub fn dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn stop_drag(&mut self) {
        self.drag = None;
    }

    /// Track pointer motion during a drag, respecting minimum sizes and
    /// keeping at least five columns and the title row on screen.
    pub fn update_drag(&mut self, mouse_x: i32, mouse_y: i32, screen_w: u16, screen_h: u16) {
        let Some(mut drag) = self.drag else {
            return;
        };
        let min_w = self.min_width as i32;
        let min_h = self.min_height as i32;

        match drag.mode {
            DragMode::Move => {
                let new_x = mouse_x - drag.offset_x;
                let new_y = mouse_y - drag.offset_y;
                self.x = new_x.clamp(-(self.width as i32) + 5, screen_w as i32 - 5);
                self.y = new_y.clamp(0, screen_h as i32 - 1);
            }
            DragMode::ResizeE => {
                self.width = (mouse_x - self.x + 1).max(min_w) as u16;
            }
            DragMode::ResizeS => {
                self.height = (mouse_y - self.y + 1).max(min_h) as u16;
            }
            DragMode::ResizeW => {
                let new_w = self.width as i32 + (drag.start_x - mouse_x);
                if new_w >= min_w {
                    self.x = mouse_x;
                    self.width = new_w as u16;
                    drag.start_x = mouse_x;
                }
            }
            DragMode::ResizeN => {
                let new_h = self.height as i32 + (drag.start_y - mouse_y);
                if new_h >= min_h {
                    self.y = mouse_y;
                    self.height = new_h as u16;
                    drag.start_y = mouse_y;
                }
            }
            DragMode::ResizeSe => {
                self.width = (mouse_x - self.x + 1).max(min_w) as u16;
                self.height = (mouse_y - self.y + 1).max(min_h) as u16;
            }
            DragMode::ResizeSw => {
                let new_w = self.x + self.width as i32 - mouse_x;
                if new_w >= min_w {
                    self.x = mouse_x;
                    self.width = new_w as u16;
                }
                self.height = (mouse_y - self.y + 1).max(min_h) as u16;
            }
            DragMode::ResizeNe => {
                self.width = (mouse_x - self.x + 1).max(min_w) as u16;
                let new_h = self.height as i32 + (drag.start_y - mouse_y);
                if new_h >= min_h {
                    self.y = mouse_y;
                    self.height = new_h as u16;
                    drag.start_y = mouse_y;
                }
            }
            DragMode::ResizeNw => {
                let new_w = self.width as i32 + (drag.start_x - mouse_x);
                if new_w >= min_w {
                    self.x = mouse_x;
                    self.width = new_w as u16;
                    drag.start_x = mouse_x;
                }
                let new_h = self.height as i32 + (drag.start_y - mouse_y);
                if new_h >= min_h {
                    self.y = mouse_y;
                    self.height = new_h as u16;
                    drag.start_y = mouse_y;
                }
            }
        }
        self.drag = Some(drag);
    }

    /// Draw border, title and content into the screen buffer, clipping at
    /// the screen edges. Later panes overwrite earlier cells.
    fn draw(&mut self, buf: &mut Buffer, ctx: &mut PaneCtx<'_>) {
        // Doubled box for the focused pane, single otherwise.
        let (tl, tr, bl, br, hline, vline) = if self.focused {
            ("╔", "╗", "╚", "╝", "═", "║")
        } else {
            ("┌", "┐", "└", "┘", "─", "│")
        };
        let border_style = Style::default();
        let title_style = if self.focused {
            Style::default().add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };

        let content_w = (self.width.saturating_sub(2)).max(1);
        let content_h = (self.height.saturating_sub(2)).max(1);

        let mut title = self.content.title(ctx);
        let max_title = content_w.saturating_sub(2) as usize;
        if title.chars().count() > max_title {
            title = title.chars().take(max_title).collect();
        }
        let padding = (content_w as usize).saturating_sub(title.chars().count() + 2);

        put_str(buf, self.x, self.y, tl, border_style);
        put_str(buf, self.x + 1, self.y, " ", border_style);
        put_str(buf, self.x + 2, self.y, &title, title_style);
        let mut col = self.x + 2 + title.chars().count() as i32;
        put_str(buf, col, self.y, " ", border_style);
        col += 1;
        for _ in 0..padding {
            put_str(buf, col, self.y, hline, border_style);
            col += 1;
        }
        put_str(buf, col, self.y, tr, border_style);

        let text = self.content.render(content_w, content_h, ctx);
        for dy in 0..content_h {
            let y = self.y + 1 + dy as i32;
            put_str(buf, self.x, y, vline, border_style);
            // Blank the interior before laying styled spans over it.
            for dx in 0..content_w {
                put_str(buf, self.x + 1 + dx as i32, y, " ", Style::default());
            }
            if let Some(line) = text.lines.get(dy as usize) {
                put_line(buf, self.x + 1, y, line, content_w as usize);
            }
            put_str(buf, self.x + 1 + content_w as i32, y, vline, border_style);
        }

        let bottom = self.y + 1 + content_h as i32;
        put_str(buf, self.x, bottom, bl, border_style);
        for dx in 0..content_w {
            put_str(buf, self.x + 1 + dx as i32, bottom, hline, border_style);
        }
        put_str(buf, self.x + 1 + content_w as i32, bottom, br, border_style);
    }
}

/// Write a string into the buffer one cell per char, clipping offscreen
/// cells (x may be negative during drags).
pub fn put_str(buf: &mut Buffer, x: i32, y: i32, text: &str, style: Style) {
    if y < 0 || y >= buf.area.height as i32 {
        return;
    }
    let mut col = x;
    for ch in text.chars() {
        if col >= buf.area.width as i32 {
            break;
        }
        if col >= 0 {
            let cell = buf.get_mut(col as u16, y as u16);
            cell.set_char(ch);
            cell.set_style(style);
        }
        col += 1;
    }
}

/// Write a styled line, clipping to `max_w` cells.
pub fn put_line(buf: &mut Buffer, x: i32, y: i32, line: &Line<'_>, max_w: usize) {
    let mut col = x;
    let end = x + max_w as i32;
    for span in &line.spans {
        for ch in span.content.chars() {
            if col >= end {
                return;
            }
            if y >= 0 && y < buf.area.height as i32 && col >= 0 && col < buf.area.width as i32 {
                let cell = buf.get_mut(col as u16, y as u16);
                cell.set_char(ch);
                cell.set_style(span.style);
            }
            col += 1;
        }
    }
}

/// Owns every floating pane: lookup by id, z-order, focus, hit testing
/// and compositing.
#[derive(Default)]
pub struct PaneManager {
    panes: HashMap<SmolStr, Pane>,
    z_order: Vec<SmolStr>,
    focused: Option<SmolStr>,
    screen_w: u16,
    screen_h: u16,
}

impl PaneManager {
    pub fn new(screen_w: u16, screen_h: u16) -> Self {
        Self {
            screen_w,
            screen_h,
            ..Self::default()
        }
    }

    pub fn add(&mut self, pane: Pane) {
        let id = pane.id.clone();
        self.panes.insert(id.clone(), pane);
        self.z_order.retain(|existing| *existing != id);
        self.z_order.push(id);
    }

    pub fn remove(&mut self, id: &str) {
        self.panes.remove(id);
        self.z_order.retain(|existing| existing != id);
        if self.focused.as_deref() == Some(id) {
            self.focused = None;
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.panes.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Pane> {
        self.panes.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Pane> {
        self.panes.get_mut(id)
    }

    pub fn has_panes(&self) -> bool {
        !self.z_order.is_empty()
    }

    pub fn focused_id(&self) -> Option<&str> {
        self.focused.as_deref()
    }

    pub fn focused_pane_mut(&mut self) -> Option<&mut Pane> {
        let id = self.focused.clone()?;
        self.panes.get_mut(&id)
    }

    /// Focus a pane and raise it to the top of the z-order.
    pub fn focus(&mut self, id: &str) {
        if let Some(prev) = self.focused.take() {
            if let Some(pane) = self.panes.get_mut(&prev) {
                pane.focused = false;
            }
        }
        if let Some(pane) = self.panes.get_mut(id) {
            pane.focused = true;
            self.focused = Some(pane.id.clone());
            let key = pane.id.clone();
            self.z_order.retain(|existing| *existing != key);
            self.z_order.push(key);
        }
    }

    pub fn unfocus(&mut self) {
        if let Some(prev) = self.focused.take() {
            if let Some(pane) = self.panes.get_mut(&prev) {
                pane.focused = false;
            }
        }
    }

    pub fn focus_next(&mut self) {
        self.cycle_focus(1);
    }

    pub fn focus_prev(&mut self) {
        self.cycle_focus(-1);
    }

    fn cycle_focus(&mut self, step: i32) {
        if self.z_order.is_empty() {
            return;
        }
        let next = match self.focused.as_ref().and_then(|id| {
            self.z_order.iter().position(|existing| existing == id)
        }) {
            Some(idx) => {
                let len = self.z_order.len() as i32;
                let next = (idx as i32 + step).rem_euclid(len);
                self.z_order[next as usize].clone()
            }
            None => {
                if step > 0 {
                    self.z_order[0].clone()
                } else {
                    self.z_order[self.z_order.len() - 1].clone()
                }
            }
        };
        self.focus(&next);
    }

    /// Topmost pane under a point.
    pub fn pane_at(&self, x: i32, y: i32) -> Option<SmolStr> {
        self.z_order
            .iter()
            .rev()
            .find(|id| {
                self.panes
                    .get(*id)
                    .is_some_and(|pane| pane.hit_zone(x, y) != HitZone::None)
            })
            .cloned()
    }

    pub fn dragging_pane_mut(&mut self) -> Option<&mut Pane> {
        let id = self
            .z_order
            .iter()
            .find(|id| self.panes.get(*id).is_some_and(Pane::dragging))
            .cloned()?;
        self.panes.get_mut(&id)
    }

    /// Track a screen resize, pulling panes back into view: at least five
    /// columns and the title row must stay visible.
    pub fn update_size(&mut self, w: u16, h: u16) {
        self.screen_w = w;
        self.screen_h = h;
        for pane in self.panes.values_mut() {
            if pane.x > w as i32 - 5 {
                pane.x = w as i32 - 5;
            }
            if pane.y >= h as i32 {
                pane.y = h as i32 - 1;
            }
        }
    }

    pub fn screen_size(&self) -> (u16, u16) {
        (self.screen_w, self.screen_h)
    }

    /// Composite every pane over the already-rendered base, bottom of the
    /// z-order first.
    pub fn render(&mut self, buf: &mut Buffer, ctx: &mut PaneCtx<'_>) {
        let order = self.z_order.clone();
        for id in order {
            if let Some(pane) = self.panes.get_mut(&id) {
                pane.draw(buf, ctx);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn z_order_ids(&self) -> Vec<&str> {
        self.z_order.iter().map(SmolStr::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::text::Text;

    struct Dummy;

    impl PaneContent for Dummy {
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

        fn title(&self, _ctx: &PaneCtx<'_>) -> String {
            "dummy".to_string()
        }

        fn render(&mut self, _w: u16, _h: u16, _ctx: &mut PaneCtx<'_>) -> Text<'static> {
            Text::from("x")
        }

        fn handle_key(&mut self, _key: KeyEvent, _ctx: &mut PaneCtx<'_>) -> KeyOutcome {
            KeyOutcome::ignored()
        }

        fn handle_mouse(
            &mut self,
            _x: u16,
            _y: u16,
            _event: MouseEvent,
            _ctx: &mut PaneCtx<'_>,
        ) -> Option<PaneRequest> {
            None
        }
    }

    fn pane(id: &str, x: i32, y: i32, w: u16, h: u16) -> Pane {
        Pane::new(SmolStr::new(id), Box::new(Dummy), x, y, w, h)
    }

    #[test]
    fn hit_zones_cover_corners_edges_title_and_content() {
        let p = pane("a", 10, 5, 30, 10);
        assert_eq!(p.hit_zone(10, 5), HitZone::CornerNw);
        assert_eq!(p.hit_zone(39, 5), HitZone::CornerNe);
        assert_eq!(p.hit_zone(10, 14), HitZone::CornerSw);
        assert_eq!(p.hit_zone(39, 14), HitZone::CornerSe);
        assert_eq!(p.hit_zone(20, 5), HitZone::TitleBar);
        assert_eq!(p.hit_zone(20, 14), HitZone::EdgeS);
        assert_eq!(p.hit_zone(10, 9), HitZone::EdgeW);
        assert_eq!(p.hit_zone(39, 9), HitZone::EdgeE);
        assert_eq!(p.hit_zone(20, 9), HitZone::Content);
        assert_eq!(p.hit_zone(9, 9), HitZone::None);
        assert_eq!(p.hit_zone(20, 20), HitZone::None);
    }

    #[test]
    fn focus_raises_and_marks_exactly_one_pane() {
        let mut pm = PaneManager::new(80, 24);
        pm.add(pane("a", 0, 0, 20, 5));
        pm.add(pane("b", 5, 5, 20, 5));
        pm.focus("a");
        assert_eq!(pm.focused_id(), Some("a"));
        assert_eq!(pm.z_order_ids(), vec!["b", "a"]);
        assert!(pm.get("a").unwrap().focused);
        assert!(!pm.get("b").unwrap().focused);

        pm.focus("b");
        assert_eq!(pm.z_order_ids(), vec!["a", "b"]);
        assert!(!pm.get("a").unwrap().focused);
    }

    #[test]
    fn focus_history_matches_focus_prev_with_two_panes() {
        let mut left = PaneManager::new(80, 24);
        left.add(pane("a", 0, 0, 20, 5));
        left.add(pane("b", 5, 5, 20, 5));
        left.focus("a");
        left.focus("b");
        left.focus("a");

        let mut right = PaneManager::new(80, 24);
        right.add(pane("a", 0, 0, 20, 5));
        right.add(pane("b", 5, 5, 20, 5));
        right.focus("a");
        right.focus("b");
        right.focus_prev();

        assert_eq!(left.z_order_ids(), right.z_order_ids());
        assert_eq!(left.focused_id(), right.focused_id());
    }

    #[test]
    fn removing_the_focused_pane_clears_focus() {
        let mut pm = PaneManager::new(80, 24);
        pm.add(pane("a", 0, 0, 20, 5));
        pm.focus("a");
        pm.remove("a");
        assert_eq!(pm.focused_id(), None);
        assert!(!pm.has_panes());
    }

    #[test]
    fn pane_at_prefers_the_topmost_pane() {
        let mut pm = PaneManager::new(80, 24);
        pm.add(pane("under", 0, 0, 30, 10));
        pm.add(pane("over", 5, 2, 30, 10));
        assert_eq!(pm.pane_at(10, 5).as_deref(), Some("over"));
        assert_eq!(pm.pane_at(1, 1).as_deref(), Some("under"));
        assert_eq!(pm.pane_at(70, 20), None);
    }

    #[test]
    fn drag_resize_respects_minimums() {
        let mut p = pane("a", 10, 5, 30, 10);
        p.start_drag(DragMode::ResizeSe, 39, 14);
        p.update_drag(12, 6, 80, 24);
        assert_eq!(p.width, p.min_width);
        assert_eq!(p.height, p.min_height);
    }

    #[test]
    fn drag_move_keeps_a_hand_hold_on_screen() {
        let mut p = pane("a", 10, 5, 30, 10);
        p.start_drag(DragMode::Move, 20, 5);
        p.update_drag(-100, -100, 80, 24);
        assert_eq!(p.x, -(30) + 5);
        assert_eq!(p.y, 0);
        p.update_drag(500, 500, 80, 24);
        assert_eq!(p.x, 75);
        assert_eq!(p.y, 23);
    }

    #[test]
    fn resize_to_smaller_screen_pulls_panes_back() {
        let mut pm = PaneManager::new(200, 60);
        pm.add(pane("a", 150, 40, 30, 10));
        pm.update_size(80, 24);
        let p = pm.get("a").unwrap();
        assert_eq!(p.x, 75);
        assert_eq!(p.y, 23);
    }
}
