use crossterm::event::Event;
use ratatui::{Frame, layout::Rect};

pub mod browser;
pub mod confirm;
pub mod error;
pub mod input;
pub mod picker;
pub mod theme;

pub use browser::BrowserWidget;
pub use picker::NamespacePicker;

use crate::{
    env::{AppEvent, WidgetCtx, WidgetId},
    help,
};
use theme::Theme;

/// Identity shared by every widget: its own id and the widget that opened it.
#[derive(Debug, Clone, Copy)]
pub struct WidgetInner {
    id: WidgetId,
    parent: WidgetId,
}

impl WidgetInner {
    pub fn new(parent: WidgetId) -> Self {
        Self {
            id: WidgetId::next(),
            parent,
        }
    }

    /// For the first widget on the stack.
    pub fn root() -> Self {
        let id = WidgetId::next();
        Self { id, parent: id }
    }

    pub fn id(&self) -> WidgetId {
        self.id
    }

    pub fn parent(&self) -> WidgetId {
        self.parent
    }
}

/// Widgets live on the UI task and use interior mutability; background work
/// reports back through [`WidgetCtx::emit_self`].
pub trait Widget: Send {
    fn inner(&self) -> &WidgetInner;

    fn id(&self) -> WidgetId {
        self.inner().id()
    }

    /// Called once when the widget becomes part of the app.
    fn start(&self, _ctx: WidgetCtx) {}

    fn render(&self, frame: &mut Frame, area: Rect, theme: &Theme);

    /// Handle input events. Returns true if the event was handled.
    fn handle_event(&self, _ctx: WidgetCtx, _event: &Event) -> bool {
        false
    }

    /// Events this widget emitted to itself.
    fn on_self_event(&self, _ctx: WidgetCtx, _event: &AppEvent) {}

    fn navigation_title(&self) -> Option<String> {
        None
    }

    /// Drives the loading throbber in the title bar.
    fn is_loading(&self) -> bool {
        false
    }

    /// Optional help to display at the bottom while this widget is active
    fn help(&self) -> Option<&[help::Entry]> {
        None
    }
}

pub trait Popup: Widget {
    fn rect(&self, area: Rect) -> Rect;
}
