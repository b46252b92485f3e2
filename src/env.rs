use std::{
    any::Any,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::widgets::{Popup, Widget};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WidgetId(u64);

impl WidgetId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Payload delivered back to the widget that emitted it, usually from a spawned task.
pub struct AppEvent {
    target: WidgetId,
    payload: Box<dyn Any + Send>,
}

impl AppEvent {
    pub fn target(&self) -> WidgetId {
        self.target
    }

    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub kind: ToastKind,
    pub duration: Duration,
}

impl Toast {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: ToastKind::Info,
            duration: Duration::from_secs(3),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: ToastKind::Warning,
            duration: Duration::from_secs(4),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: ToastKind::Error,
            duration: Duration::from_secs(5),
        }
    }
}

pub enum Message {
    // Invalidate the current frame and request a redraw
    Invalidate,
    // Clear the terminal before the next draw, e.g. after an external editor ran
    ForceRedraw,
    PushWidget(Box<dyn Widget>),
    PopWidget,
    SetPopup(Box<dyn Popup>),
    DismissPopup,
    ShowToast(Toast),
    Emit(AppEvent),
    Quit,
}

/// Handle a widget uses to talk to the app loop. Cheap to clone and `Send`, so
/// background tasks can hold one.
#[derive(Clone)]
pub struct WidgetCtx {
    tx: UnboundedSender<Message>,
    id: WidgetId,
}

impl WidgetCtx {
    pub fn id(&self) -> WidgetId {
        self.id
    }

    fn send(&self, msg: Message) {
        // The receiver only goes away when the app is shutting down.
        let _ = self.tx.send(msg);
    }

    pub fn invalidate(&self) {
        self.send(Message::Invalidate);
    }

    pub fn force_redraw(&self) {
        self.send(Message::ForceRedraw);
    }

    pub fn push_widget(&self, widget: Box<dyn Widget>) {
        self.send(Message::PushWidget(widget));
    }

    pub fn pop_widget(&self) {
        self.send(Message::PopWidget);
    }

    pub fn set_popup(&self, popup: Box<dyn Popup>) {
        self.send(Message::SetPopup(popup));
    }

    pub fn dismiss_popup(&self) {
        self.send(Message::DismissPopup);
    }

    pub fn show_toast(&self, toast: Toast) {
        self.send(Message::ShowToast(toast));
    }

    pub fn quit(&self) {
        self.send(Message::Quit);
    }

    pub fn emit_self<T: Any + Send>(&self, payload: T) {
        self.emit_to(self.id, payload);
    }

    pub fn emit_to<T: Any + Send>(&self, target: WidgetId, payload: T) {
        self.send(Message::Emit(AppEvent {
            target,
            payload: Box::new(payload),
        }));
    }
}

pub struct Env {
    tx: UnboundedSender<Message>,
    rx: UnboundedReceiver<Message>,
}

impl Env {
    pub fn new() -> Self {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<Message>();
        Env { tx, rx }
    }

    pub fn ctx(&self, id: WidgetId) -> WidgetCtx {
        WidgetCtx {
            tx: self.tx.clone(),
            id,
        }
    }

    pub fn rx(&mut self) -> &mut UnboundedReceiver<Message> {
        &mut self.rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widget_ids_are_unique() {
        assert_ne!(WidgetId::next(), WidgetId::next());
    }

    #[test]
    fn emitted_payloads_reach_the_channel() {
        let mut env = Env::new();
        let id = WidgetId::next();
        env.ctx(id).emit_self(42_u32);
        match env.rx().try_recv() {
            Ok(Message::Emit(event)) => {
                assert_eq!(event.target(), id);
                assert_eq!(event.payload::<u32>(), Some(&42));
                assert!(event.payload::<String>().is_none());
            }
            _ => panic!("expected an emitted event"),
        }
    }
}
