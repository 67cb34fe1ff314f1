use crate::model::UserId;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

pub type Payload = BTreeMap<String, String>;

/// Type d'événement poussé à la contrepartie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    BookingRequested,
    BookingConfirmed,
    BookingRejected,
    BookingStarted,
    BookingCompleted,
    BookingCancelledByClient,
    BookingCancelledByWorker,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::BookingRequested => "booking_requested",
            EventKind::BookingConfirmed => "booking_confirmed",
            EventKind::BookingRejected => "booking_rejected",
            EventKind::BookingStarted => "booking_started",
            EventKind::BookingCompleted => "booking_completed",
            EventKind::BookingCancelledByClient => "booking_cancelled_by_client",
            EventKind::BookingCancelledByWorker => "booking_cancelled_by_worker",
        }
    }

    /// Écran à ouvrir côté application.
    pub fn action(self) -> &'static str {
        match self {
            EventKind::BookingRequested => "abrir_pendientes",
            EventKind::BookingCancelledByClient => "ver_gestion",
            _ => "ver_historial",
        }
    }
}

/// Notification à envoyer après validation d'une transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub recipient: UserId,
    pub kind: EventKind,
    pub payload: Payload,
}

impl Notice {
    pub fn new(recipient: UserId, kind: EventKind) -> Self {
        let mut payload = Payload::new();
        payload.insert("tipo".into(), kind.as_str().into());
        payload.insert("accion".into(), kind.action().into());
        payload.insert("notice_id".into(), Uuid::new_v4().to_string());
        Self {
            recipient,
            kind,
            payload,
        }
    }

    pub fn with<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }
}

/// Canal de notification push (best effort).
pub trait Notifier: Send + Sync {
    fn notify(&self, subject: UserId, kind: EventKind, payload: &Payload) -> anyhow::Result<()>;
}

/// Envoie les notifications une à une ; les échecs sont journalisés puis ignorés.
pub fn dispatch(notifier: &dyn Notifier, notices: Vec<Notice>) {
    for notice in notices {
        if let Err(err) = notifier.notify(notice.recipient, notice.kind, &notice.payload) {
            tracing::warn!(
                recipient = %notice.recipient,
                kind = notice.kind.as_str(),
                error = %format!("{err:#}"),
                "notification dropped"
            );
        }
    }
}

/// Permet de customiser le texte affiché (push, mail, etc.).
pub trait NoticeRenderer: Send + Sync {
    fn render(&self, kind: EventKind, payload: &Payload) -> (String, String);
}

/// Gabarit texte par défaut.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextNotice;

impl NoticeRenderer for TextNotice {
    fn render(&self, kind: EventKind, payload: &Payload) -> (String, String) {
        let field = |key: &str, fallback: &'static str| {
            payload.get(key).cloned().unwrap_or_else(|| fallback.to_string())
        };
        let client = field("cliente_nombre", "Cliente");
        let worker = field("trabajador_nombre", "Trabajador");
        let service = field("servicio_nombre", "Servicio");
        match kind {
            EventKind::BookingRequested => (
                "New booking request".into(),
                format!("{client} requested your {service} service"),
            ),
            EventKind::BookingConfirmed => (
                "Booking confirmed".into(),
                format!("{worker} accepted your {service} request"),
            ),
            EventKind::BookingRejected => (
                "Booking rejected".into(),
                format!("{worker} cannot provide the {service} service"),
            ),
            EventKind::BookingStarted => (
                "Booking started".into(),
                format!("{worker} has started your {service} service"),
            ),
            EventKind::BookingCompleted => (
                "Booking completed".into(),
                format!("{worker} finished the {service} service. Rate it!"),
            ),
            EventKind::BookingCancelledByClient => (
                "Booking cancelled".into(),
                format!("{client} cancelled the {service} service"),
            ),
            EventKind::BookingCancelledByWorker => (
                "Booking cancelled".into(),
                format!("{service} is no longer offered; your booking was cancelled"),
            ),
        }
    }
}

/// Journalise les notifications via `tracing`.
#[derive(Debug, Default)]
pub struct LogNotifier<R = TextNotice> {
    renderer: R,
}

impl LogNotifier<TextNotice> {
    pub fn new() -> Self {
        Self {
            renderer: TextNotice,
        }
    }
}

impl<R: NoticeRenderer> LogNotifier<R> {
    pub fn with_renderer(renderer: R) -> Self {
        Self { renderer }
    }
}

impl<R: NoticeRenderer> Notifier for LogNotifier<R> {
    fn notify(&self, subject: UserId, kind: EventKind, payload: &Payload) -> anyhow::Result<()> {
        let (title, body) = self.renderer.render(kind, payload);
        tracing::info!(subject = %subject, kind = kind.as_str(), %title, %body, "notification");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct OutboxLine<'a> {
    recipient: UserId,
    kind: EventKind,
    title: String,
    body: String,
    payload: &'a Payload,
}

/// Ajoute chaque notification comme une ligne JSON dans un fichier (boîte d'envoi).
pub struct OutboxNotifier<R = TextNotice> {
    path: PathBuf,
    renderer: R,
    lock: Mutex<()>,
}

impl OutboxNotifier<TextNotice> {
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            renderer: TextNotice,
            lock: Mutex::new(()),
        }
    }
}

impl<R: NoticeRenderer> Notifier for OutboxNotifier<R> {
    fn notify(&self, subject: UserId, kind: EventKind, payload: &Payload) -> anyhow::Result<()> {
        let (title, body) = self.renderer.render(kind, payload);
        let mut line = serde_json::to_vec(&OutboxLine {
            recipient: subject,
            kind,
            title,
            body,
            payload,
        })?;
        line.push(b'\n');
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("outbox lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening outbox {}", self.path.display()))?;
        file.write_all(&line)?;
        Ok(())
    }
}

/// Garde les notifications en mémoire ; peut simuler une panne du canal.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<Notice>>,
    failing: bool,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canal toujours en échec.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub fn sent(&self) -> Vec<Notice> {
        self.sent.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, subject: UserId, kind: EventKind, payload: &Payload) -> anyhow::Result<()> {
        if self.failing {
            anyhow::bail!("push gateway unavailable");
        }
        self.sent
            .lock()
            .map_err(|_| anyhow::anyhow!("notifier lock poisoned"))?
            .push(Notice {
                recipient: subject,
                kind,
                payload: payload.clone(),
            });
        Ok(())
    }
}

impl<N: Notifier + ?Sized> Notifier for std::sync::Arc<N> {
    fn notify(&self, subject: UserId, kind: EventKind, payload: &Payload) -> anyhow::Result<()> {
        (**self).notify(subject, kind, payload)
    }
}
