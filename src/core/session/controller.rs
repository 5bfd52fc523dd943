use crate::core::session::pump::{annotate, read_pump, write_pump};
use crate::core::session::session::Session;
use crate::core::stream::{ByteSink, ByteSource, EchoState};
use crate::domain::error::{TermLinkError, TermLinkResult};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Lifecycle notifications for the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected,
    Disconnected,
}

struct ActiveRun {
    cancel: CancellationToken,
}

/// Orchestrates one full connect → duplex → disconnect cycle.
///
/// [`start`](SessionController::start) splits the session into its read
/// and write sides and runs one read pump and one write pump against
/// them, both bound to a cancellation token created fresh for the run.
/// The read pump's exit is the authoritative end-of-session signal; a
/// supervisor task then cancels the token, awaits the write pump,
/// closes the transport, and frees the session slot. Teardown runs
/// exactly once per start, regardless of which side failed.
pub struct SessionController {
    display: Arc<dyn ByteSink>,
    echo_sink: Arc<dyn ByteSink>,
    echo: EchoState,
    events: mpsc::UnboundedSender<SessionEvent>,
    active: Arc<Mutex<Option<ActiveRun>>>,
}

impl SessionController {
    /// Create a controller and the event stream the UI layer consumes.
    ///
    /// `display` receives transport bytes and annotations; `echo_sink`
    /// receives the local-echo copy of outgoing bytes (usually the same
    /// sink as the display).
    pub fn new(
        display: Arc<dyn ByteSink>,
        echo_sink: Arc<dyn ByteSink>,
        echo: EchoState,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, event_receiver) = mpsc::unbounded_channel();
        (
            Self {
                display,
                echo_sink,
                echo,
                events,
                active: Arc::new(Mutex::new(None)),
            },
            event_receiver,
        )
    }

    /// Start duplexing `session` against the given keystroke source.
    ///
    /// Fails if a session is already active. Returns as soon as both
    /// pumps are running; session end is reported through the event
    /// stream.
    pub async fn start(
        &self,
        session: Session,
        keystrokes: Box<dyn ByteSource>,
    ) -> TermLinkResult<()> {
        let mut active = self.active.lock().await;
        if active.is_some() {
            return Err(TermLinkError::Session {
                message: "A session is already active".to_string(),
            });
        }

        // One token per run, never reused across connection attempts.
        let cancel = CancellationToken::new();
        let (read_side, write_side, mut handle) = session.into_parts();

        annotate(&*self.display, "CONNECTED").await;
        let _ = self.events.send(SessionEvent::Connected);

        let read_task = tokio::spawn(read_pump(
            read_side,
            Arc::clone(&self.display),
            cancel.clone(),
        ));
        let write_task = tokio::spawn(write_pump(
            keystrokes,
            write_side,
            Arc::clone(&self.echo_sink),
            self.echo.clone(),
            Arc::clone(&self.display),
            cancel.clone(),
        ));

        let display = Arc::clone(&self.display);
        let events = self.events.clone();
        let slot = Arc::clone(&self.active);
        let run_cancel = cancel.clone();

        tokio::spawn(async move {
            // The read pump's exit ends the session, whether it was
            // cancelled, hit end-of-stream, or failed.
            let _ = read_task.await;
            debug!("read pump finished, tearing down session");

            // Teardown, in order; every step runs even if an earlier
            // one failed. Cancelling an already-cancelled token is a
            // no-op.
            run_cancel.cancel();
            let _ = write_task.await;

            if let Err(e) = handle.close().await {
                warn!("Failed to close transport: {}", e);
            }

            annotate(&*display, "DISCONNECTED").await;
            *slot.lock().await = None;
            let _ = events.send(SessionEvent::Disconnected);
            info!("Session torn down");
        });

        *active = Some(ActiveRun { cancel });
        info!("Session started");
        Ok(())
    }

    /// Request disconnection of the active session.
    ///
    /// Only cancels the run's token; the supervisor performs the rest
    /// of teardown. No-op when no session is active.
    pub async fn stop(&self) {
        if let Some(run) = self.active.lock().await.as_ref() {
            debug!("stop requested, cancelling run");
            run.cancel.cancel();
        }
    }

    /// Whether a session is currently active.
    pub async fn is_active(&self) -> bool {
        self.active.lock().await.is_some()
    }
}
