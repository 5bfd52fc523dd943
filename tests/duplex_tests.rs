//! End-to-end duplexing tests against the public library API, using
//! in-memory channel-backed transports in place of a serial port.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use termlink::{
    ByteSink, ByteSource, EchoState, SerialConfig, Session, SessionController, SessionEvent,
    SessionHandle, TermLinkResult,
};
use tokio::sync::mpsc;
use tokio::time::timeout;

#[derive(Clone, Default)]
struct RecordingSink {
    chunks: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl RecordingSink {
    fn chunks(&self) -> Vec<Vec<u8>> {
        self.chunks.lock().unwrap().clone()
    }

    /// Everything except annotation lines.
    fn data(&self) -> Vec<u8> {
        self.chunks()
            .into_iter()
            .filter(|c| !c.starts_with(b"<"))
            .flatten()
            .collect()
    }
}

#[async_trait]
impl ByteSink for RecordingSink {
    async fn write(&self, chunk: &[u8]) -> TermLinkResult<()> {
        self.chunks.lock().unwrap().push(chunk.to_vec());
        Ok(())
    }
}

struct ChannelSource {
    rx: mpsc::UnboundedReceiver<TermLinkResult<Vec<u8>>>,
}

#[async_trait]
impl ByteSource for ChannelSource {
    async fn read(&mut self) -> TermLinkResult<Option<Vec<u8>>> {
        match self.rx.recv().await {
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

fn channel_source() -> (
    mpsc::UnboundedSender<TermLinkResult<Vec<u8>>>,
    ChannelSource,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, ChannelSource { rx })
}

#[derive(Clone, Default)]
struct CountingHandle {
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl SessionHandle for CountingHandle {
    async fn close(&mut self) -> TermLinkResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Harness {
    controller: SessionController,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    display: RecordingSink,
    transport: RecordingSink,
    read_tx: mpsc::UnboundedSender<TermLinkResult<Vec<u8>>>,
    key_tx: mpsc::UnboundedSender<TermLinkResult<Vec<u8>>>,
    closes: Arc<AtomicUsize>,
    echo: EchoState,
}

async fn connect(echo_enabled: bool) -> Harness {
    let display = RecordingSink::default();
    let echo = EchoState::new(echo_enabled);
    let (controller, mut events) = SessionController::new(
        Arc::new(display.clone()),
        Arc::new(display.clone()),
        echo.clone(),
    );

    let (read_tx, read_source) = channel_source();
    let (key_tx, key_source) = channel_source();
    let transport = RecordingSink::default();
    let handle = CountingHandle::default();
    let closes = Arc::clone(&handle.closes);

    let session = Session::new(
        SerialConfig::default(),
        Box::new(read_source),
        Arc::new(transport.clone()),
        Box::new(handle),
    );
    controller
        .start(session, Box::new(key_source))
        .await
        .expect("start failed");
    assert_eq!(next_event(&mut events).await, SessionEvent::Connected);

    Harness {
        controller,
        events,
        display,
        transport,
        read_tx,
        key_tx,
        closes,
        echo,
    }
}

async fn next_event(events: &mut mpsc::UnboundedReceiver<SessionEvent>) -> SessionEvent {
    timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("timed out waiting for session event")
        .expect("event channel closed")
}

async fn wait_for<F: Fn() -> bool>(condition: F) {
    timeout(Duration::from_secs(1), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn incoming_bytes_reach_display_in_order_without_loss() {
    let mut h = connect(false).await;

    // Mixed chunk sizes, including a soft boundary in the middle.
    let chunks: Vec<&[u8]> = vec![b"AT", b"+GMR", b"", b"\r\n", b"OK\r\n"];
    for chunk in &chunks {
        h.read_tx.send(Ok(chunk.to_vec())).unwrap();
    }
    {
        let display = h.display.clone();
        wait_for(move || display.data() == b"AT+GMR\r\nOK\r\n".to_vec()).await;
    }

    h.controller.stop().await;
    assert_eq!(next_event(&mut h.events).await, SessionEvent::Disconnected);
    assert_eq!(h.display.data(), b"AT+GMR\r\nOK\r\n".to_vec());
}

#[tokio::test]
async fn disconnect_scenario_runs_exactly_one_teardown() {
    let mut h = connect(false).await;

    for byte in b"hello" {
        h.read_tx.send(Ok(vec![*byte])).unwrap();
    }
    {
        let display = h.display.clone();
        wait_for(move || display.data() == b"hello".to_vec()).await;
    }

    h.controller.stop().await;
    assert_eq!(next_event(&mut h.events).await, SessionEvent::Disconnected);

    assert_eq!(h.closes.load(Ordering::SeqCst), 1);
    assert!(!h.controller.is_active().await);

    let chunks = h.display.chunks();
    assert_eq!(chunks.first().unwrap().as_slice(), b"<CONNECTED>\r\n");
    assert_eq!(chunks.last().unwrap().as_slice(), b"<DISCONNECTED>\r\n");
}

#[tokio::test]
async fn session_slot_is_reusable_after_teardown() {
    let mut h = connect(false).await;

    h.controller.stop().await;
    assert_eq!(next_event(&mut h.events).await, SessionEvent::Disconnected);

    // Second run on the same controller.
    let (read_tx, read_source) = channel_source();
    let (_key_tx, key_source) = channel_source();
    let transport = RecordingSink::default();
    let session = Session::new(
        SerialConfig::default(),
        Box::new(read_source),
        Arc::new(transport.clone()),
        Box::new(CountingHandle::default()),
    );
    h.controller
        .start(session, Box::new(key_source))
        .await
        .expect("restart failed");
    assert_eq!(next_event(&mut h.events).await, SessionEvent::Connected);

    read_tx.send(Ok(b"back".to_vec())).unwrap();
    {
        let display = h.display.clone();
        wait_for(move || display.data().ends_with(b"back")).await;
    }

    h.controller.stop().await;
    assert_eq!(next_event(&mut h.events).await, SessionEvent::Disconnected);
}

#[tokio::test]
async fn read_failure_tears_down_once_despite_concurrent_write_failure() {
    let mut h = connect(false).await;

    // Both sides fail in the same instant.
    h.key_tx
        .send(Err(std::io::Error::new(std::io::ErrorKind::Other, "keyboard gone").into()))
        .unwrap();
    h.read_tx
        .send(Err(std::io::Error::new(std::io::ErrorKind::Other, "device unplugged").into()))
        .unwrap();

    assert_eq!(next_event(&mut h.events).await, SessionEvent::Disconnected);
    assert_eq!(h.closes.load(Ordering::SeqCst), 1);

    let disconnects = h
        .display
        .chunks()
        .iter()
        .filter(|c| c.as_slice() == b"<DISCONNECTED>\r\n")
        .count();
    assert_eq!(disconnects, 1);
    assert!(h
        .display
        .chunks()
        .iter()
        .any(|c| c.starts_with(b"<READ ERROR:")));
}

#[tokio::test]
async fn echo_follows_toggle_at_delivery_time() {
    let mut h = connect(true).await;

    h.key_tx.send(Ok(b"ab".to_vec())).unwrap();
    {
        let transport = h.transport.clone();
        wait_for(move || transport.chunks().len() == 1).await;
    }

    h.echo.set(false);
    h.key_tx.send(Ok(b"cd".to_vec())).unwrap();
    {
        let transport = h.transport.clone();
        wait_for(move || transport.chunks().len() == 2).await;
    }

    h.echo.set(true);
    h.key_tx.send(Ok(b"ef".to_vec())).unwrap();
    {
        let transport = h.transport.clone();
        wait_for(move || transport.chunks().len() == 3).await;
    }

    h.controller.stop().await;
    assert_eq!(next_event(&mut h.events).await, SessionEvent::Disconnected);

    assert_eq!(
        h.transport.chunks(),
        vec![b"ab".to_vec(), b"cd".to_vec(), b"ef".to_vec()]
    );
    // The echo branch shares the display; "cd" was sent while echo was
    // off and never mirrored.
    assert_eq!(h.display.data(), b"abef".to_vec());
}

#[tokio::test]
async fn keystroke_order_is_preserved_toward_transport() {
    let mut h = connect(false).await;

    for chunk in [&b"ls"[..], b" -l", b"\r"] {
        h.key_tx.send(Ok(chunk.to_vec())).unwrap();
    }
    {
        let transport = h.transport.clone();
        wait_for(move || transport.chunks().len() == 3).await;
    }

    assert_eq!(
        h.transport.chunks(),
        vec![b"ls".to_vec(), b" -l".to_vec(), b"\r".to_vec()]
    );

    h.controller.stop().await;
    assert_eq!(next_event(&mut h.events).await, SessionEvent::Disconnected);
}

#[tokio::test]
async fn second_start_while_active_is_rejected() {
    let h = connect(false).await;

    let (_read_tx, read_source) = channel_source();
    let (_key_tx, key_source) = channel_source();
    let session = Session::new(
        SerialConfig::default(),
        Box::new(read_source),
        Arc::new(RecordingSink::default()),
        Box::new(CountingHandle::default()),
    );

    let result = h.controller.start(session, Box::new(key_source)).await;
    assert!(result.is_err());
    // The rejected session never ran, so the active one is untouched.
    assert!(h.controller.is_active().await);
}
