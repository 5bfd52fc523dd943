use crate::core::stream::{ByteSink, ByteSource, EchoState};
use crate::domain::error::TermLinkError;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Consecutive transport write failures tolerated before the write pump
/// gives up. Bounded so a persistent write failure cannot turn into a
/// hot retry loop; the counter resets on any successful write.
pub(crate) const MAX_WRITE_FAILURES: u32 = 3;

/// Write a user-visible annotation line to the display sink.
///
/// Annotations are the only error surface that crosses to the user; a
/// failure to deliver one is only logged.
pub(crate) async fn annotate(display: &dyn ByteSink, text: &str) {
    let line = format!("<{}>\r\n", text);
    if let Err(e) = display.write(line.as_bytes()).await {
        warn!("Failed to write annotation to display: {}", e);
    }
}

/// Pump bytes from the session's read side into the display sink until
/// cancelled or the read side is exhausted.
///
/// Cancellation is the expected shutdown path and exits silently. Any
/// other failure is annotated as a read error and ends the loop; the
/// controller treats this pump's return as the end of the session
/// regardless of cause. Chunks reach the display in arrival order.
pub(crate) async fn read_pump(
    mut source: Box<dyn ByteSource>,
    display: Arc<dyn ByteSink>,
    cancel: CancellationToken,
) {
    loop {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("read pump cancelled");
                break;
            }
            result = source.read() => match result {
                Ok(Some(chunk)) => chunk,
                Ok(None) => {
                    debug!("read side reached end of stream");
                    break;
                }
                Err(e) => {
                    annotate(&*display, &format!("READ ERROR: {}", e)).await;
                    break;
                }
            },
        };

        // Soft transfer boundary: the transfer completed without the
        // source itself closing. Re-enter the loop.
        if chunk.is_empty() {
            continue;
        }

        if let Err(e) = display.write(&chunk).await {
            annotate(&*display, &format!("READ ERROR: {}", e)).await;
            break;
        }
    }
}

/// Pump bytes from the keystroke source into the transport write side,
/// mirroring each chunk to the echo sink while echo is enabled.
///
/// The echo branch is a side-tap bound to a per-iteration child token:
/// it never consumes or closes the keystroke source, and cancelling the
/// run settles it silently. Echo gating is read at delivery time of
/// each chunk, so toggling mid-session takes effect on the next chunk.
///
/// A transport write failure is annotated but does not end the session
/// by itself; the loop exits on cancellation, on a closed write side,
/// or after [`MAX_WRITE_FAILURES`] consecutive failures.
pub(crate) async fn write_pump(
    mut keystrokes: Box<dyn ByteSource>,
    transport: Arc<dyn ByteSink>,
    echo_sink: Arc<dyn ByteSink>,
    echo: EchoState,
    display: Arc<dyn ByteSink>,
    cancel: CancellationToken,
) {
    let mut consecutive_failures: u32 = 0;

    loop {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("write pump cancelled");
                break;
            }
            result = keystrokes.read() => match result {
                Ok(Some(chunk)) => chunk,
                Ok(None) => {
                    debug!("keystroke source reached end of stream");
                    break;
                }
                Err(e) => {
                    annotate(&*display, &format!("WRITE ERROR: {}", e)).await;
                    break;
                }
            },
        };

        if chunk.is_empty() {
            continue;
        }

        let echo_scope = cancel.child_token();
        let delivery = async {
            let transport_write = transport.write(&chunk);
            let echo_write = async {
                // Gate per chunk at delivery time, not at loop start.
                if echo.is_enabled() {
                    tokio::select! {
                        _ = echo_scope.cancelled() => Ok(()),
                        result = echo_sink.write(&chunk) => result,
                    }
                } else {
                    Ok(())
                }
            };
            tokio::join!(transport_write, echo_write)
        };

        let (sent, echoed) = tokio::select! {
            _ = cancel.cancelled() => {
                // The echo sub-scope unwinds with the run; its outcome
                // is swallowed.
                echo_scope.cancel();
                debug!("write pump cancelled mid-delivery");
                break;
            }
            result = delivery => result,
        };

        if let Err(e) = echoed {
            warn!("Echo delivery failed: {}", e);
        }

        match sent {
            Ok(()) => {
                consecutive_failures = 0;
            }
            Err(e) => {
                let write_side_gone = matches!(e, TermLinkError::SinkClosed);
                annotate(&*display, &format!("WRITE ERROR: {}", e)).await;

                if cancel.is_cancelled() || write_side_gone {
                    break;
                }

                consecutive_failures += 1;
                if consecutive_failures >= MAX_WRITE_FAILURES {
                    warn!(
                        "Giving up after {} consecutive write failures",
                        consecutive_failures
                    );
                    break;
                }
            }
        }
    }
}
