use crate::core::session::{Session, SessionHandle};
use crate::core::stream::{ByteSink, ByteSource};
use crate::domain::{
    config::{FlowControl, Parity, SerialConfig},
    error::{TermLinkError, TermLinkResult},
};
use async_trait::async_trait;
use serialport::SerialPort;
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, info};

const READ_BUFFER_SIZE: usize = 1024;
const READ_POLL_INTERVAL: Duration = Duration::from_millis(10);
const PORT_TIMEOUT: Duration = Duration::from_millis(100);

type WriteRequest = (Vec<u8>, oneshot::Sender<TermLinkResult<()>>);

/// Enumerate serial ports available on this machine.
pub fn list_ports() -> TermLinkResult<Vec<serialport::SerialPortInfo>> {
    serialport::available_ports().map_err(TermLinkError::from)
}

/// Open a serial port and wrap it as a duplex [`Session`].
///
/// The blocking `serialport` handle is bridged to async by two
/// background tasks: a TX task that performs writes on request and
/// acknowledges each one, and an RX task that polls the port and
/// forwards chunks (or a terminal error) into the read side. The
/// returned session's close handle stops both tasks and releases the
/// port.
pub async fn open_session(config: &SerialConfig) -> TermLinkResult<Session> {
    let builder = builder_for(config)?;

    let port = builder.open()?;
    info!("Serial port {} opened at {} baud", config.port, config.baud_rate);

    let port: Arc<Mutex<Box<dyn SerialPort>>> = Arc::new(Mutex::new(port));
    let (write_tx, mut write_rx) = mpsc::unbounded_channel::<WriteRequest>();
    let (read_tx, read_rx) = mpsc::unbounded_channel::<TermLinkResult<Vec<u8>>>();

    // TX task - performs writes and acknowledges each one, so the
    // caller sees real port errors at the write call site.
    let port_tx = Arc::clone(&port);
    let tx_task = tokio::spawn(async move {
        while let Some((data, ack)) = write_rx.recv().await {
            let mut port = port_tx.lock().await;
            let result = port
                .write_all(&data)
                .and_then(|_| port.flush())
                .map_err(TermLinkError::from);
            if result.is_ok() {
                debug!("Sent {} bytes over serial", data.len());
            }
            let _ = ack.send(result);
        }
        debug!("Serial TX task finished");
    });

    // RX task - polls the port and forwards chunks in arrival order.
    // Timeouts are polling artifacts, not errors; any other read error
    // is terminal for the read side.
    let port_rx = Arc::clone(&port);
    let rx_task = tokio::spawn(async move {
        let mut buffer = vec![0u8; READ_BUFFER_SIZE];

        loop {
            tokio::time::sleep(READ_POLL_INTERVAL).await;

            let mut port = port_rx.lock().await;
            match port.read(&mut buffer) {
                Ok(0) => continue,
                Ok(n) => {
                    debug!("Received {} bytes over serial", n);
                    if read_tx.send(Ok(buffer[..n].to_vec())).is_err() {
                        break;
                    }
                }
                Err(ref e)
                    if e.kind() == std::io::ErrorKind::TimedOut
                        || e.kind() == std::io::ErrorKind::Interrupted =>
                {
                    continue;
                }
                Err(e) => {
                    error!("Serial read failed: {}", e);
                    let _ = read_tx.send(Err(e.into()));
                    break;
                }
            }
        }
        debug!("Serial RX task finished");
    });

    Ok(Session::new(
        config.clone(),
        Box::new(SerialReadSource { rx: read_rx }),
        Arc::new(SerialWriteSink { tx: write_tx }),
        Box::new(SerialSessionHandle {
            tx_task: Some(tx_task),
            rx_task: Some(rx_task),
        }),
    ))
}

fn builder_for(config: &SerialConfig) -> TermLinkResult<serialport::SerialPortBuilder> {
    let mut builder = serialport::new(&config.port, config.baud_rate);

    builder = builder.data_bits(match config.data_bits {
        5 => serialport::DataBits::Five,
        6 => serialport::DataBits::Six,
        7 => serialport::DataBits::Seven,
        8 => serialport::DataBits::Eight,
        other => {
            return Err(TermLinkError::Config {
                message: format!("Invalid data bits: {}", other),
            })
        }
    });

    builder = builder.stop_bits(match config.stop_bits {
        1 => serialport::StopBits::One,
        2 => serialport::StopBits::Two,
        other => {
            return Err(TermLinkError::Config {
                message: format!("Invalid stop bits: {}", other),
            })
        }
    });

    builder = builder.parity(match config.parity {
        Parity::None => serialport::Parity::None,
        Parity::Even => serialport::Parity::Even,
        Parity::Odd => serialport::Parity::Odd,
    });

    builder = builder.flow_control(match config.flow_control {
        FlowControl::None => serialport::FlowControl::None,
        FlowControl::Hardware => serialport::FlowControl::Hardware,
        FlowControl::Software => serialport::FlowControl::Software,
    });

    Ok(builder.timeout(PORT_TIMEOUT))
}

/// Write side of an open serial session.
struct SerialWriteSink {
    tx: mpsc::UnboundedSender<WriteRequest>,
}

#[async_trait]
impl ByteSink for SerialWriteSink {
    async fn write(&self, chunk: &[u8]) -> TermLinkResult<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send((chunk.to_vec(), ack_tx))
            .map_err(|_| TermLinkError::SinkClosed)?;
        ack_rx.await.map_err(|_| TermLinkError::SinkClosed)?
    }
}

/// Read side of an open serial session.
struct SerialReadSource {
    rx: mpsc::UnboundedReceiver<TermLinkResult<Vec<u8>>>,
}

#[async_trait]
impl ByteSource for SerialReadSource {
    async fn read(&mut self) -> TermLinkResult<Option<Vec<u8>>> {
        match self.rx.recv().await {
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

/// Close handle stopping both bridge tasks and releasing the port.
struct SerialSessionHandle {
    tx_task: Option<tokio::task::JoinHandle<()>>,
    rx_task: Option<tokio::task::JoinHandle<()>>,
}

#[async_trait]
impl SessionHandle for SerialSessionHandle {
    async fn close(&mut self) -> TermLinkResult<()> {
        // The write sink is gone by the time the controller closes the
        // session, so no writes can be in flight here.
        if let Some(task) = self.tx_task.take() {
            task.abort();
            let _ = task.await;
        }
        if let Some(task) = self.rx_task.take() {
            task.abort();
            let _ = task.await;
        }
        info!("Serial session closed");
        Ok(())
    }
}
