use crate::cli::args::{Args, Command, ConnectArgs};
use crate::core::session::{Session, SessionController, SessionEvent};
use crate::core::stream::{ByteSink, EchoState};
use crate::domain::{
    config::{SerialConfig, TermLinkConfig},
    error::TermLinkResult,
};
use crate::infrastructure::serial;
use crate::infrastructure::terminal::{ConsoleDisplay, KeyboardSource, RawModeGuard, UiCommand};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// Execute a CLI command
pub async fn execute_command(args: Args, config: TermLinkConfig) -> TermLinkResult<()> {
    match args.command {
        Command::ListPorts => list_ports(),
        Command::Connect(connect) => run_terminal(connect, config).await,
    }
}

fn list_ports() -> TermLinkResult<()> {
    let ports = serial::list_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
        return Ok(());
    }

    for port in ports {
        match port.port_type {
            serialport::SerialPortType::UsbPort(usb) => {
                let product = usb.product.map(|p| format!(" {}", p)).unwrap_or_default();
                println!(
                    "{}  [USB {:04x}:{:04x}{}]",
                    port.port_name, usb.vid, usb.pid, product
                );
            }
            serialport::SerialPortType::BluetoothPort => {
                println!("{}  [Bluetooth]", port.port_name);
            }
            serialport::SerialPortType::PciPort => {
                println!("{}  [PCI]", port.port_name);
            }
            serialport::SerialPortType::Unknown => {
                println!("{}", port.port_name);
            }
        }
    }
    Ok(())
}

/// Command-line flags override config-file defaults field by field.
fn merge_config(connect: &ConnectArgs, defaults: &SerialConfig) -> SerialConfig {
    SerialConfig {
        port: connect.port.clone(),
        baud_rate: connect.baud.unwrap_or(defaults.baud_rate),
        data_bits: connect.data_bits.unwrap_or(defaults.data_bits),
        stop_bits: connect.stop_bits.unwrap_or(defaults.stop_bits),
        parity: connect.parity.map(Into::into).unwrap_or(defaults.parity),
        flow_control: connect
            .flow_control
            .map(Into::into)
            .unwrap_or(defaults.flow_control),
    }
}

/// Open the transport, or surface the failure on the display.
///
/// Annotations are the only user-visible error surface; a failed open
/// never produced a session, so there is nothing to tear down.
async fn open_or_announce(
    config: &SerialConfig,
    display: &Arc<dyn ByteSink>,
) -> TermLinkResult<Option<Session>> {
    match serial::open_session(config).await {
        Ok(session) => Ok(Some(session)),
        Err(e) => {
            display
                .write(format!("<CONNECT ERROR: {}>\r\n", e).as_bytes())
                .await?;
            Ok(None)
        }
    }
}

async fn run_terminal(connect: ConnectArgs, config: TermLinkConfig) -> TermLinkResult<()> {
    let serial_config = merge_config(&connect, &config.serial);
    let echo = EchoState::new(connect.echo || config.global.echo);
    let display: Arc<dyn ByteSink> = Arc::new(ConsoleDisplay);

    let session = match open_or_announce(&serial_config, &display).await? {
        Some(session) => session,
        None => return Ok(()),
    };

    let _raw_mode = RawModeGuard::new()?;
    let (command_tx, mut commands) = mpsc::unbounded_channel();
    let keystrokes = KeyboardSource::spawn(command_tx);

    let (controller, mut events) =
        SessionController::new(Arc::clone(&display), Arc::clone(&display), echo.clone());
    controller.start(session, Box::new(keystrokes)).await?;
    info!("Interactive terminal running on {}", serial_config.port);

    let mut commands_closed = false;
    loop {
        tokio::select! {
            command = commands.recv(), if !commands_closed => match command {
                Some(UiCommand::Disconnect) => controller.stop().await,
                Some(UiCommand::ToggleEcho) => {
                    echo.toggle();
                }
                None => {
                    // Keyboard thread is gone; end the session.
                    commands_closed = true;
                    controller.stop().await;
                }
            },
            event = events.recv() => match event {
                Some(SessionEvent::Connected) => {}
                Some(SessionEvent::Disconnected) | None => break,
            },
        }
    }

    Ok(())
}
