use crate::domain::config::{FlowControl, Parity};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};

/// Command line arguments for TermLink
#[derive(Parser, Debug)]
#[command(
    name = "termlink",
    version = env!("CARGO_PKG_VERSION"),
    about = "Serial terminal with duplex byte streaming and local echo",
    long_about = "Connects your terminal to a serial device and duplexes bytes in both \
                  directions until you disconnect (Ctrl-]) or the transport fails. \
                  Ctrl-E toggles local echo."
)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect to a serial device and run the interactive terminal
    Connect(ConnectArgs),
    /// List available serial ports
    ListPorts,
}

/// Connection arguments; unset values fall back to the config file
#[derive(ClapArgs, Debug)]
pub struct ConnectArgs {
    /// Serial port path, e.g. /dev/ttyUSB0 or COM3
    #[arg(short, long)]
    pub port: String,

    /// Baud rate
    #[arg(short, long)]
    pub baud: Option<u32>,

    /// Data bits (5-8)
    #[arg(long, value_parser = clap::value_parser!(u8).range(5..=8))]
    pub data_bits: Option<u8>,

    /// Stop bits (1-2)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=2))]
    pub stop_bits: Option<u8>,

    /// Parity (none, even, odd)
    #[arg(long, value_enum)]
    pub parity: Option<ParityArg>,

    /// Flow control (none, hardware, software)
    #[arg(long, value_enum)]
    pub flow_control: Option<FlowControlArg>,

    /// Enable local echo of typed bytes
    #[arg(short, long)]
    pub echo: bool,
}

/// Parity options
#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum ParityArg {
    None,
    Even,
    Odd,
}

/// Flow control options
#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum FlowControlArg {
    None,
    Hardware,
    Software,
}

impl From<ParityArg> for Parity {
    fn from(arg: ParityArg) -> Self {
        match arg {
            ParityArg::None => Parity::None,
            ParityArg::Even => Parity::Even,
            ParityArg::Odd => Parity::Odd,
        }
    }
}

impl From<FlowControlArg> for FlowControl {
    fn from(arg: FlowControlArg) -> Self {
        match arg {
            FlowControlArg::None => FlowControl::None,
            FlowControlArg::Hardware => FlowControl::Hardware,
            FlowControlArg::Software => FlowControl::Software,
        }
    }
}
