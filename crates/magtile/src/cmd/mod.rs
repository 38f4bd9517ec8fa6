use clap::{Args, Subcommand};
use magtile_line::{DeviceCommand, LineConfig, DEFAULT_MAX_LINE_LENGTH};
use magtile_session::{Session, SessionConfig};
use magtile_transport::{PortConfig, SerialPortOpener, DEFAULT_BAUD_RATE};

use crate::exit::{session_error, CliResult};
use crate::output::OutputFormat;

pub mod device;
pub mod ports;
pub mod send;
pub mod shell;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List serial ports.
    Ports(PortsArgs),
    /// Run one controller command.
    Device(DeviceArgs),
    /// Send a raw command line.
    Send(SendArgs),
    /// Interactive command loop over stdin.
    Shell(ShellArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, connection: &ConnectionArgs, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Ports(args) => ports::run(args, format),
        Command::Device(args) => device::run(args, connection, format),
        Command::Send(args) => send::run(args, connection, format),
        Command::Shell(args) => shell::run(args, connection, format),
        Command::Version(args) => version::run(args),
    }
}

/// Serial connection settings shared by every device-facing command.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Serial device path (e.g. /dev/ttyACM0, COM3).
    #[arg(long, env = "MAGTILE_PORT", value_name = "PATH", global = true)]
    pub port: Option<String>,

    /// Line speed.
    #[arg(long, env = "MAGTILE_BAUD", value_name = "N", default_value_t = DEFAULT_BAUD_RATE, global = true)]
    pub baud: u32,

    /// Do not wait for the power-up banner after opening the port.
    #[arg(long, global = true)]
    pub no_banner: bool,

    /// Maximum reply line length in bytes.
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MAX_LINE_LENGTH, global = true)]
    pub max_line: usize,
}

impl ConnectionArgs {
    pub fn port_config(&self) -> PortConfig {
        PortConfig {
            path: self.port.clone(),
            baud_rate: self.baud,
            ..PortConfig::default()
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            line: LineConfig {
                max_line_length: self.max_line,
            },
            drain_banner: !self.no_banner,
        }
    }

    /// Build a session and connect it.
    pub fn connect(&self) -> CliResult<Session<SerialPortOpener>> {
        let opener = SerialPortOpener::new(self.port_config());
        let mut session = Session::with_config(opener, self.session_config());
        session
            .open()
            .map_err(|err| session_error("connect failed", err))?;
        Ok(session)
    }
}

#[derive(Args, Debug, Default)]
pub struct PortsArgs {}

#[derive(Args, Debug)]
pub struct DeviceArgs {
    #[command(subcommand)]
    pub action: DeviceAction,
}

/// One action per controller verb.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum DeviceAction {
    /// Read the grid width.
    ReadWidth,
    /// Read the grid height.
    ReadHeight,
    /// Set the grid width.
    WriteWidth { value: u32 },
    /// Set the grid height.
    WriteHeight { value: u32 },
    /// Replace the tile address list (in order).
    WriteAddressList { addresses: Vec<u32> },
    /// Read the tile address list.
    ReadAddressList,
    /// Scan the bus for tiles.
    ScanAddresses,
    /// Start blinking all tiles.
    BlinkallStart,
    /// Stop blinking all tiles.
    BlinkallStop,
    /// Turn a tile's test LED on.
    TestLedEnable { address: u32 },
    /// Turn a tile's test LED off.
    TestLedDisable { address: u32 },
    /// Persist configuration on the controller.
    StoreConfig,
    /// Set the power of one cell.
    SetPower { row: u32, col: u32, power: u32 },
    /// Read the power of one cell.
    GetPower { row: u32, col: u32 },
}

impl From<DeviceAction> for DeviceCommand {
    fn from(action: DeviceAction) -> Self {
        match action {
            DeviceAction::ReadWidth => DeviceCommand::ReadWidth,
            DeviceAction::ReadHeight => DeviceCommand::ReadHeight,
            DeviceAction::WriteWidth { value } => DeviceCommand::WriteWidth(value),
            DeviceAction::WriteHeight { value } => DeviceCommand::WriteHeight(value),
            DeviceAction::WriteAddressList { addresses } => {
                DeviceCommand::WriteAddressList(addresses)
            }
            DeviceAction::ReadAddressList => DeviceCommand::ReadAddressList,
            DeviceAction::ScanAddresses => DeviceCommand::ScanAddresses,
            DeviceAction::BlinkallStart => DeviceCommand::BlinkAllStart,
            DeviceAction::BlinkallStop => DeviceCommand::BlinkAllStop,
            DeviceAction::TestLedEnable { address } => DeviceCommand::TestLedEnable(address),
            DeviceAction::TestLedDisable { address } => DeviceCommand::TestLedDisable(address),
            DeviceAction::StoreConfig => DeviceCommand::StoreConfig,
            DeviceAction::SetPower { row, col, power } => {
                DeviceCommand::SetPower { row, col, power }
            }
            DeviceAction::GetPower { row, col } => DeviceCommand::GetPower { row, col },
        }
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Command verb (e.g. read_width).
    pub verb: String,
    /// Arguments, sent in order.
    pub args: Vec<String>,
    /// Allow verbs the firmware is not known to support.
    #[arg(long)]
    pub allow_unknown: bool,
}

#[derive(Args, Debug, Default)]
pub struct ShellArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
