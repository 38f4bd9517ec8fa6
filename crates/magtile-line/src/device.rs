use crate::command::Command;
use crate::verbs;

/// The typed MagTile command set.
///
/// Each variant renders to exactly one wire [`Command`]; integers are written
/// in plain decimal and address lists keep the caller's order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCommand {
    ReadWidth,
    ReadHeight,
    WriteWidth(u32),
    WriteHeight(u32),
    WriteAddressList(Vec<u32>),
    ReadAddressList,
    ScanAddresses,
    BlinkAllStart,
    BlinkAllStop,
    TestLedEnable(u32),
    TestLedDisable(u32),
    StoreConfig,
    SetPower { row: u32, col: u32, power: u32 },
    GetPower { row: u32, col: u32 },
}

impl DeviceCommand {
    /// The wire verb for this command.
    pub fn verb(&self) -> &'static str {
        match self {
            DeviceCommand::ReadWidth => verbs::READ_WIDTH,
            DeviceCommand::ReadHeight => verbs::READ_HEIGHT,
            DeviceCommand::WriteWidth(_) => verbs::WRITE_WIDTH,
            DeviceCommand::WriteHeight(_) => verbs::WRITE_HEIGHT,
            DeviceCommand::WriteAddressList(_) => verbs::WRITE_ADDRESS_LIST,
            DeviceCommand::ReadAddressList => verbs::READ_ADDRESS_LIST,
            DeviceCommand::ScanAddresses => verbs::SCAN_ADDRESSES,
            DeviceCommand::BlinkAllStart => verbs::BLINKALL_START,
            DeviceCommand::BlinkAllStop => verbs::BLINKALL_STOP,
            DeviceCommand::TestLedEnable(_) => verbs::TEST_LED_ENABLE,
            DeviceCommand::TestLedDisable(_) => verbs::TEST_LED_DISABLE,
            DeviceCommand::StoreConfig => verbs::STORE_CONFIG,
            DeviceCommand::SetPower { .. } => verbs::SET_POWER,
            DeviceCommand::GetPower { .. } => verbs::GET_POWER,
        }
    }

    /// Build the wire command.
    pub fn to_command(&self) -> Command {
        let cmd = Command::new(self.verb());
        match self {
            DeviceCommand::WriteWidth(value) | DeviceCommand::WriteHeight(value) => cmd.arg(value),
            DeviceCommand::WriteAddressList(addresses) => {
                Command::with_args(self.verb(), addresses)
            }
            DeviceCommand::TestLedEnable(address) | DeviceCommand::TestLedDisable(address) => {
                cmd.arg(address)
            }
            DeviceCommand::SetPower { row, col, power } => cmd.arg(row).arg(col).arg(power),
            DeviceCommand::GetPower { row, col } => cmd.arg(row).arg(col),
            _ => cmd,
        }
    }
}

impl From<&DeviceCommand> for Command {
    fn from(value: &DeviceCommand) -> Self {
        value.to_command()
    }
}
