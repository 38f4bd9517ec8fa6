//! Command verbs understood by the MagTile firmware.
//!
//! The vocabulary is fixed; there is no version negotiation.

/// Query the tile grid width.
pub const READ_WIDTH: &str = "read_width";

/// Query the tile grid height.
pub const READ_HEIGHT: &str = "read_height";

/// Set the tile grid width.
pub const WRITE_WIDTH: &str = "write_width";

/// Set the tile grid height.
pub const WRITE_HEIGHT: &str = "write_height";

/// Replace the ordered list of tile bus addresses.
pub const WRITE_ADDRESS_LIST: &str = "write_address_list";

/// Query the ordered list of tile bus addresses.
pub const READ_ADDRESS_LIST: &str = "read_address_list";

/// Probe the bus for responding tiles.
pub const SCAN_ADDRESSES: &str = "scan_addresses";

/// Start blinking every tile.
pub const BLINKALL_START: &str = "blinkall_start";

/// Stop blinking every tile.
pub const BLINKALL_STOP: &str = "blinkall_stop";

/// Light the test LED of one tile.
pub const TEST_LED_ENABLE: &str = "test_led_enable";

/// Turn off the test LED of one tile.
pub const TEST_LED_DISABLE: &str = "test_led_disable";

/// Persist the current configuration on the device.
pub const STORE_CONFIG: &str = "store_config";

/// Set the power level of one cell.
pub const SET_POWER: &str = "set_power";

/// Query the power level of one cell.
pub const GET_POWER: &str = "get_power";

/// Every verb, in firmware documentation order.
pub const ALL: [&str; 14] = [
    READ_WIDTH,
    READ_HEIGHT,
    WRITE_WIDTH,
    WRITE_HEIGHT,
    WRITE_ADDRESS_LIST,
    READ_ADDRESS_LIST,
    SCAN_ADDRESSES,
    BLINKALL_START,
    BLINKALL_STOP,
    TEST_LED_ENABLE,
    TEST_LED_DISABLE,
    STORE_CONFIG,
    SET_POWER,
    GET_POWER,
];

/// Returns true if the firmware knows `verb`.
pub fn is_known(verb: &str) -> bool {
    ALL.contains(&verb)
}
