use uuid::Uuid;

/**
 * The name the mug advertises while it is pairable.
 */
pub const MUG_DEVICE_NAME: &str = "Ember Ceramic Mug";

/**
 * How many connect+pair attempts to make in one burst before backing off.
 */
pub const CONNECT_ATTEMPTS: u32 = 10;

/**
 * How long (milliseconds) to wait after a failed connect attempt.
 */
pub const CONNECT_RETRY_DELAY: u64 = 30_000;

/**
 * How long (milliseconds) to back off after a whole burst of connect
 * attempts has failed.
 */
pub const CONNECT_BACKOFF_DELAY: u64 = 5 * 60_000;

/**
 * How long (milliseconds) each step of the dwell interval between poll
 * cycles lasts. The connection is checked on every step.
 */
pub const DWELL_CHECK_DELAY: u64 = 2_000;

/**
 * How many dwell steps to take between poll cycles (15 * 2s = 30s).
 */
pub const DWELL_CHECKS: u32 = 15;

/**
 * How long (milliseconds) between scan sweeps while locating the mug by
 * address, and how many sweeps to make before giving up.
 */
pub const DISCOVERY_POLL_DELAY: u64 = 1_000;
pub const DISCOVERY_POLLS: u32 = 30;

pub const CURRENT_TEMP_CHARACTERISTIC: &str = "fc540002-236c-4c94-8fa9-944a3e5353fa";
pub const TARGET_TEMP_CHARACTERISTIC: &str = "fc540003-236c-4c94-8fa9-944a3e5353fa";
pub const BATTERY_CHARACTERISTIC: &str = "fc540007-236c-4c94-8fa9-944a3e5353fa";
pub const LED_COLOR_CHARACTERISTIC: &str = "fc540014-236c-4c94-8fa9-944a3e5353fa";
pub const STATE_CHARACTERISTIC: &str = "fc540012-236c-4c94-8fa9-944a3e5353fa";

/**
 * Characteristics with unknown semantics. They are read every poll cycle
 * and logged verbatim for future investigation, never interpreted.
 */
pub const UNKNOWN_READ_CHARACTERISTICS: [&str; 5] = [
    "fc540001-236c-4c94-8fa9-944a3e5353fa",
    "fc540004-236c-4c94-8fa9-944a3e5353fa",
    "fc540005-236c-4c94-8fa9-944a3e5353fa",
    "fc540006-236c-4c94-8fa9-944a3e5353fa",
    "fc540008-236c-4c94-8fa9-944a3e5353fa",
];

pub fn make_current_temp_uuid() -> Uuid {
    Uuid::parse_str(CURRENT_TEMP_CHARACTERISTIC).unwrap()
}

pub fn make_target_temp_uuid() -> Uuid {
    Uuid::parse_str(TARGET_TEMP_CHARACTERISTIC).unwrap()
}

pub fn make_battery_uuid() -> Uuid {
    Uuid::parse_str(BATTERY_CHARACTERISTIC).unwrap()
}

pub fn make_led_color_uuid() -> Uuid {
    Uuid::parse_str(LED_COLOR_CHARACTERISTIC).unwrap()
}

pub fn make_state_uuid() -> Uuid {
    Uuid::parse_str(STATE_CHARACTERISTIC).unwrap()
}

pub fn make_unknown_read_uuids() -> Vec<Uuid> {
    UNKNOWN_READ_CHARACTERISTICS
        .iter()
        .map(|id| Uuid::parse_str(id).unwrap())
        .collect()
}
