use std::io;
use thiserror::Error;
use uuid::Uuid;
use btleplug;
use serde_json;

/// Failures crossing the BLE capability boundary (connect, pair, read,
/// write, subscribe, disconnect).
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Error communicating with device (btleplug): {source}")]
    Btle { #[from] source: btleplug::Error },

    #[error("Characteristic {0} is not available on the peripheral")]
    MissingCharacteristic(Uuid),

    #[error("No peripheral with address {0} was found")]
    PeripheralNotFound(String),

    #[error("No bluetooth adapter is available")]
    NoAdapter,

    #[error("Transport failure: {0}")]
    Failed(String),
}

/// A characteristic payload that does not match the mug's wire format.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Temperature payload must be 2 bytes, got {0}")]
    TemperatureLength(usize),

    #[error("Battery payload is empty")]
    BatteryEmpty,

    #[error("Color payload must be at least 3 bytes, got {0}")]
    ColorLength(usize),
}

#[derive(Error, Debug, PartialEq)]
pub enum EncodeError {
    #[error("Temperature {0} does not fit the 16-bit wire format")]
    TemperatureRange(f64),
}

/// Anything that can escape one pass of the session loop. Caught only by
/// the outer restart loop, never silently dropped.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("The session task has stopped")]
    Stopped,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to determine path to config file")]
    NoConfigPath,

    #[error("Failed to read config file: {source}")]
    IOError { #[from] source: io::Error },

    #[error("Failed to parse config file: {source}")]
    JsonError { #[from] source: serde_json::Error },
}

#[derive(Error, Debug)]
pub enum AppRunError {
    #[error("Failed to start daemon (config): {source}")]
    Config { #[from] source: ConfigError },

    #[error("Failed to start daemon (bluetooth): {source}")]
    Transport { #[from] source: TransportError },

    #[error("No mug address configured; pass --address or set it in the config file")]
    NoAddress,
}
