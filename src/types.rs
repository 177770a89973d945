//! Core data types: readings, device states and register conversions

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Power state derived from the power status register (1 = on, anything else = off)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PowerState {
    On,
    Off,
}

impl PowerState {
    pub fn from_register(raw: u16) -> Self {
        if raw == 1 {
            PowerState::On
        } else {
            PowerState::Off
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::On => write!(f, "ON"),
            PowerState::Off => write!(f, "OFF"),
        }
    }
}

/// Output polarity derived from the polarity register (0 = forward, anything else = reverse)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Polarity {
    Forward,
    Reverse,
}

impl Polarity {
    pub fn from_register(raw: u16) -> Self {
        if raw == 0 {
            Polarity::Forward
        } else {
            Polarity::Reverse
        }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Polarity::Forward => write!(f, "FORWARD"),
            Polarity::Reverse => write!(f, "REVERSE"),
        }
    }
}

/// Connection state of the polling service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConnectionState {
    /// No session established
    Disconnected,
    /// Session establishment in progress
    Connecting,
    /// Session established, polling normally
    Connected,
    /// Consecutive failures exceeded the threshold; reconnecting each cycle
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "DISCONNECTED"),
            ConnectionState::Connecting => write!(f, "CONNECTING"),
            ConnectionState::Connected => write!(f, "CONNECTED"),
            ConnectionState::Error => write!(f, "ERROR"),
        }
    }
}

/// Convert a raw register value to physical units, rounded to 2 decimal places
pub fn scale_register(raw: u16, multiplier: f64) -> f64 {
    ((f64::from(raw) / multiplier) * 100.0).round() / 100.0
}

/// One snapshot of rectifier state, assembled once per poll cycle.
///
/// Either all four physical values are present, or `error` is set and every
/// other field is absent. Error-tagged readings are never journaled and never
/// promoted to the last-good slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reading {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_voltage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_current: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<PowerState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polarity: Option<Polarity>,
    pub timestamp: DateTime<Local>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Reading {
    /// Assemble a reading from the four raw register values
    pub fn from_registers(
        voltage_raw: u16,
        current_raw: u16,
        power_raw: u16,
        polarity_raw: u16,
        voltage_multiplier: f64,
        current_multiplier: f64,
    ) -> Self {
        Self {
            actual_voltage: Some(scale_register(voltage_raw, voltage_multiplier)),
            actual_current: Some(scale_register(current_raw, current_multiplier)),
            power: Some(PowerState::from_register(power_raw)),
            polarity: Some(Polarity::from_register(polarity_raw)),
            timestamp: Local::now(),
            error: None,
        }
    }

    /// Create an error-tagged reading carrying only the failure text and a timestamp
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            actual_voltage: None,
            actual_current: None,
            power: None,
            polarity: None,
            timestamp: Local::now(),
            error: Some(error.into()),
        }
    }

    /// True if all four physical values are present
    pub fn is_complete(&self) -> bool {
        self.actual_voltage.is_some()
            && self.actual_current.is_some()
            && self.power.is_some()
            && self.polarity.is_some()
    }
}
