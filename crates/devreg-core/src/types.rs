//! Domain types for the device registry.
//!
//! These types describe addressable endpoints, device services, profiles,
//! commands, devices, schedules, schedule events, provision watchers and
//! device reports. Every record carries a store-assigned `id` plus
//! `created`/`modified` timestamps (milliseconds) that callers never set.
//!
//! Reference fields embed the referenced record. Callers fill in only the
//! `id` or the `name` of the referenced record when writing; reads return the
//! referenced record's full current state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Shared enums ──────────────────────────────────────────────────

/// Administrative lock state of a device or device service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdminState {
    Locked,
    #[default]
    Unlocked,
}

/// Operational state of a device, device service or provision watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperatingState {
    #[default]
    Enabled,
    Disabled,
}

// ── Addressable ───────────────────────────────────────────────────

/// Network or protocol endpoint (host/port, MQTT topic, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Addressable {
    pub id: String,
    pub name: String,
    /// Protocol such as "HTTP", "TCP" or "MQTT".
    pub protocol: String,
    pub http_method: String,
    pub address: String,
    pub port: i32,
    pub path: String,
    pub publisher: String,
    pub user: String,
    pub password: String,
    pub topic: String,
    pub created: i64,
    pub modified: i64,
    pub origin: i64,
}

// ── Device service ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceService {
    pub id: String,
    pub name: String,
    pub description: String,
    pub labels: Vec<String>,
    pub admin_state: AdminState,
    pub operating_state: OperatingState,
    pub last_connected: i64,
    pub last_reported: i64,
    /// Endpoint the service listens on.
    pub addressable: Addressable,
    pub created: i64,
    pub modified: i64,
    pub origin: i64,
}

// ── Commands ──────────────────────────────────────────────────────

/// Expected response of a command action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Response {
    pub code: String,
    pub description: String,
    pub expected_values: Vec<String>,
}

/// Path and responses shared by the get and put halves of a command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Action {
    pub path: String,
    pub url: String,
    pub responses: Vec<Response>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Get {
    pub action: Action,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Put {
    pub action: Action,
    pub parameter_names: Vec<String>,
}

/// A named get/put operation exposed by a device profile.
///
/// Command names are not unique across the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Command {
    pub id: String,
    pub name: String,
    pub get: Option<Get>,
    pub put: Option<Put>,
    pub created: i64,
    pub modified: i64,
    pub origin: i64,
}

impl Command {
    /// Overwrite fields of `self` with the non-empty fields of `patch`.
    ///
    /// A name is empty when it is `""`, a get/put when it is absent or equal
    /// to its default, and an origin when it is zero.
    pub fn merge(&mut self, patch: Command) {
        if !patch.name.is_empty() {
            self.name = patch.name;
        }
        if let Some(get) = patch.get.filter(|get| *get != Get::default()) {
            self.get = Some(get);
        }
        if let Some(put) = patch.put.filter(|put| *put != Put::default()) {
            self.put = Some(put);
        }
        if patch.origin != 0 {
            self.origin = patch.origin;
        }
    }
}

// ── Device profile ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceProfile {
    pub id: String,
    pub name: String,
    pub description: String,
    pub manufacturer: String,
    pub model: String,
    pub labels: Vec<String>,
    /// Commands supported by devices of this profile, referenced by id or name.
    pub commands: Vec<Command>,
    pub created: i64,
    pub modified: i64,
    pub origin: i64,
}

// ── Device ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub description: String,
    pub admin_state: AdminState,
    pub operating_state: OperatingState,
    pub labels: Vec<String>,
    pub location: String,
    pub last_connected: i64,
    pub last_reported: i64,
    pub addressable: Addressable,
    pub service: DeviceService,
    pub profile: DeviceProfile,
    pub created: i64,
    pub modified: i64,
    pub origin: i64,
}

// ── Schedules ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Schedule {
    pub id: String,
    pub name: String,
    /// Start time in ISO 8601 basic format (e.g. "20180101T000000").
    pub start: String,
    pub end: String,
    /// ISO 8601 duration between firings (e.g. "PT10S").
    pub frequency: String,
    pub cron: String,
    pub run_once: bool,
    pub created: i64,
    pub modified: i64,
    pub origin: i64,
}

/// Action fired when its owning schedule triggers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleEvent {
    pub id: String,
    pub name: String,
    /// Name of the owning schedule.
    pub schedule: String,
    /// Target of the action.
    pub addressable: Addressable,
    /// JSON body sent with the action.
    pub parameters: String,
    /// Name of the owning device service.
    pub service: String,
    pub created: i64,
    pub modified: i64,
    pub origin: i64,
}

// ── Provisioning ──────────────────────────────────────────────────

/// Matches newly discovered devices and provisions them with a profile and
/// service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionWatcher {
    pub id: String,
    pub name: String,
    pub identifiers: BTreeMap<String, String>,
    pub profile: DeviceProfile,
    pub service: DeviceService,
    pub operating_state: OperatingState,
    pub created: i64,
    pub modified: i64,
    pub origin: i64,
}

// ── Device report ─────────────────────────────────────────────────

/// Readings a device is expected to report when a schedule event fires.
///
/// `device` and `event` are names only and are never validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceReport {
    pub id: String,
    pub name: String,
    pub device: String,
    pub event: String,
    pub expected: Vec<String>,
    pub created: i64,
    pub modified: i64,
    pub origin: i64,
}
