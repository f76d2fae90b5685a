//! redb table definitions for the document backend.
//!
//! Each collection is a table with `u64` keys and `&[u8]` values (JSON
//! documents). Keys are an insertion sequence, so iterating a table yields
//! documents in the order they were first written.

use redb::TableDefinition;

pub const ADDRESSABLE: &str = "addressable";
pub const DEVICE_SERVICE: &str = "deviceService";
pub const DEVICE_PROFILE: &str = "deviceProfile";
pub const COMMAND: &str = "command";
pub const DEVICE: &str = "device";
pub const SCHEDULE: &str = "schedule";
pub const SCHEDULE_EVENT: &str = "scheduleEvent";
pub const PROVISION_WATCHER: &str = "provisionWatcher";
pub const DEVICE_REPORT: &str = "deviceReport";

/// Every collection the document backend writes to.
pub const COLLECTIONS: [&str; 9] = [
    ADDRESSABLE,
    DEVICE_SERVICE,
    DEVICE_PROFILE,
    COMMAND,
    DEVICE,
    SCHEDULE,
    SCHEDULE_EVENT,
    PROVISION_WATCHER,
    DEVICE_REPORT,
];

/// Table backing a known collection.
pub fn collection(name: &str) -> Option<TableDefinition<'_, u64, &'static [u8]>> {
    COLLECTIONS
        .contains(&name)
        .then(|| TableDefinition::new(name))
}
