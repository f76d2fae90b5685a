//! Uniform access to identity, name and timestamps of every stored record.

use devreg_core::types::*;

pub(crate) trait Entity: Clone + Default + Send + Sync + 'static {
    /// Human-readable kind, used in errors and log fields.
    const KIND: &'static str;
    /// Whether `add` rejects a second record with the same name.
    const UNIQUE_NAME: bool = true;

    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn set_name(&mut self, name: String);
    fn created(&self) -> i64;
    fn stamp(&mut self, created: i64, modified: i64);

    /// Id-and-name placeholder kept in place of a referenced record.
    fn stub(&self) -> Self {
        let mut stub = Self::default();
        stub.set_id(self.id().to_string());
        stub.set_name(self.name().to_string());
        stub
    }

    /// Key a reference is known by: the id, or the name when no id was given.
    fn reference_key(&self) -> &str {
        if self.id().is_empty() {
            self.name()
        } else {
            self.id()
        }
    }

    /// "kind name" (or "kind id" for an unnamed record), naming the owner of
    /// a reference in errors.
    fn label(&self) -> String {
        let key = if self.name().is_empty() {
            self.id()
        } else {
            self.name()
        };
        format!("{} {key}", Self::KIND)
    }
}

macro_rules! entity {
    ($ty:ty, $kind:literal) => {
        entity!($ty, $kind, true);
    };
    ($ty:ty, $kind:literal, $unique:expr) => {
        impl Entity for $ty {
            const KIND: &'static str = $kind;
            const UNIQUE_NAME: bool = $unique;

            fn id(&self) -> &str {
                &self.id
            }

            fn name(&self) -> &str {
                &self.name
            }

            fn set_id(&mut self, id: String) {
                self.id = id;
            }

            fn set_name(&mut self, name: String) {
                self.name = name;
            }

            fn created(&self) -> i64 {
                self.created
            }

            fn stamp(&mut self, created: i64, modified: i64) {
                self.created = created;
                self.modified = modified;
            }
        }
    };
}

entity!(Addressable, "addressable");
entity!(DeviceService, "device service");
entity!(DeviceProfile, "device profile");
entity!(Command, "command", false);
entity!(Device, "device");
entity!(Schedule, "schedule");
entity!(ScheduleEvent, "schedule event");
entity!(ProvisionWatcher, "provision watcher");
entity!(DeviceReport, "device report");
