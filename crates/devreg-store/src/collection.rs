//! In-process collection backend.
//!
//! Each record kind lives in its own [`Table`]: an insertion-ordered map keyed
//! by id plus, for kinds with unique names, a name → id index. Filtered
//! listing stays a linear scan over the ordered map.

use std::collections::HashMap;

use devreg_core::types::*;
use indexmap::IndexMap;

use crate::backend::Backend;
use crate::entity::Entity;
use crate::error::StoreResult;

/// One record kind's rows.
#[derive(Debug)]
pub(crate) struct Table<T> {
    rows: IndexMap<String, T>,
    names: HashMap<String, String>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: IndexMap::new(),
            names: HashMap::new(),
        }
    }
}

impl<T: Entity> Table<T> {
    pub(crate) fn get(&self, id: &str) -> Option<&T> {
        self.rows.get(id)
    }

    pub(crate) fn get_by_name(&self, name: &str) -> Option<&T> {
        if T::UNIQUE_NAME {
            self.names.get(name).and_then(|id| self.rows.get(id))
        } else {
            self.rows.values().find(|row| row.name() == name)
        }
    }

    pub(crate) fn insert(&mut self, record: T) {
        if T::UNIQUE_NAME {
            self.names
                .insert(record.name().to_string(), record.id().to_string());
        }
        self.rows.insert(record.id().to_string(), record);
    }

    pub(crate) fn replace(&mut self, record: T) -> bool {
        let Some(slot) = self.rows.get_mut(record.id()) else {
            return false;
        };
        if T::UNIQUE_NAME && slot.name() != record.name() {
            self.names.remove(slot.name());
            self.names
                .insert(record.name().to_string(), record.id().to_string());
        }
        *slot = record;
        true
    }

    pub(crate) fn remove(&mut self, id: &str) -> bool {
        match self.rows.shift_remove(id) {
            Some(row) => {
                if T::UNIQUE_NAME {
                    self.names.remove(row.name());
                }
                true
            }
            None => false,
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &T> {
        self.rows.values()
    }
}

/// All tables of the collection backend.
#[derive(Debug, Default)]
pub(crate) struct Collections {
    addressables: Table<Addressable>,
    device_services: Table<DeviceService>,
    device_profiles: Table<DeviceProfile>,
    commands: Table<Command>,
    devices: Table<Device>,
    schedules: Table<Schedule>,
    schedule_events: Table<ScheduleEvent>,
    provision_watchers: Table<ProvisionWatcher>,
    device_reports: Table<DeviceReport>,
}

impl Collections {
    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Maps a record kind to its table.
pub(crate) trait Tabled: Entity {
    fn table(collections: &Collections) -> &Table<Self>;
    fn table_mut(collections: &mut Collections) -> &mut Table<Self>;
}

macro_rules! tabled {
    ($ty:ty, $field:ident) => {
        impl Tabled for $ty {
            fn table(collections: &Collections) -> &Table<Self> {
                &collections.$field
            }

            fn table_mut(collections: &mut Collections) -> &mut Table<Self> {
                &mut collections.$field
            }
        }
    };
}

tabled!(Addressable, addressables);
tabled!(DeviceService, device_services);
tabled!(DeviceProfile, device_profiles);
tabled!(Command, commands);
tabled!(Device, devices);
tabled!(Schedule, schedules);
tabled!(ScheduleEvent, schedule_events);
tabled!(ProvisionWatcher, provision_watchers);
tabled!(DeviceReport, device_reports);

impl<T: Tabled> Backend<T> for Collections {
    fn load(&self, id: &str) -> StoreResult<Option<T>> {
        Ok(T::table(self).get(id).cloned())
    }

    fn load_by_name(&self, name: &str) -> StoreResult<Option<T>> {
        Ok(T::table(self).get_by_name(name).cloned())
    }

    fn load_all(&self) -> StoreResult<Vec<T>> {
        Ok(T::table(self).iter().cloned().collect())
    }

    fn insert(&mut self, record: T) -> StoreResult<()> {
        T::table_mut(self).insert(record);
        Ok(())
    }

    fn replace(&mut self, record: T) -> StoreResult<bool> {
        Ok(T::table_mut(self).replace(record))
    }

    fn remove(&mut self, id: &str) -> StoreResult<bool> {
        Ok(T::table_mut(self).remove(id))
    }
}
