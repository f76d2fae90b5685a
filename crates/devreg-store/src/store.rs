//! MetadataStore: the referential metadata store facade.
//!
//! Provides Add/Get/List/Update/Delete over every record kind of the device
//! registry. Writes check name uniqueness and reference existence; reads
//! hydrate every reference with the referenced record's current state. The
//! same operations run unchanged over the collection backend and the
//! document backend.

use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use devreg_core::config::{BackendKind, StoreConfig};
use devreg_core::types::*;
use tracing::debug;

use crate::backend::{Backend, Storage};
use crate::collection::Collections;
use crate::document::{DocumentBackend, DocumentSession, RedbSession};
use crate::entity::Entity;
use crate::error::{StoreError, StoreResult};
use crate::ids::{Clock, IdGenerator, SystemClock, UuidGenerator};
use crate::relations::Record;

/// Thread-safe metadata store. Clones share the same backend.
#[derive(Clone)]
pub struct MetadataStore {
    storage: Arc<RwLock<Storage>>,
    backend: BackendKind,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl MetadataStore {
    fn with_storage(storage: Storage, backend: BackendKind) -> Self {
        debug!(?backend, "metadata store opened");
        Self {
            storage: Arc::new(RwLock::new(storage)),
            backend,
            ids: Arc::new(UuidGenerator),
            clock: Arc::new(SystemClock::new()),
        }
    }

    /// Create an empty store over in-process collections.
    pub fn collection() -> Self {
        Self::with_storage(
            Storage::Collections(Collections::default()),
            BackendKind::Collection,
        )
    }

    /// Create a store over an existing document session.
    pub fn document(session: Arc<dyn DocumentSession>) -> Self {
        Self::with_storage(
            Storage::Documents(DocumentBackend::new(session)),
            BackendKind::Document,
        )
    }

    /// Open (or create) a redb document database at the given path.
    pub fn open_document(path: &Path) -> StoreResult<Self> {
        let session = RedbSession::open(path)?;
        Ok(Self::document(Arc::new(session)))
    }

    /// Create a store over an ephemeral in-memory redb document database.
    pub fn open_document_in_memory() -> StoreResult<Self> {
        let session = RedbSession::open_in_memory()?;
        Ok(Self::document(Arc::new(session)))
    }

    /// Open the backend selected by a configuration.
    pub fn from_config(config: &StoreConfig) -> StoreResult<Self> {
        match config.store.backend {
            BackendKind::Collection => Ok(Self::collection()),
            BackendKind::Document => match config.document_path() {
                Some(path) => Self::open_document(path),
                None => Self::open_document_in_memory(),
            },
        }
    }

    /// Replace the identifier source used for new records.
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Replace the timestamp source used for `created`/`modified`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Storage>> {
        self.storage.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Storage>> {
        self.storage.write().map_err(|_| StoreError::Poisoned)
    }

    // ── Generic operations ─────────────────────────────────────────

    fn add<T: Record>(&self, record: &T) -> StoreResult<String> {
        let mut record = record.clone();
        let mut storage = self.write()?;
        if T::UNIQUE_NAME && Backend::<T>::load_by_name(&*storage, record.name())?.is_some() {
            return Err(StoreError::NotUnique {
                kind: T::KIND,
                name: record.name().to_string(),
            });
        }
        record.link(&storage)?;

        let id = self.ids.next_id();
        let now = self.clock.now_millis();
        record.set_id(id.clone());
        record.stamp(now, now);
        Backend::<T>::insert(&mut *storage, record)?;
        debug!(kind = T::KIND, %id, "record added");
        Ok(id)
    }

    fn get<T: Record>(&self, id: &str) -> StoreResult<T> {
        let storage = self.read()?;
        let mut record = Backend::<T>::load(&*storage, id)?
            .ok_or_else(|| StoreError::not_found(T::KIND, id))?;
        record.hydrate(&storage)?;
        Ok(record)
    }

    fn get_by_name<T: Record>(&self, name: &str) -> StoreResult<T> {
        let storage = self.read()?;
        let mut record = Backend::<T>::load_by_name(&*storage, name)?
            .ok_or_else(|| StoreError::not_found(T::KIND, name))?;
        record.hydrate(&storage)?;
        Ok(record)
    }

    /// Hydrated copies of the stored records matching `filter`, in insertion
    /// order. Fails as a whole if any match cannot be hydrated.
    fn list<T: Record>(&self, filter: impl Fn(&T) -> bool) -> StoreResult<Vec<T>> {
        let storage = self.read()?;
        Backend::<T>::load_all(&*storage)?
            .into_iter()
            .filter(|record| filter(record))
            .map(|mut record| {
                record.hydrate(&storage)?;
                Ok(record)
            })
            .collect()
    }

    fn update<T: Record>(&self, record: &T) -> StoreResult<()> {
        let mut storage = self.write()?;
        let stored = Backend::<T>::load(&*storage, record.id())?
            .ok_or_else(|| StoreError::not_found(T::KIND, record.id()))?;
        self.replace(&mut storage, &stored, record.clone())
    }

    /// Write `record` over `stored`, keeping its id and creation stamp.
    fn replace<T: Record>(
        &self,
        storage: &mut Storage,
        stored: &T,
        mut record: T,
    ) -> StoreResult<()> {
        if T::UNIQUE_NAME && record.name() != stored.name() {
            if let Some(other) = Backend::<T>::load_by_name(&*storage, record.name())? {
                if other.id() != stored.id() {
                    return Err(StoreError::NotUnique {
                        kind: T::KIND,
                        name: record.name().to_string(),
                    });
                }
            }
        }
        record.link(storage)?;
        record.stamp(stored.created(), self.clock.now_millis());

        let id = stored.id().to_string();
        if !Backend::<T>::replace(storage, record)? {
            return Err(StoreError::not_found(T::KIND, id));
        }
        debug!(kind = T::KIND, %id, "record updated");
        Ok(())
    }

    fn delete<T: Record>(&self, id: &str) -> StoreResult<()> {
        let mut storage = self.write()?;
        if !Backend::<T>::remove(&mut *storage, id)? {
            return Err(StoreError::not_found(T::KIND, id));
        }
        debug!(kind = T::KIND, %id, "record deleted");
        Ok(())
    }

    /// Remove every record of every kind.
    pub fn scrub(&self) -> StoreResult<()> {
        self.write()?.clear()?;
        debug!("metadata store scrubbed");
        Ok(())
    }

    // ── Addressables ───────────────────────────────────────────────

    pub fn add_addressable(&self, addressable: &Addressable) -> StoreResult<String> {
        self.add(addressable)
    }

    pub fn get_addressable_by_id(&self, id: &str) -> StoreResult<Addressable> {
        self.get(id)
    }

    pub fn get_addressable_by_name(&self, name: &str) -> StoreResult<Addressable> {
        self.get_by_name(name)
    }

    pub fn get_addressables(&self) -> StoreResult<Vec<Addressable>> {
        self.list(|_: &Addressable| true)
    }

    pub fn get_addressables_by_topic(&self, topic: &str) -> StoreResult<Vec<Addressable>> {
        self.list(|a: &Addressable| a.topic == topic)
    }

    pub fn get_addressables_by_port(&self, port: i32) -> StoreResult<Vec<Addressable>> {
        self.list(|a: &Addressable| a.port == port)
    }

    pub fn get_addressables_by_publisher(&self, publisher: &str) -> StoreResult<Vec<Addressable>> {
        self.list(|a: &Addressable| a.publisher == publisher)
    }

    pub fn get_addressables_by_address(&self, address: &str) -> StoreResult<Vec<Addressable>> {
        self.list(|a: &Addressable| a.address == address)
    }

    pub fn update_addressable(&self, addressable: &Addressable) -> StoreResult<()> {
        self.update(addressable)
    }

    /// Delete an addressable. Records still referencing it fail to hydrate
    /// afterwards.
    pub fn delete_addressable_by_id(&self, id: &str) -> StoreResult<()> {
        self.delete::<Addressable>(id)
    }

    // ── Device services ────────────────────────────────────────────

    pub fn add_device_service(&self, service: &DeviceService) -> StoreResult<String> {
        self.add(service)
    }

    pub fn get_device_service_by_id(&self, id: &str) -> StoreResult<DeviceService> {
        self.get(id)
    }

    pub fn get_device_service_by_name(&self, name: &str) -> StoreResult<DeviceService> {
        self.get_by_name(name)
    }

    pub fn get_device_services(&self) -> StoreResult<Vec<DeviceService>> {
        self.list(|_: &DeviceService| true)
    }

    pub fn get_device_services_by_addressable_id(
        &self,
        addressable_id: &str,
    ) -> StoreResult<Vec<DeviceService>> {
        self.list(|s: &DeviceService| s.addressable.id == addressable_id)
    }

    pub fn get_device_services_with_label(&self, label: &str) -> StoreResult<Vec<DeviceService>> {
        self.list(|s: &DeviceService| has_label(&s.labels, label))
    }

    pub fn update_device_service(&self, service: &DeviceService) -> StoreResult<()> {
        self.update(service)
    }

    pub fn delete_device_service_by_id(&self, id: &str) -> StoreResult<()> {
        self.delete::<DeviceService>(id)
    }

    // ── Device profiles ────────────────────────────────────────────

    pub fn add_device_profile(&self, profile: &DeviceProfile) -> StoreResult<String> {
        self.add(profile)
    }

    pub fn get_device_profile_by_id(&self, id: &str) -> StoreResult<DeviceProfile> {
        self.get(id)
    }

    pub fn get_device_profile_by_name(&self, name: &str) -> StoreResult<DeviceProfile> {
        self.get_by_name(name)
    }

    pub fn get_device_profiles(&self) -> StoreResult<Vec<DeviceProfile>> {
        self.list(|_: &DeviceProfile| true)
    }

    pub fn get_device_profiles_by_model(&self, model: &str) -> StoreResult<Vec<DeviceProfile>> {
        self.list(|p: &DeviceProfile| p.model == model)
    }

    pub fn get_device_profiles_with_label(&self, label: &str) -> StoreResult<Vec<DeviceProfile>> {
        self.list(|p: &DeviceProfile| has_label(&p.labels, label))
    }

    pub fn get_device_profiles_by_manufacturer(
        &self,
        manufacturer: &str,
    ) -> StoreResult<Vec<DeviceProfile>> {
        self.list(|p: &DeviceProfile| p.manufacturer == manufacturer)
    }

    pub fn get_device_profiles_by_manufacturer_and_model(
        &self,
        manufacturer: &str,
        model: &str,
    ) -> StoreResult<Vec<DeviceProfile>> {
        self.list(|p: &DeviceProfile| p.manufacturer == manufacturer && p.model == model)
    }

    /// Profiles whose command list references the given command id.
    pub fn get_device_profiles_using_command(
        &self,
        command_id: &str,
    ) -> StoreResult<Vec<DeviceProfile>> {
        self.list(|p: &DeviceProfile| p.commands.iter().any(|c| c.id == command_id))
    }

    pub fn update_device_profile(&self, profile: &DeviceProfile) -> StoreResult<()> {
        self.update(profile)
    }

    pub fn delete_device_profile_by_id(&self, id: &str) -> StoreResult<()> {
        self.delete::<DeviceProfile>(id)
    }

    // ── Commands ───────────────────────────────────────────────────

    /// Add a command. Command names may repeat.
    pub fn add_command(&self, command: &Command) -> StoreResult<String> {
        self.add(command)
    }

    pub fn get_command_by_id(&self, id: &str) -> StoreResult<Command> {
        self.get(id)
    }

    /// Every command with this name, in insertion order.
    pub fn get_commands_by_name(&self, name: &str) -> StoreResult<Vec<Command>> {
        self.list(|c: &Command| c.name == name)
    }

    pub fn get_commands(&self) -> StoreResult<Vec<Command>> {
        self.list(|_: &Command| true)
    }

    /// Merge the non-empty fields of `patch` into the stored command with
    /// the same id.
    pub fn update_command(&self, patch: &Command) -> StoreResult<()> {
        let mut storage = self.write()?;
        let stored: Command = Backend::<Command>::load(&*storage, &patch.id)?
            .ok_or_else(|| StoreError::not_found(Command::KIND, patch.id.as_str()))?;
        let mut merged = stored.clone();
        merged.merge(patch.clone());
        self.replace(&mut storage, &stored, merged)
    }

    pub fn delete_command_by_id(&self, id: &str) -> StoreResult<()> {
        self.delete::<Command>(id)
    }

    // ── Devices ────────────────────────────────────────────────────

    pub fn add_device(&self, device: &Device) -> StoreResult<String> {
        self.add(device)
    }

    pub fn get_device_by_id(&self, id: &str) -> StoreResult<Device> {
        self.get(id)
    }

    pub fn get_device_by_name(&self, name: &str) -> StoreResult<Device> {
        self.get_by_name(name)
    }

    pub fn get_devices(&self) -> StoreResult<Vec<Device>> {
        self.list(|_: &Device| true)
    }

    pub fn get_devices_by_profile_id(&self, profile_id: &str) -> StoreResult<Vec<Device>> {
        self.list(|d: &Device| d.profile.id == profile_id)
    }

    pub fn get_devices_by_service_id(&self, service_id: &str) -> StoreResult<Vec<Device>> {
        self.list(|d: &Device| d.service.id == service_id)
    }

    pub fn get_devices_by_addressable_id(&self, addressable_id: &str) -> StoreResult<Vec<Device>> {
        self.list(|d: &Device| d.addressable.id == addressable_id)
    }

    pub fn get_devices_with_label(&self, label: &str) -> StoreResult<Vec<Device>> {
        self.list(|d: &Device| has_label(&d.labels, label))
    }

    pub fn update_device(&self, device: &Device) -> StoreResult<()> {
        self.update(device)
    }

    pub fn delete_device_by_id(&self, id: &str) -> StoreResult<()> {
        self.delete::<Device>(id)
    }

    // ── Schedules ──────────────────────────────────────────────────

    pub fn add_schedule(&self, schedule: &Schedule) -> StoreResult<String> {
        self.add(schedule)
    }

    pub fn get_schedule_by_id(&self, id: &str) -> StoreResult<Schedule> {
        self.get(id)
    }

    pub fn get_schedule_by_name(&self, name: &str) -> StoreResult<Schedule> {
        self.get_by_name(name)
    }

    pub fn get_schedules(&self) -> StoreResult<Vec<Schedule>> {
        self.list(|_: &Schedule| true)
    }

    pub fn update_schedule(&self, schedule: &Schedule) -> StoreResult<()> {
        self.update(schedule)
    }

    pub fn delete_schedule_by_id(&self, id: &str) -> StoreResult<()> {
        self.delete::<Schedule>(id)
    }

    // ── Schedule events ────────────────────────────────────────────

    pub fn add_schedule_event(&self, event: &ScheduleEvent) -> StoreResult<String> {
        self.add(event)
    }

    pub fn get_schedule_event_by_id(&self, id: &str) -> StoreResult<ScheduleEvent> {
        self.get(id)
    }

    pub fn get_schedule_event_by_name(&self, name: &str) -> StoreResult<ScheduleEvent> {
        self.get_by_name(name)
    }

    pub fn get_schedule_events(&self) -> StoreResult<Vec<ScheduleEvent>> {
        self.list(|_: &ScheduleEvent| true)
    }

    pub fn get_schedule_events_by_schedule_name(
        &self,
        schedule: &str,
    ) -> StoreResult<Vec<ScheduleEvent>> {
        self.list(|e: &ScheduleEvent| e.schedule == schedule)
    }

    pub fn get_schedule_events_by_addressable_id(
        &self,
        addressable_id: &str,
    ) -> StoreResult<Vec<ScheduleEvent>> {
        self.list(|e: &ScheduleEvent| e.addressable.id == addressable_id)
    }

    pub fn get_schedule_events_by_service_name(
        &self,
        service: &str,
    ) -> StoreResult<Vec<ScheduleEvent>> {
        self.list(|e: &ScheduleEvent| e.service == service)
    }

    pub fn update_schedule_event(&self, event: &ScheduleEvent) -> StoreResult<()> {
        self.update(event)
    }

    pub fn delete_schedule_event_by_id(&self, id: &str) -> StoreResult<()> {
        self.delete::<ScheduleEvent>(id)
    }

    // ── Provision watchers ─────────────────────────────────────────

    pub fn add_provision_watcher(&self, watcher: &ProvisionWatcher) -> StoreResult<String> {
        self.add(watcher)
    }

    pub fn get_provision_watcher_by_id(&self, id: &str) -> StoreResult<ProvisionWatcher> {
        self.get(id)
    }

    pub fn get_provision_watcher_by_name(&self, name: &str) -> StoreResult<ProvisionWatcher> {
        self.get_by_name(name)
    }

    pub fn get_provision_watchers(&self) -> StoreResult<Vec<ProvisionWatcher>> {
        self.list(|_: &ProvisionWatcher| true)
    }

    pub fn get_provision_watchers_by_profile_id(
        &self,
        profile_id: &str,
    ) -> StoreResult<Vec<ProvisionWatcher>> {
        self.list(|w: &ProvisionWatcher| w.profile.id == profile_id)
    }

    pub fn get_provision_watchers_by_service_id(
        &self,
        service_id: &str,
    ) -> StoreResult<Vec<ProvisionWatcher>> {
        self.list(|w: &ProvisionWatcher| w.service.id == service_id)
    }

    /// Watchers whose identifier map holds `key` with exactly `value`.
    pub fn get_provision_watchers_by_identifier(
        &self,
        key: &str,
        value: &str,
    ) -> StoreResult<Vec<ProvisionWatcher>> {
        self.list(|w: &ProvisionWatcher| w.identifiers.get(key).is_some_and(|v| v == value))
    }

    pub fn update_provision_watcher(&self, watcher: &ProvisionWatcher) -> StoreResult<()> {
        self.update(watcher)
    }

    pub fn delete_provision_watcher_by_id(&self, id: &str) -> StoreResult<()> {
        self.delete::<ProvisionWatcher>(id)
    }

    // ── Device reports ─────────────────────────────────────────────

    pub fn add_device_report(&self, report: &DeviceReport) -> StoreResult<String> {
        self.add(report)
    }

    pub fn get_device_report_by_id(&self, id: &str) -> StoreResult<DeviceReport> {
        self.get(id)
    }

    pub fn get_device_report_by_name(&self, name: &str) -> StoreResult<DeviceReport> {
        self.get_by_name(name)
    }

    pub fn get_device_reports(&self) -> StoreResult<Vec<DeviceReport>> {
        self.list(|_: &DeviceReport| true)
    }

    pub fn get_device_reports_by_device_name(
        &self,
        device: &str,
    ) -> StoreResult<Vec<DeviceReport>> {
        self.list(|r: &DeviceReport| r.device == device)
    }

    pub fn get_device_reports_by_schedule_event_name(
        &self,
        event: &str,
    ) -> StoreResult<Vec<DeviceReport>> {
        self.list(|r: &DeviceReport| r.event == event)
    }

    pub fn update_device_report(&self, report: &DeviceReport) -> StoreResult<()> {
        self.update(report)
    }

    pub fn delete_device_report_by_id(&self, id: &str) -> StoreResult<()> {
        self.delete::<DeviceReport>(id)
    }
}

fn has_label(labels: &[String], label: &str) -> bool {
    labels.iter().any(|l| l == label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

    struct Sequential(AtomicU64);

    impl IdGenerator for Sequential {
        fn next_id(&self) -> String {
            format!("id-{}", self.0.fetch_add(1, Ordering::SeqCst))
        }
    }

    struct Ticking(AtomicI64);

    impl Clock for Ticking {
        fn now_millis(&self) -> i64 {
            self.0.fetch_add(10, Ordering::SeqCst)
        }
    }

    fn store() -> MetadataStore {
        MetadataStore::collection()
            .with_id_generator(Arc::new(Sequential(AtomicU64::new(1))))
            .with_clock(Arc::new(Ticking(AtomicI64::new(100))))
    }

    #[test]
    fn add_uses_injected_collaborators() {
        let store = store();
        let id = store
            .add_schedule(&Schedule {
                name: "10sec".to_string(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(id, "id-1");

        let schedule = store.get_schedule_by_id(&id).unwrap();
        assert_eq!(schedule.created, 100);
        assert_eq!(schedule.modified, 100);
    }

    #[test]
    fn add_ignores_caller_identity_and_stamps() {
        let store = store();
        let id = store
            .add_schedule(&Schedule {
                id: "mine".to_string(),
                name: "10sec".to_string(),
                created: 5,
                modified: 5,
                ..Default::default()
            })
            .unwrap();

        assert_eq!(id, "id-1");
        assert!(store.get_schedule_by_id("mine").unwrap_err().is_not_found());
        assert_eq!(store.get_schedule_by_id(&id).unwrap().created, 100);
    }

    #[test]
    fn update_keeps_created_and_moves_modified() {
        let store = store();
        let id = store
            .add_schedule(&Schedule {
                name: "10sec".to_string(),
                ..Default::default()
            })
            .unwrap();

        let mut schedule = store.get_schedule_by_id(&id).unwrap();
        schedule.frequency = "PT20S".to_string();
        schedule.created = 0;
        store.update_schedule(&schedule).unwrap();

        let stored = store.get_schedule_by_id(&id).unwrap();
        assert_eq!(stored.frequency, "PT20S");
        assert_eq!(stored.created, 100);
        assert_eq!(stored.modified, 110);
    }

    #[test]
    fn from_config_selects_backend() {
        let collection = MetadataStore::from_config(&StoreConfig::default()).unwrap();
        assert_eq!(collection.backend(), BackendKind::Collection);

        let config = StoreConfig::from_toml("[store]\nbackend = \"document\"\n").unwrap();
        let document = MetadataStore::from_config(&config).unwrap();
        assert_eq!(document.backend(), BackendKind::Document);
    }

    #[test]
    fn from_config_opens_document_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.redb");
        let toml = format!(
            "[store]\nbackend = \"document\"\n\n[document]\npath = {:?}\n",
            path.display().to_string()
        );
        let config = StoreConfig::from_toml(&toml).unwrap();

        {
            let store = MetadataStore::from_config(&config).unwrap();
            store
                .add_addressable(&Addressable {
                    name: "addr1".to_string(),
                    ..Default::default()
                })
                .unwrap();
        }

        let reopened = MetadataStore::from_config(&config).unwrap();
        assert_eq!(reopened.get_addressables().unwrap().len(), 1);
    }
}
