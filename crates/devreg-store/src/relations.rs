//! Reference handling shared by both backends.
//!
//! `link` runs on write: every required reference is looked up by id, then
//! by name, and replaced with an id-and-name stub of the record it found.
//! `hydrate` runs on read: every stub is replaced with the referenced
//! record's current state, recursively.

use devreg_core::types::*;

use crate::backend::{Backend, Storage};
use crate::collection::Tabled;
use crate::document::Document;
use crate::entity::Entity;
use crate::error::{StoreError, StoreResult};

pub(crate) trait Relations: Entity {
    /// Resolve the references supplied by a caller before the record is written.
    fn link(&mut self, _storage: &Storage) -> StoreResult<()> {
        Ok(())
    }

    /// Replace stored reference stubs with the referenced records.
    fn hydrate(&mut self, _storage: &Storage) -> StoreResult<()> {
        Ok(())
    }
}

/// A record kind both backends can store.
pub(crate) trait Record: Relations + Tabled + Document {}

impl<T: Relations + Tabled + Document> Record for T {}

fn link_reference<R: Record>(reference: &mut R, storage: &Storage, owner: &str) -> StoreResult<()> {
    if reference.id().is_empty() && reference.name().is_empty() {
        return Err(StoreError::Validation(format!(
            "{} identifier or name required for {owner}",
            R::KIND
        )));
    }
    let mut found = None;
    if !reference.id().is_empty() {
        found = Backend::<R>::load(storage, reference.id())?;
    }
    if found.is_none() && !reference.name().is_empty() {
        found = Backend::<R>::load_by_name(storage, reference.name())?;
    }
    match found {
        Some(record) => {
            *reference = record.stub();
            Ok(())
        }
        None => Err(StoreError::invalid_reference(
            R::KIND,
            reference.reference_key(),
            owner,
        )),
    }
}

fn hydrate_reference<R: Record>(
    reference: &mut R,
    storage: &Storage,
    owner: &str,
) -> StoreResult<()> {
    let mut current = Backend::<R>::resolve(storage, reference.id())?
        .ok_or_else(|| StoreError::invalid_reference(R::KIND, reference.id(), owner))?;
    current.hydrate(storage)?;
    *reference = current;
    Ok(())
}

impl Relations for Addressable {}
impl Relations for Command {}
impl Relations for Schedule {}
// Device and event names are weak references and never checked.
impl Relations for DeviceReport {}

impl Relations for DeviceService {
    fn link(&mut self, storage: &Storage) -> StoreResult<()> {
        let owner = self.label();
        link_reference(&mut self.addressable, storage, &owner)
    }

    fn hydrate(&mut self, storage: &Storage) -> StoreResult<()> {
        let owner = self.label();
        hydrate_reference(&mut self.addressable, storage, &owner)
    }
}

impl Relations for DeviceProfile {
    fn link(&mut self, storage: &Storage) -> StoreResult<()> {
        let owner = self.label();
        for command in &mut self.commands {
            link_reference(command, storage, &owner)?;
        }
        Ok(())
    }

    fn hydrate(&mut self, storage: &Storage) -> StoreResult<()> {
        let owner = self.label();
        for command in &mut self.commands {
            hydrate_reference(command, storage, &owner)?;
        }
        Ok(())
    }
}

impl Relations for Device {
    fn link(&mut self, storage: &Storage) -> StoreResult<()> {
        let owner = self.label();
        link_reference(&mut self.addressable, storage, &owner)?;
        link_reference(&mut self.service, storage, &owner)?;
        link_reference(&mut self.profile, storage, &owner)
    }

    fn hydrate(&mut self, storage: &Storage) -> StoreResult<()> {
        let owner = self.label();
        hydrate_reference(&mut self.addressable, storage, &owner)?;
        hydrate_reference(&mut self.service, storage, &owner)?;
        hydrate_reference(&mut self.profile, storage, &owner)
    }
}

impl Relations for ScheduleEvent {
    fn link(&mut self, storage: &Storage) -> StoreResult<()> {
        let owner = self.label();
        link_reference(&mut self.addressable, storage, &owner)
    }

    fn hydrate(&mut self, storage: &Storage) -> StoreResult<()> {
        let owner = self.label();
        hydrate_reference(&mut self.addressable, storage, &owner)
    }
}

impl Relations for ProvisionWatcher {
    fn link(&mut self, storage: &Storage) -> StoreResult<()> {
        let owner = self.label();
        link_reference(&mut self.service, storage, &owner)?;
        link_reference(&mut self.profile, storage, &owner)
    }

    fn hydrate(&mut self, storage: &Storage) -> StoreResult<()> {
        let owner = self.label();
        hydrate_reference(&mut self.service, storage, &owner)?;
        hydrate_reference(&mut self.profile, storage, &owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::Collections;

    fn storage() -> Storage {
        let mut storage = Storage::Collections(Collections::default());
        Backend::<Addressable>::insert(
            &mut storage,
            Addressable {
                id: "a1".to_string(),
                name: "addr1".to_string(),
                port: 48080,
                ..Default::default()
            },
        )
        .unwrap();
        storage
    }

    fn service(addressable: Addressable) -> DeviceService {
        DeviceService {
            id: "s1".to_string(),
            name: "svc1".to_string(),
            addressable,
            ..Default::default()
        }
    }

    #[test]
    fn link_by_name_stores_stub() {
        let storage = storage();
        let mut svc = service(Addressable {
            name: "addr1".to_string(),
            port: 1,
            ..Default::default()
        });

        svc.link(&storage).unwrap();

        assert_eq!(svc.addressable.id, "a1");
        assert_eq!(svc.addressable.name, "addr1");
        assert_eq!(svc.addressable.port, 0);
    }

    #[test]
    fn link_falls_back_to_name_when_id_misses() {
        let storage = storage();
        let mut svc = service(Addressable {
            id: "stale".to_string(),
            name: "addr1".to_string(),
            ..Default::default()
        });

        svc.link(&storage).unwrap();
        assert_eq!(svc.addressable.id, "a1");
    }

    #[test]
    fn link_without_id_or_name_is_a_validation_error() {
        let storage = storage();
        let mut svc = service(Addressable::default());

        let err = svc.link(&storage).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn link_to_missing_record_names_owner() {
        let storage = storage();
        let mut svc = service(Addressable {
            name: "nowhere".to_string(),
            ..Default::default()
        });

        match svc.link(&storage).unwrap_err() {
            StoreError::InvalidReference { kind, key, owner } => {
                assert_eq!(kind, "addressable");
                assert_eq!(key, "nowhere");
                assert_eq!(owner, "device service svc1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn hydrate_replaces_stub_with_current_record() {
        let storage = storage();
        let mut svc = service(Addressable {
            id: "a1".to_string(),
            ..Default::default()
        });

        svc.hydrate(&storage).unwrap();
        assert_eq!(svc.addressable.port, 48080);
        assert_eq!(svc.addressable.name, "addr1");
    }

    #[test]
    fn hydrate_dangling_stub_is_invalid_reference() {
        let storage = storage();
        let mut svc = service(Addressable {
            id: "gone".to_string(),
            ..Default::default()
        });

        let err = svc.hydrate(&storage).unwrap_err();
        assert!(err.is_invalid_reference());
    }
}
