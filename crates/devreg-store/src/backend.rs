//! Storage primitives shared by the collection and document backends.

use crate::collection::Collections;
use crate::document::DocumentBackend;
use crate::entity::Entity;
use crate::error::StoreResult;

/// Raw record access for one record kind.
///
/// Records returned here are as stored: reference fields hold stubs that
/// carry only the reference key.
pub(crate) trait Backend<T: Entity> {
    fn load(&self, id: &str) -> StoreResult<Option<T>>;

    /// First record with this name, in insertion order.
    fn load_by_name(&self, name: &str) -> StoreResult<Option<T>>;

    /// All records, in insertion order.
    fn load_all(&self) -> StoreResult<Vec<T>>;

    /// Find the record a stored reference key points at.
    fn resolve(&self, key: &str) -> StoreResult<Option<T>> {
        self.load(key)
    }

    fn insert(&mut self, record: T) -> StoreResult<()>;

    /// Replace the record with the same id. Returns false if none exists.
    fn replace(&mut self, record: T) -> StoreResult<bool>;

    /// Remove the record with this id. Returns false if none exists.
    fn remove(&mut self, id: &str) -> StoreResult<bool>;
}

/// The backend a store instance was opened with.
pub(crate) enum Storage {
    Collections(Collections),
    Documents(DocumentBackend),
}

impl Storage {
    /// Empty every collection.
    pub(crate) fn clear(&mut self) -> StoreResult<()> {
        match self {
            Self::Collections(collections) => {
                collections.clear();
                Ok(())
            }
            Self::Documents(documents) => documents.clear(),
        }
    }
}

impl<T: Entity> Backend<T> for Storage
where
    Collections: Backend<T>,
    DocumentBackend: Backend<T>,
{
    fn load(&self, id: &str) -> StoreResult<Option<T>> {
        match self {
            Self::Collections(c) => Backend::<T>::load(c, id),
            Self::Documents(d) => Backend::<T>::load(d, id),
        }
    }

    fn load_by_name(&self, name: &str) -> StoreResult<Option<T>> {
        match self {
            Self::Collections(c) => Backend::<T>::load_by_name(c, name),
            Self::Documents(d) => Backend::<T>::load_by_name(d, name),
        }
    }

    fn load_all(&self) -> StoreResult<Vec<T>> {
        match self {
            Self::Collections(c) => Backend::<T>::load_all(c),
            Self::Documents(d) => Backend::<T>::load_all(d),
        }
    }

    fn resolve(&self, key: &str) -> StoreResult<Option<T>> {
        match self {
            Self::Collections(c) => Backend::<T>::resolve(c, key),
            Self::Documents(d) => Backend::<T>::resolve(d, key),
        }
    }

    fn insert(&mut self, record: T) -> StoreResult<()> {
        match self {
            Self::Collections(c) => Backend::<T>::insert(c, record),
            Self::Documents(d) => Backend::<T>::insert(d, record),
        }
    }

    fn replace(&mut self, record: T) -> StoreResult<bool> {
        match self {
            Self::Collections(c) => Backend::<T>::replace(c, record),
            Self::Documents(d) => Backend::<T>::replace(d, record),
        }
    }

    fn remove(&mut self, id: &str) -> StoreResult<bool> {
        match self {
            Self::Collections(c) => Backend::<T>::remove(c, id),
            Self::Documents(d) => Backend::<T>::remove(d, id),
        }
    }
}
