mod in_memory;
mod store;

pub use in_memory::InMemoryStore;
pub use store::KeyValueStore;
pub use store::StoreError;
pub use store::StoreSnapshot;
pub use store::MAX_KEY_SIZE;

pub(crate) use store::validate_key;
