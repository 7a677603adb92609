mod factory;
mod firestore_adapter;
mod values;

pub use factory::FirestoreAdapterFactory;
pub use firestore_adapter::{FirestoreAdapter, DEFAULT_ENDPOINT};
pub use values::{decode_fields, encode_fields};
