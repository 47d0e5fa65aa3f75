pub mod backend;
pub mod error;
pub mod local;
pub mod remote;
pub mod store;

pub use backend::{FailoverStore, StoreBackend};
pub use error::{StoreError, StoreResult};
pub use local::LocalStore;
pub use remote::{RemoteConfig, RemoteStore};
pub use store::MessageStore;
