// Service exports
pub mod appwrite;
pub mod cache;
pub mod memory;
pub mod postgres;
pub mod store;

pub use appwrite::{AppwriteClient, AppwriteError, NoPhotos, PhotoSource};
pub use cache::CachedPhotoSource;
pub use memory::MemoryStore;
pub use postgres::{PostgresStore, SignalKindColumn};
pub use store::{ChannelActivity, InsertOutcome, Store, StoreError, TimeoutStore};
