#![forbid(unsafe_code)]

pub mod catalog;
pub mod repository;

pub use catalog::InMemoryCatalog;
pub use repository::{
    InMemorySessionStore, SessionRepository, Storage, StorageError, TaskCatalog,
};
