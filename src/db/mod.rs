//! Persistence plumbing: MongoDB wrapper, schemas and the lazy connection slot

pub mod lazy;
pub mod mongo;
pub mod schemas;

pub use lazy::LazyConnection;
pub use mongo::{MongoClient, MongoCollection};
