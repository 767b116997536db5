//! Crash-safe filesystem primitives: durable writes, moves, deletions, and
//! directory creation, all built so that an unexpected process exit or power
//! loss at any point leaves the filesystem in either the pre- or
//! post-operation state, never something in between.
//!
//! The entry point is [`DurableOps`], generic over a [`Filesystem`]
//! capability. Production code pairs it with [`PhysicalFilesystem`]; tests
//! can pair it with the simulated [`testing::model::ModelFilesystem`]
//! (behind the `testing` feature, or automatically under `#[cfg(test)]`) to
//! explore crash outcomes deterministically, without an actual power
//! failure.
//!
//! # What this crate does not do
//!
//! None of the types here are a concurrency primitive. A
//! [`DirectoryModificationScope`] serializes nothing between processes or
//! threads; two callers racing to write the same path durably is a race the
//! caller must avoid (e.g. with an external advisory lock), not something
//! this crate arbitrates. See the module docs on [`ops`] for the exact
//! durability discipline every algorithm here follows.

pub mod error;
pub mod fs;
pub mod ops;
pub mod options;
pub mod path;
pub mod scope;
pub mod stream;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{Error, Result};
pub use fs::physical::PhysicalFilesystem;
pub use fs::Filesystem;
pub use ops::DurableOps;
pub use options::Options;
pub use path::AbsPathBuf;
pub use scope::DirectoryModificationScope;
pub use stream::AtomicDurableOutputStream;
