//! Runtime configuration knobs.
//!
//! This is the entire configuration surface of the crate. It deliberately
//! does not expose a way to skip any `sync` call or change the atomicity
//! algorithm — either of those would silently break the guarantees this
//! crate exists to provide.

/// Configuration shared by [`crate::ops::DurableOps`] and
/// [`crate::fs::physical::PhysicalFilesystem`].
#[derive(Debug, Clone, Copy)]
pub struct Options {
    /// Chunk size used by `write_stream` when copying from a
    /// `std::io::Read` into the staging file. Default 8 KiB.
    pub chunk_size: usize,

    /// Prefix used for the names of entries created by `create_temp_dir`
    /// and `create_temp_file`. Purely cosmetic: lets an operator `grep` or
    /// clean up leftover debris by prefix. Has no bearing on correctness.
    pub temp_name_prefix: &'static str,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            chunk_size: 8 * 1024,
            temp_name_prefix: ".crash-safe-fs.",
        }
    }
}
