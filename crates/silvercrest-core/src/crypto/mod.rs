//! Cryptographic utilities for Silvercrest plug communication.
//!
//! - [`cbc`]: AES-128-CBC used for every envelope body

pub mod cbc;

pub use cbc::{BLOCK_SIZE, DEFAULT_IV, DEFAULT_KEY, EnvelopeCipher};
