//! Remote lobby directory access
//!
//! This module defines the contract the coordinator consumes from the remote
//! lobby directory, along with the in-memory reference implementation used
//! by the test suite and the demo binary.

pub mod client;
pub mod memory;

// Re-export commonly used types
pub use client::{
    CreateLobbyOptions, DirectoryClient, UpdateLobbyOptions, UpdatePlayerOptions,
};
pub use memory::InMemoryDirectory;
