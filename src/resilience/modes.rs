//! Storage operating modes for the failover state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating state of the storage layer.
///
/// The machine starts in `Database` and has no terminal state; it is
/// designed to return to `Database` once the primary recovers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// Primary healthy, full read/write
    Database,
    /// Primary down, reads served from a healthy replica, writes rejected
    Replica,
    /// No durable store reachable; bounded in-memory cache, writes rejected
    MemoryOptimized,
    /// Reads from replica, writes attempted against primary opportunistically
    Hybrid,
    /// Explicit lockdown; writes always rejected regardless of primary health
    ReadOnly,
    /// Pure fallback, no persistence
    Memory,
}

impl StorageMode {
    /// Modes in which the write guard lets mutations through. The global
    /// read-only override is checked separately and always wins.
    pub fn is_writable(&self) -> bool {
        matches!(self, Self::Database | Self::Hybrid)
    }

    /// Modes backed by a durable store (primary or replica).
    pub fn is_durable(&self) -> bool {
        !matches!(self, Self::Memory | Self::MemoryOptimized)
    }

    /// Modes serving from the bounded in-memory cache.
    pub fn is_memory_backed(&self) -> bool {
        matches!(self, Self::Memory | Self::MemoryOptimized)
    }
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database => write!(f, "database"),
            Self::Replica => write!(f, "replica"),
            Self::MemoryOptimized => write!(f, "memory_optimized"),
            Self::Hybrid => write!(f, "hybrid"),
            Self::ReadOnly => write!(f, "read_only"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

impl std::str::FromStr for StorageMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "database" => Ok(Self::Database),
            "replica" => Ok(Self::Replica),
            "memory_optimized" => Ok(Self::MemoryOptimized),
            "hybrid" => Ok(Self::Hybrid),
            "read_only" => Ok(Self::ReadOnly),
            "memory" => Ok(Self::Memory),
            _ => Err(format!("Invalid storage mode: {s}")),
        }
    }
}
