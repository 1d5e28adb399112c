/*!
 * Kernel Configuration
 *
 * Table sizes and execution context settings, with environment overrides
 */

use super::limits;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;

/// Kernel configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct KernelConfig {
    /// Process table size (the idle and init processes included)
    pub max_processes: usize,
    /// Thread execution record table size
    pub max_threads: usize,
    /// Global stream record table size
    pub max_streams: usize,
    /// File ids per process
    pub max_fids: usize,
    /// Highest legal port
    pub max_port: u16,
    /// Stack size of each spawned execution context
    pub thread_stack_size: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            max_processes: limits::MAX_PROC,
            max_threads: limits::MAX_THREADS,
            max_streams: limits::MAX_FILES,
            max_fids: limits::MAX_FILEID,
            max_port: limits::MAX_PORT,
            thread_stack_size: limits::THREAD_STACK_SIZE,
        }
    }
}

impl KernelConfig {
    /// Defaults overridden by `KERNEL_*` environment variables
    ///
    /// Environment variables:
    /// - KERNEL_MAX_PROCESSES, KERNEL_MAX_THREADS, KERNEL_MAX_STREAMS
    /// - KERNEL_MAX_FIDS, KERNEL_MAX_PORT, KERNEL_THREAD_STACK
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_processes: env_or("KERNEL_MAX_PROCESSES", defaults.max_processes),
            max_threads: env_or("KERNEL_MAX_THREADS", defaults.max_threads),
            max_streams: env_or("KERNEL_MAX_STREAMS", defaults.max_streams),
            max_fids: env_or("KERNEL_MAX_FIDS", defaults.max_fids),
            max_port: env_or("KERNEL_MAX_PORT", defaults.max_port),
            thread_stack_size: env_or("KERNEL_THREAD_STACK", defaults.thread_stack_size),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_max_processes(mut self, max: usize) -> Self {
        self.max_processes = max;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_max_threads(mut self, max: usize) -> Self {
        self.max_threads = max;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_max_streams(mut self, max: usize) -> Self {
        self.max_streams = max;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_max_fids(mut self, max: usize) -> Self {
        self.max_fids = max;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_max_port(mut self, max: u16) -> Self {
        self.max_port = max;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_thread_stack_size(mut self, size: usize) -> Self {
        self.thread_stack_size = size;
        self
    }

    /// Pipes come in reader/writer stream pairs
    #[inline]
    pub(crate) fn max_pipes(&self) -> usize {
        (self.max_streams / 2).max(1)
    }

    /// Every socket occupies at least one stream record
    #[inline]
    pub(crate) fn max_sockets(&self) -> usize {
        self.max_streams.max(1)
    }
}

fn env_or<T: FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "Ignoring unparsable configuration value");
            default
        }),
        Err(_) => default,
    }
}
