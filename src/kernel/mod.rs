/*!
 * Kernel Monitor
 *
 * Owns the kernel lock and every table behind it, the spawner used to create
 * execution contexts, and the boot/halt handshake with the host.
 */

pub(crate) mod state;
mod stats;

pub use stats::KernelStats;

use crate::core::config::KernelConfig;
use crate::core::errors::{KernelError, KernelResult, Resource};
use crate::core::types::ExitValue;
use crate::process::types::Process;
use crate::process::{spawn_process, ExecOptions, Spawner, ThreadSpawner, PANIC_EXIT_VALUE};
use crate::syscalls::Context;
use parking_lot::{Condvar, Mutex};
use state::{KernelGuard, KernelState};
use std::sync::Arc;
use tracing::info;

struct Shared {
    state: Mutex<KernelState>,
    /// Signalled when init exits
    halted: Condvar,
    spawner: Arc<dyn Spawner>,
    config: KernelConfig,
}

/// Handle to a kernel instance; clones share the same kernel
#[derive(Clone)]
pub struct Kernel {
    shared: Arc<Shared>,
}

impl Kernel {
    /// Kernel running tasks on OS threads
    pub fn new(config: KernelConfig) -> Self {
        let spawner = Arc::new(ThreadSpawner::new(config.thread_stack_size));
        Self::with_spawner(config, spawner)
    }

    pub fn with_spawner(config: KernelConfig, spawner: Arc<dyn Spawner>) -> Self {
        info!(
            max_processes = config.max_processes,
            max_threads = config.max_threads,
            max_streams = config.max_streams,
            max_fids = config.max_fids,
            max_port = config.max_port,
            "Kernel initialized"
        );
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(KernelState::new(&config)),
                halted: Condvar::new(),
                spawner,
                config,
            }),
        }
    }

    #[inline]
    pub fn config(&self) -> &KernelConfig {
        &self.shared.config
    }

    /// Start the idle and init processes and block until init exits
    ///
    /// Returns the exit value of init, or `TaskPanicked` if any task panicked
    /// while the kernel ran.
    pub fn boot<F>(&self, init: F, args: &[u8]) -> KernelResult<ExitValue>
    where
        F: FnOnce(&Context, &[u8]) -> ExitValue + Send + 'static,
    {
        let mut guard = self.lock();
        if guard.booted {
            return Err(KernelError::AlreadyBooted);
        }

        let max_fids = guard.max_fids;
        let idle = guard
            .processes
            .insert(Process::new(None, None, &[], max_fids))
            .ok_or(KernelError::TableExhausted(Resource::Processes))?;
        let init_pid = match spawn_process(
            self,
            &mut guard,
            None,
            Box::new(init),
            args,
            ExecOptions::without_streams(),
        ) {
            Ok(pid) => pid,
            Err(e) => {
                guard.processes.remove(idle);
                return Err(e);
            }
        };
        guard.booted = true;
        guard.init = Some(init_pid);
        info!(%idle, init = %init_pid, "Kernel booted");

        while guard.process(init_pid).is_ok_and(Process::is_alive) {
            self.shared.halted.wait(&mut guard);
        }

        let status = guard
            .release_process(init_pid)
            .map_or(PANIC_EXIT_VALUE, |process| process.exit_value);
        guard.release_process(idle);
        guard.init = None;
        info!(status, "Kernel halted");

        if guard.faults.is_empty() {
            Ok(status)
        } else {
            Err(KernelError::TaskPanicked(guard.faults.join("; ")))
        }
    }

    /// Live record counts of every table
    pub fn stats(&self) -> KernelStats {
        let guard = self.lock();
        KernelStats {
            processes: guard.processes.len(),
            threads: guard.threads.len(),
            tasks: guard.tasks.len(),
            streams: guard.streams.len(),
            pipes: guard.pipes.len(),
            sockets: guard.sockets.len(),
            requests: guard.requests.len(),
            listening_ports: guard.ports.iter().filter(|port| port.is_some()).count(),
            faults: guard.faults.len(),
        }
    }

    #[inline]
    pub(crate) fn lock(&self) -> KernelGuard<'_> {
        self.shared.state.lock()
    }

    #[inline]
    pub(crate) fn halted(&self) -> &Condvar {
        &self.shared.halted
    }

    #[inline]
    pub(crate) fn spawner(&self) -> &dyn Spawner {
        self.shared.spawner.as_ref()
    }
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}
