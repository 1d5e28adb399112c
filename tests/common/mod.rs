/*!
 * Shared test harness
 * Boots a kernel around a test body running as the init process
 */

#![allow(dead_code)]

use pretty_assertions::assert_eq;
use std::time::{Duration, Instant};
use tiny_kernel::{Context, Fid, Kernel, KernelConfig, KernelResult};

/// Small tables so exhaustion paths are cheap to reach
pub fn small_config() -> KernelConfig {
    KernelConfig::default()
        .with_max_processes(16)
        .with_max_threads(64)
        .with_max_streams(64)
}

/// Boot `config` with `body` as init and check that nothing leaked
///
/// Assertions inside `body` (or any task it starts) surface as a failed boot.
pub fn run<F>(config: KernelConfig, body: F) -> Kernel
where
    F: FnOnce(&Context) + Send + 'static,
{
    let kernel = Kernel::new(config);
    let status = kernel.boot(
        move |ctx, _args| {
            body(ctx);
            0
        },
        b"",
    );
    assert_eq!(status, Ok(0));

    let stats = kernel.stats();
    assert_eq!(stats.live_objects(), 0, "leaked records: {stats:?}");
    assert_eq!(stats.listening_ports, 0);
    kernel
}

pub fn boot<F>(body: F) -> Kernel
where
    F: FnOnce(&Context) + Send + 'static,
{
    run(small_config(), body)
}

/// Read until `len` bytes arrived or the stream ended
pub fn read_exact(ctx: &Context, fid: Fid, len: usize) -> KernelResult<Vec<u8>> {
    let mut data = vec![0u8; len];
    let mut total = 0;
    while total < len {
        let n = ctx.read(fid, &mut data[total..])?;
        if n == 0 {
            break;
        }
        total += n;
    }
    data.truncate(total);
    Ok(data)
}

/// Read until end of stream
pub fn read_to_end(ctx: &Context, fid: Fid) -> KernelResult<Vec<u8>> {
    let mut data = Vec::new();
    let mut buf = [0u8; 256];
    loop {
        let n = ctx.read(fid, &mut buf)?;
        if n == 0 {
            return Ok(data);
        }
        data.extend_from_slice(&buf[..n]);
    }
}

/// Poll `check` until it holds or a few seconds pass
pub fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

/// Exit value for a child task: 0 when `ok`
pub fn status(ok: bool) -> i32 {
    if ok {
        0
    } else {
        1
    }
}
