/*!
 * Tiny Kernel - Main Entry Point
 *
 * Boots a kernel whose init process runs a small ping/pong exchange over a
 * socket pair and a pipe, then prints the table statistics.
 */

use miette::IntoDiagnostic;
use tracing::info;

use tiny_kernel::{init_tracing, Context, Kernel, KernelConfig, KernelResult};

const ECHO_PORT: u16 = 7;

/// Serves one connection on the listener fid passed in `args`
fn server(ctx: &Context, args: &[u8]) -> i32 {
    let Some(&listener) = args.first() else {
        return 2;
    };
    let listener = usize::from(listener);
    let served = (|| -> KernelResult<usize> {
        let peer = ctx.accept(listener)?;
        let mut buf = [0u8; 64];
        let n = ctx.read(peer, &mut buf)?;
        info!(request = %String::from_utf8_lossy(&buf[..n]), "Server received");
        ctx.write(peer, b"pong")?;
        ctx.close(peer)?;
        ctx.close(listener)?;
        Ok(n)
    })();
    served.map_or(1, |_| 0)
}

fn client(ctx: &Context, _args: &[u8]) -> i32 {
    let exchanged = (|| -> KernelResult<()> {
        let sock = ctx.socket(tiny_kernel::core::limits::NOPORT)?;
        ctx.connect(sock, ECHO_PORT, None)?;
        ctx.write(sock, b"ping")?;
        let mut buf = [0u8; 64];
        let n = ctx.read(sock, &mut buf)?;
        info!(reply = %String::from_utf8_lossy(&buf[..n]), "Client received");
        ctx.close(sock)
    })();
    exchanged.map_or(1, |_| 0)
}

fn init(ctx: &Context, _args: &[u8]) -> i32 {
    let run = || -> KernelResult<i32> {
        // The server inherits a socket that is already listening
        let listener = ctx.socket(ECHO_PORT)?;
        ctx.listen(listener)?;
        let fid = u8::try_from(listener).unwrap_or(u8::MAX);
        let server = ctx.exec(server, &[fid])?;
        ctx.close(listener)?;
        let client = ctx.exec(client, b"")?;

        // Worker threads hand their results back through a pipe
        let fds = ctx.pipe()?;
        let mut workers = Vec::new();
        for id in 0..3u8 {
            let write = fds.write;
            workers.push(ctx.create_thread(
                move |ctx, args| match ctx.write(write, args) {
                    Ok(_) => 0,
                    Err(_) => 1,
                },
                &[b'a' + id; 16],
            )?);
        }
        for worker in workers {
            ctx.thread_join(worker)?;
        }
        ctx.close(fds.write)?;
        let mut collected = Vec::new();
        let mut buf = [0u8; 32];
        loop {
            let n = ctx.read(fds.read, &mut buf)?;
            if n == 0 {
                break;
            }
            collected.extend_from_slice(&buf[..n]);
        }
        ctx.close(fds.read)?;
        info!(bytes = collected.len(), "Workers finished");

        let mut failures = 0;
        for pid in [server, client] {
            let status = ctx.wait_child(Some(pid))?;
            info!(pid = %status.pid, status = status.status, "Child exited");
            failures += i32::from(status.status != 0);
        }
        Ok(failures)
    };
    run().unwrap_or(-1)
}

fn main() -> miette::Result<()> {
    init_tracing();

    let kernel = Kernel::new(KernelConfig::from_env());
    let status = kernel.boot(init, b"")?;
    info!(status, "Init exited");

    let stats = serde_json::to_string_pretty(&kernel.stats()).into_diagnostic()?;
    println!("{stats}");
    Ok(())
}
