/*!
 * Process Tests
 * Boot, exec, exit, wait and reparenting
 */

mod common;

use common::{boot, read_exact, run, small_config, status};
use pretty_assertions::assert_eq;
use std::sync::mpsc;
use tiny_kernel::core::limits::NOPORT;
use tiny_kernel::{
    Context, ExecOptions, Kernel, KernelConfig, KernelError, Resource, WaitStatus,
};

#[test]
fn test_boot_returns_init_exit_value() {
    let kernel = Kernel::new(small_config());
    assert_eq!(kernel.boot(|_, _| 42, b""), Ok(42));
    assert_eq!(kernel.stats().live_objects(), 0);
}

#[test]
fn test_boot_twice_fails() {
    let kernel = Kernel::new(small_config());
    assert_eq!(kernel.boot(|_, _| 0, b""), Ok(0));
    assert_eq!(kernel.boot(|_, _| 0, b""), Err(KernelError::AlreadyBooted));
}

#[test]
fn test_init_receives_boot_args() {
    let kernel = Kernel::new(small_config());
    let status = kernel.boot(|_, args| i32::from(args == b"hello"), b"hello");
    assert_eq!(status, Ok(1));
}

#[test]
fn test_init_is_parentless_and_children_know_their_parent() {
    boot(|ctx| {
        assert!(ctx.get_pid().is_init());
        assert_eq!(ctx.get_ppid(), None);

        let parent = ctx.get_pid();
        let child = ctx
            .exec(move |ctx, _| status(ctx.get_ppid() == Some(parent)), b"")
            .unwrap();
        assert_eq!(
            ctx.wait_child(Some(child)),
            Ok(WaitStatus {
                pid: child,
                status: 0
            })
        );
    });
}

#[test]
fn test_child_receives_own_copy_of_args() {
    boot(|ctx| {
        let mut args = b"payload".to_vec();
        let child = ctx
            .exec(|_, args| status(args == b"payload"), &args)
            .unwrap();
        args.clear();
        assert_eq!(ctx.wait_child(Some(child)).unwrap().status, 0);
    });
}

#[test]
fn test_wait_specific_child_is_consumed_once() {
    boot(|ctx| {
        let child = ctx.exec(|_, _| 7, b"").unwrap();
        assert_eq!(
            ctx.wait_child(Some(child)),
            Ok(WaitStatus {
                pid: child,
                status: 7
            })
        );
        assert_eq!(
            ctx.wait_child(Some(child)),
            Err(KernelError::NoSuchProcess(child))
        );
    });
}

#[test]
fn test_wait_any_without_children_fails_immediately() {
    boot(|ctx| {
        assert_eq!(ctx.wait_child(None), Err(KernelError::NoChildren));
    });
}

#[test]
fn test_wait_for_self_fails() {
    boot(|ctx| {
        let me = ctx.get_pid();
        assert_eq!(ctx.wait_child(Some(me)), Err(KernelError::NoSuchProcess(me)));
    });
}

#[test]
fn test_wait_any_reclaims_exactly_one_per_call() {
    boot(|ctx| {
        let mut pids = Vec::new();
        for value in 1..=3 {
            pids.push(ctx.exec(move |_, _| value, b"").unwrap());
        }

        let mut collected: Vec<_> = (0..3).map(|_| ctx.wait_child(None).unwrap()).collect();
        collected.sort_by_key(|w| w.status);
        assert_eq!(
            collected.iter().map(|w| w.status).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        for (waited, pid) in collected.iter().zip(&pids) {
            assert_eq!(waited.pid, *pid);
        }
        assert_eq!(ctx.wait_child(None), Err(KernelError::NoChildren));
    });
}

#[test]
fn test_exit_call_sets_status_and_skips_rest_of_entry() {
    boot(|ctx| {
        let child = ctx
            .exec(
                |ctx, _| {
                    ctx.exit(5);
                },
                b"",
            )
            .unwrap();
        assert_eq!(ctx.wait_child(Some(child)).unwrap().status, 5);
    });
}

#[test]
fn test_exit_reparents_live_children_to_init() {
    boot(|ctx| {
        let init = ctx.get_pid();
        let gate = ctx.pipe().unwrap();

        // The middle process leaves behind a grandchild blocked on the gate
        let middle = ctx
            .exec(
                move |ctx, _| {
                    ctx.exec(
                        move |ctx, _| {
                            if ctx.close(gate.write).is_err() {
                                return 1;
                            }
                            let opened = read_exact(ctx, gate.read, 1);
                            status(opened.as_deref() == Ok(&b"x"[..]) && ctx.get_ppid() == Some(init))
                        },
                        b"",
                    )
                    .map_or(2, |_| 3)
                },
                b"",
            )
            .unwrap();

        assert_eq!(ctx.wait_child(Some(middle)).unwrap().status, 3);
        ctx.write(gate.write, b"x").unwrap();
        let orphan = ctx.wait_child(None).unwrap();
        assert_ne!(orphan.pid, middle);
        assert_eq!(orphan.status, 0);
        assert_eq!(ctx.wait_child(None), Err(KernelError::NoChildren));

        ctx.close(gate.read).unwrap();
        ctx.close(gate.write).unwrap();
    });
}

#[test]
fn test_zombie_grandchildren_are_collected_by_init() {
    boot(|ctx| {
        let middle = ctx
            .exec(
                |ctx, _| ctx.exec(|_, _| 9, b"").map_or(1, |_| 0),
                b"",
            )
            .unwrap();
        assert_eq!(ctx.wait_child(Some(middle)).unwrap().status, 0);
        assert_eq!(ctx.wait_child(None).unwrap().status, 9);
    });
}

#[test]
fn test_exec_shares_open_streams() {
    boot(|ctx| {
        let fds = ctx.pipe().unwrap();
        let child = ctx
            .exec(
                move |ctx, _| status(ctx.write(fds.write, b"hi") == Ok(2)),
                b"",
            )
            .unwrap();
        assert_eq!(ctx.wait_child(Some(child)).unwrap().status, 0);

        ctx.close(fds.write).unwrap();
        assert_eq!(common::read_to_end(ctx, fds.read).unwrap(), b"hi".to_vec());
        ctx.close(fds.read).unwrap();
    });
}

#[test]
fn test_exec_without_streams_starts_with_empty_fid_table() {
    boot(|ctx| {
        let fds = ctx.pipe().unwrap();
        let child = ctx
            .exec_with(
                move |ctx, _| {
                    status(ctx.write(fds.write, b"hi") == Err(KernelError::BadFile(fds.write)))
                },
                b"",
                ExecOptions::without_streams(),
            )
            .unwrap();
        assert_eq!(ctx.wait_child(Some(child)).unwrap().status, 0);
        ctx.close(fds.read).unwrap();
        ctx.close(fds.write).unwrap();
    });
}

#[test]
fn test_exited_child_releases_inherited_references() {
    let kernel = Kernel::new(small_config());
    let probe = kernel.clone();
    let status = kernel.boot(
        move |ctx, _| {
            let fds = ctx.pipe().unwrap();
            let child = ctx.exec(|_, _| 0, b"").unwrap();
            ctx.wait_child(Some(child)).unwrap();
            ctx.close(fds.read).unwrap();
            ctx.close(fds.write).unwrap();
            let stats = probe.stats();
            common::status(stats.pipes == 0 && stats.streams == 0)
        },
        b"",
    );
    assert_eq!(status, Ok(0));
}

#[test]
fn test_process_table_exhaustion_leaves_no_partial_state() {
    // idle + init + two children
    let config = KernelConfig::default().with_max_processes(4);
    run(config, |ctx| {
        let gate = ctx.pipe().unwrap();
        let waiter = move |ctx: &tiny_kernel::Context, _: &[u8]| {
            let _ = ctx.close(gate.write);
            status(common::read_to_end(ctx, gate.read).is_ok())
        };
        ctx.exec(waiter, b"").unwrap();
        ctx.exec(waiter, b"").unwrap();
        assert_eq!(
            ctx.exec(waiter, b""),
            Err(KernelError::TableExhausted(Resource::Processes))
        );

        ctx.close(gate.write).unwrap();
        for _ in 0..2 {
            assert_eq!(ctx.wait_child(None).unwrap().status, 0);
        }
        ctx.close(gate.read).unwrap();
    });
}

#[test]
fn test_panicking_child_exits_with_failure_and_is_reported() {
    let kernel = Kernel::new(small_config());
    let status = kernel.boot(
        |ctx, _| {
            let child = ctx.exec(|_, _| panic!("child blew up"), b"").unwrap();
            ctx.wait_child(Some(child)).map_or(1, |w| w.status)
        },
        b"",
    );
    match status {
        Err(KernelError::TaskPanicked(message)) => assert!(message.contains("child blew up")),
        other => panic!("expected a reported panic, got {other:?}"),
    }
    assert_eq!(kernel.stats().live_objects(), 0);
}

#[test]
fn test_init_waits_for_children_before_halting() {
    let kernel = Kernel::new(small_config());
    let status = kernel.boot(
        |ctx, _| {
            ctx.exec(
                |_, _| {
                    std::thread::sleep(std::time::Duration::from_millis(50));
                    0
                },
                b"",
            )
            .map_or(1, |_| 0)
        },
        b"",
    );
    assert_eq!(status, Ok(0));
    assert_eq!(kernel.stats().processes, 0);
}

/// Child whose extra thread exits the process while the main thread runs on
///
/// The main thread reports what `after_exit` returned through `report`.
fn exit_from_extra_thread<T, F>(
    report: mpsc::Sender<T>,
    after_exit: F,
) -> impl FnOnce(&Context, &[u8]) -> i32 + Send + 'static
where
    T: Send + 'static,
    F: FnOnce(&Context) -> T + Send + 'static,
{
    move |ctx, _| {
        let exiter = ctx.create_thread(
            |ctx, _| {
                ctx.exit(5);
            },
            b"",
        );
        let joined = exiter.map(|tid| ctx.thread_join(tid));
        if joined != Ok(Ok(5)) {
            return 1;
        }
        let _ = report.send(after_exit(ctx));
        0
    }
}

#[test]
fn test_exited_process_cannot_open_streams() {
    boot(|ctx| {
        let (report, results) = mpsc::channel();
        let child = ctx
            .exec(
                exit_from_extra_thread(report, |ctx| {
                    (ctx.get_pid(), ctx.pipe(), ctx.socket(NOPORT))
                }),
                b"",
            )
            .unwrap();

        let (pid, piped, socket) = results.recv().unwrap();
        assert_eq!(pid, child);
        assert_eq!(piped, Err(KernelError::NoSuchProcess(child)));
        assert_eq!(socket, Err(KernelError::NoSuchProcess(child)));
        assert_eq!(ctx.wait_child(Some(child)).unwrap().status, 5);
    });
}

#[test]
fn test_exited_process_cannot_exec() {
    boot(|ctx| {
        let (report, results) = mpsc::channel();
        let child = ctx
            .exec(
                exit_from_extra_thread(report, |ctx| ctx.exec(|_, _| 0, b"")),
                b"",
            )
            .unwrap();

        assert_eq!(
            results.recv().unwrap(),
            Err(KernelError::NoSuchProcess(child))
        );
        assert_eq!(ctx.wait_child(Some(child)).unwrap().status, 5);
        assert_eq!(ctx.wait_child(None), Err(KernelError::NoChildren));
    });
}
