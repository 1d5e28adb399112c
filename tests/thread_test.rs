/*!
 * Thread Tests
 * Create, join, detach, exit and main-thread completion
 */

mod common;

use common::{boot, eventually, read_exact, read_to_end, run, status};
use pretty_assertions::assert_eq;
use std::time::Duration;
use tiny_kernel::{Kernel, KernelConfig, KernelError, Resource, SlotId, Tid};

#[test]
fn test_join_returns_entry_return_value() {
    boot(|ctx| {
        let tid = ctx.create_thread(|_, _| 11, b"").unwrap();
        assert_eq!(ctx.thread_join(tid), Ok(11));
    });
}

#[test]
fn test_join_returns_thread_exit_value() {
    boot(|ctx| {
        let tid = ctx
            .create_thread(
                |ctx, _| {
                    ctx.thread_exit(23);
                },
                b"",
            )
            .unwrap();
        assert_eq!(ctx.thread_join(tid), Ok(23));
    });
}

#[test]
fn test_thread_receives_args() {
    boot(|ctx| {
        let tid = ctx
            .create_thread(|_, args| i32::from(args[0]) + i32::from(args[1]), &[2, 3])
            .unwrap();
        assert_eq!(ctx.thread_join(tid), Ok(5));
    });
}

#[test]
fn test_second_join_fails() {
    boot(|ctx| {
        let tid = ctx.create_thread(|_, _| 1, b"").unwrap();
        assert_eq!(ctx.thread_join(tid), Ok(1));
        assert!(ctx.thread_join(tid).is_err());
    });
}

#[test]
fn test_self_join_fails() {
    boot(|ctx| {
        assert_eq!(ctx.thread_join(ctx.thread_self()), Err(KernelError::SelfJoin));
        let tid = ctx
            .create_thread(
                |ctx, _| status(ctx.thread_join(ctx.thread_self()) == Err(KernelError::SelfJoin)),
                b"",
            )
            .unwrap();
        assert_eq!(ctx.thread_join(tid), Ok(0));
    });
}

#[test]
fn test_main_thread_is_not_joinable() {
    boot(|ctx| {
        let main = ctx.thread_self();
        let tid = ctx
            .create_thread(
                move |ctx, _| status(ctx.thread_join(main) == Err(KernelError::NotTracked(main))),
                b"",
            )
            .unwrap();
        assert_eq!(ctx.thread_join(tid), Ok(0));
    });
}

#[test]
fn test_stale_thread_id_is_rejected() {
    boot(|ctx| {
        let bogus = Tid::from_parts(60, 7);
        assert_eq!(ctx.thread_join(bogus), Err(KernelError::InvalidThread(bogus)));
        assert_eq!(ctx.thread_detach(bogus), Err(KernelError::InvalidThread(bogus)));
    });
}

#[test]
fn test_thread_of_another_process_is_not_joinable() {
    boot(|ctx| {
        let report = ctx.pipe().unwrap();
        let release = ctx.pipe().unwrap();
        let child = ctx
            .exec(
                move |ctx, _| {
                    let tid = ctx.thread_self();
                    let mut id = tid.index().to_le_bytes().to_vec();
                    id.extend_from_slice(&tid.generation().to_le_bytes());
                    if ctx.write(report.write, &id).is_err() {
                        return 1;
                    }
                    let _ = ctx.close(release.write);
                    status(read_to_end(ctx, release.read).is_ok())
                },
                b"",
            )
            .unwrap();

        let id = read_exact(ctx, report.read, 8).unwrap();
        let index = u32::from_le_bytes([id[0], id[1], id[2], id[3]]);
        let generation = u32::from_le_bytes([id[4], id[5], id[6], id[7]]);
        let foreign = Tid::from_parts(index, generation);
        assert_eq!(ctx.thread_join(foreign), Err(KernelError::NotTracked(foreign)));
        assert_eq!(ctx.thread_detach(foreign), Err(KernelError::NotTracked(foreign)));

        ctx.close(release.write).unwrap();
        assert_eq!(ctx.wait_child(Some(child)).unwrap().status, 0);
        for fid in [report.read, report.write, release.read] {
            ctx.close(fid).unwrap();
        }
    });
}

#[test]
fn test_join_on_detached_thread_fails() {
    boot(|ctx| {
        let gate = ctx.pipe().unwrap();
        let tid = ctx
            .create_thread(move |ctx, _| status(read_to_end(ctx, gate.read).is_ok()), b"")
            .unwrap();
        assert_eq!(ctx.thread_detach(tid), Ok(()));
        assert_eq!(ctx.thread_detach(tid), Ok(()));
        assert_eq!(ctx.thread_join(tid), Err(KernelError::Detached(tid)));

        ctx.close(gate.write).unwrap();
    });
}

#[test]
fn test_detach_wakes_blocked_joiner() {
    boot(|ctx| {
        let gate = ctx.pipe().unwrap();
        let sleeper = ctx
            .create_thread(move |ctx, _| status(read_to_end(ctx, gate.read).is_ok()), b"")
            .unwrap();
        let joiner = ctx
            .create_thread(
                move |ctx, _| status(ctx.thread_join(sleeper) == Err(KernelError::Detached(sleeper))),
                b"",
            )
            .unwrap();

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(ctx.thread_detach(sleeper), Ok(()));
        assert_eq!(ctx.thread_join(joiner), Ok(0));

        ctx.close(gate.write).unwrap();
    });
}

#[test]
fn test_detach_after_exit_fails() {
    boot(|ctx| {
        let done = ctx.pipe().unwrap();
        let tid = ctx
            .create_thread(move |ctx, _| status(ctx.write(done.write, b"!").is_ok()), b"")
            .unwrap();
        assert_eq!(read_exact(ctx, done.read, 1).unwrap(), b"!".to_vec());
        // The write is the thread's last action before returning
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(ctx.thread_detach(tid), Err(KernelError::AlreadyExited(tid)));
        assert_eq!(ctx.thread_join(tid), Ok(0));

        ctx.close(done.read).unwrap();
        ctx.close(done.write).unwrap();
    });
}

#[test]
fn test_many_joiners_all_see_exit_value() {
    boot(|ctx| {
        let gate = ctx.pipe().unwrap();
        let target = ctx
            .create_thread(
                move |ctx, _| {
                    let _ = read_to_end(ctx, gate.read);
                    77
                },
                b"",
            )
            .unwrap();
        let joiners: Vec<_> = (0..3)
            .map(|_| {
                ctx.create_thread(
                    move |ctx, _| status(ctx.thread_join(target) == Ok(77)),
                    b"",
                )
                .unwrap()
            })
            .collect();

        std::thread::sleep(Duration::from_millis(50));
        ctx.close(gate.write).unwrap();
        for joiner in joiners {
            assert_eq!(ctx.thread_join(joiner), Ok(0));
        }
    });
}

#[test]
fn test_detached_thread_releases_records_on_exit() {
    let kernel = Kernel::new(common::small_config());
    let probe = kernel.clone();
    let status = kernel.boot(
        move |ctx, _| {
            let gate = ctx.pipe().unwrap();
            let tid = ctx
                .create_thread(move |ctx, _| status(read_to_end(ctx, gate.read).is_ok()), b"")
                .unwrap();
            if ctx.thread_detach(tid).is_err() {
                return 1;
            }
            let before = probe.stats().tasks;
            ctx.close(gate.write).unwrap();
            let released = eventually(|| probe.stats().tasks == before - 1);
            ctx.close(gate.read).unwrap();
            common::status(released)
        },
        b"",
    );
    assert_eq!(status, Ok(0));
}

#[test]
fn test_main_completion_waits_for_threads() {
    boot(|ctx| {
        let fds = ctx.pipe().unwrap();
        let child = ctx
            .exec(
                move |ctx, _| {
                    let spawned = ctx.create_thread(
                        move |ctx, _| {
                            std::thread::sleep(Duration::from_millis(50));
                            status(ctx.write(fds.write, b"late").is_ok())
                        },
                        b"",
                    );
                    status(spawned.is_ok())
                },
                b"",
            )
            .unwrap();

        assert_eq!(ctx.wait_child(Some(child)).unwrap().status, 0);
        ctx.close(fds.write).unwrap();
        assert_eq!(read_to_end(ctx, fds.read).unwrap(), b"late".to_vec());
        ctx.close(fds.read).unwrap();
    });
}

#[test]
fn test_thread_exit_on_main_thread_completes_process() {
    boot(|ctx| {
        let child = ctx
            .exec(
                |ctx, _| {
                    if ctx.create_thread(|_, _| 0, b"").is_err() {
                        return 1;
                    }
                    ctx.thread_exit(4);
                },
                b"",
            )
            .unwrap();
        assert_eq!(ctx.wait_child(Some(child)).unwrap().status, 4);
    });
}

#[test]
fn test_thread_table_exhaustion() {
    // One record goes to the init main thread
    let config = KernelConfig::default().with_max_threads(4);
    run(config, |ctx| {
        let gate = ctx.pipe().unwrap();
        let mut tids = Vec::new();
        for _ in 0..3 {
            tids.push(
                ctx.create_thread(move |ctx, _| status(read_to_end(ctx, gate.read).is_ok()), b"")
                    .unwrap(),
            );
        }
        assert_eq!(
            ctx.create_thread(|_, _| 0, b""),
            Err(KernelError::TableExhausted(Resource::Threads))
        );

        ctx.close(gate.write).unwrap();
        for tid in tids {
            assert_eq!(ctx.thread_join(tid), Ok(0));
        }
        ctx.close(gate.read).unwrap();
    });
}

#[test]
fn test_interrupt_calls_are_inert() {
    boot(|ctx| {
        let me = ctx.thread_self();
        assert!(matches!(
            ctx.thread_interrupt(me),
            Err(KernelError::NotSupported(_))
        ));
        assert!(!ctx.thread_is_interrupted());
        ctx.thread_clear_interrupt();
        assert!(!ctx.thread_is_interrupted());
    });
}
