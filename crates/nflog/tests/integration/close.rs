//! Close tests.

use std::ops::ControlFlow;
use std::thread;
use std::time::Duration;

use nflog::{Config, Connection, Error, ExitReason, Result};
use tokio::time::timeout;

use crate::common::unique_group;

const LOOP_DEADLINE: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_close_twice() -> Result<()> {
    require_root!();

    let conn = Connection::open(Config::new(unique_group())).await?;
    conn.close();
    conn.close();
    assert!(conn.is_closed());
    assert!(matches!(conn.recv_buffer_size(), Err(Error::Closed)));
    Ok(())
}

#[tokio::test]
async fn test_close_wakes_run() -> Result<()> {
    require_root!();

    let mut conn = Connection::open(Config::new(unique_group())).await?;
    let closer = conn.close_handle();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        closer.close();
    });

    let reason = timeout(LOOP_DEADLINE, conn.run(|_| ControlFlow::Continue(())))
        .await
        .expect("close did not stop the receive loop");
    assert_eq!(reason, ExitReason::Closed);
    assert_eq!(conn.exit_reason(), Some(ExitReason::Closed));
    assert!(conn.is_closed());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_close_from_threads() -> Result<()> {
    require_root!();

    let mut conn = Connection::open(Config::new(unique_group())).await?;
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let closer = conn.close_handle();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                closer.close();
                closer.is_closed()
            })
        })
        .collect();

    let reason = timeout(LOOP_DEADLINE, conn.run(|_| ControlFlow::Continue(())))
        .await
        .expect("close did not stop the receive loop");
    assert_eq!(reason, ExitReason::Closed);

    for handle in handles {
        assert!(handle.join().expect("closer thread panicked"));
    }
    conn.close();
    assert!(conn.is_closed());
    Ok(())
}

#[tokio::test]
async fn test_run_after_close() -> Result<()> {
    require_root!();

    let mut conn = Connection::open(Config::new(unique_group())).await?;
    conn.close();

    let mut calls = 0;
    let reason = conn
        .run(|_| {
            calls += 1;
            ControlFlow::Continue(())
        })
        .await;
    assert_eq!(reason, ExitReason::Closed);
    assert_eq!(calls, 0);
    Ok(())
}
