//! Open and bind handshake tests.

use std::time::Duration;

use nflog::{Config, Connection, CopyMode, Error, LogFlags, Result};

use crate::common::{SHARED_GROUP, lock_shared_group, unique_group};

#[tokio::test]
async fn test_sock_buf_size() -> Result<()> {
    require_root!();
    let _group = lock_shared_group().await;

    let config = Config::new(SHARED_GROUP)
        .copy_mode(CopyMode::Packet)
        .sock_buf_size(2_097_152);
    let conn = Connection::open(config).await?;

    // The kernel doubles the value it stores.
    let size = conn.recv_buffer_size()?;
    assert!(size >= 2_097_152, "receive buffer is {size} bytes");

    conn.close();
    assert!(conn.is_closed());
    Ok(())
}

#[tokio::test]
async fn test_sock_buf_size_default() -> Result<()> {
    require_root!();
    let _group = lock_shared_group().await;

    let config = Config::new(SHARED_GROUP).copy_mode(CopyMode::Packet);
    let conn = Connection::open(config).await?;
    assert!(conn.recv_buffer_size()? > 0);

    conn.close();
    Ok(())
}

#[tokio::test]
async fn test_open_with_tunables() -> Result<()> {
    require_root!();

    let config = Config::new(unique_group())
        .copy_mode(CopyMode::Meta)
        .flags(LogFlags::SEQ | LogFlags::SEQ_GLOBAL)
        .nl_buf_size(1 << 16)
        .qthresh(8)
        .timeout(Duration::from_millis(50))
        .no_enobufs(true);
    let conn = Connection::open(config).await?;

    assert_eq!(conn.stats(), Default::default());
    assert!(conn.exit_reason().is_none());
    conn.close();
    Ok(())
}

#[tokio::test]
async fn test_copy_mode_none() -> Result<()> {
    require_root!();

    let conn = Connection::open(Config::new(unique_group()).copy_mode(CopyMode::None)).await?;
    conn.close();
    Ok(())
}

#[tokio::test]
async fn test_group_already_bound() -> Result<()> {
    require_root!();

    let group = unique_group();
    let first = Connection::open(Config::new(group)).await?;

    let err = Connection::open(Config::new(group)).await.unwrap_err();
    assert!(matches!(err, Error::Bind { .. }), "unexpected error: {err:?}");
    assert!(err.errno().is_some());

    first.close();
    Ok(())
}

#[tokio::test]
async fn test_close_releases_group() -> Result<()> {
    require_root!();

    let group = unique_group();
    let conn = Connection::open(Config::new(group)).await?;
    conn.close();
    drop(conn);

    // The kernel drops the binding with the socket.
    let conn = Connection::open(Config::new(group)).await?;
    conn.close();
    Ok(())
}
