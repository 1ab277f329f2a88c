//! Stream consumption tests.

use std::time::Duration;

use nflog::{Config, Connection, ExitReason, Result};
use tokio::time::timeout;
use tokio_stream::StreamExt;

use crate::common::unique_group;

#[tokio::test]
async fn test_stream_ends_on_close() -> Result<()> {
    require_root!();

    let conn = Connection::open(Config::new(unique_group())).await?;
    let closer = conn.close_handle();
    let mut packets = conn.into_stream();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        closer.close();
    });

    let next = timeout(Duration::from_secs(5), packets.next())
        .await
        .expect("close did not end the stream");
    assert!(next.is_none());
    assert_eq!(packets.exit_reason(), Some(ExitReason::Closed));

    // Ended streams stay ended.
    assert!(packets.next().await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_stream_of_closed_connection() -> Result<()> {
    require_root!();

    let conn = Connection::open(Config::new(unique_group())).await?;
    conn.close();
    let mut packets = conn.into_stream();
    assert!(packets.next().await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_close_releases_group_while_stream_alive() -> Result<()> {
    require_root!();

    let group = unique_group();
    let conn = Connection::open(Config::new(group)).await?;
    let closer = conn.close_handle();
    let packets = conn.into_stream();

    // The stream is never polled and outlives the close.
    closer.close();
    let reopened = Connection::open(Config::new(group)).await?;
    reopened.close();

    drop(packets);
    Ok(())
}

#[tokio::test]
async fn test_close_releases_group_after_polling() -> Result<()> {
    require_root!();

    let group = unique_group();
    let mut packets = Connection::open(Config::new(group)).await?.into_stream();
    assert!(
        timeout(Duration::from_millis(50), packets.next())
            .await
            .is_err()
    );

    packets.close();
    let reopened = Connection::open(Config::new(group)).await?;
    reopened.close();

    assert!(packets.next().await.is_none());
    Ok(())
}
