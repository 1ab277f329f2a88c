//! Common test utilities for integration tests.

use std::sync::atomic::{AtomicU16, Ordering};

use tokio::sync::{Mutex, MutexGuard};

/// Log group named by the buffer-size scenarios.
pub const SHARED_GROUP: u16 = 1;

/// Serializes tests that bind [`SHARED_GROUP`]: a group can only be bound by
/// one socket at a time.
static SHARED_GROUP_LOCK: Mutex<()> = Mutex::const_new(());

/// Groups handed out by [`unique_group`], far from commonly used ones.
static NEXT_GROUP: AtomicU16 = AtomicU16::new(0x4e00);

/// Get a log group no other test in this process uses.
pub fn unique_group() -> u16 {
    NEXT_GROUP.fetch_add(1, Ordering::SeqCst)
}

/// Take exclusive use of [`SHARED_GROUP`].
pub async fn lock_shared_group() -> MutexGuard<'static, ()> {
    SHARED_GROUP_LOCK.lock().await
}

/// Check if running as root.
pub fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

/// Skip the test if not running as root.
///
/// Use this at the beginning of integration tests that require root privileges.
#[macro_export]
macro_rules! require_root {
    () => {
        if !crate::common::is_root() {
            eprintln!("Skipping test: requires root");
            return Ok(());
        }
    };
}
