use crate::error::AppError;
use std::collections::HashSet;
use std::sync::{Mutex, OnceLock};

/// Registry of in-flight mutating operations, keyed by resource kind and id
static ACTIVE_OPS: OnceLock<Mutex<HashSet<(&'static str, i64)>>> = OnceLock::new();

fn registry() -> &'static Mutex<HashSet<(&'static str, i64)>> {
    ACTIVE_OPS.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Held while a mutating operation runs; released on drop
pub struct OpGuard {
    key: (&'static str, i64),
}

/// Claims `(kind, id)` for the caller. A second claim on the same resource
/// fails fast with `Busy` instead of queueing.
pub fn acquire(kind: &'static str, id: i64) -> Result<OpGuard, AppError> {
    let mut ops = registry()
        .lock()
        .map_err(|_| AppError::Busy(format!("{} {}", kind, id)))?;

    if !ops.insert((kind, id)) {
        return Err(AppError::Busy(format!(
            "another operation on {} {} is still running",
            kind, id
        )));
    }

    Ok(OpGuard { key: (kind, id) })
}

impl Drop for OpGuard {
    fn drop(&mut self) {
        if let Ok(mut ops) = registry().lock() {
            ops.remove(&self.key);
        }
    }
}

/// The registry is process-global while test databases are not; tests that
/// take directory guards serialize through this lock so ids from unrelated
/// in-memory databases cannot collide.
#[cfg(test)]
pub(crate) fn test_serial_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = Mutex::new(());
    LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_fast() {
        let guard = acquire("test-directory", 1).unwrap();

        let second = acquire("test-directory", 1);
        assert!(matches!(second, Err(AppError::Busy(_))));

        // A different id is not affected.
        let other = acquire("test-directory", 2).unwrap();
        drop(other);

        drop(guard);
        let third = acquire("test-directory", 1);
        assert!(third.is_ok());
    }
}
