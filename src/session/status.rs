use std::sync::atomic::{AtomicU8, Ordering};

/// The upload session's state.
///
/// `Ready` is both the initial and the post-retry state. `Failed`,
/// `Finished`, and `Canceled` are terminal unless `retry()` moves a
/// `Failed`/`Canceled` session back to `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ready = 0,
    Uploading = 1,
    Paused = 2,
    Failed = 3,
    Finished = 4,
    Canceled = 5,
}

impl Status {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Status::Ready,
            1 => Status::Uploading,
            2 => Status::Paused,
            3 => Status::Failed,
            4 => Status::Finished,
            _ => Status::Canceled,
        }
    }
}

/// Lock-free status cell shared between the chunk-loop task and any task
/// holding a cloned `Arc<UploadSession>`.
/// All operations use `SeqCst`, trading the minimum sufficient ordering for
/// straightforwardness in a non-hot-path field.
#[derive(Debug)]
pub struct AtomicStatus(AtomicU8);

impl AtomicStatus {
    pub fn new(initial: Status) -> Self {
        Self(AtomicU8::new(initial as u8))
    }

    pub fn get(&self) -> Status {
        Status::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn set(&self, status: Status) {
        self.0.store(status as u8, Ordering::SeqCst);
    }

    pub fn is(&self, status: Status) -> bool {
        self.get() == status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_variant() {
        for status in [
            Status::Ready,
            Status::Uploading,
            Status::Paused,
            Status::Failed,
            Status::Finished,
            Status::Canceled,
        ] {
            let cell = AtomicStatus::new(status);
            assert_eq!(cell.get(), status);
        }
    }

    #[test]
    fn is_matches_current_value_only() {
        let cell = AtomicStatus::new(Status::Ready);
        assert!(cell.is(Status::Ready));
        cell.set(Status::Uploading);
        assert!(cell.is(Status::Uploading));
        assert!(!cell.is(Status::Ready));
    }
}
