//! Real-time safe diagnostics for the autogain engine.
//!
//! `ag_log!` formats into a fixed-size entry and pushes it onto a lock-free
//! ring without allocating, so it may be used from the audio thread. Entries
//! are stamped with a sequence number and drained to `/tmp/vxautogain.log`
//! from a non-real-time context (`initialize`, `deactivate`).
//!
//! Without the `debug` feature the macro compiles to nothing.

use std::fmt;

#[cfg(feature = "debug")]
pub mod logger {
    use std::cell::UnsafeCell;
    use std::fmt;
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
    use std::sync::OnceLock;

    const LOG_PATH: &str = "/tmp/vxautogain.log";
    const RING_CAP: usize = 128;
    const ENTRY_MAX: usize = 256;

    #[derive(Copy, Clone)]
    struct Entry {
        seq: u64,
        len: u16,
        bytes: [u8; ENTRY_MAX],
    }

    impl Default for Entry {
        fn default() -> Self {
            Self {
                seq: 0,
                len: 0,
                bytes: [0; ENTRY_MAX],
            }
        }
    }

    impl fmt::Write for Entry {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            let used = self.len as usize;
            let n = s.len().min(ENTRY_MAX - used);
            self.bytes[used..used + n].copy_from_slice(&s.as_bytes()[..n]);
            self.len += n as u16;
            Ok(())
        }
    }

    /// Single-producer (audio thread) / single-consumer ring of entries.
    struct Ring {
        head: AtomicUsize,
        tail: AtomicUsize,
        slots: Box<[UnsafeCell<Entry>]>,
    }

    unsafe impl Sync for Ring {}

    impl Ring {
        fn new() -> Self {
            Self {
                head: AtomicUsize::new(0),
                tail: AtomicUsize::new(0),
                slots: (0..RING_CAP)
                    .map(|_| UnsafeCell::new(Entry::default()))
                    .collect(),
            }
        }

        fn push(&self, entry: &Entry) -> bool {
            let head = self.head.load(Ordering::Relaxed);
            let next = (head + 1) % RING_CAP;
            if next == self.tail.load(Ordering::Acquire) {
                return false;
            }
            // SAFETY: only the producer writes the slot at `head`, and the
            // consumer never reads it before `head` is advanced.
            unsafe {
                *self.slots[head].get() = *entry;
            }
            self.head.store(next, Ordering::Release);
            true
        }

        fn pop(&self) -> Option<Entry> {
            let tail = self.tail.load(Ordering::Relaxed);
            if tail == self.head.load(Ordering::Acquire) {
                return None;
            }
            // SAFETY: the slot at `tail` was published by the producer.
            let entry = unsafe { *self.slots[tail].get() };
            self.tail.store((tail + 1) % RING_CAP, Ordering::Release);
            Some(entry)
        }
    }

    static RING: OnceLock<Ring> = OnceLock::new();
    static ENABLED: AtomicBool = AtomicBool::new(false);
    static SEQ: AtomicU64 = AtomicU64::new(0);
    static DROPPED: AtomicU64 = AtomicU64::new(0);

    /// Allocate the ring. Call from a non-real-time context.
    pub fn install() {
        let _ = RING.get_or_init(Ring::new);
        ENABLED.store(true, Ordering::Relaxed);
    }

    pub fn record(args: fmt::Arguments) {
        if !ENABLED.load(Ordering::Relaxed) {
            return;
        }
        let Some(ring) = RING.get() else {
            return;
        };

        let mut entry = Entry {
            seq: SEQ.fetch_add(1, Ordering::Relaxed),
            ..Entry::default()
        };
        let _ = fmt::write(&mut entry, args);
        if !ring.push(&entry) {
            DROPPED.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Append pending entries to the log file.
    pub fn flush() {
        let Some(ring) = RING.get() else {
            return;
        };
        let Ok(mut file) = OpenOptions::new().create(true).append(true).open(LOG_PATH) else {
            return;
        };

        while let Some(entry) = ring.pop() {
            let msg = std::str::from_utf8(&entry.bytes[..entry.len as usize]).unwrap_or("<invalid>");
            let _ = writeln!(file, "[{:>8}] {}", entry.seq, msg);
        }
        let dropped = DROPPED.swap(0, Ordering::Relaxed);
        if dropped > 0 {
            let _ = writeln!(file, "[--------] {} entries dropped", dropped);
        }
    }
}

#[cfg(feature = "debug")]
pub(crate) fn ag_log_inner(args: fmt::Arguments) {
    logger::record(args);
}

#[cfg(not(feature = "debug"))]
#[inline(always)]
pub(crate) fn ag_log_inner(_args: fmt::Arguments) {}

#[macro_export]
macro_rules! ag_log {
    ($($arg:tt)*) => {
        $crate::debug::ag_log_inner(format_args!($($arg)*))
    };
}
