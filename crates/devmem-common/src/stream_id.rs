/// The stream a memory operation was issued from.
///
/// Streams are numbered from 1 in the order threads first ask for their id, which keeps memory
/// log lines short. Without `std`, every operation comes from the [main](StreamId::MAIN) stream.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
pub struct StreamId {
    value: u64,
}

impl StreamId {
    /// The only stream without `std`.
    pub const MAIN: StreamId = StreamId { value: 0 };

    /// The stream of the calling thread.
    pub fn current() -> Self {
        #[cfg(feature = "std")]
        {
            Self {
                value: current_stream(),
            }
        }

        #[cfg(not(feature = "std"))]
        {
            Self::MAIN
        }
    }

    /// The stream number.
    pub fn value(&self) -> u64 {
        self.value
    }
}

#[cfg(feature = "std")]
fn current_stream() -> u64 {
    use core::cell::Cell;
    use core::sync::atomic::{AtomicU64, Ordering};

    static NEXT: AtomicU64 = AtomicU64::new(1);

    std::thread_local! {
        static STREAM: Cell<u64> = const { Cell::new(0) };
    }

    STREAM.with(|stream| {
        if stream.get() == 0 {
            stream.set(NEXT.fetch_add(1, Ordering::Relaxed));
        }
        stream.get()
    })
}

impl core::fmt::Display for StreamId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_fmt(format_args!("stream#{}", self.value))
    }
}
