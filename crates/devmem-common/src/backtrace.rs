use alloc::string::String;

/// Where an engine error was raised.
///
/// Capture follows `RUST_BACKTRACE` and `RUST_LIB_BACKTRACE`. When capture is disabled, or
/// without `std`, only a hint on how to enable it is printed.
#[derive(Clone)]
pub struct BackTrace {
    frames: Option<String>,
}

impl BackTrace {
    /// Capture the backtrace of the current thread, if enabled.
    pub fn capture() -> Self {
        #[cfg(feature = "std")]
        {
            let backtrace = std::backtrace::Backtrace::capture();
            if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
                return Self {
                    frames: Some(backtrace.to_string()),
                };
            }
        }

        Self { frames: None }
    }

    /// Whether stack frames were recorded.
    pub fn is_captured(&self) -> bool {
        self.frames.is_some()
    }
}

impl core::fmt::Display for BackTrace {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.frames {
            Some(frames) => f.write_str(frames),
            None => f.write_str("<not captured, run with RUST_BACKTRACE=1 to capture it>"),
        }
    }
}

impl core::fmt::Debug for BackTrace {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(self, f)
    }
}
