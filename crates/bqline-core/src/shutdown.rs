//! Graceful shutdown support via atomic flag

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};

/// Set by the SIGTERM/SIGINT handler
static FLAG: LazyLock<Arc<AtomicBool>> = LazyLock::new(|| Arc::new(AtomicBool::new(false)));

/// Route SIGINT/SIGTERM to the shutdown flag.
///
/// Long-running loops poll [`is_shutdown_requested`] between iterations
/// and wind down instead of being killed mid-request.
pub fn install_signal_handlers() -> std::io::Result<()> {
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&FLAG))?;
    }
    Ok(())
}

/// Check if shutdown was requested
pub fn is_shutdown_requested() -> bool {
    FLAG.load(Ordering::Relaxed)
}

/// Request shutdown (for signal handlers and tests)
pub fn request_shutdown() {
    FLAG.store(true, Ordering::Relaxed);
}
