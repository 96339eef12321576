//! Scan orchestration: camera start-up, the frame loop and locker dispatch.

mod normalize;
mod scan_loop;
mod session;
mod signal;

pub use normalize::{normalize_payload, NormalizedPayload};
pub use scan_loop::{ScanLoop, TickOutcome};
pub use session::{ScanOutcome, ScanSession};
pub use signal::{StopSignal, StopToken};

use barang_types::BarangError;

pub fn scanner_error(message: impl Into<String>) -> BarangError {
    BarangError::Scanner(message.into())
}
