//! Frame validation and QR decoding.

mod decoder;
mod overlay;
mod preprocess;
mod validator;

/// Synthetic frames for exercising the decoder in tests.
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use decoder::{
    validate_payload, DecodeOutcome, DecodeReport, Decoder, Detection, RqrrDetector, Strategy,
    SymbolDetector,
};
pub use overlay::draw_outline;
pub use preprocess::{binarize, center_crop, downscale_to_width, invert, to_greyscale};
pub use validator::{FrameAnalysis, FrameSignature, FrameValidator, StabilityState};
