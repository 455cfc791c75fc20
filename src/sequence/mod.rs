// Sequence Pattern Detection over the ordered region stream
//
// Regions are treated as a time series of normalized (address, size) pairs.
// A short-horizon autoregressive predictor scores how predictable the stream
// is; predictable windows are then classified from their successive
// differences, autocorrelation and entropy.
//
// Key Insight: a predictable stream is not necessarily sequential. A cyclic
// allocator is just as predictable, so prediction confidence gates the
// classification but does not decide it.

mod detector;
mod predictor;

pub use detector::{is_sequential, SequenceDetector, SequenceScore, SequenceWindow};
pub use predictor::LinearPredictor;
