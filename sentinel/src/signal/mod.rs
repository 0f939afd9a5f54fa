//! Signal-detection pipeline.
//!
//! Data flows strictly downstream:
//! window → detector → suppressor → recorder → policy → (dispatch).
//! Only the suppressor and recorder touch the store; the detector and the
//! policy are pure.

pub mod detector;
pub mod model;
pub mod policy;
pub mod recorder;
pub mod suppressor;

pub use detector::{classify, detect_backfill, detect_live};
pub use model::{
    CrossingEvent, CrossingKind, OscillatorPoint, SeriesWindow, Thresholds, Timeframe,
    WatchConfig, WindowError,
};
pub use policy::should_notify;
pub use recorder::EventRecorder;
pub use suppressor::{DuplicateSuppressor, Verdict};
