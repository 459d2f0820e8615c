mod buffer;

pub use buffer::{Blob, SCAN_HORIZON_MS, TimePoint, TimeSeriesBuffer};
