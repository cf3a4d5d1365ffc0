//! Progress reporting seam for the per-cell unlock pass.

/// Receives progress during the cell unlock pass
pub trait ProgressSink {
    /// The pass is starting; `total` cells will be visited
    fn begin(&mut self, _total: u64) {}

    /// One cell was visited
    fn advance(&mut self, done: u64, total: u64);

    /// The pass is complete
    fn finish(&mut self) {}
}

/// Progress sink that discards everything
#[derive(Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn advance(&mut self, _done: u64, _total: u64) {}
}
