//! The sample source side of the request/reply contract.

/// Produces a batch of samples for a requested sample index.
///
/// The scheduler asks for the batch starting at `sample_index` and schedules whatever comes back
/// immediately after the previous batch, so the length of each batch is entirely up to the
/// producer. An empty batch schedules a zero-length buffer and the next request repeats the
/// same index.
pub trait BatchProducer: Send + 'static {
    /// Produce the batch that starts at `sample_index`.
    fn produce(&mut self, sample_index: u64) -> Vec<f32>;
}

impl<F> BatchProducer for F
where
    F: FnMut(u64) -> Vec<f32> + Send + 'static,
{
    fn produce(&mut self, sample_index: u64) -> Vec<f32> {
        self(sample_index)
    }
}
