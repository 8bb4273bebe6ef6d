// Competency engine: extraction, normalization, aggregation, matrix, summary.
// Everything here is pure and synchronous; I/O lives in `pipeline`.

pub mod aggregator;
pub mod extractor;
pub mod handlers;
pub mod matrix;
pub mod normalizer;
pub mod summarizer;
