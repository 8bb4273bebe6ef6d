// Batch pipeline over JSON exchange files.
// analyze -> matrix_run -> recommend, each stage reading the previous one's output.

pub mod analyze;
pub mod matrix_run;
pub mod recommend;
pub mod store;
