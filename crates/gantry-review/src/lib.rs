//! The code-review workflow: heuristic capabilities and the sample graph.
//!
//! Four capabilities analyze source code held in the run state under the
//! `code` key: extract functions, score complexity, detect issues, suggest
//! improvements. The sample graph chains them with a quality-score loop
//! that revisits the analysis until the score clears a threshold.

pub mod capabilities;
pub mod graph;

pub use capabilities::register_defaults;
pub use graph::review_graph;
