//! The sample code-review graph.
//!
//! extract -> complexity -> issues -> suggest, with a loop rule on
//! `suggest` that sends the run back to `complexity` until the quality
//! score clears the threshold.

use std::collections::HashMap;

use gantry_types::graph::{Graph, GraphSpec, LoopRule, NodeSpec};

/// Quality score a review must reach before the workflow settles.
pub const QUALITY_THRESHOLD: f64 = 85.0;

/// Build the validated code-review graph.
pub fn review_graph() -> Graph {
    let mut nodes = HashMap::new();
    for (name, capability) in [
        ("extract", "extract_functions"),
        ("complexity", "check_complexity"),
        ("issues", "detect_issues"),
        ("suggest", "suggest_improvements"),
    ] {
        nodes.insert(name.to_string(), NodeSpec::new(name, capability));
    }

    let mut edges = HashMap::new();
    edges.insert("extract".to_string(), Some("complexity".to_string()));
    edges.insert("complexity".to_string(), Some("issues".to_string()));
    edges.insert("issues".to_string(), Some("suggest".to_string()));
    edges.insert("suggest".to_string(), None);

    let mut loops = HashMap::new();
    loops.insert(
        "suggest".to_string(),
        LoopRule {
            until: "quality_score".to_string(),
            threshold: QUALITY_THRESHOLD,
            goto: "complexity".to_string(),
        },
    );

    let spec = GraphSpec {
        nodes,
        edges,
        start: "extract".to_string(),
        loops,
    };

    // The spec above is statically well-formed.
    Graph::new(spec).expect("review graph spec is valid")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;

    use gantry_core::capability::CapabilityDirectory;
    use gantry_core::engine::Engine;
    use gantry_core::store::memory::MemoryRunStore;
    use gantry_types::run::{LogEvent, RunStatus, StateMap};

    use crate::capabilities::register_defaults;

    fn review_engine() -> Engine<MemoryRunStore> {
        let directory = CapabilityDirectory::new();
        register_defaults(&directory);
        Engine::new(Arc::new(directory), MemoryRunStore::new())
    }

    fn state_with_code(code: &str) -> StateMap {
        let mut state = StateMap::new();
        state.insert("code".to_string(), json!(code));
        state
    }

    // -----------------------------------------------------------------------
    // Graph shape
    // -----------------------------------------------------------------------

    #[test]
    fn test_graph_shape() {
        let graph = review_graph();
        assert_eq!(graph.start(), "extract");
        assert_eq!(graph.edge("extract"), Some("complexity"));
        assert_eq!(graph.edge("suggest"), None);

        let rule = graph.loop_rule("suggest").expect("suggest owns the loop");
        assert_eq!(rule.until, "quality_score");
        assert_eq!(rule.goto, "complexity");
    }

    // -----------------------------------------------------------------------
    // End to end: clean code settles immediately
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_clean_code_completes_without_looping() {
        let engine = review_engine();
        let graph = Arc::new(review_graph());

        let code = "def add(a, b):\n    return a + b\n";
        let run_id = engine
            .create_run(graph, state_with_code(code))
            .await
            .unwrap();
        let status = engine.execute_run(run_id).await.unwrap();
        assert_eq!(status, RunStatus::Completed);

        let info = engine.get_run_info(run_id).await.unwrap();
        let quality = info.state["quality_score"].as_i64().unwrap();
        assert!(quality >= 85, "clean code should score high, got {quality}");
        assert!(
            !info
                .log
                .iter()
                .any(|e| matches!(e, LogEvent::Loop { .. })),
            "no revisits expected for clean code"
        );
        assert_eq!(info.state["extracted"], json!(1));
    }

    // -----------------------------------------------------------------------
    // End to end: messy code keeps looping until the safety valve
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_messy_code_loops_until_step_limit() {
        let engine = review_engine().with_max_steps(20);
        let graph = Arc::new(review_graph());

        // One long, branchy function with debug prints: the recomputed
        // quality score never reaches the threshold, so only the step
        // limit ends the run.
        let code = "def churn(rows):\n    out = []\n    for row in rows:\n        if row:\n            for cell in row:\n                if cell:\n                    while cell > 0:\n                        print(cell)\n                        cell -= 1\n                    out.append(cell)\n    return out\n";

        let run_id = engine
            .create_run(graph, state_with_code(code))
            .await
            .unwrap();
        let status = engine.execute_run(run_id).await.unwrap();
        assert_eq!(status, RunStatus::Failed);

        let info = engine.get_run_info(run_id).await.unwrap();
        assert!(
            info.log
                .iter()
                .any(|e| matches!(e, LogEvent::Loop { from, to } if from == "suggest" && to == "complexity"))
        );
        assert!(
            matches!(info.log.last(), Some(LogEvent::StepLimit { limit: 20 }))
        );
        // The review still produced findings before hitting the valve.
        assert!(info.state["issues"].as_array().is_some());
        assert!(!info.state["suggestions"].as_array().unwrap().is_empty());
    }
}
