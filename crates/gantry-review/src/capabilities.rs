//! Heuristic code-analysis capabilities.
//!
//! Line-based heuristics, deliberately cheap: no parsing, no language
//! server. Each capability reads the run state and returns a partial-state
//! patch; the engine merges patches key-wise.

use serde_json::{Value, json};

use gantry_core::capability::{CapabilityDirectory, DispatchMode, Params};
use gantry_types::error::CapabilityFault;
use gantry_types::run::StateMap;

/// Complexity above which a function draws a refactoring suggestion.
const COMPLEXITY_CEILING: i64 = 10;

/// Quality points lost per detected issue.
const ISSUE_PENALTY: i64 = 5;

/// Quality points restored per actionable suggestion.
const SUGGESTION_CREDIT: i64 = 2;

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

/// Register the four review capabilities into a directory.
///
/// `extract_functions` goes to the worker pool (large inputs); the scoring
/// passes are quick and run inline.
pub fn register_defaults(directory: &CapabilityDirectory) {
    directory.register("extract_functions", DispatchMode::Worker, extract_functions);
    directory.register("check_complexity", DispatchMode::Inline, check_complexity);
    directory.register("detect_issues", DispatchMode::Inline, detect_issues);
    directory.register(
        "suggest_improvements",
        DispatchMode::Inline,
        suggest_improvements,
    );
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Split the source in `state["code"]` into function bodies.
///
/// A function starts at a line whose trimmed form opens with `def `, `fn `,
/// or `pub fn `, and runs until the next such line.
pub fn extract_functions(state: &StateMap, _params: &Params) -> Result<Value, CapabilityFault> {
    let code = state.get("code").and_then(Value::as_str).unwrap_or("");

    let mut functions: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut collecting = false;

    for line in code.lines() {
        if is_function_start(line) {
            if !current.is_empty() {
                functions.push(current.join("\n"));
                current.clear();
            }
            collecting = true;
            current.push(line);
        } else if collecting {
            current.push(line);
        }
    }
    if !current.is_empty() {
        functions.push(current.join("\n"));
    }

    Ok(json!({
        "functions": functions,
        "extracted": functions.len(),
    }))
}

/// Score each extracted function: branch count plus a length penalty, then
/// derive an overall quality score from the average.
pub fn check_complexity(state: &StateMap, _params: &Params) -> Result<Value, CapabilityFault> {
    let functions = state_functions(state);

    let complexities: Vec<i64> = functions.iter().map(|f| complexity_of(f)).collect();

    let avg = if complexities.is_empty() {
        0.0
    } else {
        complexities.iter().sum::<i64>() as f64 / complexities.len() as f64
    };
    let quality = (100 - (avg * 10.0) as i64).max(0);

    Ok(json!({
        "complexities": complexities,
        "quality_score": quality,
    }))
}

/// Scan extracted functions for leftover TODO markers, debug prints, and
/// `eval(` use. Each finding costs quality points.
pub fn detect_issues(state: &StateMap, _params: &Params) -> Result<Value, CapabilityFault> {
    let functions = state_functions(state);

    let mut issues: Vec<&str> = Vec::new();
    for f in &functions {
        if f.contains("TODO") || f.contains("FIXME") {
            issues.push("todo_found");
        }
        if f.contains("print(") {
            issues.push("debug_prints");
        }
        if f.contains("eval(") {
            issues.push("uses_eval");
        }
    }

    let quality = state_quality(state);
    let adjusted = (quality - issues.len() as i64 * ISSUE_PENALTY).max(0);

    Ok(json!({
        "issues": issues,
        "quality_score": adjusted,
    }))
}

/// Turn the complexity and issue findings into suggestions. Each actionable
/// suggestion earns back quality points, capped at 100.
pub fn suggest_improvements(state: &StateMap, _params: &Params) -> Result<Value, CapabilityFault> {
    let mut suggestions: Vec<String> = Vec::new();

    if let Some(complexities) = state.get("complexities").and_then(Value::as_array) {
        for (i, c) in complexities.iter().enumerate() {
            if c.as_i64().unwrap_or(0) > COMPLEXITY_CEILING {
                suggestions.push(format!(
                    "Function {i} is too complex, consider refactoring"
                ));
            }
        }
    }

    let issues: Vec<&str> = state
        .get("issues")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    if issues.contains(&"debug_prints") {
        suggestions.push("Remove print() calls and use proper logging.".to_string());
    }
    if issues.contains(&"uses_eval") {
        suggestions.push("Avoid eval(), it is dangerous.".to_string());
    }

    let quality = state_quality(state);
    let adjusted = (quality + suggestions.len() as i64 * SUGGESTION_CREDIT).min(100);

    Ok(json!({
        "suggestions": suggestions,
        "quality_score": adjusted,
    }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn is_function_start(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("def ") || trimmed.starts_with("fn ") || trimmed.starts_with("pub fn ")
}

/// Branch count plus one point per line past the first five.
fn complexity_of(function: &str) -> i64 {
    let branches = function
        .lines()
        .filter(|line| {
            let trimmed = line.trim_start();
            trimmed.starts_with("if ")
                || trimmed.starts_with("for ")
                || trimmed.starts_with("while ")
        })
        .count() as i64;
    let length_penalty = (function.lines().count() as i64 - 5).max(0);
    branches + length_penalty
}

fn state_functions(state: &StateMap) -> Vec<String> {
    state
        .get("functions")
        .and_then(Value::as_array)
        .map(|a| {
            a.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn state_quality(state: &StateMap) -> i64 {
    state
        .get("quality_score")
        .and_then(Value::as_i64)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
