//! Dependency context threading.
//!
//! When a step depends on earlier results, the scheduler augments its
//! task text with a context block listing each predecessor's output as
//! `{agent}_result: {excerpt}`. Excerpts are capped at a stable length
//! so downstream prompts stay bounded.

/// Stable excerpt cap for dependency results.
pub const DEPENDENCY_EXCERPT_CHARS: usize = 240;

/// Truncate to the excerpt cap at a character boundary.
pub fn excerpt(text: &str) -> String {
    if text.chars().count() <= DEPENDENCY_EXCERPT_CHARS {
        return text.to_string();
    }
    text.chars().take(DEPENDENCY_EXCERPT_CHARS).collect()
}

/// Build the dispatched task text for a step with dependency context.
///
/// `sources` holds `(agent_id, result_text)` pairs for each successful
/// predecessor, in declaration order. Without sources the base text is
/// dispatched untouched.
pub fn augment_task_text(base: &str, sources: &[(String, String)]) -> String {
    if sources.is_empty() {
        return base.to_string();
    }

    let mut text = String::from(base);
    text.push_str("\n\nContext from completed steps:\n");
    for (agent_id, result) in sources {
        text.push_str(&format!("{}_result: {}\n", agent_id, excerpt(result)));
    }
    text
}
