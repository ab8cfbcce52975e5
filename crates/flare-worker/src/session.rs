//! Session identity and lifecycle policy.
//!
//! Standalone calls reuse a session keyed by function identity so repeat
//! invocations hit a warm interpreter; batch items each get a disposable
//! uniquely-named session so sibling items can never observe one another.

use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPolicy {
    /// Stable id per `function_id`; destruction is deferred to the
    /// runtime's own idle eviction.
    Warm,
    /// Unique id per item; the worker destroys the session after the run.
    Ephemeral,
}

impl SessionPolicy {
    pub fn session_id(self, function_id: &str) -> String {
        match self {
            SessionPolicy::Warm => format!("fn-{function_id}"),
            SessionPolicy::Ephemeral => format!("item-{}", Uuid::new_v4()),
        }
    }

    /// Whether the worker owns teardown for sessions under this policy.
    pub fn owns_teardown(self) -> bool {
        matches!(self, SessionPolicy::Ephemeral)
    }
}
