//! # Trigger Rules
//!
//! A [`MatchRule`] pairs one event kind with a service-name pattern. The
//! pattern is tried as a case-insensitive literal first and as a whole-string
//! regular expression second.
//!
//! Misconfigured rules are inert: an empty or invalid pattern makes the rule
//! reject every event, and is reported through logging rather than errors.

use crate::{event_kind::EventKind, payload::TriggerEvent};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Single trigger criterion configured on a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRule {
    /// Event kind this rule responds to
    pub event_kind: EventKind,

    /// Service name literal or regular expression
    #[serde(default)]
    pub service_pattern: Option<String>,
}

impl MatchRule {
    /// Create new rule
    pub fn new(event_kind: EventKind, service_pattern: impl Into<String>) -> Self {
        Self {
            event_kind,
            service_pattern: Some(service_pattern.into()),
        }
    }

    /// Configured pattern with surrounding whitespace removed, if non-blank
    pub fn pattern(&self) -> Option<&str> {
        self.service_pattern
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    /// Check whether this rule accepts the given event
    ///
    /// Checks run in order and stop at the first rejection:
    /// 1. the pattern must be configured
    /// 2. the pattern must be a valid regular expression
    /// 3. the event kind must equal the rule's kind
    /// 4. the event must name a service
    /// 5. the trimmed service name must equal the pattern ignoring case, or
    ///    match it in full as a case-sensitive regular expression
    pub fn accepts(&self, event: &TriggerEvent) -> bool {
        let Some(pattern) = self.pattern() else {
            info!(
                event_kind = %self.event_kind,
                "Trigger rule has no service pattern configured, ignoring"
            );
            return false;
        };

        let regex = match compile_anchored(pattern) {
            Ok(regex) => regex,
            Err(e) => {
                warn!(
                    event_kind = %self.event_kind,
                    pattern = %pattern,
                    error = %e,
                    "Trigger rule has an invalid service pattern, ignoring"
                );
                return false;
            }
        };

        if event.kind() != Some(self.event_kind) {
            return false;
        }

        let Some(service) = event.service().map(str::trim).filter(|s| !s.is_empty()) else {
            return false;
        };

        let accepted = service.to_lowercase() == pattern.to_lowercase() || regex.is_match(service);
        debug!(
            event_kind = %self.event_kind,
            pattern = %pattern,
            service = %service,
            accepted,
            "Evaluated trigger rule"
        );
        accepted
    }
}

/// Check that a service pattern compiles
///
/// Used when loading job configuration so operators see the compile error.
pub fn validate_pattern(pattern: &str) -> Result<(), regex::Error> {
    compile_anchored(pattern.trim()).map(|_| ())
}

/// Compile a pattern for whole-string matching
///
/// The raw pattern is checked first so that anchoring cannot turn an invalid
/// pattern into a valid one (e.g. `a)|(b`).
fn compile_anchored(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(pattern)?;
    Regex::new(&format!("^(?:{})$", ascii_classes(pattern)))
}

/// Rewrite `\d`, `\w` and `\s` (and their negations) as ASCII classes
///
/// Inside a bracketed class the bare `[:name:]` form is emitted so the class
/// stays well formed.
fn ascii_classes(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();
    let mut depth = 0usize;
    let mut class_start = false;

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let Some(next) = chars.next() else {
                    out.push(c);
                    break;
                };
                match (ascii_class_name(next), depth) {
                    (Some(name), 0) => {
                        out.push_str("[[:");
                        out.push_str(name);
                        out.push_str(":]]");
                    }
                    (Some(name), _) => {
                        out.push_str("[:");
                        out.push_str(name);
                        out.push_str(":]");
                    }
                    (None, _) => {
                        out.push(c);
                        out.push(next);
                    }
                }
            }
            '[' => {
                out.push(c);
                depth += 1;
                class_start = true;
                if chars.peek() == Some(&'^') {
                    chars.next();
                    out.push('^');
                }
                continue;
            }
            ']' if depth > 0 && !class_start => {
                depth -= 1;
                out.push(c);
            }
            _ => out.push(c),
        }
        class_start = false;
    }
    out
}

fn ascii_class_name(escape: char) -> Option<&'static str> {
    match escape {
        'd' => Some("digit"),
        'D' => Some("^digit"),
        'w' => Some("word"),
        'W' => Some("^word"),
        's' => Some("space"),
        'S' => Some("^space"),
        _ => None,
    }
}

#[cfg(test)]
#[path = "rules_tests.rs"]
mod tests;
