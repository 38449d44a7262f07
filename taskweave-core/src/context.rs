//! Shared execution context threaded through skill invocations
//!
//! Variables are string-keyed and case-insensitive. The default input slot is
//! addressed by the reserved key `input`; it holds the value a skill receives
//! as its implicit argument and is overwritten by every plan step.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Reserved variable name of the default input slot
pub const INPUT_VAR: &str = "input";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Variable {
    /// Name as first written
    name: String,
    value: String,
}

/// Mutable key-value store of string variables plus the default input
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    input: String,
    /// Keyed by lowercased name
    variables: BTreeMap<String, Variable>,
}

fn fold(name: &str) -> String {
    name.to_lowercase()
}

fn is_input(name: &str) -> bool {
    name.eq_ignore_ascii_case(INPUT_VAR)
}

impl ExecutionContext {
    /// Create a context with the given default input
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            variables: BTreeMap::new(),
        }
    }

    /// Builder-style variable assignment
    pub fn with_variable(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Current default input
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Replace the default input
    pub fn set_input(&mut self, value: impl Into<String>) {
        self.input = value.into();
    }

    /// Look up a variable; `input` returns the default input slot
    pub fn get(&self, name: &str) -> Option<&str> {
        if is_input(name) {
            return Some(&self.input);
        }
        self.variables.get(&fold(name)).map(|v| v.value.as_str())
    }

    /// Set a variable, keeping the casing of the first write
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if is_input(name) {
            self.input = value;
            return;
        }
        self.variables
            .entry(fold(name))
            .and_modify(|v| v.value.clone_from(&value))
            .or_insert_with(|| Variable {
                name: name.to_string(),
                value,
            });
    }

    /// Append to a variable, creating it when absent
    pub fn append(&mut self, name: &str, suffix: &str) {
        let mut current = self.get(name).unwrap_or_default().to_string();
        current.push_str(suffix);
        self.set(name, current);
    }

    /// Remove a variable and return its value. The input slot cannot be removed.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        if is_input(name) {
            return None;
        }
        self.variables.remove(&fold(name)).map(|v| v.value)
    }

    /// Whether a variable (or the input slot) is present
    pub fn contains(&self, name: &str) -> bool {
        is_input(name) || self.variables.contains_key(&fold(name))
    }

    /// Named variables, excluding the input slot, in case-folded key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.variables
            .values()
            .map(|v| (v.name.as_str(), v.value.as_str()))
    }

    /// Number of named variables (the input slot is not counted)
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// True when no named variables are set
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_case_insensitive() {
        let mut ctx = ExecutionContext::new("3");
        ctx.set("Amount", "2");
        assert_eq!(ctx.get("amount"), Some("2"));
        assert_eq!(ctx.get("AMOUNT"), Some("2"));

        ctx.set("AMOUNT", "5");
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.iter().collect::<Vec<_>>(), vec![("Amount", "5")]);
    }

    #[test]
    fn test_input_slot_alias() {
        let mut ctx = ExecutionContext::new("first");
        assert_eq!(ctx.get("INPUT"), Some("first"));
        ctx.set("Input", "second");
        assert_eq!(ctx.input(), "second");
        assert!(ctx.is_empty());
        assert_eq!(ctx.remove("input"), None);
    }

    #[test]
    fn test_append_creates_variable() {
        let mut ctx = ExecutionContext::default();
        ctx.append("history", "\nHuman: hi");
        ctx.append("History", "\nAI: hello");
        assert_eq!(ctx.get("history"), Some("\nHuman: hi\nAI: hello"));
    }
}
