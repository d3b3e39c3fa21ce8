//! Variable frames.
//!
//! Each custom block instance owns a frame for the definition's block
//! variables; receivers and the project own frames for sprite-local and
//! global variables. Export bundles carry forks of these frames.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A variable's value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum VarValue {
    /// Never assigned.
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    List(Vec<VarValue>),
}

/// Ordered name -> value mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableFrame {
    vars: IndexMap<String, VarValue>,
}

impl VariableFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `name` with an empty value unless it already exists.
    pub fn add_var(&mut self, name: impl Into<String>) {
        self.vars.entry(name.into()).or_default();
    }

    pub fn set_var(&mut self, name: impl Into<String>, value: VarValue) {
        self.vars.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&VarValue> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// A new frame holding only the named variables that exist here, in
    /// the order given.
    pub fn fork<S: AsRef<str>>(&self, names: &[S]) -> VariableFrame {
        let vars = names
            .iter()
            .filter_map(|name| {
                let name = name.as_ref();
                self.vars.get(name).map(|v| (name.to_string(), v.clone()))
            })
            .collect();
        VariableFrame { vars }
    }

    /// Re-declares the frame for a new name list: values of names that
    /// survive are kept, new names start empty, dropped names go away.
    pub fn reinit(&mut self, names: &[String]) {
        let old = std::mem::take(&mut self.vars);
        for name in names {
            let value = old.get(name).cloned().unwrap_or_default();
            self.vars.insert(name.clone(), value);
        }
    }

    /// Copies every variable of `other` into this frame, overwriting.
    pub fn merge(&mut self, other: &VariableFrame) {
        for (name, value) in &other.vars {
            self.vars.insert(name.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fork_keeps_only_known_names() {
        let mut frame = VariableFrame::new();
        frame.set_var("score", VarValue::Number(3.0));
        frame.set_var("lives", VarValue::Number(1.0));
        let forked = frame.fork(&["score", "missing"]);
        assert_eq!(forked.len(), 1);
        assert_eq!(forked.get("score"), Some(&VarValue::Number(3.0)));
    }

    #[test]
    fn reinit_preserves_surviving_values() {
        let mut frame = VariableFrame::new();
        frame.set_var("a", VarValue::Text("kept".into()));
        frame.set_var("b", VarValue::Bool(true));
        frame.reinit(&["a".to_string(), "c".to_string()]);
        assert_eq!(frame.get("a"), Some(&VarValue::Text("kept".into())));
        assert_eq!(frame.get("c"), Some(&VarValue::Empty));
        assert!(!frame.contains("b"));
    }
}
