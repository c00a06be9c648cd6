//! Local name resolution and name generators

use std::collections::HashMap;

/// Stack of block scopes mapping source names to generated names
#[derive(Debug, Default)]
pub struct LocalScope {
    frames: Vec<HashMap<String, String>>,
}

impl LocalScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self) {
        self.frames.push(HashMap::new());
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    /// Bind `name` in the innermost scope; shadows outer bindings
    pub fn insert(&mut self, name: impl Into<String>, generated: impl Into<String>) {
        if self.frames.is_empty() {
            self.push();
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.into(), generated.into());
        }
    }

    /// Innermost binding of `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name))
            .map(String::as_str)
    }
}

/// Monotonic counter, one per function and name class
#[derive(Debug, Default)]
pub struct NameGen {
    counter: usize,
}

impl NameGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self) -> usize {
        let value = self.counter;
        self.counter += 1;
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shadowing_and_pop() {
        let mut scope = LocalScope::new();
        scope.push();
        scope.insert("x", "x.0");
        scope.push();
        scope.insert("x", "x.1");
        assert_eq!(scope.get("x"), Some("x.1"));
        scope.pop();
        assert_eq!(scope.get("x"), Some("x.0"));
        assert_eq!(scope.get("y"), None);
    }

    #[test]
    fn test_name_gen() {
        let mut names = NameGen::new();
        assert_eq!(names.next(), 0);
        assert_eq!(names.next(), 1);
        assert_eq!(NameGen::new().next(), 0);
    }
}
