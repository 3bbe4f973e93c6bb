//! Registry of op definitions.

use crate::op_def::OpDef;
use std::collections::HashMap;

/// Maps op names (e.g. "ConcatV2", "Add") to their declared parameters.
///
/// The Attribute Encoder reads declarations from here; the dispatcher uses it
/// to check explicit attribute kinds for ops it knows.
#[derive(Debug, Clone, Default)]
pub struct OpRegistry {
    ops: HashMap<String, OpDef>,
}

impl OpRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an op definition under its own name, replacing any earlier one.
    ///
    /// Returns `self` for method chaining.
    pub fn register(&mut self, def: OpDef) -> &mut Self {
        self.ops.insert(def.name.clone(), def);
        self
    }

    /// Look up an op definition by name.
    pub fn get(&self, name: &str) -> Option<&OpDef> {
        self.ops.get(name)
    }

    /// Check if an op is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.ops.contains_key(name)
    }

    /// Get the number of registered ops.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Iterate over all registered op names, in no particular order.
    pub fn op_names(&self) -> impl Iterator<Item = &str> {
        self.ops.keys().map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op_def::AttrDef;

    fn add() -> OpDef {
        OpDef::new("Add")
            .input("x", "T")
            .input("y", "T")
            .attr(AttrDef::dtype("T"))
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = OpRegistry::new();
        registry.register(add());
        registry.register(OpDef::new("NoOp"));

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("Add"));
        assert!(!registry.contains("Sub"));
        assert_eq!(registry.get("Add").unwrap().inputs.len(), 2);
        assert!(registry.get("Sub").is_none());
    }

    #[test]
    fn test_method_chaining() {
        let mut registry = OpRegistry::new();
        registry.register(add()).register(OpDef::new("NoOp"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_reregister_replaces() {
        let mut registry = OpRegistry::new();
        registry.register(OpDef::new("Add")).register(add());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("Add").unwrap().attrs.len(), 1);
    }

    #[test]
    fn test_op_names() {
        let mut registry = OpRegistry::new();
        registry.register(add()).register(OpDef::new("NoOp"));
        let mut names: Vec<_> = registry.op_names().collect();
        names.sort();
        assert_eq!(names, ["Add", "NoOp"]);
        assert!(OpRegistry::default().is_empty());
    }
}
