//! Check execution context
//!
//! The engine never looks inside the context. Hosts put whatever their
//! checks need (a scene handle, a database connection) into the typed
//! extension map, and checks fetch it back by key.
//!
//! ```ignore
//! let mut ctx = CheckContext::new();
//! ctx.extensions_mut().set(SCENE_KEY, Scene::default());
//!
//! // In a check:
//! let scene = ctx.require::<Scene>(SCENE_KEY)?;
//! ```

use std::any::Any;
use std::collections::HashMap;

use crate::check::CheckError;
use crate::undo::{Operation, UndoQueue};

/// Typed map of non-serializable values keyed by string
///
/// Lookups return `None` when the key is missing or holds another type.
pub struct Extensions {
    inner: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self {
            inner: HashMap::new(),
        }
    }

    /// Insert a value, replacing any previous value under `key`
    pub fn set<T: Send + Sync + 'static>(&mut self, key: &str, value: T) {
        self.inner.insert(key.to_string(), Box::new(value));
    }

    pub fn get<T: Send + Sync + 'static>(&self, key: &str) -> Option<&T> {
        self.inner.get(key).and_then(|v| v.downcast_ref())
    }

    pub fn get_mut<T: Send + Sync + 'static>(&mut self, key: &str) -> Option<&mut T> {
        self.inner.get_mut(key).and_then(|v| v.downcast_mut())
    }

    /// Remove and return the value under `key` if it has type `T`
    pub fn remove<T: Send + Sync + 'static>(&mut self, key: &str) -> Option<T> {
        let boxed = self.inner.remove(key)?;
        match boxed.downcast::<T>() {
            Ok(value) => Some(*value),
            Err(other) => {
                self.inner.insert(key.to_string(), other);
                None
            }
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }
}

impl Default for Extensions {
    fn default() -> Self {
        Self::new()
    }
}

/// Context handed to every check and process body
#[derive(Default)]
pub struct CheckContext {
    extensions: Extensions,
    undo: UndoQueue,
}

impl CheckContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context whose undo queue keeps `levels` chunks
    pub fn with_undo_levels(levels: usize) -> Self {
        Self {
            extensions: Extensions::new(),
            undo: UndoQueue::new(levels),
        }
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Fetch a value the check cannot run without
    pub fn require<T: Send + Sync + 'static>(&self, key: &str) -> Result<&T, CheckError> {
        self.extensions
            .get(key)
            .ok_or_else(|| CheckError::new(format!("Context value '{}' is missing", key)))
    }

    pub fn require_mut<T: Send + Sync + 'static>(
        &mut self,
        key: &str,
    ) -> Result<&mut T, CheckError> {
        self.extensions
            .get_mut(key)
            .ok_or_else(|| CheckError::new(format!("Context value '{}' is missing", key)))
    }

    /// Apply an operation and record it on the undo queue
    pub fn apply(&mut self, mut op: impl Operation + 'static) -> Result<(), CheckError> {
        op.do_it(&mut self.extensions)?;
        self.undo.record(Box::new(op));
        Ok(())
    }

    /// Revert the last recorded chunk
    pub fn undo_last(&mut self) -> Result<bool, CheckError> {
        self.undo.undo(&mut self.extensions)
    }

    /// Reapply the last reverted chunk
    pub fn redo_last(&mut self) -> Result<bool, CheckError> {
        self.undo.redo(&mut self.extensions)
    }

    pub fn undo(&self) -> &UndoQueue {
        &self.undo
    }

    pub fn undo_mut(&mut self) -> &mut UndoQueue {
        &mut self.undo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Rename {
        from: String,
        to: String,
    }

    impl Operation for Rename {
        fn do_it(&mut self, ext: &mut Extensions) -> Result<(), CheckError> {
            let name = ext.get_mut::<String>("name").ok_or("no name")?;
            *name = self.to.clone();
            Ok(())
        }

        fn undo_it(&mut self, ext: &mut Extensions) -> Result<(), CheckError> {
            let name = ext.get_mut::<String>("name").ok_or("no name")?;
            *name = self.from.clone();
            Ok(())
        }
    }

    #[test]
    fn test_set_and_get() {
        let mut ext = Extensions::new();
        ext.set("value", 42u32);
        assert_eq!(ext.get::<u32>("value"), Some(&42));
        assert!(ext.has("value"));
    }

    #[test]
    fn test_type_mismatch_returns_none() {
        let mut ext = Extensions::new();
        ext.set("value", 42u32);
        assert_eq!(ext.get::<String>("value"), None);
        assert_eq!(ext.remove::<String>("value"), None);
        assert!(ext.has("value"));
        assert_eq!(ext.remove::<u32>("value"), Some(42));
        assert!(!ext.has("value"));
    }

    #[test]
    fn test_arc_values() {
        let mut ext = Extensions::new();
        let shared = Arc::new(String::from("scene"));
        ext.set("scene", shared.clone());
        let got = ext.get::<Arc<String>>("scene").unwrap();
        assert!(Arc::ptr_eq(got, &shared));
    }

    #[test]
    fn test_require_reports_missing_key() {
        let ctx = CheckContext::new();
        let err = ctx.require::<u32>("scene").unwrap_err();
        assert!(err.message().contains("'scene'"));
    }

    #[test]
    fn test_apply_records_undo() {
        let mut ctx = CheckContext::with_undo_levels(4);
        ctx.extensions_mut().set("name", String::from("pCube1"));

        ctx.apply(Rename {
            from: "pCube1".into(),
            to: "geo_cube".into(),
        })
        .unwrap();
        assert_eq!(ctx.require::<String>("name").unwrap(), "geo_cube");

        assert!(ctx.undo_last().unwrap());
        assert_eq!(ctx.require::<String>("name").unwrap(), "pCube1");
        assert!(ctx.redo_last().unwrap());
        assert_eq!(ctx.require::<String>("name").unwrap(), "geo_cube");
    }
}
