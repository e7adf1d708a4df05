//! The scoped variable environment visible during rendering.
//!
//! Frames form a parent chain: `get` searches the current frame first and
//! walks up, `set` always writes the current frame. Frames are reference
//! counted so that macro and `super()` closures can capture the scope they
//! were defined in and outlive the block that created it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::value::Value;

#[derive(Clone, Default)]
pub struct Context {
    frame: Rc<RefCell<HashMap<String, Value>>>,
    parent: Option<Rc<Context>>,
}

impl Context {
    pub fn new() -> Self {
        Context::default()
    }

    pub fn with_data(data: HashMap<String, Value>) -> Self {
        Context {
            frame: Rc::new(RefCell::new(data)),
            parent: None,
        }
    }

    /// Looks up `name`, searching this frame then the parent chain.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.frame.borrow().get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|p| p.get(name))
    }

    pub fn has(&self, name: &str) -> bool {
        self.frame.borrow().contains_key(name)
            || self.parent.as_ref().map_or(false, |p| p.has(name))
    }

    /// Binds `name` in the current frame, shadowing outer frames.
    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.frame.borrow_mut().insert(name.into(), value);
    }

    /// Creates a child frame on top of this one.
    pub fn inherit(&self) -> Context {
        Context {
            frame: Rc::new(RefCell::new(HashMap::new())),
            parent: Some(Rc::new(self.clone())),
        }
    }

    /// Copies the key/value pairs of a map into the current frame.
    pub fn update(&self, other: HashMap<String, Value>) {
        let mut frame = self.frame.borrow_mut();
        for (k, v) in other {
            frame.insert(k, v);
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let frame = self.frame.borrow();
        let mut keys: Vec<&String> = frame.keys().collect();
        keys.sort();
        write!(f, "Context{:?}", keys)?;
        if let Some(parent) = &self.parent {
            write!(f, " <- {:?}", parent)?;
        }
        Ok(())
    }
}
