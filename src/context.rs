//! Layered name→value context threaded through a build or parse call.
//!
//! Records push a frame on entry and pop it on exit; embedded constructs
//! write into the frame of the record that encloses them. Lookups walk the
//! frames newest-first, so a nested record sees its own fields before its
//! parents'. This is what lets one field's parsed (or target) value
//! parameterize a later field.

use crate::error::{Error, Result};
use crate::value::{Map, Value};

/// Stack of name→value frames.
#[derive(Debug, Clone)]
pub struct Context {
    frames: Vec<Map>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Fresh context with a single empty frame.
    pub fn new() -> Self {
        Self {
            frames: vec![Map::new()],
        }
    }

    /// Look a name up, searching the newest frame first.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|frame| frame.get(key))
    }

    /// Write into the current (newest) frame.
    pub fn update(&mut self, key: impl Into<String>, value: Value) {
        // `frames` is never empty: the root frame is created in `new` and
        // `pop_frame` refuses to remove it.
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(key.into(), value);
        }
    }

    /// Write several entries into the current frame.
    pub fn merge(&mut self, entries: &Map) {
        for (key, value) in entries {
            self.update(key.clone(), value.clone());
        }
    }

    pub(crate) fn push_frame(&mut self, seed: Map) {
        self.frames.push(seed);
    }

    pub(crate) fn pop_frame(&mut self) {
        debug_assert!(self.frames.len() > 1, "unbalanced context frame pop");
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Look a name up or fail with a contextual error.
    pub fn require(&self, key: &str) -> Result<&Value> {
        self.get(key)
            .ok_or_else(|| Error::contextual(format!("missing context key '{key}'")))
    }

    /// Integer-typed lookup.
    pub fn int(&self, key: &str) -> Result<i128> {
        let value = self.require(key)?;
        value.as_int().ok_or_else(|| {
            Error::contextual(format!(
                "context key '{key}' is not an integer, found {}",
                value.kind()
            ))
        })
    }

    /// Bytes-typed lookup.
    pub fn bytes(&self, key: &str) -> Result<&[u8]> {
        let value = self.require(key)?;
        value.as_bytes().ok_or_else(|| {
            Error::contextual(format!(
                "context key '{key}' is not bytes, found {}",
                value.kind()
            ))
        })
    }

    /// Text-typed lookup.
    pub fn text(&self, key: &str) -> Result<&str> {
        let value = self.require(key)?;
        value.as_str().ok_or_else(|| {
            Error::contextual(format!(
                "context key '{key}' is not text, found {}",
                value.kind()
            ))
        })
    }

    /// Mapping-typed lookup, for reaching into nested record values.
    pub fn map(&self, key: &str) -> Result<&Map> {
        let value = self.require(key)?;
        value.as_map().ok_or_else(|| {
            Error::contextual(format!(
                "context key '{key}' is not a mapping, found {}",
                value.kind()
            ))
        })
    }
}

impl From<Map> for Context {
    fn from(seed: Map) -> Self {
        Self { frames: vec![seed] }
    }
}
