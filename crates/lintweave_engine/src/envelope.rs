//! Capability-stripping envelope for worker boundaries.
//!
//! Payloads leave a worker as plain `serde_json::Value`s. Engine payloads may
//! embed live callables anywhere in their tree, so before sending, the
//! envelope walks the payload (up to a depth bound), swaps every callable for
//! `Payload::Removed` and remembers where it was. After the wire copy has been
//! handed off, the callables are put back so the engine's own object is left
//! exactly as it was.

use std::mem;

use serde_json::{Map, Value};
use tracing::{trace, warn};

use crate::payload::{Callable, Payload};

/// Default traversal depth when stripping callables.
pub const DEFAULT_MAX_DEPTH: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

#[derive(Debug)]
struct StrippedEntry {
    /// Path from the root to the container that held the callable.
    container: Vec<Segment>,
    key: Segment,
    callable: Callable,
}

/// Callables removed from a payload, restorable onto the same payload.
#[derive(Debug, Default)]
#[must_use = "stripped callables are lost unless restored"]
pub struct Stripped {
    entries: Vec<StrippedEntry>,
}

impl Stripped {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Puts every stripped callable back where it was taken from.
    pub fn restore(self, payload: &mut Payload) {
        for entry in self.entries {
            let Some(container) = navigate(payload, &entry.container) else {
                warn!("Cannot restore callable: container path no longer exists");
                continue;
            };

            let slot = match (container, &entry.key) {
                (Payload::Object(map), Segment::Key(key)) => map.get_mut(key),
                (Payload::Array(items), Segment::Index(index)) => items.get_mut(*index),
                _ => None,
            };

            match slot {
                Some(slot) => *slot = Payload::Callable(entry.callable),
                None => warn!("Cannot restore callable: slot no longer exists"),
            }
        }
    }
}

/// Strips callables before a payload crosses a worker boundary.
#[derive(Debug, Clone, Copy)]
pub struct Envelope {
    max_depth: usize,
}

impl Envelope {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Replaces every callable within the depth bound by `Payload::Removed`.
    pub fn strip(&self, payload: &mut Payload) -> Stripped {
        let mut stripped = Stripped::default();
        let mut path = Vec::new();
        strip_into(payload, &mut path, self.max_depth, &mut stripped.entries);
        stripped
    }

    /// Strips `payload`, hands the wire copy to `send`, then restores.
    ///
    /// `send` only ever sees the plain `Value`; the payload is never
    /// inspected again once it has been handed off.
    pub fn transmit<T>(&self, payload: &mut Payload, send: impl FnOnce(Value) -> T) -> T {
        let stripped = self.strip(payload);
        trace!(stripped = stripped.len(), "Sealed payload for transmission");

        let wire = to_wire(payload);
        let result = send(wire);

        stripped.restore(payload);
        result
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

fn strip_into(
    node: &mut Payload,
    path: &mut Vec<Segment>,
    depth_left: usize,
    entries: &mut Vec<StrippedEntry>,
) {
    match node {
        Payload::Object(map) => {
            for (key, child) in map.iter_mut() {
                visit_child(child, Segment::Key(key.clone()), path, depth_left, entries);
            }
        }
        Payload::Array(items) => {
            for (index, child) in items.iter_mut().enumerate() {
                visit_child(child, Segment::Index(index), path, depth_left, entries);
            }
        }
        _ => {}
    }
}

fn visit_child(
    child: &mut Payload,
    key: Segment,
    path: &mut Vec<Segment>,
    depth_left: usize,
    entries: &mut Vec<StrippedEntry>,
) {
    match child {
        Payload::Callable(_) => {
            if let Payload::Callable(callable) = mem::replace(child, Payload::Removed) {
                entries.push(StrippedEntry {
                    container: path.clone(),
                    key,
                    callable,
                });
            }
        }
        Payload::Object(_) | Payload::Array(_) if depth_left > 0 => {
            path.push(key);
            strip_into(child, path, depth_left - 1, entries);
            path.pop();
        }
        _ => {}
    }
}

fn navigate<'a>(root: &'a mut Payload, path: &[Segment]) -> Option<&'a mut Payload> {
    let mut current = root;
    for segment in path {
        current = match (current, segment) {
            (Payload::Object(map), Segment::Key(key)) => map.get_mut(key)?,
            (Payload::Array(items), Segment::Index(index)) => items.get_mut(*index)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Converts a payload to its wire form.
///
/// Removed markers disappear from objects and become `null` in arrays.
/// Callables still present (beyond the strip depth) are dropped the same way;
/// losing the field beats failing the whole transfer.
pub fn to_wire(payload: &Payload) -> Value {
    let mut dropped = 0usize;
    let value = wire_value(payload, &mut dropped).unwrap_or(Value::Null);
    if dropped > 0 {
        warn!(
            dropped,
            "Dropped callables beyond the strip depth while crossing a worker boundary"
        );
    }
    value
}

fn wire_value(payload: &Payload, dropped: &mut usize) -> Option<Value> {
    match payload {
        Payload::Null => Some(Value::Null),
        Payload::Bool(b) => Some(Value::Bool(*b)),
        Payload::Number(n) => Some(Value::Number(n.clone())),
        Payload::String(s) => Some(Value::String(s.clone())),
        Payload::Array(items) => Some(Value::Array(
            items
                .iter()
                .map(|item| wire_value(item, dropped).unwrap_or(Value::Null))
                .collect(),
        )),
        Payload::Object(map) => {
            let mut out = Map::new();
            for (key, child) in map {
                if let Some(value) = wire_value(child, dropped) {
                    out.insert(key.clone(), value);
                }
            }
            Some(Value::Object(out))
        }
        Payload::Callable(_) => {
            *dropped += 1;
            None
        }
        Payload::Removed => None,
    }
}
