//! Evaluation contexts
//!
//! A `Context` is a copy-on-write mapping from interned keys to typed values
//! that parametrizes one evaluation (current frame, tile origin, view...).
//! Cloning a context is cheap; `set` on a shared context copies the map
//! first, so a context that has been handed to another thread is never
//! mutated underneath it.
//!
//! `ContextScope` installs a context as the thread's current context for the
//! lifetime of the guard, restoring the previous one on drop (including
//! during unwinding).

use std::borrow::Borrow;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use once_cell::sync::{Lazy, OnceCell};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{PlugGraphError, Result};
use crate::hash::{Fingerprint, FingerprintHasher};

/// Well-known context variable names
pub mod keys {
    /// Current frame (float)
    pub const FRAME: &str = "frame";
    /// Origin of the image tile being computed (v2i)
    pub const TILE_ORIGIN: &str = "image:tileOrigin";
    /// Name of the view being computed (string)
    pub const VIEW_NAME: &str = "image:viewName";
    /// Name of the image channel being computed (string)
    pub const CHANNEL_NAME: &str = "image:channelName";
}

static INTERNER: Lazy<Mutex<HashSet<Arc<str>>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// A string stored once per process.
///
/// Ordering, equality and hashing are by content.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InternedString(Arc<str>);

impl InternedString {
    pub fn new(value: &str) -> Self {
        let mut interner = INTERNER.lock();
        if let Some(existing) = interner.get(value) {
            return Self(existing.clone());
        }
        let stored: Arc<str> = Arc::from(value);
        interner.insert(stored.clone());
        Self(stored)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for InternedString {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for InternedString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for InternedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for InternedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A typed context variable value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ContextValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
    V2i([i32; 2]),
    V2f([f32; 2]),
    FloatVector(Vec<f32>),
    IntVector(Vec<i64>),
    StringVector(Vec<String>),
}

impl ContextValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ContextValue::Int(_) => "int",
            ContextValue::Float(_) => "float",
            ContextValue::Bool(_) => "bool",
            ContextValue::String(_) => "string",
            ContextValue::V2i(_) => "v2i",
            ContextValue::V2f(_) => "v2f",
            ContextValue::FloatVector(_) => "float_vector",
            ContextValue::IntVector(_) => "int_vector",
            ContextValue::StringVector(_) => "string_vector",
        }
    }

    pub fn hash_into(&self, h: &mut FingerprintHasher) {
        h.append_str(self.type_name());
        match self {
            ContextValue::Int(v) => {
                h.append_i64(*v);
            }
            ContextValue::Float(v) => {
                h.append_f64(*v);
            }
            ContextValue::Bool(v) => {
                h.append_bool(*v);
            }
            ContextValue::String(v) => {
                h.append_str(v);
            }
            ContextValue::V2i(v) => {
                h.append_i32_slice(v);
            }
            ContextValue::V2f(v) => {
                h.append_f32_slice(v);
            }
            ContextValue::FloatVector(v) => {
                h.append_f32_slice(v);
            }
            ContextValue::IntVector(v) => {
                h.append_i64_slice(v);
            }
            ContextValue::StringVector(v) => {
                h.append_u64(v.len() as u64);
                for s in v {
                    h.append_str(s);
                }
            }
        }
    }
}

impl From<i64> for ContextValue {
    fn from(v: i64) -> Self {
        ContextValue::Int(v)
    }
}

impl From<i32> for ContextValue {
    fn from(v: i32) -> Self {
        ContextValue::Int(v as i64)
    }
}

impl From<f64> for ContextValue {
    fn from(v: f64) -> Self {
        ContextValue::Float(v)
    }
}

impl From<f32> for ContextValue {
    fn from(v: f32) -> Self {
        ContextValue::Float(v as f64)
    }
}

impl From<bool> for ContextValue {
    fn from(v: bool) -> Self {
        ContextValue::Bool(v)
    }
}

impl From<&str> for ContextValue {
    fn from(v: &str) -> Self {
        ContextValue::String(v.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(v: String) -> Self {
        ContextValue::String(v)
    }
}

impl From<[i32; 2]> for ContextValue {
    fn from(v: [i32; 2]) -> Self {
        ContextValue::V2i(v)
    }
}

impl From<[f32; 2]> for ContextValue {
    fn from(v: [f32; 2]) -> Self {
        ContextValue::V2f(v)
    }
}

/// Typed extraction of context variables
pub trait FromContextValue: Sized {
    fn expected() -> &'static str;
    fn from_context_value(value: &ContextValue) -> Option<Self>;
}

impl FromContextValue for i64 {
    fn expected() -> &'static str {
        "int"
    }

    fn from_context_value(value: &ContextValue) -> Option<Self> {
        match value {
            ContextValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

/// Ints are accepted where floats are expected.
impl FromContextValue for f64 {
    fn expected() -> &'static str {
        "float"
    }

    fn from_context_value(value: &ContextValue) -> Option<Self> {
        match value {
            ContextValue::Float(v) => Some(*v),
            ContextValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }
}

impl FromContextValue for bool {
    fn expected() -> &'static str {
        "bool"
    }

    fn from_context_value(value: &ContextValue) -> Option<Self> {
        match value {
            ContextValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromContextValue for String {
    fn expected() -> &'static str {
        "string"
    }

    fn from_context_value(value: &ContextValue) -> Option<Self> {
        match value {
            ContextValue::String(v) => Some(v.clone()),
            _ => None,
        }
    }
}

impl FromContextValue for [i32; 2] {
    fn expected() -> &'static str {
        "v2i"
    }

    fn from_context_value(value: &ContextValue) -> Option<Self> {
        match value {
            ContextValue::V2i(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromContextValue for [f32; 2] {
    fn expected() -> &'static str {
        "v2f"
    }

    fn from_context_value(value: &ContextValue) -> Option<Self> {
        match value {
            ContextValue::V2f(v) => Some(*v),
            _ => None,
        }
    }
}

#[derive(Clone, Default)]
struct ContextData {
    variables: BTreeMap<InternedString, ContextValue>,
    hash: OnceCell<Fingerprint>,
}

/// A set of named variables parametrizing an evaluation
#[derive(Clone, Default)]
pub struct Context {
    data: Arc<ContextData>,
}

impl Context {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable, copying the underlying map if it is shared
    pub fn set(&mut self, key: &str, value: impl Into<ContextValue>) {
        let data = Arc::make_mut(&mut self.data);
        data.variables.insert(InternedString::new(key), value.into());
        data.hash = OnceCell::new();
    }

    /// Remove a variable, returning its previous value
    pub fn remove(&mut self, key: &str) -> Option<ContextValue> {
        if !self.data.variables.contains_key(key) {
            return None;
        }
        let data = Arc::make_mut(&mut self.data);
        data.hash = OnceCell::new();
        data.variables.remove(key)
    }

    /// Derived context with `key` set
    pub fn with(&self, key: &str, value: impl Into<ContextValue>) -> Self {
        let mut derived = self.clone();
        derived.set(key, value);
        derived
    }

    /// Derived context with `key` removed
    pub fn without(&self, key: &str) -> Self {
        let mut derived = self.clone();
        derived.remove(key);
        derived
    }

    /// Look up a variable, failing with `KeyNotFound`
    pub fn get(&self, key: &str) -> Result<&ContextValue> {
        self.data
            .variables
            .get(key)
            .ok_or_else(|| PlugGraphError::KeyNotFound(key.to_string()))
    }

    pub fn get_opt(&self, key: &str) -> Option<&ContextValue> {
        self.data.variables.get(key)
    }

    /// Look up a variable of a specific type
    pub fn get_as<T: FromContextValue>(&self, key: &str) -> Result<T> {
        let value = self.get(key)?;
        T::from_context_value(value).ok_or_else(|| PlugGraphError::InvalidContextValue {
            key: key.to_string(),
            expected: T::expected().to_string(),
        })
    }

    /// Like `get_as`, but a missing variable yields `default`
    pub fn get_or<T: FromContextValue>(&self, key: &str, default: T) -> Result<T> {
        match self.get_opt(key) {
            None => Ok(default),
            Some(_) => self.get_as(key),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.variables.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.variables.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.data.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.variables.is_empty()
    }

    /// Current frame, 1.0 when unset or not numeric
    pub fn frame(&self) -> f64 {
        self.get_or(keys::FRAME, 1.0).unwrap_or(1.0)
    }

    pub fn set_frame(&mut self, frame: f64) {
        self.set(keys::FRAME, frame);
    }

    /// Fingerprint over all variables, independent of insertion order.
    ///
    /// Computed once per copy and reset by `set`/`remove`.
    pub fn hash(&self) -> Fingerprint {
        *self.data.hash.get_or_init(|| {
            let mut h = FingerprintHasher::with_domain("context");
            h.append_u64(self.data.variables.len() as u64);
            for (key, value) in &self.data.variables {
                h.append_str(key.as_str());
                value.hash_into(&mut h);
            }
            h.finish()
        })
    }

    /// Append a single variable to `h`.
    ///
    /// Nodes call this for exactly the variables they consult, so that
    /// unrelated variables stay out of their hashes. A missing variable
    /// appends a marker distinct from every value.
    pub fn hash_variable(&self, key: &str, h: &mut FingerprintHasher) {
        h.append_str(key);
        match self.get_opt(key) {
            Some(value) => value.hash_into(h),
            None => {
                h.append_bytes(b"<unset>");
            }
        }
    }

    /// The innermost context installed on this thread by a `ContextScope`,
    /// or an empty context.
    pub fn current() -> Context {
        CURRENT.with(|stack| stack.borrow().last().cloned().unwrap_or_default())
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data) || self.data.variables == other.data.variables
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.data.variables.iter()).finish()
    }
}

thread_local! {
    static CURRENT: RefCell<Vec<Context>> = const { RefCell::new(Vec::new()) };
}

/// Installs a context as the thread's current context until dropped.
///
/// Scopes nest; dropping a scope restores whatever was current when it was
/// created. The guard is tied to its thread.
pub struct ContextScope {
    depth: usize,
    context: Context,
    _not_send: PhantomData<*const ()>,
}

impl ContextScope {
    pub fn new(context: Context) -> Self {
        let depth = CURRENT.with(|stack| {
            let mut stack = stack.borrow_mut();
            let depth = stack.len();
            stack.push(context.clone());
            depth
        });
        Self {
            depth,
            context,
            _not_send: PhantomData,
        }
    }

    /// Scope over the current context with some variables overridden
    pub fn with_overrides<'a, I, V>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, V)>,
        V: Into<ContextValue>,
    {
        let mut context = Context::current();
        for (key, value) in overrides {
            context.set(key, value);
        }
        Self::new(context)
    }

    pub fn context(&self) -> &Context {
        &self.context
    }
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        CURRENT.with(|stack| stack.borrow_mut().truncate(self.depth));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_missing_key() {
        let ctx = Context::new();
        assert_eq!(
            ctx.get("frame"),
            Err(PlugGraphError::KeyNotFound("frame".to_string()))
        );
        assert_eq!(ctx.frame(), 1.0);
    }

    #[test]
    fn test_hash_ignores_insertion_order() {
        let mut a = Context::new();
        a.set("frame", 10.0);
        a.set("view", "left");

        let mut b = Context::new();
        b.set("view", "left");
        b.set("frame", 10.0);

        assert_eq!(a, b);
        assert_eq!(a.hash(), b.hash());
        assert_ne!(a.hash(), a.with("frame", 11.0).hash());
    }

    #[test]
    fn test_copy_on_write() {
        let mut a = Context::new();
        a.set("frame", 1.0);
        let shared = a.clone();
        let before = shared.hash();

        a.set("frame", 2.0);
        assert_eq!(shared.get_as::<f64>("frame").unwrap(), 1.0);
        assert_eq!(shared.hash(), before);
        assert_eq!(a.get_as::<f64>("frame").unwrap(), 2.0);
    }

    #[test]
    fn test_typed_lookup() {
        let ctx = Context::new().with("frame", 3_i64).with("view", "left");
        assert_eq!(ctx.get_as::<f64>("frame").unwrap(), 3.0);
        assert_eq!(ctx.get_as::<String>("view").unwrap(), "left");
        assert!(matches!(
            ctx.get_as::<bool>("view"),
            Err(PlugGraphError::InvalidContextValue { .. })
        ));
        assert_eq!(ctx.get_or("missing", 7_i64).unwrap(), 7);
    }

    #[test]
    fn test_hash_variable_marks_missing() {
        let ctx = Context::new().with("a", 0_i64);
        let mut present = FingerprintHasher::new();
        ctx.hash_variable("a", &mut present);
        let mut missing = FingerprintHasher::new();
        Context::new().hash_variable("a", &mut missing);
        assert_ne!(present.finish(), missing.finish());
    }

    #[test]
    fn test_without() {
        let ctx = Context::new().with("a", 1_i64).with("b", 2_i64);
        let trimmed = ctx.without("a");
        assert!(!trimmed.contains("a"));
        assert!(ctx.contains("a"));
        assert_eq!(trimmed.len(), 1);
    }

    #[test]
    fn test_scope_restores_previous_context() {
        assert!(Context::current().is_empty());
        {
            let _outer = ContextScope::new(Context::new().with("frame", 1.0));
            assert_eq!(Context::current().frame(), 1.0);
            {
                let _inner = ContextScope::with_overrides([("frame", 5.0)]);
                assert_eq!(Context::current().frame(), 5.0);
            }
            assert_eq!(Context::current().frame(), 1.0);
        }
        assert!(Context::current().is_empty());
    }

    #[test]
    fn test_scope_restored_on_unwind() {
        let result = std::panic::catch_unwind(|| {
            let _scope = ContextScope::new(Context::new().with("frame", 9.0));
            panic!("boom");
        });
        assert!(result.is_err());
        assert!(Context::current().is_empty());
    }

    #[test]
    fn test_interned_strings_share_storage() {
        let a = InternedString::new("image:tileOrigin");
        let b = InternedString::new("image:tileOrigin");
        assert!(Arc::ptr_eq(&a.0, &b.0));
        assert_eq!(a.as_str(), keys::TILE_ORIGIN);
    }
}
