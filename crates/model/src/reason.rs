//! Lazily evaluated change reasons.

use std::fmt;
use std::sync::{Arc, OnceLock};

struct ReasonInner {
    supplier: Box<dyn Fn() -> String + Send + Sync>,
    text: OnceLock<String>,
}

/// A diagnostic reason attached to a change.
///
/// The supplier runs at most once, the first time the text is read. Clones
/// share the supplier and the memoized text.
#[derive(Clone)]
pub struct Reason {
    inner: Arc<ReasonInner>,
}

impl Reason {
    pub fn new(supplier: impl Fn() -> String + Send + Sync + 'static) -> Self {
        Reason {
            inner: Arc::new(ReasonInner {
                supplier: Box::new(supplier),
                text: OnceLock::new(),
            }),
        }
    }

    /// Evaluate (once) and return the reason text.
    pub fn get(&self) -> &str {
        self.inner.text.get_or_init(|| (self.inner.supplier)())
    }

    pub fn is_evaluated(&self) -> bool {
        self.inner.text.get().is_some()
    }
}

impl From<&'static str> for Reason {
    fn from(s: &'static str) -> Self {
        Reason::new(move || s.to_string())
    }
}

impl fmt::Debug for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.text.get() {
            Some(text) => f.debug_tuple("Reason").field(text).finish(),
            None => f.write_str("Reason(<deferred>)"),
        }
    }
}
