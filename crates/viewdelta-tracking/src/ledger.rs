//! Net additions and removals along one axis of a recording container.

use crate::matcher::ElementMatcher;
use crate::value::Value;

/// Net record of one axis (collection elements, map keys, or map values).
///
/// An addition cancels a matching pending removal and a removal cancels a
/// matching pending addition. When the two sides are distinct references
/// (a view swapped for another with the same id, say) the pair is kept as
/// a replacement so the removed original can still be compared.
#[derive(Default)]
pub(crate) struct Ledger {
    pub(crate) added: Vec<Value>,
    pub(crate) removed: Vec<Value>,
    /// `(removed original, matching replacement)` pairs.
    pub(crate) replaced: Vec<(Value, Value)>,
}

impl Ledger {
    pub(crate) fn add(&mut self, matcher: &ElementMatcher, value: Value) {
        match find(&self.removed, matcher, &value) {
            Some(i) => {
                let original = self.removed.remove(i);
                if !original.same(&value) {
                    self.replaced.push((original, value));
                }
            }
            None => self.added.push(value),
        }
    }

    pub(crate) fn remove(&mut self, matcher: &ElementMatcher, value: Value) {
        if let Some(i) = self.replaced.iter().position(|(_, r)| r.same(&value)) {
            let (original, _) = self.replaced.remove(i);
            self.removed.push(original);
            return;
        }
        match find(&self.added, matcher, &value) {
            Some(i) => {
                let added = self.added.remove(i);
                if !added.same(&value) {
                    self.replaced.push((value, added));
                }
            }
            None => self.removed.push(value),
        }
    }

    /// A structural addition or removal is pending. Replacements are not
    /// actions; whether they changed anything depends on their contents.
    pub(crate) fn has_actions(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// Position of `value` in `log`, preferring the same reference over a
/// merely matching one.
fn find(log: &[Value], matcher: &ElementMatcher, value: &Value) -> Option<usize> {
    log.iter()
        .position(|x| x.same(value))
        .or_else(|| log.iter().position(|x| matcher.matches(x, value)))
}
