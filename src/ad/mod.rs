// src/ad/mod.rs

pub mod backward;
pub mod graph;
pub mod types;

use crate::ad::graph::Tape;
pub use backward::backward;
use std::cell::RefCell;
use std::collections::HashMap;

thread_local! {
    static TAPE_STORAGE: RefCell<HashMap<usize, Tape>> = RefCell::new(HashMap::new());
    static NEXT_TAPE_ID: RefCell<usize> = const { RefCell::new(1) };
}

pub fn create_tape() -> usize {
    TAPE_STORAGE.with(|storage| {
        let mut map = storage.borrow_mut();
        let id = NEXT_TAPE_ID.with(|n| {
            let mut i = n.borrow_mut();
            let res = *i;
            *i += 1;
            res
        });
        map.insert(id, Tape::new());
        id
    })
}

pub fn remove_tape(tape_id: usize) {
    TAPE_STORAGE.with(|storage| {
        storage.borrow_mut().remove(&tape_id);
    });
}

pub fn with_tape<F, R>(tape_id: usize, f: F) -> R
where
    F: FnOnce(&Tape) -> R,
{
    TAPE_STORAGE.with(|storage| {
        let map = storage.borrow();
        let tape = map
            .get(&tape_id)
            .expect("Tape accessing error: Tape ID not found in current thread storage.");
        f(tape)
    })
}

/// Owns a tape for the duration of a scope and releases it on drop,
/// including when the scope is left through `?`.
#[derive(Debug)]
pub struct TapeScope {
    id: usize,
}

impl TapeScope {
    pub fn new() -> Self {
        Self { id: create_tape() }
    }

    pub fn id(&self) -> usize {
        self.id
    }
}

impl Default for TapeScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TapeScope {
    fn drop(&mut self) {
        remove_tape(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tape_exists(tape_id: usize) -> bool {
        TAPE_STORAGE.with(|storage| storage.borrow().contains_key(&tape_id))
    }

    #[test]
    fn test_tape_ids_are_unique() {
        let a = create_tape();
        let b = create_tape();
        assert_ne!(a, b);
        remove_tape(a);
        remove_tape(b);
    }

    #[test]
    fn test_scope_releases_tape() {
        let id = {
            let scope = TapeScope::new();
            assert!(tape_exists(scope.id()));
            scope.id()
        };
        assert!(!tape_exists(id));
    }
}
