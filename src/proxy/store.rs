use rand::RngExt;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::consts::TOKEN_PREFIX;
use crate::interactor::StoredToken;
use crate::transport::Binding;
use crate::value::Value;

struct Stored {
    value: Value,
    permanent: bool,
}

/// Values held outside the engine workspace, reachable only through the
/// token handed out when they were stored.
#[derive(Default)]
pub struct ObjectStore {
    entries: Mutex<HashMap<String, Stored>>,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `value` and return a fresh token for it.
    pub fn store(&self, value: Value, permanent: bool) -> StoredToken {
        let token = new_token();
        self.entries
            .lock()
            .unwrap()
            .insert(token.clone(), Stored { value, permanent });
        StoredToken::new(token)
    }

    /// Collect bindings for every token `command` names as a whole
    /// identifier outside string literals. One-shot entries are removed.
    pub fn take_bindings(&self, command: &str) -> Vec<Binding> {
        let names = identifiers(command);
        if names.is_empty() {
            return Vec::new();
        }
        let mut entries = self.entries.lock().unwrap();
        let mut bindings = Vec::new();
        for name in names {
            let permanent = match entries.get(name) {
                Some(stored) => stored.permanent,
                None => continue,
            };
            let value = if permanent {
                entries[name].value.clone()
            } else {
                match entries.remove(name) {
                    Some(stored) => stored.value,
                    None => continue,
                }
            };
            bindings.push(Binding {
                name: name.to_string(),
                value,
            });
        }
        bindings
    }

    /// Return bindings whose request never reached the engine. Permanent
    /// entries were never removed, so only missing names are re-inserted,
    /// as one-shot entries.
    pub fn put_back(&self, bindings: Vec<Binding>) {
        let mut entries = self.entries.lock().unwrap();
        for Binding { name, value } in bindings {
            entries.entry(name).or_insert(Stored {
                value,
                permanent: false,
            });
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop everything; used when the session ends.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

fn new_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!("{TOKEN_PREFIX}{hex}")
}

/// Distinct identifiers in `command`, skipping quoted text. A `'` right
/// after a name, a closing bracket or another quote is a transpose, not
/// the start of a string.
fn identifiers(command: &str) -> Vec<&str> {
    let bytes = command.as_bytes();
    let mut seen = HashSet::new();
    let mut found = Vec::new();
    let mut i = 0;
    let mut prev: u8 = b' ';

    while i < bytes.len() {
        let c = bytes[i];
        let starts_string = c == b'"'
            || (c == b'\''
                && !(prev.is_ascii_alphanumeric()
                    || matches!(prev, b'_' | b')' | b']' | b'}' | b'\'' | b'.')));
        if starts_string {
            i += 1;
            while i < bytes.len() && bytes[i] != c {
                i += 1;
            }
            prev = c;
            i += 1;
            continue;
        }
        if c.is_ascii_alphanumeric() || c == b'_' {
            let start = i;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            let word = &command[start..i];
            if word.as_bytes()[0].is_ascii_alphabetic() && seen.insert(word) {
                found.push(word);
            }
            prev = bytes[i - 1];
            continue;
        }
        prev = c;
        i += 1;
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_identifiers_with_prefix() {
        let store = ObjectStore::new();
        let token = store.store(Value::Double(1.0), false);
        assert!(token.as_str().starts_with(TOKEN_PREFIX));
        assert!(crate::value::is_identifier(token.as_str()));
    }

    #[test]
    fn tokens_are_unique() {
        let store = ObjectStore::new();
        let a = store.store(Value::Empty, true);
        let b = store.store(Value::Empty, true);
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn one_shot_entries_are_consumed() {
        let store = ObjectStore::new();
        let token = store.store(Value::Double(42.0), false);
        let command = format!("total = plus(1, {token})");

        let first = store.take_bindings(&command);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].value, Value::Double(42.0));
        assert!(store.take_bindings(&command).is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn permanent_entries_stay() {
        let store = ObjectStore::new();
        let token = store.store(Value::from("kept"), true);
        for _ in 0..3 {
            let bindings = store.take_bindings(token.as_str());
            assert_eq!(bindings.len(), 1);
            assert_eq!(bindings[0].name, token.as_str());
        }
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn partial_matches_do_not_resolve() {
        let store = ObjectStore::new();
        let token = store.store(Value::Double(1.0), false);
        let truncated = &token.as_str()[..token.as_str().len() - 1];
        assert!(store.take_bindings(&format!("x = {truncated}")).is_empty());
        assert!(store.take_bindings(&format!("x = {token}2")).is_empty());
        assert!(store.take_bindings(&format!("x = a{token}")).is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn quoted_tokens_are_text() {
        let store = ObjectStore::new();
        let token = store.store(Value::Double(1.0), false);
        assert!(store.take_bindings(&format!("disp('{token}')")).is_empty());
        assert!(store.take_bindings(&format!("disp(\"{token}\")")).is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn repeated_reference_binds_once() {
        let store = ObjectStore::new();
        let token = store.store(Value::Double(3.0), false);
        let bindings = store.take_bindings(&format!("plus({token}, {token})"));
        assert_eq!(bindings.len(), 1);
    }

    #[test]
    fn identifier_scan() {
        assert_eq!(identifiers("y = plus(x, 2)"), vec!["y", "plus", "x"]);
        assert_eq!(identifiers("a' + 'text b'"), vec!["a"]);
        assert_eq!(identifiers("x = 3e5"), vec!["x"]);
        assert!(identifiers("'unterminated").is_empty());
    }

    #[test]
    fn put_back_restores_one_shot_entries() {
        let store = ObjectStore::new();
        let once = store.store(Value::Double(1.0), false);
        let kept = store.store(Value::Double(2.0), true);
        let command = format!("plus({once}, {kept})");

        let bindings = store.take_bindings(&command);
        assert_eq!(store.len(), 1);
        store.put_back(bindings);
        assert_eq!(store.len(), 2);

        // Still one-shot after being put back.
        assert_eq!(store.take_bindings(&command).len(), 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn clear_forgets_everything() {
        let store = ObjectStore::new();
        store.store(Value::Empty, true);
        store.clear();
        assert!(store.is_empty());
    }
}
