//! In-process [`KvBackend`] for tests, tools and single-node servers.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use crate::backend::{BackendError, KvBackend};

/// Sorted-set score with a total order.
#[derive(Debug, Clone, Copy)]
struct Score(f64);

impl PartialEq for Score {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Default)]
struct SortedSet {
    scores: HashMap<String, f64>,
    ordered: BTreeSet<(Score, String)>,
}

impl SortedSet {
    fn insert(&mut self, score: f64, member: &str) {
        if let Some(old) = self.scores.insert(member.to_string(), score) {
            self.ordered.remove(&(Score(old), member.to_string()));
        }
        self.ordered.insert((Score(score), member.to_string()));
    }

    fn remove(&mut self, member: &str) -> bool {
        match self.scores.remove(member) {
            Some(old) => {
                self.ordered.remove(&(Score(old), member.to_string()));
                true
            }
            None => false,
        }
    }

    fn range(&self, min: f64, max: f64) -> Vec<String> {
        if min > max {
            return Vec::new();
        }
        self.ordered
            .range((Score(min), String::new())..)
            .take_while(|(score, _)| score.0 <= max)
            .map(|(_, member)| member.clone())
            .collect()
    }
}

/// Strings and sorted sets held in memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    strings: HashMap<String, Vec<u8>>,
    sorted_sets: HashMap<String, SortedSet>,
}

impl MemoryBackend {
    /// An empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of plain values.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Score of `member` in `set`, if present.
    pub fn score(&self, set: &str, member: &str) -> Option<f64> {
        self.sorted_sets.get(set)?.scores.get(member).copied()
    }
}

impl KvBackend for MemoryBackend {
    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), BackendError> {
        if self.sorted_sets.contains_key(key) {
            return Err(BackendError::WrongType(key.to_string()));
        }
        self.strings.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        if self.sorted_sets.contains_key(key) {
            return Err(BackendError::WrongType(key.to_string()));
        }
        Ok(self.strings.get(key).cloned())
    }

    fn del(&mut self, key: &str) -> Result<bool, BackendError> {
        let removed = self.strings.remove(key).is_some();
        Ok(removed || self.sorted_sets.remove(key).is_some())
    }

    fn keys(&mut self, pattern: &str) -> Result<Vec<String>, BackendError> {
        let pattern: Vec<char> = pattern.chars().collect();
        let mut keys: Vec<String> = self
            .strings
            .keys()
            .chain(self.sorted_sets.keys())
            .filter(|key| glob_match(&pattern, &key.chars().collect::<Vec<_>>()))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn zadd(&mut self, set: &str, score: f64, member: &str) -> Result<(), BackendError> {
        if score.is_nan() {
            return Err(BackendError::InvalidScore(score));
        }
        if self.strings.contains_key(set) {
            return Err(BackendError::WrongType(set.to_string()));
        }
        self.sorted_sets
            .entry(set.to_string())
            .or_default()
            .insert(score, member);
        Ok(())
    }

    fn zrem(&mut self, set: &str, member: &str) -> Result<bool, BackendError> {
        if self.strings.contains_key(set) {
            return Err(BackendError::WrongType(set.to_string()));
        }
        let Some(sorted) = self.sorted_sets.get_mut(set) else {
            return Ok(false);
        };
        let removed = sorted.remove(member);
        if sorted.scores.is_empty() {
            self.sorted_sets.remove(set);
        }
        Ok(removed)
    }

    fn zrange_by_score(
        &mut self,
        set: &str,
        min: f64,
        max: f64,
    ) -> Result<Vec<String>, BackendError> {
        if self.strings.contains_key(set) {
            return Err(BackendError::WrongType(set.to_string()));
        }
        Ok(self
            .sorted_sets
            .get(set)
            .map(|sorted| sorted.range(min, max))
            .unwrap_or_default())
    }
}

/// Glob match: `*` any run, `?` one char, `[abc]`/`[a-z]`/`[^a]` classes,
/// `\` escapes the next char.
fn glob_match(pattern: &[char], text: &[char]) -> bool {
    match pattern.first() {
        None => text.is_empty(),
        Some('*') => {
            let rest = &pattern[1..];
            (0..=text.len()).any(|skip| glob_match(rest, &text[skip..]))
        }
        Some('?') => !text.is_empty() && glob_match(&pattern[1..], &text[1..]),
        Some('[') => {
            let Some((&c, tail)) = text.split_first() else {
                return false;
            };
            match match_class(&pattern[1..], c) {
                Some((true, after)) => glob_match(after, tail),
                Some((false, _)) => false,
                // unterminated class: treat `[` literally
                None => c == '[' && glob_match(&pattern[1..], tail),
            }
        }
        Some('\\') if pattern.len() > 1 => {
            text.first() == Some(&pattern[1]) && glob_match(&pattern[2..], &text[1..])
        }
        Some(&p) => text.first() == Some(&p) && glob_match(&pattern[1..], &text[1..]),
    }
}

/// Match `c` against a class body starting after `[`. Returns whether it
/// matched and the pattern after the closing `]`.
fn match_class(body: &[char], c: char) -> Option<(bool, &[char])> {
    let (negated, mut ix) = match body.first() {
        Some('^') | Some('!') => (true, 1),
        _ => (false, 0),
    };
    let mut matched = false;
    let mut first = true;
    while ix < body.len() {
        let mut lo = body[ix];
        if lo == ']' && !first {
            return Some((matched != negated, &body[ix + 1..]));
        }
        first = false;
        if lo == '\\' && ix + 1 < body.len() {
            ix += 1;
            lo = body[ix];
        }
        if ix + 2 < body.len() && body[ix + 1] == '-' && body[ix + 2] != ']' {
            let hi = body[ix + 2];
            if (lo..=hi).contains(&c) {
                matched = true;
            }
            ix += 3;
        } else {
            if lo == c {
                matched = true;
            }
            ix += 1;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, text: &str) -> bool {
        let p: Vec<char> = pattern.chars().collect();
        let t: Vec<char> = text.chars().collect();
        glob_match(&p, &t)
    }

    #[test]
    fn glob_wildcards() {
        assert!(matches("planet.*", "planet.1_2"));
        assert!(matches("planet.*", "planet."));
        assert!(!matches("planet.*", "player.alice"));
        assert!(matches("*", ""));
        assert!(matches("p?ayer.*", "player.bob"));
        assert!(matches("*_2", "planet.1_2"));
        assert!(!matches("sun.?", "sun.12"));
    }

    #[test]
    fn glob_classes_and_escapes() {
        assert!(matches("p[lx]anet.*", "planet.0_0"));
        assert!(!matches("p[^l]anet.*", "planet.0_0"));
        assert!(matches("sun.[0-9]*", "sun.42_1"));
        assert!(!matches("sun.[0-9]*", "sun.-42_1"));
        assert!(matches(r"a\*b", "a*b"));
        assert!(!matches(r"a\*b", "axb"));
        assert!(matches("a[b", "a[b"));
    }

    #[test]
    fn set_get_del() {
        let mut backend = MemoryBackend::new();
        backend.set("a", b"1").unwrap();
        assert_eq!(backend.get("a").unwrap(), Some(b"1".to_vec()));
        assert!(backend.del("a").unwrap());
        assert!(!backend.del("a").unwrap());
        assert_eq!(backend.get("a").unwrap(), None);
    }

    #[test]
    fn zadd_replaces_score() {
        let mut backend = MemoryBackend::new();
        backend.zadd("ix", 5.0, "m").unwrap();
        backend.zadd("ix", -5.0, "m").unwrap();
        assert_eq!(backend.zrange_by_score("ix", 0.0, 10.0).unwrap(), Vec::<String>::new());
        assert_eq!(backend.zrange_by_score("ix", -5.0, -5.0).unwrap(), vec!["m"]);
        assert_eq!(backend.score("ix", "m"), Some(-5.0));
    }

    #[test]
    fn range_is_inclusive_and_ordered() {
        let mut backend = MemoryBackend::new();
        for (score, member) in [(3.0, "c"), (1.0, "a"), (2.0, "b"), (2.0, "bb"), (4.0, "d")] {
            backend.zadd("ix", score, member).unwrap();
        }
        assert_eq!(
            backend.zrange_by_score("ix", 1.0, 3.0).unwrap(),
            vec!["a", "b", "bb", "c"]
        );
        assert!(backend.zrange_by_score("ix", 3.0, 1.0).unwrap().is_empty());
        assert!(backend.zrange_by_score("missing", 0.0, 1.0).unwrap().is_empty());
    }

    #[test]
    fn zrem_drops_empty_set() {
        let mut backend = MemoryBackend::new();
        backend.zadd("ix", 1.0, "a").unwrap();
        assert!(backend.zrem("ix", "a").unwrap());
        assert!(!backend.zrem("ix", "a").unwrap());
        assert!(backend.keys("*").unwrap().is_empty());
    }

    #[test]
    fn type_confusion_is_an_error() {
        let mut backend = MemoryBackend::new();
        backend.set("k", b"v").unwrap();
        assert!(matches!(backend.zadd("k", 1.0, "m"), Err(BackendError::WrongType(_))));
        backend.zadd("ix", 1.0, "m").unwrap();
        assert!(matches!(backend.get("ix"), Err(BackendError::WrongType(_))));
        assert!(matches!(
            backend.zadd("ix", f64::NAN, "m"),
            Err(BackendError::InvalidScore(_))
        ));
    }

    #[test]
    fn keys_include_sorted_sets() {
        let mut backend = MemoryBackend::new();
        backend.set("planet.1_1", b"{}").unwrap();
        backend.zadd("index:planet:x", 1.0, "planet.1_1").unwrap();
        assert_eq!(backend.keys("planet.*").unwrap(), vec!["planet.1_1"]);
        assert_eq!(
            backend.keys("*").unwrap(),
            vec!["index:planet:x", "planet.1_1"]
        );
    }
}
