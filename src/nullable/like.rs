//! LIKE pattern translation and the bounded compiled-pattern cache.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

// Backslash must come first.
const REGEX_SPECIALS: &str = "\\.^$*+?{}[]()<>|";

const CACHE_CAPACITY: usize = 50;

static CACHE: Lazy<Mutex<LikeCache>> =
    Lazy::new(|| Mutex::new(LikeCache::with_capacity(CACHE_CAPACITY)));

/// Translate a LIKE pattern to an anchored regex pattern. The escape string
/// neutralizes a directly following `%` or `_`.
pub(super) fn like_regex_pattern(pattern: &str, escape: Option<&str>) -> String {
    let escape = escape.filter(|e| !e.is_empty());
    let mut p = pattern.to_string();
    if let Some(esc) = escape {
        p = p.replace(&format!("{esc}%"), "\\%");
        p = p.replace(&format!("{esc}_"), "\\_");
    }
    for c in REGEX_SPECIALS.chars() {
        p = p.replace(c, &format!("\\{c}"));
    }
    p = p.replace('%', ".*");
    p = p.replace('_', ".");
    if escape.is_some() {
        p = p.replace("\\.*", "%");
        p = p.replace("\\.", "_");
    }
    format!("^(?:{p})$")
}

pub(super) fn matches(s: &str, pattern: &str, escape: Option<&str>) -> Result<bool> {
    let regex = {
        let mut cache = CACHE.lock().unwrap_or_else(|e| e.into_inner());
        cache.get_or_compile(pattern, escape)?
    };
    Ok(regex.is_match(s))
}

/// A bounded cache of compiled LIKE patterns keyed by `(pattern, escape)`.
/// When full, entries are evicted in insertion order.
pub struct LikeCache {
    capacity: usize,
    map: HashMap<(String, Option<String>), Regex>,
    order: VecDeque<(String, Option<String>)>,
}

impl LikeCache {
    pub fn with_capacity(capacity: usize) -> Self {
        LikeCache {
            capacity,
            map: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get_or_compile(&mut self, pattern: &str, escape: Option<&str>) -> Result<Regex> {
        let key = (pattern.to_string(), escape.map(str::to_string));
        if let Some(regex) = self.map.get(&key) {
            return Ok(regex.clone());
        }
        let translated = like_regex_pattern(pattern, escape);
        let regex = Regex::new(&translated)
            .map_err(|e| Error::invalid_argument(format!("bad LIKE pattern {pattern:?}: {e}")))?;
        self.insert(key, regex.clone());
        Ok(regex)
    }

    fn insert(&mut self, key: (String, Option<String>), regex: Regex) {
        if self.map.insert(key.clone(), regex).is_none() {
            self.order.push_back(key);
        }
        while self.map.len() > self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.map.remove(&oldest);
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translation() {
        assert_eq!(like_regex_pattern("t%", None), "^(?:t.*)$");
        assert_eq!(like_regex_pattern("te_t", None), "^(?:te.t)$");
        assert_eq!(like_regex_pattern("a.b", None), "^(?:a\\.b)$");
        // escape turns the wildcard into a literal (kept regex-escaped)
        assert_eq!(like_regex_pattern("__!%", Some("!")), "^(?:..\\%)$");
        assert_eq!(like_regex_pattern("a!_b", Some("!")), "^(?:a\\_b)$");
    }

    #[test]
    fn test_cache_bounds() {
        let mut cache = LikeCache::with_capacity(3);
        for i in 0..3 {
            cache.get_or_compile(&format!("p{i}%"), None).unwrap();
        }
        assert_eq!(cache.len(), 3);

        // a repeated key does not grow the cache
        cache.get_or_compile("p0%", None).unwrap();
        assert_eq!(cache.len(), 3);

        // insertion past capacity evicts in insertion order
        cache.get_or_compile("p3%", None).unwrap();
        assert_eq!(cache.len(), 3);
        assert!(!cache.map.contains_key(&("p0%".to_string(), None)));
        assert!(cache.map.contains_key(&("p3%".to_string(), None)));
    }

    #[test]
    fn test_cache_distinguishes_escape() {
        let mut cache = LikeCache::with_capacity(10);
        cache.get_or_compile("a!_b", None).unwrap();
        cache.get_or_compile("a!_b", Some("!")).unwrap();
        assert_eq!(cache.len(), 2);
    }
}
