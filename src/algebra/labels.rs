//! Label derivation.
//!
//! A chain's label tuple is a pure function of the operator chain and the
//! root labels; these are the derivation rules, shared by the composer and
//! usable on their own.

use std::collections::HashSet;

use crate::algebra::Expr;
use crate::error::{Error, Result};

/// Labels after `Define`: the existing labels, extended by definition keys not
/// already present, in definition order.
pub fn defined_labels(labels: &[String], defs: &[(String, Expr)]) -> Vec<String> {
    let mut out = labels.to_vec();
    for (name, _) in defs {
        if !labels.contains(name) {
            out.push(name.clone());
        }
    }
    out
}

/// Labels after `Rename`. Every rename source must exist and no two labels may
/// end up equal.
pub fn renamed_labels(labels: &[String], renamings: &[(String, String)]) -> Result<Vec<String>> {
    let mut pending: Vec<(String, String)> = renamings.to_vec();
    let mut out: Vec<String> = Vec::with_capacity(labels.len());
    for old in labels {
        let new = match pending.iter().position(|(o, _)| o == old) {
            Some(i) => pending.remove(i).1,
            None => old.clone(),
        };
        if out.contains(&new) {
            return Err(Error::invalid_argument(format!(
                "duplicated label `{new}` in rename"
            )));
        }
        out.push(new);
    }
    if !pending.is_empty() {
        let unknown = pending.iter().map(|(o, _)| o.as_str()).collect::<Vec<_>>();
        return Err(Error::invalid_argument(format!(
            "cannot rename unknown labels {unknown:?}"
        )));
    }
    Ok(out)
}

/// Labels after grouping with aggregations: group labels plus the aggregation
/// names, which must not collide with them.
pub fn grouped_labels(labels: &[String], aggregations: &[String]) -> Result<Vec<String>> {
    if aggregations.iter().any(|a| labels.contains(a)) {
        return Err(Error::invalid_argument(
            "labels and aggregations cannot overlap",
        ));
    }
    let mut aggs = aggregations.to_vec();
    aggs.sort();
    let mut out = labels.to_vec();
    out.extend(aggs);
    Ok(out)
}

/// Check that every name in `checkings` is one of `labels`.
pub fn check_labels(labels: &[String], checkings: &[String]) -> Result<()> {
    let illegal: Vec<_> = checkings
        .iter()
        .filter(|n| !labels.contains(n))
        .map(String::as_str)
        .collect();
    if !illegal.is_empty() {
        return Err(Error::invalid_argument(format!(
            "unknown labels {illegal:?}"
        )));
    }
    Ok(())
}

/// Validate a definition or set list: keys must be unique.
pub fn check_bindings(bindings: &[(String, Expr)]) -> Result<()> {
    let mut seen = HashSet::new();
    for (name, _) in bindings {
        if !seen.insert(name.as_str()) {
            return Err(Error::invalid_argument(format!("duplicated key `{name}`")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::dsl::param;

    fn names(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defined_labels() {
        let defs = vec![
            ("Z".to_string(), param("z")),
            ("B".to_string(), param("b")),
            ("X".to_string(), param("x")),
        ];
        assert_eq!(
            defined_labels(&names(&["A", "B", "C"]), &defs),
            names(&["A", "B", "C", "Z", "X"])
        );
    }

    #[test]
    fn test_renamed_labels() {
        let ren = vec![
            ("A".to_string(), "AA".to_string()),
            ("C".to_string(), "CC".to_string()),
        ];
        assert_eq!(
            renamed_labels(&names(&["A", "B", "C"]), &ren).unwrap(),
            names(&["AA", "B", "CC"])
        );
    }

    #[test]
    fn test_renamed_labels_duplicated() {
        let ren = vec![
            ("A".to_string(), "X".to_string()),
            ("C".to_string(), "X".to_string()),
        ];
        assert!(renamed_labels(&names(&["A", "B", "C"]), &ren).is_err());
    }

    #[test]
    fn test_renamed_labels_unknown_source() {
        let ren = vec![
            ("A".to_string(), "X".to_string()),
            ("bad".to_string(), "A".to_string()),
        ];
        assert!(renamed_labels(&names(&["A", "B", "C"]), &ren).is_err());
    }

    #[test]
    fn test_grouped_labels() {
        assert_eq!(
            grouped_labels(&names(&["A", "B"]), &names(&["T", "S"])).unwrap(),
            names(&["A", "B", "S", "T"])
        );
        assert!(grouped_labels(&names(&["A", "B"]), &names(&["B"])).is_err());
    }

    #[test]
    fn test_check_labels() {
        assert!(check_labels(&names(&["A", "B", "C"]), &names(&["A", "C"])).is_ok());
        assert!(check_labels(&names(&["A", "B", "C"]), &names(&["A", "X"])).is_err());
    }

    #[test]
    fn test_check_bindings() {
        let ok = vec![("B".to_string(), param("b")), ("A".to_string(), param("a"))];
        assert!(check_bindings(&ok).is_ok());
        let dup = vec![("B".to_string(), param("b")), ("B".to_string(), param("x"))];
        assert!(check_bindings(&dup).is_err());
    }
}
