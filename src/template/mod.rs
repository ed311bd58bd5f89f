//! Tagged-region text editing.
//!
//! A template is an immutable text plus named, non-crossing byte regions.
//! Setting a tag replaces every region of that tag and shifts the others;
//! regions nested inside a replaced one are deleted, regions containing it
//! stretch. All offsets are byte offsets into UTF-8 text, matching the tag
//! map the pretty renderer reports.

use std::collections::BTreeMap;

use crate::error::{Error, Result};

pub type Regions = Vec<(usize, usize)>;

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    text: String,
    tags: BTreeMap<String, Regions>,
}

fn validate_boundary(text: &str, start: usize, stop: usize) -> Result<()> {
    if stop > text.len() {
        return Err(Error::boundary(format!(
            "stop {} exceeds text length {}",
            stop,
            text.len()
        )));
    }
    if start > stop {
        return Err(Error::boundary(format!(
            "start {start} is greater than stop {stop}"
        )));
    }
    if !text.is_char_boundary(start) || !text.is_char_boundary(stop) {
        return Err(Error::boundary(format!(
            "region ({start}, {stop}) splits a character"
        )));
    }
    Ok(())
}

fn validate_regions(text: &str, tag: &str, regions: &Regions) -> Result<()> {
    let mut first: Option<&str> = None;
    for &(start, stop) in regions {
        validate_boundary(text, start, stop)?;
        let slice = &text[start..stop];
        match first {
            None => first = Some(slice),
            Some(expected) if expected != slice => {
                return Err(Error::inconsistent(format!(
                    "tag `{tag}` regions carry different text: {expected:?} vs {slice:?}"
                )))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Two regions cross iff they overlap but neither contains the other.
fn crossing(start1: usize, stop1: usize, start2: usize, stop2: usize) -> bool {
    (start1 < start2 && start2 < stop1 && stop1 < stop2)
        || (start2 < start1 && start1 < stop2 && stop2 < stop1)
}

fn validate_tags(text: &str, tags: &BTreeMap<String, Regions>) -> Result<()> {
    for (tag, regions) in tags {
        validate_regions(text, tag, regions)?;
    }
    let all: Vec<(&str, usize, usize)> = tags
        .iter()
        .flat_map(|(tag, regions)| regions.iter().map(move |&(s, e)| (tag.as_str(), s, e)))
        .collect();
    for (tag, start, stop) in &all {
        for (other, ostart, ostop) in &all {
            if crossing(*start, *stop, *ostart, *ostop) {
                return Err(Error::invalid_argument(format!(
                    "regions of `{tag}` ({start}, {stop}) and `{other}` ({ostart}, {ostop}) cross"
                )));
            }
        }
    }
    Ok(())
}

/// Replace `text[start..stop]` with `content`, shifting or dropping every
/// region accordingly.
fn compute_adjustment(
    text: &str,
    tags: &BTreeMap<String, Regions>,
    start: usize,
    stop: usize,
    content: &str,
) -> Result<(String, BTreeMap<String, Regions>)> {
    validate_boundary(text, start, stop)?;
    let new_stop = start + content.len();
    let delta = new_stop as i64 - stop as i64;
    let new_text = format!("{}{}{}", &text[..start], content, &text[stop..]);
    let mut new_tags = BTreeMap::new();
    for (tag, regions) in tags {
        let mut kept = Regions::new();
        for &(rstart, rstop) in regions {
            if (rstart, rstop) == (start, stop) {
                // the region being replaced
                kept.push((start, new_stop));
            } else if rstop <= start {
                // entirely to the left
                kept.push((rstart, rstop));
            } else if stop <= rstart {
                // entirely to the right
                kept.push((
                    (rstart as i64 + delta) as usize,
                    (rstop as i64 + delta) as usize,
                ));
            } else if rstart <= start && stop <= rstop {
                // contains the replacement
                kept.push((rstart, (rstop as i64 + delta) as usize));
            } else if start <= rstart && rstop <= stop {
                // swallowed by the replacement
            } else {
                return Err(Error::new_assert(format!(
                    "region ({rstart}, {rstop}) crosses replacement ({start}, {stop})"
                )));
            }
        }
        if !kept.is_empty() {
            new_tags.insert(tag.clone(), kept);
        }
    }
    Ok((new_text, new_tags))
}

/// Right-to-left application order, so earlier replacements do not shift
/// later ones.
fn region_order(a: &(usize, usize), b: &(usize, usize)) -> std::cmp::Ordering {
    b.0.cmp(&a.0).then(a.1.cmp(&b.1))
}

impl Template {
    pub fn new(text: impl Into<String>, tags: BTreeMap<String, Regions>) -> Result<Self> {
        let text = text.into();
        validate_tags(&text, &tags)?;
        Ok(Template { text, tags })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tags(&self) -> &BTreeMap<String, Regions> {
        &self.tags
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tags.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    fn regions(&self, tag: &str) -> Result<&Regions> {
        self.tags
            .get(tag)
            .ok_or_else(|| Error::not_found(tag, "tag"))
    }

    /// The text of the tag's first region.
    pub fn get(&self, tag: &str) -> Result<&str> {
        let &(start, stop) = self
            .regions(tag)?
            .first()
            .ok_or_else(|| Error::not_found(tag, "tag"))?;
        Ok(&self.text[start..stop])
    }

    /// Replace every region of `tag` with `content`.
    pub fn set(&mut self, tag: &str, content: &str) -> Result<()> {
        let mut regions = self.regions(tag)?.clone();
        regions.sort_by(region_order);
        let mut new_text = self.text.clone();
        let mut new_tags = self.tags.clone();
        let mut previous: Option<(usize, usize)> = None;
        for (start, stop) in regions {
            if previous == Some((start, stop)) {
                continue;
            }
            (new_text, new_tags) = compute_adjustment(&new_text, &new_tags, start, stop, content)?;
            previous = Some((start, stop));
        }
        validate_tags(&new_text, &new_tags)?;
        self.text = new_text;
        self.tags = new_tags;
        Ok(())
    }

    /// Batch form of [set]: consistent settings at the same region coalesce,
    /// conflicting ones fail before anything is changed.
    pub fn revise(&mut self, settings: &[(&str, &str)]) -> Result<()> {
        let mut adjustments: Vec<(&str, &str, usize, usize)> = Vec::new();
        for &(tag, content) in settings {
            for &(start, stop) in self.regions(tag)? {
                adjustments.push((tag, content, start, stop));
            }
        }
        adjustments.sort_by(|a, b| region_order(&(a.2, a.3), &(b.2, b.3)));

        let mut unique: Vec<(&str, &str, usize, usize)> = Vec::new();
        let mut previous: Option<(usize, usize)> = None;
        let mut previous_content: Option<&str> = None;
        for (tag, content, start, stop) in adjustments {
            if previous == Some((start, stop)) {
                if previous_content == Some(content) {
                    continue;
                }
                return Err(Error::inconsistent(format!(
                    "conflicting settings at ({start}, {stop}): {:?} vs {content:?}",
                    previous_content.unwrap_or_default()
                )));
            }
            previous = Some((start, stop));
            previous_content = Some(content);
            unique.push((tag, content, start, stop));
        }

        let mut new_text = self.text.clone();
        let mut new_tags = self.tags.clone();
        let mut done: Vec<&str> = Vec::new();
        for (tag, content, _, _) in unique {
            if done.contains(&tag) {
                continue;
            }
            let mut regions = new_tags.get(tag).cloned().unwrap_or_default();
            regions.sort_by(region_order);
            for (start, stop) in regions {
                (new_text, new_tags) =
                    compute_adjustment(&new_text, &new_tags, start, stop, content)?;
            }
            done.push(tag);
        }
        validate_tags(&new_text, &new_tags)?;
        self.text = new_text;
        self.tags = new_tags;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &[(usize, usize)])]) -> BTreeMap<String, Regions> {
        entries
            .iter()
            .map(|(tag, regions)| (tag.to_string(), regions.to_vec()))
            .collect()
    }

    fn fixture() -> Template {
        // indices:        12  16|18  22|     28  32
        Template::new(
            "this is the TEST, TEST, and TEST",
            map(&[
                ("test1", &[(12, 16)]),
                ("test2", &[(18, 22)]),
                ("test3", &[(28, 32)]),
                ("test1 + test2", &[(12, 22)]),
                ("test2 & test3", &[(18, 22), (28, 32)]),
            ]),
        )
        .unwrap()
    }

    #[test]
    fn test_validate_boundary() {
        assert!(validate_boundary("test", 0, 5).is_err());
        assert!(validate_boundary("test", 3, 2).is_err());
        for (start, stop) in [(0, 4), (1, 4), (0, 3), (2, 3), (0, 0), (4, 4)] {
            assert!(validate_boundary("test", start, stop).is_ok());
        }
    }

    #[test]
    fn test_validate_regions() {
        let text = "this is the TEST TEST TEST";
        let valid = vec![(12, 16), (17, 21), (22, 26)];
        assert!(validate_regions(text, "test", &valid).is_ok());
        let mut invalid = valid.clone();
        invalid[2] = (22, 25);
        assert!(validate_regions(text, "test", &invalid).is_err());
    }

    #[test]
    fn test_crossing() {
        assert!(!crossing(3, 7, 3, 7)); // matching
        assert!(!crossing(3, 17, 8, 12)); // inner
        assert!(!crossing(8, 12, 3, 17)); // outer
        assert!(crossing(3, 17, 8, 18));
        assert!(crossing(7, 25, 3, 9));
    }

    #[test]
    fn test_new_rejects_crossing() {
        let text = "this is the TEST TEST TEST";
        assert!(Template::new(
            text,
            map(&[("a", &[(12, 16)]), ("b", &[(17, 21)]), ("c", &[(3, 18)])]),
        )
        .is_err());
    }

    #[test]
    fn test_get() {
        let t = fixture();
        assert_eq!(t.len(), 5);
        assert!(!t.contains("xxx"));
        assert_eq!(t.get("test1").unwrap(), "TEST");
        assert_eq!(t.get("test1 + test2").unwrap(), "TEST, TEST");
        assert_eq!(t.get("test2 & test3").unwrap(), "TEST");
    }

    #[test]
    fn test_set_shifts_siblings() {
        let mut t = fixture();
        t.set("test1", "THE_FIRST").unwrap();
        assert_eq!(t.text(), "this is the THE_FIRST, TEST, and TEST");
        assert_eq!(t.len(), 5);
        assert_eq!(t.get("test1").unwrap(), "THE_FIRST");
        assert_eq!(t.get("test2").unwrap(), "TEST");
        assert_eq!(t.get("test3").unwrap(), "TEST");
        assert_eq!(t.get("test1 + test2").unwrap(), "THE_FIRST, TEST");
        assert_eq!(t.get("test2 & test3").unwrap(), "TEST");

        // multi-region tags must stay consistent; these two sets would leave
        // `test2 & test3` with differing region texts
        assert!(t.clone().set("test2", "xx").is_err());
        assert!(t.clone().set("test3", "xx").is_err());

        t.set("test2 & test3", "2 & 3").unwrap();
        assert_eq!(t.text(), "this is the THE_FIRST, 2 & 3, and 2 & 3");
        assert_eq!(t.get("test2").unwrap(), "2 & 3");
        assert_eq!(t.get("test1 + test2").unwrap(), "THE_FIRST, 2 & 3");
    }

    #[test]
    fn test_set_outer_deletes_inner() {
        let mut t = fixture();
        t.set("test2 & test3", "2 & 3").unwrap();
        t.set("test1 + test2", "THE_FIRST + THE_SECOND").unwrap();
        assert_eq!(t.text(), "this is the THE_FIRST + THE_SECOND, and 2 & 3");
        assert_eq!(t.len(), 3);
        assert!(!t.contains("test1"));
        assert!(!t.contains("test2"));
        assert!(t.contains("test3"));
        assert_eq!(t.get("test3").unwrap(), "2 & 3");
        assert_eq!(t.get("test1 + test2").unwrap(), "THE_FIRST + THE_SECOND");
    }

    #[test]
    fn test_revise() {
        let mut t = fixture();
        t.revise(&[
            ("test1", "THE_FIRST"),
            ("test1 + test2", "1st + 2nd"),
            ("test2 & test3", "2 & 3"),
        ])
        .unwrap();
        assert_eq!(t.text(), "this is the 1st + 2nd, and 2 & 3");
    }

    #[test]
    fn test_revise_conflicting() {
        let mut t = fixture();
        assert!(t.revise(&[("test2", "a"), ("test2 & test3", "b")]).is_err());
    }

    #[test]
    fn test_unknown_tag() {
        let mut t = fixture();
        assert!(t.get("nope").is_err());
        assert!(t.set("nope", "x").is_err());
    }
}
