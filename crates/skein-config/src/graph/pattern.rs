//! Regex values that serialize to the `{source, flags}` form the bundler
//! side understands.

use std::fmt;

use regex::{Regex, RegexBuilder};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A compiled regex that remembers its source and flags.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    case_insensitive: bool,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: impl Into<String>, case_insensitive: bool) -> Result<Self, regex::Error> {
        let source = source.into();
        let regex = RegexBuilder::new(&source)
            .case_insensitive(case_insensitive)
            .build()?;
        Ok(Self {
            source,
            case_insensitive,
            regex,
        })
    }

    /// `\.(a|b|c)` over escaped extension literals, case-insensitive,
    /// anchored at the end with an optional `?query` suffix when
    /// `query` is set.
    pub fn extensions<'a, I>(extensions: I, query: bool) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let alternatives = extensions
            .into_iter()
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("|");
        let suffix = if query { r"(\?.*)?$" } else { "$" };
        Self::new(format!(r"\.({alternatives}){suffix}"), true)
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.regex.is_match(haystack)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn flags(&self) -> &'static str {
        if self.case_insensitive { "i" } else { "" }
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.case_insensitive == other.case_insensitive
    }
}

impl Eq for Pattern {}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.source, self.flags())
    }
}

#[derive(Serialize, Deserialize)]
struct Repr<'a> {
    source: std::borrow::Cow<'a, str>,
    #[serde(default)]
    flags: std::borrow::Cow<'a, str>,
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Repr {
            source: self.source.as_str().into(),
            flags: self.flags().into(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = Repr::deserialize(deserializer)?;
        if let Some(flag) = repr.flags.chars().find(|c| *c != 'i') {
            return Err(D::Error::custom(format!("unsupported regex flag '{flag}'")));
        }
        Pattern::new(repr.source.into_owned(), repr.flags.contains('i')).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn extension_pattern_source() {
        let p = Pattern::extensions(["png", "jpg"], true).unwrap();
        assert_eq!(p.source(), r"\.(png|jpg)(\?.*)?$");
        assert_eq!(p.flags(), "i");
    }

    #[test]
    fn literals_are_escaped() {
        let p = Pattern::extensions(["c++"], false).unwrap();
        assert!(p.is_match("main.c++"));
        assert!(!p.is_match("main.cc"));
    }

    #[test]
    fn serializes_as_source_and_flags() {
        let p = Pattern::new(r"es6-promise\.js", false).unwrap();
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "source": r"es6-promise\.js", "flags": "" })
        );
        let back: Pattern = serde_json::from_value(json).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn rejects_unknown_flags() {
        let err = serde_json::from_value::<Pattern>(serde_json::json!({
            "source": "a", "flags": "g"
        }));
        assert!(err.is_err());
    }

    proptest! {
        #[test]
        fn matches_listed_extension_with_and_without_query(
            name in "[a-z][a-z0-9_-]{0,12}",
            ext in prop::sample::select(vec!["png", "woff2", "mp4", "svg", "JPEG"]),
            query in "[a-z0-9=&]{0,10}",
            upper in any::<bool>(),
        ) {
            let p = Pattern::extensions(["png", "woff2", "mp4", "svg", "jpeg"], true).unwrap();
            let ext = if upper { ext.to_uppercase() } else { ext.to_lowercase() };
            let file = format!("{name}.{ext}");
            prop_assert!(p.is_match(&file));
            let with_query = format!("{file}?{query}");
            prop_assert!(p.is_match(&with_query));
        }

        #[test]
        fn rejects_unlisted_extension(
            name in "[a-z]{1,8}",
            ext in "[a-z]{1,5}",
        ) {
            let listed = ["png", "woff2", "mp4", "svg", "jpeg"];
            prop_assume!(!listed.contains(&ext.as_str()));
            let p = Pattern::extensions(listed, true).unwrap();
            let file = format!("{name}.{ext}");
            prop_assert!(!p.is_match(&file));
        }
    }
}
