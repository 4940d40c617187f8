//! Deep path access over canonical JSON values.
//!
//! Paths are parsed once at watcher registration into a structured segment
//! list; resolution walks the value and never fails. An absent key, an
//! out-of-range index, or a `null` part-way through the walk yields the null
//! sentinel.

use serde_json::Value;

static NULL: Value = Value::Null;

///
/// Path
///
/// Pre-parsed dotted path. The empty (or all-whitespace) string is the root
/// path and projects the whole value.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    /// Parse a dotted path string. Segments are trimmed; parsing is total.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::default();
        }

        Self {
            segments: trimmed
                .split('.')
                .map(|segment| segment.trim().to_string())
                .collect(),
        }
    }

    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Resolve the path against a value, yielding `Null` for any segment that
    /// does not exist or cannot be indexed.
    #[must_use]
    pub fn resolve<'a>(&self, value: &'a Value) -> &'a Value {
        let mut current = value;

        for segment in &self.segments {
            current = match current {
                Value::Object(map) => map.get(segment.as_str()).unwrap_or(&NULL),
                Value::Array(items) => segment
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| items.get(index))
                    .unwrap_or(&NULL),
                _ => &NULL,
            };
        }

        current
    }
}

///
/// TESTS
///

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_root_path_projects_whole_value() {
        let value = json!({"foo": "bar"});

        assert!(Path::parse("").is_root());
        assert!(Path::parse("   ").is_root());
        assert_eq!(Path::parse("").resolve(&value), &value);
    }

    #[test]
    fn test_nested_object_lookup() {
        let value = json!({"foo": {"bar": ["baz"]}});
        let path = Path::parse("foo.bar");

        assert_eq!(path.resolve(&value), &json!(["baz"]));
    }

    #[test]
    fn test_segments_are_trimmed() {
        let value = json!({"foo": {"bar": 1}});

        assert_eq!(Path::parse(" foo . bar ").resolve(&value), &json!(1));
        assert_eq!(Path::parse(" foo . bar ").segments(), ["foo", "bar"]);
    }

    #[test]
    fn test_array_index_segments() {
        let value = json!({"items": ["a", "b"]});

        assert_eq!(Path::parse("items.1").resolve(&value), &json!("b"));
        assert_eq!(Path::parse("items.2").resolve(&value), &Value::Null);
        assert_eq!(Path::parse("items.first").resolve(&value), &Value::Null);
    }

    #[test]
    fn test_absent_segment_yields_null() {
        let value = json!({"foo": {"bar": 1}});

        assert_eq!(Path::parse("foo.blerg").resolve(&value), &Value::Null);
        assert_eq!(Path::parse("nope.bar.deep").resolve(&value), &Value::Null);
    }

    #[test]
    fn test_null_mid_path_stops_the_walk() {
        let value = json!({"foo": null});

        assert_eq!(Path::parse("foo.bar.baz").resolve(&value), &Value::Null);
    }

    #[test]
    fn test_scalar_mid_path_yields_null() {
        let value = json!({"foo": 42});

        assert_eq!(Path::parse("foo.bar").resolve(&value), &Value::Null);
    }
}
