use crate::types::Language;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Submitted source files, keyed by filename.
///
/// Insertion order is significant: adapters pick "the first file" of a kind
/// and the style adapter concatenates stylesheets in this order. Inserting a
/// name that already exists replaces its code in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMap {
    entries: Vec<(String, String)>,
}

impl FileMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a file, returning the previous code if any
    pub fn insert(&mut self, name: impl Into<String>, code: impl Into<String>) -> Option<String> {
        let name = name.into();
        let code = code.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, code)),
            None => {
                self.entries.push((name, code));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, code)| code.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, code)| (name.as_str(), code.as_str()))
    }

    /// Files whose name ends with one of `extensions` (case-insensitive), in order
    pub fn with_extension<'a>(
        &'a self,
        extensions: &'a [&'a str],
    ) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.iter().filter(move |(name, _)| {
            let lowered = name.to_ascii_lowercase();
            extensions.iter().any(|ext| lowered.ends_with(ext))
        })
    }

    /// First file for a language, by that language's extensions
    pub fn first_for(&self, language: Language) -> Option<(&str, &str)> {
        self.with_extension(language.extensions()).next()
    }

    /// Total size of all sources in bytes
    pub fn total_bytes(&self) -> usize {
        self.entries.iter().map(|(_, code)| code.len()).sum()
    }
}

impl<K, V> FromIterator<(K, V)> for FileMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut files = FileMap::new();
        for (name, code) in iter {
            files.insert(name, code);
        }
        files
    }
}

impl Serialize for FileMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, code) in &self.entries {
            map.serialize_entry(name, code)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FileMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FileMapVisitor;

        impl<'de> Visitor<'de> for FileMapVisitor {
            type Value = FileMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of filename to source text")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<FileMap, A::Error> {
                let mut files = FileMap::new();
                while let Some((name, code)) = access.next_entry::<String, String>()? {
                    files.insert(name, code);
                }
                Ok(files)
            }
        }

        deserializer.deserialize_map(FileMapVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_preserves_order_and_replaces_in_place() {
        let mut files = FileMap::new();
        files.insert("b.css", "b{}");
        files.insert("a.css", "a{}");
        let previous = files.insert("b.css", "b{color:red}");

        assert_eq!(previous.as_deref(), Some("b{}"));
        let names: Vec<&str> = files.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["b.css", "a.css"]);
        assert_eq!(files.get("b.css"), Some("b{color:red}"));
    }

    #[test]
    fn test_extension_match_is_case_insensitive() {
        let files: FileMap = [("INDEX.HTM", "<p></p>"), ("app.py", "x = 1"), ("page.html", "")]
            .into_iter()
            .collect();

        let html: Vec<&str> = files
            .with_extension(Language::Html.extensions())
            .map(|(name, _)| name)
            .collect();
        assert_eq!(html, vec!["INDEX.HTM", "page.html"]);
        assert_eq!(files.first_for(Language::Python).map(|(n, _)| n), Some("app.py"));
        assert!(files.first_for(Language::Rhai).is_none());
    }

    #[test]
    fn test_json_keeps_document_order() {
        let files: FileMap =
            serde_json::from_str(r#"{"z.css": "z{}", "a.css": "a{}", "m.css": "m{}"}"#).unwrap();
        let names: Vec<&str> = files.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["z.css", "a.css", "m.css"]);

        let json = serde_json::to_string(&files).unwrap();
        assert_eq!(json, r#"{"z.css":"z{}","a.css":"a{}","m.css":"m{}"}"#);
    }
}
