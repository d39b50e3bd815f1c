//! Minimal desktop entry (key-file) reader.
//!
//! Only the `[Desktop Entry]` group is kept by default; other groups can be
//! read with [`KeyFile`] directly (used for `mimeapps.list`).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use thiserror::Error;

/// Filename suffix identifying desktop entries.
pub const DESKTOP_SUFFIX: &str = ".desktop";

/// Main group of a desktop entry.
pub const DESKTOP_GROUP: &str = "Desktop Entry";

#[derive(Error, Debug)]
pub enum DesktopEntryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {reason}")]
    Syntax { line: usize, reason: String },

    #[error("missing [{0}] group")]
    MissingGroup(String),
}

/// Parsed key-file: groups of raw (still escaped) key/value pairs.
#[derive(Debug, Clone, Default)]
pub struct KeyFile {
    groups: IndexMap<String, HashMap<String, String>>,
}

impl KeyFile {
    pub fn load(path: &Path) -> Result<Self, DesktopEntryError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, DesktopEntryError> {
        let mut groups: IndexMap<String, HashMap<String, String>> = IndexMap::new();
        let mut current: Option<String> = None;

        for (idx, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(rest) = line.strip_prefix('[') {
                let name = rest.strip_suffix(']').ok_or_else(|| DesktopEntryError::Syntax {
                    line: idx + 1,
                    reason: "unterminated group header".to_string(),
                })?;
                groups.entry(name.to_string()).or_default();
                current = Some(name.to_string());
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(DesktopEntryError::Syntax {
                    line: idx + 1,
                    reason: format!("expected key=value, got '{line}'"),
                });
            };
            let Some(group) = current.as_ref() else {
                return Err(DesktopEntryError::Syntax {
                    line: idx + 1,
                    reason: "key outside of any group".to_string(),
                });
            };
            // First definition wins, matching how duplicate keys are treated elsewhere.
            groups
                .entry(group.clone())
                .or_default()
                .entry(key.trim().to_string())
                .or_insert_with(|| value.trim().to_string());
        }

        Ok(Self { groups })
    }

    pub fn has_group(&self, group: &str) -> bool {
        self.groups.contains_key(group)
    }

    /// Unescaped string value of `key` in `group`.
    pub fn string(&self, group: &str, key: &str) -> Option<String> {
        self.groups.get(group)?.get(key).map(|v| unescape(v))
    }
}

/// A parsed `[Desktop Entry]` group with typed accessors.
#[derive(Debug, Clone)]
pub struct DesktopEntry {
    path: PathBuf,
    keys: KeyFile,
}

impl DesktopEntry {
    /// Read and parse the desktop entry at `path`.
    pub fn load(path: &Path) -> Result<Self, DesktopEntryError> {
        let keys = KeyFile::load(path)?;
        Self::from_key_file(path, keys)
    }

    pub fn parse(path: &Path, content: &str) -> Result<Self, DesktopEntryError> {
        Self::from_key_file(path, KeyFile::parse(content)?)
    }

    fn from_key_file(path: &Path, keys: KeyFile) -> Result<Self, DesktopEntryError> {
        if !keys.has_group(DESKTOP_GROUP) {
            return Err(DesktopEntryError::MissingGroup(DESKTOP_GROUP.to_string()));
        }
        Ok(Self {
            path: path.to_path_buf(),
            keys,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn string(&self, key: &str) -> Option<String> {
        self.keys.string(DESKTOP_GROUP, key)
    }

    /// Boolean value; anything other than `true`/`1` reads as false.
    pub fn boolean(&self, key: &str) -> bool {
        matches!(
            self.keys.string(DESKTOP_GROUP, key).as_deref(),
            Some("true") | Some("1")
        )
    }

    /// Localized value of `key` for the locales of the current environment.
    pub fn locale_string(&self, key: &str) -> Option<String> {
        self.locale_string_for(key, &current_locales())
    }

    /// Localized value of `key`, trying `locales` in order before the
    /// unlocalized key.
    pub fn locale_string_for(&self, key: &str, locales: &[String]) -> Option<String> {
        locales
            .iter()
            .find_map(|locale| self.string(&format!("{key}[{locale}]")))
            .or_else(|| self.string(key))
    }
}

/// Locale variants to try, most specific first.
///
/// `de_DE.UTF-8@euro` yields `de_DE@euro`, `de_DE`, `de@euro`, `de`.
pub fn current_locales() -> Vec<String> {
    let raw = ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.is_empty());
    match raw {
        Some(value) => locale_variants(&value),
        None => Vec::new(),
    }
}

pub fn locale_variants(locale: &str) -> Vec<String> {
    if locale == "C" || locale == "POSIX" {
        return Vec::new();
    }
    let (rest, modifier) = match locale.split_once('@') {
        Some((rest, modifier)) => (rest, Some(modifier)),
        None => (locale, None),
    };
    let rest = rest.split('.').next().unwrap_or(rest);
    let (lang, country) = match rest.split_once('_') {
        Some((lang, country)) => (lang, Some(country)),
        None => (rest, None),
    };

    let mut variants = Vec::new();
    if let (Some(country), Some(modifier)) = (country, modifier) {
        variants.push(format!("{lang}_{country}@{modifier}"));
    }
    if let Some(country) = country {
        variants.push(format!("{lang}_{country}"));
    }
    if let Some(modifier) = modifier {
        variants.push(format!("{lang}@{modifier}"));
    }
    variants.push(lang.to_string());
    variants
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('s') => out.push(' '),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(';') => out.push(';'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
# Sample template
[Desktop Entry]
Type=Application
Name=New Document
Name[de]=Neues Dokument
Name[de_CH]=Neus Dokumänt
Comment=Enter\sa name
Hidden=true
Exec=editor %f

[Desktop Action Other]
Name=Other
"#;

    #[test]
    fn test_parse_groups_and_strings() {
        let entry = DesktopEntry::parse(Path::new("/t/a.desktop"), SAMPLE).unwrap();
        assert_eq!(entry.string("Type").as_deref(), Some("Application"));
        assert_eq!(entry.string("Exec").as_deref(), Some("editor %f"));
        assert_eq!(entry.string("Comment").as_deref(), Some("Enter a name"));
        assert!(entry.boolean("Hidden"));
        assert!(!entry.boolean("NoDisplay"));
        assert_eq!(entry.string("Missing"), None);
    }

    #[test]
    fn test_locale_lookup() {
        let entry = DesktopEntry::parse(Path::new("/t/a.desktop"), SAMPLE).unwrap();
        let swiss = locale_variants("de_CH.UTF-8");
        assert_eq!(swiss, vec!["de_CH".to_string(), "de".to_string()]);
        assert_eq!(
            entry.locale_string_for("Name", &swiss).as_deref(),
            Some("Neus Dokumänt")
        );
        assert_eq!(
            entry.locale_string_for("Name", &locale_variants("de_AT")).as_deref(),
            Some("Neues Dokument")
        );
        assert_eq!(
            entry.locale_string_for("Name", &locale_variants("fr_FR")).as_deref(),
            Some("New Document")
        );
        assert!(locale_variants("C").is_empty());
        assert_eq!(
            locale_variants("sr_RS@latin"),
            vec!["sr_RS@latin", "sr_RS", "sr@latin", "sr"]
        );
    }

    #[test]
    fn test_malformed_input() {
        assert!(matches!(
            KeyFile::parse("Name=outside"),
            Err(DesktopEntryError::Syntax { line: 1, .. })
        ));
        assert!(matches!(
            KeyFile::parse("[Desktop Entry\nName=x"),
            Err(DesktopEntryError::Syntax { .. })
        ));
        assert!(matches!(
            DesktopEntry::parse(Path::new("x"), "[Other]\nName=x\n"),
            Err(DesktopEntryError::MissingGroup(_))
        ));
    }
}
