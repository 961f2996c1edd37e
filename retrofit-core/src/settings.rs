//! Clap-free settings for the transpile pipeline.

use camino::Utf8PathBuf;
use retrofit_types::{RangeError, Version, VersionRange};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub enabled: bool,
    pub dir: Utf8PathBuf,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: Utf8PathBuf::from(".retrofit-cache"),
        }
    }
}

/// Settings for one transpile run.
#[derive(Debug, Clone)]
pub struct TranspileSettings {
    /// Oldest interpreter the output must run on.
    pub target: Version,
    pub max_target: Option<Version>,

    /// Fixer ids switched off for this run.
    pub disable: Vec<String>,

    /// Installed same-name backports. `None` only warns about them.
    pub backports: Option<Vec<String>>,

    /// Add a source encoding declaration when targeting 2.x.
    pub coding_header: bool,

    pub cache: CacheSettings,
}

impl Default for TranspileSettings {
    fn default() -> Self {
        Self {
            target: Version::new(2, 7),
            max_target: None,
            disable: Vec::new(),
            backports: None,
            coding_header: true,
            cache: CacheSettings::default(),
        }
    }
}

impl TranspileSettings {
    pub fn range(&self) -> Result<VersionRange, RangeError> {
        VersionRange::new(self.target, self.max_target)
    }

    /// Everything besides the tree that affects the output of a module.
    pub fn fingerprint(&self, tool_version: &str) -> String {
        let mut disable = self.disable.clone();
        disable.sort();
        let backports = match &self.backports {
            Some(names) => {
                let mut names = names.clone();
                names.sort();
                format!("strict:{}", names.join(","))
            }
            None => "lenient".to_string(),
        };
        format!(
            "retrofit {tool_version}|target={}|max={}|disable={}|backports={backports}|coding={}",
            self.target,
            self.max_target
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string()),
            disable.join(","),
            self.coding_header
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_ignores_list_order() {
        let a = TranspileSettings {
            disable: vec!["b".into(), "a".into()],
            ..TranspileSettings::default()
        };
        let b = TranspileSettings {
            disable: vec!["a".into(), "b".into()],
            ..TranspileSettings::default()
        };
        assert_eq!(a.fingerprint("1.0"), b.fingerprint("1.0"));
        assert_ne!(a.fingerprint("1.0"), a.fingerprint("1.1"));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let settings = TranspileSettings {
            target: Version::new(3, 6),
            max_target: Some(Version::new(3, 5)),
            ..TranspileSettings::default()
        };
        assert!(settings.range().is_err());
    }
}
