//! In-memory package model: source files, module coordinates, and the
//! validation rules a package must pass before it can be stored.
//!
//! Validation is pure and ordered: package name, import path, then each
//! file name and duplicate check in file order. The first failing rule is
//! always the one reported.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

const RE_PATH_PART: &str = "[a-z][a-z0-9_]*";

lazy_static! {
    static ref RE_PKG_NAME: Regex = Regex::new(r"^[a-z][a-z0-9_]*$").expect("package name regex");
    // anchored at both ends: a valid prefix followed by junk such as
    // `gno.land/r/demo.v2` is rejected, unlike an unanchored match
    static ref RE_PKG_OR_RLM_PATH: Regex =
        Regex::new(&format!(r"^gno\.land/(?:p|r)(?:/{})+$", RE_PATH_PART)).expect("package path regex");
    static ref RE_FILE_NAME: Regex =
        Regex::new(r"^([a-zA-Z0-9_]*\.[a-z0-9_\.]*|LICENSE|README)$").expect("file name regex");
}

/// Prefix shared by every realm (stateful package) path.
pub const REALM_PATH_PREFIX: &str = "gno.land/r/";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid package name {name:?}, failed to match {pattern:?}")]
    InvalidPkgName { name: String, pattern: String },

    #[error("invalid package/realm path {path:?}, failed to match {pattern:?}")]
    InvalidPkgPath { path: String, pattern: String },

    #[error("invalid file name {name:?}, failed to match {pattern:?}")]
    InvalidFileName { name: String, pattern: String },

    #[error("duplicate file name {0:?}")]
    DuplicateFile(String),

    #[error("no package clause found in source files")]
    MissingPackageClause,

    #[error("package name mismatch in {file:?}: expected {expected:?}, found {found:?}")]
    PackageNameMismatch { file: String, expected: String, found: String },

    #[error("package {0:?} has no files")]
    NoFiles(String),

    #[error("missing {0} address")]
    ZeroAddress(&'static str),

    #[error("missing function name")]
    EmptyFunc,

    #[error("run package must be named \"main\", got {0:?}")]
    NotMainPackage(String),

    #[error("invalid version for {path:?}: {reason}")]
    InvalidVersion { path: String, reason: String },
}

/// Classification used to decide which files are compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Source,
    Test,
    Filetest,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemFile {
    pub name: String,
    pub body: String,
}

impl MemFile {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self { name: name.into(), body: body.into() }
    }

    pub fn kind(&self) -> FileKind {
        if self.name.ends_with("_filetest.gno") {
            FileKind::Filetest
        } else if self.name.ends_with("_test.gno") {
            FileKind::Test
        } else if self.name.ends_with(".gno") {
            FileKind::Source
        } else {
            FileKind::Other
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub path: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemMod {
    pub import_path: String,
    pub version: String,
    #[serde(default)]
    pub requires: Vec<Requirement>,
}

impl MemMod {
    pub fn new(import_path: impl Into<String>, version: impl Into<String>) -> Self {
        Self { import_path: import_path.into(), version: version.into(), requires: Vec::new() }
    }

    pub fn key(&self) -> PackageKey {
        PackageKey { path: self.import_path.clone(), version: self.version.clone() }
    }
}

/// Store identity of a package: `(import path, version)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageKey {
    pub path: String,
    pub version: String,
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.path, self.version)
    }
}

/// A single version of a package and its files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemPackage {
    pub name: String,
    pub mod_file: MemMod,
    pub files: Vec<MemFile>,
}

impl MemPackage {
    /// Assemble a package from a module declaration and raw files, taking the
    /// package name from the `package` clause of the source files.
    pub fn from_files(mod_file: MemMod, files: Vec<MemFile>) -> Result<Self, ValidationError> {
        let mut name: Option<String> = None;
        for file in files.iter().filter(|f| f.kind() == FileKind::Source) {
            let found = package_clause(&file.body).ok_or(ValidationError::MissingPackageClause)?;
            match &name {
                None => name = Some(found.to_string()),
                Some(expected) if expected != found => {
                    return Err(ValidationError::PackageNameMismatch {
                        file: file.name.clone(),
                        expected: expected.clone(),
                        found: found.to_string(),
                    })
                }
                Some(_) => {}
            }
        }
        let name = name.ok_or(ValidationError::MissingPackageClause)?;
        Ok(Self { name, mod_file, files })
    }

    pub fn path(&self) -> &str {
        &self.mod_file.import_path
    }

    pub fn version(&self) -> &str {
        &self.mod_file.version
    }

    pub fn key(&self) -> PackageKey {
        self.mod_file.key()
    }

    pub fn get_file(&self, name: &str) -> Option<&MemFile> {
        self.files.iter().find(|f| f.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Files handed to the VM; tests and filetests are stored but not compiled.
    pub fn source_files(&self) -> impl Iterator<Item = &MemFile> {
        self.files.iter().filter(|f| f.kind() == FileKind::Source)
    }

    // path must not contain any dots after the first domain component.
    // file names must contain dots.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_pkg_name(&self.name)?;
        validate_pkg_path(&self.mod_file.import_path)?;
        let mut names = HashSet::new();
        for file in &self.files {
            if !RE_FILE_NAME.is_match(&file.name) {
                return Err(ValidationError::InvalidFileName {
                    name: file.name.clone(),
                    pattern: RE_FILE_NAME.as_str().to_string(),
                });
            }
            if !names.insert(file.name.as_str()) {
                return Err(ValidationError::DuplicateFile(file.name.clone()));
            }
        }
        Ok(())
    }
}

/// All stored versions of one import path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemPackageInfo {
    pub name: String,
    pub path: String,
    pub versions: Vec<MemPackage>,
}

impl MemPackageInfo {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_pkg_name(&self.name)?;
        validate_pkg_path(&self.path)?;
        for version in &self.versions {
            version.validate().map_err(|e| ValidationError::InvalidVersion {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }
}

fn validate_pkg_name(name: &str) -> Result<(), ValidationError> {
    if !RE_PKG_NAME.is_match(name) {
        return Err(ValidationError::InvalidPkgName {
            name: name.to_string(),
            pattern: RE_PKG_NAME.as_str().to_string(),
        });
    }
    Ok(())
}

pub fn validate_pkg_path(path: &str) -> Result<(), ValidationError> {
    if !RE_PKG_OR_RLM_PATH.is_match(path) {
        return Err(ValidationError::InvalidPkgPath {
            path: path.to_string(),
            pattern: RE_PKG_OR_RLM_PATH.as_str().to_string(),
        });
    }
    Ok(())
}

pub fn is_realm_path(path: &str) -> bool {
    path.starts_with(REALM_PATH_PREFIX)
}

/// Name declared by the first `package` clause, skipping blank and `//` lines.
pub fn package_clause(body: &str) -> Option<&str> {
    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }
        let rest = line.strip_prefix("package")?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        return rest.split_whitespace().next();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkg(name: &str, path: &str, files: &[&str]) -> MemPackage {
        MemPackage {
            name: name.to_string(),
            mod_file: MemMod::new(path, "v0.0.0"),
            files: files.iter().map(|f| MemFile::new(*f, "package x")).collect(),
        }
    }

    #[test]
    fn test_valid_package() {
        assert_eq!(pkg("test", "gno.land/r/test", &["test.gno", "README", "LICENSE"]).validate(), Ok(()));
        assert_eq!(pkg("avl", "gno.land/p/demo/avl", &["node.gno"]).validate(), Ok(()));
    }

    #[test]
    fn test_first_failure_wins() {
        // bad name, bad path and bad file at once: name is reported
        let err = pkg("Bad", "example.com/x", &["bad name"]).validate().unwrap_err();
        assert!(matches!(err, ValidationError::InvalidPkgName { .. }));

        let err = pkg("ok", "example.com/x", &["bad name"]).validate().unwrap_err();
        assert!(matches!(err, ValidationError::InvalidPkgPath { .. }));

        let err = pkg("ok", "gno.land/r/ok", &["a.gno", "bad name", "a.gno"]).validate().unwrap_err();
        assert!(matches!(err, ValidationError::InvalidFileName { .. }));

        let err = pkg("ok", "gno.land/r/ok", &["a.gno", "a.gno", "bad name"]).validate().unwrap_err();
        assert_eq!(err, ValidationError::DuplicateFile("a.gno".into()));
    }

    #[test]
    fn test_path_rules() {
        assert!(validate_pkg_path("gno.land/r/demo/users").is_ok());
        assert!(validate_pkg_path("gno.land/x/demo").is_err());
        assert!(validate_pkg_path("gno.land/r/Demo").is_err());
        assert!(validate_pkg_path("gno.land/r/demo.v2").is_err());
        assert!(validate_pkg_path("xgno.land/r/demo").is_err());
        assert!(is_realm_path("gno.land/r/demo"));
        assert!(!is_realm_path("gno.land/p/demo"));
    }

    #[test]
    fn test_package_clause() {
        assert_eq!(package_clause("// header\n\npackage test\n\nfunc A() {}"), Some("test"));
        assert_eq!(package_clause("func A() {}"), None);
        assert_eq!(package_clause("packagetest"), None);
    }

    #[test]
    fn test_from_files_reads_name() {
        let files = vec![
            MemFile::new("a.gno", "package demo\n"),
            MemFile::new("a_test.gno", "package demo_test\n"),
            MemFile::new("README", "# demo"),
        ];
        let p = MemPackage::from_files(MemMod::new("gno.land/r/demo", "v0.0.0"), files).unwrap();
        assert_eq!(p.name, "demo");
        assert_eq!(p.source_files().count(), 1);
        assert!(p.get_file("README").is_some());
        assert!(!p.is_empty());
    }

    #[test]
    fn test_from_files_rejects_mismatch() {
        let files = vec![MemFile::new("a.gno", "package a"), MemFile::new("b.gno", "package b")];
        let err = MemPackage::from_files(MemMod::new("gno.land/r/a", "v0.0.0"), files).unwrap_err();
        assert!(matches!(err, ValidationError::PackageNameMismatch { .. }));

        let err = MemPackage::from_files(MemMod::new("gno.land/r/a", "v0.0.0"), vec![]).unwrap_err();
        assert_eq!(err, ValidationError::MissingPackageClause);
    }

    #[test]
    fn test_info_validates_versions() {
        let info = MemPackageInfo {
            name: "test".into(),
            path: "gno.land/r/test".into(),
            versions: vec![pkg("test", "gno.land/r/test", &["a.gno", "a.gno"])],
        };
        assert!(matches!(info.validate(), Err(ValidationError::InvalidVersion { .. })));
    }
}
