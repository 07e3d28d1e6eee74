//! Language table: which image runs a submission, and how.
//!
//! The dispatcher treats this as pure data. Adding a language means adding an
//! entry here (or in the config file), never touching dispatch logic.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Guest path the per-run workspace is mounted at.
pub(crate) const GUEST_CODE_DIR: &str = "/mnt/code";

/// How one language is executed inside an engine unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageSpec {
    /// Image the unit is created from; assumed present on the host.
    pub image: String,
    /// Exec-form command template. Every occurrence of `{runfile}` expands
    /// to the persisted source file name.
    pub run: Vec<String>,
    /// Extension given to the persisted source file.
    pub ext: String,
}

impl LanguageSpec {
    /// Expand the command template for a concrete run file.
    pub fn command_for(&self, runfile: &str) -> Vec<String> {
        self.run
            .iter()
            .map(|part| part.replace("{runfile}", runfile))
            .collect()
    }
}

/// Supported languages, keyed by the `language` field of run requests.
/// Lookups are case-sensitive.
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    entries: HashMap<String, LanguageSpec>,
}

impl LanguageRegistry {
    /// The built-in table.
    pub fn defaults() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            "Python".to_string(),
            spec("python:3.12-alpine", &["python3", "/mnt/code/{runfile}"], "py"),
        );
        entries.insert(
            "PHP".to_string(),
            spec("php:8.3-cli-alpine", &["php", "/mnt/code/{runfile}"], "php"),
        );
        entries.insert(
            "Perl".to_string(),
            spec("perl:5.40-slim", &["perl", "/mnt/code/{runfile}"], "pl"),
        );
        // Compiled entry point is fixed: the submitted class must be `Main`.
        entries.insert(
            "Java".to_string(),
            spec(
                "eclipse-temurin:21-jdk-alpine",
                &["/bin/sh", "-c", "cd /mnt/code && javac {runfile} && java Main"],
                "java",
            ),
        );
        entries.insert(
            "Ruby".to_string(),
            spec("ruby:3.3-alpine", &["ruby", "/mnt/code/{runfile}"], "rb"),
        );
        entries.insert(
            "JavaScript".to_string(),
            spec("node:22-alpine", &["node", "/mnt/code/{runfile}"], "js"),
        );
        Self { entries }
    }

    /// Merge config-file entries over the built-ins. An override with a known
    /// name replaces that entry; an unknown name adds a new language.
    pub fn apply_overrides(&mut self, overrides: &HashMap<String, LanguageSpec>) {
        for (name, language) in overrides {
            self.entries.insert(name.clone(), language.clone());
        }
    }

    pub fn get(&self, language: &str) -> Option<&LanguageSpec> {
        self.entries.get(language)
    }

    /// Sorted names, for startup logging.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn spec(image: &str, run: &[&str], ext: &str) -> LanguageSpec {
    LanguageSpec {
        image: image.to_string(),
        run: run.iter().map(|part| (*part).to_string()).collect(),
        ext: ext.to_string(),
    }
}
