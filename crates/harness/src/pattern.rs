//! `specPattern` globbing
//!
//! Supports `*`, `?`, `**` (any number of directories) and `{a,b}`
//! alternatives. Patterns are matched against `/`-separated paths relative
//! to the configuration root.

use regex::Regex;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{HarnessError, HarnessResult};

#[derive(Debug, Clone)]
pub struct SpecPattern {
    raw: String,
    regex: Regex,
    /// Literal directory prefix; only this subtree is walked
    base: PathBuf,
}

impl SpecPattern {
    pub fn new(pattern: &str) -> HarnessResult<Self> {
        let pattern = pattern.trim().trim_start_matches("./");
        if pattern.is_empty() {
            return Err(HarnessError::config("empty specPattern"));
        }
        let regex = Regex::new(&glob_to_regex(pattern)?)
            .map_err(|e| HarnessError::config(format!("invalid specPattern {:?}: {}", pattern, e)))?;

        let base: PathBuf = pattern
            .split('/')
            .take_while(|part| !part.contains(|c: char| matches!(c, '*' | '?' | '{' | '[')))
            .collect();
        // The last literal component may be the file name itself.
        let base = if base.as_os_str() == pattern {
            base.parent().map(Path::to_path_buf).unwrap_or_default()
        } else {
            base
        };

        Ok(Self {
            raw: pattern.to_string(),
            regex,
            base,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, relative: &Path) -> bool {
        let normalized: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        self.regex.is_match(&normalized.join("/"))
    }

    /// Matching files under `root`, sorted by path
    pub fn collect(&self, root: &Path) -> HarnessResult<Vec<PathBuf>> {
        let start = root.join(&self.base);
        if !start.exists() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in WalkDir::new(&start).follow_links(true) {
            let entry = entry.map_err(|e| HarnessError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            if self.matches(relative) {
                files.push(entry.path().to_path_buf());
            }
        }
        files.sort();
        Ok(files)
    }
}

fn glob_to_regex(glob: &str) -> HarnessResult<String> {
    let mut out = String::from("^");
    let chars: Vec<char> = glob.chars().collect();
    let mut i = 0;
    let mut in_group = false;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '*' if chars.get(i + 1) == Some(&'*') => {
                if chars.get(i + 2) == Some(&'/') {
                    out.push_str("(?:.*/)?");
                    i += 3;
                } else {
                    out.push_str(".*");
                    i += 2;
                }
                continue;
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '{' if !in_group => {
                in_group = true;
                out.push_str("(?:");
            }
            ',' if in_group => out.push('|'),
            '}' if in_group => {
                in_group = false;
                out.push(')');
            }
            '{' => {
                return Err(HarnessError::config(format!(
                    "nested braces are not supported in specPattern {:?}",
                    glob
                )))
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
        i += 1;
    }
    if in_group {
        return Err(HarnessError::config(format!(
            "unclosed brace in specPattern {:?}",
            glob
        )));
    }
    out.push('$');
    Ok(out)
}
