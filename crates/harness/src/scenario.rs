//! Scenario files
//!
//! Scenarios are written in YAML:
//!
//! ```yaml
//! suite: DTSE accessibility smoke
//! before_each:
//!   - viewport: [1600, 900]
//!   - visit: /
//! scenarios:
//!   - it: DTSE tab has proper ARIA role and attributes
//!     steps:
//!       - get: '[data-cy="tab-dtse"]'
//!         then:
//!           - should: [have.attr, role, tab]
//!           - and: [have.attr, aria-selected, "true"]
//!           - { as: panel, attr: aria-controls }
//!       - get: '#{{ alias.panel }}'
//!         then:
//!           - should: [have.attr, role, tabpanel]
//!       - if_absent: { test_id: toggle-export }
//!         steps:
//!           - get: { test_id: header-actions }
//!             then: [click]
//! suites: []
//! ```
//!
//! A `get` without `then` asserts that the element exists.
//!
//! `{{ env.NAME }}` is substituted inside string values when the file is
//! read. `{{ alias.NAME }}` refers to a value captured with `as` earlier in
//! the same scenario; steps that use one are compiled when they are dequeued.

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::action::{Action, Key};
use crate::dom::Viewport;
use crate::error::{HarnessError, HarnessResult};
use crate::predicate::Predicate;
use crate::queue::{CaptureSource, Step};
use crate::selector::{Position, Selector};

const PLACEHOLDER: &str = r"\{\{\s*(env|alias)\.([A-Za-z_][A-Za-z0-9_-]*)\s*\}\}";

/// Top-level suite or nested grouping
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuiteSpec {
    pub suite: String,

    #[serde(default)]
    pub before_each: Vec<StepSpec>,

    #[serde(default)]
    pub scenarios: Vec<ScenarioSpec>,

    #[serde(default)]
    pub suites: Vec<SuiteSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioSpec {
    pub it: String,

    #[serde(default)]
    pub skip: bool,

    pub steps: Vec<StepSpec>,
}

/// Exactly one of `visit`, `viewport`, `get`, `if_absent` or `if_present`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visit: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<[u32; 2]>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get: Option<Locator>,

    /// Assertion budget for this chain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub then: Vec<ChainItem>,

    /// Run `steps` only when nothing matches at that moment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub if_absent: Option<Locator>,

    /// Run `steps` only when something matches at that moment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub if_present: Option<Locator>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Locator {
    Css(String),
    Detailed(LocatorSpec),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocatorSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Accessible name, with `role`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default)]
    pub focused: bool,

    #[serde(default)]
    pub first: bool,
    #[serde(default)]
    pub last: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eq: Option<usize>,
}

/// `click`, or a one-key map such as `type: "{enter}"` / `should: be.visible`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChainItem {
    Bare(String),
    Keyed(ChainSpec),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChainSpec {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_keys: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub should: Option<Expectation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub and: Option<Expectation>,

    /// Capture a value of the first match for later `{{ alias.NAME }}` use
    #[serde(default, rename = "as", skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// With `as`: capture this attribute instead of the text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attr: Option<String>,
}

/// `be.visible` or `[have.attr, aria-selected, "true"]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Expectation {
    Chainer(String),
    WithArgs(Vec<Value>),
}

/// Support file: global hooks run before every scenario
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SupportSpec {
    #[serde(default)]
    pub before_each: Vec<StepSpec>,
}

/// Settings that affect how scenario files are read
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub test_id_attribute: String,
    pub allow_env: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            test_id_attribute: "data-cy".to_string(),
            allow_env: false,
        }
    }
}

/// A runnable scenario with its hooks resolved
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Suite path and title joined with ` > `
    pub name: String,
    pub file: PathBuf,
    pub hooks: Vec<Step>,
    pub steps: Vec<Step>,
    pub skip: bool,
}

impl Scenario {
    /// Hooks followed by steps, in execution order
    pub fn all_steps(&self) -> impl Iterator<Item = &Step> {
        self.hooks.iter().chain(self.steps.iter())
    }
}

/// A single command whose text refers to captured aliases
#[derive(Debug, Clone, PartialEq)]
pub struct StepTemplate {
    spec: StepSpec,
    test_id_attribute: String,
}

impl StepTemplate {
    /// Substitute captured values and compile
    pub fn resolve(&self, aliases: &HashMap<String, String>) -> HarnessResult<Step> {
        self.compile_with(&mut |name: &str| {
            aliases.get(name).cloned().ok_or_else(|| {
                HarnessError::config(format!("alias @{} has not been captured yet", name))
            })
        })
    }

    /// Catch malformed commands at load time, before any alias exists
    fn check(&self) -> HarnessResult<()> {
        self.compile_with(&mut |_: &str| Ok("alias".to_string())).map(|_| ())
    }

    fn compile_with(
        &self,
        lookup: &mut dyn FnMut(&str) -> HarnessResult<String>,
    ) -> HarnessResult<Step> {
        let mut spec = self.spec.clone();
        // Guarded steps resolve their own aliases when they are dequeued.
        let nested = std::mem::take(&mut spec.steps);
        let mut value = serde_yaml::to_value(&spec)?;
        substitute(&mut value, "alias", lookup)?;
        let mut spec: StepSpec = serde_yaml::from_value(value)?;
        spec.steps = nested;

        let opts = LoadOptions {
            test_id_attribute: self.test_id_attribute.clone(),
            allow_env: false,
        };
        compile_single(&spec, &opts)
    }
}

impl std::fmt::Display for StepTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let spec = &self.spec;
        if let Some(url) = &spec.visit {
            return write!(f, "visit {}", url);
        }
        if let Some(locator) = &spec.get {
            return match spec.then.first() {
                Some(item) => write!(f, "get {} {}", locator, item),
                None => write!(f, "get {} should exist", locator),
            };
        }
        match (&spec.if_absent, &spec.if_present) {
            (Some(locator), _) => write!(f, "if absent {}", locator),
            (None, Some(locator)) => write!(f, "if present {}", locator),
            (None, None) => f.write_str("step"),
        }
    }
}

fn placeholders() -> HarnessResult<Regex> {
    Regex::new(PLACEHOLDER).map_err(|e| HarnessError::config(e.to_string()))
}

/// Visit every string scalar. Mapping keys are not visited.
fn for_each_string(
    value: &mut Value,
    f: &mut dyn FnMut(&mut String) -> HarnessResult<()>,
) -> HarnessResult<()> {
    match value {
        Value::String(text) => f(text),
        Value::Sequence(items) => {
            for item in items {
                for_each_string(item, f)?;
            }
            Ok(())
        }
        Value::Mapping(map) => {
            for (_, item) in map.iter_mut() {
                for_each_string(item, f)?;
            }
            Ok(())
        }
        Value::Tagged(tagged) => for_each_string(&mut tagged.value, f),
        _ => Ok(()),
    }
}

/// Replace `{{ <scope>.NAME }}` inside string scalars; other scopes stay as written
fn substitute(
    value: &mut Value,
    scope: &str,
    lookup: &mut dyn FnMut(&str) -> HarnessResult<String>,
) -> HarnessResult<()> {
    let pattern = placeholders()?;
    for_each_string(value, &mut |text: &mut String| {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for caps in pattern.captures_iter(text) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(2)) else {
                continue;
            };
            if &caps[1] != scope {
                continue;
            }
            out.push_str(&text[last..whole.start()]);
            out.push_str(&lookup(name.as_str())?);
            last = whole.end();
        }
        out.push_str(&text[last..]);
        *text = out;
        Ok(())
    })
}

fn mentions_alias<T: Serialize>(spec: &T) -> HarnessResult<bool> {
    let mut value = serde_yaml::to_value(spec)?;
    let pattern = placeholders()?;
    let mut found = false;
    for_each_string(&mut value, &mut |text: &mut String| {
        found |= pattern.captures_iter(text).any(|caps| &caps[1] == "alias");
        Ok(())
    })?;
    Ok(found)
}

/// Replace `{{ env.NAME }}` inside the string values of a parsed document,
/// or reject it when env access is off. Substituted text is never parsed as YAML.
pub fn interpolate_env(document: &mut Value, allow_env: bool) -> HarnessResult<()> {
    substitute(document, "env", &mut |name: &str| {
        if !allow_env {
            return Err(HarnessError::config(format!(
                "{{{{ env.{} }}}} used but environment access is disabled (allowEnv = false)",
                name
            )));
        }
        std::env::var(name).map_err(|_| {
            HarnessError::config(format!("environment variable {} is not set", name))
        })
    })
}

/// Prefix configuration errors with the file they came from
fn in_file(file: &Path, error: HarnessError) -> HarnessError {
    match error {
        HarnessError::Configuration(msg) => {
            HarnessError::config(format!("{}: {}", file.display(), msg))
        }
        HarnessError::Yaml(e) => HarnessError::config(format!("{}: {}", file.display(), e)),
        other => other,
    }
}

fn parse_document<T: DeserializeOwned>(
    source: &str,
    file: &Path,
    allow_env: bool,
) -> HarnessResult<T> {
    let mut document: Value = serde_yaml::from_str(source).map_err(|e| in_file(file, e.into()))?;
    interpolate_env(&mut document, allow_env).map_err(|e| in_file(file, e))?;
    serde_yaml::from_value(document).map_err(|e| in_file(file, e.into()))
}

/// Load the global `before_each` hooks of a support file
pub fn load_support_file(path: &Path, opts: &LoadOptions) -> HarnessResult<Vec<Step>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        HarnessError::config(format!("cannot read support file {}: {}", path.display(), e))
    })?;
    let spec: SupportSpec = parse_document(&raw, path, opts.allow_env)?;
    compile_steps(&spec.before_each, opts).map_err(|e| in_file(path, e))
}

/// Load every scenario of one file
pub fn load_file(
    path: &Path,
    opts: &LoadOptions,
    global_hooks: &[Step],
) -> HarnessResult<Vec<Scenario>> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        HarnessError::config(format!("cannot read scenario file {}: {}", path.display(), e))
    })?;
    load_str(&raw, path, opts, global_hooks)
}

pub fn load_str(
    source: &str,
    file: &Path,
    opts: &LoadOptions,
    global_hooks: &[Step],
) -> HarnessResult<Vec<Scenario>> {
    let suite: SuiteSpec = parse_document(source, file, opts.allow_env)?;

    let mut out = Vec::new();
    collect(&suite, file, opts, global_hooks.to_vec(), &[], &mut out)
        .map_err(|e| in_file(file, e))?;
    debug!("Loaded {} scenario(s) from {}", out.len(), file.display());
    Ok(out)
}

fn collect(
    suite: &SuiteSpec,
    file: &Path,
    opts: &LoadOptions,
    mut hooks: Vec<Step>,
    path: &[&str],
    out: &mut Vec<Scenario>,
) -> HarnessResult<()> {
    hooks.extend(compile_steps(&suite.before_each, opts)?);
    let mut path = path.to_vec();
    path.push(suite.suite.as_str());

    for spec in &suite.scenarios {
        let mut name = path.join(" > ");
        name.push_str(" > ");
        name.push_str(&spec.it);
        out.push(Scenario {
            name,
            file: file.to_path_buf(),
            hooks: hooks.clone(),
            steps: compile_steps(&spec.steps, opts)?,
            skip: spec.skip,
        });
    }
    for nested in &suite.suites {
        collect(nested, file, opts, hooks.clone(), &path, out)?;
    }
    Ok(())
}

pub fn compile_steps(specs: &[StepSpec], opts: &LoadOptions) -> HarnessResult<Vec<Step>> {
    let mut steps = Vec::new();
    for spec in specs {
        compile_step(spec, opts, &mut steps)?;
    }
    Ok(steps)
}

/// Split a chain into one command per item. Commands that mention an alias
/// are kept as templates.
fn compile_step(spec: &StepSpec, opts: &LoadOptions, out: &mut Vec<Step>) -> HarnessResult<()> {
    check_shape(spec)?;

    let singles: Vec<StepSpec> = if spec.then.len() > 1 {
        spec.then
            .iter()
            .map(|item| StepSpec {
                then: vec![item.clone()],
                ..spec.clone()
            })
            .collect()
    } else {
        vec![spec.clone()]
    };

    for single in singles {
        let deferred = match single.if_absent.as_ref().or(single.if_present.as_ref()) {
            Some(guard) => mentions_alias(guard)?,
            None => mentions_alias(&single)?,
        };
        if deferred {
            let template = StepTemplate {
                spec: single,
                test_id_attribute: opts.test_id_attribute.clone(),
            };
            template.check()?;
            out.push(Step::Deferred(template));
        } else {
            out.push(compile_single(&single, opts)?);
        }
    }
    Ok(())
}

fn check_shape(spec: &StepSpec) -> HarnessResult<()> {
    if spec.if_absent.is_some() && spec.if_present.is_some() {
        return Err(HarnessError::config(
            "use either `if_absent` or `if_present`, not both",
        ));
    }
    let guarded = spec.if_absent.is_some() || spec.if_present.is_some();
    let kinds = [
        spec.visit.is_some(),
        spec.viewport.is_some(),
        spec.get.is_some(),
        guarded,
    ];
    if kinds.iter().filter(|k| **k).count() != 1 {
        return Err(HarnessError::config(
            "each step needs exactly one of `visit`, `viewport`, `get`, `if_absent` or `if_present`",
        ));
    }
    if spec.get.is_none() && (spec.timeout_ms.is_some() || !spec.then.is_empty()) {
        return Err(HarnessError::config("only `get` takes `then` or `timeout_ms`"));
    }
    if guarded == spec.steps.is_empty() {
        return Err(HarnessError::config(
            "`steps` is required with `if_absent`/`if_present` and not allowed elsewhere",
        ));
    }
    Ok(())
}

/// Compile one command: a visit, a viewport, a `get` with at most one
/// chained item, or a guard
fn compile_single(spec: &StepSpec, opts: &LoadOptions) -> HarnessResult<Step> {
    if let Some(url) = &spec.visit {
        return Ok(Step::Navigate(url.clone()));
    }
    if let Some([width, height]) = spec.viewport {
        if width == 0 || height == 0 {
            return Err(HarnessError::config(format!(
                "viewport {}x{} must be non-zero",
                width, height
            )));
        }
        return Ok(Step::SetViewport(Viewport::new(width, height)));
    }
    if let Some(locator) = &spec.get {
        let selector = locator.to_selector(&opts.test_id_attribute)?;
        let timeout = spec.timeout_ms.map(Duration::from_millis);
        return match spec.then.first() {
            Some(item) => item.to_step(selector, timeout),
            None => Ok(Step::Assert {
                selector,
                predicate: Predicate::Exists,
                timeout,
            }),
        };
    }
    let (locator, present) = match (&spec.if_absent, &spec.if_present) {
        (Some(locator), _) => (locator, false),
        (None, Some(locator)) => (locator, true),
        (None, None) => return Err(HarnessError::config("empty step")),
    };
    Ok(Step::Guard {
        selector: locator.to_selector(&opts.test_id_attribute)?,
        present,
        steps: compile_steps(&spec.steps, opts)?,
    })
}

impl Locator {
    pub fn to_selector(&self, test_id_attribute: &str) -> HarnessResult<Selector> {
        let spec = match self {
            Locator::Css(css) => return Selector::parse(css),
            Locator::Detailed(spec) => spec,
        };

        let mut strategies = Vec::new();
        if let Some(css) = &spec.css {
            strategies.push(Selector::parse(css)?);
        }
        if let Some(id) = &spec.test_id {
            strategies.push(Selector::attribute(test_id_attribute, id));
        }
        if let Some(role) = &spec.role {
            strategies.push(Selector::role(role, spec.name.as_deref()));
        } else if spec.name.is_some() {
            return Err(HarnessError::config("`name` is only valid together with `role`"));
        }
        if let Some(text) = &spec.text {
            strategies.push(Selector::text(text));
        }
        if spec.focused {
            strategies.push(Selector::focused());
        }
        if strategies.len() != 1 {
            return Err(HarnessError::config(
                "locator needs exactly one of `css`, `test_id`, `role`, `text` or `focused`",
            ));
        }
        let mut selector = strategies.remove(0);

        let position = match (spec.first, spec.last, spec.eq) {
            (false, false, None) => None,
            (true, false, None) => Some(Position::First),
            (false, true, None) => Some(Position::Last),
            (false, false, Some(n)) => Some(Position::Nth(n)),
            _ => {
                return Err(HarnessError::config(
                    "use at most one of `first`, `last` or `eq`",
                ))
            }
        };
        if let Some(position) = position {
            selector = selector.at(position);
        }
        Ok(selector)
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let spec = match self {
            Locator::Css(css) => return f.write_str(css),
            Locator::Detailed(spec) => spec,
        };
        let mut parts: Vec<String> = [
            ("css", &spec.css),
            ("test_id", &spec.test_id),
            ("role", &spec.role),
            ("name", &spec.name),
            ("text", &spec.text),
        ]
        .iter()
        .filter_map(|(key, value)| value.as_ref().map(|v| format!("{}={}", key, v)))
        .collect();
        if spec.focused {
            parts.push("focused".to_string());
        }
        write!(f, "{{{}}}", parts.join(", "))
    }
}

fn is_alias_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl ChainItem {
    fn to_step(&self, selector: Selector, timeout: Option<Duration>) -> HarnessResult<Step> {
        let interact = |action| Step::Interact {
            selector: selector.clone(),
            action,
        };
        match self {
            ChainItem::Bare(word) => match word.as_str() {
                "focus" => Ok(interact(Action::Focus)),
                "blur" => Ok(interact(Action::Blur)),
                "click" => Ok(interact(Action::Click)),
                "clear" => Ok(interact(Action::Clear)),
                other => Err(HarnessError::config(format!(
                    "unknown command {:?} (expected focus, blur, click, clear, type, select, should, and or as)",
                    other
                ))),
            },
            ChainItem::Keyed(spec) => {
                let set = [
                    spec.type_keys.is_some(),
                    spec.select.is_some(),
                    spec.should.is_some(),
                    spec.and.is_some(),
                    spec.alias.is_some(),
                ];
                if set.iter().filter(|s| **s).count() != 1 {
                    return Err(HarnessError::config(
                        "each chained command needs exactly one of `type`, `select`, `should`, `and` or `as`",
                    ));
                }
                if spec.attr.is_some() && spec.alias.is_none() {
                    return Err(HarnessError::config("`attr` is only valid together with `as`"));
                }
                if let Some(keys) = &spec.type_keys {
                    return Ok(interact(Action::Type(Key::parse_sequence(keys)?)));
                }
                if let Some(value) = &spec.select {
                    return Ok(interact(Action::Select(value.clone())));
                }
                if let Some(alias) = &spec.alias {
                    if !is_alias_name(alias) {
                        return Err(HarnessError::config(format!(
                            "alias name {:?} must start with a letter or `_`",
                            alias
                        )));
                    }
                    let source = match &spec.attr {
                        Some(name) => CaptureSource::Attr(name.clone()),
                        None => CaptureSource::Text,
                    };
                    return Ok(Step::Capture {
                        selector,
                        source,
                        alias: alias.clone(),
                        timeout,
                    });
                }
                match spec.should.as_ref().or(spec.and.as_ref()) {
                    Some(e) => Ok(Step::Assert {
                        selector,
                        predicate: e.to_predicate()?,
                        timeout,
                    }),
                    None => Err(HarnessError::config("empty chained command")),
                }
            }
        }
    }
}

impl std::fmt::Display for ChainItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let spec = match self {
            ChainItem::Bare(word) => return f.write_str(word),
            ChainItem::Keyed(spec) => spec,
        };
        if let Some(keys) = &spec.type_keys {
            write!(f, "type {}", keys)
        } else if let Some(value) = &spec.select {
            write!(f, "select {}", value)
        } else if let Some(e) = spec.should.as_ref().or(spec.and.as_ref()) {
            write!(f, "should {}", e)
        } else if let Some(alias) = &spec.alias {
            match &spec.attr {
                Some(attr) => write!(f, "attr {} as @{}", attr, alias),
                None => write!(f, "as @{}", alias),
            }
        } else {
            f.write_str("(empty)")
        }
    }
}

impl Expectation {
    pub fn to_predicate(&self) -> HarnessResult<Predicate> {
        match self {
            Expectation::Chainer(chainer) => Predicate::from_chainer(chainer.trim(), &[]),
            Expectation::WithArgs(values) => {
                let mut words = values.iter().map(scalar_to_string);
                let chainer = match words.next() {
                    Some(c) => c?,
                    None => return Err(HarnessError::config("`should` list is empty")),
                };
                let args = words.collect::<HarnessResult<Vec<_>>>()?;
                Predicate::from_chainer(chainer.trim(), &args)
            }
        }
    }
}

impl std::fmt::Display for Expectation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expectation::Chainer(chainer) => f.write_str(chainer),
            Expectation::WithArgs(values) => {
                let words: Vec<String> = values
                    .iter()
                    .map(|v| scalar_to_string(v).unwrap_or_else(|_| "?".to_string()))
                    .collect();
                f.write_str(&words.join(" "))
            }
        }
    }
}

fn scalar_to_string(value: &Value) -> HarnessResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(HarnessError::config(format!(
            "assertion arguments must be scalars, got {:?}",
            other
        ))),
    }
}
