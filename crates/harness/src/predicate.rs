//! Assertion predicates over resolved elements

use crate::dom::NodeId;
use crate::driver::PageSnapshot;
use crate::error::{HarnessError, HarnessResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Exists,
    NotExists,
    /// Every match is visible
    Visible,
    /// No match is visible
    NotVisible,
    Focused,
    NotFocused,
    /// Checked against the first match
    Attr {
        name: String,
        value: Option<String>,
        negate: bool,
    },
    /// Checked against the combined text of all matches
    ContainsText { text: String, negate: bool },
    HasText(String),
    HasValue(String),
    Disabled,
    Enabled,
    Length(usize),
    /// Readiness gate run before every interaction
    Actionable {
        require_enabled: bool,
        require_focusable: bool,
    },
}

/// Result of one evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Pass,
    NotFound,
    Mismatch(String),
}

impl Predicate {
    /// Build a predicate from a chai-style chainer and its arguments,
    /// e.g. `("have.attr", ["aria-selected", "true"])` or `("not.be.disabled", [])`.
    pub fn from_chainer(chainer: &str, args: &[String]) -> HarnessResult<Self> {
        let (negate, body) = match chainer.strip_prefix("not.") {
            Some(rest) => (true, rest),
            None => (false, chainer),
        };
        let bad_arity = || {
            HarnessError::config(format!(
                "chainer {:?} does not accept {} argument(s)",
                chainer,
                args.len()
            ))
        };
        let predicate = match (body, args) {
            ("exist", []) if negate => Predicate::NotExists,
            ("exist", []) => Predicate::Exists,
            ("be.visible", []) if negate => Predicate::NotVisible,
            ("be.visible", []) => Predicate::Visible,
            ("have.focus" | "be.focused", []) if negate => Predicate::NotFocused,
            ("have.focus" | "be.focused", []) => Predicate::Focused,
            ("have.attr", [name]) => Predicate::Attr {
                name: name.clone(),
                value: None,
                negate,
            },
            ("have.attr", [name, value]) => Predicate::Attr {
                name: name.clone(),
                value: Some(value.clone()),
                negate,
            },
            ("contain.text" | "contain", [text]) => Predicate::ContainsText {
                text: text.clone(),
                negate,
            },
            ("be.disabled", []) if negate => Predicate::Enabled,
            ("be.disabled", []) => Predicate::Disabled,
            ("be.enabled", []) if negate => Predicate::Disabled,
            ("be.enabled", []) => Predicate::Enabled,
            ("have.text", [text]) if !negate => Predicate::HasText(text.clone()),
            ("have.value", [value]) if !negate => Predicate::HasValue(value.clone()),
            ("have.length", [n]) if !negate => {
                let n = n.trim().parse::<usize>().map_err(|_| {
                    HarnessError::config(format!("have.length expects a count, got {:?}", n))
                })?;
                Predicate::Length(n)
            }
            (
                "exist" | "be.visible" | "have.focus" | "be.focused" | "have.attr"
                | "contain.text" | "contain" | "be.disabled" | "be.enabled" | "have.text"
                | "have.value" | "have.length",
                _,
            ) => return Err(bad_arity()),
            _ => {
                return Err(HarnessError::config(format!(
                    "unsupported chainer {:?}",
                    chainer
                )))
            }
        };
        Ok(predicate)
    }

    /// Readiness gate for an interaction
    pub fn actionable(require_enabled: bool, require_focusable: bool) -> Self {
        Predicate::Actionable {
            require_enabled,
            require_focusable,
        }
    }

    /// Predicates that describe absence hold on an empty match set
    pub fn passes_on_empty(&self) -> bool {
        matches!(self, Predicate::NotExists | Predicate::Length(0))
    }

    pub fn check(&self, page: &PageSnapshot, nodes: &[NodeId]) -> Observation {
        if nodes.is_empty() {
            return if self.passes_on_empty() {
                Observation::Pass
            } else {
                Observation::NotFound
            };
        }
        let doc = &page.document;
        let first = nodes[0];
        let outcome = |ok: bool, actual: String| {
            if ok {
                Observation::Pass
            } else {
                Observation::Mismatch(actual)
            }
        };

        match self {
            Predicate::Exists => Observation::Pass,
            Predicate::NotExists => Observation::Mismatch(count(nodes.len())),
            Predicate::Visible => match nodes.iter().find(|n| !page.is_visible(**n)) {
                None => Observation::Pass,
                Some(hidden) => Observation::Mismatch(format!("{} is hidden", describe(page, *hidden))),
            },
            Predicate::NotVisible => match nodes.iter().find(|n| page.is_visible(**n)) {
                None => Observation::Pass,
                Some(shown) => Observation::Mismatch(format!("{} is visible", describe(page, *shown))),
            },
            Predicate::Focused => outcome(
                nodes.iter().any(|n| page.has_focus(*n)),
                focus_description(page),
            ),
            Predicate::NotFocused => outcome(
                !nodes.iter().any(|n| page.has_focus(*n)),
                focus_description(page),
            ),
            Predicate::Attr {
                name,
                value,
                negate,
            } => {
                let actual = doc.attr(first, name);
                let holds = match value {
                    Some(expected) => actual == Some(expected.as_str()),
                    None => actual.is_some(),
                };
                let observed = match actual {
                    Some(a) => format!("{}=\"{}\"", name, a),
                    None => format!("no attribute {}", name),
                };
                outcome(holds != *negate, observed)
            }
            Predicate::ContainsText { text, negate } => {
                let combined = combined_text(page, nodes);
                let holds = combined.contains(text.as_str());
                outcome(holds != *negate, format!("text {:?}", abbreviate(&combined)))
            }
            Predicate::HasText(text) => {
                let combined = combined_text(page, nodes);
                outcome(combined == *text, format!("text {:?}", abbreviate(&combined)))
            }
            Predicate::HasValue(value) => {
                let actual = doc.value(first);
                outcome(actual == *value, format!("value {:?}", actual))
            }
            Predicate::Disabled => match nodes.iter().find(|n| !doc.is_disabled(**n)) {
                None => Observation::Pass,
                Some(n) => Observation::Mismatch(format!("{} is enabled", describe(page, *n))),
            },
            Predicate::Enabled => match nodes.iter().find(|n| doc.is_disabled(**n)) {
                None => Observation::Pass,
                Some(n) => Observation::Mismatch(format!("{} is disabled", describe(page, *n))),
            },
            Predicate::Length(n) => outcome(nodes.len() == *n, count(nodes.len())),
            Predicate::Actionable {
                require_enabled,
                require_focusable,
            } => {
                let who = describe(page, first);
                if !doc.is_attached(first) {
                    Observation::Mismatch(format!("{} is detached from the DOM", who))
                } else if !page.is_visible(first) {
                    Observation::Mismatch(format!("{} is not visible", who))
                } else if *require_enabled && doc.is_disabled(first) {
                    Observation::Mismatch(format!("{} is disabled", who))
                } else if *require_focusable && !doc.is_focusable(first) {
                    Observation::Mismatch(format!("{} is not focusable", who))
                } else {
                    Observation::Pass
                }
            }
        }
    }
}

impl std::fmt::Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Predicate::Exists => f.write_str("exist"),
            Predicate::NotExists => f.write_str("not exist"),
            Predicate::Visible => f.write_str("be visible"),
            Predicate::NotVisible => f.write_str("not be visible"),
            Predicate::Focused => f.write_str("have focus"),
            Predicate::NotFocused => f.write_str("not have focus"),
            Predicate::Attr {
                name,
                value,
                negate,
            } => {
                let not = if *negate { "not " } else { "" };
                match value {
                    Some(v) => write!(f, "{}have attribute {}=\"{}\"", not, name, v),
                    None => write!(f, "{}have attribute {}", not, name),
                }
            }
            Predicate::ContainsText { text, negate } => {
                let not = if *negate { "not " } else { "" };
                write!(f, "{}contain text {:?}", not, text)
            }
            Predicate::HasText(text) => write!(f, "have text {:?}", text),
            Predicate::HasValue(value) => write!(f, "have value {:?}", value),
            Predicate::Disabled => f.write_str("be disabled"),
            Predicate::Enabled => f.write_str("be enabled"),
            Predicate::Length(n) => write!(f, "have length {}", n),
            Predicate::Actionable {
                require_enabled,
                require_focusable,
            } => {
                f.write_str("be actionable (attached, visible")?;
                if *require_enabled {
                    f.write_str(", enabled")?;
                }
                if *require_focusable {
                    f.write_str(", focusable")?;
                }
                f.write_str(")")
            }
        }
    }
}

fn count(n: usize) -> String {
    if n == 1 {
        "1 element".to_string()
    } else {
        format!("{} elements", n)
    }
}

fn combined_text(page: &PageSnapshot, nodes: &[NodeId]) -> String {
    nodes
        .iter()
        .map(|n| page.document.text_content(*n))
        .collect::<Vec<_>>()
        .join(" ")
}

fn abbreviate(text: &str) -> String {
    const LIMIT: usize = 120;
    if text.chars().count() <= LIMIT {
        text.to_string()
    } else {
        let head: String = text.chars().take(LIMIT).collect();
        format!("{}...", head)
    }
}

/// Short tag-plus-hook rendering such as `<button data-cy="dtse-next-stage">`
pub fn describe(page: &PageSnapshot, node: NodeId) -> String {
    let doc = &page.document;
    let tag = doc.tag(node);
    let hook = ["data-cy", "data-testid", "id", "role"]
        .iter()
        .find_map(|name| doc.attr(node, name).map(|v| format!(" {}=\"{}\"", name, v)))
        .unwrap_or_default();
    format!("<{}{}>", tag, hook)
}

fn focus_description(page: &PageSnapshot) -> String {
    match page.focused.filter(|n| page.document.is_attached(*n)) {
        Some(node) => format!("focus on {}", describe(page, node)),
        None => "no focused element".to_string(),
    }
}
