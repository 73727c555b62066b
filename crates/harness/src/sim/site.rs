//! Site fixtures for the simulated browser
//!
//! A site is a set of pages (element trees with layout boxes, load delays and
//! late-mounting elements) plus behaviours: reactions to user events that
//! mutate the document, optionally after a delay to model animated
//! transitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::action::Key;
use crate::dom::{Document, NodeId, Rect};
use crate::error::{HarnessError, HarnessResult};
use crate::selector::Selector;

/// Site fixture as written in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSpec {
    #[serde(default)]
    pub name: String,

    pub pages: Vec<PageSpec>,

    #[serde(default)]
    pub behaviors: Vec<BehaviorSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSpec {
    /// Path component the page is served at, e.g. `/`
    pub path: String,

    /// Time until the document reports ready
    #[serde(default)]
    pub load_ms: u64,

    /// HTTP status; anything >= 400 fails navigation
    #[serde(default = "default_status")]
    pub status: u16,

    #[serde(default)]
    pub elements: Vec<ElementSpec>,
}

fn default_status() -> u16 {
    200
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementSpec {
    pub tag: String,

    #[serde(default)]
    pub attrs: BTreeMap<String, String>,

    #[serde(default)]
    pub text: String,

    /// `[x, y, width, height]`
    #[serde(default)]
    pub rect: Option<[f64; 4]>,

    /// Attach this element only this long after the page became ready
    #[serde(default)]
    pub mount_after_ms: Option<u64>,

    #[serde(default)]
    pub children: Vec<ElementSpec>,
}

/// Event a behaviour reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Click,
    Focus,
    Blur,
    Key,
    Input,
    Change,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorSpec {
    pub on: Trigger,

    /// Selector for the element the event must reach (events bubble)
    pub target: String,

    /// Key name for `on: key`
    #[serde(default)]
    pub key: Option<String>,

    /// Selector that must match something when the event fires
    #[serde(default)]
    pub when: Option<String>,

    /// Restrict to one page path
    #[serde(default)]
    pub page: Option<String>,

    pub effects: Vec<EffectSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectSpec {
    #[serde(default)]
    pub after_ms: u64,

    #[serde(flatten)]
    pub kind: EffectKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    SetAttr {
        target: String,
        name: String,
        value: String,
    },
    RemoveAttr {
        target: String,
        name: String,
    },
    /// Remove the `hidden` attribute
    Show(String),
    /// Set the `hidden` attribute
    Hide(String),
    SetText {
        target: String,
        text: String,
    },
    Focus(String),
    Remove(String),
    Navigate(String),
}

/// Validated site with parsed selectors
#[derive(Debug, Clone)]
pub struct Site {
    pub name: String,
    pub pages: Vec<PageSpec>,
    pub behaviors: Vec<Behavior>,
}

#[derive(Debug, Clone)]
pub struct Behavior {
    pub on: Trigger,
    pub target: Selector,
    pub key: Option<Key>,
    pub when: Option<Selector>,
    pub page: Option<String>,
    pub effects: Vec<TimedEffect>,
}

#[derive(Debug, Clone)]
pub struct TimedEffect {
    pub after: Duration,
    pub effect: Effect,
}

#[derive(Debug, Clone)]
pub enum Effect {
    SetAttr {
        target: Selector,
        name: String,
        value: String,
    },
    RemoveAttr {
        target: Selector,
        name: String,
    },
    Show(Selector),
    Hide(Selector),
    SetText {
        target: Selector,
        text: String,
    },
    Focus(Selector),
    Remove(Selector),
    Navigate(String),
}

impl Site {
    pub fn from_yaml(yaml: &str) -> HarnessResult<Self> {
        let spec: SiteSpec = serde_yaml::from_str(yaml)?;
        Self::from_spec(spec)
    }

    pub fn from_file(path: &Path) -> HarnessResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HarnessError::config(format!("cannot read site fixture {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_spec(spec: SiteSpec) -> HarnessResult<Self> {
        for page in &spec.pages {
            if !page.path.starts_with('/') {
                return Err(HarnessError::config(format!(
                    "page path {:?} must start with '/'",
                    page.path
                )));
            }
        }

        let behaviors = spec
            .behaviors
            .into_iter()
            .map(Behavior::from_spec)
            .collect::<HarnessResult<Vec<_>>>()?;

        Ok(Self {
            name: spec.name,
            pages: spec.pages,
            behaviors,
        })
    }

    pub fn page(&self, path: &str) -> Option<&PageSpec> {
        self.pages.iter().find(|p| p.path == path)
    }
}

impl Behavior {
    fn from_spec(spec: BehaviorSpec) -> HarnessResult<Self> {
        let key = match (&spec.on, &spec.key) {
            (Trigger::Key, Some(name)) => Some(Key::parse_name(name)?),
            (Trigger::Key, None) => {
                return Err(HarnessError::config(format!(
                    "behavior on {:?} with trigger `key` needs a key name",
                    spec.target
                )))
            }
            (_, Some(_)) => {
                return Err(HarnessError::config(format!(
                    "behavior on {:?}: `key` is only valid with trigger `key`",
                    spec.target
                )))
            }
            (_, None) => None,
        };

        Ok(Self {
            on: spec.on,
            target: Selector::parse(&spec.target)?,
            key,
            when: spec.when.as_deref().map(Selector::parse).transpose()?,
            page: spec.page,
            effects: spec
                .effects
                .into_iter()
                .map(TimedEffect::from_spec)
                .collect::<HarnessResult<Vec<_>>>()?,
        })
    }
}

impl TimedEffect {
    fn from_spec(spec: EffectSpec) -> HarnessResult<Self> {
        let effect = match spec.kind {
            EffectKind::SetAttr {
                target,
                name,
                value,
            } => Effect::SetAttr {
                target: Selector::parse(&target)?,
                name,
                value,
            },
            EffectKind::RemoveAttr { target, name } => Effect::RemoveAttr {
                target: Selector::parse(&target)?,
                name,
            },
            EffectKind::Show(target) => Effect::Show(Selector::parse(&target)?),
            EffectKind::Hide(target) => Effect::Hide(Selector::parse(&target)?),
            EffectKind::SetText { target, text } => Effect::SetText {
                target: Selector::parse(&target)?,
                text,
            },
            EffectKind::Focus(target) => Effect::Focus(Selector::parse(&target)?),
            EffectKind::Remove(target) => Effect::Remove(Selector::parse(&target)?),
            EffectKind::Navigate(path) => Effect::Navigate(path),
        };
        Ok(Self {
            after: Duration::from_millis(spec.after_ms),
            effect,
        })
    }
}

/// A built page: the document with every element created, plus the
/// late-mounting elements still detached from their parents.
pub struct BuiltPage {
    pub document: Document,
    pub deferred: Vec<DeferredMount>,
}

pub struct DeferredMount {
    pub parent: NodeId,
    pub node: NodeId,
    pub after: Duration,
}

impl PageSpec {
    pub fn build(&self) -> BuiltPage {
        let mut document = Document::new();
        let mut deferred = Vec::new();
        let root = document.root();
        for element in &self.elements {
            build_element(&mut document, root, element, &mut deferred);
        }
        BuiltPage { document, deferred }
    }
}

fn build_element(
    doc: &mut Document,
    parent: NodeId,
    spec: &ElementSpec,
    deferred: &mut Vec<DeferredMount>,
) {
    let node = match spec.mount_after_ms {
        Some(ms) => {
            let node = doc.create(&spec.tag);
            deferred.push(DeferredMount {
                parent,
                node,
                after: Duration::from_millis(ms),
            });
            node
        }
        None => doc.append(parent, &spec.tag),
    };
    if let Some(el) = doc.element_mut(node) {
        el.attrs = spec.attrs.clone();
        el.text = spec.text.clone();
        el.rect = spec.rect.map(|[x, y, w, h]| Rect::new(x, y, w, h));
    }
    for child in &spec.children {
        build_element(doc, node, child, deferred);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SITE: &str = r#"
name: dtse
pages:
  - path: /
    load_ms: 100
    elements:
      - tag: main
        attrs: { data-cy: dtse-dashboard-root }
        rect: [0, 0, 1600, 900]
        children:
          - tag: button
            attrs: { data-cy: dtse-next-stage }
            text: Next
          - tag: section
            attrs: { data-cy: dtse-stage-panel-2, hidden: "" }
            mount_after_ms: 50
behaviors:
  - on: click
    target: '[data-cy="dtse-next-stage"]'
    when: '[data-cy="dtse-stage-panel-2"][hidden]'
    effects:
      - show: '[data-cy="dtse-stage-panel-2"]'
        after_ms: 200
      - set_attr: { target: '[data-cy="dtse-next-stage"]', name: aria-pressed, value: "true" }
  - on: key
    key: rightarrow
    target: '[role="tab"]'
    effects:
      - focus: '[data-cy="tab-benchmark"]'
"#;

    #[test]
    fn test_parse_site_fixture() {
        let site = Site::from_yaml(SITE).unwrap();
        assert_eq!(site.name, "dtse");
        assert_eq!(site.behaviors.len(), 2);
        assert_eq!(site.behaviors[0].effects[0].after, Duration::from_millis(200));
        assert!(matches!(site.behaviors[0].effects[1].effect, Effect::SetAttr { .. }));
        assert_eq!(site.behaviors[1].key, Some(Key::ArrowRight));
        assert_eq!(site.page("/").map(|p| p.status), Some(200));
    }

    #[test]
    fn test_build_defers_late_elements() {
        let site = Site::from_yaml(SITE).unwrap();
        let built = site.page("/").unwrap().build();
        assert_eq!(built.deferred.len(), 1);
        let panel = built.deferred[0].node;
        assert!(!built.document.is_attached(panel));
        // root, main, button
        assert_eq!(built.document.elements().len(), 3);
    }

    #[test]
    fn test_invalid_fixtures_are_rejected() {
        let bad_selector = SITE.replace(r#"target: '[role="tab"]'"#, "target: '[role='");
        assert!(Site::from_yaml(&bad_selector).is_err());

        let missing_key = SITE.replace("    key: rightarrow\n", "");
        assert!(Site::from_yaml(&missing_key).unwrap_err().is_fatal());

        let relative = SITE.replace("path: /", "path: home");
        assert!(Site::from_yaml(&relative).is_err());
    }
}
