//! In-process browser session over a [`Site`] fixture

use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, trace, warn};
use url::Url;

use crate::action::{Action, Key};
use crate::dom::{Document, NodeId, Viewport};
use crate::driver::{Driver, DriverFactory, PageSnapshot, ReadyState};
use crate::error::{HarnessError, HarnessResult};
use crate::predicate::describe;
use crate::sim::site::{Effect, Site, Trigger};

struct LoadedPage {
    url: Url,
    path: String,
    document: Document,
    focused: Option<NodeId>,
    ready_at: Instant,
}

enum Job {
    Mount { parent: NodeId, node: NodeId },
    Apply(Effect),
}

struct Scheduled {
    due: Instant,
    seq: u64,
    job: Job,
}

/// One simulated browsing session
pub struct SimulatedBrowser {
    site: Arc<Site>,
    viewport: Viewport,
    page: Option<LoadedPage>,
    scheduled: Vec<Scheduled>,
    seq: u64,
}

impl SimulatedBrowser {
    pub fn new(site: Arc<Site>, viewport: Viewport) -> Self {
        Self {
            site,
            viewport,
            page: None,
            scheduled: Vec::new(),
            seq: 0,
        }
    }

    fn schedule(&mut self, due: Instant, job: Job) {
        self.seq += 1;
        self.scheduled.push(Scheduled {
            due,
            seq: self.seq,
            job,
        });
    }

    fn load(&mut self, url: &Url) -> HarnessResult<()> {
        let path = url.path().to_string();
        let spec = self
            .site
            .page(&path)
            .cloned()
            .ok_or_else(|| HarnessError::NavigationFailure {
                url: url.to_string(),
                reason: format!("no page is served at {}", path),
            })?;
        if spec.status >= 400 {
            return Err(HarnessError::NavigationFailure {
                url: url.to_string(),
                reason: format!("server responded with status {}", spec.status),
            });
        }

        let built = spec.build();
        let ready_at = Instant::now() + std::time::Duration::from_millis(spec.load_ms);

        // Nothing scheduled on the previous page survives a navigation.
        self.scheduled.clear();
        for mount in built.deferred {
            self.schedule(
                ready_at + mount.after,
                Job::Mount {
                    parent: mount.parent,
                    node: mount.node,
                },
            );
        }
        self.page = Some(LoadedPage {
            url: url.clone(),
            path,
            document: built.document,
            focused: None,
            ready_at,
        });
        debug!("Loading {} (ready in {} ms)", url, spec.load_ms);
        Ok(())
    }

    /// Apply every scheduled job that is due, oldest first
    fn advance(&mut self) {
        loop {
            let now = Instant::now();
            let next = self
                .scheduled
                .iter()
                .enumerate()
                .filter(|(_, s)| s.due <= now)
                .min_by_key(|(_, s)| (s.due, s.seq))
                .map(|(i, _)| i);
            let Some(index) = next else {
                break;
            };
            let job = self.scheduled.remove(index).job;
            match job {
                Job::Mount { parent, node } => {
                    if let Some(page) = self.page.as_mut() {
                        page.document.attach(parent, node);
                    }
                }
                Job::Apply(effect) => self.apply(&effect),
            }
        }
    }

    fn is_ready(&self) -> bool {
        self.page
            .as_ref()
            .map(|p| Instant::now() >= p.ready_at)
            .unwrap_or(true)
    }

    fn current(&self) -> PageSnapshot {
        match &self.page {
            None => PageSnapshot::blank(self.viewport),
            Some(page) if Instant::now() < page.ready_at => PageSnapshot {
                url: Some(page.url.clone()),
                ready: ReadyState::Loading,
                document: Document::new(),
                focused: None,
                viewport: self.viewport,
            },
            Some(page) => PageSnapshot {
                url: Some(page.url.clone()),
                ready: ReadyState::Complete,
                document: page.document.clone(),
                focused: page.focused,
                viewport: self.viewport,
            },
        }
    }

    fn apply(&mut self, effect: &Effect) {
        let snapshot = self.current();
        if snapshot.ready != ReadyState::Complete {
            warn!("Dropping {:?}: page is not ready", effect);
            return;
        }
        match effect {
            Effect::Navigate(path) => {
                let target = snapshot.url.as_ref().and_then(|u| u.join(path).ok());
                match target {
                    Some(url) => {
                        if let Err(e) = self.load(&url) {
                            warn!("In-page navigation failed: {}", e);
                        }
                    }
                    None => warn!("Cannot resolve in-page navigation to {}", path),
                }
            }
            Effect::Focus(selector) => {
                if let Some(node) = selector.resolve(&snapshot).first().copied() {
                    self.set_focus(node);
                }
            }
            Effect::SetAttr {
                target,
                name,
                value,
            } => self.mutate(target.resolve(&snapshot), |doc, n| doc.set_attr(n, name, value)),
            Effect::RemoveAttr { target, name } => {
                self.mutate(target.resolve(&snapshot), |doc, n| doc.remove_attr(n, name))
            }
            Effect::Show(target) => {
                self.mutate(target.resolve(&snapshot), |doc, n| doc.remove_attr(n, "hidden"))
            }
            Effect::Hide(target) => {
                self.mutate(target.resolve(&snapshot), |doc, n| doc.set_attr(n, "hidden", ""))
            }
            Effect::SetText { target, text } => {
                self.mutate(target.resolve(&snapshot), |doc, n| doc.set_text(n, text))
            }
            Effect::Remove(target) => self.mutate(target.resolve(&snapshot), |doc, n| doc.detach(n)),
        }
    }

    fn mutate(&mut self, nodes: Vec<NodeId>, mut f: impl FnMut(&mut Document, NodeId)) {
        if let Some(page) = self.page.as_mut() {
            for node in nodes {
                f(&mut page.document, node);
            }
        }
    }

    /// Run every behaviour the event reaches. Conditions are evaluated
    /// against the document as it was before any of the resulting effects.
    fn dispatch(&mut self, trigger: Trigger, node: NodeId, key: Option<&Key>) {
        let snapshot = self.current();
        let Some(path) = self.page.as_ref().map(|p| p.path.clone()) else {
            return;
        };
        let mut bubble = vec![node];
        bubble.extend(snapshot.document.ancestors(node));

        let site = Arc::clone(&self.site);
        let fired: Vec<_> = site
            .behaviors
            .iter()
            .filter(|b| b.on == trigger)
            .filter(|b| b.key.is_none() || b.key.as_ref() == key)
            .filter(|b| b.page.as_deref().map(|p| p == path).unwrap_or(true))
            .filter(|b| {
                let targets = b.target.resolve(&snapshot);
                bubble.iter().any(|n| targets.contains(n))
            })
            .filter(|b| {
                b.when
                    .as_ref()
                    .map(|w| !w.resolve(&snapshot).is_empty())
                    .unwrap_or(true)
            })
            .collect();

        trace!(
            "{:?} on {} fired {} behavior(s)",
            trigger,
            describe(&snapshot, node),
            fired.len()
        );

        let now = Instant::now();
        for behavior in fired {
            for timed in &behavior.effects {
                // After an in-page navigation the rest lands on the new page once it is ready.
                let due = match self.loading_until() {
                    Some(ready_at) => (now + timed.after).max(ready_at),
                    None => now + timed.after,
                };
                if due <= now {
                    self.apply(&timed.effect);
                } else {
                    self.schedule(due, Job::Apply(timed.effect.clone()));
                }
            }
        }
    }

    fn loading_until(&self) -> Option<Instant> {
        self.page
            .as_ref()
            .map(|p| p.ready_at)
            .filter(|ready_at| Instant::now() < *ready_at)
    }

    fn focused(&self) -> Option<NodeId> {
        self.page
            .as_ref()
            .and_then(|p| p.focused.filter(|n| p.document.is_attached(*n)))
    }

    fn set_focus(&mut self, node: NodeId) {
        let previous = self.focused();
        if previous == Some(node) {
            return;
        }
        if let Some(old) = previous {
            self.dispatch(Trigger::Blur, old, None);
        }
        if let Some(page) = self.page.as_mut() {
            page.focused = Some(node);
        }
        self.dispatch(Trigger::Focus, node, None);
    }

    fn document(&self) -> Option<&Document> {
        self.page.as_ref().map(|p| &p.document)
    }

    /// Elements whose default Enter/Space action is a click
    fn activates_on_key(&self, node: NodeId) -> bool {
        let Some(doc) = self.document() else {
            return false;
        };
        match doc.tag(node) {
            "button" => true,
            "a" => doc.has_attr(node, "href"),
            "input" => matches!(
                doc.attr(node, "type"),
                Some("button" | "submit" | "reset" | "checkbox" | "radio")
            ),
            _ => matches!(
                doc.role(node).as_deref(),
                Some("button" | "tab" | "link" | "menuitem" | "option" | "checkbox")
            ),
        }
    }

    fn is_text_field(&self, node: NodeId) -> bool {
        let Some(doc) = self.document() else {
            return false;
        };
        match doc.tag(node) {
            "textarea" => true,
            "input" => !matches!(
                doc.attr(node, "type"),
                Some("button" | "submit" | "reset" | "checkbox" | "radio")
            ),
            _ => false,
        }
    }

    fn click(&mut self, node: NodeId) {
        let focusable = self.document().map(|d| d.is_focusable(node)).unwrap_or(false);
        if focusable {
            self.set_focus(node);
        }
        self.dispatch(Trigger::Click, node, None);
    }

    fn press(&mut self, fallback: NodeId, key: &Key) {
        let recipient = self.focused().unwrap_or(fallback);
        self.dispatch(Trigger::Key, recipient, Some(key));

        match key {
            Key::Enter | Key::Space if self.activates_on_key(recipient) => self.click(recipient),
            Key::Tab => self.move_focus(recipient),
            Key::Char(c) if self.is_text_field(recipient) => {
                self.edit_value(recipient, |value| value.push(*c));
            }
            Key::Space if self.is_text_field(recipient) => {
                self.edit_value(recipient, |value| value.push(' '));
            }
            Key::Backspace if self.is_text_field(recipient) => {
                self.edit_value(recipient, |value| {
                    value.pop();
                });
            }
            _ => {}
        }
    }

    fn edit_value(&mut self, node: NodeId, f: impl FnOnce(&mut String)) {
        if let Some(page) = self.page.as_mut() {
            let mut value = page.document.value(node);
            f(&mut value);
            page.document.set_attr(node, "value", &value);
        }
        self.dispatch(Trigger::Input, node, None);
    }

    /// Sequential focus navigation to the next tabbable element, wrapping around
    fn move_focus(&mut self, from: NodeId) {
        let Some(doc) = self.document() else {
            return;
        };
        let order: Vec<NodeId> = doc
            .elements()
            .into_iter()
            .filter(|n| doc.is_tabbable(*n, &self.viewport))
            .collect();
        if order.is_empty() {
            return;
        }
        let next = match order.iter().position(|n| *n == from) {
            Some(i) => order[(i + 1) % order.len()],
            None => order[0],
        };
        self.set_focus(next);
    }

    fn select(&mut self, node: NodeId, value: &str) -> HarnessResult<()> {
        let Some(doc) = self.document() else {
            return Err(interaction("select", node, "no page loaded"));
        };
        if doc.tag(node) != "select" {
            return Err(interaction(
                "select",
                node,
                &format!("element is a <{}>, not a <select>", doc.tag(node)),
            ));
        }
        let options: Vec<NodeId> = doc
            .subtree(node)
            .into_iter()
            .filter(|n| doc.tag(*n) == "option")
            .collect();
        let chosen = options.iter().copied().find(|opt| {
            doc.attr(*opt, "value") == Some(value) || doc.text_content(*opt) == value
        });
        let Some(chosen) = chosen else {
            return Err(interaction(
                "select",
                node,
                &format!("no option matches {:?}", value),
            ));
        };
        let chosen_value = doc
            .attr(chosen, "value")
            .map(str::to_string)
            .unwrap_or_else(|| doc.text_content(chosen));

        if let Some(page) = self.page.as_mut() {
            for opt in &options {
                page.document.remove_attr(*opt, "selected");
            }
            page.document.set_attr(chosen, "selected", "");
            page.document.set_attr(node, "value", &chosen_value);
        }
        self.dispatch(Trigger::Change, node, None);
        Ok(())
    }
}

fn interaction(action: &str, node: NodeId, reason: &str) -> HarnessError {
    HarnessError::Interaction {
        action: action.to_string(),
        selector: format!("node #{}", node.index()),
        reason: reason.to_string(),
    }
}

#[async_trait]
impl Driver for SimulatedBrowser {
    async fn navigate(&mut self, url: &Url) -> HarnessResult<()> {
        self.advance();
        self.load(url)
    }

    async fn set_viewport(&mut self, viewport: Viewport) -> HarnessResult<()> {
        debug!("Viewport set to {}", viewport);
        self.viewport = viewport;
        Ok(())
    }

    async fn snapshot(&mut self) -> HarnessResult<PageSnapshot> {
        self.advance();
        Ok(self.current())
    }

    async fn perform(&mut self, target: NodeId, action: &Action) -> HarnessResult<()> {
        self.advance();
        if !self.is_ready() {
            return Err(interaction(action.name(), target, "page is still loading"));
        }
        let attached = self.document().map(|d| d.is_attached(target)).unwrap_or(false);
        if !attached {
            return Err(interaction(action.name(), target, "element is detached from the DOM"));
        }

        match action {
            Action::Focus => {
                let focusable = self.document().map(|d| d.is_focusable(target)).unwrap_or(false);
                if !focusable {
                    return Err(interaction("focus", target, "element is not focusable"));
                }
                self.set_focus(target);
            }
            Action::Blur => {
                if self.focused() == Some(target) {
                    if let Some(page) = self.page.as_mut() {
                        page.focused = None;
                    }
                    self.dispatch(Trigger::Blur, target, None);
                }
            }
            Action::Click => self.click(target),
            Action::Clear => self.edit_value(target, String::clear),
            Action::Type(keys) => {
                let focusable = self.document().map(|d| d.is_focusable(target)).unwrap_or(false);
                if focusable {
                    self.set_focus(target);
                }
                for key in keys {
                    self.press(target, key);
                    self.advance();
                }
            }
            Action::Select(value) => self.select(target, value)?,
        }
        Ok(())
    }
}

/// Opens [`SimulatedBrowser`] sessions sharing one read-only site
#[derive(Clone)]
pub struct SimulatedBrowserFactory {
    site: Arc<Site>,
}

impl SimulatedBrowserFactory {
    pub fn new(site: Site) -> Self {
        Self {
            site: Arc::new(site),
        }
    }
}

impl DriverFactory for SimulatedBrowserFactory {
    type Session = SimulatedBrowser;

    fn open(&self, viewport: Viewport) -> HarnessResult<SimulatedBrowser> {
        Ok(SimulatedBrowser::new(Arc::clone(&self.site), viewport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::Selector;
    use std::time::Duration;

    const SITE: &str = r#"
pages:
  - path: /
    load_ms: 100
    elements:
      - tag: div
        attrs: { role: tablist }
        children:
          - tag: button
            attrs: { role: tab, data-cy: tab-a, aria-selected: "true" }
          - tag: button
            attrs: { role: tab, data-cy: tab-b, aria-selected: "false" }
      - tag: input
        attrs: { data-cy: search }
      - tag: select
        attrs: { data-cy: protocol }
        children:
          - { tag: option, attrs: { value: onocoy }, text: Onocoy }
          - { tag: option, attrs: { value: hivemapper_v1 }, text: Hivemapper }
      - tag: p
        attrs: { data-cy: context }
  - path: /broken
    status: 500
  - path: /details
    load_ms: 50
    elements:
      - tag: h2
        attrs: { data-cy: heading, tabindex: "-1" }
behaviors:
  - on: key
    key: rightarrow
    target: '[data-cy="tab-a"]'
    effects:
      - set_attr: { target: '[data-cy="tab-a"]', name: aria-selected, value: "false" }
      - set_attr: { target: '[data-cy="tab-b"]', name: aria-selected, value: "true" }
      - focus: '[data-cy="tab-b"]'
  - on: click
    target: '[data-cy="tab-b"]'
    effects:
      - navigate: /details
      - set_text: { target: '[data-cy="heading"]', text: Benchmark }
      - focus: '[data-cy="heading"]'
  - on: change
    target: '[data-cy="protocol"]'
    effects:
      - set_text: { target: '[data-cy="context"]', text: Hivemapper }
        after_ms: 300
"#;

    fn browser() -> SimulatedBrowser {
        let site = Site::from_yaml(SITE).unwrap();
        SimulatedBrowser::new(Arc::new(site), Viewport::new(1600, 900))
    }

    fn url(path: &str) -> Url {
        Url::parse("http://127.0.0.1:4173/").unwrap().join(path).unwrap()
    }

    async fn node(b: &mut SimulatedBrowser, css: &str) -> NodeId {
        let snap = b.snapshot().await.unwrap();
        Selector::parse(css).unwrap().resolve(&snap)[0]
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_is_loading_until_ready() {
        let mut b = browser();
        b.navigate(&url("/")).await.unwrap();
        assert_eq!(b.snapshot().await.unwrap().ready, ReadyState::Loading);

        tokio::time::advance(Duration::from_millis(100)).await;
        let snap = b.snapshot().await.unwrap();
        assert_eq!(snap.ready, ReadyState::Complete);
        assert!(!snap.document.elements().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_failures() {
        let mut b = browser();
        assert!(matches!(
            b.navigate(&url("/missing")).await,
            Err(HarnessError::NavigationFailure { .. })
        ));
        assert!(matches!(
            b.navigate(&url("/broken")).await,
            Err(HarnessError::NavigationFailure { reason, .. }) if reason.contains("500")
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_arrow_key_behavior_moves_selection_and_focus() {
        let mut b = browser();
        b.navigate(&url("/")).await.unwrap();
        tokio::time::advance(Duration::from_millis(100)).await;

        let tab_a = node(&mut b, r#"[data-cy="tab-a"]"#).await;
        b.perform(tab_a, &Action::Type(vec![Key::ArrowRight])).await.unwrap();

        let snap = b.snapshot().await.unwrap();
        let tab_b = Selector::parse(r#"[data-cy="tab-b"]"#).unwrap().resolve(&snap)[0];
        assert_eq!(snap.document.attr(tab_b, "aria-selected"), Some("true"));
        assert_eq!(snap.document.attr(tab_a, "aria-selected"), Some("false"));
        assert_eq!(snap.focused, Some(tab_b));
    }

    #[tokio::test(start_paused = true)]
    async fn test_typing_and_tab_navigation() {
        let mut b = browser();
        b.navigate(&url("/")).await.unwrap();
        tokio::time::advance(Duration::from_millis(100)).await;

        let search = node(&mut b, r#"[data-cy="search"]"#).await;
        b.perform(search, &Action::Type(Key::parse_sequence("dtse{tab}").unwrap()))
            .await
            .unwrap();
        let snap = b.snapshot().await.unwrap();
        assert_eq!(snap.document.value(search), "dtse");
        let protocol = Selector::parse(r#"[data-cy="protocol"]"#).unwrap().resolve(&snap)[0];
        assert_eq!(snap.focused, Some(protocol));
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_schedules_delayed_effect() {
        let mut b = browser();
        b.navigate(&url("/")).await.unwrap();
        tokio::time::advance(Duration::from_millis(100)).await;

        let protocol = node(&mut b, r#"[data-cy="protocol"]"#).await;
        b.perform(protocol, &Action::Select("hivemapper_v1".into()))
            .await
            .unwrap();
        let context = node(&mut b, r#"[data-cy="context"]"#).await;
        let snap = b.snapshot().await.unwrap();
        assert_eq!(snap.document.value(protocol), "hivemapper_v1");
        assert_eq!(snap.document.text_content(context), "");

        tokio::time::advance(Duration::from_millis(300)).await;
        let snap = b.snapshot().await.unwrap();
        assert_eq!(snap.document.text_content(context), "Hivemapper");

        assert!(b.perform(protocol, &Action::Select("nope".into())).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_discards_pending_effects_and_focus() {
        let mut b = browser();
        b.navigate(&url("/")).await.unwrap();
        tokio::time::advance(Duration::from_millis(100)).await;
        let protocol = node(&mut b, r#"[data-cy="protocol"]"#).await;
        b.perform(protocol, &Action::Select("Hivemapper".into())).await.unwrap();
        assert!(b.snapshot().await.unwrap().focused.is_none());

        b.navigate(&url("/")).await.unwrap();
        tokio::time::advance(Duration::from_millis(500)).await;
        let snap = b.snapshot().await.unwrap();
        let context = Selector::parse(r#"[data-cy="context"]"#).unwrap().resolve(&snap)[0];
        assert_eq!(snap.document.text_content(context), "");
        assert_eq!(snap.focused, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_effects_after_in_page_navigation_apply_to_new_page() {
        let mut b = browser();
        b.navigate(&url("/")).await.unwrap();
        tokio::time::advance(Duration::from_millis(100)).await;

        let tab_b = node(&mut b, r#"[data-cy="tab-b"]"#).await;
        b.perform(tab_b, &Action::Click).await.unwrap();
        let snap = b.snapshot().await.unwrap();
        assert_eq!(snap.ready, ReadyState::Loading);
        assert_eq!(snap.url.unwrap().path(), "/details");

        tokio::time::advance(Duration::from_millis(50)).await;
        let snap = b.snapshot().await.unwrap();
        let heading = Selector::parse(r#"[data-cy="heading"]"#).unwrap().resolve(&snap)[0];
        assert_eq!(snap.document.text_content(heading), "Benchmark");
        assert_eq!(snap.focused, Some(heading));
    }
}
