//! Command queue
//!
//! Steps are enqueued up front in declaration order and executed strictly
//! one at a time against a [`Session`]. A step is only dequeued once the
//! previous one, retry loop included, has resolved. The first failure
//! aborts the queue and the remaining steps are recorded as skipped.
//!
//! Values captured with [`Step::Capture`] live as long as the queue and are
//! substituted into [`Step::Deferred`] steps when those are dequeued.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::action::Action;
use crate::dom::Viewport;
use crate::driver::Driver;
use crate::error::{HarnessError, HarnessResult};
use crate::navigation::Session;
use crate::predicate::Predicate;
use crate::retry::{evaluate, RetryPolicy};
use crate::scenario::StepTemplate;
use crate::selector::Selector;

/// One declarative step of a scenario
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Navigate(String),
    SetViewport(Viewport),
    Interact {
        selector: Selector,
        action: Action,
    },
    Assert {
        selector: Selector,
        predicate: Predicate,
        /// Overrides the queue's default assertion timeout
        timeout: Option<Duration>,
    },
    /// Store a value of the first match under `alias`
    Capture {
        selector: Selector,
        source: CaptureSource,
        alias: String,
        timeout: Option<Duration>,
    },
    /// Run `steps` next only if `selector` matches (`present`) or does not
    /// match right now. Never retried.
    Guard {
        selector: Selector,
        present: bool,
        steps: Vec<Step>,
    },
    /// Compiled once the aliases it mentions have been captured
    Deferred(StepTemplate),
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureSource {
    Text,
    Attr(String),
}

impl Step {
    /// Readiness an element must reach before `action` is performed on it
    pub fn readiness(action: &Action) -> Predicate {
        match action {
            Action::Focus => Predicate::actionable(false, true),
            Action::Blur => Predicate::Focused,
            other => Predicate::actionable(other.requires_enabled(), false),
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Navigate(url) => write!(f, "visit {}", url),
            Step::SetViewport(v) => write!(f, "viewport {}", v),
            Step::Interact { selector, action } => write!(f, "get {} {}", selector, action),
            Step::Assert {
                selector,
                predicate,
                ..
            } => write!(f, "get {} should {}", selector, predicate),
            Step::Capture {
                selector,
                source: CaptureSource::Text,
                alias,
                ..
            } => write!(f, "get {} as @{}", selector, alias),
            Step::Capture {
                selector,
                source: CaptureSource::Attr(name),
                alias,
                ..
            } => write!(f, "get {} attr {} as @{}", selector, name, alias),
            Step::Guard {
                selector,
                present,
                steps,
            } => write!(
                f,
                "if {} {} ({} step(s))",
                if *present { "present" } else { "absent" },
                selector,
                steps.len()
            ),
            Step::Deferred(template) => write!(f, "{}", template),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Passed,
    Failed,
    Skipped,
}

/// Log entry for one dequeued (or skipped) step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRecord {
    pub index: usize,
    pub label: String,
    pub status: CommandStatus,
    pub duration_ms: u64,
}

struct InFlight {
    index: usize,
    label: String,
    started: Instant,
}

pub struct CommandQueue {
    pending: VecDeque<Step>,
    policy: RetryPolicy,
    next_index: usize,
    in_flight: Option<InFlight>,
    records: Vec<CommandRecord>,
    aliases: HashMap<String, String>,
}

impl CommandQueue {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            pending: VecDeque::new(),
            policy,
            next_index: 0,
            in_flight: None,
            records: Vec::new(),
            aliases: HashMap::new(),
        }
    }

    pub fn enqueue(&mut self, step: Step) {
        self.pending.push_back(step);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn records(&self) -> &[CommandRecord] {
        &self.records
    }

    pub fn alias(&self, name: &str) -> Option<&str> {
        self.aliases.get(name).map(String::as_str)
    }

    pub fn skipped(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.status == CommandStatus::Skipped)
            .count()
    }

    /// Drain the queue against `session`, stopping at the first failure
    pub async fn run<D: Driver>(&mut self, session: &mut Session<D>) -> HarnessResult<()> {
        while let Some(step) = self.pending.pop_front() {
            let index = self.next_index;
            self.next_index += 1;
            let label = step.to_string();
            debug!("[{}] {}", index, label);
            self.in_flight = Some(InFlight {
                index,
                label,
                started: Instant::now(),
            });

            let result = match step {
                Step::Deferred(template) => match template.resolve(&self.aliases) {
                    Ok(resolved) => {
                        debug!("[{}] resolved to {}", index, resolved);
                        self.execute(session, &resolved).await
                    }
                    Err(e) => Err(e),
                },
                step => self.execute(session, &step).await,
            };
            match result {
                Ok(()) => self.finish(CommandStatus::Passed),
                Err(e) => {
                    warn!("[{}] failed: {}", index, e);
                    self.abort();
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Mark the in-flight step failed and every pending step skipped.
    /// Used on failure and when the scenario's time budget cancels [`run`](Self::run).
    pub fn abort(&mut self) {
        self.finish(CommandStatus::Failed);
        while let Some(step) = self.pending.pop_front() {
            let index = self.next_index;
            self.next_index += 1;
            self.records.push(CommandRecord {
                index,
                label: step.to_string(),
                status: CommandStatus::Skipped,
                duration_ms: 0,
            });
        }
    }

    fn finish(&mut self, status: CommandStatus) {
        if let Some(flight) = self.in_flight.take() {
            self.records.push(CommandRecord {
                index: flight.index,
                label: flight.label,
                status,
                duration_ms: flight.started.elapsed().as_millis() as u64,
            });
        }
    }

    async fn execute<D: Driver>(
        &mut self,
        session: &mut Session<D>,
        step: &Step,
    ) -> HarnessResult<()> {
        match step {
            Step::Navigate(url) => {
                session.visit(url).await?;
            }
            Step::SetViewport(viewport) => session.set_viewport(*viewport).await?,
            Step::Interact { selector, action } => {
                let ready = evaluate(
                    session.driver(),
                    selector,
                    &Step::readiness(action),
                    &self.policy,
                )
                .await?;
                let target = ready.nodes[0];
                session
                    .driver()
                    .perform(target, action)
                    .await
                    .map_err(|e| match e {
                        HarnessError::Interaction { action, reason, .. } => {
                            HarnessError::Interaction {
                                action,
                                selector: selector.to_string(),
                                reason,
                            }
                        }
                        other => other,
                    })?;
            }
            Step::Assert {
                selector,
                predicate,
                timeout,
            } => {
                let policy = match timeout {
                    Some(t) => self.policy.with_timeout(*t),
                    None => self.policy,
                };
                evaluate(session.driver(), selector, predicate, &policy).await?;
            }
            Step::Capture {
                selector,
                source,
                alias,
                timeout,
            } => {
                let policy = match timeout {
                    Some(t) => self.policy.with_timeout(*t),
                    None => self.policy,
                };
                let predicate = match source {
                    CaptureSource::Attr(name) => Predicate::Attr {
                        name: name.clone(),
                        value: None,
                        negate: false,
                    },
                    CaptureSource::Text => Predicate::Exists,
                };
                let found = evaluate(session.driver(), selector, &predicate, &policy).await?;
                let node = found.nodes[0];
                let value = match source {
                    CaptureSource::Attr(name) => found
                        .snapshot
                        .document
                        .attr(node, name)
                        .unwrap_or_default()
                        .to_string(),
                    CaptureSource::Text => {
                        found.snapshot.document.text_content(node).trim().to_string()
                    }
                };
                debug!("@{} = {:?}", alias, value);
                self.aliases.insert(alias.clone(), value);
            }
            Step::Guard {
                selector,
                present,
                steps,
            } => {
                let page = session.driver().snapshot().await?;
                let matched = !selector.resolve(&page).is_empty();
                if matched == *present {
                    debug!("Guard on {} holds, running {} step(s)", selector, steps.len());
                    for step in steps.iter().rev() {
                        self.pending.push_front(step.clone());
                    }
                }
            }
            Step::Deferred(template) => {
                return Err(HarnessError::config(format!(
                    "step `{}` was not resolved before execution",
                    template
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimulatedBrowser, Site};
    use std::sync::Arc;
    use url::Url;

    const SITE: &str = r#"
pages:
  - path: /
    elements:
      - tag: button
        attrs: { data-cy: save, disabled: "" }
      - tag: button
        attrs: { data-cy: unlock, aria-controls: panel-save }
        text: "  Unlock  "
      - tag: div
        attrs: { id: panel-save, role: tabpanel }
behaviors:
  - on: click
    target: '[data-cy="unlock"]'
    effects:
      - remove_attr: { target: '[data-cy="save"]', name: disabled }
        after_ms: 150
"#;

    fn session() -> Session<SimulatedBrowser> {
        let site = Arc::new(Site::from_yaml(SITE).unwrap());
        Session::new(
            SimulatedBrowser::new(site, Viewport::default()),
            Url::parse("http://localhost:4173").unwrap(),
            Viewport::default(),
        )
    }

    fn get(css: &str) -> Selector {
        Selector::parse(css).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_waits_for_element_to_become_enabled() {
        let mut s = session();
        let mut queue = CommandQueue::new(RetryPolicy::default());
        queue.enqueue(Step::Navigate("/".into()));
        queue.enqueue(Step::Interact {
            selector: get(r#"[data-cy="unlock"]"#),
            action: Action::Click,
        });
        queue.enqueue(Step::Interact {
            selector: get(r#"[data-cy="save"]"#),
            action: Action::Click,
        });
        queue.enqueue(Step::Assert {
            selector: get(r#"[data-cy="save"]"#),
            predicate: Predicate::Focused,
            timeout: None,
        });

        queue.run(&mut s).await.unwrap();
        let statuses: Vec<_> = queue.records().iter().map(|r| r.status).collect();
        assert_eq!(statuses, vec![CommandStatus::Passed; 4]);
        assert!(queue.records()[2].duration_ms >= 150);
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_skips_the_rest() {
        let mut s = session();
        let mut queue = CommandQueue::new(RetryPolicy::fixed(
            Duration::from_millis(200),
            Duration::from_millis(50),
        ));
        queue.enqueue(Step::Navigate("/".into()));
        queue.enqueue(Step::Interact {
            selector: get(r#"[data-cy="save"]"#),
            action: Action::Click,
        });
        queue.enqueue(Step::Navigate("/".into()));
        queue.enqueue(Step::SetViewport(Viewport::new(800, 600)));

        let err = queue.run(&mut s).await.unwrap_err();
        assert!(matches!(err, HarnessError::PredicateTimeout { .. }));
        let statuses: Vec<_> = queue.records().iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                CommandStatus::Passed,
                CommandStatus::Failed,
                CommandStatus::Skipped,
                CommandStatus::Skipped
            ]
        );
        assert_eq!(queue.skipped(), 2);
        assert_eq!(s.viewport(), Viewport::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_assertion_timeout_override() {
        let mut s = session();
        let mut queue = CommandQueue::new(RetryPolicy::default());
        queue.enqueue(Step::Navigate("/".into()));
        queue.enqueue(Step::Assert {
            selector: get(r#"[data-cy="nothing"]"#),
            predicate: Predicate::Exists,
            timeout: Some(Duration::from_millis(300)),
        });
        let err = queue.run(&mut s).await.unwrap_err();
        assert!(matches!(err, HarnessError::ElementNotFound { timeout_ms: 300, .. }));
    }

    fn load(source: &str) -> Vec<Step> {
        let scenarios = crate::scenario::load_str(
            source,
            std::path::Path::new("queue.yaml"),
            &Default::default(),
            &[],
        )
        .unwrap();
        scenarios[0].steps.clone()
    }

    #[tokio::test(start_paused = true)]
    async fn test_captured_value_feeds_later_selector() {
        let steps = load(
            r#"
suite: s
scenarios:
  - it: x
    steps:
      - visit: /
      - get: '[data-cy="unlock"]'
        then:
          - { as: panel, attr: aria-controls }
          - { as: label }
      - get: '#{{ alias.panel }}'
        then:
          - should: [have.attr, role, tabpanel]
"#,
        );
        let mut s = session();
        let mut queue = CommandQueue::new(RetryPolicy::default());
        for step in steps {
            queue.enqueue(step);
        }
        queue.run(&mut s).await.unwrap();
        assert_eq!(queue.alias("panel"), Some("panel-save"));
        assert_eq!(queue.alias("label"), Some("Unlock"));
        let last = queue.records().last().unwrap();
        assert_eq!(last.status, CommandStatus::Passed);
        assert_eq!(last.label, "get #{{ alias.panel }} should have.attr role tabpanel");
    }

    #[tokio::test(start_paused = true)]
    async fn test_uncaptured_alias_fails_and_skips_the_rest() {
        let mut s = session();
        let mut queue = CommandQueue::new(RetryPolicy::default());
        for step in load(
            "suite: s\nscenarios:\n  - it: x\n    steps:\n      - get: '#{{ alias.nope }}'\n      - visit: /\n",
        ) {
            queue.enqueue(step);
        }
        let err = queue.run(&mut s).await.unwrap_err();
        assert!(err.is_fatal());
        let statuses: Vec<_> = queue.records().iter().map(|r| r.status).collect();
        assert_eq!(statuses, vec![CommandStatus::Failed, CommandStatus::Skipped]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_runs_nested_steps_only_when_it_holds() {
        let steps = load(
            r#"
suite: s
scenarios:
  - it: x
    steps:
      - visit: /
      - if_present: '[data-cy="unlock"]'
        steps:
          - get: '[data-cy="unlock"]'
            then: [click]
      - if_absent: '[data-cy="unlock"]'
        steps:
          - get: '[data-cy="missing"]'
"#,
        );
        let mut s = session();
        let mut queue = CommandQueue::new(RetryPolicy::default());
        for step in steps {
            queue.enqueue(step);
        }
        queue.run(&mut s).await.unwrap();
        let labels: Vec<_> = queue.records().iter().map(|r| r.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "visit /",
                r#"if present [data-cy="unlock"] (1 step(s))"#,
                r#"get [data-cy="unlock"] click"#,
                r#"if absent [data-cy="unlock"] (1 step(s))"#,
            ]
        );
        assert!(queue
            .records()
            .iter()
            .all(|r| r.status == CommandStatus::Passed));
    }

    #[test]
    fn test_step_labels() {
        let step = Step::Assert {
            selector: get(r#"[data-cy="tab-dtse"]"#),
            predicate: Predicate::from_chainer(
                "have.attr",
                &["aria-selected".to_string(), "true".to_string()],
            )
            .unwrap(),
            timeout: None,
        };
        assert_eq!(
            step.to_string(),
            r#"get [data-cy="tab-dtse"] should have attribute aria-selected="true""#
        );
        assert_eq!(Step::SetViewport(Viewport::new(1600, 900)).to_string(), "viewport 1600x900");
    }
}
