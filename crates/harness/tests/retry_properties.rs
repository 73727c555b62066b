//! Retry and ordering guarantees, checked against the simulated dashboard
//! under a paused clock.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ariaprobe_harness::action::Action;
use ariaprobe_harness::dom::Viewport;
use ariaprobe_harness::navigation::Session;
use ariaprobe_harness::predicate::Predicate;
use ariaprobe_harness::queue::CommandStatus;
use ariaprobe_harness::retry::evaluate;
use ariaprobe_harness::scenario::{self, LoadOptions};
use ariaprobe_harness::sim::SimulatedBrowser;
use ariaprobe_harness::{
    CommandQueue, Driver, FailureKind, HarnessError, RetryPolicy, RunnerConfig, Selector,
    SimulatedBrowserFactory, Site, Step, TestRunner,
};
use tokio::time::Instant;
use url::Url;

const BASE: &str = "http://127.0.0.1:4173";

fn site() -> Site {
    Site::from_file(&Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/dtse_site.yaml"))
        .unwrap()
}

fn session() -> Session<SimulatedBrowser> {
    Session::new(
        SimulatedBrowser::new(Arc::new(site()), Viewport::default()),
        Url::parse(BASE).unwrap(),
        Viewport::default(),
    )
}

fn test_id(id: &str) -> Selector {
    Selector::attribute("data-cy", id)
}

fn attr(name: &str, value: &str) -> Predicate {
    Predicate::from_chainer("have.attr", &[name.to_string(), value.to_string()]).unwrap()
}

#[tokio::test(start_paused = true)]
async fn eventual_pass_within_timeout_plus_interval() {
    let mut s = session();
    let start = Instant::now();
    s.visit("/").await.unwrap();

    // Ready after 250 ms, export button mounts 800 ms later
    let became_true = Duration::from_millis(1050);
    let policy = RetryPolicy::default();
    let eval = evaluate(
        s.driver(),
        &test_id("dtse-export-button"),
        &Predicate::Visible,
        &policy,
    )
    .await
    .unwrap();

    let total = start.elapsed();
    assert!(total >= became_true);
    assert!(total <= became_true + RetryPolicy::DEFAULT_INTERVAL);
    assert!(eval.attempts > 1);
}

#[tokio::test(start_paused = true)]
async fn zero_matches_never_pass() {
    let mut s = session();
    s.visit("/").await.unwrap();
    let policy = RetryPolicy::default();
    let start = Instant::now();

    let err = evaluate(s.driver(), &test_id("dtse-stage-panel-9"), &Predicate::Exists, &policy)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FailureKind::ElementNotFound);
    let elapsed = start.elapsed();
    assert!(elapsed >= policy.timeout);
    assert!(elapsed <= policy.timeout + RetryPolicy::DEFAULT_INTERVAL);
}

#[tokio::test(start_paused = true)]
async fn selected_tab_attributes() {
    let mut s = session();
    s.visit("/").await.unwrap();
    let policy = RetryPolicy::default();
    let tab = test_id("tab-dtse");

    evaluate(s.driver(), &tab, &attr("role", "tab"), &policy).await.unwrap();
    evaluate(s.driver(), &tab, &attr("aria-selected", "true"), &policy)
        .await
        .unwrap();

    // Selecting another tab flips aria-selected on the DTSE tab
    let benchmark = evaluate(
        s.driver(),
        &test_id("tab-benchmark"),
        &Predicate::actionable(true, false),
        &policy,
    )
    .await
    .unwrap();
    s.driver()
        .perform(benchmark.nodes[0], &Action::Click)
        .await
        .unwrap();

    let err = evaluate(s.driver(), &tab, &attr("aria-selected", "true"), &policy)
        .await
        .unwrap_err();
    match err {
        HarnessError::PredicateTimeout {
            expected, actual, ..
        } => {
            assert_eq!(expected, r#"have attribute aria-selected="true""#);
            assert_eq!(actual, r#"aria-selected="false""#);
        }
        other => panic!("expected PredicateTimeout, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn navigate_then_focus_late_element() {
    let mut s = session();
    let mut queue = CommandQueue::new(RetryPolicy::default());
    queue.enqueue(Step::Navigate("/".into()));
    queue.enqueue(Step::Interact {
        selector: test_id("dtse-export-button"),
        action: Action::Focus,
    });
    queue.enqueue(Step::Assert {
        selector: test_id("dtse-export-button"),
        predicate: Predicate::Focused,
        timeout: None,
    });

    queue.run(&mut s).await.unwrap();
    assert!(queue
        .records()
        .iter()
        .all(|r| r.status == CommandStatus::Passed));
}

#[tokio::test(start_paused = true)]
async fn three_animated_stage_transitions() {
    let mut s = session();
    let mut queue = CommandQueue::new(RetryPolicy::default());
    queue.enqueue(Step::Navigate("/".into()));
    queue.enqueue(Step::Assert {
        selector: test_id("dtse-stage-panel-1"),
        predicate: Predicate::Visible,
        timeout: None,
    });
    for stage in ["2", "3"] {
        queue.enqueue(Step::Interact {
            selector: test_id("dtse-next-stage"),
            action: Action::Click,
        });
        queue.enqueue(Step::Assert {
            selector: test_id(&format!("dtse-stage-panel-{}", stage)),
            predicate: Predicate::Visible,
            timeout: None,
        });
    }
    queue.run(&mut s).await.unwrap();

    let labels: Vec<_> = queue.records().iter().map(|r| r.label.as_str()).collect();
    assert_eq!(
        labels,
        vec![
            "visit /",
            r#"get [data-cy="dtse-stage-panel-1"] should be visible"#,
            r#"get [data-cy="dtse-next-stage"] click"#,
            r#"get [data-cy="dtse-stage-panel-2"] should be visible"#,
            r#"get [data-cy="dtse-next-stage"] click"#,
            r#"get [data-cy="dtse-stage-panel-3"] should be visible"#,
        ]
    );
    // Each panel waits out its 200 ms animation
    assert!(queue.records()[3].duration_ms >= 200);
    assert!(queue.records()[5].duration_ms >= 200);

    // Only the current stage is shown
    let snapshot = s.driver().snapshot().await.unwrap();
    let shown = Selector::parse(r#"[data-cy^="dtse-stage-panel-"]:visible"#)
        .unwrap()
        .resolve(&snapshot);
    assert_eq!(shown.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn visibility_follows_viewport() {
    let mut s = session();
    s.visit("/").await.unwrap();
    let rail = test_id("dtse-insights-rail");
    let short = RetryPolicy::default().with_timeout(Duration::from_millis(200));

    evaluate(s.driver(), &rail, &Predicate::NotVisible, &short)
        .await
        .unwrap();

    s.set_viewport(Viewport::new(1600, 900)).await.unwrap();
    evaluate(s.driver(), &rail, &Predicate::Visible, &short)
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn navigation_failure_is_scenario_local() {
    let source = r#"
suite: navigation
scenarios:
  - it: broken page
    steps:
      - visit: /broken
      - get: { test_id: tab-dtse }
  - it: missing page
    steps:
      - visit: /nowhere
  - it: healthy page
    steps:
      - visit: /
      - get: { test_id: tab-dtse }
"#;
    let scenarios =
        scenario::load_str(source, Path::new("nav.yaml"), &LoadOptions::default(), &[]).unwrap();
    let runner = TestRunner::with_config(
        SimulatedBrowserFactory::new(site()),
        RunnerConfig::new(Url::parse(BASE).unwrap()),
    );
    let summary = runner.run_scenarios(&scenarios).await;

    assert_eq!((summary.passed, summary.failed), (1, 2));
    assert_eq!(
        summary.results[0].failure_kind,
        Some(FailureKind::NavigationFailure)
    );
    assert_eq!(summary.results[0].commands[1].status, CommandStatus::Skipped);
    assert_eq!(
        summary.results[1].failure_kind,
        Some(FailureKind::NavigationFailure)
    );
}

#[tokio::test(start_paused = true)]
async fn scenario_budget_cancels_long_scenarios() {
    let source = r#"
suite: budget
scenarios:
  - it: waits too long
    steps:
      - visit: /
      - get: { test_id: never-there }
        timeout_ms: 10000
      - get: { test_id: tab-dtse }
"#;
    let scenarios =
        scenario::load_str(source, Path::new("budget.yaml"), &LoadOptions::default(), &[])
            .unwrap();
    let config = RunnerConfig {
        scenario_timeout: Some(Duration::from_secs(2)),
        ..RunnerConfig::new(Url::parse(BASE).unwrap())
    };
    let runner = TestRunner::with_config(SimulatedBrowserFactory::new(site()), config);
    let result = runner.run_scenario(&scenarios[0]).await;

    assert_eq!(result.failure_kind, Some(FailureKind::ScenarioTimeout));
    let statuses: Vec<_> = result.commands.iter().map(|c| c.status).collect();
    assert_eq!(
        statuses,
        vec![
            CommandStatus::Passed,
            CommandStatus::Failed,
            CommandStatus::Skipped
        ]
    );
}
