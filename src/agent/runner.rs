//! Agent runner.
//!
//! Drives one round-trip per category and keeps the dashboard state in step
//! with the newest result:
//! - every submission passes an admission gate (`max_in_flight` permits for
//!   the whole agent endpoint group);
//! - every invocation gets a generation number, and completions of
//!   superseded generations are dropped;
//! - run-all goes through the categories one at a time, in order, and keeps
//!   going when a step fails.

use crate::agent::client::{AgentError, AgentSubmission, AgentTransport};
use crate::models::{AgentResponse, Category, ScoreResult, VizPayload};
use crate::render::{self, RenderPort};
use crate::scoring::ScoringRegistry;
use crate::state::{Applied, CategoryStatus, DashboardState};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Line written to the run-all log when the sequence starts.
pub const RUN_ALL_STARTED: &str = "Starting sequential execution…";

/// Line written to the run-all log when the sequence ends.
pub const RUN_ALL_DONE: &str = "Done.";

/// Runner settings.
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Maximum number of agent requests in flight at once.
    pub max_in_flight: usize,
    /// Scores below this value get a bad pill.
    pub pass_threshold: u8,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            max_in_flight: 1,
            pass_threshold: 70,
        }
    }
}

/// What happened to one invocation.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub category: Category,
    pub generation: u64,
    pub result: Result<ScoreResult, AgentError>,
    /// Whether the outcome reached the state or was superseded.
    pub applied: Applied,
}

/// Progress notifications of [`AgentRunner::run_all_with`].
#[derive(Debug)]
pub enum RunEvent<'a> {
    Started(Category),
    Finished(&'a RunOutcome),
}

/// Orchestrates agent calls, scoring, state updates and rendering.
pub struct AgentRunner {
    transport: Arc<dyn AgentTransport>,
    renderer: Arc<dyn RenderPort>,
    scoring: ScoringRegistry,
    submissions: HashMap<Category, AgentSubmission>,
    admission: Semaphore,
    state: Mutex<DashboardState>,
}

impl AgentRunner {
    pub fn new(
        transport: Arc<dyn AgentTransport>,
        renderer: Arc<dyn RenderPort>,
        scoring: ScoringRegistry,
        options: RunnerOptions,
    ) -> Self {
        let permits = options.max_in_flight.max(1);
        debug!("Admission control: {} request(s) in flight", permits);

        Self {
            transport,
            renderer,
            scoring,
            submissions: HashMap::new(),
            admission: Semaphore::new(permits),
            state: Mutex::new(DashboardState::new(options.pass_threshold)),
        }
    }

    /// Set the form submitted for a category.
    pub fn with_submission(mut self, category: Category, submission: AgentSubmission) -> Self {
        self.submissions.insert(category, submission);
        self
    }

    fn lock_state(&self) -> MutexGuard<'_, DashboardState> {
        // state updates never panic halfway, so a poisoned lock is still consistent
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current status of a category panel.
    pub fn status(&self, category: Category) -> CategoryStatus {
        self.lock_state().panel(category).status
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> DashboardState {
        self.lock_state().clone()
    }

    /// Invoke one category's agent and fold the result into the state.
    pub async fn run_one(&self, category: Category) -> RunOutcome {
        let generation = self.lock_state().begin(category);
        info!("Running {} agent", category);

        let submission = self.submissions.get(&category).cloned().unwrap_or_default();
        let response = {
            // the semaphore is never closed, so acquire cannot fail
            let _permit = self.admission.acquire().await.ok();
            self.transport.submit(category, &submission).await
        };

        match response {
            Ok(response) => self.accept(category, generation, response),
            Err(e) => {
                warn!("{} agent failed: {}", category, e);
                let applied = self.lock_state().fail(category, generation, &e.to_string());
                RunOutcome {
                    category,
                    generation,
                    result: Err(e),
                    applied,
                }
            }
        }
    }

    /// Score a report obtained without calling the backend.
    pub fn ingest_report(&self, category: Category, report: &str) -> RunOutcome {
        let generation = self.lock_state().begin(category);
        let response = AgentResponse {
            ok: true,
            report: Some(report.to_string()),
            ..Default::default()
        };
        self.accept(category, generation, response)
    }

    fn accept(&self, category: Category, generation: u64, response: AgentResponse) -> RunOutcome {
        let report = response.report.as_deref().unwrap_or("").trim().to_string();
        let result = self.scoring.score(category, Some(&report));
        let viz: Option<VizPayload> = response.viz;

        debug!("{} scored: {:?} ({})", category, result.metric, result.note);

        let mut state = self.lock_state();
        let applied = state.complete(
            category,
            generation,
            &report,
            result.clone(),
            viz,
            Utc::now(),
        );
        if applied == Applied::Current {
            render::project_panel(self.renderer.as_ref(), category, state.panel(category));
        }

        RunOutcome {
            category,
            generation,
            result: Ok(result),
            applied,
        }
    }

    /// Run every category in order, one at a time.
    pub async fn run_all(&self) -> Vec<RunOutcome> {
        self.run_all_with(|_| {}).await
    }

    /// Run every category in order, reporting progress to `observer`.
    ///
    /// Each step is awaited before the next starts; a failed step is only
    /// recorded in its own panel.
    pub async fn run_all_with(&self, mut observer: impl FnMut(RunEvent<'_>)) -> Vec<RunOutcome> {
        self.lock_state().run_all_log = vec![RUN_ALL_STARTED.to_string()];

        let mut outcomes = Vec::with_capacity(Category::ALL.len());
        for category in Category::ALL {
            observer(RunEvent::Started(category));
            let outcome = self.run_one(category).await;
            observer(RunEvent::Finished(&outcome));
            outcomes.push(outcome);
        }

        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        info!("Run-all finished: {} ok, {} failed", outcomes.len() - failed, failed);
        self.lock_state().run_all_log.push(RUN_ALL_DONE.to_string());

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChartSpec, Metric, TableSpec};
    use crate::render::testing::RecordingPort;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    type Scripted = (Duration, Result<AgentResponse, AgentError>);

    /// Transport replaying scripted responses and recording call order.
    #[derive(Default)]
    struct MockTransport {
        script: Mutex<HashMap<Category, VecDeque<Scripted>>>,
        events: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl MockTransport {
        fn respond(
            self,
            category: Category,
            delay_ms: u64,
            response: Result<AgentResponse, AgentError>,
        ) -> Self {
            self.script
                .lock()
                .unwrap()
                .entry(category)
                .or_default()
                .push_back((Duration::from_millis(delay_ms), response));
            self
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AgentTransport for MockTransport {
        async fn submit(
            &self,
            category: Category,
            _submission: &AgentSubmission,
        ) -> Result<AgentResponse, AgentError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.events.lock().unwrap().push(format!("start {}", category));

            let (delay, response) = self
                .script
                .lock()
                .unwrap()
                .get_mut(&category)
                .and_then(|q| q.pop_front())
                .unwrap_or((Duration::ZERO, Err(AgentError::Backend("no script".to_string()))));
            tokio::time::sleep(delay).await;

            self.events.lock().unwrap().push(format!("end {}", category));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            response
        }
    }

    fn ok(report: &str) -> Result<AgentResponse, AgentError> {
        Ok(AgentResponse {
            ok: true,
            report: Some(report.to_string()),
            ..Default::default()
        })
    }

    fn runner(
        transport: Arc<MockTransport>,
        port: Arc<RecordingPort>,
        max_in_flight: usize,
    ) -> AgentRunner {
        AgentRunner::new(
            transport,
            port,
            ScoringRegistry::default(),
            RunnerOptions {
                max_in_flight,
                ..Default::default()
            },
        )
    }

    fn full_script() -> MockTransport {
        MockTransport::default()
            .respond(Category::Quality, 10, ok("Batch 1 ok. Batch 2 Non-compliant. Batch 3 ok."))
            .respond(Category::Process, 10, ok("Stable line."))
            .respond(Category::Maintenance, 10, ok("critical critical warn warn warn"))
            .respond(Category::Eco, 10, ok("Full compliance achieved."))
    }

    #[tokio::test]
    async fn test_run_all_is_sequential_and_ordered() {
        let transport = Arc::new(full_script());
        let port = Arc::new(RecordingPort::default());
        let runner = runner(transport.clone(), port, 4);

        let outcomes = runner.run_all().await;

        assert_eq!(outcomes.len(), 4);
        assert_eq!(
            transport.events(),
            vec![
                "start quality",
                "end quality",
                "start process",
                "end process",
                "start maintenance",
                "end maintenance",
                "start eco",
                "end eco",
            ]
        );
        assert_eq!(transport.peak.load(Ordering::SeqCst), 1);

        let state = runner.snapshot();
        assert_eq!(state.panel(Category::Quality).kpi.value.as_deref(), Some("67/100"));
        assert_eq!(state.panel(Category::Maintenance).kpi.value.as_deref(), Some("3"));
        assert_eq!(state.panel(Category::Eco).kpi.note.as_deref(), Some("full compliance"));
        assert_eq!(state.run_all_log, vec![RUN_ALL_STARTED, RUN_ALL_DONE]);
        assert_eq!(state.history.len(), 4);
        assert_eq!(state.history[0].category, Category::Eco);
    }

    #[tokio::test]
    async fn test_run_all_continues_after_failure() {
        let transport = Arc::new(
            MockTransport::default()
                .respond(Category::Quality, 0, ok("Batch 1 ok"))
                .respond(
                    Category::Process,
                    0,
                    Err(AgentError::Transport {
                        url: "http://x/api/run/process".to_string(),
                        message: "connection refused".to_string(),
                    }),
                )
                .respond(
                    Category::Maintenance,
                    0,
                    Err(AgentError::Backend("quota exceeded".to_string())),
                )
                .respond(Category::Eco, 0, ok("hotspot")),
        );
        let port = Arc::new(RecordingPort::default());
        let runner = runner(transport.clone(), port, 1);

        let mut started = Vec::new();
        let outcomes = runner
            .run_all_with(|event| {
                if let RunEvent::Started(category) = event {
                    started.push(category);
                }
            })
            .await;

        assert_eq!(started, Category::ALL.to_vec());
        assert_eq!(outcomes.iter().filter(|o| o.result.is_err()).count(), 2);
        let statuses: Vec<_> = Category::ALL.iter().map(|c| runner.status(*c)).collect();
        assert_eq!(
            statuses,
            vec![
                CategoryStatus::Done,
                CategoryStatus::Error,
                CategoryStatus::Error,
                CategoryStatus::Done
            ]
        );

        let state = runner.snapshot();
        assert_eq!(state.panel(Category::Maintenance).output, "❌ quota exceeded");
        assert!(state.panel(Category::Process).output.starts_with("❌ Request to"));
        assert_eq!(state.panel(Category::Eco).kpi.value.as_deref(), Some("87/100"));
        assert_eq!(state.history.len(), 2);
        assert_eq!(state.failed_categories(), vec![Category::Process, Category::Maintenance]);
    }

    #[tokio::test]
    async fn test_admission_gate_serializes_concurrent_calls() {
        let transport = Arc::new(full_script());
        let port = Arc::new(RecordingPort::default());
        let runner = runner(transport.clone(), port, 1);

        tokio::join!(runner.run_one(Category::Quality), runner.run_one(Category::Eco));

        assert_eq!(transport.peak.load(Ordering::SeqCst), 1);
        assert_eq!(
            transport.events(),
            vec!["start quality", "end quality", "start eco", "end eco"]
        );
    }

    #[tokio::test]
    async fn test_wider_gate_allows_overlap() {
        let transport = Arc::new(full_script());
        let port = Arc::new(RecordingPort::default());
        let runner = runner(transport.clone(), port, 2);

        tokio::join!(runner.run_one(Category::Quality), runner.run_one(Category::Eco));

        assert_eq!(transport.peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_superseded_completion_is_discarded() {
        let transport = Arc::new(
            MockTransport::default()
                .respond(Category::Process, 60, ok("old: deviation deviation deviation"))
                .respond(Category::Process, 5, ok("new: stable")),
        );
        let port = Arc::new(RecordingPort::default());
        let runner = runner(transport.clone(), port, 2);

        let (first, second) =
            tokio::join!(runner.run_one(Category::Process), runner.run_one(Category::Process));

        assert_eq!(first.applied, Applied::Stale);
        assert_eq!(second.applied, Applied::Current);
        assert!(second.generation > first.generation);
        assert_eq!(runner.status(Category::Process), CategoryStatus::Done);

        let state = runner.snapshot();
        let panel = state.panel(Category::Process);
        assert_eq!(panel.output, "new: stable");
        assert_eq!(panel.kpi.value.as_deref(), Some("95/100"));
        assert_eq!(state.history.len(), 1);
    }

    #[tokio::test]
    async fn test_viz_rendered_then_cleared() {
        let with_viz = Ok(AgentResponse {
            ok: true,
            report: Some("Batch 1 ok".to_string()),
            viz: Some(VizPayload {
                tables: vec![TableSpec {
                    title: Some("Batch Measurements".to_string()),
                    ..Default::default()
                }],
                charts: vec![ChartSpec {
                    title: Some("Deviations over Max".to_string()),
                    ..Default::default()
                }],
            }),
            error: None,
        });
        let transport = Arc::new(
            MockTransport::default()
                .respond(Category::Quality, 0, with_viz)
                .respond(Category::Quality, 0, ok("Batch 1 ok")),
        );
        let port = Arc::new(RecordingPort::default());
        let runner = runner(transport, port.clone(), 1);

        runner.run_one(Category::Quality).await;
        runner.run_one(Category::Quality).await;

        assert_eq!(
            port.calls(),
            vec![
                "clear tbl-quality",
                "clear chr-quality",
                "table tbl-quality Batch Measurements",
                "chart chr-quality Deviations over Max",
                "clear tbl-quality",
                "clear chr-quality",
            ]
        );
    }

    #[tokio::test]
    async fn test_blank_report_scores_as_absent() {
        let transport =
            Arc::new(MockTransport::default().respond(Category::Maintenance, 0, ok("   ")));
        let port = Arc::new(RecordingPort::default());
        let runner = runner(transport, port, 1);

        let outcome = runner.run_one(Category::Maintenance).await;
        let result = outcome.result.unwrap();
        assert_eq!(result.metric, Metric::Alerts(None));
        assert_eq!(result.note, "no report");

        let state = runner.snapshot();
        assert_eq!(state.panel(Category::Maintenance).status, CategoryStatus::Done);
        assert_eq!(state.panel(Category::Maintenance).pills, vec!["– alerts", "no report"]);
    }

    #[test]
    fn test_ingest_report_without_backend() {
        let transport = Arc::new(MockTransport::default());
        let port = Arc::new(RecordingPort::default());
        let runner = runner(transport.clone(), port, 1);

        let outcome = runner.ingest_report(Category::Eco, "Energy exceeded target");
        assert_eq!(outcome.result.unwrap().score_value(), Some(87));
        assert!(transport.events().is_empty());
    }

    #[tokio::test]
    async fn test_stale_failure_leaves_status_of_newer_run() {
        let transport = Arc::new(
            MockTransport::default()
                .respond(Category::Eco, 60, Err(AgentError::Backend("late".to_string())))
                .respond(Category::Eco, 5, ok("Full compliance")),
        );
        let port = Arc::new(RecordingPort::default());
        let runner = runner(transport, port, 2);

        let (first, second) =
            tokio::join!(runner.run_one(Category::Eco), runner.run_one(Category::Eco));

        assert!(first.result.is_err());
        assert_eq!(first.applied, Applied::Stale);
        assert!(second.result.is_ok());
        assert_eq!(runner.status(Category::Eco), CategoryStatus::Done);
        assert_eq!(runner.snapshot().panel(Category::Eco).output, "Full compliance");
    }
}
