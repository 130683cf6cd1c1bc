//! The cycle orchestrator.
//!
//! One cycle runs SCAFFOLD → PLAN → EXECUTE → (SYNTHESIZE) → REFLECT and
//! hands back a journal entry. The body runs as its own task so that an
//! error, a panic or a user interrupt can all be caught here; whichever way
//! the cycle ends, exactly one journal entry is written for it.

use crate::agent::context::{build_scaffold, SessionState};
use crate::agent::planner::{PlanError, Planner};
use crate::agent::reflector::Reflector;
use crate::agent::synthesizer::Synthesizer;
use crate::agent::system_prompt;
use crate::agent::OracleHandle;
use crate::config::AuraConfig;
use crate::error::ERROR_MARKER;
use crate::oracle::{HttpOracle, Oracle};
use crate::sandbox::Sandbox;
use crate::tools::{parse_direct_invocation, render_catalog, ToolName, ToolRegistry, ToolResult};
use crate::types::{ActionDecision, CycleStatus, Directive, Reflection};
use crate::vault::journal::{truncate_chars, JournalEntry};
use crate::vault::{EntryId, Vault};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Characters of the previous entry handed to the reflector.
const PREVIOUS_ENTRY_CHARS: usize = 4_000;

/// Characters of unparseable planner output kept in the journal.
const RAW_OUTPUT_CHARS: usize = 1_000;

/// What the caller asks of one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleRequest {
    pub command: Option<String>,
    /// A decision that bypasses the planner.
    pub direct: Option<ActionDecision>,
}

impl CycleRequest {
    pub fn background() -> Self {
        Self::default()
    }

    pub fn command(text: impl Into<String>) -> Self {
        Self {
            command: Some(text.into()),
            direct: None,
        }
    }

    /// Interpret one line of user input: empty runs a background cycle,
    /// `<tool> {json}` goes straight to the executor.
    pub fn from_input(input: &str, registry: &ToolRegistry) -> Self {
        let input = input.trim();
        if input.is_empty() {
            return Self::background();
        }
        Self {
            command: Some(input.to_string()),
            direct: parse_direct_invocation(input, registry),
        }
    }
}

/// What the caller learns about a finished cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: String,
    /// `None` only if the journal itself could not be written.
    pub entry_id: Option<EntryId>,
    pub status: CycleStatus,
    pub final_answer: Option<String>,
    pub reflection: Option<Reflection>,
}

/// Events recorded into an entry's full trace.
struct Trace {
    started: Instant,
    events: Vec<Value>,
}

impl Trace {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            events: Vec::new(),
        }
    }

    fn push(&mut self, stage: &str, detail: Value) {
        self.events.push(json!({
            "stage": stage,
            "elapsed_ms": self.started.elapsed().as_millis() as u64,
            "detail": detail,
        }));
    }

    fn into_json(self) -> Value {
        json!({ "events": self.events })
    }
}

pub struct Orchestrator {
    config: AuraConfig,
    vault: Arc<Vault>,
    registry: ToolRegistry,
    planner: Planner,
    synthesizer: Synthesizer,
    reflector: Reflector,
    planner_system: String,
    synthesizer_system: String,
    reflector_system: String,
}

impl Orchestrator {
    pub fn new(
        config: AuraConfig,
        vault: Arc<Vault>,
        registry: ToolRegistry,
        oracle: Arc<dyn Oracle>,
    ) -> Self {
        let oc = &config.oracle;
        let planner = Planner::new(OracleHandle::new(oracle.clone(), &oc.planner_model, oc));
        let synthesizer =
            Synthesizer::new(OracleHandle::new(oracle.clone(), &oc.synthesizer_model, oc));
        let reflector = Reflector::new(OracleHandle::new(oracle, &oc.reflector_model, oc));

        let catalog = render_catalog(&registry.definitions());
        Self {
            planner_system: system_prompt::planner_system_prompt(&config.name, &catalog),
            synthesizer_system: system_prompt::synthesizer_system_prompt(&config.name),
            reflector_system: system_prompt::reflector_system_prompt(&config.name),
            config,
            vault,
            registry,
            planner,
            synthesizer,
            reflector,
        }
    }

    /// Wire the sandbox, vault, registry and HTTP oracle from config.
    pub fn from_config(config: AuraConfig) -> Result<Self> {
        let sandbox = Arc::new(Sandbox::from_config(&config)?);
        let vault = Arc::new(Vault::new(sandbox, &config.journal));
        let registry = ToolRegistry::new(vault.clone(), config.search.clone());
        let oracle: Arc<dyn Oracle> = Arc::new(HttpOracle::from_config(&config.oracle)?);
        Ok(Self::new(config, vault, registry, oracle))
    }

    pub fn vault(&self) -> &Arc<Vault> {
        &self.vault
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run one cycle to completion and journal it.
    ///
    /// Never fails: errors, panics and cancellation become a
    /// CRITICAL FAILURE entry.
    pub async fn run_cycle(
        self: &Arc<Self>,
        request: CycleRequest,
        cancel: &CancellationToken,
    ) -> CycleReport {
        let cycle_id = ulid::Ulid::new().to_string();
        let started = Utc::now();
        info!("Cycle {} starting", cycle_id);

        let this = Arc::clone(self);
        let body_id = cycle_id.clone();
        let body_request = request.clone();
        let mut handle =
            tokio::spawn(async move { this.cycle_body(body_id, started, body_request).await });

        let outcome = tokio::select! {
            biased;
            joined = &mut handle => match joined {
                Ok(Ok(entry)) => Ok(entry),
                Ok(Err(e)) => Err(format!("{:#}", e)),
                Err(e) => Err(describe_join_error(e)),
            },
            _ = cancel.cancelled() => {
                handle.abort();
                // Let the aborted task unwind before anything else touches the vault.
                let _ = handle.await;
                Err("cycle cancelled by user interrupt".to_string())
            }
        };

        let entry = outcome.unwrap_or_else(|description| {
            error!("Cycle {} failed critically: {}", cycle_id, description);
            critical_entry(&cycle_id, started, request.command, &description)
        });
        self.record(entry)
    }

    fn record(&self, entry: JournalEntry) -> CycleReport {
        let entry_id = match self.vault.journal().append(&entry.title(), &entry.render()) {
            Ok(id) => Some(id),
            Err(e) => {
                error!("Failed to journal cycle {}: {:#}", entry.cycle_id, e);
                None
            }
        };
        info!("Cycle {} finished: {}", entry.cycle_id, entry.status);
        CycleReport {
            cycle_id: entry.cycle_id,
            entry_id,
            status: entry.status,
            final_answer: entry.final_answer,
            reflection: entry.reflection,
        }
    }

    async fn cycle_body(
        self: Arc<Self>,
        cycle_id: String,
        started: DateTime<Utc>,
        request: CycleRequest,
    ) -> Result<JournalEntry> {
        let mut trace = Trace::new();

        // -- SCAFFOLD ----------------------------------------------------------
        let state = SessionState::gather(&self.vault, request.command.as_deref())?;
        let directive = state.directive();
        let previous_entry = self
            .vault
            .journal()
            .latest(true)?
            .map(|text| truncate_chars(&text, PREVIOUS_ENTRY_CHARS));
        info!("Cycle {} directive: {}", cycle_id, directive);
        trace.push("scaffold", json!({ "directive": directive }));

        let mut entry = JournalEntry {
            cycle_id,
            timestamp: started,
            command: state.user_command.clone(),
            directive: directive.to_string(),
            status: CycleStatus::Success,
            action: None,
            result: None,
            final_answer: None,
            reflection: None,
            error: None,
            trace: None,
        };

        // -- PLAN --------------------------------------------------------------
        let decision = match request.direct {
            Some(decision) => {
                trace.push("plan", json!({ "direct": true, "tool": decision.tool_name }));
                decision
            }
            None => {
                let scaffold = build_scaffold(&state, &directive);
                match self.planner.plan(&self.planner_system, &scaffold).await {
                    Ok(decision) => {
                        trace.push("plan", json!({ "tool": decision.tool_name }));
                        decision
                    }
                    Err(e) => return Ok(self.planning_failed(entry, trace, e)),
                }
            }
        };
        entry.action = Some(decision.clone());

        // -- EXECUTE -----------------------------------------------------------
        let result = match self.registry.validate(&decision) {
            Ok(call) => self.registry.invoke(call).await,
            Err(e) => {
                warn!("Decision rejected before execution: {}", e);
                ToolResult::failed(decision.tool_name.clone(), e)
            }
        };
        let rendered = result.render();
        trace.push(
            "execute",
            json!({
                "tool": result.tool,
                "success": result.is_success(),
                "error_kind": result.error_kind(),
                "result_chars": rendered.len(),
            }),
        );
        entry.status = if result.is_success() {
            CycleStatus::Success
        } else {
            CycleStatus::ToolError
        };

        // -- SYNTHESIZE --------------------------------------------------------
        if entry.command.is_some() {
            let answer = self
                .answer_for_user(&directive, &decision, &result, &rendered, &mut trace)
                .await;
            entry.final_answer = Some(answer);
        }
        entry.result = Some(rendered);

        // -- REFLECT -----------------------------------------------------------
        let reflection = match self
            .reflector
            .reflect(
                &self.reflector_system,
                previous_entry.as_deref(),
                &entry.render(),
            )
            .await
        {
            Ok(reflection) => {
                trace.push("reflect", json!({ "score": reflection.value_score }));
                reflection
            }
            Err(e) => {
                warn!("Reflection failed, recording a routine reflection: {}", e);
                trace.push("reflect", json!({ "fallback": e.to_string() }));
                Reflection::routine(format!(
                    "Ran {} with status {}; no reflection was available.",
                    decision.tool_name, entry.status
                ))
            }
        };

        // -- TASK UPDATE -------------------------------------------------------
        if self.config.accept_proposed_tasks && !reflection.proposed().is_empty() {
            match self.vault.tasks().append_todos(reflection.proposed()) {
                Ok(added) => {
                    info!("Queued {} proposed tasks", added.len());
                    trace.push(
                        "task_update",
                        json!({ "added": added.iter().map(|t| &t.id).collect::<Vec<_>>() }),
                    );
                }
                Err(e) => warn!("Failed to queue proposed tasks: {:#}", e),
            }
        }

        entry.reflection = Some(reflection);
        entry.trace = Some(trace.into_json());
        Ok(entry)
    }

    /// The answer shown to a user who issued a command.
    async fn answer_for_user(
        &self,
        directive: &Directive,
        decision: &ActionDecision,
        result: &ToolResult,
        rendered: &str,
        trace: &mut Trace,
    ) -> String {
        let answers = self
            .registry
            .lookup(&decision.tool_name)
            .is_some_and(ToolName::answers_user);
        if !result.is_success() || !answers {
            return rendered.to_string();
        }

        match self
            .synthesizer
            .synthesize(&self.synthesizer_system, directive, &result.tool, rendered)
            .await
        {
            Ok(answer) => {
                trace.push("synthesize", json!({ "chars": answer.len() }));
                answer
            }
            Err(e) => {
                warn!("Synthesis failed, answering with the raw result: {}", e);
                trace.push("synthesize", json!({ "fallback": e.to_string() }));
                rendered.to_string()
            }
        }
    }

    /// Close out a cycle whose planning step produced no decision. The
    /// executor is never reached.
    fn planning_failed(
        &self,
        mut entry: JournalEntry,
        mut trace: Trace,
        e: PlanError,
    ) -> JournalEntry {
        let (status, detail) = match &e {
            PlanError::Malformed { reason, raw } => (
                CycleStatus::PlannerMalfunction,
                format!(
                    "{}\nRaw planner output:\n{}",
                    reason,
                    truncate_chars(raw, RAW_OUTPUT_CHARS)
                ),
            ),
            PlanError::Oracle(oracle) => (CycleStatus::OracleFailure, oracle.to_string()),
        };
        warn!("Cycle {} ended at planning: {}", entry.cycle_id, status);
        trace.push("plan", json!({ "failure": status.to_string() }));

        if entry.command.is_some() {
            entry.final_answer = Some(format!(
                "{} {}: could not decide on an action ({}).",
                ERROR_MARKER, status, e
            ));
        }
        entry.status = status;
        entry.error = Some(format!("{}: {}", status, detail));
        entry.reflection = Some(Reflection::routine(format!(
            "{}: no action was taken this cycle.",
            status
        )));
        entry.trace = Some(trace.into_json());
        entry
    }
}

fn critical_entry(
    cycle_id: &str,
    started: DateTime<Utc>,
    command: Option<String>,
    description: &str,
) -> JournalEntry {
    let final_answer = command.as_ref().map(|_| {
        format!(
            "{} the cycle failed unexpectedly: {}",
            ERROR_MARKER, description
        )
    });
    JournalEntry {
        cycle_id: cycle_id.to_string(),
        timestamp: started,
        command,
        directive: "unknown (cycle aborted)".into(),
        status: CycleStatus::CriticalFailure,
        action: None,
        result: None,
        final_answer,
        reflection: None,
        error: Some(description.to_string()),
        trace: None,
    }
}

fn describe_join_error(e: JoinError) -> String {
    if e.is_cancelled() {
        return "cycle task was cancelled".into();
    }
    match e.try_into_panic() {
        Ok(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".into());
            format!("cycle panicked: {}", message)
        }
        Err(e) => e.to_string(),
    }
}
