// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The turn driver: one user input through the agentic loop to one final
//! assistant text.
//!
//! The loop layers several overlapping guards — intent budgets, loop
//! guards, policy gates, a step ceiling — and every one of them resolves
//! to either a textual result or a finalize sub-turn.  Only cancellation,
//! credentials, and unrecoverable transport failures surface as errors.

use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use piecode_config::Config;
use piecode_model::{
    Completion, CompletionRequest, Message, MessageContent, ProviderAdapter, RequestInput, Role,
};
use piecode_tools::{TodoStore, ToolContext, ToolDispatcher, ToolEvent, ToolInvocation, ToolResult};

use crate::action::{parse_action, Action};
use crate::error::CoreError;
use crate::events::{self, CoreEvent, Observer};
use crate::guards::{budget_exhausted, GuardState, GuardVerdict, TODO_UP_TO_DATE};
use crate::history::{CompactReport, History};
use crate::intent::classify_intent;
use crate::policy::TurnPolicy;
use crate::prompts::{self, PromptContext};
use crate::trajectory::{Trajectory, TurnRecord};

/// Read-only git subset enforced for diff-summary turns.
static READ_ONLY_GIT: once_cell::sync::Lazy<regex::Regex> = once_cell::sync::Lazy::new(|| {
    regex::Regex::new(r"^\s*git\s+(status|diff|log|show)\b").expect("static regex")
});

/// Options for an explicit history compaction.
#[derive(Debug, Clone, Default)]
pub struct CompactOptions {
    /// Messages preserved verbatim; defaults to the configured value.
    pub preserve_recent: Option<usize>,
}

/// Clonable handle for aborting the driver's active turn from another
/// task (a Ctrl-C handler, a UI thread).
#[derive(Clone, Default)]
pub struct AbortHandle {
    inner: Arc<StdMutex<Option<CancellationToken>>>,
}

impl AbortHandle {
    /// Abort the turn in flight.  Returns `true` iff a turn was active.
    /// Idempotent: repeated calls on the same turn stay `true` and have no
    /// further effect.
    pub fn request_abort(&self) -> bool {
        match &*self.inner.lock().unwrap() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn arm(&self, token: CancellationToken) {
        *self.inner.lock().unwrap() = Some(token);
    }

    fn disarm(&self) {
        *self.inner.lock().unwrap() = None;
    }
}

/// One piece of collected evidence: a tool invocation and what it returned.
#[derive(Debug, Clone)]
struct EvidenceItem {
    tool: String,
    /// The shell command, or a short argument summary for other tools.
    detail: String,
    output: String,
}

/// Mutable state of one running turn.
struct TurnState {
    policy: &'static TurnPolicy,
    tool_calls_used: u32,
    guards: GuardState,
    evidence: Vec<EvidenceItem>,
    /// History length at turn entry; evidence appended mid-turn stays in
    /// history even when the turn errors out.
    history_snapshot_index: usize,
}

impl TurnState {
    fn new(policy: &'static TurnPolicy, history_snapshot_index: usize) -> Self {
        Self {
            policy,
            tool_calls_used: 0,
            guards: GuardState::new(),
            evidence: Vec::new(),
            history_snapshot_index,
        }
    }
}

/// What one model step asks the driver to do next.
enum Step {
    Finish(String),
    Calls(Vec<ToolInvocation>),
    Continue,
    NoProgress,
}

pub struct TurnDriver {
    adapter: ProviderAdapter,
    dispatcher: ToolDispatcher,
    history: History,
    config: Arc<Config>,
    workspace_root: PathBuf,
    todos: TodoStore,
    tool_event_rx: mpsc::Receiver<ToolEvent>,
    observer: Observer,
    /// Abort handle of the active turn; disarmed while idle.
    abort: AbortHandle,
    /// Serialised events of the turn in flight, for the trajectory record.
    turn_events: StdMutex<Vec<Value>>,
    session_id: String,
    trajectory: Option<Trajectory>,
    project_instructions: Option<String>,
    skills: Vec<String>,
}

impl TurnDriver {
    pub fn new(
        adapter: ProviderAdapter,
        dispatcher: ToolDispatcher,
        config: Arc<Config>,
        workspace_root: PathBuf,
        todos: TodoStore,
        tool_event_rx: mpsc::Receiver<ToolEvent>,
    ) -> Self {
        let session_id = uuid::Uuid::new_v4().to_string();
        let trajectory = match Trajectory::new(&workspace_root, &session_id) {
            Ok(t) => Some(t),
            Err(e) => {
                warn!("trajectory persistence disabled: {e}");
                None
            }
        };
        Self {
            adapter,
            dispatcher,
            history: History::new(),
            config,
            workspace_root,
            todos,
            tool_event_rx,
            observer: Box::new(|_| {}),
            abort: AbortHandle::default(),
            turn_events: StdMutex::new(Vec::new()),
            session_id,
            trajectory,
            project_instructions: None,
            skills: Vec::new(),
        }
    }

    pub fn with_observer(mut self, observer: Observer) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_project_instructions(mut self, text: Option<String>) -> Self {
        self.project_instructions = text;
        self
    }

    pub fn with_skills(mut self, skills: Vec<String>) -> Self {
        self.skills = skills;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Clonable handle for aborting from another task.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Abort the turn in flight.  Returns `true` iff a turn was active.
    pub fn request_abort(&self) -> bool {
        self.abort.request_abort()
    }

    /// Empty the message log and reset the session todo state.
    pub async fn clear_history(&mut self) {
        self.history.clear();
        let mut todos = self.todos.lock().await;
        todos.items.clear();
        todos.last_payload = None;
    }

    /// Compact the message log, summarising everything but the most recent
    /// messages.
    pub async fn compact_history(
        &mut self,
        opts: CompactOptions,
    ) -> Result<CompactReport, CoreError> {
        let preserve = opts
            .preserve_recent
            .unwrap_or(self.config.agent.preserve_recent);
        self.emit(CoreEvent::ModelCall {
            stage: "compact".into(),
        });
        self.history
            .compact(&self.adapter, preserve, &CancellationToken::new())
            .await
    }

    /// Run one turn: classify, loop, finalize, persist.
    pub async fn run_turn(&mut self, input: &str) -> Result<String, CoreError> {
        let cancel = CancellationToken::new();
        self.abort.arm(cancel.clone());
        self.turn_events.lock().unwrap().clear();

        let started_at = Utc::now();
        let policy = classify_intent(input, self.history.last_assistant_text());
        debug!(intent = policy.name, "turn start");

        let result = self.turn_inner(input, policy, &cancel).await;

        self.abort.disarm();
        let status = match &result {
            Ok(_) => "ok".to_string(),
            Err(e) => e.code().to_string(),
        };
        let usage = self.adapter.last_usage();
        if let Some(trajectory) = &self.trajectory {
            trajectory.record_turn(&TurnRecord {
                id: uuid::Uuid::new_v4().to_string(),
                kind: policy.name.to_string(),
                input: input.to_string(),
                started_at,
                finished_at: Utc::now(),
                status: status.clone(),
                events: std::mem::take(&mut *self.turn_events.lock().unwrap()),
                logs: vec![format!(
                    "turn intent={} status={status} tokens_sent={} tokens_received={}",
                    policy.name, usage.input_tokens, usage.output_tokens
                )],
            });
        }
        result
    }

    async fn turn_inner(
        &mut self,
        input: &str,
        policy: &'static TurnPolicy,
        cancel: &CancellationToken,
    ) -> Result<String, CoreError> {
        let snapshot = self.history.len();
        self.history.push(Message::user(input));

        let plan = if self.plan_enabled() {
            self.make_plan(input, cancel).await
        } else {
            None
        };

        let native = self.adapter.supports_native_tools();
        let mut state = TurnState::new(policy, snapshot);
        debug!(
            intent = policy.name,
            native,
            history_snapshot_index = state.history_snapshot_index,
            "agentic loop start"
        );
        // Bounded even when the model never calls a tool (thought loops,
        // repeated gate refusals).
        let max_steps = policy.max_tool_calls * 2 + 6;

        for _step in 0..max_steps {
            if cancel.is_cancelled() {
                return Err(CoreError::TaskAborted);
            }

            let completion = self
                .call_model("loop", policy, cancel, native, true, plan.as_deref())
                .await?;

            let calls = match self.interpret(native, &completion, &state) {
                Step::Finish(text) => return Ok(text),
                Step::Continue => continue,
                Step::NoProgress => {
                    return self.finalize(&mut state, cancel, native, plan.as_deref()).await;
                }
                Step::Calls(calls) => calls,
            };

            for call in calls {
                let canonical = self
                    .dispatcher
                    .registry()
                    .canonical_name(&call.name)
                    .unwrap_or(call.name.as_str())
                    .to_string();

                // Loop guards, in their fixed priority order.
                let last_payload = self.todos.lock().await.last_payload.clone();
                match state.guards.check(
                    &canonical,
                    &call.args,
                    &self.workspace_root,
                    last_payload.as_deref(),
                ) {
                    GuardVerdict::TodoUpToDate => {
                        self.history.push(Message::assistant(TODO_UP_TO_DATE));
                        return Ok(TODO_UP_TO_DATE.to_string());
                    }
                    GuardVerdict::RepeatedStep { message } => {
                        self.history.push(Message::assistant(&message));
                        return Ok(message);
                    }
                    GuardVerdict::Proceed => {}
                }

                // Policy gates: disallowed calls become synthetic results
                // the model can read, and never execute.
                if let Some(refusal) = self.policy_gate(policy, &canonical, &call.args) {
                    self.append_synthetic_result(native, &call, &canonical, &refusal);
                    continue;
                }

                // Budget gate: exceeding the budget triggers exactly one
                // finalize sub-turn.
                if budget_exhausted(state.tool_calls_used, policy) {
                    return self.finalize(&mut state, cancel, native, plan.as_deref()).await;
                }

                let shell_command = shell_command_of(&canonical, &call.args);
                if native {
                    // Text mode already emitted ToolUse with the model's
                    // stated reason when the action was parsed.
                    self.emit(CoreEvent::ToolUse {
                        id: call.id.clone(),
                        tool: canonical.clone(),
                        args: call.args.clone(),
                        reason: String::new(),
                    });
                }
                self.emit(CoreEvent::ToolStart {
                    id: call.id.clone(),
                    tool: canonical.clone(),
                });

                let ctx = self.tool_context(cancel);
                let result = self.dispatcher.dispatch(&call, &ctx).await;
                self.drain_tool_events();

                self.emit(CoreEvent::ToolEnd {
                    id: call.id.clone(),
                    tool: canonical.clone(),
                    is_error: result.error.is_some(),
                    output: result.output_text.clone(),
                });

                state.guards.record(&canonical, &call.args, &self.workspace_root);
                state.evidence.push(EvidenceItem {
                    tool: canonical.clone(),
                    detail: shell_command
                        .clone()
                        .unwrap_or_else(|| compact_args(&call.args)),
                    output: result.output_text.clone(),
                });
                self.append_tool_result(native, &canonical, &result);
                state.tool_calls_used += 1;

                if let Some(re) = state.policy.finalize_on_tool_match {
                    if let Some(cmd) = &shell_command {
                        if re.is_match(cmd) {
                            return self
                                .finalize(&mut state, cancel, native, plan.as_deref())
                                .await;
                        }
                    }
                }
            }

            if policy.force_finalize_after_tool && state.tool_calls_used >= 1 {
                return self.finalize(&mut state, cancel, native, plan.as_deref()).await;
            }
        }

        // Step ceiling reached without a final message.
        self.finalize(&mut state, cancel, native, plan.as_deref()).await
    }

    /// Turn one completion into the next driver step.
    fn interpret(&mut self, native: bool, completion: &Completion, state: &TurnState) -> Step {
        if native {
            if completion.tool_calls.is_empty() {
                if completion.text.is_empty() && state.tool_calls_used > 0 {
                    // The provider stopped with neither content nor calls.
                    return Step::NoProgress;
                }
                self.history.push(Message::assistant(&completion.text));
                return Step::Finish(completion.text.clone());
            }
            // Assistant tool-call messages are pushed before any result so
            // the wire history stays well-formed.
            for tc in &completion.tool_calls {
                self.history.push(Message::tool_call(
                    &tc.id,
                    &tc.name,
                    tc.arguments.to_string(),
                ));
            }
            return Step::Calls(
                completion
                    .tool_calls
                    .iter()
                    .map(|tc| ToolInvocation::new(&tc.id, &tc.name, tc.arguments.clone()))
                    .collect(),
            );
        }

        match parse_action(&completion.text) {
            Action::Final { message } => {
                self.history.push(Message::assistant(&completion.text));
                Step::Finish(message)
            }
            Action::Thought { content } => {
                self.emit(CoreEvent::Thought { text: content });
                self.emit(CoreEvent::ThinkingDone);
                self.history.push(Message::assistant(&completion.text));
                Step::Continue
            }
            Action::ToolUse {
                tool,
                input,
                reason,
                thought,
            } => {
                if let Some(t) = thought {
                    self.emit(CoreEvent::Thought { text: t });
                    self.emit(CoreEvent::ThinkingDone);
                }
                self.history.push(Message::assistant(&completion.text));
                let id = format!("tc-{}", state.tool_calls_used + 1);
                let call = ToolInvocation::new(id, tool, input);
                // Text mode carries the reason beside the call; surface it
                // through the same ToolUse event native mode gets.
                self.emit(CoreEvent::ToolUse {
                    id: call.id.clone(),
                    tool: call.name.clone(),
                    args: call.args.clone(),
                    reason,
                });
                Step::Calls(vec![call])
            }
        }
    }

    /// Policy gates for one pending call.  `Some(text)` means the call is
    /// replaced by a synthetic result and must not execute.
    fn policy_gate(
        &self,
        policy: &TurnPolicy,
        canonical: &str,
        args: &Value,
    ) -> Option<String> {
        if policy.disable_todos && canonical == "todo_write" {
            return Some("todo_write is disabled for this turn; answer directly.".into());
        }
        if !policy.allowed_tools.permits(canonical) {
            return Some(format!(
                "Tool {canonical} not allowed in this turn; use {}.",
                policy.allowed_tools.describe()
            ));
        }
        if policy.shell_read_only_git && canonical == "shell" {
            let command = args.get("command").and_then(Value::as_str).unwrap_or("");
            if !READ_ONLY_GIT.is_match(command) {
                return Some(
                    "Only read-only git commands (git status, git diff, git log, \
                     git show) are allowed in this turn."
                        .into(),
                );
            }
        }
        None
    }

    /// One provider call against the current history.
    async fn call_model(
        &self,
        stage: &str,
        policy: &TurnPolicy,
        cancel: &CancellationToken,
        native: bool,
        with_tools: bool,
        plan: Option<&str>,
    ) -> Result<Completion, CoreError> {
        let req = self.build_request(policy, native, with_tools, plan);
        self.complete_with_retry(stage, req, cancel).await
    }

    /// Drive one request to completion with the retry policy: `Transport`
    /// errors retry once with jitter; everything else is fatal to the turn.
    async fn complete_with_retry(
        &self,
        stage: &str,
        req: CompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<Completion, CoreError> {
        self.emit(CoreEvent::ModelCall {
            stage: stage.into(),
        });
        self.emit(CoreEvent::LlmRequest {
            stage: stage.into(),
            payload: request_payload(&req),
        });

        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let mut on_delta = |delta: &str| {
                self.emit(CoreEvent::LlmResponseDelta {
                    text: delta.to_string(),
                });
            };
            match self.adapter.complete(req.clone(), cancel, &mut on_delta).await {
                Ok(completion) => {
                    self.emit(CoreEvent::LlmResponse {
                        stage: stage.into(),
                        payload: json!({
                            "text_chars": completion.text.len(),
                            "tool_calls": completion
                                .tool_calls
                                .iter()
                                .map(|tc| tc.name.clone())
                                .collect::<Vec<_>>(),
                            "finish_reason": completion.finish_reason,
                            "usage": self.adapter.last_usage(),
                        }),
                    });
                    return Ok(completion);
                }
                Err(e) if e.is_retryable() && attempts == 1 => {
                    let jitter = Duration::from_millis(rand::thread_rng().gen_range(50..250));
                    warn!("transport error, retrying after {jitter:?}: {e}");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(CoreError::TaskAborted),
                        _ = tokio::time::sleep(jitter) => {}
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn build_request(
        &self,
        policy: &TurnPolicy,
        native: bool,
        with_tools: bool,
        plan: Option<&str>,
    ) -> CompletionRequest {
        let tool_names: Vec<String> = if with_tools {
            self.dispatcher
                .registry()
                .schemas()
                .iter()
                .map(|s| s.name.clone())
                .filter(|n| policy.allowed_tools.permits(n))
                .filter(|n| !(policy.disable_todos && n == "todo_write"))
                .collect()
        } else {
            Vec::new()
        };

        let system_prompt = prompts::system_prompt(&PromptContext {
            workspace_root: Some(&self.workspace_root),
            project_instructions: self.project_instructions.as_deref(),
            skills: &self.skills,
            policy_note: policy.note,
            plan,
            text_mode: !native,
            tool_names: &tool_names,
        });

        let input = if native {
            let tools = self
                .dispatcher
                .registry()
                .schemas()
                .into_iter()
                .filter(|s| tool_names.contains(&s.name))
                .map(|s| piecode_model::ToolSchema {
                    name: s.name,
                    description: s.description,
                    parameters: s.parameters,
                })
                .collect();
            RequestInput::Messages {
                messages: self.history.messages().to_vec(),
                tools,
            }
        } else {
            RequestInput::Prompt(prompts::render_transcript(self.history.messages()))
        };

        CompletionRequest {
            system_prompt,
            input,
        }
    }

    /// The finalize sub-turn: one tool-free provider call that synthesises
    /// the answer from collected evidence.  A model that still refuses to
    /// produce text gets its answer synthesised deterministically.
    async fn finalize(
        &mut self,
        state: &mut TurnState,
        cancel: &CancellationToken,
        native: bool,
        plan: Option<&str>,
    ) -> Result<String, CoreError> {
        let evidence: Vec<(String, String)> = state
            .evidence
            .iter()
            .map(|e| (format!("{}: {}", e.tool, e.detail), e.output.clone()))
            .collect();
        let prompt = prompts::finalize_prompt(&evidence, state.policy.require_commit_message);

        let completion = if native {
            self.history.push(Message::user(&prompt));
            self.call_model("finalize", state.policy, cancel, true, false, plan)
                .await?
        } else {
            // Text mode sends the finalize prompt standalone; the evidence
            // block already carries everything the model needs.
            let req = CompletionRequest {
                system_prompt: prompts::system_prompt(&PromptContext {
                    workspace_root: Some(&self.workspace_root),
                    policy_note: state.policy.note,
                    ..Default::default()
                }),
                input: RequestInput::Prompt(prompt),
            };
            self.complete_with_retry("finalize", req, cancel).await?
        };

        let answer = if native {
            if completion.tool_calls.is_empty() && !completion.text.is_empty() {
                completion.text
            } else {
                self.synthesize_from_evidence(state)
            }
        } else {
            match parse_action(&completion.text) {
                Action::Final { message } if !message.is_empty() => message,
                // The model ignored "do not call tools": answer from the
                // evidence instead of looping.
                _ => self.synthesize_from_evidence(state),
            }
        };

        self.history.push(Message::assistant(&answer));
        Ok(answer)
    }

    /// Deterministic fallback answer derived from the evidence log.
    fn synthesize_from_evidence(&self, state: &TurnState) -> String {
        if state.evidence.is_empty() {
            return "No evidence was collected this turn.".to_string();
        }
        let mut lines: Vec<String> = state
            .evidence
            .iter()
            .map(|e| {
                if e.tool == "shell" {
                    format!("Ran `{}`.", e.detail)
                } else {
                    format!("Ran {}.", e.tool)
                }
            })
            .collect();
        if let Some(last) = state.evidence.last() {
            lines.push(String::new());
            lines.push(head_chars(&last.output, 600));
        }
        if state.policy.require_commit_message {
            lines.push(String::new());
            lines.push("Suggested commit message: summarise the changes above".to_string());
        }
        lines.join("\n")
    }

    /// Env-gated plan step; failures degrade to "no plan".
    fn plan_enabled(&self) -> bool {
        self.config.agent.plan_mode
            || std::env::var("PIECODE_PLAN").map(|v| v == "1").unwrap_or(false)
    }

    async fn make_plan(&self, input: &str, cancel: &CancellationToken) -> Option<String> {
        self.emit(CoreEvent::PlanningCall);
        let req = CompletionRequest {
            system_prompt: "You are a planning assistant. Reply with a plan of at \
                            most four short steps, one per line."
                .into(),
            input: RequestInput::Prompt(format!("Task: {input}")),
        };
        match self.adapter.complete(req, cancel, &mut |_| {}).await {
            Ok(completion) if !completion.text.is_empty() => {
                self.emit(CoreEvent::Plan {
                    text: completion.text.clone(),
                });
                Some(completion.text)
            }
            Ok(_) => None,
            Err(e) => {
                warn!("planning call failed, continuing without a plan: {e}");
                None
            }
        }
    }

    fn tool_context(&self, cancel: &CancellationToken) -> ToolContext {
        ToolContext {
            workspace_root: self.workspace_root.clone(),
            cancel: cancel.clone(),
            shell_timeout_secs: self.config.tools.shell_timeout_secs,
            shell_timeout_max_secs: self.config.tools.shell_timeout_max_secs,
            test_command: self.config.tools.test_command.clone(),
        }
    }

    /// Append an executed tool's result in the turn's envelope convention.
    fn append_tool_result(&mut self, native: bool, canonical: &str, result: &ToolResult) {
        if native {
            self.history.push(Message::tool_result(
                &result.tool_call_id,
                &result.output_text,
            ));
        } else {
            let blob = json!({
                "type": "tool_result",
                "tool": canonical,
                "result": result.output_text,
            })
            .to_string();
            self.history.push(Message {
                role: Role::User,
                content: MessageContent::Text(blob),
            });
        }
    }

    /// Append a gate refusal as if it were a tool result, so the model can
    /// read it and correct itself.
    fn append_synthetic_result(
        &mut self,
        native: bool,
        call: &ToolInvocation,
        canonical: &str,
        message: &str,
    ) {
        debug!(tool = canonical, "policy gate refused tool call");
        let result = ToolResult {
            tool_call_id: call.id.clone(),
            tool_name: canonical.to_string(),
            output_text: message.to_string(),
            error: Some(message.to_string()),
            truncated_to_file: None,
        };
        self.append_tool_result(native, canonical, &result);
    }

    fn drain_tool_events(&mut self) {
        while let Ok(event) = self.tool_event_rx.try_recv() {
            match event {
                ToolEvent::TodoUpdate(items) => {
                    self.emit(CoreEvent::TodoUpdate { items });
                }
            }
        }
    }

    fn emit(&self, event: CoreEvent) {
        if let Ok(v) = serde_json::to_value(&event) {
            self.turn_events.lock().unwrap().push(v);
        }
        events::emit(&self.observer, event);
    }
}

fn shell_command_of(canonical: &str, args: &Value) -> Option<String> {
    if canonical != "shell" {
        return None;
    }
    args.get("command")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Short argument rendering for evidence labels.
fn compact_args(args: &Value) -> String {
    let text = args.to_string();
    head_chars(&text, 120)
}

fn head_chars(s: &str, n: usize) -> String {
    if s.len() <= n {
        return s.to_string();
    }
    let mut cut = n;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…", &s[..cut])
}

fn request_payload(req: &CompletionRequest) -> Value {
    match &req.input {
        RequestInput::Prompt(p) => json!({
            "mode": "text",
            "system_chars": req.system_prompt.len(),
            "prompt_chars": p.len(),
        }),
        RequestInput::Messages { messages, tools } => json!({
            "mode": "native",
            "system_chars": req.system_prompt.len(),
            "messages": messages.len(),
            "tools": tools.iter().map(|t| t.name.clone()).collect::<Vec<_>>(),
        }),
    }
}
