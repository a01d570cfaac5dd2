//! The stream loop: one generation cycle at a time, strictly sequenced output.

use std::sync::Arc;
use std::time::Duration;

use livecast_store::{ChunkStore, InterruptQueue};
use livecast_types::{
    AudioChunk, AudioKind, CoordinatorState, DegradeReason, InterruptEvent, InterruptStatus,
    ScriptSegment, StreamEvent, SynthesizedAudio,
};
use livecast_voice::{
    parse_script_line, AudioSynthesizer, PersonaRegistry, ScriptGenerator, VoiceError,
};
use serde::Serialize;
use tokio::sync::{broadcast, watch};

use crate::filler::FillerLines;
use crate::history::NarrationHistory;

/// Static settings for one stream session.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub session_id: String,
    pub default_persona: String,
    pub history_limit: usize,
    /// Pause between cycles.
    pub cycle_interval: Duration,
    /// `[Speaker] text` lines that seed the narration history.
    pub opening_context: Vec<String>,
    pub filler_lines: Vec<String>,
}

/// Collaborators the coordinator drives.
#[derive(Clone)]
pub struct CoordinatorDeps {
    pub queue: InterruptQueue,
    pub chunks: ChunkStore,
    pub script: Arc<dyn ScriptGenerator>,
    pub synth: Arc<dyn AudioSynthesizer>,
    pub personas: Arc<PersonaRegistry>,
    pub events: broadcast::Sender<StreamEvent>,
}

/// Read-only view of the loop for observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoordinatorStatus {
    pub state: CoordinatorState,
    pub session_id: String,
    pub next_sequence: u64,
    pub cycles_completed: u64,
    pub chunks_published: u64,
    pub degraded_cycles: u64,
}

/// How a single cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Published { sequence_no: u64 },
    /// Synthesis failed; nothing was published.
    AudioFailed,
    /// The chunk store rejected the append; the sequence number was not used.
    PublishFailed,
}

#[derive(Clone)]
struct Reporter {
    status: Arc<watch::Sender<CoordinatorStatus>>,
    events: broadcast::Sender<StreamEvent>,
}

impl Reporter {
    /// Once draining, only the move to `STOPPED` is accepted.
    fn set_state(&self, state: CoordinatorState) {
        let changed = self.status.send_if_modified(|status| {
            let locked = match status.state {
                CoordinatorState::Stopped => true,
                CoordinatorState::Draining => state != CoordinatorState::Stopped,
                _ => false,
            };
            if locked || status.state == state {
                return false;
            }
            status.state = state;
            true
        });
        if changed {
            tracing::debug!(state = %state, "coordinator state changed");
            self.emit(StreamEvent::StateChanged { state });
        }
    }

    fn emit(&self, event: StreamEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn update(&self, f: impl FnOnce(&mut CoordinatorStatus)) {
        self.status.send_modify(f);
    }
}

/// Owns the narration history and the sequence counter; nothing else
/// writes either.
pub struct Coordinator {
    deps: CoordinatorDeps,
    reporter: Reporter,
    history: NarrationHistory,
    filler: FillerLines,
    session_id: String,
    default_persona: String,
    cycle_interval: Duration,
    next_sequence: u64,
}

impl Coordinator {
    pub fn new(deps: CoordinatorDeps, config: CoordinatorConfig) -> Self {
        let history = NarrationHistory::seeded(
            config.history_limit,
            config
                .opening_context
                .iter()
                .filter_map(|line| parse_script_line(line, &config.default_persona)),
        );

        let (status, _) = watch::channel(CoordinatorStatus {
            state: CoordinatorState::Idle,
            session_id: config.session_id.clone(),
            next_sequence: 1,
            cycles_completed: 0,
            chunks_published: 0,
            degraded_cycles: 0,
        });

        Self {
            reporter: Reporter {
                status: Arc::new(status),
                events: deps.events.clone(),
            },
            deps,
            history,
            filler: FillerLines::new(config.filler_lines),
            session_id: config.session_id,
            default_persona: config.default_persona,
            cycle_interval: config.cycle_interval,
            next_sequence: 1,
        }
    }

    pub fn status(&self) -> watch::Receiver<CoordinatorStatus> {
        self.reporter.status.subscribe()
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Runs cycles until `shutdown` turns true (or its sender is dropped).
    ///
    /// A shutdown that arrives mid-cycle moves the loop to `DRAINING`; the
    /// cycle still runs to completion, then the loop reports `STOPPED`.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> CoordinatorStatus {
        match self.deps.queue.recover_in_service().await {
            Ok(0) => {}
            Ok(n) => tracing::warn!(
                count = n,
                "interrupts stranded in service by a previous run marked degraded"
            ),
            Err(e) => tracing::warn!(error = %e, "could not recover stranded interrupts"),
        }

        tracing::info!(session_id = %self.session_id, "stream loop started");
        let reporter = self.reporter.clone();

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            {
                let cycle = self.run_cycle();
                tokio::pin!(cycle);
                tokio::select! {
                    _ = &mut cycle => {}
                    _ = shutdown_requested(&mut shutdown) => {
                        tracing::info!("shutdown requested, finishing in-flight cycle");
                        reporter.set_state(CoordinatorState::Draining);
                        cycle.await;
                        break;
                    }
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.cycle_interval) => {}
                _ = shutdown_requested(&mut shutdown) => break,
            }
        }

        reporter.set_state(CoordinatorState::Draining);
        reporter.set_state(CoordinatorState::Stopped);
        let status = reporter.status.borrow().clone();
        tracing::info!(
            session_id = %self.session_id,
            cycles = status.cycles_completed,
            chunks = status.chunks_published,
            "stream loop stopped"
        );
        status
    }

    /// Runs one SELECTING → GENERATING_SCRIPT → GENERATING_AUDIO → PUBLISHING pass.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let reporter = self.reporter.clone();

        reporter.set_state(CoordinatorState::Selecting);
        let trigger = match self.deps.queue.try_dequeue_next().await {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "interrupt queue unavailable, continuing narration");
                reporter.emit(StreamEvent::StoreUnavailable {
                    operation: "dequeue".into(),
                });
                None
            }
        };
        if let Some(ref event) = trigger {
            tracing::info!(
                interrupt_id = %event.id,
                kind = %event.kind,
                persona = %event.persona,
                "servicing interrupt"
            );
        }

        reporter.set_state(CoordinatorState::GeneratingScript);
        let mut degraded = false;
        let generated = self
            .deps
            .script
            .generate(self.history.context(), trigger.as_ref())
            .await;
        let segment = match generated {
            Ok(segment) => {
                self.history.push(segment.clone());
                segment
            }
            Err(e) => {
                degraded = true;
                self.report_generation_failure(&e, DegradeReason::ScriptFallback, trigger.as_ref());
                self.filler.segment(trigger.as_ref(), &self.default_persona)
            }
        };

        reporter.set_state(CoordinatorState::GeneratingAudio);
        let synthesized = match self.deps.personas.resolve(&segment.persona) {
            Ok(persona) => self.deps.synth.synthesize(&segment, &persona).await,
            Err(e) => Err(e),
        };
        let audio = match synthesized {
            Ok(audio) => audio,
            Err(e) => {
                self.report_generation_failure(&e, DegradeReason::AudioFailed, trigger.as_ref());
                self.finish_interrupt(trigger.as_ref(), InterruptStatus::Degraded).await;
                self.finish_cycle(true);
                return CycleOutcome::AudioFailed;
            }
        };

        reporter.set_state(CoordinatorState::Publishing);
        let outcome = self.publish(segment, trigger.as_ref(), audio).await;
        let status = match outcome {
            CycleOutcome::Published { .. } if !degraded => InterruptStatus::Serviced,
            _ => InterruptStatus::Degraded,
        };
        self.finish_interrupt(trigger.as_ref(), status).await;
        self.finish_cycle(degraded || outcome == CycleOutcome::PublishFailed);
        outcome
    }

    async fn publish(
        &mut self,
        mut segment: ScriptSegment,
        trigger: Option<&InterruptEvent>,
        audio: SynthesizedAudio,
    ) -> CycleOutcome {
        let sequence_no = self.next_sequence;
        segment.sequence_no = Some(sequence_no);
        let kind = AudioKind::from(trigger.map(|t| t.kind));
        let chunk = AudioChunk::sequenced(&self.session_id, sequence_no, &segment, kind, audio);
        let meta = chunk.meta();

        match self.deps.chunks.append(chunk).await {
            Ok(()) => {
                self.next_sequence += 1;
                let next = self.next_sequence;
                self.reporter.update(|s| {
                    s.next_sequence = next;
                    s.chunks_published += 1;
                });
                tracing::info!(
                    sequence_no,
                    persona = %meta.persona,
                    kind = meta.kind.as_str(),
                    bytes = meta.byte_len,
                    "chunk published"
                );
                self.reporter.emit(StreamEvent::ChunkPublished { chunk: meta });
                CycleOutcome::Published { sequence_no }
            }
            Err(e) => {
                tracing::warn!(
                    sequence_no,
                    error = %e,
                    "chunk append failed, sequence number not consumed"
                );
                self.reporter.emit(StreamEvent::StoreUnavailable {
                    operation: "append_chunk".into(),
                });
                CycleOutcome::PublishFailed
            }
        }
    }

    fn report_generation_failure(
        &self,
        error: &VoiceError,
        reason: DegradeReason,
        trigger: Option<&InterruptEvent>,
    ) {
        tracing::warn!(error = %error, reason = ?reason, "generation failed, degrading cycle");
        if error.is_credential_exhaustion() {
            self.reporter.emit(StreamEvent::CredentialsExhausted);
        }
        self.reporter.emit(StreamEvent::CycleDegraded {
            reason,
            interrupt_id: trigger.map(|t| t.id.clone()),
        });
    }

    async fn finish_interrupt(&self, trigger: Option<&InterruptEvent>, status: InterruptStatus) {
        let Some(event) = trigger else {
            return;
        };
        match self.deps.queue.mark(&event.id, status).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(
                interrupt_id = %event.id,
                "interrupt was not in service when finishing"
            ),
            Err(e) => {
                tracing::warn!(
                    interrupt_id = %event.id,
                    error = %e,
                    "could not record interrupt outcome"
                );
                self.reporter.emit(StreamEvent::StoreUnavailable {
                    operation: "mark_interrupt".into(),
                });
            }
        }
    }

    fn finish_cycle(&self, degraded: bool) {
        self.reporter.update(|s| {
            s.cycles_completed += 1;
            if degraded {
                s.degraded_cycles += 1;
            }
        });
        self.reporter.set_state(CoordinatorState::Selecting);
    }
}

/// Resolves once shutdown is requested or its sender is gone.
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}
