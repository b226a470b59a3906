//! Demo Fault/Scenario Driver (spec.md §4.12): controllable fault injection
//! plus a scenario runner that drives the full pipeline and compares the
//! observed terminal decision to an expected one. Grounded in shape on the
//! scenario-step/assertion pattern of
//! `examples/ConaryLabs-Mira/backend/src/session/manager.rs`'s session
//! lifecycle driving, adapted to this system's signal-bus-observed terminal
//! stages rather than direct return-value assertions.

use crate::signal_bus::{BroadcastSignalBus, Signal};
use conduit_core::external::SignalSink;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    MessageQueueFlood,
    LeakingWorker,
    CrashingSupervisor,
}

impl FaultKind {
    fn as_str(&self) -> &'static str {
        match self {
            FaultKind::MessageQueueFlood => "message_queue_flood",
            FaultKind::LeakingWorker => "leaking_worker",
            FaultKind::CrashingSupervisor => "crashing_supervisor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    SuccessfulHeal,
    RejectedFix,
    SecondSuccess,
}

impl Scenario {
    fn as_str(&self) -> &'static str {
        match self {
            Scenario::SuccessfulHeal => "successful_heal",
            Scenario::RejectedFix => "rejected_fix",
            Scenario::SecondSuccess => "second_success",
        }
    }

    /// The expected terminal stage each canonical scenario resolves to
    /// (spec.md §4.12).
    fn expected_stage(&self) -> &'static str {
        match self {
            Scenario::SuccessfulHeal => "verify",
            Scenario::RejectedFix => "rejected",
            Scenario::SecondSuccess => "verify",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioOutcome {
    Matched { stage: String },
    Mismatched { expected: String, observed: String },
    TimedOut,
}

pub struct DemoDriver {
    bus: Arc<BroadcastSignalBus>,
}

impl DemoDriver {
    pub fn new(bus: Arc<BroadcastSignalBus>) -> Self {
        Self { bus }
    }

    /// Injects a fault tagged with a fresh correlation id on the signal bus
    /// (spec.md §4.12: "each fault owns a correlation id emitted on the
    /// signal bus").
    pub async fn inject_fault(&self, kind: FaultKind) -> String {
        let correlation_id = Uuid::new_v4().to_string();
        self.bus
            .emit("demo.fault", kind.as_str(), json!({ "correlation_id": correlation_id }))
            .await;
        correlation_id
    }

    /// Subscribes to `demo.*` signals, injects the scenario's fault, waits
    /// for a terminal stage (`verify`, `rejected`, `fix_failed`) within
    /// `timeout`, and compares it to the scenario's expected decision.
    pub async fn run_scenario(&self, scenario: Scenario, fault: FaultKind, timeout: Duration) -> ScenarioOutcome {
        let mut rx = self.bus.subscribe();
        let correlation_id = self.inject_fault(fault).await;

        let wait = async {
            loop {
                match rx.recv().await {
                    Ok(signal) => {
                        if let Some(stage) = terminal_stage(&signal, &correlation_id) {
                            return stage;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => return "closed".to_string(),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                }
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(stage) if stage == scenario.expected_stage() => ScenarioOutcome::Matched { stage },
            Ok(stage) => ScenarioOutcome::Mismatched { expected: scenario.expected_stage().to_string(), observed: stage },
            Err(_) => ScenarioOutcome::TimedOut,
        }
    }
}

/// Only `demo.*` category signals carrying the matching correlation id and
/// a recognized terminal stage resolve the wait (spec.md §4.12).
fn terminal_stage(signal: &Signal, correlation_id: &str) -> Option<String> {
    if !signal.category.starts_with("demo") {
        return None;
    }
    let matches_correlation = signal.data.get("correlation_id").and_then(|v| v.as_str()) == Some(correlation_id);
    if !matches_correlation {
        return None;
    }
    if matches!(signal.kind.as_str(), "verify" | "rejected" | "fix_failed") {
        Some(signal.kind.clone())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Simulates an external orchestrator reacting to the injected fault by
    /// emitting the scenario's terminal stage back onto the bus.
    async fn respond_with_stage(bus: Arc<BroadcastSignalBus>, stage: &'static str) {
        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            if let Ok(signal) = rx.recv().await {
                let correlation_id = signal.data.get("correlation_id").and_then(|v| v.as_str()).unwrap().to_string();
                bus.emit("demo.pipeline", stage, json!({ "correlation_id": correlation_id })).await;
            }
        });
    }

    #[tokio::test]
    async fn successful_heal_matches_verify() {
        let bus = Arc::new(BroadcastSignalBus::new());
        respond_with_stage(bus.clone(), "verify").await;
        let driver = DemoDriver::new(bus);
        let outcome = driver.run_scenario(Scenario::SuccessfulHeal, FaultKind::LeakingWorker, Duration::from_secs(1)).await;
        assert_eq!(outcome, ScenarioOutcome::Matched { stage: "verify".to_string() });
    }

    #[tokio::test]
    async fn rejected_fix_matches_rejected() {
        let bus = Arc::new(BroadcastSignalBus::new());
        respond_with_stage(bus.clone(), "rejected").await;
        let driver = DemoDriver::new(bus);
        let outcome = driver.run_scenario(Scenario::RejectedFix, FaultKind::CrashingSupervisor, Duration::from_secs(1)).await;
        assert_eq!(outcome, ScenarioOutcome::Matched { stage: "rejected".to_string() });
    }

    #[tokio::test]
    async fn no_response_times_out() {
        let bus = Arc::new(BroadcastSignalBus::new());
        let driver = DemoDriver::new(bus);
        let outcome = driver.run_scenario(Scenario::SuccessfulHeal, FaultKind::MessageQueueFlood, Duration::from_millis(50)).await;
        assert_eq!(outcome, ScenarioOutcome::TimedOut);
    }

    #[tokio::test]
    async fn mismatched_stage_is_reported() {
        let bus = Arc::new(BroadcastSignalBus::new());
        respond_with_stage(bus.clone(), "fix_failed").await;
        let driver = DemoDriver::new(bus);
        let outcome = driver.run_scenario(Scenario::SuccessfulHeal, FaultKind::LeakingWorker, Duration::from_secs(1)).await;
        assert_eq!(outcome, ScenarioOutcome::Mismatched { expected: "verify".to_string(), observed: "fix_failed".to_string() });
    }
}
