use pretty_assertions::assert_eq;
use stagegate_artifact::{ArtifactKind, WorkUnitId, DEFAULT_EXCLUDED_FIELDS};
use stagegate_guard::{ActionKind, ExecutionAction, ExecutionScope, FailureClass, MemoryWorkspace, RunStatus};
use stagegate_kernel::audit::AuditEvent;
use stagegate_kernel::{GovernanceError, Phase, StateViolation};
use stagegate_test_utils::{setup_gated_kernel, setup_kernel, TestKernel};
use std::sync::Arc;

async fn building_unit(t: &TestKernel, id: &str) -> WorkUnitId {
    let unit = t.approved_through(id, ArtifactKind::BuildPrompts).await;
    t.kernel
        .conductor()
        .transition(&unit, Phase::Building, "builder")
        .await
        .unwrap();
    unit
}

#[tokio::test]
async fn halted_run_parks_the_unit_for_a_human() {
    let t = setup_kernel();
    let unit = building_unit(&t, "scenario-c").await;
    let ws = Arc::new(MemoryWorkspace::new().with_file("B", "untouched"));
    let scope = ExecutionScope::new().allow(ActionKind::Create, "A");
    let actions = [
        ExecutionAction::create("A", "A", "created"),
        ExecutionAction::modify("B", "B", "changed"),
    ];

    let log = t
        .kernel
        .supervisor(ws.clone())
        .execute(&unit, &actions, &scope)
        .await
        .unwrap();
    assert_eq!(log.status(), RunStatus::Failed);
    assert_eq!(log.halted_at().map(|a| a.as_str()), Some("B"));
    assert!(log.verify_hash(DEFAULT_EXCLUDED_FIELDS).unwrap());
    assert_eq!(ws.read("A").as_deref(), Some("created"));
    assert_eq!(ws.read("B").as_deref(), Some("untouched"));

    let state = t.kernel.conductor().get_state_snapshot(&unit).await.unwrap();
    assert_eq!(state.phase, Phase::Building);
    assert!(!state.locked);
    assert!(state.awaiting_human);
    assert_eq!(state.pause_reason.as_deref(), Some("execution halted at B"));

    let err = GovernanceError::from_halted_log(&log).unwrap();
    assert!(err.requires_human());
    match err {
        GovernanceError::ScopeViolation { action, class, .. } => {
            assert_eq!(action.as_str(), "B");
            assert_eq!(class, FailureClass::ScopeViolation);
        }
        other => panic!("expected scope violation, got {other}"),
    }

    match t.audit.events().last() {
        Some(AuditEvent::ExecutionHalted { work_unit, action, .. }) => {
            assert_eq!(work_unit, &unit);
            assert_eq!(action.as_str(), "B");
        }
        other => panic!("expected execution_halted, got {other:?}"),
    }
}

#[tokio::test]
async fn completed_run_leaves_the_unit_free() {
    let t = setup_kernel();
    let unit = building_unit(&t, "clean-build").await;
    let ws = Arc::new(MemoryWorkspace::new());
    let scope = ExecutionScope::new().allow(ActionKind::Create, "app/");
    let actions = [
        ExecutionAction::create("1", "app/home.rs", "fn home() {}"),
        ExecutionAction::create("2", "app/settings.rs", "fn settings() {}"),
    ];
    let events_before = t.audit.len();

    let log = t
        .kernel
        .supervisor(ws.clone())
        .execute(&unit, &actions, &scope)
        .await
        .unwrap();
    assert_eq!(log.status(), RunStatus::Completed);
    assert!(GovernanceError::from_halted_log(&log).is_none());
    assert_eq!(ws.files().len(), 2);

    let state = t.kernel.conductor().get_state_snapshot(&unit).await.unwrap();
    assert!(!state.locked && !state.awaiting_human);
    assert_eq!(t.audit.len(), events_before);

    t.kernel
        .conductor()
        .transition(&unit, Phase::Verifying, "builder")
        .await
        .unwrap();
}

#[tokio::test]
async fn execution_is_refused_while_awaiting_or_locked() {
    let t = setup_kernel();
    let unit = building_unit(&t, "blocked").await;
    let ws = Arc::new(MemoryWorkspace::new());
    let scope = ExecutionScope::new().allow(ActionKind::Create, "app/");
    let actions = [ExecutionAction::create("1", "app/x.rs", "x")];
    let supervisor = t.kernel.supervisor(ws.clone());

    t.kernel.conductor().lock(&unit).await.unwrap();
    assert!(matches!(
        supervisor.execute(&unit, &actions, &scope).await,
        Err(GovernanceError::LockConflict(_))
    ));
    t.kernel.conductor().unlock(&unit).await.unwrap();

    t.kernel.conductor().pause_for_human(&unit, "review plan").await.unwrap();
    assert!(matches!(
        supervisor.execute(&unit, &actions, &scope).await,
        Err(GovernanceError::StateViolation {
            violation: StateViolation::AwaitingHuman { .. },
            ..
        })
    ));
    assert!(ws.files().is_empty());
}

#[tokio::test]
async fn pause_after_the_read_still_blocks_execution() {
    let (t, gate) = setup_gated_kernel();
    let unit = building_unit(&t, "late-pause").await;
    let ws = Arc::new(MemoryWorkspace::new());
    let scope = ExecutionScope::new().allow(ActionKind::Create, "app/");

    let mut handle = gate.arm();
    let run = {
        let supervisor = t.kernel.supervisor(ws.clone());
        let unit = unit.clone();
        tokio::spawn(async move {
            supervisor
                .execute(&unit, &[ExecutionAction::create("c", "app/main.rs", "fn main() {}")], &scope)
                .await
        })
    };
    handle.parked().await;

    t.kernel
        .conductor()
        .pause_for_human(&unit, "review requested")
        .await
        .unwrap();
    handle.release();

    let err = run.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        GovernanceError::StateViolation {
            violation: StateViolation::AwaitingHuman { ref reason },
            ..
        } if reason == "review requested"
    ));
    assert!(ws.files().is_empty());

    let snap = t.kernel.conductor().get_state_snapshot(&unit).await.unwrap();
    assert!(!snap.locked);
    assert!(snap.awaiting_human);
    assert_eq!(snap.pause_reason.as_deref(), Some("review requested"));
}
