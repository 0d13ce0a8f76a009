use stagegate_artifact::{ArtifactKind, WorkUnitId};
use stagegate_kernel::audit::AuditEvent;
use stagegate_kernel::{GovernanceConfig, Phase};
use stagegate_test_utils::{setup_kernel, setup_kernel_with};

#[tokio::test]
async fn sweep_releases_stale_locks_without_moving_phase() {
    let t = setup_kernel();
    let stuck = t.approved_through("stuck", ArtifactKind::MasterPlan).await;
    let idle = WorkUnitId::new("idle");
    t.kernel.conductor().initialize(&idle).await.unwrap();
    t.kernel.conductor().lock(&stuck).await.unwrap();

    let report = t.kernel.recovery().run().await.unwrap();
    assert_eq!(report.scanned, 2);
    assert_eq!(report.recovered, vec![stuck.clone()]);

    let state = t.kernel.conductor().get_state_snapshot(&stuck).await.unwrap();
    assert_eq!(state.phase, Phase::Planning);
    assert!(!state.locked);
    assert!(state.awaiting_human);
    assert_eq!(
        state.pause_reason.as_deref(),
        Some("recovered after interrupted critical section")
    );

    let idle_state = t.kernel.conductor().get_state_snapshot(&idle).await.unwrap();
    assert!(!idle_state.locked && !idle_state.awaiting_human);

    assert!(matches!(
        t.audit.events().last(),
        Some(AuditEvent::WorkUnitRecovered { phase: Phase::Planning, .. })
    ));
}

#[tokio::test]
async fn second_sweep_is_a_no_op() {
    let t = setup_kernel();
    let unit = WorkUnitId::new("once");
    t.kernel.conductor().initialize(&unit).await.unwrap();
    t.kernel.conductor().lock(&unit).await.unwrap();

    let first = t.kernel.recovery().run().await.unwrap();
    assert_eq!(first.recovered.len(), 1);
    let after_first = t.kernel.conductor().get_state_snapshot(&unit).await.unwrap();
    let events = t.audit.len();

    let second = t.kernel.recovery().run().await.unwrap();
    assert!(second.recovered.is_empty());
    assert_eq!(t.kernel.conductor().get_state_snapshot(&unit).await.unwrap(), after_first);
    assert_eq!(t.audit.len(), events);
}

#[tokio::test]
async fn recovered_unit_resumes_through_a_human() {
    let config = GovernanceConfig {
        recovery_reason: "worker restarted".to_string(),
        ..GovernanceConfig::default()
    };
    let t = setup_kernel_with(config);
    let unit = WorkUnitId::new("restarted");
    t.kernel.conductor().initialize(&unit).await.unwrap();
    t.kernel.conductor().lock(&unit).await.unwrap();
    t.kernel.recovery().run().await.unwrap();

    let state = t.kernel.conductor().get_state_snapshot(&unit).await.unwrap();
    assert_eq!(state.pause_reason.as_deref(), Some("worker restarted"));

    t.kernel.conductor().resume_after_human(&unit).await.unwrap();
    t.submit_and_approve(&unit, ArtifactKind::BasePrompt).await;
    assert_eq!(
        t.kernel.conductor().get_state_snapshot(&unit).await.unwrap().phase,
        Phase::BasePromptReady
    );
}
