use stagegate_artifact::{ArtifactKind, ArtifactStatus, WorkUnitId};
use stagegate_kernel::{GovernanceError, IsolationFailure};
use stagegate_test_utils::setup_kernel;

fn isolation_failure(err: GovernanceError) -> (ArtifactKind, IsolationFailure) {
    match err {
        GovernanceError::ContextIsolationViolation {
            dependency, failure, ..
        } => (dependency, failure),
        other => panic!("expected context isolation violation, got {other}"),
    }
}

#[tokio::test]
async fn missing_dependency_is_a_violation() {
    let t = setup_kernel();
    let unit = WorkUnitId::new("bare");
    t.kernel.conductor().initialize(&unit).await.unwrap();

    let err = t
        .kernel
        .lifecycle()
        .loader()
        .load_isolated_context(&unit, &[ArtifactKind::BasePrompt])
        .await
        .unwrap_err();
    assert_eq!(
        isolation_failure(err),
        (ArtifactKind::BasePrompt, IsolationFailure::Missing)
    );
}

#[tokio::test]
async fn awaiting_dependency_is_a_violation() {
    let t = setup_kernel();
    let unit = WorkUnitId::new("pending");
    t.kernel.conductor().initialize(&unit).await.unwrap();
    t.submit(&unit, ArtifactKind::BasePrompt).await;

    let err = t
        .kernel
        .lifecycle()
        .loader()
        .load_isolated_context(&unit, &[ArtifactKind::BasePrompt])
        .await
        .unwrap_err();
    let (dependency, failure) = isolation_failure(err);
    assert_eq!(dependency, ArtifactKind::BasePrompt);
    assert_eq!(failure, IsolationFailure::NotApproved(ArtifactStatus::AwaitingApproval));
    assert_eq!(failure.to_string(), "is awaiting_approval, expected approved");
}

#[tokio::test]
async fn latest_rejected_revision_hides_an_earlier_approval() {
    let t = setup_kernel();
    let unit = t.approved_through("revised", ArtifactKind::MasterPlan).await;
    t.submit(&unit, ArtifactKind::ScreenInventory).await;
    let awaiting = t
        .kernel
        .lifecycle()
        .history(&unit, ArtifactKind::ScreenInventory)
        .await
        .unwrap()
        .remove(0);
    t.kernel.lifecycle().reject(awaiting.id(), "missing settings screen").await.unwrap();

    let err = t
        .kernel
        .lifecycle()
        .loader()
        .load_isolated_context(&unit, &[ArtifactKind::BasePrompt, ArtifactKind::ScreenInventory])
        .await
        .unwrap_err();
    assert_eq!(
        isolation_failure(err),
        (
            ArtifactKind::ScreenInventory,
            IsolationFailure::NotApproved(ArtifactStatus::Rejected)
        )
    );
}

#[tokio::test]
async fn first_failing_dependency_in_pipeline_order_is_reported() {
    let t = setup_kernel();
    let unit = t.approved_through("gaps", ArtifactKind::BasePrompt).await;

    let err = t
        .kernel
        .lifecycle()
        .loader()
        .load_isolated_context(&unit, &[ArtifactKind::Designs, ArtifactKind::MasterPlan])
        .await
        .unwrap_err();
    assert_eq!(isolation_failure(err).0, ArtifactKind::MasterPlan);
}

#[tokio::test]
async fn context_holds_exactly_the_declared_kinds() {
    let t = setup_kernel();
    let unit = t.approved_through("scoped", ArtifactKind::UserFlows).await;
    let loader = t.kernel.lifecycle().loader();

    let ctx = loader
        .load_isolated_context(
            &unit,
            &[ArtifactKind::UserFlows, ArtifactKind::BasePrompt, ArtifactKind::UserFlows],
        )
        .await
        .unwrap();
    assert_eq!(ctx.len(), 2);
    assert_eq!(
        ctx.kinds().collect::<Vec<_>>(),
        [ArtifactKind::BasePrompt, ArtifactKind::UserFlows]
    );
    assert!(ctx.get(ArtifactKind::MasterPlan).is_none());
    assert!(ctx.get(ArtifactKind::ScreenInventory).is_none());

    let hashes = ctx.upstream_hashes();
    let current = loader
        .current_hashes(&unit, &[ArtifactKind::BasePrompt, ArtifactKind::UserFlows])
        .await
        .unwrap();
    assert_eq!(hashes, current);
}

#[tokio::test]
async fn contexts_never_cross_work_units() {
    let t = setup_kernel();
    t.approved_through("donor", ArtifactKind::BasePrompt).await;
    let other = WorkUnitId::new("recipient");
    t.kernel.conductor().initialize(&other).await.unwrap();

    let err = t
        .kernel
        .lifecycle()
        .loader()
        .load_isolated_context(&other, &[ArtifactKind::BasePrompt])
        .await
        .unwrap_err();
    assert_eq!(
        isolation_failure(err),
        (ArtifactKind::BasePrompt, IsolationFailure::Missing)
    );
}
