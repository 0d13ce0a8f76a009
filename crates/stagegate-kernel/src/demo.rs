//! Scripted end-to-end pipeline used by `stagegate demo`

use anyhow::{bail, Context, Result};
use stagegate_artifact::content::{
    BasePrompt, BuildPrompt, BuildPrompts, Designs, MasterPlan, PlanModule, ProjectRule, ProjectRules, RuleSeverity,
    Screen, ScreenDesign, ScreenInventory, UserFlow, UserFlows,
};
use stagegate_artifact::{ArtifactContent, ArtifactKind, WorkUnitId};
use stagegate_guard::{ActionEffector, ActionKind, ExecutionAction, ExecutionScope, RunStatus};
use stagegate_kernel::{
    AuditLog, GenerationDelegate, GenerationError, GovernanceKernel, IsolatedContext, Phase,
};
use std::sync::Arc;

/// Deterministic stand-in for an external generation service
struct ScriptedGenerator {
    stage: ArtifactKind,
}

#[async_trait::async_trait]
impl GenerationDelegate for ScriptedGenerator {
    async fn generate(&self, context: &IsolatedContext) -> Result<ArtifactContent, GenerationError> {
        let screens = match context.get(ArtifactKind::ScreenInventory) {
            Some(ArtifactContent::ScreenInventory(inv)) => inv.screens.clone(),
            _ => Vec::new(),
        };
        Ok(match self.stage {
            ArtifactKind::BasePrompt => ArtifactContent::BasePrompt(BasePrompt {
                product_name: "Tally".into(),
                problem_statement: "Small teams lose track of shared expenses".into(),
                target_users: vec!["flatmates".into(), "travel groups".into()],
                core_features: vec!["split a bill".into(), "settle up".into()],
            }),
            ArtifactKind::MasterPlan => ArtifactContent::MasterPlan(MasterPlan {
                vision: "Settle shared costs in one tap".into(),
                modules: vec![
                    PlanModule {
                        name: "ledger".into(),
                        purpose: "record expenses".into(),
                    },
                    PlanModule {
                        name: "settlement".into(),
                        purpose: "compute who owes whom".into(),
                    },
                ],
                non_goals: vec!["payments processing".into()],
            }),
            ArtifactKind::ScreenInventory => ArtifactContent::ScreenInventory(ScreenInventory {
                screens: vec![
                    Screen {
                        name: "home".into(),
                        route: "/".into(),
                        purpose: "balances overview".into(),
                    },
                    Screen {
                        name: "add_expense".into(),
                        route: "/expenses/new".into(),
                        purpose: "record a bill".into(),
                    },
                ],
            }),
            ArtifactKind::UserFlows => ArtifactContent::UserFlows(UserFlows {
                flows: vec![UserFlow {
                    name: "record expense".into(),
                    steps: screens.iter().map(|s| s.name.clone()).collect(),
                }],
            }),
            ArtifactKind::Designs => ArtifactContent::Designs(Designs {
                screens: screens
                    .iter()
                    .map(|s| ScreenDesign {
                        screen: s.name.clone(),
                        layout: "single column".into(),
                        components: vec!["header".into(), "list".into()],
                    })
                    .collect(),
            }),
            ArtifactKind::ProjectRules => ArtifactContent::ProjectRules(ProjectRules {
                rules: vec![ProjectRule {
                    name: "money-as-integers".into(),
                    statement: "Amounts are stored in minor units".into(),
                    severity: RuleSeverity::Must,
                }],
            }),
            ArtifactKind::BuildPrompts => ArtifactContent::BuildPrompts(BuildPrompts {
                prompts: screens
                    .iter()
                    .zip(1..)
                    .map(|(s, order)| BuildPrompt {
                        order,
                        title: format!("build {}", s.name),
                        prompt: format!("Implement the {} screen at {}", s.name, s.route),
                        targets: vec![format!("app/{}.rs", s.name)],
                    })
                    .collect(),
            }),
        })
    }

    fn name(&self) -> &str {
        "scripted-generator"
    }
}

/// Walk one work unit from `idea` to `completed`
pub(crate) async fn run(kernel: &GovernanceKernel, audit: &AuditLog, effector: Arc<dyn ActionEffector>) -> Result<()> {
    let unit = WorkUnitId::generate();
    let conductor = kernel.conductor();
    let lifecycle = kernel.lifecycle();

    conductor.initialize(&unit).await?;
    println!("work unit {unit} initialized at {}", Phase::Idea);

    for stage in ArtifactKind::ALL {
        let generator = ScriptedGenerator { stage };
        let artifact = lifecycle
            .produce_and_submit(&unit, stage, &generator)
            .await
            .with_context(|| format!("submitting {stage}"))?;
        let approved = lifecycle.approve(artifact.id(), "demo-reviewer").await?;
        lifecycle.verify_artifact(approved.id()).await?;
        let state = conductor.get_state_snapshot(&unit).await?;
        println!(
            "  {:<17} {}  -> {}",
            stage.as_str(),
            approved.content_hash().short(),
            state.phase
        );
    }

    let build = lifecycle
        .history(&unit, ArtifactKind::BuildPrompts)
        .await?
        .into_iter()
        .rev()
        .find(stagegate_artifact::Artifact::is_approved)
        .context("approved build prompts missing")?;
    let ArtifactContent::BuildPrompts(prompts) = build.content() else {
        bail!("build prompts artifact carries {} content", build.kind());
    };

    let actions: Vec<ExecutionAction> = prompts
        .prompts
        .iter()
        .flat_map(|p| {
            p.targets.iter().map(move |target| {
                ExecutionAction::create(format!("build-{}", p.order), target.clone(), format!("// {}\n", p.prompt))
            })
        })
        .collect();
    let scope = ExecutionScope::new()
        .allow(ActionKind::Create, "app/")
        .forbid("app/secrets/");

    conductor.transition(&unit, Phase::Building, "builder").await?;
    let log = kernel.supervisor(effector).execute(&unit, &actions, &scope).await?;
    println!(
        "  build             {} actions, status {:?}, log {}",
        log.results().len(),
        log.status(),
        log.log_hash().map(|h| h.short()).unwrap_or_default()
    );
    if log.status() != RunStatus::Completed {
        bail!("build halted at {:?}", log.halted_at());
    }

    conductor.transition(&unit, Phase::Verifying, "builder").await?;
    let state = conductor.transition(&unit, Phase::Completed, "verifier").await?;
    println!("work unit {unit} finished in phase {}", state.phase);

    match audit.verify_integrity() {
        Ok(()) => println!(
            "audit chain: {} records, head {}, VALID",
            audit.len(),
            audit.head().map(hex::encode).unwrap_or_default()
        ),
        Err(e) => bail!("audit chain INVALID: {e}"),
    }
    Ok(())
}
