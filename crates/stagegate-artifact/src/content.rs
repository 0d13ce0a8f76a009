//! Typed artifact payloads
//!
//! One variant per [`ArtifactKind`], each with explicit required fields.
//! Generation delegates return an [`ArtifactContent`]; the lifecycle checks
//! that the variant matches the stage and that [`ArtifactContent::validate`]
//! passes before anything is hashed or stored.

use crate::kind::ArtifactKind;
use serde::{Deserialize, Serialize};

/// Problem statement and product framing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasePrompt {
    pub product_name: String,
    pub problem_statement: String,
    pub target_users: Vec<String>,
    pub core_features: Vec<String>,
}

/// One module of the master plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanModule {
    pub name: String,
    pub purpose: String,
}

/// Overall product plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterPlan {
    pub vision: String,
    pub modules: Vec<PlanModule>,
    #[serde(default)]
    pub non_goals: Vec<String>,
}

/// A screen the product needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screen {
    pub name: String,
    pub route: String,
    pub purpose: String,
}

/// Every screen, keyed by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenInventory {
    pub screens: Vec<Screen>,
}

/// A navigation path through screens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFlow {
    pub name: String,
    pub steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFlows {
    pub flows: Vec<UserFlow>,
}

/// Visual design for one screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenDesign {
    pub screen: String,
    pub layout: String,
    pub components: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Designs {
    pub screens: Vec<ScreenDesign>,
}

/// How strictly a project rule is enforced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSeverity {
    Must,
    Should,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRule {
    pub name: String,
    pub statement: String,
    pub severity: RuleSeverity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRules {
    pub rules: Vec<ProjectRule>,
}

/// One ordered instruction for the build stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPrompt {
    pub order: u32,
    pub title: String,
    pub prompt: String,
    pub targets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPrompts {
    pub prompts: Vec<BuildPrompt>,
}

/// Payload of an artifact, tagged by kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum ArtifactContent {
    BasePrompt(BasePrompt),
    MasterPlan(MasterPlan),
    ScreenInventory(ScreenInventory),
    UserFlows(UserFlows),
    Designs(Designs),
    ProjectRules(ProjectRules),
    BuildPrompts(BuildPrompts),
}

impl ArtifactContent {
    /// Kind this payload belongs to
    #[must_use]
    pub fn kind(&self) -> ArtifactKind {
        match self {
            ArtifactContent::BasePrompt(_) => ArtifactKind::BasePrompt,
            ArtifactContent::MasterPlan(_) => ArtifactKind::MasterPlan,
            ArtifactContent::ScreenInventory(_) => ArtifactKind::ScreenInventory,
            ArtifactContent::UserFlows(_) => ArtifactKind::UserFlows,
            ArtifactContent::Designs(_) => ArtifactKind::Designs,
            ArtifactContent::ProjectRules(_) => ArtifactKind::ProjectRules,
            ArtifactContent::BuildPrompts(_) => ArtifactKind::BuildPrompts,
        }
    }

    /// Check required fields are present and non-empty
    ///
    /// # Errors
    /// Returns the first missing field as `"<kind>.<field>"`
    pub fn validate(&self) -> Result<(), ContentError> {
        match self {
            ArtifactContent::BasePrompt(p) => {
                require_text("base_prompt.product_name", &p.product_name)?;
                require_text("base_prompt.problem_statement", &p.problem_statement)?;
                require_items("base_prompt.core_features", &p.core_features)
            }
            ArtifactContent::MasterPlan(p) => {
                require_text("master_plan.vision", &p.vision)?;
                require_items("master_plan.modules", &p.modules)?;
                for m in &p.modules {
                    require_text("master_plan.modules.name", &m.name)?;
                }
                Ok(())
            }
            ArtifactContent::ScreenInventory(s) => {
                require_items("screen_inventory.screens", &s.screens)?;
                for screen in &s.screens {
                    require_text("screen_inventory.screens.name", &screen.name)?;
                    require_text("screen_inventory.screens.route", &screen.route)?;
                }
                Ok(())
            }
            ArtifactContent::UserFlows(f) => {
                require_items("user_flows.flows", &f.flows)?;
                for flow in &f.flows {
                    require_items("user_flows.flows.steps", &flow.steps)?;
                }
                Ok(())
            }
            ArtifactContent::Designs(d) => {
                require_items("designs.screens", &d.screens)?;
                for design in &d.screens {
                    require_text("designs.screens.screen", &design.screen)?;
                }
                Ok(())
            }
            ArtifactContent::ProjectRules(r) => {
                require_items("project_rules.rules", &r.rules)?;
                for rule in &r.rules {
                    require_text("project_rules.rules.statement", &rule.statement)?;
                }
                Ok(())
            }
            ArtifactContent::BuildPrompts(b) => {
                require_items("build_prompts.prompts", &b.prompts)?;
                for prompt in &b.prompts {
                    require_text("build_prompts.prompts.prompt", &prompt.prompt)?;
                }
                Ok(())
            }
        }
    }
}

fn require_text(field: &'static str, value: &str) -> Result<(), ContentError> {
    if value.trim().is_empty() {
        return Err(ContentError::MissingField(field));
    }
    Ok(())
}

fn require_items<T>(field: &'static str, items: &[T]) -> Result<(), ContentError> {
    if items.is_empty() {
        return Err(ContentError::MissingField(field));
    }
    Ok(())
}

/// Payload validation failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentError {
    /// A required field is absent or empty
    #[error("required field {0} is empty")]
    MissingField(&'static str),
}
