//! Template-based content generation.
//!
//! Templates live in a per-domain catalog supplied by configuration, with a
//! generic catalog as fallback. Instantiation substitutes the skill name
//! into title and body and is capped per gap and per skill so a large
//! catalog cannot flood the recommendation list.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::types::{DifficultyLevel, LearningContent, SkillGap};

const SKILL_PLACEHOLDER: &str = "{skill}";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentTemplate {
    pub content_type: String,
    pub title: String,
    pub body: String,
    pub difficulty: f64,
    pub estimated_minutes: u32,
    pub prerequisites: Vec<String>,
}

impl ContentTemplate {
    pub fn new(
        content_type: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
        difficulty: f64,
        estimated_minutes: u32,
    ) -> Self {
        Self {
            content_type: content_type.into(),
            title: title.into(),
            body: body.into(),
            difficulty: difficulty.clamp(0.0, 1.0),
            estimated_minutes,
            prerequisites: Vec::new(),
        }
    }

    /// Large gaps need advanced content; small gaps don't.
    fn compatible_with(&self, gap_size: f64) -> bool {
        if gap_size > 0.6 && self.difficulty < 0.5 {
            return false;
        }
        if gap_size < 0.3 && self.difficulty > 0.7 {
            return false;
        }
        true
    }

    fn instantiate(&self, skill_domain: &str, index: usize) -> LearningContent {
        let id = format!(
            "{}:{}:{}",
            skill_domain.to_lowercase().replace(' ', "-"),
            self.content_type,
            index
        );
        LearningContent {
            id,
            content_type: self.content_type.clone(),
            title: self.title.replace(SKILL_PLACEHOLDER, skill_domain),
            body: self.body.replace(SKILL_PLACEHOLDER, skill_domain),
            difficulty: self.difficulty,
            level: DifficultyLevel::from_difficulty(self.difficulty),
            estimated_minutes: self.estimated_minutes,
            prerequisites: self.prerequisites.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateCatalog {
    domains: HashMap<String, Vec<ContentTemplate>>,
    generic: Vec<ContentTemplate>,
}

impl TemplateCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in catalog covering the usual content types at a spread of
    /// difficulties, used when no configuration is supplied.
    pub fn builtin() -> Self {
        let generic = vec![
            ContentTemplate::new(
                "tutorial",
                format!("Introduction to {SKILL_PLACEHOLDER}"),
                format!("A guided walkthrough of the fundamentals of {SKILL_PLACEHOLDER}."),
                0.2,
                20,
            ),
            ContentTemplate::new(
                "exercise",
                format!("Practice problems: {SKILL_PLACEHOLDER}"),
                format!("Hands-on exercises to build fluency with {SKILL_PLACEHOLDER}."),
                0.45,
                30,
            ),
            ContentTemplate::new(
                "project",
                format!("Build something with {SKILL_PLACEHOLDER}"),
                format!("A small project applying {SKILL_PLACEHOLDER} end to end."),
                0.6,
                60,
            ),
            ContentTemplate::new(
                "deep-dive",
                format!("Advanced {SKILL_PLACEHOLDER} patterns"),
                format!("Edge cases and advanced techniques in {SKILL_PLACEHOLDER}."),
                0.8,
                45,
            ),
        ];
        Self {
            domains: HashMap::new(),
            generic,
        }
    }

    /// Loads a catalog from its JSON form, the format configuration hands
    /// over: `{"domains": {"ownership": [...]}, "generic": [...]}`.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        serde_json::from_str(json)
            .map_err(|err| EngineError::Validation(format!("invalid template catalog: {err}")))
    }

    pub fn with_domain(mut self, domain: impl Into<String>, templates: Vec<ContentTemplate>) -> Self {
        self.domains.insert(domain.into(), templates);
        self
    }

    pub fn with_generic(mut self, templates: Vec<ContentTemplate>) -> Self {
        self.generic = templates;
        self
    }

    fn templates_for(&self, domain: &str) -> &[ContentTemplate] {
        match self.domains.get(domain) {
            Some(templates) if !templates.is_empty() => templates,
            _ => &self.generic,
        }
    }

    /// Instantiates compatible templates for one gap, honoring both the
    /// per-gap cap and the running per-skill budget.
    pub fn generate_for_gap(
        &self,
        gap: &SkillGap,
        per_gap_cap: usize,
        skill_budget: usize,
    ) -> Vec<LearningContent> {
        let cap = per_gap_cap.min(skill_budget);
        self.templates_for(&gap.skill_domain)
            .iter()
            .filter(|t| t.compatible_with(gap.gap_size))
            .take(cap)
            .enumerate()
            .map(|(i, t)| t.instantiate(&gap.skill_domain, i))
            .collect()
    }
}
