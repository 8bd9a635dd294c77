//! Narrative: the natural-language answer built from results and derived
//! metrics.

mod grounding;
mod template;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::catalog::SchemaCatalog;
use crate::intent::Intent;
use crate::result::ResultSet;
use crate::stats::DerivedMetrics;

pub use grounding::{grounded_numbers, ungrounded_numbers, ungrounded_teams};
pub use template::TemplateNarrator;

pub struct NarrativeRequest<'a> {
    pub question: &'a str,
    pub intent: &'a Intent,
    pub results: &'a ResultSet,
    pub metrics: &'a DerivedMetrics,
    pub catalog: &'a SchemaCatalog,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Narrative {
    pub text: String,
    /// Always `None` for now; no step computes a score.
    pub confidence: Option<f32>,
    pub sources: Vec<String>,
}

/// Writes the answer. Infallible: implementations degrade to the template
/// wording instead of failing the request.
#[async_trait]
pub trait Narrator: Send + Sync {
    async fn narrate(&self, request: &NarrativeRequest<'_>) -> Narrative;
}

/// Citations for a data-backed answer; none when nothing was found.
pub fn sources_for(request: &NarrativeRequest<'_>) -> Vec<String> {
    if request.results.is_empty() {
        Vec::new()
    } else {
        request.catalog.sources.clone()
    }
}
