//! Intent: the structured reading of a question.
//!
//! An [`IntentParser`] extracts a [`RawIntent`] from free text; the
//! [`EntityResolver`] grounds it against the catalog, producing either an
//! [`Intent`] or a [`Clarification`].

mod analysis;
mod model;
mod parser;
mod resolver;

pub use analysis::{AnalysisPlan, plan_analysis};
pub use model::{
    AnalysisDepth, AnalysisType, Clarification, EntityRefs, Intent, IntentKind, OutputShape,
    RawIntent,
};
pub use parser::{IntentParser, UnderstandError};
pub use resolver::{EntityResolver, Resolution, similarity};
