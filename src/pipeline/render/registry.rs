use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::pipeline::detection::{PatternKind, PatternMatch};
use crate::security::SecurityValidator;

use super::sections::default_renderers;
use super::{error_placeholder, RenderContext, RenderError, SectionRenderer, SectionResult};

pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(10);

/// Maps each pattern kind to its renderer and runs renders in isolation.
///
/// Every call sees the request's sanitized answers, runs on the blocking
/// pool, and is abandoned after the timeout. An abandoned renderer keeps its
/// thread until it returns; its output is discarded.
pub struct RendererRegistry {
    renderers: HashMap<PatternKind, Arc<dyn SectionRenderer>>,
    validator: Arc<SecurityValidator>,
    timeout: Duration,
}

impl RendererRegistry {
    /// A registry with the built-in renderer for every kind.
    pub fn new(validator: Arc<SecurityValidator>, timeout: Duration) -> Self {
        let mut registry = Self::empty(validator, timeout);
        for (kind, renderer) in default_renderers() {
            registry.register(kind, renderer);
        }
        registry
    }

    pub fn empty(validator: Arc<SecurityValidator>, timeout: Duration) -> Self {
        Self {
            renderers: HashMap::new(),
            validator,
            timeout,
        }
    }

    /// Register or replace the renderer for `kind`. Returns the one replaced.
    pub fn register(
        &mut self,
        kind: PatternKind,
        renderer: Arc<dyn SectionRenderer>,
    ) -> Option<Arc<dyn SectionRenderer>> {
        self.renderers.insert(kind, renderer)
    }

    pub fn is_registered(&self, kind: PatternKind) -> bool {
        self.renderers.contains_key(&kind)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Render one section.
    pub async fn render(&self, pattern: &PatternMatch, ctx: &RenderContext) -> Result<String, RenderError> {
        let kind = pattern.kind;
        let error = |code: String, cause: String| RenderError {
            code,
            section: kind.as_str().to_string(),
            cause,
            request_id: ctx.request_id.clone(),
        };

        let Some(renderer) = self.renderers.get(&kind).cloned() else {
            return Err(error("RNDR-001".to_string(), "renderer not found".to_string()));
        };

        let section = ctx.section_context(ctx.sanitized_answers(&self.validator));
        let pattern = pattern.clone();
        let task = tokio::task::spawn_blocking(move || renderer.render(&pattern, &section));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(Ok(html))) => Ok(html),
            Ok(Ok(Err(failure))) => Err(error(RenderError::failed_code(kind), failure.to_string())),
            Ok(Err(join_error)) => {
                let cause = if join_error.is_panic() {
                    "renderer panicked".to_string()
                } else {
                    format!("renderer task failed: {}", join_error)
                };
                Err(error(RenderError::failed_code(kind), cause))
            }
            Err(_) => Err(error(
                "RNDR-TIMEOUT".to_string(),
                format!("renderer timeout after {:?}", self.timeout),
            )),
        }
    }

    /// Render one section, turning a failure into its visible placeholder.
    pub async fn render_section(&self, pattern: &PatternMatch, ctx: &RenderContext) -> SectionResult {
        match self.render(pattern, ctx).await {
            Ok(html) => SectionResult {
                kind: pattern.kind,
                html,
                error: None,
            },
            Err(error) => {
                tracing::warn!(
                    request_id = %error.request_id,
                    section = %error.section,
                    code = %error.code,
                    "Section render failed"
                );
                SectionResult {
                    kind: pattern.kind,
                    html: error_placeholder(&error),
                    error: Some(error),
                }
            }
        }
    }
}
