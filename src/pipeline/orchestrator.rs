//! Document generation: fetch, validate, detect, render, assemble, convert.
//!
//! A request either yields a complete PDF or exactly one [`PipelineError`].
//! Section failures are not request failures: the section is replaced by a
//! visible placeholder and the rest of the document still renders.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde_json::json;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::PipelineConfig;
use crate::conversion::{ConversionError, DocumentConverter, GotenbergClient, PageOptions, ResilientConverter};
use crate::coordination::{CoordinationStore, LockError, LockManager};
use crate::models::{FormDefinition, OrganizationRecord, ResponseRecord};
use crate::security::{validate_request, DocumentRequest, SecurityValidator, SubjectRejected};
use crate::store::{DocumentStore, StoreError};

use super::audit::{AuditAction, AuditEvent, AuditQueue};
use super::detection::{PatternDetector, PatternKind, PatternMatch};
use super::render::layout::{patient_name, DocumentLayout};
use super::render::{RenderContext, RenderError, RendererRegistry, SectionRenderer, SectionResult};

// ═══════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("Form response not found: {0}")]
    ResponseNotFound(String),

    #[error("Form response {0} has no form reference")]
    MissingFormReference(String),

    #[error("Form definition not found: {0}")]
    FormNotFound(String),

    #[error("Form response {0} has no answer data")]
    MissingAnswers(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid request: {}", .0.join("; "))]
    Request(Vec<String>),

    #[error("{0}")]
    RateLimited(String),

    #[error("Answer data rejected: {}", .0.join("; "))]
    Payload(Vec<String>),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Failed to fetch document context: {0}")]
    Fetch(#[from] FetchError),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Conversion failed: {0}")]
    Conversion(#[from] ConversionError),

    #[error("Document generation exceeded its deadline of {}s", .0.as_secs())]
    DeadlineExceeded(Duration),

    #[error("Document generation is already in progress for response {0}")]
    InProgress(String),

    #[error("Could not acquire generation lock: {0}")]
    Lock(LockError),
}

impl PipelineError {
    /// Stable code for callers that map failures onto responses.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Fetch(FetchError::Store(_)) => "STORE_ERROR",
            PipelineError::Fetch(_) => "NOT_FOUND",
            PipelineError::Validation(ValidationError::RateLimited(_)) => "RATE_LIMIT",
            PipelineError::Validation(_) => "SECURITY_ERROR",
            PipelineError::Conversion(ConversionError::CircuitOpen) => "SERVICE_UNAVAILABLE",
            PipelineError::Conversion(_) => "GENERATION_ERROR",
            PipelineError::DeadlineExceeded(_) => "TIMEOUT",
            PipelineError::InProgress(_) => "GENERATION_IN_PROGRESS",
            PipelineError::Lock(_) => "LOCK_ERROR",
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Result
// ═══════════════════════════════════════════════════════════

/// A finished document.
#[derive(Debug, Clone)]
pub struct GeneratedDocument {
    pub request_id: String,
    pub response_id: String,
    pub pdf: Vec<u8>,
    /// First 16 hex characters of the SHA-256 of `pdf`.
    pub checksum: String,
    /// Rendered sections in document order, placeholders included.
    pub sections: Vec<PatternKind>,
    pub section_errors: Vec<RenderError>,
    pub generated_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl GeneratedDocument {
    pub fn size_bytes(&self) -> usize {
        self.pdf.len()
    }
}

/// `pdf_{unix seconds}_{first 8 characters of the response id}`.
pub fn request_id_for(response_id: &str, at: DateTime<Utc>) -> String {
    let prefix: String = response_id.chars().take(8).collect();
    format!("pdf_{}_{}", at.timestamp(), prefix)
}

pub fn checksum(bytes: &[u8]) -> String {
    let digest = format!("{:x}", Sha256::digest(bytes));
    digest[..16].to_string()
}

/// Detected matches in the fixed clinical order, one per kind.
pub fn render_order(matches: &[PatternMatch]) -> Vec<&PatternMatch> {
    let mut ordered: Vec<&PatternMatch> = matches.iter().collect();
    ordered.sort_by_key(|m| m.kind.canonical_position());
    ordered.dedup_by_key(|m| m.kind);
    ordered
}

struct FetchedContext {
    form: FormDefinition,
    organization: Option<OrganizationRecord>,
    record: ResponseRecord,
}

// ═══════════════════════════════════════════════════════════
// Orchestrator
// ═══════════════════════════════════════════════════════════

pub struct PdfOrchestrator {
    store: Arc<dyn DocumentStore>,
    validator: Arc<SecurityValidator>,
    detector: PatternDetector,
    registry: RendererRegistry,
    converter: Arc<dyn DocumentConverter>,
    locks: LockManager,
    audit: AuditQueue,
    page_options: PageOptions,
    deadline: Duration,
}

impl PdfOrchestrator {
    pub fn new(
        config: &PipelineConfig,
        store: Arc<dyn DocumentStore>,
        coordination: Arc<dyn CoordinationStore>,
        converter: Arc<dyn DocumentConverter>,
        audit: AuditQueue,
    ) -> Self {
        let validator = Arc::new(SecurityValidator::new(
            Arc::clone(&coordination),
            config.validator.clone(),
        ));
        Self {
            store,
            registry: RendererRegistry::new(Arc::clone(&validator), config.render_timeout),
            validator,
            detector: PatternDetector::new(),
            converter,
            locks: LockManager::new(coordination),
            audit,
            page_options: PageOptions::default(),
            deadline: config.deadline,
        }
    }

    /// Production wiring: a Gotenberg client behind the breaker and retry policy.
    pub fn with_gotenberg(
        config: &PipelineConfig,
        store: Arc<dyn DocumentStore>,
        coordination: Arc<dyn CoordinationStore>,
        audit: AuditQueue,
    ) -> Result<Self, ConversionError> {
        let client = GotenbergClient::new(config.converter.clone())?;
        let converter = ResilientConverter::new(Arc::new(client), config.breaker, config.retry);
        Ok(Self::new(config, store, coordination, Arc::new(converter), audit))
    }

    /// Register or replace the renderer of one section kind.
    pub fn register_renderer(&mut self, kind: PatternKind, renderer: Arc<dyn SectionRenderer>) {
        self.registry.register(kind, renderer);
    }

    pub fn with_page_options(mut self, options: PageOptions) -> Self {
        self.page_options = options;
        self
    }

    pub fn audit(&self) -> &AuditQueue {
        &self.audit
    }

    pub async fn converter_health(&self) -> Result<(), ConversionError> {
        self.converter.health().await
    }

    /// Generate the document for one response, bounded by the configured deadline.
    pub async fn generate_document(
        &self,
        response_id: &str,
        user_id: &str,
    ) -> Result<GeneratedDocument, PipelineError> {
        let started = Instant::now();
        let generated_at = Utc::now();
        let request_id = request_id_for(response_id, generated_at);

        tracing::info!(request_id = %request_id, "PDF generation started");
        self.audit.submit(AuditEvent::new(
            AuditAction::PdfGenerationStart,
            user_id,
            response_id,
            &request_id,
        ));

        let outcome = tokio::time::timeout(
            self.deadline,
            self.run(response_id, user_id, &request_id, generated_at),
        )
        .await
        .unwrap_or(Err(PipelineError::DeadlineExceeded(self.deadline)));

        let duration_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(mut document) => {
                document.duration_ms = duration_ms;
                tracing::info!(
                    request_id = %request_id,
                    checksum = %document.checksum,
                    size_bytes = document.size_bytes(),
                    sections = document.sections.len(),
                    failed_sections = document.section_errors.len(),
                    duration_ms,
                    "PDF generation succeeded"
                );
                self.audit.submit(
                    AuditEvent::new(AuditAction::PdfGenerationSuccess, user_id, response_id, &request_id)
                        .with_details(json!({
                            "checksum": document.checksum,
                            "size_bytes": document.size_bytes(),
                            "sections": document.sections.len(),
                            "failed_sections": document.section_errors.len(),
                            "duration_ms": duration_ms,
                        })),
                );
                Ok(document)
            }
            Err(e) => {
                tracing::error!(request_id = %request_id, code = e.code(), error = %e, "PDF generation failed");
                self.audit.submit(
                    AuditEvent::new(AuditAction::PdfGenerationError, user_id, response_id, &request_id)
                        .with_details(json!({
                            "code": e.code(),
                            "error": e.to_string(),
                            "duration_ms": duration_ms,
                        })),
                );
                Err(e)
            }
        }
    }

    /// Like [`generate_document`](Self::generate_document), holding the
    /// response's generation lock so concurrent instances never produce the
    /// same document twice.
    pub async fn generate_document_exclusive(
        &self,
        response_id: &str,
        user_id: &str,
    ) -> Result<GeneratedDocument, PipelineError> {
        let lock = match self.locks.acquire_document_lock(response_id).await {
            Ok(lock) => lock,
            Err(LockError::Contended(_)) => {
                tracing::warn!("PDF generation already in progress, request rejected");
                return Err(PipelineError::InProgress(response_id.to_string()));
            }
            Err(e) => return Err(PipelineError::Lock(e)),
        };

        let result = self.generate_document(response_id, user_id).await;

        if let Err(e) = self.locks.release(&lock.resource, &lock.token).await {
            tracing::warn!(error = %e, "Failed to release generation lock");
        }
        result
    }

    async fn run(
        &self,
        response_id: &str,
        user_id: &str,
        request_id: &str,
        generated_at: DateTime<Utc>,
    ) -> Result<GeneratedDocument, PipelineError> {
        let check = validate_request(&DocumentRequest {
            user_id,
            document_id: response_id,
            user_agent: None,
        });
        if !check.is_valid {
            return Err(ValidationError::Request(check.errors).into());
        }

        let fetched = self.fetch_context(response_id, request_id).await?;
        let raw_answers = fetched
            .record
            .answers
            .clone()
            .ok_or_else(|| FetchError::MissingAnswers(response_id.to_string()))?;

        self.validator.admit_subject(user_id).await.map_err(|rejected| match rejected {
            SubjectRejected::RateLimited { .. } => ValidationError::RateLimited(rejected.to_string()),
            SubjectRejected::MissingSubject => ValidationError::Request(vec![rejected.to_string()]),
        })?;

        let ctx = RenderContext::new(
            response_id,
            fetched.form,
            fetched.organization,
            raw_answers,
            request_id,
            generated_at,
        );
        let view = ctx.sanitize(&self.validator);
        if !view.errors.is_empty() {
            return Err(ValidationError::Payload(view.errors.clone()).into());
        }
        if !view.warnings.is_empty() {
            tracing::info!(request_id = %request_id, warnings = view.warnings.len(), "Answers sanitized with warnings");
        }
        let answers = Arc::clone(&view.answers);

        let matches = self.detector.detect(&ctx.form, &answers);
        let ordered = render_order(&matches);
        tracing::info!(
            request_id = %request_id,
            sections = ordered.len(),
            fields = answers.len(),
            "Patterns detected"
        );

        let results = self.render_sections(&ordered, &ctx).await;
        let mut fragments = Vec::with_capacity(results.len());
        let mut sections = Vec::with_capacity(results.len());
        let mut section_errors = Vec::new();
        for kind in ordered.iter().map(|m| m.kind) {
            let Some(result) = results.get(&kind) else { continue };
            fragments.push(result.html.clone());
            sections.push(kind);
            if let Some(error) = &result.error {
                self.audit.submit(
                    AuditEvent::new(AuditAction::PdfSectionError, user_id, response_id, request_id)
                        .with_details(json!({
                            "section": error.section,
                            "code": error.code,
                            "cause": error.cause,
                        })),
                );
                section_errors.push(error.clone());
            }
        }

        let name = patient_name(&answers);
        let html = DocumentLayout {
            organization: ctx.organization.as_ref(),
            patient_name: &name,
            generated_at,
            request_id,
            sections: &fragments,
        }
        .render();

        let pdf = self.converter.convert(&html, &self.page_options).await?;

        Ok(GeneratedDocument {
            request_id: request_id.to_string(),
            response_id: response_id.to_string(),
            checksum: checksum(&pdf),
            pdf,
            sections,
            section_errors,
            generated_at,
            duration_ms: 0,
        })
    }

    /// Response first, then form and organization concurrently. A missing
    /// organization only costs the document its clinic header.
    async fn fetch_context(&self, response_id: &str, request_id: &str) -> Result<FetchedContext, FetchError> {
        let doc = self
            .store
            .fetch_response(response_id)
            .await?
            .ok_or_else(|| FetchError::ResponseNotFound(response_id.to_string()))?;
        let record = ResponseRecord::from_document(response_id, &doc);

        let form_id = record
            .form_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| FetchError::MissingFormReference(response_id.to_string()))?;

        let (form, organization) = tokio::join!(
            self.store.fetch_form(&form_id),
            self.fetch_organization(record.organization_id.as_deref(), request_id),
        );

        let form = form?.ok_or_else(|| FetchError::FormNotFound(form_id.clone()))?;

        Ok(FetchedContext {
            form: FormDefinition::from_document(&form_id, &form),
            organization,
            record,
        })
    }

    async fn fetch_organization(&self, id: Option<&str>, request_id: &str) -> Option<OrganizationRecord> {
        let id = id.filter(|id| !id.trim().is_empty())?;
        match self.store.fetch_organization(id).await {
            Ok(Some(doc)) => Some(OrganizationRecord::from_document(id, &doc)),
            Ok(None) => {
                tracing::warn!(request_id = %request_id, "Organization not found, using generic header");
                None
            }
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "Organization lookup failed, using generic header");
                None
            }
        }
    }

    async fn render_sections(
        &self,
        ordered: &[&PatternMatch],
        ctx: &RenderContext,
    ) -> BTreeMap<PatternKind, SectionResult> {
        let renders = ordered.iter().map(|pattern| self.registry.render_section(pattern, ctx));
        join_all(renders)
            .await
            .into_iter()
            .map(|result| (result.kind, result))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::MemoryStore;
    use crate::models::FieldValue;
    use crate::pipeline::audit::MemoryAuditSink;
    use crate::pipeline::render::{RenderFailure, SectionContext};
    use crate::store::MemoryDocumentStore;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    const PNG: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    /// Returns a fixed PDF and remembers the HTML it was given.
    #[derive(Default)]
    struct RecordingConverter {
        html: Mutex<Option<String>>,
    }

    impl RecordingConverter {
        fn html(&self) -> String {
            self.html.lock().unwrap().clone().unwrap_or_default()
        }
    }

    #[async_trait]
    impl DocumentConverter for RecordingConverter {
        async fn convert(&self, html: &str, _options: &PageOptions) -> Result<Vec<u8>, ConversionError> {
            *self.html.lock().unwrap() = Some(html.to_string());
            let mut pdf = b"%PDF-1.7\n".to_vec();
            pdf.resize(512, b' ');
            Ok(pdf)
        }

        async fn health(&self) -> Result<(), ConversionError> {
            Ok(())
        }
    }

    struct HangingConverter;

    #[async_trait]
    impl DocumentConverter for HangingConverter {
        async fn convert(&self, _html: &str, _options: &PageOptions) -> Result<Vec<u8>, ConversionError> {
            std::future::pending().await
        }

        async fn health(&self) -> Result<(), ConversionError> {
            Ok(())
        }
    }

    struct SlowRenderer;

    impl SectionRenderer for SlowRenderer {
        fn render(&self, _: &PatternMatch, _: &SectionContext) -> Result<String, RenderFailure> {
            std::thread::sleep(Duration::from_millis(500));
            Ok("<p>late</p>".into())
        }
    }

    fn answers() -> Value {
        json!({
            "patient_name": "Jane Doe",
            "date_of_birth": "1980-04-12",
            "heart_rate": 72,
            "weight": 150,
            "patient_signature": PNG
        })
    }

    fn store_with(response: Value) -> Arc<MemoryDocumentStore> {
        let store = Arc::new(MemoryDocumentStore::new());
        store.insert_response("resp_12345678", FieldValue::from(response));
        store.insert_form("form_1", FieldValue::from(json!({"title": "Intake", "pages": []})));
        store.insert_organization(
            "org_1",
            FieldValue::from(json!({"name": "Riverside Clinic", "phone": "555-0100"})),
        );
        store
    }

    fn response(answers: Value) -> Value {
        json!({"form": "form_1", "organizationId": "org_1", "response_data": answers})
    }

    struct Harness {
        orchestrator: PdfOrchestrator,
        sink: Arc<MemoryAuditSink>,
    }

    fn harness(
        store: Arc<MemoryDocumentStore>,
        converter: Arc<dyn DocumentConverter>,
        config: PipelineConfig,
    ) -> Harness {
        let sink = Arc::new(MemoryAuditSink::new());
        let audit = AuditQueue::spawn(sink.clone(), 64);
        let orchestrator = PdfOrchestrator::new(&config, store, Arc::new(MemoryStore::new()), converter, audit);
        Harness { orchestrator, sink }
    }

    // ═══════════════════════════════════════════
    // Happy path
    // ═══════════════════════════════════════════

    #[tokio::test]
    async fn generates_ordered_document() {
        let converter = Arc::new(RecordingConverter::default());
        let h = harness(store_with(response(answers())), converter.clone(), PipelineConfig::default());

        let doc = h.orchestrator.generate_document("resp_12345678", "user_1").await.unwrap();

        assert_eq!(
            doc.sections,
            vec![PatternKind::PatientDemographics, PatternKind::PatientVitals, PatternKind::Signature]
        );
        assert!(doc.section_errors.is_empty());
        assert_eq!(doc.size_bytes(), 512);
        assert_eq!(doc.checksum.len(), 16);
        assert_eq!(doc.checksum, checksum(&doc.pdf));
        assert!(doc.request_id.starts_with("pdf_"));
        assert!(doc.request_id.ends_with("_resp_123"));

        let html = converter.html();
        let demographics = html.find("Patient Demographics").unwrap();
        let vitals = html.find("Patient Vital Signs").unwrap();
        let signature = html.find("Patient Signature").unwrap();
        assert!(demographics < vitals && vitals < signature);
        assert!(html.contains("Riverside Clinic"));
        assert!(html.contains(r#"<div class="patient-name">Jane Doe</div>"#));

        h.orchestrator.audit().flush().await;
        assert_eq!(
            h.sink.actions(),
            vec![AuditAction::PdfGenerationStart, AuditAction::PdfGenerationSuccess]
        );
        let success = &h.sink.events()[1];
        assert_eq!(success.details["checksum"], doc.checksum.as_str());
        assert_eq!(success.details["size_bytes"], 512);
        assert_eq!(success.user_id, "user_1");
    }

    #[tokio::test]
    async fn script_in_patient_name_is_escaped() {
        let converter = Arc::new(RecordingConverter::default());
        let mut data = answers();
        data["patient_name"] = json!("<script>alert(1)</script>");
        let h = harness(store_with(response(data)), converter.clone(), PipelineConfig::default());

        h.orchestrator.generate_document("resp_12345678", "user_1").await.unwrap();

        let html = converter.html();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
    }

    #[tokio::test]
    async fn missing_organization_uses_generic_header() {
        let converter = Arc::new(RecordingConverter::default());
        let mut resp = response(answers());
        resp["organizationId"] = json!("org_missing");
        let h = harness(store_with(resp), converter.clone(), PipelineConfig::default());

        h.orchestrator.generate_document("resp_12345678", "user_1").await.unwrap();
        assert!(converter.html().contains("Patient Intake Form"));
    }

    // ═══════════════════════════════════════════
    // Failures
    // ═══════════════════════════════════════════

    #[tokio::test]
    async fn missing_form_reference_is_fatal() {
        let converter = Arc::new(RecordingConverter::default());
        let resp = json!({"organizationId": "org_1", "response_data": answers()});
        let h = harness(store_with(resp), converter.clone(), PipelineConfig::default());

        let err = h.orchestrator.generate_document("resp_12345678", "user_1").await.unwrap_err();
        assert_eq!(
            err,
            PipelineError::Fetch(FetchError::MissingFormReference("resp_12345678".into()))
        );
        assert_eq!(err.code(), "NOT_FOUND");
        assert!(converter.html().is_empty(), "nothing may be converted");

        h.orchestrator.audit().flush().await;
        let events = h.sink.events();
        assert_eq!(events.last().unwrap().action, AuditAction::PdfGenerationError);
        assert_eq!(events.last().unwrap().details["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn eleventh_request_in_a_window_is_rate_limited() {
        let converter = Arc::new(RecordingConverter::default());
        let h = harness(store_with(response(answers())), converter, PipelineConfig::default());

        for _ in 0..10 {
            h.orchestrator.generate_document("resp_12345678", "user_1").await.unwrap();
        }
        let err = h.orchestrator.generate_document("resp_12345678", "user_1").await.unwrap_err();
        assert!(matches!(err, PipelineError::Validation(ValidationError::RateLimited(_))));
        assert_eq!(err.code(), "RATE_LIMIT");
    }

    #[tokio::test]
    async fn oversized_answer_set_is_rejected_before_rendering() {
        let converter = Arc::new(RecordingConverter::default());
        let fields: serde_json::Map<String, Value> =
            (0..1001).map(|i| (format!("field_{}", i), json!("x"))).collect();
        let h = harness(
            store_with(response(Value::Object(fields))),
            converter.clone(),
            PipelineConfig::default(),
        );

        let err = h.orchestrator.generate_document("resp_12345678", "user_1").await.unwrap_err();
        assert!(matches!(&err, PipelineError::Validation(ValidationError::Payload(e)) if e[0].contains("Too many fields")));
        assert_eq!(err.code(), "SECURITY_ERROR");
        assert!(converter.html().is_empty());
    }

    #[tokio::test]
    async fn unknown_response_and_form() {
        let h = harness(
            store_with(response(answers())),
            Arc::new(RecordingConverter::default()),
            PipelineConfig::default(),
        );
        let err = h.orchestrator.generate_document("resp_unknown", "user_1").await.unwrap_err();
        assert_eq!(err, PipelineError::Fetch(FetchError::ResponseNotFound("resp_unknown".into())));

        let mut resp = response(answers());
        resp["form"] = json!("form_gone");
        let h = harness(store_with(resp), Arc::new(RecordingConverter::default()), PipelineConfig::default());
        let err = h.orchestrator.generate_document("resp_12345678", "user_1").await.unwrap_err();
        assert_eq!(err, PipelineError::Fetch(FetchError::FormNotFound("form_gone".into())));
    }

    #[tokio::test]
    async fn malformed_request_is_rejected_before_fetching() {
        let h = harness(
            store_with(response(answers())),
            Arc::new(RecordingConverter::default()),
            PipelineConfig::default(),
        );
        let err = h.orchestrator.generate_document("../etc", "").await.unwrap_err();
        assert!(matches!(err, PipelineError::Validation(ValidationError::Request(ref errors)) if errors.len() == 2));
        assert_eq!(err.code(), "SECURITY_ERROR");
    }

    #[tokio::test]
    async fn slow_section_becomes_a_placeholder() {
        let converter = Arc::new(RecordingConverter::default());
        let config = PipelineConfig {
            render_timeout: Duration::from_millis(100),
            ..PipelineConfig::default()
        };
        let mut h = harness(store_with(response(answers())), converter.clone(), config);
        h.orchestrator.register_renderer(PatternKind::PatientVitals, Arc::new(SlowRenderer));

        let doc = h.orchestrator.generate_document("resp_12345678", "user_1").await.unwrap();

        assert_eq!(doc.sections.len(), 3);
        assert_eq!(doc.section_errors.len(), 1);
        assert_eq!(doc.section_errors[0].code, "RNDR-TIMEOUT");
        assert_eq!(doc.section_errors[0].section, "patient_vitals");

        let html = converter.html();
        assert!(html.contains("Could Not Render Section: patient_vitals"));
        assert!(html.contains(&format!("Error Code: RNDR-TIMEOUT | Request: {}", doc.request_id)));
        assert!(html.contains("Patient Demographics"));
        assert!(html.contains("Patient Signature"));

        h.orchestrator.audit().flush().await;
        assert!(h.sink.actions().contains(&AuditAction::PdfSectionError));
    }

    #[tokio::test]
    async fn deadline_bounds_the_whole_request() {
        let config = PipelineConfig {
            deadline: Duration::from_millis(200),
            ..PipelineConfig::default()
        };
        let h = harness(store_with(response(answers())), Arc::new(HangingConverter), config);

        let err = h.orchestrator.generate_document("resp_12345678", "user_1").await.unwrap_err();
        assert_eq!(err, PipelineError::DeadlineExceeded(Duration::from_millis(200)));
        assert_eq!(err.code(), "TIMEOUT");
    }

    #[tokio::test]
    async fn concurrent_generation_of_one_response_is_rejected() {
        let converter = Arc::new(RecordingConverter::default());
        let h = harness(store_with(response(answers())), converter, PipelineConfig::default());

        let held = h.orchestrator.locks.acquire_document_lock("resp_12345678").await.unwrap();
        let err = h
            .orchestrator
            .generate_document_exclusive("resp_12345678", "user_1")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "GENERATION_IN_PROGRESS");

        h.orchestrator.locks.release(&held.resource, &held.token).await.unwrap();
        let doc = h
            .orchestrator
            .generate_document_exclusive("resp_12345678", "user_1")
            .await
            .unwrap();
        assert_eq!(doc.sections.len(), 3);
        assert!(!h.orchestrator.locks.status("pdf-gen:resp_12345678").await.unwrap().locked);
    }

    // ═══════════════════════════════════════════
    // Helpers
    // ═══════════════════════════════════════════

    #[test]
    fn request_id_format() {
        let at = DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z").unwrap().with_timezone(&Utc);
        assert_eq!(request_id_for("resp_12345678", at), "pdf_1717243200_resp_123");
        assert_eq!(request_id_for("abcde", at), "pdf_1717243200_abcde");
    }

    #[test]
    fn checksum_is_sha256_prefix() {
        // sha256("abc") = ba7816bf8f01cfea...
        assert_eq!(checksum(b"abc"), "ba7816bf8f01cfea");
    }

    #[test]
    fn order_follows_clinical_sequence() {
        let matches = vec![
            PatternMatch::new(PatternKind::Signature, ["s".to_string()].into()),
            PatternMatch::new(PatternKind::PatientDemographics, ["d".to_string()].into()),
            PatternMatch::new(PatternKind::NeckDisabilityIndex, ["n".to_string()].into()),
        ];
        let kinds: Vec<PatternKind> = render_order(&matches).into_iter().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            vec![PatternKind::PatientDemographics, PatternKind::NeckDisabilityIndex, PatternKind::Signature]
        );
    }

    #[test]
    fn order_keeps_the_first_match_of_each_kind() {
        let matches = vec![
            PatternMatch::new(PatternKind::Signature, ["first".to_string()].into()),
            PatternMatch::new(PatternKind::PatientVitals, ["v".to_string()].into()),
            PatternMatch::new(PatternKind::Signature, ["second".to_string()].into()),
        ];
        let ordered = render_order(&matches);
        assert_eq!(ordered.len(), 2);
        assert_eq!(ordered[0].kind, PatternKind::PatientVitals);
        assert!(ordered[1].matched_fields.contains("first"));
    }
}
