//! Core entity types: projects, documents, milestones, progress snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Tracks & milestone rules
// ============================================================================

/// One of the two independent milestone sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Track {
    /// Regulatory/paperwork milestones, evaluated as a prerequisite graph.
    Admin,
    /// Construction milestones, evaluated as a strict ordered prefix.
    Engineering,
}

impl Track {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Engineering => "engineering",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "engineering" => Some(Self::Engineering),
            _ => None,
        }
    }
}

impl std::fmt::Display for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the reconciler decides whether a rule is satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchCriterion {
    /// Always true; used for the "project created" root milestone.
    ProjectExists,
    /// A matching document has been submitted (or issued, or has a file
    /// attached when the rule accepts attachments as proof).
    DocumentSubmitted,
    /// A matching document has been issued (or has a file attached when the
    /// rule accepts attachments as proof).
    DocumentIssued,
    /// Every prerequisite code is satisfied; used for terminal milestones.
    AllPrerequisites,
}

impl MatchCriterion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProjectExists => "project_exists",
            Self::DocumentSubmitted => "document_submitted",
            Self::DocumentIssued => "document_issued",
            Self::AllPrerequisites => "all_prerequisites",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "project_exists" => Some(Self::ProjectExists),
            "document_submitted" => Some(Self::DocumentSubmitted),
            "document_issued" => Some(Self::DocumentIssued),
            "all_prerequisites" => Some(Self::AllPrerequisites),
            _ => None,
        }
    }
}

/// One step of an ordered document lookup. Selectors are tried in order and
/// the first document hit wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DocSelector {
    /// Exact document-type code match.
    Code(String),
    /// Ordered list of acceptable free-text type labels.
    LabelList(Vec<String>),
    /// Single legacy free-text label.
    LegacyLabel(String),
}

impl DocSelector {
    /// Whether a document matches this selector.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Self::Code(code) => doc.doc_type_code.as_deref() == Some(code.as_str()),
            Self::LabelList(labels) => doc
                .legacy_type
                .as_deref()
                .map(|label| labels.iter().any(|l| l == label))
                .unwrap_or(false),
            Self::LegacyLabel(label) => doc.legacy_type.as_deref() == Some(label.as_str()),
        }
    }
}

/// Static definition of one step in a milestone track.
///
/// Seeded once as configuration and read-only during reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneRule {
    /// Unique code, e.g. `ADMIN_07_PPA_SIGNED`.
    pub code: String,
    pub track: Track,
    /// Human-readable stage label shown when this is the next incomplete step.
    pub label: String,
    /// Non-negative contribution to the track percentage.
    pub weight: f64,
    /// Canonical display/evaluation order within the track.
    pub sort_order: i32,
    /// Rule codes that must be satisfied first (admin track only; the
    /// engineering track uses strict sequential-prefix semantics).
    pub prerequisites: Vec<String>,
    pub criterion: MatchCriterion,
    /// Ordered document lookup used when the criterion involves a document.
    pub selectors: Vec<DocSelector>,
    /// Treat the presence of an attached file as proof of submission/issuance
    /// when the explicit date is missing (historical data may lack dates).
    pub treat_attachment_as_proof: bool,
    /// Inactive rules are excluded from evaluation and weight sums.
    pub active: bool,
}

impl MilestoneRule {
    /// Find the first document matched by this rule's selectors, trying
    /// selectors in order; within a selector the first document wins.
    pub fn find_document<'a>(&self, docs: &'a [Document]) -> Option<&'a Document> {
        for selector in &self.selectors {
            if let Some(doc) = docs.iter().find(|d| selector.matches(d)) {
                return Some(doc);
            }
        }
        None
    }
}

// ============================================================================
// Project milestones
// ============================================================================

/// Project-specific completion record for one rule.
///
/// Completion is monotonic: once `is_completed` is true, reconciliation never
/// flips it back. Only explicit user action may uncomplete a milestone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMilestone {
    pub project_id: i64,
    pub milestone_code: String,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_by: Option<String>,
    /// Why this was marked complete (manual vs. derived).
    pub note: Option<String>,
}

impl ProjectMilestone {
    pub fn derived(
        project_id: i64,
        code: &str,
        completed_at: DateTime<Utc>,
        note: &str,
    ) -> Self {
        Self {
            project_id,
            milestone_code: code.to_string(),
            is_completed: true,
            completed_at: Some(completed_at),
            completed_by: None,
            note: Some(note.to_string()),
        }
    }
}

// ============================================================================
// Documents
// ============================================================================

/// One versioned document of a given type attached to a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: i64,
    pub project_id: i64,
    /// Versioning key: the type code when present, otherwise the legacy label.
    pub type_key: String,
    pub doc_type_code: Option<String>,
    /// Legacy free-text type label.
    pub legacy_type: Option<String>,
    /// Positive, unique per (project, type key) among non-deleted rows.
    pub version: i64,
    pub is_current: bool,
    pub is_deleted: bool,
    pub is_archived: bool,
    pub submitted_at: Option<DateTime<Utc>>,
    pub issued_at: Option<DateTime<Utc>>,
    /// Number of file attachments recorded for this row.
    pub attachment_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn has_attachment(&self) -> bool {
        self.attachment_count > 0
    }
}

/// Filter for fetching documents.
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    /// Only rows with `is_current = true`.
    pub current_only: bool,
    /// Include soft-deleted rows (excluded by default).
    pub include_deleted: bool,
    /// Restrict to one versioning key.
    pub type_key: Option<String>,
}

// ============================================================================
// Projects & derived progress
// ============================================================================

/// Coarse construction status, derived purely from engineering milestones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConstructionStatus {
    #[default]
    NotStarted,
    Started,
    AwaitingMeter,
    MeterInstalled,
}

impl ConstructionStatus {
    /// Display string, as persisted and shown to users.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "尚未開工",
            Self::Started => "已開工",
            Self::AwaitingMeter => "待掛錶",
            Self::MeterInstalled => "已掛錶",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "尚未開工" => Some(Self::NotStarted),
            "已開工" => Some(Self::Started),
            "待掛錶" => Some(Self::AwaitingMeter),
            "已掛錶" => Some(Self::MeterInstalled),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConstructionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Derived, cached progress summary for one project.
///
/// Always fully recomputable from rule + milestone state; a cache, never a
/// source of truth.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    /// 0–100, rounded to 2 decimals.
    pub admin_progress: f64,
    pub engineering_progress: f64,
    pub overall_progress: f64,
    /// Label of the next incomplete admin milestone, or the terminal label.
    pub admin_stage: Option<String>,
    /// Label of the highest validated engineering milestone, if any.
    pub engineering_stage: Option<String>,
    pub construction_status: ConstructionStatus,
}

/// A solar-installation project.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub capacity_kw: Option<f64>,
    #[serde(flatten)]
    pub progress: ProgressSnapshot,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Blend weights for the overall percentage. Passed explicitly into every
/// reconciliation call so the computation is reproducible in tests.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightConfig {
    pub admin_weight: f64,
    pub engineering_weight: f64,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            admin_weight: 50.0,
            engineering_weight: 50.0,
        }
    }
}
