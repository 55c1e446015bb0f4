//! Milestone progress reconciler.
//!
//! Recomputes which milestones a project satisfies from its current
//! documents and stored milestone rows, derives the progress snapshot
//! (admin/engineering/overall percentages, stage labels, construction
//! status), and persists the delta: new completions are inserted, existing
//! rows are only ever flipped false to true, and the snapshot is written
//! back best-effort.
//!
//! The admin track is a prerequisite graph walked in sort order; the
//! engineering track is a strict ordered prefix that stalls at the first
//! incomplete rule.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use solstice_model::rules::ADMIN_COMPLETE_LABEL;
use solstice_model::{
    ConstructionStatus, Document, DocumentFilter, MatchCriterion, MilestoneRule,
    ProgressSnapshot, ProjectMilestone, Track, WeightConfig,
};

use crate::store::{DocumentStore, ProjectStore, StoreResult};

/// Note recorded when a completion date came from the matched document.
pub const NOTE_DATE_DRIVEN: &str = "derived from document date";
/// Note recorded when satisfaction was derived without an explicit date.
pub const NOTE_FALLBACK: &str = "derived, no document date available";

/// Pure evaluation result, before any persistence.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub snapshot: ProgressSnapshot,
    /// Milestone rows to insert or flip to completed, in evaluation order.
    pub completions: Vec<ProjectMilestone>,
}

/// What one reconciliation run did.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub project_id: i64,
    pub snapshot: ProgressSnapshot,
    pub newly_completed: Vec<String>,
    pub milestones_written: usize,
    pub progress_written: bool,
}

/// Evaluate both tracks for one project. Pure: no store access.
pub fn evaluate_project(
    project_id: i64,
    rules: &[MilestoneRule],
    docs: &[Document],
    existing: &[ProjectMilestone],
    weights: &WeightConfig,
    now: DateTime<Utc>,
) -> Evaluation {
    let stored: HashMap<&str, &ProjectMilestone> = existing
        .iter()
        .map(|m| (m.milestone_code.as_str(), m))
        .collect();

    let admin_rules = track_rules(rules, Track::Admin);
    let eng_rules = track_rules(rules, Track::Engineering);

    let mut completions = Vec::new();

    // ------------------------------------------------------------------
    // Admin track: prerequisite-graph walk in sort order.
    // ------------------------------------------------------------------
    let mut satisfied: HashSet<String> = HashSet::new();
    for rule in &admin_rules {
        // Monotonicity: a stored completion stays satisfied regardless of
        // what the documents say today.
        if stored
            .get(rule.code.as_str())
            .map(|m| m.is_completed)
            .unwrap_or(false)
        {
            satisfied.insert(rule.code.clone());
            continue;
        }

        if !rule
            .prerequisites
            .iter()
            .all(|code| satisfied.contains(code))
        {
            continue;
        }

        let hit = match rule.criterion {
            MatchCriterion::ProjectExists | MatchCriterion::AllPrerequisites => Some(None),
            MatchCriterion::DocumentSubmitted | MatchCriterion::DocumentIssued => {
                evaluate_document_criterion(rule, docs)
            }
        };

        if let Some(doc_date) = hit {
            satisfied.insert(rule.code.clone());
            completions.push(completion_row(project_id, &rule.code, doc_date, now));
        }
    }

    let admin_progress = weighted_progress(&satisfied, &admin_rules);
    let admin_stage = admin_rules
        .iter()
        .find(|r| !satisfied.contains(&r.code))
        .map(|r| r.label.clone())
        .or_else(|| {
            if admin_rules.is_empty() {
                None
            } else {
                Some(ADMIN_COMPLETE_LABEL.to_string())
            }
        });

    // ------------------------------------------------------------------
    // Engineering track: strict ordered-prefix validation.
    // ------------------------------------------------------------------
    let mut validated: HashSet<String> = HashSet::new();
    let mut eng_stage: Option<String> = None;
    for (idx, rule) in eng_rules.iter().enumerate() {
        let stored_complete = stored
            .get(rule.code.as_str())
            .map(|m| m.is_completed)
            .unwrap_or(false);
        let doc_hit = if stored_complete {
            None
        } else {
            evaluate_document_criterion(rule, docs)
        };
        let raw = stored_complete || doc_hit.is_some();

        // The first incomplete rule halts validation of everything after it.
        if !raw {
            break;
        }

        // The terminal handover rule additionally requires every other rule
        // to be validated, guarding against an edited sequence.
        let is_terminal = idx + 1 == eng_rules.len();
        if is_terminal && validated.len() + 1 != eng_rules.len() {
            break;
        }

        validated.insert(rule.code.clone());
        eng_stage = Some(rule.label.clone());
        if !stored_complete {
            if let Some(doc_date) = doc_hit {
                completions.push(completion_row(project_id, &rule.code, doc_date, now));
            }
        }
    }

    let engineering_progress = weighted_progress(&validated, &eng_rules);
    let construction_status = derive_construction_status(&eng_rules, &validated);

    let overall_progress = round2(
        admin_progress * weights.admin_weight / 100.0
            + engineering_progress * weights.engineering_weight / 100.0,
    );

    Evaluation {
        snapshot: ProgressSnapshot {
            admin_progress,
            engineering_progress,
            overall_progress,
            admin_stage,
            engineering_stage: eng_stage,
            construction_status,
        },
        completions,
    }
}

/// Reconcile one project: fetch, evaluate, persist.
pub async fn reconcile_project<S>(
    store: &S,
    project_id: i64,
    rules: &[MilestoneRule],
    weights: &WeightConfig,
) -> StoreResult<ReconcileOutcome>
where
    S: DocumentStore + ProjectStore,
{
    let filter = current_docs_filter();
    let docs = store.fetch_documents(&[project_id], &filter).await?;
    let milestones = store.fetch_milestones(&[project_id]).await?;
    reconcile_with_data(store, project_id, &docs, &milestones, rules, weights).await
}

/// Reconcile many projects in one pass. Documents and milestones are
/// bulk-fetched up front; the per-project write loop stays sequential to
/// keep write ordering predictable. Produces the same state per project as
/// the single-project path.
pub async fn reconcile_all<S>(
    store: &S,
    project_ids: &[i64],
    rules: &[MilestoneRule],
    weights: &WeightConfig,
) -> StoreResult<Vec<ReconcileOutcome>>
where
    S: DocumentStore + ProjectStore,
{
    let filter = current_docs_filter();
    let docs = store.fetch_documents(project_ids, &filter).await?;
    let milestones = store.fetch_milestones(project_ids).await?;

    let mut docs_by_project: HashMap<i64, Vec<Document>> = HashMap::new();
    for doc in docs {
        docs_by_project.entry(doc.project_id).or_default().push(doc);
    }
    let mut milestones_by_project: HashMap<i64, Vec<ProjectMilestone>> = HashMap::new();
    for m in milestones {
        milestones_by_project
            .entry(m.project_id)
            .or_default()
            .push(m);
    }

    let mut outcomes = Vec::with_capacity(project_ids.len());
    for &project_id in project_ids {
        let docs = docs_by_project
            .get(&project_id)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let milestones = milestones_by_project
            .get(&project_id)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let outcome =
            reconcile_with_data(store, project_id, docs, milestones, rules, weights).await?;
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

async fn reconcile_with_data<S>(
    store: &S,
    project_id: i64,
    docs: &[Document],
    existing: &[ProjectMilestone],
    rules: &[MilestoneRule],
    weights: &WeightConfig,
) -> StoreResult<ReconcileOutcome>
where
    S: DocumentStore + ProjectStore,
{
    let eval = evaluate_project(project_id, rules, docs, existing, weights, Utc::now());

    let mut milestones_written = 0;
    for milestone in &eval.completions {
        store.upsert_milestone(milestone).await?;
        milestones_written += 1;
    }
    if milestones_written > 0 {
        info!(
            project_id,
            count = milestones_written,
            "recorded newly completed milestones"
        );
    }

    // The snapshot is a recomputable cache: a failed read or write here is
    // logged and never rolls back the milestone rows above. An unreadable
    // stored snapshot just forfeits the unchanged-skip and writes fresh.
    let stored = match store.fetch_progress(project_id).await {
        Ok(snapshot) => snapshot,
        Err(err) => {
            warn!(project_id, %err, "failed to read stored progress; writing a fresh snapshot");
            None
        }
    };
    let mut progress_written = false;
    if stored.as_ref() != Some(&eval.snapshot) {
        match store.update_project_progress(project_id, &eval.snapshot).await {
            Ok(()) => progress_written = true,
            Err(err) => {
                warn!(project_id, %err, "failed to persist derived progress; stale until next run")
            }
        }
    } else {
        debug!(project_id, "derived progress unchanged, skipping write");
    }

    Ok(ReconcileOutcome {
        project_id,
        newly_completed: eval
            .completions
            .iter()
            .map(|m| m.milestone_code.clone())
            .collect(),
        snapshot: eval.snapshot,
        milestones_written,
        progress_written,
    })
}

fn current_docs_filter() -> DocumentFilter {
    DocumentFilter {
        current_only: true,
        ..Default::default()
    }
}

fn track_rules(rules: &[MilestoneRule], track: Track) -> Vec<MilestoneRule> {
    let mut out: Vec<MilestoneRule> = rules
        .iter()
        .filter(|r| r.track == track && r.active)
        .cloned()
        .collect();
    out.sort_by_key(|r| r.sort_order);
    out
}

/// Evaluate a document-backed criterion. `Some(date)` means satisfied, with
/// the document date to use as the completion timestamp when present. A
/// missing document or missing evidence is "not yet satisfied", never an
/// error.
fn evaluate_document_criterion(
    rule: &MilestoneRule,
    docs: &[Document],
) -> Option<Option<DateTime<Utc>>> {
    let doc = rule.find_document(docs)?;
    let attachment_proof = rule.treat_attachment_as_proof && doc.has_attachment();
    match rule.criterion {
        MatchCriterion::DocumentSubmitted => {
            // Issued or attached implies, transitively, submitted.
            if doc.submitted_at.is_some() || doc.issued_at.is_some() || attachment_proof {
                Some(doc.submitted_at.or(doc.issued_at))
            } else {
                None
            }
        }
        MatchCriterion::DocumentIssued => {
            if doc.issued_at.is_some() || attachment_proof {
                Some(doc.issued_at)
            } else {
                None
            }
        }
        MatchCriterion::ProjectExists | MatchCriterion::AllPrerequisites => Some(None),
    }
}

fn completion_row(
    project_id: i64,
    code: &str,
    doc_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> ProjectMilestone {
    match doc_date {
        Some(date) => ProjectMilestone::derived(project_id, code, date, NOTE_DATE_DRIVEN),
        None => ProjectMilestone::derived(project_id, code, now, NOTE_FALLBACK),
    }
}

fn derive_construction_status(
    eng_rules: &[MilestoneRule],
    validated: &HashSet<String>,
) -> ConstructionStatus {
    let terminal = eng_rules.last();
    let second_to_last = eng_rules.len().checked_sub(2).and_then(|i| eng_rules.get(i));

    if terminal.map(|r| validated.contains(&r.code)).unwrap_or(false) {
        ConstructionStatus::MeterInstalled
    } else if second_to_last
        .map(|r| validated.contains(&r.code))
        .unwrap_or(false)
    {
        ConstructionStatus::AwaitingMeter
    } else if !validated.is_empty() {
        ConstructionStatus::Started
    } else {
        ConstructionStatus::NotStarted
    }
}

/// Percent of track weight covered by the satisfied set, 2-decimal rounded.
/// A zero or empty weight sum yields 0 rather than dividing by zero.
fn weighted_progress(satisfied: &HashSet<String>, rules: &[MilestoneRule]) -> f64 {
    let total: f64 = rules.iter().map(|r| r.weight).sum();
    if total <= 0.0 {
        return 0.0;
    }
    let done: f64 = rules
        .iter()
        .filter(|r| satisfied.contains(&r.code))
        .map(|r| r.weight)
        .sum();
    round2(100.0 * done / total)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
