//! Default milestone rule tables for the admin and engineering tracks.
//!
//! Seeded once into the store at init and read-only during reconciliation.
//! Weights within each track sum to 100 so a fully satisfied track reads as
//! 100% without normalization surprises, but the reconciler never relies on
//! that: percentages are always weight-sum relative.

use crate::{DocSelector, MatchCriterion, MilestoneRule, Track};

/// Stage label reported once every admin milestone is satisfied.
pub const ADMIN_COMPLETE_LABEL: &str = "已結案";

pub const ADMIN_PROJECT_CREATED: &str = "ADMIN_01_PROJECT_CREATED";
pub const ADMIN_GRID_APPLICATION: &str = "ADMIN_02_GRID_APPLICATION";
pub const ADMIN_REVIEW_OPINION: &str = "ADMIN_03_REVIEW_OPINION";
pub const ADMIN_FILING_CONSENT: &str = "ADMIN_04_FILING_CONSENT";
pub const ADMIN_MISC_LICENSE: &str = "ADMIN_05_MISC_LICENSE";
pub const ADMIN_GRID_AGREEMENT: &str = "ADMIN_06_GRID_AGREEMENT";
pub const ADMIN_PPA_SIGNED: &str = "ADMIN_07_PPA_SIGNED";
pub const ADMIN_DEVICE_REGISTRATION: &str = "ADMIN_08_DEVICE_REGISTRATION";
pub const ADMIN_CLOSED: &str = "ADMIN_09_CLOSED";

pub const ENG_CONSTRUCTION_START: &str = "ENG_01_CONSTRUCTION_START";
pub const ENG_CIVIL_WORKS: &str = "ENG_02_CIVIL_WORKS";
pub const ENG_MOUNTING_COMPLETE: &str = "ENG_03_MOUNTING_COMPLETE";
pub const ENG_MODULES_INSTALLED: &str = "ENG_04_MODULES_INSTALLED";
pub const ENG_COMPLETION_INSPECTION: &str = "ENG_05_COMPLETION_INSPECTION";
pub const ENG_METER_HANDOVER: &str = "ENG_06_METER_HANDOVER";

fn rule(
    code: &str,
    track: Track,
    label: &str,
    weight: f64,
    sort_order: i32,
    prerequisites: &[&str],
    criterion: MatchCriterion,
    selectors: Vec<DocSelector>,
) -> MilestoneRule {
    MilestoneRule {
        code: code.to_string(),
        track,
        label: label.to_string(),
        weight,
        sort_order,
        prerequisites: prerequisites.iter().map(|s| s.to_string()).collect(),
        criterion,
        selectors,
        treat_attachment_as_proof: true,
        active: true,
    }
}

/// The admin (regulatory/paperwork) track, evaluated as a prerequisite graph.
pub fn default_admin_rules() -> Vec<MilestoneRule> {
    use MatchCriterion::*;

    vec![
        rule(
            ADMIN_PROJECT_CREATED,
            Track::Admin,
            "案件成立",
            5.0,
            1,
            &[],
            ProjectExists,
            vec![],
        ),
        rule(
            ADMIN_GRID_APPLICATION,
            Track::Admin,
            "併聯申請送件",
            10.0,
            2,
            &[ADMIN_PROJECT_CREATED],
            DocumentSubmitted,
            vec![
                DocSelector::Code("GRID_APP".into()),
                DocSelector::LabelList(vec!["台電併聯申請書".into(), "併聯申請書".into()]),
                DocSelector::LegacyLabel("併聯申請".into()),
            ],
        ),
        rule(
            ADMIN_REVIEW_OPINION,
            Track::Admin,
            "併聯審查意見書取得",
            15.0,
            3,
            &[ADMIN_GRID_APPLICATION],
            DocumentIssued,
            vec![
                DocSelector::Code("REVIEW_OPINION".into()),
                DocSelector::LabelList(vec!["併聯審查意見書".into()]),
                DocSelector::LegacyLabel("審查意見書".into()),
            ],
        ),
        rule(
            ADMIN_FILING_CONSENT,
            Track::Admin,
            "同意備案取得",
            15.0,
            4,
            &[ADMIN_REVIEW_OPINION],
            DocumentIssued,
            vec![
                DocSelector::Code("FILING_CONSENT".into()),
                DocSelector::LabelList(vec!["同意備案函".into(), "能源局同意備案".into()]),
                DocSelector::LegacyLabel("同意備案".into()),
            ],
        ),
        rule(
            ADMIN_MISC_LICENSE,
            Track::Admin,
            "免雜項執照取得",
            10.0,
            5,
            &[ADMIN_FILING_CONSENT],
            DocumentIssued,
            vec![
                DocSelector::Code("MISC_LICENSE".into()),
                DocSelector::LabelList(vec!["免雜項執照證明".into(), "雜項執照".into()]),
                DocSelector::LegacyLabel("雜照".into()),
            ],
        ),
        // Branches off ADMIN_04 in parallel with the misc license.
        rule(
            ADMIN_GRID_AGREEMENT,
            Track::Admin,
            "併聯工程費用繳納",
            10.0,
            6,
            &[ADMIN_FILING_CONSENT],
            DocumentSubmitted,
            vec![
                DocSelector::Code("GRID_AGREEMENT".into()),
                DocSelector::LabelList(vec!["併聯工程費用繳納證明".into()]),
            ],
        ),
        rule(
            ADMIN_PPA_SIGNED,
            Track::Admin,
            "購售電合約簽訂",
            15.0,
            7,
            &[ADMIN_GRID_AGREEMENT],
            DocumentIssued,
            vec![
                DocSelector::Code("PPA".into()),
                DocSelector::LabelList(vec!["正式購售電合約".into(), "購售電合約".into()]),
                DocSelector::LegacyLabel("PPA".into()),
            ],
        ),
        rule(
            ADMIN_DEVICE_REGISTRATION,
            Track::Admin,
            "設備登記取得",
            10.0,
            8,
            &[ADMIN_PPA_SIGNED],
            DocumentIssued,
            vec![
                DocSelector::Code("DEVICE_REG".into()),
                DocSelector::LabelList(vec!["設備登記函".into()]),
            ],
        ),
        rule(
            ADMIN_CLOSED,
            Track::Admin,
            "結案",
            10.0,
            9,
            &[
                ADMIN_PROJECT_CREATED,
                ADMIN_GRID_APPLICATION,
                ADMIN_REVIEW_OPINION,
                ADMIN_FILING_CONSENT,
                ADMIN_MISC_LICENSE,
                ADMIN_GRID_AGREEMENT,
                ADMIN_PPA_SIGNED,
                ADMIN_DEVICE_REGISTRATION,
            ],
            AllPrerequisites,
            vec![],
        ),
    ]
}

/// The engineering (construction) track, a strictly ordered list. The final
/// rule is the meter handover; the one before it gates "awaiting meter".
pub fn default_engineering_rules() -> Vec<MilestoneRule> {
    use MatchCriterion::*;

    vec![
        rule(
            ENG_CONSTRUCTION_START,
            Track::Engineering,
            "開工",
            10.0,
            1,
            &[],
            DocumentSubmitted,
            vec![
                DocSelector::Code("CONSTRUCTION_START".into()),
                DocSelector::LabelList(vec!["開工報告".into()]),
            ],
        ),
        // Site-visit toggles: no document selectors, completed manually.
        rule(
            ENG_CIVIL_WORKS,
            Track::Engineering,
            "基礎工程完成",
            20.0,
            2,
            &[],
            DocumentSubmitted,
            vec![],
        ),
        rule(
            ENG_MOUNTING_COMPLETE,
            Track::Engineering,
            "支架安裝完成",
            20.0,
            3,
            &[],
            DocumentSubmitted,
            vec![],
        ),
        rule(
            ENG_MODULES_INSTALLED,
            Track::Engineering,
            "模組安裝完成",
            20.0,
            4,
            &[],
            DocumentSubmitted,
            vec![],
        ),
        rule(
            ENG_COMPLETION_INSPECTION,
            Track::Engineering,
            "竣工查驗",
            15.0,
            5,
            &[],
            DocumentIssued,
            vec![
                DocSelector::Code("COMPLETION_REPORT".into()),
                DocSelector::LabelList(vec!["竣工報告".into()]),
            ],
        ),
        rule(
            ENG_METER_HANDOVER,
            Track::Engineering,
            "掛錶",
            15.0,
            6,
            &[],
            DocumentIssued,
            vec![
                DocSelector::Code("METER_RECORD".into()),
                DocSelector::LabelList(vec!["掛錶紀錄".into()]),
            ],
        ),
    ]
}

/// Both tracks, admin first.
pub fn default_rules() -> Vec<MilestoneRule> {
    let mut rules = default_admin_rules();
    rules.extend(default_engineering_rules());
    rules
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_sum_to_100_per_track() {
        let admin: f64 = default_admin_rules().iter().map(|r| r.weight).sum();
        let eng: f64 = default_engineering_rules().iter().map(|r| r.weight).sum();
        assert!((admin - 100.0).abs() < 1e-9);
        assert!((eng - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_codes_unique_and_ordered() {
        let rules = default_rules();
        let mut codes: Vec<&str> = rules.iter().map(|r| r.code.as_str()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), rules.len());

        for track in [Track::Admin, Track::Engineering] {
            let orders: Vec<i32> = rules
                .iter()
                .filter(|r| r.track == track)
                .map(|r| r.sort_order)
                .collect();
            let mut sorted = orders.clone();
            sorted.sort();
            assert_eq!(orders, sorted);
        }
    }

    #[test]
    fn test_admin_prerequisites_refer_to_earlier_rules() {
        let rules = default_admin_rules();
        let mut seen: Vec<&str> = Vec::new();
        for r in &rules {
            for p in &r.prerequisites {
                assert!(seen.contains(&p.as_str()), "{} before {}", p, r.code);
            }
            seen.push(r.code.as_str());
        }
    }
}
