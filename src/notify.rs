//! Report mail composition. Delivery is handled outside this crate.

use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDateTime;

use crate::config::NotificationConfig;
use crate::recap::Recap;

/// Body placeholders filled from recap counts, keyed by checklist stem.
const COUNT_PLACEHOLDERS: [(&str, &str); 5] = [
    ("commercial_count", "checklist_équipe_commercial"),
    ("admin_depot_count", "checklist_admin_dépôt_initial"),
    ("admin_verif_count", "checklist_admin_vérifier_dépôt"),
    ("cindy_count", "checklist_cindy"),
    ("facturation_retard_count", "checklist_facturation_en_retard"),
];

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationMessage {
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<PathBuf>,
}

/// Fill the configured templates from the recap.
///
/// Missing checklists count as 0; `{total_count}` is the sum of the
/// placeholder counts.
pub fn compose(
    recap: &Recap,
    config: &NotificationConfig,
    generated_at: NaiveDateTime,
) -> NotificationMessage {
    let mut body = config.body_template.clone();
    let mut total = 0usize;
    for (placeholder, stem) in COUNT_PLACEHOLDERS {
        let count = recap.rows_for(stem).unwrap_or(0);
        total += count;
        body = body.replace(&format!("{{{placeholder}}}"), &count.to_string());
    }
    body = body
        .replace("{total_count}", &total.to_string())
        .replace(
            "{generation_date}",
            &generated_at.format("%d/%m/%Y à %H:%M").to_string(),
        );
    body.push_str(&config.signature);

    NotificationMessage {
        recipients: config.recipients.clone(),
        subject: config
            .subject
            .replace("{date}", &generated_at.format("%Y-%m-%d").to_string()),
        body,
        attachments: recap.files(),
    }
}

impl fmt::Display for NotificationMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "To: {}", self.recipients.join(", "))?;
        writeln!(f, "Subject: {}", self.subject)?;
        for attachment in &self.attachments {
            writeln!(f, "Attachment: {}", attachment.display())?;
        }
        writeln!(f)?;
        f.write_str(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recap::RecapEntry;
    use chrono::NaiveDate;

    fn recap() -> Recap {
        Recap {
            entries: vec![
                RecapEntry {
                    file: "checklist_cindy.csv".into(),
                    rows: 4,
                },
                RecapEntry {
                    file: "checklist_equipe_commercial.csv".into(),
                    rows: 3,
                },
                RecapEntry {
                    file: "tresorerie_en_retard.csv".into(),
                    rows: 2,
                },
            ],
            path: PathBuf::from("Checklist/checklist_recap.csv"),
        }
    }

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(8, 5, 0)
            .unwrap()
    }

    #[test]
    fn body_carries_counts() {
        let message = compose(&recap(), &NotificationConfig::default(), at());
        assert_eq!(
            message.subject,
            "Rapport PERSPECTIVIA - Checklists par équipe (2025-03-01)"
        );
        assert!(message.body.contains("(4) nombre de ligne dans checklist_cindy"));
        // accent-insensitive stem lookup
        assert!(message.body.contains("(3) nombre de ligne dans checklist_équipe_commercial"));
        assert!(message.body.contains("(0) nombre de ligne dans checklist_admin_dépôt_initial"));
        assert!(message.body.contains("TOTAL : 7 dossiers"));
        assert!(message.body.contains("01/03/2025 à 08:05"));
        assert!(!message.body.contains('{'));
    }

    #[test]
    fn attachments_end_with_recap() {
        let message = compose(&recap(), &NotificationConfig::default(), at());
        assert_eq!(message.attachments.len(), 4);
        assert_eq!(
            message.attachments.last(),
            Some(&PathBuf::from("Checklist/checklist_recap.csv"))
        );
        assert_eq!(
            message.attachments[0],
            PathBuf::from("Checklist/checklist_cindy.csv")
        );
    }
}
