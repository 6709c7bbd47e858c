use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::{StatusCatalog, StatusCategory};
use crate::checklist::{ChecklistRule, ChecklistSpec};
use crate::error::ReportError;
use crate::schema::{artifact, formation, summary};
use crate::text::canonical_key;

// ── Config ──────────────────────────────────────────────────────────────────

/// Upper bound for `treasury_lookback_days` (a century).
pub const MAX_LOOKBACK_DAYS: i64 = 36_500;

/// Run configuration. Every field has a default so a partial TOML file works.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Spreadsheet produced by the acquisition step (xlsx/xls/ods or `;` CSV)
    pub input: PathBuf,
    /// Sheet to read from a workbook (ignored for CSV input)
    pub sheet: String,
    /// Partitions, summary, intermediary and promo artifacts
    pub output_dir: PathBuf,
    /// Checklists and recap
    pub checklist_dir: PathBuf,
    /// Estimated revenue per Prévisionnel / Potentiel formation
    pub revenue_per_unit: f64,
    /// Age (days since training start) after which an invoiced formation is overdue
    pub treasury_lookback_days: i64,
    pub payment_columns: Vec<String>,
    pub catalog: StatusCatalog,
    pub checklists: Vec<ChecklistSpec>,
    pub notification: NotificationConfig,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("NOUVEAU FAC PERSPECTIVIA.xlsx"),
            sheet: "2025".to_string(),
            output_dir: PathBuf::from("Données transformées"),
            checklist_dir: PathBuf::from("Checklist"),
            revenue_per_unit: 3100.0,
            treasury_lookback_days: 90,
            payment_columns: formation::PAYMENTS.iter().map(|s| s.to_string()).collect(),
            catalog: StatusCatalog::default(),
            checklists: default_checklists(),
            notification: NotificationConfig::default(),
        }
    }
}

fn detail(name: &str, category: StatusCategory, value: &str) -> ChecklistSpec {
    ChecklistSpec {
        name: name.to_string(),
        rule: ChecklistRule::DetailEquals {
            category,
            value: value.to_string(),
        },
    }
}

/// The per-team action lists.
pub fn default_checklists() -> Vec<ChecklistSpec> {
    vec![
        detail("checklist_cindy", StatusCategory::Reel, "PEC accordé"),
        detail(
            "checklist_admin_dépôt_initial",
            StatusCategory::Potentiel,
            "Signature bi-parti à déposer",
        ),
        detail(
            "checklist_admin_vérifier_dépôt",
            StatusCategory::Potentiel,
            "Dépôt brouillon",
        ),
        detail(
            "checklist_équipe_commercial",
            StatusCategory::Potentiel,
            "Manque signatures",
        ),
        detail(
            "dépôt_que_le_client_doit_effectuer",
            StatusCategory::Potentiel,
            "Dépôt irréalisable faute de mandat",
        ),
        ChecklistSpec {
            name: "checklist_facturation_en_retard".to_string(),
            rule: ChecklistRule::InvoiceOverdue,
        },
        ChecklistSpec {
            name: "tresorerie_en_retard".to_string(),
            rule: ChecklistRule::TreasuryOverdue {
                value: "Facturé".to_string(),
            },
        },
    ]
}

impl ReportConfig {
    /// Load from a TOML file, or defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ReportError> {
        let config = match path {
            Some(p) => {
                let text = fs::read_to_string(p).map_err(|e| {
                    ReportError::Config(format!("cannot read {}: {e}", p.display()))
                })?;
                toml::from_str::<ReportConfig>(&text)?
            }
            None => ReportConfig::default(),
        };
        config.validate()?;
        debug!(?config, "configuration loaded");
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ReportError> {
        toml::to_string_pretty(self).map_err(|e| ReportError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ReportError> {
        if !self.revenue_per_unit.is_finite() || self.revenue_per_unit < 0.0 {
            return Err(ReportError::Config(format!(
                "revenue_per_unit must be a non-negative number, got {}",
                self.revenue_per_unit
            )));
        }
        if !(0..=MAX_LOOKBACK_DAYS).contains(&self.treasury_lookback_days) {
            return Err(ReportError::Config(format!(
                "treasury_lookback_days must be within 0..={MAX_LOOKBACK_DAYS}, got {}",
                self.treasury_lookback_days
            )));
        }
        if same_dir(&self.output_dir, &self.checklist_dir) {
            return Err(ReportError::Config(format!(
                "output_dir and checklist_dir must differ: {}",
                self.output_dir.display()
            )));
        }
        self.catalog.validate()?;
        self.validate_summary_columns()?;

        let recap_stem = artifact::RECAP.trim_end_matches(".csv");
        let mut names = HashSet::new();
        for spec in &self.checklists {
            let name = spec.name.trim();
            if name.is_empty() {
                return Err(ReportError::Config("checklist with an empty name".into()));
            }
            if name.contains(['/', '\\']) {
                return Err(ReportError::Config(format!(
                    "checklist name '{name}' must be a plain file stem"
                )));
            }
            if name == recap_stem {
                return Err(ReportError::Config(format!(
                    "checklist name '{name}' is reserved for the recap"
                )));
            }
            if !names.insert(name) {
                return Err(ReportError::Config(format!("duplicate checklist '{name}'")));
            }
        }
        Ok(())
    }

    /// Payment and sub-status names become summary headers; they must not
    /// collide with each other or with the fixed summary columns.
    fn validate_summary_columns(&self) -> Result<(), ReportError> {
        let mut headers: HashSet<String> = [
            formation::VAGUE,
            formation::ETAT,
            summary::COUNT,
            summary::TOTAL_ALL_PAYMENTS,
            summary::UNRECOGNIZED,
            summary::CA_REEL,
            summary::CA_PREVISIONNEL,
            summary::CA_POTENTIEL,
        ]
        .iter()
        .map(|h| canonical_key(h))
        .collect();

        let mut payments = HashSet::new();
        for payment in &self.payment_columns {
            if payment.trim().is_empty() {
                return Err(ReportError::Config("empty payment column name".into()));
            }
            if !payments.insert(canonical_key(payment)) {
                return Err(ReportError::Config(format!(
                    "duplicate payment column '{payment}'"
                )));
            }
            let total = format!("{}{payment}", summary::TOTAL_PREFIX);
            if !headers.insert(canonical_key(&total)) {
                return Err(ReportError::Config(format!(
                    "payment column '{payment}' collides with summary column '{total}'"
                )));
            }
        }

        for label in self.catalog.labels() {
            if !headers.insert(canonical_key(label)) {
                return Err(ReportError::Config(format!(
                    "sub-status '{label}' collides with a summary column"
                )));
            }
        }
        Ok(())
    }
}

/// Same directory, resolving symlinks and `..` when both exist.
fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a.components().eq(b.components()),
    }
}

// ── Notification ────────────────────────────────────────────────────────────

/// Message template for the report mail. Delivery happens outside this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub recipients: Vec<String>,
    /// `{date}` is replaced with the run date (YYYY-MM-DD)
    pub subject: String,
    /// Placeholders: `{commercial_count}`, `{admin_depot_count}`,
    /// `{admin_verif_count}`, `{cindy_count}`, `{facturation_retard_count}`,
    /// `{total_count}`, `{generation_date}`
    pub body_template: String,
    pub signature: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            recipients: Vec::new(),
            subject: "Rapport PERSPECTIVIA - Checklists par équipe ({date})".to_string(),
            body_template: DEFAULT_BODY.to_string(),
            signature: DEFAULT_SIGNATURE.to_string(),
        }
    }
}

const DEFAULT_BODY: &str = "Bonjour,

Voici le nombre de checklists identifiés par équipe :

COMMERCIAL
({commercial_count}) nombre de ligne dans checklist_équipe_commercial
=> {commercial_count} dossiers doivent être relancés par l'équipe commercial afin de récupérer les signatures manquantes

ADMINISTRATIF
({admin_depot_count}) nombre de ligne dans checklist_admin_dépôt_initial
=> {admin_depot_count} dossiers doivent être déposés en brouillon par l'équipe administrative

({admin_verif_count}) nombre de ligne dans checklist_admin_vérifier_dépôt
=> {admin_verif_count} dossiers doivent être déposés par l'équipe administrative auprès de la plateforme de l'OPCO

COMPTABILITÉ
({cindy_count}) nombre de ligne dans checklist_cindy
=> {cindy_count} dossiers doivent être facturés par la comptabilité

({facturation_retard_count}) nombre de ligne dans checklist_facturation_en_retard
=> {facturation_retard_count} dossiers doivent être facturés par la comptabilité pour l'échéance 2

TOTAL : {total_count} dossiers à traiter

Date de génération : {generation_date}

Cordialement,
Système d'automatisation PERSPECTIVIA
";

const DEFAULT_SIGNATURE: &str = "
---
Ce rapport a été généré automatiquement par FAC Automation
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ReportConfig::default();
        config.validate().unwrap();
        assert_eq!(config.revenue_per_unit, 3100.0);
        assert_eq!(config.treasury_lookback_days, 90);
        assert_eq!(config.checklists.len(), 7);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ReportConfig = toml::from_str(
            r#"
            sheet = "2026"
            revenue_per_unit = 2800.0
            "#,
        )
        .unwrap();
        assert_eq!(config.sheet, "2026");
        assert_eq!(config.revenue_per_unit, 2800.0);
        assert_eq!(config.treasury_lookback_days, 90);
        assert_eq!(config.payment_columns.len(), 3);
    }

    #[test]
    fn checklists_from_toml() {
        let config: ReportConfig = toml::from_str(
            r#"
            [[checklists]]
            name = "a_relancer"
            [checklists.rule]
            kind = "detail_equals"
            category = "potentiel"
            value = "Manque info"

            [[checklists]]
            name = "retard"
            [checklists.rule]
            kind = "invoice_overdue"
            "#,
        )
        .unwrap();
        assert_eq!(config.checklists.len(), 2);
        assert!(matches!(
            config.checklists[0].rule,
            ChecklistRule::DetailEquals {
                category: StatusCategory::Potentiel,
                ..
            }
        ));
        assert!(matches!(config.checklists[1].rule, ChecklistRule::InvoiceOverdue));
    }

    #[test]
    fn round_trips_through_toml() {
        let config = ReportConfig::default();
        let text = config.to_toml().unwrap();
        let back: ReportConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.checklists.len(), config.checklists.len());
        assert_eq!(back.catalog.potentiel, config.catalog.potentiel);
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = ReportConfig::default();
        config.revenue_per_unit = -1.0;
        assert!(config.validate().is_err());

        let mut config = ReportConfig::default();
        config.checklists.push(ChecklistSpec {
            name: "checklist_recap".into(),
            rule: ChecklistRule::InvoiceOverdue,
        });
        assert!(config.validate().is_err());

        let mut config = ReportConfig::default();
        config.checklists.push(config.checklists[0].clone());
        assert!(config.validate().is_err());
    }

    fn rejected(config: &ReportConfig) -> bool {
        matches!(config.validate(), Err(ReportError::Config(_)))
    }

    #[test]
    fn lookback_is_bounded() {
        let mut config = ReportConfig::default();
        config.treasury_lookback_days = MAX_LOOKBACK_DAYS;
        config.validate().unwrap();
        config.treasury_lookback_days = 1_000_000_000;
        assert!(rejected(&config));
        config.treasury_lookback_days = -1;
        assert!(rejected(&config));
    }

    #[test]
    fn summary_header_collisions_rejected() {
        let mut config = ReportConfig::default();
        config.payment_columns.push("paiement 1".into());
        assert!(rejected(&config));

        for label in ["Count", "Unrecognized", "CA_Réel", "ca_potentiel", "Total_PAIEMENT 2"] {
            let mut config = ReportConfig::default();
            config.catalog.potentiel.push(label.into());
            assert!(rejected(&config), "{label}");
        }

        let mut config = ReportConfig::default();
        config.payment_columns.push(String::new());
        assert!(rejected(&config));
    }

    #[test]
    fn output_and_checklist_dirs_differ() {
        let mut config = ReportConfig::default();
        config.checklist_dir = config.output_dir.clone();
        assert!(rejected(&config));

        let dir = tempfile::tempdir().unwrap();
        let mut config = ReportConfig::default();
        config.output_dir = dir.path().join("out");
        config.checklist_dir = dir.path().join("Checklist").join("..").join("out");
        std::fs::create_dir_all(&config.output_dir).unwrap();
        std::fs::create_dir_all(dir.path().join("Checklist")).unwrap();
        assert!(rejected(&config));
    }
}
