use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ReportError;
use crate::schema::status;
use crate::text::canonical_key;

/// High-level billing category held in the `ÉTAT` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    Reel,
    Previsionnel,
    Potentiel,
}

impl StatusCategory {
    pub const ALL: [StatusCategory; 3] = [Self::Reel, Self::Previsionnel, Self::Potentiel];

    /// Display label, also the header of the category's detail column.
    pub fn label(self) -> &'static str {
        match self {
            Self::Reel => status::REEL,
            Self::Previsionnel => status::PREVISIONNEL,
            Self::Potentiel => status::POTENTIEL,
        }
    }

    /// Recognize a category by canonical key (`Réel`, `Réél`, `REEL` …).
    pub fn from_label(raw: &str) -> Option<Self> {
        match canonical_key(raw).as_str() {
            "reel" => Some(Self::Reel),
            "previsionnel" => Some(Self::Previsionnel),
            "potentiel" => Some(Self::Potentiel),
            _ => None,
        }
    }
}

impl fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Parsed `ÉTAT` value. Unknown non-blank values are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Status {
    Known(StatusCategory),
    Other(String),
}

impl Status {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(match StatusCategory::from_label(trimmed) {
            Some(cat) => Status::Known(cat),
            None => Status::Other(trimmed.to_string()),
        })
    }

    pub fn category(&self) -> Option<StatusCategory> {
        match self {
            Status::Known(cat) => Some(*cat),
            Status::Other(_) => None,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Status::Known(cat) => cat.label(),
            Status::Other(raw) => raw,
        }
    }
}

/// Recognized sub-statuses per category, in output column order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusCatalog {
    pub reel: Vec<String>,
    pub previsionnel: Vec<String>,
    pub potentiel: Vec<String>,
}

impl Default for StatusCatalog {
    fn default() -> Self {
        let mut previsionnel = vec!["ATT DE PEC".to_string()];
        previsionnel.extend((1..=12).map(|r| format!("ATT DE PEC R{r}")));
        Self {
            reel: to_strings(&["PEC accordé", "Facturé", "Encaissé"]),
            previsionnel,
            potentiel: to_strings(&[
                "Signature bi-parti à déposer",
                "Dépôt brouillon",
                "Manque signatures",
                "Dépôt irréalisable faute de mandat",
                "Manque info",
                "Manque documents",
            ]),
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl StatusCatalog {
    pub fn sub_statuses(&self, category: StatusCategory) -> &[String] {
        match category {
            StatusCategory::Reel => &self.reel,
            StatusCategory::Previsionnel => &self.previsionnel,
            StatusCategory::Potentiel => &self.potentiel,
        }
    }

    /// Every sub-status label, category by category.
    pub fn labels(&self) -> Vec<&str> {
        StatusCategory::ALL
            .iter()
            .flat_map(|cat| self.sub_statuses(*cat).iter().map(String::as_str))
            .collect()
    }

    /// Labels must be unique across the whole catalog: each becomes a summary column.
    pub fn validate(&self) -> Result<(), ReportError> {
        let mut seen = HashMap::new();
        for label in self.labels() {
            if label.trim().is_empty() {
                return Err(ReportError::Config("empty sub-status label in catalog".into()));
            }
            if let Some(previous) = seen.insert(canonical_key(label), label) {
                return Err(ReportError::Config(format!(
                    "duplicate sub-status in catalog: '{previous}' and '{label}'"
                )));
            }
        }
        Ok(())
    }

    pub fn index(&self) -> CatalogIndex {
        let mut positions = HashMap::new();
        let mut offset = 0;
        for cat in StatusCategory::ALL {
            for (i, label) in self.sub_statuses(cat).iter().enumerate() {
                positions.insert((cat, canonical_key(label)), offset + i);
            }
            offset += self.sub_statuses(cat).len();
        }
        CatalogIndex {
            positions,
            len: offset,
        }
    }
}

/// Lookup from (category, canonical sub-status) to its flattened column slot.
#[derive(Debug, Clone)]
pub struct CatalogIndex {
    positions: HashMap<(StatusCategory, String), usize>,
    len: usize,
}

impl CatalogIndex {
    pub fn position(&self, category: StatusCategory, value: &str) -> Option<usize> {
        self.positions.get(&(category, canonical_key(value))).copied()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_variants_collapse() {
        assert_eq!(Status::parse("Réél"), Some(Status::Known(StatusCategory::Reel)));
        assert_eq!(Status::parse("REEL"), Some(Status::Known(StatusCategory::Reel)));
        assert_eq!(
            Status::parse(" prévisionnel "),
            Some(Status::Known(StatusCategory::Previsionnel))
        );
        assert_eq!(Status::parse("Annulé"), Some(Status::Other("Annulé".into())));
        assert_eq!(Status::parse("   "), None);
    }

    #[test]
    fn default_catalog_layout() {
        let catalog = StatusCatalog::default();
        catalog.validate().unwrap();
        let labels = catalog.labels();
        assert_eq!(labels.len(), 3 + 13 + 6);
        assert_eq!(labels[0], "PEC accordé");
        assert_eq!(labels[3], "ATT DE PEC");
        assert_eq!(labels[15], "ATT DE PEC R12");
    }

    #[test]
    fn index_is_accent_insensitive() {
        let index = StatusCatalog::default().index();
        assert_eq!(index.position(StatusCategory::Reel, "PEC accorde"), Some(0));
        assert_eq!(index.position(StatusCategory::Potentiel, "DEPOT BROUILLON"), Some(17));
        assert_eq!(index.position(StatusCategory::Reel, "Dépôt brouillon"), None);
        assert_eq!(index.len(), 22);
    }

    #[test]
    fn duplicate_labels_rejected() {
        let mut catalog = StatusCatalog::default();
        catalog.potentiel.push("Facture".into());
        assert!(matches!(catalog.validate(), Err(ReportError::Config(_))));
    }
}
