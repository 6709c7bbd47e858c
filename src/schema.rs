/// Column-name and artifact-name constants for the FAC report.
/// Single source of truth for headers read from the sheet and headers written out.

// ── Formation sheet columns ─────────────────────────────────────────────────
pub mod formation {
    pub const VAGUE: &str = "Vague";
    pub const ETAT: &str = "ÉTAT";
    pub const PROCHAINE_FACTURATION: &str = "Prochaine facturation";
    pub const DATE_DEBUT_FORMATION: &str = "DATE DE DEBUT FORMATION";
    pub const PROMO: &str = "PROMO";

    pub const PAYMENTS: [&str; 3] = ["PAIEMENT 1", "PAIEMENT 2", "PAIEMENT 3"];
}

// ── High-level status labels (also the detail column headers) ──────────────
pub mod status {
    pub const REEL: &str = "Réel";
    pub const PREVISIONNEL: &str = "Prévisionnel";
    pub const POTENTIEL: &str = "Potentiel";
}

// ── Summary table columns ───────────────────────────────────────────────────
pub mod summary {
    pub const COUNT: &str = "Count";
    pub const TOTAL_PREFIX: &str = "Total_";
    pub const TOTAL_ALL_PAYMENTS: &str = "Total_All_Payments";
    pub const UNRECOGNIZED: &str = "Unrecognized";
    pub const CA_REEL: &str = "CA_Réel";
    pub const CA_PREVISIONNEL: &str = "CA_Prévisionnel";
    pub const CA_POTENTIEL: &str = "CA_Potentiel";
}

// ── Recap columns ───────────────────────────────────────────────────────────
pub mod recap {
    pub const FICHIER: &str = "Fichier";
    pub const NOMBRE_DE_LIGNES: &str = "Nombre de lignes";
    pub const TOTAL: &str = "TOTAL";
}

// ── Artifact file names ─────────────────────────────────────────────────────
pub mod artifact {
    pub const SUMMARY: &str = "Données_Transformées.csv";
    pub const INTERMEDIARY: &str = "Statuts_Intermédiaires.csv";
    pub const PROMO: &str = "PROMO_Réel_par_Vague.csv";
    pub const RECAP: &str = "checklist_recap.csv";
    pub const CSV_EXT: &str = "csv";
}

// ── Spreadsheet error tokens ────────────────────────────────────────────────
pub mod tokens {
    pub const SPREADSHEET_ERRORS: [&str; 7] = [
        "#N/A", "#VALUE!", "#REF!", "#DIV/0!", "#NUM!", "#NAME?", "#NULL!",
    ];
}
