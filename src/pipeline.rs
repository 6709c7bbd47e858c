use std::path::PathBuf;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::aggregation::{self, AggregationSettings, RevenueOverview};
use crate::artifact::write_csv;
use crate::checklist::{self, ChecklistContext, ChecklistOutcome};
use crate::config::ReportConfig;
use crate::error::ReportError;
use crate::model::FormationTable;
use crate::partition::partition_by_cycle;
use crate::recap::{self, Recap};
use crate::schema::artifact;

/// Everything one run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub rows: usize,
    /// Cleansed full table
    pub conversion: PathBuf,
    pub partitions: Vec<PathBuf>,
    pub summary: PathBuf,
    pub intermediary: PathBuf,
    pub promo: PathBuf,
    pub revenue: RevenueOverview,
    pub unrecognized: u32,
    pub checklists: Vec<ChecklistOutcome>,
    pub recap: Recap,
}

/// ingest → cleanse → partition → aggregate → checklists → recap.
///
/// Any failure before the recap aborts the run; artifacts already written
/// stay on disk.
pub fn run(config: &ReportConfig, today: NaiveDate) -> Result<RunReport, ReportError> {
    config.validate()?;
    info!(input = %config.input.display(), sheet = %config.sheet, %today, "run started");

    let stem = config
        .input
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| {
            ReportError::InvalidData(format!(
                "input path has no file name: {}",
                config.input.display()
            ))
        })?
        .to_string();

    // 1. Ingest + cleanse
    let table = FormationTable::load(&config.input, &config.sheet, &config.payment_columns)?
        .cleanse()?;
    let records = table.records()?;

    let conversion = config
        .output_dir
        .join(format!("{stem}.{}", artifact::CSV_EXT));
    write_csv(&mut table.frame().clone(), &conversion)?;

    // 2. Partitions
    let mut partitions = Vec::new();
    for mut partition in partition_by_cycle(&table, &records)? {
        let path = config.output_dir.join(partition.file_name(&stem));
        write_csv(&mut partition.frame, &path)?;
        partitions.push(path);
    }
    info!(count = partitions.len(), "partitions written");

    // 3. Aggregates
    let settings = AggregationSettings {
        revenue_per_unit: config.revenue_per_unit,
        catalog: config.catalog.clone(),
    };
    let summary = aggregation::summarize(&records, table.columns(), &settings);

    let summary_path = config.output_dir.join(artifact::SUMMARY);
    write_csv(&mut summary.to_frame()?, &summary_path)?;
    let intermediary_path = config.output_dir.join(artifact::INTERMEDIARY);
    write_csv(&mut summary.intermediary_frame()?, &intermediary_path)?;
    let promo_path = config.output_dir.join(artifact::PROMO);
    let promos = aggregation::promo_breakdown(&records);
    write_csv(&mut aggregation::promo_frame(&promos)?, &promo_path)?;

    let revenue = summary.revenue_overview();
    info!(
        ca_reel = revenue.ca_reel,
        ca_previsionnel = revenue.ca_previsionnel,
        ca_potentiel = revenue.ca_potentiel,
        ca_global = revenue.global(),
        "revenue overview"
    );
    for (category, total) in summary.payment_anomalies() {
        warn!(status = %category, total, "payments recorded on a non-Réel status");
    }

    // 4. Checklists + recap
    let ctx = ChecklistContext::new(today, config.treasury_lookback_days)?;
    let checklists = checklist::write_checklists(
        &table,
        &records,
        &config.checklists,
        &ctx,
        &config.checklist_dir,
    )?;
    let recap = recap::write_recap(&config.checklist_dir)?;

    info!(rows = table.height(), "run finished");
    Ok(RunReport {
        rows: table.height(),
        conversion,
        partitions,
        summary: summary_path,
        intermediary: intermediary_path,
        promo: promo_path,
        revenue,
        unrecognized: summary.unrecognized_total(),
        checklists,
        recap,
    })
}
