//! POST enrichment pipeline.
//!
//! Combines every step of a run: reading the four inputs, the enrichment
//! stages, the keyword filter and rendering of the two output workbooks.
//!
//! # Stages
//!
//! ```text
//! POST ──▶ 1. code count ──▶ 2. Demand merge ──▶ 3. numeric cleanup
//!                              (Project + orders)
//!      ──▶ 4. computed sums ──▶ 5. TUBS merge ──▶ 6. BeamBalance merge
//!                               (TT_CODE)          (IT, Phy whs)
//!      ──▶ column layout ──▶ enriched table ──▶ keyword filter ──▶ filtered table
//! ```
//!
//! A stage whose input file or column is missing passes the table through
//! and leaves a [`StageNote`]. Only an unreadable POST input fails a run.
//!
//! # Example
//!
//! ```rust,ignore
//! use postenrich::config::Profile;
//! use postenrich::parser::SheetSource;
//! use postenrich::transform::pipeline::{render_outputs, run_pipeline, PipelineInputs};
//! use std::path::Path;
//!
//! let inputs = PipelineInputs::new(SheetSource::from_path(Path::new("post.xlsx"))?)
//!     .with_tubs(SheetSource::from_path(Path::new("tubs.xlsx"))?);
//! let config = Profile::Full.config();
//! let result = run_pipeline(&inputs, &config)?;
//! let outputs = render_outputs(&result, &config)?;
//! outputs.modified.save_in(Path::new("."))?;
//! ```

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

use super::filter::KeywordFilter;
use super::grouper::{aggregate, AggregateMode};
use super::layout::{ColumnLayout, Placement};
use super::operations::Operation;
use crate::api::logs::{log_info, log_stage, log_success, LogLevel};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{Cell, Source, Table};
use crate::parser::SheetSource;
use crate::render::{render_table, Artifact};

// =============================================================================
// Column names
// =============================================================================

pub const PRODUCTION_ORDER: &str = "Production Order";
pub const DEMAND: &str = "Demand";
pub const CODE_COUNT: &str = "GBD_GBS_Count";
pub const GRE_PROD_ORDER: &str = "GRE Prod Order";
pub const PROJECT: &str = "Project";
pub const PROJECT_ORDERS: &str = "Project GRE Orders";
pub const PROJECT_GB_COUNT: &str = "Project GB Count";
pub const PRORDER: &str = "PRORDER";
pub const TT_CODE: &str = "TT_CODE";

/// Fill for POST rows without a Demand match.
pub const PROJECT_NOT_FOUND: &str = "not found";
/// Fill for POST rows without a TUBS or BeamBalance match.
pub const NOT_FOUND: &str = "Not Found";

/// Position of the code-count column.
const CODE_COUNT_INDEX: usize = 2;
/// Position of the first Demand column.
const PROJECT_INDEX: usize = 3;
/// Project samples shown in BeamBalance diagnostics.
const SAMPLE_PROJECTS: usize = 5;

// =============================================================================
// Inputs
// =============================================================================

/// The files of one run.
#[derive(Debug, Clone)]
pub struct PipelineInputs {
    pub post: SheetSource,
    pub tubs: Option<SheetSource>,
    pub demand: Option<SheetSource>,
    pub beam_balance: Option<SheetSource>,
}

impl PipelineInputs {
    pub fn new(post: SheetSource) -> Self {
        Self {
            post,
            tubs: None,
            demand: None,
            beam_balance: None,
        }
    }

    pub fn with_tubs(mut self, source: SheetSource) -> Self {
        self.tubs = Some(source);
        self
    }

    pub fn with_demand(mut self, source: SheetSource) -> Self {
        self.demand = Some(source);
        self
    }

    pub fn with_beam_balance(mut self, source: SheetSource) -> Self {
        self.beam_balance = Some(source);
        self
    }

    /// Set an input by role.
    pub fn set(&mut self, role: Source, source: SheetSource) {
        match role {
            Source::Post => self.post = source,
            Source::Tubs => self.tubs = Some(source),
            Source::Demand => self.demand = Some(source),
            Source::BeamBalance => self.beam_balance = Some(source),
        }
    }

    fn auxiliary(&self, role: Source) -> Option<&SheetSource> {
        match role {
            Source::Post => None,
            Source::Tubs => self.tubs.as_ref(),
            Source::Demand => self.demand.as_ref(),
            Source::BeamBalance => self.beam_balance.as_ref(),
        }
    }
}

/// Tables handed to [`enrich`]. Auxiliary tables are optional.
#[derive(Debug, Clone, Default)]
pub struct EnrichInputs {
    pub post: Table,
    pub tubs: Option<Table>,
    pub demand: Option<Table>,
    pub beam_balance: Option<Table>,
}

impl EnrichInputs {
    pub fn new(post: Table) -> Self {
        Self {
            post,
            ..Default::default()
        }
    }
}

// =============================================================================
// Notes
// =============================================================================

/// Pipeline step a note belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Load,
    CodeCount,
    DemandMerge,
    NumericCleanup,
    ComputedSums,
    TubsMerge,
    BeamBalanceMerge,
    Filter,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::CodeCount => "code_count",
            Stage::DemandMerge => "demand_merge",
            Stage::NumericCleanup => "numeric_cleanup",
            Stage::ComputedSums => "computed_sums",
            Stage::TubsMerge => "tubs_merge",
            Stage::BeamBalanceMerge => "beam_balance_merge",
            Stage::Filter => "filter",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Human-readable diagnostic produced during a run. Advisory only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageNote {
    pub stage: Stage,
    pub level: LogLevel,
    pub message: String,
}

/// Collects notes and mirrors each one to the log broadcaster.
#[derive(Debug, Default)]
struct Notes {
    notes: Vec<StageNote>,
}

impl Notes {
    fn push(&mut self, stage: Stage, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        log_stage(stage.name(), level, message.as_str());
        self.notes.push(StageNote { stage, level, message });
    }

    fn info(&mut self, stage: Stage, message: impl Into<String>) {
        self.push(stage, LogLevel::Info, message);
    }

    fn success(&mut self, stage: Stage, message: impl Into<String>) {
        self.push(stage, LogLevel::Success, message);
    }

    fn warning(&mut self, stage: Stage, message: impl Into<String>) {
        self.push(stage, LogLevel::Warning, message);
    }

    /// Warn about every column in `required` missing from `table`.
    /// Returns true when all are present.
    fn require_columns(&mut self, stage: Stage, source: Source, table: &Table, required: &[&str]) -> bool {
        let missing: Vec<&str> = required.iter().copied().filter(|c| !table.has_column(c)).collect();
        if missing.is_empty() {
            return true;
        }
        self.warning(
            stage,
            format!("{} is missing column(s) {}; stage skipped", source, quoted(&missing)),
        );
        false
    }
}

fn quoted(columns: &[&str]) -> String {
    columns.iter().map(|c| format!("'{}'", c)).collect::<Vec<_>>().join(", ")
}

// =============================================================================
// Result
// =============================================================================

/// Outcome of one enrichment run.
#[derive(Debug, Clone)]
pub struct EnrichResult {
    pub enriched: Table,
    /// `None` when the classify column never existed.
    pub filtered: Option<Table>,
    pub notes: Vec<StageNote>,
    /// Placement rules applied to `enriched`.
    pub layout: ColumnLayout,
}

/// Row counts reported after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub original_rows: usize,
    pub columns: usize,
    pub filtered_rows: Option<usize>,
    pub removed_rows: Option<usize>,
}

impl EnrichResult {
    pub fn summary(&self) -> RunSummary {
        let original_rows = self.enriched.row_count();
        let filtered_rows = self.filtered.as_ref().map(Table::row_count);
        RunSummary {
            original_rows,
            columns: self.enriched.width(),
            filtered_rows,
            removed_rows: filtered_rows.map(|f| original_rows - f),
        }
    }
}

/// Rendered output workbooks.
#[derive(Debug, Clone)]
pub struct Outputs {
    pub modified: Artifact,
    pub filtered: Option<Artifact>,
}

impl Outputs {
    pub fn artifacts(&self) -> impl Iterator<Item = &Artifact> {
        std::iter::once(&self.modified).chain(self.filtered.iter())
    }
}

// =============================================================================
// Entry points
// =============================================================================

/// Read every input, enrich and filter.
///
/// Fails only when the POST input cannot be read as a table.
pub fn run_pipeline(inputs: &PipelineInputs, config: &PipelineConfig) -> PipelineResult<EnrichResult> {
    let mut notes = Notes::default();
    let tables = load_inputs(inputs, &mut notes)?;
    let mut result = enrich(tables, config);
    notes.notes.append(&mut result.notes);
    result.notes = notes.notes;
    Ok(result)
}

fn load_inputs(inputs: &PipelineInputs, notes: &mut Notes) -> PipelineResult<EnrichInputs> {
    log_info(format!("📖 Reading POST file {}...", inputs.post.file_name));
    let post = inputs.post.read().map_err(PipelineError::Primary)?;
    notes.success(
        Stage::Load,
        format!(
            "POST: {} rows, {} columns (sheet '{}')",
            post.table.row_count(),
            post.table.width(),
            post.sheet
        ),
    );

    let mut tables = EnrichInputs::new(post.table);
    for role in [Source::Tubs, Source::Demand, Source::BeamBalance] {
        let table = load_auxiliary(inputs.auxiliary(role), role, notes);
        match role {
            Source::Tubs => tables.tubs = table,
            Source::Demand => tables.demand = table,
            Source::BeamBalance => tables.beam_balance = table,
            Source::Post => {}
        }
    }
    Ok(tables)
}

fn load_auxiliary(source: Option<&SheetSource>, role: Source, notes: &mut Notes) -> Option<Table> {
    let Some(source) = source else {
        notes.info(Stage::Load, format!("{} file not supplied", role));
        return None;
    };
    match source.read() {
        Ok(parsed) => {
            notes.success(
                Stage::Load,
                format!(
                    "{}: {} rows, {} columns (sheet '{}')",
                    role,
                    parsed.table.row_count(),
                    parsed.table.width(),
                    parsed.sheet
                ),
            );
            Some(parsed.table)
        }
        Err(e) => {
            notes.warning(
                Stage::Load,
                format!("{} file {} ignored: {}", role, source.file_name, e),
            );
            None
        }
    }
}

/// Run the enrichment stages and the keyword filter over loaded tables.
///
/// Never fails: missing inputs or columns turn the stage into a no-op.
/// The POST row count is preserved.
pub fn enrich(inputs: EnrichInputs, config: &PipelineConfig) -> EnrichResult {
    let EnrichInputs {
        post,
        tubs,
        demand,
        beam_balance,
    } = inputs;

    let mut run = EnrichRun {
        table: post,
        layout: ColumnLayout::new(),
        notes: Notes::default(),
        config,
    };
    let stages = &config.stages;

    if stages.code_count {
        run.code_count();
    }
    if stages.demand_merge {
        run.demand_merge(demand.as_ref());
    }
    if stages.numeric_cleanup {
        run.numeric_cleanup();
    }
    if stages.computed_sums {
        run.computed_sums();
    }
    if stages.tubs_merge {
        run.tubs_merge(tubs.as_ref());
    }
    if stages.beam_balance_merge {
        run.beam_balance_merge(beam_balance.as_ref());
    }

    let EnrichRun {
        table: mut enriched,
        layout,
        mut notes,
        ..
    } = run;
    layout.apply(&mut enriched);
    log_success(format!(
        "Enriched POST: {} rows, {} columns",
        enriched.row_count(),
        enriched.width()
    ));

    let filtered = if stages.filter {
        apply_filter(&enriched, &config.filter, &mut notes)
    } else {
        None
    };

    EnrichResult {
        enriched,
        filtered,
        notes: notes.notes,
        layout,
    }
}

fn apply_filter(enriched: &Table, filter: &KeywordFilter, notes: &mut Notes) -> Option<Table> {
    match filter.apply(enriched) {
        Some(filtered) => {
            notes.success(
                Stage::Filter,
                format!(
                    "Original rows: {} | Filtered rows: {} | Removed: {}",
                    enriched.row_count(),
                    filtered.row_count(),
                    enriched.row_count() - filtered.row_count()
                ),
            );
            Some(filtered)
        }
        None => {
            notes.info(
                Stage::Filter,
                format!("No '{}' column; filtered table not produced", filter.column),
            );
            None
        }
    }
}

/// Render the enriched table and, when present, the filtered table.
pub fn render_outputs(result: &EnrichResult, config: &PipelineConfig) -> PipelineResult<Outputs> {
    let styles = config.style_map();
    let names = &config.output;

    let modified = Artifact {
        file_name: names.modified_file.clone(),
        bytes: render_table(&result.enriched, &names.modified_sheet, &styles)?,
    };
    let filtered = match result.filtered {
        Some(ref table) => Some(Artifact {
            file_name: names.filtered_file.clone(),
            bytes: render_table(table, &names.filtered_sheet, &styles)?,
        }),
        None => None,
    };
    Ok(Outputs { modified, filtered })
}

// =============================================================================
// Stages
// =============================================================================

/// Working state of one enrichment run.
struct EnrichRun<'a> {
    table: Table,
    layout: ColumnLayout,
    notes: Notes,
    config: &'a PipelineConfig,
}

impl EnrichRun<'_> {
    /// Stage 1: count GBD/GBS codes of the "Demand" column.
    fn code_count(&mut self) {
        let stage = Stage::CodeCount;
        let op = Operation::CountCodes {
            patterns: self.config.code_patterns.clone(),
        };
        let Some(cells) = self.table.column(DEMAND) else {
            self.notes.info(stage, format!("POST has no '{}' column; no code count", DEMAND));
            return;
        };
        let counts: Vec<Cell> = cells.map(|c| op.apply(c)).collect();
        self.table.set_column(CODE_COUNT, counts);
        self.layout.place(CODE_COUNT, Placement::AtIndex(CODE_COUNT_INDEX));
        self.notes.success(stage, format!("{} column added", CODE_COUNT));
    }

    /// Stage 2: Project per production order, plus per-project order list.
    fn demand_merge(&mut self, demand: Option<&Table>) {
        let stage = Stage::DemandMerge;
        let Some(demand) = demand else {
            self.notes.info(stage, "Upload a Demand file to add the Project column");
            return;
        };
        if !self.notes.require_columns(stage, Source::Demand, demand, &[GRE_PROD_ORDER, PROJECT])
            || !self.notes.require_columns(stage, Source::Post, &self.table, &[PRODUCTION_ORDER])
        {
            return;
        }

        let projects = first_project_per_order(demand);
        let project_cells: Vec<Cell> = self
            .table
            .column(PRODUCTION_ORDER)
            .map(|keys| {
                keys.map(|key| {
                    key.join_key()
                        .and_then(|k| projects.get(&k).cloned())
                        .unwrap_or_else(|| Cell::text(PROJECT_NOT_FOUND))
                })
                .collect()
            })
            .unwrap_or_default();
        let matched = project_cells
            .iter()
            .filter(|c| c.to_text().as_deref() != Some(PROJECT_NOT_FOUND))
            .count();
        self.table.set_column(PROJECT, project_cells);
        self.notes.success(
            stage,
            format!(
                "Project merged from {} distinct orders: {} of {} rows matched",
                projects.len(),
                matched,
                self.table.row_count()
            ),
        );

        if !self.config.stages.project_orders {
            self.layout.place(PROJECT, Placement::AtIndex(PROJECT_INDEX));
            return;
        }

        let Some(lookup) = aggregate(demand, PROJECT, GRE_PROD_ORDER, AggregateMode::SORTED_UNIQUE) else {
            return;
        };
        let (orders, gb_counts): (Vec<Cell>, Vec<Cell>) = self
            .table
            .column(PROJECT)
            .map(|cells| {
                cells
                    .map(|project| {
                        match project.join_key().and_then(|k| lookup.get(&k)) {
                            Some(list) => (Cell::text(list), Cell::from(count_gb_entries(list) as i64)),
                            None => (Cell::text(PROJECT_NOT_FOUND), Cell::from(0i64)),
                        }
                    })
                    .unzip()
            })
            .unwrap_or_default();
        self.table.set_column(PROJECT_ORDERS, orders);
        self.table.set_column(PROJECT_GB_COUNT, gb_counts);
        self.layout.place_block(
            &[PROJECT, PROJECT_ORDERS, PROJECT_GB_COUNT],
            Placement::AtIndex(PROJECT_INDEX),
        );
        self.notes.success(
            stage,
            format!("{} and {} added for {} projects", PROJECT_ORDERS, PROJECT_GB_COUNT, lookup.len()),
        );
    }

    /// Stage 3: keep only the leading number of each measurement cell.
    fn numeric_cleanup(&mut self) {
        let stage = Stage::NumericCleanup;
        for numeric in &self.config.numeric_columns {
            let op = Operation::ExtractNumber {
                decimals: numeric.decimals,
            };
            if self.table.map_column(&numeric.column, |c| op.apply(c)) {
                self.notes.info(
                    stage,
                    format!("'{}' cleaned to {} decimals", numeric.column, numeric.decimals),
                );
            } else {
                self.notes
                    .warning(stage, format!("POST has no '{}' column; not cleaned", numeric.column));
            }
        }
    }

    /// Stage 4: element-wise sums, absent counted as zero.
    fn computed_sums(&mut self) {
        let stage = Stage::ComputedSums;
        for pair in &self.config.sum_pairs {
            let (Some(first), Some(second)) =
                (self.table.column(&pair.first), self.table.column(&pair.second))
            else {
                self.notes.warning(
                    stage,
                    format!(
                        "'{}' needs both '{}' and '{}'; not computed",
                        pair.output, pair.first, pair.second
                    ),
                );
                continue;
            };
            let sums: Vec<Cell> = first
                .zip(second)
                .map(|(a, b)| Cell::Number(a.as_number().unwrap_or(0.0) + b.as_number().unwrap_or(0.0)))
                .collect();
            self.table.set_column(&pair.output, sums);
            self.layout
                .place(pair.output.as_str(), Placement::After(pair.second.clone()));
            self.notes.success(stage, format!("'{}' added", pair.output));
        }
    }

    /// Stage 5: TT_CODE list per production order, moved to the end.
    fn tubs_merge(&mut self, tubs: Option<&Table>) {
        let stage = Stage::TubsMerge;
        let Some(tubs) = tubs else {
            self.notes.info(stage, "Upload a TUBS file to add the TT_CODE column");
            return;
        };
        if !self.notes.require_columns(stage, Source::Tubs, tubs, &[PRORDER, TT_CODE])
            || !self.notes.require_columns(stage, Source::Post, &self.table, &[PRODUCTION_ORDER])
        {
            return;
        }
        let Some(lookup) = aggregate(tubs, PRORDER, TT_CODE, AggregateMode::SORTED_UNIQUE) else {
            return;
        };

        let codes = lookup.lookup_column(&self.table, PRODUCTION_ORDER, NOT_FOUND);
        let matched = count_matched(&codes);
        self.table.set_column(TT_CODE, codes);
        self.layout.place(TT_CODE, Placement::End);
        self.notes.success(
            stage,
            format!(
                "{} merged for {} orders: {} of {} rows matched",
                TT_CODE,
                lookup.len(),
                matched,
                self.table.row_count()
            ),
        );
    }

    /// Stage 6: per-project BeamBalance attributes, placed before TT_CODE.
    fn beam_balance_merge(&mut self, beam: Option<&Table>) {
        let stage = Stage::BeamBalanceMerge;
        let config = self.config;
        let value_columns = &config.beam_balance_columns;
        let Some(beam) = beam else {
            self.notes.info(
                stage,
                format!("Upload a BeamBalance file to add {}", value_columns.join(", ")),
            );
            return;
        };

        self.beam_balance_diagnostics(beam);

        let present: Vec<&String> = value_columns.iter().filter(|c| beam.has_column(c)).collect();
        let post_has_project = self.table.has_column(PROJECT);
        let beam_has_project = beam.has_column(PROJECT);
        if !post_has_project || !beam_has_project || present.is_empty() {
            let mut missing = Vec::new();
            if !post_has_project {
                missing.push(format!(
                    "{} column missing in POST data (upload Demand file first)",
                    PROJECT
                ));
            }
            if !beam_has_project {
                missing.push(format!("{} column missing in BeamBalance file", PROJECT));
            }
            if present.is_empty() {
                missing.push(format!(
                    "{} column missing in BeamBalance file",
                    value_columns.join(" / ")
                ));
            }
            self.notes
                .warning(stage, format!("Cannot merge BeamBalance: {}", missing.join(", ")));
            return;
        }

        for column in present {
            let Some(lookup) = aggregate(beam, PROJECT, column, AggregateMode::ENCOUNTER_ORDER) else {
                continue;
            };
            let values = lookup.lookup_column(&self.table, PROJECT, NOT_FOUND);
            let matched = count_matched(&values);
            self.table.set_column(column, values);
            self.layout
                .place(column.as_str(), Placement::BeforeOrEnd(TT_CODE.to_string()));
            self.notes.success(
                stage,
                format!(
                    "{} column added: {} unique projects, {} of {} rows matched",
                    column,
                    lookup.len(),
                    matched,
                    self.table.row_count()
                ),
            );
        }
    }

    fn beam_balance_diagnostics(&mut self, beam: &Table) {
        let stage = Stage::BeamBalanceMerge;
        self.notes
            .info(stage, format!("BeamBalance columns: {}", beam.columns().join(", ")));
        self.notes.info(
            stage,
            format!("POST has {} column: {}", PROJECT, self.table.has_column(PROJECT)),
        );
        if let Some(samples) = sample_keys(&self.table, PROJECT) {
            self.notes
                .info(stage, format!("Unique Projects in POST: [{}]...", samples.join(", ")));
        }
        if let Some(samples) = sample_keys(beam, PROJECT) {
            self.notes.info(
                stage,
                format!("Unique Projects in BeamBalance: [{}]...", samples.join(", ")),
            );
        }
    }
}

/// `GRE Prod Order` → `Project`, first occurrence wins.
fn first_project_per_order(demand: &Table) -> HashMap<String, Cell> {
    let mut projects = HashMap::new();
    let (Some(order_idx), Some(project_idx)) =
        (demand.column_index(GRE_PROD_ORDER), demand.column_index(PROJECT))
    else {
        return projects;
    };
    for row in demand.rows() {
        if let Some(order) = row[order_idx].join_key() {
            projects.entry(order).or_insert_with(|| {
                if row[project_idx].is_empty() {
                    Cell::text(PROJECT_NOT_FOUND)
                } else {
                    row[project_idx].clone()
                }
            });
        }
    }
    projects
}

/// Entries of a comma-joined order list containing "GB".
fn count_gb_entries(list: &str) -> usize {
    list.split(',').filter(|entry| entry.contains("GB")).count()
}

fn count_matched(cells: &[Cell]) -> usize {
    cells
        .iter()
        .filter(|c| c.to_text().as_deref() != Some(NOT_FOUND))
        .count()
}

/// Up to five distinct non-absent values of `column`, in row order.
fn sample_keys(table: &Table, column: &str) -> Option<Vec<String>> {
    let mut seen = HashSet::new();
    let samples = table
        .column(column)?
        .filter_map(Cell::join_key)
        .filter(|k| seen.insert(k.clone()))
        .take(SAMPLE_PROJECTS)
        .collect();
    Some(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Profile;

    fn post() -> Table {
        Table::from_rows(
            [PRODUCTION_ORDER, DEMAND],
            vec![
                vec!["P1".into(), "GBD1 GBS2".into()],
                vec!["P2".into(), Cell::Empty],
            ],
        )
    }

    fn demand() -> Table {
        Table::from_rows([GRE_PROD_ORDER, PROJECT], vec![vec!["P1".into(), "Alpha".into()]])
    }

    fn texts(table: &Table, column: &str) -> Vec<String> {
        table
            .column(column)
            .unwrap()
            .map(|c| c.to_text().unwrap_or_default())
            .collect()
    }

    fn warnings(result: &EnrichResult) -> Vec<&StageNote> {
        result.notes.iter().filter(|n| n.level == LogLevel::Warning).collect()
    }

    #[test]
    fn test_code_count_only_without_auxiliary_files() {
        let result = enrich(EnrichInputs::new(post()), &Profile::Full.config());

        let expected = Table::from_rows(
            [PRODUCTION_ORDER, DEMAND, CODE_COUNT],
            vec![
                vec!["P1".into(), "GBD1 GBS2".into(), 2.0.into()],
                vec!["P2".into(), Cell::Empty, 0.0.into()],
            ],
        );
        assert_eq!(result.enriched, expected);
        assert_eq!(result.enriched.column_index(CODE_COUNT), Some(2));
        assert!(result.filtered.is_none());
    }

    #[test]
    fn test_demand_merge_fills_not_found() {
        let mut inputs = EnrichInputs::new(post());
        inputs.demand = Some(demand());
        let result = enrich(inputs, &Profile::Classic.config());

        assert_eq!(
            result.enriched.columns(),
            &[PRODUCTION_ORDER, DEMAND, CODE_COUNT, PROJECT]
        );
        assert_eq!(texts(&result.enriched, PROJECT), vec!["Alpha", "not found"]);
        assert!(!result.enriched.has_column(GRE_PROD_ORDER));
    }

    #[test]
    fn test_demand_first_occurrence_wins_and_project_orders() {
        let post = Table::from_rows(
            [PRODUCTION_ORDER, "Qty", DEMAND, "Note"],
            vec![
                vec!["GB-1".into(), 1.0.into(), Cell::Empty, Cell::Empty],
                vec!["X-9".into(), 2.0.into(), Cell::Empty, Cell::Empty],
            ],
        );
        let demand = Table::from_rows(
            [GRE_PROD_ORDER, PROJECT],
            vec![
                vec!["GB-1".into(), "Alpha".into()],
                vec!["GB-1".into(), "Beta".into()],
                vec!["GB-2".into(), "Alpha".into()],
                vec!["X-3".into(), "Alpha".into()],
            ],
        );
        let mut inputs = EnrichInputs::new(post);
        inputs.demand = Some(demand);
        let result = enrich(inputs, &Profile::Full.config());
        let table = &result.enriched;

        assert_eq!(
            table.columns(),
            &[
                PRODUCTION_ORDER, "Qty", CODE_COUNT, PROJECT, PROJECT_ORDERS, PROJECT_GB_COUNT,
                DEMAND, "Note"
            ]
        );
        assert_eq!(texts(table, PROJECT), vec!["Alpha", "not found"]);
        assert_eq!(texts(table, PROJECT_ORDERS), vec!["GB-1,GB-2,X-3", "not found"]);
        assert_eq!(table.cell(0, PROJECT_GB_COUNT), Some(&Cell::Number(2.0)));
        assert_eq!(table.cell(1, PROJECT_GB_COUNT), Some(&Cell::Number(0.0)));
    }

    #[test]
    fn test_numeric_cleanup_and_sums() {
        let post = Table::from_rows(
            [PRODUCTION_ORDER, "Beam Issue To PO", "Weft Issue To PO", "Action Qty Befor Post", "Other"],
            vec![
                vec!["P1".into(), "1.234 kg".into(), "2.5".into(), "Qty: -12.3456".into(), "x".into()],
                vec!["P2".into(), Cell::Empty, "n/a".into(), 3.0.into(), "y".into()],
            ],
        );
        let result = enrich(EnrichInputs::new(post), &Profile::Full.config());
        let table = &result.enriched;

        assert_eq!(table.cell(0, "Beam Issue To PO"), Some(&Cell::Number(1.23)));
        assert_eq!(table.cell(1, "Weft Issue To PO"), Some(&Cell::Empty));
        assert_eq!(table.cell(0, "Action Qty Befor Post"), Some(&Cell::Number(-12.346)));
        assert_eq!(table.cell(0, "Total Issue To PO"), Some(&Cell::Number(1.23 + 2.5)));
        assert_eq!(table.cell(1, "Total Issue To PO"), Some(&Cell::Number(0.0)));
        assert_eq!(
            table.column_index("Total Issue To PO"),
            table.column_index("Weft Issue To PO").map(|i| i + 1)
        );
        assert!(!table.has_column("Total Balance Qty"));
        assert!(warnings(&result)
            .iter()
            .any(|n| n.stage == Stage::ComputedSums && n.message.contains("Beam Balance Qty")));
    }

    #[test]
    fn test_full_run_places_lookups_and_filters() {
        let post = Table::from_rows(
            [PRODUCTION_ORDER, "Line", DEMAND, "Qty"],
            vec![
                vec!["P1".into(), "L1".into(), "GBD1".into(), 1.0.into()],
                vec!["P2".into(), "L2".into(), Cell::Empty, 2.0.into()],
                vec!["P3".into(), "L3".into(), Cell::Empty, 3.0.into()],
            ],
        );
        let demand = Table::from_rows(
            [GRE_PROD_ORDER, PROJECT],
            vec![
                vec!["P1".into(), "Alpha".into()],
                vec!["P2".into(), "Beta".into()],
            ],
        );
        let tubs = Table::from_rows(
            [PRORDER, TT_CODE],
            vec![
                vec!["P1".into(), "T2".into()],
                vec!["P1".into(), "T1".into()],
                vec!["P1".into(), "T2".into()],
            ],
        );
        let beam = Table::from_rows(
            [PROJECT, "IT", "Phy whs"],
            vec![
                vec!["Alpha".into(), "BCY-1".into(), "W1".into()],
                vec!["Alpha".into(), "A2".into(), Cell::Empty],
                vec!["Beta".into(), "A7".into(), "W2".into()],
            ],
        );
        let inputs = EnrichInputs {
            post,
            tubs: Some(tubs),
            demand: Some(demand),
            beam_balance: Some(beam),
        };
        let config = Profile::Full.config();
        let result = enrich(inputs, &config);
        let table = &result.enriched;

        let columns = table.columns();
        let n = columns.len();
        assert_eq!(&columns[n - 3..], &["IT", "Phy whs", TT_CODE]);
        assert_eq!(columns[2], CODE_COUNT);
        assert_eq!(columns[3], PROJECT);
        assert_eq!(texts(table, TT_CODE), vec!["T1,T2", "Not Found", "Not Found"]);
        assert_eq!(texts(table, "IT"), vec!["BCY-1,A2", "A7", "Not Found"]);
        assert_eq!(texts(table, "Phy whs"), vec!["W1", "W2", "Not Found"]);
        assert_eq!(table.row_count(), 3);

        let filtered = result.filtered.as_ref().unwrap();
        assert_eq!(texts(filtered, PRODUCTION_ORDER), vec!["P2", "P3"]);
        assert_eq!(filtered.columns(), table.columns());

        let summary = result.summary();
        assert_eq!(summary.original_rows, 3);
        assert_eq!(summary.filtered_rows, Some(2));
        assert_eq!(summary.removed_rows, Some(1));
    }

    #[test]
    fn test_beam_balance_without_project_reports_missing_pieces() {
        let beam = Table::from_rows(["IT"], vec![vec!["A".into()]]);
        let mut inputs = EnrichInputs::new(post());
        inputs.beam_balance = Some(beam);
        let result = enrich(inputs, &Profile::Full.config());

        assert!(!result.enriched.has_column("IT"));
        assert!(result.filtered.is_none());
        let warning = warnings(&result)
            .into_iter()
            .find(|n| n.stage == Stage::BeamBalanceMerge)
            .unwrap();
        assert!(warning.message.contains("missing in POST data"));
        assert!(warning.message.contains("missing in BeamBalance file"));
    }

    #[test]
    fn test_missing_columns_pass_through() {
        let tubs = Table::from_rows(["ORDER", TT_CODE], vec![vec!["P1".into(), "T".into()]]);
        let demand = Table::from_rows([PROJECT], vec![vec!["Alpha".into()]]);
        let mut inputs = EnrichInputs::new(post());
        inputs.tubs = Some(tubs);
        inputs.demand = Some(demand);
        let result = enrich(inputs, &Profile::Full.config());

        assert_eq!(result.enriched.columns(), &[PRODUCTION_ORDER, DEMAND, CODE_COUNT]);
        let stages: Vec<Stage> = warnings(&result).iter().map(|n| n.stage).collect();
        assert!(stages.contains(&Stage::TubsMerge));
        assert!(stages.contains(&Stage::DemandMerge));
    }

    #[test]
    fn test_rows_preserved_and_columns_only_grow() {
        let post = Table::from_rows(
            [PRODUCTION_ORDER, DEMAND, "IT"],
            vec![
                vec!["P1".into(), "GBS".into(), "old".into()],
                vec!["P1".into(), Cell::Empty, "old".into()],
                vec![Cell::Empty, Cell::Empty, Cell::Empty],
            ],
        );
        let inputs = EnrichInputs {
            post: post.clone(),
            tubs: Some(Table::from_rows([PRORDER, TT_CODE], vec![vec!["P1".into(), "T".into()]])),
            demand: Some(demand()),
            beam_balance: Some(Table::from_rows(
                [PROJECT, "IT"],
                vec![vec!["Alpha".into(), "byn".into()]],
            )),
        };
        let result = enrich(inputs, &Profile::Full.config());

        assert_eq!(result.enriched.row_count(), post.row_count());
        assert!(result.enriched.width() >= post.width());
        // Existing IT column is replaced by the merged values.
        assert_eq!(texts(&result.enriched, "IT"), vec!["byn", "byn", "Not Found"]);
        assert_eq!(result.filtered.unwrap().row_count(), 1);
    }

    #[test]
    fn test_disabled_stages_are_skipped() {
        let mut config = Profile::Full.config();
        config.stages.code_count = false;
        config.stages.filter = false;
        let result = enrich(EnrichInputs::new(post()), &config);
        assert_eq!(result.enriched, post());
        assert!(result.filtered.is_none());
    }

    #[test]
    fn test_run_pipeline_from_csv_sources() {
        let post = SheetSource::from_bytes("post.csv", b"Production Order;Demand\nP1;GBD1 GBS2\nP2;\n".to_vec());
        let demand = SheetSource::from_bytes("demand.csv", b"GRE Prod Order,Project\nP1,Alpha\n".to_vec());
        let broken = SheetSource::from_bytes("tubs.xlsx", b"PK\x03\x04not a zip".to_vec());
        let inputs = PipelineInputs::new(post).with_demand(demand).with_tubs(broken);

        let result = run_pipeline(&inputs, &Profile::Classic.config()).unwrap();
        assert_eq!(texts(&result.enriched, PROJECT), vec!["Alpha", "not found"]);
        assert!(result
            .notes
            .iter()
            .any(|n| n.stage == Stage::Load && n.level == LogLevel::Warning && n.message.contains("tubs.xlsx")));
        assert_eq!(result.notes[0].stage, Stage::Load);
    }

    #[test]
    fn test_unreadable_post_aborts() {
        let post = SheetSource::from_bytes("post.xlsx", b"PK\x03\x04not a zip".to_vec());
        let err = run_pipeline(&PipelineInputs::new(post), &Profile::Full.config()).unwrap_err();
        assert!(matches!(err, PipelineError::Primary(_)));
    }

    #[test]
    fn test_render_outputs_names() {
        let mut inputs = EnrichInputs::new(post());
        inputs.beam_balance = None;
        let config = Profile::Full.config();
        let result = enrich(inputs, &config);
        let outputs = render_outputs(&result, &config).unwrap();
        assert_eq!(outputs.modified.file_name, "modified_post.xlsx");
        assert!(outputs.filtered.is_none());
        assert_eq!(outputs.artifacts().count(), 1);
    }
}
