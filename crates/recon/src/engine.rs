use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::aggregate::{checksum, compare, compare_checksums};
use crate::config::{
    AggregateRuleConfig, BusinessRuleConfig, CustomRuleConfig, CustomRuleKind, DataValidationConfig,
    ReconConfig, StructuralConfig,
};
use crate::context::{CancelToken, RunContext};
use crate::error::{ConfigError, ReconError, RuleError, SourceError};
use crate::evidence::{compute_category_summary, compute_set_summary, compute_summary, set_passes};
use crate::index::index;
use crate::model::{RawValue, Record, SemanticType, Side, Value};
use crate::normalize::Normalizer;
use crate::reconcile::reconcile;
use crate::report::{
    Category, CategoryReport, CountComparison, RuleDetail, RuleKind, RuleResult, SetDetail,
    ValidationReport,
};
use crate::source::{render_query, DataSource, Params};
use crate::structural::{diff_columns, diff_key_columns, diff_tables, ColumnInfo, TypeCanon};

const COMPONENT: &str = "engine";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    RunningStructural,
    RunningBusiness,
    RunningAggregate,
    RunningCustom,
    Scored,
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::RunningStructural => "running-structural",
            Self::RunningBusiness => "running-business",
            Self::RunningAggregate => "running-aggregate",
            Self::RunningCustom => "running-custom",
            Self::Scored => "scored",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}

/// Executes the configured rule pipeline against two data sources.
///
/// A rule that fails for any reason becomes an `error` result; the run
/// itself only fails when neither source answers `test_connection`.
pub struct Engine<'a> {
    config: &'a ReconConfig,
    left: &'a dyn DataSource,
    right: &'a dyn DataSource,
    ctx: &'a RunContext,
    only: Option<BTreeSet<Category>>,
    cancel: CancelToken,
    state: RunState,
}

/// Rule results gathered during a run, before scoring.
#[derive(Default)]
struct Collected {
    categories: BTreeMap<Category, Vec<RuleResult>>,
    cancelled: bool,
}

impl<'a> Engine<'a> {
    pub fn new(
        config: &'a ReconConfig,
        left: &'a dyn DataSource,
        right: &'a dyn DataSource,
        ctx: &'a RunContext,
    ) -> Self {
        Self {
            config,
            left,
            right,
            ctx,
            only: None,
            cancel: CancelToken::new(),
            state: RunState::Idle,
        }
    }

    /// Restrict the run to these categories. An empty selection means all.
    pub fn with_categories(mut self, categories: impl IntoIterator<Item = Category>) -> Self {
        let set: BTreeSet<Category> = categories.into_iter().collect();
        self.only = if set.is_empty() { None } else { Some(set) };
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn run(&mut self) -> Result<ValidationReport, ReconError> {
        self.config.validate()?;
        self.precheck()?;

        let mut collected = Collected::default();
        let config = self.config;

        self.transition(RunState::RunningStructural);
        if let Some(structural) = self.active(Category::Structural, config.structural.as_ref()) {
            collected.categories.entry(Category::Structural).or_default();
            self.run_structural(structural, &mut collected);
        }

        self.transition(RunState::RunningBusiness);
        for (category, rule) in [
            (Category::ContractValidation, config.contract_validation.as_ref()),
            (Category::CustomerValidation, config.customer_validation.as_ref()),
        ] {
            if let Some(rule) = self.active(category, rule) {
                collected.categories.entry(category).or_default();
                self.execute(&mut collected, category, category.as_str(), RuleKind::SetReconciliation, |e| {
                    e.business_rule(rule)
                });
            }
        }

        self.transition(RunState::RunningAggregate);
        if let Some(data) = self.active(Category::DataValidation, config.data_validation.as_ref()) {
            collected.categories.entry(Category::DataValidation).or_default();
            self.run_data_validation(data, &mut collected);
        }
        if self.selected(Category::AggregateValidation) && !config.aggregate_validation.is_empty() {
            collected.categories.entry(Category::AggregateValidation).or_default();
            for (name, rule) in &config.aggregate_validation {
                self.execute(&mut collected, Category::AggregateValidation, name, RuleKind::AggregateTolerance, |e| {
                    e.aggregate_rule(rule)
                });
            }
        }

        self.transition(RunState::RunningCustom);
        if self.selected(Category::CustomRules) && !config.custom_rules.is_empty() {
            collected.categories.entry(Category::CustomRules).or_default();
            for (name, rule) in &config.custom_rules {
                let kind = match rule.kind {
                    CustomRuleKind::CountMatch => RuleKind::CountMatch,
                    CustomRuleKind::SumMatch => RuleKind::SumMatch,
                };
                self.execute(&mut collected, Category::CustomRules, name, kind, |e| {
                    e.custom_rule(name, rule)
                });
            }
        }

        self.transition(RunState::Scored);
        let categories: BTreeMap<Category, CategoryReport> = collected
            .categories
            .into_iter()
            .map(|(category, rules)| {
                let summary = compute_category_summary(&rules);
                (category, CategoryReport { rules, summary })
            })
            .collect();
        let summary = compute_summary(&categories);
        self.ctx.info(format!(
            "{}: {}/{} validations passed ({}%), {} errors",
            summary.validation_status,
            summary.passed_validations,
            summary.total_validations,
            summary.overall_success_rate,
            summary.error_validations
        ));

        let report = ValidationReport {
            name: config.name.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            categories,
            summary,
            warnings: self.ctx.take_warnings(),
            cancelled: collected.cancelled,
        };

        self.transition(RunState::Done);
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Pipeline plumbing
    // -----------------------------------------------------------------------

    fn transition(&mut self, next: RunState) {
        log::debug!("[{}] {} -> {}", self.ctx.label(), self.state, next);
        self.state = next;
    }

    fn precheck(&mut self) -> Result<(), ReconError> {
        let left_ok = self.left.test_connection();
        let right_ok = self.right.test_connection();
        match (left_ok, right_ok) {
            (false, false) => {
                self.ctx.error("neither data source is reachable");
                self.state = RunState::Done;
                Err(ReconError::SourcesUnreachable {
                    left: self.left.label().to_string(),
                    right: self.right.label().to_string(),
                })
            }
            (true, false) | (false, true) => {
                let down = if left_ok { self.right.label() } else { self.left.label() };
                self.ctx.warn(
                    COMPONENT,
                    format!("data source '{down}' failed its connection test; its rules will error"),
                );
                Ok(())
            }
            (true, true) => Ok(()),
        }
    }

    fn selected(&self, category: Category) -> bool {
        self.only.as_ref().map_or(true, |only| only.contains(&category))
    }

    fn active<'c, T>(&self, category: Category, section: Option<&'c T>) -> Option<&'c T> {
        section.filter(|_| self.selected(category))
    }

    /// Run one rule with error isolation. Cancellation is honored here, at
    /// rule boundaries.
    fn execute<F>(&self, collected: &mut Collected, category: Category, name: &str, kind: RuleKind, rule: F)
    where
        F: FnOnce(&Self) -> Result<(bool, RuleDetail), RuleError>,
    {
        if self.cancel.is_cancelled() {
            if !collected.cancelled {
                self.ctx.warn(COMPONENT, format!("run cancelled before rule '{name}'; remaining rules skipped"));
                collected.cancelled = true;
            }
            return;
        }

        self.ctx.enter_rule(name);
        let result = match rule(self) {
            Ok((passed, detail)) => {
                self.ctx.info(format!("rule {name}: {}", if passed { "passed" } else { "failed" }));
                RuleResult::scored(name, kind, passed, detail)
            }
            Err(e) => {
                self.ctx.error(format!("rule {name}: {e}"));
                RuleResult::errored(name, kind, &e)
            }
        };
        self.ctx.leave_rule();

        collected.categories.entry(category).or_default().push(result);
    }

    fn fetch(&self, source: &dyn DataSource, template: &str, params: &Params) -> Result<Vec<Record>, SourceError> {
        let query = render_query(template, params);
        self.ctx.debug(format!("{}: {query}", source.label()));
        source.execute(&query, params)
    }

    fn fetch_both(
        &self,
        left_query: &str,
        right_query: &str,
        params: &Params,
    ) -> Result<(Vec<Record>, Vec<Record>), RuleError> {
        let left = self.fetch(self.left, left_query, params)?;
        let right = self.fetch(self.right, right_query, params)?;
        Ok((left, right))
    }

    // -----------------------------------------------------------------------
    // Structural
    // -----------------------------------------------------------------------

    fn run_structural(&self, cfg: &StructuralConfig, collected: &mut Collected) {
        let params = self.config.params_for(&BTreeMap::new());
        let mut common_tables: Option<Vec<String>> = None;

        self.execute(collected, Category::Structural, "tables", RuleKind::TableDiff, |e| {
            let (l, r) = e.fetch_both(&cfg.left_tables_query, &cfg.right_tables_query, &params)?;
            let left = e.text_column(&l, &cfg.table_field, Side::Left)?;
            let right = e.text_column(&r, &cfg.table_field, Side::Right)?;
            let diff = diff_tables(&left, &right);
            common_tables = Some(diff.common.iter().cloned().collect());
            Ok((diff.passed(), RuleDetail::Tables(diff)))
        });

        let Some(tables) = common_tables else {
            return;
        };
        let canon = TypeCanon::with_aliases(&cfg.type_aliases);

        if let (Some(lq), Some(rq)) = (&cfg.left_columns_query, &cfg.right_columns_query) {
            for table in &tables {
                let name = format!("columns:{table}");
                self.execute(collected, Category::Structural, &name, RuleKind::ColumnDiff, |e| {
                    let params = with_table(&params, table);
                    let (l, r) = e.fetch_both(lq, rq, &params)?;
                    let left = e.column_infos(&l, cfg, Side::Left)?;
                    let right = e.column_infos(&r, cfg, Side::Right)?;
                    let diff = diff_columns(table, &left, &right, &canon);
                    Ok((diff.passed(), RuleDetail::Columns(diff)))
                });
            }
        }

        if let (Some(lq), Some(rq)) = (&cfg.left_primary_key_query, &cfg.right_primary_key_query) {
            for table in &tables {
                let name = format!("primary_key:{table}");
                self.execute(collected, Category::Structural, &name, RuleKind::IndexDiff, |e| {
                    let params = with_table(&params, table);
                    let (l, r) = e.fetch_both(lq, rq, &params)?;
                    let left = e.text_column(&l, &cfg.column_field, Side::Left)?;
                    let right = e.text_column(&r, &cfg.column_field, Side::Right)?;
                    let diff = diff_key_columns(table, &left, &right);
                    Ok((diff.passed(), RuleDetail::KeyColumns(diff)))
                });
            }
        }
    }

    fn column_infos(&self, rows: &[Record], cfg: &StructuralConfig, side: Side) -> Result<Vec<ColumnInfo>, RuleError> {
        let names = self.text_column(rows, &cfg.column_field, side)?;
        let types = self.text_column(rows, &cfg.type_field, side)?;
        Ok(names
            .iter()
            .zip(types.iter())
            .map(|(n, t)| ColumnInfo::new(n, t))
            .collect())
    }

    /// One trimmed text value per row from `field`.
    fn text_column(&self, rows: &[Record], field: &str, side: Side) -> Result<Vec<String>, RuleError> {
        let normalizer = Normalizer::new(self.ctx);
        rows.iter()
            .map(|row| -> Result<String, RuleError> {
                let raw = row.get(field).ok_or_else(|| missing_column(side, field))?;
                Ok(normalizer.normalize(raw, Some(SemanticType::String))?.to_string())
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Business
    // -----------------------------------------------------------------------

    fn business_rule(&self, rule: &BusinessRuleConfig) -> Result<(bool, RuleDetail), RuleError> {
        let params = self.config.params_for(&rule.params);
        let (l, r) = self.fetch_both(&rule.left_query, &rule.right_query, &params)?;

        let normalizer = Normalizer::new(self.ctx);
        let left = index(&l, &rule.left_key_spec(), rule.duplicate_policy, Side::Left, &normalizer)?;
        let right = index(&r, &rule.right_key_spec(), rule.duplicate_policy, Side::Right, &normalizer)?;

        let reconciliation = reconcile(&left, &right, &rule.fields, &normalizer);
        let summary = compute_set_summary(&reconciliation, left.len(), right.len());
        let passed = set_passes(&summary, self.config.success_threshold);
        self.ctx.info(format!(
            "{}/{} entities match, {} left-only, {} right-only",
            summary.perfect_matches,
            summary.total_compared,
            reconciliation.left_only.len(),
            reconciliation.right_only.len()
        ));

        Ok((passed, RuleDetail::Set(Box::new(SetDetail { summary, reconciliation }))))
    }

    // -----------------------------------------------------------------------
    // Aggregates + table data
    // -----------------------------------------------------------------------

    fn run_data_validation(&self, cfg: &DataValidationConfig, collected: &mut Collected) {
        let base = self.config.params_for(&BTreeMap::new());
        for table in &cfg.tables {
            let params = with_table(&base, table);

            let name = format!("row_count:{table}");
            self.execute(collected, Category::DataValidation, &name, RuleKind::RowCount, |e| {
                let (l, r) = e.fetch_both(&cfg.left_count_query, &cfg.right_count_query, &params)?;
                let left = e.count_value(&l, Side::Left)?;
                let right = e.count_value(&r, Side::Right)?;
                let cmp = CountComparison::new(left, right);
                Ok((cmp.exact_match, RuleDetail::Count(cmp)))
            });

            if let (Some(lq), Some(rq)) = (&cfg.left_rows_query, &cfg.right_rows_query) {
                let name = format!("checksum:{table}");
                self.execute(collected, Category::DataValidation, &name, RuleKind::Checksum, |e| {
                    let (l, r) = e.fetch_both(lq, rq, &params)?;
                    let normalizer = Normalizer::new(e.ctx);
                    let cmp = compare_checksums(checksum(&l, &normalizer)?, checksum(&r, &normalizer)?);
                    Ok((cmp.exact_match, RuleDetail::Checksum(cmp)))
                });
            }
        }
    }

    fn count_value(&self, rows: &[Record], side: Side) -> Result<u64, RuleError> {
        let raw = scalar(rows, None, side)?;
        match Normalizer::new(self.ctx).normalize(raw, Some(SemanticType::Integer))? {
            Value::Integer(n) if n >= 0 => Ok(n as u64),
            other => Err(RuleError::Data(format!("{side} side: {other} is not a row count"))),
        }
    }

    fn aggregate_rule(&self, rule: &AggregateRuleConfig) -> Result<(bool, RuleDetail), RuleError> {
        let params = self.config.params_for(&rule.params);
        let (l, r) = self.fetch_both(&rule.left_query, &rule.right_query, &params)?;

        let normalizer = Normalizer::new(self.ctx);
        let left = normalizer.normalize(
            scalar(&l, rule.left_field.as_deref(), Side::Left)?,
            Some(rule.value_type),
        )?;
        let right = normalizer.normalize(
            scalar(&r, rule.right_field.as_deref(), Side::Right)?,
            Some(rule.value_type),
        )?;

        let cmp = compare(&left, &right, rule.tolerance);
        Ok((cmp.passed(), RuleDetail::Aggregate(cmp)))
    }

    // -----------------------------------------------------------------------
    // Custom rules
    // -----------------------------------------------------------------------

    fn custom_rule(&self, name: &str, rule: &CustomRuleConfig) -> Result<(bool, RuleDetail), RuleError> {
        // Field requirements are checked before any query is sent.
        let sum_fields = match rule.kind {
            CustomRuleKind::CountMatch => None,
            CustomRuleKind::SumMatch => Some((
                required(name, "left_field", rule.left_field.as_deref())?,
                required(name, "right_field", rule.right_field.as_deref())?,
            )),
        };

        let params = self.config.params_for(&rule.params);
        let (l, r) = self.fetch_both(&rule.left_query, &rule.right_query, &params)?;

        match sum_fields {
            None => {
                let cmp = CountComparison::new(l.len() as u64, r.len() as u64);
                Ok((cmp.exact_match, RuleDetail::Count(cmp)))
            }
            Some((left_field, right_field)) => {
                let left = self.sum_column(&l, left_field, Side::Left)?;
                let right = self.sum_column(&r, right_field, Side::Right)?;
                let cmp = compare(&Value::decimal(left), &Value::decimal(right), rule.tolerance);
                Ok((cmp.within_tolerance, RuleDetail::Aggregate(cmp)))
            }
        }
    }

    /// Sum a column as decimals; nulls count as zero.
    fn sum_column(&self, rows: &[Record], field: &str, side: Side) -> Result<f64, RuleError> {
        let normalizer = Normalizer::new(self.ctx);
        let mut total = 0.0;
        for row in rows {
            let raw = row.get(field).ok_or_else(|| missing_column(side, field))?;
            if let Some(v) = normalizer.normalize(raw, Some(SemanticType::Decimal))?.as_f64() {
                total += v;
            }
        }
        Ok(total)
    }
}

/// Convenience wrapper: run every configured category to completion.
pub fn run(
    config: &ReconConfig,
    left: &dyn DataSource,
    right: &dyn DataSource,
    ctx: &RunContext,
) -> Result<ValidationReport, ReconError> {
    Engine::new(config, left, right, ctx).run()
}

fn with_table(params: &Params, table: &str) -> Params {
    let mut out = params.clone();
    out.insert("table".into(), table.to_string());
    out
}

/// The named column of the first row, or its first column.
fn scalar<'r>(rows: &'r [Record], field: Option<&str>, side: Side) -> Result<&'r RawValue, RuleError> {
    let row = rows
        .first()
        .ok_or_else(|| RuleError::Data(format!("{side} side returned no rows")))?;
    match field {
        Some(f) => row.get(f).ok_or_else(|| missing_column(side, f)),
        None => row
            .iter()
            .next()
            .map(|(_, v)| v)
            .ok_or_else(|| RuleError::Data(format!("{side} side returned a row with no columns"))),
    }
}

fn missing_column(side: Side, field: &str) -> RuleError {
    RuleError::Data(format!("{side} side: result has no column '{field}'"))
}

fn required<'c>(rule: &str, key: &str, value: Option<&'c str>) -> Result<&'c str, ConfigError> {
    value.ok_or_else(|| ConfigError::Missing { rule: rule.to_string(), key: key.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{RuleStatus, ValidationStatus};
    use std::cell::Cell;
    use std::collections::HashMap;

    /// Answers queries from a fixed table; unknown queries are query errors.
    struct FakeSource {
        label: &'static str,
        up: bool,
        answers: HashMap<String, Vec<Record>>,
        calls: Cell<usize>,
    }

    impl FakeSource {
        fn new(label: &'static str) -> Self {
            Self { label, up: true, answers: HashMap::new(), calls: Cell::new(0) }
        }

        fn answer(mut self, query: &str, rows: Vec<Record>) -> Self {
            self.answers.insert(query.to_string(), rows);
            self
        }
    }

    impl DataSource for FakeSource {
        fn label(&self) -> &str {
            self.label
        }

        fn execute(&self, query: &str, _params: &Params) -> Result<Vec<Record>, SourceError> {
            self.calls.set(self.calls.get() + 1);
            self.answers.get(query).cloned().ok_or_else(|| SourceError::Query {
                source_label: self.label.to_string(),
                message: format!("no such query: {query}"),
            })
        }

        fn test_connection(&self) -> bool {
            self.up
        }

        fn close(&mut self) {}
    }

    fn total(v: f64) -> Vec<Record> {
        vec![Record::from_pairs([("total", RawValue::Float(v))])]
    }

    const AGGREGATES: &str = r#"
name = "aggregates"

[aggregate_validation.balance]
left_query = "SELECT SUM(balance) AS total FROM contract"
right_query = "SELECT SUM(balance) AS total FROM contract"
left_field = "total"
right_field = "total"
"#;

    #[test]
    fn walks_every_state_and_ends_done() {
        let config = ReconConfig::from_toml(AGGREGATES).unwrap();
        let q = "SELECT SUM(balance) AS total FROM contract";
        let left = FakeSource::new("left").answer(q, total(10.0));
        let right = FakeSource::new("right").answer(q, total(10.0));
        let ctx = RunContext::new("t");

        let mut engine = Engine::new(&config, &left, &right, &ctx);
        assert_eq!(engine.state(), RunState::Idle);
        let report = engine.run().unwrap();
        assert_eq!(engine.state(), RunState::Done);
        assert_eq!(report.summary.validation_status, ValidationStatus::Passed);
        assert_eq!(report.rule("balance").unwrap().kind, RuleKind::AggregateTolerance);
    }

    #[test]
    fn string_aggregates_pass_on_exact_match_only() {
        let config = ReconConfig::from_toml(
            r#"
name = "hashes"

[aggregate_validation.same]
left_query = "SELECT h FROM digest_a"
right_query = "SELECT h FROM digest_a"
type = "string"

[aggregate_validation.different]
left_query = "SELECT h FROM digest_b"
right_query = "SELECT h FROM digest_b"
type = "string"
"#,
        )
        .unwrap();
        let hash = |h: &str| vec![Record::from_pairs([("h", RawValue::from(h))])];
        let left = FakeSource::new("l")
            .answer("SELECT h FROM digest_a", hash("ab12cd"))
            .answer("SELECT h FROM digest_b", hash("ab12cd"));
        let right = FakeSource::new("r")
            .answer("SELECT h FROM digest_a", hash("ab12cd"))
            .answer("SELECT h FROM digest_b", hash("ab12ce"));
        let ctx = RunContext::new("t");

        let report = run(&config, &left, &right, &ctx).unwrap();
        assert_eq!(report.rule("same").unwrap().status, RuleStatus::Passed);
        assert_eq!(report.rule("different").unwrap().status, RuleStatus::Failed);
        assert_eq!(report.summary.error_validations, 0);
    }

    #[test]
    fn misspelled_comparator_field_fails_the_rule() {
        let config = ReconConfig::from_toml(
            r#"
name = "typo"

[contract_validation]
left_query = "SELECT * FROM contract"
right_query = "SELECT * FROM contract"
left_key = "id"
right_key = "id"

[[contract_validation.fields]]
name = "balance"
left = "balanse"
right = "balance"
type = "decimal"
"#,
        )
        .unwrap();
        let rows = vec![
            Record::from_pairs([("id", RawValue::from("C1")), ("balance", RawValue::Float(1.0))]),
            Record::from_pairs([("id", RawValue::from("C2")), ("balance", RawValue::Float(2.0))]),
        ];
        let left = FakeSource::new("l").answer("SELECT * FROM contract", rows.clone());
        let right = FakeSource::new("r").answer("SELECT * FROM contract", rows);
        let ctx = RunContext::new("t");

        let report = run(&config, &left, &right, &ctx).unwrap();
        let rule = report.rule(Category::ContractValidation.as_str()).unwrap();
        assert_eq!(rule.status, RuleStatus::Failed);
        assert_eq!(report.summary.validation_status, ValidationStatus::Failed);
    }

    #[test]
    fn both_sources_down_is_fatal() {
        let config = ReconConfig::from_toml(AGGREGATES).unwrap();
        let mut left = FakeSource::new("db2");
        left.up = false;
        let mut right = FakeSource::new("pg");
        right.up = false;
        let ctx = RunContext::new("t");

        let mut engine = Engine::new(&config, &left, &right, &ctx);
        let err = engine.run().unwrap_err();
        assert!(matches!(err, ReconError::SourcesUnreachable { .. }));
        assert!(err.to_string().contains("db2"));
        assert_eq!(engine.state(), RunState::Done);
    }

    #[test]
    fn one_source_down_only_warns() {
        let config = ReconConfig::from_toml(AGGREGATES).unwrap();
        let mut left = FakeSource::new("db2");
        left.up = false;
        let right = FakeSource::new("pg");
        let ctx = RunContext::new("t");

        let report = run(&config, &left, &right, &ctx).unwrap();
        assert_eq!(report.rule("balance").unwrap().status, RuleStatus::Error);
        assert!(report.warnings.iter().any(|w| w.message.contains("db2")));
    }

    #[test]
    fn sum_match_without_fields_is_a_config_error_and_sends_no_query() {
        let config = ReconConfig::from_toml(
            r#"
name = "x"
[custom_rules.fees]
type = "sum_match"
left_query = "SELECT fee FROM fees"
right_query = "SELECT fee FROM fees"
"#,
        )
        .unwrap();
        let left = FakeSource::new("l");
        let right = FakeSource::new("r");
        let ctx = RunContext::new("t");

        let report = run(&config, &left, &right, &ctx).unwrap();
        let rule = report.rule("fees").unwrap();
        assert_eq!(rule.status, RuleStatus::Error);
        assert!(rule.error.as_deref().unwrap().contains("left_field"));
        assert_eq!(left.calls.get(), 0);
    }

    #[test]
    fn category_filter_skips_other_categories() {
        let input = format!(
            "{AGGREGATES}\n[custom_rules.rows]\nleft_query = \"a\"\nright_query = \"a\"\n"
        );
        let config = ReconConfig::from_toml(&input).unwrap();
        let left = FakeSource::new("l").answer("a", vec![]);
        let right = FakeSource::new("r").answer("a", vec![]);
        let ctx = RunContext::new("t");

        let report = Engine::new(&config, &left, &right, &ctx)
            .with_categories([Category::CustomRules])
            .run()
            .unwrap();
        assert!(report.category(Category::AggregateValidation).is_none());
        assert_eq!(report.category(Category::CustomRules).unwrap().rules.len(), 1);
        assert_eq!(report.summary.total_validations, 1);
    }

    #[test]
    fn cancelled_run_skips_rules_and_still_finishes() {
        let config = ReconConfig::from_toml(AGGREGATES).unwrap();
        let left = FakeSource::new("l");
        let right = FakeSource::new("r");
        let ctx = RunContext::new("t");
        let token = CancelToken::new();
        token.cancel();

        let mut engine = Engine::new(&config, &left, &right, &ctx).with_cancel_token(token);
        let report = engine.run().unwrap();
        assert!(report.cancelled);
        assert_eq!(report.rules().count(), 0);
        assert_eq!(engine.state(), RunState::Done);
        assert_eq!(left.calls.get(), 0);
    }
}
