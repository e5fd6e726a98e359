// src/pipeline.rs

use anyhow::{bail, Context, Result};
use tracing::{error, info, instrument, warn};

use crate::config::{Config, EmptyDirectionPolicy, LoadMode, RunPlan};
use crate::fetch::{Fetcher, SkippedQuery, Transport};
use crate::load::Sink;
use crate::period::Period;
use crate::process::{duplicate_identifiers, normalize, TradeBatch};
use crate::schema::{build_arrow_schema, CommodityCode, DirectionSchemas, TradeDirection};

/// A batch the destination refused.
#[derive(Debug, Clone)]
pub struct FailedLoad {
    pub tag: String,
    pub error: String,
}

/// What a run did, for the final summary and the exit status.
#[derive(Debug, Default)]
pub struct RunReport {
    pub periods: usize,
    pub rows_loaded: u64,
    pub skipped: Vec<SkippedQuery>,
    pub empty_directions: Vec<(Period, TradeDirection)>,
    pub failed_loads: Vec<FailedLoad>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    /// Everything loaded, but some queries were skipped.
    PartialSuccess,
    /// At least one batch was rejected by the destination.
    LoadFailed,
}

impl RunOutcome {
    /// Process exit status; 1 is left for fatal errors outside the report.
    pub fn exit_code(&self) -> u8 {
        match self {
            RunOutcome::Success => 0,
            RunOutcome::PartialSuccess => 2,
            RunOutcome::LoadFailed => 3,
        }
    }
}

impl RunReport {
    pub fn outcome(&self) -> RunOutcome {
        if !self.failed_loads.is_empty() {
            RunOutcome::LoadFailed
        } else if !self.skipped.is_empty() {
            RunOutcome::PartialSuccess
        } else {
            RunOutcome::Success
        }
    }
}

/// Fetch the three directions for `period` and reshape them into one batch.
#[instrument(level = "info", skip_all, fields(period = %period))]
pub async fn fetch_period<T: Transport>(
    fetcher: &Fetcher<T>,
    period: Period,
    codes: &[CommodityCode],
    schemas: &DirectionSchemas,
    empty_policy: EmptyDirectionPolicy,
    report: &mut RunReport,
) -> Result<TradeBatch> {
    let mut raw = Vec::with_capacity(TradeDirection::ALL.len());

    for direction in TradeDirection::ALL {
        let outcome = fetcher.fetch(period, codes, schemas.get(direction)).await?;
        report.skipped.extend(outcome.skipped);

        if outcome.rows.is_empty() {
            report.empty_directions.push((period, direction));
            match empty_policy {
                EmptyDirectionPolicy::Ignore => {}
                EmptyDirectionPolicy::Warn => {
                    warn!(%period, %direction, "no rows for any commodity code")
                }
                EmptyDirectionPolicy::Fail => {
                    bail!("{} returned no rows for {}", direction, period)
                }
            }
        }
        raw.push(outcome.rows);
    }

    let mut raw = raw.into_iter();
    let (imp, con, exp) = (
        raw.next().unwrap_or_default(),
        raw.next().unwrap_or_default(),
        raw.next().unwrap_or_default(),
    );
    normalize(imp, con, exp, schemas).with_context(|| format!("reshaping {}", period))
}

fn warn_on_duplicates(batch: &TradeBatch, tag: &str) {
    let dupes = duplicate_identifiers(batch);
    if !dupes.is_empty() {
        warn!(tag, count = dupes.len(), first = %dupes[0], "duplicate row identifiers in batch");
    }
}

/// Drive a whole run: every period in the plan, loaded per period or once at the end.
pub async fn run<T: Transport, S: Sink + ?Sized>(
    config: &Config,
    plan: &RunPlan,
    fetcher: &Fetcher<T>,
    sink: &mut S,
) -> Result<RunReport> {
    let mut report = RunReport::default();
    let codes = &config.commodity_codes;

    match config.mode {
        LoadMode::PerPeriod => {
            for &period in &plan.periods {
                let batch = fetch_period(
                    fetcher,
                    period,
                    codes,
                    &plan.schemas,
                    config.empty_direction,
                    &mut report,
                )
                .await?;
                report.periods += 1;

                let tag = period.to_string();
                warn_on_duplicates(&batch, &tag);
                match sink.load(&batch, &tag).await {
                    Ok(rows) => {
                        report.rows_loaded += rows;
                        info!(%period, rows, "period loaded");
                    }
                    Err(e) => {
                        error!(%period, error = %format!("{:#}", e), "load failed; re-run this period");
                        report.failed_loads.push(FailedLoad {
                            tag,
                            error: format!("{:#}", e),
                        });
                    }
                }
            }
        }
        LoadMode::Accumulate => {
            let mut batches = Vec::with_capacity(plan.periods.len());
            for &period in &plan.periods {
                let batch = fetch_period(
                    fetcher,
                    period,
                    codes,
                    &plan.schemas,
                    config.empty_direction,
                    &mut report,
                )
                .await?;
                report.periods += 1;
                info!(%period, rows = batch.num_rows(), "period collected");
                batches.push(batch);
            }

            let schema = build_arrow_schema(&plan.schemas.output_columns());
            let combined = TradeBatch::concat(&schema, &batches)?;
            let tag = match (plan.periods.first(), plan.periods.last()) {
                (Some(first), Some(last)) if first != last => format!("{}_{}", first, last),
                (Some(only), _) => only.to_string(),
                _ => String::from("empty"),
            };
            warn_on_duplicates(&combined, &tag);
            let rows = sink
                .load(&combined, &tag)
                .await
                .with_context(|| format!("loading accumulated batch {}", tag))?;
            report.rows_loaded = rows;
            info!(tag, rows, "run loaded");
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchFailure, QueryKey};

    fn skipped() -> SkippedQuery {
        SkippedQuery {
            key: QueryKey {
                period: "2024-01".parse().unwrap(),
                code: "7602000030".parse().unwrap(),
                direction: TradeDirection::Exports,
            },
            reason: FetchFailure::Status { status: 500 },
        }
    }

    #[test]
    fn outcome_reflects_report() {
        let mut report = RunReport::default();
        assert_eq!(report.outcome(), RunOutcome::Success);
        assert_eq!(report.outcome().exit_code(), 0);

        report.skipped.push(skipped());
        assert_eq!(report.outcome(), RunOutcome::PartialSuccess);
        assert_eq!(report.outcome().exit_code(), 2);

        report.failed_loads.push(FailedLoad {
            tag: "2024-01".into(),
            error: "duplicate key".into(),
        });
        assert_eq!(report.outcome(), RunOutcome::LoadFailed);
        assert_eq!(report.outcome().exit_code(), 3);
    }
}
