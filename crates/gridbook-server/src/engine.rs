use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Sqlite, Transaction};
use tokio::sync::watch;

use gridbook_core::{Address, CellKind};
use gridbook_formula::{evaluator, parser, DependencyGraph, FormulaError};

use crate::db::cells::{self, CellWrite};
use crate::db::models::CellRecord;
use crate::db::{self, Database};
use crate::error::AppError;
use crate::events::{CellChanged, ChangeNotifier};

/// Retries after the initial attempt, with doubling backoff per retry.
const MAX_RETRIES: u32 = 3;
const BACKOFF_BASE_MS: u64 = 100;

/// One cell edit. A blank value clears the cell.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCellRequest {
    pub row_index: i64,
    pub column_index: i64,
    #[serde(default)]
    pub value: String,
}

/// The externally visible shape of a cell.
#[derive(Debug, Clone, Serialize)]
pub struct CellView {
    pub row_index: i64,
    pub column_index: i64,
    pub address: String,
    pub cell_type: CellKind,
    pub raw_value: String,
    pub computed_value: String,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl From<CellRecord> for CellView {
    fn from(cell: CellRecord) -> Self {
        let address = cell.address().to_a1();
        let cell_type = cell.kind();
        Self {
            row_index: cell.row_index,
            column_index: cell.column_index,
            address,
            cell_type,
            raw_value: cell.raw_value,
            computed_value: cell.computed_value,
            version: cell.version,
            updated_at: cell.updated_at,
        }
    }
}

/// Orchestrates one edit: validate, cycle-check, evaluate, persist, then
/// re-evaluate every transitive dependent from the same transaction. Change
/// events go out only after the commit.
#[derive(Clone)]
pub struct CellEngine {
    db: Database,
    notifier: ChangeNotifier,
    shutdown: watch::Receiver<bool>,
}

impl CellEngine {
    pub fn new(db: Database, notifier: ChangeNotifier, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            db,
            notifier,
            shutdown,
        }
    }

    /// Apply a single edit, retrying the whole protocol on version
    /// conflicts. Returns `None` when the edit cleared the cell (or cleared
    /// nothing).
    pub async fn update_cell(
        &self,
        sheet_id: i64,
        request: &UpdateCellRequest,
    ) -> Result<Option<CellView>, AppError> {
        retry_on_conflict(&self.shutdown, move || self.try_update(sheet_id, request)).await
    }

    /// Apply edits in order. Per-cell failures are logged and skipped; the
    /// result holds only the cells that updated.
    pub async fn batch_update(
        &self,
        sheet_id: i64,
        requests: &[UpdateCellRequest],
    ) -> Result<Vec<CellView>, AppError> {
        tracing::info!(sheet_id, count = requests.len(), "batch updating cells");

        let mut results = Vec::new();
        for request in requests {
            match self.update_cell(sheet_id, request).await {
                Ok(Some(view)) => results.push(view),
                Ok(None) => {}
                Err(err) => {
                    tracing::error!(
                        sheet_id,
                        row = request.row_index,
                        col = request.column_index,
                        "batch item failed: {err}"
                    );
                }
            }
        }

        Ok(results)
    }

    pub async fn get_cell(
        &self,
        sheet_id: i64,
        row_index: i64,
        column_index: i64,
    ) -> Result<CellView, AppError> {
        let cell = cells::get(self.db.pool(), sheet_id, row_index, column_index)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Cell not found at ({row_index}, {column_index}) in sheet {sheet_id}"
                ))
            })?;

        Ok(cell.into())
    }

    pub async fn list_cells(&self, sheet_id: i64) -> Result<Vec<CellView>, AppError> {
        let cells = cells::list(self.db.pool(), sheet_id).await?;
        Ok(cells.into_iter().map(Into::into).collect())
    }

    /// One attempt of the edit protocol, inside a single transaction.
    async fn try_update(
        &self,
        sheet_id: i64,
        request: &UpdateCellRequest,
    ) -> Result<Option<CellView>, AppError> {
        let mut tx = self.db.begin().await?;

        let sheet = db::fetch_sheet(&mut *tx, sheet_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Sheet {sheet_id} not found")))?;

        let row = request.row_index;
        let col = request.column_index;
        if row < 1 || row > sheet.row_count {
            return Err(AppError::BadRequest(format!(
                "Row index {row} out of bounds (1-{})",
                sheet.row_count
            )));
        }
        if col < 0 || col >= sheet.column_count {
            return Err(AppError::BadRequest(format!(
                "Column index {col} out of bounds (0-{})",
                sheet.column_count - 1
            )));
        }

        let addr = Address::new(row as u32, col as u32);
        let existing = cells::get(&mut *tx, sheet_id, row, col).await?;
        let value = request.value.trim();

        if value.is_empty() {
            // Clearing an absent cell changes nothing.
            let Some(existing) = existing else {
                return Ok(None);
            };

            cells::delete(&mut *tx, sheet_id, row, col, Some(existing.version)).await?;
            tracing::info!(sheet_id, %addr, "cleared cell");

            let events = recompute_dependents(&mut tx, sheet_id, addr).await?;
            tx.commit().await?;
            self.publish(events);
            return Ok(None);
        }

        let kind = CellKind::classify(value);
        let computed = if kind == CellKind::Formula {
            parser::validate(value)?;

            let all = cells::list(&mut *tx, sheet_id).await?;
            let graph =
                DependencyGraph::build(all.iter().map(|c| (c.address(), c.raw_value.as_str())));
            // An unresolvable range is a per-value error: the cell still
            // persists and evaluation below renders the #REF! symbol.
            let deps = match parser::extract_refs(value) {
                Ok(deps) => deps,
                Err(err) => {
                    tracing::warn!(sheet_id, %addr, "unresolvable references: {err}");
                    HashSet::new()
                }
            };

            if graph.would_create_cycle(addr, &deps) {
                return Err(FormulaError::Cycle(format!(
                    "circular dependency detected for cell {addr}"
                ))
                .into());
            }

            evaluator::evaluate(value, &values_map(&all))
        } else {
            value.to_string()
        };

        let saved = cells::upsert(
            &mut *tx,
            &CellWrite {
                sheet_id,
                row_index: row,
                column_index: col,
                kind,
                raw_value: value,
                computed_value: &computed,
            },
            existing.map(|c| c.version),
        )
        .await?;
        tracing::info!(sheet_id, %addr, kind = %saved.kind(), "updated cell");

        let mut events = vec![CellChanged {
            sheet_id,
            address: addr,
            version: saved.version,
            computed_value: saved.computed_value.clone(),
        }];
        events.extend(recompute_dependents(&mut tx, sheet_id, addr).await?);

        let view = CellView::from(saved);
        tx.commit().await?;
        self.publish(events);

        Ok(Some(view))
    }

    fn publish(&self, events: Vec<CellChanged>) {
        for event in events {
            self.notifier.notify(event);
        }
    }
}

/// The retry envelope of spec'd edits: run one attempt, and on a version
/// conflict rerun it from scratch after a doubling backoff, up to
/// `MAX_RETRIES` retries. Only the conflict is retried; every other outcome
/// passes straight through. The shutdown signal aborts a backoff sleep
/// promptly and surfaces the cancellation.
pub async fn retry_on_conflict<T, F, Fut>(
    shutdown: &watch::Receiver<bool>,
    mut operation: F,
) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut attempt: u32 = 0;
    loop {
        match operation().await {
            Err(AppError::VersionConflict) if attempt < MAX_RETRIES => {
                attempt += 1;
                let delay = Duration::from_millis(BACKOFF_BASE_MS << (attempt - 1));
                tracing::warn!(attempt, "version conflict, retrying in {:?}", delay);
                backoff(shutdown, delay).await?;
            }
            outcome => return outcome,
        }
    }
}

/// Sleep out the retry backoff, aborting promptly on shutdown.
async fn backoff(shutdown: &watch::Receiver<bool>, delay: Duration) -> Result<(), AppError> {
    let mut shutdown = shutdown.clone();
    if *shutdown.borrow() {
        return Err(AppError::Cancelled);
    }

    tokio::select! {
        _ = tokio::time::sleep(delay) => Ok(()),
        _ = shutdown.changed() => Err(AppError::Cancelled),
    }
}

/// Re-evaluate every formula that transitively reads the changed address,
/// dependencies first, updating the values map as results land. Dependents
/// whose computed value is unchanged are left alone.
async fn recompute_dependents(
    tx: &mut Transaction<'_, Sqlite>,
    sheet_id: i64,
    changed: Address,
) -> Result<Vec<CellChanged>, AppError> {
    let all = cells::list(&mut **tx, sheet_id).await?;
    let graph = DependencyGraph::build(all.iter().map(|c| (c.address(), c.raw_value.as_str())));
    if graph.is_empty() {
        return Ok(Vec::new());
    }

    let dependents = graph.transitive_dependents(changed);
    if dependents.is_empty() {
        return Ok(Vec::new());
    }
    tracing::info!(sheet_id, %changed, count = dependents.len(), "re-evaluating dependent cells");

    let order = match graph.topo_sort() {
        Ok(order) => order,
        Err(err) => {
            // Committed state is supposed to be acyclic; hitting one here
            // means stale state from a concurrent writer. Leave the rest to
            // that edit's own recomputation.
            tracing::error!(sheet_id, "cycle detected during re-evaluation: {err}");
            return Ok(Vec::new());
        }
    };

    let by_addr: HashMap<Address, &CellRecord> = all.iter().map(|c| (c.address(), c)).collect();
    let mut values = values_map(&all);
    let mut events = Vec::new();

    for addr in order {
        if !dependents.contains(&addr) {
            continue;
        }
        let Some(cell) = by_addr.get(&addr) else {
            continue;
        };
        if cell.kind() != CellKind::Formula {
            continue;
        }

        let recomputed = evaluator::evaluate(&cell.raw_value, &values);
        values.insert(addr, recomputed.clone());
        if recomputed == cell.computed_value {
            continue;
        }

        let saved = cells::upsert(
            &mut **tx,
            &CellWrite {
                sheet_id,
                row_index: cell.row_index,
                column_index: cell.column_index,
                kind: CellKind::Formula,
                raw_value: &cell.raw_value,
                computed_value: &recomputed,
            },
            Some(cell.version),
        )
        .await?;
        tracing::debug!(sheet_id, %addr, value = %saved.computed_value, "re-evaluated dependent");

        events.push(CellChanged {
            sheet_id,
            address: addr,
            version: saved.version,
            computed_value: saved.computed_value,
        });
    }

    Ok(events)
}

fn values_map(cells: &[CellRecord]) -> HashMap<Address, String> {
    cells
        .iter()
        .map(|c| (c.address(), c.computed_value.clone()))
        .collect()
}
