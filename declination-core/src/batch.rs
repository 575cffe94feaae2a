//! Runs one declination query per valid coordinate record.
//!
//! Records are processed in input order. A failing query turns into a
//! [`DeclinationOutcome::Failure`] row and the batch carries on, so the
//! outcome list always lines up with the valid input records.

use futures::{FutureExt, StreamExt, stream};
use std::{
    any::Any,
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tracing::{debug, info, warn};

use crate::{
    error::BatchError,
    model::{BatchRequestConfig, CoordinateRecord, DeclinationOutcome},
    provider::DeclinationProvider,
};

/// Progress after a record finished, successfully or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    /// Whole percent, rounded down; 100 only once every record is done.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        (self.completed * 100 / self.total) as u8
    }

    pub fn is_complete(&self) -> bool {
        self.completed == self.total
    }
}

/// Shared flag checked between records.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub outcomes: Vec<DeclinationOutcome>,
    /// True when the run stopped early; `outcomes` then holds a prefix.
    pub cancelled: bool,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

#[derive(Debug)]
pub struct BatchExecutor<'a, P: ?Sized> {
    provider: &'a P,
    concurrency: usize,
    cancel: Option<CancelFlag>,
}

impl<'a, P> BatchExecutor<'a, P>
where
    P: DeclinationProvider + ?Sized,
{
    pub fn new(provider: &'a P) -> Self {
        Self { provider, concurrency: 1, cancel: None }
    }

    /// Allow up to `n` queries in flight. Outcomes and progress still follow
    /// input order.
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn with_cancel(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub async fn execute<F>(
        &self,
        records: &[CoordinateRecord],
        config: &BatchRequestConfig,
        mut on_progress: F,
    ) -> Result<BatchReport, BatchError>
    where
        F: FnMut(Progress),
    {
        let valid: Vec<&CoordinateRecord> = records.iter().filter(|r| r.is_valid()).collect();
        if valid.is_empty() {
            return Err(BatchError::NoValidCoordinates);
        }

        let total = valid.len();
        info!(total, skipped = records.len() - total, concurrency = self.concurrency, "Starting batch");

        let mut outcomes = Vec::with_capacity(total);
        let mut cancelled = false;

        let mut calls = std::pin::pin!(
            stream::iter(valid)
                .map(move |record| self.evaluate(record, config))
                .buffered(self.concurrency)
        );

        loop {
            if self.is_cancelled() {
                cancelled = true;
                break;
            }

            let Some(result) = calls.next().await else {
                break;
            };

            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(message) => {
                    warn!(completed = outcomes.len(), total, %message, "Batch aborted");
                    return Err(BatchError::Aborted { message, partial: outcomes });
                }
            }

            on_progress(Progress { completed: outcomes.len(), total });
        }

        let report = BatchReport { outcomes, cancelled };
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            cancelled,
            "Batch finished"
        );

        Ok(report)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelFlag::is_cancelled)
    }

    /// `Err` only when the provider panicked.
    async fn evaluate(
        &self,
        record: &CoordinateRecord,
        config: &BatchRequestConfig,
    ) -> Result<DeclinationOutcome, String> {
        let request = config.request_for(record.latitude, record.longitude);
        debug!(id = record.id, lat = request.latitude, lng = request.longitude, "Calculating");

        match AssertUnwindSafe(self.provider.declination(&request)).catch_unwind().await {
            Ok(Ok(declination)) => {
                Ok(DeclinationOutcome::Success { name: record.name.clone(), declination })
            }
            Ok(Err(err)) => {
                warn!(
                    id = record.id,
                    lat = record.latitude,
                    lng = record.longitude,
                    error = %format!("{err:#}"),
                    "Declination lookup failed"
                );
                Ok(DeclinationOutcome::failure(record, config, format!("{err:#}")))
            }
            Err(payload) => Err(panic_message(payload.as_ref())),
        }
    }
}

/// Run a batch with default options: sequential, not cancellable.
pub async fn run<P, F>(
    records: &[CoordinateRecord],
    config: &BatchRequestConfig,
    provider: &P,
    on_progress: F,
) -> Result<Vec<DeclinationOutcome>, BatchError>
where
    P: DeclinationProvider + ?Sized,
    F: FnMut(Progress),
{
    let report = BatchExecutor::new(provider).execute(records, config, on_progress).await?;
    Ok(report.outcomes)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic in declination provider".to_string()
    }
}
