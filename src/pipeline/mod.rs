//! Pipeline controller.
//!
//! Each record walks a small state machine:
//!
//! ```text
//! PENDING -> RESOLVING -> FETCHING -> CLASSIFYING -> DONE
//!                 \            \            \
//!                  +------------+------------+--> NF-SHORT-CIRCUIT -> DONE
//! ```
//!
//! Records are processed strictly in input order, one at a time, and a row is
//! written only when its record reaches `DONE`. Record-level failures never
//! abort the run; they end in an NF label. Only store problems escape as a
//! [`PipelineError`].

use std::fmt;
use std::path::Path;

use crate::classify::{ClassifyError, Classifier};
use crate::fetch::FetchClient;
use crate::models::{FetchStatus, Label, OutputRow, PublicationRecord, ResolvedLink};
use crate::resolve::{LinkResolver, ResolveError};
use crate::store::{ResultWriter, StoreError};

/// Errors that stop a run
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Start row {start_row} is beyond the {rows} input rows")]
    StartBeyondInput { start_row: usize, rows: usize },
}

/// Why a record ended up NF
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NfReason {
    Unresolved(ResolveError),
    Fetch(FetchStatus),
    Classification(ClassifyError),
}

impl fmt::Display for NfReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NfReason::Unresolved(e) => write!(f, "unresolved: {}", e),
            NfReason::Fetch(status) => write!(f, "fetch failed: {:?}", status),
            NfReason::Classification(e) => write!(f, "classification failed: {}", e),
        }
    }
}

/// Per-record processing state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordState {
    Pending,
    Resolving,
    Fetching(ResolvedLink),
    Classifying { link: ResolvedLink, text: String },
    NfShortCircuit(NfReason),
    Done(Label),
}

impl RecordState {
    fn name(&self) -> &'static str {
        match self {
            RecordState::Pending => "PENDING",
            RecordState::Resolving => "RESOLVING",
            RecordState::Fetching(_) => "FETCHING",
            RecordState::Classifying { .. } => "CLASSIFYING",
            RecordState::NfShortCircuit(_) => "NF-SHORT-CIRCUIT",
            RecordState::Done(_) => "DONE",
        }
    }
}

/// Final result for one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    pub label: Label,
    /// Full-text link, when resolution succeeded
    pub link: Option<ResolvedLink>,
    /// Set when `label` is NF
    pub nf_reason: Option<NfReason>,
}

/// Counts for a finished (or interrupted) run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub yes: usize,
    pub no: usize,
    pub nf: usize,
    /// Rows kept from a previous run
    pub skipped: usize,
    /// Input rows
    pub total: usize,
}

impl RunSummary {
    /// Rows labelled in this run
    pub fn processed(&self) -> usize {
        self.yes + self.no + self.nf
    }

    fn count(&mut self, label: Label) {
        match label {
            Label::Yes => self.yes += 1,
            Label::No => self.no += 1,
            Label::Nf => self.nf += 1,
        }
    }
}

/// Explicit state of a run: where it writes and how far it got
#[derive(Debug)]
pub struct RunContext {
    writer: ResultWriter,
    summary: RunSummary,
}

impl RunContext {
    /// Open `output` for a run over `input_rows` records.
    ///
    /// `start_row` must not exceed the number of input rows; the store
    /// additionally checks that rows before it are already written.
    pub fn open(
        output: &Path,
        start_row: Option<usize>,
        input_rows: usize,
    ) -> Result<Self, PipelineError> {
        if let Some(start_row) = start_row {
            if start_row > input_rows {
                return Err(PipelineError::StartBeyondInput {
                    start_row,
                    rows: input_rows,
                });
            }
        }

        let writer = ResultWriter::open(output, start_row)?;
        let summary = RunSummary {
            skipped: writer.next_row(),
            total: input_rows,
            ..RunSummary::default()
        };

        Ok(Self { writer, summary })
    }

    /// Index of the next row to process
    pub fn current_row(&self) -> usize {
        self.writer.next_row()
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    fn complete(&mut self, record: &PublicationRecord, label: Label) -> Result<(), PipelineError> {
        self.writer
            .write_row(&OutputRow::from_record(record, label))?;
        self.summary.count(label);
        Ok(())
    }
}

/// Resolver, fetch client and classifier wired together
#[derive(Debug, Clone)]
pub struct Pipeline {
    resolver: LinkResolver,
    fetcher: FetchClient,
    classifier: Classifier,
}

impl Pipeline {
    pub fn new(resolver: LinkResolver, fetcher: FetchClient, classifier: Classifier) -> Self {
        Self {
            resolver,
            fetcher,
            classifier,
        }
    }

    /// Drive one record from PENDING to DONE
    pub async fn process_record(&self, record: &PublicationRecord) -> RecordOutcome {
        let mut state = RecordState::Pending;
        let mut link = None;
        let mut nf_reason = None;

        loop {
            let next = match state {
                RecordState::Pending => RecordState::Resolving,
                RecordState::Resolving => match self.resolver.resolve(record).await {
                    Ok(resolved) => {
                        tracing::debug!("Resolved {} via {}", resolved.url, resolved.origin);
                        link = Some(resolved.clone());
                        RecordState::Fetching(resolved)
                    }
                    Err(e) => RecordState::NfShortCircuit(NfReason::Unresolved(e)),
                },
                RecordState::Fetching(resolved) => {
                    let fetched = self.fetcher.fetch(&resolved.url).await;
                    match fetched.text() {
                        Some(text) => RecordState::Classifying {
                            link: resolved,
                            text: text.to_string(),
                        },
                        None => RecordState::NfShortCircuit(NfReason::Fetch(fetched.status)),
                    }
                }
                RecordState::Classifying { text, .. } => {
                    match self.classifier.classify(&text).await {
                        Ok(verdict) => RecordState::Done(verdict.into()),
                        Err(e) => RecordState::NfShortCircuit(NfReason::Classification(e)),
                    }
                }
                RecordState::NfShortCircuit(reason) => {
                    tracing::warn!("'{}' marked NF ({})", record.short_title(), reason);
                    nf_reason = Some(reason);
                    RecordState::Done(Label::Nf)
                }
                RecordState::Done(label) => {
                    return RecordOutcome {
                        label,
                        link,
                        nf_reason,
                    };
                }
            };

            tracing::trace!("'{}' -> {}", record.short_title(), next.name());
            state = next;
        }
    }

    /// Process `records` from the context's current row to the end
    pub async fn run(
        &self,
        records: &[PublicationRecord],
        context: &mut RunContext,
    ) -> Result<RunSummary, PipelineError> {
        self.run_with(records, context, |_, _| {}).await
    }

    /// Like [`run`](Self::run), calling `on_row(row, outcome)` after each row is written
    pub async fn run_with<F>(
        &self,
        records: &[PublicationRecord],
        context: &mut RunContext,
        mut on_row: F,
    ) -> Result<RunSummary, PipelineError>
    where
        F: FnMut(usize, &RecordOutcome),
    {
        let start = context.current_row();
        if start > records.len() {
            return Err(PipelineError::StartBeyondInput {
                start_row: start,
                rows: records.len(),
            });
        }
        if start > 0 {
            tracing::info!("Skipping {} rows already labelled", start);
        }

        for (row, record) in records.iter().enumerate().skip(start) {
            tracing::info!("[{}/{}] {}", row + 1, records.len(), record.short_title());
            let outcome = self.process_record(record).await;
            context.complete(record, outcome.label)?;
            tracing::info!("[{}/{}] DRIC: {}", row + 1, records.len(), outcome.label);
            on_row(row, &outcome);
        }

        let summary = context.summary();
        tracing::info!(
            "Run finished: {} YES, {} NO, {} NF, {} skipped",
            summary.yes,
            summary.no,
            summary.nf,
            summary.skipped
        );
        Ok(summary)
    }
}
