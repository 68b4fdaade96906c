//! Entry point: calendar text in, [`ParseResult`] out.

use calmat_core::config::PipelineConfig;
use chrono::{DateTime, Utc};
use tokio::io::AsyncBufRead;
use tokio_util::sync::CancellationToken;

use crate::error::{ServiceError, ServiceResult};
use crate::expand::{ExpansionOrchestrator, ExpansionSettings, collect_candidates};
use crate::ingest::{
    IngestionMode, Ingestor, ingest_single_pass, ingest_stream, validate_envelope,
};
use crate::merge::merge;
use crate::result::{ParseResult, ParseWarning, WarningKind};

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Instant the expansion window is measured from. Defaults to now.
    pub reference_time: Option<DateTime<Utc>>,
    /// Cancels the call; expansion stops at its next checkpoint.
    pub cancel: Option<CancellationToken>,
}

/// Stateless pipeline; every call builds its own cache and timezone state.
#[derive(Debug, Clone)]
pub struct CalendarPipeline {
    config: PipelineConfig,
}

impl CalendarPipeline {
    /// ## Errors
    /// Returns a configuration error if `config` fails validation.
    pub fn new(config: PipelineConfig) -> ServiceResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// ## Summary
    /// Parses calendar text.
    ///
    /// Structural, size and cancellation failures produce a result with
    /// `success == false`; everything else is reported as warnings.
    #[tracing::instrument(skip_all, fields(input_len = input.len()))]
    pub async fn parse(&self, input: &str, options: ParseOptions) -> ParseResult {
        let source = self.config.include_source.then_some(input);
        match self.try_parse(input, &options).await {
            Ok(result) => result.with_source(source),
            Err(e) => {
                tracing::warn!(error = %e, "Calendar parse failed");
                ParseResult::failure(&e).with_source(source)
            }
        }
    }

    /// ## Summary
    /// Parses calendar text from a reader, always in streaming mode.
    ///
    /// Envelope problems surface when the stream reaches them, so events are
    /// never returned for a document without `END:VCALENDAR`.
    #[tracing::instrument(skip_all)]
    pub async fn parse_reader<R>(&self, reader: R, options: ParseOptions) -> ParseResult
    where
        R: AsyncBufRead + Unpin,
    {
        let cancel = child_token(&options);
        let _guard = cancel.clone().drop_guard();

        let mut ingestor = Ingestor::new(&self.config, IngestionMode::Streaming);
        let outcome = async {
            ingest_stream(reader, self.config.max_input_bytes, &mut ingestor, &cancel).await?;
            self.complete(ingestor, IngestionMode::Streaming, &options, &cancel)
                .await
        }
        .await;

        outcome.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Calendar stream parse failed");
            ParseResult::failure(&e)
        })
    }

    /// ## Summary
    /// Blocking adapter around [`CalendarPipeline::parse`] for synchronous
    /// callers. Runs on a private current-thread runtime.
    ///
    /// Must not be called from within an async runtime.
    #[must_use]
    pub fn parse_blocking(&self, input: &str, options: ParseOptions) -> ParseResult {
        match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime.block_on(self.parse(input, options)),
            Err(e) => ParseResult::failure(&ServiceError::from(e)),
        }
    }

    async fn try_parse(&self, input: &str, options: &ParseOptions) -> ServiceResult<ParseResult> {
        if input.len() > self.config.max_input_bytes {
            return Err(ServiceError::InputTooLarge {
                size: input.len(),
                limit: self.config.max_input_bytes,
            });
        }
        validate_envelope(input)?;

        let mode = IngestionMode::select(input, self.config.streaming_threshold_bytes);
        tracing::debug!(?mode, "Selected ingestion mode");

        let cancel = child_token(options);
        let _guard = cancel.clone().drop_guard();

        let mut ingestor = Ingestor::new(&self.config, mode);
        match mode {
            IngestionMode::SinglePass => ingest_single_pass(input, &mut ingestor).await?,
            IngestionMode::Streaming => {
                ingest_stream(
                    input.as_bytes(),
                    self.config.max_input_bytes,
                    &mut ingestor,
                    &cancel,
                )
                .await?;
            }
        }

        self.complete(ingestor, mode, options, &cancel).await
    }

    /// Expansion, merge and result assembly shared by both entry points.
    async fn complete(
        &self,
        ingestor: Ingestor,
        mode: IngestionMode,
        options: &ParseOptions,
        cancel: &CancellationToken,
    ) -> ServiceResult<ParseResult> {
        let ingested = ingestor.finish().await;
        if cancel.is_cancelled() {
            return Err(ServiceError::Cancelled);
        }
        let mut warnings = ingested.warnings;

        let series = if self.config.expansion_enabled {
            let candidates = collect_candidates(&ingested.cache).await;
            let reference = options.reference_time.unwrap_or_else(Utc::now);
            let orchestrator = ExpansionOrchestrator::new(
                ExpansionSettings::from_config(&self.config, reference),
                self.config.worker_concurrency,
                ingested.cache.clone(),
                ingested.context.clone(),
                cancel.clone(),
            );
            let report = orchestrator.run(candidates).await?;
            warnings.extend(report.warnings);
            report.series
        } else {
            Vec::new()
        };

        let mut events = merge(ingested.direct, series).events;
        if mode == IngestionMode::Streaming && events.len() > self.config.max_events_per_parse {
            events.truncate(self.config.max_events_per_parse);
            if !warnings.iter().any(|w| w.kind == WarningKind::EventLimitReached) {
                warnings.push(ParseWarning::new(
                    WarningKind::EventLimitReached,
                    None,
                    format!(
                        "kept the first {} events",
                        self.config.max_events_per_parse
                    ),
                ));
            }
        }

        tracing::info!(
            events = events.len(),
            components = ingested.total_components,
            warnings = warnings.len(),
            "Calendar parsed"
        );

        Ok(ParseResult::succeeded(
            events,
            ingested.metadata,
            ingested.total_components,
            warnings,
        ))
    }
}

fn child_token(options: &ParseOptions) -> CancellationToken {
    options
        .cancel
        .as_ref()
        .map_or_else(CancellationToken::new, CancellationToken::child_token)
}
