//! Ingestion: mode selection, then single-pass or streaming component intake.

pub mod selector;
pub mod streaming;

use std::sync::Arc;

use calmat_core::config::PipelineConfig;
use calmat_rfc::rfc::ical::core::{Component, ComponentKind, Property};
use calmat_rfc::rfc::ical::parse::{Assembled, ParseError, parse_document};
use calmat_rfc::RfcError;
use futures::{Stream, StreamExt};
use tokio::io::AsyncBufRead;
use tokio_util::sync::CancellationToken;

pub use selector::{IngestionMode, should_stream, validate_envelope};
pub use streaming::stream_components;

use crate::cache::{ComponentCache, Inserted, SharedCache};
use crate::calendar::{CalendarEvent, RawComponent};
use crate::component::{materialize, parse_component};
use crate::error::{ServiceError, ServiceResult};
use crate::normalize::TimeContext;
use crate::result::{CalendarMetadata, ParseWarning, WarningKind};

/// Everything ingestion hands to expansion and merge.
#[derive(Debug)]
pub struct Ingested {
    pub metadata: CalendarMetadata,
    /// Events resolved straight from their components, in document order.
    pub direct: Vec<CalendarEvent>,
    pub warnings: Vec<ParseWarning>,
    pub total_components: usize,
    /// Timezone state after the whole document was read.
    pub context: TimeContext,
    pub cache: SharedCache,
}

/// Accumulates assembled items into retained components, cache entries and
/// warnings.
///
/// Retained components are resolved into events only in [`Ingestor::finish`],
/// once every calendar-level timezone setting has been seen.
#[derive(Debug)]
pub struct Ingestor {
    mode: IngestionMode,
    max_events: usize,
    metadata: CalendarMetadata,
    context: TimeContext,
    cache: SharedCache,
    retained: Vec<Arc<RawComponent>>,
    warnings: Vec<ParseWarning>,
    total_components: usize,
    limit_reached: bool,
}

impl Ingestor {
    #[must_use]
    pub fn new(config: &PipelineConfig, mode: IngestionMode) -> Self {
        Self {
            mode,
            max_events: config.max_events_per_parse,
            metadata: CalendarMetadata::default(),
            context: TimeContext::new(config.default_timezone.as_deref()),
            cache: ComponentCache::new(config.cache_total_capacity, config.master_share_percent)
                .shared(),
            retained: Vec::new(),
            warnings: Vec::new(),
            total_components: 0,
            limit_reached: false,
        }
    }

    pub async fn accept(&mut self, item: Assembled) {
        match item {
            Assembled::CalendarProperty(property) => self.accept_property(&property),
            Assembled::Component(component) => self.accept_component(&component).await,
            Assembled::ComponentError { name, line, error } => {
                self.total_components += 1;
                self.skip(None, format!("{name} at line {line} skipped: {error}"));
            }
            Assembled::LineError(error) => {
                self.skip(None, format!("calendar line skipped: {error}"));
            }
            Assembled::CalendarBegin { .. } | Assembled::CalendarEnd { .. } => {}
        }
    }

    async fn accept_component(&mut self, component: &Component) {
        self.total_components += 1;
        match component.kind {
            ComponentKind::Event => self.accept_event(component).await,
            ComponentKind::Timezone => self.accept_timezone(component),
            _ => tracing::trace!(component = %component.name, "Ignoring component"),
        }
    }

    fn accept_property(&mut self, property: &Property) {
        let Some(value) = property
            .as_text()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToString::to_string)
        else {
            return;
        };

        let metadata = &mut self.metadata;
        match property.name.as_str() {
            "X-WR-CALNAME" => metadata.name = Some(value),
            "NAME" => {
                metadata.name.get_or_insert(value);
            }
            "X-WR-CALDESC" => metadata.description = Some(value),
            "DESCRIPTION" => {
                metadata.description.get_or_insert(value);
            }
            "X-WR-TIMEZONE" => {
                self.context.set_default_timezone(&value);
                metadata.timezone = Some(value);
            }
            "PRODID" => metadata.product_id = Some(value),
            "VERSION" => metadata.version = Some(value),
            _ => {}
        }
    }

    /// Registers a fixed-offset fallback for a VTIMEZONE, from its first
    /// STANDARD observance (or DAYLIGHT if there is none).
    fn accept_timezone(&mut self, component: &Component) {
        let Some(tzid) = component.get_property("TZID").and_then(Property::as_text) else {
            return;
        };
        let offset = component
            .children_of_kind(ComponentKind::Standard)
            .chain(component.children_of_kind(ComponentKind::Daylight))
            .find_map(|observance| observance.get_property("TZOFFSETTO"))
            .and_then(Property::as_utc_offset)
            .and_then(|offset| offset.to_fixed_offset());

        if let Some(offset) = offset {
            tracing::trace!(tzid, %offset, "Registered VTIMEZONE offset");
            self.context.register_fixed(tzid.trim(), offset);
        }
    }

    async fn accept_event(&mut self, component: &Component) {
        let raw = match parse_component(component) {
            Ok(raw) => raw,
            Err(e) => {
                self.skip(component.uid(), format!("VEVENT at line {} skipped: {e}", component.line));
                return;
            }
        };
        if raw.start.is_none() {
            let message = format!("VEVENT at line {} skipped: no DTSTART", raw.line);
            self.skip(Some(&raw.uid), message);
            return;
        }

        let raw = Arc::new(raw);
        let inserted = self.cache.write().await.insert(Arc::clone(&raw));
        tracing::trace!(uid = %raw.uid, ?inserted, "Cached component");
        if inserted == Inserted::Dropped && raw.is_master() {
            tracing::debug!(uid = %raw.uid, "No cache capacity for series component");
        }

        if self.mode == IngestionMode::Streaming && self.retained.len() >= self.max_events {
            if !self.limit_reached {
                self.limit_reached = true;
                self.warnings.push(ParseWarning::new(
                    WarningKind::EventLimitReached,
                    None,
                    format!("stopped retaining events after {}", self.max_events),
                ));
            }
            return;
        }
        self.retained.push(raw);
    }

    fn skip(&mut self, uid: Option<&str>, message: String) {
        tracing::warn!(uid, %message, "Component skipped");
        self.warnings
            .push(ParseWarning::new(WarningKind::ComponentSkipped, uid, message));
    }

    /// Closes intake: resolves retained components against the final
    /// timezone state and reports timezone fallbacks and cache evictions.
    pub async fn finish(mut self) -> Ingested {
        let retained = std::mem::take(&mut self.retained);
        let mut direct = Vec::with_capacity(retained.len());
        for raw in retained {
            match materialize(&raw, &mut self.context) {
                Ok(event) => direct.push(event),
                Err(e) => {
                    let message = format!("VEVENT at line {} skipped: {e}", raw.line);
                    self.skip(Some(&raw.uid), message);
                }
            }
        }

        for tzid in self.context.take_unknown_tzids() {
            self.warnings.push(ParseWarning::new(
                WarningKind::TimezoneFallback,
                None,
                format!("unknown timezone {tzid}, used {}", self.context.default_zone()),
            ));
        }

        let evicted = self.cache.read().await.evicted();
        if evicted > 0 {
            self.warnings.push(ParseWarning::new(
                WarningKind::CacheEviction,
                None,
                format!("{evicted} components evicted from the component cache"),
            ));
        }

        tracing::debug!(
            direct = direct.len(),
            components = self.total_components,
            warnings = self.warnings.len(),
            "Ingestion finished"
        );

        Ingested {
            metadata: self.metadata,
            direct,
            warnings: self.warnings,
            total_components: self.total_components,
            context: self.context,
            cache: self.cache,
        }
    }
}

/// ## Summary
/// Parses an in-memory document in one pass.
///
/// Calendar properties and VTIMEZONEs are applied before any event so the
/// default zone is known for every event.
///
/// ## Errors
/// Returns a structural error for a missing or unterminated envelope.
#[tracing::instrument(skip_all, fields(input_len = input.len()))]
pub async fn ingest_single_pass(input: &str, ingestor: &mut Ingestor) -> ServiceResult<()> {
    let document = parse_document(input).map_err(structural)?;

    for property in document.properties {
        ingestor.accept(Assembled::CalendarProperty(property)).await;
    }
    let (timezones, others): (Vec<_>, Vec<_>) = document
        .components
        .into_iter()
        .partition(|c| c.kind == ComponentKind::Timezone);
    for component in timezones.into_iter().chain(others) {
        ingestor.accept(Assembled::Component(component)).await;
    }
    for (name, error) in document.failures {
        ingestor.total_components += usize::from(name != "VCALENDAR");
        ingestor.skip(None, format!("{name} skipped: {error}"));
    }
    Ok(())
}

/// ## Summary
/// Feeds a component stream to the ingestor, one suspension point per item.
///
/// ## Errors
/// Returns the stream's terminal error, or `Cancelled` when `cancel` fires
/// between items.
#[tracing::instrument(skip_all)]
pub async fn ingest_stream<R>(
    reader: R,
    max_bytes: usize,
    ingestor: &mut Ingestor,
    cancel: &CancellationToken,
) -> ServiceResult<()>
where
    R: AsyncBufRead + Unpin,
{
    let stream = std::pin::pin!(stream_components(reader, max_bytes));
    drain(stream, ingestor, cancel).await
}

async fn drain<S>(
    mut stream: S,
    ingestor: &mut Ingestor,
    cancel: &CancellationToken,
) -> ServiceResult<()>
where
    S: Stream<Item = ServiceResult<Assembled>> + Unpin,
{
    while let Some(item) = stream.next().await {
        if cancel.is_cancelled() {
            return Err(ServiceError::Cancelled);
        }
        ingestor.accept(item?).await;
    }
    Ok(())
}

fn structural(error: ParseError) -> ServiceError {
    ServiceError::from(RfcError::from(error))
}
