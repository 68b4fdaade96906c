//! Line-by-line component stream over an async reader.
//!
//! Only the component currently being assembled is held in memory; every
//! line read is a suspension point so callers can apply backpressure.

use calmat_rfc::RfcError;
use calmat_rfc::rfc::ical::parse::{Assembled, ComponentAssembler, LineUnfolder, ParseError};
use futures::Stream;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

use crate::error::{ServiceError, ServiceResult};

struct StreamState<R> {
    lines: Lines<R>,
    unfolder: LineUnfolder,
    assembler: ComponentAssembler,
    bytes_read: usize,
    max_bytes: usize,
    physical_lines: usize,
    failure: Option<ServiceError>,
    exhausted: bool,
}

/// ## Summary
/// Streams assembled top-level components (and calendar properties) from `reader`.
///
/// Items already completed are yielded before a terminal error. After an
/// `Err` item the stream ends.
///
/// ## Errors
/// Yields `InputTooLarge` once more than `max_bytes` were read, an I/O error
/// for reader failures or invalid UTF-8, and a structural error for a
/// missing or unterminated VCALENDAR envelope.
pub fn stream_components<R>(
    reader: R,
    max_bytes: usize,
) -> impl Stream<Item = ServiceResult<Assembled>>
where
    R: AsyncBufRead + Unpin,
{
    let state = StreamState {
        lines: reader.lines(),
        unfolder: LineUnfolder::new(),
        assembler: ComponentAssembler::new(),
        bytes_read: 0,
        max_bytes,
        physical_lines: 0,
        failure: None,
        exhausted: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        let item = state.next_item().await?;
        Some((item, state))
    })
}

impl<R: AsyncBufRead + Unpin> StreamState<R> {
    async fn next_item(&mut self) -> Option<ServiceResult<Assembled>> {
        loop {
            if let Some(item) = self.assembler.next_ready() {
                return Some(Ok(item));
            }
            if let Some(failure) = self.failure.take() {
                self.exhausted = true;
                return Some(Err(failure));
            }
            if self.exhausted {
                return None;
            }

            match self.lines.next_line().await {
                Ok(Some(raw)) => self.accept_line(&raw),
                Ok(None) => self.finish(),
                Err(e) => self.failure = Some(ServiceError::from(e)),
            }
        }
    }

    fn accept_line(&mut self, raw: &str) {
        self.physical_lines += 1;
        self.bytes_read = self.bytes_read.saturating_add(raw.len() + 1);
        if self.bytes_read > self.max_bytes {
            tracing::warn!(
                read = self.bytes_read,
                limit = self.max_bytes,
                "Calendar stream exceeds byte ceiling"
            );
            self.failure = Some(ServiceError::InputTooLarge {
                size: self.bytes_read,
                limit: self.max_bytes,
            });
            return;
        }

        if let Some((line_num, line)) = self.unfolder.push(raw)
            && let Err(e) = self.assembler.push_line(line_num, &line)
        {
            self.failure = Some(structural(e));
        }
    }

    fn finish(&mut self) {
        self.exhausted = true;
        tracing::debug!(
            lines = self.physical_lines,
            bytes = self.bytes_read,
            calendars = self.assembler.calendars(),
            "Calendar stream exhausted"
        );

        if let Some((line_num, line)) = self.unfolder.finish()
            && let Err(e) = self.assembler.push_line(line_num, &line)
        {
            self.failure = Some(structural(e));
            return;
        }
        if let Err(e) = self.assembler.finish(self.physical_lines.max(1)) {
            self.failure = Some(structural(e));
        }
    }
}

fn structural(error: ParseError) -> ServiceError {
    ServiceError::from(RfcError::from(error))
}
