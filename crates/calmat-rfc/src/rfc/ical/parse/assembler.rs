//! Incremental component assembly from unfolded content lines.
//!
//! The assembler is push based so the same state machine serves a whole
//! document held in memory and a reader consumed line by line.

use std::collections::VecDeque;

use super::error::{ParseError, ParseErrorKind, ParseResult};
use super::lexer::parse_content_line;
use super::parser::parse_property;
use crate::rfc::ical::core::{Component, ComponentKind, Property};

/// An item completed by the assembler.
#[derive(Debug, Clone, PartialEq)]
pub enum Assembled {
    CalendarBegin { line: usize },
    /// A property directly under VCALENDAR (PRODID, X-WR-CALNAME, ...).
    CalendarProperty(Property),
    /// A complete top-level component with its nested children.
    Component(Component),
    /// A top-level component that failed to parse and was skipped up to its END.
    ComponentError {
        name: String,
        line: usize,
        error: ParseError,
    },
    /// A calendar-level line that could not be lexed.
    LineError(ParseError),
    CalendarEnd { line: usize },
}

#[derive(Debug)]
struct Skip {
    name: String,
    line: usize,
    depth: usize,
    error: ParseError,
}

/// Push-based VCALENDAR state machine.
#[derive(Debug, Default)]
pub struct ComponentAssembler {
    in_calendar: bool,
    calendars: usize,
    stack: Vec<Component>,
    skipping: Option<Skip>,
    ready: VecDeque<Assembled>,
}

impl ComponentAssembler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of VCALENDAR envelopes opened so far.
    #[must_use]
    pub const fn calendars(&self) -> usize {
        self.calendars
    }

    /// Feeds one unfolded logical line.
    ///
    /// ## Errors
    /// Returns a structural error when content appears before the first
    /// `BEGIN:VCALENDAR`. Component-level problems are queued as
    /// [`Assembled::ComponentError`] instead.
    pub fn push_line(&mut self, line_num: usize, line: &str) -> ParseResult<()> {
        if !self.in_calendar {
            return self.push_outside(line_num, line);
        }

        let content = match parse_content_line(line, line_num) {
            Ok(content) => content,
            Err(error) => {
                self.fail_line(error);
                return Ok(());
            }
        };

        let is_begin = content.name == "BEGIN";
        let is_end = content.name == "END";
        let target = content.raw_value.trim().to_ascii_uppercase();

        if self.skipping.is_some() {
            self.continue_skip(is_begin, is_end, &target, line_num);
            return Ok(());
        }

        if is_begin {
            self.stack.push(Component::named(target, line_num));
        } else if is_end {
            self.close(&target, line_num);
        } else {
            match parse_property(content, line_num) {
                Ok(property) => match self.stack.last_mut() {
                    Some(open) => open.add_property(property),
                    None => self.ready.push_back(Assembled::CalendarProperty(property)),
                },
                Err(error) => self.fail_line(error),
            }
        }
        Ok(())
    }

    /// Pops the next completed item, if any.
    pub fn next_ready(&mut self) -> Option<Assembled> {
        self.ready.pop_front()
    }

    /// Signals end of input.
    ///
    /// ## Errors
    /// Returns `MissingBegin` when no calendar was seen and `MissingEnd` when
    /// the last calendar was never closed. Any component still open is
    /// queued as a [`Assembled::ComponentError`] first.
    pub fn finish(&mut self, line_num: usize) -> ParseResult<()> {
        if self.calendars == 0 {
            return Err(ParseError::new(ParseErrorKind::MissingBegin, line_num, 1)
                .with_context("no BEGIN:VCALENDAR found"));
        }
        if !self.in_calendar {
            return Ok(());
        }

        self.abandon_open(ParseError::new(
            ParseErrorKind::UnexpectedEof,
            line_num,
            1,
        ));
        Err(ParseError::new(ParseErrorKind::MissingEnd, line_num, 1)
            .with_context("input ended before END:VCALENDAR"))
    }

    fn push_outside(&mut self, line_num: usize, line: &str) -> ParseResult<()> {
        let opens_calendar = parse_content_line(line, line_num).is_ok_and(|content| {
            content.name == "BEGIN"
                && content
                    .raw_value
                    .trim()
                    .eq_ignore_ascii_case(ComponentKind::Calendar.as_str())
        });

        if opens_calendar {
            self.in_calendar = true;
            self.calendars += 1;
            self.ready
                .push_back(Assembled::CalendarBegin { line: line_num });
            return Ok(());
        }

        if self.calendars == 0 {
            return Err(ParseError::new(ParseErrorKind::MissingBegin, line_num, 1)
                .with_context("content before BEGIN:VCALENDAR"));
        }
        tracing::trace!(line = line_num, "Ignoring content after END:VCALENDAR");
        Ok(())
    }

    fn close(&mut self, target: &str, line_num: usize) {
        let Some(top) = self.stack.last() else {
            if target == ComponentKind::Calendar.as_str() {
                self.in_calendar = false;
                self.ready.push_back(Assembled::CalendarEnd { line: line_num });
            } else {
                self.ready.push_back(Assembled::LineError(
                    ParseError::new(ParseErrorKind::MismatchedComponent, line_num, 1)
                        .with_context(format!("END:{target} without BEGIN")),
                ));
            }
            return;
        };

        if top.name != target {
            let error = ParseError::new(ParseErrorKind::MismatchedComponent, line_num, 1)
                .with_context(format!("END:{target} closes BEGIN:{}", top.name));
            if target == ComponentKind::Calendar.as_str() {
                self.abandon_open(error);
                self.in_calendar = false;
                self.ready.push_back(Assembled::CalendarEnd { line: line_num });
            } else if self.stack.first().is_some_and(|root| root.name == target) {
                self.abandon_open(error);
            } else {
                self.start_skip(error, self.stack.len());
            }
            return;
        }

        let Some(done) = self.stack.pop() else {
            return;
        };
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(done),
            None => self.ready.push_back(Assembled::Component(done)),
        }
    }

    fn continue_skip(&mut self, is_begin: bool, is_end: bool, target: &str, line_num: usize) {
        let Some(skip) = self.skipping.as_mut() else {
            return;
        };
        if is_begin {
            skip.depth += 1;
        } else if is_end && target == ComponentKind::Calendar.as_str() {
            self.finish_skip();
            self.in_calendar = false;
            self.ready.push_back(Assembled::CalendarEnd { line: line_num });
        } else if is_end {
            skip.depth = skip.depth.saturating_sub(1);
            if skip.depth == 0 {
                self.finish_skip();
            }
        } else {
            // property inside the skipped component
        }
    }

    /// Routes an unusable line: inside a component it poisons the whole
    /// top-level component, at calendar level it is reported on its own.
    fn fail_line(&mut self, error: ParseError) {
        if self.skipping.is_some() {
            return;
        }
        if self.stack.is_empty() {
            self.ready.push_back(Assembled::LineError(error));
        } else {
            self.start_skip(error, self.stack.len());
        }
    }

    fn start_skip(&mut self, error: ParseError, depth: usize) {
        let Some(root) = self.stack.first() else {
            return;
        };
        tracing::debug!(
            component = %root.name,
            line = root.line,
            %error,
            "Skipping malformed component"
        );
        self.skipping = Some(Skip {
            name: root.name.clone(),
            line: root.line,
            depth,
            error,
        });
        self.stack.clear();
    }

    fn finish_skip(&mut self) {
        if let Some(skip) = self.skipping.take() {
            self.ready.push_back(Assembled::ComponentError {
                name: skip.name,
                line: skip.line,
                error: skip.error,
            });
        }
    }

    /// Reports the open top-level component (or the one being skipped) as failed.
    fn abandon_open(&mut self, error: ParseError) {
        if self.skipping.is_some() {
            self.finish_skip();
        } else if let Some(root) = self.stack.first() {
            self.ready.push_back(Assembled::ComponentError {
                name: root.name.clone(),
                line: root.line,
                error,
            });
        }
        self.stack.clear();
    }
}
