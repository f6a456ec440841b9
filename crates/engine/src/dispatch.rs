use std::collections::VecDeque;
use std::path::PathBuf;

use chrono::Local;
use tracing::{debug, error, info, warn};

use crate::api::{Engine, EngineErrorEvent, Event, WriteStatus};
use crate::config::DumpMode;
use crate::error::{EngineError, Result};
use crate::host::{DumpBound, Host, WriteId};
use crate::naming::{LabelContext, OutputName, output_path};
use crate::segments::{chapter_segment, is_cached, is_fully_cached, segments_from_chapters};

/// Writes allowed in flight at once: one finishing while the next starts.
pub const MAX_PENDING_WRITES: usize = 2;
/// Deferred requests kept while writes are in flight. Requests beyond this
/// are dropped.
pub const WRITE_QUEUE_CAPACITY: usize = 10;

/// One dump request from a user action, a script command or the automatic
/// controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRequest {
    pub mode: DumpMode,
    pub quiet: bool,
    /// Chapter index for chapter mode; defaults to the chapter under playback.
    pub chapter: Option<usize>,
}

impl WriteRequest {
    pub fn new(mode: DumpMode) -> Self {
        Self {
            mode,
            quiet: false,
            chapter: None,
        }
    }

    pub fn quiet(mode: DumpMode) -> Self {
        Self {
            quiet: true,
            ..Self::new(mode)
        }
    }
}

/// What happened to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Started(WriteId),
    Queued,
    /// Not loaded yet, quitting, or dropped by a full queue.
    Skipped,
}

impl WriteOutcome {
    /// The request was issued or will be issued once a slot frees up.
    pub fn accepted(self) -> bool {
        !matches!(self, Self::Skipped)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct PendingWrite {
    pub(crate) id: WriteId,
    pub(crate) path: PathBuf,
    pub(crate) continuous: bool,
    pub(crate) aborted: bool,
    pub(crate) quiet: bool,
    /// Issued from the segment list of a chapter or segments run.
    pub(crate) segment: bool,
    pub(crate) final_segment: bool,
}

/// In-flight writes and the deferred request queue.
#[derive(Debug, Default)]
pub struct WriteTracker {
    pending: Vec<PendingWrite>,
    queue: VecDeque<WriteRequest>,
    next_id: u64,
}

impl WriteTracker {
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn queued_requests(&self) -> impl Iterator<Item = &WriteRequest> {
        self.queue.iter()
    }

    /// An open-ended write is among the in-flight writes.
    pub fn continuous_in_flight(&self) -> bool {
        self.pending.iter().any(|write| write.continuous)
    }

    /// An in-flight write already targets `path`.
    pub fn is_writing(&self, path: &std::path::Path) -> bool {
        self.pending.iter().any(|write| write.path == path)
    }

    /// Requests are deferred when both slots are taken, or when a segment
    /// run would race an in-flight bounded write.
    pub(crate) fn must_defer(&self, segment_queued: bool) -> bool {
        self.pending.len() >= MAX_PENDING_WRITES
            || (segment_queued && !self.pending.is_empty() && !self.continuous_in_flight())
    }

    fn enqueue(&mut self, request: WriteRequest) -> bool {
        if self.queue.len() >= WRITE_QUEUE_CAPACITY {
            return false;
        }
        self.queue.push_back(request);
        true
    }

    fn allocate_id(&mut self) -> WriteId {
        self.next_id += 1;
        WriteId(self.next_id)
    }

    fn begin(&mut self, write: PendingWrite) {
        debug_assert!(self.pending.len() < MAX_PENDING_WRITES);
        self.pending.push(write);
    }

    fn finish(&mut self, id: WriteId) -> Option<PendingWrite> {
        let index = self.pending.iter().position(|write| write.id == id)?;
        Some(self.pending.remove(index))
    }

    fn pop_queued(&mut self) -> Option<WriteRequest> {
        self.queue.pop_front()
    }

    pub(crate) fn clear_queue(&mut self) {
        self.queue.clear();
    }

    /// Marks matching writes as aborted and returns their ids.
    pub(crate) fn mark_aborted(&mut self, filter: impl Fn(&PendingWrite) -> bool) -> Vec<WriteId> {
        self.pending
            .iter_mut()
            .filter(|write| !write.aborted && filter(write))
            .map(|write| {
                write.aborted = true;
                write.id
            })
            .collect()
    }

    /// Most recently issued open-ended write that is still running.
    pub(crate) fn latest_continuous(&self) -> Option<WriteId> {
        self.pending
            .iter()
            .rev()
            .find(|write| write.continuous && !write.aborted)
            .map(|write| write.id)
    }
}

impl<H> Engine<H>
where
    H: Host,
{
    /// Turns a request into a bounded cache dump, defers it, or rejects it.
    pub(crate) fn cache_write(
        &mut self,
        request: WriteRequest,
        events: &mut Vec<Event>,
    ) -> Result<WriteOutcome> {
        let Some(output) = self.output.clone() else {
            debug!(
                mode = request.mode.as_str(),
                "write skipped: title or extension unknown"
            );
            return Ok(WriteOutcome::Skipped);
        };
        if self.quitting {
            debug!(mode = request.mode.as_str(), "write skipped: quitting");
            return Ok(WriteOutcome::Skipped);
        }

        if self.writes.must_defer(!self.segments.is_empty()) {
            if self.writes.enqueue(request) {
                let depth = self.writes.queued();
                debug!(mode = request.mode.as_str(), depth, "write queued");
                events.push(Event::WriteQueued {
                    mode: request.mode,
                    depth,
                });
                return Ok(WriteOutcome::Queued);
            }
            warn!(
                mode = request.mode.as_str(),
                capacity = WRITE_QUEUE_CAPACITY,
                "write queue full, dropping request"
            );
            events.push(Event::WriteDropped { mode: request.mode });
            return Ok(WriteOutcome::Skipped);
        }

        self.start_write(request, &output, events)
    }

    /// Resolves bounds and the output path of an admitted request and hands
    /// it to the host.
    fn start_write(
        &mut self,
        request: WriteRequest,
        output: &OutputName,
        events: &mut Vec<Event>,
    ) -> Result<WriteOutcome> {
        if self.loop_range.normalize() {
            self.host
                .set_loop_points(self.loop_range.a, self.loop_range.b);
        }

        let prepared = match request.mode {
            DumpMode::Segments if self.segments.is_empty() => self.load_all_segments(),
            DumpMode::Chapter if self.segments.is_empty() => {
                self.load_chapter_segment(request.chapter)
            }
            _ => Ok(()),
        };
        if let Err(error) = prepared {
            self.segments.clear();
            return Err(self.reject(request, error));
        }

        let segment = match request.mode {
            DumpMode::Chapter | DumpMode::Segments => self.segments.pop_front(),
            _ => None,
        };
        let final_segment =
            request.mode == DumpMode::Segments && segment.is_some() && self.segments.is_empty();

        let bounds = match (&segment, request.mode) {
            (Some(segment), _) => Ok((
                DumpBound::At(segment.start),
                segment.end.map_or(DumpBound::Open, DumpBound::At),
            )),
            (None, DumpMode::Ab) => self.loop_bounds(),
            (None, DumpMode::Current) => self
                .host
                .playback_time()
                .map(|time| (DumpBound::Open, DumpBound::At(time)))
                .ok_or(EngineError::NoPlaybackPosition),
            (None, DumpMode::Continuous) => Ok((DumpBound::Open, DumpBound::Open)),
            (None, DumpMode::Chapter | DumpMode::Segments) => Err(EngineError::NoChapters),
        };
        let (start, end) = match bounds {
            Ok(bounds) => bounds,
            Err(error) => return Err(self.reject(request, error)),
        };
        let continuous = end == DumpBound::Open;

        let context = LabelContext {
            label: self.settings.output_label,
            start,
            end,
            chapter_title: segment.as_ref().map(|segment| segment.title.as_str()),
            now: Local::now(),
        };
        let host = &self.host;
        let writes = &self.writes;
        let path = output_path(&self.settings.save_directory, output, &context, |candidate| {
            host.file_exists(candidate) || writes.is_writing(candidate)
        });

        let id = self.writes.allocate_id();
        self.writes.begin(PendingWrite {
            id,
            path: path.clone(),
            continuous,
            aborted: false,
            quiet: request.quiet,
            segment: segment.is_some(),
            final_segment,
        });
        if let Err(error) = self.host.dump_cache(id, start, end, &path) {
            self.writes.finish(id);
            return Err(self.reject(request, error));
        }

        info!(
            id = id.0,
            mode = request.mode.as_str(),
            path = %path.display(),
            continuous,
            pending = self.writes.pending_count(),
            "cache write started"
        );
        if !request.quiet {
            let verb = if continuous {
                "Continuously dumping cache to"
            } else {
                "Dumping cache to"
            };
            self.host
                .show_message(&format!("{verb} {}", display_name(&path)));
        }
        events.push(Event::WriteStarted {
            id,
            path,
            continuous,
        });
        Ok(WriteOutcome::Started(id))
    }

    /// Completion bookkeeping for one write, then continues a segment run or
    /// drains the queue.
    pub(crate) fn on_write_finished(
        &mut self,
        id: WriteId,
        result: std::result::Result<(), String>,
        events: &mut Vec<Event>,
    ) {
        let Some(write) = self.writes.finish(id) else {
            warn!(id = id.0, "completion for unknown write");
            return;
        };

        let exists = self.host.file_exists(&write.path);
        let status = match (&result, exists) {
            (_, false) => WriteStatus::Failed,
            (Ok(()), true) => WriteStatus::Saved,
            (Err(_), true) if write.aborted => WriteStatus::Saved,
            (Err(_), true) => WriteStatus::PossiblyBroken,
        };
        let name = display_name(&write.path);
        match status {
            WriteStatus::Saved => {
                info!(id = id.0, path = %write.path.display(), "cache write saved");
                if !write.quiet {
                    self.host.show_message(&format!("Saved {name}"));
                }
            }
            WriteStatus::PossiblyBroken => {
                warn!(
                    id = id.0,
                    path = %write.path.display(),
                    error = result.as_ref().err().map(String::as_str).unwrap_or_default(),
                    "cache write possibly broken"
                );
                self.host
                    .show_message(&format!("Possibly broken: {name}"));
            }
            WriteStatus::Failed => {
                error!(
                    id = id.0,
                    path = %write.path.display(),
                    error = result.as_ref().err().map(String::as_str).unwrap_or("file missing"),
                    "cache write failed"
                );
                self.host.show_message(&format!("Write failed: {name}"));
            }
        }
        events.push(Event::WriteFinished {
            id,
            path: write.path,
            status,
        });

        if write.segment && !self.segments.is_empty() {
            self.continue_segments(events);
        } else if write.final_segment {
            let count = self.segments.total();
            info!(count, "segments dump finished");
            if !write.quiet {
                self.host
                    .show_message(&format!("Dumped {count} segment(s)"));
            }
            events.push(Event::SegmentsFinished { count });
        }

        if self.segments.is_empty() {
            if let Some(request) = self.writes.pop_queued() {
                debug!(
                    mode = request.mode.as_str(),
                    remaining = self.writes.queued(),
                    "draining queued write"
                );
                self.dispatch_logged(request, events);
            }
        }

        if self.quitting && self.writes.pending_count() == 0 {
            self.finish_quit();
        }
    }

    /// Dispatches a request on behalf of the engine itself; failures are
    /// logged and reported as events.
    pub(crate) fn dispatch_logged(
        &mut self,
        request: WriteRequest,
        events: &mut Vec<Event>,
    ) -> WriteOutcome {
        match self.cache_write(request, events) {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(mode = request.mode.as_str(), %error, "write rejected");
                events.push(Event::Error(EngineErrorEvent::from_error(&error)));
                WriteOutcome::Skipped
            }
        }
    }

    /// Issues the next segment of a run in the slot its predecessor freed.
    /// The run never goes through the queue, so at most one of its writes is
    /// in flight.
    fn continue_segments(&mut self, events: &mut Vec<Event>) {
        let Some(output) = self.output.clone() else {
            self.segments.clear();
            return;
        };
        let request = WriteRequest::quiet(DumpMode::Segments);
        if let Err(error) = self.start_write(request, &output, events) {
            self.segments.clear();
            events.push(Event::Error(EngineErrorEvent::from_error(&error)));
        }
    }

    /// Requests the host to cancel matching writes. Completions still arrive.
    pub(crate) fn abort_writes(&mut self, filter: impl Fn(&PendingWrite) -> bool) -> usize {
        let ids = self.writes.mark_aborted(filter);
        for id in &ids {
            debug!(id = id.0, "aborting write");
            self.host.abort_write(*id);
        }
        ids.len()
    }

    fn reject(&mut self, request: WriteRequest, error: EngineError) -> EngineError {
        warn!(mode = request.mode.as_str(), %error, "write rejected");
        if !request.quiet {
            self.host.show_message(&format!("Dump failed: {error}"));
        }
        error
    }

    fn loop_bounds(&self) -> Result<(DumpBound, DumpBound)> {
        match (self.loop_range.a, self.loop_range.b) {
            (None, None) => Err(EngineError::NoLoopPoints),
            (a, b) => Ok((
                a.map_or(DumpBound::Open, DumpBound::At),
                b.map_or(DumpBound::Open, DumpBound::At),
            )),
        }
    }

    fn load_all_segments(&mut self) -> Result<()> {
        let chapters = self.host.chapters();
        if chapters.is_empty() {
            return Err(EngineError::NoChapters);
        }
        let snapshot = self.host.cache_snapshot();
        let duration = self.host.duration();
        let segments = segments_from_chapters(&chapters, snapshot.cache_start());
        let start = segments.first().map_or(0.0, |segment| segment.start);
        if !is_fully_cached(&snapshot, start, duration) {
            return Err(EngineError::RangeNotCached {
                start,
                end: duration,
            });
        }
        debug!(count = segments.len(), "segments loaded");
        self.segments.load(segments);
        Ok(())
    }

    fn load_chapter_segment(&mut self, chapter: Option<usize>) -> Result<()> {
        let chapters = self.host.chapters();
        let index = chapter
            .or_else(|| self.host.current_chapter())
            .ok_or(EngineError::NoChapters)?;
        let segment = chapter_segment(&chapters, index)?;
        let snapshot = self.host.cache_snapshot();
        if !is_cached(&snapshot, segment.start, segment.end, self.host.duration()) {
            return Err(EngineError::RangeNotCached {
                start: segment.start,
                end: segment.end,
            });
        }
        self.segments.load(vec![segment]);
        Ok(())
    }
}

fn display_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
