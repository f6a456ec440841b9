use std::collections::VecDeque;

use crate::error::{EngineError, Result};
use crate::host::{CacheSnapshot, Chapter};

/// One chapter-bounded unit of output.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub start: f64,
    /// `None` runs to the end of the cache.
    pub end: Option<f64>,
    pub title: String,
}

/// Ordered segments still waiting for a write in chapter/segments mode.
///
/// Consumed strictly front to back; each segment is removed when its write
/// command is issued.
#[derive(Debug, Default)]
pub struct SegmentQueue {
    pending: VecDeque<Segment>,
    total: usize,
}

impl SegmentQueue {
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Number of segments in the current run.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn load(&mut self, segments: Vec<Segment>) {
        self.total = segments.len();
        self.pending = segments.into();
    }

    pub fn pop_front(&mut self) -> Option<Segment> {
        self.pending.pop_front()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.total = 0;
    }
}

/// Splits the chapter list into consecutive segments.
///
/// A leading segment is added when the cache starts before the first
/// chapter. The last segment is unbounded.
pub fn segments_from_chapters(chapters: &[Chapter], cache_start: Option<f64>) -> Vec<Segment> {
    let mut segments = Vec::with_capacity(chapters.len() + 1);
    let Some(first) = chapters.first() else {
        return segments;
    };

    if let Some(cache_start) = cache_start {
        if cache_start < first.time {
            segments.push(Segment {
                start: cache_start,
                end: Some(first.time),
                title: String::new(),
            });
        }
    }

    for (index, chapter) in chapters.iter().enumerate() {
        segments.push(Segment {
            start: chapter.time,
            end: chapters.get(index + 1).map(|next| next.time),
            title: chapter.title.clone(),
        });
    }
    segments
}

/// Builds the segment for one chapter, bounded by the next chapter start.
pub fn chapter_segment(chapters: &[Chapter], index: usize) -> Result<Segment> {
    if chapters.is_empty() {
        return Err(EngineError::NoChapters);
    }
    let chapter = chapters
        .get(index)
        .ok_or(EngineError::ChapterNotFound { index })?;
    Ok(Segment {
        start: chapter.time,
        end: chapters.get(index + 1).map(|next| next.time),
        title: chapter.title.clone(),
    })
}

/// Checks that `start..end` is cache-resident. An unbounded end needs the
/// media duration or the end of file to be cached.
pub fn is_cached(
    snapshot: &CacheSnapshot,
    start: f64,
    end: Option<f64>,
    duration: Option<f64>,
) -> bool {
    match end.or(duration) {
        Some(end) => snapshot.covers(start, end),
        None => {
            snapshot.eof_cached
                && snapshot
                    .cache_end()
                    .is_some_and(|cache_end| snapshot.covers(start, cache_end))
        }
    }
}

/// Checks that the whole media is cache-resident from the beginning of file.
pub fn is_fully_cached(snapshot: &CacheSnapshot, start: f64, duration: Option<f64>) -> bool {
    snapshot.bof_cached && is_cached(snapshot, start, None, duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::SeekRange;

    fn chapters(times: &[f64]) -> Vec<Chapter> {
        times
            .iter()
            .enumerate()
            .map(|(index, time)| Chapter {
                time: *time,
                title: format!("c{index}"),
            })
            .collect()
    }

    #[test]
    fn chapters_become_consecutive_segments() {
        let segments = segments_from_chapters(&chapters(&[0.0, 10.0, 20.0]), Some(0.0));

        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].end, Some(10.0));
        assert_eq!(segments[1].start, 10.0);
        assert_eq!(segments[2].end, None);
        assert_eq!(segments[2].title, "c2");
    }

    #[test]
    fn cache_before_first_chapter_adds_leading_segment() {
        let segments = segments_from_chapters(&chapters(&[5.0, 10.0]), Some(1.0));

        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].start, 1.0);
        assert_eq!(segments[0].end, Some(5.0));
        assert!(segments[0].title.is_empty());
    }

    #[test]
    fn chapter_segment_rejects_missing_chapters() {
        assert!(matches!(
            chapter_segment(&[], 0),
            Err(EngineError::NoChapters)
        ));
        assert!(matches!(
            chapter_segment(&chapters(&[0.0]), 3),
            Err(EngineError::ChapterNotFound { index: 3 })
        ));
        let segment = chapter_segment(&chapters(&[0.0, 10.0]), 0).expect("chapter exists");
        assert_eq!(segment.end, Some(10.0));
    }

    #[test]
    fn full_coverage_requires_beginning_of_file() {
        let mut snapshot = CacheSnapshot {
            seekable: vec![SeekRange {
                start: 0.0,
                end: 30.0,
            }],
            bof_cached: false,
            eof_cached: true,
            ..CacheSnapshot::default()
        };
        assert!(!is_fully_cached(&snapshot, 0.0, Some(30.0)));

        snapshot.bof_cached = true;
        assert!(is_fully_cached(&snapshot, 0.0, Some(30.0)));
        assert!(!is_fully_cached(&snapshot, 0.0, Some(60.0)));
    }

    #[test]
    fn unbounded_end_without_duration_needs_end_of_file() {
        let mut snapshot = CacheSnapshot {
            seekable: vec![SeekRange {
                start: 0.0,
                end: 30.0,
            }],
            ..CacheSnapshot::default()
        };
        assert!(!is_cached(&snapshot, 20.0, None, None));

        snapshot.eof_cached = true;
        assert!(is_cached(&snapshot, 20.0, None, None));
    }
}
