//! Tracking shim: the call instrumented statements are wrapped in.
//!
//! `content.track_recomputations(id, file, line)` produces a [`Tracked`] wrapper;
//! evaluating it records once against the recorder and hands the content back
//! unchanged.

use super::recorder::Recorder;

/// Content paired with the tracked-expression id it reports under
#[derive(Debug, Clone, PartialEq)]
pub struct Tracked<V> {
    content: V,
    id: String,
    file: String,
    line: u32,
}

impl<V> Tracked<V> {
    pub fn new(content: V, id: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Self {
            content,
            id: id.into(),
            file: file.into(),
            line,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// One evaluation: record, then return the content
    pub fn evaluate(self, recorder: &Recorder) -> V {
        recorder.record(&self.id, &self.file, self.line);
        self.content
    }
}

pub trait TrackRecomputations: Sized {
    fn track_recomputations(
        self,
        id: impl Into<String>,
        file: impl Into<String>,
        line: u32,
    ) -> Tracked<Self> {
        Tracked::new(self, id, file, line)
    }
}

impl<T> TrackRecomputations for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_records_once_and_passes_content_through() {
        let recorder = Recorder::new();
        let tracked = "hello".track_recomputations("Greeting_Text_0", "Greeting.view", 4);
        assert_eq!(tracked.id(), "Greeting_Text_0");

        assert_eq!(tracked.clone().evaluate(&recorder), "hello");
        assert_eq!(tracked.evaluate(&recorder), "hello");
        assert_eq!(recorder.count("Greeting_Text_0"), 2);
        assert_eq!(recorder.snapshot()["Greeting_Text_0"].line, 4);
    }

    #[test]
    fn test_wrapping_without_evaluating_records_nothing() {
        let recorder = Recorder::new();
        let _pending = 42.track_recomputations("Answer_View_0", "f", 1);
        assert!(recorder.snapshot().is_empty());
    }
}
