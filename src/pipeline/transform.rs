use crate::event::{LengthEvent, TextEvent};

/// Per-record mapping applied by the processor binding.
/// Implementations are pure: same input, same output, no shared state.
pub trait Transform: Send + Sync {
    type Input;
    type Output;

    fn apply(&self, input: &Self::Input) -> Self::Output;
}

/// `TextEvent` -> `LengthEvent`.
///
/// Length is the number of Unicode scalar values (`char`s) in the text, not
/// its UTF-8 byte length and not grapheme clusters: `"héllo"` is 5, `"日本"`
/// is 2, and `"e\u{301}"` (e + combining acute) is 2.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextLengthTransform;

impl Transform for TextLengthTransform {
    type Input = TextEvent;
    type Output = LengthEvent;

    fn apply(&self, event: &TextEvent) -> LengthEvent {
        LengthEvent::new(event.text.chars().count())
    }
}
