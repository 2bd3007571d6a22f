use text_enc::EncodedTitle;

/// One title ready for training.
#[derive(Clone, Debug, PartialEq)]
pub struct TrainingSample {
    /// Corpus row the sample came from.
    pub row: usize,
    pub title: String,
    pub score: f32,
    pub tokens: EncodedTitle,
}

impl TrainingSample {
    pub fn new(row: usize, title: impl Into<String>, score: f32, tokens: EncodedTitle) -> Self {
        Self {
            row,
            title: title.into(),
            score,
            tokens,
        }
    }
}
