use serde::Serialize;

/// Class labels in model output order: 26 letters, then "Space" and "nothing".
pub const CLASSES: [&str; 28] = [
    "A", "B", "C", "D", "E", "F", "G", "H", "I", "J",
    "K", "L", "M", "N", "O", "P", "Q", "R", "S", "T",
    "U", "V", "W", "X", "Y", "Z", "Space", "nothing",
];

/// Predictions scoring below this are reported as [`UNCERTAIN`].
pub const CONFIDENCE_THRESHOLD: f32 = 0.5;

pub const UNCERTAIN: &str = "uncertain";

/// A gated prediction: the label shown to the caller and the raw top probability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub label: String,
    pub confidence: f32,
}

/// Maps a class index to its label, or `Unknown_<index>` past the end of the table.
pub fn label_for_index(index: usize) -> String {
    CLASSES
        .get(index)
        .map(|label| label.to_string())
        .unwrap_or_else(|| format!("Unknown_{}", index))
}

/// Applies the confidence threshold. Only the label changes; `confidence` is kept as is.
pub fn gate(index: usize, confidence: f32) -> Prediction {
    let label = if confidence < CONFIDENCE_THRESHOLD {
        log::warn!(
            "Prediction confidence {:.4} below threshold {}",
            confidence,
            CONFIDENCE_THRESHOLD
        );
        UNCERTAIN.to_string()
    } else {
        if index >= CLASSES.len() {
            log::warn!(
                "Predicted class index {} out of range (max: {})",
                index,
                CLASSES.len() - 1
            );
        }
        label_for_index(index)
    };
    Prediction { label, confidence }
}
