// Nearest-reference classification of highlight stroke colors
use crate::types::{ColorClass, RgbColor};

pub const YELLOW: RgbColor = RgbColor::new(1.0, 1.0, 0.0);
pub const BLUE: RgbColor = RgbColor::new(0.0, 0.0, 1.0);

/// Maps a stroke color to the nearer of pure yellow and pure blue.
///
/// Every input lands in one of the two bins; an orange or green stroke is
/// forced into whichever reference is closer. Equal distances resolve to
/// Yellow.
pub fn classify(color: RgbColor) -> ColorClass {
    let to_yellow = color.distance(&YELLOW);
    let to_blue = color.distance(&BLUE);

    if to_blue < to_yellow {
        ColorClass::Blue
    } else {
        ColorClass::Yellow
    }
}

/// Classifies an optional stroke; a missing RGB stroke is Unknown.
pub fn classify_stroke(stroke: Option<RgbColor>) -> ColorClass {
    stroke.map(classify).unwrap_or(ColorClass::Unknown)
}
