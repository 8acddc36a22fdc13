//! Rain classification from weather-condition icon codes.

use crate::weather::WeatherCondition;

// ---

/// Whether it rains, and how hard (0 = none, 4 = heaviest).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RainClassification {
    pub raining: bool,
    pub level: u8,
}

fn level_for_icon(icon: &str) -> Option<u8> {
    match icon {
        "09d" => Some(1),
        "10d" => Some(2),
        "11d" => Some(3),
        "13d" => Some(4),
        _ => None,
    }
}

/// Classify rain over all condition records.
///
/// Every record is scanned and the last matching icon decides the level, so
/// `[10d, 09d]` yields level 1 even though 10d is heavier. Unknown or missing
/// icons leave the result untouched.
pub fn classify(conditions: &[WeatherCondition]) -> RainClassification {
    // ---
    let mut result = RainClassification::default();

    for condition in conditions {
        if let Some(level) = condition.icon.as_deref().and_then(level_for_icon) {
            result = RainClassification {
                raining: true,
                level,
            };
        }
    }

    result
}
