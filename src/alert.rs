use std::fmt;

/// Alert priority for the accessibility surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Urgency {
    Low,
    Medium,
    High,
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        f.write_str(s)
    }
}

/// A curated alert category for a recognized sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alert {
    pub category: &'static str,
    pub urgency: Urgency,
}

/// Classifier labels the alerting surface cares about, with the category and
/// urgency each maps to. Several raw labels can fold into one category.
const ALERT_TABLE: &[(&str, &str, Urgency)] = &[
    ("Clapping", "Clapping", Urgency::Low),
    ("Hands", "Clapping", Urgency::Low),
    ("Knock", "Knock", Urgency::Low),
    ("Finger snapping", "Finger snap", Urgency::Low),
    ("Siren", "Siren", Urgency::High),
    ("Ambulance (siren)", "Siren", Urgency::High),
    ("Fire engine, fire truck (siren)", "Siren", Urgency::High),
    ("Vehicle horn, car horn, honking", "Car horn", Urgency::High),
    ("Dog", "Dog bark", Urgency::Medium),
    ("Bark", "Dog bark", Urgency::Medium),
    ("Baby cry, infant cry", "Baby cry", Urgency::High),
    ("Speech", "Speech", Urgency::Low),
];

/// Look up the curated alert for a raw classifier label.
///
/// Labels outside the table are still published as events; consumers treat
/// them as informational.
#[must_use]
pub fn alert_for_label(label: &str) -> Option<Alert> {
    ALERT_TABLE
        .iter()
        .find(|(raw, _, _)| *raw == label)
        .map(|&(_, category, urgency)| Alert { category, urgency })
}

/// The full label taxonomy the alerting surface recognizes.
#[must_use]
pub const fn alert_table() -> &'static [(&'static str, &'static str, Urgency)] {
    ALERT_TABLE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sirens_are_high_urgency() {
        for label in ["Siren", "Ambulance (siren)", "Fire engine, fire truck (siren)"] {
            let alert = alert_for_label(label).unwrap_or_else(|| panic!("no alert for {label}"));
            assert_eq!(alert.category, "Siren");
            assert_eq!(alert.urgency, Urgency::High);
        }
    }

    #[test]
    fn related_labels_fold_into_one_category() {
        let dog = alert_for_label("Dog").unwrap_or_else(|| panic!("no alert"));
        let bark = alert_for_label("Bark").unwrap_or_else(|| panic!("no alert"));
        assert_eq!(dog, bark);
        assert_eq!(dog.urgency, Urgency::Medium);
    }

    #[test]
    fn unknown_labels_have_no_alert() {
        assert!(alert_for_label("Theremin").is_none());
        assert!(alert_for_label("").is_none());
    }

    #[test]
    fn urgency_orders_low_to_high() {
        assert!(Urgency::Low < Urgency::Medium);
        assert!(Urgency::Medium < Urgency::High);
    }
}
