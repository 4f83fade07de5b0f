use crate::profile::{Metric, Profile};

#[derive(Debug, Clone)]
pub struct PriorRole {
    pub positions: &'static [&'static str],
    pub name: &'static str,
    pub description: &'static str,
    pub template: Profile,
}

fn deep_lying_playmaker() -> Profile {
    Profile::from_pairs([
        (Metric::ForwardPassRatio, 0.6),
        (Metric::LongPassRatio, 0.4),
        (Metric::PassSuccessRate, 0.85),
        (Metric::AveragePassLength, 15.0),
        (Metric::TouchZoneCentral, 0.7),
        (Metric::TouchZoneForward, 0.3),
        (Metric::AverageTouchX, 50.0),
        (Metric::AverageTouchY, 30.0),
        (Metric::DefensiveActionFrequency, 0.05),
        (Metric::ShotFrequency, 0.01),
    ])
}

fn inverted_full_back() -> Profile {
    Profile::from_pairs([
        (Metric::ForwardPassRatio, 0.5),
        (Metric::LongPassRatio, 0.2),
        (Metric::PassSuccessRate, 0.80),
        (Metric::AveragePassLength, 10.0),
        (Metric::TouchZoneCentral, 0.4),
        (Metric::TouchZoneWide, 0.6),
        (Metric::TouchZoneForward, 0.5),
        (Metric::AverageTouchX, 30.0),
        (Metric::AverageTouchY, 50.0),
        (Metric::DefensiveActionFrequency, 0.10),
        (Metric::ShotFrequency, 0.02),
    ])
}

fn box_to_box() -> Profile {
    Profile::from_pairs([
        (Metric::ForwardPassRatio, 0.55),
        (Metric::LongPassRatio, 0.25),
        (Metric::PassSuccessRate, 0.82),
        (Metric::AveragePassLength, 12.0),
        (Metric::TouchZoneCentral, 0.6),
        (Metric::TouchZoneForward, 0.4),
        (Metric::AverageTouchX, 50.0),
        (Metric::AverageTouchY, 40.0),
        (Metric::DefensiveActionFrequency, 0.15),
        (Metric::ShotFrequency, 0.03),
    ])
}

/// Sparse templates; absent metrics are scored as 0.
pub fn prior_roles() -> Vec<PriorRole> {
    vec![
        PriorRole {
            positions: &["CM"],
            name: "Deep Lying Playmaker",
            description: "Runs the build-up from deep and switches play with long passes",
            template: deep_lying_playmaker(),
        },
        PriorRole {
            positions: &["CM"],
            name: "Box-to-Box Midfielder",
            description: "Contributes in both boxes",
            template: box_to_box(),
        },
        PriorRole {
            positions: &["LB", "RB"],
            name: "Inverted Wing-Back",
            description: "Starts wide and tucks inside to join the build-up",
            template: inverted_full_back(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prior_ratios_are_valid() {
        for prior in prior_roles() {
            assert!(!prior.positions.is_empty());
            for (metric, value) in prior.template.iter() {
                if metric.is_ratio() {
                    assert!((0.0..=1.0).contains(&value), "{} {metric}", prior.name);
                }
            }
        }
    }
}
