//! Campaign selection
//!
//! Ranks the candidate campaigns, drops dismissed ones and picks at most
//! one winner per [`Surface`].
//!
//! A preview campaign, when present in the candidate list, bypasses
//! ranking and dismissal and is selected alone.

use indexmap::IndexMap;
use tracing::{debug, trace};

use popwise_core::config::{Campaign, CampaignType, DisplayMode, Surface};

/// A campaign chosen for a surface.
#[derive(Debug, Clone)]
pub struct Selection {
    /// The winning campaign
    pub campaign: Campaign,
    /// Surface it occupies
    pub surface: Surface,
    /// Selected through preview mode
    pub preview: bool,
}

/// Returns the surface a campaign occupies.
#[must_use]
pub fn classify(campaign: &Campaign) -> Surface {
    match campaign.campaign_type {
        CampaignType::SocialProof => Surface::Notification,
        CampaignType::FreeShipping | CampaignType::CountdownTimer | CampaignType::Announcement => {
            Surface::Banner
        }
        _ if campaign.display_mode == Some(DisplayMode::Banner) => Surface::Banner,
        _ => Surface::Modal,
    }
}

/// Selects at most one campaign per surface, highest priority first.
///
/// Ties keep the input order. The result is ordered by priority.
pub fn select(
    campaigns: &[Campaign],
    is_dismissed: impl Fn(&str) -> bool,
    preview: Option<&str>,
) -> Vec<Selection> {
    if let Some(campaign) = preview.and_then(|id| campaigns.iter().find(|c| c.id == id)) {
        debug!(campaign = %campaign.id, "preview campaign selected");
        return vec![Selection {
            surface: classify(campaign),
            campaign: campaign.clone(),
            preview: true,
        }];
    }

    let mut ranked: Vec<&Campaign> = campaigns.iter().collect();
    ranked.sort_by(|a, b| b.priority.cmp(&a.priority));

    let mut winners: IndexMap<Surface, Selection> = IndexMap::new();
    for campaign in ranked {
        if is_dismissed(campaign.tracking_key()) {
            trace!(campaign = %campaign.id, key = campaign.tracking_key(), "dismissed");
            continue;
        }
        let surface = classify(campaign);
        winners.entry(surface).or_insert_with(|| Selection {
            campaign: campaign.clone(),
            surface,
            preview: false,
        });
    }

    debug!(
        candidates = campaigns.len(),
        winners = winners.len(),
        "campaigns selected"
    );
    winners.into_values().collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn campaign(id: &str, priority: i64, campaign_type: CampaignType) -> Campaign {
        Campaign {
            priority,
            campaign_type,
            ..Campaign::new(id)
        }
    }

    fn ids(selections: &[Selection]) -> Vec<&str> {
        selections.iter().map(|s| s.campaign.id.as_str()).collect()
    }

    #[test]
    fn test_one_winner_per_surface() {
        let campaigns = vec![
            campaign("m5", 5, CampaignType::Popup),
            campaign("m10", 10, CampaignType::Popup),
            campaign("m1", 1, CampaignType::Popup),
            campaign("bar", 0, CampaignType::Announcement),
        ];
        let selected = select(&campaigns, |_| false, None);
        assert_eq!(ids(&selected), vec!["m10", "bar"]);
        assert_eq!(selected[0].surface, Surface::Modal);
        assert_eq!(selected[1].surface, Surface::Banner);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let campaigns = vec![
            campaign("first", 3, CampaignType::Popup),
            campaign("second", 3, CampaignType::Popup),
        ];
        assert_eq!(ids(&select(&campaigns, |_| false, None)), vec!["first"]);
    }

    #[test]
    fn test_dismissed_tracking_keys_are_skipped() {
        let mut experiment = campaign("a", 10, CampaignType::Popup);
        experiment.experiment_id = Some("exp-1".to_string());
        let campaigns = vec![experiment, campaign("b", 5, CampaignType::Popup)];
        let dismissed: BTreeSet<String> = ["exp-1".to_string()].into();

        let selected = select(&campaigns, |key| dismissed.contains(key), None);
        assert_eq!(ids(&selected), vec!["b"]);
    }

    #[test]
    fn test_preview_bypasses_dismissal_and_priority() {
        let campaigns = vec![
            campaign("top", 100, CampaignType::Popup),
            campaign("draft", 0, CampaignType::FreeShipping),
        ];
        let selected = select(&campaigns, |_| true, Some("draft"));
        assert_eq!(ids(&selected), vec!["draft"]);
        assert!(selected[0].preview);
        assert_eq!(selected[0].surface, Surface::Banner);
    }

    #[test]
    fn test_unknown_preview_falls_back_to_normal_selection() {
        let campaigns = vec![campaign("top", 1, CampaignType::Popup)];
        let selected = select(&campaigns, |_| false, Some("missing"));
        assert_eq!(ids(&selected), vec!["top"]);
        assert!(!selected[0].preview);
    }

    #[test]
    fn test_classification() {
        assert_eq!(
            classify(&campaign("s", 0, CampaignType::SocialProof)),
            Surface::Notification
        );
        assert_eq!(
            classify(&campaign("c", 0, CampaignType::CountdownTimer)),
            Surface::Banner
        );
        assert_eq!(
            classify(&campaign("x", 0, CampaignType::Other("spin_wheel".to_string()))),
            Surface::Modal
        );

        let mut banner_popup = campaign("p", 0, CampaignType::Popup);
        banner_popup.display_mode = Some(DisplayMode::Banner);
        assert_eq!(classify(&banner_popup), Surface::Banner);
    }

    #[test]
    fn test_at_most_three_winners() {
        let campaigns = vec![
            campaign("m", 1, CampaignType::Popup),
            campaign("b", 1, CampaignType::FreeShipping),
            campaign("n", 1, CampaignType::SocialProof),
            campaign("m2", 9, CampaignType::Popup),
            campaign("n2", 0, CampaignType::SocialProof),
        ];
        let selected = select(&campaigns, |_| false, None);
        assert_eq!(ids(&selected), vec!["m2", "b", "n"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(select(&[], |_| false, None).is_empty());
    }
}
