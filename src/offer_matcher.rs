//! Credit score to loan offer lookup over the admin-managed tier table.

use serde::Serialize;

use crate::models::ScoreTier;

/// Result of looking a credit score up in the offer-limit table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum OfferMatch {
    #[serde(rename_all = "camelCase")]
    Eligible { loan_amount: f64, tier_index: usize },
    /// No tier covers the score. Distinct from an offer of zero.
    NoEligibleOffer,
}

impl OfferMatch {
    pub fn loan_amount(&self) -> Option<f64> {
        match self {
            OfferMatch::Eligible { loan_amount, .. } => Some(*loan_amount),
            OfferMatch::NoEligibleOffer => None,
        }
    }
}

/// First tier (in table order) whose inclusive bounds contain `score`.
///
/// Tiers may overlap or leave gaps; overlaps resolve to the earlier tier.
pub fn match_offer(score: i32, tiers: &[ScoreTier]) -> OfferMatch {
    tiers
        .iter()
        .position(|tier| tier.contains(score))
        .map(|tier_index| OfferMatch::Eligible {
            loan_amount: tiers[tier_index].loan_amount,
            tier_index,
        })
        .unwrap_or(OfferMatch::NoEligibleOffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(min_score: i32, max_score: i32, loan_amount: f64) -> ScoreTier {
        ScoreTier {
            min_score,
            max_score,
            loan_amount,
        }
    }

    #[test]
    fn upper_bound_is_inclusive() {
        let tiers = [tier(600, 700, 50_000.0), tier(701, 800, 100_000.0)];
        assert_eq!(
            match_offer(700, &tiers),
            OfferMatch::Eligible {
                loan_amount: 50_000.0,
                tier_index: 0
            }
        );
        assert_eq!(match_offer(701, &tiers).loan_amount(), Some(100_000.0));
    }

    #[test]
    fn score_outside_every_tier_has_no_offer() {
        let tiers = [tier(600, 700, 50_000.0), tier(701, 800, 100_000.0)];
        assert_eq!(match_offer(900, &tiers), OfferMatch::NoEligibleOffer);
        assert_eq!(match_offer(599, &tiers), OfferMatch::NoEligibleOffer);
    }

    #[test]
    fn overlapping_tiers_prefer_first_listed() {
        let tiers = [tier(650, 800, 75_000.0), tier(700, 750, 1_000_000.0)];
        assert_eq!(match_offer(720, &tiers).loan_amount(), Some(75_000.0));
    }

    #[test]
    fn empty_table_has_no_offer() {
        assert_eq!(match_offer(750, &[]), OfferMatch::NoEligibleOffer);
    }

    #[test]
    fn serializes_with_status_tag() {
        let json = serde_json::to_value(OfferMatch::Eligible {
            loan_amount: 5.0,
            tier_index: 1,
        })
        .unwrap();
        assert_eq!(json["status"], "eligible");
        assert_eq!(json["loanAmount"], 5.0);
        assert_eq!(json["tierIndex"], 1);
        let none = serde_json::to_value(OfferMatch::NoEligibleOffer).unwrap();
        assert_eq!(none["status"], "noEligibleOffer");
    }
}
