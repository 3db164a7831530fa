//! Subscription tiers and their static feature/quota configuration.
//!
//! Tiers are a closed set matched exhaustively; the configuration table is
//! fixed at compile time and never mutated at runtime. `admin` is a role on
//! the user record, not a pricing tier (see `models::user::Role`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Tier1,
    Tier2,
}

/// Static per-tier feature flags and quota limits.
/// Supplies the denominator for the quota gate and the booleans that gate
/// map access and image upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierConfig {
    pub name: Tier,
    pub display_name: &'static str,
    pub map_access: bool,
    pub image_upload: bool,
    pub modalities: u32,
    pub prediction_days: u32,
    pub api_calls_per_month: u32,
    pub processing_time: &'static str,
    pub model: &'static str,
    pub features: &'static [&'static str],
}

const FREE: TierConfig = TierConfig {
    name: Tier::Free,
    display_name: "Free Tier",
    map_access: true,
    image_upload: false,
    modalities: 1,
    prediction_days: 5,
    api_calls_per_month: 3,
    processing_time: "3-5 minutes",
    model: "85% Accuracy",
    features: &[
        "Map, coordinates",
        "1 modality",
        "5-day predictions",
        "85% Model Accuracy",
        "3 API calls per month",
    ],
};

const TIER1: TierConfig = TierConfig {
    name: Tier::Tier1,
    display_name: "Tier 1 (Pro)",
    map_access: true,
    image_upload: true,
    modalities: 3,
    prediction_days: 10,
    api_calls_per_month: 100,
    processing_time: "1-2 minutes",
    model: "92% Accuracy",
    features: &[
        "Map, coordinates & image upload",
        "3 modalities",
        "10-day predictions",
        "92% Model Accuracy",
        "100 API calls per month",
    ],
};

const TIER2: TierConfig = TierConfig {
    name: Tier::Tier2,
    display_name: "Tier 2 (Enterprise)",
    map_access: true,
    image_upload: true,
    modalities: 3,
    prediction_days: 10,
    api_calls_per_month: 1000,
    processing_time: "< 30 seconds",
    model: "97% Accuracy",
    features: &[
        "Map, coordinates & image upload",
        "3 modalities",
        "10-day predictions",
        "97% Model Accuracy",
        "1000 API calls per month",
        "Priority processing",
    ],
};

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Free, Tier::Tier1, Tier::Tier2];

    pub fn config(&self) -> &'static TierConfig {
        match self {
            Tier::Free => &FREE,
            Tier::Tier1 => &TIER1,
            Tier::Tier2 => &TIER2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Tier1 => "tier1",
            Tier::Tier2 => "tier2",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Tier::Free),
            "tier1" => Ok(Tier::Tier1),
            "tier2" => Ok(Tier::Tier2),
            other => Err(AppError::UnknownTier(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_tiers() {
        assert_eq!("free".parse::<Tier>().unwrap(), Tier::Free);
        assert_eq!("tier1".parse::<Tier>().unwrap(), Tier::Tier1);
        assert_eq!("tier2".parse::<Tier>().unwrap(), Tier::Tier2);
    }

    #[test]
    fn test_parse_unknown_tier_fails() {
        let err = "platinum".parse::<Tier>().unwrap_err();
        assert!(matches!(err, AppError::UnknownTier(t) if t == "platinum"));
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        assert!("Free".parse::<Tier>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for tier in Tier::ALL {
            assert_eq!(tier.as_str().parse::<Tier>().unwrap(), tier);
        }
    }

    #[test]
    fn test_monthly_allowances() {
        assert_eq!(Tier::Free.config().api_calls_per_month, 3);
        assert_eq!(Tier::Tier1.config().api_calls_per_month, 100);
        assert_eq!(Tier::Tier2.config().api_calls_per_month, 1000);
    }

    #[test]
    fn test_free_tier_has_no_image_upload() {
        assert!(!Tier::Free.config().image_upload);
        assert!(Tier::Tier1.config().image_upload);
        assert!(Tier::Tier2.config().image_upload);
    }

    #[test]
    fn test_all_tiers_have_map_access() {
        for tier in Tier::ALL {
            assert!(tier.config().map_access);
        }
    }

    #[test]
    fn test_prediction_horizons() {
        assert_eq!(Tier::Free.config().prediction_days, 5);
        assert_eq!(Tier::Tier1.config().prediction_days, 10);
        assert_eq!(Tier::Tier2.config().prediction_days, 10);
    }

    #[test]
    fn test_serde_wire_names() {
        assert_eq!(serde_json::to_string(&Tier::Tier1).unwrap(), "\"tier1\"");
        let t: Tier = serde_json::from_str("\"free\"").unwrap();
        assert_eq!(t, Tier::Free);
    }
}
