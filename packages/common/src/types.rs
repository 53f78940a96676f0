#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Urgency of a signal, selects the delivery priority lane.
///
/// When the `sea-orm` feature is enabled, these enums can be used directly
/// in SeaORM entities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum SignalUrgency {
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "low"))]
    Low,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "normal"))]
    Normal,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "high"))]
    High,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "critical"))]
    Critical,
}

impl SignalUrgency {
    /// Returns true for urgencies served from the high-priority lane.
    pub fn is_urgent(&self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for SignalUrgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SignalUrgency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(format!(
                "Invalid urgency '{}'. Must be one of low, normal, high, critical",
                s
            )),
        }
    }
}

/// Signal lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum SignalStatus {
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "active"))]
    Active,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "deleted"))]
    Deleted,
}

/// Channel lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum ChannelStatus {
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "active"))]
    Active,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "paused"))]
    Paused,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "deleted"))]
    Deleted,
}

/// Subscription lifecycle status. Only active subscriptions receive fan-out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "active"))]
    Active,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "paused"))]
    Paused,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "canceled"))]
    Canceled,
}

/// Webhook endpoint status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum WebhookStatus {
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "active"))]
    Active,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "paused"))]
    Paused,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "disabled"))]
    Disabled,
}

/// Status of a single delivery attempt.
///
/// A delivery is created `Pending` before the side effect runs and moves to
/// `Success` or `Failed` exactly once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "pending"))]
    Pending,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "success"))]
    Success,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "failed"))]
    Failed,
}

impl DeliveryStatus {
    /// Returns true once the attempt has a final outcome.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Transport used for a delivery attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Pushed through the subscriber's persistent tunnel connection.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "agent"))]
    Agent,
    /// POSTed to a subscriber-owned HTTPS endpoint.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "webhook"))]
    Webhook,
}

/// API key owner role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyOwner {
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "publisher"))]
    Publisher,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "subscriber"))]
    Subscriber,
}

/// API key lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyStatus {
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "active"))]
    Active,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "revoked"))]
    Revoked,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "expired"))]
    Expired,
}

/// Account tier, maps to a rate-limit capacity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum AccountTier {
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "free"))]
    Free,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "pro"))]
    Pro,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "enterprise"))]
    Enterprise,
}

/// Account lifecycle status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "active"))]
    Active,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "suspended"))]
    Suspended,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "deleted"))]
    Deleted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urgency_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&SignalUrgency::Critical).unwrap(),
            "\"critical\""
        );
        assert_eq!(
            serde_json::from_str::<SignalUrgency>("\"normal\"").unwrap(),
            SignalUrgency::Normal
        );
    }

    #[test]
    fn test_urgency_is_case_sensitive() {
        assert!(serde_json::from_str::<SignalUrgency>("\"CRITICAL\"").is_err());
        assert!(serde_json::from_str::<SignalUrgency>("\"urgent\"").is_err());
    }

    #[test]
    fn test_urgency_lane_split() {
        assert!(!SignalUrgency::Low.is_urgent());
        assert!(!SignalUrgency::Normal.is_urgent());
        assert!(SignalUrgency::High.is_urgent());
        assert!(SignalUrgency::Critical.is_urgent());
    }

    #[test]
    fn test_urgency_from_str_roundtrip() {
        for urgency in [
            SignalUrgency::Low,
            SignalUrgency::Normal,
            SignalUrgency::High,
            SignalUrgency::Critical,
        ] {
            assert_eq!(urgency.as_str().parse::<SignalUrgency>().unwrap(), urgency);
        }
        assert!("loud".parse::<SignalUrgency>().is_err());
    }

    #[test]
    fn test_delivery_status_terminal() {
        assert!(!DeliveryStatus::Pending.is_terminal());
        assert!(DeliveryStatus::Success.is_terminal());
        assert!(DeliveryStatus::Failed.is_terminal());
    }

    #[test]
    fn test_delivery_mode_serialization() {
        assert_eq!(
            serde_json::to_string(&DeliveryMode::Agent).unwrap(),
            "\"agent\""
        );
        assert_eq!(
            serde_json::to_string(&DeliveryMode::Webhook).unwrap(),
            "\"webhook\""
        );
        assert!(serde_json::from_str::<DeliveryMode>("\"http\"").is_err());
    }

    #[test]
    fn test_owner_and_key_status_serialization() {
        assert_eq!(
            serde_json::to_string(&ApiKeyOwner::Publisher).unwrap(),
            "\"publisher\""
        );
        assert_eq!(
            serde_json::to_string(&ApiKeyStatus::Revoked).unwrap(),
            "\"revoked\""
        );
    }
}
