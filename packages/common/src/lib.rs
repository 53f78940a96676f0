pub mod auth;
pub mod ids;
pub mod retry;
pub mod tunnel;
pub mod types;

pub use types::{
    AccountStatus, AccountTier, ApiKeyOwner, ApiKeyStatus, ChannelStatus, DeliveryMode,
    DeliveryStatus, SignalStatus, SignalUrgency, SubscriptionStatus, WebhookStatus,
};
