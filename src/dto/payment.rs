use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::TokenPack,
    dao::models::{PaymentEntity, PaymentStatus},
    dto::format_system_time,
};

/// Practice token bundle offered by the shop.
#[derive(Debug, Serialize, ToSchema)]
pub struct TokenPackSummary {
    pub id: String,
    pub tokens: u32,
    pub price_cents: u32,
}

impl From<&TokenPack> for TokenPackSummary {
    fn from(value: &TokenPack) -> Self {
        Self {
            id: value.id.clone(),
            tokens: value.tokens,
            price_cents: value.price_cents,
        }
    }
}

/// Simulated card purchase of a token pack.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PurchaseRequest {
    #[validate(length(min = 1, max = 32))]
    pub pack_id: String,
    /// Card number; spaces are ignored.
    #[validate(length(min = 12, max = 32))]
    pub card_number: String,
}

/// Recorded purchase attempt.
#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentSummary {
    pub id: Uuid,
    pub pack_id: String,
    pub tokens: u32,
    pub amount_cents: u32,
    pub card_last4: String,
    pub status: PaymentStatus,
    pub created_at: String,
}

impl From<PaymentEntity> for PaymentSummary {
    fn from(value: PaymentEntity) -> Self {
        Self {
            id: value.id,
            pack_id: value.pack_id,
            tokens: value.tokens,
            amount_cents: value.amount_cents,
            card_last4: value.card_last4,
            status: value.status,
            created_at: format_system_time(value.created_at),
        }
    }
}
