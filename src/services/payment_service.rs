//! Simulated shop for practice tokens.

use std::time::SystemTime;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    dao::models::{PaymentEntity, PaymentStatus},
    dto::payment::{PaymentSummary, PurchaseRequest, TokenPackSummary},
    error::ServiceError,
    services::auth_service::AuthUser,
    state::SharedState,
};

/// Test card that is always refused.
const DECLINED_CARD: &str = "4000000000000002";

/// Token packs on sale.
pub fn list_packs(state: &SharedState) -> Vec<TokenPackSummary> {
    state
        .config()
        .token_packs()
        .iter()
        .map(TokenPackSummary::from)
        .collect()
}

/// Luhn checksum over a string of ASCII digits.
fn luhn_valid(digits: &str) -> bool {
    let mut sum = 0;
    for (position, byte) in digits.bytes().rev().enumerate() {
        let mut digit = u32::from(byte - b'0');
        if position % 2 == 1 {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
    }
    sum % 10 == 0
}

fn normalize_card(raw: &str) -> Result<String, ServiceError> {
    let digits: String = raw.chars().filter(|c| *c != ' ').collect();
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ServiceError::InvalidInput(
            "card number must contain digits only".into(),
        ));
    }
    if !(12..=19).contains(&digits.len()) {
        return Err(ServiceError::InvalidInput(
            "card number must have 12 to 19 digits".into(),
        ));
    }
    if !luhn_valid(&digits) {
        return Err(ServiceError::InvalidInput(
            "card number checksum is invalid".into(),
        ));
    }
    Ok(digits)
}

/// Buy a token pack with a (simulated) card.
pub async fn purchase(
    state: &SharedState,
    user: &AuthUser,
    payload: PurchaseRequest,
) -> Result<PaymentSummary, ServiceError> {
    let config = state.config();
    let pack = config.token_pack(&payload.pack_id).ok_or_else(|| {
        ServiceError::InvalidInput(format!("unknown token pack `{}`", payload.pack_id))
    })?;
    let card = normalize_card(&payload.card_number)?;
    let store = state.require_store().await?;

    let mut payment = PaymentEntity {
        id: Uuid::new_v4(),
        user_id: user.id,
        pack_id: pack.id.clone(),
        tokens: pack.tokens,
        amount_cents: pack.price_cents,
        card_last4: card[card.len() - 4..].to_string(),
        status: PaymentStatus::Declined,
        created_at: SystemTime::now(),
    };

    if card == DECLINED_CARD {
        store.save_payment(payment.clone()).await?;
        warn!(payment_id = %payment.id, user_id = %user.id, "card payment declined");
        return Err(ServiceError::PaymentDeclined(format!(
            "card ending in {} was declined",
            payment.card_last4
        )));
    }

    {
        let _gate = state.account_gate().lock().await;
        let mut account = store
            .find_user(user.id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user `{}` not found", user.id)))?;

        // The receipt is written before the credit so tokens never exist without one.
        payment.status = PaymentStatus::Completed;
        store.save_payment(payment.clone()).await?;

        account.practice_tokens = account.practice_tokens.saturating_add(pack.tokens);
        if let Err(err) = store.save_user(account).await {
            error!(
                payment_id = %payment.id,
                user_id = %user.id,
                error = %err,
                "failed to credit purchased tokens"
            );
            payment.status = PaymentStatus::Failed;
            if let Err(record_err) = store.save_payment(payment.clone()).await {
                warn!(payment_id = %payment.id, error = %record_err, "failed to record payment failure");
            }
            return Err(err.into());
        }
    }

    info!(
        payment_id = %payment.id,
        user_id = %user.id,
        pack_id = %payment.pack_id,
        tokens = payment.tokens,
        "practice tokens purchased"
    );
    Ok(payment.into())
}

/// The caller's purchase history, newest first.
pub async fn list_payments(
    state: &SharedState,
    user: &AuthUser,
) -> Result<Vec<PaymentSummary>, ServiceError> {
    let store = state.require_store().await?;
    let mut payments = store.list_payments(user.id).await?;
    payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(payments.into_iter().map(PaymentSummary::from).collect())
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    };

    use futures::future::BoxFuture;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            arena_store::{ArenaStore, MemoryStore},
            models::{
                CompetitionEntity, MatchEntity, QuestionEntity, StandingEntity, TeamEntity,
                UserEntity,
            },
            storage::{StorageError, StorageResult},
        },
        services::auth_service::{
            self,
            tests::{memory_state, signed_in},
        },
        state::AppState,
    };

    const GOOD_CARD: &str = "4242 4242 4242 4242";

    fn request(pack_id: &str, card_number: &str) -> PurchaseRequest {
        PurchaseRequest {
            pack_id: pack_id.into(),
            card_number: card_number.into(),
        }
    }

    /// Credit five practice tokens to `user`.
    pub(crate) async fn buy_starter_pack(state: &SharedState, user: &AuthUser) {
        purchase(state, user, request("starter", GOOD_CARD))
            .await
            .unwrap();
    }

    #[test]
    fn luhn_checksum() {
        assert!(luhn_valid("4242424242424242"));
        assert!(luhn_valid("4000000000000002"));
        assert!(!luhn_valid("4242424242424241"));
    }

    #[test]
    fn card_numbers_are_normalized() {
        assert_eq!(normalize_card(GOOD_CARD).unwrap(), "4242424242424242");
        assert!(normalize_card("4242-4242-4242-4242").is_err());
        assert!(normalize_card("42424242").is_err());
        assert!(normalize_card("4242 4242 4242 4241").is_err());
    }

    #[tokio::test]
    async fn completed_purchase_credits_tokens() {
        let state = memory_state();
        let alice = signed_in(&state, "alice").await;

        let payment = purchase(&state, &alice, request("regular", GOOD_CARD))
            .await
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert_eq!(payment.card_last4, "4242");
        assert_eq!(auth_service::me(&state, &alice).await.unwrap().practice_tokens, 15);

        assert!(matches!(
            purchase(&state, &alice, request("mega", GOOD_CARD)).await,
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn declined_card_is_recorded_without_tokens() {
        let state = memory_state();
        let alice = signed_in(&state, "alice").await;
        buy_starter_pack(&state, &alice).await;

        let err = purchase(&state, &alice, request("pro", "4000 0000 0000 0002"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::PaymentDeclined(_)));
        assert_eq!(auth_service::me(&state, &alice).await.unwrap().practice_tokens, 5);

        let history = list_payments(&state, &alice).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].status, PaymentStatus::Declined);
        assert_eq!(history[1].status, PaymentStatus::Completed);
    }

    /// Memory store whose user writes can be switched off.
    #[derive(Default)]
    struct UserWritesFail {
        inner: MemoryStore,
        failing: AtomicBool,
    }

    impl ArenaStore for UserWritesFail {
        fn save_user(&self, user: UserEntity) -> BoxFuture<'static, StorageResult<()>> {
            if self.failing.load(Ordering::SeqCst) {
                return Box::pin(async {
                    Err(StorageError::unavailable(
                        "user collection offline".into(),
                        std::io::Error::other("write refused"),
                    ))
                });
            }
            self.inner.save_user(user)
        }
        fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
            self.inner.find_user(id)
        }
        fn find_user_by_username(
            &self,
            username: String,
        ) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
            self.inner.find_user_by_username(username)
        }
        fn count_users(&self) -> BoxFuture<'static, StorageResult<u64>> {
            self.inner.count_users()
        }
        fn save_team(&self, team: TeamEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.save_team(team)
        }
        fn find_team(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<TeamEntity>>> {
            self.inner.find_team(id)
        }
        fn list_teams(&self) -> BoxFuture<'static, StorageResult<Vec<TeamEntity>>> {
            self.inner.list_teams()
        }
        fn delete_team(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
            self.inner.delete_team(id)
        }
        fn save_question(&self, question: QuestionEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.save_question(question)
        }
        fn find_question(
            &self,
            id: Uuid,
        ) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>> {
            self.inner.find_question(id)
        }
        fn list_questions(&self) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
            self.inner.list_questions()
        }
        fn save_competition(
            &self,
            competition: CompetitionEntity,
        ) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.save_competition(competition)
        }
        fn find_competition(
            &self,
            id: Uuid,
        ) -> BoxFuture<'static, StorageResult<Option<CompetitionEntity>>> {
            self.inner.find_competition(id)
        }
        fn list_competitions(&self) -> BoxFuture<'static, StorageResult<Vec<CompetitionEntity>>> {
            self.inner.list_competitions()
        }
        fn save_match(&self, game: MatchEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.save_match(game)
        }
        fn find_match(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<MatchEntity>>> {
            self.inner.find_match(id)
        }
        fn list_matches(
            &self,
            competition_id: Option<Uuid>,
        ) -> BoxFuture<'static, StorageResult<Vec<MatchEntity>>> {
            self.inner.list_matches(competition_id)
        }
        fn replace_standings(
            &self,
            competition_id: Uuid,
            standings: Vec<StandingEntity>,
        ) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.replace_standings(competition_id, standings)
        }
        fn list_standings(
            &self,
            competition_id: Uuid,
        ) -> BoxFuture<'static, StorageResult<Vec<StandingEntity>>> {
            self.inner.list_standings(competition_id)
        }
        fn save_payment(&self, payment: PaymentEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.save_payment(payment)
        }
        fn list_payments(
            &self,
            user_id: Uuid,
        ) -> BoxFuture<'static, StorageResult<Vec<PaymentEntity>>> {
            self.inner.list_payments(user_id)
        }
        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.health_check()
        }
        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.try_reconnect()
        }
    }

    #[tokio::test]
    async fn failed_credit_leaves_a_failed_receipt() {
        let store = Arc::new(UserWritesFail::default());
        let state = AppState::with_store(AppConfig::default(), store.clone());
        let alice = signed_in(&state, "alice").await;

        store.failing.store(true, Ordering::SeqCst);
        let result = purchase(&state, &alice, request("starter", GOOD_CARD)).await;
        assert!(matches!(result, Err(ServiceError::Unavailable(_))));
        store.failing.store(false, Ordering::SeqCst);

        assert_eq!(auth_service::me(&state, &alice).await.unwrap().practice_tokens, 0);
        let history = list_payments(&state, &alice).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, PaymentStatus::Failed);
    }
}
