use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Registered account able to join teams, play matches and buy practice tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserEntity {
    /// Stable identifier for the user.
    pub id: Uuid,
    /// Unique login name (lowercase).
    pub username: String,
    /// Contact email address.
    pub email: String,
    /// Hex-encoded SHA-256 digest of `salt || password`.
    pub password_hash: String,
    /// Hex-encoded random salt mixed into the password digest.
    pub password_salt: String,
    /// Whether the user may manage questions, competitions and matches.
    pub is_admin: bool,
    /// Remaining practice tokens.
    pub practice_tokens: u32,
    /// Account creation timestamp.
    pub created_at: SystemTime,
}

/// A group of users competing together.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamEntity {
    /// Stable identifier for the team.
    pub id: Uuid,
    /// Display name, unique case-insensitively.
    pub name: String,
    /// User that created the team and manages registrations.
    pub captain_id: Uuid,
    /// Members in join order (the captain included).
    pub member_ids: Vec<Uuid>,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

/// Multiple choice question from the shared bank.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// Stable identifier for the question.
    pub id: Uuid,
    /// Question text.
    pub prompt: String,
    /// Candidate answers shown to players.
    pub choices: Vec<String>,
    /// Index of the right answer inside `choices`.
    pub correct_index: usize,
    /// Points credited for each correct answer.
    pub points: u32,
    /// Optional free-form category (e.g. "History").
    pub category: Option<String>,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

/// Registration status of a competition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CompetitionStatus {
    /// Teams may still register.
    Open,
    /// Registrations are frozen.
    Closed,
}

/// A league of teams playing scheduled matches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompetitionEntity {
    /// Stable identifier for the competition.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Free-form description shown to players.
    pub description: String,
    /// Registration status.
    pub status: CompetitionStatus,
    /// Registered teams in registration order.
    pub team_ids: Vec<Uuid>,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

/// Lifecycle status of a match as persisted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Scheduled, not started yet.
    Waiting,
    /// Questions are being played.
    Live,
    /// Final scores are known.
    Completed,
}

/// Head-to-head quiz event between two teams of a competition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchEntity {
    /// Stable identifier for the match.
    pub id: Uuid,
    /// Competition this match counts for.
    pub competition_id: Uuid,
    /// First team.
    pub home_team_id: Uuid,
    /// Second team.
    pub away_team_id: Uuid,
    /// Ordered question list played during the match.
    pub question_ids: Vec<Uuid>,
    /// Lifecycle status.
    pub status: MatchStatus,
    /// Index of the question currently (or last) played.
    pub current_question: Option<usize>,
    /// Accumulated home team score.
    pub home_score: u32,
    /// Accumulated away team score.
    pub away_score: u32,
    /// Optional announced start time.
    pub scheduled_at: Option<SystemTime>,
    /// When the match went live.
    pub started_at: Option<SystemTime>,
    /// When the match completed.
    pub completed_at: Option<SystemTime>,
    /// Last time the match entity was updated.
    pub updated_at: SystemTime,
}

impl MatchEntity {
    /// Whether `team_id` plays in this match.
    pub fn involves(&self, team_id: Uuid) -> bool {
        self.home_team_id == team_id || self.away_team_id == team_id
    }
}

/// Aggregated record of one team inside one competition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StandingEntity {
    /// Competition the row belongs to.
    pub competition_id: Uuid,
    /// Team the row describes.
    pub team_id: Uuid,
    /// Completed matches.
    pub played: u32,
    /// Matches won.
    pub wins: u32,
    /// Matches drawn.
    pub draws: u32,
    /// Matches lost.
    pub losses: u32,
    /// League points.
    pub points: u32,
    /// Total quiz score earned.
    pub score_for: u32,
    /// Total quiz score conceded.
    pub score_against: u32,
}

/// Outcome of a simulated card payment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Tokens were credited.
    Completed,
    /// Card was refused; nothing credited.
    Declined,
    /// Card was accepted but crediting the tokens failed.
    Failed,
}

/// Record of a practice token purchase attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentEntity {
    /// Stable identifier for the payment.
    pub id: Uuid,
    /// Purchasing user.
    pub user_id: Uuid,
    /// Token pack identifier.
    pub pack_id: String,
    /// Tokens in the pack.
    pub tokens: u32,
    /// Charged amount in cents.
    pub amount_cents: u32,
    /// Last four card digits.
    pub card_last4: String,
    /// Outcome.
    pub status: PaymentStatus,
    /// Attempt timestamp.
    pub created_at: SystemTime,
}
