use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::{
    entities::{
        conversation,
        conversation_message::{self, MessageRole},
    },
    errors::{is_unique_violation, ServiceError},
};

/// A message to append to a channel's history
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub role: MessageRole,
    pub author: Option<String>,
    pub content: String,
}

impl NewMessage {
    pub fn user(author: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            author: Some(author.into()),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            author: None,
            content: content.into(),
        }
    }
}

/// Per-channel chat history, capped at `history_limit` messages.
#[derive(Clone)]
pub struct ConversationService {
    db: Arc<DatabaseConnection>,
    history_limit: u64,
}

impl ConversationService {
    pub fn new(db: Arc<DatabaseConnection>, history_limit: u64) -> Self {
        Self {
            db,
            history_limit: history_limit.max(1),
        }
    }

    pub fn history_limit(&self) -> u64 {
        self.history_limit
    }

    pub async fn find(
        &self,
        team_id: Uuid,
        channel_id: &str,
    ) -> Result<Option<conversation::Model>, ServiceError> {
        conversation::Entity::find()
            .filter(conversation::Column::TeamId.eq(team_id))
            .filter(conversation::Column::ChannelId.eq(channel_id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Appends messages in order, then drops everything but the newest `history_limit`.
    #[instrument(skip(self, messages), fields(count = messages.len()))]
    pub async fn append_messages(
        &self,
        team_id: Uuid,
        channel_id: &str,
        persona: &str,
        messages: Vec<NewMessage>,
    ) -> Result<conversation::Model, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;
        let now = Utc::now();

        let existing = conversation::Entity::find()
            .filter(conversation::Column::TeamId.eq(team_id))
            .filter(conversation::Column::ChannelId.eq(channel_id))
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let convo = match existing {
            Some(found) => {
                let mut active: conversation::ActiveModel = found.into();
                active.persona = Set(persona.to_string());
                active.updated_at = Set(now);
                active.update(&txn).await.map_err(ServiceError::DatabaseError)?
            }
            None => conversation::ActiveModel {
                id: Set(Uuid::new_v4()),
                team_id: Set(team_id),
                channel_id: Set(channel_id.to_string()),
                persona: Set(persona.to_string()),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&txn)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    ServiceError::Conflict("Conversation was created concurrently".into())
                } else {
                    ServiceError::DatabaseError(e)
                }
            })?,
        };

        let mut sequence = last_sequence(&txn, convo.id).await?;
        for message in messages {
            sequence += 1;
            conversation_message::ActiveModel {
                id: Set(Uuid::new_v4()),
                conversation_id: Set(convo.id),
                sequence: Set(sequence),
                role: Set(message.role),
                author: Set(message.author),
                content: Set(message.content),
                created_at: Set(now),
            }
            .insert(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;
        }

        truncate(&txn, convo.id, self.history_limit).await?;
        txn.commit().await.map_err(ServiceError::DatabaseError)?;
        Ok(convo)
    }

    pub async fn append_message(
        &self,
        team_id: Uuid,
        channel_id: &str,
        persona: &str,
        message: NewMessage,
    ) -> Result<conversation::Model, ServiceError> {
        self.append_messages(team_id, channel_id, persona, vec![message])
            .await
    }

    /// Stored messages, oldest first. Empty for an unknown channel.
    #[instrument(skip(self))]
    pub async fn history(
        &self,
        team_id: Uuid,
        channel_id: &str,
    ) -> Result<Vec<conversation_message::Model>, ServiceError> {
        let Some(convo) = self.find(team_id, channel_id).await? else {
            return Ok(Vec::new());
        };
        conversation_message::Entity::find()
            .filter(conversation_message::Column::ConversationId.eq(convo.id))
            .order_by_asc(conversation_message::Column::Sequence)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Deletes up to `batch_size` conversations idle since before `cutoff`, oldest first.
    #[instrument(skip(self))]
    pub async fn sweep_stale(
        &self,
        cutoff: DateTime<Utc>,
        batch_size: u64,
    ) -> Result<u64, ServiceError> {
        let stale: Vec<Uuid> = conversation::Entity::find()
            .select_only()
            .column(conversation::Column::Id)
            .filter(conversation::Column::UpdatedAt.lt(cutoff))
            .order_by_asc(conversation::Column::UpdatedAt)
            .limit(batch_size)
            .into_tuple()
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        if stale.is_empty() {
            return Ok(0);
        }

        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;
        conversation_message::Entity::delete_many()
            .filter(conversation_message::Column::ConversationId.is_in(stale.clone()))
            .exec(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;
        let deleted = conversation::Entity::delete_many()
            .filter(conversation::Column::Id.is_in(stale))
            .exec(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .rows_affected;
        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        info!(deleted, cutoff = %cutoff, "Swept stale conversations");
        Ok(deleted)
    }
}

async fn last_sequence<C: ConnectionTrait>(conn: &C, conversation_id: Uuid) -> Result<i64, ServiceError> {
    let last: Option<i64> = conversation_message::Entity::find()
        .select_only()
        .column(conversation_message::Column::Sequence)
        .filter(conversation_message::Column::ConversationId.eq(conversation_id))
        .order_by_desc(conversation_message::Column::Sequence)
        .into_tuple()
        .one(conn)
        .await
        .map_err(ServiceError::DatabaseError)?;
    Ok(last.unwrap_or(0))
}

/// Keeps the newest `limit` messages of a conversation.
async fn truncate<C: ConnectionTrait>(
    conn: &C,
    conversation_id: Uuid,
    limit: u64,
) -> Result<u64, ServiceError> {
    let boundary: Option<i64> = conversation_message::Entity::find()
        .select_only()
        .column(conversation_message::Column::Sequence)
        .filter(conversation_message::Column::ConversationId.eq(conversation_id))
        .order_by_desc(conversation_message::Column::Sequence)
        .offset(limit - 1)
        .into_tuple()
        .one(conn)
        .await
        .map_err(ServiceError::DatabaseError)?;

    let Some(oldest_kept) = boundary else {
        return Ok(0);
    };
    let removed = conversation_message::Entity::delete_many()
        .filter(conversation_message::Column::ConversationId.eq(conversation_id))
        .filter(conversation_message::Column::Sequence.lt(oldest_kept))
        .exec(conn)
        .await
        .map_err(ServiceError::DatabaseError)?
        .rows_affected;
    Ok(removed)
}

/// Sweep settings read from configuration
#[derive(Debug, Clone, Copy)]
pub struct SweepSettings {
    pub stale_days: i64,
    pub batch_size: u64,
    pub interval: std::time::Duration,
}

/// Runs [`ConversationService::sweep_stale`] on a fixed interval until the runtime stops.
pub fn spawn_sweeper(service: Arc<ConversationService>, settings: SweepSettings) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(settings.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let cutoff = Utc::now() - Duration::days(settings.stale_days);
            if let Err(e) = service.sweep_stale(cutoff, settings.batch_size).await {
                error!(error = %e, "Conversation sweep failed");
            }
        }
    })
}
