//! Conversation service
//!
//! The authorization source of truth: who is in a conversation, with what
//! role, and whether they are muted.

use crate::models::{Conversation, ConversationMember, CONV_TYPE_DIRECT, CONV_TYPE_GROUP};
use ripple_common::{AppError, AppResult};
use ripple_proto::rpc::{AccessDecision, MemberInfo, Role};
use ripple_proto::Cid;
use sqlx::PgPool;

fn map_db_error(e: sqlx::Error) -> AppError {
    AppError::Database(e.to_string())
}

/// Conversation and membership service
#[derive(Clone)]
pub struct ConversationService {
    pool: PgPool,
}

impl ConversationService {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Authorization decision for `(uid, cid)`
    ///
    /// No membership row means no access; the caller never learns whether
    /// the conversation itself exists.
    pub async fn check_access(&self, uid: &str, cid: &str) -> AppResult<AccessDecision> {
        let member = self.get_member(cid, uid).await?;

        Ok(match member {
            Some(member) => AccessDecision::granted(
                Role::from_i32(member.role).unwrap_or(Role::Member),
                member.muted,
            ),
            None => AccessDecision::denied("not a member"),
        })
    }

    async fn get_member(&self, cid: &str, uid: &str) -> AppResult<Option<ConversationMember>> {
        sqlx::query_as::<_, ConversationMember>(
            r#"
            SELECT conversation_id, uid, role, muted, joined_at
            FROM conversation_members
            WHERE conversation_id = $1 AND uid = $2
            "#,
        )
        .bind(cid)
        .bind(uid)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)
    }

    /// Fetch a conversation by cid
    pub async fn get_conversation(&self, cid: &str) -> AppResult<Conversation> {
        sqlx::query_as::<_, Conversation>(
            r#"
            SELECT id, conv_type, name, created_at
            FROM conversations
            WHERE id = $1
            "#,
        )
        .bind(cid)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| AppError::NotFound(format!("conversation {cid}")))
    }

    /// All members of a conversation
    pub async fn get_members(&self, cid: &str) -> AppResult<Vec<MemberInfo>> {
        let members = sqlx::query_as::<_, ConversationMember>(
            r#"
            SELECT conversation_id, uid, role, muted, joined_at
            FROM conversation_members
            WHERE conversation_id = $1
            ORDER BY joined_at
            "#,
        )
        .bind(cid)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(members
            .into_iter()
            .map(|m| MemberInfo {
                uid: m.uid,
                role: Role::from_i32(m.role).unwrap_or(Role::Member),
                muted: m.muted,
            })
            .collect())
    }

    /// Create (or return) the direct conversation of a user pair
    pub async fn create_direct(&self, uid_a: &str, uid_b: &str) -> AppResult<Cid> {
        let cid = Cid::direct(uid_a, uid_b).map_err(AppError::invalid_param)?;

        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO conversations (id, conv_type, name, created_at)
            VALUES ($1, $2, '', NOW())
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(cid.as_str())
        .bind(CONV_TYPE_DIRECT)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        if inserted.rows_affected() > 0 {
            for uid in [uid_a, uid_b] {
                sqlx::query(
                    r#"
                    INSERT INTO conversation_members (conversation_id, uid, role, muted, joined_at)
                    VALUES ($1, $2, 0, FALSE, NOW())
                    ON CONFLICT (conversation_id, uid) DO NOTHING
                    "#,
                )
                .bind(cid.as_str())
                .bind(uid)
                .execute(&mut *tx)
                .await
                .map_err(map_db_error)?;
            }

            tracing::info!(cid = %cid, "direct conversation created");
        }

        tx.commit().await.map_err(map_db_error)?;
        Ok(cid)
    }

    /// Create a group conversation; the creator becomes its owner
    pub async fn create_group(
        &self,
        group_id: &str,
        name: &str,
        creator: &str,
        member_ids: &[String],
    ) -> AppResult<Cid> {
        let cid = Cid::group(group_id).map_err(AppError::invalid_param)?;

        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        sqlx::query(
            r#"
            INSERT INTO conversations (id, conv_type, name, created_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(cid.as_str())
        .bind(CONV_TYPE_GROUP)
        .bind(name)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        sqlx::query(
            r#"
            INSERT INTO conversation_members (conversation_id, uid, role, muted, joined_at)
            VALUES ($1, $2, $3, FALSE, NOW())
            ON CONFLICT (conversation_id, uid) DO UPDATE SET role = EXCLUDED.role
            "#,
        )
        .bind(cid.as_str())
        .bind(creator)
        .bind(Role::Owner.as_i32())
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        for uid in member_ids {
            if uid == creator {
                continue;
            }
            sqlx::query(
                r#"
                INSERT INTO conversation_members (conversation_id, uid, role, muted, joined_at)
                VALUES ($1, $2, 0, FALSE, NOW())
                ON CONFLICT (conversation_id, uid) DO NOTHING
                "#,
            )
            .bind(cid.as_str())
            .bind(uid)
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;
        }

        tx.commit().await.map_err(map_db_error)?;
        tracing::info!(cid = %cid, members = member_ids.len(), "group conversation created");

        Ok(cid)
    }

    /// Add a member to an existing conversation
    pub async fn add_member(&self, cid: &str, uid: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO conversation_members (conversation_id, uid, role, muted, joined_at)
            VALUES ($1, $2, 0, FALSE, NOW())
            ON CONFLICT (conversation_id, uid) DO NOTHING
            "#,
        )
        .bind(cid)
        .bind(uid)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(())
    }

    /// Remove a member; their access ends immediately
    pub async fn remove_member(&self, cid: &str, uid: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            DELETE FROM conversation_members
            WHERE conversation_id = $1 AND uid = $2
            "#,
        )
        .bind(cid)
        .bind(uid)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(())
    }
}

impl std::fmt::Debug for ConversationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationService").finish_non_exhaustive()
    }
}
