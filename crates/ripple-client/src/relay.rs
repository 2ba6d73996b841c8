//! Relay RPC client

use crate::api::RelayApi;
use crate::rpc::RpcClient;
use async_trait::async_trait;
use ripple_common::AppError;
use ripple_proto::rpc::{
    methods, AddReactionParams, EventsResponse, GetEventParams, OkResponse, QueryEventsParams,
    ReactionSummaryParams, ReactionSummaryResponse, ReadReceiptsParams, ReadReceiptsResponse,
    RemoveReactionParams, StoreEventParams, StoreEventResponse, StoredEventData, SyncEventsParams,
    UpdateReadReceiptParams, ValidateEditParams, ValidateRevokeParams, ValidationOutcome,
};
use ripple_proto::Event;

/// HTTP client for the relay service
#[derive(Debug)]
pub struct RelayClient {
    rpc: RpcClient,
}

impl RelayClient {
    /// Create a client for the relay at `base_url`
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            rpc: RpcClient::new(base_url),
        }
    }

    /// All read receipts of a conversation
    pub async fn read_receipts(&self, cid: &str) -> Result<ReadReceiptsResponse, AppError> {
        self.rpc
            .call(
                methods::RELAY_GET_READ_RECEIPTS,
                &ReadReceiptsParams {
                    cid: cid.to_string(),
                },
            )
            .await
    }

    /// Record a reaction; idempotent per `(mid, uid, emoji)`
    pub async fn add_reaction(
        &self,
        mid: i64,
        cid: &str,
        uid: &str,
        emoji: &str,
    ) -> Result<(), AppError> {
        let _: OkResponse = self
            .rpc
            .call(
                methods::RELAY_ADD_REACTION,
                &AddReactionParams {
                    mid,
                    cid: cid.to_string(),
                    uid: uid.to_string(),
                    emoji: emoji.to_string(),
                },
            )
            .await?;
        Ok(())
    }

    /// Remove a reaction; idempotent
    pub async fn remove_reaction(&self, mid: i64, uid: &str, emoji: &str) -> Result<(), AppError> {
        let _: OkResponse = self
            .rpc
            .call(
                methods::RELAY_REMOVE_REACTION,
                &RemoveReactionParams {
                    mid,
                    uid: uid.to_string(),
                    emoji: emoji.to_string(),
                },
            )
            .await?;
        Ok(())
    }

    /// Per-emoji reaction counts for a message
    pub async fn reaction_summary(&self, mid: i64) -> Result<ReactionSummaryResponse, AppError> {
        self.rpc
            .call(methods::RELAY_REACTION_SUMMARY, &ReactionSummaryParams { mid })
            .await
    }
}

#[async_trait]
impl RelayApi for RelayClient {
    async fn store_event(&self, event: &Event) -> Result<StoreEventResponse, AppError> {
        self.rpc
            .call(
                methods::RELAY_STORE_EVENT,
                &StoreEventParams {
                    event: event.clone(),
                },
            )
            .await
    }

    async fn get_event(&self, mid: i64) -> Result<StoredEventData, AppError> {
        self.rpc
            .call(methods::RELAY_GET_EVENT, &GetEventParams { mid })
            .await
    }

    async fn query_events(&self, params: &QueryEventsParams) -> Result<EventsResponse, AppError> {
        self.rpc.call(methods::RELAY_QUERY_EVENTS, params).await
    }

    async fn sync_events(&self, cid: &str, limit: u32) -> Result<EventsResponse, AppError> {
        self.rpc
            .call(
                methods::RELAY_SYNC_EVENTS,
                &SyncEventsParams {
                    cid: cid.to_string(),
                    limit,
                },
            )
            .await
    }

    async fn update_read_receipt(
        &self,
        cid: &str,
        uid: &str,
        last_read_mid: i64,
    ) -> Result<(), AppError> {
        let _: OkResponse = self
            .rpc
            .call(
                methods::RELAY_UPDATE_READ_RECEIPT,
                &UpdateReadReceiptParams {
                    cid: cid.to_string(),
                    uid: uid.to_string(),
                    last_read_mid,
                },
            )
            .await?;
        Ok(())
    }

    async fn validate_revoke(
        &self,
        cid: &str,
        uid: &str,
        target_mid: i64,
        is_admin: bool,
    ) -> Result<ValidationOutcome, AppError> {
        self.rpc
            .call(
                methods::RELAY_VALIDATE_REVOKE,
                &ValidateRevokeParams {
                    cid: cid.to_string(),
                    uid: uid.to_string(),
                    target_mid,
                    is_admin,
                },
            )
            .await
    }

    async fn validate_edit(
        &self,
        cid: &str,
        uid: &str,
        target_mid: i64,
    ) -> Result<ValidationOutcome, AppError> {
        self.rpc
            .call(
                methods::RELAY_VALIDATE_EDIT,
                &ValidateEditParams {
                    cid: cid.to_string(),
                    uid: uid.to_string(),
                    target_mid,
                },
            )
            .await
    }
}
