//! Directory RPC client

use crate::api::DirectoryApi;
use crate::rpc::RpcClient;
use async_trait::async_trait;
use ripple_common::AppError;
use ripple_proto::rpc::{
    methods, AccessDecision, CheckAccessParams, ConversationInfo, CreateConversationParams,
    CreateConversationResponse, GetConversationMembersParams, GetConversationParams, MemberInfo,
    MembersResponse, TokenInfo, ValidateTokenParams,
};

/// HTTP client for the directory service
#[derive(Debug)]
pub struct DirectoryClient {
    rpc: RpcClient,
}

impl DirectoryClient {
    /// Create a client for the directory at `base_url`
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            rpc: RpcClient::new(base_url),
        }
    }

    /// Conversation metadata
    pub async fn get_conversation(&self, cid: &str) -> Result<ConversationInfo, AppError> {
        self.rpc
            .call(
                methods::DIRECTORY_GET_CONVERSATION,
                &GetConversationParams {
                    cid: cid.to_string(),
                },
            )
            .await
    }

    /// Create a direct or group conversation
    pub async fn create_conversation(
        &self,
        params: &CreateConversationParams,
    ) -> Result<CreateConversationResponse, AppError> {
        self.rpc
            .call(methods::DIRECTORY_CREATE_CONVERSATION, params)
            .await
    }

    /// Verify a bearer token with the directory
    pub async fn validate_token(&self, token: &str) -> Result<TokenInfo, AppError> {
        self.rpc
            .call(
                methods::DIRECTORY_VALIDATE_TOKEN,
                &ValidateTokenParams {
                    token: token.to_string(),
                },
            )
            .await
    }
}

#[async_trait]
impl DirectoryApi for DirectoryClient {
    async fn check_access(&self, uid: &str, cid: &str) -> Result<AccessDecision, AppError> {
        self.rpc
            .call(
                methods::DIRECTORY_CHECK_ACCESS,
                &CheckAccessParams {
                    uid: uid.to_string(),
                    cid: cid.to_string(),
                },
            )
            .await
    }

    async fn conversation_members(&self, cid: &str) -> Result<Vec<MemberInfo>, AppError> {
        let response: MembersResponse = self
            .rpc
            .call(
                methods::DIRECTORY_GET_CONVERSATION_MEMBERS,
                &GetConversationMembersParams {
                    cid: cid.to_string(),
                },
            )
            .await?;
        Ok(response.members)
    }
}
