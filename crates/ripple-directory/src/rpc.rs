//! JSON-RPC surface
//!
//! The directory answers on the `seaking.*` method prefix, its historical
//! wire name; renaming it would break every deployed gateway.

use crate::models::CONV_TYPE_DIRECT;
use crate::service::ConversationService;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use ripple_common::{AppError, AppResult, JwtService};
use ripple_proto::rpc::{
    methods, CheckAccessParams, ConversationInfo, CreateConversationParams,
    CreateConversationResponse, GetConversationMembersParams, GetConversationParams,
    MembersResponse, RpcRequest, RpcResponse, TokenInfo, ValidateTokenParams, JSONRPC_VERSION,
    RPC_APP_ERROR, RPC_INVALID_PARAMS, RPC_INVALID_REQUEST, RPC_METHOD_NOT_FOUND,
    RPC_PARSE_ERROR,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Shared state of the directory RPC server
#[derive(Clone)]
pub struct DirectoryState {
    conversations: Arc<ConversationService>,
    jwt: Arc<JwtService>,
}

impl DirectoryState {
    #[must_use]
    pub fn new(conversations: ConversationService, jwt: JwtService) -> Self {
        Self {
            conversations: Arc::new(conversations),
            jwt: Arc::new(jwt),
        }
    }

    #[must_use]
    pub fn conversations(&self) -> &ConversationService {
        &self.conversations
    }
}

fn parse_params<P: DeserializeOwned>(params: Option<serde_json::Value>) -> Result<P, RpcResponse> {
    serde_json::from_value(params.unwrap_or(serde_json::Value::Null))
        .map_err(|e| RpcResponse::failure(RPC_INVALID_PARAMS, format!("invalid params: {e}"), ""))
}

fn to_result<T: Serialize>(value: &T) -> AppResult<RpcResponse> {
    let json = serde_json::to_value(value)
        .map_err(|e| AppError::internal(anyhow::anyhow!("encode result: {e}")))?;
    Ok(RpcResponse::success(json, ""))
}

/// Handle one JSON-RPC request
pub async fn handle_rpc(
    State(state): State<DirectoryState>,
    request: Result<Json<RpcRequest>, JsonRejection>,
) -> Json<RpcResponse> {
    let Ok(Json(request)) = request else {
        return Json(RpcResponse::failure(RPC_PARSE_ERROR, "Parse error", ""));
    };

    if request.jsonrpc != JSONRPC_VERSION {
        return Json(RpcResponse::failure(
            RPC_INVALID_REQUEST,
            "Invalid Request",
            request.id,
        ));
    }

    let id = request.id.clone();
    let method = request.method.clone();

    let outcome = match dispatch(&state, &method, request.params).await {
        Ok(Some(Ok(response))) => response,
        Ok(Some(Err(err))) => {
            if err.is_client_error() {
                tracing::debug!(method = %method, error = %err, "rpc request rejected");
            } else {
                tracing::error!(method = %method, error = %err, "rpc request failed");
            }
            RpcResponse::failure(RPC_APP_ERROR, err.wire_message(), "")
        }
        Ok(None) => RpcResponse::failure(RPC_METHOD_NOT_FOUND, "Method not found", ""),
        Err(rejection) => rejection,
    };

    Json(RpcResponse { id, ..outcome })
}

async fn dispatch(
    state: &DirectoryState,
    method: &str,
    params: Option<serde_json::Value>,
) -> Result<Option<AppResult<RpcResponse>>, RpcResponse> {
    let result = match method {
        methods::DIRECTORY_CHECK_ACCESS => {
            let p: CheckAccessParams = parse_params(params)?;
            state.check_access(&p).await
        }
        methods::DIRECTORY_GET_CONVERSATION => {
            let p: GetConversationParams = parse_params(params)?;
            state.get_conversation(&p).await
        }
        methods::DIRECTORY_GET_CONVERSATION_MEMBERS => {
            let p: GetConversationMembersParams = parse_params(params)?;
            state.get_conversation_members(&p).await
        }
        methods::DIRECTORY_CREATE_CONVERSATION => {
            let p: CreateConversationParams = parse_params(params)?;
            state.create_conversation(&p).await
        }
        methods::DIRECTORY_VALIDATE_TOKEN => {
            let p: ValidateTokenParams = parse_params(params)?;
            state.validate_token(&p)
        }
        _ => return Ok(None),
    };

    Ok(Some(result))
}

impl DirectoryState {
    async fn check_access(&self, params: &CheckAccessParams) -> AppResult<RpcResponse> {
        let decision = self
            .conversations
            .check_access(&params.uid, &params.cid)
            .await?;
        to_result(&decision)
    }

    async fn get_conversation(&self, params: &GetConversationParams) -> AppResult<RpcResponse> {
        let conversation = self.conversations.get_conversation(&params.cid).await?;
        let members = self.conversations.get_members(&params.cid).await?;

        to_result(&ConversationInfo {
            cid: conversation.id,
            conv_type: conversation.conv_type,
            name: conversation.name,
            member_ids: members.into_iter().map(|m| m.uid).collect(),
        })
    }

    async fn get_conversation_members(
        &self,
        params: &GetConversationMembersParams,
    ) -> AppResult<RpcResponse> {
        let members = self.conversations.get_members(&params.cid).await?;
        to_result(&MembersResponse { members })
    }

    async fn create_conversation(
        &self,
        params: &CreateConversationParams,
    ) -> AppResult<RpcResponse> {
        let cid = if params.conv_type == CONV_TYPE_DIRECT {
            let [other] = params.member_ids.as_slice() else {
                return Err(AppError::invalid_param(
                    "direct conversation takes exactly one other member",
                ));
            };
            self.conversations
                .create_direct(&params.creator_id, other)
                .await?
        } else {
            let group_id = Uuid::new_v4().to_string();
            self.conversations
                .create_group(&group_id, &params.name, &params.creator_id, &params.member_ids)
                .await?
        };

        to_result(&CreateConversationResponse {
            cid: cid.to_string(),
        })
    }

    fn validate_token(&self, params: &ValidateTokenParams) -> AppResult<RpcResponse> {
        let info = match self.jwt.validate_token(&params.token) {
            Ok(claims) => TokenInfo {
                valid: true,
                uid: claims.uid,
                device_id: claims.device_id,
                platform: claims.platform,
            },
            Err(_) => TokenInfo::default(),
        };
        to_result(&info)
    }
}
