//! JSON-RPC surface
//!
//! One POST endpoint; methods are dispatched by name. Parameter mismatches
//! return `-32602`, application failures `-32000` with a sanitized message.

use crate::service::EventService;
use crate::validation;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use ripple_common::{AppError, AppResult};
use ripple_proto::rpc::{
    methods, AddReactionParams, EventsResponse, GetEventParams, OkResponse, QueryEventsParams,
    ReactionSummaryParams, ReactionSummaryResponse, ReadReceiptsParams, ReadReceiptsResponse,
    RemoveReactionParams, RpcRequest, RpcResponse, StoreEventParams, SyncEventsParams,
    UpdateReadReceiptParams, ValidateEditParams, ValidateRevokeParams, JSONRPC_VERSION,
    RPC_APP_ERROR, RPC_INVALID_PARAMS, RPC_INVALID_REQUEST, RPC_METHOD_NOT_FOUND,
    RPC_PARSE_ERROR,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Shared state of the relay RPC server
#[derive(Clone)]
pub struct RelayState {
    events: Arc<EventService>,
}

impl RelayState {
    #[must_use]
    pub fn new(events: EventService) -> Self {
        Self {
            events: Arc::new(events),
        }
    }

    #[must_use]
    pub fn events(&self) -> &EventService {
        &self.events
    }
}

fn parse_params<P: DeserializeOwned>(params: Option<serde_json::Value>) -> Result<P, RpcResponse> {
    serde_json::from_value(params.unwrap_or(serde_json::Value::Null))
        .map_err(|e| RpcResponse::failure(RPC_INVALID_PARAMS, format!("invalid params: {e}"), ""))
}

fn to_result<T: Serialize>(value: &T, id: &str) -> RpcResponse {
    match serde_json::to_value(value) {
        Ok(json) => RpcResponse::success(json, id),
        Err(e) => RpcResponse::failure(RPC_APP_ERROR, format!("encode result: {e}"), id),
    }
}

fn app_failure(err: &AppError, method: &str, id: &str) -> RpcResponse {
    if err.is_client_error() {
        tracing::debug!(method = %method, error = %err, "rpc request rejected");
    } else {
        tracing::error!(method = %method, error = %err, "rpc request failed");
    }
    RpcResponse::failure(RPC_APP_ERROR, err.wire_message(), id)
}

/// Handle one JSON-RPC request
pub async fn handle_rpc(
    State(state): State<RelayState>,
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
    let response = match dispatch(&state, &request.method, request.params).await {
        Ok(Some(result)) => RpcResponse {
            id,
            ..result
        },
        Ok(None) => RpcResponse::failure(RPC_METHOD_NOT_FOUND, "Method not found", id),
        Err(rejection) => RpcResponse { id, ..rejection },
    };

    Json(response)
}

async fn dispatch(
    state: &RelayState,
    method: &str,
    params: Option<serde_json::Value>,
) -> Result<Option<RpcResponse>, RpcResponse> {
    let response = match method {
        methods::RELAY_STORE_EVENT => {
            let p: StoreEventParams = parse_params(params)?;
            run(method, state.store_event(&p).await)?
        }
        methods::RELAY_GET_EVENT => {
            let p: GetEventParams = parse_params(params)?;
            run(method, state.get_event(&p).await)?
        }
        methods::RELAY_QUERY_EVENTS => {
            let p: QueryEventsParams = parse_params(params)?;
            run(method, state.query_events(&p).await)?
        }
        methods::RELAY_SYNC_EVENTS => {
            let p: SyncEventsParams = parse_params(params)?;
            run(method, state.sync_events(&p).await)?
        }
        methods::RELAY_UPDATE_READ_RECEIPT => {
            let p: UpdateReadReceiptParams = parse_params(params)?;
            run(method, state.update_read_receipt(&p).await)?
        }
        methods::RELAY_GET_READ_RECEIPTS => {
            let p: ReadReceiptsParams = parse_params(params)?;
            run(method, state.read_receipts(&p).await)?
        }
        methods::RELAY_ADD_REACTION => {
            let p: AddReactionParams = parse_params(params)?;
            run(method, state.add_reaction(&p).await)?
        }
        methods::RELAY_REMOVE_REACTION => {
            let p: RemoveReactionParams = parse_params(params)?;
            run(method, state.remove_reaction(&p).await)?
        }
        methods::RELAY_REACTION_SUMMARY => {
            let p: ReactionSummaryParams = parse_params(params)?;
            run(method, state.reaction_summary(&p).await)?
        }
        methods::RELAY_VALIDATE_REVOKE => {
            let p: ValidateRevokeParams = parse_params(params)?;
            run(method, state.validate_revoke(&p).await)?
        }
        methods::RELAY_VALIDATE_EDIT => {
            let p: ValidateEditParams = parse_params(params)?;
            run(method, state.validate_edit(&p).await)?
        }
        _ => return Ok(None),
    };

    Ok(Some(response))
}

fn run(method: &str, result: AppResult<RpcResponse>) -> Result<RpcResponse, RpcResponse> {
    result.map_err(|e| app_failure(&e, method, ""))
}

// Method implementations; each returns a response without its id, which the
// outer handler fills in.
impl RelayState {
    async fn store_event(&self, params: &StoreEventParams) -> AppResult<RpcResponse> {
        let stored = self.events.store_event(&params.event).await?;
        Ok(to_result(&stored, ""))
    }

    async fn get_event(&self, params: &GetEventParams) -> AppResult<RpcResponse> {
        let event = self.events.get_event(params.mid).await?;
        Ok(to_result(
            &ripple_proto::rpc::StoredEventData::from(event),
            "",
        ))
    }

    async fn query_events(&self, params: &QueryEventsParams) -> AppResult<RpcResponse> {
        let events = self.events.query_events(params).await?;
        Ok(to_result(
            &EventsResponse {
                events: events.into_iter().map(Into::into).collect(),
            },
            "",
        ))
    }

    async fn sync_events(&self, params: &SyncEventsParams) -> AppResult<RpcResponse> {
        let events = self.events.query_tail(&params.cid, params.limit).await?;
        Ok(to_result(
            &EventsResponse {
                events: events.into_iter().map(Into::into).collect(),
            },
            "",
        ))
    }

    async fn update_read_receipt(&self, params: &UpdateReadReceiptParams) -> AppResult<RpcResponse> {
        self.events
            .update_read_receipt(&params.cid, &params.uid, params.last_read_mid)
            .await?;
        Ok(to_result(&OkResponse { success: true }, ""))
    }

    async fn read_receipts(&self, params: &ReadReceiptsParams) -> AppResult<RpcResponse> {
        let receipts = self.events.conversation_read_receipts(&params.cid).await?;
        Ok(to_result(
            &ReadReceiptsResponse {
                receipts: receipts.into_iter().map(Into::into).collect(),
            },
            "",
        ))
    }

    async fn add_reaction(&self, params: &AddReactionParams) -> AppResult<RpcResponse> {
        self.events
            .add_reaction(params.mid, &params.cid, &params.uid, &params.emoji)
            .await?;
        Ok(to_result(&OkResponse { success: true }, ""))
    }

    async fn remove_reaction(&self, params: &RemoveReactionParams) -> AppResult<RpcResponse> {
        self.events
            .remove_reaction(params.mid, &params.uid, &params.emoji)
            .await?;
        Ok(to_result(&OkResponse { success: true }, ""))
    }

    async fn reaction_summary(&self, params: &ReactionSummaryParams) -> AppResult<RpcResponse> {
        let summary = self.events.reaction_summary(params.mid).await?;
        Ok(to_result(&ReactionSummaryResponse { summary }, ""))
    }

    async fn validate_revoke(&self, params: &ValidateRevokeParams) -> AppResult<RpcResponse> {
        let target = match self.events.get_event(params.target_mid).await {
            Ok(event) => Some(event),
            Err(AppError::MessageNotFound(_)) => None,
            Err(e) => return Err(e),
        };

        let outcome = validation::check_revoke(
            target.as_ref(),
            &params.cid,
            &params.uid,
            params.is_admin,
            Utc::now().timestamp(),
        );
        Ok(to_result(&outcome, ""))
    }

    async fn validate_edit(&self, params: &ValidateEditParams) -> AppResult<RpcResponse> {
        let target = match self.events.get_event(params.target_mid).await {
            Ok(event) => Some(event),
            Err(AppError::MessageNotFound(_)) => None,
            Err(e) => return Err(e),
        };

        let outcome = validation::check_edit(
            target.as_ref(),
            &params.cid,
            &params.uid,
            Utc::now().timestamp(),
        );
        Ok(to_result(&outcome, ""))
    }
}
