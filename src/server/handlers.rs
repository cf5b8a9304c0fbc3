use super::AppState;
use crate::alliance::AllianceRef;
use crate::auth::Credentials;
use crate::error::{PixelError, Result};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

const DEFAULT_LEADERBOARD_LIMIT: usize = 10;

/// A JSON body, or the reason it could not be read.
type Body<T> = std::result::Result<Json<T>, JsonRejection>;

/// Signature fields shared by every mutating request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedFields {
    wallet_address: Option<String>,
    signature: Option<String>,
    message: Option<String>,
}

impl SignedFields {
    fn credentials(self) -> Credentials {
        Credentials::new(
            self.wallet_address.unwrap_or_default(),
            self.signature.unwrap_or_default(),
            self.message.unwrap_or_default(),
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    #[serde(flatten)]
    signed: SignedFields,
    username: Option<String>,
    #[serde(alias = "flag")]
    avatar: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAllianceRequest {
    #[serde(flatten)]
    signed: SignedFields,
    name: Option<String>,
    tag: Option<String>,
    color: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinAllianceRequest {
    #[serde(flatten)]
    signed: SignedFields,
    alliance_tag: Option<String>,
    alliance_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KickRequest {
    #[serde(flatten)]
    signed: SignedFields,
    target_wallet: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardParams {
    limit: Option<usize>,
}

pub async fn update_profile(
    State(state): State<AppState>,
    body: Body<ProfileRequest>,
) -> Result<Json<Value>> {
    let Json(req) = body?;
    let user = state
        .profiles
        .update(
            &req.signed.credentials(),
            req.username.as_deref().unwrap_or_default(),
            req.avatar.as_deref().unwrap_or_default(),
        )
        .await?;
    Ok(Json(json!({ "success": true, "user": user })))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(wallet): Path<String>,
) -> Result<Json<Value>> {
    let profile = state.profiles.lookup(&wallet).await?;
    Ok(Json(json!({ "user": profile })))
}

pub async fn create_alliance(
    State(state): State<AppState>,
    body: Body<CreateAllianceRequest>,
) -> Result<Json<Value>> {
    let Json(req) = body?;
    let alliance = state
        .alliances
        .create(
            &req.signed.credentials(),
            req.name.as_deref().unwrap_or_default(),
            req.tag.as_deref().unwrap_or_default(),
            req.color.as_deref(),
        )
        .await?;
    Ok(Json(json!({ "success": true, "alliance": alliance })))
}

pub async fn join_alliance(
    State(state): State<AppState>,
    body: Body<JoinAllianceRequest>,
) -> Result<Json<Value>> {
    let Json(req) = body?;
    let target = match (req.alliance_tag, req.alliance_id) {
        (Some(tag), _) if !tag.is_empty() => AllianceRef::Tag(tag),
        (_, Some(id)) if !id.is_empty() => AllianceRef::Id(id),
        _ => return Err(PixelError::Validation("Missing fields".into())),
    };
    let alliance = state
        .alliances
        .join(&req.signed.credentials(), &target)
        .await?;
    Ok(Json(json!({ "success": true, "alliance": alliance })))
}

pub async fn kick_member(
    State(state): State<AppState>,
    body: Body<KickRequest>,
) -> Result<Json<Value>> {
    let Json(req) = body?;
    state
        .alliances
        .kick(
            &req.signed.credentials(),
            req.target_wallet.as_deref().unwrap_or_default(),
        )
        .await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn get_alliance(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let alliance = state.alliances.get(&id).await?;
    Ok(Json(json!(alliance)))
}

pub async fn list_alliances(State(state): State<AppState>) -> Result<Json<Value>> {
    let alliances = state.alliances.list().await?;
    Ok(Json(json!(alliances)))
}

pub async fn leaderboard(
    State(state): State<AppState>,
    params: std::result::Result<Query<LeaderboardParams>, QueryRejection>,
) -> Result<Json<Value>> {
    let Query(params) = params?;
    let limit = params.limit.unwrap_or(DEFAULT_LEADERBOARD_LIMIT);
    let entries = state.alliances.leaderboard(limit).await?;
    Ok(Json(json!(entries)))
}
