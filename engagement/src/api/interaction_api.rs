use crate::api::request::data::RequestData;
use crate::api::types::Response;
use crate::app::App;
use crate::errors::EngagementError;
use crate::models::interaction::{parse_kind, parse_target_kind, InteractionKey};
use actix_web::{delete, get, post, web, HttpResponse};
use charybdis::types::Uuid;
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionPath {
    pub kind: String,
    pub target_kind: String,
    pub target_id: Uuid,
}

impl InteractionPath {
    fn key(&self) -> Result<InteractionKey, EngagementError> {
        InteractionKey::parse(&self.kind, &self.target_kind, self.target_id)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetKindPath {
    pub kind: String,
    pub target_kind: String,
}

#[derive(Deserialize)]
pub struct CountBatchParams {
    pub ids: Vec<Uuid>,
}

// registered before `toggle_on` so `counts` is not taken for a target id
#[post("/{kind}/{targetKind}/counts")]
pub async fn count_batch(
    app: web::Data<App>,
    path: web::Path<TargetKindPath>,
    params: web::Json<CountBatchParams>,
) -> Response {
    let kind = parse_kind(&path.kind)?;
    let target_kind = parse_target_kind(&path.target_kind)?;
    let counts = app.counter.count_batch(kind, target_kind, &params.ids).await?;

    Ok(HttpResponse::Ok().json(json!({
        "kind": kind,
        "targetKind": target_kind,
        "counts": counts,
    })))
}

#[post("/{kind}/{targetKind}/{targetId}")]
pub async fn toggle_on(data: RequestData, path: web::Path<InteractionPath>) -> Response {
    let key = path.key()?;
    let changed = data.counter().toggle_on(&key, data.current_user.id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "kind": key.kind,
        "targetKind": key.target_kind,
        "targetId": key.target_id,
        "active": true,
        "changed": changed,
    })))
}

#[delete("/{kind}/{targetKind}/{targetId}")]
pub async fn toggle_off(data: RequestData, path: web::Path<InteractionPath>) -> Response {
    let key = path.key()?;
    let changed = data.counter().toggle_off(&key, data.current_user.id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "kind": key.kind,
        "targetKind": key.target_kind,
        "targetId": key.target_id,
        "active": false,
        "changed": changed,
    })))
}

#[get("/{kind}/{targetKind}/{targetId}/count")]
pub async fn get_count(app: web::Data<App>, path: web::Path<InteractionPath>) -> Response {
    let key = path.key()?;
    let count = app.counter.count(&key).await?;

    Ok(HttpResponse::Ok().json(json!({
        "kind": key.kind,
        "targetKind": key.target_kind,
        "targetId": key.target_id,
        "count": count,
    })))
}

#[get("/{kind}/{targetKind}/{targetId}/active")]
pub async fn get_active(data: RequestData, path: web::Path<InteractionPath>) -> Response {
    let key = path.key()?;
    let active = data.counter().is_active(&key, data.current_user.id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "kind": key.kind,
        "targetKind": key.target_kind,
        "targetId": key.target_id,
        "active": active,
    })))
}

#[get("/{kind}/{targetKind}/{targetId}/members")]
pub async fn get_members(app: web::Data<App>, path: web::Path<InteractionPath>) -> Response {
    let key = path.key()?;
    let members = app.counter.members(&key).await?;

    Ok(HttpResponse::Ok().json(json!({
        "kind": key.kind,
        "targetKind": key.target_kind,
        "targetId": key.target_id,
        "members": members,
    })))
}

#[get("/{kind}/pending")]
pub async fn get_pending(app: web::Data<App>, kind: web::Path<String>) -> Response {
    let kind = parse_kind(&kind)?;
    let pending = app.counter.pending(kind).await?;

    Ok(HttpResponse::Ok().json(json!({
        "kind": kind,
        "pending": pending,
    })))
}
