use axum::routing::{Router, get, post};
use axum::{Json, http::StatusCode};
use http::HeaderMap;
use serde_json::{Value, json};

use minibar_auth::{
    AuthenticatorResponse, RegisterCredential, current_user, finish_user_authentication,
    finish_user_registration, start_user_authentication, start_user_registration, user_logout,
};

use crate::error::IntoResponseError;
use crate::types::{OptionsRequest, rp_from_headers};

pub fn router() -> Router {
    Router::new()
        .route("/options", post(options))
        .route("/verify", post(verify))
        .route("/session", get(session))
        .route("/logout", post(logout))
}

async fn options(
    headers: HeaderMap,
    Json(request): Json<OptionsRequest>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let rp = rp_from_headers(&headers);

    match request.type_.as_str() {
        "register" => {
            let options = start_user_registration(request.username.as_deref(), &headers, &rp)
                .await
                .into_response_error()?;
            Ok(Json(json!({
                "action": "create",
                "flowId": options.flow_id(),
                "options": options,
            })))
        }
        "login" => {
            let options = start_user_authentication(&rp)
                .await
                .into_response_error()?;
            Ok(Json(json!({
                "action": "get",
                "flowId": options.flow_id(),
                "options": options,
            })))
        }
        other => Err((
            StatusCode::BAD_REQUEST,
            format!("Unknown options type: {other}"),
        )),
    }
}

async fn verify(
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<(HeaderMap, Json<Value>), (StatusCode, String)> {
    let rp = rp_from_headers(&headers);
    let mut response_headers = HeaderMap::new();

    let type_ = body
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    tracing::debug!("User verify request: type={}", type_);

    match type_.as_str() {
        "register" => {
            let reg_data: RegisterCredential = serde_json::from_value(body)
                .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
            finish_user_registration(&reg_data, &rp)
                .await
                .into_response_error()?;
            Ok((response_headers, Json(json!({"ok": true}))))
        }
        "login" => {
            let assertion: AuthenticatorResponse = serde_json::from_value(body)
                .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
            let user_id = finish_user_authentication(&assertion, &rp, &mut response_headers)
                .await
                .into_response_error()?;
            Ok((
                response_headers,
                Json(json!({"ok": true, "userId": user_id})),
            ))
        }
        other => Err((
            StatusCode::BAD_REQUEST,
            format!("Unknown verify type: {other}"),
        )),
    }
}

async fn session(headers: HeaderMap) -> Result<Json<Value>, (StatusCode, String)> {
    match current_user(&headers).await.into_response_error()? {
        Some(user) => Ok(Json(json!({
            "authenticated": true,
            "userId": user.id,
            "username": user.username,
        }))),
        None => Ok(Json(json!({"authenticated": false}))),
    }
}

async fn logout(
    headers: HeaderMap,
) -> Result<(HeaderMap, Json<Value>), (StatusCode, String)> {
    let mut response_headers = HeaderMap::new();
    user_logout(&headers, &mut response_headers)
        .await
        .into_response_error()?;
    Ok((response_headers, Json(json!({"ok": true}))))
}
