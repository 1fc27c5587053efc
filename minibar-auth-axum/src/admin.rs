use axum::routing::{Router, get, post};
use axum::{Json, http::StatusCode};
use http::HeaderMap;
use serde_json::{Value, json};

use minibar_auth::{
    AuthenticatorResponse, RegisterCredential, admin_logout, finish_admin_authentication,
    finish_admin_registration, is_admin_authenticated, start_admin_authentication,
    start_admin_registration,
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
            let options = start_admin_registration(&headers, &rp)
                .await
                .into_response_error()?;
            Ok(Json(json!({
                "action": "create",
                "flowId": options.flow_id(),
                "options": options,
            })))
        }
        "login" => {
            let options = start_admin_authentication(&rp)
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

    tracing::debug!("Admin verify request: type={}", type_);

    match type_.as_str() {
        "register" => {
            let reg_data: RegisterCredential = serde_json::from_value(body)
                .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
            finish_admin_registration(&reg_data, &rp)
                .await
                .into_response_error()?;
        }
        "login" => {
            let assertion: AuthenticatorResponse = serde_json::from_value(body)
                .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
            finish_admin_authentication(&assertion, &rp, &mut response_headers)
                .await
                .into_response_error()?;
        }
        other => {
            return Err((
                StatusCode::BAD_REQUEST,
                format!("Unknown verify type: {other}"),
            ));
        }
    }

    Ok((response_headers, Json(json!({"ok": true}))))
}

async fn session(headers: HeaderMap) -> Result<Json<Value>, (StatusCode, String)> {
    let authenticated = is_admin_authenticated(&headers)
        .await
        .into_response_error()?;
    Ok(Json(json!({"authenticated": authenticated})))
}

async fn logout(
    headers: HeaderMap,
) -> Result<(HeaderMap, Json<Value>), (StatusCode, String)> {
    let mut response_headers = HeaderMap::new();
    admin_logout(&headers, &mut response_headers)
        .await
        .into_response_error()?;
    Ok((response_headers, Json(json!({"ok": true}))))
}
