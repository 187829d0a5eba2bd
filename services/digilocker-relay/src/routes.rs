//! DigiLocker auth routes, mounted under `/v1/digilocker/auth`

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::header::LOCATION;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use digilocker_auth::{Resource, build_authorization_url, exchange_code, fetch};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::AppState;
use crate::error::ApiError;
use crate::metrics::record_upstream_error;
use crate::relay;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login))
        .route("/callback", get(callback))
        .route("/profile", get(profile))
        .route("/list-issued-files", get(issued_files))
        .route("/download-file", get(missing_file_id))
        .route("/download-file/", get(missing_file_id))
        .route("/download-file/{file_id}", get(download_file))
        .route("/certificate-xml", get(missing_file_id))
        .route("/certificate-xml/", get(missing_file_id))
        .route("/certificate-xml/{file_id}", get(certificate_xml))
        .route("/aadhar-card-xml", get(aadhaar_xml))
        .route("/aapar-xml", get(apaar_xml))
}

/// Start a login: fresh verifier and state, then 302 to the provider.
#[instrument(skip_all)]
async fn login(State(state): State<AppState>) -> Result<Response, ApiError> {
    let attempt = state.session.begin_authorization().await?;
    let url = build_authorization_url(
        &state.client.authorize_endpoint(),
        &state.client.client_id,
        &state.client.redirect_uri,
        &attempt.state,
        &attempt.challenge,
    )?;
    let location = HeaderValue::from_str(&url)
        .map_err(|e| ApiError::Internal(format!("authorization URL is not a header: {e}")))?;

    info!("redirecting to provider for authorization");
    Ok((StatusCode::FOUND, [(LOCATION, location)]).into_response())
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Provider redirect target: trade the code for a token and keep it.
#[instrument(skip_all)]
async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Response, ApiError> {
    if let Some(error) = params.error.as_deref() {
        warn!(error, "provider reported an authorization error");
    }
    let (Some(code), Some(attempt)) = (
        params.code.filter(|c| !c.is_empty()),
        params.state.filter(|s| !s.is_empty()),
    ) else {
        warn!("callback without code or state");
        return Err(ApiError::Unauthorized);
    };

    let Some(verifier) = state.session.take_verifier(&attempt).await else {
        warn!("callback state does not match a pending login");
        return Err(ApiError::Unauthorized);
    };

    let grant = exchange_code(&state.http, &state.client, &code, verifier.expose())
        .await
        .inspect_err(|_| record_upstream_error("token"))?;
    state.session.set_token(grant.access_token).await;

    info!("access token stored");
    Ok(relay::json_envelope(grant.body))
}

async fn profile(State(state): State<AppState>) -> Result<Response, ApiError> {
    proxy(&state, Resource::PROFILE, None).await
}

async fn issued_files(State(state): State<AppState>) -> Result<Response, ApiError> {
    proxy(&state, Resource::ISSUED_FILES, None).await
}

async fn download_file(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<Response, ApiError> {
    proxy(&state, Resource::FILE, Some(&file_id)).await
}

async fn certificate_xml(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<Response, ApiError> {
    proxy(&state, Resource::CERTIFICATE_XML, Some(&file_id)).await
}

async fn aadhaar_xml(State(state): State<AppState>) -> Result<Response, ApiError> {
    proxy(&state, Resource::AADHAAR_XML, None).await
}

async fn apaar_xml(State(state): State<AppState>) -> Result<Response, ApiError> {
    proxy(&state, Resource::APAAR_XML, None).await
}

/// `/download-file` and `/certificate-xml` reached without an id.
async fn missing_file_id(State(state): State<AppState>) -> Result<Response, ApiError> {
    if !state.session.is_authenticated().await {
        return Err(ApiError::Unauthorized);
    }
    Err(ApiError::BadRequest("fileId is required".into()))
}

/// Shared path for every authenticated resource.
///
/// The token check comes first so an unauthenticated caller never causes an
/// outbound request; the file id is validated before the fetch for the same
/// reason.
#[instrument(skip_all, fields(resource = resource.name))]
async fn proxy(
    state: &AppState,
    resource: Resource,
    file_id: Option<&str>,
) -> Result<Response, ApiError> {
    let token = state.session.token().await.ok_or(ApiError::Unauthorized)?;
    if resource.takes_file_id() {
        digilocker_auth::file_name_component(file_id.unwrap_or_default())?;
    }

    let fetched = fetch(&state.http, &state.client, resource, token.expose(), file_id)
        .await
        .inspect_err(|e| {
            if matches!(
                e,
                digilocker_auth::Error::Http(_) | digilocker_auth::Error::Upstream { .. }
            ) {
                record_upstream_error(resource.name);
            }
        })?;

    relay::respond(&state.artifacts, resource, file_id, fetched)
}
