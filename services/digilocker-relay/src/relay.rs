//! Resource relay
//!
//! Turns a fetched provider body into the response the caller sees and kicks
//! off local persistence. Persistence runs on its own task; the response
//! never waits for it and its failures are only logged.

use axum::Json;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use digilocker_auth::{ArtifactStore, Fetched, Payload, Persist, Resource};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ApiError;

/// `{status: 200, data}` body used by JSON and enveloped XML resources.
pub fn json_envelope(data: Value) -> Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": StatusCode::OK.as_u16(),
            "data": data,
        })),
    )
        .into_response()
}

fn pdf_attachment(file_id: &str, bytes: Vec<u8>) -> Result<Response, ApiError> {
    let disposition = HeaderValue::from_str(&format!("attachment; filename={file_id}.pdf"))
        .map_err(|_| ApiError::BadRequest(format!("fileId {file_id:?} is not header-safe")))?;
    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
            (CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

fn raw_xml(text: String) -> Response {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, HeaderValue::from_static("application/xml"))],
        text,
    )
        .into_response()
}

/// Build the caller's response for a fetched resource and schedule its
/// local copy.
pub fn respond(
    artifacts: &ArtifactStore,
    resource: Resource,
    file_id: Option<&str>,
    fetched: Fetched,
) -> Result<Response, ApiError> {
    match (resource.payload, fetched) {
        (Payload::Json, Fetched::Json(value)) => {
            if resource.persist == Persist::ProfileImage {
                persist_profile_image(artifacts, &value);
            }
            Ok(json_envelope(value))
        }
        (Payload::Pdf, Fetched::Bytes(bytes)) => {
            let file_id = file_id.unwrap_or_default();
            let response = pdf_attachment(file_id, bytes.clone())?;
            if resource.persist == Persist::Document {
                persist_document(artifacts, file_id, bytes);
            }
            Ok(response)
        }
        (Payload::XmlEnvelope, Fetched::Text(text)) => Ok(json_envelope(Value::String(text))),
        (Payload::Xml, Fetched::Text(text)) => Ok(raw_xml(text)),
        (payload, _) => Err(ApiError::Internal(format!(
            "{} fetched a body that does not match {payload:?}",
            resource.name
        ))),
    }
}

fn persist_profile_image(artifacts: &ArtifactStore, profile: &Value) {
    let Some(picture) = profile.get("picture").and_then(Value::as_str) else {
        debug!("profile has no picture");
        return;
    };
    let Some(id) = profile.get("digilockerid").and_then(Value::as_str) else {
        warn!("profile picture present without digilockerid, not saved");
        return;
    };

    let artifacts = artifacts.clone();
    let id = id.to_owned();
    let picture = picture.to_owned();
    tokio::spawn(async move {
        if let Err(e) = artifacts.save_profile_image(&id, &picture).await {
            warn!(error = %e, "failed to save profile image");
        }
    });
}

fn persist_document(artifacts: &ArtifactStore, file_id: &str, bytes: Vec<u8>) {
    let artifacts = artifacts.clone();
    let file_id = file_id.to_owned();
    tokio::spawn(async move {
        if let Err(e) = artifacts.save_file(&file_id, &bytes).await {
            warn!(error = %e, file_id = %file_id, "failed to save document");
        }
    });
}
