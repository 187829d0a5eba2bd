//! Authenticated DigiLocker resources
//!
//! Every downstream call has the same shape: GET a fixed path (sometimes with
//! a file id spliced in) with `Authorization: Bearer <token>`, then read the
//! body as JSON, bytes or text. The differences are data, captured in a
//! [`Resource`] descriptor; [`fetch`] is the single implementation.

use reqwest::Url;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::artifacts::file_name_component;
use crate::client::{ClientConfig, join};
use crate::error::{Error, Result};

const FILE_ID_PLACEHOLDER: &str = "{file_id}";

/// Which provider host serves a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Host {
    Api,
    Account,
}

/// How the relay reads and returns a resource body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    /// Parsed JSON, returned in the `{status, data}` envelope
    Json,
    /// Raw PDF bytes, returned as an attachment
    Pdf,
    /// XML text, returned inside the `{status, data}` envelope
    XmlEnvelope,
    /// XML text, returned raw as `application/xml`
    Xml,
}

/// Local copy kept after a successful fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persist {
    Nothing,
    /// `picture` field of a profile, stored as `<digilockerid>.jpeg`
    ProfileImage,
    /// Whole body, stored as `<file_id>.pdf`
    Document,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resource {
    /// Short name used in logs and metrics
    pub name: &'static str,
    pub host: Host,
    pub path: &'static str,
    pub payload: Payload,
    pub persist: Persist,
}

impl Resource {
    pub const PROFILE: Resource = Resource {
        name: "profile",
        host: Host::Account,
        path: "/public/oauth2/2/user",
        payload: Payload::Json,
        persist: Persist::ProfileImage,
    };

    pub const ISSUED_FILES: Resource = Resource {
        name: "issued_files",
        host: Host::Api,
        path: "/public/oauth2/2/files/issued",
        payload: Payload::Json,
        persist: Persist::Nothing,
    };

    pub const FILE: Resource = Resource {
        name: "file",
        host: Host::Api,
        path: "/public/oauth2/1/file/{file_id}",
        payload: Payload::Pdf,
        persist: Persist::Document,
    };

    pub const CERTIFICATE_XML: Resource = Resource {
        name: "certificate_xml",
        host: Host::Api,
        path: "/public/oauth2/1/xml/{file_id}",
        payload: Payload::XmlEnvelope,
        persist: Persist::Nothing,
    };

    pub const AADHAAR_XML: Resource = Resource {
        name: "aadhaar_xml",
        host: Host::Api,
        path: "/public/oauth2/1/xml/eaadhaar",
        payload: Payload::Xml,
        persist: Persist::Nothing,
    };

    pub const APAAR_XML: Resource = Resource {
        name: "apaar_xml",
        host: Host::Api,
        path: "/public/oauth2/3/xml/aapar",
        payload: Payload::Xml,
        persist: Persist::Nothing,
    };

    pub fn takes_file_id(&self) -> bool {
        self.path.contains(FILE_ID_PLACEHOLDER)
    }

    /// Absolute URL for this resource.
    ///
    /// Resources with a `{file_id}` segment require a non-blank id that is a
    /// single safe path component; anything else is `InvalidFileName`. The id
    /// is percent-encoded as exactly one path segment.
    pub fn url(&self, client: &ClientConfig, file_id: Option<&str>) -> Result<String> {
        let base = match self.host {
            Host::Api => &client.api_base_url,
            Host::Account => &client.account_base_url,
        };
        let Some((head, tail)) = self.path.split_once(FILE_ID_PLACEHOLDER) else {
            return Ok(join(base, self.path));
        };
        let id = file_name_component(file_id.unwrap_or_default())?;

        // The id travels as one percent-encoded segment so `?`, `#` and `%`
        // stay part of the file name.
        let mut url = Url::parse(&join(base, head))
            .map_err(|e| Error::InvalidUrl(format!("{base}: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| Error::InvalidUrl(format!("{base} cannot take a path")))?
            .pop_if_empty()
            .push(id)
            .extend(tail.split('/').filter(|s| !s.is_empty()));
        Ok(url.into())
    }
}

/// A resource body, read according to its [`Payload`].
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    Json(Value),
    Bytes(Vec<u8>),
    Text(String),
}

/// GET a resource with the bearer token attached.
///
/// Non-2xx answers become `Error::Upstream`. No retries.
#[instrument(skip_all, fields(resource = resource.name))]
pub async fn fetch(
    http: &reqwest::Client,
    client: &ClientConfig,
    resource: Resource,
    token: &str,
    file_id: Option<&str>,
) -> Result<Fetched> {
    let url = resource.url(client, file_id)?;
    let response = http
        .get(&url)
        .bearer_auth(token)
        .send()
        .await
        .map_err(|e| Error::Http(format!("{} request failed: {e}", resource.name)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        warn!(status = status.as_u16(), "provider rejected resource request");
        return Err(Error::Upstream {
            status: status.as_u16(),
            body,
        });
    }

    let fetched = match resource.payload {
        Payload::Json => Fetched::Json(
            response
                .json()
                .await
                .map_err(|e| Error::Decode(format!("{} body is not JSON: {e}", resource.name)))?,
        ),
        Payload::Pdf => Fetched::Bytes(
            response
                .bytes()
                .await
                .map_err(|e| Error::Http(format!("reading {} body: {e}", resource.name)))?
                .to_vec(),
        ),
        Payload::XmlEnvelope | Payload::Xml => Fetched::Text(
            response
                .text()
                .await
                .map_err(|e| Error::Http(format!("reading {} body: {e}", resource.name)))?,
        ),
    };
    debug!(status = status.as_u16(), "resource fetched");
    Ok(fetched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode, Uri};
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    type Seen = Arc<Mutex<Vec<(String, Option<String>)>>>;

    /// Provider stub answering every path; records (path, authorization).
    async fn start_provider(
        status: StatusCode,
        content_type: &'static str,
        body: &'static [u8],
    ) -> (String, Seen) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let seen: Seen = Arc::default();
        let sink = seen.clone();

        tokio::spawn(async move {
            let app = axum::Router::new().fallback(move |uri: Uri, headers: HeaderMap| {
                let sink = sink.clone();
                async move {
                    let auth = headers
                        .get("authorization")
                        .map(|v| v.to_str().unwrap().to_string());
                    sink.lock().unwrap().push((uri.path().to_string(), auth));
                    (status, [("content-type", content_type)], body)
                }
            });
            axum::serve(listener, app).await.unwrap();
        });

        (url, seen)
    }

    fn client(base: &str) -> ClientConfig {
        ClientConfig::new("c", "s").with_base_url(base)
    }

    #[test]
    fn descriptors_use_expected_hosts_and_paths() {
        let client = ClientConfig::new("c", "s");
        assert_eq!(
            Resource::PROFILE.url(&client, None).unwrap(),
            "https://digilocker.meripehchaan.gov.in/public/oauth2/2/user"
        );
        assert_eq!(
            Resource::ISSUED_FILES.url(&client, None).unwrap(),
            "https://api.digitallocker.gov.in/public/oauth2/2/files/issued"
        );
        assert_eq!(
            Resource::FILE.url(&client, Some("in.gov.cbse-123")).unwrap(),
            "https://api.digitallocker.gov.in/public/oauth2/1/file/in.gov.cbse-123"
        );
        assert_eq!(
            Resource::CERTIFICATE_XML.url(&client, Some("f1")).unwrap(),
            "https://api.digitallocker.gov.in/public/oauth2/1/xml/f1"
        );
        assert_eq!(
            Resource::AADHAAR_XML.url(&client, None).unwrap(),
            "https://api.digitallocker.gov.in/public/oauth2/1/xml/eaadhaar"
        );
        assert_eq!(
            Resource::APAAR_XML.url(&client, None).unwrap(),
            "https://api.digitallocker.gov.in/public/oauth2/3/xml/aapar"
        );
    }

    #[test]
    fn file_id_is_encoded_as_one_segment() {
        let client = ClientConfig::new("c", "s");
        assert_eq!(
            Resource::FILE.url(&client, Some("doc?x=1")).unwrap(),
            "https://api.digitallocker.gov.in/public/oauth2/1/file/doc%3Fx=1"
        );
        assert_eq!(
            Resource::CERTIFICATE_XML.url(&client, Some("other-doc#frag")).unwrap(),
            "https://api.digitallocker.gov.in/public/oauth2/1/xml/other-doc%23frag"
        );
        assert_eq!(
            Resource::FILE.url(&client, Some("a%2Fb")).unwrap(),
            "https://api.digitallocker.gov.in/public/oauth2/1/file/a%252Fb"
        );
    }

    #[test]
    fn only_file_resources_take_an_id() {
        assert!(Resource::FILE.takes_file_id());
        assert!(Resource::CERTIFICATE_XML.takes_file_id());
        assert!(!Resource::PROFILE.takes_file_id());
        assert!(!Resource::AADHAAR_XML.takes_file_id());
    }

    #[test]
    fn missing_or_unsafe_file_id_is_rejected() {
        let client = ClientConfig::new("c", "s");
        for bad in [None, Some(""), Some("   "), Some("../etc"), Some("a/b")] {
            let result = Resource::FILE.url(&client, bad);
            assert!(
                matches!(result, Err(Error::InvalidFileName(_))),
                "{bad:?} should be rejected, got {result:?}"
            );
        }
    }

    #[tokio::test]
    async fn fetch_sends_bearer_token() {
        let (base, seen) = start_provider(StatusCode::OK, "application/json", b"{}").await;

        fetch(
            &reqwest::Client::new(),
            &client(&base),
            Resource::PROFILE,
            "tok123",
            None,
        )
        .await
        .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "/public/oauth2/2/user");
        assert_eq!(seen[0].1.as_deref(), Some("Bearer tok123"));
    }

    #[tokio::test]
    async fn json_resource_is_parsed() {
        let (base, _) = start_provider(
            StatusCode::OK,
            "application/json",
            br#"{"items":[{"name":"Class X Marksheet"}]}"#,
        )
        .await;

        let fetched = fetch(
            &reqwest::Client::new(),
            &client(&base),
            Resource::ISSUED_FILES,
            "t",
            None,
        )
        .await
        .unwrap();
        let Fetched::Json(value) = fetched else {
            panic!("expected a JSON body");
        };
        assert_eq!(value["items"][0]["name"], "Class X Marksheet");
    }

    #[tokio::test]
    async fn pdf_resource_keeps_raw_bytes() {
        let (base, seen) =
            start_provider(StatusCode::OK, "application/pdf", b"%PDF-1.4\x00\xff").await;

        let fetched = fetch(
            &reqwest::Client::new(),
            &client(&base),
            Resource::FILE,
            "t",
            Some("doc-9"),
        )
        .await
        .unwrap();
        assert_eq!(fetched, Fetched::Bytes(b"%PDF-1.4\x00\xff".to_vec()));
        assert_eq!(seen.lock().unwrap()[0].0, "/public/oauth2/1/file/doc-9");
    }

    #[tokio::test]
    async fn reserved_characters_in_file_id_stay_in_the_path() {
        let (base, seen) = start_provider(StatusCode::OK, "application/pdf", b"%PDF").await;
        let http = reqwest::Client::new();

        for id in ["doc?x=1", "other-doc#frag", "a%2Fb"] {
            fetch(&http, &client(&base), Resource::FILE, "t", Some(id))
                .await
                .unwrap();
        }

        let paths: Vec<String> = seen.lock().unwrap().iter().map(|(p, _)| p.clone()).collect();
        assert_eq!(
            paths,
            [
                "/public/oauth2/1/file/doc%3Fx=1",
                "/public/oauth2/1/file/other-doc%23frag",
                "/public/oauth2/1/file/a%252Fb",
            ]
        );
    }

    #[tokio::test]
    async fn xml_resource_is_text() {
        let (base, _) = start_provider(
            StatusCode::OK,
            "application/xml",
            b"<Certificate><Name>A</Name></Certificate>",
        )
        .await;

        let fetched = fetch(
            &reqwest::Client::new(),
            &client(&base),
            Resource::AADHAAR_XML,
            "t",
            None,
        )
        .await
        .unwrap();
        assert_eq!(
            fetched,
            Fetched::Text("<Certificate><Name>A</Name></Certificate>".into())
        );
    }

    #[tokio::test]
    async fn non_success_is_upstream_error() {
        let (base, _) = start_provider(
            StatusCode::UNAUTHORIZED,
            "application/json",
            br#"{"error":"invalid_token"}"#,
        )
        .await;

        let err = fetch(
            &reqwest::Client::new(),
            &client(&base),
            Resource::PROFILE,
            "expired",
            None,
        )
        .await
        .unwrap_err();
        match err {
            Error::Upstream { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("invalid_token"));
            }
            other => panic!("expected Upstream, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_file_id_makes_no_request() {
        let (base, seen) = start_provider(StatusCode::OK, "application/pdf", b"").await;

        let err = fetch(
            &reqwest::Client::new(),
            &client(&base),
            Resource::FILE,
            "t",
            Some(""),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::InvalidFileName(_)));
        assert!(seen.lock().unwrap().is_empty());
    }
}
