//! Desktop companion request bridge.
//!
//! Every operation here is a single-shot request/response against the
//! desktop process's local API: build a method/route/payload/auth tuple,
//! send it, parse the typed JSON result. No retries, no backoff. Failures
//! are wrapped with the route they came from and propagated to the caller.

use crate::auth::generate_auth_header;
use crate::error::{DesktopError, Result};
use crate::keystore::Keystore;
use crate::models::{
    EntryRef, EntryType, GroupFacade, Otp, SearchResult, VaultSourceDescription, VaultTreeSource,
    VaultsTree,
};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;

/// Default origin of the desktop companion's local API.
pub const DEFAULT_ORIGIN: &str = "http://127.0.0.1:12821";

/// Display name used when the vaults tree carries no label for a source.
pub const UNTITLED_VAULT: &str = "Untitled vault";

/// Client identification sent during the auth handshake.
const HANDSHAKE_CLIENT: &str = "browser";
const HANDSHAKE_PURPOSE: &str = "vaults-access";
const HANDSHAKE_REV: u32 = 1;

/// Blocking client for the desktop companion API.
pub struct DesktopClient {
    origin: String,
    http: Client,
    keystore: Keystore,
}

#[derive(Deserialize)]
struct AuthResponseBody {
    #[serde(rename = "publicKey", default)]
    public_key: Option<String>,
}

#[derive(Deserialize)]
struct ResultsBody {
    results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct OtpsBody {
    otps: Vec<Otp>,
}

#[derive(Deserialize)]
struct SourcesBody {
    sources: Vec<VaultSourceDescription>,
}

#[derive(Deserialize)]
struct RawVaultFacade {
    #[serde(default)]
    groups: Vec<GroupFacade>,
}

#[derive(Deserialize)]
struct VaultsTreeBody {
    #[serde(default)]
    names: Option<HashMap<String, String>>,
    tree: HashMap<String, RawVaultFacade>,
}

#[derive(Deserialize)]
struct NewEntryBody {
    #[serde(rename = "entryID")]
    entry_id: String,
}

impl DesktopClient {
    pub fn new(origin: impl Into<String>, keystore: Keystore) -> Self {
        Self {
            origin: origin.into(),
            http: Client::new(),
            keystore,
        }
    }

    pub fn keystore(&self) -> &Keystore {
        &self.keystore
    }

    pub fn keystore_mut(&mut self) -> &mut Keystore {
        &mut self.keystore
    }

    /// Whether a completed handshake is on record. Purely local.
    pub fn has_connection(&self) -> bool {
        self.keystore.has_connection()
    }

    /// Ask the desktop to start a browser-access handshake. The desktop
    /// presents a pairing code to the user out of band.
    pub fn initiate_connection(&self) -> Result<()> {
        self.send_expect_ok(
            Method::POST,
            "/v1/auth/request",
            None,
            Some(json!({
                "client": HANDSHAKE_CLIENT,
                "purpose": HANDSHAKE_PURPOSE,
                "rev": HANDSHAKE_REV,
            })),
            false,
        )
    }

    /// Complete the handshake with the pairing code the user read off the
    /// desktop. Returns the server's public key, which the caller stores.
    ///
    /// Fails before any network call when no local public key or client ID
    /// is available.
    pub fn authenticate_access(&self, code: &str) -> Result<String> {
        let public_key = self
            .keystore
            .public_key()
            .ok_or(DesktopError::MissingPublicKey)?;
        let client_id = self
            .keystore
            .client_id()
            .ok_or(DesktopError::MissingClientId)?;
        let body: AuthResponseBody = self.send(
            Method::POST,
            "/v1/auth/response",
            None,
            Some(json!({
                "code": code,
                "id": client_id,
                "publicKey": public_key,
            })),
            false,
        )?;
        body.public_key.ok_or(DesktopError::MissingServerKey)
    }

    /// Verify that the stored credentials are still accepted.
    pub fn test_auth(&self) -> Result<()> {
        self.send_expect_ok(
            Method::POST,
            "/v1/auth/test",
            None,
            Some(json!({
                "client": HANDSHAKE_CLIENT,
                "purpose": HANDSHAKE_PURPOSE,
                "rev": HANDSHAKE_REV,
            })),
            true,
        )
        .map_err(|err| DesktopError::ConnectionFailed(Box::new(err)))
    }

    pub fn get_vault_sources(&self) -> Result<Vec<VaultSourceDescription>> {
        let body: SourcesBody = self.send(Method::GET, "/v1/vaults", None, None, true)?;
        Ok(body.sources)
    }

    /// Fetch the vaults tree. Every source in the response appears in the
    /// output, named from the companion's label map or the untitled fallback.
    pub fn get_vaults_tree(&self) -> Result<VaultsTree> {
        let body: VaultsTreeBody = self.send(Method::GET, "/v1/vaults-tree", None, None, true)?;
        Ok(normalize_vaults_tree(body))
    }

    pub fn get_otps(&self) -> Result<Vec<Otp>> {
        let body: OtpsBody = self.send(Method::GET, "/v1/otps", None, None, true)?;
        Ok(body.otps)
    }

    pub fn search_entries_by_url(&self, url: &str) -> Result<Vec<SearchResult>> {
        let body: ResultsBody = self.send(
            Method::GET,
            "/v1/entries",
            Some(&[("type", "url"), ("url", url)]),
            None,
            true,
        )?;
        Ok(body.results)
    }

    pub fn search_entries_by_term(&self, term: &str) -> Result<Vec<SearchResult>> {
        let body: ResultsBody = self.send(
            Method::GET,
            "/v1/entries",
            Some(&[("type", "term"), ("term", term)]),
            None,
            true,
        )?;
        Ok(body.results)
    }

    /// Resolve specific entries by (entry, source) reference pairs.
    pub fn get_entry_search_results(&self, entries: &[EntryRef]) -> Result<Vec<SearchResult>> {
        let body: ResultsBody = self.send(
            Method::POST,
            "/v1/entries/specific",
            None,
            Some(json!({ "entries": entries })),
            true,
        )?;
        Ok(body.results)
    }

    /// Create an entry in the given source and group. Returns its new ID.
    pub fn save_new_entry(
        &self,
        source_id: &str,
        group_id: &str,
        entry_type: EntryType,
        properties: &HashMap<String, String>,
    ) -> Result<String> {
        let route = format!("/v1/vaults/{source_id}/group/{group_id}/entry");
        let body: NewEntryBody = self.send(
            Method::POST,
            &route,
            None,
            Some(json!({ "properties": properties, "type": entry_type })),
            true,
        )?;
        Ok(body.entry_id)
    }

    /// Overwrite properties of an existing entry.
    pub fn save_existing_entry(
        &self,
        source_id: &str,
        group_id: &str,
        entry_id: &str,
        properties: &HashMap<String, String>,
    ) -> Result<()> {
        let route = format!("/v1/vaults/{source_id}/group/{group_id}/entry/{entry_id}");
        self.send_expect_ok(
            Method::PATCH,
            &route,
            None,
            Some(json!({ "properties": properties })),
            true,
        )
    }

    /// Ask the desktop to lock a source. True iff it confirmed with 200.
    pub fn prompt_source_lock(&self, source_id: &str) -> Result<bool> {
        let route = format!("/v1/vaults/{source_id}/lock");
        let response = self.issue(Method::POST, &route, None, None, true)?;
        Ok(response.status().as_u16() == 200)
    }

    /// Ask the desktop to prompt the user to unlock a source.
    pub fn prompt_source_unlock(&self, source_id: &str) -> Result<()> {
        let route = format!("/v1/vaults/{source_id}/unlock");
        self.send_expect_ok(Method::POST, &route, None, None, true)
    }

    /// Issue a request and parse the JSON body into `T`.
    fn send<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        route: &str,
        query: Option<&[(&str, &str)]>,
        payload: Option<serde_json::Value>,
        authenticated: bool,
    ) -> Result<T> {
        let method_name = method_name(&method);
        let response = self.issue(method, route, query, payload, authenticated)?;
        let status = response.status();
        if !status.is_success() {
            return Err(DesktopError::Status {
                method: method_name,
                route: route.to_string(),
                status: status.as_u16(),
            });
        }
        response.json().map_err(|source| DesktopError::Request {
            method: method_name,
            route: route.to_string(),
            source,
        })
    }

    /// Issue a request, requiring only a success status.
    fn send_expect_ok(
        &self,
        method: Method,
        route: &str,
        query: Option<&[(&str, &str)]>,
        payload: Option<serde_json::Value>,
        authenticated: bool,
    ) -> Result<()> {
        let method_name = method_name(&method);
        let response = self.issue(method, route, query, payload, authenticated)?;
        let status = response.status();
        if !status.is_success() {
            return Err(DesktopError::Status {
                method: method_name,
                route: route.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    /// Build and execute the request. Auth header generation runs first, so
    /// missing credentials fail before anything touches the network.
    fn issue(
        &self,
        method: Method,
        route: &str,
        query: Option<&[(&str, &str)]>,
        payload: Option<serde_json::Value>,
        authenticated: bool,
    ) -> Result<reqwest::blocking::Response> {
        let auth = if authenticated {
            Some(generate_auth_header(&self.keystore)?)
        } else {
            None
        };
        let method_name = method_name(&method);
        let url = format!("{}{}", self.origin, route);
        tracing::debug!(%url, method = method_name, "desktop request");

        let mut builder: RequestBuilder = self.http.request(method, &url);
        if let Some(pairs) = query {
            builder = builder.query(pairs);
        }
        if let Some(body) = payload {
            builder = builder.json(&body);
        }
        if let Some(header) = auth {
            builder = builder.header(reqwest::header::AUTHORIZATION, header);
        }
        builder.send().map_err(|source| DesktopError::Request {
            method: method_name,
            route: route.to_string(),
            source,
        })
    }
}

fn method_name(method: &Method) -> &'static str {
    if *method == Method::GET {
        "GET"
    } else if *method == Method::POST {
        "POST"
    } else if *method == Method::PATCH {
        "PATCH"
    } else {
        "OTHER"
    }
}

/// Attach display names to the raw tree, falling back per source.
fn normalize_vaults_tree(body: VaultsTreeBody) -> VaultsTree {
    let VaultsTreeBody { names, tree } = body;
    tree.into_iter()
        .map(|(source_id, facade)| {
            let name = names
                .as_ref()
                .and_then(|names| names.get(&source_id).cloned())
                .unwrap_or_else(|| UNTITLED_VAULT.to_string());
            let source = VaultTreeSource {
                id: source_id.clone(),
                name,
                groups: facade.groups,
            };
            (source_id, source)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keystore::KeyData;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    fn paired_keystore() -> Keystore {
        Keystore::with_data(KeyData {
            client_id: Some("client-1".into()),
            public_key: Some("local-pub".into()),
            private_key: Some("local-priv".into()),
            server_public_key: Some("server-pub".into()),
        })
    }

    /// Serve one canned HTTP response and hand back the raw request text.
    fn one_shot_server(body: &str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let origin = format!("http://{}", listener.local_addr().unwrap());
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = stream.read(&mut buf).unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text
                        .lines()
                        .find_map(|line| {
                            line.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            stream.write_all(response.as_bytes()).unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });
        (origin, handle)
    }

    #[test]
    fn authenticated_call_fails_before_network_without_credentials() {
        // Port 9 (discard) would hang or refuse; the point is it is never
        // reached when the keystore is empty.
        let client = DesktopClient::new("http://127.0.0.1:9", Keystore::ephemeral());
        assert!(matches!(
            client.get_otps(),
            Err(DesktopError::MissingPublicKey)
        ));
        assert!(matches!(
            client.search_entries_by_term("x"),
            Err(DesktopError::MissingPublicKey)
        ));
        assert!(matches!(
            client.authenticate_access("1234"),
            Err(DesktopError::MissingPublicKey)
        ));
    }

    #[test]
    fn vault_sources_round_trip() {
        let (origin, server) = one_shot_server(
            r#"{"sources":[{"id":"s1","name":"Personal","state":"unlocked"}]}"#,
        );
        let client = DesktopClient::new(origin, paired_keystore());
        let sources = client.get_vault_sources().unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name, "Personal");

        let request = server.join().unwrap();
        assert!(request.starts_with("GET /v1/vaults HTTP/1.1"));
        assert!(request
            .to_ascii_lowercase()
            .contains("authorization: bcup client-1:local-pub"));
    }

    #[test]
    fn url_search_sends_query_parameters() {
        let (origin, server) = one_shot_server(r#"{"results":[]}"#);
        let client = DesktopClient::new(origin, paired_keystore());
        let results = client
            .search_entries_by_url("https://example.com/login")
            .unwrap();
        assert!(results.is_empty());

        let request = server.join().unwrap();
        assert!(request.starts_with("GET /v1/entries?type=url&url="));
    }

    #[test]
    fn handshake_completion_posts_code_and_keys() {
        let (origin, server) = one_shot_server(r#"{"publicKey":"server-pub"}"#);
        let client = DesktopClient::new(origin, paired_keystore());
        let server_key = client.authenticate_access("314159").unwrap();
        assert_eq!(server_key, "server-pub");

        let request = server.join().unwrap();
        assert!(request.starts_with("POST /v1/auth/response HTTP/1.1"));
        assert!(request.contains(r#""code":"314159""#));
        assert!(request.contains(r#""id":"client-1""#));
    }

    #[test]
    fn new_entry_posts_properties_and_returns_the_id() {
        let (origin, server) = one_shot_server(r#"{"entryID":"e-new"}"#);
        let client = DesktopClient::new(origin, paired_keystore());
        let properties = HashMap::from([("title".to_string(), "Mail".to_string())]);
        let id = client
            .save_new_entry("s1", "g1", EntryType::Login, &properties)
            .unwrap();
        assert_eq!(id, "e-new");

        let request = server.join().unwrap();
        assert!(request.starts_with("POST /v1/vaults/s1/group/g1/entry HTTP/1.1"));
        assert!(request.contains(r#""type":"login""#));
        assert!(request.contains(r#""title":"Mail""#));
    }

    #[test]
    fn handshake_without_server_key_in_response_fails() {
        let (origin, _server) = one_shot_server(r#"{}"#);
        let client = DesktopClient::new(origin, paired_keystore());
        assert!(matches!(
            client.authenticate_access("0000"),
            Err(DesktopError::MissingServerKey)
        ));
    }

    #[test]
    fn tree_normalization_names_every_source() {
        let body: VaultsTreeBody = serde_json::from_str(
            r#"{
                "names": { "s1": "Work" },
                "tree": {
                    "s1": { "groups": [{ "id": "g1", "title": "Root" }] },
                    "s2": { "groups": [] }
                }
            }"#,
        )
        .unwrap();
        let tree = normalize_vaults_tree(body);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree["s1"].name, "Work");
        assert_eq!(tree["s2"].name, UNTITLED_VAULT);
        assert_eq!(tree["s1"].groups.len(), 1);
    }

    #[test]
    fn tree_normalization_without_names_map() {
        let body: VaultsTreeBody =
            serde_json::from_str(r#"{ "tree": { "s9": {} } }"#).unwrap();
        let tree = normalize_vaults_tree(body);
        assert_eq!(tree["s9"].name, UNTITLED_VAULT);
    }
}
