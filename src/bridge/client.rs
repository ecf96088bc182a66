use reqwest::{multipart, Client};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::sleep;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MULTIPART_TIMEOUT_SECS: u64 = 120;
const MAX_TRANSPORT_ATTEMPTS: u32 = 3;
const AUTH_DENIED_MARKER: &str = "ACESSO NEGADO";

/// `(ok, body)` pair mirroring the Bridge's own response shape (spec §4.C).
pub type BridgeOutcome = (bool, Value);

enum Auth<'a> {
    Admin,
    User(&'a str),
}

/// Typed HTTP client against the Bridge, supporting the two auth modes documented
/// in spec §4.C on the same underlying `reqwest::Client`: an admin `x-api-key` mode
/// for session lifecycle, and a per-instance `Authorization: Bearer` mode for every
/// other operation. Grounded on `fillow/services.py`'s `NodeBridge` class.
pub struct BridgeClient {
    base_url: String,
    admin_api_key: String,
    http: Client,
}

impl BridgeClient {
    pub fn new(base_url: String, admin_api_key: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            admin_api_key,
            http: Client::new(),
        }
    }

    /// True iff `body` carries the Bridge's invalid-token marker, or the response
    /// itself was an unauthorized status — see DESIGN.md's Open Question #1 decision.
    pub fn is_auth_denied(status: reqwest::StatusCode, body: &Value) -> bool {
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return true;
        }
        body.to_string().contains(AUTH_DENIED_MARKER)
    }

    async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        auth: Auth<'_>,
        json_body: Option<Value>,
        timeout: Duration,
    ) -> BridgeOutcome {
        let (status, body) = self.request_with_status(method, path, auth, json_body, timeout).await;
        (status.is_success(), body)
    }

    /// Same transport/retry behavior as `request`, but surfaces the real HTTP status
    /// instead of collapsing it to a bool — callers that need to distinguish a 401/403
    /// from other failures (e.g. the chatbot engine's self-heal path) go through this.
    /// Transport-level failures (timeout/connect exhausted retries) report as 502 since
    /// no real status was ever received.
    async fn request_with_status(
        &self,
        method: reqwest::Method,
        path: &str,
        auth: Auth<'_>,
        json_body: Option<Value>,
        timeout: Duration,
    ) -> (reqwest::StatusCode, Value) {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut builder = self.http.request(method.clone(), &url).timeout(timeout);
            builder = match auth {
                Auth::Admin => builder.header("x-api-key", &self.admin_api_key),
                Auth::User(token) => builder.header("Authorization", format!("Bearer {}", token)),
            };
            if let Some(ref body) = json_body {
                builder = builder.json(body);
            }
            match builder.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let body: Value = resp.json().await.unwrap_or(Value::Null);
                    return (status, body);
                }
                Err(err) => {
                    if err.is_timeout() || err.is_connect() {
                        if attempt < MAX_TRANSPORT_ATTEMPTS {
                            sleep(Duration::from_millis((600 * attempt) as u64)).await;
                            continue;
                        }
                        return (
                            reqwest::StatusCode::BAD_GATEWAY,
                            json!({ "error": format!("bridge unreachable: {}", err) }),
                        );
                    }
                    return (reqwest::StatusCode::BAD_GATEWAY, json!({ "error": err.to_string() }));
                }
            }
        }
    }

    async fn request_multipart(
        &self,
        method: reqwest::Method,
        path: &str,
        token: &str,
        form: multipart::Form,
    ) -> BridgeOutcome {
        let (status, body) = self.request_multipart_with_status(method, path, token, form).await;
        (status.is_success(), body)
    }

    async fn request_multipart_with_status(
        &self,
        method: reqwest::Method,
        path: &str,
        token: &str,
        form: multipart::Form,
    ) -> (reqwest::StatusCode, Value) {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .request(method, &url)
            .timeout(Duration::from_secs(MULTIPART_TIMEOUT_SECS))
            .header("Authorization", format!("Bearer {}", token))
            .multipart(form)
            .send()
            .await;
        match resp {
            Ok(resp) => {
                let status = resp.status();
                let body: Value = resp.json().await.unwrap_or(Value::Null);
                (status, body)
            }
            Err(err) => (reqwest::StatusCode::BAD_GATEWAY, json!({ "error": err.to_string() })),
        }
    }

    fn default_timeout() -> Duration {
        Duration::from_secs(DEFAULT_TIMEOUT_SECS)
    }

    // ---- Sessions (admin mode) ----

    pub async fn start_session(&self, session_id: &str) -> BridgeOutcome {
        self.request(
            reqwest::Method::POST,
            "/sessions/start",
            Auth::Admin,
            Some(json!({ "sessionId": session_id })),
            Self::default_timeout(),
        )
        .await
    }

    pub async fn delete_session(&self, session_id: &str) -> BridgeOutcome {
        self.request(
            reqwest::Method::DELETE,
            &format!("/sessions/{}", session_id),
            Auth::Admin,
            None,
            Self::default_timeout(),
        )
        .await
    }

    pub async fn list_sessions(&self) -> BridgeOutcome {
        self.request(reqwest::Method::GET, "/sessions", Auth::Admin, None, Self::default_timeout()).await
    }

    pub async fn get_status(&self, session_id: &str) -> BridgeOutcome {
        self.request(
            reqwest::Method::GET,
            &format!("/sessions/{}/status", session_id),
            Auth::Admin,
            None,
            Self::default_timeout(),
        )
        .await
    }

    /// Admin route first, falling back to the public QR route (mirrors
    /// `NodeBridge.get_qrcode`'s admin-then-public fallback).
    pub async fn get_qrcode(&self, session_id: &str) -> BridgeOutcome {
        let admin = self
            .request(
                reqwest::Method::GET,
                &format!("/sessions/{}/qr", session_id),
                Auth::Admin,
                None,
                Self::default_timeout(),
            )
            .await;
        if admin.0 {
            return admin;
        }
        self.request(
            reqwest::Method::GET,
            &format!("/public/sessions/{}/qr", session_id),
            Auth::Admin,
            None,
            Self::default_timeout(),
        )
        .await
    }

    // ---- Messages (user mode) ----

    pub async fn send_text(&self, token: &str, to: &str, text: &str, quoted_id: Option<&str>) -> BridgeOutcome {
        let (status, body) = self.send_text_with_status(token, to, text, quoted_id).await;
        (status.is_success(), body)
    }

    /// Status-preserving twin of `send_text`, used where the caller needs to tell a
    /// 401/403 auth-denial apart from any other failure (spec §4.G self-heal retry).
    pub async fn send_text_with_status(&self, token: &str, to: &str, text: &str, quoted_id: Option<&str>) -> (reqwest::StatusCode, Value) {
        let mut body = json!({ "to": to, "text": text });
        if let Some(id) = quoted_id {
            body["quotedMessageId"] = json!(id);
        }
        self.request_with_status(reqwest::Method::POST, "/messages/send-text", Auth::User(token), Some(body), Self::default_timeout()).await
    }

    pub async fn send_media(&self, token: &str, to: &str, file_bytes: Vec<u8>, file_name: &str, caption: Option<&str>) -> BridgeOutcome {
        let (status, body) = self.send_media_with_status(token, to, file_bytes, file_name, caption).await;
        (status.is_success(), body)
    }

    /// Status-preserving twin of `send_media`, used by the dispatch worker's self-heal
    /// retry so a 401/403 can be told apart from any other failure.
    pub async fn send_media_with_status(
        &self,
        token: &str,
        to: &str,
        file_bytes: Vec<u8>,
        file_name: &str,
        caption: Option<&str>,
    ) -> (reqwest::StatusCode, Value) {
        let part = multipart::Part::bytes(file_bytes).file_name(file_name.to_string());
        let mut form = multipart::Form::new().text("to", to.to_string()).part("file", part);
        if let Some(caption) = caption {
            form = form.text("caption", caption.to_string());
        }
        self.request_multipart_with_status(reqwest::Method::POST, "/messages/send-media", token, form).await
    }

    pub async fn send_voice(&self, token: &str, to: &str, file_bytes: Vec<u8>, file_name: &str) -> BridgeOutcome {
        let part = multipart::Part::bytes(file_bytes).file_name(file_name.to_string());
        let form = multipart::Form::new().text("to", to.to_string()).part("file", part);
        self.request_multipart(reqwest::Method::POST, "/messages/send-voice", token, form).await
    }

    pub async fn send_poll(&self, token: &str, to: &str, question: &str, options: Vec<String>) -> BridgeOutcome {
        self.request(
            reqwest::Method::POST,
            "/messages/poll",
            Auth::User(token),
            Some(json!({ "to": to, "question": question, "options": options })),
            Self::default_timeout(),
        )
        .await
    }

    pub async fn send_location(&self, token: &str, to: &str, lat: f64, lon: f64) -> BridgeOutcome {
        self.request(
            reqwest::Method::POST,
            "/messages/location",
            Auth::User(token),
            Some(json!({ "to": to, "latitude": lat, "longitude": lon })),
            Self::default_timeout(),
        )
        .await
    }

    pub async fn send_contact(&self, token: &str, to: &str, contact_jid: &str, display_name: &str) -> BridgeOutcome {
        self.request(
            reqwest::Method::POST,
            "/messages/contact",
            Auth::User(token),
            Some(json!({ "to": to, "contactJid": contact_jid, "displayName": display_name })),
            Self::default_timeout(),
        )
        .await
    }

    pub async fn send_reaction(&self, token: &str, message_key: &Value, emoji: &str) -> BridgeOutcome {
        self.request(
            reqwest::Method::POST,
            "/messages/reaction",
            Auth::User(token),
            Some(json!({ "key": message_key, "emoji": emoji })),
            Self::default_timeout(),
        )
        .await
    }

    pub async fn edit_message(&self, token: &str, message_key: &Value, new_text: &str) -> BridgeOutcome {
        self.request(
            reqwest::Method::POST,
            "/messages/manage/edit",
            Auth::User(token),
            Some(json!({ "key": message_key, "text": new_text })),
            Self::default_timeout(),
        )
        .await
    }

    pub async fn delete_message(&self, token: &str, message_key: &Value) -> BridgeOutcome {
        self.request(
            reqwest::Method::POST,
            "/messages/manage/delete",
            Auth::User(token),
            Some(json!({ "key": message_key })),
            Self::default_timeout(),
        )
        .await
    }

    pub async fn pin_message(&self, token: &str, message_key: &Value) -> BridgeOutcome {
        self.request(
            reqwest::Method::POST,
            "/messages/manage/pin",
            Auth::User(token),
            Some(json!({ "key": message_key })),
            Self::default_timeout(),
        )
        .await
    }

    pub async fn unpin_message(&self, token: &str, message_key: &Value) -> BridgeOutcome {
        self.request(
            reqwest::Method::POST,
            "/messages/manage/unpin",
            Auth::User(token),
            Some(json!({ "key": message_key })),
            Self::default_timeout(),
        )
        .await
    }

    pub async fn star_message(&self, token: &str, message_key: &Value, starred: bool) -> BridgeOutcome {
        self.request(
            reqwest::Method::POST,
            "/messages/manage/star",
            Auth::User(token),
            Some(json!({ "key": message_key, "starred": starred })),
            Self::default_timeout(),
        )
        .await
    }

    // ---- Chats (user mode) ----

    pub async fn archive_chat(&self, token: &str, jid: &str, archive: bool) -> BridgeOutcome {
        self.request(
            reqwest::Method::POST,
            "/chat/manage/archive",
            Auth::User(token),
            Some(json!({ "jid": jid, "archive": archive })),
            Self::default_timeout(),
        )
        .await
    }

    pub async fn mute_chat(&self, token: &str, jid: &str, mute: bool) -> BridgeOutcome {
        self.request(
            reqwest::Method::POST,
            "/chat/manage/mute",
            Auth::User(token),
            Some(json!({ "jid": jid, "mute": mute })),
            Self::default_timeout(),
        )
        .await
    }

    pub async fn clear_chat(&self, token: &str, jid: &str) -> BridgeOutcome {
        self.request(
            reqwest::Method::POST,
            "/chat/manage/clear",
            Auth::User(token),
            Some(json!({ "jid": jid })),
            Self::default_timeout(),
        )
        .await
    }

    pub async fn mark_chat_read(&self, token: &str, jid: &str) -> BridgeOutcome {
        self.request(
            reqwest::Method::POST,
            "/chat/manage/mark-read",
            Auth::User(token),
            Some(json!({ "jid": jid })),
            Self::default_timeout(),
        )
        .await
    }

    pub async fn mark_messages_read(&self, token: &str, message_keys: Vec<Value>) -> BridgeOutcome {
        self.request(
            reqwest::Method::POST,
            "/messages/read",
            Auth::User(token),
            Some(json!({ "keys": message_keys })),
            Self::default_timeout(),
        )
        .await
    }

    // ---- Groups (user mode) ----

    pub async fn list_groups(&self, token: &str) -> BridgeOutcome {
        self.request(reqwest::Method::GET, "/groups/", Auth::User(token), None, Self::default_timeout()).await
    }

    pub async fn create_group(&self, token: &str, subject: &str, participants: Vec<String>) -> BridgeOutcome {
        self.request(
            reqwest::Method::POST,
            "/groups/create",
            Auth::User(token),
            Some(json!({ "subject": subject, "participants": participants })),
            Self::default_timeout(),
        )
        .await
    }

    pub async fn update_group_participants(&self, token: &str, group_id: &str, action: &str, participants: Vec<String>) -> BridgeOutcome {
        self.request(
            reqwest::Method::POST,
            &format!("/groups/{}/participants", group_id),
            Auth::User(token),
            Some(json!({ "action": action, "participants": participants })),
            Self::default_timeout(),
        )
        .await
    }

    pub async fn update_group_subject(&self, token: &str, group_id: &str, subject: &str) -> BridgeOutcome {
        self.request(
            reqwest::Method::PUT,
            &format!("/groups/{}/subject", group_id),
            Auth::User(token),
            Some(json!({ "subject": subject })),
            Self::default_timeout(),
        )
        .await
    }

    pub async fn update_group_description(&self, token: &str, group_id: &str, description: &str) -> BridgeOutcome {
        self.request(
            reqwest::Method::PUT,
            &format!("/groups/{}/description", group_id),
            Auth::User(token),
            Some(json!({ "description": description })),
            Self::default_timeout(),
        )
        .await
    }

    pub async fn update_group_setting(&self, token: &str, group_id: &str, setting: &str, value: &str) -> BridgeOutcome {
        self.request(
            reqwest::Method::PUT,
            &format!("/groups/{}/settings", group_id),
            Auth::User(token),
            Some(json!({ "setting": setting, "value": value })),
            Self::default_timeout(),
        )
        .await
    }

    pub async fn get_group_invite_code(&self, token: &str, group_id: &str) -> BridgeOutcome {
        self.request(
            reqwest::Method::GET,
            &format!("/groups/{}/invite-code", group_id),
            Auth::User(token),
            None,
            Self::default_timeout(),
        )
        .await
    }

    pub async fn revoke_group_invite_code(&self, token: &str, group_id: &str) -> BridgeOutcome {
        self.request(
            reqwest::Method::POST,
            &format!("/groups/{}/revoke-invite", group_id),
            Auth::User(token),
            None,
            Self::default_timeout(),
        )
        .await
    }

    pub async fn leave_group(&self, token: &str, group_id: &str) -> BridgeOutcome {
        self.request(
            reqwest::Method::POST,
            &format!("/groups/{}/leave", group_id),
            Auth::User(token),
            None,
            Self::default_timeout(),
        )
        .await
    }

    pub async fn join_group(&self, token: &str, invite_code: &str) -> BridgeOutcome {
        self.request(
            reqwest::Method::POST,
            "/groups/join",
            Auth::User(token),
            Some(json!({ "inviteCode": invite_code })),
            Self::default_timeout(),
        )
        .await
    }

    // ---- Profile (user mode) ----

    pub async fn fetch_profile(&self, token: &str, jid: &str) -> BridgeOutcome {
        self.request(
            reqwest::Method::GET,
            &format!("/profile/info/{}", jid),
            Auth::User(token),
            None,
            Self::default_timeout(),
        )
        .await
    }

    pub async fn update_profile_status(&self, token: &str, status: &str) -> BridgeOutcome {
        self.request(
            reqwest::Method::PUT,
            "/profile/manage/status",
            Auth::User(token),
            Some(json!({ "status": status })),
            Self::default_timeout(),
        )
        .await
    }

    pub async fn update_profile_picture(&self, token: &str, file_bytes: Vec<u8>, file_name: &str) -> BridgeOutcome {
        let part = multipart::Part::bytes(file_bytes).file_name(file_name.to_string());
        let form = multipart::Form::new().part("file", part);
        self.request_multipart(reqwest::Method::PUT, "/profile/manage/picture", token, form).await
    }

    pub async fn get_blocklist(&self, token: &str) -> BridgeOutcome {
        self.request(reqwest::Method::GET, "/profile/blocklist", Auth::User(token), None, Self::default_timeout()).await
    }

    pub async fn block_user(&self, token: &str, jid: &str, block: bool) -> BridgeOutcome {
        self.request(
            reqwest::Method::POST,
            "/users/block",
            Auth::User(token),
            Some(json!({ "jid": jid, "block": block })),
            Self::default_timeout(),
        )
        .await
    }

    pub async fn check_on_whatsapp(&self, token: &str, numbers: Vec<String>) -> BridgeOutcome {
        self.request(
            reqwest::Method::POST,
            "/users/check",
            Auth::User(token),
            Some(json!({ "numbers": numbers })),
            Self::default_timeout(),
        )
        .await
    }

    // ---- Presence (user mode) ----

    pub async fn set_presence(&self, token: &str, jid: &str, state: &str) -> BridgeOutcome {
        self.request(
            reqwest::Method::POST,
            "/presence",
            Auth::User(token),
            Some(json!({ "jid": jid, "state": state })),
            Self::default_timeout(),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_literal_marker() {
        let body = json!({ "error": "ACESSO NEGADO: token inválido" });
        assert!(BridgeClient::is_auth_denied(reqwest::StatusCode::OK, &body));
    }

    #[test]
    fn detects_unauthorized_status_without_marker() {
        let body = json!({ "error": "nope" });
        assert!(BridgeClient::is_auth_denied(reqwest::StatusCode::UNAUTHORIZED, &body));
    }

    #[test]
    fn ignores_unrelated_errors() {
        let body = json!({ "error": "rate limited" });
        assert!(!BridgeClient::is_auth_denied(reqwest::StatusCode::TOO_MANY_REQUESTS, &body));
    }
}
