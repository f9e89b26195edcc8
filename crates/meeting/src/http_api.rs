//! HTTP-Client fuer die Meeting-API (reqwest, Bearer-Token)
//!
//! ```text
//! GET    {basis}/meetings/{id}          -> MeetingInfo
//! POST   {basis}/meetings/{id}/join
//! POST   {basis}/meetings/{id}/leave
//! DELETE {basis}/meetings/{id}          (fuer alle beenden)
//! POST   {basis}/meetings/{id}/invite   {"userIds": [...]}
//! GET    {basis}/users/all              -> [Benutzer]
//! ```

use empowerly_core::{MeetingId, ParticipantId};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::api::{ApiError, ApiResult, Benutzer, EinladungsAnfrage, MeetingApi, MeetingInfo};

/// Standard-Basis-URL des Backends
pub const STANDARD_API_URL: &str = "http://localhost:8080/api";

#[derive(Debug, Clone)]
pub struct HttpMeetingApi {
    basis_url: String,
    token: Option<String>,
    http: Client,
}

impl HttpMeetingApi {
    /// Erstellt einen Client; ohne Token werden Anfragen anonym gesendet
    pub fn neu(basis_url: &str, token: Option<String>, timeout: Duration) -> ApiResult<Self> {
        if basis_url.trim().is_empty() {
            return Err(ApiError::Konfiguration("leere API-URL".into()));
        }
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            basis_url: basis_url.trim_end_matches('/').to_string(),
            token,
            http,
        })
    }

    pub fn basis_url(&self) -> &str {
        &self.basis_url
    }

    /// Tauscht das Token aus (z.B. nach erneuter Anmeldung)
    pub fn token_setzen(&mut self, token: String) {
        self.token = Some(token);
    }

    fn url(&self, pfad: &str) -> String {
        format!("{}{}", self.basis_url, pfad)
    }

    fn mit_auth(&self, anfrage: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => anfrage.bearer_auth(token),
            None => anfrage,
        }
    }

    fn get(&self, pfad: &str) -> RequestBuilder {
        self.mit_auth(self.http.get(self.url(pfad)))
    }

    fn post(&self, pfad: &str) -> RequestBuilder {
        self.mit_auth(self.http.post(self.url(pfad)))
    }

    fn delete(&self, pfad: &str) -> RequestBuilder {
        self.mit_auth(self.http.delete(self.url(pfad)))
    }
}

/// Ordnet Fehler-Statuscodes einem [`ApiError`] zu
async fn status_pruefen(antwort: Response) -> ApiResult<Response> {
    let status = antwort.status().as_u16();
    match status {
        200..=299 => Ok(antwort),
        401 => Err(ApiError::NichtAutorisiert),
        403 => Err(ApiError::Verboten(antwort.text().await.unwrap_or_default())),
        404 => Err(ApiError::NichtGefunden(antwort.text().await.unwrap_or_default())),
        _ => {
            let body = antwort.text().await.unwrap_or_default();
            Err(ApiError::Server { status, body })
        }
    }
}

async fn json_lesen<T: DeserializeOwned>(antwort: Response) -> ApiResult<T> {
    Ok(status_pruefen(antwort).await?.json().await?)
}

async fn nur_status(antwort: Response) -> ApiResult<()> {
    status_pruefen(antwort).await.map(|_| ())
}

impl MeetingApi for HttpMeetingApi {
    async fn meeting_abrufen(&self, id: &MeetingId) -> ApiResult<MeetingInfo> {
        let antwort = self.get(&format!("/meetings/{id}")).send().await?;
        json_lesen(antwort).await
    }

    async fn beitreten(&self, id: &MeetingId) -> ApiResult<()> {
        let antwort = self.post(&format!("/meetings/{id}/join")).send().await?;
        nur_status(antwort).await
    }

    async fn verlassen(&self, id: &MeetingId) -> ApiResult<()> {
        let antwort = self.post(&format!("/meetings/{id}/leave")).send().await?;
        nur_status(antwort).await
    }

    async fn beenden(&self, id: &MeetingId) -> ApiResult<()> {
        let antwort = self.delete(&format!("/meetings/{id}")).send().await?;
        nur_status(antwort).await
    }

    async fn einladen(&self, id: &MeetingId, benutzer: &[ParticipantId]) -> ApiResult<()> {
        let anfrage = EinladungsAnfrage {
            user_ids: benutzer.to_vec(),
        };
        let antwort = self
            .post(&format!("/meetings/{id}/invite"))
            .json(&anfrage)
            .send()
            .await?;
        nur_status(antwort).await
    }

    async fn benutzer_auflisten(&self) -> ApiResult<Vec<Benutzer>> {
        let antwort = self.get("/users/all").send().await?;
        json_lesen(antwort).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> HttpMeetingApi {
        HttpMeetingApi::neu(
            &format!("{}/api", server.uri()),
            Some("tok-123".into()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn mid() -> MeetingId {
        MeetingId::neu("m-1").unwrap()
    }

    #[tokio::test]
    async fn meeting_abrufen_mit_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/meetings/m-1"))
            .and(header("authorization", "Bearer tok-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "m-1",
                "title": "Weekly",
                "hostId": "u-1",
                "duration": 45,
                "status": "SCHEDULED",
                "participants": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let info = client(&server).meeting_abrufen(&mid()).await.unwrap();
        assert_eq!(info.title, "Weekly");
        assert_eq!(info.duration, Some(45));
    }

    #[tokio::test]
    async fn beitreten_verlassen_beenden() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/meetings/m-1/join"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/meetings/m-1/leave"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/meetings/m-1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let api = client(&server);
        api.beitreten(&mid()).await.unwrap();
        api.verlassen(&mid()).await.unwrap();
        api.beenden(&mid()).await.unwrap();
    }

    #[tokio::test]
    async fn einladen_sendet_user_ids() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/meetings/m-1/invite"))
            .and(body_json(json!({"userIds": ["u-2", "u-3"]})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client(&server)
            .einladen(&mid(), &["u-2".into(), "u-3".into()])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn benutzer_auflisten() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/users/all"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "u-1", "name": "Alice", "email": "a@x.de", "department": "IT", "role": "ADMIN"},
                {"id": "u-2", "name": "Bob", "email": "b@x.de", "department": "Ops", "role": "EMPLOYEE"}
            ])))
            .mount(&server)
            .await;

        let benutzer = client(&server).benutzer_auflisten().await.unwrap();
        assert_eq!(benutzer.len(), 2);
        assert!(benutzer[0].role.ist_admin());
    }

    #[tokio::test]
    async fn status_401_wird_nicht_autorisiert() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "token expired"})))
            .mount(&server)
            .await;

        let e = client(&server).meeting_abrufen(&mid()).await.unwrap_err();
        assert!(matches!(e, ApiError::NichtAutorisiert));
    }

    #[tokio::test]
    async fn serverfehler_enthaelt_status_und_body() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(500).set_body_string("kaputt"))
            .mount(&server)
            .await;

        match client(&server).beenden(&mid()).await.unwrap_err() {
            ApiError::Server { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "kaputt");
            }
            andere => panic!("unerwarteter Fehler: {andere}"),
        }
    }

    #[test]
    fn leere_url_wird_abgelehnt() {
        assert!(matches!(
            HttpMeetingApi::neu(" ", None, Duration::from_secs(1)),
            Err(ApiError::Konfiguration(_))
        ));
    }
}
