//! Paste (paste.safone.me) JSON API. The only service here with delete.

use crate::blobs::BlobBackend;
use crate::error::{Result, StoreError};
use crate::remote::client::{HttpClient, HttpSettings};
use crate::types::{BlobId, BlobRequest, DeleteOutcome};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

pub const DEFAULT_URL: &str = "https://paste.safone.me";

#[derive(Serialize)]
struct NewPaste<'a> {
    content: &'a str,
    filename: &'a str,
    language: &'a str,
    ephemeral: bool,
}

#[derive(Deserialize)]
struct NewPasteResponse {
    id: String,
}

#[derive(Deserialize)]
struct GetPasteResponse {
    content: String,
}

pub struct SafoneService {
    http: HttpClient,
}

impl SafoneService {
    pub fn new(base_url: &str, settings: &HttpSettings) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(base_url, settings)?,
        })
    }
}

impl BlobBackend for SafoneService {
    fn name(&self) -> &str {
        "Paste"
    }

    fn endpoint(&self) -> String {
        self.http.base_url().to_string()
    }

    fn create_blob(&self, request: &BlobRequest<'_>) -> Result<BlobId> {
        let body = NewPaste {
            content: request.content,
            filename: request.name,
            language: request.language,
            ephemeral: request.ephemeral,
        };

        let response: NewPasteResponse = self
            .http
            .send(self.http.post("/api/new").json(&body))?
            .json()?;

        Ok(BlobId(response.id))
    }

    fn fetch_blob(&self, id: &BlobId) -> Result<String> {
        let path = format!("/api/get/{}", id);
        let response = self.http.send(self.http.get(&path))?;

        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("application/json"))
            .unwrap_or(false);

        let body = response.text()?;
        if !is_json {
            return Ok(body);
        }

        let parsed: GetPasteResponse =
            serde_json::from_str(&body).map_err(|e| StoreError::UnexpectedResponse {
                url: self.http.url(&path),
                reason: e.to_string(),
            })?;
        Ok(parsed.content)
    }

    fn delete_blob(&self, id: &BlobId) -> Result<DeleteOutcome> {
        let response = self
            .http
            .get(&format!("/api/delete/{}", id))
            .send()?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(DeleteOutcome::NotFound);
        }
        response.error_for_status()?;
        Ok(DeleteOutcome::Deleted)
    }

    fn probe(&self) -> Result<()> {
        self.http.probe()
    }
}
