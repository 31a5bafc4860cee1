//! Hastebin documents API.

use crate::blobs::BlobBackend;
use crate::error::Result;
use crate::remote::client::{HttpClient, HttpSettings};
use crate::types::{BlobId, BlobRequest};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;

pub const DEFAULT_URL: &str = "https://hastebin.com";

#[derive(Deserialize)]
struct DocumentResponse {
    key: String,
}

pub struct HastebinService {
    http: HttpClient,
}

impl HastebinService {
    pub fn new(base_url: &str, settings: &HttpSettings) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(base_url, settings)?,
        })
    }
}

impl BlobBackend for HastebinService {
    fn name(&self) -> &str {
        "Hastebin"
    }

    fn endpoint(&self) -> String {
        self.http.base_url().to_string()
    }

    fn create_blob(&self, request: &BlobRequest<'_>) -> Result<BlobId> {
        let builder = self
            .http
            .post("/documents")
            .header(CONTENT_TYPE, "text/plain")
            .body(request.content.to_string());

        let response: DocumentResponse = self.http.send(builder)?.json()?;
        Ok(BlobId(response.key))
    }

    fn fetch_blob(&self, id: &BlobId) -> Result<String> {
        self.http.get_text(&format!("/raw/{}", id))
    }

    fn probe(&self) -> Result<()> {
        self.http.probe()
    }
}
