//! paste.ee through its web submit form.

use crate::blobs::BlobBackend;
use crate::error::{Result, StoreError};
use crate::remote::client::{HttpClient, HttpSettings};
use crate::types::{BlobId, BlobRequest};
use regex::Regex;
use std::sync::OnceLock;

pub const DEFAULT_URL: &str = "https://paste.ee";

const EXPIRE: &str = "1year";

pub struct PasteEeService {
    http: HttpClient,
}

impl PasteEeService {
    pub fn new(base_url: &str, settings: &HttpSettings) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(base_url, settings)?,
        })
    }
}

/// The submit page links to the new paste as `paste.ee/p/<id>`.
pub(crate) fn paste_id_from_page(body: &str) -> Option<BlobId> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN
        .get_or_init(|| Regex::new(r"paste\.ee/p/([a-zA-Z0-9]+)").expect("valid paste id pattern"));

    pattern
        .captures(body)
        .and_then(|captures| captures.get(1))
        .map(|m| BlobId::from(m.as_str()))
}

impl BlobBackend for PasteEeService {
    fn name(&self) -> &str {
        "Paste.ee"
    }

    fn endpoint(&self) -> String {
        self.http.base_url().to_string()
    }

    fn create_blob(&self, request: &BlobRequest<'_>) -> Result<BlobId> {
        let form = [
            ("paste", request.content),
            ("language", request.language),
            ("expire", EXPIRE),
        ];

        let body = self
            .http
            .send(self.http.post("/submit").form(&form))?
            .text()?;

        paste_id_from_page(&body).ok_or_else(|| StoreError::UnexpectedResponse {
            url: self.http.url("/submit"),
            reason: "could not find the paste id in the response".into(),
        })
    }

    fn fetch_blob(&self, id: &BlobId) -> Result<String> {
        self.http.get_text(&format!("/r/{}", id))
    }

    fn probe(&self) -> Result<()> {
        self.http.probe()
    }
}
