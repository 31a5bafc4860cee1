//! dpaste.org v2 API.

use crate::blobs::BlobBackend;
use crate::error::{Result, StoreError};
use crate::remote::client::{HttpClient, HttpSettings};
use crate::types::{BlobId, BlobRequest};
use url::Url;

pub const DEFAULT_URL: &str = "https://dpaste.org";

/// Days before a paste expires.
const EXPIRY_DAYS: &str = "365";

pub struct DPasteService {
    http: HttpClient,
}

impl DPasteService {
    pub fn new(base_url: &str, settings: &HttpSettings) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(base_url, settings)?,
        })
    }
}

/// dpaste answers an upload with the paste URL; the id is its last segment.
pub(crate) fn paste_id_from_url(body: &str) -> Option<BlobId> {
    let url = Url::parse(body.trim()).ok()?;
    url.path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(BlobId::from)
}

impl BlobBackend for DPasteService {
    fn name(&self) -> &str {
        "DPaste"
    }

    fn endpoint(&self) -> String {
        self.http.base_url().to_string()
    }

    fn create_blob(&self, request: &BlobRequest<'_>) -> Result<BlobId> {
        let mut form = vec![
            ("content", request.content),
            ("syntax", request.language),
            ("expiry_days", EXPIRY_DAYS),
        ];
        if !request.name.is_empty() {
            form.push(("title", request.name));
        }

        let body = self
            .http
            .send(self.http.post("/api/v2/").form(&form))?
            .text()?;

        paste_id_from_url(&body).ok_or_else(|| StoreError::UnexpectedResponse {
            url: self.http.url("/api/v2/"),
            reason: format!("no paste URL in response: {}", body.trim()),
        })
    }

    fn fetch_blob(&self, id: &BlobId) -> Result<String> {
        self.http.get_text(&format!("/{}.txt", id))
    }

    fn probe(&self) -> Result<()> {
        self.http.probe()
    }
}
