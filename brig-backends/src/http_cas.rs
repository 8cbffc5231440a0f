//! HTTP content-addressable store client: `PUT /<hash>` / `GET /<hash>`
//! / `HEAD /<hash>` against a remote blob endpoint, standing in for
//! the `ipfs`-style daemon spec.md treats as an external collaborator.
//!
//! Grounded on `infinitree-backends::s3`'s request/response shape
//! (upload bytes under an id, download by id, existence check) but
//! against a generic HTTP endpoint with `reqwest`'s blocking client
//! rather than S3 request signing, since brig's object store isn't
//! specified to be S3 and the rest of the core carries no async
//! runtime for `s3.rs`'s `tokio`-based in-flight tracking to plug into.

use brig_core::{
    hash::Hash,
    object::{BlobReader, ObjectError, ObjectStore, Result},
};
use reqwest::{blocking::Client, StatusCode};
use std::{io::Cursor, time::Duration};

#[derive(Clone)]
pub struct HttpCas {
    base_url: String,
    client: Client,
}

impl HttpCas {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("building the HTTP client");
        HttpCas {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    fn url_for(&self, hash: &Hash) -> String {
        format!("{}/{}", self.base_url, hash)
    }

    fn unavailable(e: reqwest::Error) -> ObjectError {
        ObjectError::StoreUnavailable(e.to_string())
    }
}

impl ObjectStore for HttpCas {
    fn put(&self, hash: &Hash, blob: &[u8]) -> Result<()> {
        let response = self
            .client
            .put(self.url_for(hash))
            .body(blob.to_vec())
            .send()
            .map_err(Self::unavailable)?;

        if response.status().is_success() {
            tracing::debug!(%hash, bytes = blob.len(), "uploaded blob to HTTP CAS");
            Ok(())
        } else {
            Err(ObjectError::StoreUnavailable(format!(
                "PUT {} returned {}",
                hash,
                response.status()
            )))
        }
    }

    fn get(&self, hash: &Hash) -> Result<Box<dyn BlobReader>> {
        let response = self
            .client
            .get(self.url_for(hash))
            .send()
            .map_err(Self::unavailable)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ObjectError::BlobMissing(*hash));
        }
        if !response.status().is_success() {
            return Err(ObjectError::StoreUnavailable(format!(
                "GET {} returned {}",
                hash,
                response.status()
            )));
        }

        let bytes = response.bytes().map_err(Self::unavailable)?;
        tracing::debug!(%hash, bytes = bytes.len(), "downloaded blob from HTTP CAS");
        Ok(Box::new(Cursor::new(bytes.to_vec())))
    }

    fn has(&self, hash: &Hash) -> Result<bool> {
        let response = self
            .client
            .head(self.url_for(hash))
            .send()
            .map_err(Self::unavailable)?;
        Ok(response.status().is_success())
    }
}
