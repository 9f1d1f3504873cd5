use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::{MirrorError, Result};

const SPDX_TEXT_URL: &str = "https://raw.githubusercontent.com/spdx/license-list-data/master/text";

/// Where license texts come from
pub trait LicenseSource {
    fn fetch(&self, spdx: &str) -> Result<String>;
}

/// Fetches license texts from the SPDX license list over HTTP
pub struct SpdxSource {
    agent: ureq::Agent,
    base_url: String,
}

impl SpdxSource {
    pub fn new() -> Self {
        SpdxSource {
            agent: ureq::Agent::new_with_defaults(),
            base_url: SPDX_TEXT_URL.to_string(),
        }
    }

    pub fn url(&self, spdx: &str) -> String {
        format!("{}/{}.txt", self.base_url, spdx)
    }
}

impl Default for SpdxSource {
    fn default() -> Self {
        Self::new()
    }
}

impl LicenseSource for SpdxSource {
    fn fetch(&self, spdx: &str) -> Result<String> {
        let response = self.agent.get(&self.url(spdx)).call().map_err(|e| match e {
            ureq::Error::StatusCode(404) => {
                MirrorError::license(format!("unknown SPDX identifier '{}'", spdx))
            }
            other => MirrorError::license(format!("could not fetch '{}': {}", spdx, other)),
        })?;

        response
            .into_body()
            .read_to_string()
            .map_err(|e| MirrorError::license(format!("could not read '{}': {}", spdx, e)))
    }
}

/// License texts keyed by SPDX id, each fetched at most once per run
pub struct LicenseCache<S: LicenseSource> {
    source: S,
    texts: RefCell<HashMap<String, String>>,
}

impl<S: LicenseSource> LicenseCache<S> {
    pub fn new(source: S) -> Self {
        LicenseCache {
            source,
            texts: RefCell::new(HashMap::new()),
        }
    }

    /// Text of license `spdx`, fetched on first request
    pub fn get(&self, spdx: &str) -> Result<String> {
        if spdx.trim().is_empty() {
            return Err(MirrorError::license("empty SPDX identifier"));
        }
        if let Some(text) = self.texts.borrow().get(spdx) {
            return Ok(text.clone());
        }

        let text = self.source.fetch(spdx)?;
        self.texts
            .borrow_mut()
            .insert(spdx.to_string(), text.clone());
        Ok(text)
    }

    pub fn len(&self) -> usize {
        self.texts.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.borrow().is_empty()
    }
}
