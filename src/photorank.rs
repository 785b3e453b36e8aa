//! Photorank API client.
//!
//! Resolves the customer context once, then lists recent media page by page
//! following the links the server hands back, and looks up uploaders.

use crate::error::{Error, FetchError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Minimal GET-only HTTP surface used by the client.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issue a GET with the given query parameters and return the JSON body.
    async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> std::result::Result<Value, FetchError>;
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> std::result::Result<Value, FetchError> {
        (**self).get_json(url, query).await
    }
}

/// [`HttpTransport`] backed by reqwest.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> std::result::Result<Value, FetchError> {
        let http_err = |source| FetchError::Http {
            url: url.to_string(),
            source,
        };

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(http_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(http_err)?;
        serde_json::from_slice(&bytes).map_err(|source| FetchError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

/// Every Photorank payload wraps its body in `data`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Link {
    href: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Links {
    #[serde(rename = "self", default, skip_serializing_if = "Option::is_none")]
    this: Option<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    next: Option<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    prev: Option<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    first: Option<Link>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Resource {
    #[serde(rename = "_links", default)]
    links: Links,
}

#[derive(Debug, Deserialize)]
struct RootData {
    #[serde(rename = "_embedded")]
    embedded: RootEmbedded,
}

#[derive(Debug, Deserialize)]
struct RootEmbedded {
    customer: CustomerPayload,
}

#[derive(Debug, Deserialize)]
struct CustomerPayload {
    #[serde(rename = "_embedded")]
    embedded: CustomerEmbedded,
    #[serde(flatten)]
    attributes: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct CustomerEmbedded {
    #[serde(rename = "media:recent")]
    recent: Resource,
}

/// Customer context resolved by authentication.
#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    /// Collection link for the customer's recent media.
    pub recent_media_href: String,
    pub attributes: Map<String, Value>,
}

/// Either a list of items or a lone item.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> From<OneOrMany<T>> for Vec<T> {
    fn from(value: OneOrMany<T>) -> Self {
        match value {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(value: Vec<T>) -> Self {
        OneOrMany::Many(value)
    }
}

impl From<MediaEntry> for OneOrMany<MediaEntry> {
    fn from(value: MediaEntry) -> Self {
        OneOrMany::One(value)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct MediaEmbedded {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    uploader: Option<Resource>,
}

/// One raw media item as listed by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaEntry {
    #[serde(rename = "_embedded", default)]
    embedded: MediaEmbedded,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl MediaEntry {
    /// Server identifier, rendered as text for logging.
    pub fn id(&self) -> String {
        match self.attributes.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(other) => other.to_string(),
            None => "<unknown>".to_string(),
        }
    }

    /// Link to the uploader details of this item.
    pub fn uploader_href(&self) -> Option<&str> {
        self.embedded
            .uploader
            .as_ref()
            .and_then(|u| u.links.this.as_ref())
            .map(|l| l.href.as_str())
    }
}

/// Uploader details joined onto a media item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Uploader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Set when the lookup failed and this record stands in for the real one.
    #[serde(default)]
    pub placeholder: bool,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Uploader {
    pub fn placeholder() -> Self {
        Self {
            placeholder: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct MediaPageData {
    #[serde(rename = "_embedded", default)]
    embedded: OneOrMany<MediaEntry>,
    #[serde(rename = "_links", default)]
    links: Links,
}

/// Opaque continuation pointing at another page of the same collection.
///
/// Following a cursor consumes it.
#[derive(Debug, PartialEq, Eq)]
pub struct Cursor {
    href: String,
    count: usize,
}

impl Cursor {
    fn from_link(link: Option<Link>, count: usize) -> Option<Self> {
        link.map(|l| Cursor {
            href: l.href,
            count,
        })
    }

    pub fn href(&self) -> &str {
        &self.href
    }
}

/// Cursors returned alongside a page.
#[derive(Debug, Default)]
pub struct PageLinks {
    pub next: Option<Cursor>,
    pub prev: Option<Cursor>,
    pub first: Option<Cursor>,
}

/// One page of raw media entries.
#[derive(Debug)]
pub struct MediaPage {
    pub entries: Vec<MediaEntry>,
    pub links: PageLinks,
}

/// Client for the Photorank API.
pub struct PhotorankClient<T> {
    transport: T,
    api_url: String,
    auth_token: String,
    customer: RwLock<Option<Customer>>,
}

impl<T: HttpTransport> PhotorankClient<T> {
    /// Create a client. Fails when no token is given.
    pub fn new(transport: T, api_url: impl Into<String>, auth_token: impl Into<String>) -> Result<Self> {
        let auth_token = auth_token.into();
        if auth_token.trim().is_empty() {
            return Err(Error::config("Photorank authentication token not provided"));
        }

        Ok(Self {
            transport,
            api_url: api_url.into(),
            auth_token,
            customer: RwLock::new(None),
        })
    }

    fn auth_query(&self) -> Vec<(&'static str, String)> {
        vec![("auth_token", self.auth_token.clone())]
    }

    async fn get<D: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> std::result::Result<D, FetchError> {
        tracing::debug!("GET {}", url);
        let value = self.transport.get_json(url, query).await?;
        let envelope: Envelope<D> =
            serde_json::from_value(value).map_err(|source| FetchError::Decode {
                url: url.to_string(),
                source,
            })?;
        Ok(envelope.data)
    }

    /// Resolve the customer context, hitting the network only the first time.
    pub async fn authenticate(&self) -> Result<Customer> {
        if let Some(customer) = self.customer.read().await.as_ref() {
            return Ok(customer.clone());
        }

        let mut slot = self.customer.write().await;
        // Another caller may have finished while we waited for the lock.
        if let Some(customer) = slot.as_ref() {
            return Ok(customer.clone());
        }

        tracing::info!("Authenticating against {}", self.api_url);
        let root: RootData = self
            .get(&self.api_url, &self.auth_query())
            .await
            .map_err(Error::Auth)?;

        let customer = root.embedded.customer;
        let recent_media_href = customer
            .embedded
            .recent
            .links
            .this
            .map(|l| l.href)
            .ok_or_else(|| {
                Error::Auth(FetchError::Unavailable {
                    url: self.api_url.clone(),
                    message: "customer has no recent media link".into(),
                })
            })?;

        let customer = Customer {
            recent_media_href,
            attributes: customer.attributes,
        };
        *slot = Some(customer.clone());
        Ok(customer)
    }

    /// Fetch the first page of the customer's recent media.
    pub async fn fetch_recent_media(&self, count: usize) -> Result<MediaPage> {
        let customer = self.authenticate().await?;
        self.fetch_page(&customer.recent_media_href, count).await
    }

    /// Fetch the page a cursor points at.
    pub async fn follow(&self, cursor: Cursor) -> Result<MediaPage> {
        self.fetch_page(&cursor.href, cursor.count).await
    }

    async fn fetch_page(&self, href: &str, count: usize) -> Result<MediaPage> {
        let mut query = vec![("count", count.to_string())];
        query.extend(self.auth_query());

        let data: MediaPageData = self.get(href, &query).await?;
        let links = data.links;

        Ok(MediaPage {
            entries: data.embedded.into(),
            links: PageLinks {
                next: Cursor::from_link(links.next, count),
                prev: Cursor::from_link(links.prev, count),
                first: Cursor::from_link(links.first, count),
            },
        })
    }

    /// Look up the uploader of a single media entry.
    pub async fn fetch_uploader(
        &self,
        entry: &MediaEntry,
    ) -> std::result::Result<Uploader, FetchError> {
        let Some(href) = entry.uploader_href() else {
            return Err(FetchError::Unavailable {
                url: format!("media:{}", entry.id()),
                message: "media entry has no uploader link".into(),
            });
        };

        self.get(href, &self.auth_query()).await
    }
}
