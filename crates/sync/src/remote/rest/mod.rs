//! HTTP implementation of [`RemoteStore`] for the hosted backend.
//!
//! The platform exposes three HTTP surfaces under one project URL:
//!
//! - `rest/v1/<table>` - PostgREST-style table access
//! - `auth/v1/token` - password sign-in
//! - `storage/v1/object/<bucket>/<name>` - object storage
//!
//! Every request carries the `apikey` header plus a bearer token. Writes ask
//! for `Prefer: return=representation` so the stored row comes back.

mod conversions;
mod rows;

use async_trait::async_trait;
use autosalon_core::{
    Car, CarId, ChatMessage, Email, FavoriteOwner, FavoriteSet, NewMessage, NewOrder, Order,
    OrderId, OrderStatus,
};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use super::{AuthSession, IMAGE_BUCKET, MAX_IMAGE_BYTES, RemoteConfig, RemoteStore};
use crate::error::RemoteError;

use conversions::{car_to_row, convert_car, convert_order, convert_session, new_order_to_row};
use rows::{
    CarRow, ErrorBody, FavoriteRow, NewMessageRow, OrderRow, OrderStatusPatch, TokenResponse,
};

/// Embedded car projection requested with every order query.
const ORDER_SELECT: &str = "*,vehicles(id,brand,model,images)";

const RETURN_REPRESENTATION: &str = "return=representation";
const UPSERT_PREFERENCE: &str = "resolution=merge-duplicates,return=representation";

/// Build a `reqwest` client that authenticates every request with `key`.
///
/// # Errors
///
/// Returns an error if the key is not a valid header value or the client
/// fails to build.
pub(crate) fn authenticated_client(
    key: &SecretString,
    timeout: std::time::Duration,
) -> Result<reqwest::Client, RemoteError> {
    let mut headers = HeaderMap::new();

    let mut api_key = HeaderValue::from_str(key.expose_secret())
        .map_err(|e| RemoteError::Decode(format!("invalid API key format: {e}")))?;
    api_key.set_sensitive(true);
    headers.insert("apikey", api_key);

    let mut bearer = HeaderValue::from_str(&format!("Bearer {}", key.expose_secret()))
        .map_err(|e| RemoteError::Decode(format!("invalid API key format: {e}")))?;
    bearer.set_sensitive(true);
    headers.insert(AUTHORIZATION, bearer);

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .map_err(RemoteError::from)
}

/// Turn a non-success response into a [`RemoteError`].
pub(crate) async fn error_from_response(response: Response) -> RemoteError {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(1);
        return RemoteError::RateLimited(retry_after);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(|body| body.message)
        .unwrap_or_else(|| text.chars().take(200).collect());

    if status.is_server_error() {
        tracing::error!(status = %status, message = %message, "Backend returned server error");
    }

    RemoteError::Rejected {
        status: status.as_u16(),
        message,
    }
}

/// Client for the hosted backend's REST, auth and storage endpoints.
#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    /// Auth requests always use the public key.
    auth_client: reqwest::Client,
    config: RemoteConfig,
}

impl RestClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP clients fail to build.
    pub fn new(config: RemoteConfig) -> Result<Self, RemoteError> {
        let client = authenticated_client(config.api_key(), config.timeout)?;
        let auth_client = authenticated_client(&config.anon_key, config.timeout)?;
        Ok(Self {
            client,
            auth_client,
            config,
        })
    }

    fn table_url(&self, table: &str, query: &[(&str, &str)]) -> Result<Url, RemoteError> {
        let mut url = self.config.endpoint(&format!("rest/v1/{table}"))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// Send a request and decode a JSON body.
    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, RemoteError> {
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %text.chars().take(500).collect::<String>(),
                "Failed to parse backend response"
            );
            RemoteError::Decode(e.to_string())
        })
    }

    /// Send a request whose body does not matter.
    async fn send_empty(&self, request: RequestBuilder) -> Result<(), RemoteError> {
        let response = request.send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_from_response(response).await)
        }
    }

    /// Decode a representation response holding exactly one row.
    fn single<T>(rows: Vec<T>, what: &str) -> Result<T, RemoteError> {
        rows.into_iter()
            .next()
            .ok_or_else(|| RemoteError::NotFound(what.to_string()))
    }

    async fn write_car(&self, car: &Car, prefer: &str) -> Result<Car, RemoteError> {
        let url = self.table_url("vehicles", &[])?;
        let request = self
            .request(Method::POST, url)
            .header("Prefer", prefer)
            .json(&[car_to_row(car)]);
        let rows: Vec<CarRow> = self.send_json(request).await?;
        convert_car(Self::single(rows, &format!("car {}", car.id))?)
    }
}

#[async_trait]
impl RemoteStore for RestClient {
    #[instrument(skip(self))]
    async fn fetch_cars(&self) -> Result<Vec<Car>, RemoteError> {
        let url = self.table_url("vehicles", &[("select", "*"), ("order", "created_at.desc")])?;
        let rows: Vec<CarRow> = self.send_json(self.request(Method::GET, url)).await?;
        debug!(count = rows.len(), "Fetched cars");
        rows.into_iter().map(convert_car).collect()
    }

    #[instrument(skip(self, car), fields(car_id = %car.id))]
    async fn insert_car(&self, car: &Car) -> Result<Car, RemoteError> {
        self.write_car(car, RETURN_REPRESENTATION).await
    }

    #[instrument(skip(self, car), fields(car_id = %car.id))]
    async fn upsert_car(&self, car: &Car) -> Result<Car, RemoteError> {
        self.write_car(car, UPSERT_PREFERENCE).await
    }

    #[instrument(skip(self, car), fields(car_id = %car.id))]
    async fn update_car(&self, car: &Car) -> Result<Car, RemoteError> {
        let filter = format!("eq.{}", car.id);
        let url = self.table_url("vehicles", &[("id", &filter)])?;
        let request = self
            .request(Method::PATCH, url)
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&car_to_row(car));
        let rows: Vec<CarRow> = self.send_json(request).await?;
        convert_car(Self::single(rows, &format!("car {}", car.id))?)
    }

    #[instrument(skip(self))]
    async fn delete_car(&self, id: CarId) -> Result<bool, RemoteError> {
        let filter = format!("eq.{id}");
        let url = self.table_url("vehicles", &[("id", &filter), ("select", "id")])?;
        let request = self
            .request(Method::DELETE, url)
            .header("Prefer", RETURN_REPRESENTATION);
        let deleted: Vec<serde_json::Value> = self.send_json(request).await?;
        Ok(!deleted.is_empty())
    }

    #[instrument(skip(self))]
    async fn increment_views(&self, id: CarId) -> Result<(), RemoteError> {
        let url = self.config.endpoint("rest/v1/rpc/increment_car_views")?;
        let request = self
            .request(Method::POST, url)
            .json(&serde_json::json!({ "car_id": id }));
        self.send_empty(request).await
    }

    #[instrument(skip(self), fields(owner = %owner))]
    async fn fetch_favorites(&self, owner: &FavoriteOwner) -> Result<FavoriteSet, RemoteError> {
        let filter = format!("eq.{owner}");
        let url = self.table_url("favorites", &[("select", "owner_id,car_id"), ("owner_id", &filter)])?;
        let rows: Vec<FavoriteRow> = self.send_json(self.request(Method::GET, url)).await?;
        Ok(rows.into_iter().map(|row| row.car_id).collect())
    }

    #[instrument(skip(self, ids), fields(owner = %owner, count = ids.len()))]
    async fn replace_favorites(
        &self,
        owner: &FavoriteOwner,
        ids: &FavoriteSet,
    ) -> Result<(), RemoteError> {
        let filter = format!("eq.{owner}");
        let url = self.table_url("favorites", &[("owner_id", &filter)])?;
        self.send_empty(self.request(Method::DELETE, url)).await?;

        if ids.is_empty() {
            return Ok(());
        }

        let rows: Vec<FavoriteRow> = ids
            .iter()
            .map(|car_id| FavoriteRow {
                owner_id: owner.to_string(),
                car_id,
            })
            .collect();
        let url = self.table_url("favorites", &[])?;
        self.send_empty(self.request(Method::POST, url).json(&rows))
            .await
    }

    #[instrument(skip(self))]
    async fn fetch_orders(&self) -> Result<Vec<Order>, RemoteError> {
        let url = self.table_url("orders", &[("select", ORDER_SELECT), ("order", "created_at.desc")])?;
        let rows: Vec<OrderRow> = self.send_json(self.request(Method::GET, url)).await?;
        debug!(count = rows.len(), "Fetched orders");
        Ok(rows.into_iter().map(convert_order).collect())
    }

    #[instrument(skip(self, order), fields(car_id = %order.car_id))]
    async fn insert_order(&self, order: &NewOrder) -> Result<Order, RemoteError> {
        let url = self.table_url("orders", &[("select", ORDER_SELECT)])?;
        let request = self
            .request(Method::POST, url)
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&new_order_to_row(order));
        let rows: Vec<OrderRow> = self.send_json(request).await?;
        Self::single(rows, "inserted order").map(convert_order)
    }

    #[instrument(skip(self))]
    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, RemoteError> {
        let filter = format!("eq.{id}");
        let url = self.table_url("orders", &[("id", &filter), ("select", ORDER_SELECT)])?;
        let request = self
            .request(Method::PATCH, url)
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&OrderStatusPatch {
                status,
                updated_at: chrono::Utc::now(),
            });
        let rows: Vec<OrderRow> = self.send_json(request).await?;
        Self::single(rows, &format!("order {id}")).map(convert_order)
    }

    #[instrument(skip(self))]
    async fn fetch_messages(&self) -> Result<Vec<ChatMessage>, RemoteError> {
        let url = self.table_url("messages", &[("select", "*"), ("order", "created_at.asc")])?;
        self.send_json(self.request(Method::GET, url)).await
    }

    #[instrument(skip(self, message), fields(conversation = %message.conversation_id))]
    async fn insert_message(&self, message: &NewMessage) -> Result<ChatMessage, RemoteError> {
        let url = self.table_url("messages", &[])?;
        let request = self
            .request(Method::POST, url)
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&NewMessageRow {
                conversation_id: &message.conversation_id,
                sender: message.sender,
                author: &message.author,
                body: message.body.trim(),
            });
        let rows: Vec<ChatMessage> = self.send_json(request).await?;
        Self::single(rows, "inserted message")
    }

    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_in(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, RemoteError> {
        let mut url = self.config.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");

        let request = self.auth_client.post(url).json(&serde_json::json!({
            "email": email.as_str(),
            "password": password.expose_secret(),
        }));
        let token: TokenResponse = self.send_json(request).await?;
        convert_session(token)
    }

    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn upload_image(
        &self,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, RemoteError> {
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(RemoteError::PayloadTooLarge {
                size: bytes.len(),
                max: MAX_IMAGE_BYTES,
            });
        }

        let object = urlencoding::encode(name);
        let url = self
            .config
            .endpoint(&format!("storage/v1/object/{IMAGE_BUCKET}/{object}"))?;
        let request = self
            .request(Method::POST, url)
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes);
        self.send_empty(request).await?;

        let public = self
            .config
            .endpoint(&format!("storage/v1/object/public/{IMAGE_BUCKET}/{object}"))?;
        Ok(public.to_string())
    }

    async fn health(&self) -> Result<(), RemoteError> {
        let url = self.table_url("vehicles", &[("select", "id"), ("limit", "1")])?;
        self.send_empty(self.request(Method::GET, url)).await
    }
}
