//! HTTP/JSON transport for the broker daemon's RPC gateway

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Certificate, Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::core::{
    BrokerConfig, CapacityQuote, CapacityService, Error, Market, Order, OrderRequest,
    OrderService, Result,
};
use crate::rpc::model::*;

/// Broker daemon reached over its authenticated HTTP gateway
pub struct RestBroker {
    client: Client,
    base_url: Url,
    credentials: Option<(String, String)>,
}

impl RestBroker {
    /// Validate `config` and build the underlying HTTP client. No request is sent.
    pub fn new(config: &BrokerConfig) -> Result<Self> {
        config.validate()?;

        let base_url = Url::parse(&config.base_url()).map_err(|e| {
            Error::Config(format!("Invalid broker address {:?}: {}", config.address, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!("Invalid broker address {:?}", config.address)));
        }

        // The daemon is dialled directly, never through an HTTP proxy
        let mut builder = Client::builder().timeout(config.deadline()).no_proxy();
        if let Some(path) = &config.cert_path {
            let pem = std::fs::read(path).map_err(|e| {
                Error::Config(format!("Failed to read cert {}: {}", path.display(), e))
            })?;
            builder = builder.add_root_certificate(Certificate::from_pem(&pem)?);
        }

        let credentials = if config.disable_auth {
            None
        } else {
            match (&config.username, &config.password) {
                (Some(user), Some(pass)) => Some((user.clone(), pass.clone())),
                (None, _) => return Err(Error::AuthConfigMissing("username")),
                (_, None) => return Err(Error::AuthConfigMissing("password")),
            }
        };

        Ok(Self {
            client: builder.build()?,
            base_url,
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Gateway URL with each segment percent-encoded as a single path component
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// URL of one block order. Ids that would resolve to another resource are rejected.
    fn order_url(&self, order_id: &str) -> Result<Url> {
        if matches!(order_id, "" | "." | "..") {
            return Err(Error::InvalidArgument(format!(
                "invalid order id {:?}",
                order_id
            )));
        }
        Ok(self.endpoint(&["v1", "block_orders", order_id]))
    }

    fn request(&self, method: Method, url: Url, deadline: Duration) -> RequestBuilder {
        let req = self.client.request(method, url).timeout(deadline);
        match &self.credentials {
            Some((user, pass)) => req.basic_auth(user, Some(pass)),
            None => req,
        }
    }

    async fn send(
        &self,
        req: RequestBuilder,
        method: &'static str,
        deadline: Duration,
    ) -> Result<Response> {
        debug!(method, "broker request");
        let resp = req
            .send()
            .await
            .map_err(|e| transport_error(e, method, deadline))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let txt = resp.text().await.unwrap_or_default();
            return Err(Error::RemoteUnavailable(format!(
                "{} returned {}: {}",
                method, status, txt
            )));
        }

        Ok(resp)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        method: &'static str,
        deadline: Duration,
    ) -> Result<T> {
        let body = self
            .send(req, method, deadline)
            .await?
            .text()
            .await
            .map_err(|e| transport_error(e, method, deadline))?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Timeouts become `DeadlineExceeded` whether they hit the headers or the body
fn transport_error(e: reqwest::Error, method: &'static str, deadline: Duration) -> Error {
    if e.is_timeout() {
        Error::DeadlineExceeded { method, deadline }
    } else {
        Error::Network(e)
    }
}

#[async_trait]
impl OrderService for RestBroker {
    async fn get_orders(&self, market: &Market, deadline: Duration) -> Result<Vec<Order>> {
        let url = self.endpoint(&["v1", "block_orders"]);
        let req = self
            .request(Method::GET, url, deadline)
            .query(&[("market", market.as_str())]);
        let resp: BlockOrdersResponse = self.send_json(req, "getBlockOrders", deadline).await?;

        resp.block_orders.into_iter().map(Order::try_from).collect()
    }

    async fn get_order(&self, order_id: &str, deadline: Duration) -> Result<Order> {
        let req = self.request(Method::GET, self.order_url(order_id)?, deadline);
        let wire: BlockOrder = self.send_json(req, "getBlockOrder", deadline).await?;

        Order::try_from(wire)
    }

    async fn create_order(&self, request: &OrderRequest, deadline: Duration) -> Result<String> {
        let body = CreateBlockOrderRequest::from(request);
        let url = self.endpoint(&["v1", "block_orders"]);
        let req = self.request(Method::POST, url, deadline).json(&body);
        let resp: CreateBlockOrderResponse =
            self.send_json(req, "createBlockOrder", deadline).await?;

        Ok(resp.block_order_id)
    }

    async fn cancel_order(&self, order_id: &str, deadline: Duration) -> Result<()> {
        let req = self.request(Method::DELETE, self.order_url(order_id)?, deadline);
        self.send(req, "cancelBlockOrder", deadline).await?;
        Ok(())
    }
}

#[async_trait]
impl CapacityService for RestBroker {
    async fn get_trading_capacity(
        &self,
        market: &Market,
        deadline: Duration,
    ) -> Result<CapacityQuote> {
        let url = self.endpoint(&["v1", "trading_capacities"]);
        let req = self
            .request(Method::GET, url, deadline)
            .query(&[("market", market.as_str())]);
        let resp: TradingCapacitiesResponse =
            self.send_json(req, "getTradingCapacities", deadline).await?;

        resp.into_quote(market)
    }
}
