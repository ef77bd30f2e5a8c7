//! Braintree GraphQL API client.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use domain::{Money, PaymentResult};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{ClientToken, PaymentGateway, SaleRequest};
use crate::error::GatewayError;

const SANDBOX_URL: &str = "https://payments.sandbox.braintree-api.com/graphql";
const PRODUCTION_URL: &str = "https://payments.braintree-api.com/graphql";
const API_VERSION: &str = "2019-01-01";

const CLIENT_TOKEN_MUTATION: &str = "mutation ClientToken { createClientToken { clientToken } }";

const CHARGE_MUTATION: &str = "mutation Charge($input: ChargePaymentMethodInput!) { \
     chargePaymentMethod(input: $input) { \
     transaction { id status amount { value currencyCode } } } }";

const AUTHORIZE_MUTATION: &str = "mutation Authorize($input: AuthorizePaymentMethodInput!) { \
     authorizePaymentMethod(input: $input) { \
     transaction { id status amount { value currencyCode } } } }";

/// Transaction statuses that mean the sale went through.
const ACCEPTED_STATUSES: &[&str] = &[
    "AUTHORIZED",
    "SUBMITTED_FOR_SETTLEMENT",
    "SETTLING",
    "SETTLEMENT_PENDING",
    "SETTLED",
];

/// Braintree environment selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BraintreeEnvironment {
    #[default]
    Sandbox,
    Production,
}

impl BraintreeEnvironment {
    pub fn graphql_url(&self) -> &'static str {
        match self {
            BraintreeEnvironment::Sandbox => SANDBOX_URL,
            BraintreeEnvironment::Production => PRODUCTION_URL,
        }
    }
}

impl FromStr for BraintreeEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sandbox" => Ok(BraintreeEnvironment::Sandbox),
            "production" => Ok(BraintreeEnvironment::Production),
            other => Err(format!("unknown Braintree environment: {other}")),
        }
    }
}

/// Merchant credentials and connection settings.
#[derive(Clone)]
pub struct BraintreeConfig {
    pub environment: BraintreeEnvironment,
    pub merchant_id: String,
    pub public_key: String,
    pub private_key: String,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for BraintreeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BraintreeConfig")
            .field("environment", &self.environment)
            .field("merchant_id", &self.merchant_id)
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Payment gateway backed by the Braintree GraphQL API.
#[derive(Clone)]
pub struct BraintreeGateway {
    endpoint: String,
    config: BraintreeConfig,
    client: reqwest::Client,
}

impl BraintreeGateway {
    /// Creates a client for the configured environment.
    pub fn new(config: BraintreeConfig) -> Result<Self, GatewayError> {
        let endpoint = config.environment.graphql_url().to_string();
        Self::with_endpoint(config, endpoint)
    }

    /// Creates a client that talks to an explicit GraphQL endpoint.
    ///
    /// Fails when the HTTP client cannot be built with the configured
    /// timeout.
    pub fn with_endpoint(
        config: BraintreeConfig,
        endpoint: impl Into<String>,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GatewayError::Transport(format!("failed to build HTTP client: {e}")))?;
        tracing::info!(
            merchant_id = %config.merchant_id,
            environment = ?config.environment,
            timeout_ms = config.request_timeout.as_millis() as u64,
            "Braintree gateway configured"
        );
        Ok(Self {
            endpoint: endpoint.into(),
            config,
            client,
        })
    }

    async fn execute(&self, query: &str, variables: Value) -> Result<Value, GatewayError> {
        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.config.public_key, Some(&self.config.private_key))
            .header("Braintree-Version", API_VERSION)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status, body));
        }

        let payload: GraphQlResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        if let Some(error) = payload.errors.into_iter().next() {
            return Err(error.into_gateway_error());
        }

        payload
            .data
            .ok_or_else(|| GatewayError::InvalidResponse("response has no data".to_string()))
    }

    fn map_send_error(&self, error: reqwest::Error) -> GatewayError {
        if error.is_connect() {
            GatewayError::Unavailable(error.to_string())
        } else if error.is_timeout() {
            GatewayError::Timeout(self.config.request_timeout)
        } else {
            GatewayError::Transport(error.to_string())
        }
    }
}

fn map_status(status: StatusCode, body: String) -> GatewayError {
    let message = format!("Braintree returned {status}: {body}");
    match status {
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => {
            GatewayError::Unavailable(message)
        }
        s if s.is_server_error() => GatewayError::Transport(message),
        _ => GatewayError::Rejected(message),
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
    #[serde(default)]
    extensions: Option<GraphQlErrorExtensions>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphQlErrorExtensions {
    error_class: Option<String>,
}

impl GraphQlError {
    fn into_gateway_error(self) -> GatewayError {
        let class = self
            .extensions
            .and_then(|ext| ext.error_class)
            .unwrap_or_default();
        match class.as_str() {
            "VALIDATION" => GatewayError::Declined {
                reason: self.message,
            },
            "AUTHENTICATION" | "AUTHORIZATION" | "NOT_FOUND" | "UNSUPPORTED_CLIENT" => {
                GatewayError::Rejected(self.message)
            }
            "SERVICE_AVAILABILITY" | "RESOURCE_LIMIT" => GatewayError::Unavailable(self.message),
            _ => GatewayError::Transport(self.message),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Transaction {
    id: String,
    status: String,
    amount: Option<TransactionAmount>,
}

#[derive(Debug, Deserialize)]
struct TransactionAmount {
    value: String,
}

#[async_trait]
impl PaymentGateway for BraintreeGateway {
    #[tracing::instrument(skip(self))]
    async fn generate_client_token(&self) -> Result<ClientToken, GatewayError> {
        let data = self.execute(CLIENT_TOKEN_MUTATION, json!({})).await?;
        data.pointer("/createClientToken/clientToken")
            .and_then(Value::as_str)
            .map(ClientToken::new)
            .ok_or_else(|| GatewayError::InvalidResponse("missing clientToken".to_string()))
    }

    #[tracing::instrument(skip(self, request), fields(amount = %request.amount))]
    async fn sale(&self, request: SaleRequest) -> Result<PaymentResult, GatewayError> {
        let (query, field) = if request.settle_immediately {
            (CHARGE_MUTATION, "chargePaymentMethod")
        } else {
            (AUTHORIZE_MUTATION, "authorizePaymentMethod")
        };
        let variables = json!({
            "input": {
                "paymentMethodId": request.payment_token,
                "transaction": { "amount": request.amount.to_string() },
            }
        });

        let data = self.execute(query, variables).await?;
        let raw = data
            .get(field)
            .and_then(|payload| payload.get("transaction"))
            .cloned()
            .ok_or_else(|| GatewayError::InvalidResponse(format!("missing {field}.transaction")))?;
        let transaction: Transaction = serde_json::from_value(raw.clone())
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        if !ACCEPTED_STATUSES.contains(&transaction.status.as_str()) {
            return Err(GatewayError::Declined {
                reason: transaction.status,
            });
        }

        let amount = match transaction.amount {
            Some(amount) => Money::from_str(&amount.value)
                .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?,
            None => request.amount,
        };

        Ok(PaymentResult {
            transaction_id: transaction.id,
            amount,
            status: transaction.status,
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode as HttpStatus};
    use axum::routing::post;
    use axum::{Json, Router};

    async fn spawn_graphql_server<F>(respond: F) -> String
    where
        F: Fn(HeaderMap, Value) -> (HttpStatus, Value) + Clone + Send + Sync + 'static,
    {
        let app = Router::new().route(
            "/graphql",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let respond = respond.clone();
                async move {
                    let (status, body) = respond(headers, body);
                    (status, Json(body))
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        format!("http://{addr}/graphql")
    }

    fn config() -> BraintreeConfig {
        BraintreeConfig {
            environment: BraintreeEnvironment::Sandbox,
            merchant_id: "merchant".to_string(),
            public_key: "public".to_string(),
            private_key: "private".to_string(),
            request_timeout: Duration::from_secs(5),
        }
    }

    fn sale() -> SaleRequest {
        SaleRequest::settle(Money::from_cents(2000), "fake-valid-nonce")
    }

    #[tokio::test]
    async fn generates_client_token() {
        let endpoint = spawn_graphql_server(|headers, body| {
            assert!(headers.contains_key("authorization"));
            assert_eq!(headers["braintree-version"], API_VERSION);
            assert!(body["query"].as_str().unwrap().contains("createClientToken"));
            (
                HttpStatus::OK,
                json!({ "data": { "createClientToken": { "clientToken": "tok-123" } } }),
            )
        })
        .await;
        let gateway = BraintreeGateway::with_endpoint(config(), endpoint).unwrap();

        let token = gateway.generate_client_token().await.unwrap();
        assert_eq!(token.as_str(), "tok-123");
    }

    #[tokio::test]
    async fn charge_submits_amount_and_parses_transaction() {
        let endpoint = spawn_graphql_server(|_, body| {
            assert_eq!(body["variables"]["input"]["transaction"]["amount"], "20.00");
            assert_eq!(body["variables"]["input"]["paymentMethodId"], "fake-valid-nonce");
            (
                HttpStatus::OK,
                json!({ "data": { "chargePaymentMethod": { "transaction": {
                    "id": "dHJhbnNhY3Rpb25fYWJj",
                    "status": "SUBMITTED_FOR_SETTLEMENT",
                    "amount": { "value": "20.00", "currencyCode": "USD" }
                } } } }),
            )
        })
        .await;
        let gateway = BraintreeGateway::with_endpoint(config(), endpoint).unwrap();

        let result = gateway.sale(sale()).await.unwrap();
        assert_eq!(result.transaction_id, "dHJhbnNhY3Rpb25fYWJj");
        assert_eq!(result.amount, Money::from_cents(2000));
        assert_eq!(result.status, "SUBMITTED_FOR_SETTLEMENT");
        assert_eq!(result.raw["id"], "dHJhbnNhY3Rpb25fYWJj");
    }

    #[tokio::test]
    async fn authorize_only_uses_authorize_mutation() {
        let endpoint = spawn_graphql_server(|_, body| {
            assert!(body["query"].as_str().unwrap().contains("authorizePaymentMethod"));
            (
                HttpStatus::OK,
                json!({ "data": { "authorizePaymentMethod": { "transaction": {
                    "id": "txn", "status": "AUTHORIZED"
                } } } }),
            )
        })
        .await;
        let gateway = BraintreeGateway::with_endpoint(config(), endpoint).unwrap();
        let mut request = sale();
        request.settle_immediately = false;

        let result = gateway.sale(request).await.unwrap();
        assert_eq!(result.status, "AUTHORIZED");
        assert_eq!(result.amount, Money::from_cents(2000));
    }

    #[tokio::test]
    async fn processor_decline_status_maps_to_declined() {
        let endpoint = spawn_graphql_server(|_, _| {
            (
                HttpStatus::OK,
                json!({ "data": { "chargePaymentMethod": { "transaction": {
                    "id": "txn", "status": "PROCESSOR_DECLINED"
                } } } }),
            )
        })
        .await;
        let gateway = BraintreeGateway::with_endpoint(config(), endpoint).unwrap();

        let result = gateway.sale(sale()).await;
        assert_eq!(
            result.unwrap_err(),
            GatewayError::Declined {
                reason: "PROCESSOR_DECLINED".to_string()
            }
        );
    }

    #[tokio::test]
    async fn validation_error_maps_to_declined() {
        let endpoint = spawn_graphql_server(|_, _| {
            (
                HttpStatus::OK,
                json!({
                    "data": { "chargePaymentMethod": null },
                    "errors": [{
                        "message": "Unknown or expired payment method ID.",
                        "extensions": { "errorClass": "VALIDATION" }
                    }]
                }),
            )
        })
        .await;
        let gateway = BraintreeGateway::with_endpoint(config(), endpoint).unwrap();

        let result = gateway.sale(sale()).await;
        assert!(matches!(result, Err(GatewayError::Declined { .. })));
    }

    #[tokio::test]
    async fn authentication_error_maps_to_rejected() {
        let endpoint = spawn_graphql_server(|_, _| {
            (
                HttpStatus::OK,
                json!({ "errors": [{
                    "message": "Authentication credentials are invalid",
                    "extensions": { "errorClass": "AUTHENTICATION" }
                }] }),
            )
        })
        .await;
        let gateway = BraintreeGateway::with_endpoint(config(), endpoint).unwrap();

        let result = gateway.generate_client_token().await;
        assert!(matches!(result, Err(GatewayError::Rejected(_))));
    }

    #[tokio::test]
    async fn service_unavailable_is_transient() {
        let endpoint = spawn_graphql_server(|_, _| {
            (HttpStatus::SERVICE_UNAVAILABLE, json!({ "message": "down" }))
        })
        .await;
        let gateway = BraintreeGateway::with_endpoint(config(), endpoint).unwrap();

        let err = gateway.sale(sale()).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn internal_server_error_is_outcome_unknown() {
        let endpoint = spawn_graphql_server(|_, _| {
            (HttpStatus::INTERNAL_SERVER_ERROR, json!({ "message": "boom" }))
        })
        .await;
        let gateway = BraintreeGateway::with_endpoint(config(), endpoint).unwrap();

        let err = gateway.sale(sale()).await.unwrap_err();
        assert!(err.outcome_unknown());
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn slow_response_hits_configured_timeout() {
        let app = Router::new().route(
            "/graphql",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({ "data": null }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let mut config = config();
        config.request_timeout = Duration::from_millis(100);
        let gateway =
            BraintreeGateway::with_endpoint(config, format!("http://{addr}/graphql")).unwrap();

        let err = gateway.sale(sale()).await.unwrap_err();
        assert_eq!(err, GatewayError::Timeout(Duration::from_millis(100)));
        assert!(err.outcome_unknown());
    }

    #[test]
    fn environment_parsing() {
        assert_eq!(
            "Production".parse::<BraintreeEnvironment>().unwrap(),
            BraintreeEnvironment::Production
        );
        assert_eq!(
            "sandbox".parse::<BraintreeEnvironment>().unwrap().graphql_url(),
            SANDBOX_URL
        );
        assert!("staging".parse::<BraintreeEnvironment>().is_err());
    }

    #[test]
    fn config_debug_hides_private_key() {
        let rendered = format!("{:?}", config());
        assert!(!rendered.contains("\"private\""));
    }
}
