//! Test helpers: simulated stores and a recording sleeper

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use migrator::services::CommerceClient;
use migrator::{RateGovernor, Sleeper};
use shared::StoreCredential;

use super::fixtures::TestFixtures;

/// Sleeper that returns immediately and remembers every requested delay
#[derive(Default)]
pub struct RecordingSleeper {
    calls: Mutex<Vec<Duration>>,
}

#[allow(dead_code)]
impl RecordingSleeper {
    pub fn calls(&self) -> Vec<Duration> {
        self.calls.lock().unwrap().clone()
    }

    pub fn slept_at_least(&self, duration: Duration) -> bool {
        self.calls().iter().any(|call| *call >= duration)
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.calls.lock().unwrap().push(duration);
    }
}

/// A store simulated on a local HTTP server
pub struct StoreSim {
    pub server: MockServer,
}

#[allow(dead_code)]
impl StoreSim {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/admin/api/{}", self.server.uri(), TestFixtures::API_VERSION)
    }

    pub fn credential(&self, token: &str) -> StoreCredential {
        StoreCredential::new(self.endpoint(), token).unwrap()
    }

    pub fn client(&self, token: &str, sleeper: Arc<dyn Sleeper>) -> CommerceClient {
        CommerceClient::new(self.credential(token), RateGovernor::default(), sleeper).unwrap()
    }

    fn api_path(resource: &str) -> String {
        format!("/admin/api/{}/{}", TestFixtures::API_VERSION, resource)
    }

    pub async fn mount_products(&self, body: Value) {
        Mock::given(method("GET"))
            .and(path(Self::api_path("products.json")))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-Shopify-Shop-Api-Call-Limit", "1/40")
                    .set_body_json(body),
            )
            .mount(&self.server)
            .await;
    }

    pub async fn mount_failing_products(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path(Self::api_path("products.json")))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({"errors": "Internal Server Error"})))
            .mount(&self.server)
            .await;
    }

    /// Serve `pages` of orders linked by `page_info` tokens
    pub async fn mount_order_pages(&self, pages: Vec<Vec<Value>>) {
        let count = pages.len();
        for (index, orders) in pages.into_iter().enumerate() {
            let mut response = ResponseTemplate::new(200)
                .insert_header("X-Shopify-Shop-Api-Call-Limit", "2/40")
                .set_body_json(json!({ "orders": orders }));
            if index + 1 < count {
                let link = format!(
                    "<{}/orders.json?limit=250&page_info=page{}>; rel=\"next\"",
                    self.endpoint(),
                    index + 1
                );
                response = response.insert_header("Link", link.as_str());
            }

            let mock = Mock::given(method("GET")).and(path(Self::api_path("orders.json")));
            let mock = if index == 0 {
                mock.and(query_param("status", "any"))
            } else {
                mock.and(query_param("page_info", format!("page{index}").as_str()))
            };
            mock.respond_with(response).mount(&self.server).await;
        }
    }

    /// Fail the order page reached with `page_info=page<index>`
    pub async fn mount_failing_order_page(&self, index: usize, status: u16) {
        Mock::given(method("GET"))
            .and(path(Self::api_path("orders.json")))
            .and(query_param("page_info", format!("page{index}").as_str()))
            .respond_with(ResponseTemplate::new(status))
            .with_priority(1)
            .mount(&self.server)
            .await;
    }

    pub async fn mount_order_create(&self) {
        Mock::given(method("POST"))
            .and(path(Self::api_path("orders.json")))
            .respond_with(Self::created())
            .with_priority(10)
            .mount(&self.server)
            .await;
    }

    /// Accept `ok_first` orders, rate limit the next one, then accept the rest
    pub async fn mount_order_create_with_rate_limit(&self, ok_first: u64, retry_after: &str) {
        Mock::given(method("POST"))
            .and(path(Self::api_path("orders.json")))
            .respond_with(Self::created())
            .up_to_n_times(ok_first)
            .with_priority(1)
            .mount(&self.server)
            .await;
        Mock::given(method("POST"))
            .and(path(Self::api_path("orders.json")))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("Retry-After", retry_after)
                    .set_body_json(json!({"errors": "Exceeded 2 calls per second for api client."})),
            )
            .up_to_n_times(1)
            .with_priority(2)
            .mount(&self.server)
            .await;
        self.mount_order_create().await;
    }

    fn created() -> ResponseTemplate {
        ResponseTemplate::new(201)
            .insert_header("X-Shopify-Shop-Api-Call-Limit", "3/40")
            .set_body_json(json!({"order": {"id": 5550001, "name": "#9001"}}))
    }

    /// Bodies of every order-creation request the store received
    pub async fn created_orders(&self) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|request| request.method.to_string() == "POST")
            .filter_map(|request| serde_json::from_slice(&request.body).ok())
            .collect()
    }
}
