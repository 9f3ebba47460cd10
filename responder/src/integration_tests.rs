//! End-to-end tests against a local bridge
//!
//! An axum server on 127.0.0.1 plays the bridge (and, where needed, the
//! manifest host). Each test acts as the initiator: it owns the session
//! keypair whose public key goes into the link and decrypts whatever the
//! responder posts.

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    use axum::extract::{Query, State};
    use axum::http::{header::CONTENT_TYPE, HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};

    use crate::address::AccountAddress;
    use crate::b64;
    use crate::config::ResponderConfig;
    use crate::error::ErrorKind;
    use crate::event::ProofItem;
    use crate::proof::verify;
    use crate::relay::RetryPolicy;
    use crate::responder::{connect_once, Outcome, Responder};
    use crate::session::{EncryptedChannel, SessionKeyPair};
    use crate::tests::fixtures::{self, link_for, StaticManifest};

    // ==================== Local bridge ====================

    #[derive(Debug, Clone)]
    struct Delivery {
        client_id: String,
        to: String,
        ttl: String,
        content_type: Option<String>,
        body: String,
    }

    #[derive(Clone, Default)]
    struct Bridge {
        deliveries: Arc<Mutex<Vec<Delivery>>>,
        failures_left: Arc<AtomicU32>,
    }

    impl Bridge {
        fn deliveries(&self) -> Vec<Delivery> {
            self.deliveries.lock().unwrap().clone()
        }
    }

    async fn post_message(
        State(bridge): State<Bridge>,
        Query(query): Query<HashMap<String, String>>,
        headers: HeaderMap,
        body: String,
    ) -> (StatusCode, &'static str) {
        bridge.deliveries.lock().unwrap().push(Delivery {
            client_id: query.get("client_id").cloned().unwrap_or_default(),
            to: query.get("to").cloned().unwrap_or_default(),
            ttl: query.get("ttl").cloned().unwrap_or_default(),
            content_type: headers
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned),
            body,
        });

        let failing = bridge
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            (StatusCode::INTERNAL_SERVER_ERROR, "bridge overloaded")
        } else {
            (StatusCode::OK, r#"{"message":"OK","statusCode":200}"#)
        }
    }

    async fn manifest() -> Json<Value> {
        Json(json!({
            "url": "https://dapp.example",
            "name": "Demo dApp",
            "iconUrl": "https://dapp.example/icon.png"
        }))
    }

    /// Manifest whose icon comes in light and dark variants
    async fn themed_manifest() -> Json<Value> {
        Json(json!({
            "url": "https://themed.example/app",
            "name": "Themed dApp",
            "iconUrl": {
                "light": "https://themed.example/light.png",
                "dark": "https://themed.example/dark.png"
            }
        }))
    }

    /// Start the bridge; returns its base URL
    async fn spawn_bridge(failures: u32) -> (String, Bridge) {
        let bridge = Bridge {
            failures_left: Arc::new(AtomicU32::new(failures)),
            ..Bridge::default()
        };
        let app = Router::new()
            .route("/bridge/message", post(post_message))
            .route("/tonconnect-manifest.json", get(manifest))
            .route("/themed-manifest.json", get(themed_manifest))
            .with_state(bridge.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), bridge)
    }

    fn config(base: &str, allowed: Option<&[&str]>) -> ResponderConfig {
        ResponderConfig {
            bridge_url: format!("{base}/bridge"),
            request_timeout_secs: 5,
            allowed_domains: allowed.map(|list| list.iter().map(|d| d.to_string()).collect()),
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay_ms: 20,
            },
            ..ResponderConfig::default()
        }
    }

    /// Decrypt a delivery the way the initiator would
    fn open_event(initiator: &SessionKeyPair, delivery: &Delivery) -> Value {
        let responder_key = hex::decode(&delivery.client_id).unwrap();
        let channel = EncryptedChannel::derive(initiator, &responder_key).unwrap();
        let sealed = b64::decode(&delivery.body).expect("body is base64");
        serde_json::from_slice(&channel.decrypt(&sealed).expect("decrypts")).unwrap()
    }

    const ADDR_LINK_REQUEST: &str = "%7B%22manifestUrl%22%3A%22https%3A%2F%2Fexample.com%2Fm.json%22%2C%22items%22%3A%5B%7B%22name%22%3A%22ton_addr%22%7D%5D%7D";

    // ==================== Handshake ====================

    /// Allow-listed initiator asking only for the address
    #[tokio::test]
    async fn test_connect_delivers_address_only_event() {
        let (base, bridge) = spawn_bridge(0).await;
        let initiator = SessionKeyPair::generate();
        let manifest = StaticManifest::with_url("https://example.com");
        let responder = Responder::new(
            config(&base, Some(&["example.com"])),
            Box::new(fixtures::keyed_account()),
        )
        .unwrap()
        .with_manifest_fetcher(manifest.clone());

        let link = format!("tc://?v=2&id={}&r={}", initiator.client_id(), ADDR_LINK_REQUEST);
        let result = responder.connect(&link).await;

        assert_eq!(result.outcome, Outcome::Connected, "{result:?}");
        assert_eq!(result.error_code, None);
        let data = result.data.expect("connected data");
        assert_eq!(data.event, "connect");
        assert_eq!(manifest.calls.load(Ordering::SeqCst), 1);

        let deliveries = bridge.deliveries();
        assert_eq!(deliveries.len(), 1);
        let delivery = &deliveries[0];
        assert_eq!(delivery.client_id, responder.client_id());
        assert_eq!(delivery.to, initiator.client_id());
        assert_eq!(delivery.ttl, "300");
        assert_eq!(delivery.content_type.as_deref(), Some("text/plain"));

        let event = open_event(&initiator, delivery);
        assert_eq!(event["event"], "connect");
        assert_eq!(event["id"], data.id);

        let items = event["payload"]["items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["name"], "ton_addr");
        assert!(items.iter().all(|item| item["name"] != "ton_proof"));
        assert_eq!(items[0]["address"], fixtures::RAW_ADDRESS);
        assert_eq!(items[0]["network"], "-239");
        assert_eq!(items[0]["publicKey"], fixtures::SEED_PUBLIC_KEY_HEX);
        assert_eq!(items[0]["walletStateInit"], fixtures::STATE_INIT_B64);

        let device = &event["payload"]["device"];
        assert_eq!(device["platform"], "android");
        assert_eq!(device["appName"], "Tonkeeper");
        assert_eq!(device["maxProtocolVersion"], 2);
        assert_eq!(device["features"], json!([]));

        responder.close().await;
    }

    /// Proof is bound to the domain announced by the fetched manifest
    #[tokio::test]
    async fn test_connect_with_proof_uses_manifest_domain() {
        let (base, bridge) = spawn_bridge(0).await;
        let initiator = SessionKeyPair::generate();
        let responder =
            Responder::new(config(&base, None), Box::new(fixtures::keyed_account())).unwrap();

        let request = json!({
            "manifestUrl": format!("{base}/tonconnect-manifest.json"),
            "items": [{"name": "ton_addr"}, {"name": "ton_proof", "payload": "nonce-7f3a"}]
        });
        let link = link_for(&initiator.client_id(), &request.to_string());
        let before = chrono::Utc::now().timestamp() as u64;
        let result = responder.connect(&link).await;
        assert!(result.is_connected(), "{result:?}");

        let deliveries = bridge.deliveries();
        let event = open_event(&initiator, &deliveries[0]);
        let items = event["payload"]["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1]["name"], "ton_proof");

        let proof: ProofItem = serde_json::from_value(items[1].clone()).unwrap();
        assert_eq!(proof.proof.domain.value, "dapp.example");
        assert_eq!(proof.proof.domain.length_bytes, 12);
        assert_eq!(proof.proof.payload, "nonce-7f3a");
        assert!(proof.proof.timestamp >= before);

        let address: AccountAddress = fixtures::RAW_ADDRESS.parse().unwrap();
        let public_key: [u8; 32] = hex::decode(fixtures::SEED_PUBLIC_KEY_HEX)
            .unwrap()
            .try_into()
            .unwrap();
        assert!(verify(&proof, &address, &public_key));
    }

    /// Unexpected types in unused manifest fields leave `url` in charge
    #[tokio::test]
    async fn test_manifest_url_survives_structured_icon() {
        let (base, bridge) = spawn_bridge(0).await;
        let initiator = SessionKeyPair::generate();
        let responder =
            Responder::new(config(&base, None), Box::new(fixtures::keyed_account())).unwrap();

        let request = json!({
            "manifestUrl": format!("{base}/themed-manifest.json"),
            "items": [{"name": "ton_addr"}, {"name": "ton_proof", "payload": "p"}]
        });
        let result = responder
            .connect(&link_for(&initiator.client_id(), &request.to_string()))
            .await;
        assert!(result.is_connected(), "{result:?}");

        let event = open_event(&initiator, &bridge.deliveries()[0]);
        assert_eq!(event["payload"]["items"][1]["proof"]["domain"]["value"], "themed.example");
    }

    /// A missing manifest falls back to the manifest URL host
    #[tokio::test]
    async fn test_unreachable_manifest_is_not_fatal() {
        let (base, bridge) = spawn_bridge(0).await;
        let initiator = SessionKeyPair::generate();
        let responder =
            Responder::new(config(&base, None), Box::new(fixtures::keyed_account())).unwrap();

        let request = json!({
            "manifestUrl": format!("{base}/missing.json"),
            "items": [{"name": "ton_addr"}, {"name": "ton_proof", "payload": "p"}]
        });
        let result = responder
            .connect(&link_for(&initiator.client_id(), &request.to_string()))
            .await;
        assert!(result.is_connected(), "{result:?}");

        let event = open_event(&initiator, &bridge.deliveries()[0]);
        assert_eq!(event["payload"]["items"][1]["proof"]["domain"]["value"], "127.0.0.1");
    }

    // ==================== Relay failures ====================

    #[tokio::test]
    async fn test_relay_recovers_on_third_attempt() {
        let (base, bridge) = spawn_bridge(2).await;
        let initiator = SessionKeyPair::generate();
        let responder = Responder::new(config(&base, None), Box::new(fixtures::keyed_account()))
            .unwrap()
            .with_manifest_fetcher(StaticManifest::failing());

        let started = Instant::now();
        let link = format!("tc://?v=2&id={}&r={}", initiator.client_id(), ADDR_LINK_REQUEST);
        let result = responder.connect(&link).await;

        assert!(result.is_connected(), "{result:?}");
        assert!(started.elapsed() >= Duration::from_millis(60));
        let deliveries = bridge.deliveries();
        assert_eq!(deliveries.len(), 3);
        assert!(deliveries.iter().all(|d| d.body == deliveries[0].body));
    }

    #[tokio::test]
    async fn test_relay_failure_surfaces_last_error() {
        let (base, bridge) = spawn_bridge(u32::MAX).await;
        let initiator = SessionKeyPair::generate();
        let responder = Responder::new(config(&base, None), Box::new(fixtures::keyed_account()))
            .unwrap()
            .with_manifest_fetcher(StaticManifest::with_url("https://example.com"));

        let link = format!("tc://?v=2&id={}&r={}", initiator.client_id(), ADDR_LINK_REQUEST);
        let result = responder.connect(&link).await;

        assert_eq!(result.outcome, Outcome::ConnectFailed);
        assert_eq!(result.error_code, Some(ErrorKind::RelayError));
        let message = result.error_message.unwrap();
        assert!(message.contains("HTTP 500"), "{message}");
        assert!(message.contains("bridge overloaded"), "{message}");
        assert_eq!(bridge.deliveries().len(), 3);
        assert!(responder.channel_peer().await.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_bridge() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let initiator = SessionKeyPair::generate();
        let responder = Responder::new(config(&base, None), Box::new(fixtures::keyed_account()))
            .unwrap()
            .with_manifest_fetcher(StaticManifest::failing());
        let link = format!("tc://?v=2&id={}&r={}", initiator.client_id(), ADDR_LINK_REQUEST);

        let result = responder.connect(&link).await;
        assert_eq!(result.error_code, Some(ErrorKind::RelayError));
    }

    // ==================== Responder lifetime ====================

    #[tokio::test]
    async fn test_event_ids_increase_and_session_key_is_stable() {
        let (base, bridge) = spawn_bridge(0).await;
        let responder = Responder::new(config(&base, None), Box::new(fixtures::keyed_account()))
            .unwrap()
            .with_manifest_fetcher(StaticManifest::with_url("https://example.com"));

        let mut ids = Vec::new();
        for _ in 0..3 {
            let initiator = SessionKeyPair::generate();
            let link = format!("tc://?v=2&id={}&r={}", initiator.client_id(), ADDR_LINK_REQUEST);
            let result = responder.connect(&link).await;
            ids.push(result.data.expect("connected").id);
            assert_eq!(responder.channel_peer().await, Some(*initiator.public_key()));
        }
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]), "{ids:?}");

        let deliveries = bridge.deliveries();
        assert!(deliveries.iter().all(|d| d.client_id == responder.client_id()));
    }

    #[tokio::test]
    async fn test_concurrent_handshakes_each_reach_their_initiator() {
        let (base, bridge) = spawn_bridge(0).await;
        let responder = Arc::new(
            Responder::new(config(&base, None), Box::new(fixtures::keyed_account()))
                .unwrap()
                .with_manifest_fetcher(StaticManifest::with_url("https://example.com")),
        );

        let initiators: Vec<SessionKeyPair> = (0..4).map(|_| SessionKeyPair::generate()).collect();
        let tasks: Vec<_> = initiators
            .iter()
            .map(|initiator| {
                let responder = Arc::clone(&responder);
                let link =
                    format!("tc://?v=2&id={}&r={}", initiator.client_id(), ADDR_LINK_REQUEST);
                tokio::spawn(async move { responder.connect(&link).await })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().is_connected());
        }

        let deliveries = bridge.deliveries();
        assert_eq!(deliveries.len(), initiators.len());
        for initiator in &initiators {
            let delivery = deliveries
                .iter()
                .find(|d| d.to == initiator.client_id())
                .expect("one delivery per initiator");
            let event = open_event(initiator, delivery);
            assert_eq!(event["event"], "connect");
        }
    }

    #[tokio::test]
    async fn test_connect_once_closes_responder() {
        let (base, bridge) = spawn_bridge(0).await;
        let initiator = SessionKeyPair::generate();
        let link = format!(
            "tc://?v=2&id={}&r={}",
            initiator.client_id(),
            urlencoded_addr_request(&base)
        );

        let result =
            connect_once(config(&base, None), Box::new(fixtures::keyed_account()), &link).await;
        assert!(result.is_connected(), "{result:?}");
        assert_eq!(bridge.deliveries().len(), 1);
    }

    fn urlencoded_addr_request(base: &str) -> String {
        let request = json!({
            "manifestUrl": format!("{base}/tonconnect-manifest.json"),
            "items": [{"name": "ton_addr"}]
        });
        fixtures::urlencode(&request.to_string())
    }
}
