//! HTTPS and mutual TLS through the serve loop.

use std::net::SocketAddr;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use muxlisten::config::Servers;
use muxlisten::net::ServerListener;
use muxlisten::observability::Logger;

mod common;

fn https_descriptors(client_auth: &str) -> Servers {
    common::descriptors(&format!(
        r#"[{{
            "kind": ["inet", "http"],
            "host": "127.0.0.1",
            "tls": {{"enable": true, "certFile": {:?}, "keyFile": {:?}}},
            "clientAuth": {{"tls": {client_auth}}}
        }}]"#,
        common::fixture("server.pem"),
        common::fixture("server.key"),
    ))
}

fn client(addr: SocketAddr, identity: Option<reqwest::Identity>) -> reqwest::Client {
    let ca = std::fs::read(common::fixture("ca.pem")).unwrap();
    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .add_root_certificate(reqwest::Certificate::from_pem(&ca).unwrap())
        .resolve("localhost", addr)
        .timeout(Duration::from_secs(3));
    if let Some(identity) = identity {
        builder = builder.identity(identity);
    }
    builder.build().unwrap()
}

fn client_identity() -> reqwest::Identity {
    let mut pem = std::fs::read(common::fixture("client.pem")).unwrap();
    pem.extend(std::fs::read(common::fixture("client.key")).unwrap());
    reqwest::Identity::from_pem(&pem).unwrap()
}

async fn start(servers: Servers) -> (Servers<ServerListener>, SocketAddr, CancellationToken, tokio::task::JoinHandle<()>) {
    let lifetime = CancellationToken::new();
    let opts = common::test_opts(lifetime.clone(), Logger::discard());
    let (bound, errors) = servers.listen(&opts).await;
    assert!(errors.is_empty(), "{errors:?}");

    let port = common::inet_port(&bound.as_slice()[0].server);
    let serving = {
        let bound = bound.clone();
        tokio::spawn(async move {
            bound.serve_http(common::hello_router, &opts).await.unwrap();
        })
    };

    (bound, SocketAddr::from(([127, 0, 0, 1], port)), lifetime, serving)
}

async fn stop(bound: Servers<ServerListener>, lifetime: CancellationToken, serving: tokio::task::JoinHandle<()>) {
    lifetime.cancel();
    tokio::time::timeout(Duration::from_secs(3), serving)
        .await
        .unwrap()
        .unwrap();
    assert!(bound.close().await.is_empty());
}

#[tokio::test]
async fn https_with_server_certificate() {
    let (bound, addr, lifetime, serving) = start(https_descriptors(r#"{"enable": false}"#)).await;

    let url = format!("https://localhost:{}/", addr.port());
    let response = client(addr, None).get(&url).send().await.unwrap();
    assert!(response.status().is_success());
    assert_eq!(
        response.text().await.unwrap(),
        format!("hello from 127.0.0.1:{}", addr.port())
    );

    // Plain HTTP against the TLS listener never gets an answer.
    let plain = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap()
        .get(format!("http://127.0.0.1:{}/", addr.port()))
        .send()
        .await;
    assert!(plain.is_err());

    stop(bound, lifetime, serving).await;
}

#[tokio::test]
async fn mutual_tls_requires_a_verified_client() {
    let client_auth = format!(
        r#"{{"enable": true, "authType": "RequireAndVerifyClientCert", "trustedCa": {:?}}}"#,
        common::fixture("ca.pem")
    );
    let (bound, addr, lifetime, serving) = start(https_descriptors(&client_auth)).await;
    let url = format!("https://localhost:{}/", addr.port());

    let anonymous = client(addr, None).get(&url).send().await;
    assert!(anonymous.is_err());

    let response = client(addr, Some(client_identity())).get(&url).send().await.unwrap();
    assert!(response.status().is_success());

    stop(bound, lifetime, serving).await;
}

#[tokio::test]
async fn verify_if_given_admits_anonymous_clients() {
    let client_auth = format!(
        r#"{{"enable": true, "authType": "verify-client-cert-if-given", "trustedCa": {:?}}}"#,
        common::fixture("ca.pem")
    );
    let (bound, addr, lifetime, serving) = start(https_descriptors(&client_auth)).await;
    let url = format!("https://localhost:{}/", addr.port());

    let anonymous = client(addr, None).get(&url).send().await.unwrap();
    assert!(anonymous.status().is_success());

    let verified = client(addr, Some(client_identity())).get(&url).send().await.unwrap();
    assert!(verified.status().is_success());

    stop(bound, lifetime, serving).await;
}
