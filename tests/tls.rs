mod support;

use gmi::{Client, StatusCode};
use support::server;

#[tokio::test]
async fn fetch_over_tls_without_verification() {
    let _ = env_logger::try_init();

    let server = server::gemini(|request| {
        format!("20 text/gemini\r\n=> {} you asked for\n", request).into_bytes()
    });
    let url = server.url("/page");

    let rsp = Client::builder()
        .connection_verbose(true)
        .build()
        .unwrap()
        .get(&url)
        .await
        .unwrap();

    assert_eq!(rsp.status(), StatusCode::SUCCESS);
    assert_eq!(rsp.text(), format!("=> {} you asked for\n", url));
}

#[tokio::test]
async fn body_without_close_notify() {
    let server = server::gemini_abrupt(|_| b"20 text/gemini\r\n# still here\n".to_vec());

    let rsp = Client::new().get(server.url("/")).await.unwrap();

    assert_eq!(rsp.text(), "# still here\n");
}

#[tokio::test]
async fn status_error_over_tls() {
    let server = server::gemini(|_| b"41 down for maintenance\r\n".to_vec());

    let err = Client::new().get(server.url("/")).await.unwrap_err();

    assert!(err.is_server_error(), "{err:?}");
    assert_eq!(err.status(), Some(StatusCode::SERVER_UNAVAILABLE));
    assert_eq!(err.meta(), Some("down for maintenance"));
}

#[tokio::test]
async fn verification_rejects_untrusted_certificate() {
    let server = server::gemini(|_| b"20 text/gemini\r\nsecret".to_vec());

    let client = Client::builder()
        .danger_accept_invalid_certs(false)
        .tls_built_in_root_certs(false)
        .build()
        .unwrap();
    let err = client.get(server.url("/")).await.unwrap_err();

    assert!(err.is_connect(), "{err:?}");
    assert!(!err.is_timeout());
}

#[tokio::test]
async fn redirect_between_tls_servers() {
    let target = server::gemini(|_| b"20 text/gemini\r\nother server".to_vec());
    let target_url = target.url("/");
    let origin = server::gemini(move |_| format!("30 {}\r\n", target_url).into_bytes());

    let rsp = Client::new().get(origin.url("/start")).await.unwrap();

    assert_eq!(rsp.url().as_str(), target.url("/"));
    assert_eq!(rsp.text(), "other server");
}
