mod support;

use std::time::Duration;

use gmi::{redirect::Policy, StatusCode};
use support::{gemtext, server, Reply, Scripted};

#[test]
fn blocking_get_over_tls() {
    let _ = env_logger::try_init();

    let server = server::gemini(|_| b"20 text/gemini\r\nHello\n".to_vec());

    let rsp = gmi::blocking::get(server.url("/")).unwrap();

    assert_eq!(rsp.status(), StatusCode::SUCCESS);
    assert_eq!(rsp.text(), "Hello\n");
}

#[test]
fn blocking_client_with_connector() {
    let connector = Scripted::new()
        .reply("gemini://example.org/", "30 /there\r\n")
        .reply("gemini://example.org/there", gemtext("there"));
    let client = gmi::blocking::Client::builder()
        .connector(connector.clone())
        .redirect(Policy::limited(1))
        .build()
        .unwrap();

    let rsp = client.get("example.org/").unwrap();
    assert_eq!(rsp.url().as_str(), "gemini://example.org/there");
    assert_eq!(rsp.text(), "there");

    // the runtime thread keeps serving
    let err = client.get("gemini://example.org/nowhere").unwrap_err();
    assert!(err.is_server_error(), "{err:?}");
    assert_eq!(connector.dsts().len(), 3);
}

#[test]
fn blocking_errors_match_async() {
    let connector = Scripted::new().with("gemini://example.org/", Reply::Hang);
    let client = gmi::blocking::Client::builder()
        .connector(connector)
        .read_timeout(Duration::from_millis(50))
        .build()
        .unwrap();

    let err = client.get("gemini://example.org/").unwrap_err();
    assert!(err.is_header() && err.is_timeout(), "{err:?}");

    let err = client.get("gopher://example.org/").unwrap_err();
    assert!(err.is_scheme(), "{err:?}");
}

#[test]
fn blocking_client_is_shareable() {
    let connector = Scripted::new().reply("gemini://example.org/", gemtext("shared"));
    let client = gmi::blocking::Client::builder()
        .connector(connector)
        .build()
        .unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let client = client.clone();
            std::thread::spawn(move || client.get("gemini://example.org/").unwrap().text().into_owned())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), "shared");
    }
}

#[test]
fn blocking_build_error() {
    let err = gmi::blocking::Client::builder()
        .ca_cert_file("/definitely/not/here.pem")
        .build()
        .unwrap_err();
    assert!(err.is_builder(), "{err:?}");
}

#[test]
#[should_panic]
fn blocking_inside_runtime_panics() {
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    rt.block_on(async {
        let _ = gmi::blocking::Client::new();
    });
}
