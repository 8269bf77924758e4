mod support;

use gmi::{redirect::Policy, Client, StatusCode};
use support::{gemtext, Scripted};

fn client(connector: &Scripted, policy: Policy) -> Client {
    Client::builder()
        .connector(connector.clone())
        .redirect(policy)
        .build()
        .unwrap()
}

#[tokio::test]
async fn follows_relative_redirects() {
    let _ = env_logger::try_init();

    let server = Scripted::new()
        .reply("gemini://example.org/old/page", "31 ../new/page\r\n")
        .reply("gemini://example.org/new/page", "30 /final\r\n")
        .reply("gemini://example.org/final", gemtext("arrived"));

    let rsp = client(&server, Policy::default())
        .get("gemini://example.org/old/page")
        .await
        .unwrap();

    assert_eq!(rsp.status(), StatusCode::SUCCESS);
    assert_eq!(rsp.url().as_str(), "gemini://example.org/final");
    assert_eq!(rsp.text(), "arrived");
    assert_eq!(
        server.requests(),
        [
            "gemini://example.org/old/page\r\n",
            "gemini://example.org/new/page\r\n",
            "gemini://example.org/final\r\n",
        ]
    );
}

#[tokio::test]
async fn follows_redirect_to_another_host() {
    let server = Scripted::new()
        .reply("gemini://a.example/", "30 gemini://b.example:1970/\r\n")
        .reply("gemini://b.example:1970/", gemtext("b"));

    let rsp = client(&server, Policy::default())
        .get("gemini://a.example/")
        .await
        .unwrap();

    assert_eq!(rsp.text(), "b");
    let dsts = server.dsts();
    assert_eq!(dsts[1].host(), "b.example");
    assert_eq!(dsts[1].port(), 1970);
}

#[tokio::test]
async fn too_many_redirects() {
    let server = Scripted::new()
        .reply("gemini://example.org/0", "30 /1\r\n")
        .reply("gemini://example.org/1", "30 /2\r\n")
        .reply("gemini://example.org/2", "30 /3\r\n")
        .reply("gemini://example.org/3", gemtext("never reached"));

    let err = client(&server, Policy::limited(2))
        .get("gemini://example.org/0")
        .await
        .unwrap_err();

    assert!(err.is_redirect(), "{err:?}");
    assert_eq!(err.url().map(|u| u.as_str()), Some("gemini://example.org/2"));
    let chain: Vec<&str> = err.redirect_chain().iter().map(|u| u.as_str()).collect();
    assert_eq!(
        chain,
        [
            "gemini://example.org/0",
            "gemini://example.org/1",
            "gemini://example.org/2",
        ]
    );
    assert_eq!(server.requests().len(), 3);
}

#[tokio::test]
async fn redirect_loop_is_bounded_by_default() {
    let server = Scripted::new().reply("gemini://example.org/loop", "30 /loop\r\n");

    let err = client(&server, Policy::default())
        .get("gemini://example.org/loop")
        .await
        .unwrap_err();

    assert!(err.is_redirect(), "{err:?}");
    assert_eq!(server.requests().len(), 6);
}

#[tokio::test]
async fn policy_none_returns_the_redirect() {
    let server = Scripted::new().reply("gemini://example.org/", "31 /moved\r\n");

    let rsp = client(&server, Policy::none())
        .get("gemini://example.org/")
        .await
        .unwrap();

    assert_eq!(rsp.status(), StatusCode::REDIRECT_PERMANENT);
    assert_eq!(rsp.meta(), Some("/moved"));
    assert!(rsp.body().is_empty());
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn custom_policy_sees_the_attempt() {
    let server = Scripted::new()
        .reply("gemini://example.org/", "30 gemini://blocked.example/\r\n");

    let policy = Policy::custom(|attempt| {
        if attempt.url().host_str() == Some("blocked.example") {
            attempt.error("blocked host")
        } else {
            attempt.follow()
        }
    });
    let err = client(&server, policy)
        .get("gemini://example.org/")
        .await
        .unwrap_err();

    assert!(err.is_redirect(), "{err:?}");
    assert!(err.to_string().ends_with(": blocked host"), "{err}");
    assert_eq!(server.dsts().len(), 1);
}

#[tokio::test]
async fn redirect_to_other_scheme_is_not_followed() {
    let server = Scripted::new().reply("gemini://example.org/", "30 https://example.org/\r\n");

    let err = client(&server, Policy::default())
        .get("gemini://example.org/")
        .await
        .unwrap_err();

    assert!(err.is_scheme(), "{err:?}");
    assert_eq!(server.dsts().len(), 1);
    assert_eq!(err.redirect_chain().len(), 1);
}

#[tokio::test]
async fn redirect_without_target_is_a_url_error() {
    let server = Scripted::new().reply("gemini://example.org/", "30\r\n");

    let err = client(&server, Policy::default())
        .get("gemini://example.org/")
        .await
        .unwrap_err();

    assert!(err.is_url(), "{err:?}");
    assert_eq!(server.dsts().len(), 1);
}

#[tokio::test]
async fn failure_after_redirect_carries_the_chain() {
    let server = Scripted::new()
        .reply("gemini://example.org/", "30 /gone\r\n")
        .reply("gemini://example.org/gone", "52 it is gone\r\n");

    let err = client(&server, Policy::default())
        .get("gemini://example.org/")
        .await
        .unwrap_err();

    assert!(err.is_server_error(), "{err:?}");
    assert_eq!(err.status(), Some(StatusCode::GONE));
    assert_eq!(err.url().map(|u| u.as_str()), Some("gemini://example.org/gone"));
    assert_eq!(err.redirect_chain().len(), 1);
}
