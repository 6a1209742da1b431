mod stub;

use mangawatch::Error;
use mangawatch::detect::UpdateRecord;
use mangawatch::webhook::{DiscordWebhook, Notifier as _};
use stub::StubServer;
use url::Url;

fn update() -> UpdateRecord {
    UpdateRecord {
        manga_id: "m-1".to_owned(),
        title: "Foo - Ch1 Special".to_owned(),
        chapter: "1".to_owned(),
        url: "https://mangadex.org/chapter/c-1".to_owned(),
    }
}

fn webhook_for(server: &StubServer) -> DiscordWebhook {
    let endpoint = Url::parse(&server.base_url)
        .and_then(|base| base.join("api/webhooks/1/token"))
        .expect("build webhook url");
    DiscordWebhook::new(reqwest::Client::new(), endpoint, "https://img.example/cat.jpg")
}

#[tokio::test]
async fn posts_message_json() -> anyhow::Result<()> {
    let server = StubServer::spawn(|_| (204, String::new()));
    let webhook = webhook_for(&server);

    webhook.deliver(&update()).await?;

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.path(), "/api/webhooks/1/token");
    assert_eq!(
        request.header("User-Agent"),
        Some("Mangadex-Discord-Notification/1.0")
    );
    assert!(
        request
            .header("Content-Type")
            .is_some_and(|v| v.starts_with("application/json"))
    );

    let body: serde_json::Value = serde_json::from_str(&request.body)?;
    assert_eq!(
        body,
        serde_json::json!({
            "username": "Mangadex",
            "avatar_url": "https://img.example/cat.jpg",
            "content": "**Foo - Ch1 Special | Ch. 1**\nhttps://mangadex.org/chapter/c-1",
        })
    );
    Ok(())
}

#[tokio::test]
async fn server_error_is_delivery_failure_with_body() {
    let server = StubServer::spawn(|_| (500, "webhook exploded".to_owned()));
    let webhook = webhook_for(&server);

    let err = webhook.deliver(&update()).await.unwrap_err();

    assert!(err.is_delivery());
    match err {
        Error::Delivery { status, body } => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(body, "webhook exploded");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
