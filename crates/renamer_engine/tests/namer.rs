use std::time::Duration;

use renamer_engine::{
    ApiKey, ChatCompletionsNamer, KeyStatus, Mode, NameRequest, Namer, NamerError, NamerSettings,
};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn namer_for(server: &MockServer) -> ChatCompletionsNamer {
    ChatCompletionsNamer::new(NamerSettings {
        base_url: format!("{}/v1", server.uri()),
        ..NamerSettings::default()
    })
    .unwrap()
}

fn text_request<'a>(base_name: &'a str, instructions: &'a str) -> NameRequest<'a> {
    NameRequest {
        base_name,
        extension: "pdf",
        mode: Mode::Text,
        instructions,
        image: None,
    }
}

fn reply(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }]
    }))
}

#[tokio::test]
async fn text_mode_sends_base_name_and_instructions() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_string_contains("scan_0042"))
        .and(body_string_contains("use snake_case"))
        .and(body_string_contains("\"model\":\"gpt-4o-mini\""))
        .respond_with(reply("  quarterly_report\n"))
        .expect(1)
        .mount(&server)
        .await;

    let name = namer_for(&server)
        .generate_name(
            &ApiKey::new("sk-test"),
            &text_request("scan_0042", "use snake_case"),
        )
        .await
        .expect("name");
    assert_eq!(name, "quarterly_report");
}

#[tokio::test]
async fn image_mode_sends_a_data_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        // base64 of "PNG!"
        .and(body_string_contains("data:image/png;base64,UE5HIQ=="))
        .respond_with(reply("red_bicycle"))
        .expect(1)
        .mount(&server)
        .await;

    let request = NameRequest {
        base_name: "IMG_0001",
        extension: "png",
        mode: Mode::Image,
        instructions: "",
        image: Some(&b"PNG!"[..]),
    };
    let name = namer_for(&server)
        .generate_name(&ApiKey::new("sk-test"), &request)
        .await
        .expect("name");
    assert_eq!(name, "red_bicycle");
}

#[tokio::test]
async fn image_mode_without_content_fails_before_sending() {
    let server = MockServer::start().await;
    let request = NameRequest {
        image: None,
        mode: Mode::Image,
        ..text_request("IMG_0001", "")
    };

    let err = namer_for(&server)
        .generate_name(&ApiKey::new("sk-test"), &request)
        .await
        .unwrap_err();
    assert_eq!(err, NamerError::MissingImage);
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn reply_is_reduced_to_a_safe_first_line() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(reply("\"invoices/2024\"\nI picked this because..."))
        .mount(&server)
        .await;

    let name = namer_for(&server)
        .generate_name(&ApiKey::new("sk-test"), &text_request("inv", ""))
        .await
        .unwrap();
    assert_eq!(name, "invoices_2024");
}

#[tokio::test]
async fn server_error_maps_to_http_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = namer_for(&server)
        .generate_name(&ApiKey::new("sk-test"), &text_request("a", ""))
        .await
        .unwrap_err();
    assert_eq!(err, NamerError::HttpStatus(500));
}

#[tokio::test]
async fn empty_reply_is_an_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(reply(" \n "))
        .mount(&server)
        .await;

    let err = namer_for(&server)
        .generate_name(&ApiKey::new("sk-test"), &text_request("a", ""))
        .await
        .unwrap_err();
    assert!(matches!(err, NamerError::InvalidResponse(_)));
}

#[tokio::test]
async fn slow_service_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(reply("late").set_delay(Duration::from_millis(250)))
        .mount(&server)
        .await;

    let namer = ChatCompletionsNamer::new(NamerSettings {
        base_url: format!("{}/v1", server.uri()),
        request_timeout: Duration::from_millis(50),
        ..NamerSettings::default()
    })
    .unwrap();
    let err = namer
        .generate_name(&ApiKey::new("sk-test"), &text_request("a", ""))
        .await
        .unwrap_err();
    assert!(matches!(err, NamerError::Timeout(_)));
}

#[tokio::test]
async fn verify_key_reads_the_models_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .and(header("authorization", "Bearer sk-good"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"data\":[]}"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .and(header("authorization", "Bearer sk-revoked"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let namer = namer_for(&server);
    assert_eq!(
        namer.verify_key(&ApiKey::new("sk-good")).await.unwrap(),
        KeyStatus::Valid
    );
    assert_eq!(
        namer.verify_key(&ApiKey::new("sk-revoked")).await.unwrap(),
        KeyStatus::Invalid
    );
    assert_eq!(
        namer.verify_key(&ApiKey::new("   ")).await.unwrap(),
        KeyStatus::Invalid
    );
}

#[tokio::test]
async fn verify_key_surfaces_unexpected_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/models"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let err = namer_for(&server)
        .verify_key(&ApiKey::new("sk-test"))
        .await
        .unwrap_err();
    assert_eq!(err, NamerError::HttpStatus(502));
}
