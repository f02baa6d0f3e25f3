//! Integration tests for the chat and media endpoints

mod test_utils;

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use mockito::Matcher;
    use serde_json::{Value, json};
    use std::io::Write;
    use tower::util::ServiceExt;

    use crate::test_utils::{SYSTEM_MESSAGE, body_to_string, test_app};

    fn sse(tokens: &[&str]) -> String {
        let mut body = String::new();
        for t in tokens {
            body.push_str(&format!(
                "data: {}\n\n",
                json!({"choices": [{"delta": {"content": t}}]})
            ));
        }
        body.push_str("data: [DONE]\n\n");
        body
    }

    async fn mock_title(server: &mut mockito::ServerGuard, title: &str) -> mockito::Mock {
        server
            .mock("POST", "/openai")
            .match_body(Matcher::PartialJson(json!({"stream": false})))
            .with_header("content-type", "application/json")
            .with_body(json!({"choices": [{"message": {"content": title}}]}).to_string())
            .create_async()
            .await
    }

    async fn post(app: &axum::Router, uri: &str, body: Value) -> axum::response::Response {
        app.clone()
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .method("POST")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn active(app: &axum::Router) -> Value {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/conversations/active")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        serde_json::from_str(&body_to_string(response.into_body()).await).unwrap()
    }

    /// Tests a chat turn streams events and lands in the conversation
    #[tokio::test]
    async fn it_streams_a_reply() {
        let mut server = mockito::Server::new_async().await;
        let chat_mock = server
            .mock("POST", "/openai")
            .match_body(Matcher::PartialJson(json!({
                "stream": true,
                "messages": [
                    {"role": "system", "content": SYSTEM_MESSAGE},
                    {"role": "user", "content": "Hello"}
                ]
            })))
            .with_header("content-type", "text/event-stream")
            .with_body(sse(&["Hi", "!"]))
            .create_async()
            .await;
        let _title = mock_title(&mut server, "Friendly Greeting").await;
        let app = test_app(&server.url());

        let response = post(&app, "/api/chat", json!({"message": "Hello"})).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response.headers()["content-type"]
                .to_str()
                .unwrap()
                .starts_with("text/event-stream")
        );

        let body = body_to_string(response.into_body()).await;
        chat_mock.assert_async().await;
        assert!(body.contains(r#""type":"delta""#));
        assert!(body.contains(r#""delta":"Hi"#));
        assert!(body.contains(r#""type":"title""#));
        assert!(body.contains(r#""state":"streaming""#));

        let active = active(&app).await;
        assert_eq!(active["isDraft"], false);
        assert_eq!(active["status"], "idle");
        assert_eq!(active["title"], "Friendly Greeting");
        let messages = active["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1]["content"], "Hello");
        assert_eq!(messages[2]["content"], "Hi!");
    }

    /// Tests upstream failures become an error event and message
    #[tokio::test]
    async fn it_reports_upstream_errors() {
        let mut server = mockito::Server::new_async().await;
        let _chat = server
            .mock("POST", "/openai")
            .match_body(Matcher::PartialJson(json!({"stream": true})))
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;
        let _title = mock_title(&mut server, "Broken").await;
        let app = test_app(&server.url());

        let response = post(&app, "/api/chat", json!({"message": "Hello"})).await;
        let body = body_to_string(response.into_body()).await;
        assert!(body.contains(r#""type":"error""#));

        let active = active(&app).await;
        let messages = active["messages"].as_array().unwrap();
        let last = messages.last().unwrap()["content"].as_str().unwrap();
        assert!(last.starts_with("⚠️ Error:"));
        assert!(last.contains("boom"));
        assert_eq!(active["status"], "idle");
    }

    /// Tests a blank message produces an empty stream
    #[tokio::test]
    async fn it_ignores_blank_messages() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/openai")
            .expect(0)
            .create_async()
            .await;
        let app = test_app(&server.url());

        let response = post(&app, "/api/chat", json!({"message": "  "})).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_to_string(response.into_body()).await;
        assert!(!body.contains("data:"));
        mock.assert_async().await;

        let active = active(&app).await;
        assert_eq!(active["isDraft"], true);
    }

    /// Tests a second send is refused while the first is streaming and
    /// that the first stays cancellable
    #[tokio::test(flavor = "multi_thread")]
    async fn it_rejects_overlapping_sends() {
        let mut server = mockito::Server::new_async().await;
        let _chat = server
            .mock("POST", "/openai")
            .match_body(Matcher::PartialJson(json!({"stream": true})))
            .with_header("content-type", "text/event-stream")
            .with_chunked_body(|w| {
                w.write_all(b"data: {\"choices\":[{\"delta\":{\"content\":\"Slow\"}}]}\n\n")?;
                w.flush()?;
                std::thread::sleep(std::time::Duration::from_secs(2));
                w.write_all(b"data: [DONE]\n\n")
            })
            .create_async()
            .await;
        let _title = mock_title(&mut server, "Slow Reply").await;
        let app = test_app(&server.url());

        let first = post(&app, "/api/chat", json!({"message": "Hello"})).await;
        assert_eq!(first.status(), StatusCode::OK);
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;

        let second = post(&app, "/api/chat", json!({"message": "Again"})).await;
        assert_eq!(second.status(), StatusCode::CONFLICT);

        let describe = post(
            &app,
            "/api/describe",
            json!({"image": "/9j/4AAQSkZJRg==", "mime": "image/jpeg", "file_name": "cat.jpg"}),
        )
        .await;
        assert_eq!(describe.status(), StatusCode::CONFLICT);

        let cancel = post(&app, "/api/chat/cancel", json!({})).await;
        let body = body_to_string(cancel.into_body()).await;
        assert_eq!(body, r#"{"cancelled":true}"#);

        let stream = body_to_string(first.into_body()).await;
        assert!(stream.contains(r#""type":"error""#));

        let active = active(&app).await;
        let messages = active["messages"].as_array().unwrap();
        assert!(messages.iter().all(|m| m["content"] != "Again"));
        assert_eq!(active["status"], "idle");
    }

    /// Tests cancelling with nothing in flight is a no-op
    #[tokio::test]
    async fn it_cancels_when_idle() {
        let app = test_app("http://127.0.0.1:9");
        let response = post(&app, "/api/chat/cancel", json!({})).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_to_string(response.into_body()).await;
        assert_eq!(body, r#"{"cancelled":false}"#);
    }

    /// Tests describing an uploaded image
    #[tokio::test]
    async fn it_describes_an_image() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/openai")
            .match_body(Matcher::Regex(
                "data:image/jpeg;base64,/9j/4AAQ".to_string(),
            ))
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"content":"A cat on a sofa"}}]}"#)
            .create_async()
            .await;
        let _title = mock_title(&mut server, "Cat Photo").await;
        let app = test_app(&server.url());

        let response = post(
            &app,
            "/api/describe",
            json!({
                "image": "/9j/4AAQSkZJRg==",
                "mime": "image/jpeg",
                "file_name": "cat.jpg",
                "question": "What is this?"
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value =
            serde_json::from_str(&body_to_string(response.into_body()).await).unwrap();
        mock.assert_async().await;
        assert_eq!(body["message"]["content"], "A cat on a sofa");

        let active = active(&app).await;
        let messages = active["messages"].as_array().unwrap();
        assert_eq!(messages[1]["content"], "What is this?");
        assert_eq!(messages[1]["image"], "cat.jpg");
    }

    /// Tests undecodable uploads are rejected
    #[tokio::test]
    async fn it_rejects_invalid_image_data() {
        let app = test_app("http://127.0.0.1:9");
        let response = post(
            &app,
            "/api/describe",
            json!({"image": "not base64!!", "mime": "image/png", "file_name": "x.png"}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
