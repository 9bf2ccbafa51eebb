//! Integration tests for the model registry endpoint

mod test_utils;

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::util::ServiceExt;

    use crate::test_utils::{body_to_string, test_app, test_config};
    use crosstalk::api::public::models::ModelsResponse;

    #[tokio::test]
    async fn it_lists_the_model_registry() {
        let server = mockito::Server::new_async().await;
        let app = test_app(test_config(&server.url()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/models")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = body_to_string(response.into_body()).await;
        let parsed: ModelsResponse = serde_json::from_str(&body).unwrap();

        assert!(parsed.models.iter().any(|m| m.id == "gpt-4"));
        assert!(parsed.models.iter().any(|m| m.id == "chat-bison"));
        // Exactly one default model
        assert_eq!(parsed.models.iter().filter(|m| m.default).count(), 1);
    }

    #[tokio::test]
    async fn it_requires_auth_for_the_model_listing_too() {
        let server = mockito::Server::new_async().await;
        let mut config = test_config(&server.url());
        config.auth_disabled = false;

        let app = test_app(config);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/models")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
