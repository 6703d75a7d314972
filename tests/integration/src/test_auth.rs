//! Versioned (v1) signature integration tests.

#[cfg(test)]
mod tests {
    use keyauth::SchemaVersion;
    use reqwest::Method;

    use crate::{endpoint_url, http_client, now, owner_id, send_json, signed_request, signer};

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_authenticate_signed_get() {
        let client = http_client();
        let req = signed_request(
            &client,
            &signer(SchemaVersion::V1),
            Method::GET,
            "/wp-json/wp/v2/users/me",
            &[],
            now(),
        );

        let (status, json) = send_json(req).await.unwrap();
        assert_eq!(status, 200);
        assert_eq!(json["principal"], owner_id());
        assert_eq!(json["path"], "/wp-json/wp/v2/users/me");
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_authenticate_signed_form_post() {
        let client = http_client();
        let req = signed_request(
            &client,
            &signer(SchemaVersion::V1),
            Method::POST,
            "/wp-json/wp/v2/posts?context=edit",
            &[("title", "Hello World"), ("status", "draft")],
            now(),
        );

        let (status, json) = send_json(req).await.unwrap();
        assert_eq!(status, 200);
        assert_eq!(json["method"], "POST");
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_reject_expired_timestamp() {
        let client = http_client();
        let req = signed_request(
            &client,
            &signer(SchemaVersion::V1),
            Method::GET,
            "/me",
            &[],
            now() - 301,
        );

        let (status, json) = send_json(req).await.unwrap();
        assert_eq!(status, 401);
        assert_eq!(json["code"], "unauthorized");
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_reject_tampered_path() {
        let client = http_client();
        let signer = signer(SchemaVersion::V1);
        let headers = signer.sign("GET", "/me", &[], now());

        let mut req = client.get(format!("{}/someone-else", endpoint_url()));
        for (name, value) in headers.pairs() {
            req = req.header(name, value);
        }

        let (status, _) = send_json(req).await.unwrap();
        assert_eq!(status, 401);
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_refuse_unsigned_request() {
        let client = http_client();
        let endpoint = endpoint_url();

        let (status, json) = send_json(client.get(format!("{endpoint}/me")))
            .await
            .unwrap();
        assert_eq!(status, 401);
        assert!(json["requestId"].is_string());
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_serve_health_without_credentials() {
        let client = http_client();
        let endpoint = endpoint_url();

        let (status, json) = send_json(client.get(format!("{endpoint}/_health")))
            .await
            .unwrap();
        assert_eq!(status, 200);
        assert_eq!(json["status"], "running");
    }
}
