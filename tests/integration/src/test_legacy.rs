//! Unversioned (v0) signature integration tests.
//!
//! These expect the server to run with `KEYAUTH_ALLOW_LEGACY=true`, the default.

#[cfg(test)]
mod tests {
    use keyauth::SchemaVersion;
    use reqwest::Method;

    use crate::{http_client, now, owner_id, send_json, signed_request, signer};

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_authenticate_legacy_signature() {
        let client = http_client();
        let req = signed_request(
            &client,
            &signer(SchemaVersion::V0),
            Method::GET,
            "/wp-json/wp/v2/users/me",
            &[],
            now(),
        );

        let (status, json) = send_json(req).await.unwrap();
        assert_eq!(status, 200);
        assert_eq!(json["principal"], owner_id());
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_accept_legacy_signature_despite_body_change() {
        // v0 does not cover the body, so the server only checks the signed fields.
        let client = http_client();
        let signer = signer(SchemaVersion::V0);
        let headers = signer.sign("POST", "/posts", &[], now());

        let mut req = client
            .post(format!("{}/posts", crate::endpoint_url()))
            .header("content-type", "application/x-www-form-urlencoded")
            .body("title=Anything");
        for (name, value) in headers.pairs() {
            req = req.header(name, value);
        }

        let (status, _) = send_json(req).await.unwrap();
        assert_eq!(status, 200);
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_reject_unknown_version() {
        let client = http_client();
        // A v0 signer sends no version header of its own.
        let req = signed_request(
            &client,
            &signer(SchemaVersion::V0),
            Method::GET,
            "/me",
            &[],
            now(),
        )
        .header("x-api-version", "2");

        let (status, _) = send_json(req).await.unwrap();
        assert_eq!(status, 401);
    }
}
