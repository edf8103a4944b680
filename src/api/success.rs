use actix_web::HttpResponse;
use std::borrow::Cow;

#[derive(serde::Serialize)]
pub struct SuccessBody<T: serde::Serialize> {
    pub success: bool,
    pub message: Option<Cow<'static, str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub struct Success<T: serde::Serialize> {
    pub status: actix_web::http::StatusCode,
    pub body: Option<SuccessBody<T>>,
}

impl<T: serde::Serialize> Success<T> {
    pub fn ok(data: Option<T>) -> Self {
        Self {
            status: actix_web::http::StatusCode::OK,
            body: Some(SuccessBody { success: true, data, message: None }),
        }
    }

    pub fn message<M>(mut self, msg: M) -> Self
    where
        M: Into<Cow<'static, str>>,
    {
        if let Some(body) = &mut self.body {
            body.message = Some(msg.into());
        }
        self
    }

    pub fn created(data: Option<T>) -> Self {
        Self {
            status: actix_web::http::StatusCode::CREATED,
            body: Some(SuccessBody { success: true, data, message: None }),
        }
    }

    pub fn no_content() -> Self {
        Self { status: actix_web::http::StatusCode::NO_CONTENT, body: None }
    }
}

impl<T: serde::Serialize> actix_web::Responder for Success<T> {
    type Body = actix_web::body::BoxBody;

    fn respond_to(self, _req: &actix_web::HttpRequest) -> HttpResponse<Self::Body> {
        let mut response = HttpResponse::build(self.status);

        match self.body {
            Some(body) => response.json(body),
            None => response.finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{body::to_bytes, http::StatusCode, test::TestRequest, Responder};

    #[actix_web::test]
    async fn test_ok_envelope() {
        let req = TestRequest::default().to_http_request();
        let resp = Success::ok(Some(serde_json::json!({"unread_count": 3})))
            .message("Conversation marked as read")
            .respond_to(&req);

        assert_eq!(resp.status(), StatusCode::OK);

        let bytes = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Conversation marked as read");
        assert_eq!(json["data"]["unread_count"], 3);
    }

    #[actix_web::test]
    async fn test_created_status() {
        let req = TestRequest::default().to_http_request();
        let resp = Success::created(Some(serde_json::json!({"id": 1}))).respond_to(&req);
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    #[actix_web::test]
    async fn test_no_content_has_empty_body() {
        let req = TestRequest::default().to_http_request();
        let resp = Success::<()>::no_content().respond_to(&req);

        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        let bytes = to_bytes(resp.into_body()).await.unwrap();
        assert!(bytes.is_empty());
    }

    #[actix_web::test]
    async fn test_data_omitted_when_none() {
        let req = TestRequest::default().to_http_request();
        let resp = Success::<()>::ok(None).message("Done").respond_to(&req);
        let bytes = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(json["success"], true);
        assert!(json.get("data").is_none());
    }
}
