use actix_web::{web, FromRequest};
use futures_util::future::LocalBoxFuture;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use validator::Validate;

use crate::{api::error, modules::user::schema::UserRole};

/// Token payload issued by the platform's auth service. This service only
/// verifies and reads it, it never issues tokens outside of tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: uuid::Uuid,
    pub iat: u64,
    pub exp: u64,
    pub role: UserRole,
}

impl Claims {
    pub fn new(sub: &uuid::Uuid, role: &UserRole, ttl_secs: u64) -> Self {
        let now = chrono::Utc::now().timestamp() as u64;
        Claims { sub: *sub, iat: now, exp: now + ttl_secs, role: role.clone() }
    }

    #[allow(unused)]
    pub fn encode(&self, secret: &[u8]) -> Result<String, error::SystemError> {
        let header = Header::new(Algorithm::HS256);
        let token = encode(&header, self, &EncodingKey::from_secret(secret))?;
        Ok(token)
    }

    pub fn decode(token: &str, secret: &[u8]) -> Result<Self, error::SystemError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_nbf = false;
        let token_data = decode::<Self>(token, &DecodingKey::from_secret(secret), &validation)?;
        Ok(token_data.claims)
    }
}

/// Escape `%`, `_` and `\` so user input can be embedded in an ILIKE pattern.
pub fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

/// Flatten field-level validator errors into "field: message" lines for the
/// error envelope.
pub fn validation_messages(errors: &validator::ValidationErrors) -> Vec<Cow<'static, str>> {
    let mut messages: Vec<Cow<'static, str>> = Vec::new();
    for (field, kind) in errors.errors() {
        if let validator::ValidationErrorsKind::Field(field_errors) = kind {
            for err in field_errors {
                match &err.message {
                    Some(msg) => messages.push(format!("{}: {}", field, msg).into()),
                    None => messages.push(format!("{}: {}", field, err.code).into()),
                }
            }
        }
    }
    messages
}

pub struct ValidatedJson<T>(pub T);

impl<T> FromRequest for ValidatedJson<T>
where
    T: Validate + serde::de::DeserializeOwned + 'static,
{
    type Error = error::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(
        req: &actix_web::HttpRequest,
        payload: &mut actix_web::dev::Payload,
    ) -> Self::Future {
        let fut = web::Json::<T>::from_request(req, payload);

        Box::pin(async move {
            let json = fut.await.map_err(|e| error::Error::BadRequest(e.to_string().into()))?;
            let model = json.into_inner();
            model.validate().map_err(|e| error::Error::validation(validation_messages(&e)))?;
            Ok(ValidatedJson(model))
        })
    }
}

pub struct ValidatedQuery<T>(pub T);

impl<T> FromRequest for ValidatedQuery<T>
where
    T: Validate + serde::de::DeserializeOwned + 'static,
{
    type Error = error::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(
        req: &actix_web::HttpRequest,
        payload: &mut actix_web::dev::Payload,
    ) -> Self::Future {
        let fut = web::Query::<T>::from_request(req, payload);

        Box::pin(async move {
            let query = fut.await.map_err(|e| error::Error::BadRequest(e.to_string().into()))?;
            query.validate().map_err(|e| error::Error::validation(validation_messages(&e)))?;
            Ok(ValidatedQuery(query.into_inner()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{claims_for, TEST_SECRET};

    #[test]
    fn test_claims_roundtrip() {
        let user_id = uuid::Uuid::now_v7();
        let claims = claims_for(user_id, UserRole::Student);

        let token = claims.encode(TEST_SECRET).unwrap();
        let decoded = Claims::decode(&token, TEST_SECRET).unwrap();

        assert_eq!(decoded.sub, user_id);
        assert_eq!(decoded.role, UserRole::Student);
        assert_eq!(decoded.exp, claims.exp);
    }

    #[test]
    fn test_claims_wrong_secret_rejected() {
        let claims = claims_for(uuid::Uuid::now_v7(), UserRole::Instructor);
        let token = claims.encode(TEST_SECRET).unwrap();

        assert!(Claims::decode(&token, b"another-secret").is_err());
    }

    #[test]
    fn test_claims_expired_rejected() {
        let now = chrono::Utc::now().timestamp() as u64;
        let claims = Claims {
            sub: uuid::Uuid::now_v7(),
            iat: now - 7200,
            exp: now - 3600,
            role: UserRole::Student,
        };
        let token = claims.encode(TEST_SECRET).unwrap();

        assert!(Claims::decode(&token, TEST_SECRET).is_err());
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("plain"), "plain");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("snake_case"), "snake\\_case");
        assert_eq!(escape_like("back\\slash"), "back\\\\slash");
        assert_eq!(escape_like("%_\\"), "\\%\\_\\\\");
    }

    #[test]
    fn test_validation_messages() {
        #[derive(Validate)]
        struct Form {
            #[validate(length(min = 3, message = "too short"))]
            name: String,
            #[validate(range(min = 1, message = "must be positive"))]
            count: i64,
        }

        let form = Form { name: "ab".to_string(), count: 0 };
        let errors = form.validate().unwrap_err();
        let messages = validation_messages(&errors);

        assert_eq!(messages.len(), 2);
        assert!(messages.iter().any(|m| m == "name: too short"));
        assert!(messages.iter().any(|m| m == "count: must be positive"));
    }
}
