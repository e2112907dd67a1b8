//! Extractors that reject with [`ApiError`] so malformed input gets the
//! same error body as everything else.

use std::fmt::Display;

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
    Json,
};
use mongodb::bson::oid::ObjectId;
use serde::de::DeserializeOwned;
use serde_json::Value;
use serde_path_to_error::Segment;
use tracing::debug;
use validator::{Validate, ValidationErrors};

use crate::error::{ApiError, FieldError};

/// Body fields that must be present. Each absent one is reported on its own.
pub trait RequiredFields {
    const REQUIRED: &'static [&'static str] = &[];
}

/// JSON body, deserialized and then checked with `validator`.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + RequiredFields,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(body) = Json::<Value>::from_request(req, state)
            .await
            .map_err(json_rejection)?;
        let missing = missing_fields(&body, T::REQUIRED);
        if !missing.is_empty() {
            return Err(ApiError::Validation(missing));
        }
        let value: T = serde_path_to_error::deserialize(body)
            .map_err(|e| ApiError::Validation(vec![deserialize_error("body", &e)]))?;
        value
            .validate()
            .map_err(|e| ApiError::Validation(field_errors("body", &e)))?;
        Ok(Self(value))
    }
}

/// Query string, deserialized and then checked with `validator`.
pub struct ValidatedQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parse_query::<T>(parts.uri.query().unwrap_or_default())?;
        value
            .validate()
            .map_err(|e| ApiError::Validation(field_errors("query", &e)))?;
        Ok(Self(value))
    }
}

/// Same decoding as axum's `Query`, but keeps the name of the offending parameter.
fn parse_query<T: DeserializeOwned>(query: &str) -> Result<T, ApiError> {
    let deserializer = serde_urlencoded::Deserializer::new(form_urlencoded::parse(query.as_bytes()));
    serde_path_to_error::deserialize(deserializer)
        .map_err(|e| ApiError::Validation(vec![deserialize_error("query", &e)]))
}

/// `{id}` path segment parsed as an ObjectId. Malformed ids are a 400, not a 404.
pub struct UserId(pub ObjectId);

#[async_trait]
impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|rej| ApiError::BadRequest(rej.body_text()))?;
        ObjectId::parse_str(&raw).map(UserId).map_err(|_| {
            debug!(id = %raw, "malformed user id");
            ApiError::BadRequest("Invalid user id".into())
        })
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    let kind = match &rejection {
        JsonRejection::JsonSyntaxError(_) => "json_invalid",
        JsonRejection::MissingJsonContentType(_) => "content_type",
        _ => "body_error",
    };
    ApiError::Validation(vec![FieldError::new(&["body"], rejection.body_text(), kind)])
}

fn missing_fields(body: &Value, required: &[&str]) -> Vec<FieldError> {
    let Some(object) = body.as_object() else {
        return Vec::new();
    };
    required
        .iter()
        .filter(|field| !object.contains_key(**field))
        .map(|field| FieldError::new(&["body", *field], "Field required", "missing"))
        .collect()
}

/// Turns a serde failure into a field error located at the path serde was at.
fn deserialize_error<E: Display>(location: &str, err: &serde_path_to_error::Error<E>) -> FieldError {
    let mut loc = vec![location.to_owned()];
    for segment in err.path().iter() {
        match segment {
            Segment::Map { key } => loc.push(key.clone()),
            Segment::Seq { index } => loc.push(index.to_string()),
            Segment::Enum { variant } => loc.push(variant.clone()),
            Segment::Unknown => {}
        }
    }
    let msg = err.inner().to_string();
    let kind = match missing_field(&msg) {
        Some(field) => {
            loc.push(field.to_owned());
            "missing"
        }
        None => "type_error",
    };
    FieldError {
        loc,
        msg,
        kind: kind.into(),
    }
}

/// Pulls `name` out of serde's "missing field `name`" message.
fn missing_field(message: &str) -> Option<&str> {
    let rest = message.split("missing field `").nth(1)?;
    rest.split('`').next().filter(|name| !name.is_empty())
}

fn field_errors(location: &str, errors: &ValidationErrors) -> Vec<FieldError> {
    let mut fields: Vec<FieldError> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            let name = field.to_string();
            errs.iter().map(move |e| {
                let msg = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("invalid value for {name}"));
                FieldError::new(&[location, name.as_str()], msg, e.code.to_string())
            })
        })
        .collect();
    fields.sort_by(|a, b| a.loc.cmp(&b.loc));
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::dto::{CreateUserRequest, Pagination};

    #[test]
    fn finds_missing_field_name() {
        let msg = "Failed to deserialize the JSON body into the target type: missing field `email` at line 1 column 30";
        assert_eq!(missing_field(msg), Some("email"));
        assert_eq!(missing_field("invalid type: integer `5`, expected a string"), None);
    }

    #[test]
    fn every_absent_required_field_is_reported() {
        let body = serde_json::json!({ "username": "u" });
        let fields = missing_fields(&body, CreateUserRequest::REQUIRED);
        let locs: Vec<_> = fields.iter().map(|f| f.loc.clone()).collect();
        assert_eq!(locs, vec![vec!["body", "email"], vec!["body", "password"]]);
        assert!(fields.iter().all(|f| f.kind == "missing"));
    }

    #[test]
    fn wrong_type_is_located_at_its_field() {
        let body = serde_json::json!({ "username": 5, "email": "a@example.com", "password": "pw" });
        let err = serde_path_to_error::deserialize::<_, CreateUserRequest>(body).unwrap_err();
        let field = deserialize_error("body", &err);
        assert_eq!(field.loc, vec!["body", "username"]);
        assert_eq!(field.kind, "type_error");
        assert!(field.msg.contains("invalid type"));
    }

    #[test]
    fn bad_query_value_names_the_parameter() {
        match parse_query::<Pagination>("skip=-1&limit=5") {
            Err(ApiError::Validation(fields)) => {
                assert_eq!(fields.len(), 1);
                assert_eq!(fields[0].loc, vec!["query", "skip"]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        let page = parse_query::<Pagination>("").unwrap();
        assert_eq!((page.skip, page.limit), (0, 100));
    }

    #[test]
    fn validation_errors_are_sorted_per_field() {
        let input = CreateUserRequest {
            username: String::new(),
            email: String::new(),
            password: "pw".into(),
            is_active: true,
        };
        let errors = input.validate().unwrap_err();
        let fields = field_errors("body", &errors);

        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].loc, vec!["body", "email"]);
        assert_eq!(fields[0].msg, "email must not be empty");
        assert_eq!(fields[1].loc, vec!["body", "username"]);
        assert_eq!(fields[1].kind, "length");
    }

    #[test]
    fn oversized_limit_is_rejected() {
        let page = Pagination { skip: 0, limit: 5000 };
        let fields = field_errors("query", &page.validate().unwrap_err());
        assert_eq!(fields[0].loc, vec!["query", "limit"]);
        assert_eq!(fields[0].kind, "range");
    }
}
