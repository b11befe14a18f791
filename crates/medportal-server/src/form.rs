//! Request bodies that may arrive as JSON or as multipart form data.

use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::{StatusCode, header::CONTENT_TYPE},
};
use medportal_api::ApiError;
use serde_json::{Map, Value};

/// One file part of a multipart body.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl UploadedFile {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Text fields and files of a request body.
///
/// JSON objects populate `fields` directly. Multipart text parts become
/// strings; a name repeated across parts becomes an array.
#[derive(Debug, Clone, Default)]
pub struct RequestForm {
    pub fields: Map<String, Value>,
    pub files: Vec<UploadedFile>,
}

impl RequestForm {
    pub fn from_json(value: Value) -> Result<Self, ApiError> {
        match value {
            Value::Object(fields) => Ok(Self {
                fields,
                files: Vec::new(),
            }),
            _ => Err(ApiError::bad_request("Request body must be a JSON object")),
        }
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    /// The field as a string, if it is one.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(Value::as_str)
    }

    pub fn file(&self, field: &str) -> Option<&UploadedFile> {
        self.files.iter().find(|f| f.field == field)
    }

    pub fn files_for<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a UploadedFile> {
        self.files.iter().filter(move |f| f.field == field)
    }

    fn push_text(&mut self, name: String, text: String) {
        match self.fields.get_mut(&name) {
            Some(Value::Array(items)) => items.push(Value::String(text)),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(text)]);
            }
            None => {
                self.fields.insert(name, Value::String(text));
            }
        }
    }

    async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| body_error(e.status(), format!("Invalid multipart body: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(str::to_string);
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| body_error(e.status(), format!("Invalid multipart body: {e}")))?;
            match file_name {
                Some(file_name) => form.files.push(UploadedFile {
                    field: name,
                    file_name,
                    content_type,
                    bytes,
                }),
                None => {
                    let text = String::from_utf8(bytes.to_vec()).map_err(|_| {
                        ApiError::bad_request(format!("Field {name} is not valid UTF-8"))
                    })?;
                    form.push_text(name, text);
                }
            }
        }
        Ok(form)
    }
}

impl<S> FromRequest<S> for RequestForm
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| body_error(e.status(), e.body_text()))?;
            return Self::from_multipart(multipart).await;
        }

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| body_error(e.status(), e.body_text()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        if !content_type.is_empty() && !content_type.contains("json") {
            return Err(ApiError::bad_request(format!(
                "Unsupported content type: {content_type}"
            )));
        }
        let value: Value = serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {e}")))?;
        Self::from_json(value)
    }
}

/// Body read failures are 400s, except an exceeded body limit which stays 413.
fn body_error(status: StatusCode, message: String) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large(message)
    } else {
        ApiError::bad_request(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde_json::json;

    async fn extract(content_type: Option<&str>, body: &'static str) -> Result<RequestForm, ApiError> {
        let mut builder = Request::builder().method("POST").uri("/");
        if let Some(ct) = content_type {
            builder = builder.header(CONTENT_TYPE, ct);
        }
        RequestForm::from_request(builder.body(Body::from(body)).unwrap(), &()).await
    }

    #[tokio::test]
    async fn json_object_body() {
        let form = extract(Some("application/json"), r#"{"title":"Hello","n":null}"#)
            .await
            .unwrap();
        assert_eq!(form.text("title"), Some("Hello"));
        assert!(form.value("n").is_none());
        assert!(form.files.is_empty());
    }

    #[tokio::test]
    async fn rejects_non_object_json() {
        let err = extract(Some("application/json"), "[1,2]").await.unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
        assert!(extract(Some("application/json"), "{").await.is_err());
        assert!(extract(Some("text/plain"), "hi").await.is_err());
    }

    #[test]
    fn body_limit_failures_keep_413() {
        let err = body_error(StatusCode::PAYLOAD_TOO_LARGE, "length limit exceeded".into());
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        let err = body_error(StatusCode::BAD_REQUEST, "bad framing".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn empty_body_is_an_empty_form() {
        let form = extract(None, "").await.unwrap();
        assert!(form.fields.is_empty());
    }

    #[tokio::test]
    async fn multipart_fields_and_files() {
        let body = concat!(
            "--XX\r\n",
            "Content-Disposition: form-data; name=\"reportID\"\r\n\r\n",
            "R-1\r\n",
            "--XX\r\n",
            "Content-Disposition: form-data; name=\"tag\"\r\n\r\n",
            "a\r\n",
            "--XX\r\n",
            "Content-Disposition: form-data; name=\"tag\"\r\n\r\n",
            "b\r\n",
            "--XX\r\n",
            "Content-Disposition: form-data; name=\"report\"; filename=\"r.pdf\"\r\n",
            "Content-Type: application/pdf\r\n\r\n",
            "%PDF\r\n",
            "--XX--\r\n",
        );
        let form = extract(Some("multipart/form-data; boundary=XX"), body)
            .await
            .unwrap();
        assert_eq!(form.text("reportID"), Some("R-1"));
        assert_eq!(form.value("tag"), Some(&json!(["a", "b"])));
        let file = form.file("report").unwrap();
        assert_eq!(file.file_name, "r.pdf");
        assert_eq!(file.content_type, "application/pdf");
        assert_eq!(&file.bytes[..], b"%PDF");
    }
}
