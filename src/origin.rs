use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, Response, StatusCode, header};

// Origins allowed to call the generate endpoint
pub const ALLOWED_ORIGINS: [&str; 2] = ["https://os.ryo.lu", "http://localhost:3000"];

/// The request's `Origin` if it is allow-listed.
pub fn allowed_origin(headers: &HeaderMap) -> Option<&'static str> {
    let origin = headers.get(header::ORIGIN)?.to_str().ok()?;
    ALLOWED_ORIGINS.into_iter().find(|allowed| *allowed == origin)
}

pub fn with_cors(mut response: Response<Body>, origin: &'static str) -> Response<Body> {
    response.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static(origin),
    );
    response
}

// Answer to an OPTIONS preflight
pub fn preflight(origin: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NO_CONTENT;
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    with_cors(response, origin)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_origin(origin: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ORIGIN, HeaderValue::from_str(origin).unwrap());
        headers
    }

    #[test]
    fn only_listed_origins_pass() {
        assert_eq!(
            allowed_origin(&headers_with_origin("http://localhost:3000")),
            Some("http://localhost:3000")
        );
        assert_eq!(allowed_origin(&headers_with_origin("https://evil.example")), None);
        assert_eq!(allowed_origin(&headers_with_origin("https://os.ryo.lu/")), None);
        assert_eq!(allowed_origin(&HeaderMap::new()), None);
    }

    #[test]
    fn preflight_headers() {
        let response = preflight("https://os.ryo.lu");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://os.ryo.lu");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "POST, OPTIONS");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type");
    }
}
