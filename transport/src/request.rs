/// The two auth mechanisms an adapter can declare support for (§4.A/§6).
#[derive(Debug, Clone)]
pub enum AuthMethod {
	Bearer(String),
	Basic { username: String, password: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
	Get,
	Post,
}

/// A fully-built, adapter-agnostic HTTP request. Adapters construct one of
/// these per call in `BuildRequest`; this crate injects auth and executes it.
#[derive(Debug, Clone)]
pub struct HttpRequest {
	pub method: HttpMethod,
	pub url: String,
	pub headers: Vec<(String, String)>,
	pub body: Option<Vec<u8>>,
}

impl HttpRequest {
	pub fn get(url: impl Into<String>) -> Self {
		Self { method: HttpMethod::Get, url: url.into(), headers: Vec::new(), body: None }
	}

	pub fn post_json(url: impl Into<String>, body: Vec<u8>) -> Self {
		Self {
			method: HttpMethod::Post,
			url: url.into(),
			headers: vec![("content-type".to_string(), "application/json".to_string())],
			body: Some(body),
		}
	}

	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));
		self
	}
}
