use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;

use log::debug;
use reqwest::redirect::Policy;
use reqwest::Client;

use crate::error::TransportError;

// Form fields sent with a request: query string for GET, urlencoded body for POST.
pub type Form = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
        })
    }
}

// The HTTP collaborator. Implementations must keep cookies between calls and
// follow 301/302 redirects for every method, the way a browser XHR does.
pub trait Transport {
    // Sends one request and returns the body of a 2xx response.
    fn send(
        &self,
        method: Method,
        url: &str,
        form: &Form,
    ) -> impl Future<Output = Result<String, TransportError>> + Send;
}

// `reqwest` client with a cookie jar, one per portal session.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    // Cookie jar on, at most 10 redirects followed.
    pub fn new() -> Result<Self, TransportError> {
        // reqwest turns a redirected POST into a GET on 301/302, same as XHR
        let client = Client::builder()
            .cookie_store(true)
            .redirect(Policy::limited(10))
            .build()?;
        Ok(ReqwestTransport { client })
    }
}

impl Transport for ReqwestTransport {
    // GET sends the form as the query string, POST as an urlencoded body.
    async fn send(&self, method: Method, url: &str, form: &Form) -> Result<String, TransportError> {
        // never log the form itself, it carries the password on login
        debug!("{} {} ({} fields)", method, url, form.len());

        let request = match method {
            Method::Get => self.client.get(url).query(form),
            Method::Post => self.client.post(url).form(form),
        };
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: response.url().to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }
}
