use std::collections::VecDeque;

use http::Method;

use crate::client::flow::state::{Initial, Parsed, Sent};
use crate::client::flow::Cycle;
use crate::client::RedirectAuthHeaders;
use crate::transport::Transport;
use crate::uri::UrlParts;
use crate::{Error, Headers};

/// Transport answering from a script and remembering what was sent.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: VecDeque<Result<Vec<u8>, Error>>,
    pub sent: Vec<(UrlParts, Vec<u8>)>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, raw: &[u8]) -> Self {
        self.replies.push_back(Ok(raw.to_vec()));
        self
    }

    pub fn fail(mut self, err: Error) -> Self {
        self.replies.push_back(Err(err));
        self
    }

    /// Keep answering with the same redirect.
    pub fn redirect_forever(mut self, location: &str, n: usize) -> Self {
        for _ in 0..n {
            let raw = format!("HTTP/1.1 302 Found\r\nLocation: {}\r\n\r\n", location);
            self.replies.push_back(Ok(raw.into_bytes()));
        }
        self
    }

    pub fn exchanges(&self) -> usize {
        self.sent.len()
    }

    pub fn sent_text(&self, i: usize) -> String {
        String::from_utf8(self.sent[i].1.clone()).unwrap()
    }
}

impl Transport for ScriptedTransport {
    fn exchange(&mut self, url: &UrlParts, request: &[u8]) -> Result<Vec<u8>, Error> {
        self.sent.push((url.clone(), request.to_vec()));
        self.replies
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted reply for {}", url))
    }
}

pub struct Scenario {
    url: String,
    method: Method,
    headers: Headers,
    body: String,
    follow_redirects: bool,
    redirect_auth_headers: RedirectAuthHeaders,
}

impl Scenario {
    pub fn builder() -> ScenarioBuilder {
        ScenarioBuilder(Scenario {
            url: String::new(),
            method: Method::GET,
            headers: Headers::new(),
            body: String::new(),
            follow_redirects: true,
            redirect_auth_headers: RedirectAuthHeaders::SameHost,
        })
    }

    pub fn to_initial(&self) -> Cycle<Initial> {
        let mut cycle = Cycle::new(
            &self.url,
            self.method.clone(),
            self.headers.clone(),
            self.body.clone(),
        )
        .unwrap();

        cycle.follow_redirects(self.follow_redirects);
        cycle.redirect_auth_headers(self.redirect_auth_headers);

        cycle
    }

    pub fn to_sent(&self, response: &[u8]) -> Cycle<Sent> {
        let mut transport = ScriptedTransport::new().reply(response);
        self.to_initial().send(&mut transport).unwrap()
    }

    pub fn to_parsed(&self, response: &[u8]) -> Cycle<Parsed> {
        self.to_sent(response).proceed().unwrap()
    }
}

pub struct ScenarioBuilder(Scenario);

impl ScenarioBuilder {
    pub fn get(self, url: &str) -> Self {
        self.method(Method::GET, url)
    }

    pub fn post(self, url: &str) -> Self {
        self.method(Method::POST, url)
    }

    pub fn method(mut self, method: Method, url: &str) -> Self {
        self.0.method = method;
        self.0.url = url.to_string();
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.0.headers.set(name, value).unwrap();
        self
    }

    pub fn body(mut self, body: &str) -> Self {
        self.0.body = body.to_string();
        self
    }

    pub fn follow_redirects(mut self, v: bool) -> Self {
        self.0.follow_redirects = v;
        self
    }

    pub fn redirect_auth_headers(mut self, v: RedirectAuthHeaders) -> Self {
        self.0.redirect_auth_headers = v;
        self
    }

    pub fn build(self) -> Scenario {
        self.0
    }
}
