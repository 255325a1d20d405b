//! In-process stand-in for the Cloudflare API v4
//!
//! Serves the zone, settings, Universal SSL and DNS record endpoints the
//! declarer uses, keeps their state in memory and logs every request it
//! receives. Each response closes its connection, so requests are logged in
//! the order the client issued them.

#![allow(dead_code)]

use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// One request as received by the fake API
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    /// Path without the query string
    pub path: String,
    /// Percent-decoded query parameters
    pub query: HashMap<String, String>,
    pub authorization: Option<String>,
    pub body: Value,
}

impl SeenRequest {
    /// `METHOD /path`
    pub fn call(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    pub fn is_write(&self) -> bool {
        self.method != "GET"
    }
}

#[derive(Debug, Clone)]
pub struct FakeZone {
    pub id: String,
    pub name: String,
    pub settings: BTreeMap<String, String>,
    pub universal_ssl: bool,
}

#[derive(Debug, Default)]
struct State {
    zones: Vec<FakeZone>,
    /// (zone id, record as returned by the API)
    records: Vec<(String, Value)>,
    requests: Vec<SeenRequest>,
    fail_with: Option<u16>,
    next_id: usize,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn add_zone(&mut self, name: &str) -> String {
        let id = self.next_id("zone");
        let settings = [("ssl", "flexible"), ("min_tls_version", "1.0"), ("0rtt", "off")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.zones.push(FakeZone {
            id: id.clone(),
            name: name.to_string(),
            settings,
            universal_ssl: false,
        });
        id
    }

    fn zone_mut(&mut self, id: &str) -> Option<&mut FakeZone> {
        self.zones.iter_mut().find(|z| z.id == id)
    }

    fn handle(&mut self, request: &SeenRequest) -> (u16, Value) {
        if let Some(status) = self.fail_with {
            return (status, failure("request rejected"));
        }

        let segments: Vec<&str> = request.path.trim_start_matches('/').split('/').collect();
        match (request.method.as_str(), segments.as_slice()) {
            ("GET", ["zones"]) => {
                let name = request.query.get("name");
                let found: Vec<Value> = self
                    .zones
                    .iter()
                    .filter(|z| Some(&z.name) == name)
                    .map(|z| json!({ "id": z.id, "name": z.name }))
                    .collect();
                success(json!(found))
            }
            ("POST", ["zones"]) => {
                let name = request.body["name"].as_str().unwrap_or_default().to_string();
                let id = self.add_zone(&name);
                success(json!({ "id": id, "name": name }))
            }
            ("GET", ["zones", id, "settings"]) => match self.zone_mut(id) {
                Some(zone) => {
                    let items: Vec<Value> = zone
                        .settings
                        .iter()
                        .map(|(k, v)| json!({ "id": k, "value": v }))
                        .collect();
                    success(json!(items))
                }
                None => not_found(),
            },
            ("PATCH", ["zones", id, "settings"]) => {
                let items = request.body["items"].as_array().cloned().unwrap_or_default();
                match self.zone_mut(id) {
                    Some(zone) => {
                        for item in items {
                            let key = item["id"].as_str().unwrap_or_default().to_string();
                            let value = item["value"].as_str().unwrap_or_default().to_string();
                            zone.settings.insert(key, value);
                        }
                        success(json!([]))
                    }
                    None => not_found(),
                }
            }
            ("GET", ["zones", id, "ssl", "universal", "settings"]) => match self.zone_mut(id) {
                Some(zone) => success(json!({ "enabled": zone.universal_ssl })),
                None => not_found(),
            },
            ("PATCH", ["zones", id, "ssl", "universal", "settings"]) => {
                let enabled = request.body["enabled"].as_bool().unwrap_or(false);
                match self.zone_mut(id) {
                    Some(zone) => {
                        zone.universal_ssl = enabled;
                        success(json!({ "enabled": enabled }))
                    }
                    None => not_found(),
                }
            }
            ("GET", ["zones", id, "dns_records"]) => {
                let comment = request.query.get("comment.exact");
                let found: Vec<Value> = self
                    .records
                    .iter()
                    .filter(|(zone_id, record)| {
                        zone_id == id && record["comment"].as_str() == comment.map(String::as_str)
                    })
                    .map(|(_, record)| record.clone())
                    .collect();
                success(json!(found))
            }
            ("POST", ["zones", id, "dns_records"]) => {
                let mut record = request.body.clone();
                record["id"] = json!(self.next_id("rec"));
                self.records.push((id.to_string(), record.clone()));
                success(record)
            }
            ("PUT", ["zones", id, "dns_records", record_id]) => {
                let stored = self
                    .records
                    .iter_mut()
                    .find(|(zone_id, record)| zone_id == id && record["id"] == *record_id);
                match stored {
                    Some((_, record)) => {
                        let mut replacement = request.body.clone();
                        replacement["id"] = json!(record_id);
                        *record = replacement.clone();
                        success(replacement)
                    }
                    None => not_found(),
                }
            }
            _ => not_found(),
        }
    }
}

fn success(result: Value) -> (u16, Value) {
    (200, json!({ "success": true, "errors": [], "messages": [], "result": result }))
}

fn failure(message: &str) -> Value {
    json!({ "success": false, "errors": [{ "code": 1000, "message": message }], "result": null })
}

fn not_found() -> (u16, Value) {
    (404, failure("not found"))
}

/// Running fake API; dropped with the test runtime
pub struct FakeCloudflare {
    addr: SocketAddr,
    state: Arc<Mutex<State>>,
}

impl FakeCloudflare {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(State::default()));

        let server_state = state.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = server_state.clone();
                tokio::spawn(serve(stream, state));
            }
        });

        Self { addr, state }
    }

    /// Base URL to hand to `CloudflareDeclarer::with_api_base`
    pub fn api_base(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Create a zone before the run, with Cloudflare's default settings
    pub fn seed_zone(&self, name: &str) -> String {
        self.state.lock().unwrap().add_zone(name)
    }

    /// Answer every following request with this status
    pub fn fail_with(&self, status: u16) {
        self.state.lock().unwrap().fail_with = Some(status);
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    /// `METHOD /path` of every request, in order
    pub fn calls(&self) -> Vec<String> {
        self.requests().iter().map(SeenRequest::call).collect()
    }

    pub fn writes(&self) -> Vec<SeenRequest> {
        self.requests().into_iter().filter(SeenRequest::is_write).collect()
    }

    pub fn clear_requests(&self) {
        self.state.lock().unwrap().requests.clear();
    }

    pub fn zone(&self, id: &str) -> Option<FakeZone> {
        self.state.lock().unwrap().zone_mut(id).cloned()
    }

    /// Stored records, in creation order
    pub fn records(&self) -> Vec<Value> {
        let state = self.state.lock().unwrap();
        state.records.iter().map(|(_, record)| record.clone()).collect()
    }

    /// Change a stored record behind the declarer's back
    pub fn edit_record(&self, comment: &str, field: &str, value: Value) {
        let mut state = self.state.lock().unwrap();
        let (_, record) = state
            .records
            .iter_mut()
            .find(|(_, record)| record["comment"] == comment)
            .expect("record exists");
        record[field] = value;
    }
}

async fn serve(mut stream: TcpStream, state: Arc<Mutex<State>>) {
    let Some(request) = read_request(&mut stream).await else {
        return;
    };

    let (status, body) = {
        let mut state = state.lock().unwrap();
        let response = state.handle(&request);
        state.requests.push(request);
        response
    };

    let body = body.to_string();
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        if status == 200 { "OK" } else { "Error" },
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

async fn read_request(stream: &mut TcpStream) -> Option<SeenRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let header = |name: &str| {
        head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim().to_string())
        })
    };
    let content_length: usize = header("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let body = &buf[header_end..header_end + content_length];
    let body = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(body).ok()?
    };

    let mut request_line = head.lines().next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let target = request_line.next()?;
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    let query = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            Some((percent_decode(key), percent_decode(value)))
        })
        .collect();

    Some(SeenRequest {
        method,
        path: path.to_string(),
        query,
        authorization: header("authorization"),
        body,
    })
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or("");
                match u8::from_str_radix(hex, 16) {
                    Ok(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    Err(_) => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}
