use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::{Value, json};

#[derive(Debug, Clone)]
pub struct UpstreamStubConfig {
    /// Total number of series in the listing.
    pub series: usize,
    /// Repeat the previous page's last item at the top of every page after the first.
    pub overlap: bool,
}

impl Default for UpstreamStubConfig {
    fn default() -> Self {
        Self {
            series: 45,
            overlap: false,
        }
    }
}

/// Fake catalog backend plus an image host that enforces hotlink headers.
pub struct UpstreamStub {
    pub base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

pub fn slug(i: usize) -> String {
    format!("series-{i:02}")
}

impl UpstreamStub {
    pub fn spawn(config: UpstreamStubConfig) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start upstream stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}");
        let base_for_thread = base_url.clone();

        let requests = Arc::new(Mutex::new(Vec::new()));
        let requests_for_thread = Arc::clone(&requests);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }
                let request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let url = request.url().to_string();
                requests_for_thread
                    .lock()
                    .expect("requests lock")
                    .push(url.clone());

                let header = |name: &'static str| {
                    request
                        .headers()
                        .iter()
                        .find(|h| h.field.equiv(name))
                        .map(|h| h.value.as_str().to_owned())
                        .unwrap_or_default()
                };
                let referer = header("Referer");
                let user_agent = header("User-Agent");

                let (path, query) = url.split_once('?').unwrap_or((url.as_str(), ""));
                let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

                let response = match segments.as_slice() {
                    ["series"] => {
                        if referer != "https://v1.komikcast.fit/" {
                            json_response(403, json!({ "message": "bad referer" }))
                        } else {
                            let page = query_param(query, "page").unwrap_or(1);
                            let take = query_param(query, "take").unwrap_or(20);
                            json_response(
                                200,
                                listing_page(&base_for_thread, &config, page, take),
                            )
                        }
                    }
                    ["series", "missing"] | ["series", "missing", ..] => {
                        json_response(404, json!({ "message": "not found" }))
                    }
                    ["series", "no-content"] => tiny_http::Response::from_string("")
                        .with_status_code(204)
                        .boxed(),
                    ["series", slug] => json_response(
                        200,
                        json!({
                            "data": {
                                "slug": slug,
                                "title": slug.to_uppercase(),
                                "synopsis": "",
                                "author": null,
                                "coverImage": format!("{base_for_thread}/img/{slug}.jpg"),
                                "homepage": "https://example.com/about",
                            }
                        }),
                    ),
                    ["series", slug, "chapters"] => json_response(
                        200,
                        json!({
                            "data": [
                                { "index": 1, "title": format!("{slug} 1"), "note": null },
                                { "index": 2, "title": format!("{slug} 2"), "note": "" },
                            ]
                        }),
                    ),
                    ["series", _slug, "chapters", chapter] => json_response(
                        200,
                        json!({
                            "data": {
                                "index": chapter.parse::<u32>().unwrap_or(0),
                                "dataImages": {
                                    "0": format!("{base_for_thread}/img/p0"),
                                    "1": format!("{base_for_thread}/img/p1"),
                                },
                                "prev": null,
                            }
                        }),
                    ),
                    ["img", _name] => {
                        if !user_agent.contains("Mozilla") || referer.is_empty() {
                            tiny_http::Response::from_string("hotlink denied")
                                .with_status_code(403)
                                .boxed()
                        } else {
                            let body = format!("IMG|{referer}").into_bytes();
                            let content_type = tiny_http::Header::from_bytes(
                                &b"Content-Type"[..],
                                &b"image/png"[..],
                            )
                            .expect("content-type header");
                            tiny_http::Response::from_data(body)
                                .with_status_code(200)
                                .with_header(content_type)
                                .boxed()
                        }
                    }
                    // No Content-Type at all.
                    ["raw", _name] => tiny_http::Response::from_data(b"RAW".to_vec())
                        .with_status_code(200)
                        .boxed(),
                    ["redirect", "loopback"] => {
                        let location = tiny_http::Header::from_bytes(
                            &b"Location"[..],
                            format!("{base_for_thread}/img/leak").into_bytes(),
                        )
                        .expect("location header");
                        tiny_http::Response::from_string("")
                            .with_status_code(302)
                            .with_header(location)
                            .boxed()
                    }
                    _ => tiny_http::Response::from_string("not found")
                        .with_status_code(404)
                        .boxed(),
                };

                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            requests,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Paths (with query) of every request received so far.
    #[allow(dead_code)]
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("requests lock").clone()
    }

    #[allow(dead_code)]
    pub fn listing_requests(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.starts_with("/series?"))
            .count()
    }
}

impl Drop for UpstreamStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn query_param(query: &str, name: &str) -> Option<usize> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == name)
        .and_then(|(_, v)| v.parse().ok())
}

fn listing_page(base_url: &str, config: &UpstreamStubConfig, page: usize, take: usize) -> Value {
    let start = (page.saturating_sub(1)) * take;
    let mut indices: Vec<usize> = (start..(start + take).min(config.series)).collect();
    if config.overlap && page > 1 && !indices.is_empty() {
        indices.insert(0, start - 1);
    }

    let items: Vec<Value> = indices
        .into_iter()
        .map(|i| {
            json!({
                "slug": slug(i),
                "title": format!("Series {i}"),
                "coverImage": format!("{base_url}/img/{i}.jpg"),
                "status": null,
                "rating": "",
            })
        })
        .collect();

    json!({ "data": items, "meta": { "page": page, "lastPage": null } })
}

fn json_response(status: u16, body: Value) -> tiny_http::ResponseBox {
    let header = tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
        .expect("content-type header");
    tiny_http::Response::from_string(body.to_string())
        .with_status_code(status)
        .with_header(header)
        .boxed()
}
