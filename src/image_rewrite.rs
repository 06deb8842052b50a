use serde_json::{Map, Value};
use url::Url;

/// Field names (lowercased, `_`/`-` removed) whose string values are image URLs.
const IMAGE_KEYS: &[&str] = &[
    "image",
    "images",
    "img",
    "imageurl",
    "cover",
    "coverimage",
    "coverurl",
    "thumbnail",
    "thumbnailurl",
    "thumb",
    "poster",
    "backgroundimage",
    "banner",
    "avatar",
    "icon",
    "dataimages",
];

const IMAGE_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".webp", ".gif", ".avif", ".bmp", ".svg",
];

/// Hosts (or host/path fragments) that only ever serve images.
const IMAGE_HOST_MARKERS: &[&str] = &[
    "i0.wp.com",
    "i1.wp.com",
    "i2.wp.com",
    "i3.wp.com",
    "googleusercontent.com",
    "imgur.com",
    "imagedelivery.net",
    "/wp-content/uploads/",
];

/// Points image URLs in a response tree at this gateway's `/proxy` endpoint.
#[derive(Debug, Clone)]
pub struct ImageRewriter {
    proxy_prefix: String,
}

impl ImageRewriter {
    pub fn new(base_url: &str) -> Self {
        Self {
            proxy_prefix: format!("{}/proxy?", base_url.trim_end_matches('/')),
        }
    }

    pub fn proxied_url(&self, original: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(original.as_bytes()).collect();
        format!("{}url={encoded}", self.proxy_prefix)
    }

    pub fn rewrite(&self, value: Value) -> Value {
        self.walk(value, false)
    }

    fn walk(&self, value: Value, image_field: bool) -> Value {
        match value {
            Value::String(s) => Value::String(self.rewrite_str(s, image_field)),
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| self.walk(item, image_field))
                    .collect(),
            ),
            Value::Object(map) => Value::Object(self.walk_object(map, image_field)),
            other => other,
        }
    }

    fn walk_object(&self, map: Map<String, Value>, image_field: bool) -> Map<String, Value> {
        map.into_iter()
            .map(|(key, value)| {
                let nested = image_field || is_image_key(&key);
                let value = self.walk(value, nested);
                (key, value)
            })
            .collect()
    }

    fn rewrite_str(&self, s: String, image_field: bool) -> String {
        if s.starts_with(&self.proxy_prefix) {
            return s;
        }
        let Ok(url) = Url::parse(&s) else {
            return s;
        };
        if !matches!(url.scheme(), "http" | "https") {
            return s;
        }
        if image_field || looks_like_image(&url) {
            return self.proxied_url(&s);
        }
        s
    }
}

fn is_image_key(key: &str) -> bool {
    let normalized: String = key
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .map(|c| c.to_ascii_lowercase())
        .collect();
    IMAGE_KEYS.contains(&normalized.as_str())
}

fn looks_like_image(url: &Url) -> bool {
    let path = url.path().to_ascii_lowercase();
    if IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return true;
    }
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    let host_and_path = format!("{host}{path}");
    IMAGE_HOST_MARKERS
        .iter()
        .any(|marker| host_and_path.contains(marker))
}
