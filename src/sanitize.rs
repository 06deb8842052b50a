use serde_json::{Map, Value};

/// Drops every object field whose value is `null` or `""`, recursively.
///
/// Arrays keep their length; only object fields are ever removed. Running
/// `clean` twice gives the same result as running it once.
pub fn clean(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(clean_object(map)),
        Value::Array(items) => Value::Array(items.into_iter().map(clean).collect()),
        scalar => scalar,
    }
}

fn clean_object(map: Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::with_capacity(map.len());
    for (key, value) in map {
        if is_blank(&value) {
            continue;
        }
        out.insert(key, clean(value));
    }
    out
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn drops_null_and_empty_string_fields() {
        let raw = json!({
            "slug": "one-piece",
            "title": "",
            "author": null,
            "rating": 0,
            "ongoing": false,
        });

        assert_eq!(
            clean(raw),
            json!({ "slug": "one-piece", "rating": 0, "ongoing": false })
        );
    }

    #[test]
    fn recurses_through_arrays_and_nested_objects() {
        let raw = json!({
            "data": [
                { "slug": "a", "meta": { "alt": null, "genres": ["action", ""] } },
                { "slug": "b", "cover": "" },
            ],
            "meta": { "page": 1, "next": null },
        });

        assert_eq!(
            clean(raw),
            json!({
                "data": [
                    { "slug": "a", "meta": { "genres": ["action", ""] } },
                    { "slug": "b" },
                ],
                "meta": { "page": 1 },
            })
        );
    }

    #[test]
    fn array_elements_are_never_removed() {
        let raw = json!([null, "", { "x": null }, []]);
        assert_eq!(clean(raw), json!([null, "", {}, []]));
    }

    #[test]
    fn whitespace_and_zero_are_kept() {
        let raw = json!({ "title": " ", "count": 0, "ratio": 0.0 });
        assert_eq!(clean(raw.clone()), raw);
    }

    #[test]
    fn clean_is_idempotent() {
        let raw = json!({
            "a": { "b": { "c": null, "d": "" } },
            "list": [{ "e": null }, { "f": "x" }],
            "g": "",
        });

        let once = clean(raw);
        let twice = clean(once.clone());
        assert_eq!(once, twice);
        assert_eq!(once, json!({ "a": { "b": {} }, "list": [{}, { "f": "x" }] }));
    }
}
