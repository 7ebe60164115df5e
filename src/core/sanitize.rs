use crate::core::scrape::RawRecord;
use serde_json::{Map, Value};

pub const NO_TRANSCRIPT_LINE: &str = "No transcript available for this video.";
const TRANSCRIPT_FIELD: &str = "formatted_transcript";

/// A scraped video guaranteed to carry a non-empty url and shortcode.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanRecord {
    url: String,
    shortcode: String,
    fields: Map<String, Value>,
}

impl CleanRecord {
    pub fn from_raw(raw: RawRecord) -> Option<Self> {
        let Value::Object(fields) = raw else {
            return None;
        };

        let url = non_empty_str(&fields, "url")?.to_string();
        let shortcode = non_empty_str(&fields, "shortcode")?.to_string();

        Some(Self {
            url,
            shortcode,
            fields,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn shortcode(&self) -> &str {
        &self.shortcode
    }

    pub fn title(&self) -> Option<&str> {
        non_empty_str(&self.fields, "title")
    }

    fn segments(&self) -> &[Value] {
        match self.fields.get(TRANSCRIPT_FIELD) {
            Some(Value::Array(segments)) => segments.as_slice(),
            _ => &[],
        }
    }
}

fn non_empty_str<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

/// Keeps only object records that have both a url and a shortcode.
pub fn clean(raw_records: Vec<RawRecord>) -> Vec<CleanRecord> {
    let total = raw_records.len();
    let cleaned: Vec<CleanRecord> = raw_records
        .into_iter()
        .filter_map(CleanRecord::from_raw)
        .collect();

    if cleaned.len() < total {
        tracing::debug!(
            dropped = total - cleaned.len(),
            kept = cleaned.len(),
            "dropped malformed records"
        );
    }

    cleaned
}

pub fn render_transcript(record: &CleanRecord) -> Vec<String> {
    let segments = record.segments();
    if segments.is_empty() {
        return vec![NO_TRANSCRIPT_LINE.to_string()];
    }

    segments.iter().map(render_segment).collect()
}

fn render_segment(segment: &Value) -> String {
    let start = timestamp(segment.get("start_time"));
    let end = timestamp(segment.get("end_time"));
    let text = match segment.get("text") {
        Some(Value::String(text)) => text.as_str(),
        _ => "",
    };
    format!("({start}-{end}): {text}")
}

fn timestamp(value: Option<&Value>) -> String {
    match value {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.clone(),
        _ => "0".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> CleanRecord {
        CleanRecord::from_raw(value).expect("valid record")
    }

    #[test]
    fn clean_keeps_only_complete_objects() {
        let raw = vec![
            json!({"url": "https://yt/1", "shortcode": "a1", "title": "One"}),
            json!({"url": "https://yt/2"}),
            json!({"url": "", "shortcode": "b2"}),
            json!({"url": "https://yt/3", "shortcode": 7}),
            json!("https://yt/4"),
            json!([{"url": "https://yt/5", "shortcode": "c3"}]),
            json!(null),
            json!({"url": "https://yt/6", "shortcode": "d4"}),
        ];

        let cleaned = clean(raw);
        let codes: Vec<&str> = cleaned.iter().map(CleanRecord::shortcode).collect();
        assert_eq!(codes, vec!["a1", "d4"]);
        assert_eq!(cleaned[0].title(), Some("One"));
        assert_eq!(cleaned[1].url(), "https://yt/6");
    }

    #[test]
    fn renders_one_line_per_segment() {
        let rec = record(json!({
            "url": "u", "shortcode": "s",
            "formatted_transcript": [{"text": "hi", "start_time": 1, "end_time": 2}]
        }));
        assert_eq!(render_transcript(&rec), vec!["(1-2): hi"]);
    }

    #[test]
    fn missing_segment_fields_fall_back_to_defaults() {
        let rec = record(json!({
            "url": "u", "shortcode": "s",
            "formatted_transcript": [
                {"text": "later", "start_time": 3.5},
                {},
                "garbage"
            ]
        }));
        assert_eq!(
            render_transcript(&rec),
            vec!["(3.5-0): later", "(0-0): ", "(0-0): "]
        );
    }

    #[test]
    fn present_string_timestamps_render_as_given() {
        let rec = record(json!({
            "url": "u", "shortcode": "s",
            "formatted_transcript": [
                {"text": "a", "start_time": "", "end_time": "00:05"},
                {"text": "b", "start_time": null}
            ]
        }));
        assert_eq!(render_transcript(&rec), vec!["(-00:05): a", "(0-0): b"]);
    }

    #[test]
    fn no_segments_renders_sentinel() {
        let without = record(json!({"url": "u", "shortcode": "s"}));
        let empty = record(json!({"url": "u", "shortcode": "s", "formatted_transcript": []}));
        let null = record(json!({"url": "u", "shortcode": "s", "formatted_transcript": null}));

        for rec in [without, empty, null] {
            assert_eq!(render_transcript(&rec), vec![NO_TRANSCRIPT_LINE]);
        }
    }
}
