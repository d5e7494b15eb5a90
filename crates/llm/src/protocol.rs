//! Request building and response extraction for both wire flavors.
//!
//! The model endpoints speak either the Responses protocol (image input,
//! SSE streaming, reasoning summaries, `previous_response_id` chaining) or
//! the OpenAI Chat Completions protocol. The flavor is detected from the
//! endpoint URL path; callers never branch on it themselves.

use std::path::Path;

use base64::Engine;
use serde_json::{json, Value};

/// Whether an endpoint speaks the Chat Completions protocol.
pub fn is_chat_completions_endpoint(url: &str) -> bool {
    url.contains("/chat/completions")
}

/// A base64-encoded image ready to attach to a request.
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    pub media_type: String,
    pub base64_data: String,
}

impl ImageAttachment {
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.base64_data)
    }
}

/// Read and encode an image file for inline upload.
pub fn encode_image(path: &Path) -> std::io::Result<ImageAttachment> {
    let bytes = std::fs::read(path)?;
    let media_type = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    };
    Ok(ImageAttachment {
        media_type: media_type.to_string(),
        base64_data: base64::engine::general_purpose::STANDARD.encode(bytes),
    })
}

/// Build a model request body in whichever flavor the endpoint expects.
///
/// `previous_response_id` and reasoning summaries only exist in the
/// Responses flavor; they are silently dropped for Chat Completions.
pub fn build_request(
    model: &str,
    prompt: &str,
    endpoint: &str,
    image: Option<&ImageAttachment>,
    stream: bool,
    previous_response_id: Option<&str>,
) -> Value {
    if is_chat_completions_endpoint(endpoint) {
        let mut content = vec![json!({"type": "text", "text": prompt})];
        if let Some(image) = image {
            content.push(json!({
                "type": "image_url",
                "image_url": {"url": image.data_uri()},
            }));
        }
        let mut body = json!({
            "model": model,
            "messages": [{"role": "user", "content": content}],
        });
        if stream {
            body["stream"] = json!(true);
        }
        return body;
    }

    let mut content = vec![json!({"type": "input_text", "text": prompt})];
    if let Some(image) = image {
        content.push(json!({
            "type": "input_image",
            "image_url": image.data_uri(),
        }));
    }
    let mut body = json!({
        "model": model,
        "input": [{"role": "user", "content": content}],
        "reasoning": {"summary": "auto"},
    });
    if stream {
        body["stream"] = json!(true);
    }
    if let Some(id) = previous_response_id {
        if !id.is_empty() {
            body["previous_response_id"] = json!(id);
        }
    }
    body
}

/// Extract the text content from a non-streaming response, either flavor.
pub fn extract_content(result: &Value, endpoint: &str) -> String {
    if is_chat_completions_endpoint(endpoint) {
        return extract_chat_content(result);
    }
    extract_responses_content(result)
}

fn extract_chat_content(result: &Value) -> String {
    result
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

/// Walk the Responses-protocol `output[]`, skipping reasoning items.
fn extract_responses_content(result: &Value) -> String {
    let mut content = String::new();
    let Some(output) = result.get("output").and_then(Value::as_array) else {
        return content;
    };
    for item in output {
        match item.get("type").and_then(Value::as_str).unwrap_or("") {
            "reasoning" => {}
            "message" => {
                if let Some(parts) = item.get("content").and_then(Value::as_array) {
                    for part in parts {
                        let part_type = part.get("type").and_then(Value::as_str).unwrap_or("");
                        if part_type == "output_text" || part_type == "text" {
                            if let Some(text) = part.get("text").and_then(Value::as_str) {
                                content.push_str(text);
                            }
                        }
                    }
                }
            }
            "output_text" | "text" => {
                if let Some(text) = item.get("text").and_then(Value::as_str) {
                    content.push_str(text);
                }
            }
            _ => {}
        }
    }
    content
}

/// Response id from a non-streaming Responses reply.
pub fn extract_response_id(result: &Value) -> String {
    result
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_detection() {
        assert!(is_chat_completions_endpoint(
            "https://api.example.com/v1/chat/completions"
        ));
        assert!(!is_chat_completions_endpoint("https://api.example.com/v1/responses"));
    }

    #[test]
    fn test_responses_request_shape() {
        let image = ImageAttachment {
            media_type: "image/jpeg".into(),
            base64_data: "QUJD".into(),
        };
        let body = build_request(
            "vlm-1",
            "describe",
            "https://api.example.com/v1/responses",
            Some(&image),
            true,
            Some("resp_9"),
        );
        assert_eq!(body["model"], "vlm-1");
        assert_eq!(body["stream"], true);
        assert_eq!(body["previous_response_id"], "resp_9");
        assert_eq!(body["reasoning"]["summary"], "auto");
        let content = &body["input"][0]["content"];
        assert_eq!(content[0]["type"], "input_text");
        assert_eq!(content[1]["type"], "input_image");
        assert_eq!(content[1]["image_url"], "data:image/jpeg;base64,QUJD");
    }

    #[test]
    fn test_chat_request_shape() {
        let image = ImageAttachment {
            media_type: "image/png".into(),
            base64_data: "QUJD".into(),
        };
        let body = build_request(
            "gpt-x",
            "describe",
            "https://api.example.com/v1/chat/completions",
            Some(&image),
            true,
            Some("resp_9"),
        );
        assert_eq!(body["stream"], true);
        assert!(body.get("previous_response_id").is_none());
        assert!(body.get("reasoning").is_none());
        let content = &body["messages"][0]["content"];
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(
            content[1]["image_url"]["url"],
            "data:image/png;base64,QUJD"
        );
    }

    #[test]
    fn test_non_streaming_request_omits_stream_key() {
        let body = build_request("m", "p", "https://api.example.com/v1/responses", None, false, None);
        assert!(body.get("stream").is_none());
        assert!(body.get("previous_response_id").is_none());
    }

    #[test]
    fn test_extract_responses_content_walks_output() {
        let result = serde_json::json!({
            "id": "resp_1",
            "output": [
                {"type": "reasoning", "text": "thinking"},
                {"type": "message", "content": [
                    {"type": "output_text", "text": "hello "},
                    {"type": "text", "text": "world"}
                ]},
                {"type": "output_text", "text": "!"}
            ]
        });
        assert_eq!(
            extract_content(&result, "https://api.example.com/v1/responses"),
            "hello world!"
        );
        assert_eq!(extract_response_id(&result), "resp_1");
    }

    #[test]
    fn test_extract_chat_content() {
        let result = serde_json::json!({
            "choices": [{"message": {"content": "answer"}}]
        });
        assert_eq!(
            extract_content(&result, "https://api.example.com/v1/chat/completions"),
            "answer"
        );
    }
}
