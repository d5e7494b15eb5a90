//! Validation preflight: fail fast before the pipeline starts.

use reviewscribe_config::Settings;
use reviewscribe_core::Error;
use reviewscribe_llm::build_request;
use reviewscribe_transport::{HttpClient, MultipartFile, TransportError};

/// Probe every endpoint the pipeline will use.
///
/// Definitive misconfiguration (bad API key, unknown model, unreachable
/// host) fails fast; ambiguous answers and timeouts are logged and let the
/// pipeline try optimistically.
pub async fn validate_models(
    http: &HttpClient,
    settings: &Settings,
    use_semantic: bool,
    use_vision: bool,
) -> Result<(), Error> {
    if settings.api_key.is_empty()
        && settings.stt_api_key.is_none()
        && settings.llm_api_key.is_none()
        && settings.vision_api_key.is_none()
    {
        return Err(Error::Config(
            "API key not configured. Set LIBRAXIS_API_KEY or run: reviewscribe config --set-key YOUR_KEY"
                .to_string(),
        ));
    }

    tracing::debug!("validating configuration");

    check_stt(http, settings).await?;
    tracing::info!(model = settings.stt_model, "STT model ok");

    if use_semantic {
        check_model(http, settings, &settings.llm_model, "LLM").await?;
        tracing::info!(model = settings.llm_model, "LLM model ok");
    }
    if use_vision {
        check_model(http, settings, &settings.vision_model, "Vision").await?;
        tracing::info!(model = settings.vision_model, "Vision model ok");
    }

    Ok(())
}

/// STT probe: an empty multipart upload. A 400 is the healthy answer.
async fn check_stt(http: &HttpClient, settings: &Settings) -> Result<(), Error> {
    let file = MultipartFile {
        field: "file".to_string(),
        file_name: "test.mp3".to_string(),
        mime: "audio/mpeg".to_string(),
        bytes: Vec::new(),
    };
    let fields = [("model".to_string(), settings.stt_model.clone())];

    let result = http
        .post_multipart_raw(
            &settings.stt_endpoint,
            settings.stt_key(),
            &fields,
            &file,
            settings.timeouts.preflight(),
        )
        .await;

    match result {
        Ok((200 | 400, _)) => Ok(()),
        Ok((401, _)) => Err(Error::Config("invalid API key for STT endpoint".to_string())),
        Ok((status, _)) => {
            tracing::warn!(status, "unexpected STT preflight status, continuing");
            Ok(())
        }
        Err(TransportError::Timeout(_)) => {
            tracing::warn!("timeout checking STT endpoint, continuing");
            Ok(())
        }
        Err(TransportError::Connect(e)) => {
            Err(Error::Config(format!("cannot connect to STT API: {e}")))
        }
        Err(e) => Err(Error::Config(format!("STT preflight failed: {e}"))),
    }
}

/// LLM/Vision probe: a minimal single-token request proves the model name
/// resolves without paying for a full generation.
async fn check_model(
    http: &HttpClient,
    settings: &Settings,
    model: &str,
    model_type: &str,
) -> Result<(), Error> {
    let mut body = build_request(model, "ping", &settings.llm_endpoint, None, false, None);
    body["max_tokens"] = serde_json::json!(1);

    let result = http
        .post_json_raw(
            &settings.llm_endpoint,
            settings.llm_key(),
            &body,
            settings.timeouts.preflight(),
        )
        .await;

    match result {
        Ok((200 | 400, _)) => Ok(()),
        Ok((401, _)) => Err(Error::Config("invalid API key".to_string())),
        Ok((404, _)) => Err(Error::Config(format!(
            "{model_type} model '{model}' not found"
        ))),
        Ok((503, response_body)) => {
            if body_mentions_model(&response_body) {
                return Err(Error::Config(format!(
                    "{model_type} model '{model}' unavailable"
                )));
            }
            tracing::warn!("API returned 503, model status unclear, continuing");
            Ok(())
        }
        Ok((status, _)) => {
            tracing::warn!(status, model_type, "unexpected preflight status, continuing");
            Ok(())
        }
        Err(TransportError::Timeout(_)) => {
            tracing::warn!(model_type, "timeout checking model, continuing");
            Ok(())
        }
        Err(TransportError::Connect(e)) => {
            Err(Error::Config(format!("cannot connect to API: {e}")))
        }
        Err(e) => Err(Error::Config(format!("{model_type} preflight failed: {e}"))),
    }
}

/// Does a 503 body blame the model (as opposed to generic overload)?
fn body_mentions_model(body: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(|m| m.to_lowercase().contains("model"))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_mentions_model() {
        assert!(body_mentions_model(r#"{"error": {"message": "Model is loading"}}"#));
        assert!(!body_mentions_model(r#"{"error": {"message": "overloaded"}}"#));
        assert!(!body_mentions_model("not json"));
        assert!(!body_mentions_model(""));
    }

    #[tokio::test]
    async fn test_validate_requires_api_key() {
        let settings = Settings::default();
        let http = HttpClient::new().unwrap();
        let err = validate_models(&http, &settings, true, true).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("API key not configured"));
    }
}
