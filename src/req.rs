use crate::config::LlmSection;
use crate::error::RecallError;
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, ResponseFormat,
    },
    Client,
};

pub struct ChatClient {
    client: Client<OpenAIConfig>,
    model_name: String,
    persona: String,
}

impl ChatClient {
    /// `None` when the endpoint, key or model is not configured.
    pub fn new(config_: &LlmSection) -> Option<ChatClient> {
        let (Some(base_url), Some(apikey), Some(model_name)) = (
            config_.base_url.clone(),
            config_.apikey.clone(),
            config_.model_name.clone(),
        ) else {
            return None;
        };

        let config = OpenAIConfig::new()
            .with_api_base(base_url)
            .with_api_key(apikey);

        Some(ChatClient {
            client: async_openai::Client::with_config(config),
            model_name,
            persona: config_.persona.clone(),
        })
    }

    /// Persona as system message, the recent group chat as one user message, then the task.
    pub async fn request_completion(
        &self,
        context: &[String],
        prompt: &str,
    ) -> Result<String, RecallError> {
        let msgs = build_messages(&self.persona, context, prompt)?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model_name.clone())
            .messages(msgs)
            .response_format(ResponseFormat::Text)
            .build()
            .map_err(|err| RecallError::Llm(err.to_string()))?;

        let choice = {
            let mut response = self
                .client
                .chat()
                .create(request)
                .await
                .map_err(|err| RecallError::Llm(err.to_string()))?;
            response.choices.pop()
        };

        choice
            .and_then(|v| v.message.content)
            .ok_or(RecallError::EmptyCompletion)
    }
}

fn build_messages(
    persona: &str,
    context: &[String],
    prompt: &str,
) -> Result<Vec<ChatCompletionRequestMessage>, RecallError> {
    let llm_err = |err: async_openai::error::OpenAIError| RecallError::Llm(err.to_string());

    let mut msgs: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(3);

    msgs.push(
        ChatCompletionRequestSystemMessageArgs::default()
            .content(persona)
            .build()
            .map_err(llm_err)?
            .into(),
    );

    if !context.is_empty() {
        msgs.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(format!("最近的群聊记录：\n{}", context.join("\n")))
                .build()
                .map_err(llm_err)?
                .into(),
        );
    }

    msgs.push(
        ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(llm_err)?
            .into(),
    );

    Ok(msgs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_needs_full_config() {
        let mut llm = LlmSection::default();
        assert!(ChatClient::new(&llm).is_none());

        llm.apikey = Some("sk-test".into());
        llm.base_url = Some("http://127.0.0.1:1/v1".into());
        assert!(ChatClient::new(&llm).is_none());

        llm.model_name = Some("glm-4-flash".into());
        assert!(ChatClient::new(&llm).is_some());
    }

    #[test]
    fn context_message_only_when_present() {
        let without = build_messages("persona", &[], "prompt").unwrap();
        assert_eq!(without.len(), 2);

        let with = build_messages("persona", &["a: hi".to_string()], "prompt").unwrap();
        assert_eq!(with.len(), 3);
        assert!(matches!(with[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(with[2], ChatCompletionRequestMessage::User(_)));
    }
}
