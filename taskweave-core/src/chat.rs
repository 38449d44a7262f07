//! Chat helpers
//!
//! [`ChatHistory`] drives a [`ChatCompletion`] backend and records the turns.
//! [`ConversationBot`] keeps a running `history` variable and answers through a
//! prompt template, the way a plain text completion model is used for chat.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::ai::completion::{ChatCompletion, CompletionOptions, TextCompletion};
use crate::ai::message::Message;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::skills::PromptSkill;

/// Ordered conversation messages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatHistory {
    messages: Vec<Message>,
}

impl ChatHistory {
    /// Empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// History starting with a system message
    pub fn with_system(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(prompt)],
        }
    }

    /// Append a message
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append a user message
    pub fn add_user(&mut self, content: impl Into<String>) {
        self.push(Message::user(content));
    }

    /// Append an assistant message
    pub fn add_assistant(&mut self, content: impl Into<String>) {
        self.push(Message::assistant(content));
    }

    /// All messages, oldest first
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Most recent message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True when no messages were added
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Ask `backend` for the next assistant message and append it
    pub async fn reply(
        &mut self,
        backend: &dyn ChatCompletion,
        options: &CompletionOptions,
    ) -> Result<String> {
        let content = backend.send_message(&self.messages, options).await?;
        self.add_assistant(content.clone());
        Ok(content)
    }

    /// Stream the next assistant message.
    ///
    /// An empty assistant message is appended once the backend accepts the
    /// request; every chunk is appended to it and handed to `on_chunk`. If the
    /// stream fails the partial message stays in the history.
    pub async fn stream_reply<F>(
        &mut self,
        backend: &dyn ChatCompletion,
        options: &CompletionOptions,
        mut on_chunk: F,
    ) -> Result<String>
    where
        F: FnMut(&str),
    {
        let stream = backend.send_message_stream(&self.messages, options).await?;
        self.add_assistant(String::new());

        let index = self.messages.len() - 1;
        let messages = &mut self.messages;
        stream
            .for_each_text(|chunk| {
                messages[index].content.push_str(chunk);
                on_chunk(chunk);
            })
            .await?;

        let content = self.messages[index].content.clone();
        debug!(chars = content.len(), "Streamed assistant reply");
        Ok(content)
    }
}

/// Default conversation template
pub const CHAT_TEMPLATE: &str = "{{$history}}\nHuman: {{$human_input}}\nAI:";

const HISTORY_VAR: &str = "history";
const HUMAN_INPUT_VAR: &str = "human_input";

/// Template driven chat over a text completion backend
pub struct ConversationBot {
    skill: PromptSkill,
    backend: Arc<dyn TextCompletion>,
    context: Mutex<ExecutionContext>,
}

impl ConversationBot {
    /// Bot using [`CHAT_TEMPLATE`]
    pub fn new(backend: Arc<dyn TextCompletion>) -> Result<Self> {
        let skill = PromptSkill::new("ChatBot", "Chat", "Continue the conversation", CHAT_TEMPLATE)?;
        Ok(Self::with_skill(skill, backend))
    }

    /// Bot using a custom prompt skill; it should reference `history` and `human_input`
    pub fn with_skill(skill: PromptSkill, backend: Arc<dyn TextCompletion>) -> Self {
        Self {
            skill,
            backend,
            context: Mutex::new(ExecutionContext::default().with_variable(HISTORY_VAR, "")),
        }
    }

    /// Answer one human turn and record it in the history
    #[instrument(skip_all)]
    pub async fn ask(&self, human_input: &str) -> Result<String> {
        let mut view = self.context.lock().clone();
        view.set(HUMAN_INPUT_VAR, human_input);
        view.set_input(human_input);

        let answer = self.skill.invoke(&view, self.backend.as_ref()).await?;

        let mut context = self.context.lock();
        context.set(HUMAN_INPUT_VAR, human_input);
        context.append(HISTORY_VAR, &format!("\nHuman: {}\nAI: {}", human_input, answer));
        Ok(answer)
    }

    /// Conversation so far
    pub fn history(&self) -> String {
        self.context
            .lock()
            .get(HISTORY_VAR)
            .unwrap_or_default()
            .to_string()
    }

    /// Forget the conversation
    pub fn reset(&self) {
        self.context.lock().set(HISTORY_VAR, "");
    }
}
