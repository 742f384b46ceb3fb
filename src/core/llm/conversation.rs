use std::sync::Arc;

use super::{ChatModel, ChatTurn, GenerationParams, LLMResult, Role};

/// Prompt sent to the model when retrieved knowledge accompanies a question.
pub fn context_prompt(user_text: &str, context: &str) -> String {
    format!("Context:\n{context}\n\nUser: {user_text}")
}

/// A model reply that is not yet part of the conversation.
///
/// Recorded with [`Conversation::commit`] once the rest of the turn succeeded.
/// Dropping it discards the exchange.
#[must_use]
#[derive(Debug, Clone, PartialEq)]
pub struct PendingExchange {
    displayed: String,
    prompt: String,
    reply: String,
}

impl PendingExchange {
    pub fn reply(&self) -> &str {
        &self.reply
    }
}

/// Ordered conversation history of one session.
///
/// `history` is what the model sees and always starts with the system turn.
/// `transcript` is what the user said and heard, so a context-augmented
/// question is recorded there in its original form.
///
/// Both lists only change on commit, so a failed or cancelled turn leaves
/// them untouched and they keep strict user/assistant pairs.
pub struct Conversation {
    model: Arc<dyn ChatModel>,
    params: GenerationParams,
    history: Vec<ChatTurn>,
    transcript: Vec<ChatTurn>,
}

impl Conversation {
    pub fn new(model: Arc<dyn ChatModel>, system_prompt: impl Into<String>) -> Self {
        Self {
            model,
            params: GenerationParams::default(),
            history: vec![ChatTurn::system(system_prompt)],
            transcript: Vec::new(),
        }
    }

    /// Answer a user message and record the exchange.
    pub async fn respond(&mut self, user_text: &str) -> LLMResult<String> {
        let pending = self.draft(user_text, None).await?;
        Ok(self.commit(pending))
    }

    /// Answer a user message with retrieved context prepended and record the exchange.
    pub async fn respond_with_context(
        &mut self,
        user_text: &str,
        context: &str,
    ) -> LLMResult<String> {
        let pending = self.draft(user_text, Some(context)).await?;
        Ok(self.commit(pending))
    }

    /// Ask the model for a reply without recording anything.
    pub async fn draft(
        &self,
        user_text: &str,
        context: Option<&str>,
    ) -> LLMResult<PendingExchange> {
        let prompt = match context {
            Some(context) => context_prompt(user_text, context),
            None => user_text.to_string(),
        };
        let mut request = Vec::with_capacity(self.history.len() + 1);
        request.extend_from_slice(&self.history);
        request.push(ChatTurn::user(prompt.clone()));

        let reply = self.model.complete(&request, &self.params).await?;
        Ok(PendingExchange {
            displayed: user_text.to_string(),
            prompt,
            reply,
        })
    }

    /// Append a drafted exchange to the history and transcript. Returns the reply.
    pub fn commit(&mut self, pending: PendingExchange) -> String {
        let PendingExchange {
            displayed,
            prompt,
            reply,
        } = pending;
        self.history.push(ChatTurn::user(prompt));
        self.history.push(ChatTurn::assistant(reply.clone()));
        self.transcript.push(ChatTurn::user(displayed));
        self.transcript.push(ChatTurn::assistant(reply.clone()));
        reply
    }

    /// Drop everything except the system turn.
    pub fn reset(&mut self) {
        self.history.truncate(1);
        self.transcript.clear();
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    pub fn transcript(&self) -> &[ChatTurn] {
        &self.transcript
    }

    pub fn system_prompt(&self) -> &str {
        self.history
            .first()
            .filter(|t| t.role == Role::System)
            .map(|t| t.content.as_str())
            .unwrap_or_default()
    }

    /// Completed user/assistant exchanges.
    pub fn exchanges(&self) -> usize {
        self.transcript.len() / 2
    }

    pub fn model_id(&self) -> &str {
        self.model.model_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::llm::LLMError;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Echoes the last user turn, or fails when told to.
    #[derive(Default)]
    struct ScriptedModel {
        fail: Mutex<bool>,
        seen: Mutex<Vec<Vec<ChatTurn>>>,
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(
            &self,
            turns: &[ChatTurn],
            _params: &GenerationParams,
        ) -> LLMResult<String> {
            self.seen.lock().push(turns.to_vec());
            if *self.fail.lock() {
                return Err(LLMError::ProviderError("boom".into()));
            }
            let last = turns.last().map(|t| t.content.clone()).unwrap_or_default();
            Ok(format!("echo: {last}"))
        }

        fn model_id(&self) -> &str {
            "scripted"
        }
    }

    #[tokio::test]
    async fn test_respond_appends_pair() {
        let model = Arc::new(ScriptedModel::default());
        let mut conversation = Conversation::new(model.clone(), "Be brief.");

        let reply = conversation.respond("hello").await.unwrap();
        assert_eq!(reply, "echo: hello");
        assert_eq!(
            conversation.history(),
            &[
                ChatTurn::system("Be brief."),
                ChatTurn::user("hello"),
                ChatTurn::assistant("echo: hello"),
            ]
        );
        assert_eq!(conversation.exchanges(), 1);
    }

    #[tokio::test]
    async fn test_context_prompt_sent_but_original_displayed() {
        let model = Arc::new(ScriptedModel::default());
        let mut conversation = Conversation::new(model.clone(), "sys");

        conversation
            .respond_with_context("What is the refund window?", "Refunds within 30 days.")
            .await
            .unwrap();

        let sent = model.seen.lock()[0].clone();
        assert_eq!(
            sent.last().unwrap().content,
            "Context:\nRefunds within 30 days.\n\nUser: What is the refund window?"
        );
        assert_eq!(
            conversation.transcript()[0],
            ChatTurn::user("What is the refund window?")
        );
    }

    #[tokio::test]
    async fn test_failed_generation_leaves_history_untouched() {
        let model = Arc::new(ScriptedModel::default());
        let mut conversation = Conversation::new(model.clone(), "sys");
        conversation.respond("one").await.unwrap();

        *model.fail.lock() = true;
        assert!(conversation.respond("two").await.is_err());
        assert_eq!(conversation.history().len(), 3);
        assert_eq!(conversation.exchanges(), 1);

        *model.fail.lock() = false;
        conversation.respond("three").await.unwrap();
        let roles: Vec<Role> = conversation.history().iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::System,
                Role::User,
                Role::Assistant,
                Role::User,
                Role::Assistant
            ]
        );
    }

    #[tokio::test]
    async fn test_draft_records_nothing_until_commit() {
        let model = Arc::new(ScriptedModel::default());
        let mut conversation = Conversation::new(model.clone(), "sys");

        let pending = conversation.draft("hello", None).await.unwrap();
        assert_eq!(pending.reply(), "echo: hello");
        assert_eq!(conversation.history().len(), 1);
        assert!(conversation.transcript().is_empty());

        // A dropped draft leaves no trace in the next request.
        drop(pending);
        let pending = conversation.draft("again", None).await.unwrap();
        assert_eq!(model.seen.lock()[1].len(), 2);

        assert_eq!(conversation.commit(pending), "echo: again");
        assert_eq!(
            conversation.history(),
            &[
                ChatTurn::system("sys"),
                ChatTurn::user("again"),
                ChatTurn::assistant("echo: again"),
            ]
        );
        assert_eq!(conversation.exchanges(), 1);
    }

    #[tokio::test]
    async fn test_reset_matches_fresh_conversation() {
        let model = Arc::new(ScriptedModel::default());
        let mut conversation = Conversation::new(model.clone(), "sys");
        conversation.respond("a").await.unwrap();
        conversation.respond("b").await.unwrap();

        conversation.reset();
        let fresh = Conversation::new(model.clone(), "sys");
        assert_eq!(conversation.history(), fresh.history());
        assert!(conversation.transcript().is_empty());
        assert_eq!(conversation.system_prompt(), "sys");
    }
}
