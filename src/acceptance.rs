//! Accepted-answer workflow, gated by question authorship.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::Error;
use crate::events::ActivityHook;
use crate::store::QuestionStore;

pub struct AcceptanceWorkflow {
    questions: Arc<dyn QuestionStore>,
    hook: Arc<dyn ActivityHook>,
}

impl AcceptanceWorkflow {
    #[must_use]
    pub fn new(questions: Arc<dyn QuestionStore>, hook: Arc<dyn ActivityHook>) -> Self {
        Self { questions, hook }
    }

    /// Mark `answer_id` as the accepted answer of `question_id`.
    ///
    /// Only the question's author may accept, the answer must belong to
    /// that question, and re-accepting the current answer is a no-op.
    /// On any failure the question is left unchanged.
    pub async fn accept(
        &self,
        acting_user: Uuid,
        question_id: Uuid,
        answer_id: Uuid,
    ) -> Result<(), Error> {
        let Some(question) = self.questions.question_head(question_id).await? else {
            return Err(Error::not_found("question not found"));
        };

        if question.author_id != acting_user {
            return Err(Error::forbidden(
                "only the question author can accept an answer",
            ));
        }

        match self.questions.answer_question(answer_id).await? {
            None => return Err(Error::not_found("answer not found")),
            Some(parent) if parent != question_id => {
                return Err(Error::invalid_input(
                    "answer does not belong to this question",
                ));
            }
            Some(_) => {}
        }

        if question.accepted_answer == Some(answer_id) {
            return Ok(());
        }

        self.questions
            .set_accepted_answer(question_id, answer_id)
            .await?;
        info!(%question_id, %answer_id, "answer accepted");
        self.hook
            .answer_accepted(question_id, answer_id, acting_user);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::LogActivityHook;
    use crate::store::memory::MemoryStore;

    fn workflow(store: Arc<MemoryStore>) -> AcceptanceWorkflow {
        AcceptanceWorkflow::new(store, Arc::new(LogActivityHook))
    }

    #[tokio::test]
    async fn author_accepts_their_question() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let author = Uuid::new_v4();
        let question = store.seed_question(author).await;
        let answer = store.seed_answer(question).await;
        let workflow = workflow(store.clone());

        workflow.accept(author, question, answer).await?;
        assert_eq!(store.accepted_answer(question).await, Some(answer));

        // Re-accepting the same answer is a no-op, not an error.
        workflow.accept(author, question, answer).await?;
        assert_eq!(store.accepted_answer(question).await, Some(answer));
        Ok(())
    }

    #[tokio::test]
    async fn acceptance_can_move_to_another_answer() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let author = Uuid::new_v4();
        let question = store.seed_question(author).await;
        let first = store.seed_answer(question).await;
        let second = store.seed_answer(question).await;
        let workflow = workflow(store.clone());

        workflow.accept(author, question, first).await?;
        workflow.accept(author, question, second).await?;
        assert_eq!(store.accepted_answer(question).await, Some(second));
        Ok(())
    }

    #[tokio::test]
    async fn non_author_is_forbidden_and_state_unchanged() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let author = Uuid::new_v4();
        let question = store.seed_question(author).await;
        let answer = store.seed_answer(question).await;
        let workflow = workflow(store.clone());

        let result = workflow.accept(Uuid::new_v4(), question, answer).await;
        assert!(matches!(result, Err(Error::Forbidden(_))));
        assert_eq!(store.accepted_answer(question).await, None);
        Ok(())
    }

    #[tokio::test]
    async fn missing_question_or_answer_is_not_found() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let author = Uuid::new_v4();
        let question = store.seed_question(author).await;
        let workflow = workflow(store);

        let result = workflow
            .accept(author, Uuid::new_v4(), Uuid::new_v4())
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));

        let result = workflow.accept(author, question, Uuid::new_v4()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
        Ok(())
    }

    #[tokio::test]
    async fn answer_from_another_question_is_rejected() -> anyhow::Result<()> {
        let store = Arc::new(MemoryStore::new());
        let author = Uuid::new_v4();
        let question = store.seed_question(author).await;
        let other_question = store.seed_question(author).await;
        let stray_answer = store.seed_answer(other_question).await;
        let workflow = workflow(store.clone());

        let result = workflow.accept(author, question, stray_answer).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(store.accepted_answer(question).await, None);
        Ok(())
    }
}
