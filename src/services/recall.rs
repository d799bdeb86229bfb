//! Recall: answering prefixed trigger messages with a taught response.

use crate::Result;
use crate::models::RecallReply;
use crate::services::KnowledgeService;
use rand::Rng;
use rand::seq::IndexedRandom;
use std::sync::Arc;
use tracing::instrument;

/// Picks replies for trigger messages.
///
/// A message is a trigger when, after trimming, it starts with the configured
/// prefix. Default knowledge answers first and works outside guilds; otherwise
/// a teacher group for the keyword is picked at random, then one of its
/// responses.
pub struct RecallService {
    knowledge: Arc<KnowledgeService>,
    prefix: String,
}

impl RecallService {
    /// Creates a recall service answering messages that start with `prefix`.
    #[must_use]
    pub fn new(knowledge: Arc<KnowledgeService>, prefix: impl Into<String>) -> Self {
        Self {
            knowledge,
            prefix: prefix.into(),
        }
    }

    /// Returns the trigger prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Extracts the keyword from a trigger message.
    ///
    /// Returns `None` if the message is not a trigger or names no keyword.
    #[must_use]
    pub fn trigger_key<'a>(&self, message: &'a str) -> Option<&'a str> {
        let key = message.trim().strip_prefix(self.prefix.as_str())?.trim();
        (!key.is_empty()).then_some(key)
    }

    /// Answers a message, if it is a trigger with something to say.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PersistenceFailure`] if claiming pending legacy
    /// records for the guild cannot be saved.
    #[instrument(skip(self, message, rng))]
    pub fn recall<R: Rng + ?Sized>(
        &self,
        guild_id: Option<&str>,
        message: &str,
        rng: &mut R,
    ) -> Result<Option<RecallReply>> {
        let Some(key) = self.trigger_key(message) else {
            return Ok(None);
        };

        if let Some(response) = self.knowledge.policy().default_response(key) {
            return Ok(Some(RecallReply {
                response: response.to_string(),
                teacher: None,
            }));
        }

        let Some(guild_id) = guild_id.filter(|g| !g.trim().is_empty()) else {
            return Ok(None);
        };

        let groups = self.knowledge.lookup(Some(guild_id), key)?;
        let reply = groups.choose(rng).and_then(|group| {
            group.responses.choose(rng).map(|response| RecallReply {
                response: response.clone(),
                teacher: Some(group.teacher.clone()),
            })
        });

        tracing::debug!(guild_id, key, hit = reply.is_some(), "Recall");
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KnowledgePolicy;
    use crate::storage::MemoryBackend;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const PREFIX: &str = "호시노야 ";

    fn recall_service() -> (Arc<KnowledgeService>, RecallService) {
        let knowledge = Arc::new(
            KnowledgeService::open(Arc::new(MemoryBackend::new()), KnowledgePolicy::default())
                .unwrap(),
        );
        let recall = RecallService::new(knowledge.clone(), PREFIX);
        (knowledge, recall)
    }

    #[test]
    fn test_trigger_key() {
        let (_, recall) = recall_service();

        assert_eq!(recall.trigger_key("  호시노야  sky "), Some("sky"));
        assert_eq!(recall.trigger_key("호시노야 "), None);
        assert_eq!(recall.trigger_key("hello 호시노야 sky"), None);
        assert_eq!(recall.trigger_key("호시노야sky"), None);
    }

    #[test]
    fn test_default_knowledge_works_without_guild() {
        let (_, recall) = recall_service();
        let mut rng = StdRng::seed_from_u64(7);

        let reply = recall.recall(None, "호시노야 hi", &mut rng).unwrap();
        assert_eq!(
            reply,
            Some(RecallReply {
                response: "hello world".to_string(),
                teacher: None,
            })
        );
    }

    #[test]
    fn test_taught_response_requires_guild() {
        let (knowledge, recall) = recall_service();
        knowledge.teach(Some("g1"), "sky", "blue", "alice").unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        assert_eq!(recall.recall(None, "호시노야 sky", &mut rng).unwrap(), None);
        assert_eq!(recall.recall(Some("g2"), "호시노야 sky", &mut rng).unwrap(), None);

        let reply = recall.recall(Some("g1"), "호시노야 sky", &mut rng).unwrap().unwrap();
        assert_eq!(reply.response, "blue");
        assert_eq!(reply.teacher.as_deref(), Some("alice"));
    }

    #[test]
    fn test_reply_comes_from_taught_responses() {
        let (knowledge, recall) = recall_service();
        knowledge.teach(Some("g1"), "sky", "blue", "alice").unwrap();
        knowledge.teach(Some("g1"), "sky", "grey", "bob").unwrap();
        knowledge.teach(Some("g1"), "sky", "clear", "alice").unwrap();
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..32 {
            let reply = recall.recall(Some("g1"), "호시노야 sky", &mut rng).unwrap().unwrap();
            let pair = (reply.response.as_str(), reply.teacher.as_deref());
            assert!(matches!(
                pair,
                ("blue" | "clear", Some("alice")) | ("grey", Some("bob"))
            ));
        }
    }

    #[test]
    fn test_non_trigger_is_ignored() {
        let (_, recall) = recall_service();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(recall.recall(Some("g1"), "hi", &mut rng).unwrap(), None);
    }
}
