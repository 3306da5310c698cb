//! Roster probe: check that every configured model answers at all.

use tracing::info;

use crate::completion::{CompletionClient, CompletionRequest};
use crate::error::BackendError;
use crate::participant::{ParticipantDescriptor, Roster};

/// Output length hint for probe calls.
pub const PROBE_MAX_TOKENS: u32 = 200;

/// Result of probing one participant's model.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub participant: ParticipantDescriptor,
    pub result: Result<String, BackendError>,
}

impl ProbeOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Send `prompt` to every roster model in order, one at a time.
pub async fn probe_roster(
    client: &dyn CompletionClient,
    roster: &Roster,
    prompt: &str,
) -> Vec<ProbeOutcome> {
    let mut outcomes = Vec::with_capacity(roster.participants().len());

    for participant in roster.participants() {
        let request = CompletionRequest {
            model: participant.model.clone(),
            system: String::new(),
            user: prompt.to_string(),
            max_tokens: PROBE_MAX_TOKENS,
        };
        let result = client.complete(&request).await;
        info!(
            participant = %participant.name,
            model = %participant.model,
            ok = result.is_ok(),
            "probed model"
        );
        outcomes.push(ProbeOutcome {
            participant: participant.clone(),
            result,
        });
    }

    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingClient {
        seen: Mutex<Vec<CompletionRequest>>,
    }

    #[async_trait]
    impl CompletionClient for RecordingClient {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError> {
            self.seen.lock().unwrap().push(request.clone());
            if request.model == "broken" {
                Err(BackendError::new("model not found"))
            } else {
                Ok(format!("I am {}", request.model))
            }
        }
    }

    #[tokio::test]
    async fn test_probe_reports_each_participant_in_order() {
        let client = RecordingClient {
            seen: Mutex::new(Vec::new()),
        };
        let roster = Roster::new(vec![
            ParticipantDescriptor::new("A", "good"),
            ParticipantDescriptor::new("B", "broken"),
            ParticipantDescriptor::new("C", "fine"),
        ])
        .unwrap();

        let outcomes = probe_roster(&client, &roster, "introduce yourself").await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].is_ok());
        assert_eq!(outcomes[1].participant.name, "B");
        assert_eq!(
            outcomes[1].result.as_ref().unwrap_err().message(),
            "model not found"
        );
        assert_eq!(outcomes[2].result.as_deref(), Ok("I am fine"));

        let seen = client.seen.lock().unwrap();
        assert!(seen.iter().all(|r| r.system.is_empty()));
        assert!(seen.iter().all(|r| r.user == "introduce yourself"));
        assert!(seen.iter().all(|r| r.max_tokens == PROBE_MAX_TOKENS));
    }
}
