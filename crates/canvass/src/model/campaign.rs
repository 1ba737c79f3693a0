use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::store::QuestionnaireId;

/// Binds a questionnaire to a collection window. Creating a campaign checks
/// the questionnaire and locks it; interviews reference the campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Campaign {
    pub name: String,
    pub questionnaire: QuestionnaireId,
    /// 0 means the campaign starts immediately.
    pub start: i64,
    /// 0 means unlimited duration.
    pub duration: i64,
    /// 0 means interviews never expire.
    pub interview_lifespan: i64,
    pub end: i64,
}

impl Campaign {
    pub fn new(
        name: impl Into<String>,
        questionnaire: QuestionnaireId,
        start: i64,
        duration: i64,
        interview_lifespan: i64,
    ) -> Self {
        Self {
            name: name.into(),
            questionnaire,
            start,
            duration,
            interview_lifespan,
            end: start + duration,
        }
    }

    pub fn check_active(&self, now: i64) -> Result<()> {
        if self.start != 0 {
            if now < self.start {
                return Err(Error::CampaignNotYetActive);
            }
            if self.duration != 0 && now > self.end {
                return Err(Error::CampaignExpired);
            }
        }
        Ok(())
    }
}
