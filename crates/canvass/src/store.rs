use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::language::Language;
use crate::model::campaign::Campaign;
use crate::model::interview::Interview;
use crate::model::localization::QuestionnaireLocalization;
use crate::model::questionnaire::Questionnaire;
use crate::model::template::{TemplateCategory, TemplateLocalization, TemplateQuestion, TemplateSource};

macro_rules! doc_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
            Serialize, Deserialize, JsonSchema, Default,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

doc_id!(QuestionnaireId);
doc_id!(LocalizationId);
doc_id!(CategoryId);
doc_id!(TemplateId);
doc_id!(TemplateLocalizationId);
doc_id!(CampaignId);
doc_id!(InterviewId);

/// In-memory document store with the secondary lookups the engine needs.
///
/// Documents are cloned out for mutation and written back on success, which
/// keeps every operation transactional: a failed operation leaves the store
/// untouched. Multi-interview concurrency control belongs to a real store
/// behind the same surface.
#[derive(Debug, Default)]
pub struct MemoryStore {
    questionnaires: BTreeMap<QuestionnaireId, Questionnaire>,
    localizations: BTreeMap<LocalizationId, QuestionnaireLocalization>,
    categories: BTreeMap<CategoryId, TemplateCategory>,
    templates: BTreeMap<TemplateId, TemplateQuestion>,
    template_localizations: BTreeMap<TemplateLocalizationId, TemplateLocalization>,
    campaigns: BTreeMap<CampaignId, Campaign>,
    interviews: BTreeMap<InterviewId, Interview>,
    next_id: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    // Questionnaires.

    pub fn insert_questionnaire(&mut self, doc: Questionnaire) -> QuestionnaireId {
        let id = QuestionnaireId(self.allocate());
        self.questionnaires.insert(id, doc);
        id
    }

    pub fn questionnaire(&self, id: QuestionnaireId) -> Result<&Questionnaire> {
        self.questionnaires.get(&id).ok_or(Error::QuestionnaireMissing)
    }

    pub fn put_questionnaire(&mut self, id: QuestionnaireId, doc: Questionnaire) {
        self.questionnaires.insert(id, doc);
    }

    /// Removal cascades to the questionnaire's localizations. Interviews
    /// survive; their localization reference is weak.
    pub fn remove_questionnaire(&mut self, id: QuestionnaireId) -> Result<()> {
        let doc = self.questionnaire(id)?;
        if doc.locked {
            return Err(Error::QuestionnaireLocked);
        }
        self.questionnaires.remove(&id);
        self.localizations.retain(|_, l| l.questionnaire != id);
        Ok(())
    }

    pub fn questionnaires_by_name<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = (QuestionnaireId, &'a Questionnaire)> {
        self.questionnaires
            .iter()
            .filter(move |(_, doc)| doc.name == name)
            .map(|(id, doc)| (*id, doc))
    }

    // Questionnaire localizations.

    pub fn insert_localization(&mut self, doc: QuestionnaireLocalization) -> LocalizationId {
        let id = LocalizationId(self.allocate());
        self.localizations.insert(id, doc);
        id
    }

    pub fn localization(&self, id: LocalizationId) -> Result<&QuestionnaireLocalization> {
        self.localizations.get(&id).ok_or(Error::QuestionnaireLocalizationMissing)
    }

    pub fn put_localization(&mut self, id: LocalizationId, doc: QuestionnaireLocalization) {
        self.localizations.insert(id, doc);
    }

    /// Interviews keep their language and survive the removal.
    pub fn remove_localization(&mut self, id: LocalizationId) -> Result<()> {
        self.localizations.remove(&id).ok_or(Error::QuestionnaireLocalizationMissing)?;
        Ok(())
    }

    pub fn localization_for(
        &self,
        questionnaire: QuestionnaireId,
        language: Language,
    ) -> Option<(LocalizationId, &QuestionnaireLocalization)> {
        self.localizations
            .iter()
            .find(|(_, doc)| doc.questionnaire == questionnaire && doc.language == language)
            .map(|(id, doc)| (*id, doc))
    }

    pub fn localizations_for(
        &self,
        questionnaire: QuestionnaireId,
    ) -> impl Iterator<Item = (LocalizationId, &QuestionnaireLocalization)> {
        self.localizations
            .iter()
            .filter(move |(_, doc)| doc.questionnaire == questionnaire)
            .map(|(id, doc)| (*id, doc))
    }

    // Template library.

    pub fn insert_category(&mut self, doc: TemplateCategory) -> CategoryId {
        let id = CategoryId(self.allocate());
        self.categories.insert(id, doc);
        id
    }

    pub fn category(&self, id: CategoryId) -> Result<&TemplateCategory> {
        self.categories.get(&id).ok_or(Error::TemplateCategoryMissing)
    }

    pub fn put_category(&mut self, id: CategoryId, doc: TemplateCategory) {
        self.categories.insert(id, doc);
    }

    pub fn insert_template(&mut self, doc: TemplateQuestion) -> Result<TemplateId> {
        if self.template_by_label(&doc.label).is_some() {
            return Err(Error::TemplateExists { label: doc.label });
        }
        let id = TemplateId(self.allocate());
        self.templates.insert(id, doc);
        Ok(id)
    }

    pub fn template_doc(&self, id: TemplateId) -> Result<&TemplateQuestion> {
        self.templates
            .get(&id)
            .ok_or(Error::TemplateMissing { label: id.to_string() })
    }

    pub fn put_template(&mut self, id: TemplateId, doc: TemplateQuestion) {
        self.templates.insert(id, doc);
    }

    pub fn templates_by_category(
        &self,
        category: CategoryId,
    ) -> impl Iterator<Item = (TemplateId, &TemplateQuestion)> {
        self.templates
            .iter()
            .filter(move |(_, doc)| doc.category == category)
            .map(|(id, doc)| (*id, doc))
    }

    pub fn insert_template_localization(
        &mut self,
        doc: TemplateLocalization,
    ) -> Result<TemplateLocalizationId> {
        if self.template_localization(doc.template, doc.language).is_some() {
            return Err(Error::TemplateLocalizationExists);
        }
        let id = TemplateLocalizationId(self.allocate());
        self.template_localizations.insert(id, doc);
        Ok(id)
    }

    pub fn template_localization_doc(
        &self,
        id: TemplateLocalizationId,
    ) -> Result<&TemplateLocalization> {
        self.template_localizations.get(&id).ok_or(Error::TemplateLocalizationUnknown)
    }

    pub fn put_template_localization(
        &mut self,
        id: TemplateLocalizationId,
        doc: TemplateLocalization,
    ) {
        self.template_localizations.insert(id, doc);
    }

    pub fn template_localization_id(
        &self,
        template: TemplateId,
        language: Language,
    ) -> Option<(TemplateLocalizationId, &TemplateLocalization)> {
        self.template_localizations
            .iter()
            .find(|(_, doc)| doc.template == template && doc.language == language)
            .map(|(id, doc)| (*id, doc))
    }

    /// Forbidden: removal would silently break questionnaire localizations
    /// that were validated against the library.
    pub fn remove_template_localization(&mut self, _id: TemplateLocalizationId) -> Result<()> {
        Err(Error::TemplateLocalizationRemovalForbidden)
    }

    // Campaigns.

    pub fn insert_campaign(&mut self, doc: Campaign) -> CampaignId {
        let id = CampaignId(self.allocate());
        self.campaigns.insert(id, doc);
        id
    }

    pub fn campaign(&self, id: CampaignId) -> Result<&Campaign> {
        self.campaigns.get(&id).ok_or(Error::CampaignMissing)
    }

    pub fn put_campaign(&mut self, id: CampaignId, doc: Campaign) {
        self.campaigns.insert(id, doc);
    }

    pub fn remove_campaign(&mut self, id: CampaignId) -> Result<()> {
        self.campaigns.remove(&id).ok_or(Error::CampaignMissing)?;
        Ok(())
    }

    pub fn campaigns_by_name<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = (CampaignId, &'a Campaign)> {
        self.campaigns
            .iter()
            .filter(move |(_, doc)| doc.name == name)
            .map(|(id, doc)| (*id, doc))
    }

    // Interviews.

    pub fn insert_interview(&mut self, doc: Interview) -> InterviewId {
        let id = InterviewId(self.allocate());
        self.interviews.insert(id, doc);
        id
    }

    pub fn interview(&self, id: InterviewId) -> Result<&Interview> {
        self.interviews.get(&id).ok_or(Error::InterviewMissing)
    }

    pub fn put_interview(&mut self, id: InterviewId, doc: Interview) {
        self.interviews.insert(id, doc);
    }

    pub fn remove_interview(&mut self, id: InterviewId) -> Result<()> {
        self.interviews.remove(&id).ok_or(Error::InterviewMissing)?;
        Ok(())
    }

    pub fn interviews_by_campaign(
        &self,
        campaign: CampaignId,
    ) -> impl Iterator<Item = (InterviewId, &Interview)> {
        self.interviews
            .iter()
            .filter(move |(_, doc)| doc.campaign == campaign)
            .map(|(id, doc)| (*id, doc))
    }
}

impl TemplateSource for MemoryStore {
    fn template(&self, id: TemplateId) -> Option<&TemplateQuestion> {
        self.templates.get(&id)
    }

    fn template_by_label(&self, label: &str) -> Option<(TemplateId, &TemplateQuestion)> {
        self.templates
            .iter()
            .find(|(_, doc)| doc.label == label)
            .map(|(id, doc)| (*id, doc))
    }

    fn template_localization(
        &self,
        template: TemplateId,
        language: Language,
    ) -> Option<&TemplateLocalization> {
        self.template_localizations
            .values()
            .find(|doc| doc.template == template && doc.language == language)
    }
}
