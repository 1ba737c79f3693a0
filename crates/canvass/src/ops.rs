use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::compile;
use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::interview::{Interpreter, SubmitMeta};
use crate::language::Language;
use crate::model::campaign::Campaign;
use crate::model::interview::{Geolocation, Interview};
use crate::model::localization::QuestionnaireLocalization;
use crate::model::questionnaire::Questionnaire;
use crate::model::template::TemplateSource;
use crate::spec::answer::AnswerPayload;
use crate::spec::localization::SourceQuestionnaireLocalization;
use crate::spec::questionnaire::SourceQuestionnaire;
use crate::spec::template::{SourceTemplateLocalization, SourceTemplateQuestion};
use crate::stack::EvalCtx;
use crate::store::{
    CampaignId, CategoryId, InterviewId, LocalizationId, MemoryStore, QuestionnaireId, TemplateId,
    TemplateLocalizationId,
};
use crate::view::{
    InterviewData, Languages, LocalizedAnswerAndMore, LocalizedInterviewData, LocalizedQuestion,
};

/// Wall-clock source. The engine never reads time directly, so tests pin it.
pub trait Clock {
    fn now(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs() as i64)
            .unwrap_or(0)
    }
}

pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StartInterview {
    pub interview: InterviewId,
    #[serde(default)]
    pub interviewee_id: String,
    #[serde(default)]
    pub interviewer_id: String,
    pub language: Language,
    #[serde(default)]
    pub ip_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geolocation: Option<Geolocation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SubmitAnswer {
    pub interview: InterviewId,
    pub answer: AnswerPayload,
    #[serde(default)]
    pub ip_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geolocation: Option<Geolocation>,
}

/// Revision targets an answer through its history index: with loops, one
/// question can have several answers, so a label would be ambiguous.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReviseAnswer {
    pub interview: InterviewId,
    pub index: usize,
    pub answer: AnswerPayload,
    #[serde(default)]
    pub ip_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geolocation: Option<Geolocation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CampaignUpload {
    pub name: String,
    pub questionnaire: QuestionnaireId,
    #[serde(default)]
    pub start: i64,
    #[serde(default)]
    pub duration: i64,
    #[serde(default)]
    pub interview_lifespan: i64,
}

// Questionnaires.

/// Compiles and persists an uploaded questionnaire with its first
/// localization. Compilation is all-or-nothing; nothing is stored on error.
pub fn upload_questionnaire(
    store: &mut MemoryStore,
    expr: &mut dyn Expr,
    source: &SourceQuestionnaire,
) -> Result<(QuestionnaireId, LocalizationId)> {
    let (questionnaire, mut localization) = compile::compile(source, &*store, expr)?;
    let questionnaire_id = store.insert_questionnaire(questionnaire);
    localization.questionnaire = questionnaire_id;
    let localization_id = store.insert_localization(localization);
    Ok((questionnaire_id, localization_id))
}

/// Rebuilds the source form of a questionnaire in the given language.
pub fn download_questionnaire(
    store: &mut MemoryStore,
    id: QuestionnaireId,
    language: Language,
) -> Result<SourceQuestionnaire> {
    let localization = checked_localization(store, id, language)?;
    let questionnaire = store.questionnaire(id)?;
    compile::decompile(questionnaire, &localization, &*store)
}

pub fn remove_questionnaire(store: &mut MemoryStore, id: QuestionnaireId) -> Result<()> {
    store.remove_questionnaire(id)
}

/// The only way to amend a locked questionnaire: work on a copy.
pub fn clone_questionnaire(
    store: &mut MemoryStore,
    id: QuestionnaireId,
    code: &str,
    name: &str,
    logo: &str,
) -> Result<QuestionnaireId> {
    let copy = store.questionnaire(id)?.duplicate(code, name, logo);
    Ok(store.insert_questionnaire(copy))
}

// Questionnaire localizations.

/// Uploads a localization for an existing, still unlocked questionnaire.
/// A previous localization for the same language is replaced.
pub fn localize_questionnaire(
    store: &mut MemoryStore,
    id: QuestionnaireId,
    source: &SourceQuestionnaireLocalization,
) -> Result<LocalizationId> {
    let localization = {
        let questionnaire = store.questionnaire(id)?;
        questionnaire.check_lock()?;
        compile::compile_localization(source, questionnaire, id, &*store)?
    };
    let existing = store
        .localization_for(id, localization.language)
        .map(|(existing, _)| existing);
    match existing {
        Some(existing) => {
            store.put_localization(existing, localization);
            Ok(existing)
        }
        None => Ok(store.insert_localization(localization)),
    }
}

pub fn download_localization(
    store: &MemoryStore,
    id: LocalizationId,
) -> Result<SourceQuestionnaireLocalization> {
    let localization = store.localization(id)?;
    let questionnaire = store.questionnaire(localization.questionnaire)?;
    compile::decompile_localization(questionnaire, localization)
}

pub fn remove_localization(store: &mut MemoryStore, id: LocalizationId) -> Result<()> {
    store.remove_localization(id)
}

// Template library.

pub fn create_template_category(
    store: &mut MemoryStore,
    name: &str,
    parent: Option<CategoryId>,
) -> Result<CategoryId> {
    if let Some(parent) = parent {
        store.category(parent)?;
    }
    Ok(store.insert_category(crate::model::template::TemplateCategory {
        name: name.to_string(),
        parent,
    }))
}

pub fn update_template_category(
    store: &mut MemoryStore,
    id: CategoryId,
    name: &str,
) -> Result<()> {
    let mut category = store.category(id)?.clone();
    category.name = name.to_string();
    store.put_category(id, category);
    Ok(())
}

/// Creates a template question together with its first localization.
pub fn create_template_question(
    store: &mut MemoryStore,
    category: CategoryId,
    source: &SourceTemplateQuestion,
) -> Result<TemplateId> {
    store.category(category)?;
    let (template, mut localization) = compile::compile_template(source, category)?;
    let template_id = store.insert_template(template)?;
    localization.template = template_id;
    store.insert_template_localization(localization)?;
    Ok(template_id)
}

/// Updates a template question's body and the localization matching the
/// upload's language. Relabeling checks library-wide uniqueness.
pub fn update_template_question(
    store: &mut MemoryStore,
    id: TemplateId,
    source: &SourceTemplateQuestion,
) -> Result<()> {
    let current = store.template_doc(id)?.clone();
    let (mut template, localization) = compile::compile_template(source, current.category)?;

    if template.label != current.label
        && let Some((other, _)) = store.template_by_label(&template.label)
        && other != id
    {
        return Err(Error::TemplateExists { label: template.label });
    }

    let (localization_id, _) = store
        .template_localization_id(id, localization.language)
        .ok_or(Error::TemplateLocalizationMissing { label: current.label.clone() })?;

    template.category = current.category;
    store.put_template(id, template);
    let mut localization = localization;
    localization.template = id;
    store.put_template_localization(localization_id, localization);
    Ok(())
}

/// Rebuilds the upload form of a template question. The handle is a
/// template localization, which pins both the template and the language.
pub fn download_template_question(
    store: &MemoryStore,
    id: TemplateLocalizationId,
) -> Result<SourceTemplateQuestion> {
    let localization = store.template_localization_doc(id)?;
    let template = store.template_doc(localization.template)?;
    compile::decompile_template(template, localization)
}

pub fn download_template_localization(
    store: &MemoryStore,
    id: TemplateLocalizationId,
) -> Result<SourceTemplateLocalization> {
    Ok(compile::decompile_template_localization(
        store.template_localization_doc(id)?,
    ))
}

pub fn create_template_localization(
    store: &mut MemoryStore,
    template: TemplateId,
    source: &SourceTemplateLocalization,
) -> Result<TemplateLocalizationId> {
    let localization = {
        let doc = store.template_doc(template)?;
        compile::compile_template_localization(source, doc, template)?
    };
    store.insert_template_localization(localization)
}

/// Updates an existing template localization. A language change is allowed
/// only when no localization for the new language exists yet.
pub fn update_template_localization(
    store: &mut MemoryStore,
    id: TemplateLocalizationId,
    source: &SourceTemplateLocalization,
) -> Result<()> {
    let current = store.template_localization_doc(id)?.clone();
    let updated = {
        let template = store.template_doc(current.template)?;
        compile::compile_template_localization(source, template, current.template)?
    };
    if updated.language != current.language
        && store
            .template_localization(current.template, updated.language)
            .is_some()
    {
        return Err(Error::TemplateLocalizationExists);
    }
    store.put_template_localization(id, updated);
    Ok(())
}

// Campaigns.

/// Checks the questionnaire (orphans included) and locks it before binding
/// the campaign to it, even when the campaign is not yet active.
pub fn create_campaign(store: &mut MemoryStore, upload: &CampaignUpload) -> Result<CampaignId> {
    {
        let questionnaire = store.questionnaire(upload.questionnaire)?;
        questionnaire.check()?;
    }
    let mut questionnaire = store.questionnaire(upload.questionnaire)?.clone();
    questionnaire.locked = true;
    store.put_questionnaire(upload.questionnaire, questionnaire);

    Ok(store.insert_campaign(Campaign::new(
        upload.name.as_str(),
        upload.questionnaire,
        upload.start,
        upload.duration,
        upload.interview_lifespan,
    )))
}

pub fn update_campaign(
    store: &mut MemoryStore,
    id: CampaignId,
    upload: &CampaignUpload,
) -> Result<()> {
    store.campaign(id)?;
    store.questionnaire(upload.questionnaire)?;
    store.put_campaign(
        id,
        Campaign::new(
            upload.name.as_str(),
            upload.questionnaire,
            upload.start,
            upload.duration,
            upload.interview_lifespan,
        ),
    );
    Ok(())
}

pub fn remove_campaign(store: &mut MemoryStore, id: CampaignId) -> Result<()> {
    store.remove_campaign(id)
}

// Interviews.

/// Interviews are created ahead of time so each respondent can be handed a
/// unique identifier; the campaign window is only checked on start.
pub fn prepare_interview(store: &mut MemoryStore, campaign: CampaignId) -> Result<InterviewId> {
    store.campaign(campaign)?;
    Ok(store.insert_interview(Interview::new(campaign)))
}

pub fn remove_interview(store: &mut MemoryStore, id: InterviewId) -> Result<()> {
    store.remove_interview(id)
}

/// The languages an interview can be conducted in.
pub fn interview_languages(store: &MemoryStore, id: InterviewId) -> Result<Languages> {
    let interview = store.interview(id)?;
    let campaign = store.campaign(interview.campaign)?;
    let questionnaire = store.questionnaire(campaign.questionnaire)?;
    Ok(Languages {
        logo: questionnaire.logo.clone(),
        languages: store
            .localizations_for(campaign.questionnaire)
            .map(|(_, localization)| localization.language)
            .collect(),
    })
}

/// Picks a language, fixes the first question, and returns it localized.
pub fn start_interview(
    store: &mut MemoryStore,
    expr: &mut dyn Expr,
    clock: &dyn Clock,
    request: &StartInterview,
) -> Result<LocalizedQuestion> {
    let now = clock.now();
    let mut interview = store.interview(request.interview)?.clone();
    let campaign = store.campaign(interview.campaign)?.clone();
    campaign.check_active(now)?;

    let language = request.language.validate()?;
    let (localization_id, localization) =
        checked_localization_for(store, campaign.questionnaire, language)?;

    let question = {
        let questionnaire = store.questionnaire(campaign.questionnaire)?;
        let ctx = EvalCtx {
            questionnaire,
            localization: &localization,
            templates: &*store,
            language,
        };
        Interpreter::new(ctx, expr).start(
            &mut interview,
            localization_id,
            request.interviewee_id.clone(),
            request.interviewer_id.clone(),
            SubmitMeta {
                ip_address: request.ip_address.clone(),
                geolocation: request.geolocation.clone(),
                now,
            },
        )?
    };

    store.put_interview(request.interview, interview);
    Ok(question)
}

/// Re-renders the stored next question; the final message keeps being
/// served within the campaign window.
pub fn next_question(
    store: &MemoryStore,
    expr: &mut dyn Expr,
    clock: &dyn Clock,
    id: InterviewId,
) -> Result<LocalizedQuestion> {
    let interview = store.interview(id)?;
    interview.check_started()?;
    let (campaign, questionnaire, localization, language) = interview_refs(store, interview)?;
    campaign.check_active(clock.now())?;

    let ctx = EvalCtx { questionnaire, localization, templates: store, language };
    Interpreter::new(ctx, expr).next_localized_question(interview)
}

/// Records the answer to the current question and returns the next one.
pub fn submit_answer(
    store: &mut MemoryStore,
    expr: &mut dyn Expr,
    clock: &dyn Clock,
    request: &SubmitAnswer,
) -> Result<LocalizedQuestion> {
    let now = clock.now();
    let mut interview = store.interview(request.interview)?.clone();

    let question = {
        let shared: &MemoryStore = store;
        let (campaign, questionnaire, localization, language) =
            interview_refs(shared, &interview)?;
        campaign.check_active(now)?;
        let ctx = EvalCtx { questionnaire, localization, templates: shared, language };
        Interpreter::new(ctx, expr).submit(
            &mut interview,
            &request.answer,
            SubmitMeta {
                ip_address: request.ip_address.clone(),
                geolocation: request.geolocation.clone(),
                now,
            },
        )?
    };

    store.put_interview(request.interview, interview);
    Ok(question)
}

/// Replaces a past answer, resections what the change invalidates, and
/// returns the localized next question. The interview document is written
/// back only on success.
pub fn revise_answer(
    store: &mut MemoryStore,
    expr: &mut dyn Expr,
    clock: &dyn Clock,
    request: &ReviseAnswer,
) -> Result<LocalizedQuestion> {
    let now = clock.now();
    let mut interview = store.interview(request.interview)?.clone();

    let question = {
        let shared: &MemoryStore = store;
        let (campaign, questionnaire, localization, language) =
            interview_refs(shared, &interview)?;
        campaign.check_active(now)?;
        let ctx = EvalCtx { questionnaire, localization, templates: shared, language };
        Interpreter::new(ctx, expr).revise(
            &mut interview,
            request.index,
            &request.answer,
            SubmitMeta {
                ip_address: request.ip_address.clone(),
                geolocation: request.geolocation.clone(),
                now,
            },
        )?
    };

    store.put_interview(request.interview, interview);
    Ok(question)
}

pub fn previous_answer(
    store: &MemoryStore,
    expr: &mut dyn Expr,
    id: InterviewId,
    index: usize,
) -> Result<LocalizedAnswerAndMore> {
    let interview = store.interview(id)?;
    let (_, questionnaire, localization, language) = interview_refs(store, interview)?;
    let ctx = EvalCtx { questionnaire, localization, templates: store, language };
    Interpreter::new(ctx, expr).previous_answer(interview, index)
}

pub fn next_answer(
    store: &MemoryStore,
    expr: &mut dyn Expr,
    id: InterviewId,
    index: usize,
) -> Result<LocalizedAnswerAndMore> {
    let interview = store.interview(id)?;
    let (_, questionnaire, localization, language) = interview_refs(store, interview)?;
    let ctx = EvalCtx { questionnaire, localization, templates: store, language };
    Interpreter::new(ctx, expr).next_answer(interview, index)
}

/// Raw download, no language. For automated processing.
pub fn interview_data(store: &MemoryStore, id: InterviewId) -> Result<InterviewData> {
    let interview = store.interview(id)?;
    let campaign = store.campaign(interview.campaign)?;
    let questionnaire = store.questionnaire(campaign.questionnaire)?;
    crate::view::interview_data(questionnaire, interview)
}

/// Localized download, in the interview's own language or an imposed one.
pub fn localized_interview_data(
    store: &mut MemoryStore,
    expr: &mut dyn Expr,
    id: InterviewId,
    language: Option<Language>,
) -> Result<LocalizedInterviewData> {
    let interview = store.interview(id)?.clone();
    let campaign = store.campaign(interview.campaign)?.clone();
    let own_language = interview.language.ok_or(Error::InterviewNotStarted)?;

    let (localization, language) = match language {
        Some(requested) if requested != own_language => {
            let (_, localization) =
                checked_localization_for(store, campaign.questionnaire, requested)?;
            (localization, requested)
        }
        _ => {
            let localization_id = interview.localization.ok_or(Error::InterviewNotStarted)?;
            (store.localization(localization_id)?.clone(), own_language)
        }
    };

    let questionnaire = store.questionnaire(campaign.questionnaire)?;
    let ctx = EvalCtx { questionnaire, localization: &localization, templates: &*store, language };
    Interpreter::new(ctx, expr).localized_interview(&interview)
}

// Shared fetch plumbing.

fn interview_refs<'a>(
    store: &'a MemoryStore,
    interview: &Interview,
) -> Result<(&'a Campaign, &'a Questionnaire, &'a QuestionnaireLocalization, Language)> {
    let campaign = store.campaign(interview.campaign)?;
    let questionnaire = store.questionnaire(campaign.questionnaire)?;
    let localization_id = interview.localization.ok_or(Error::InterviewNotStarted)?;
    let localization = store.localization(localization_id)?;
    let language = interview.language.ok_or(Error::InterviewNotStarted)?;
    Ok((campaign, questionnaire, localization, language))
}

/// Fetches a questionnaire localization by language, runs its lazy check,
/// and persists the refreshed change counter. Returns a working copy.
fn checked_localization_for(
    store: &mut MemoryStore,
    questionnaire_id: QuestionnaireId,
    language: Language,
) -> Result<(LocalizationId, QuestionnaireLocalization)> {
    let (localization_id, mut localization) = store
        .localization_for(questionnaire_id, language)
        .map(|(id, doc)| (id, doc.clone()))
        .ok_or(Error::QuestionnaireLocalizationMissing)?;
    {
        let questionnaire = store.questionnaire(questionnaire_id)?;
        localization.check(questionnaire, &*store)?;
    }
    store.put_localization(localization_id, localization.clone());
    Ok((localization_id, localization))
}

fn checked_localization(
    store: &mut MemoryStore,
    questionnaire_id: QuestionnaireId,
    language: Language,
) -> Result<QuestionnaireLocalization> {
    checked_localization_for(store, questionnaire_id, language).map(|(_, doc)| doc)
}
