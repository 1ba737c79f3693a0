mod common;

use serde_json::json;

use canvass::ops::{self, CampaignUpload};
use canvass::{Language, MemoryStore, Script, TemplateSource};
use common::{Harness, select_answer, source};

fn library() -> (MemoryStore, canvass::TemplateId) {
    let mut store = MemoryStore::new();
    let category =
        ops::create_template_category(&mut store, "demographics", None).expect("category");
    let template = ops::create_template_question(
        &mut store,
        category,
        &serde_json::from_value(json!({
            "$type": "select",
            "language": 1,
            "label": "age_bracket",
            "style": "radio",
            "text": "How old are you?",
            "options": [
                { "label": "Under 30" },
                { "label": "30 to 60" },
                { "label": "Over 60" }
            ]
        }))
        .expect("template fixture should deserialize"),
    )
    .expect("template question");
    (store, template)
}

fn questionnaire_with_template() -> serde_json::Value {
    json!([
        { "$type": "from_template", "label": "age", "template": "age_bracket" },
        { "$type": "message", "label": "bye", "text": { "value": "Thanks" } }
    ])
}

#[test]
fn creating_a_template_also_creates_its_first_localization() {
    let (store, template) = library();
    let localization = store
        .template_localization(template, Language::ENGLISH)
        .expect("the first localization exists");
    assert_eq!(localization.body.text(), "How old are you?");
    assert_eq!(localization.body.options().len(), 3);
}

#[test]
fn template_labels_are_unique_in_the_library() {
    let (mut store, _) = library();
    let category = ops::create_template_category(&mut store, "other", None).expect("category");
    let err = ops::create_template_question(
        &mut store,
        category,
        &serde_json::from_value(json!({
            "$type": "message",
            "language": 1,
            "label": "age_bracket",
            "text": "duplicate"
        }))
        .expect("fixture"),
    )
    .expect_err("the label is taken");
    assert_eq!(err.code(), "tq_exists");
}

#[test]
fn an_interview_borrows_question_bodies_from_the_library() {
    let (mut store, _) = library();
    let mut engine = Script::new();
    let (questionnaire, _) =
        ops::upload_questionnaire(&mut store, &mut engine, &source(questionnaire_with_template()))
            .expect("questionnaire referencing the template compiles");
    let campaign = ops::create_campaign(
        &mut store,
        &CampaignUpload {
            name: "c".into(),
            questionnaire,
            start: 0,
            duration: 0,
            interview_lifespan: 0,
        },
    )
    .expect("campaign");
    let interview = ops::prepare_interview(&mut store, campaign).expect("prepared");

    let mut harness =
        Harness { store, engine, clock: canvass::ops::FixedClock(1_000), interview };
    let first = harness.start();
    assert_eq!(first.label, "age");
    assert_eq!(first.text, "How old are you?");
    assert_eq!(first.style, "radio");

    let last = harness.submit(select_answer(2));
    assert_eq!(last.label, "bye");
}

#[test]
fn unknown_template_references_fail_to_compile() {
    let mut store = MemoryStore::new();
    let mut engine = Script::new();
    let err = ops::upload_questionnaire(
        &mut store,
        &mut engine,
        &source(questionnaire_with_template()),
    )
    .expect_err("the library is empty");
    assert_eq!(err.code(), "tq_missing");
}

#[test]
fn starting_needs_the_template_localization_for_the_language() {
    let (mut store, template) = library();
    let mut engine = Script::new();
    let (questionnaire, _) =
        ops::upload_questionnaire(&mut store, &mut engine, &source(questionnaire_with_template()))
            .expect("compiles");

    // A full French questionnaire localization exists, but the template
    // library has no French entry yet: the completeness check fails.
    ops::localize_questionnaire(
        &mut store,
        questionnaire,
        &serde_json::from_value(json!({
            "title": "Sondage",
            "language": 2,
            "questions": [
                { "$type": "message", "label": "bye", "text": "Merci" }
            ]
        }))
        .expect("fixture"),
    )
    .expect_err("template localization missing");

    // Add the French template localization; the localization upload now
    // checks out, and so does a French interview.
    ops::create_template_localization(
        &mut store,
        template,
        &serde_json::from_value(json!({
            "$type": "options",
            "language": 2,
            "text": "Quel âge avez-vous ?",
            "options": [
                { "label": "Moins de 30" },
                { "label": "30 à 60" },
                { "label": "Plus de 60" }
            ]
        }))
        .expect("fixture"),
    )
    .expect("template localization");

    ops::localize_questionnaire(
        &mut store,
        questionnaire,
        &serde_json::from_value(json!({
            "title": "Sondage",
            "language": 2,
            "questions": [
                { "$type": "message", "label": "bye", "text": "Merci" }
            ]
        }))
        .expect("fixture"),
    )
    .expect("complete with the library entry");

    let campaign = ops::create_campaign(
        &mut store,
        &CampaignUpload {
            name: "c".into(),
            questionnaire,
            start: 0,
            duration: 0,
            interview_lifespan: 0,
        },
    )
    .expect("campaign");
    let interview = ops::prepare_interview(&mut store, campaign).expect("prepared");
    let mut harness =
        Harness { store, engine, clock: canvass::ops::FixedClock(1_000), interview };
    let first = harness.try_start(Language::FRENCH).expect("French interview");
    assert_eq!(first.text, "Quel âge avez-vous ?");
}

#[test]
fn template_localizations_are_unique_per_language_and_cannot_be_removed() {
    let (mut store, template) = library();

    let err = ops::create_template_localization(
        &mut store,
        template,
        &serde_json::from_value(json!({
            "$type": "options",
            "language": 1,
            "text": "again",
            "options": [
                { "label": "a" }, { "label": "b" }, { "label": "c" }
            ]
        }))
        .expect("fixture"),
    )
    .expect_err("English already exists");
    assert_eq!(err.code(), "tq_l10n_exists");

    let (id, _) = store
        .template_localization_id(template, Language::ENGLISH)
        .expect("the English entry");
    let err = store
        .remove_template_localization(id)
        .expect_err("library entries cannot be removed");
    assert_eq!(err.code(), "tq_l10n_removal_forbidden");
}

#[test]
fn a_template_question_downloads_back_to_its_source_form() {
    let (store, template) = library();
    let (localization_id, _) = store
        .template_localization_id(template, Language::ENGLISH)
        .expect("the English entry");

    let rebuilt = ops::download_template_question(&store, localization_id)
        .expect("downloadable");
    let expected: canvass::SourceTemplateQuestion = serde_json::from_value(json!({
        "$type": "select",
        "language": 1,
        "label": "age_bracket",
        "style": "radio",
        "text": "How old are you?",
        "options": [
            { "label": "Under 30" },
            { "label": "30 to 60" },
            { "label": "Over 60" }
        ]
    }))
    .expect("fixture");
    assert_eq!(rebuilt, expected);

    let localization = ops::download_template_localization(&store, localization_id)
        .expect("downloadable");
    assert_eq!(localization.language(), Language::ENGLISH);
}

#[test]
fn updating_a_template_refreshes_body_and_localization() {
    let (mut store, template) = library();
    ops::update_template_question(
        &mut store,
        template,
        &serde_json::from_value(json!({
            "$type": "select",
            "language": 1,
            "label": "age_bracket",
            "style": "dropdown",
            "text": "Your age bracket?",
            "options": [
                { "label": "Under 40" },
                { "label": "Over 40" }
            ]
        }))
        .expect("fixture"),
    )
    .expect("update");

    let doc = store.template_doc(template).expect("template");
    let canvass::QuestionKind::Select { body, options, .. } = &doc.kind else {
        panic!("expected a select template");
    };
    assert_eq!(body.style, "dropdown");
    assert_eq!(options.len(), 2);

    let localization = store
        .template_localization(template, Language::ENGLISH)
        .expect("localization");
    assert_eq!(localization.body.text(), "Your age bracket?");
}
