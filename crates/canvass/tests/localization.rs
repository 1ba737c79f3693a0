mod common;

use serde_json::json;

use canvass::ops::{self, CampaignUpload};
use canvass::{Language, MemoryStore, Script, SourceQuestionnaireLocalization};
use common::{Harness, input_answer, select_answer, source};

fn select_fixture() -> serde_json::Value {
    json!([
        { "$type": "select", "label": "color", "text": { "value": "Favourite color?" },
          "comment_label": "Why?",
          "options": [
              { "label": "Red" },
              { "label": "Other", "comment_label": "Which one?" }
          ] },
        { "$type": "message", "label": "bye", "text": { "value": "Thanks" } }
    ])
}

fn french(questions: serde_json::Value) -> SourceQuestionnaireLocalization {
    serde_json::from_value(json!({
        "title": "Questionnaire",
        "language": 2,
        "questions": questions
    }))
    .expect("localization fixture should deserialize")
}

fn upload(
    questions: serde_json::Value,
) -> (MemoryStore, Script, canvass::QuestionnaireId) {
    let mut store = MemoryStore::new();
    let mut engine = Script::new();
    let (questionnaire, _) =
        ops::upload_questionnaire(&mut store, &mut engine, &source(questions))
            .expect("fixture should compile");
    (store, engine, questionnaire)
}

#[test]
fn a_complete_localization_is_accepted_and_used() {
    let (mut store, mut engine, questionnaire) = upload(select_fixture());

    ops::localize_questionnaire(
        &mut store,
        questionnaire,
        &french(json!([
            { "$type": "options", "label": "color", "text": "Couleur préférée ?",
              "comment_label": "Pourquoi ?",
              "options": [
                  { "label": "Rouge" },
                  { "label": "Autre", "comment_label": "Laquelle ?" }
              ] },
            { "$type": "message", "label": "bye", "text": "Merci" }
        ])),
    )
    .expect("localization should be accepted");

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

    let mut harness = Harness {
        store,
        engine,
        clock: canvass::ops::FixedClock(1_000),
        interview,
    };
    let first = harness.try_start(Language::FRENCH).expect("French interview");
    assert_eq!(first.text, "Couleur préférée ?");

    let last = harness.submit(select_answer(1));
    assert_eq!(last.text, "Merci");
}

#[test]
fn localizations_must_cover_every_question() {
    let (mut store, _, questionnaire) = upload(select_fixture());
    let err = ops::localize_questionnaire(
        &mut store,
        questionnaire,
        &french(json!([
            { "$type": "message", "label": "bye", "text": "Merci" }
        ])),
    )
    .expect_err("the select question is not covered");
    assert_eq!(err.code(), "l10n_missing");
}

#[test]
fn duplicate_question_localizations_are_rejected() {
    let (mut store, _, questionnaire) = upload(json!([
        { "$type": "input", "label": "q1", "text": { "value": "Name?" } },
        { "$type": "message", "label": "bye", "text": { "value": "Thanks" } }
    ]));
    let err = ops::localize_questionnaire(
        &mut store,
        questionnaire,
        &french(json!([
            { "$type": "input", "label": "q1", "text": "Nom ?" },
            { "$type": "input", "label": "q1", "text": "Nom ?" },
            { "$type": "message", "label": "bye", "text": "Merci" }
        ])),
    )
    .expect_err("q1 is localized twice");
    assert_eq!(err.code(), "l10n_duplicate");
}

#[test]
fn option_counts_and_comment_labels_must_match_the_question() {
    let (mut store, _, questionnaire) = upload(select_fixture());

    let err = ops::localize_questionnaire(
        &mut store,
        questionnaire,
        &french(json!([
            { "$type": "options", "label": "color", "text": "Couleur ?",
              "comment_label": "Pourquoi ?",
              "options": [{ "label": "Rouge" }] },
            { "$type": "message", "label": "bye", "text": "Merci" }
        ])),
    )
    .expect_err("one option is missing");
    assert_eq!(err.code(), "l10n_options_size_mismatch");

    let err = ops::localize_questionnaire(
        &mut store,
        questionnaire,
        &french(json!([
            { "$type": "options", "label": "color", "text": "Couleur ?",
              "comment_label": "Pourquoi ?",
              "options": [
                  { "label": "Rouge" },
                  { "label": "Autre" }
              ] },
            { "$type": "message", "label": "bye", "text": "Merci" }
        ])),
    )
    .expect_err("the second option needs its comment label");
    assert_eq!(err.code(), "l10n_comment_missing");

    let err = ops::localize_questionnaire(
        &mut store,
        questionnaire,
        &french(json!([
            { "$type": "options", "label": "color", "text": "Couleur ?",
              "comment_label": "Pourquoi ?",
              "options": [
                  { "label": "Rouge", "comment_label": "interdit" },
                  { "label": "Autre", "comment_label": "Laquelle ?" }
              ] },
            { "$type": "message", "label": "bye", "text": "Merci" }
        ])),
    )
    .expect_err("the first option cannot carry a comment label");
    assert_eq!(err.code(), "l10n_comment_forbidden");
}

#[test]
fn unknown_labels_and_shape_mismatches_are_rejected() {
    let (mut store, _, questionnaire) = upload(select_fixture());

    let err = ops::localize_questionnaire(
        &mut store,
        questionnaire,
        &french(json!([
            { "$type": "message", "label": "ghost", "text": "???" }
        ])),
    )
    .expect_err("no such question");
    assert_eq!(err.code(), "q_label_unknown");

    let err = ops::localize_questionnaire(
        &mut store,
        questionnaire,
        &french(json!([
            { "$type": "input", "label": "color", "text": "Couleur ?", "comment_label": "Pourquoi ?" },
            { "$type": "message", "label": "bye", "text": "Merci" }
        ])),
    )
    .expect_err("a select cannot take an input localization");
    assert_eq!(err.code(), "l10n_kind_mismatch");
}

#[test]
fn a_locked_questionnaire_accepts_no_new_localization() {
    let (mut store, _, questionnaire) = upload(select_fixture());
    ops::create_campaign(
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

    let err = ops::localize_questionnaire(
        &mut store,
        questionnaire,
        &french(json!([
            { "$type": "message", "label": "bye", "text": "Merci" }
        ])),
    )
    .expect_err("the questionnaire is locked");
    assert_eq!(err.code(), "qq_locked");
}

#[test]
fn a_successful_check_is_idempotent_while_the_questionnaire_is_unchanged() {
    let (store, _, questionnaire) = upload(select_fixture());
    let q = store.questionnaire(questionnaire).expect("questionnaire");
    let (_, localization) =
        store.localization_for(questionnaire, Language::ENGLISH).expect("first localization");

    // The upload checked the localization; its counter is in sync and the
    // lazy check has nothing to do.
    assert_eq!(localization.checked_change_count, q.change_count);
    let mut copy = localization.clone();
    copy.check(q, &store).expect("no-op recheck");
    assert_eq!(copy.checked_change_count, q.change_count);

    // A drifted counter forces a real check; a complete localization
    // passes and resynchronizes.
    copy.checked_change_count = 0;
    copy.check(q, &store).expect("full recheck");
    assert_eq!(copy.checked_change_count, q.change_count);
}

#[test]
fn interviews_keep_their_language_when_the_localization_goes_away() {
    let mut harness = Harness::launch(json!([
        { "$type": "input", "label": "q1", "text": { "value": "Name?" } },
        { "$type": "message", "label": "bye", "text": { "value": "Thanks" } }
    ]));
    harness.start();
    harness.submit(input_answer("Ada"));

    let localization = harness.interview().localization.expect("weakly referenced");
    ops::remove_localization(&mut harness.store, localization).expect("removable");

    // The interview document survives with its history and language.
    let interview = harness.interview();
    assert_eq!(interview.language, Some(Language::ENGLISH));
    assert_eq!(interview.history.len(), 1);

    // Localized reads now fail cleanly.
    let err = ops::localized_interview_data(
        &mut harness.store,
        &mut harness.engine,
        harness.interview,
        None,
    )
    .expect_err("the localization is gone");
    assert_eq!(err.code(), "qq_l10n_missing");

    // The language-free download still works.
    let data = ops::interview_data(&harness.store, harness.interview).expect("raw download");
    assert_eq!(data.answers.len(), 1);
}
