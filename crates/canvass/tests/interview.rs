mod common;

use serde_json::json;

use canvass::ops::{self, CampaignUpload, FixedClock, StartInterview};
use canvass::view::LocalizedQuestionBody;
use canvass::{InterviewState, Language, MemoryStore, QuestionId, Script};
use common::{Harness, input_answer, message_answer, multiple_answer, select_answer, source};

#[test]
fn a_linear_interview_runs_to_completion() {
    let mut harness = Harness::launch(json!([
        { "$type": "message", "label": "q1", "text": { "value": "Hi" },
          "transitions": [{ "destination": "q2" }] },
        { "$type": "input", "label": "q2", "text": { "value": "Name?" } },
        { "$type": "message", "label": "q3", "text": { "value": "Bye" } }
    ]));

    let first = harness.start();
    assert_eq!(first.label, "q1");
    assert_eq!(first.text, "Hi");
    assert_eq!(harness.interview().state, InterviewState::Ongoing);

    let second = harness.submit(message_answer());
    assert_eq!(second.label, "q2");

    let last = harness.submit(input_answer("Alice"));
    assert_eq!(last.label, "q3");
    assert!(matches!(last.body, LocalizedQuestionBody::Message { is_final: true }));
    assert_eq!(last.progress, 100);

    let interview = harness.interview();
    assert_eq!(interview.state, InterviewState::Completed);
    assert_eq!(interview.next_question, Some(QuestionId(2)));
}

fn branching_questions() -> serde_json::Value {
    json!([
        { "$type": "select", "label": "q1", "text": { "value": "Pick" },
          "options": [{ "label": "A" }, { "label": "B" }],
          "transitions": [
              { "condition": "q1.choice.index == 0", "parameters": ["q1"], "destination": "q3" },
              { "destination": "q2" }
          ] },
        { "$type": "message", "label": "q2", "text": { "value": "Chose B" } },
        { "$type": "message", "label": "q3", "text": { "value": "Chose A" } }
    ])
}

#[test]
fn transitions_branch_on_the_submitted_choice() {
    let mut harness = Harness::launch(branching_questions());
    harness.start();
    let next = harness.submit(select_answer(0));
    assert_eq!(next.label, "q3");
    assert_eq!(harness.interview().state, InterviewState::Completed);

    let mut harness = Harness::launch(branching_questions());
    harness.start();
    let next = harness.submit(select_answer(1));
    assert_eq!(next.label, "q2");
}

#[test]
fn parametric_text_interpolates_a_previous_answer() {
    let mut harness = Harness::launch(json!([
        { "$type": "input", "label": "q1", "text": { "value": "Word?" } },
        { "$type": "message", "label": "q2",
          "text": { "value": "hello @{0}",
                    "functions": [{ "code": "q1.input", "parameters": ["q1"] }] } }
    ]));

    harness.start();
    let next = harness.submit(input_answer("world"));
    assert_eq!(next.text, "hello world");
}

#[test]
fn each_text_function_is_called_once_per_render() {
    let mut harness = Harness::launch(json!([
        { "$type": "input", "label": "q1", "text": { "value": "Word?" } },
        { "$type": "message", "label": "q2",
          "text": { "value": "@{0} and @{0}",
                    "functions": [{ "code": "q1.input", "parameters": ["q1"] }] } }
    ]));

    harness.start();
    let next = harness.submit(input_answer("again"));
    assert_eq!(next.text, "again and again");
}

#[test]
fn stray_escapes_pass_through_verbatim() {
    let mut harness = Harness::launch(json!([
        { "$type": "input", "label": "q1", "text": { "value": "Word?" } },
        { "$type": "message", "label": "q2",
          "text": { "value": "mail @ home, @{0}",
                    "functions": [{ "code": "q1.input", "parameters": ["q1"] }] } }
    ]));

    harness.start();
    let next = harness.submit(input_answer("done"));
    assert_eq!(next.text, "mail @ home, done");
}

#[test]
fn a_required_input_rejects_the_empty_string() {
    let mut harness = Harness::launch(json!([
        { "$type": "input", "label": "q1", "text": { "value": "Name?" } },
        { "$type": "message", "label": "q2", "text": { "value": "Bye" } }
    ]));
    harness.start();

    let err = harness.try_submit(input_answer("")).expect_err("empty input should be rejected");
    assert_eq!(err.code(), "answer_incorrect");

    // The interview did not move.
    assert_eq!(harness.interview().history.len(), 0);
    assert_eq!(harness.interview().next_question, Some(QuestionId(0)));
}

#[test]
fn an_optional_input_accepts_the_empty_string() {
    let mut harness = Harness::launch(json!([
        { "$type": "input", "label": "q1", "optional": true, "text": { "value": "Name?" } },
        { "$type": "message", "label": "q2", "text": { "value": "Bye" } }
    ]));
    harness.start();
    let next = harness.submit(input_answer(""));
    assert_eq!(next.label, "q2");
}

#[test]
fn selections_are_validated_against_the_options() {
    let mut harness = Harness::launch(branching_questions());
    harness.start();
    let err = harness.try_submit(select_answer(5)).expect_err("index out of range");
    assert_eq!(err.code(), "answer_incorrect");

    let err = harness.try_submit(message_answer()).expect_err("wrong answer shape");
    assert_eq!(err.code(), "answer_incorrect");
}

fn multiple_choice_questions(kind: &str, limit: usize) -> serde_json::Value {
    json!([
        { "$type": kind, "label": "q1", "text": { "value": "Pick" }, "limit": limit,
          "options": [{ "label": "a" }, { "label": "b" }, { "label": "c" }] },
        { "$type": "message", "label": "q2", "text": { "value": "Bye" } }
    ])
}

#[test]
fn multiple_choice_limits_are_enforced() {
    let mut harness = Harness::launch(multiple_choice_questions("select_at_most", 2));
    harness.start();
    let err = harness.try_submit(multiple_answer(&[0, 1, 2])).expect_err("over the limit");
    assert_eq!(err.code(), "answer_incorrect");
    harness.submit(multiple_answer(&[2]));

    let mut harness = Harness::launch(multiple_choice_questions("select_exactly", 2));
    harness.start();
    let err = harness.try_submit(multiple_answer(&[0])).expect_err("under the exact limit");
    assert_eq!(err.code(), "answer_incorrect");
    let err = harness.try_submit(multiple_answer(&[0, 9])).expect_err("index out of range");
    assert_eq!(err.code(), "selection_invalid");
    harness.submit(multiple_answer(&[0, 2]));
}

#[test]
fn interviews_enforce_their_lifecycle() {
    let mut harness = Harness::launch(branching_questions());

    let err = harness.try_submit(select_answer(0)).expect_err("not started yet");
    assert_eq!(err.code(), "interview_not_started");

    harness.start();
    let err = harness.try_start(Language::ENGLISH).expect_err("already started");
    assert_eq!(err.code(), "interview_already_started");

    harness.submit(select_answer(0));
    let err = harness.try_submit(select_answer(0)).expect_err("already completed");
    assert_eq!(err.code(), "interview_completed");
}

#[test]
fn starting_requires_a_localization_for_the_language() {
    let mut harness = Harness::launch(branching_questions());
    let err = harness.try_start(Language::FRENCH).expect_err("no French localization");
    assert_eq!(err.code(), "qq_l10n_missing");
}

#[test]
fn the_campaign_window_bounds_writes() {
    let mut store = MemoryStore::new();
    let mut engine = Script::new();
    let fixture = source(json!([
        { "$type": "input", "label": "q1", "text": { "value": "Name?" } },
        { "$type": "message", "label": "q2", "text": { "value": "Bye" } }
    ]));
    let (questionnaire, _) =
        ops::upload_questionnaire(&mut store, &mut engine, &fixture).expect("should compile");
    let campaign = ops::create_campaign(
        &mut store,
        &CampaignUpload {
            name: "window".into(),
            questionnaire,
            start: 1_000,
            duration: 500,
            interview_lifespan: 0,
        },
    )
    .expect("campaign should be created");
    let interview = ops::prepare_interview(&mut store, campaign).expect("prepared");

    let request = StartInterview {
        interview,
        interviewee_id: String::new(),
        interviewer_id: String::new(),
        language: Language::ENGLISH,
        ip_address: String::new(),
        geolocation: None,
    };

    let err = ops::start_interview(&mut store, &mut engine, &FixedClock(100), &request)
        .expect_err("before the window");
    assert_eq!(err.code(), "campaign_not_yet_active");

    let err = ops::start_interview(&mut store, &mut engine, &FixedClock(2_000), &request)
        .expect_err("after the window");
    assert_eq!(err.code(), "campaign_expired");

    ops::start_interview(&mut store, &mut engine, &FixedClock(1_200), &request)
        .expect("inside the window");
}

#[test]
fn answers_record_elapsed_times_against_the_clock() {
    let mut harness = Harness::launch(json!([
        { "$type": "input", "label": "q1", "text": { "value": "One?" } },
        { "$type": "input", "label": "q2", "text": { "value": "Two?" } },
        { "$type": "message", "label": "q3", "text": { "value": "Bye" } }
    ]));

    harness.clock = FixedClock(1_000);
    harness.start();
    harness.clock = FixedClock(1_010);
    harness.submit(input_answer("first"));
    harness.clock = FixedClock(1_025);
    harness.submit(input_answer("second"));

    let data = ops::interview_data(&harness.store, harness.interview).expect("downloadable");
    assert_eq!(data.answers.len(), 2);
    assert_eq!(data.answers[0].elapsed, 10);
    assert_eq!(data.answers[0].total_elapsed, 10);
    assert_eq!(data.answers[1].elapsed, 15);
    assert_eq!(data.answers[1].total_elapsed, 25);
    assert_eq!(data.answers[1].timestamp, 1_025);
}

#[test]
fn previous_and_next_answers_navigate_the_history() {
    let mut harness = Harness::launch(json!([
        { "$type": "input", "label": "q1", "text": { "value": "One?" } },
        { "$type": "input", "label": "q2", "text": { "value": "Two?" } },
        { "$type": "message", "label": "q3", "text": { "value": "Bye" } }
    ]));

    harness.start();
    harness.submit(input_answer("first"));
    harness.submit(input_answer("second"));

    // Index 0 asks for the latest answer.
    let last = ops::previous_answer(&harness.store, &mut harness.engine, harness.interview, 0)
        .expect("latest answer");
    assert_eq!(last.answer.label, "q2");
    assert_eq!(last.index, 1);
    assert!(last.more);

    let first =
        ops::previous_answer(&harness.store, &mut harness.engine, harness.interview, last.index)
            .expect("previous answer");
    assert_eq!(first.answer.label, "q1");
    assert_eq!(first.index, 0);
    assert!(!first.more);

    let second =
        ops::next_answer(&harness.store, &mut harness.engine, harness.interview, first.index)
            .expect("next answer");
    assert_eq!(second.answer.label, "q2");
    assert_eq!(second.index, 1);
    assert!(!second.more);
}
