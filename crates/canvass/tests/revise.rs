mod common;

use serde_json::json;

use canvass::{Entry, InterviewState, QuestionId};
use common::{Harness, input_answer, select_answer};

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
fn revising_with_an_equivalent_answer_changes_nothing() {
    let mut harness = Harness::launch(branching_questions());
    harness.start();
    harness.submit(select_answer(0));
    assert_eq!(harness.interview().next_question, Some(QuestionId(2)));

    let next = harness.revise(0, select_answer(0));
    assert_eq!(next.label, "q3");
    assert_eq!(harness.interview().history.len(), 1);
    assert_eq!(harness.interview().next_question, Some(QuestionId(2)));
    assert_eq!(harness.interview().state, InterviewState::Completed);
}

#[test]
fn revising_onto_another_branch_resections_the_tail() {
    let mut harness = Harness::launch(branching_questions());
    harness.start();
    harness.submit(select_answer(0));

    let next = harness.revise(0, select_answer(1));
    assert_eq!(next.label, "q2");
    assert_eq!(harness.interview().history.len(), 1);
    assert_eq!(harness.interview().next_question, Some(QuestionId(1)));
}

#[test]
fn an_untouched_downstream_stretch_is_preserved() {
    let mut harness = Harness::launch(json!([
        { "$type": "input", "label": "q1", "text": { "value": "One?" } },
        { "$type": "input", "label": "q2", "text": { "value": "Two?" } },
        { "$type": "message", "label": "q3", "text": { "value": "Bye" } }
    ]));
    harness.start();
    harness.submit(input_answer("first"));
    harness.submit(input_answer("second"));
    assert_eq!(harness.interview().state, InterviewState::Completed);

    // q2 does not depend on q1 in any way, so its answer survives.
    let next = harness.revise(0, input_answer("changed"));
    assert_eq!(next.label, "q3");
    assert_eq!(harness.interview().history.len(), 2);
    assert_eq!(harness.interview().state, InterviewState::Completed);

    let revised = harness.interview().history[0].answer().expect("an answer");
    assert_eq!(
        revised.body,
        canvass::AnswerBody::Input { input: "changed".into(), comment: String::new() }
    );
}

fn parametric_questions() -> serde_json::Value {
    json!([
        { "$type": "input", "label": "q1", "text": { "value": "Word?" } },
        { "$type": "input", "label": "q2",
          "text": { "value": "hello @{0}",
                    "functions": [{ "code": "q1.input", "parameters": ["q1"] }] } },
        { "$type": "message", "label": "q3", "text": { "value": "Bye" } }
    ])
}

#[test]
fn a_changed_parametric_text_drops_the_impacted_answer() {
    let mut harness = Harness::launch(parametric_questions());
    harness.start();
    harness.submit(input_answer("world"));
    harness.submit(input_answer("ack"));
    assert_eq!(harness.interview().state, InterviewState::Completed);

    // The new q1 answer changes q2's question text, so q2's answer can no
    // longer be trusted and the interview reopens at q2.
    let next = harness.revise(0, input_answer("mars"));
    assert_eq!(next.label, "q2");
    assert_eq!(next.text, "hello mars");
    assert_eq!(harness.interview().history.len(), 1);
    assert_eq!(harness.interview().state, InterviewState::Ongoing);
}

#[test]
fn an_identical_parametric_text_keeps_the_impacted_answer() {
    let mut harness = Harness::launch(parametric_questions());
    harness.start();
    harness.submit(input_answer("world"));
    harness.submit(input_answer("ack"));

    let next = harness.revise(0, input_answer("world"));
    assert_eq!(next.label, "q3");
    assert_eq!(harness.interview().history.len(), 2);
    assert_eq!(harness.interview().state, InterviewState::Completed);
}

fn loop_questions() -> serde_json::Value {
    json!([
        { "$type": "input", "label": "q1", "text": { "value": "Things?" } },
        { "$type": "begin_loop", "label": "q2", "question": "q1",
          "variable": "x", "operand": "R = parseJson(R.input).list" },
        { "$type": "input", "label": "q3", "text": { "value": "About @{x}?" } },
        { "$type": "end_loop", "label": "q4" },
        { "$type": "message", "label": "q5", "text": { "value": "Done" } }
    ])
}

#[test]
fn a_changed_loop_operand_restarts_the_loop() {
    let mut harness = Harness::launch(loop_questions());
    harness.start();
    harness.submit(input_answer(r#"{"list":["a","b"]}"#));
    harness.submit(input_answer("alpha"));
    harness.submit(input_answer("beta"));
    assert_eq!(harness.interview().state, InterviewState::Completed);

    let next = harness.revise(0, input_answer(r#"{"list":["c"]}"#));
    assert_eq!(next.label, "q3");
    assert_eq!(next.text, "About c?");
    assert_eq!(harness.interview().history.len(), 1);
    assert_eq!(harness.interview().state, InterviewState::Ongoing);
}

#[test]
fn revising_an_in_loop_answer_keeps_earlier_iterations() {
    let mut harness = Harness::launch(loop_questions());
    harness.start();
    harness.submit(input_answer(r#"{"list":["a","b"]}"#));
    harness.submit(input_answer("alpha"));
    let q = harness.submit(input_answer("beta"));
    assert_eq!(q.label, "q5");

    // The second iteration's answer sits at history position 4.
    assert!(harness.interview().history[4].answer().is_some());
    let next = harness.revise(4, input_answer("gamma"));
    assert_eq!(next.label, "q5");

    let history = &harness.interview().history;
    let second = history[4].answer().expect("an answer");
    assert_eq!(
        second.body,
        canvass::AnswerBody::Input { input: "gamma".into(), comment: String::new() }
    );
    // The first iteration is untouched.
    let first = history[2].answer().expect("an answer");
    assert_eq!(
        first.body,
        canvass::AnswerBody::Input { input: "alpha".into(), comment: String::new() }
    );
}

#[test]
fn revision_rejects_positions_that_hold_no_answer() {
    let mut harness = Harness::launch(loop_questions());
    harness.start();
    harness.submit(input_answer(r#"{"list":["a"]}"#));

    // Position 1 is the begin-loop entry.
    let err = harness
        .try_revise(1, input_answer("nope"))
        .expect_err("loop entries cannot be revised");
    assert_eq!(err.code(), "answer_index_missing");

    let err = harness
        .try_revise(40, input_answer("nope"))
        .expect_err("past the end of history");
    assert_eq!(err.code(), "answer_index_missing");
}

#[test]
fn revision_validates_the_replacement_against_the_question() {
    let mut harness = Harness::launch(branching_questions());
    harness.start();
    harness.submit(select_answer(0));

    let err = harness
        .try_revise(0, input_answer("not a selection"))
        .expect_err("shape mismatch");
    assert_eq!(err.code(), "answer_incorrect");

    // The failed revision left the interview untouched.
    assert_eq!(harness.interview().history.len(), 1);
    assert!(matches!(harness.interview().history[0], Entry::Answer(_)));
}
