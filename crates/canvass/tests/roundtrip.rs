mod common;

use serde_json::json;

use canvass::{MemoryStore, Script, compile, decompile};
use common::source;

#[test]
fn a_compiled_questionnaire_decompiles_to_its_source() {
    // Explicit catch-alls everywhere and conditions written as code: the
    // decompiled form is then byte-for-byte the uploaded one.
    let original = source(json!([
        { "$type": "select", "label": "q1", "style": "radio",
          "text": { "value": "Pick" },
          "comment_label": "Why?",
          "options": [
              { "label": "A" },
              { "label": "B", "comment_label": "Tell us more" }
          ],
          "randomize": true,
          "transitions": [
              { "parameters": ["q1"], "code": "q1.choice.index == 0", "destination": "q3" },
              { "destination": "q2" }
          ] },
        { "$type": "input", "label": "q2", "style": "line",
          "text": { "value": "Why B?" }, "optional": true,
          "transitions": [{ "destination": "q4" }] },
        { "$type": "message", "label": "q3",
          "text": { "value": "Chose @{0}",
                    "functions": [{ "parameters": ["q1"],
                                    "code": "selected(q1.options, [q1.choice])" }] },
          "transitions": [{ "destination": "q4" }] },
        { "$type": "rank_exactly", "label": "q4",
          "text": { "value": "Rank two" }, "limit": 2,
          "options": [{ "label": "x" }, { "label": "y" }, { "label": "z" }],
          "transitions": [{ "destination": "q5" }] },
        { "$type": "message", "label": "q5", "text": { "value": "Bye" } }
    ]));

    let store = MemoryStore::new();
    let mut engine = Script::new();
    let (questionnaire, localization) =
        compile(&original, &store, &mut engine).expect("fixture should compile");
    let rebuilt =
        decompile(&questionnaire, &localization, &store).expect("decompilation succeeds");

    assert_eq!(rebuilt, original);
}

#[test]
fn loops_round_trip_including_their_operands() {
    let original = source(json!([
        { "$type": "input", "label": "q1", "text": { "value": "Things?" },
          "transitions": [{ "destination": "q2" }] },
        { "$type": "begin_loop", "label": "q2", "question": "q1",
          "variable": "x", "operand": "R = parseJson(R.input).list",
          "transitions": [{ "destination": "q3" }] },
        { "$type": "input", "label": "q3", "text": { "value": "About @{x}?" },
          "transitions": [{ "destination": "q4" }] },
        { "$type": "end_loop", "label": "q4",
          "transitions": [{ "destination": "q5" }] },
        { "$type": "message", "label": "q5", "text": { "value": "Done" } }
    ]));

    let store = MemoryStore::new();
    let mut engine = Script::new();
    let (questionnaire, localization) =
        compile(&original, &store, &mut engine).expect("fixture should compile");
    let rebuilt =
        decompile(&questionnaire, &localization, &store).expect("decompilation succeeds");

    assert_eq!(rebuilt, original);
}

#[test]
fn synthesized_catch_alls_become_explicit_on_decompile() {
    let original = source(json!([
        { "$type": "input", "label": "q1", "text": { "value": "Name?" } },
        { "$type": "message", "label": "q2", "text": { "value": "Bye" } }
    ]));

    let store = MemoryStore::new();
    let mut engine = Script::new();
    let (questionnaire, localization) =
        compile(&original, &store, &mut engine).expect("fixture should compile");
    let rebuilt =
        decompile(&questionnaire, &localization, &store).expect("decompilation succeeds");

    let canvass::SourceQuestion::Input(input) = &rebuilt.questions[0] else {
        panic!("expected the input question");
    };
    assert_eq!(input.transitions.len(), 1);
    assert_eq!(input.transitions[0].destination, "q2");
    assert!(input.transitions[0].is_catch_all());

    // Recompiling the normalized form is stable.
    let (questionnaire2, localization2) =
        compile(&rebuilt, &store, &mut engine).expect("normalized form compiles");
    let again = decompile(&questionnaire2, &localization2, &store).expect("decompiles again");
    assert_eq!(again, rebuilt);
}

#[test]
fn localizations_round_trip_through_their_source_form() {
    let mut store = MemoryStore::new();
    let mut engine = Script::new();
    let fixture = source(json!([
        { "$type": "select", "label": "color", "text": { "value": "Color?" },
          "options": [{ "label": "Red" }, { "label": "Blue" }] },
        { "$type": "message", "label": "bye", "text": { "value": "Thanks" } }
    ]));
    let (questionnaire_id, _) =
        canvass::ops::upload_questionnaire(&mut store, &mut engine, &fixture).expect("compiles");

    let french: canvass::SourceQuestionnaireLocalization = serde_json::from_value(json!({
        "title": "Sondage",
        "language": 2,
        "questions": [
            { "$type": "options", "label": "color", "text": "Couleur ?",
              "options": [{ "label": "Rouge" }, { "label": "Bleu" }] },
            { "$type": "message", "label": "bye", "text": "Merci" }
        ]
    }))
    .expect("localization fixture");

    let id = canvass::ops::localize_questionnaire(&mut store, questionnaire_id, &french)
        .expect("accepted");
    let rebuilt = canvass::ops::download_localization(&store, id).expect("downloadable");
    assert_eq!(rebuilt, french);
}
