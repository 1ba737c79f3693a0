use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use unic_langid::LanguageIdentifier;

use canvass::ops::{self, CampaignUpload, StartInterview, SubmitAnswer, SystemClock};
use canvass::view::{LocalizedQuestion, LocalizedQuestionBody};
use canvass::{AnswerPayload, ChoicePayload, Language, MemoryStore, SourceQuestionnaire};

#[derive(Parser, Debug)]
#[command(
    name = "canvass",
    about = "Compile and run localized questionnaires",
    version,
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile a source questionnaire and report the first error, if any
    Check {
        /// Path to the questionnaire JSON
        file: PathBuf,
    },
    /// Run an interview on the terminal against an in-memory store
    Run {
        /// Path to the questionnaire JSON
        file: PathBuf,
        /// Two-letter interview language (defaults to the source language)
        #[arg(long)]
        language: Option<String>,
    },
}

fn main() -> Result<()> {
    match Cli::parse().command {
        Commands::Check { file } => check(&file),
        Commands::Run { file, language } => run(&file, language.as_deref()),
    }
}

fn load(file: &PathBuf) -> Result<SourceQuestionnaire> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("cannot read {}", file.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("cannot parse {}", file.display()))
}

fn parse_language(raw: &str) -> Result<Language> {
    // Validate the shape first so typos get a clear message.
    LanguageIdentifier::from_str(raw)
        .ok()
        .with_context(|| format!("'{raw}' is not a language identifier"))?;
    Language::from_str2(raw).map_err(|_| anyhow::anyhow!("language '{raw}' is not supported"))
}

fn check(file: &PathBuf) -> Result<()> {
    let source = load(file)?;
    let mut store = MemoryStore::new();
    let mut engine = canvass::Script::new();
    match ops::upload_questionnaire(&mut store, &mut engine, &source) {
        Ok(_) => {
            println!("ok: {} question(s)", source.questions.len());
            Ok(())
        }
        Err(err) => bail!("{}: {err}", err.code()),
    }
}

fn run(file: &PathBuf, language: Option<&str>) -> Result<()> {
    let source = load(file)?;
    let language = match language {
        Some(raw) => parse_language(raw)?,
        None => source.language,
    };

    let mut store = MemoryStore::new();
    let mut engine = canvass::Script::new();
    let clock = SystemClock;

    let (questionnaire_id, _) = ops::upload_questionnaire(&mut store, &mut engine, &source)
        .map_err(|err| anyhow::anyhow!("{}: {err}", err.code()))?;
    let campaign = ops::create_campaign(
        &mut store,
        &CampaignUpload {
            name: source.name.clone(),
            questionnaire: questionnaire_id,
            start: 0,
            duration: 0,
            interview_lifespan: 0,
        },
    )?;
    let interview = ops::prepare_interview(&mut store, campaign)?;

    let mut question = ops::start_interview(
        &mut store,
        &mut engine,
        &clock,
        &StartInterview {
            interview,
            interviewee_id: "terminal".into(),
            interviewer_id: String::new(),
            language,
            ip_address: "127.0.0.1".into(),
            geolocation: None,
        },
    )?;

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        let done = store.interview(interview)?.is_completed();
        present(&question);
        if done {
            return Ok(());
        }

        let answer = prompt(&question, &mut lines)?;
        match ops::submit_answer(
            &mut store,
            &mut engine,
            &clock,
            &SubmitAnswer {
                interview,
                answer,
                ip_address: "127.0.0.1".into(),
                geolocation: None,
            },
        ) {
            Ok(next) => question = next,
            Err(err) => {
                println!("rejected ({}): {err}", err.code());
            }
        }
    }
}

fn present(question: &LocalizedQuestion) {
    println!();
    println!("[{}%] {}", question.progress, question.text);
    if let LocalizedQuestionBody::Select { options, .. } = &question.body {
        for (index, option) in options.iter().enumerate() {
            println!("  {index}) {}", option.label);
        }
    }
    if let LocalizedQuestionBody::SelectAtMost(choices)
    | LocalizedQuestionBody::SelectExactly(choices)
    | LocalizedQuestionBody::RankAtMost(choices)
    | LocalizedQuestionBody::RankExactly(choices) = &question.body
    {
        for (index, option) in choices.options.iter().enumerate() {
            println!("  {index}) {}", option.label);
        }
        println!("  (up to {} choice(s), comma separated)", choices.limit);
    }
}

fn prompt(
    question: &LocalizedQuestion,
    lines: &mut impl Iterator<Item = std::io::Result<String>>,
) -> Result<AnswerPayload> {
    let mut read = |label: &str| -> Result<String> {
        print!("{label}> ");
        std::io::stdout().flush().ok();
        match lines.next() {
            Some(line) => Ok(line?),
            None => bail!("input closed"),
        }
    };

    match &question.body {
        LocalizedQuestionBody::Message { .. } => {
            read("enter to continue")?;
            Ok(AnswerPayload::Message)
        }
        LocalizedQuestionBody::Input { .. } => Ok(AnswerPayload::Input {
            input: read("text")?,
            comment: String::new(),
        }),
        LocalizedQuestionBody::Select { .. } => {
            let index = read("option")?.trim().parse::<usize>().context("expected an index")?;
            Ok(AnswerPayload::Select {
                choice: ChoicePayload { index, comment: String::new() },
                comment: String::new(),
            })
        }
        LocalizedQuestionBody::SelectAtMost(_)
        | LocalizedQuestionBody::SelectExactly(_)
        | LocalizedQuestionBody::RankAtMost(_)
        | LocalizedQuestionBody::RankExactly(_) => {
            let raw = read("options")?;
            let choices = raw
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| {
                    part.parse::<usize>()
                        .map(|index| ChoicePayload { index, comment: String::new() })
                        .context("expected comma separated indexes")
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(AnswerPayload::MultipleChoice { choices, comment: String::new() })
        }
    }
}
