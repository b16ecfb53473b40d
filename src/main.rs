extern crate log;
extern crate pretty_env_logger;

use std::error::Error as StdError;
use std::path::Path;
use std::process::exit;

use clap::{arg, command, value_parser, Command};

use crate::answer_key::AnswerKey;
use crate::batch::{process_batch, Options};
use crate::report::OutputContext;
use crate::score::summarize;

mod answer_key;
mod batch;
mod binarize;
mod classify;
mod debug;
mod error;
mod geometry;
mod grid;
mod image_utils;
mod rectify;
mod report;
mod score;
mod types;

fn main() {
    pretty_env_logger::init_custom_env("LOG");

    let matches = cli().get_matches();
    let sheets_dir = matches
        .get_one::<String>("sheets_dir")
        .expect("sheet directory is required");
    let key_path = matches
        .get_one::<String>("key")
        .expect("answer key path is required");
    let out_dir = matches
        .get_one::<String>("out")
        .expect("output directory is required");

    let options_per_question = *matches
        .get_one::<usize>("options-per-question")
        .expect("has a default");
    if !(1..=26).contains(&options_per_question) {
        eprintln!("Error: --options-per-question must be between 1 and 26");
        exit(2);
    }

    let options = Options {
        options_per_question,
        ink_threshold: *matches
            .get_one::<u8>("ink-threshold")
            .expect("has a default"),
        min_bubble_size: *matches
            .get_one::<u32>("min-bubble-size")
            .expect("has a default"),
        debug: matches.get_flag("debug"),
    };

    let answer_key = match AnswerKey::load(Path::new(key_path)) {
        Ok(answer_key) => answer_key,
        Err(e) => fatal(&e),
    };

    let batch = match process_batch(Path::new(sheets_dir), &answer_key, &options) {
        Ok(batch) => batch,
        Err(e) => fatal(&e),
    };

    let summary = match summarize(&batch) {
        Ok(summary) => summary,
        Err(e) => fatal(&e),
    };

    let output = match OutputContext::create(Path::new(out_dir)) {
        Ok(output) => output,
        Err(e) => fatal(&e),
    };
    let scores_csv = match output.write_scores_csv(&batch, answer_key.num_questions()) {
        Ok(path) => path,
        Err(e) => fatal(&e),
    };
    if let Err(e) = output.write_summary_json(&summary) {
        fatal(&e);
    }

    let top_sheets = summary
        .top_sheets
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<String>>()
        .join(", ");
    println!("Sheets scored : {}", summary.sheet_count);
    println!("Average score : {:.2}", summary.mean_score);
    println!("Maximum score : {}", summary.max_score);
    println!("Minimum score : {}", summary.min_score);
    println!("Top sheets    : {}", top_sheets);
    println!("Scores table  : {}", scores_csv.display());
}

fn fatal(e: &dyn StdError) -> ! {
    eprintln!("Error: {}", e);
    let mut source = e.source();
    while let Some(cause) = source {
        eprintln!("  caused by: {}", cause);
        source = cause.source();
    }
    exit(1);
}

fn cli() -> Command {
    command!()
        .arg(
            arg!(-k --key <PATH> "Path to the normalized answer key (.json, .csv, .tsv or .txt)")
                .required(true),
        )
        .arg(arg!(-o --out <DIR> "Output directory for scores.csv and summary.json").required(true))
        .arg(
            arg!(--"options-per-question" <N> "Number of answer options per question")
                .value_parser(value_parser!(usize))
                .default_value("4"),
        )
        .arg(
            arg!(--"ink-threshold" <LUMA> "Global binarization cutoff; luma at or below is ink")
                .value_parser(value_parser!(u8))
                .default_value("150"),
        )
        .arg(
            arg!(--"min-bubble-size" <PX> "Minimum bubble bounding-box side, in pixels")
                .value_parser(value_parser!(u32))
                .default_value("20"),
        )
        .arg(arg!(-d --debug "Write per-stage debug images next to each sheet"))
        .arg(arg!(sheets_dir: <SHEETS_DIR> "Directory of sheet images, one file per examinee").required(true))
}
