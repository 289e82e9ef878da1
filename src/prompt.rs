//! Backend prompt construction. Pure string building; the pipeline treats
//! these functions as an opaque collaborator.

use serde::{Deserialize, Serialize};
use std::fmt::Write;

use crate::provider::{Lighting, Signals};

pub const DEFAULT_LANGUAGE: &str = "en";

pub const INSPECTION_PROMPT: &str = "Inspect this photo for a blind user. Reply with JSON only: \
{\"has_text\": bool, \"hazards\": [string], \"people_count\": int, \
\"lighting\": \"good\"|\"dim\"|\"dark\"|\"glare\", \"confidence\": number between 0 and 1}.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Brief,
    Detailed,
    #[default]
    #[serde(other)]
    Normal,
}

impl Verbosity {
    fn sentence_budget(&self) -> &'static str {
        match self {
            Verbosity::Brief => "one short sentence",
            Verbosity::Normal => "two or three sentences",
            Verbosity::Detailed => "up to five sentences",
        }
    }
}

pub struct PromptContext<'a> {
    pub language: &'a str,
    pub verbosity: Verbosity,
    pub signals: &'a Signals,
    pub question: Option<&'a str>,
}

pub fn assist_prompt(ctx: &PromptContext<'_>) -> String {
    let mut prompt = String::with_capacity(512);
    let _ = write!(
        prompt,
        "You are the eyes of a blind or low-vision user. Answer in language '{}' using {}. ",
        ctx.language,
        ctx.verbosity.sentence_budget()
    );

    match ctx.question.map(str::trim).filter(|q| !q.is_empty()) {
        Some(question) => {
            let _ = write!(prompt, "The user asks: \"{question}\". Answer that first. ");
        }
        None => prompt.push_str("Describe what matters most for getting around safely. "),
    }

    if !ctx.signals.hazards.is_empty() {
        let _ = write!(
            prompt,
            "Mention these hazards before anything else: {}. ",
            ctx.signals.hazards.join(", ")
        );
    }
    if ctx.signals.people_count > 0 {
        let _ = write!(prompt, "There are {} people in view. ", ctx.signals.people_count);
    }
    if ctx.signals.has_text {
        prompt.push_str("Read out any important visible text. ");
    }
    match ctx.signals.lighting {
        Lighting::Dark | Lighting::Glare => {
            prompt.push_str("The photo is hard to see; say so if you are unsure. ")
        }
        _ => {}
    }

    prompt.push_str(
        "Reply with JSON only: {\"spoken\": string, \"details\": [string]} where spoken is what \
         will be read aloud and details are optional extra facts.",
    );
    prompt
}

pub fn ocr_prompt(language: &str) -> String {
    format!(
        "Read all the text in this photo in natural reading order for a blind user. \
         Answer in language '{language}'. Reply with JSON only: {{\"spoken\": string, \
         \"details\": [string]}} where spoken is the text to read aloud and details lists \
         separate blocks such as headings, prices or labels."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_and_hazards_shape_the_prompt() {
        let signals = Signals {
            hazards: vec!["wet floor".into()],
            ..Signals::default()
        };
        let prompt = assist_prompt(&PromptContext {
            language: "fr",
            verbosity: Verbosity::Brief,
            signals: &signals,
            question: Some("Where is the door?"),
        });
        assert!(prompt.contains("'fr'"));
        assert!(prompt.contains("Where is the door?"));
        assert!(prompt.contains("wet floor"));
        assert!(prompt.contains("one short sentence"));
    }

    #[test]
    fn blank_question_falls_back_to_description() {
        let prompt = assist_prompt(&PromptContext {
            language: DEFAULT_LANGUAGE,
            verbosity: Verbosity::Normal,
            signals: &Signals::default(),
            question: Some("   "),
        });
        assert!(prompt.contains("getting around safely"));
    }

    #[test]
    fn unknown_verbosity_reads_as_normal() {
        let v: Verbosity = serde_json::from_str("\"loud\"").unwrap();
        assert_eq!(v, Verbosity::Normal);
        let v: Verbosity = serde_json::from_str("\"detailed\"").unwrap();
        assert_eq!(v, Verbosity::Detailed);
    }
}
