use log::{debug, info};
use shared::{LineReader, NAME_PROMPT};
use std::io::Write;
use tokio::io::Stdin;

enum Source {
    /// Fixed answers, cycled in order.
    Fixed { answers: Vec<String>, next: usize },
    /// One line of standard input per prompt.
    Stdin(LineReader<Stdin>),
}

/// Decides what to send back for each prompt.
///
/// A configured name answers the first name prompt only, so a rejected
/// name falls through to the regular source.
pub struct Answers {
    name: Option<String>,
    source: Source,
}

impl Answers {
    pub fn fixed(name: Option<String>, answers: Vec<String>) -> Self {
        Self {
            name,
            source: Source::Fixed { answers, next: 0 },
        }
    }

    pub fn interactive(name: Option<String>) -> Self {
        Self {
            name,
            source: Source::Stdin(LineReader::new(tokio::io::stdin())),
        }
    }

    /// The reply to `prompt`, or `None` when there is nothing left to say.
    pub async fn answer(&mut self, prompt: &str) -> Option<String> {
        if prompt == NAME_PROMPT {
            if let Some(name) = self.name.take() {
                debug!("Answering name prompt with {}", name);
                return Some(name);
            }
        }

        match &mut self.source {
            Source::Fixed { answers, next } => {
                if answers.is_empty() {
                    info!("No scripted answers configured");
                    return None;
                }
                let answer = answers[*next % answers.len()].clone();
                *next += 1;
                Some(answer)
            }
            Source::Stdin(lines) => {
                print!(" > ");
                // A failed flush only delays the marker.
                let _ = std::io::stdout().flush();
                lines.read_line().await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_name_answered_once() {
        let mut answers = Answers::fixed(Some("alice".into()), vec!["bob2".into()]);

        assert_eq!(answers.answer(NAME_PROMPT).await.as_deref(), Some("alice"));
        assert_eq!(answers.answer(NAME_PROMPT).await.as_deref(), Some("bob2"));
    }

    #[tokio::test]
    async fn test_fixed_answers_cycle() {
        let mut answers = Answers::fixed(None, vec!["Rock".into(), "Paper".into()]);

        let replies = [
            answers.answer("move?").await,
            answers.answer("move?").await,
            answers.answer("move?").await,
        ];
        assert_eq!(
            replies,
            [Some("Rock".into()), Some("Paper".into()), Some("Rock".into())]
        );
    }

    #[tokio::test]
    async fn test_no_answers_gives_up() {
        let mut answers = Answers::fixed(None, Vec::new());
        assert_eq!(answers.answer("move?").await, None);
    }
}
