//! Terminal front end for one quiz batch.

use std::fmt;
use std::io;
use std::time::Duration;

use quiz_core::model::{
    CHOICE_COUNT, ChoiceIndex, Question, ResultBundle, SessionEvent, SessionNotice,
};
use services::{QuizEngine, QuizError};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::time::Instant;

#[derive(Debug)]
pub enum ConsoleError {
    Io(io::Error),
    Quiz(QuizError),
}

impl fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleError::Io(err) => write!(f, "terminal error: {err}"),
            ConsoleError::Quiz(err) => write!(f, "quiz error: {err}"),
        }
    }
}

impl std::error::Error for ConsoleError {}

impl From<io::Error> for ConsoleError {
    fn from(err: io::Error) -> Self {
        ConsoleError::Io(err)
    }
}

impl From<QuizError> for ConsoleError {
    fn from(err: QuizError) -> Self {
        ConsoleError::Quiz(err)
    }
}

/// How a batch ended from the player's point of view.
#[derive(Debug)]
pub enum Outcome {
    Completed(Box<ResultBundle>),
    /// Left from the mistake popup.
    Abandoned,
    /// Quit with `:q` or end of input.
    Quit,
}

enum Command {
    Choice(ChoiceIndex),
    TimedOut,
    Quit,
}

enum AfterMistake {
    Continue,
    Abandon,
}

pub struct Console {
    lines: Lines<BufReader<Stdin>>,
    note: String,
    time_per_question: Duration,
}

impl Console {
    #[must_use]
    pub fn new(time_per_question: Duration) -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            note: String::new(),
            time_per_question,
        }
    }

    pub fn print_help() {
        println!("Answer with 1-{CHOICE_COUNT}. Other commands:");
        println!("  ?word   save a word to your notepad");
        println!("  !text   add a line to your note");
        println!("  :p      pause");
        println!("  :q      quit");
        println!();
    }

    /// Ask questions until the batch completes, is abandoned or the player quits.
    ///
    /// # Errors
    ///
    /// Returns `ConsoleError` if stdin fails or the engine rejects an action.
    pub async fn run(&mut self, engine: &mut QuizEngine) -> Result<Outcome, ConsoleError> {
        while let Some(question) = engine.current_question()? {
            let snapshot = engine.snapshot()?;
            let position = snapshot.current_index.unwrap_or_default() + 1;
            println!(
                "[{position}/{}] {}  ({}s left in batch)",
                snapshot.total,
                question.title(),
                snapshot.remaining_time
            );
            for (n, choice) in question.choices().iter().enumerate() {
                println!("  {}. {choice}", n + 1);
            }

            let produced = match self.read_answer(engine).await? {
                Command::Choice(choice) => engine.dispatch(SessionEvent::Answer(choice))?,
                Command::TimedOut => {
                    println!("Too slow.");
                    engine.dispatch(SessionEvent::Timeout)?
                }
                Command::Quit => return Ok(Outcome::Quit),
            };

            let mistake = produced.iter().find_map(|notice| match notice {
                SessionNotice::Mistake { reason, .. } => Some(reason.clone()),
                _ => None,
            });
            match mistake {
                Some(reason) => {
                    println!("{reason}! The answer was: {}", correct_text(&question));
                    match self.read_after_mistake(engine).await? {
                        AfterMistake::Continue => engine.continue_after_mistake()?,
                        AfterMistake::Abandon => {
                            engine.abandon_after_mistake()?;
                            return Ok(Outcome::Abandoned);
                        }
                    }
                }
                None => println!("Correct!"),
            }
            println!();
        }

        Ok(engine
            .result_bundle()?
            .map_or(Outcome::Quit, |bundle| Outcome::Completed(Box::new(bundle))))
    }

    async fn read_answer(&mut self, engine: &mut QuizEngine) -> Result<Command, ConsoleError> {
        let mut deadline = Instant::now() + self.time_per_question;
        loop {
            let line = tokio::select! {
                line = self.lines.next_line() => line?,
                () = tokio::time::sleep_until(deadline) => return Ok(Command::TimedOut),
            };
            let Some(line) = line else {
                return Ok(Command::Quit);
            };
            let line = line.trim();

            if self.handle_notepad(engine, line)? {
                continue;
            }
            match line {
                ":q" => return Ok(Command::Quit),
                ":p" => {
                    let paused_at = Instant::now();
                    engine.dispatch(SessionEvent::ExternalModalOpened)?;
                    println!("Paused. Press Enter to resume.");
                    self.lines.next_line().await?;
                    engine.dispatch(SessionEvent::ExternalModalClosed)?;
                    deadline += paused_at.elapsed();
                    continue;
                }
                _ => {}
            }

            let choice = line
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|index| ChoiceIndex::new(index).ok());
            match choice {
                Some(choice) => return Ok(Command::Choice(choice)),
                None => println!("Enter 1-{CHOICE_COUNT}, ?word, !note, :p or :q"),
            }
        }
    }

    async fn read_after_mistake(
        &mut self,
        engine: &mut QuizEngine,
    ) -> Result<AfterMistake, ConsoleError> {
        println!("[c] continue  [a] back to course");
        loop {
            let Some(line) = self.lines.next_line().await? else {
                return Ok(AfterMistake::Abandon);
            };
            let line = line.trim();
            if self.handle_notepad(engine, line)? {
                continue;
            }
            match line {
                "c" | "" => return Ok(AfterMistake::Continue),
                "a" => return Ok(AfterMistake::Abandon),
                _ => println!("[c] continue  [a] back to course"),
            }
        }
    }

    /// Handles `?word` and `!text`; returns `true` if the line was one of them.
    fn handle_notepad(&mut self, engine: &mut QuizEngine, line: &str) -> Result<bool, QuizError> {
        if let Some(word) = line.strip_prefix('?') {
            engine.record_word_lookup(word)?;
            println!("Saved \"{}\".", word.trim());
            return Ok(true);
        }
        if let Some(text) = line.strip_prefix('!') {
            if !self.note.is_empty() {
                self.note.push('\n');
            }
            self.note.push_str(text.trim());
            engine.set_note(self.note.clone())?;
            println!("Noted.");
            return Ok(true);
        }
        Ok(false)
    }
}

fn correct_text(question: &Question) -> &str {
    &question.choices()[question.correct_choice().get()]
}
