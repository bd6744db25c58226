use crate::WipeResult;
use std::io::{self, BufRead, BufReader, Stdin, Stdout, Write};

/// The only answer that lets a device be wiped
const CONFIRM_TOKEN: &str = "yes";

/// Asks whether one device may be wiped
#[cfg_attr(test, mockall::automock)]
pub trait Confirmer {
    fn confirm(&mut self, device_path: &str) -> WipeResult<bool>;
}

/// `--yes`: every device is confirmed up front
pub struct AlwaysConfirm;

impl Confirmer for AlwaysConfirm {
    fn confirm(&mut self, _device_path: &str) -> WipeResult<bool> {
        Ok(true)
    }
}

/// Prompts on a terminal and reads one line per device
pub struct PromptConfirmer<R, W> {
    input: R,
    output: W,
}

impl PromptConfirmer<BufReader<Stdin>, Stdout> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R: BufRead, W: Write> PromptConfirmer<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Confirmer for PromptConfirmer<R, W> {
    fn confirm(&mut self, device_path: &str) -> WipeResult<bool> {
        write!(
            self.output,
            "⚠️  ALL DATA on {} will be destroyed. Type 'yes' to continue: ",
            device_path
        )?;
        self.output.flush()?;

        let mut input = String::new();
        // EOF counts as a refusal
        if self.input.read_line(&mut input)? == 0 {
            writeln!(self.output)?;
            return Ok(false);
        }

        Ok(is_affirmative(&input))
    }
}

pub fn is_affirmative(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case(CONFIRM_TOKEN)
}
