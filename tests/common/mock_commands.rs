/// Mock command execution for integration tests
///
/// Every command handed to the runner is recorded. Responses are matched by
/// command prefix; anything unregistered succeeds.

use bulkwipe::execution::{CommandOutput, CommandRunner};
use std::io;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct MockCommandRegistry {
    responses: Arc<Mutex<Vec<(String, CommandOutput)>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

#[allow(dead_code)]
impl MockCommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a response for every command starting with `prefix`
    pub fn register(&self, prefix: &str, output: CommandOutput) {
        self.responses
            .lock()
            .unwrap()
            .push((prefix.to_string(), output));
    }

    pub fn fail(&self, prefix: &str, exit_code: i32, stderr: &str) {
        self.register(prefix, CommandOutput::failure(exit_code, stderr));
    }

    /// Commands run so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn runner(&self) -> Box<dyn CommandRunner> {
        Box::new(self.clone())
    }
}

impl CommandRunner for MockCommandRegistry {
    fn run(&mut self, command: &str) -> io::Result<CommandOutput> {
        self.calls.lock().unwrap().push(command.to_string());
        let responses = self.responses.lock().unwrap();
        Ok(responses
            .iter()
            .find(|(prefix, _)| command.starts_with(prefix.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_else(CommandOutput::success))
    }
}
