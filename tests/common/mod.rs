/// Common test utilities and fakes
///
/// - mock_commands: a recording command runner with canned failures
/// - fixtures: lsblk JSON for a small host and collaborators built from it

pub mod fixtures;
pub mod mock_commands;
