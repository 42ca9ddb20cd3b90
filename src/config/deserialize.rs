// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Handles the non-empty stack list and provisioner commands.

use nonempty::NonEmpty;
use serde::Deserialize;

use super::StackConfig;

pub fn deserialize_stacks<'de, D>(deserializer: D) -> Result<NonEmpty<StackConfig>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let stacks: Vec<StackConfig> = Vec::deserialize(deserializer)?;
    NonEmpty::from_vec(stacks).ok_or_else(|| serde::de::Error::custom("at least one stack is required"))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CommandEntry {
    Line(String),
    Argv(Vec<String>),
}

/// Accepts either an argv list or a whitespace-separated string.
pub fn deserialize_command<'de, D>(deserializer: D) -> Result<NonEmpty<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let argv = match CommandEntry::deserialize(deserializer)? {
        CommandEntry::Line(line) => line.split_whitespace().map(str::to_string).collect(),
        CommandEntry::Argv(argv) => argv,
    };
    NonEmpty::from_vec(argv)
        .ok_or_else(|| serde::de::Error::custom("provisioner command cannot be empty"))
}
