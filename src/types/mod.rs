// ABOUTME: Validated domain types and typed identifiers.
// ABOUTME: Stack names are graph identities; detection ids come back from the provisioning API.

mod id;
mod stack_name;

pub use id::DetectionId;
pub use stack_name::{MAX_STACK_NAME_LEN, StackName, StackNameError};
