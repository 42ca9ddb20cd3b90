// ABOUTME: Commands that only read the project: validate and order.
// ABOUTME: Neither contacts the provisioning API.

use stackplan::error::Result;
use stackplan::graph::Direction;
use stackplan::output::Output;

use super::Project;

/// Graph construction already ran while loading; report what was built.
pub fn validate(project: &Project, output: &Output) -> Result<()> {
    output.success(&format!(
        "{} stack(s) valid, no dependency errors",
        project.graph.len()
    ));
    Ok(())
}

pub fn order(project: &Project, path: &str, reverse: bool, output: &Output) -> Result<()> {
    let direction = if reverse {
        Direction::Reverse
    } else {
        Direction::Forward
    };
    let selected = project.graph.select(path);
    let scope = project.graph.closure(&selected, direction);
    let generations = project.graph.generations(&scope, direction)?;
    output.generations(&generations);
    Ok(())
}
