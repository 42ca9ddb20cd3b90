// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Creates stackplan.yml template files.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

use super::CONFIG_FILENAME;

const TEMPLATE: &str = r#"settings:
  max_concurrency: 4
  drift_timeout: 5m
  drift_poll_interval: 5s

# Program that talks to the provisioning API. It is called as
# `<command> <operation> <stack>` with a JSON request on stdin.
provisioner:
  command: ["./provision"]

groups:
  dev:
    parameters:
      Environment: dev

stacks:
  - name: vpc
    group: dev/network
    parameters:
      CidrBlock: 10.0.0.0/16

  - name: app
    group: dev/app
    dependencies: [vpc]
    parameters:
      VpcId: { resolver: stack_output, args: [vpc, VpcId] }
    hooks:
      before_create:
        - { hook: cmd, args: ["echo creating $STACKPLAN_STACK"] }
"#;

/// Write a template config into `dir`, returning its path.
pub fn init_config(dir: &Path, force: bool) -> Result<PathBuf> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    std::fs::write(&config_path, TEMPLATE)?;
    Ok(config_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectConfig;

    #[test]
    fn template_parses() {
        let config = ProjectConfig::from_yaml(TEMPLATE).unwrap();
        assert_eq!(config.stacks.len(), 2);
        assert!(config.provisioner.is_some());
    }
}
