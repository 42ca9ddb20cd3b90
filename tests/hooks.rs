// ABOUTME: Integration tests for hooks system.
// ABOUTME: Tests hook ordering, failure handling, and environment variable passing.

mod support;

use async_trait::async_trait;
use stackplan::hooks::{
    Hook, HookContext, HookDefinition, HookError, HookPoint, HookRegistry, HookRunner,
};
use stackplan::stack::{GroupPath, Stack};
use std::fs;
use std::sync::Arc;
use support::name;
use tempfile::TempDir;

fn cmd(script: &str) -> HookDefinition {
    HookDefinition::new("cmd", [script])
}

/// Test: hooks for one point run in declaration order.
#[tokio::test]
async fn hooks_run_in_order() {
    let temp_dir = TempDir::new().unwrap();
    let stack = Stack::new(name("vpc"))
        .with_hook(HookPoint::BeforeCreate, cmd("echo first >> order.log"))
        .with_hook(HookPoint::BeforeCreate, cmd("echo second >> order.log"))
        .with_hook(HookPoint::BeforeCreate, cmd("echo third >> order.log"));

    let registry = HookRegistry::default();
    HookRunner::new(&registry, temp_dir.path())
        .run(HookPoint::BeforeCreate, &stack, "create")
        .await
        .unwrap();

    let log = fs::read_to_string(temp_dir.path().join("order.log")).unwrap();
    assert_eq!(log, "first\nsecond\nthird\n");
}

/// Test: hook environment describes the stack and action.
#[tokio::test]
async fn hook_receives_environment() {
    let temp_dir = TempDir::new().unwrap();
    let stack = Stack::new(name("vpc"))
        .with_group(GroupPath::parse("dev/network"))
        .with_hook(
            HookPoint::AfterDelete,
            cmd("echo \"$STACKPLAN_STACK $STACKPLAN_GROUP $STACKPLAN_ACTION $STACKPLAN_HOOK_POINT\" > env.txt && pwd > pwd.txt"),
        );

    let registry = HookRegistry::default();
    HookRunner::new(&registry, temp_dir.path())
        .run(HookPoint::AfterDelete, &stack, "delete")
        .await
        .unwrap();

    let env = fs::read_to_string(temp_dir.path().join("env.txt")).unwrap();
    assert_eq!(env.trim(), "vpc dev/network delete after_delete");

    let pwd = fs::read_to_string(temp_dir.path().join("pwd.txt")).unwrap();
    let expected = temp_dir.path().canonicalize().unwrap();
    assert_eq!(
        std::path::Path::new(pwd.trim()).canonicalize().unwrap(),
        expected
    );
}

/// Test: the first failing hook stops the rest and reports its position.
#[tokio::test]
async fn first_failure_stops_remaining_hooks() {
    let temp_dir = TempDir::new().unwrap();
    let stack = Stack::new(name("vpc"))
        .with_hook(HookPoint::BeforeUpdate, cmd("true"))
        .with_hook(HookPoint::BeforeUpdate, cmd("echo 'boom' >&2; exit 7"))
        .with_hook(HookPoint::BeforeUpdate, cmd("touch third-ran"));

    let registry = HookRegistry::default();
    let failure = HookRunner::new(&registry, temp_dir.path())
        .run(HookPoint::BeforeUpdate, &stack, "update")
        .await
        .unwrap_err();

    assert_eq!(failure.point, HookPoint::BeforeUpdate);
    assert_eq!(failure.index, 1);
    assert_eq!(failure.kind, "cmd");
    match failure.source {
        HookError::CommandFailed { exit_code, stderr } => {
            assert_eq!(exit_code, Some(7));
            assert_eq!(stderr, "boom");
        }
        other => panic!("unexpected hook error: {other:?}"),
    }
    assert!(!temp_dir.path().join("third-ran").exists());
}

/// Test: unknown hook kinds fail at run time with their tag.
#[tokio::test]
async fn unknown_hook_kind_fails() {
    let temp_dir = TempDir::new().unwrap();
    let stack = Stack::new(name("vpc")).with_hook(
        HookPoint::BeforeCreate,
        HookDefinition::new("slack", ["#deploys"]),
    );

    let registry = HookRegistry::default();
    let failure = HookRunner::new(&registry, temp_dir.path())
        .run(HookPoint::BeforeCreate, &stack, "create")
        .await
        .unwrap_err();

    assert!(matches!(failure.source, HookError::UnknownKind(kind) if kind == "slack"));
}

/// Test: no hooks at a point is a no-op.
#[tokio::test]
async fn missing_hooks_are_a_no_op() {
    let temp_dir = TempDir::new().unwrap();
    let stack = Stack::new(name("vpc"));
    let registry = HookRegistry::empty();

    HookRunner::new(&registry, temp_dir.path())
        .run(HookPoint::AfterLaunch, &stack, "launch")
        .await
        .unwrap();
}

/// Test: registered hook kinds receive args and context.
#[tokio::test]
async fn custom_hook_kind_is_dispatched() {
    struct Recorder(parking_lot::Mutex<Vec<String>>);

    #[async_trait]
    impl Hook for Recorder {
        fn kind(&self) -> &'static str {
            "record"
        }

        async fn run(&self, args: &[String], context: &HookContext) -> Result<(), HookError> {
            self.0
                .lock()
                .push(format!("{}:{}:{}", context.stack, context.action, args.join(",")));
            Ok(())
        }
    }

    let temp_dir = TempDir::new().unwrap();
    let recorder = Arc::new(Recorder(parking_lot::Mutex::new(Vec::new())));
    let mut registry = HookRegistry::empty();
    registry.register(recorder.clone());

    let stack = Stack::new(name("vpc"))
        .with_hook(HookPoint::BeforeLaunch, HookDefinition::new("record", ["a", "b"]));
    HookRunner::new(&registry, temp_dir.path())
        .run(HookPoint::BeforeLaunch, &stack, "launch")
        .await
        .unwrap();

    assert_eq!(*recorder.0.lock(), vec!["vpc:launch:a,b"]);
}
