#![cfg(unix)]

use licdata_iac_azure::AzureStackFactory;
use licdata_iac_core::{
    keys, DockerImage, Event, EventKind, ImageSettings, StackIdentity, StackOperationFactory,
};
use licdata_iac_pulumi::{PulumiRunner, PROGRAM_FILE};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;

/// Stand-in for the pulumi CLI: logs its arguments and prints canned JSON.
/// An `up` fails as locked while `<work_dir>/LOCKED` exists.
const FAKE_PULUMI: &str = r#"#!/bin/sh
echo "$@" >> "$(dirname "$0")/calls.log"
case "$1 $2" in
  "stack history")
    echo '[{"kind":"destroy","result":"succeeded","resourceChanges":{"delete":5}},{"kind":"update","result":"succeeded","resourceChanges":{"create":5}}]'
    ;;
  "stack output")
    echo '{"CONTAINER_REGISTRY_USERNAME":"crlicdataacmeprod","CONTAINER_REGISTRY_PASSWORD":"s3cret","CONTAINER_REGISTRY_URL":"crlicdataacmeprod.azurecr.io"}'
    ;;
  "up --yes")
    if [ -f ../../LOCKED ]; then
      echo "error: the stack is currently locked by 1 lock(s)" >&2
      exit 255
    fi
    ;;
esac
exit 0
"#;

fn install_fake_pulumi(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("pulumi");
    fs::write(&path, FAKE_PULUMI).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn calls(dir: &Path) -> Vec<String> {
    fs::read_to_string(dir.join("calls.log"))
        .unwrap_or_default()
        .lines()
        .map(String::from)
        .collect()
}

#[tokio::test]
async fn test_lifecycle_against_fake_cli() {
    let bin_dir = tempfile::tempdir().unwrap();
    let work_dir = tempfile::tempdir().unwrap();
    let binary = install_fake_pulumi(bin_dir.path());

    let runner = Arc::new(PulumiRunner::new(work_dir.path()).with_binary(&binary));
    let factory = StackOperationFactory::new(
        runner.clone(),
        Arc::new(AzureStackFactory::new()),
        ImageSettings::default(),
    );
    let acme = StackIdentity::new("acme-prod", "licdata", "westeurope");

    // update: program written, commands in order, credentials forwarded
    let request = Event::infrastructure_update_requested(acme.clone());
    let events = factory.dispatch(&request).await.unwrap();

    assert_eq!(events[0].kind(), EventKind::InfrastructureUpdated);
    assert_eq!(events[1].kind(), EventKind::DockerImageRequested);
    assert_eq!(
        events[1].metadata_value(keys::CREDENTIAL_NAME),
        Some("crlicdataacmeprod")
    );
    assert_eq!(
        events[1].metadata_value(keys::DOCKER_REGISTRY_URL),
        Some("crlicdataacmeprod.azurecr.io")
    );
    assert_eq!(
        calls(bin_dir.path()),
        vec![
            "stack select --create acme-prod --non-interactive",
            "config set azure-native:location westeurope --stack acme-prod --non-interactive",
            "refresh --yes --stack acme-prod --non-interactive",
            "up --yes --skip-preview --stack acme-prod --non-interactive",
            "stack history --json --stack acme-prod --non-interactive",
            "stack output --json --show-secrets --stack acme-prod --non-interactive",
        ]
    );

    let program = fs::read_to_string(runner.project_dir(&acme).join(PROGRAM_FILE)).unwrap();
    assert!(program.contains("azure-native:containerregistry:Registry"));
    assert!(!program.contains("azure-native:web:WebApp"));

    // a locked stack fails the Docker update as retryable
    fs::write(work_dir.path().join("LOCKED"), "").unwrap();
    let deploy = Event::docker_resources_update_requested(acme.clone(), DockerImage::new("licdata", "1.2.3"));
    let events = factory.dispatch(&deploy).await.unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind(), EventKind::DockerResourcesUpdateFailed);
    assert_eq!(events[0].metadata_value(keys::RETRYABLE), Some("true"));
    let program = fs::read_to_string(runner.project_dir(&acme).join(PROGRAM_FILE)).unwrap();
    assert!(program.contains("azure-native:web:WebApp"));
    fs::remove_file(work_dir.path().join("LOCKED")).unwrap();

    // removal destroys with an empty program
    let removal = Event::infrastructure_removal_requested(acme.clone());
    let events = factory.dispatch(&removal).await.unwrap();

    assert_eq!(events[0].kind(), EventKind::InfrastructureRemoved);
    assert!(calls(bin_dir.path())
        .iter()
        .any(|c| c == "destroy --yes --skip-preview --stack acme-prod --non-interactive"));
    let program = fs::read_to_string(runner.project_dir(&acme).join(PROGRAM_FILE)).unwrap();
    assert!(!program.contains("resources"));
}
