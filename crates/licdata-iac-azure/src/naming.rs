//! Azure resource naming rules
//!
//! Names are derived from the stack identity only, so the same stack always
//! maps to the same physical resources.

use licdata_iac_core::StackIdentity;

const STORAGE_ACCOUNT_MAX: usize = 24;
const REGISTRY_MIN: usize = 5;
const REGISTRY_MAX: usize = 50;

/// `rg-<project>-<stack>`
pub fn resource_group(identity: &StackIdentity) -> String {
    scoped("rg", identity)
}

/// `<kind>-<project>-<stack>`, lower-cased
pub fn scoped(kind: &str, identity: &StackIdentity) -> String {
    format!("{}-{}-{}", kind, identity.project_name, identity.stack_name).to_lowercase()
}

/// Storage account names: 3-24 lower-case alphanumerics, globally unique
pub fn storage_account(identity: &StackIdentity) -> String {
    let mut name = compact("st", identity);
    name.truncate(STORAGE_ACCOUNT_MAX);
    name
}

/// Container registry names: 5-50 lower-case alphanumerics, globally unique
pub fn container_registry(identity: &StackIdentity) -> String {
    let mut name = compact("cr", identity);
    name.truncate(REGISTRY_MAX);
    while name.len() < REGISTRY_MIN {
        name.push('0');
    }
    name
}

fn compact(prefix: &str, identity: &StackIdentity) -> String {
    prefix
        .chars()
        .chain(identity.project_name.chars())
        .chain(identity.stack_name.chars())
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
