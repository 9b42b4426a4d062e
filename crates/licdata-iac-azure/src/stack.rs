//! Licdata on Azure: Functions-style web app running a container image

use crate::naming;
use licdata_iac_core::{
    Declaration, DockerImage, DockerResources, InfrastructureResources, RegistryCredentials,
    ResourceConfig, Stack, StackConfig, StackIdentity, StackOutputs,
};
use serde_json::json;

/// Provider config key for the deployment region
pub const LOCATION_CONFIG: &str = "azure-native:location";

/// Logical resource names inside the stack
pub mod resources {
    pub const RESOURCE_GROUP: &str = "resourceGroup";
    pub const FUNCTION_STORAGE_ACCOUNT: &str = "functionStorageAccount";
    pub const APP_SERVICE_PLAN: &str = "appServicePlan";
    pub const APP_INSIGHTS: &str = "appInsights";
    pub const CONTAINER_REGISTRY: &str = "containerRegistry";
    pub const WEB_APP: &str = "webApp";
    pub const DOCKER_PULL_ROLE_DEFINITION: &str = "dockerPullRoleDefinition";
    pub const DOCKER_PULL_ROLE_ASSIGNMENT: &str = "dockerPullRoleAssignment";

    /// Registry admin credentials, resolved by the provider at deploy time
    pub const REGISTRY_CREDENTIALS: &str = "registryCredentials";
}

/// Stack output keys
pub mod outputs {
    pub const CONTAINER_REGISTRY_USERNAME: &str = "CONTAINER_REGISTRY_USERNAME";
    pub const CONTAINER_REGISTRY_PASSWORD: &str = "CONTAINER_REGISTRY_PASSWORD";
    pub const CONTAINER_REGISTRY_URL: &str = "CONTAINER_REGISTRY_URL";
}

/// Azure-native type tokens
mod types {
    pub const RESOURCE_GROUP: &str = "azure-native:resources:ResourceGroup";
    pub const STORAGE_ACCOUNT: &str = "azure-native:storage:StorageAccount";
    pub const APP_SERVICE_PLAN: &str = "azure-native:web:AppServicePlan";
    pub const APP_INSIGHTS: &str = "azure-native:insights:Component";
    pub const CONTAINER_REGISTRY: &str = "azure-native:containerregistry:Registry";
    pub const WEB_APP: &str = "azure-native:web:WebApp";
    pub const ROLE_DEFINITION: &str = "azure-native:authorization:RoleDefinition";
    pub const ROLE_ASSIGNMENT: &str = "azure-native:authorization:RoleAssignment";
    pub const LIST_REGISTRY_CREDENTIALS: &str =
        "azure-native:containerregistry:listRegistryCredentials";
}

const ACR_PULL_ACTION: &str = "Microsoft.ContainerRegistry/registries/pull/read";

pub struct AzureStack {
    identity: StackIdentity,
}

impl AzureStack {
    pub fn new(identity: StackIdentity) -> Self {
        Self { identity }
    }
}

impl Stack for AzureStack {
    fn identity(&self) -> &StackIdentity {
        &self.identity
    }

    fn config(&self) -> StackConfig {
        StackConfig::new().with(LOCATION_CONFIG, &self.identity.location)
    }

    fn declare_infrastructure(
        &self,
        decl: &mut Declaration,
    ) -> licdata_iac_core::Result<InfrastructureResources> {
        let id = &self.identity;
        let location = &id.location;

        let resource_group = decl.register(ResourceConfig::new(
            resources::RESOURCE_GROUP,
            types::RESOURCE_GROUP,
            json!({
                "resourceGroupName": naming::resource_group(id),
                "location": location,
            }),
        ))?;
        let group_name = resource_group.output("name");

        let storage = decl.register(
            ResourceConfig::new(
                resources::FUNCTION_STORAGE_ACCOUNT,
                types::STORAGE_ACCOUNT,
                json!({
                    "accountName": naming::storage_account(id),
                    "resourceGroupName": group_name,
                    "location": location,
                    "kind": "StorageV2",
                    "sku": { "name": "Standard_LRS" },
                }),
            )
            .depends_on(&resource_group),
        )?;

        let plan = decl.register(
            ResourceConfig::new(
                resources::APP_SERVICE_PLAN,
                types::APP_SERVICE_PLAN,
                json!({
                    "name": naming::scoped("asp", id),
                    "resourceGroupName": group_name,
                    "location": location,
                    "kind": "Linux",
                    "reserved": true,
                    "sku": { "name": "B1", "tier": "Basic" },
                }),
            )
            .depends_on(&resource_group),
        )?;

        let insights = decl.register(
            ResourceConfig::new(
                resources::APP_INSIGHTS,
                types::APP_INSIGHTS,
                json!({
                    "resourceName": naming::scoped("appi", id),
                    "resourceGroupName": group_name,
                    "location": location,
                    "kind": "web",
                    "applicationType": "web",
                }),
            )
            .depends_on(&resource_group),
        )?;

        let registry = decl.register(
            ResourceConfig::new(
                resources::CONTAINER_REGISTRY,
                types::CONTAINER_REGISTRY,
                json!({
                    "registryName": naming::container_registry(id),
                    "resourceGroupName": group_name,
                    "location": location,
                    "adminUserEnabled": true,
                    "sku": { "name": "Basic" },
                }),
            )
            .depends_on(&resource_group),
        )?;

        decl.variable(
            resources::REGISTRY_CREDENTIALS,
            json!({
                "fn::invoke": {
                    "function": types::LIST_REGISTRY_CREDENTIALS,
                    "arguments": {
                        "resourceGroupName": group_name,
                        "registryName": registry.output("name"),
                    },
                },
            }),
        );
        decl.export(
            outputs::CONTAINER_REGISTRY_USERNAME,
            format!("${{{}.username}}", resources::REGISTRY_CREDENTIALS),
        );
        decl.export(
            outputs::CONTAINER_REGISTRY_PASSWORD,
            format!("${{{}.passwords[0].value}}", resources::REGISTRY_CREDENTIALS),
        );
        decl.export(outputs::CONTAINER_REGISTRY_URL, registry.output("loginServer"));

        Ok([resource_group, storage, plan, insights, registry]
            .into_iter()
            .collect())
    }

    fn declare_docker_resources(
        &self,
        decl: &mut Declaration,
        base: &InfrastructureResources,
        image: &DockerImage,
    ) -> licdata_iac_core::Result<DockerResources> {
        decl.require(base)?;

        let id = &self.identity;
        let group_name = format!("${{{}.name}}", resources::RESOURCE_GROUP);
        let login_server = format!("${{{}.loginServer}}", resources::CONTAINER_REGISTRY);
        let registry_id = format!("${{{}.id}}", resources::CONTAINER_REGISTRY);

        let mut web_app = ResourceConfig::new(
            resources::WEB_APP,
            types::WEB_APP,
            json!({
                "name": naming::scoped("app", id),
                "resourceGroupName": group_name,
                "location": id.location,
                "kind": "app,linux,container",
                "serverFarmId": format!("${{{}.id}}", resources::APP_SERVICE_PLAN),
                "identity": { "type": "SystemAssigned" },
                "siteConfig": {
                    "linuxFxVersion": format!("DOCKER|{}", image.reference(&login_server)),
                    "appSettings": [
                        app_setting(
                            "APPINSIGHTS_INSTRUMENTATIONKEY",
                            format!("${{{}.instrumentationKey}}", resources::APP_INSIGHTS),
                        ),
                        app_setting("DOCKER_REGISTRY_SERVER_URL", format!("https://{}", login_server)),
                        app_setting(
                            "DOCKER_REGISTRY_SERVER_USERNAME",
                            format!("${{{}.username}}", resources::REGISTRY_CREDENTIALS),
                        ),
                        app_setting(
                            "DOCKER_REGISTRY_SERVER_PASSWORD",
                            format!("${{{}.passwords[0].value}}", resources::REGISTRY_CREDENTIALS),
                        ),
                        app_setting("WEBSITES_ENABLE_APP_SERVICE_STORAGE", "false"),
                        app_setting("FUNCTIONS_WORKER_RUNTIME", "python"),
                    ],
                },
            }),
        );
        for resource in base.iter() {
            web_app = web_app.depends_on(resource);
        }
        let web_app = decl.register(web_app)?;

        let mut role_definition = ResourceConfig::new(
            resources::DOCKER_PULL_ROLE_DEFINITION,
            types::ROLE_DEFINITION,
            json!({
                "roleName": naming::scoped("role-docker-pull", id),
                "description": "Pull images from the stack's container registry",
                "scope": registry_id,
                "assignableScopes": [registry_id],
                "permissions": [{ "actions": [ACR_PULL_ACTION], "notActions": [] }],
            }),
        );
        if let Some(registry) = base.get(resources::CONTAINER_REGISTRY) {
            role_definition = role_definition.depends_on(registry);
        }
        let role_definition = decl.register(role_definition)?;

        let role_assignment = decl.register(
            ResourceConfig::new(
                resources::DOCKER_PULL_ROLE_ASSIGNMENT,
                types::ROLE_ASSIGNMENT,
                json!({
                    "principalId": web_app.output("identity.principalId"),
                    "principalType": "ServicePrincipal",
                    "roleDefinitionId": role_definition.id(),
                    "scope": registry_id,
                }),
            )
            .depends_on(&web_app)
            .depends_on(&role_definition),
        )?;

        tracing::debug!("Declared {} on top of {} base resources", image, base.len());
        Ok([web_app, role_definition, role_assignment]
            .into_iter()
            .collect())
    }

    fn retrieve_container_registry_credentials(&self, values: &StackOutputs) -> RegistryCredentials {
        let read = |key: &str| values.get(key).map(String::from);
        RegistryCredentials {
            username: read(outputs::CONTAINER_REGISTRY_USERNAME),
            password: read(outputs::CONTAINER_REGISTRY_PASSWORD),
            registry_url: read(outputs::CONTAINER_REGISTRY_URL),
        }
    }
}

fn app_setting(name: &str, value: impl Into<String>) -> serde_json::Value {
    json!({ "name": name, "value": value.into() })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack() -> AzureStack {
        AzureStack::new(StackIdentity::new("acme-prod", "licdata", "westeurope"))
    }

    #[test]
    fn test_config_sets_location() {
        assert_eq!(stack().config().get(LOCATION_CONFIG), Some("westeurope"));
    }

    #[test]
    fn test_infrastructure_declares_base_resources() {
        let mut decl = Declaration::new();
        let base = stack().declare_infrastructure(&mut decl).unwrap();

        assert_eq!(base.len(), 5);
        for name in [
            resources::RESOURCE_GROUP,
            resources::FUNCTION_STORAGE_ACCOUNT,
            resources::APP_SERVICE_PLAN,
            resources::APP_INSIGHTS,
            resources::CONTAINER_REGISTRY,
        ] {
            assert!(decl.contains(name), "{}", name);
            assert!(base.get(name).is_some(), "{}", name);
        }
        assert!(decl.variables().contains_key(resources::REGISTRY_CREDENTIALS));
        assert_eq!(
            decl.outputs().get(outputs::CONTAINER_REGISTRY_URL).map(String::as_str),
            Some("${containerRegistry.loginServer}")
        );

        let group = decl.get(resources::RESOURCE_GROUP).unwrap();
        assert_eq!(
            group.get_property::<String>("resourceGroupName").as_deref(),
            Some("rg-licdata-acme-prod")
        );
    }

    #[test]
    fn test_infrastructure_is_deterministic() {
        let mut first = Declaration::new();
        let mut second = Declaration::new();
        stack().declare_infrastructure(&mut first).unwrap();
        stack().declare_infrastructure(&mut second).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_docker_resources_run_requested_image() {
        let mut decl = Declaration::new();
        let stack = stack();
        let base = stack.declare_infrastructure(&mut decl).unwrap();
        let docker = stack
            .declare_docker_resources(&mut decl, &base, &DockerImage::new("licdata", "1.2.3"))
            .unwrap();

        assert_eq!(docker.len(), 3);
        let web_app = decl.get(resources::WEB_APP).unwrap();
        assert_eq!(
            web_app.properties["siteConfig"]["linuxFxVersion"],
            "DOCKER|${containerRegistry.loginServer}/licdata:1.2.3"
        );

        let assignment = decl.get(resources::DOCKER_PULL_ROLE_ASSIGNMENT).unwrap();
        assert_eq!(
            assignment.depends_on,
            vec![resources::WEB_APP, resources::DOCKER_PULL_ROLE_DEFINITION]
        );
    }

    #[test]
    fn test_explicit_image_url_wins() {
        let mut decl = Declaration::new();
        let stack = stack();
        let base = stack.declare_infrastructure(&mut decl).unwrap();
        let image = DockerImage::new("licdata", "1.2.3").with_url("ghcr.io/acmsl/licdata:1.2.3");
        stack.declare_docker_resources(&mut decl, &base, &image).unwrap();

        let web_app = decl.get(resources::WEB_APP).unwrap();
        assert_eq!(
            web_app.properties["siteConfig"]["linuxFxVersion"],
            "DOCKER|ghcr.io/acmsl/licdata:1.2.3"
        );
    }

    #[test]
    fn test_docker_resources_require_base() {
        let mut with_base = Declaration::new();
        let base = stack().declare_infrastructure(&mut with_base).unwrap();

        let mut empty = Declaration::new();
        let err = stack()
            .declare_docker_resources(&mut empty, &base, &DockerImage::new("licdata", "1.2.3"))
            .unwrap_err();

        assert!(matches!(err, licdata_iac_core::IacError::Precondition(_)));
        assert!(empty.is_empty());
    }

    #[test]
    fn test_credentials_from_outputs() {
        let mut values = StackOutputs::new();
        values.insert(outputs::CONTAINER_REGISTRY_USERNAME, "crlicdataacmeprod");
        values.insert(outputs::CONTAINER_REGISTRY_URL, "crlicdataacmeprod.azurecr.io");

        let credentials = stack().retrieve_container_registry_credentials(&values);
        assert_eq!(credentials.username.as_deref(), Some("crlicdataacmeprod"));
        assert_eq!(credentials.password, None);
        assert_eq!(
            credentials.registry_url.as_deref(),
            Some("crlicdataacmeprod.azurecr.io")
        );
    }
}
