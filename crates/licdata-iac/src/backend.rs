use licdata_iac_azure::AzureStackFactory;
use licdata_iac_config::{Backend, Settings};
use licdata_iac_core::{LocalStateRunner, StackOperationFactory, StackRunner};
use licdata_iac_pulumi::PulumiRunner;
use std::sync::Arc;

/// Runner for the selected backend
pub fn build_runner(settings: &Settings, backend: Backend) -> Arc<dyn StackRunner> {
    match backend {
        Backend::Local => Arc::new(LocalStateRunner::in_project(settings.state_root())),
        Backend::Pulumi => {
            let runner = PulumiRunner::new(settings.pulumi_work_dir())
                .with_binary(&settings.pulumi.binary);
            match &settings.pulumi.backend_url {
                Some(url) => Arc::new(runner.with_backend_url(url)),
                None => Arc::new(runner),
            }
        }
    }
}

/// Azure stacks on the selected backend
pub fn operation_factory(settings: &Settings, backend: Backend) -> StackOperationFactory {
    let runner = build_runner(settings, backend);
    tracing::debug!("Using the {} backend", runner.name());

    StackOperationFactory::new(
        runner,
        Arc::new(AzureStackFactory::new()),
        settings.image.clone(),
    )
}
