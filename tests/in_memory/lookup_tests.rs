//! Lookup resolution and lazy activation tests.

use std::sync::Arc;
use std::time::Duration;

use rstest::rstest;
use switchyard::service_registry::{
    adapters::memory::{InMemoryWorkerLauncher, ServiceRegistry},
    domain::{Definition, Namespace, TypedName},
    ports::{LoaderEntry, Service},
    services::{CommandRegistration, ServiceLoader},
};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::helpers::{LoaderContext, command, context, definition, isolated_config, worker};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unknown_service_is_not_found_without_spawning(context: LoaderContext) {
    let entry = context
        .loader
        .lookup(&TypedName::service("Unknown"))
        .await
        .expect("lookup should succeed");

    assert!(entry.is_none());
    assert!(context.launcher.launches().is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn non_service_names_are_never_activated(context: LoaderContext) {
    let aws = worker("Aws", vec![definition("Aws", "Aws::Vpc")]);
    context
        .loader
        .register_metadata(Some(&command("./plugins/plugin-aws")), &*aws)
        .await
        .expect("registration should succeed");

    let entry = context
        .loader
        .lookup(&TypedName::new(Namespace::Definition, "Aws::Subnet"))
        .await
        .expect("lookup should succeed");

    assert!(entry.is_none());
    assert!(context.launcher.launches().is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn known_service_is_activated_on_first_lookup(context: LoaderContext) {
    let aws_command = command("./plugins/plugin-aws");
    let aws = worker("Aws", vec![definition("Aws", "Aws::Vpc")]);
    context
        .loader
        .register_metadata(Some(&aws_command), &*aws)
        .await
        .expect("registration should succeed");
    context
        .launcher
        .register_worker(aws_command.clone(), aws)
        .expect("worker registration should succeed");

    let entry = context
        .loader
        .lookup(&TypedName::service("Aws"))
        .await
        .expect("lookup should succeed")
        .expect("service should be activated");
    let service = entry.as_service().expect("entry should hold a service");

    assert_eq!(
        service.identifier().await.expect("identifier should succeed"),
        TypedName::service("Aws")
    );
    let scopes = context.launcher.scopes(&aws_command);
    assert_eq!(scopes.len(), 1);
    assert!(scopes.iter().all(|scope| !scope.is_cancelled()));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn activated_service_is_reused(context: LoaderContext) {
    let aws_command = command("./plugins/plugin-aws");
    let aws = worker("Aws", vec![definition("Aws", "Aws::Vpc")]);
    context
        .loader
        .register_metadata(Some(&aws_command), &*aws)
        .await
        .expect("registration should succeed");
    context
        .launcher
        .register_worker(aws_command.clone(), aws)
        .expect("worker registration should succeed");

    for _ in 0..3 {
        context
            .loader
            .lookup(&TypedName::service("Aws"))
            .await
            .expect("lookup should succeed")
            .expect("service should resolve");
    }

    assert_eq!(context.launcher.launch_count(&aws_command), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_lookups_share_one_activation(context: LoaderContext) {
    let aws_command = command("./plugins/plugin-aws");
    let aws = worker("Aws", vec![definition("Aws", "Aws::Vpc")]);
    context
        .loader
        .register_metadata(Some(&aws_command), &*aws)
        .await
        .expect("registration should succeed");
    context
        .launcher
        .register_worker(aws_command.clone(), aws)
        .expect("worker registration should succeed");
    context
        .launcher
        .set_launch_delay(Duration::from_millis(50))
        .expect("delay should be set");

    let mut lookups = JoinSet::new();
    for _ in 0..8 {
        let loader = Arc::clone(&context.loader);
        lookups.spawn(async move { loader.lookup(&TypedName::service("Aws")).await });
    }

    while let Some(joined) = lookups.join_next().await {
        let entry = joined
            .expect("lookup task should not panic")
            .expect("lookup should succeed");
        assert!(entry.is_some_and(|resolved| resolved.as_service().is_some()));
    }
    assert_eq!(context.launcher.launch_count(&aws_command), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn different_services_activate_independently(context: LoaderContext) {
    for (service, path) in [("Aws", "./plugins/plugin-aws"), ("Gcp", "./plugins/plugin-gcp")] {
        let service_command = command(path);
        let handle = worker(service, vec![definition(service, &format!("{service}::Network"))]);
        context
            .loader
            .register_metadata(Some(&service_command), &*handle)
            .await
            .expect("registration should succeed");
        context
            .launcher
            .register_worker(service_command, handle)
            .expect("worker registration should succeed");
    }

    let aws_name = TypedName::service("Aws");
    let gcp_name = TypedName::service("Gcp");
    let (aws, gcp) = tokio::join!(
        context.loader.lookup(&aws_name),
        context.loader.lookup(&gcp_name),
    );

    assert!(aws.expect("lookup should succeed").is_some());
    assert!(gcp.expect("lookup should succeed").is_some());
    assert_eq!(context.launcher.launches().len(), 2);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_activation_degrades_to_not_found(context: LoaderContext) {
    let aws_command = command("./plugins/plugin-aws");
    let aws = worker("Aws", vec![definition("Aws", "Aws::Vpc")]);
    context
        .loader
        .register_metadata(Some(&aws_command), &*aws)
        .await
        .expect("registration should succeed");
    context
        .launcher
        .fail_worker(aws_command.clone(), "exec format error")
        .expect("failure registration should succeed");

    let entry = context
        .loader
        .lookup(&TypedName::service("Aws"))
        .await
        .expect("lookup should succeed");

    assert!(entry.is_none());
    assert_eq!(context.launcher.launch_count(&aws_command), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn first_command_is_used_for_activation(context: LoaderContext) {
    let first = command("./plugins/plugin-aws");
    let second = command("./build/plugin-aws");
    let aws = worker("Aws", vec![definition("Aws", "Aws::Vpc")]);
    context
        .loader
        .register_metadata(Some(&first), &*aws)
        .await
        .expect("first registration should succeed");
    let report = context
        .loader
        .register_metadata(Some(&second), &*aws)
        .await
        .expect("second registration should succeed");
    context
        .launcher
        .register_worker(first.clone(), Arc::clone(&aws) as Arc<dyn Service>)
        .expect("worker registration should succeed");
    context
        .launcher
        .register_worker(second.clone(), aws)
        .expect("worker registration should succeed");

    context
        .loader
        .lookup(&TypedName::service("Aws"))
        .await
        .expect("lookup should succeed")
        .expect("service should resolve");

    assert_eq!(report.command, CommandRegistration::Rejected);
    assert_eq!(
        context
            .loader
            .service_command(&TypedName::service("Aws"))
            .expect("command lookup should succeed"),
        Some(first.clone())
    );
    assert_eq!(context.launcher.launches(), [first]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cancelled_lookup_does_not_store_the_service(context: LoaderContext) {
    let aws_command = command("./plugins/plugin-aws");
    let aws = worker("Aws", vec![definition("Aws", "Aws::Vpc")]);
    context
        .loader
        .register_metadata(Some(&aws_command), &*aws)
        .await
        .expect("registration should succeed");
    context
        .launcher
        .register_worker(aws_command.clone(), aws)
        .expect("worker registration should succeed");
    context
        .launcher
        .set_launch_delay(Duration::from_secs(30))
        .expect("delay should be set");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let entry = context
        .loader
        .lookup_with_cancel(&TypedName::service("Aws"), &cancel)
        .await
        .expect("lookup should succeed");

    assert!(entry.is_none());
    assert!(
        context
            .launcher
            .scopes(&aws_command)
            .iter()
            .all(CancellationToken::is_cancelled)
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cancelled_caller_stops_waiting_for_another_activation(context: LoaderContext) {
    let aws_command = command("./plugins/plugin-aws");
    let aws = worker("Aws", vec![definition("Aws", "Aws::Vpc")]);
    context
        .loader
        .register_metadata(Some(&aws_command), &*aws)
        .await
        .expect("registration should succeed");
    context
        .launcher
        .register_worker(aws_command.clone(), aws)
        .expect("worker registration should succeed");
    context
        .launcher
        .set_launch_delay(Duration::from_secs(30))
        .expect("delay should be set");

    let first_caller = CancellationToken::new();
    let first = {
        let loader = Arc::clone(&context.loader);
        let cancel = first_caller.clone();
        tokio::spawn(async move {
            loader
                .lookup_with_cancel(&TypedName::service("Aws"), &cancel)
                .await
        })
    };
    while context.launcher.launch_count(&aws_command) == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let second_caller = CancellationToken::new();
    second_caller.cancel();

    let entry = tokio::time::timeout(
        Duration::from_secs(2),
        context
            .loader
            .lookup_with_cancel(&TypedName::service("Aws"), &second_caller),
    )
    .await
    .expect("cancelled caller should not wait for the running activation")
    .expect("lookup should succeed");

    assert!(entry.is_none());
    assert_eq!(context.launcher.launch_count(&aws_command), 1);
    first_caller.cancel();
    let first_entry = first
        .await
        .expect("lookup task should not panic")
        .expect("lookup should succeed");
    assert!(first_entry.is_none());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn activation_keeps_an_entry_stored_while_it_ran(context: LoaderContext) {
    let aws_command = command("./plugins/plugin-aws");
    let aws = worker("Aws", vec![definition("Aws", "Aws::Vpc")]);
    context
        .loader
        .register_metadata(Some(&aws_command), &*aws)
        .await
        .expect("registration should succeed");
    context
        .launcher
        .register_worker(aws_command.clone(), aws)
        .expect("worker registration should succeed");
    context
        .launcher
        .set_launch_delay(Duration::from_millis(200))
        .expect("delay should be set");

    let lookup = {
        let loader = Arc::clone(&context.loader);
        tokio::spawn(async move { loader.lookup(&TypedName::service("Aws")).await })
    };
    while context.launcher.launch_count(&aws_command) == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let squatter = Definition::new(TypedName::service("Legacy"), TypedName::service("Aws"));
    context
        .loader
        .register_metadata(None, &*worker("Legacy", vec![squatter.clone()]))
        .await
        .expect("registration should succeed");

    let entry = lookup
        .await
        .expect("lookup task should not panic")
        .expect("lookup should succeed")
        .expect("an entry should be returned");

    assert_eq!(entry.as_definition(), Some(&squatter));
}

#[tokio::test(flavor = "multi_thread")]
async fn parent_entries_are_resolved_before_activation() {
    let parent = Arc::new(ServiceRegistry::new());
    let vpc = definition("Aws", "Aws::Vpc");
    parent
        .set_entry(vpc.identifier().clone(), LoaderEntry::definition(vpc.clone()))
        .expect("parent registration should succeed");
    let launcher = Arc::new(InMemoryWorkerLauncher::new());
    let loader = ServiceLoader::builder(Arc::clone(&launcher))
        .with_config(isolated_config())
        .with_parent(parent)
        .build();

    let entry = loader
        .lookup(vpc.identifier())
        .await
        .expect("lookup should succeed")
        .expect("entry should be inherited");

    assert_eq!(entry.as_definition(), Some(&vpc));
    assert!(loader.entry_names().expect("listing should succeed").is_empty());
    assert!(launcher.launches().is_empty());
}
