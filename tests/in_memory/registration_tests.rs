//! Metadata registration and collision policy tests.

use rstest::rstest;
use serde_json::json;
use switchyard::service_registry::{
    adapters::memory::InMemoryService,
    domain::{Namespace, ServiceMetadata, TypedName},
    services::{CommandRegistration, RegistrationReport, ServiceLoaderError},
};

use super::helpers::{LoaderContext, command, context, definition, worker};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn handler_definitions_are_indexed_twice(context: LoaderContext) {
    let handler = definition("Aws", "Aws::VpcHandler").with_property("handlerFor", json!("Aws::Vpc"));
    let aws = worker("Aws", vec![handler.clone()]);

    let report = context
        .loader
        .register_metadata(Some(&command("./plugins/plugin-aws")), &*aws)
        .await
        .expect("registration should succeed");

    for name in [
        TypedName::new(Namespace::Definition, "Aws::VpcHandler"),
        TypedName::handler("Aws::Vpc"),
    ] {
        let entry = context
            .loader
            .lookup(&name)
            .await
            .expect("lookup should succeed")
            .expect("entry should exist");
        assert_eq!(entry.as_definition(), Some(&handler));
    }
    assert_eq!(report.registered.len(), 2);
    assert_eq!(report.command, CommandRegistration::Recorded);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn handler_type_objects_are_indexed_by_name(context: LoaderContext) {
    let handler = definition("Aws", "Aws::SubnetHandler")
        .with_property("handlerFor", json!({"name": "Aws::Subnet", "attributes": {}}));
    let aws = worker("Aws", vec![handler]);

    context
        .loader
        .register_metadata(None, &*aws)
        .await
        .expect("registration should succeed");

    let entry = context
        .loader
        .lookup(&TypedName::handler("Aws::Subnet"))
        .await
        .expect("lookup should succeed");
    assert!(entry.is_some());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn first_definition_wins(context: LoaderContext) {
    let original = definition("Aws", "Shared::Network").with_property("origin", json!("aws"));
    let late = definition("Gcp", "Shared::Network").with_property("origin", json!("gcp"));

    context
        .loader
        .register_metadata(Some(&command("./plugins/plugin-aws")), &*worker("Aws", vec![original.clone()]))
        .await
        .expect("first registration should succeed");
    let report = context
        .loader
        .register_metadata(Some(&command("./plugins/plugin-gcp")), &*worker("Gcp", vec![late]))
        .await
        .expect("second registration should succeed");

    let name = TypedName::new(Namespace::Definition, "Shared::Network");
    assert_eq!(report.skipped, [name.clone()]);
    assert!(report.registered.is_empty());
    assert_eq!(report.command, CommandRegistration::Recorded);
    let entry = context
        .loader
        .lookup(&name)
        .await
        .expect("lookup should succeed")
        .expect("entry should exist");
    assert_eq!(entry.as_definition(), Some(&original));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn rejected_command_still_registers_definitions(context: LoaderContext) {
    context
        .loader
        .register_metadata(
            Some(&command("./plugins/plugin-aws")),
            &*worker("Aws", vec![definition("Aws", "Aws::Vpc")]),
        )
        .await
        .expect("first registration should succeed");

    let report = context
        .loader
        .register_metadata(
            Some(&command("./build/plugin-aws")),
            &*worker("Aws", vec![definition("Aws", "Aws::Subnet")]),
        )
        .await
        .expect("second registration should succeed");

    assert_eq!(report.command, CommandRegistration::Rejected);
    assert_eq!(
        report.registered,
        [TypedName::new(Namespace::Definition, "Aws::Subnet")]
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn empty_metadata_registers_nothing(context: LoaderContext) {
    let report = context
        .loader
        .register_metadata(Some(&command("./plugins/plugin-empty")), &*worker("Empty", Vec::new()))
        .await
        .expect("registration should succeed");

    assert_eq!(report, RegistrationReport::default());
    assert_eq!(
        context
            .loader
            .service_command(&TypedName::service("Empty"))
            .expect("command lookup should succeed"),
        None
    );
    assert!(context.loader.is_empty().expect("count should succeed"));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn metadata_failures_are_returned(context: LoaderContext) {
    let broken = InMemoryService::new(TypedName::service("Broken"), ServiceMetadata::default())
        .with_metadata_error("worker closed the channel");

    let result = context.loader.register_metadata(None, &broken).await;

    assert!(matches!(result, Err(ServiceLoaderError::Service(_))));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn entry_names_are_sorted(context: LoaderContext) {
    context
        .loader
        .register_metadata(
            None,
            &*worker(
                "Aws",
                vec![definition("Aws", "Aws::Vpc"), definition("Aws", "Aws::Acl")],
            ),
        )
        .await
        .expect("registration should succeed");

    let names: Vec<String> = context
        .loader
        .entry_names()
        .expect("listing should succeed")
        .iter()
        .map(TypedName::map_key)
        .collect();

    assert_eq!(names, ["definition/Aws::Acl", "definition/Aws::Vpc"]);
    assert_eq!(context.loader.len().expect("count should succeed"), 2);
}
