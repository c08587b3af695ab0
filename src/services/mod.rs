//! Service handlers: take a workload off a host and bring it back.

mod noop;
mod nova;
mod thruk;

use lifecycle::ServiceRegistry;

use crate::config::Settings;
use crate::http::Client;
use crate::openstack::OpenStack;

/// Registry with every built-in service handler.
pub fn registry(settings: &Settings, client: &Client) -> ServiceRegistry {
    let mut registry = ServiceRegistry::new();

    let openstack = OpenStack::new(&settings.openstack_rc);
    registry.register("nova-compute", move |ctx, args| {
        nova::build(ctx, args, openstack.clone())
    });

    let client = client.clone();
    registry.register("thruk", move |ctx, args| thruk::build(ctx, args, client.clone()));

    registry.register("noop", noop::build);

    registry
}
