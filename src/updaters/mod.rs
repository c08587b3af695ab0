//! Updaters: one maintenance action on one host.

mod apt;
mod dummy;
mod exec;
mod reboot;
mod remote;

use lifecycle::{HostContext, UpdaterRegistry};
use serde_json::Value;
use std::sync::Arc;

use crate::config::Settings;
use crate::ssh::SshTarget;

/// Registry with every built-in updater.
pub fn registry(settings: &Settings) -> UpdaterRegistry {
    let settings = Arc::new(settings.clone());
    let mut registry = UpdaterRegistry::new();

    registry.register("dummy", dummy::build);
    registry.register("exec", exec::build);

    let ssh = Arc::clone(&settings);
    registry.register("ssh", move |ctx, args| {
        remote::build_command(ctx, args, target(ctx, args, &ssh)?)
    });

    let touch = Arc::clone(&settings);
    registry.register("ssh-touch-file", move |ctx, args| {
        remote::build_touch_file(ctx, args, target(ctx, args, &touch)?)
    });

    let apt = Arc::clone(&settings);
    registry.register("apt", move |ctx, args| {
        apt::build(ctx, args, target(ctx, args, &apt)?)
    });

    registry.register("reboot", move |ctx, args| {
        reboot::build(ctx, args, target(ctx, args, &settings)?)
    });

    registry
}

/// ssh connection to the effective host name of an updater.
fn target(ctx: &HostContext<'_>, args: &Value, settings: &Settings) -> lifecycle::Result<SshTarget> {
    Ok(SshTarget::new(&ctx.fix_hostname(args)?, ctx.args(), settings))
}
