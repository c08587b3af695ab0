use anyhow::Result;
use lifecycle::{HostContext, Updater};
use serde_json::Value;

/// Prints a line; for trying out job files.
#[derive(Debug)]
pub struct Dummy {
    host: String,
}

pub fn build(ctx: &HostContext<'_>, args: &Value) -> lifecycle::Result<Box<dyn Updater>> {
    Ok(Box::new(Dummy {
        host: ctx.fix_hostname(args)?,
    }))
}

impl Updater for Dummy {
    fn name(&self) -> &str {
        "dummy"
    }

    fn update(&mut self) -> Result<bool> {
        println!("Dummy update action output for host {}", self.host);
        Ok(true)
    }
}
