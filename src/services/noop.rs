use anyhow::Result;
use lifecycle::{HostContext, ServiceHandler};
use serde_json::Value;

/// Does nothing, successfully.
#[derive(Debug)]
pub struct Noop {
    host: String,
}

pub fn build(ctx: &HostContext<'_>, args: &Value) -> lifecycle::Result<Box<dyn ServiceHandler>> {
    Ok(Box::new(Noop {
        host: ctx.fix_hostname(args)?,
    }))
}

impl ServiceHandler for Noop {
    fn name(&self) -> &str {
        "noop"
    }

    fn evacuate(&mut self) -> Result<bool> {
        log::debug!("[{}] noop evacuate", self.host);
        Ok(true)
    }

    fn restore(&mut self) -> Result<bool> {
        log::debug!("[{}] noop restore", self.host);
        Ok(true)
    }
}
