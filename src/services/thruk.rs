use anyhow::Result;
use lifecycle::{HostContext, PluginArgs, PluginKind, ServiceHandler};
use serde_json::{Map, Value};

use crate::http::{Client, Credentials};

/// Silences monitoring notifications for a host while it is under
/// maintenance, through the Thruk REST API.
#[derive(Debug)]
pub struct Thruk {
    host: String,
    url: String,
    monitored_name: String,
    credentials: Credentials,
    client: Client,
}

pub fn build(
    ctx: &HostContext<'_>,
    args: &Value,
    client: Client,
) -> lifecycle::Result<Box<dyn ServiceHandler>> {
    let plugin = PluginArgs::new(PluginKind::Service, "thruk", args);
    let host = ctx.fix_hostname(args)?;

    let monitored_name = match plugin.str("thruk-host") {
        Some(template) => {
            let mut extra = Map::new();
            extra.insert("host".to_string(), Value::String(host.clone()));
            match ctx.render(&Value::String(template.to_string()), &extra)? {
                Value::String(name) => name,
                other => other.to_string(),
            }
        }
        None => host.clone(),
    };

    Ok(Box::new(Thruk {
        url: plugin
            .required_str("thruk-url")?
            .trim_end_matches('/')
            .to_string(),
        credentials: Credentials {
            username: plugin.required_str("thruk-username")?.to_string(),
            password: plugin.required_str("thruk-password")?.to_string(),
        },
        host,
        monitored_name,
        client,
    }))
}

impl Thruk {
    fn notifications_url(&self, enable: bool) -> String {
        let action = if enable { "enable" } else { "disable" };
        format!("{}/hosts/{}/{action}_notifications", self.url, self.monitored_name)
    }

    fn set_notifications(&self, enable: bool) -> Result<bool> {
        let url = self.notifications_url(enable);
        let status = self.client.post_empty(&url, Some(&self.credentials))?;

        if (200..300).contains(&status) {
            Ok(true)
        } else {
            log::error!("[{}] Thruk answered {status} for {url}", self.host);
            Ok(false)
        }
    }
}

impl ServiceHandler for Thruk {
    fn name(&self) -> &str {
        "thruk"
    }

    fn evacuate(&mut self) -> Result<bool> {
        self.set_notifications(false)
    }

    fn restore(&mut self) -> Result<bool> {
        self.set_notifications(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use templating::TemplateEngine;

    fn args() -> Value {
        json!({
            "thruk-url": "https://monitor.example.org/thruk/r/",
            "thruk-username": "ops",
            "thruk-password": "secret"
        })
    }

    #[test]
    fn test_urls_use_effective_name() {
        let templates = TemplateEngine::new();
        let host_args = json!({"site": "ath"});
        let ctx = HostContext::new("cn01", &host_args, &templates);

        let mut raw = args();
        raw["fix-hostname"] = json!("{{ host }}.example.org");
        raw["thruk-host"] = json!("{{ site }}-{{ host }}");
        let thruk = build(&ctx, &raw, Client::new()).unwrap();
        let thruk = format!("{thruk:?}");

        assert!(thruk.contains("monitored_name: \"ath-cn01.example.org\""), "{thruk}");
        assert!(thruk.contains("url: \"https://monitor.example.org/thruk/r\""), "{thruk}");
    }

    #[test]
    fn test_notification_urls() {
        let thruk = Thruk {
            host: "cn01".to_string(),
            url: "https://m/thruk/r".to_string(),
            monitored_name: "cn01".to_string(),
            credentials: Credentials {
                username: "u".to_string(),
                password: "p".to_string(),
            },
            client: Client::new(),
        };
        assert_eq!(
            thruk.notifications_url(false),
            "https://m/thruk/r/hosts/cn01/disable_notifications"
        );
        assert_eq!(
            thruk.notifications_url(true),
            "https://m/thruk/r/hosts/cn01/enable_notifications"
        );
    }

    #[test]
    fn test_missing_credentials() {
        let templates = TemplateEngine::new();
        let host_args = json!({});
        let ctx = HostContext::new("cn01", &host_args, &templates);

        let err = build(&ctx, &json!({"thruk-url": "u"}), Client::new()).unwrap_err();
        assert!(matches!(err, lifecycle::Error::MissingArgument { .. }));
    }
}
