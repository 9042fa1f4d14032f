use std::sync::{Arc, LazyLock};

use log::{debug, info, warn};
use regex::Regex;

use crate::actions::SystemActions;
use crate::config::ResourceConfig;
use crate::error::Result;
use crate::handler::CliHandler;
use crate::models::{AutoloadDetails, GenericDeployedApp, GenericVPort, unique_id};

/// Name of the root resource.
const ROOT_NAME: &str = "VyOS Deployed App";

static SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-{2,}(\s+-+)*\s*$").expect("separator pattern is valid"));

static INTERFACE_ROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>[A-Za-z0-9.@-]+)\s{2,}").expect("interface row pattern is valid")
});

/// Interface names from a `show interfaces` table, loopback excluded.
///
/// Only rows after the dashed header underline count. A row is an interface
/// when it starts with a name token followed by at least two spaces; address
/// continuation rows start with whitespace and are skipped. This follows the
/// current column layout and may miss interfaces if the layout changes.
pub fn parse_interfaces(output: &str) -> Vec<String> {
    let mut lines = output.lines();
    if !lines.any(|line| SEPARATOR.is_match(line.trim_end())) {
        warn!("no table header in 'show interfaces' output");
        return Vec::new();
    }

    lines
        .filter_map(|line| INTERFACE_ROW.captures(line))
        .map(|caps| caps["name"].to_string())
        .filter(|name| name != "lo")
        .collect()
}

/// Discover the VM's network interfaces.
pub struct AutoloadFlow {
    handler: CliHandler,
    config: Arc<ResourceConfig>,
}

impl AutoloadFlow {
    pub fn new(handler: CliHandler, config: Arc<ResourceConfig>) -> Self {
        Self { handler, config }
    }

    pub async fn execute(&self) -> Result<AutoloadDetails> {
        let mut session = self.handler.default_session().await?;
        let output = SystemActions::new(&mut session).show_interfaces().await?;
        drop(session);

        let mut root = GenericDeployedApp::new(
            &self.config.shell_name,
            ROOT_NAME,
            unique_id(&self.config.fullname),
        );

        for name in parse_interfaces(&output) {
            debug!("discovered interface {}", name);
            let mut port = GenericVPort::new(&name, unique_id(&name));
            port.set_logical_name(&name);
            root.add_port(port);
        }

        info!("autoload found {} ports", root.ports().len());
        Ok(root.autoload_details())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::channel::mock::{DEFAULT_PROMPT, MockFactory, MockSession};
    use crate::config::{ResourceContext, SHELL_NAME};
    use crate::handler::SessionPool;
    use crate::platform::vyos;

    const SHOW_INTERFACES: &str = "\
Codes: S - State, L - Link, u - Up, D - Down, A - Admin Down
Interface        IP Address                        S/L  Description
---------        ----------                        ---  -----------
eth0             192.168.42.157/24                 u/u
eth1             -                                 u/u  uplink
lo               127.0.0.1/8                       u/u
                 ::1/128
";

    #[test]
    fn test_parse_interfaces() {
        assert_eq!(parse_interfaces(SHOW_INTERFACES), vec!["eth0", "eth1"]);
    }

    #[test]
    fn test_parse_vlan_and_continuation_rows() {
        let output = "\
Interface        IP Address                        S/L  Description
---------        ----------                        ---  -----------
eth0             10.0.0.1/24                       u/u
                 2001:db8::1/64
eth0.100         10.0.100.1/24                     u/u
lo               127.0.0.1/8                       u/u
";
        assert_eq!(parse_interfaces(output), vec!["eth0", "eth0.100"]);
    }

    #[test]
    fn test_parse_without_header() {
        assert!(parse_interfaces("eth0             10.0.0.1/24   u/u").is_empty());
    }

    #[tokio::test]
    async fn test_autoload_flow() {
        let table = SHOW_INTERFACES.replace('\n', "\r\n");
        let mock = MockSession::new(DEFAULT_PROMPT).on(
            "show interfaces",
            &["show interfaces\r\n", table.as_str(), DEFAULT_PROMPT],
        );
        let pool = SessionPool::new(
            Arc::new(MockFactory::new().session(mock)),
            Arc::new(vyos::mode_graph().unwrap()),
            1,
            Duration::from_secs(5),
        );
        let context = ResourceContext {
            address: "192.168.42.157".into(),
            fullname: "vyos-1".into(),
            ..Default::default()
        };
        let config = Arc::new(ResourceConfig::from_context(&context, SHELL_NAME).unwrap());
        let flow = AutoloadFlow::new(CliHandler::new(Arc::new(pool)), config);

        let details = flow.execute().await.unwrap();
        let names: Vec<_> = details.resources.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["eth0", "eth1"]);
        assert_eq!(details.resources[0].relative_address, "P1");
        assert_eq!(details.resources[0].unique_identifier, unique_id("eth0"));
        assert_eq!(details.attributes.len(), 2);
    }
}
