//! Typed resource configuration.
//!
//! The orchestration platform hands attributes over as a flat string map
//! keyed `<Shell Name>.<Attribute>`. They are read once here, validated, and
//! passed around as [`ResourceConfig`].

use std::collections::HashMap;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::{ConfigError, Error, Result};
use crate::transport::{AuthMethod, SshConfig};

/// Shell name used as the attribute namespace.
pub const SHELL_NAME: &str = "Vyos";

/// Shell type of the root resource.
pub const SHELL_TYPE: &str = "CS_GenericDeployedApp";

/// Resource details as supplied by the orchestration platform.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResourceContext {
    pub address: String,
    pub name: String,
    pub fullname: String,
    pub family: String,
    pub attributes: HashMap<String, String>,
}

/// Protocol used for the CLI session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliConnectionType {
    Ssh,
}

/// Validated resource configuration.
#[derive(Debug)]
pub struct ResourceConfig {
    pub shell_name: String,
    pub name: String,
    pub fullname: String,
    pub address: String,
    pub family: String,
    pub user: Option<String>,
    pub password: Option<SecretString>,

    /// Configuration restored before autoload, if set.
    pub config_file: Option<String>,
    pub enable_ssh: bool,
    pub cli_connection_type: CliConnectionType,
    pub cli_tcp_port: u16,
    pub sessions_concurrency_limit: usize,
}

impl ResourceConfig {
    /// Read and validate every attribute of `context`.
    pub fn from_context(context: &ResourceContext, shell_name: &str) -> Result<Self> {
        let attrs = Attributes {
            prefix: if shell_name.is_empty() {
                String::new()
            } else {
                format!("{}.", shell_name)
            },
            values: &context.attributes,
        };

        let cli_connection_type = match attrs.get("CLI Connection Type") {
            None => CliConnectionType::Ssh,
            Some(value) if value.eq_ignore_ascii_case("ssh") => CliConnectionType::Ssh,
            Some(value) if value.eq_ignore_ascii_case("auto") => CliConnectionType::Ssh,
            Some(value) => return Err(ConfigError::UnsupportedConnectionType(value.into()).into()),
        };

        let cli_tcp_port: u16 = match attrs.get("CLI TCP Port") {
            None => 22,
            Some(value) => attrs.parse_number("CLI TCP Port", value)?,
        };
        if cli_tcp_port == 0 {
            return Err(attrs.invalid("CLI TCP Port", "0"));
        }

        let sessions_concurrency_limit: usize = match attrs.get("Sessions Concurrency Limit") {
            None => 1,
            Some(value) => attrs.parse_number("Sessions Concurrency Limit", value)?,
        };
        if sessions_concurrency_limit == 0 {
            return Err(attrs.invalid("Sessions Concurrency Limit", "0"));
        }

        Ok(Self {
            shell_name: shell_name.to_string(),
            name: context.name.clone(),
            fullname: context.fullname.clone(),
            address: context.address.clone(),
            family: context.family.clone(),
            user: attrs.get("User").map(str::to_string),
            password: attrs.get("Password").map(|p| SecretString::from(p.to_string())),
            config_file: attrs.get("Configuration File").map(str::to_string),
            enable_ssh: attrs
                .get("Enable SSH")
                .is_some_and(|v| v.eq_ignore_ascii_case("true")),
            cli_connection_type,
            cli_tcp_port,
            sessions_concurrency_limit,
        })
    }

    /// SSH settings for CLI sessions to this resource.
    pub fn ssh_config(&self, timeout: Duration) -> Result<SshConfig> {
        if self.address.is_empty() {
            return Err(ConfigError::MissingAttribute("address".into()).into());
        }
        let user = self
            .user
            .as_deref()
            .ok_or_else(|| ConfigError::MissingAttribute(format!("{}.User", self.shell_name)))?;

        let mut config = SshConfig::new(&self.address, self.cli_tcp_port, user);
        config.timeout = timeout;
        if let Some(password) = &self.password {
            config.auth = AuthMethod::Password(SecretString::from(password.expose_secret().to_string()));
        }
        Ok(config)
    }
}

/// Namespaced view over the raw attribute map.
struct Attributes<'a> {
    prefix: String,
    values: &'a HashMap<String, String>,
}

impl Attributes<'_> {
    /// Value of `name`, treating an empty string as unset.
    fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(&format!("{}{}", self.prefix, name))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn invalid(&self, name: &str, value: &str) -> Error {
        ConfigError::InvalidAttribute {
            name: format!("{}{}", self.prefix, name),
            value: value.to_string(),
        }
        .into()
    }

    /// Parse an integer, accepting whole numbers written as `2.0`.
    fn parse_number<T>(&self, name: &str, value: &str) -> Result<T>
    where
        T: TryFrom<u64> + std::str::FromStr,
    {
        if let Ok(n) = value.parse::<T>() {
            return Ok(n);
        }
        value
            .parse::<f64>()
            .ok()
            .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64)
            .and_then(|f| T::try_from(f as u64).ok())
            .ok_or_else(|| self.invalid(name, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(attributes: &[(&str, &str)]) -> ResourceContext {
        ResourceContext {
            address: "192.168.42.157".into(),
            name: "vyos-1".into(),
            fullname: "vyos-1".into(),
            family: "CS_GenericDeployedApp".into(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_defaults() {
        let config = ResourceConfig::from_context(&context(&[]), SHELL_NAME).unwrap();
        assert_eq!(config.cli_tcp_port, 22);
        assert_eq!(config.sessions_concurrency_limit, 1);
        assert_eq!(config.cli_connection_type, CliConnectionType::Ssh);
        assert!(!config.enable_ssh);
        assert!(config.config_file.is_none());
        assert!(config.user.is_none());
    }

    #[test]
    fn test_namespaced_attributes() {
        let config = ResourceConfig::from_context(
            &context(&[
                ("Vyos.User", "vyos"),
                ("Vyos.Password", "vyos"),
                ("Vyos.Configuration File", "scp://root:pw@10.0.0.1/cfg.boot"),
                ("Vyos.Enable SSH", "True"),
                ("Vyos.CLI Connection Type", "auto"),
                ("Vyos.CLI TCP Port", "2222"),
                ("Vyos.Sessions Concurrency Limit", "2.0"),
                ("User", "ignored"),
            ]),
            SHELL_NAME,
        )
        .unwrap();

        assert_eq!(config.user.as_deref(), Some("vyos"));
        assert_eq!(config.password.as_ref().unwrap().expose_secret(), "vyos");
        assert_eq!(
            config.config_file.as_deref(),
            Some("scp://root:pw@10.0.0.1/cfg.boot")
        );
        assert!(config.enable_ssh);
        assert_eq!(config.cli_tcp_port, 2222);
        assert_eq!(config.sessions_concurrency_limit, 2);

        let ssh = config.ssh_config(Duration::from_secs(10)).unwrap();
        assert_eq!(ssh.socket_addr(), "192.168.42.157:2222");
        assert_eq!(ssh.username, "vyos");
        assert!(matches!(ssh.auth, AuthMethod::Password(_)));
    }

    #[test]
    fn test_empty_value_is_unset() {
        let config =
            ResourceConfig::from_context(&context(&[("Vyos.Configuration File", " ")]), SHELL_NAME)
                .unwrap();
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_rejects_invalid_values() {
        let err = ResourceConfig::from_context(&context(&[("Vyos.CLI TCP Port", "ssh")]), SHELL_NAME)
            .unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::InvalidAttribute { .. })));

        let err = ResourceConfig::from_context(
            &context(&[("Vyos.Sessions Concurrency Limit", "0")]),
            SHELL_NAME,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::InvalidAttribute { .. })));

        let err = ResourceConfig::from_context(
            &context(&[("Vyos.CLI Connection Type", "Telnet")]),
            SHELL_NAME,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::UnsupportedConnectionType(_))
        ));
    }

    #[test]
    fn test_ssh_config_requires_user() {
        let config = ResourceConfig::from_context(&context(&[]), SHELL_NAME).unwrap();
        let err = config.ssh_config(Duration::from_secs(10)).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::MissingAttribute(_))));
    }

    #[test]
    fn test_deserialize_context() {
        let context: ResourceContext = serde_json::from_str(
            r#"{"address": "10.0.0.1", "name": "vyos", "attributes": {"Vyos.User": "vyos"}}"#,
        )
        .unwrap();
        assert_eq!(context.address, "10.0.0.1");
        assert!(context.fullname.is_empty());
        assert_eq!(context.attributes["Vyos.User"], "vyos");
    }
}
