//! Resource models reported by autoload.
//!
//! ```text
//! Generic Deployed App  "VyOS Deployed App"
//! ├── Generic V Port    P1  eth0
//! └── Generic V Port    P2  eth1
//! ```

use indexmap::IndexMap;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{ConfigError, Result};

/// Shell types a model may be declared with.
pub const AVAILABLE_SHELL_TYPES: [&str; 2] = ["CS_GenericDeployedApp", "CS_GenericVPort"];

/// Stable identifier derived from `material`.
pub fn unique_id(material: &str) -> String {
    let hash = Sha256::digest(material.as_bytes());
    format!("{:x}", hash)[..16].to_string()
}

fn validate_shell_type(shell_type: &str) -> Result<()> {
    if AVAILABLE_SHELL_TYPES.contains(&shell_type) {
        Ok(())
    } else {
        Err(ConfigError::UnavailableShellType(format!(
            "{} (expected one of: {})",
            shell_type,
            AVAILABLE_SHELL_TYPES.join(", ")
        ))
        .into())
    }
}

/// A sub-resource in the autoload result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AutoloadResource {
    pub model: String,
    pub name: String,
    pub relative_address: String,
    pub unique_identifier: String,
}

/// An attribute of the root (empty relative address) or of a sub-resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AutoloadAttribute {
    pub relative_address: String,
    pub attribute_name: String,
    pub attribute_value: String,
}

/// Structure and attributes discovered on the device.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AutoloadDetails {
    pub resources: Vec<AutoloadResource>,
    pub attributes: Vec<AutoloadAttribute>,
}

/// A virtual network port.
#[derive(Debug, Clone)]
pub struct GenericVPort {
    name: String,
    unique_id: String,
    shell_type: String,
    attributes: IndexMap<String, String>,
}

impl GenericVPort {
    pub const RESOURCE_MODEL: &'static str = "Generic V Port";
    pub const RELATIVE_PATH_TEMPLATE: &'static str = "P";
    pub const SHELL_TYPE: &'static str = "CS_GenericVPort";

    pub fn new(name: impl Into<String>, unique_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unique_id: unique_id.into(),
            shell_type: Self::SHELL_TYPE.to_string(),
            attributes: IndexMap::new(),
        }
    }

    /// Declare the port under another shell type.
    pub fn with_shell_type(mut self, shell_type: &str) -> Result<Self> {
        validate_shell_type(shell_type)?;
        self.shell_type = shell_type.to_string();
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    fn set(&mut self, attribute: &str, value: impl Into<String>) {
        self.attributes
            .insert(format!("{}.{}", self.shell_type, attribute), value.into());
    }

    pub fn set_logical_name(&mut self, value: impl Into<String>) {
        self.set("Logical Name", value);
    }

    pub fn set_mac_address(&mut self, value: impl Into<String>) {
        self.set("MAC Address", value);
    }

    pub fn set_requested_vnic_name(&mut self, value: impl Into<String>) {
        self.set("Requested vNIC Name", value);
    }

    /// Namespaced attributes in insertion order.
    pub fn attributes(&self) -> &IndexMap<String, String> {
        &self.attributes
    }
}

/// The deployed VM itself.
#[derive(Debug, Clone)]
pub struct GenericDeployedApp {
    shell_name: String,
    shell_type: String,
    name: String,
    unique_id: String,
    ports: Vec<GenericVPort>,
}

impl GenericDeployedApp {
    pub const RESOURCE_MODEL: &'static str = "Generic Deployed App";
    pub const SHELL_TYPE: &'static str = "CS_GenericDeployedApp";

    pub fn new(shell_name: &str, name: impl Into<String>, unique_id: impl Into<String>) -> Self {
        Self {
            shell_name: shell_name.to_string(),
            shell_type: Self::SHELL_TYPE.to_string(),
            name: name.into(),
            unique_id: unique_id.into(),
            ports: Vec::new(),
        }
    }

    /// Declare the app under another shell type.
    pub fn with_shell_type(mut self, shell_type: &str) -> Result<Self> {
        validate_shell_type(shell_type)?;
        self.shell_type = shell_type.to_string();
        Ok(self)
    }

    pub fn shell_name(&self) -> &str {
        &self.shell_name
    }

    pub fn shell_type(&self) -> &str {
        &self.shell_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn add_port(&mut self, port: GenericVPort) {
        self.ports.push(port);
    }

    pub fn ports(&self) -> &[GenericVPort] {
        &self.ports
    }

    /// Flatten into the autoload result, numbering ports `P1`, `P2`, ...
    pub fn autoload_details(&self) -> AutoloadDetails {
        let mut details = AutoloadDetails::default();

        for (index, port) in self.ports.iter().enumerate() {
            let relative_address =
                format!("{}{}", GenericVPort::RELATIVE_PATH_TEMPLATE, index + 1);

            details.resources.push(AutoloadResource {
                model: GenericVPort::RESOURCE_MODEL.to_string(),
                name: port.name.clone(),
                relative_address: relative_address.clone(),
                unique_identifier: port.unique_id.clone(),
            });

            details
                .attributes
                .extend(port.attributes.iter().map(|(name, value)| AutoloadAttribute {
                    relative_address: relative_address.clone(),
                    attribute_name: name.clone(),
                    attribute_value: value.clone(),
                }));
        }

        details
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_unique_id_is_stable() {
        assert_eq!(unique_id("eth0"), unique_id("eth0"));
        assert_ne!(unique_id("eth0"), unique_id("eth1"));
        assert_eq!(unique_id("eth0").len(), 16);
    }

    #[test]
    fn test_autoload_details() {
        let mut app = GenericDeployedApp::new("Vyos", "VyOS Deployed App", unique_id("vyos-1"));
        for name in ["eth0", "eth1"] {
            let mut port = GenericVPort::new(name, unique_id(name));
            port.set_logical_name(name);
            app.add_port(port);
        }

        let details = app.autoload_details();
        assert_eq!(details.resources.len(), 2);
        assert_eq!(details.resources[1].relative_address, "P2");
        assert_eq!(details.resources[1].model, "Generic V Port");
        assert_eq!(
            details.attributes[0],
            AutoloadAttribute {
                relative_address: "P1".into(),
                attribute_name: "CS_GenericVPort.Logical Name".into(),
                attribute_value: "eth0".into(),
            }
        );

        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["resources"][0]["name"], "eth0");
        assert_eq!(json["attributes"][1]["relative_address"], "P2");
    }

    #[test]
    fn test_shell_type_validation() {
        assert!(GenericVPort::new("eth0", "1").with_shell_type("CS_GenericVPort").is_ok());

        let err = GenericDeployedApp::new("Vyos", "app", "1")
            .with_shell_type("CS_Router")
            .unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::UnavailableShellType(_))));
    }
}
