//! Device data model as delivered by the metadata authority.
//!
//! Devices arrive as JSON documents such as:
//!
//! ```json
//! {
//!   "id": "6a4f...",
//!   "name": "d1",
//!   "adminState": "UNLOCKED",
//!   "service": { "name": "device-modbus" },
//!   "protocols": { "modbus": { "addr": "1" } },
//!   "profile": { "name": "meter", "deviceResources": [], "deviceCommands": [] }
//! }
//! ```
//!
//! Every record here is an immutable value once it is stored; updates replace
//! the whole `Device`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::command::ValueType;

// Protocols travel as a JSON object keyed by protocol name but are held as an
// ordered list, so document order is preserved in both directions.
mod protocols_serde {
    use super::ProtocolDescriptor;
    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};
    use std::collections::HashMap;
    use std::fmt;

    pub fn serialize<S>(protocols: &[ProtocolDescriptor], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(protocols.len()))?;
        for protocol in protocols {
            map.serialize_entry(&protocol.name, &protocol.properties)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<ProtocolDescriptor>, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ProtocolsVisitor;

        impl<'de> Visitor<'de> for ProtocolsVisitor {
            type Value = Vec<ProtocolDescriptor>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object of protocol name to property object")
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E> {
                Ok(Vec::new())
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut protocols = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, properties)) =
                    access.next_entry::<String, HashMap<String, String>>()?
                {
                    protocols.push(ProtocolDescriptor { name, properties });
                }
                Ok(protocols)
            }
        }

        deserializer.deserialize_any(ProtocolsVisitor)
    }
}

/// Administrative state. `Unlocked` devices are enabled for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AdminState {
    #[default]
    Unlocked,
    Locked,
}

impl AdminState {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Unlocked)
    }
}

impl std::fmt::Display for AdminState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unlocked => write!(f, "UNLOCKED"),
            Self::Locked => write!(f, "LOCKED"),
        }
    }
}

/// Operating state as last reported to the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperatingState {
    #[default]
    Enabled,
    Disabled,
}

/// Reference to the device service that owns a device.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceRef {
    pub name: String,
}

impl ServiceRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// One protocol a device is reachable over, with its addressing properties.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProtocolDescriptor {
    pub name: String,
    pub properties: HashMap<String, String>,
}

impl ProtocolDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: HashMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// Access mode of a device resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResourceMode {
    #[serde(rename = "R")]
    Read,
    #[serde(rename = "W")]
    Write,
    #[default]
    #[serde(rename = "RW")]
    ReadWrite,
}

impl ResourceMode {
    pub fn readable(&self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    pub fn writable(&self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }
}

/// A named data point on a device, described by the device profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceResource {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Driver-specific attributes (register address, sensor type, ...)
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    pub value_type: ValueType,
    #[serde(default)]
    pub read_write: ResourceMode,
}

impl DeviceResource {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            attributes: HashMap::new(),
            value_type,
            read_write: ResourceMode::ReadWrite,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_mode(mut self, mode: ResourceMode) -> Self {
        self.read_write = mode;
        self
    }
}

/// A profile command groups resources that are read or written together.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProfileCommand {
    pub name: String,
    /// Resources read by a GET, in order
    #[serde(default)]
    pub get: Vec<String>,
    /// Resources written by a PUT, in order
    #[serde(default)]
    pub set: Vec<String>,
}

/// Device profile: the resources and commands a class of device offers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub device_resources: Vec<DeviceResource>,
    #[serde(default)]
    pub device_commands: Vec<ProfileCommand>,
}

impl DeviceProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_resource(mut self, resource: DeviceResource) -> Self {
        self.device_resources.push(resource);
        self
    }

    pub fn with_command(mut self, command: ProfileCommand) -> Self {
        self.device_commands.push(command);
        self
    }

    pub fn resource(&self, name: &str) -> Option<&DeviceResource> {
        self.device_resources.iter().find(|r| r.name == name)
    }

    pub fn command(&self, name: &str) -> Option<&ProfileCommand> {
        self.device_commands.iter().find(|c| c.name == name)
    }
}

/// Periodic or change-driven reading of one resource, scheduled by the
/// platform's auto-event runner.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoEvent {
    pub resource: String,
    /// Interval such as `"10s"` or `"1m"`
    #[serde(default)]
    pub frequency: String,
    /// Only publish when the value differs from the previous reading
    #[serde(default)]
    pub on_change: bool,
}

impl AutoEvent {
    pub fn new(resource: impl Into<String>, frequency: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            frequency: frequency.into(),
            on_change: false,
        }
    }
}

/// A device managed by the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Authority-assigned identifier, stable across updates
    pub id: String,
    /// Human-readable name, unique within the owning service
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub admin_state: AdminState,
    #[serde(default)]
    pub operating_state: OperatingState,
    /// Owning device service
    #[serde(default)]
    pub service: ServiceRef,
    #[serde(default, with = "protocols_serde")]
    pub protocols: Vec<ProtocolDescriptor>,
    #[serde(default)]
    pub profile: DeviceProfile,
    #[serde(default, alias = "autoevents")]
    pub auto_events: Vec<AutoEvent>,
}

impl Device {
    pub fn new(id: impl Into<String>, name: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            labels: Vec::new(),
            admin_state: AdminState::Unlocked,
            operating_state: OperatingState::Enabled,
            service: ServiceRef::new(service),
            protocols: Vec::new(),
            profile: DeviceProfile::default(),
            auto_events: Vec::new(),
        }
    }

    pub fn with_protocol(mut self, protocol: ProtocolDescriptor) -> Self {
        self.protocols.push(protocol);
        self
    }

    pub fn with_admin_state(mut self, state: AdminState) -> Self {
        self.admin_state = state;
        self
    }

    pub fn with_profile(mut self, profile: DeviceProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    pub fn with_auto_event(mut self, event: AutoEvent) -> Self {
        self.auto_events.push(event);
        self
    }

    /// Whether this device is assigned to the service named `service`.
    pub fn is_owned_by(&self, service: &str) -> bool {
        self.service.name == service
    }

    /// Field-by-field protocol comparison: same names, same properties, same
    /// order. Nothing else on the device is considered.
    pub fn protocols_match(&self, other: &Device) -> bool {
        self.protocols == other.protocols
    }

    pub fn protocol(&self, name: &str) -> Option<&ProtocolDescriptor> {
        self.protocols.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modbus(addr: &str) -> ProtocolDescriptor {
        ProtocolDescriptor::new("modbus").with_property("addr", addr)
    }

    #[test]
    fn test_device_deserialization() {
        let json = r#"{
            "id": "d1-id",
            "name": "d1",
            "adminState": "LOCKED",
            "service": { "name": "device-modbus" },
            "protocols": {
                "modbus": { "addr": "1", "unit": "3" },
                "other": {}
            },
            "profile": {
                "name": "meter",
                "deviceResources": [
                    { "name": "power", "valueType": "Float32", "readWrite": "R",
                      "attributes": { "register": "40001" } }
                ],
                "deviceCommands": [ { "name": "all", "get": ["power"] } ]
            }
        }"#;

        let device: Device = serde_json::from_str(json).unwrap();
        assert_eq!(device.id, "d1-id");
        assert_eq!(device.admin_state, AdminState::Locked);
        assert!(device.is_owned_by("device-modbus"));
        assert_eq!(device.protocols.len(), 2);
        assert_eq!(device.protocols[0].name, "modbus");
        assert_eq!(device.protocols[0].property("unit"), Some("3"));
        assert_eq!(device.protocols[1].name, "other");

        let power = device.profile.resource("power").unwrap();
        assert_eq!(power.value_type, ValueType::Float32);
        assert!(power.read_write.readable());
        assert!(!power.read_write.writable());
        assert_eq!(device.profile.command("all").unwrap().get, vec!["power"]);
    }

    #[test]
    fn test_protocol_document_order() {
        let json = r#"{"id": "x", "name": "x",
            "protocols": { "zeta": { "a": "1" }, "alpha": { "b": "2" } }}"#;
        let device: Device = serde_json::from_slice(json.as_bytes()).unwrap();
        let names: Vec<_> = device.protocols.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);

        let text = serde_json::to_string(&device).unwrap();
        assert!(text.find("zeta").unwrap() < text.find("alpha").unwrap());
    }

    #[test]
    fn test_auto_events() {
        let json = r#"{"id": "x", "name": "x", "autoEvents": [
            { "resource": "power", "frequency": "10s", "onChange": true },
            { "resource": "energy", "frequency": "1m" }
        ]}"#;
        let device: Device = serde_json::from_str(json).unwrap();
        assert_eq!(device.auto_events.len(), 2);
        assert!(device.auto_events[0].on_change);
        assert_eq!(device.auto_events[1], AutoEvent::new("energy", "1m"));

        let value = serde_json::to_value(&device).unwrap();
        assert_eq!(value["autoEvents"][0]["frequency"], "10s");
    }

    #[test]
    fn test_minimal_device_uses_defaults() {
        let device: Device = serde_json::from_str(r#"{"id": "x", "name": "x"}"#).unwrap();
        assert_eq!(device.admin_state, AdminState::Unlocked);
        assert!(device.protocols.is_empty());
        assert!(device.service.name.is_empty());
        assert!(device.auto_events.is_empty());
    }

    #[test]
    fn test_null_protocols() {
        let device: Device =
            serde_json::from_str(r#"{"id": "x", "name": "x", "protocols": null}"#).unwrap();
        assert!(device.protocols.is_empty());
    }

    #[test]
    fn test_protocols_serialize_as_object() {
        let device = Device::new("d1", "d1", "svc").with_protocol(modbus("7"));
        let value = serde_json::to_value(&device).unwrap();
        assert_eq!(value["protocols"]["modbus"]["addr"], "7");
        assert_eq!(value["adminState"], "UNLOCKED");
    }

    #[test]
    fn test_protocols_match_ignores_other_fields() {
        let a = Device::new("d1", "d1", "svc").with_protocol(modbus("1"));
        let b = Device::new("d1", "renamed", "svc")
            .with_protocol(modbus("1"))
            .with_admin_state(AdminState::Locked)
            .with_description("moved to rack 4");
        assert!(a.protocols_match(&b));

        let c = Device::new("d1", "d1", "svc").with_protocol(modbus("2"));
        assert!(!a.protocols_match(&c));

        let d = Device::new("d1", "d1", "svc")
            .with_protocol(modbus("1"))
            .with_protocol(ProtocolDescriptor::new("ble"));
        assert!(!a.protocols_match(&d));
    }
}
